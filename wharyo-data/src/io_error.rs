//! Mapping of filesystem failures onto the feature store taxonomy.

use std::io;

use camino::Utf8Path;
use log::{debug, error};
use wharyo_core::{DataSourceUnavailableReason, FeatureStoreError};

/// Classify an I/O failure on `layer`'s medium.
///
/// Permission errors mean the medium rejects writes; everything else is a
/// connection failure.
pub(crate) fn io_failure(layer: &str, err: io::Error) -> FeatureStoreError {
    let reason = match err.kind() {
        io::ErrorKind::PermissionDenied => DataSourceUnavailableReason::ReadOnlyAccess,
        _ => DataSourceUnavailableReason::ConnectionUnavailable,
    };
    error!("I/O failure on layer {layer:?}: {err}");
    FeatureStoreError::unavailable(layer, reason, Some(Box::new(err)))
}

/// Fail with [`DataSourceUnavailableReason::ReadOnlyAccess`] when any of
/// `paths` is flagged read-only. Missing files are ignored.
pub(crate) fn ensure_writable<'a>(
    layer: &str,
    paths: impl IntoIterator<Item = &'a Utf8Path>,
) -> Result<(), FeatureStoreError> {
    for path in paths {
        let read_only = match wharyo_fs::file_is_read_only(path) {
            Ok(flag) => flag,
            Err(err) if err.kind() == io::ErrorKind::NotFound => false,
            Err(err) => return Err(io_failure(layer, err)),
        };
        if read_only {
            debug!("refusing to write layer {layer:?}: {path} is read-only");
            return Err(FeatureStoreError::unavailable(
                layer,
                DataSourceUnavailableReason::ReadOnlyAccess,
                None,
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(io::ErrorKind::PermissionDenied, DataSourceUnavailableReason::ReadOnlyAccess)]
    #[case(io::ErrorKind::NotFound, DataSourceUnavailableReason::ConnectionUnavailable)]
    #[case(io::ErrorKind::UnexpectedEof, DataSourceUnavailableReason::ConnectionUnavailable)]
    fn io_kinds_are_classified(
        #[case] kind: io::ErrorKind,
        #[case] expected: DataSourceUnavailableReason,
    ) {
        let err = io_failure("roads", io::Error::new(kind, "boom"));
        assert_eq!(err.unavailable_reason(), Some(expected));
    }
}
