//! Features: an optional identifier, an optional geometry and a set of
//! uniquely named attributes.

use crate::{Attribute, FeatureGeometry};

/// Identifier assigned to a persisted feature.
pub type FeatureId = u64;

/// A spatial feature.
///
/// Attribute names are unique under case-insensitive comparison. Adding an
/// attribute whose name is already present leaves the feature unchanged.
///
/// # Examples
///
/// ```
/// use wharyo_core::{Attribute, Feature};
///
/// # fn main() -> Result<(), wharyo_core::PreconditionViolation> {
/// let mut feature = Feature::new();
/// assert!(feature.add_attribute(Attribute::with_value("name", "first")?));
/// assert!(!feature.add_attribute(Attribute::with_value("NAME", "second")?));
/// assert_eq!(feature.attributes().len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feature {
    id: Option<FeatureId>,
    geometry: Option<FeatureGeometry>,
    attributes: Vec<Attribute>,
}

impl Feature {
    /// An empty feature with neither identifier nor geometry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a feature from a geometry and attributes, dropping attributes
    /// whose names repeat an earlier one.
    #[must_use]
    pub fn from_parts(
        geometry: Option<FeatureGeometry>,
        attributes: impl IntoIterator<Item = Attribute>,
    ) -> Self {
        let mut feature = Self {
            geometry,
            ..Self::default()
        };
        for attribute in attributes {
            feature.add_attribute(attribute);
        }
        feature
    }

    /// Identifier, present once the feature has been persisted.
    #[must_use]
    pub const fn id(&self) -> Option<FeatureId> {
        self.id
    }

    /// Set the identifier.
    pub const fn set_id(&mut self, id: FeatureId) {
        self.id = Some(id);
    }

    /// Geometry, if any.
    #[must_use]
    pub const fn geometry(&self) -> Option<&FeatureGeometry> {
        self.geometry.as_ref()
    }

    /// Replace the geometry.
    pub fn set_geometry(&mut self, geometry: Option<FeatureGeometry>) {
        self.geometry = geometry;
    }

    /// Attributes in insertion order.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Look up an attribute by case-insensitive name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attribute| attribute.has_name(name))
    }

    /// Add an attribute unless one with the same name already exists.
    ///
    /// Returns `true` when the attribute was added.
    pub fn add_attribute(&mut self, attribute: Attribute) -> bool {
        if self.attribute(attribute.name()).is_some() {
            return false;
        }
        self.attributes.push(attribute);
        true
    }

    /// Remove the attribute with the given case-insensitive name.
    pub fn remove_attribute(&mut self, name: &str) -> Option<Attribute> {
        let position = self
            .attributes
            .iter()
            .position(|attribute| attribute.has_name(name))?;
        Some(self.attributes.remove(position))
    }
}
