//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    if let Err(err) = wharyo_cli::run() {
        eprintln!("wharyo: {err}");
        std::process::exit(1);
    }
}
