//! Version command for the convo CLI.

/// The current version of convo, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn version_string() -> String {
    format!("convo {}", VERSION)
}
