// Build metadata from Cargo.toml

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const NAME: &str = env!("CARGO_PKG_NAME");

/// `User-Agent` sent to the metrics feed and the cloud API.
pub fn user_agent() -> String {
    format!("{}/{}", NAME, VERSION)
}
