//! Common types for landfall: the desired-state stack model, errors, and
//! stack configuration

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod render;
pub mod resource;
pub mod stack;

pub use config::{Cloud, StackConfig};
pub use error::Error;
pub use resource::{CustomTimeouts, Resource, ResourceOptions};
pub use stack::{Output, Stack};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Project name used for the rendered program and config key namespace
pub const PROJECT_NAME: &str = "landfall";

/// Address block used when `cidrBlock` is not configured
pub const DEFAULT_CIDR_BLOCK: &str = "10.255.0.0/16";

/// Per-subnet mask used when `subnetMask` is not configured
pub const DEFAULT_SUBNET_MASK: &str = "255.255.240.0";

/// Owner tag applied when no owner is configured
pub const DEFAULT_OWNER: &str = "unclaimed-project@example.net";

/// Build an interpolation referencing a whole resource or variable: `${name}`
pub fn reference(name: &str) -> String {
    format!("${{{}}}", name)
}

/// Build an interpolation referencing an output property: `${name.path}`
pub fn output_ref(name: &str, path: &str) -> String {
    format!("${{{}.{}}}", name, path)
}
