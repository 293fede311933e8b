//! Common utilities shared by the loader, steps, and runner

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};

/// Whether a flag cell reads as an affirmative (`yes`, `y`, `true`, `1`, `on`)
pub fn is_affirmative(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "yes" | "y" | "true" | "1" | "on"
    )
}

/// Whether a flag cell reads as a negative (`no`, `n`, `false`, `0`, `off`)
pub fn is_negative(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "no" | "n" | "false" | "0" | "off"
    )
}
