//! Data-driven configuration for Emporium sessions.
//!
//! Economy tuning lives in a single RON, TOML, or JSON file. The loader picks
//! the format from the file extension, deserializes an
//! [`EconomyConfig`](emporium_core::config::EconomyConfig), and validates it.

pub mod loader;

pub use loader::{DataLoadError, Format, load_economy_config, load_economy_config_from_dir};
