//! Configuration loading.

mod loader;

pub use loader::{load, parse_env_file, probe_config_paths, token_store_paths};
