#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::Args;
pub use toml_config::{DaemonConfig, HookConfig, LogFormat};
