pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::serial::SerialPortOpener;
pub use crate::config::DaemonConfig;
pub use crate::core::{
    dispatch::Dispatcher,
    link::{LinkConfig, LinkManager, LinkStats},
    tokens::{TokenOptions, TokenStore},
};
pub use crate::domain::model::{LockState, Reply, RequestContext};
pub use crate::utils::error::{LinkError, LoadError, Result, SphincterError};
