pub mod dispatch;
pub mod framing;
pub mod link;
pub mod tokens;

pub use crate::domain::model::{Command, LockState, Reply, RequestContext};
pub use crate::domain::ports::{Actuator, PortOpener, StateObserver, Transport};
pub use crate::utils::error::Result;
