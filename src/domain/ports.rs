use crate::domain::model::LockState;
use crate::utils::error::{LinkError, Result};
use async_trait::async_trait;
use std::io::{self, Read, Write};
use std::time::Duration;

/// A byte stream to the actuator.
///
/// The link keeps two handles to the same device: the read loop owns one,
/// request handlers write through the other.
pub trait Transport: Read + Write + Send {
    fn try_clone_transport(&self) -> io::Result<Box<dyn Transport>>;
}

/// Opens the actuator device. Called once at startup and again on every
/// reconnect attempt.
pub trait PortOpener: Send + Sync {
    fn open(
        &self,
        device: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> std::result::Result<Box<dyn Transport>, LinkError>;
}

/// What the request dispatcher needs from the actuator link.
pub trait Actuator: Send + Sync {
    fn send_unlock(&self) -> bool;
    fn send_lock(&self) -> bool;
    fn current_state(&self) -> LockState;
}

/// Receives confirmed lock state transitions.
#[async_trait]
pub trait StateObserver: Send + Sync {
    async fn on_state_change(&self, state: LockState) -> Result<()>;
}
