//! Serial link to the actuator.
//!
//! [`LinkManager`] owns the device for the lifetime of the process. A
//! dedicated thread reads state lines pushed by the firmware and re-opens the
//! device whenever a read or a write fails. Request handlers only ever see
//! [`LinkManager::send_unlock`], [`LinkManager::send_lock`] and
//! [`LinkManager::current_state`].

use crate::core::framing::LineFramer;
use crate::domain::model::{Command, LockState};
use crate::domain::ports::{Actuator, PortOpener, Transport};
use crate::utils::error::LinkError;
use chrono::{DateTime, Utc};
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};

const READ_CHUNK: usize = 128;
const SLEEP_SLICE: Duration = Duration::from_millis(50);
const TRANSITION_BACKLOG: usize = 64;

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub device: String,
    pub baud_rate: u32,
    /// Fixed delay before every reconnect attempt.
    pub reconnect_interval: Duration,
    pub read_timeout: Duration,
    /// Reported until the first state line has been read.
    pub initial_state: LockState,
}

impl LinkConfig {
    pub fn new(device: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            device: device.into(),
            baud_rate,
            reconnect_interval: Duration::from_secs(5),
            read_timeout: Duration::from_secs(1),
            initial_state: LockState::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub reconnect_attempts: u64,
    pub reconnects: u64,
    pub last_read_at: Option<DateTime<Utc>>,
}

struct Shared {
    config: LinkConfig,
    opener: Arc<dyn PortOpener>,
    /// Write handle; `None` while a reconnect is in flight.
    writer: Mutex<Option<Box<dyn Transport>>>,
    state: watch::Sender<LockState>,
    /// Every confirmed change, unlike `state` which only keeps the latest.
    transitions: broadcast::Sender<LockState>,
    /// Set by the first reader or writer that sees a fault, cleared once the
    /// device has been re-opened. Only the read loop reconnects.
    faulted: AtomicBool,
    stopping: AtomicBool,
    reconnect_attempts: AtomicU64,
    reconnects: AtomicU64,
    last_read_at: Mutex<Option<DateTime<Utc>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn request_reconnect(&self) {
        if !self.faulted.swap(true, Ordering::AcqRel) {
            self.state.send_replace(LockState::Error);
            tracing::warn!(device = %self.config.device, "Serial link fault, reconnect scheduled");
        }
    }

    fn record_line(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        tracing::debug!(data = line, "Got serial data");

        let state = LockState::from_report(line);
        let mut accepted = false;
        let mut previous = state;
        // Checked under the watch lock: a pending reconnect keeps the state at ERROR.
        self.state.send_if_modified(|current| {
            if self.faulted.load(Ordering::Acquire) {
                return false;
            }
            accepted = true;
            previous = std::mem::replace(current, state);
            previous != state
        });
        if !accepted {
            return;
        }

        *lock(&self.last_read_at) = Some(Utc::now());
        if previous != state {
            tracing::info!(%previous, current = %state, "Lock state changed");
            // No receivers is fine.
            let _ = self.transitions.send(state);
        }
    }

    fn sleep_unless_stopping(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.stopping.load(Ordering::Acquire) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }

    fn open_pair(&self) -> Result<(Box<dyn Transport>, Box<dyn Transport>), LinkError> {
        let port = self.opener.open(
            &self.config.device,
            self.config.baud_rate,
            self.config.read_timeout,
        )?;
        let reader = port.try_clone_transport()?;
        Ok((port, reader))
    }

    /// Close both handles and re-open the device until that succeeds. Returns
    /// the new read handle, or `None` when the link is being shut down.
    ///
    /// The device is opened exclusively, so no handle may survive into the
    /// retry loop.
    fn reconnect(&self, stale: Box<dyn Transport>) -> Option<Box<dyn Transport>> {
        self.state.send_replace(LockState::Error);
        drop(stale);
        drop(lock(&self.writer).take());
        tracing::info!(device = %self.config.device, "Closed serial link, reconnecting");

        loop {
            if !self.sleep_unless_stopping(self.config.reconnect_interval) {
                return None;
            }

            let attempt = self.reconnect_attempts.fetch_add(1, Ordering::Relaxed) + 1;
            match self.open_pair() {
                Ok((port, reader)) => {
                    let mut writer = lock(&self.writer);
                    *writer = Some(port);
                    self.faulted.store(false, Ordering::Release);
                    drop(writer);

                    let total = self.reconnects.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::info!(
                        device = %self.config.device,
                        attempt,
                        reconnects = total,
                        "Reconnected to sphincter"
                    );
                    return Some(reader);
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        "Reconnect failed: {}, retrying in {:?}",
                        e,
                        self.config.reconnect_interval
                    );
                }
            }
        }
    }
}

fn read_loop(shared: Arc<Shared>, mut reader: Box<dyn Transport>) {
    let mut framer = LineFramer::new();
    let mut buf = [0u8; READ_CHUNK];

    while !shared.stopping.load(Ordering::Acquire) {
        if shared.faulted.load(Ordering::Acquire) {
            reader = match shared.reconnect(reader) {
                Some(fresh) => fresh,
                None => break,
            };
            framer.reset();
            continue;
        }

        match reader.read(&mut buf) {
            Ok(0) => {
                tracing::warn!("Serial device closed the stream");
                shared.request_reconnect();
            }
            Ok(n) => {
                for line in framer.push(&buf[..n]) {
                    shared.record_line(&line);
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                tracing::warn!("Serial read failed: {}", e);
                shared.request_reconnect();
            }
        }
    }

    tracing::debug!("Serial read loop stopped");
}

/// Owner of the single serial connection to the actuator.
pub struct LinkManager {
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl LinkManager {
    /// Open the device and start the read loop.
    ///
    /// Fails with [`LinkError::Unavailable`] when the device cannot be opened;
    /// the daemon treats that as fatal.
    pub fn open(config: LinkConfig, opener: Arc<dyn PortOpener>) -> Result<Self, LinkError> {
        let (state, _) = watch::channel(config.initial_state);
        let (transitions, _) = broadcast::channel(TRANSITION_BACKLOG);
        let shared = Arc::new(Shared {
            config,
            opener,
            writer: Mutex::new(None),
            state,
            transitions,
            faulted: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            reconnect_attempts: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            last_read_at: Mutex::new(None),
        });

        let (port, reader) = shared.open_pair()?;
        *lock(&shared.writer) = Some(port);
        tracing::info!(
            device = %shared.config.device,
            baud = shared.config.baud_rate,
            "Connected to sphincter"
        );

        let loop_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("sphincter-link".to_string())
            .spawn(move || read_loop(loop_shared, reader))?;

        Ok(Self {
            shared,
            reader: Mutex::new(Some(handle)),
        })
    }

    fn send(&self, command: Command) -> bool {
        let Some(byte) = command.wire_byte() else {
            return false;
        };

        let mut writer = lock(&self.shared.writer);
        let result = match writer.as_mut() {
            Some(port) => port
                .write_all(&[byte])
                .and_then(|_| port.flush())
                .map_err(LinkError::from),
            None => Err(LinkError::NotConnected),
        };

        match result {
            Ok(()) => {
                tracing::info!(command = ?command, "Sent serial command '{}'", byte as char);
                true
            }
            Err(e) => {
                // Still holding the writer: the fault belongs to the current handle.
                self.shared.request_reconnect();
                drop(writer);
                tracing::warn!(command = ?command, "Failed to send serial command: {}", e);
                false
            }
        }
    }

    pub fn send_unlock(&self) -> bool {
        self.send(Command::Unlock)
    }

    pub fn send_lock(&self) -> bool {
        self.send(Command::Lock)
    }

    pub fn current_state(&self) -> LockState {
        *self.shared.state.borrow()
    }

    /// Latest state; intermediate values may be skipped.
    pub fn subscribe(&self) -> watch::Receiver<LockState> {
        self.shared.state.subscribe()
    }

    /// Confirmed LOCKED/UNLOCKED changes in order, for the state hook.
    pub fn transitions(&self) -> broadcast::Receiver<LockState> {
        self.shared.transitions.subscribe()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.shared.faulted.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> LinkStats {
        LinkStats {
            reconnect_attempts: self.shared.reconnect_attempts.load(Ordering::Relaxed),
            reconnects: self.shared.reconnects.load(Ordering::Relaxed),
            last_read_at: *lock(&self.shared.last_read_at),
        }
    }

    pub fn device(&self) -> &str {
        &self.shared.config.device
    }

    /// Stop the read loop and close the device.
    pub fn shutdown(&self) {
        self.shared.stopping.store(true, Ordering::Release);
        if let Some(handle) = lock(&self.reader).take() {
            if handle.join().is_err() {
                tracing::error!("Serial read loop panicked");
            }
        }
        drop(lock(&self.shared.writer).take());
    }
}

impl Drop for LinkManager {
    fn drop(&mut self) {
        self.shared.stopping.store(true, Ordering::Release);
    }
}

impl Actuator for LinkManager {
    fn send_unlock(&self) -> bool {
        LinkManager::send_unlock(self)
    }

    fn send_lock(&self) -> bool {
        LinkManager::send_lock(self)
    }

    fn current_state(&self) -> LockState {
        LinkManager::current_state(self)
    }
}
