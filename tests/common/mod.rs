#![allow(dead_code)]

use sphincterd::domain::ports::{PortOpener, Transport};
use sphincterd::{LinkConfig, LinkError, LockState};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// In-memory stand-in for the actuator. Every opened handle shares the same
/// buffers, like two file descriptors on one tty. Like `serialport`, the
/// device is opened exclusively: `open` fails while any handle (or clone of
/// one) is still alive.
#[derive(Clone, Default)]
pub struct MockDevice {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    incoming: Mutex<VecDeque<u8>>,
    written: Mutex<Vec<u8>>,
    unplugged: AtomicBool,
    fail_writes: AtomicBool,
    opens: AtomicUsize,
    live_handles: AtomicUsize,
    busy_rejections: AtomicUsize,
    before_read: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes the firmware "prints".
    pub fn emit(&self, line: &str) {
        self.inner.incoming.lock().unwrap().extend(line.bytes());
    }

    pub fn written(&self) -> Vec<u8> {
        self.inner.written.lock().unwrap().clone()
    }

    pub fn opens(&self) -> usize {
        self.inner.opens.load(Ordering::SeqCst)
    }

    /// Handles currently open, clones included.
    pub fn live_handles(&self) -> usize {
        self.inner.live_handles.load(Ordering::SeqCst)
    }

    /// Opens refused because an earlier handle was never closed.
    pub fn busy_rejections(&self) -> usize {
        self.inner.busy_rejections.load(Ordering::SeqCst)
    }

    /// Bytes emitted but not yet read by the link.
    pub fn pending_input(&self) -> usize {
        self.inner.incoming.lock().unwrap().len()
    }

    /// Run `action` on the reading thread right before the next chunk of
    /// queued input is handed out.
    pub fn before_next_read(&self, action: impl FnOnce() + Send + 'static) {
        *self.inner.before_read.lock().unwrap() = Some(Box::new(action));
    }

    /// Reads and writes fail and the device cannot be opened.
    pub fn unplug(&self) {
        self.inner.unplugged.store(true, Ordering::SeqCst);
    }

    pub fn plug_in(&self) {
        self.inner.incoming.lock().unwrap().clear();
        self.inner.unplugged.store(false, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn opener(&self) -> Arc<dyn PortOpener> {
        Arc::new(self.clone())
    }
}

impl PortOpener for MockDevice {
    fn open(
        &self,
        device: &str,
        _baud_rate: u32,
        _read_timeout: Duration,
    ) -> Result<Box<dyn Transport>, LinkError> {
        if self.inner.unplugged.load(Ordering::SeqCst) {
            return Err(LinkError::Unavailable {
                device: device.to_string(),
                reason: "No such file or directory".to_string(),
            });
        }
        if self.inner.live_handles.load(Ordering::SeqCst) > 0 {
            self.inner.busy_rejections.fetch_add(1, Ordering::SeqCst);
            return Err(LinkError::Unavailable {
                device: device.to_string(),
                reason: "Device or resource busy".to_string(),
            });
        }
        self.inner.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockPort::attach(self.clone())))
    }
}

struct MockPort {
    device: MockDevice,
}

impl MockPort {
    fn attach(device: MockDevice) -> Self {
        device.inner.live_handles.fetch_add(1, Ordering::SeqCst);
        Self { device }
    }
}

impl Drop for MockPort {
    fn drop(&mut self) {
        self.device.inner.live_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let inner = &self.device.inner;
        if inner.unplugged.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }

        if inner.incoming.lock().unwrap().is_empty() {
            thread::sleep(Duration::from_millis(5));
            return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
        }

        let action = inner.before_read.lock().unwrap().take();
        if let Some(action) = action {
            action();
        }

        let mut incoming = inner.incoming.lock().unwrap();
        let n = buf.len().min(incoming.len());
        for slot in buf.iter_mut().take(n) {
            *slot = incoming.pop_front().unwrap();
        }
        Ok(n)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let inner = &self.device.inner;
        if inner.unplugged.load(Ordering::SeqCst) || inner.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "write failed"));
        }
        inner.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MockPort {
    fn try_clone_transport(&self) -> io::Result<Box<dyn Transport>> {
        Ok(Box::new(MockPort::attach(self.device.clone())))
    }
}

pub fn fast_link_config(initial_state: LockState) -> LinkConfig {
    LinkConfig {
        device: "/dev/mock-sphincter".to_string(),
        baud_rate: 9600,
        reconnect_interval: Duration::from_millis(20),
        read_timeout: Duration::from_millis(5),
        initial_state,
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
