use crate::domain::ports::{PortOpener, Transport};
use crate::utils::error::LinkError;
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

/// A real serial device.
pub struct SerialDevice {
    port: Box<dyn SerialPort>,
}

impl Read for SerialDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Transport for SerialDevice {
    fn try_clone_transport(&self) -> io::Result<Box<dyn Transport>> {
        let port = self.port.try_clone().map_err(io::Error::from)?;
        Ok(Box::new(SerialDevice { port }))
    }
}

/// Opens devices through the `serialport` crate, 8N1 without flow control.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortOpener;

impl PortOpener for SerialPortOpener {
    fn open(
        &self,
        device: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn Transport>, LinkError> {
        let port = serialport::new(device, baud_rate)
            .timeout(read_timeout)
            .open()
            .map_err(|e| LinkError::Unavailable {
                device: device.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(SerialDevice { port }))
    }
}
