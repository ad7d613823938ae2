use std::io::{Read, Write};
use std::time::Duration;

use tracing::{debug, trace, warn};
use yag_traits::Transport;

use crate::error::{HwError, Result};
use crate::util::read_line_with_timeout;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const DATABITS: serialport::DataBits = serialport::DataBits::Eight;
const STOPBITS: serialport::StopBits = serialport::StopBits::One;
const PARITY: serialport::Parity = serialport::Parity::None;
const TERMINATOR: &str = "\r";
// Short per-read timeout; the reply deadline is enforced by read_line_with_timeout.
const POLL_READ: Duration = Duration::from_millis(20);

/// RS-232 link to a Big Sky laser head.
pub struct SerialTransport {
    baud_rate: u32,
    reply_timeout: Duration,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialTransport {
    pub fn new(baud_rate: u32, reply_timeout: Duration) -> Self {
        Self {
            baud_rate,
            reply_timeout,
            port: None,
        }
    }

    fn exchange(&mut self, command: &str) -> Result<String> {
        let port = self.port.as_mut().ok_or(HwError::NotOpen)?;
        // Drop stale bytes from an earlier reply that arrived after its deadline.
        port.clear(serialport::ClearBuffer::Input)
            .map_err(|e| HwError::Serial(e.to_string()))?;
        port.write_all(format!("{command}{TERMINATOR}").as_bytes())?;
        port.flush()?;
        let reply = read_line_with_timeout(|buf| port.read(buf), self.reply_timeout)?;
        trace!(command, reply = %reply, "serial exchange");
        Ok(reply)
    }
}

impl Transport for SerialTransport {
    fn open(&mut self, port: &str) -> std::result::Result<(), BoxError> {
        let handle = serialport::new(port, self.baud_rate)
            .data_bits(DATABITS)
            .stop_bits(STOPBITS)
            .parity(PARITY)
            .timeout(POLL_READ)
            .open()
            .map_err(|e| HwError::Serial(format!("open {port} at {} baud: {e}", self.baud_rate)))?;
        debug!(port, baud_rate = self.baud_rate, "serial port opened");
        self.port = Some(handle);
        Ok(())
    }

    fn close(&mut self) -> std::result::Result<(), BoxError> {
        if let Some(port) = self.port.take() {
            warn_on_clear_failure(port.clear(serialport::ClearBuffer::All));
            debug!("serial port closed");
        }
        Ok(())
    }

    fn send(&mut self, command: &str) -> std::result::Result<String, BoxError> {
        self.exchange(command).map_err(Into::into)
    }
}

/// Buffer flushing on close may fail once the device is gone; log and carry on.
fn warn_on_clear_failure(result: serialport::Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "clearing serial buffers on close failed");
            false
        }
    }
}
