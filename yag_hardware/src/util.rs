use std::io::ErrorKind;
use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Read one reply line byte by byte until CR or LF, or until `timeout` expires.
///
/// Leading CR/LF left over from a previous reply are skipped. `read` is
/// expected to return `ErrorKind::TimedOut` (or 0 bytes) when nothing is
/// pending; those are retried until the deadline, other errors bubble up.
pub fn read_line_with_timeout(
    mut read: impl FnMut(&mut [u8]) -> std::io::Result<usize>,
    timeout: Duration,
) -> Result<String> {
    let deadline = Instant::now() + timeout;
    let mut line: Vec<u8> = Vec::with_capacity(32);
    let mut byte = [0u8; 1];
    loop {
        if Instant::now() >= deadline {
            return Err(HwError::Timeout);
        }
        match read(&mut byte) {
            Ok(1) => match byte[0] {
                b'\r' | b'\n' if line.is_empty() => continue,
                b'\r' | b'\n' => break,
                b => line.push(b),
            },
            Ok(_) => continue,
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                continue;
            }
            Err(e) => return Err(HwError::Io(e)),
        }
    }
    Ok(String::from_utf8_lossy(&line).trim().to_string())
}
