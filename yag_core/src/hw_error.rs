//! Maps `Box<dyn Error>` from the transport boundary to `TransportError`.
//!
//! `yag_traits::Transport` returns boxed errors; with the `hardware-errors`
//! feature the known `yag_hardware::HwError` variants are matched exactly,
//! otherwise the error text is inspected.

use crate::error::TransportError;

pub fn map_transport_error(e: &(dyn std::error::Error + 'static)) -> TransportError {
    #[cfg(feature = "hardware-errors")]
    {
        use yag_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => TransportError::Timeout,
                HwError::NotOpen => TransportError::Disconnected(hw.to_string()),
                HwError::Serial(msg) => TransportError::Disconnected(msg.clone()),
                HwError::Io(io) => TransportError::Io(io.to_string()),
            };
        }
    }

    if let Some(io) = e.downcast_ref::<std::io::Error>() {
        return match io.kind() {
            std::io::ErrorKind::TimedOut => TransportError::Timeout,
            std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::ConnectionReset => TransportError::Disconnected(io.to_string()),
            _ => TransportError::Io(io.to_string()),
        };
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        TransportError::Timeout
    } else if lower.contains("disconnect") || lower.contains("not open") {
        TransportError::Disconnected(s)
    } else {
        TransportError::Io(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_kinds_map_to_transport_errors() {
        let e = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert_eq!(map_transport_error(&e), TransportError::Timeout);
        let e = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert!(matches!(map_transport_error(&e), TransportError::Disconnected(_)));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn hw_timeout_maps_exactly() {
        let e = yag_hardware::error::HwError::Timeout;
        assert_eq!(map_transport_error(&e), TransportError::Timeout);
    }
}
