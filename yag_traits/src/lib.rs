pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Half-duplex command channel to the laser head.
///
/// One request is in flight at a time: `send` writes a single command and
/// blocks until the matching reply line arrives or the transport's own
/// timeout expires. Framing (terminators, echo stripping) belongs to the
/// implementation; the command and the reply carry none.
pub trait Transport {
    fn open(&mut self, port: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn send(&mut self, command: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self, port: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).open(port)
    }
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).close()
    }
    fn send(&mut self, command: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        (**self).send(command)
    }
}
