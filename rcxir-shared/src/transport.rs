use crate::error::TransportError;
use crate::pulse::Pulse;

/// A device that sends and receives timed mark/space pulses.
pub trait Transport {
    fn open(&mut self) -> Result<(), TransportError>;

    fn close(&mut self) -> Result<(), TransportError>;

    /// Throw away anything pending until the line has been quiet for a while.
    fn reset(&mut self) -> Result<(), TransportError>;

    /// Transmit a pulse train. The first entry is the start bit space.
    fn send(&mut self, pulses: &[Pulse]) -> Result<(), TransportError>;

    /// Wait up to one quiet window for pulses and store them in `buf`.
    ///
    /// Returns how many were stored; 0 means nothing arrived in time.
    fn receive(&mut self, buf: &mut [Pulse]) -> Result<usize, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> Result<(), TransportError> {
        (**self).open()
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        (**self).reset()
    }

    fn send(&mut self, pulses: &[Pulse]) -> Result<(), TransportError> {
        (**self).send(pulses)
    }

    fn receive(&mut self, buf: &mut [Pulse]) -> Result<usize, TransportError> {
        (**self).receive(buf)
    }
}
