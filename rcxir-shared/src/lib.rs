//! Talk to a LEGO RCX over an infrared link that only knows mark and space.
//!
//! Three layers, bottom up:
//!
//! - [`pulse`]: bytes as 2400 baud 8O1 serial frames of timed pulses.
//! - [`packet`]: payloads framed with a header, complements and a checksum.
//! - [`link`]: command/reply exchanges over any [`Transport`].
//!
//! With the `lirc` feature, [`lirc::LircDevice`] provides a transport on a
//! LIRC mode2 character device.

pub mod config;
pub mod error;
pub mod link;
pub mod packet;
pub mod pulse;
pub mod transport;

#[cfg(feature = "lirc")]
pub mod lirc;

pub use config::{LinkConfig, TimingProfile};
pub use error::{LinkError, LinkResult, Malformed, PacketError, PulseError, RecvError, TransportError};
pub use link::RcxLink;
pub use pulse::{DecodeOutcome, DecoderState, Level, Pulse, PulseCodec};
pub use transport::Transport;
