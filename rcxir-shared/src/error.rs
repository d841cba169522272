//! Error types for the pulse, packet, transport and link layers.

use std::io;

use thiserror::Error;

/// Errors raised while turning bytes into pulses and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PulseError {
    /// The output buffer cannot take the worst case for the next byte.
    #[error("pulse buffer too small: need {needed}, have {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    /// Odd parity was violated. The byte is still reported.
    #[error("parity error in byte {byte:#04x}")]
    Parity { byte: u8 },

    /// A space where the stop bit should be.
    #[error("framing error, no stop bit")]
    Framing,

    /// More than ten bit periods of space in a row.
    #[error("break detected")]
    Break,
}

impl PulseError {
    fn severity(&self) -> u8 {
        match self {
            PulseError::Parity { .. } => 0,
            PulseError::Framing => 1,
            PulseError::Break => 2,
            PulseError::BufferTooSmall { .. } => 3,
        }
    }

    /// Keep whichever of the two errors is more severe.
    pub fn worst(self, other: PulseError) -> PulseError {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

/// Why a byte sequence was rejected as an RCX packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Malformed {
    #[error("header missing")]
    Header,
    #[error("length does not fit the packet layout")]
    Length,
    #[error("complement mismatch at offset {offset}")]
    Complement { offset: usize },
    #[error("checksum mismatch")]
    Checksum,
    #[error("checksum complement mismatch")]
    ChecksumComplement,
}

/// Errors from the packet layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("packet buffer too small: need {needed}, have {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    #[error("not an RCX packet: {0}")]
    NotAPacket(Malformed),
}

/// Errors reported by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("device is not open")]
    NotOpen,
    #[error("device is already open")]
    AlreadyOpen,
    #[error("device not found")]
    NotFound,
    #[error("device is read-only")]
    ReadOnly,
    #[error("device does not support mode2 pulses")]
    NotSupported,
    #[error("device error: {0}")]
    Device(#[from] io::Error),
}

/// Details of a reply that arrived but could not be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecvError {
    #[error("receive buffer full after {0} pulses")]
    BufferFull(usize),

    #[error(transparent)]
    Pulse(#[from] PulseError),

    #[error(transparent)]
    Packet(#[from] PacketError),

    #[error("reply to {opcode:#04x} is empty")]
    EmptyReply { opcode: u8 },

    #[error("reply opcode {reply:#04x} does not echo {opcode:#04x}")]
    Echo { opcode: u8, reply: u8 },
}

/// Errors from a command/reply exchange.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("request is empty")]
    EmptyRequest,

    #[error("request does not fit in a packet: {0}")]
    Request(PacketError),

    #[error("no reply received")]
    NoReply,

    #[error("reply received with errors: {0}")]
    Recv(#[from] RecvError),
}

/// Result type alias for link operations.
pub type LinkResult<T> = Result<T, LinkError>;
