//! Command/reply exchanges with an RCX.
//!
//! A request goes out as one packet. The brick answers with a packet whose
//! first byte is the complement of the request opcode. The reply ends when the
//! transport reports a quiet window.

use crate::config::LinkConfig;
use crate::error::{LinkError, LinkResult, RecvError};
use crate::packet::{self, MAX_PACKET_LEN};
use crate::pulse::{DecoderState, Pulse, PulseCodec, BIT_PERIOD};
use crate::transport::Transport;

/// Idle appended to every burst. The driver cannot report the mark that
/// ends the last byte, so without it the final stop bit never completes.
const IDLE_TAIL: u32 = 10 * BIT_PERIOD;

pub struct RcxLink<T> {
    transport: T,
    codec: PulseCodec,
    decoder: DecoderState,
    config: LinkConfig,
}

impl<T: Transport> RcxLink<T> {
    pub fn new(transport: T, config: LinkConfig) -> Self {
        RcxLink {
            transport,
            codec: PulseCodec::new(config.timing),
            decoder: DecoderState::new(),
            config,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn open(&mut self) -> LinkResult<()> {
        log::debug!("Opening transport");
        self.transport.open()?;
        self.decoder.reset();
        Ok(())
    }

    pub fn close(&mut self) -> LinkResult<()> {
        log::debug!("Closing transport");
        self.transport.close()?;
        Ok(())
    }

    /// Drain whatever the device still holds and start from a clean frame.
    pub fn reset(&mut self) -> LinkResult<()> {
        self.transport.reset()?;
        self.decoder.reset();
        Ok(())
    }

    /// Send `request` and wait for the brick's reply.
    ///
    /// The reply payload is at most `capacity` bytes and starts with the
    /// complement of the request opcode.
    pub fn command(&mut self, request: &[u8], capacity: usize) -> LinkResult<Vec<u8>> {
        let opcode = *request.first().ok_or(LinkError::EmptyRequest)?;

        self.send(request)?;
        let reply = self.receive_packet(capacity)?;

        match reply.first() {
            Some(&echo) if echo == !opcode => {
                log::debug!("Reply to {:#04x}: {:02x?}", opcode, reply);
                Ok(reply)
            }
            Some(&echo) => {
                log::warn!("Reply opcode {:#04x} does not match {:#04x}", echo, opcode);
                Err(RecvError::Echo {
                    opcode,
                    reply: echo,
                }
                .into())
            }
            None => Err(RecvError::EmptyReply { opcode }.into()),
        }
    }

    /// Send `payload` as a packet without waiting for anything.
    pub fn send(&mut self, payload: &[u8]) -> LinkResult<()> {
        let mut buf = [0u8; MAX_PACKET_LEN];
        let len = packet::encode(payload, &mut buf).map_err(LinkError::Request)?;

        let pulses = self.codec.encode(&buf[..len]);
        log::debug!("Sending {} packet bytes as {} pulses", len, pulses.len());

        self.transport.send(&pulses)?;
        Ok(())
    }

    /// Send one byte with no packet framing.
    pub fn send_byte(&mut self, byte: u8) -> LinkResult<()> {
        log::debug!("Sending raw byte {:#04x}", byte);
        let pulses = self.codec.encode_byte(byte);
        self.transport.send(&pulses)?;
        Ok(())
    }

    /// Wait for a packet without sending anything first.
    pub fn receive(&mut self, capacity: usize) -> LinkResult<Vec<u8>> {
        let payload = self.receive_packet(capacity)?;
        if payload.is_empty() {
            return Err(LinkError::NoReply);
        }
        Ok(payload)
    }

    /// Wait for a burst and return its bytes with no packet framing.
    pub fn receive_raw(&mut self, capacity: usize) -> LinkResult<Vec<u8>> {
        let pulses = self.receive_pulses()?;
        self.decode_pulses(&pulses, capacity)
    }

    /// Collect pulses until the transport goes quiet.
    ///
    /// A non-empty burst always ends with a synthetic idle mark.
    pub fn receive_pulses(&mut self) -> LinkResult<Vec<Pulse>> {
        let capacity = self.config.receive_capacity;
        // One slot stays free for the idle tail.
        let limit = capacity.saturating_sub(1);

        let mut pulses = vec![Pulse::mark(0); capacity];
        let mut count = 0;

        loop {
            if count >= limit {
                log::warn!("Receive buffer full after {} pulses", count);
                return Err(RecvError::BufferFull(count).into());
            }

            let received = self.transport.receive(&mut pulses[count..limit])?;
            if received == 0 {
                break;
            }
            count += received;
        }

        if count == 0 {
            return Err(LinkError::NoReply);
        }

        log::debug!("Received {} pulses", count);
        pulses.truncate(count);
        pulses.push(Pulse::mark(IDLE_TAIL));
        Ok(pulses)
    }

    /// Run a burst through the frame decoder.
    ///
    /// Every pulse is consumed even after an error, but any error fails the
    /// whole burst.
    pub fn decode_pulses(&mut self, pulses: &[Pulse], capacity: usize) -> LinkResult<Vec<u8>> {
        let mut bytes = vec![0u8; capacity];
        let decoded = self
            .codec
            .decode_into(pulses, &mut self.decoder, &mut bytes)
            .map_err(RecvError::from)?;

        if let Some(err) = decoded.error {
            log::warn!("Reply decoded with errors: {}", err);
            return Err(RecvError::Pulse(err).into());
        }
        if decoded.len == 0 {
            return Err(LinkError::NoReply);
        }

        bytes.truncate(decoded.len);
        log::debug!("Decoded bytes: {:02x?}", bytes);
        Ok(bytes)
    }

    fn receive_packet(&mut self, capacity: usize) -> LinkResult<Vec<u8>> {
        // A burst cut short by a full buffer can leave a frame half done.
        self.decoder.reset();
        let raw = self.receive_raw(MAX_PACKET_LEN)?;

        let mut payload = vec![0u8; capacity];
        let len = packet::decode(&raw, &mut payload).map_err(RecvError::from)?;
        payload.truncate(len);
        Ok(payload)
    }
}
