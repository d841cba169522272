//! RCX packet framing.
//!
//! ```text
//! +------+------+------+----+-----+-----+----+-----+-----+------+
//! | 0x55 | 0xff | 0x00 | d0 | ~d0 | ... | dn | ~dn | sum | ~sum |
//! +------+------+------+----+-----+-----+----+-----+-----+------+
//! ```
//!
//! `sum` is the low byte of the sum of the data bytes.

use crate::error::{Malformed, PacketError};

pub const HEADER: [u8; 3] = [0x55, 0xff, 0x00];

/// Header plus checksum and its complement.
pub const OVERHEAD: usize = 5;

/// Largest packet the link will build or accept.
pub const MAX_PACKET_LEN: usize = 1024;

/// Packet size for a payload of `payload_len` bytes.
pub fn encoded_len(payload_len: usize) -> usize {
    2 * payload_len + OVERHEAD
}

/// Frame `payload` into `out`. Nothing is written when `out` is too small.
pub fn encode(payload: &[u8], out: &mut [u8]) -> Result<usize, PacketError> {
    let needed = encoded_len(payload.len());
    if needed > out.len() {
        return Err(PacketError::BufferTooSmall {
            needed,
            capacity: out.len(),
        });
    }

    write_packet(payload, out);
    Ok(needed)
}

pub fn encode_to_vec(payload: &[u8]) -> Vec<u8> {
    let mut packet = vec![0; encoded_len(payload.len())];
    write_packet(payload, &mut packet);
    packet
}

/// `out` holds at least `encoded_len(payload.len())` bytes.
fn write_packet(payload: &[u8], out: &mut [u8]) {
    out[..HEADER.len()].copy_from_slice(&HEADER);

    let mut pos = HEADER.len();
    let mut sum = 0u8;
    for &byte in payload {
        out[pos] = byte;
        out[pos + 1] = !byte;
        sum = sum.wrapping_add(byte);
        pos += 2;
    }

    out[pos] = sum;
    out[pos + 1] = !sum;
}

/// Strip the framing from `packet`, writing the payload into `out`.
pub fn decode(packet: &[u8], out: &mut [u8]) -> Result<usize, PacketError> {
    let expected = packet.len().saturating_sub(OVERHEAD) / 2;
    if expected > out.len() {
        return Err(PacketError::BufferTooSmall {
            needed: expected,
            capacity: out.len(),
        });
    }

    let header = HEADER
        .iter()
        .zip(packet)
        .take_while(|(want, got)| want == got)
        .count();
    if header != HEADER.len() {
        return Err(PacketError::NotAPacket(Malformed::Header));
    }

    let body_len = packet.len().saturating_sub(OVERHEAD);
    if packet.len() < OVERHEAD || body_len % 2 != 0 {
        return Err(PacketError::NotAPacket(Malformed::Length));
    }

    let body = &packet[HEADER.len()..HEADER.len() + body_len];
    let trailer = &packet[HEADER.len() + body_len..];

    let mut count = 0;
    let mut sum = 0u8;
    for (n, pair) in body.chunks_exact(2).enumerate() {
        if pair[1] != !pair[0] {
            return Err(PacketError::NotAPacket(Malformed::Complement {
                offset: HEADER.len() + 2 * n,
            }));
        }
        if count == out.len() {
            return Err(PacketError::BufferTooSmall {
                needed: count + 1,
                capacity: out.len(),
            });
        }
        out[count] = pair[0];
        count += 1;
        sum = sum.wrapping_add(pair[0]);
    }

    if trailer[0] != sum {
        return Err(PacketError::NotAPacket(Malformed::Checksum));
    }
    if trailer[1] != !trailer[0] {
        return Err(PacketError::NotAPacket(Malformed::ChecksumComplement));
    }

    Ok(count)
}

/// Strip the framing from `packet` into a fresh buffer.
pub fn decode_to_vec(packet: &[u8]) -> Result<Vec<u8>, PacketError> {
    let mut payload = vec![0; packet.len() / 2];
    let len = decode(packet, &mut payload)?;
    payload.truncate(len);
    Ok(payload)
}
