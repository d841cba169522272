//! Bytes to mark/space pulses and back.
//!
//! The RCX talks 2400 baud 8O1 serial over infrared. Each byte becomes an
//! eleven bit frame:
//!
//! ```text
//! bit   0      1..=8          9        10
//!       start  data, LSB first  parity   stop
//!       space  mark = 1         odd      mark
//! ```
//!
//! Consecutive bits of the same level are merged into one segment, so a frame
//! turns into at most eleven alternating segments.

use crate::config::TimingProfile;
use crate::error::PulseError;

/// Length of one bit in microseconds.
pub const BIT_PERIOD: u32 = 417;

/// Worst case segments for one byte: eleven bits plus a terminator slot.
pub const MAX_PULSES_PER_BYTE: usize = 12;

/// Longest run of equal bits a valid frame can contain.
const MAX_RUN: u32 = 10;

/// Mode2 flag for a light-on period.
pub const PULSE_BIT: u32 = 0x0100_0000;

/// Mode2 duration bits.
pub const PULSE_MASK: u32 = 0x00FF_FFFF;

/// Serial line level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Logical one, the idle level. Light off.
    Mark,
    /// Logical zero. Light on.
    Space,
}

impl Level {
    fn from_bit(bit: bool) -> Self {
        if bit {
            Level::Mark
        } else {
            Level::Space
        }
    }
}

/// One segment of constant level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    pub level: Level,
    /// Microseconds.
    pub duration: u32,
}

impl Pulse {
    pub fn mark(duration: u32) -> Self {
        Pulse {
            level: Level::Mark,
            duration,
        }
    }

    pub fn space(duration: u32) -> Self {
        Pulse {
            level: Level::Space,
            duration,
        }
    }

    /// Parse a word read from a LIRC mode2 device.
    pub fn from_mode2(word: u32) -> Self {
        let duration = word & PULSE_MASK;
        if word & PULSE_BIT != 0 {
            Pulse::space(duration)
        } else {
            Pulse::mark(duration)
        }
    }

    pub fn to_mode2(self) -> u32 {
        let duration = self.duration & PULSE_MASK;
        match self.level {
            Level::Space => duration | PULSE_BIT,
            Level::Mark => duration,
        }
    }

    /// Number of bit periods, rounded to the nearest integer.
    pub fn bits(self) -> u32 {
        let period = u64::from(BIT_PERIOD);
        ((u64::from(self.duration) + period / 2) / period) as u32
    }
}

/// What a single [`PulseCodec::decode`] call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    NoByte,
    Byte(u8),
    Error(PulseError),
}

/// Position inside the frame currently being received.
///
/// A reply can be split over several reads, so this lives as long as the
/// pulse stream does. One stream, one state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderState {
    /// 0 waits for a start bit, 1..=8 data, 9 parity, 10 stop.
    position: u8,
    parity: u8,
    data: u8,
}

impl DecoderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True between frames.
    pub fn is_idle(&self) -> bool {
        self.position == 0
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Result of feeding a run of pulses through [`PulseCodec::decode_into`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// Bytes written to the output buffer.
    pub len: usize,
    /// Worst error seen while decoding, if any.
    pub error: Option<PulseError>,
}

/// Writes one frame into a buffer of at least [`MAX_PULSES_PER_BYTE`].
struct FrameWriter<'a> {
    timing: TimingProfile,
    out: &'a mut [Pulse],
    len: usize,
}

impl FrameWriter<'_> {
    fn push(&mut self, level: Level) {
        if self.len > 0 && self.out[self.len - 1].level == level {
            self.out[self.len - 1].duration += BIT_PERIOD;
        } else {
            self.out[self.len] = Pulse {
                level,
                duration: self.timing.segment_start(level),
            };
            self.len += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PulseCodec {
    timing: TimingProfile,
}

impl PulseCodec {
    pub fn new(timing: TimingProfile) -> Self {
        PulseCodec { timing }
    }

    /// Frame a single byte.
    pub fn encode_byte(&self, byte: u8) -> heapless::Vec<Pulse, MAX_PULSES_PER_BYTE> {
        let mut buf = [Pulse::mark(0); MAX_PULSES_PER_BYTE];
        let len = self.write_frame(byte, &mut buf);
        buf[..len].iter().copied().collect()
    }

    /// `out` holds at least [`MAX_PULSES_PER_BYTE`] entries.
    fn write_frame(&self, byte: u8, out: &mut [Pulse]) -> usize {
        let mut frame = FrameWriter {
            timing: self.timing,
            out,
            len: 0,
        };

        frame.push(Level::Space);

        let mut ones = 0;
        for n in 0..8 {
            let bit = (byte >> n) & 1 == 1;
            if bit {
                ones += 1;
            }
            frame.push(Level::from_bit(bit));
        }

        // Odd parity
        frame.push(Level::from_bit(ones % 2 == 0));
        frame.push(Level::Mark);

        frame.len
    }

    /// Frame a single byte into `out`, returning the number of segments.
    pub fn encode_byte_into(&self, byte: u8, out: &mut [Pulse]) -> Result<usize, PulseError> {
        if out.len() < MAX_PULSES_PER_BYTE {
            return Err(PulseError::BufferTooSmall {
                needed: MAX_PULSES_PER_BYTE,
                capacity: out.len(),
            });
        }

        Ok(self.write_frame(byte, out))
    }

    /// Frame every byte into `out`.
    ///
    /// Room for the worst case is checked before each byte, so a buffer that
    /// runs out fails even if the actual frame would have fit.
    pub fn encode_into(&self, bytes: &[u8], out: &mut [Pulse]) -> Result<usize, PulseError> {
        let mut count = 0;

        for &byte in bytes {
            if count + MAX_PULSES_PER_BYTE > out.len() {
                return Err(PulseError::BufferTooSmall {
                    needed: count + MAX_PULSES_PER_BYTE,
                    capacity: out.len(),
                });
            }
            count += self.encode_byte_into(byte, &mut out[count..])?;
        }

        Ok(count)
    }

    /// Frame every byte into one continuous pulse train.
    pub fn encode(&self, bytes: &[u8]) -> Vec<Pulse> {
        let mut pulses = Vec::with_capacity(bytes.len() * MAX_PULSES_PER_BYTE);
        for &byte in bytes {
            pulses.extend_from_slice(&self.encode_byte(byte));
        }
        pulses
    }

    /// Feed one received pulse into the frame state machine.
    pub fn decode(&self, pulse: Pulse, state: &mut DecoderState) -> DecodeOutcome {
        let is_mark = pulse.level == Level::Mark;
        let mut bits = pulse.bits();
        let mut error: Option<PulseError> = None;
        let mut byte = None;

        if bits > MAX_RUN {
            if is_mark {
                // Data, parity and stop of the previous byte, then idle.
                bits = MAX_RUN;
            } else {
                log::debug!("Break, {} us of space", pulse.duration);
                error = Some(PulseError::Break);
                state.reset();
                // The tail of the space may be the next start bit.
                bits = 1;
            }
        }

        let mut flag = |err: PulseError| {
            error = Some(match error {
                Some(prev) => prev.worst(err),
                None => err,
            });
        };

        for _ in 0..bits {
            match state.position {
                0 => {
                    if !is_mark {
                        state.position = 1;
                        state.data = 0;
                        state.parity = 0;
                    }
                }
                1..=8 => {
                    state.position += 1;
                    state.data >>= 1;
                    if is_mark {
                        state.data |= 0x80;
                        state.parity += 1;
                    }
                }
                9 => {
                    state.position += 1;
                    byte = Some(state.data);
                    if is_mark {
                        state.parity += 1;
                    }
                    if state.parity % 2 == 0 {
                        log::debug!("Parity error in {:#04x}", state.data);
                        flag(PulseError::Parity { byte: state.data });
                    }
                }
                _ => {
                    if !is_mark {
                        log::debug!("Framing error");
                        flag(PulseError::Framing);
                    }
                    state.position = 0;
                }
            }
        }

        match (error, byte) {
            (Some(err), _) => DecodeOutcome::Error(err),
            (None, Some(byte)) => DecodeOutcome::Byte(byte),
            (None, None) => DecodeOutcome::NoByte,
        }
    }

    /// Feed a run of pulses, collecting bytes into `out`.
    ///
    /// Frame errors do not stop the run; the worst one is kept in the result.
    /// Only running out of output space aborts.
    pub fn decode_into(
        &self,
        pulses: &[Pulse],
        state: &mut DecoderState,
        out: &mut [u8],
    ) -> Result<Decoded, PulseError> {
        let mut decoded = Decoded {
            len: 0,
            error: None,
        };

        for &pulse in pulses {
            match self.decode(pulse, state) {
                DecodeOutcome::NoByte => {}
                DecodeOutcome::Byte(byte) => {
                    if decoded.len == out.len() {
                        return Err(PulseError::BufferTooSmall {
                            needed: decoded.len + 1,
                            capacity: out.len(),
                        });
                    }
                    out[decoded.len] = byte;
                    decoded.len += 1;
                }
                DecodeOutcome::Error(err) => {
                    decoded.error = Some(match decoded.error {
                        Some(prev) => prev.worst(err),
                        None => err,
                    });
                }
            }
        }

        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &PulseCodec, pulses: &[Pulse]) -> (Vec<u8>, Option<PulseError>) {
        let mut state = DecoderState::new();
        let mut out = [0u8; 64];
        let decoded = codec.decode_into(pulses, &mut state, &mut out).unwrap();
        (out[..decoded.len].to_vec(), decoded.error)
    }

    #[test]
    fn test_encode_0x41() {
        let codec = PulseCodec::default();
        let pulses = codec.encode_byte(0x41);

        let expected = [
            Pulse::space(BIT_PERIOD),
            Pulse::mark(BIT_PERIOD),
            Pulse::space(5 * BIT_PERIOD),
            Pulse::mark(BIT_PERIOD),
            Pulse::space(BIT_PERIOD),
            Pulse::mark(2 * BIT_PERIOD),
        ];
        assert_eq!(&pulses[..], &expected[..]);
    }

    #[test]
    fn test_levels_alternate() {
        let codec = PulseCodec::new(TimingProfile::Pc);
        let pulses = codec.encode(&[0x00, 0xff, 0x55, 0xaa, 0x41]);

        assert_eq!(pulses[0].level, Level::Space);
        for pair in pulses.windows(2) {
            assert_ne!(pair[0].level, pair[1].level);
        }
    }

    #[test]
    fn test_every_byte_round_trips() {
        for timing in [TimingProfile::Exact, TimingProfile::Pc, TimingProfile::Ipaq].iter() {
            let codec = PulseCodec::new(*timing);
            for byte in 0..=255u8 {
                let pulses = codec.encode_byte(byte);
                let mut state = DecoderState::new();

                let mut got = Vec::new();
                for &pulse in pulses.iter() {
                    match codec.decode(pulse, &mut state) {
                        DecodeOutcome::Byte(b) => got.push(b),
                        DecodeOutcome::NoByte => {}
                        DecodeOutcome::Error(err) => panic!("{:?}: {:?} on {:#04x}", timing, err, byte),
                    }
                }

                assert_eq!(got, vec![byte], "{:?}", timing);
                assert!(state.is_idle());
            }
        }
    }

    #[test]
    fn test_stream_split_across_calls() {
        let codec = PulseCodec::new(TimingProfile::Pc);
        let data = b"\x55\xff\x00\x10\xef\x10\xef";
        let pulses = codec.encode(data);

        let mut state = DecoderState::new();
        let mut out = [0u8; 16];
        let mut len = 0;
        for chunk in pulses.chunks(5) {
            let decoded = codec.decode_into(chunk, &mut state, &mut out[len..]).unwrap();
            assert_eq!(decoded.error, None);
            len += decoded.len;
        }

        assert_eq!(&out[..len], &data[..]);
    }

    #[test]
    fn test_missing_trailing_mark() {
        let codec = PulseCodec::default();
        let mut pulses = codec.encode(&[0x41]);
        // The receiver never sees the final mark, only the idle that follows.
        pulses.pop();
        pulses.push(Pulse::mark(10 * BIT_PERIOD));

        assert_eq!(decode_all(&codec, &pulses), (vec![0x41], None));
    }

    #[test]
    fn test_break_resynchronizes() {
        let codec = PulseCodec::default();
        let mut state = DecoderState::new();

        // Half a frame, then a very long space.
        assert_eq!(codec.decode(Pulse::space(BIT_PERIOD), &mut state), DecodeOutcome::NoByte);
        assert_eq!(codec.decode(Pulse::mark(3 * BIT_PERIOD), &mut state), DecodeOutcome::NoByte);
        assert_eq!(
            codec.decode(Pulse::space(30 * BIT_PERIOD), &mut state),
            DecodeOutcome::Error(PulseError::Break)
        );
        assert!(!state.is_idle());

        // The break counted as a start bit, the rest of 0x41 follows.
        let frame = codec.encode_byte(0x41);
        let rest = &frame[1..];
        let (bytes, error) = {
            let mut out = [0u8; 4];
            let decoded = codec.decode_into(rest, &mut state, &mut out).unwrap();
            (out[..decoded.len].to_vec(), decoded.error)
        };
        assert_eq!(bytes, vec![0x41]);
        assert_eq!(error, None);
    }

    #[test]
    fn test_long_mark_is_clamped() {
        let codec = PulseCodec::default();
        let mut state = DecoderState::new();

        assert_eq!(codec.decode(Pulse::mark(100 * BIT_PERIOD), &mut state), DecodeOutcome::NoByte);
        assert!(state.is_idle());
    }

    #[test]
    fn test_parity_error_reports_byte() {
        let codec = PulseCodec::default();
        // 0x41 with the parity bit flipped to a space: S1 M1 S5 M1 S2 M1
        let pulses = [
            Pulse::space(BIT_PERIOD),
            Pulse::mark(BIT_PERIOD),
            Pulse::space(5 * BIT_PERIOD),
            Pulse::mark(BIT_PERIOD),
            Pulse::space(2 * BIT_PERIOD),
            Pulse::mark(BIT_PERIOD),
        ];

        let mut state = DecoderState::new();
        let outcomes: Vec<_> = pulses.iter().map(|p| codec.decode(*p, &mut state)).collect();
        assert_eq!(outcomes[4], DecodeOutcome::Error(PulseError::Parity { byte: 0x41 }));
        assert!(state.is_idle());
    }

    #[test]
    fn test_framing_error() {
        let codec = PulseCodec::default();
        // 0xff, then a space where the stop bit belongs.
        let pulses = [Pulse::space(BIT_PERIOD), Pulse::mark(9 * BIT_PERIOD), Pulse::space(BIT_PERIOD)];

        let (bytes, error) = decode_all(&codec, &pulses);
        assert_eq!(bytes, vec![0xff]);
        assert_eq!(error, Some(PulseError::Framing));
    }

    #[test]
    fn test_worst_error_in_one_pulse() {
        let codec = PulseCodec::default();
        let mut state = DecoderState::new();

        // Eight ones of data, leaving parity and stop.
        codec.decode(Pulse::space(BIT_PERIOD), &mut state);
        codec.decode(Pulse::mark(8 * BIT_PERIOD), &mut state);

        // Space parity keeps an even count and the stop is a space too.
        assert_eq!(
            codec.decode(Pulse::space(2 * BIT_PERIOD), &mut state),
            DecodeOutcome::Error(PulseError::Framing)
        );
    }

    #[test]
    fn test_encode_into_capacity() {
        let codec = PulseCodec::default();

        let mut small = [Pulse::mark(0); MAX_PULSES_PER_BYTE - 1];
        assert_eq!(
            codec.encode_byte_into(0x41, &mut small),
            Err(PulseError::BufferTooSmall {
                needed: MAX_PULSES_PER_BYTE,
                capacity: MAX_PULSES_PER_BYTE - 1
            })
        );

        let mut buf = [Pulse::mark(0); MAX_PULSES_PER_BYTE + 5];
        assert!(codec.encode_into(&[0x41, 0x41], &mut buf).is_err());

        let mut buf = [Pulse::mark(0); 2 * MAX_PULSES_PER_BYTE];
        assert_eq!(codec.encode_into(&[0x41, 0x41], &mut buf), Ok(12));
        assert_eq!(&buf[..12], &codec.encode(&[0x41, 0x41])[..]);
    }

    #[test]
    fn test_decode_into_capacity() {
        let codec = PulseCodec::default();
        let pulses = codec.encode(&[1, 2, 3]);
        let mut state = DecoderState::new();
        let mut out = [0u8; 2];

        assert_eq!(
            codec.decode_into(&pulses, &mut state, &mut out),
            Err(PulseError::BufferTooSmall { needed: 3, capacity: 2 })
        );
    }

    #[test]
    fn test_mode2_words() {
        assert_eq!(Pulse::from_mode2(0x0100_01a1), Pulse::space(417));
        assert_eq!(Pulse::from_mode2(0x0000_0341), Pulse::mark(833));
        assert_eq!(Pulse::space(417).to_mode2(), 0x0100_01a1);
        assert_eq!(Pulse::mark(4170).to_mode2(), 4170);
    }

    #[test]
    fn test_longest_pulses() {
        let codec = PulseCodec::default();
        let mut state = DecoderState::new();

        assert_eq!(Pulse::mark(u32::MAX).bits(), u32::MAX / BIT_PERIOD + 1);
        assert_eq!(codec.decode(Pulse::mark(u32::MAX), &mut state), DecodeOutcome::NoByte);
        assert!(state.is_idle());
        assert_eq!(
            codec.decode(Pulse::space(u32::MAX), &mut state),
            DecodeOutcome::Error(PulseError::Break)
        );
    }

    #[test]
    fn test_bits_rounding() {
        assert_eq!(Pulse::mark(208).bits(), 0);
        assert_eq!(Pulse::mark(209).bits(), 1);
        assert_eq!(Pulse::space(562).bits(), 1);
        assert_eq!(Pulse::space(5 * 417 + 145).bits(), 5);
    }
}
