use std::path::Path;

use rcxir_shared::packet;
use rcxir_shared::pulse::BIT_PERIOD;
use rcxir_shared::{DecodeOutcome, DecoderState, Pulse, PulseCodec, PulseError};

use crate::command::format_hex;
use crate::vcdutils::vcdfile_to_pulses;

/// Decode a captured dump offline and print what it held.
pub fn command(path: &Path, verbose: bool) -> anyhow::Result<()> {
    let mut pulses = vcdfile_to_pulses(path)?;
    log::info!("Read {} pulses from {}", pulses.len(), path.display());

    // The dump leaves out the idle that ends it.
    pulses.push(Pulse::mark(10 * BIT_PERIOD));

    let bytes = play_pulses(&pulses, verbose);
    println!("Bytes: {}", format_hex(&bytes));

    match packet::decode_to_vec(&bytes) {
        Ok(payload) => println!("Packet: {}", format_hex(&payload)),
        Err(err) => println!("No packet: {}", err),
    }

    Ok(())
}

/// Run pulses through the frame decoder, keeping every byte it reports.
pub fn play_pulses(pulses: &[Pulse], verbose: bool) -> Vec<u8> {
    let codec = PulseCodec::default();
    let mut state = DecoderState::new();
    let mut res = Vec::new();

    for &pulse in pulses {
        match codec.decode(pulse, &mut state) {
            DecodeOutcome::NoByte => {}
            DecodeOutcome::Byte(byte) => {
                if verbose {
                    println!("{:?}\t-> {:#04x}", pulse, byte);
                }
                res.push(byte);
            }
            DecodeOutcome::Error(err) => {
                println!("{:?}\t-> {}", pulse, err);
                if let PulseError::Parity { byte } = err {
                    res.push(byte);
                }
            }
        }
    }

    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_pulses() {
        let codec = PulseCodec::default();
        let mut pulses = codec.encode(&packet::encode_to_vec(&[0xef]));
        pulses.pop();
        pulses.push(Pulse::mark(10 * BIT_PERIOD));

        let bytes = play_pulses(&pulses, false);
        assert_eq!(packet::decode_to_vec(&bytes).unwrap(), vec![0xef]);
    }

    #[test]
    fn test_long_gap_between_bursts() {
        let codec = PulseCodec::default();
        let mut pulses = codec.encode(&[0x10]);
        pulses.pop();
        // Over an hour of idle, capped by the dump reader.
        pulses.push(Pulse::mark(u32::MAX));
        pulses.extend(codec.encode(&[0x20]));

        assert_eq!(play_pulses(&pulses, false), vec![0x10, 0x20]);
    }

    #[test]
    fn test_parity_error_keeps_byte() {
        // 0x41 with the parity bit flipped
        let pulses = [
            Pulse::space(BIT_PERIOD),
            Pulse::mark(BIT_PERIOD),
            Pulse::space(5 * BIT_PERIOD),
            Pulse::mark(BIT_PERIOD),
            Pulse::space(2 * BIT_PERIOD),
            Pulse::mark(10 * BIT_PERIOD),
        ];

        assert_eq!(play_pulses(&pulses, false), vec![0x41]);
    }
}
