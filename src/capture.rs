use std::fs::File;

use rcxir_shared::packet::{self, MAX_PACKET_LEN};
use rcxir_shared::{LinkError, RcxLink, Transport};

use crate::command::format_hex;
use crate::vcdutils::VcdWriter;

/// Print every burst the device sees, optionally dumping the raw pulses.
pub fn command_capture<T: Transport>(
    link: &mut RcxLink<T>,
    verbose: bool,
    capture_file: Option<File>,
) -> anyhow::Result<()> {
    log::info!("Capturing");

    let mut vcd = capture_file.map(VcdWriter::new);
    if let Some(vcd) = vcd.as_mut() {
        vcd.init()?;
    }

    link.open()?;
    link.reset()?;

    loop {
        let pulses = match link.receive_pulses() {
            Ok(pulses) => pulses,
            Err(LinkError::NoReply) => continue,
            Err(err) => {
                log::warn!("{}", err);
                link.reset()?;
                continue;
            }
        };

        log::debug!("Burst of {} pulses", pulses.len());
        if verbose {
            println!("Pulses: {:?}", pulses);
        }

        if let Some(vcd) = vcd.as_mut() {
            vcd.write_pulses(&pulses)?;
        }

        match link.decode_pulses(&pulses, MAX_PACKET_LEN) {
            Ok(bytes) => {
                println!("Bytes: {}", format_hex(&bytes));
                match packet::decode_to_vec(&bytes) {
                    Ok(payload) => println!("Packet: {}", format_hex(&payload)),
                    Err(err) => log::debug!("No packet: {}", err),
                }
            }
            Err(err) => println!("Decode failed: {}", err),
        }
    }
}
