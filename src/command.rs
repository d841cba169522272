use anyhow::Context;

use rcxir_shared::packet::MAX_PACKET_LEN;
use rcxir_shared::{RcxLink, Transport};

/// Parse `"10"`, `"0x10"` or `"ef"` style arguments into bytes.
pub fn parse_hex_bytes<S: AsRef<str>>(args: &[S]) -> anyhow::Result<Vec<u8>> {
    args.iter()
        .map(|arg| {
            let arg = arg.as_ref();
            let digits = arg
                .strip_prefix("0x")
                .or_else(|| arg.strip_prefix("0X"))
                .unwrap_or(arg);
            u8::from_str_radix(digits, 16).with_context(|| format!("Not a hex byte: {:?}", arg))
        })
        .collect()
}

pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Send `request` and print the reply. An empty request only listens.
pub fn run<T: Transport>(link: &mut RcxLink<T>, request: &[u8]) -> anyhow::Result<Vec<u8>> {
    link.open().context("Failed to open the infrared device")?;

    let result = exchange(link, request);
    link.close()?;

    let reply = result?;
    println!("Received RCX data: {}", format_hex(&reply));
    Ok(reply)
}

fn exchange<T: Transport>(link: &mut RcxLink<T>, request: &[u8]) -> anyhow::Result<Vec<u8>> {
    link.reset()?;

    if request.is_empty() {
        log::info!("Waiting for a packet");
        Ok(link.receive(MAX_PACKET_LEN)?)
    } else {
        log::info!("Sending command: {}", format_hex(request));
        let reply = link
            .command(request, MAX_PACKET_LEN)
            .with_context(|| format!("Command {:#04x} failed", request[0]))?;
        log::info!("Got reply");
        Ok(reply)
    }
}
