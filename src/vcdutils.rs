use std::fs::File;
use std::io::{self, ErrorKind::InvalidData};
use std::path::Path;

use rcxir_shared::{Level, Pulse};
use vcd::{self, SimulationCommand, TimescaleUnit, Value};

/// Idle inserted between captured bursts, in microseconds.
const BURST_GAP: u64 = 100_000;

/// Writes captured pulses as a single wire, `top.ir`, high while the line
/// is at mark.
pub struct VcdWriter<W: io::Write> {
    vcd: vcd::Writer<W>,
    timestamp: u64,
    wire_id: vcd::IdCode,
}

impl<W: io::Write> VcdWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            vcd: vcd::Writer::new(writer),
            timestamp: 0,
            wire_id: vcd::IdCode::FIRST,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        let writer = &mut self.vcd;

        writer.timescale(1, TimescaleUnit::US)?;
        writer.add_module("top")?;

        let id = writer.add_wire(1, "ir")?;
        self.wire_id = id;

        writer.upscope()?;
        writer.enddefinitions()?;

        // The line idles at mark
        writer.begin(SimulationCommand::Dumpvars)?;
        writer.change_scalar(id, Value::V1)?;
        writer.end()?;

        Ok(())
    }

    /// Append one burst, then return the wire to idle.
    pub fn write_pulses(&mut self, pulses: &[Pulse]) -> io::Result<()> {
        let mut ts = 0;
        for pulse in pulses {
            self.write_value(ts, pulse.level == Level::Mark)?;
            ts += u64::from(pulse.duration);
        }
        self.write_value(ts, true)?;

        self.add_offset(ts + BURST_GAP);
        Ok(())
    }

    pub fn write_value(&mut self, ts: u64, high: bool) -> io::Result<()> {
        let offseted_ts = self.timestamp + ts;

        self.vcd.timestamp(offseted_ts)?;
        let value = if high { Value::V1 } else { Value::V0 };
        self.vcd.change_scalar(self.wire_id, value)?;

        Ok(())
    }

    pub fn add_offset(&mut self, offset: u64) {
        self.timestamp += offset;
    }
}

/// Microseconds per tick of the dump.
fn tick_us(timescale: Option<(u32, TimescaleUnit)>) -> io::Result<u64> {
    match timescale {
        None => Ok(1),
        Some((n, TimescaleUnit::S)) => Ok(u64::from(n) * 1_000_000),
        Some((n, TimescaleUnit::MS)) => Ok(u64::from(n) * 1_000),
        Some((n, TimescaleUnit::US)) => Ok(u64::from(n)),
        Some((n, unit)) => Err(io::Error::new(
            InvalidData,
            format!("unsupported timescale {} {:?}", n, unit),
        )),
    }
}

/// Read the `top.ir` wire back into pulses.
///
/// The level that is still current at the end of the dump has no known
/// length and is left out.
pub fn read_pulses<R: io::Read>(reader: R) -> io::Result<Vec<Pulse>> {
    let mut parser = vcd::Parser::new(reader);

    let header = parser.parse_header()?;
    let wire = header
        .find_var(&["top", "ir"])
        .ok_or_else(|| io::Error::new(InvalidData, "no wire top.ir"))?
        .code;
    log::debug!("Timescale {:?}", header.timescale);
    let tick = tick_us(header.timescale)?;

    let mut current_ts: u64 = 0;
    let mut current: Option<(Level, u64)> = None;
    let mut pulses = Vec::new();

    for command_result in parser {
        use vcd::Command::*;
        let command = command_result?;
        match command {
            ChangeScalar(i, v) if i == wire => {
                let level = if v == Value::V1 {
                    Level::Mark
                } else {
                    Level::Space
                };

                match current {
                    Some((prev, _)) if prev == level => {}
                    Some((prev, since)) => {
                        let ticks = current_ts.checked_sub(since).ok_or_else(|| {
                            io::Error::new(
                                InvalidData,
                                format!("timestamp {} goes back from {}", current_ts, since),
                            )
                        })?;
                        let us = ticks.saturating_mul(tick);
                        if us > 0 {
                            pulses.push(Pulse {
                                level: prev,
                                duration: us.min(u64::from(u32::MAX)) as u32,
                            });
                        }
                        current = Some((level, current_ts));
                    }
                    None => current = Some((level, current_ts)),
                }
            }
            Timestamp(ts) => current_ts = ts,
            _ => (),
        }
    }

    if let Some((Level::Space, _)) = current {
        log::warn!("Dump ends with the light on");
    }

    Ok(pulses)
}

pub fn vcdfile_to_pulses(path: &Path) -> io::Result<Vec<Pulse>> {
    let file = File::open(path)?;
    read_pulses(&file)
}
