use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use structopt::StructOpt;

use rcxir_shared::lirc::LircDevice;
use rcxir_shared::{LinkConfig, RcxLink, TimingProfile};

mod capture;
mod command;
mod playback;
mod vcdutils;

#[derive(Debug, StructOpt)]
#[structopt(name = "rcxir", about = "Talk to a LEGO RCX over a LIRC infrared device")]
struct Opt {
    /// LIRC device in mode2
    #[structopt(long, parse(from_os_str), default_value = "/dev/lirc")]
    device: PathBuf,
    /// Segment timing: exact, pc or ipaq
    #[structopt(long, default_value = "pc")]
    timing: TimingProfile,
    /// Silence that ends a reply, in milliseconds
    #[structopt(long, default_value = "350")]
    quiet_ms: u64,
    #[structopt(short, long)]
    debug: bool,
    #[structopt(subcommand)]
    cmd: CliCommand,
}

#[derive(StructOpt, Debug)]
enum CliCommand {
    /// Send a command, bytes in hex. With no bytes, wait for a packet
    Command { bytes: Vec<String> },
    /// Print everything the device receives. Optionaly write it to a vcd file
    Capture {
        #[structopt(short, long)]
        verbose: bool,
        path: Option<PathBuf>,
    },
    /// Decode a captured vcd file
    PlaybackVcd {
        #[structopt(short, long)]
        verbose: bool,
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();

    let loglevel = if opt.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(loglevel)
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_default())
        .init();

    let config = LinkConfig {
        timing: opt.timing,
        quiet_window: Duration::from_millis(opt.quiet_ms),
        ..LinkConfig::default()
    };
    log::debug!("{:?} on {}", config, opt.device.display());

    let device = LircDevice::new(&opt.device, config.quiet_window);
    let mut link = RcxLink::new(device, config);

    match opt.cmd {
        CliCommand::Command { bytes } => {
            let request = command::parse_hex_bytes(&bytes)?;
            command::run(&mut link, &request)?;
            Ok(())
        }
        CliCommand::Capture { verbose, path } => {
            let file = path
                .map(|path| {
                    File::create(&path).with_context(|| format!("Cannot create {}", path.display()))
                })
                .transpose()?;
            capture::command_capture(&mut link, verbose, file)
        }
        CliCommand::PlaybackVcd { verbose, path } => playback::command(&path, verbose),
    }
}
