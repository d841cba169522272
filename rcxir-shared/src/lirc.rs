//! Transport over a LIRC character device in mode2.
//!
//! Reads return one native-endian `u32` per segment; writes take plain
//! durations, alternating light-on and light-off, starting with light-on.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::mem;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::TransportError;
use crate::pulse::{Level, Pulse};
use crate::transport::Transport;

pub const DEFAULT_DEVICE: &str = "/dev/lirc";

/// `_IOR('i', 0x02, __u32)`
const LIRC_GET_REC_MODE: u32 = 0x8004_6902;
const LIRC_MODE_MODE2: u32 = 0x0000_0004;

const WORD: usize = mem::size_of::<u32>();

pub struct LircDevice {
    path: PathBuf,
    quiet_window: Duration,
    file: Option<File>,
}

impl LircDevice {
    pub fn new<P: AsRef<Path>>(path: P, quiet_window: Duration) -> Self {
        LircDevice {
            path: path.as_ref().to_path_buf(),
            quiet_window,
            file: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn file(&mut self) -> Result<&mut File, TransportError> {
        self.file.as_mut().ok_or(TransportError::NotOpen)
    }
}

fn rec_mode(file: &File) -> io::Result<u32> {
    let mut mode: u32 = 0;
    let rc = unsafe {
        libc::ioctl(
            file.as_raw_fd(),
            LIRC_GET_REC_MODE as _,
            &mut mode as *mut u32,
        )
    };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(mode)
}

/// Wait until `file` is readable. False when the window passed in silence.
fn wait_readable(file: &File, window: Duration) -> io::Result<bool> {
    let mut fds = libc::pollfd {
        fd: file.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout = window.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

    let ready = unsafe { libc::poll(&mut fds, 1, timeout) };
    if ready < 0 {
        return Err(io::Error::last_os_error());
    }
    if fds.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
        return Err(io::Error::new(io::ErrorKind::BrokenPipe, "lirc device hung up"));
    }

    Ok(ready > 0 && fds.revents & libc::POLLIN != 0)
}

fn partial_word(len: usize) -> TransportError {
    TransportError::Device(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("read {} bytes, not a whole number of mode2 words", len),
    ))
}

impl Transport for LircDevice {
    fn open(&mut self) -> Result<(), TransportError> {
        if self.file.is_some() {
            log::error!("{} is already open", self.path.display());
            return Err(TransportError::AlreadyOpen);
        }

        // Probe read-only first to tell a missing device from a read-only one.
        File::open(&self.path).map_err(|err| {
            log::error!("Cannot open {}: {}", self.path.display(), err);
            TransportError::NotFound
        })?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|err| {
                log::error!("{} is read-only: {}", self.path.display(), err);
                TransportError::ReadOnly
            })?;

        match rec_mode(&file) {
            Ok(LIRC_MODE_MODE2) => {}
            Ok(mode) => {
                log::error!("{} receives in mode {:#x}, not mode2", self.path.display(), mode);
                return Err(TransportError::NotSupported);
            }
            Err(err) => {
                log::error!("{} is not a lirc device: {}", self.path.display(), err);
                return Err(TransportError::NotSupported);
            }
        }

        log::info!("Opened {}", self.path.display());
        self.file = Some(file);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.file.take().is_some() {
            log::debug!("Closed {}", self.path.display());
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<(), TransportError> {
        let window = self.quiet_window;
        let file = self.file()?;

        let mut discarded = 0;
        let mut word = [0u8; WORD];
        while wait_readable(file, window)? {
            let len = file.read(&mut word)?;
            if len == 0 {
                break;
            }
            if len != WORD {
                return Err(partial_word(len));
            }
            discarded += 1;
        }

        log::debug!("Reset discarded {} words", discarded);
        Ok(())
    }

    fn send(&mut self, pulses: &[Pulse]) -> Result<(), TransportError> {
        let file = self.file()?;

        // The line idles as a mark, and the driver wants the train to end
        // on light-on.
        let pulses = match pulses.last() {
            Some(last) if last.level == Level::Mark => &pulses[..pulses.len() - 1],
            _ => pulses,
        };

        let mut raw = Vec::with_capacity(pulses.len() * WORD);
        for pulse in pulses {
            raw.extend_from_slice(&pulse.duration.to_ne_bytes());
        }

        file.write_all(&raw)?;
        Ok(())
    }

    fn receive(&mut self, buf: &mut [Pulse]) -> Result<usize, TransportError> {
        let window = self.quiet_window;
        let file = self.file()?;

        if buf.is_empty() || !wait_readable(file, window)? {
            return Ok(0);
        }

        let mut raw = vec![0u8; buf.len() * WORD];
        let len = file.read(&mut raw)?;
        if len % WORD != 0 {
            return Err(partial_word(len));
        }

        for (slot, chunk) in buf.iter_mut().zip(raw[..len].chunks_exact(WORD)) {
            let word = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            *slot = Pulse::from_mode2(word);
        }

        Ok(len / WORD)
    }
}
