use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::pulse::{Level, BIT_PERIOD};

/// How long the line must stay quiet before a reply is considered complete.
pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(350);

/// Pulses collected for a single reply, including the trailing idle mark.
pub const DEFAULT_RECEIVE_CAPACITY: usize = 1024;

/// Per platform correction of the segment lengths handed to the driver.
///
/// The offset is added once, when a new mark or space segment is opened.
/// It never changes which level is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingProfile {
    /// Plain multiples of the bit period.
    Exact,
    /// lirc_sir on a laptop serial port.
    Pc,
    /// iPAQ infrared port.
    Ipaq,
}

impl Default for TimingProfile {
    fn default() -> Self {
        TimingProfile::Exact
    }
}

impl TimingProfile {
    /// Offset in microseconds for a segment of the given level.
    pub fn offset(self, level: Level) -> i32 {
        match (self, level) {
            (TimingProfile::Exact, _) => 0,
            (TimingProfile::Pc, Level::Mark) => 30,
            (TimingProfile::Pc, Level::Space) => 145,
            (TimingProfile::Ipaq, Level::Mark) => 0,
            (TimingProfile::Ipaq, Level::Space) => -20,
        }
    }

    /// Length of a freshly opened one bit segment.
    pub fn segment_start(self, level: Level) -> u32 {
        (BIT_PERIOD as i32 + self.offset(level)) as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown timing profile '{0}', expected exact, pc or ipaq")]
pub struct ParseTimingError(String);

impl FromStr for TimingProfile {
    type Err = ParseTimingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(TimingProfile::Exact),
            "pc" => Ok(TimingProfile::Pc),
            "ipaq" => Ok(TimingProfile::Ipaq),
            _ => Err(ParseTimingError(s.to_string())),
        }
    }
}

/// Settings for an [`RcxLink`](crate::link::RcxLink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    pub timing: TimingProfile,
    pub quiet_window: Duration,
    pub receive_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            timing: TimingProfile::default(),
            quiet_window: DEFAULT_QUIET_WINDOW,
            receive_capacity: DEFAULT_RECEIVE_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_profiles() {
        assert_eq!("pc".parse::<TimingProfile>(), Ok(TimingProfile::Pc));
        assert_eq!("ipaq".parse::<TimingProfile>(), Ok(TimingProfile::Ipaq));
        assert_eq!("exact".parse::<TimingProfile>(), Ok(TimingProfile::Exact));
        assert!("sir".parse::<TimingProfile>().is_err());
    }

    #[test]
    fn test_segment_start() {
        assert_eq!(TimingProfile::Exact.segment_start(Level::Space), 417);
        assert_eq!(TimingProfile::Pc.segment_start(Level::Mark), 447);
        assert_eq!(TimingProfile::Pc.segment_start(Level::Space), 562);
        assert_eq!(TimingProfile::Ipaq.segment_start(Level::Space), 397);
    }
}
