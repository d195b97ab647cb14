//! # PINGO ping application
//!
//! This crate provides the components of a ping command line application. A session is driven
//! by a single loop:
//! - The `Sender` owns the session configuration and the payload buffer and fires one echo
//!   request per interval through a `Prober`
//! - The `Summary` keeps the run state and prints the closing statistics
//!
//! The exchange with the target host sits behind the `Prober` trait. The `IcmpProber` shipped
//! with this crate talks ICMP/ICMPv6 through [`pnet`](https://docs.rs/pnet/0.25.0/pnet/)
//! transport channels, tests substitute their own.

#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub mod alert;
pub mod cli;
pub mod logger;
pub mod packet;
pub mod probe;
pub mod sender;
pub mod summary;

/// Time to wait for the reply to a single echo request
pub const TIMEOUT: Duration = Duration::from_millis(2000);

/// Pause between two echo requests
pub const INTERVAL: Duration = Duration::from_millis(1000);

/// Payload size used when none is given
pub const DEFAULT_SIZE: usize = 56;

/// Largest accepted payload size
pub const MAX_SIZE: usize = 65500;

/// IPv4 header plus ICMP header, added to the payload size in the banner
pub const HEADER_OVERHEAD: usize = 28;

/// Application configuration
///
/// The `Config` is validated once while parsing and consumed by the `Sender`.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub(crate) target: String,
    pub(crate) count: Option<u64>,
    pub(crate) size: usize,
    pub(crate) alert: AlertMode,
    pub(crate) verbose: bool,
    pub(crate) delay: Duration,
    pub(crate) timeout: Duration,
}

impl Config {
    /// Configuration with the defaults of the command line for the given target
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            count: None,
            size: DEFAULT_SIZE,
            alert: AlertMode::Failure,
            verbose: false,
            delay: INTERVAL,
            timeout: TIMEOUT,
        }
    }

    /// Stop after `count` echo requests instead of running until interrupted
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_alert(mut self, alert: AlertMode) -> Self {
        self.alert = alert;
        self
    }

    /// Override the pause between echo requests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Override the reply timeout per echo request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn count(&self) -> Option<u64> {
        self.count
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn alert(&self) -> AlertMode {
        self.alert
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Outcome that triggers the audible alert
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AlertMode {
    Success,
    Failure,
}

impl AlertMode {
    /// Parse the value of `-a`, ignoring case
    pub fn parse(val: &str) -> Option<Self> {
        match val.to_lowercase().as_str() {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            _ => None,
        }
    }

    /// Sound to play for a probe outcome, `None` if the outcome is not the configured one
    pub fn sound_for(self, success: bool) -> Option<alert::Sound> {
        match (self, success) {
            (Self::Success, true) => Some(alert::Sound::Success),
            (Self::Failure, false) => Some(alert::Sound::Failure),
            _ => None,
        }
    }
}

impl fmt::Display for AlertMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

impl FromStr for AlertMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown alert mode {:?}", s))
    }
}
