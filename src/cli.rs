//! Command line interface
//!
//! The accepted syntax is `pingo <target> [-c count] [-s size] [-a success|failure] [-v]`. The
//! first argument always names the target. Flags are recognized regardless of case, a flag that
//! expects a value takes the next argument no matter what it looks like. Everything else is
//! ignored, as is a trailing flag without value.
//!
//! Values are checked in the order they appear, so the first invalid one decides the error. The
//! checked values are handed on to a `clap` schema in their canonical long form, which then does
//! the bookkeeping of occurrences and values.

use clap::ArgMatches;
use std::error::Error;
use std::ffi::OsString;
use std::fmt;

use super::{AlertMode, Config, MAX_SIZE};
use crate::logger::StdLogger;

/// Usage text printed when no target is given
pub const USAGE: &str = "\
Usage: pingo <target> [-c count] [-s size] [-a success|failure]
       If -c is not specified, ping will run continuously
       -s size: Size of data to send in bytes (default: 56)
       -a: Audio alert on success or failure (default: failure)";

/// Invalid value on the command line
///
/// Raised before any echo request goes out. The process is expected to exit with status 1.
#[derive(Debug)]
pub enum ConfigError {
    Size(String),
    AlertMode(String),
    Args(clap::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Size(_) => write!(f, "Size must be between 1 and {} bytes", MAX_SIZE),
            Self::AlertMode(_) => write!(f, "Alert mode must be either 'success' or 'failure'"),
            Self::Args(e) => write!(f, "{}", e.message),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Args(e) => Some(e),
            _ => None,
        }
    }
}

impl From<clap::Error> for ConfigError {
    fn from(e: clap::Error) -> Self {
        Self::Args(e)
    }
}

/// A flag that takes a value
#[derive(Debug, Copy, Clone)]
enum Flag {
    Count,
    Size,
    Alert,
}

impl Flag {
    /// Validate a raw value and return the flag in its canonical long form
    ///
    /// A count that is not a number yields `None` and is ignored. Negative counts become 0.
    fn canonical(self, value: &str) -> Result<Option<String>, ConfigError> {
        match self {
            Self::Count => Ok(value
                .trim()
                .parse::<i64>()
                .ok()
                .map(|count| format!("--count={}", count.max(0)))),
            Self::Size => match value.trim().parse::<usize>() {
                Ok(size) if size >= 1 && size <= MAX_SIZE => Ok(Some(format!("--size={}", size))),
                _ => Err(ConfigError::Size(value.to_string())),
            },
            Self::Alert => match AlertMode::parse(value) {
                Some(alert) => Ok(Some(format!("--alert={}", alert))),
                None => Err(ConfigError::AlertMode(value.to_string())),
            },
        }
    }
}

/// Outcome of the flag scan
struct Scanned {
    /// Checked flags in their long form
    args: Vec<String>,
    /// Count values that are not a number
    ignored: Vec<String>,
}

/// Application initialization
pub struct App;

impl App {
    /// Retrieve user input from command line
    ///
    /// Returns `Ok(None)` if no target was given and the usage text should be shown instead.
    pub fn parse_args() -> Result<Option<Config>, ConfigError> {
        Self::parse_from(lossy(std::env::args_os()))
    }

    /// Parse a full argument list, program name included
    ///
    /// The user can modify the following parameters of the application:
    /// - target: Either an IP address or a host name (required)
    /// - count: Number of echo requests to send (default: until interrupted)
    /// - size: The payload size per packet (default 56 bytes, at most 65500)
    /// - alert: Outcome that rings the terminal bell (default failure)
    /// - verbose: Log what the session is doing
    ///
    /// A count that is not a number is ignored, a count below 1 sends nothing. Every size and
    /// alert value is validated and the last one given wins.
    ///
    /// # Errors
    ///
    /// Fails on the first size or alert value, in argument order, that is out of range.
    pub fn parse_from<I, T>(args: I) -> Result<Option<Config>, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        let name = args.next().unwrap_or_else(|| String::from("pingo"));
        let rest: Vec<String> = args.collect();

        let target = match rest.first() {
            Some(target) => target.clone(),
            None => return Ok(None),
        };

        let scanned = Self::scan(&rest[1..])?;

        let mut normalized = vec![name];
        normalized.extend(scanned.args);
        normalized.push(String::from("--"));
        normalized.push(target);

        let matches = Self::schema().get_matches_from_safe(normalized)?;
        let config = Self::config_from(&matches)?;

        // The logger is only up once verbosity is known
        for count in scanned.ignored {
            warn!("Ignoring count {:?}: not a number", count);
        }

        Ok(Some(config))
    }

    /// Check the recognized flags in order and rewrite them into their long form
    ///
    /// Everything that is not a recognized flag is dropped.
    fn scan(flags: &[String]) -> Result<Scanned, ConfigError> {
        let mut scanned = Scanned {
            args: Vec::with_capacity(flags.len()),
            ignored: Vec::new(),
        };
        let mut i = 0;
        while i < flags.len() {
            let flag = flags[i].to_lowercase();
            let kind = match flag.as_str() {
                "-c" => Some(Flag::Count),
                "-s" => Some(Flag::Size),
                "-a" => Some(Flag::Alert),
                _ => None,
            };

            match (kind, flags.get(i + 1)) {
                (Some(kind), Some(value)) => {
                    match kind.canonical(value)? {
                        Some(arg) => scanned.args.push(arg),
                        None => scanned.ignored.push(value.clone()),
                    }
                    i += 2;
                }
                // Trailing flag without value
                (Some(_), None) => i += 1,
                (None, _) => {
                    if flag == "-v" || flag == "--verbose" {
                        scanned.args.push(String::from("--verbose"));
                    }
                    i += 1;
                }
            }
        }
        Ok(scanned)
    }

    fn schema<'a, 'b>() -> clap::App<'a, 'b> {
        clap_app!(pingo =>
            (version: crate_version!())
            (author: "Michael Prantl <michael.prantl@hotmail.de")
            (about: "Send ICMP echo requests to a host and report round-trip statistics")
            (@arg target: +required "Host name or destination address")
            (@arg verbose: --verbose +multiple "Sets the level of verbosity")
            (@arg count: --count +takes_value +multiple use_delimiter(false) "Stops after sending count echo requests")
            (@arg size: --size +takes_value +multiple use_delimiter(false) "Sets payload size (in Bytes)")
            (@arg alert: --alert +takes_value +multiple use_delimiter(false) "Rings the bell on success or failure"))
    }

    fn config_from(matches: &ArgMatches<'_>) -> Result<Config, ConfigError> {
        let target = matches.value_of("target").unwrap_or_default();
        let mut config = Config::new(target);
        config.verbose = matches.is_present("verbose");
        StdLogger::init(config.verbose);

        // Values were checked by the scan, the last one given wins
        if matches.is_present("count") {
            config.count = values_t!(matches, "count", u64)?.pop();
        }
        if matches.is_present("size") {
            config.size = values_t!(matches, "size", usize)?.pop().unwrap_or(config.size);
        }
        if matches.is_present("alert") {
            config.alert = values_t!(matches, "alert", AlertMode)?.pop().unwrap_or(config.alert);
        }

        if config.size > 60 {
            info!("Beware of the Maximum Transmission Unit supported by your network device");
        }

        trace!("Parsed configuration.");

        Ok(config)
    }
}

/// Convert arguments to strings, replacing invalid UTF-8 instead of failing
fn lossy<I: IntoIterator<Item = OsString>>(args: I) -> impl Iterator<Item = String> {
    args.into_iter().map(|arg| arg.to_string_lossy().into_owned())
}
