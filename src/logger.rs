use log::{Level, LevelFilter, Log, Metadata, Record};
use std::io::{stderr, Write};
use std::sync::{Mutex, Once};

/// Log implementation on the standard error stream
///
/// Standard output belongs to the ping report, so all log records go to standard error, marked by
/// their level: `[-]` for errors and warnings, `[i]` for info and `[+]` for everything below.
pub struct StdLogger(Mutex<()>);

impl StdLogger {
    /// Initialize logger
    ///
    /// Even if this function is called multiple times, initialization will only be done once.
    /// Warnings and errors are always shown, verbose mode adds info records.
    pub fn init(verbose: bool) {
        static INIT: Once = Once::new();

        let level = if verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Warn
        };

        INIT.call_once(|| {
            match log::set_boxed_logger(Box::new(StdLogger(Mutex::new(())))) {
                Ok(()) => log::set_max_level(level),
                // Another logger was installed first, leave it in charge
                Err(e) => {
                    let _ = writeln!(stderr(), "[-] Could not install logger: {}", e);
                }
            }
        });
    }

    fn prefix(level: Level) -> &'static str {
        match level {
            Level::Error | Level::Warn => "[-]",
            Level::Info => "[i]",
            _ => "[+]",
        }
    }
}

impl Log for StdLogger {
    /// This logger is enabled by default
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        // Keep lines of concurrent writers apart
        let _guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        let stderr = stderr();
        let mut handle = stderr.lock();
        let _ = writeln!(handle, "{} {}", Self::prefix(record.level()), record.args());
    }

    /// Flush buffered output stream
    fn flush(&self) {
        let _ = stderr().flush();
    }
}
