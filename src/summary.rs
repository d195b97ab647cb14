use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Round-trip time statistics in milliseconds
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RttStats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub mdev: f64,
}

/// Bookkeeping of a ping session
///
/// The `Summary` counts every echo request that went out and every one that was answered, and
/// keeps the round-trip time of each answered request in order of arrival, in whole milliseconds.
/// It is owned by the probe loop while the session runs and handed back for the final report once
/// it stops.
#[derive(Debug, Clone)]
pub struct Summary {
    target: String,
    transmitted: u64,
    received: u64,
    rtts: Vec<u64>,
    start: Instant,
    elapsed: Option<Duration>,
}

impl Summary {
    /// Start bookkeeping for a new session
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            transmitted: 0,
            received: 0,
            rtts: Vec::new(),
            start: Instant::now(),
            elapsed: None,
        }
    }

    /// Count an echo request that is about to go out and return its sequence number
    pub fn register_request(&mut self) -> u64 {
        self.transmitted += 1;
        self.transmitted
    }

    /// Count an answered echo request
    ///
    /// The round-trip time is truncated to whole milliseconds, the resolution it is printed with.
    pub fn register_reply(&mut self, rtt: Duration) {
        debug_assert!(self.received < self.transmitted);
        self.received += 1;
        self.rtts.push(whole_millis(rtt));
    }

    /// Freeze the session time
    pub fn finish(&mut self) {
        if self.elapsed.is_none() {
            self.elapsed = Some(self.start.elapsed());
        }
    }

    pub fn transmitted(&self) -> u64 {
        self.transmitted
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    /// Round-trip times of all answered requests in milliseconds
    pub fn rtts(&self) -> &[u64] {
        &self.rtts
    }

    /// Session time, up to now if the session has not finished yet
    pub fn elapsed(&self) -> Duration {
        self.elapsed.unwrap_or_else(|| self.start.elapsed())
    }

    /// Share of unanswered requests in percent
    ///
    /// A session that never sent anything has lost nothing.
    pub fn loss_percent(&self) -> f64 {
        if self.transmitted == 0 {
            return 0.0;
        }
        (self.transmitted - self.received) as f64 * 100.0 / self.transmitted as f64
    }

    /// Summary statistics of the round-trip times, `None` if nothing was received
    ///
    /// The mean deviation is the root of the mean squared deviation from the average over all
    /// samples (population, no Bessel correction).
    pub fn rtt_stats(&self) -> Option<RttStats> {
        if self.rtts.is_empty() {
            return None;
        }

        let samples: Vec<f64> = self.rtts.iter().map(|&ms| ms as f64).collect();
        let count = samples.len() as f64;

        let (min, max, total) = samples.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0f64),
            |(min, max, total), &x| (min.min(x), max.max(x), total + x),
        );
        let avg = total / count;

        // Mean of squared errors
        let mse = samples.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / count;

        Some(RttStats {
            min,
            avg,
            max,
            mdev: mse.sqrt(),
        })
    }

    /// Print the statistics for this ping session
    ///
    /// Times are reported in milliseconds, the round-trip statistics with 3 decimals precision.
    pub fn tally<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "--- {} ping statistics ---", self.target)?;
        writeln!(
            out,
            "{} packets transmitted, {} received, {:.1}% packet loss, time {}ms",
            self.transmitted,
            self.received,
            self.loss_percent(),
            self.elapsed().as_millis()
        )?;

        if let Some(stats) = self.rtt_stats() {
            writeln!(
                out,
                "rtt min/avg/max/mdev = {:.3}/{:.3}/{:.3}/{:.3} ms",
                stats.min, stats.avg, stats.max, stats.mdev
            )?;
        }
        out.flush()
    }
}

/// Whole milliseconds of a duration, any fraction is dropped
pub(crate) fn whole_millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
