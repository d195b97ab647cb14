use std::io::{self, Write};
use std::sync::{atomic::AtomicBool, Arc};
use std::thread;

use crate::alert::Alert;
use crate::packet::payload;
use crate::probe::{ProbeOutcome, Prober};
use crate::summary::{whole_millis, Summary};
use crate::{Config, HEADER_OVERHEAD};

/// A thread-safe boolean representing the receipt of an signal interrupt
pub type InterruptSignal = Arc<AtomicBool>;

/// Sender context
///
/// The `Sender` holds everything a ping session needs: the configuration, the payload buffer that
/// every echo request carries, the `Prober` doing the network exchange and the `Alert` that is
/// played for the configured outcome.
#[derive(Debug)]
pub struct Sender<P, A> {
    config: Config,
    payload: Vec<u8>,
    prober: P,
    alert: A,
}

impl<P: Prober, A: Alert> Sender<P, A> {
    /// Create new Sender context from provided configuration
    ///
    /// The payload buffer is built once here and only read afterwards.
    pub fn new(config: Config, prober: P, alert: A) -> Self {
        let payload = payload(config.size);
        Self {
            config,
            payload,
            prober,
            alert,
        }
    }

    /// Send a sequence of echo requests
    ///
    /// Main loop for the ping session. One echo request goes out per round and the loop blocks
    /// until its outcome is known, so there is never more than one request in flight. The loop
    /// stops once the configured count is reached or `stop` has been raised. The flag is checked
    /// at the start of every round only: a request in flight and the pause after it always
    /// complete.
    ///
    /// Returns the bookkeeping of this session, to be reported with `Summary::tally`.
    ///
    /// # Errors
    ///
    /// Failed echo requests are reported inline and never end the session. Only failing to write
    /// to `out` does.
    pub fn ping<W: Write>(&mut self, out: &mut W, stop: &InterruptSignal) -> io::Result<Summary> {
        use std::sync::atomic::Ordering;

        let target = self.config.target.clone();
        let size = self.config.size;

        writeln!(
            out,
            "PING {} ({}) {}({}) bytes of data.",
            target,
            target,
            size,
            size + HEADER_OVERHEAD
        )?;
        out.flush()?;

        let mut summary = Summary::new(&target);

        while !stop.load(Ordering::SeqCst) && !self.exhausted(&summary) {
            let seq = summary.register_request();

            trace!("Sending echo request {}", seq);

            let outcome = ProbeOutcome::from(self.prober.probe(
                seq as u16,
                &self.payload,
                self.config.timeout,
            ));

            match &outcome {
                ProbeOutcome::Success { addr, ttl, rtt } => {
                    summary.register_reply(*rtt);
                    writeln!(
                        out,
                        "{} bytes from {}: icmp_seq={} ttl={} time={} ms",
                        size,
                        addr,
                        seq,
                        ttl,
                        whole_millis(*rtt)
                    )?;
                }
                ProbeOutcome::Failure(status) => {
                    writeln!(out, "From {}: icmp_seq={} {}", target, seq, status)?;
                }
                ProbeOutcome::Error(message) => {
                    debug!("Echo request {} failed in transport: {}", seq, message);
                    writeln!(out, "From {}: icmp_seq={} Error: {}", target, seq, message)?;
                }
            }
            out.flush()?;

            if let Some(sound) = self.config.alert.sound_for(outcome.is_success()) {
                self.alert.play(sound);
            }

            thread::sleep(self.config.delay);
        }

        summary.finish();

        trace!(
            "Ping session ended after {} of {:?} echo requests",
            summary.transmitted(),
            self.config.count
        );

        Ok(summary)
    }

    /// Return `true` once the configured number of echo requests went out
    fn exhausted(&self, summary: &Summary) -> bool {
        match self.config.count {
            Some(count) => summary.transmitted() >= count,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::Sound;
    use crate::packet::ProbeStatus;
    use crate::probe::Reply;
    use crate::AlertMode;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    /// Scripted prober, repeats its last reply once the script runs out
    struct MockProber {
        script: Vec<io::Result<Reply>>,
        calls: Vec<(u16, usize, Duration)>,
        stop_after: Option<(usize, InterruptSignal)>,
    }

    impl MockProber {
        fn new(script: Vec<io::Result<Reply>>) -> Self {
            Self {
                script,
                calls: Vec::new(),
                stop_after: None,
            }
        }

        /// Raise the interrupt while the n-th request is in flight
        fn interrupt_during(mut self, n: usize, signal: InterruptSignal) -> Self {
            self.stop_after = Some((n, signal));
            self
        }
    }

    impl Prober for MockProber {
        fn probe(&mut self, seq: u16, payload: &[u8], timeout: Duration) -> io::Result<Reply> {
            self.calls.push((seq, payload.len(), timeout));
            if let Some((n, signal)) = &self.stop_after {
                if self.calls.len() == *n {
                    signal.store(true, Ordering::SeqCst);
                }
            }

            let index = (self.calls.len() - 1).min(self.script.len() - 1);
            match &self.script[index] {
                Ok(reply) => Ok(reply.clone()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingAlert {
        played: Vec<Sound>,
    }

    impl Alert for RecordingAlert {
        fn play(&mut self, sound: Sound) {
            self.played.push(sound);
        }
    }

    fn success(ms: u64) -> io::Result<Reply> {
        Ok(Reply::Success {
            addr: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            ttl: 64,
            rtt: Duration::from_millis(ms),
        })
    }

    fn config(target: &str) -> Config {
        Config::new(target).with_delay(Duration::from_millis(0))
    }

    fn run(
        config: Config,
        prober: MockProber,
        stop: &InterruptSignal,
    ) -> (Summary, String, MockProber, RecordingAlert) {
        let mut sender = Sender::new(config, prober, RecordingAlert::default());
        let mut out = Vec::new();
        let summary = sender.ping(&mut out, stop).expect("Ping session failed");
        let Sender { prober, alert, .. } = sender;
        (summary, String::from_utf8(out).unwrap(), prober, alert)
    }

    #[test]
    fn responsive_host() {
        let stop = InterruptSignal::new(AtomicBool::new(false));
        let prober = MockProber::new(vec![success(1), success(2), success(3)]);

        let (summary, out, prober, alert) = run(config("127.0.0.1").with_count(3), prober, &stop);

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "PING 127.0.0.1 (127.0.0.1) 56(84) bytes of data.",
                "56 bytes from 127.0.0.1: icmp_seq=1 ttl=64 time=1 ms",
                "56 bytes from 127.0.0.1: icmp_seq=2 ttl=64 time=2 ms",
                "56 bytes from 127.0.0.1: icmp_seq=3 ttl=64 time=3 ms",
            ]
        );
        assert_eq!(summary.transmitted(), 3);
        assert_eq!(summary.received(), 3);
        assert_eq!(summary.loss_percent(), 0.0);
        assert!(summary.rtt_stats().is_some());

        // Sequence numbers, payload and timeout handed to the prober
        assert_eq!(
            prober.calls,
            vec![
                (1, 56, Duration::from_secs(2)),
                (2, 56, Duration::from_secs(2)),
                (3, 56, Duration::from_secs(2)),
            ]
        );

        // Default alert mode only sounds on failure
        assert!(alert.played.is_empty());
    }

    #[test]
    fn unreachable_host_with_success_alert() {
        let stop = InterruptSignal::new(AtomicBool::new(false));
        let prober = MockProber::new(vec![Ok(Reply::Status(ProbeStatus::DestinationHostUnreachable))]);
        let config = config("192.0.2.1")
            .with_count(2)
            .with_alert(AlertMode::Success);

        let (summary, out, _, alert) = run(config, prober, &stop);

        let lines: Vec<&str> = out.lines().skip(1).collect();
        assert_eq!(
            lines,
            vec![
                "From 192.0.2.1: icmp_seq=1 DestinationHostUnreachable",
                "From 192.0.2.1: icmp_seq=2 DestinationHostUnreachable",
            ]
        );
        assert_eq!(summary.transmitted(), 2);
        assert_eq!(summary.received(), 0);
        assert_eq!(summary.rtt_stats(), None);
        assert!(alert.played.is_empty());
    }

    #[test]
    fn failure_alert_per_lost_packet() {
        let stop = InterruptSignal::new(AtomicBool::new(false));
        let prober = MockProber::new(vec![
            success(5),
            Ok(Reply::Status(ProbeStatus::TimedOut)),
            Err(io::Error::new(io::ErrorKind::Other, "network is unreachable")),
            success(7),
        ]);

        let (summary, out, _, alert) = run(config("host.example").with_count(4), prober, &stop);

        let lines: Vec<&str> = out.lines().skip(1).collect();
        assert_eq!(
            lines,
            vec![
                "56 bytes from 127.0.0.1: icmp_seq=1 ttl=64 time=5 ms",
                "From host.example: icmp_seq=2 TimedOut",
                "From host.example: icmp_seq=3 Error: network is unreachable",
                "56 bytes from 127.0.0.1: icmp_seq=4 ttl=64 time=7 ms",
            ]
        );
        assert_eq!(summary.transmitted(), 4);
        assert_eq!(summary.received(), 2);
        assert_eq!(summary.rtts(), &[5, 7]);
        assert_eq!(alert.played, vec![Sound::Failure, Sound::Failure]);
    }

    #[test]
    fn success_alert() {
        let stop = InterruptSignal::new(AtomicBool::new(false));
        let prober = MockProber::new(vec![success(1), Ok(Reply::Status(ProbeStatus::TimedOut))]);
        let config = config("127.0.0.1")
            .with_count(2)
            .with_alert(AlertMode::Success);

        let (_, _, _, alert) = run(config, prober, &stop);

        assert_eq!(alert.played, vec![Sound::Success]);
    }

    #[test]
    fn interrupt_finishes_request_in_flight() {
        let stop = InterruptSignal::new(AtomicBool::new(false));
        let prober = MockProber::new(vec![success(1)]).interrupt_during(2, stop.clone());

        // No count: the session only ends through the interrupt
        let (summary, out, prober, _) = run(config("127.0.0.1"), prober, &stop);

        assert_eq!(prober.calls.len(), 2);
        assert_eq!(summary.transmitted(), 2);
        assert_eq!(summary.received(), 2);
        assert_eq!(out.lines().count(), 3);
    }

    #[test]
    fn interrupt_before_start() {
        let stop = InterruptSignal::new(AtomicBool::new(true));
        let prober = MockProber::new(vec![success(1)]);

        let (summary, out, prober, _) = run(config("127.0.0.1").with_count(5), prober, &stop);

        assert!(prober.calls.is_empty());
        assert_eq!(summary.transmitted(), 0);
        assert_eq!(summary.loss_percent(), 0.0);
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn round_trip_time_in_whole_milliseconds() {
        let stop = InterruptSignal::new(AtomicBool::new(false));
        let prober = MockProber::new(vec![Ok(Reply::Success {
            addr: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            ttl: 64,
            rtt: Duration::from_micros(12_700),
        })]);

        let (summary, out, _, _) = run(config("127.0.0.1").with_count(1), prober, &stop);

        assert!(out.contains("icmp_seq=1 ttl=64 time=12 ms\n"));
        assert_eq!(summary.rtts(), &[12]);
    }

    #[test]
    fn zero_count_sends_nothing() {
        let stop = InterruptSignal::new(AtomicBool::new(false));
        let prober = MockProber::new(vec![success(1)]);

        let (summary, _, prober, _) = run(config("127.0.0.1").with_count(0), prober, &stop);

        assert!(prober.calls.is_empty());
        assert_eq!(summary.transmitted(), 0);
    }

    #[test]
    fn custom_payload_size() {
        let stop = InterruptSignal::new(AtomicBool::new(false));
        let prober = MockProber::new(vec![success(1)]);

        let (_, out, prober, _) = run(config("::1").with_count(1).with_size(1000), prober, &stop);

        assert!(out.starts_with("PING ::1 (::1) 1000(1028) bytes of data.\n"));
        assert!(out.contains("1000 bytes from 127.0.0.1: icmp_seq=1"));
        assert_eq!(prober.calls[0].1, 1000);
    }
}
