use pnet::transport::{TransportReceiver, TransportSender};
use std::fmt;
use std::io;
use std::net::IpAddr;
use std::process;
use std::time::{Duration, Instant};

use crate::packet::{ProbeStatus, ReplyKind, ReplyPacket, RequestPacket};

/// Receive buffer of the transport channels, large enough for any IP packet
const CHANNEL_BUFFER: usize = 1 << 16;

/// Below this remaining wait the receiver is not armed again, a zero timeout would block forever
const MIN_WAIT: Duration = Duration::from_millis(1);

/// Answer to a single echo request
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The target answered in time
    Success { addr: IpAddr, ttl: u8, rtt: Duration },
    /// The request failed for the given reason
    Status(ProbeStatus),
}

/// Send one echo request and wait for its outcome
///
/// This is the only place the ping session talks to the network. Errors returned from `probe`
/// are transport faults (resolution failed, no permission to open a socket, ...), they count as
/// a lost packet like any non-success `Reply` does.
pub trait Prober {
    fn probe(&mut self, seq: u16, payload: &[u8], timeout: Duration) -> io::Result<Reply>;
}

/// Classified result of one round of the probe loop
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Success { addr: IpAddr, ttl: u8, rtt: Duration },
    Failure(ProbeStatus),
    Error(String),
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        match self {
            Self::Success { .. } => true,
            _ => false,
        }
    }
}

impl From<io::Result<Reply>> for ProbeOutcome {
    fn from(result: io::Result<Reply>) -> Self {
        match result {
            Ok(Reply::Success { addr, ttl, rtt }) => Self::Success { addr, ttl, rtt },
            Ok(Reply::Status(status)) => Self::Failure(status),
            Err(e) => Self::Error(e.to_string()),
        }
    }
}

/// Transport channel to the resolved destination
struct Channel {
    tx: TransportSender,
    rx: TransportReceiver,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel").finish()
    }
}

/// ICMP/ICMPv6 echo over pnet transport channels
///
/// The destination is resolved on the first probe that gets that far and kept for the rest of
/// the session. The channel is opened the same way. Both steps are retried on the next probe as
/// long as they fail, so a missing network or missing privileges show up as one error per probe.
///
/// Requests always go out through a layer 4 channel, so the kernel builds the IP header and
/// fragments packets beyond the path MTU. IPv4 replies are read from a second, layer 3 channel,
/// which hands us their full IP header and with it the time to live.
#[derive(Debug)]
pub struct IcmpProber {
    host: String,
    id: u16,
    addr: Option<IpAddr>,
    channel: Option<Channel>,
}

impl IcmpProber {
    /// Create a prober for a host name or address
    ///
    /// No network activity happens until the first probe.
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            // The pid serves as identifier for our packets
            id: process::id() as u16,
            addr: None,
            channel: None,
        }
    }

    /// Resolve the destination, literal addresses skip the dns lookup
    ///
    /// IPv4 answers are preferred over IPv6 answers.
    fn resolve(&mut self) -> io::Result<IpAddr> {
        use dns_lookup::lookup_host;

        if let Some(addr) = self.addr {
            return Ok(addr);
        }

        let addr = match self.host.parse::<IpAddr>() {
            Ok(addr) => addr,
            Err(_) => {
                let addrs = lookup_host(&self.host)?;
                let addr = addrs
                    .iter()
                    .find(|addr| addr.is_ipv4())
                    .or_else(|| addrs.first())
                    .copied()
                    .ok_or_else(|| {
                        io::Error::new(
                            io::ErrorKind::NotFound,
                            format!("no address found for host {}", self.host),
                        )
                    })?;

                info!("Resolved host {} to IP {}", self.host, addr);
                addr
            }
        };

        self.addr = Some(addr);
        Ok(addr)
    }

    /// Open new channel for packet transmission
    ///
    /// # Errors
    ///
    /// Errors during the construction of the pnet [`transport_channel`](tc) are transparently
    /// propagated back to the caller. Raw sockets usually require elevated privileges.
    ///
    /// [tc]: https://docs.rs/pnet/0.25.0/pnet/transport/fn.transport_channel.html
    fn open_channel(addr: &IpAddr) -> io::Result<Channel> {
        use pnet::packet::ip::IpNextHeaderProtocols::{Icmp, Icmpv6};
        use pnet::transport::{self, TransportChannelType::*, TransportProtocol::*};

        trace!("Opening transport channel to transmit network packets");

        if addr.is_ipv4() {
            let (tx, _) = transport::transport_channel(CHANNEL_BUFFER, Layer4(Ipv4(Icmp)))?;
            let (_, rx) = transport::transport_channel(CHANNEL_BUFFER, Layer3(Icmp))?;
            Ok(Channel { tx, rx })
        } else {
            let (tx, rx) = transport::transport_channel(CHANNEL_BUFFER, Layer4(Ipv6(Icmpv6)))?;
            Ok(Channel { tx, rx })
        }
    }

    fn channel(&mut self, addr: &IpAddr) -> io::Result<&mut Channel> {
        if self.channel.is_none() {
            self.channel = Some(Self::open_channel(addr)?);
        }
        match self.channel.as_mut() {
            Some(channel) => Ok(channel),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "no transport channel")),
        }
    }
}

impl Prober for IcmpProber {
    fn probe(&mut self, seq: u16, payload: &[u8], timeout: Duration) -> io::Result<Reply> {
        let addr = self.resolve()?;
        let id = self.id;
        let packet = RequestPacket::new(addr, id, seq, payload)?;
        let channel = self.channel(&addr)?;

        // Stop time and send packet out into the aether
        let start = Instant::now();
        channel.tx.send_to(packet, addr)?;
        let deadline = start + timeout;

        let reply = if addr.is_ipv4() {
            wait_ipv4(&mut channel.rx, id, seq, deadline)?
        } else {
            wait_icmpv6(&mut channel.rx, id, seq, deadline)?
        };

        Ok(match reply {
            Some((reply, arrival)) => match reply.get_kind() {
                ReplyKind::Echo => Reply::Success {
                    addr: reply.get_source(),
                    ttl: reply.get_ttl(),
                    rtt: arrival.duration_since(start),
                },
                ReplyKind::Error(status) => Reply::Status(status),
            },
            None => Reply::Status(ProbeStatus::TimedOut),
        })
    }
}

/// Time left until `deadline`, `None` once it is too close to wait for
fn remaining(deadline: Instant) -> Option<Duration> {
    let now = Instant::now();
    if now >= deadline {
        return None;
    }
    Some(deadline - now).filter(|left| *left >= MIN_WAIT)
}

/// Wait for the IPv4 packet that answers request `seq`
///
/// Everything else arriving on the raw socket, replies to other ping processes included, is
/// skipped.
fn wait_ipv4(
    rx: &mut TransportReceiver,
    id: u16,
    seq: u16,
    deadline: Instant,
) -> io::Result<Option<(ReplyPacket, Instant)>> {
    use pnet::packet::Packet;
    use pnet::transport::ipv4_packet_iter;

    let mut incoming = ipv4_packet_iter(rx);
    while let Some(wait) = remaining(deadline) {
        match incoming.next_with_timeout(wait)? {
            Some((packet, _)) => {
                let arrival = Instant::now();
                match ReplyPacket::from_ipv4(packet.packet()) {
                    Some(reply) if reply.answers(id, seq) => return Ok(Some((reply, arrival))),
                    _ => trace!("Skipping unrelated ICMP packet"),
                }
            }
            None => break,
        }
    }
    Ok(None)
}

/// Wait for the ICMPv6 packet that answers request `seq`
fn wait_icmpv6(
    rx: &mut TransportReceiver,
    id: u16,
    seq: u16,
    deadline: Instant,
) -> io::Result<Option<(ReplyPacket, Instant)>> {
    use pnet::packet::Packet;
    use pnet::transport::icmpv6_packet_iter;

    let mut incoming = icmpv6_packet_iter(rx);
    while let Some(wait) = remaining(deadline) {
        match incoming.next_with_timeout(wait)? {
            Some((packet, source)) => {
                let arrival = Instant::now();
                match ReplyPacket::from_icmpv6(packet.packet(), source) {
                    Some(reply) if reply.answers(id, seq) => return Ok(Some((reply, arrival))),
                    _ => trace!("Skipping unrelated ICMPv6 packet"),
                }
            }
            None => break,
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn outcome_from_reply() {
        let addr = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let rtt = Duration::from_micros(1500);

        let outcome = ProbeOutcome::from(Ok(Reply::Success { addr, ttl: 64, rtt }));
        assert!(outcome.is_success());
        assert_eq!(outcome, ProbeOutcome::Success { addr, ttl: 64, rtt });

        let outcome = ProbeOutcome::from(Ok(Reply::Status(ProbeStatus::TimedOut)));
        assert!(!outcome.is_success());
        assert_eq!(outcome, ProbeOutcome::Failure(ProbeStatus::TimedOut));
    }

    #[test]
    fn outcome_from_transport_error() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "Operation not permitted");
        let outcome = ProbeOutcome::from(Err(err));
        assert!(!outcome.is_success());
        assert_eq!(outcome, ProbeOutcome::Error("Operation not permitted".to_string()));
    }

    #[test]
    fn remaining_time_until_deadline() {
        let now = Instant::now();
        assert_eq!(remaining(now), None);
        assert!(remaining(now + Duration::from_secs(5)).is_some());
    }

    #[test]
    fn literal_address_needs_no_lookup() {
        let mut prober = IcmpProber::new("127.0.0.1");
        assert_eq!(
            prober.resolve().unwrap(),
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
        );
        assert!(prober.channel.is_none());
    }

    #[test]
    #[ignore]
    fn resolve_localhost() {
        let mut prober = IcmpProber::new("localhost");
        let addr = prober.resolve().expect("Failed resolving localhost");
        assert!(addr.is_loopback());

        // Resolution happens only once
        assert_eq!(prober.addr, Some(addr));
    }
}
