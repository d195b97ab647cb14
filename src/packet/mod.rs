use pnet::packet::{
    icmp::{echo_reply::EchoReplyPacket, echo_request::EchoRequestPacket, IcmpPacket, IcmpTypes},
    icmpv6::{Icmpv6Packet, Icmpv6Types},
    ip::IpNextHeaderProtocols,
    ipv4::Ipv4Packet,
    Packet,
};
use std::fmt;
use std::net::IpAddr;

pub(crate) use request::RequestPacket;

mod request;

/// ICMP type of an IPv4 echo request
const ICMP_ECHO_REQUEST: u8 = 8;

/// ICMPv6 type of an echo request
const ICMPV6_ECHO_REQUEST: u8 = 128;

/// Length of a fixed IPv6 header
const IPV6_HEADER_LEN: usize = 40;

/// Length of the unused/reserved word that opens every ICMP error body
const ERROR_PREAMBLE_LEN: usize = 4;

/// Build the payload carried by every echo request
///
/// Byte `i` of the buffer holds `i mod 256`.
pub fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

/// Reason an echo request did not succeed
///
/// Maps the ICMP and ICMPv6 error messages onto one set of outcomes. `TimedOut` is never carried
/// by a packet, it is what remains when nothing arrives before the deadline.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    TimedOut,
    DestinationNetworkUnreachable,
    DestinationHostUnreachable,
    DestinationProtocolUnreachable,
    DestinationPortUnreachable,
    DestinationUnreachable,
    PacketTooBig,
    TtlExpired,
    ParameterProblem,
    SourceQuench,

    // Catch-all for error messages we do not tell apart
    Unknown,
}

impl ProbeStatus {
    fn from_icmp(ty: u8, code: u8) -> Self {
        match (ty, code) {
            (3, 0) => Self::DestinationNetworkUnreachable,
            (3, 1) => Self::DestinationHostUnreachable,
            (3, 2) => Self::DestinationProtocolUnreachable,
            (3, 3) => Self::DestinationPortUnreachable,
            (3, 4) => Self::PacketTooBig,
            (3, _) => Self::DestinationUnreachable,
            (4, _) => Self::SourceQuench,
            (11, _) => Self::TtlExpired,
            (12, _) => Self::ParameterProblem,
            _ => Self::Unknown,
        }
    }

    fn from_icmpv6(ty: u8, code: u8) -> Self {
        match (ty, code) {
            (1, 0) => Self::DestinationNetworkUnreachable,
            (1, 3) => Self::DestinationHostUnreachable,
            (1, 4) => Self::DestinationPortUnreachable,
            (1, _) => Self::DestinationUnreachable,
            (2, _) => Self::PacketTooBig,
            (3, _) => Self::TtlExpired,
            (4, _) => Self::ParameterProblem,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a received packet says about one of our echo requests
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReplyKind {
    /// The target answered the request
    Echo,
    /// A node on the way reported an error for the request
    Error(ProbeStatus),
}

/// A ping after receipt
///
/// The reply packet does not own the received bytes, but only retains what is needed to match it
/// against the request in flight: the identifier and sequence number of the echo request it
/// answers, who sent it and with which time to live it arrived.
///
/// For ICMP errors, identifier and sequence number are salvaged from the copy of the offending
/// request that the error message quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPacket {
    id: u16,
    seq: u16,
    kind: ReplyKind,
    source: IpAddr,
    ttl: u8,
}

impl ReplyPacket {
    /// Parse a complete IPv4 packet carrying ICMP
    ///
    /// Returns `None` for anything that is neither an echo reply nor an ICMP error quoting an
    /// echo request, including our own outgoing requests when pinging a local address.
    pub fn from_ipv4(bytes: &[u8]) -> Option<Self> {
        let ip = Ipv4Packet::new(bytes)?;
        if ip.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
            return None;
        }
        let icmp = IcmpPacket::new(ip.payload())?;
        let ty = icmp.get_icmp_type();

        let (id, seq, kind) = if ty == IcmpTypes::EchoReply {
            let echo = EchoReplyPacket::new(ip.payload())?;
            (echo.get_identifier(), echo.get_sequence_number(), ReplyKind::Echo)
        } else if ty == IcmpTypes::EchoRequest {
            return None;
        } else {
            // Error messages quote the original IP header followed by at least 8 bytes of ICMP
            let quoted = Ipv4Packet::new(icmp.payload().get(ERROR_PREAMBLE_LEN..)?)?;
            let offset = quoted.get_header_length() as usize * 4;
            let request = EchoRequestPacket::new(quoted.packet().get(offset..)?)?;
            if request.get_icmp_type().0 != ICMP_ECHO_REQUEST {
                return None;
            }
            let status = ProbeStatus::from_icmp(ty.0, icmp.get_icmp_code().0);
            (
                request.get_identifier(),
                request.get_sequence_number(),
                ReplyKind::Error(status),
            )
        };

        Some(Self {
            id,
            seq,
            kind,
            source: IpAddr::V4(ip.get_source()),
            ttl: ip.get_ttl(),
        })
    }

    /// Parse an ICMPv6 message
    ///
    /// The kernel strips the IPv6 header, so the hop limit is not available and the time to live
    /// is reported as 0.
    pub fn from_icmpv6(bytes: &[u8], source: IpAddr) -> Option<Self> {
        let icmp = Icmpv6Packet::new(bytes)?;
        let ty = icmp.get_icmpv6_type();
        let body = icmp.payload();

        let (echo, kind) = if ty == Icmpv6Types::EchoReply {
            (body, ReplyKind::Echo)
        } else if ty == Icmpv6Types::EchoRequest {
            return None;
        } else {
            let request = body.get(ERROR_PREAMBLE_LEN + IPV6_HEADER_LEN..)?;
            if *request.first()? != ICMPV6_ECHO_REQUEST {
                return None;
            }
            let status = ProbeStatus::from_icmpv6(ty.0, icmp.get_icmpv6_code().0);

            // Skip type, code and checksum of the quoted request
            (request.get(4..)?, ReplyKind::Error(status))
        };

        let header = echo.get(..4)?;
        Some(Self {
            id: u16::from_be_bytes([header[0], header[1]]),
            seq: u16::from_be_bytes([header[2], header[3]]),
            kind,
            source,
            ttl: 0,
        })
    }

    /// Return `true` if this packet answers the request with identifier `id` and sequence `seq`
    pub fn answers(&self, id: u16, seq: u16) -> bool {
        self.get_id() == id && self.get_sequence() == seq
    }

    /// Get the identifier of the answered request
    pub fn get_id(&self) -> u16 {
        self.id
    }

    /// Get the sequence number of the answered request
    pub fn get_sequence(&self) -> u16 {
        self.seq
    }

    pub fn get_kind(&self) -> ReplyKind {
        self.kind
    }

    /// Get the address the packet was sent from
    pub fn get_source(&self) -> IpAddr {
        self.source
    }

    /// Get the time to live the packet arrived with
    pub fn get_ttl(&self) -> u8 {
        self.ttl
    }
}
