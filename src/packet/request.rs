use pnet::packet::{
    icmp::{echo_request::MutableEchoRequestPacket, IcmpTypes},
    icmpv6::{Icmpv6Types, MutableIcmpv6Packet},
    Packet,
};
use pnet::util::checksum;
use std::io;
use std::net::IpAddr;

/// Length of the ICMP/ICMPv6 echo header
pub(crate) const ECHO_HEADER_LEN: usize = 8;

/// Length of an IPv4 header without options
pub(crate) const IPV4_HEADER_LEN: usize = 20;

/// A ping packet before send-out
///
/// Only the ICMP part is built here, the kernel adds the IP header and fragments the packet if
/// it exceeds the path MTU. ICMPv6 requests leave the checksum to the kernel, as it covers the
/// IPv6 pseudo header.
#[derive(Debug)]
pub(crate) enum RequestPacket {
    Icmp(MutableEchoRequestPacket<'static>),
    Icmpv6(MutableIcmpv6Packet<'static>),
}

impl RequestPacket {
    /// Create new echo request packet for the destination
    ///
    /// # Errors
    ///
    /// Fails if the payload does not fit into a single IP packet.
    pub fn new(dest: IpAddr, id: u16, sequence: u16, payload: &[u8]) -> Result<Self, io::Error> {
        match dest {
            IpAddr::V4(_) => Self::echo_v4(id, sequence, payload),
            IpAddr::V6(_) => Self::echo_v6(id, sequence, payload),
        }
    }

    fn echo_v4(id: u16, sequence: u16, payload: &[u8]) -> Result<Self, io::Error> {
        let icmp_len = ECHO_HEADER_LEN + payload.len();
        if IPV4_HEADER_LEN + icmp_len > u16::max_value() as usize {
            return Err(too_large());
        }

        let mut echo = MutableEchoRequestPacket::owned(vec![0; icmp_len]).ok_or_else(too_large)?;
        echo.set_icmp_type(IcmpTypes::EchoRequest);
        echo.set_identifier(id);
        echo.set_sequence_number(sequence);
        echo.set_payload(payload);
        echo.set_checksum(checksum(echo.packet(), 1));

        Ok(Self::Icmp(echo))
    }

    fn echo_v6(id: u16, sequence: u16, payload: &[u8]) -> Result<Self, io::Error> {
        let mut pkg =
            MutableIcmpv6Packet::owned(vec![0; ECHO_HEADER_LEN + payload.len()]).ok_or_else(too_large)?;
        pkg.set_icmpv6_type(Icmpv6Types::EchoRequest);

        // Identifier and sequence number are part of the ICMPv6 body in pnet's layout
        let body = [&id.to_be_bytes()[..], &sequence.to_be_bytes()[..], payload].concat();
        pkg.set_payload(&body);
        Ok(Self::Icmpv6(pkg))
    }
}

impl Packet for RequestPacket {
    fn packet(&self) -> &[u8] {
        match self {
            Self::Icmp(pkg) => pkg.packet(),
            Self::Icmpv6(pkg) => pkg.packet(),
        }
    }

    fn payload(&self) -> &[u8] {
        match self {
            Self::Icmp(pkg) => pkg.payload(),
            Self::Icmpv6(pkg) => pkg.payload(),
        }
    }
}

fn too_large() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, "payload too large for a single packet")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::payload;
    use pnet::packet::icmp::{echo_request::EchoRequestPacket, IcmpPacket};
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn create_icmp_echo_request_packet() {
        let dest = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
        let data = payload(20);
        let pkg = RequestPacket::new(dest, 0x1234, 7, &data)
            .expect("Failed creating a new echo request packet");

        // 8 bytes ICMP header + 20 bytes payload, no IP header
        assert_eq!(pkg.packet().len(), 28);

        let echo = EchoRequestPacket::new(pkg.packet()).unwrap();
        assert_eq!(echo.get_icmp_type(), IcmpTypes::EchoRequest);
        assert_eq!(echo.get_identifier(), 0x1234);
        assert_eq!(echo.get_sequence_number(), 7);
        assert_eq!(echo.payload(), &data[..]);

        // Checksum covers the whole ICMP message
        let icmp = IcmpPacket::new(pkg.packet()).unwrap();
        assert_eq!(checksum(icmp.packet(), 1), icmp.get_checksum());
    }

    #[test]
    fn request_beyond_mtu_carries_no_ip_header() {
        let dest = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));
        let data = payload(2000);
        let pkg = RequestPacket::new(dest, 1, 1, &data).unwrap();

        let packet = pkg.packet();
        assert_eq!(packet.len(), 2008);

        // Starts with the ICMP type, not with an IPv4 version nibble
        assert_eq!(packet[0], 8);
        assert_eq!(&packet[8..], &data[..]);
    }

    #[test]
    fn create_icmpv6_echo_request_packet() {
        let dest = IpAddr::V6("::1".parse::<Ipv6Addr>().unwrap());
        let data = payload(20);
        let pkg = RequestPacket::new(dest, 3, 4, &data)
            .expect("Failed creating a new echo request packet");

        let packet = pkg.packet();

        // ICMPv6 echo request type
        assert_eq!(packet[0], 128);

        // The 5 - 6th byte are reserved for the identifier
        assert_eq!(packet[5], 3);

        // The 7 - 8th byte are reserved for the sequence number
        assert_eq!(packet[7], 4);

        // 20 bytes payload + 8 bytes header
        assert_eq!(packet.len(), 28);
        assert_eq!(&packet[8..], &data[..]);
    }

    #[test]
    fn largest_payload_fits() {
        let data = payload(crate::MAX_SIZE);
        let dest = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let pkg = RequestPacket::new(dest, 1, 1, &data).unwrap();
        assert_eq!(pkg.packet().len(), crate::MAX_SIZE + 8);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let data = vec![0u8; 70_000];
        let dest = IpAddr::V4(Ipv4Addr::LOCALHOST);
        assert!(RequestPacket::new(dest, 1, 1, &data).is_err());
    }
}
