//! Frame builders for tests of code that consumes raw packets.

use crate::parsing::packet::{ETH_HDR_LEN, ETH_P_IP, IPV4_MIN_HDR_LEN, TCP_HDR_LEN, UDP_HDR_LEN};

pub const TEST_SRC_PORT: u16 = 40000;

/// Ethernet + IPv4 without options + a transport header of the right size
/// for `proto` (UDP: 8 bytes, anything else: 20). Fields the classifier does
/// not look at are zero.
pub fn frame(proto: u8, dst_port: u16) -> Vec<u8> {
    let mut frame = vec![0u8; ETH_HDR_LEN];
    frame[12..14].copy_from_slice(&ETH_P_IP.to_be_bytes());
    let mut ip = [0u8; IPV4_MIN_HDR_LEN];
    ip[0] = 0x45;
    ip[9] = proto;
    frame.extend_from_slice(&ip);
    let mut l4 = vec![0u8; if proto == 17 { UDP_HDR_LEN } else { TCP_HDR_LEN }];
    l4[0..2].copy_from_slice(&TEST_SRC_PORT.to_be_bytes());
    l4[2..4].copy_from_slice(&dst_port.to_be_bytes());
    frame.extend_from_slice(&l4);
    frame
}

pub fn tcp_frame(dst_port: u16) -> Vec<u8> {
    frame(6, dst_port)
}

pub fn udp_frame(dst_port: u16) -> Vec<u8> {
    frame(17, dst_port)
}

/// A frame with another ethertype (ARP).
pub fn arp_frame() -> Vec<u8> {
    let mut frame = tcp_frame(0);
    frame[12..14].copy_from_slice(&0x0806u16.to_be_bytes());
    frame
}
