#![cfg_attr(not(test), no_std)]

//! Zero-copy decoding of captured Ethernet frames.
//!
//! [`decode`] walks Ethernet -> IPv4 -> ICMP/TCP/UDP and hands back borrowed
//! views into the frame. Captured bytes come straight off the wire, so every
//! layer checks its length before a field is read and fields are only ever
//! read through fixed-size array references. Multi-byte fields are big-endian
//! regardless of the host. The input is never copied or mutated.
//!
//! Frames that do not decode are described by a [`DecodeOutcome`] rather than
//! a panic; callers decide whether to count, log or drop them.

mod ethernet;
mod ipv4;
mod transport;

use core::fmt;

pub use ethernet::{EthernetHeader, ETHERNET_HEADER_LEN, ETHERTYPE_IPV4};
pub use ipv4::{
    Ipv4Header, IPV4_MAX_HEADER_LEN, IPV4_MIN_HEADER_LEN, PROTO_ICMP, PROTO_TCP, PROTO_UDP,
};
pub use transport::{
    IcmpHeader, TcpHeader, TransportView, UdpHeader, ICMP_HEADER_LEN, TCP_MIN_HEADER_LEN,
    UDP_HEADER_LEN,
};

/// Maximum number of payload bytes exposed for display.
pub const PAYLOAD_PREVIEW_LEN: usize = 16;

/// Why a frame did not produce a [`DecodedPacket`].
///
/// `Skipped` and `Unknown` are ordinary traffic the decoder does not cover;
/// `Truncated` and `Malformed` mean the header fields and the captured bytes
/// disagree. The string names the layer or field that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "user", derive(serde::Serialize))]
#[cfg_attr(
    feature = "user",
    serde(tag = "kind", content = "detail", rename_all = "snake_case")
)]
pub enum DecodeOutcome {
    Truncated(&'static str),
    Skipped(&'static str),
    Malformed(&'static str),
    Unknown(u8),
}

impl DecodeOutcome {
    /// True for the outcomes that describe a broken frame.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Truncated(_) | Self::Malformed(_))
    }
}

impl fmt::Display for DecodeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated(layer) => write!(f, "truncated frame: {layer}"),
            Self::Skipped(reason) => write!(f, "skipped frame: {reason}"),
            Self::Malformed(field) => write!(f, "malformed frame: {field}"),
            Self::Unknown(protocol) => write!(f, "unexpected transport type: {protocol}"),
        }
    }
}

/// One frame decoded down to its transport header.
///
/// `transport` is always ICMP, TCP or UDP; other protocol numbers are
/// reported as [`DecodeOutcome::Unknown`] instead.
#[derive(Debug, Clone, Copy)]
pub struct DecodedPacket<'a> {
    pub ethernet: EthernetHeader<'a>,
    pub ip: Ipv4Header<'a>,
    pub transport: TransportView<'a>,
}

/// Decode one Ethernet frame.
pub fn decode(frame: &[u8]) -> Result<DecodedPacket<'_>, DecodeOutcome> {
    let (ethernet, l3) = EthernetHeader::parse(frame)?;
    if !ethernet.is_ipv4() {
        return Err(DecodeOutcome::Skipped("non-ipv4"));
    }

    let (ip, l4) = Ipv4Header::parse(l3)?;
    // Only the first fragment carries the transport header.
    if ip.fragment_offset() != 0 {
        return Err(DecodeOutcome::Skipped("ipv4-fragment"));
    }
    let transport = match TransportView::parse(&ip, l4)? {
        TransportView::Unknown(protocol) => return Err(DecodeOutcome::Unknown(protocol)),
        known => known,
    };

    Ok(DecodedPacket {
        ethernet,
        ip,
        transport,
    })
}

/// The first [`PAYLOAD_PREVIEW_LEN`] bytes of `payload`, or all of it when
/// shorter.
pub fn preview(payload: &[u8]) -> &[u8] {
    &payload[..payload.len().min(PAYLOAD_PREVIEW_LEN)]
}
