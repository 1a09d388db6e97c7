use crate::ipv4::{Ipv4Header, PROTO_ICMP, PROTO_TCP, PROTO_UDP};
use crate::{preview, DecodeOutcome};

pub const ICMP_HEADER_LEN: usize = 8;
pub const TCP_MIN_HEADER_LEN: usize = 20;
pub const UDP_HEADER_LEN: usize = 8;

/// Transport layer of an IPv4 packet, selected by the protocol field.
#[derive(Debug, Clone, Copy)]
pub enum TransportView<'a> {
    Icmp(IcmpHeader<'a>),
    Tcp(TcpHeader<'a>),
    Udp(UdpHeader<'a>),
    /// Protocol number this decoder does not interpret.
    Unknown(u8),
}

impl<'a> TransportView<'a> {
    /// Decode the transport bytes `data` that follow `ip`.
    pub fn parse(ip: &Ipv4Header<'a>, data: &'a [u8]) -> Result<Self, DecodeOutcome> {
        match ip.protocol() {
            PROTO_ICMP => IcmpHeader::parse(data).map(Self::Icmp),
            PROTO_TCP => TcpHeader::parse(ip, data).map(Self::Tcp),
            PROTO_UDP => UdpHeader::parse(ip, data).map(Self::Udp),
            other => Ok(Self::Unknown(other)),
        }
    }

    /// Label used in reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Icmp(_) => "ICMP",
            Self::Tcp(_) => "TCP",
            Self::Udp(_) => "UDP",
            Self::Unknown(_) => "Unknown",
        }
    }

    /// `(source, destination)` ports for TCP and UDP.
    pub fn ports(&self) -> Option<(u16, u16)> {
        match self {
            Self::Tcp(tcp) => Some((tcp.source_port(), tcp.destination_port())),
            Self::Udp(udp) => Some((udp.source_port(), udp.destination_port())),
            _ => None,
        }
    }

    /// Captured payload bytes for TCP and UDP.
    pub fn payload(&self) -> Option<&'a [u8]> {
        match self {
            Self::Tcp(tcp) => Some(tcp.payload()),
            Self::Udp(udp) => Some(udp.payload()),
            _ => None,
        }
    }

    /// First bytes of the payload, at most [`crate::PAYLOAD_PREVIEW_LEN`].
    pub fn payload_preview(&self) -> Option<&'a [u8]> {
        self.payload().map(preview)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IcmpHeader<'a> {
    bytes: &'a [u8; ICMP_HEADER_LEN],
}

impl<'a> IcmpHeader<'a> {
    fn parse(data: &'a [u8]) -> Result<Self, DecodeOutcome> {
        let (bytes, _) = data
            .split_first_chunk::<ICMP_HEADER_LEN>()
            .ok_or(DecodeOutcome::Malformed("icmp-header"))?;
        Ok(Self { bytes })
    }

    pub fn icmp_type(&self) -> u8 {
        self.bytes[0]
    }

    pub fn code(&self) -> u8 {
        self.bytes[1]
    }

    pub fn checksum(&self) -> u16 {
        u16::from_be_bytes([self.bytes[2], self.bytes[3]])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TcpHeader<'a> {
    fixed: &'a [u8; TCP_MIN_HEADER_LEN],
    options: &'a [u8],
    payload: &'a [u8],
    payload_len: usize,
}

impl<'a> TcpHeader<'a> {
    fn parse(ip: &Ipv4Header<'a>, data: &'a [u8]) -> Result<Self, DecodeOutcome> {
        let (fixed, _) = data
            .split_first_chunk::<TCP_MIN_HEADER_LEN>()
            .ok_or(DecodeOutcome::Malformed("tcp-header"))?;

        let header_len = ((fixed[12] >> 4) as usize) * 4;
        if header_len < TCP_MIN_HEADER_LEN || header_len > data.len() {
            return Err(DecodeOutcome::Malformed("tcp-header"));
        }

        let payload_len = ip
            .payload_len()
            .and_then(|len| len.checked_sub(header_len))
            .ok_or(DecodeOutcome::Malformed("tcp-length"))?;

        let after = &data[header_len..];
        Ok(Self {
            fixed,
            options: &data[TCP_MIN_HEADER_LEN..header_len],
            payload: &after[..payload_len.min(after.len())],
            payload_len,
        })
    }

    pub fn source_port(&self) -> u16 {
        u16::from_be_bytes([self.fixed[0], self.fixed[1]])
    }

    pub fn destination_port(&self) -> u16 {
        u16::from_be_bytes([self.fixed[2], self.fixed[3]])
    }

    pub fn sequence(&self) -> u32 {
        u32::from_be_bytes([self.fixed[4], self.fixed[5], self.fixed[6], self.fixed[7]])
    }

    pub fn acknowledgement(&self) -> u32 {
        u32::from_be_bytes([self.fixed[8], self.fixed[9], self.fixed[10], self.fixed[11]])
    }

    /// Data offset in bytes.
    pub fn header_len(&self) -> usize {
        ((self.fixed[12] >> 4) as usize) * 4
    }

    /// CWR..FIN flag byte.
    pub fn flags(&self) -> u8 {
        self.fixed[13]
    }

    pub fn window(&self) -> u16 {
        u16::from_be_bytes([self.fixed[14], self.fixed[15]])
    }

    pub fn options(&self) -> &'a [u8] {
        self.options
    }

    /// Payload length declared by the IP header. Can exceed
    /// `payload().len()` when the frame was cut short by the snapshot length.
    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UdpHeader<'a> {
    bytes: &'a [u8; UDP_HEADER_LEN],
    payload: &'a [u8],
}

impl<'a> UdpHeader<'a> {
    fn parse(ip: &Ipv4Header<'a>, data: &'a [u8]) -> Result<Self, DecodeOutcome> {
        let (bytes, after) = data
            .split_first_chunk::<UDP_HEADER_LEN>()
            .ok_or(DecodeOutcome::Malformed("udp-header"))?;

        let length = u16::from_be_bytes([bytes[4], bytes[5]]) as usize;
        let payload_len = length
            .checked_sub(UDP_HEADER_LEN)
            .ok_or(DecodeOutcome::Malformed("udp-length"))?;
        match ip.payload_len() {
            Some(declared) if length <= declared => {}
            _ => return Err(DecodeOutcome::Malformed("udp-length")),
        }

        Ok(Self {
            bytes,
            payload: &after[..payload_len.min(after.len())],
        })
    }

    pub fn source_port(&self) -> u16 {
        u16::from_be_bytes([self.bytes[0], self.bytes[1]])
    }

    pub fn destination_port(&self) -> u16 {
        u16::from_be_bytes([self.bytes[2], self.bytes[3]])
    }

    /// UDP length field, header included.
    pub fn length(&self) -> u16 {
        u16::from_be_bytes([self.bytes[4], self.bytes[5]])
    }

    pub fn checksum(&self) -> u16 {
        u16::from_be_bytes([self.bytes[6], self.bytes[7]])
    }

    pub fn payload_len(&self) -> usize {
        self.length() as usize - UDP_HEADER_LEN
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }
}
