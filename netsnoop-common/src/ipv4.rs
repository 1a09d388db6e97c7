use core::net::Ipv4Addr;

use crate::DecodeOutcome;

/// Size of an IPv4 header without options.
pub const IPV4_MIN_HEADER_LEN: usize = 20;

/// Largest header an `ihl` nibble can describe (15 words).
pub const IPV4_MAX_HEADER_LEN: usize = 60;

pub const PROTO_ICMP: u8 = 1;
pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;

/// Borrowed view of an IPv4 header, options included.
///
/// The fixed 20-byte part is held as an array reference, so every field
/// accessor is a plain array read. `options` is whatever the `ihl` nibble
/// declares beyond those 20 bytes (at most 40).
#[derive(Debug, Clone, Copy)]
pub struct Ipv4Header<'a> {
    fixed: &'a [u8; IPV4_MIN_HEADER_LEN],
    options: &'a [u8],
    short_capture: bool,
}

impl<'a> Ipv4Header<'a> {
    /// Parse the header at the start of `data` (the bytes after the link
    /// header) and return it together with the transport bytes that follow.
    ///
    /// A total length larger than the captured data is not an error; the
    /// header is flagged as a short capture and nothing past `data` is read.
    pub fn parse(data: &'a [u8]) -> Result<(Self, &'a [u8]), DecodeOutcome> {
        let (fixed, _) = data
            .split_first_chunk::<IPV4_MIN_HEADER_LEN>()
            .ok_or(DecodeOutcome::Truncated("ipv4"))?;

        let header_len = ((fixed[0] & 0x0f) as usize) * 4;
        if header_len < IPV4_MIN_HEADER_LEN || header_len > data.len() {
            return Err(DecodeOutcome::Malformed("ip-header-length"));
        }

        let total_length = u16::from_be_bytes([fixed[2], fixed[3]]) as usize;
        let header = Self {
            fixed,
            options: &data[IPV4_MIN_HEADER_LEN..header_len],
            short_capture: total_length > data.len(),
        };
        Ok((header, &data[header_len..]))
    }

    pub fn version(&self) -> u8 {
        self.fixed[0] >> 4
    }

    /// Header length in 32-bit words.
    pub fn ihl(&self) -> u8 {
        self.fixed[0] & 0x0f
    }

    /// Header length in bytes (`ihl * 4`).
    pub fn header_len(&self) -> usize {
        self.ihl() as usize * 4
    }

    pub fn tos(&self) -> u8 {
        self.fixed[1]
    }

    pub fn total_length(&self) -> u16 {
        u16::from_be_bytes([self.fixed[2], self.fixed[3]])
    }

    pub fn identification(&self) -> u16 {
        u16::from_be_bytes([self.fixed[4], self.fixed[5]])
    }

    /// The three flag bits (reserved, DF, MF).
    pub fn flags(&self) -> u8 {
        self.fixed[6] >> 5
    }

    pub fn fragment_offset(&self) -> u16 {
        u16::from_be_bytes([self.fixed[6], self.fixed[7]]) & 0x1fff
    }

    pub fn ttl(&self) -> u8 {
        self.fixed[8]
    }

    pub fn protocol(&self) -> u8 {
        self.fixed[9]
    }

    pub fn checksum(&self) -> u16 {
        u16::from_be_bytes([self.fixed[10], self.fixed[11]])
    }

    pub fn source(&self) -> Ipv4Addr {
        Ipv4Addr::new(self.fixed[12], self.fixed[13], self.fixed[14], self.fixed[15])
    }

    pub fn destination(&self) -> Ipv4Addr {
        Ipv4Addr::new(self.fixed[16], self.fixed[17], self.fixed[18], self.fixed[19])
    }

    pub fn options(&self) -> &'a [u8] {
        self.options
    }

    /// True when the header declares more bytes than were captured.
    pub fn is_short_capture(&self) -> bool {
        self.short_capture
    }

    /// Bytes the header declares after itself, or `None` when the total
    /// length is smaller than the header.
    pub fn payload_len(&self) -> Option<usize> {
        (self.total_length() as usize).checked_sub(self.header_len())
    }
}
