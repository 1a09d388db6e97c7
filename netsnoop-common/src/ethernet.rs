use crate::DecodeOutcome;

/// Length of an untagged Ethernet II header.
pub const ETHERNET_HEADER_LEN: usize = 14;

/// EtherType carried by IPv4 frames.
pub const ETHERTYPE_IPV4: u16 = 0x0800;

/// Borrowed view of the 14-byte Ethernet II header at the start of a frame.
#[derive(Debug, Clone, Copy)]
pub struct EthernetHeader<'a> {
    bytes: &'a [u8; ETHERNET_HEADER_LEN],
}

impl<'a> EthernetHeader<'a> {
    /// Split `frame` into its Ethernet header and the bytes that follow it.
    pub fn parse(frame: &'a [u8]) -> Result<(Self, &'a [u8]), DecodeOutcome> {
        let (bytes, rest) = frame
            .split_first_chunk::<ETHERNET_HEADER_LEN>()
            .ok_or(DecodeOutcome::Truncated("ethernet"))?;
        Ok((Self { bytes }, rest))
    }

    pub fn destination(&self) -> [u8; 6] {
        [
            self.bytes[0],
            self.bytes[1],
            self.bytes[2],
            self.bytes[3],
            self.bytes[4],
            self.bytes[5],
        ]
    }

    pub fn source(&self) -> [u8; 6] {
        [
            self.bytes[6],
            self.bytes[7],
            self.bytes[8],
            self.bytes[9],
            self.bytes[10],
            self.bytes[11],
        ]
    }

    pub fn ether_type(&self) -> u16 {
        u16::from_be_bytes([self.bytes[12], self.bytes[13]])
    }

    pub fn is_ipv4(&self) -> bool {
        self.ether_type() == ETHERTYPE_IPV4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_header() {
        let mut frame = [0u8; 20];
        frame[..6].copy_from_slice(&[0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb]);
        frame[6..12].copy_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        frame[12..14].copy_from_slice(&[0x08, 0x00]);

        let (eth, rest) = EthernetHeader::parse(&frame).unwrap();
        assert_eq!(eth.destination(), [0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb]);
        assert_eq!(eth.source(), [0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(eth.ether_type(), ETHERTYPE_IPV4);
        assert!(eth.is_ipv4());
        assert_eq!(rest.len(), 6);
    }

    #[test]
    fn test_short_frame_is_truncated() {
        for len in 0..ETHERNET_HEADER_LEN {
            let frame = [0u8; ETHERNET_HEADER_LEN];
            let err = EthernetHeader::parse(&frame[..len]).unwrap_err();
            assert_eq!(err, DecodeOutcome::Truncated("ethernet"));
        }
    }

    #[test]
    fn test_arp_is_not_ipv4() {
        let mut frame = [0u8; ETHERNET_HEADER_LEN];
        frame[12..14].copy_from_slice(&[0x08, 0x06]);
        let (eth, rest) = EthernetHeader::parse(&frame).unwrap();
        assert!(!eth.is_ipv4());
        assert!(rest.is_empty());
    }
}
