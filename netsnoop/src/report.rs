use netsnoop_common::{decode, DecodeOutcome, DecodedPacket, TransportView};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io::{self, Write};

use crate::devices::InterfaceList;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One labelled field per line.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Owned, serializable summary of one decoded packet.
#[derive(Debug, Clone, Serialize)]
pub struct PacketRecord {
    pub timestamp: i64,
    pub transport: &'static str,
    pub src_mac: String,
    pub dst_mac: String,
    pub src_ip: String,
    pub dst_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmp_type: Option<u8>,
    /// IP total length.
    pub length: u16,
    pub payload_len: usize,
    pub payload_preview: String,
    pub short_capture: bool,
}

impl PacketRecord {
    /// The timestamp is taken here; the capture loop does not pass one in.
    pub fn from_packet(packet: &DecodedPacket<'_>) -> Self {
        let (src_port, dst_port) = packet.transport.ports().unzip();
        let (icmp_type, payload_len) = match packet.transport {
            TransportView::Icmp(icmp) => (Some(icmp.icmp_type()), 0),
            TransportView::Tcp(tcp) => (None, tcp.payload_len()),
            TransportView::Udp(udp) => (None, udp.payload_len()),
            TransportView::Unknown(_) => (None, 0),
        };
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            transport: packet.transport.name(),
            src_mac: mac_to_string(packet.ethernet.source()),
            dst_mac: mac_to_string(packet.ethernet.destination()),
            src_ip: packet.ip.source().to_string(),
            dst_ip: packet.ip.destination().to_string(),
            src_port,
            dst_port,
            icmp_type,
            length: packet.ip.total_length(),
            payload_len,
            payload_preview: hex_preview(packet.transport.payload_preview().unwrap_or_default()),
            short_capture: packet.ip.is_short_capture(),
        }
    }
}

/// A frame that did not decode, as written in JSON mode.
#[derive(Debug, Serialize)]
struct OutcomeRecord {
    timestamp: i64,
    outcome: DecodeOutcome,
}

/// Lowercase two-digit hex, space separated.
pub fn hex_preview(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn mac_to_string(mac: [u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

/// Decodes captured frames and writes a report for each one to `out`.
pub struct Reporter<W: Write> {
    out: W,
    format: OutputFormat,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self { out, format }
    }

    /// Per-frame capture handler. Returns `Ok(true)` when the frame was
    /// decoded and reported, which is what counts toward the capture target.
    ///
    /// Empty frames (read timeouts) and non-IPv4 traffic are skipped
    /// silently. Unknown protocols get one report line; truncated or
    /// malformed frames get one log line. None of these stop the capture.
    /// A failed write to the output does, and is returned as the error.
    pub fn handle_packet(&mut self, frame: &[u8]) -> io::Result<bool> {
        if frame.is_empty() {
            return Ok(false);
        }

        match decode(frame) {
            Ok(packet) => {
                self.write_packet(&packet)?;
                Ok(true)
            }
            Err(outcome) => {
                self.write_outcome(outcome)?;
                Ok(false)
            }
        }
    }

    fn write_packet(&mut self, packet: &DecodedPacket<'_>) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => self.write_json(&PacketRecord::from_packet(packet)),
            OutputFormat::Text => self.write_text(packet),
        }
    }

    fn write_text(&mut self, packet: &DecodedPacket<'_>) -> io::Result<()> {
        let out = &mut self.out;
        writeln!(out)?;
        writeln!(out, "Transport type: {}", packet.transport.name())?;
        writeln!(out, "Source IP: {}", packet.ip.source())?;
        writeln!(out, "Destination IP: {}", packet.ip.destination())?;

        match packet.transport {
            TransportView::Icmp(icmp) => {
                writeln!(out, "ICMP type value: {}", icmp.icmp_type())?;
            }
            transport => {
                if let Some((src, dst)) = transport.ports() {
                    writeln!(out, "Source port: {}", src)?;
                    writeln!(out, "Destination port: {}", dst)?;
                }
                write!(out, "Payload:")?;
                for byte in transport.payload_preview().unwrap_or_default() {
                    write!(out, " {byte:02x}")?;
                }
                writeln!(out)?;
            }
        }
        out.flush()
    }

    fn write_outcome(&mut self, outcome: DecodeOutcome) -> io::Result<()> {
        if let DecodeOutcome::Skipped(reason) = outcome {
            tracing::debug!("Skipping frame: {}", reason);
            return Ok(());
        }

        match self.format {
            OutputFormat::Json => self.write_json(&OutcomeRecord {
                timestamp: chrono::Utc::now().timestamp_millis(),
                outcome,
            }),
            OutputFormat::Text => match outcome {
                DecodeOutcome::Unknown(protocol) => {
                    writeln!(self.out, "Unexpected transport type: {}", protocol)?;
                    self.out.flush()
                }
                other => {
                    tracing::info!("{}", other);
                    Ok(())
                }
            },
        }
    }

    fn write_json<T: Serialize>(&mut self, record: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        writeln!(self.out)?;
        self.out.flush()
    }

    /// Print the capture devices as `Name: <name>` lines. In JSON mode stdout
    /// only carries packet and outcome records, so the list is logged instead.
    pub fn list_devices(&mut self, devices: &InterfaceList) -> io::Result<()> {
        for device in devices {
            match self.format {
                OutputFormat::Text => writeln!(self.out, "Name: {}", device.name)?,
                OutputFormat::Json => tracing::info!(
                    name = %device.name,
                    description = device.description.as_deref().unwrap_or(""),
                    addresses = ?device.addresses,
                    "Capture device"
                ),
            }
        }
        self.out.flush()
    }
}
