use crate::config::Config;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Filter used when none is given, and what `"all"` expands to.
pub const DEFAULT_FILTER: &str = "udp or tcp or icmp";

/// Map the `"all"` shorthand (and an empty expression) to [`DEFAULT_FILTER`].
pub fn normalize_filter(expression: &str) -> &str {
    let trimmed = expression.trim();
    if trimmed.is_empty() || trimmed == "all" {
        DEFAULT_FILTER
    } else {
        trimmed
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("cannot open {interface}: {reason}")]
    Open { interface: String, reason: String },
    #[error("filter compile failed: {0}")]
    CompileFailed(String),
    #[error("filter install failed: {0}")]
    FilterInstallFailed(String),
    #[error("capture read failed: {0}")]
    ReadFailed(String),
    #[error("no packet handler registered")]
    MissingHandler,
    #[error("packet handler failed")]
    HandlerFailed(#[source] io::Error),
}

/// Live capture handle settings.
#[derive(Clone, Debug)]
pub struct CaptureOptions {
    pub snaplen: i32,
    pub promiscuous: bool,
    pub timeout_ms: i32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            snaplen: 65535,
            promiscuous: true,
            timeout_ms: 1000,
        }
    }
}

impl From<&Config> for CaptureOptions {
    fn from(config: &Config) -> Self {
        Self {
            snaplen: config.snaplen,
            promiscuous: config.promiscuous,
            timeout_ms: config.timeout_ms,
        }
    }
}

/// Result of one blocking read.
#[derive(Debug)]
pub enum NextFrame<'a> {
    Frame(&'a [u8]),
    /// The read timeout elapsed with nothing captured.
    Timeout,
    /// The source has no more frames (savefile end, broken loop).
    Exhausted,
}

/// The capture primitive a [`CaptureSession`] drives.
///
/// `compile` and `install` are separate so that a failed compile never
/// touches the handle.
pub trait CaptureBackend {
    type Program;

    fn compile(&mut self, expression: &str) -> Result<Self::Program, SessionError>;
    fn install(&mut self, program: &Self::Program) -> Result<(), SessionError>;
    fn next_frame(&mut self) -> Result<NextFrame<'_>, SessionError>;
}

/// Filter expression libpcap accepted at compile time.
#[derive(Debug)]
pub struct PcapProgram {
    expression: String,
}

/// libpcap live capture via the `pcap` crate. The handle is closed when
/// this is dropped.
pub struct PcapBackend {
    capture: pcap::Capture<pcap::Active>,
}

impl PcapBackend {
    pub fn open(interface: &str, options: &CaptureOptions) -> Result<Self, SessionError> {
        let open_error = |e: pcap::Error| SessionError::Open {
            interface: interface.to_string(),
            reason: e.to_string(),
        };
        let capture = pcap::Capture::from_device(interface)
            .map_err(open_error)?
            .promisc(options.promiscuous)
            .snaplen(options.snaplen)
            .timeout(options.timeout_ms)
            .open()
            .map_err(open_error)?;
        Ok(Self { capture })
    }
}

impl CaptureBackend for PcapBackend {
    type Program = PcapProgram;

    fn compile(&mut self, expression: &str) -> Result<PcapProgram, SessionError> {
        let program = self
            .capture
            .compile(expression, true)
            .map_err(|e| SessionError::CompileFailed(e.to_string()))?;
        tracing::debug!(
            "Filter {:?} compiled to {} BPF instructions",
            expression,
            program.get_instructions().len()
        );
        Ok(PcapProgram {
            expression: expression.to_string(),
        })
    }

    fn install(&mut self, program: &PcapProgram) -> Result<(), SessionError> {
        self.capture
            .filter(&program.expression, true)
            .map_err(|e| SessionError::FilterInstallFailed(e.to_string()))
    }

    fn next_frame(&mut self) -> Result<NextFrame<'_>, SessionError> {
        match self.capture.next_packet() {
            Ok(packet) => Ok(NextFrame::Frame(packet.data)),
            Err(pcap::Error::TimeoutExpired) => Ok(NextFrame::Timeout),
            Err(pcap::Error::NoMorePackets) => Ok(NextFrame::Exhausted),
            Err(e) => Err(SessionError::ReadFailed(e.to_string())),
        }
    }
}

/// Counters kept by [`CaptureSession::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Frames delivered by the backend.
    pub frames: u64,
    /// Frames the handler reported as accepted.
    pub accepted: u64,
    /// Reads that timed out.
    pub timeouts: u64,
}

type Handler = Box<dyn FnMut(&[u8]) -> io::Result<bool>>;

/// A capture handle bound to one interface plus the filter and handler
/// installed on it.
///
/// Setup steps consume the session and return `Result<Self, SessionError>`,
/// so they chain with `and_then`. The first failing step ends the chain and
/// drops the session, which releases the handle.
pub struct CaptureSession<B: CaptureBackend = PcapBackend> {
    interface: String,
    backend: B,
    program: Option<B::Program>,
    handler: Option<Handler>,
    running: Option<Arc<AtomicBool>>,
    stats: CaptureStats,
}

impl CaptureSession<PcapBackend> {
    /// Open a live capture on `interface`.
    pub fn open(interface: &str, options: &CaptureOptions) -> Result<Self, SessionError> {
        let backend = PcapBackend::open(interface, options)?;
        tracing::info!(
            "Capturing on device: {} (snaplen={}, promisc={}, timeout={}ms)",
            interface,
            options.snaplen,
            options.promiscuous,
            options.timeout_ms
        );
        Ok(Self::with_backend(interface, backend))
    }
}

impl<B: CaptureBackend> CaptureSession<B> {
    pub fn with_backend(interface: &str, backend: B) -> Self {
        Self {
            interface: interface.to_string(),
            backend,
            program: None,
            handler: None,
            running: None,
            stats: CaptureStats::default(),
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats
    }

    /// Compile `expression` after normalizing it with [`normalize_filter`].
    pub fn compile(mut self, expression: &str) -> Result<Self, SessionError> {
        let expression = normalize_filter(expression);
        let program = self.backend.compile(expression)?;
        tracing::debug!("Compiled filter {:?} on {}", expression, self.interface);
        self.program = Some(program);
        Ok(self)
    }

    /// Install the compiled filter on the handle.
    pub fn install_filter(mut self) -> Result<Self, SessionError> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| SessionError::FilterInstallFailed("no compiled program".into()))?;
        self.backend.install(program)?;
        tracing::debug!("Filter installed on {}", self.interface);
        Ok(self)
    }

    /// Register the per-frame callback, replacing any earlier one.
    ///
    /// The callback returns `Ok(true)` when the frame counts toward the
    /// target passed to [`run`](Self::run). An `Err` ends the run with
    /// [`SessionError::HandlerFailed`]. A timed-out read is delivered as an
    /// empty frame.
    pub fn set_handler<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&[u8]) -> io::Result<bool> + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Stop the loop once `running` is cleared. Checked between reads, so the
    /// read timeout bounds how long a stop request can wait.
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = Some(running);
        self
    }

    /// Feed frames to the handler until `target` of them are accepted, the
    /// running flag is cleared, the backend runs out, or the handler fails.
    /// `None` means no target.
    pub fn run(mut self, target: Option<u64>) -> Result<Self, SessionError> {
        let handler = self.handler.as_mut().ok_or(SessionError::MissingHandler)?;

        while target.map_or(true, |t| self.stats.accepted < t)
            && self
                .running
                .as_ref()
                .map_or(true, |r| r.load(Ordering::Relaxed))
        {
            let accepted = match self.backend.next_frame() {
                Ok(NextFrame::Frame(data)) => {
                    self.stats.frames += 1;
                    handler(data)
                }
                Ok(NextFrame::Timeout) => {
                    self.stats.timeouts += 1;
                    handler(&[])
                }
                Ok(NextFrame::Exhausted) => {
                    tracing::debug!("No more packets on {}", self.interface);
                    break;
                }
                Err(e) => {
                    tracing::error!(
                        "Capture on {} stopped after {} frames: {}",
                        self.interface,
                        self.stats.frames,
                        e
                    );
                    return Err(e);
                }
            };
            match accepted {
                Ok(true) => self.stats.accepted += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        "Handler failed on {} after {} frames: {}",
                        self.interface,
                        self.stats.frames,
                        e
                    );
                    return Err(SessionError::HandlerFailed(e));
                }
            }
        }

        Ok(self)
    }
}

impl<B: CaptureBackend> Drop for CaptureSession<B> {
    fn drop(&mut self) {
        tracing::debug!("Releasing capture handle on {}", self.interface);
    }
}
