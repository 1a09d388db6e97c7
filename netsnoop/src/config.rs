use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::capture::{normalize_filter, DEFAULT_FILTER};
use crate::report::OutputFormat;

/// Application configuration, loadable from CLI or YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Network interface to capture on.
    #[serde(default)]
    pub interface: Option<String>,

    /// Stop after this many reported packets (None or negative = run until interrupted).
    #[serde(default)]
    pub count: Option<i64>,

    /// Capture filter expression. "all" is shorthand for the default.
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Snapshot length: maximum bytes kept per frame.
    #[serde(default = "default_snaplen")]
    pub snaplen: i32,

    /// Put the interface in promiscuous mode.
    #[serde(default = "default_promiscuous")]
    pub promiscuous: bool,

    /// Read timeout in milliseconds. Also bounds how long Ctrl-C takes to stop the capture.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: i32,

    /// Report format on stdout.
    #[serde(default)]
    pub format: OutputFormat,

    /// Quiet mode (suppress non-error logs).
    #[serde(default)]
    pub quiet: bool,

    /// Print the device list and exit without capturing.
    #[serde(default)]
    pub list_only: bool,
}

fn default_filter() -> String {
    DEFAULT_FILTER.to_string()
}

fn default_snaplen() -> i32 {
    65535
}

fn default_promiscuous() -> bool {
    true
}

fn default_timeout_ms() -> i32 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: None,
            count: None,
            filter: default_filter(),
            snaplen: default_snaplen(),
            promiscuous: default_promiscuous(),
            timeout_ms: default_timeout_ms(),
            format: OutputFormat::default(),
            quiet: false,
            list_only: false,
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.filter = normalize_filter(&config.filter).to_string();
        Ok(config)
    }

    /// Merge CLI args into config. Any flag given on the command line wins,
    /// even when it repeats the built-in default.
    pub fn merge_cli(&mut self, cli: &CliArgs) {
        if cli.interface.is_some() {
            self.interface = cli.interface.clone();
        }
        if cli.count.is_some() {
            self.count = cli.count;
        }
        if let Some(ref filter) = cli.filter {
            self.filter = normalize_filter(filter).to_string();
        }
        if let Some(snaplen) = cli.snaplen {
            self.snaplen = snaplen;
        }
        if cli.no_promisc {
            self.promiscuous = false;
        }
        if let Some(timeout_ms) = cli.timeout_ms {
            self.timeout_ms = timeout_ms;
        }
        if let Some(format) = cli.format {
            self.format = format;
        }
        if cli.quiet {
            self.quiet = true;
        }
        if cli.list_only {
            self.list_only = true;
        }
    }

    /// Number of accepted packets to capture, `None` for no limit.
    pub fn target_count(&self) -> Option<u64> {
        self.count.and_then(|n| u64::try_from(n).ok())
    }
}

use clap::Parser;

/// netsnoop: live packet capture with IPv4/ICMP/TCP/UDP header decoding
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    /// Network interface to capture on (e.g., eth0).
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Number of packets to report before exiting (negative = unlimited).
    #[arg(short = 'c', long, allow_negative_numbers = true)]
    pub count: Option<i64>,

    /// Capture filter in pcap syntax ("all" = udp or tcp or icmp) [default: udp or tcp or icmp]
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Path to YAML config file.
    #[arg(long)]
    pub config: Option<String>,

    /// Snapshot length in bytes [default: 65535]
    #[arg(long)]
    pub snaplen: Option<i32>,

    /// Do not put the interface in promiscuous mode.
    #[arg(long)]
    pub no_promisc: bool,

    /// Read timeout in milliseconds [default: 1000]
    #[arg(long)]
    pub timeout_ms: Option<i32>,

    /// Report format [default: text]
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Quiet mode (suppress non-error logs).
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// List capture devices and exit.
    #[arg(long)]
    pub list_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("netsnoop").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.filter, "udp or tcp or icmp");
        assert_eq!(config.snaplen, 65535);
        assert!(config.promiscuous);
        assert_eq!(config.target_count(), None);
        assert_eq!(config.format, OutputFormat::Text);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = parse(&["-i", "eth0", "-c", "5", "-f", "tcp port 443"]);
        let mut config = Config::default();
        config.merge_cli(&cli);

        assert_eq!(config.interface.as_deref(), Some("eth0"));
        assert_eq!(config.target_count(), Some(5));
        assert_eq!(config.filter, "tcp port 443");
    }

    #[test]
    fn test_all_filter_normalized() {
        let cli = parse(&["--interface", "lo", "--filter", "all"]);
        let mut config = Config::default();
        config.merge_cli(&cli);
        assert_eq!(config.filter, DEFAULT_FILTER);
    }

    #[test]
    fn test_negative_count_is_unbounded() {
        let cli = parse(&["-i", "lo", "-c", "-1"]);
        let mut config = Config::default();
        config.merge_cli(&cli);
        assert_eq!(config.count, Some(-1));
        assert_eq!(config.target_count(), None);
    }

    #[test]
    fn test_yaml_then_cli_override() {
        let yaml = "interface: eth1\ncount: 10\nfilter: udp port 53\npromiscuous: false\nformat: json\n";
        let mut config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.snaplen, 65535);
        assert_eq!(config.timeout_ms, 1000);
        assert!(!config.promiscuous);
        assert_eq!(config.format, OutputFormat::Json);

        let cli = parse(&["-i", "eth2", "--timeout-ms", "200"]);
        config.merge_cli(&cli);
        assert_eq!(config.interface.as_deref(), Some("eth2"));
        assert_eq!(config.target_count(), Some(10));
        assert_eq!(config.filter, "udp port 53");
        assert_eq!(config.timeout_ms, 200);
        assert_eq!(config.format, OutputFormat::Json);
    }

    #[test]
    fn test_explicit_defaults_override_yaml() {
        let yaml = "filter: udp port 53\nsnaplen: 128\ntimeout_ms: 250\nformat: json\n";
        let mut config: Config = serde_yaml::from_str(yaml).unwrap();

        let cli = parse(&[
            "-f",
            DEFAULT_FILTER,
            "--snaplen",
            "65535",
            "--timeout-ms",
            "1000",
            "--format",
            "text",
        ]);
        config.merge_cli(&cli);
        assert_eq!(config.filter, DEFAULT_FILTER);
        assert_eq!(config.snaplen, 65535);
        assert_eq!(config.timeout_ms, 1000);
        assert_eq!(config.format, OutputFormat::Text);
    }

    #[test]
    fn test_absent_flags_keep_yaml() {
        let yaml = "snaplen: 128\nformat: json\n";
        let mut config: Config = serde_yaml::from_str(yaml).unwrap();
        config.merge_cli(&parse(&["-i", "lo"]));
        assert_eq!(config.snaplen, 128);
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.filter, DEFAULT_FILTER);
    }

    #[test]
    fn test_from_file_normalizes_filter() {
        let path = std::env::temp_dir().join(format!("netsnoop-config-{}.yaml", std::process::id()));
        fs::write(&path, "interface: lo\nfilter: all\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(config.interface.as_deref(), Some("lo"));
        assert_eq!(config.filter, DEFAULT_FILTER);
    }
}
