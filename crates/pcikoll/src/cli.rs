use clap::Parser;
use clap::Subcommand;
use std::fmt::Display;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[clap(disable_help_subcommand = true)]
pub struct Cli {
    /// Path to a pci.ids file to use instead of the default locations
    #[arg(long)]
    pub ids_file: Option<PathBuf>,
    /// Sysfs mount point to enumerate devices from
    #[arg(long, default_value = "/sys")]
    pub sysfs: PathBuf,
    /// Output format to use
    #[arg(short, long, default_value_t = Format::Human)]
    pub format: Format,
    /// Operation to perform
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List all PCI devices with resolved names
    List,
    /// List display controllers that look like actual GPUs
    ///
    /// BMC/management graphics adapters are filtered out.
    Gpus {
        /// Additional vendor IDs (hex) to accept as GPU vendors
        #[arg(long, value_parser = parse_hex_u16)]
        allow_vendor: Vec<u16>,
        /// Additional vendor IDs (hex) to reject as BMC graphics
        #[arg(long, value_parser = parse_hex_u16)]
        deny_vendor: Vec<u16>,
    },
}

/// Output format to use
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, clap::ValueEnum)]
pub enum Format {
    /// Human-readable output
    Human,
    /// JSON formatted output
    Json,
}

impl Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Human => write!(f, "human"),
            Self::Json => write!(f, "json"),
        }
    }
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    u16::from_str_radix(s, 16).map_err(|e| format!("not a hex vendor ID: {e}"))
}
