//! Implements the CLI for pcikoll

mod cli;
mod devices;
mod output;

use clap::Parser;
use cli::Cli;
use cli::Commands;
use cli::Format;
use devices::GpuFilter;
use itertools::Itertools;
use output::ResolvedDevice;
use pcikoll_ids::PciIdDb;
use std::io::Write;

fn main() -> eyre::Result<()> {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::WARN.into())
        .from_env()?;
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    // Name resolution is best effort: a missing or broken pci.ids must never
    // prevent the device listing itself.
    let db = PciIdDb::load(pcikoll_ids::DEFAULT_PATHS, cli.ids_file.as_deref());

    let mut devices = devices::load_pci_devices(&cli.sysfs)?;

    let gpu_filter = match cli.command {
        Commands::List => None,
        Commands::Gpus {
            allow_vendor,
            deny_vendor,
        } => {
            let mut filter = GpuFilter::default();
            for vendor in allow_vendor {
                filter
                    .allowed_vendors
                    .entry(vendor)
                    .or_insert_with(|| format!("{vendor:04x}"));
            }
            filter.denied_vendors.extend(deny_vendor);
            Some(filter)
        }
    };
    if let Some(filter) = &gpu_filter {
        devices.retain(|device| filter.matches(device));
    }

    let records: Vec<ResolvedDevice> = devices
        .iter()
        .sorted_by(|a, b| a.address.cmp(&b.address))
        .map(|device| {
            let mut record = ResolvedDevice::new(device, &db);
            if let Some(filter) = &gpu_filter {
                output::apply_vendor_fallback(&mut record, device, filter);
            }
            record
        })
        .collect();

    let mut stdout = std::io::BufWriter::new(std::io::stdout().lock());
    match cli.format {
        Format::Human => {
            for record in &records {
                writeln!(stdout, "{}", record.human_line())?;
            }
        }
        Format::Json => {
            serde_json::to_writer_pretty(&mut stdout, &records)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}
