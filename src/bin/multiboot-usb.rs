use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use multiboot_usb::config::{load_settings, validate_layout};
use multiboot_usb::grub::PartitionScheme;
use multiboot_usb::Settings;

mod workflows;

#[derive(Debug, Parser)]
#[command(
    name = "multiboot-usb",
    version,
    about = "Detect boot files in Linux ISOs and generate GRUB loopback entries"
)]
struct Cli {
    /// Settings file (default: ~/.config/multiboot-usb/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Partition table of the USB drive.
    #[arg(long, global = true)]
    scheme: Option<PartitionScheme>,

    /// 1-based number of the data partition holding the ISOs.
    #[arg(long, global = true)]
    data_partition: Option<u32>,

    /// Directory on the data partition holding the ISOs.
    #[arg(long, global = true)]
    target_iso_dir: Option<String>,

    /// Filesystem label of the data partition.
    #[arg(long, global = true)]
    label: Option<String>,

    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Inspect ISO images and print what was detected.
    Detect {
        #[arg(required = true)]
        isos: Vec<PathBuf>,
        /// Print results as JSON.
        #[arg(long)]
        json: bool,
        /// Scratch mount directory.
        #[arg(long)]
        mount_dir: Option<PathBuf>,
    },
    /// Scan an ISO directory and print GRUB entries for every image.
    Generate {
        #[command(flatten)]
        source: workflows::SourceArgs,
        /// Write the fragment here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write the per-ISO report as JSON.
        #[arg(long)]
        report_json: Option<PathBuf>,
    },
    /// Scan, then append the entries to a grub.cfg (backing it up first).
    Install {
        #[command(flatten)]
        source: workflows::SourceArgs,
        /// Live GRUB configuration on the drive.
        #[arg(long)]
        grub_cfg: PathBuf,
        #[command(flatten)]
        devices: workflows::DeviceArgs,
    },
    /// Replace UUID placeholders in a grub.cfg using blkid.
    ApplyUuids {
        #[arg(long)]
        grub_cfg: PathBuf,
        #[command(flatten)]
        devices: workflows::DeviceArgs,
    },
    /// Copy the ISO images onto the mounted data partition.
    Copy {
        #[command(flatten)]
        source: workflows::SourceArgs,
        /// Destination directory, e.g. /mnt/usb/isos.
        #[arg(long)]
        dest: PathBuf,
        /// Compare SHA-256 of each copy with its source.
        #[arg(long)]
        verify: bool,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = load_settings(cli.config.as_deref())?;
    let layout = &mut settings.layout;
    if let Some(scheme) = cli.scheme {
        layout.scheme = scheme;
    }
    if let Some(number) = cli.data_partition {
        layout.data_partition = number;
    }
    if let Some(dir) = &cli.target_iso_dir {
        layout.iso_dir = dir.clone();
    }
    if let Some(label) = &cli.label {
        layout.data_label = label.clone();
    }
    validate_layout(layout).context("invalid command-line layout options")?;
    Ok(settings)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    let mut settings = resolve_settings(&cli)?;

    match cli.command {
        Command::Detect {
            isos,
            json,
            mount_dir,
        } => {
            if let Some(dir) = mount_dir {
                settings.mount_dir = dir;
            }
            workflows::detect_cmd(&settings, &isos, json)
        }
        Command::Generate {
            source,
            output,
            report_json,
        } => {
            source.apply(&mut settings);
            workflows::generate_cmd(&settings, output.as_deref(), report_json.as_deref())
        }
        Command::Install {
            source,
            grub_cfg,
            devices,
        } => {
            source.apply(&mut settings);
            workflows::install_cmd(&settings, &grub_cfg, &devices)
        }
        Command::ApplyUuids { grub_cfg, devices } => {
            workflows::apply_uuids_cmd(&grub_cfg, &devices)
        }
        Command::Copy {
            source,
            dest,
            verify,
        } => {
            source.apply(&mut settings);
            workflows::copy_cmd(&settings, &dest, verify)
        }
    }
}
