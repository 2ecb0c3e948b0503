use std::path::PathBuf;

use clap::Args;
use multiboot_usb::Settings;

/// Where the source ISOs are found.
#[derive(Debug, Args)]
pub(crate) struct SourceArgs {
    /// Directory holding the .iso files.
    #[arg(long)]
    iso_dir: Option<PathBuf>,

    /// Look for ISOs in subdirectories too.
    #[arg(long)]
    recursive: bool,

    /// Scratch mount directory.
    #[arg(long)]
    mount_dir: Option<PathBuf>,
}

impl SourceArgs {
    pub(crate) fn apply(self, settings: &mut Settings) {
        if let Some(dir) = self.iso_dir {
            settings.iso_dir = dir;
        }
        if self.recursive {
            settings.recursive = true;
        }
        if let Some(dir) = self.mount_dir {
            settings.mount_dir = dir;
        }
    }
}

/// Block devices whose UUIDs replace the placeholders.
#[derive(Debug, Args)]
pub(crate) struct DeviceArgs {
    /// Data partition device, e.g. /dev/sdb1.
    #[arg(long)]
    pub(crate) data_device: Option<PathBuf>,

    /// EFI system partition device, e.g. /dev/sdb2.
    #[arg(long, requires = "data_device")]
    pub(crate) efi_device: Option<PathBuf>,
}
