use std::path::Path;

use anyhow::{bail, Result};
use multiboot_usb::grub::install::{apply_partition_uuids, install_fragment};
use multiboot_usb::preflight::{check_required_tools, require_root, DETECT_TOOLS, INSTALL_TOOLS};
use multiboot_usb::scan::scan_isos;
use multiboot_usb::{LoopMounter, Settings};

use super::DeviceArgs;

pub(crate) fn install_cmd(settings: &Settings, grub_cfg: &Path, devices: &DeviceArgs) -> Result<()> {
    check_required_tools(DETECT_TOOLS)?;
    if devices.data_device.is_some() {
        check_required_tools(INSTALL_TOOLS)?;
    }
    require_root("install")?;

    let report = scan_isos(&LoopMounter::default(), settings)?;
    if report.isos.is_empty() {
        bail!(
            "no ISO images found in '{}'; nothing to install",
            settings.iso_dir.display()
        );
    }

    match install_fragment(grub_cfg, &report.fragment, &settings.layout)? {
        Some(backup) => println!(
            "Appended {} entries to {} (backup: {})",
            report.isos.len(),
            grub_cfg.display(),
            backup.display()
        ),
        None => println!(
            "Created {} with {} entries",
            grub_cfg.display(),
            report.isos.len()
        ),
    }

    if let Some(data_device) = &devices.data_device {
        apply_partition_uuids(grub_cfg, data_device, devices.efi_device.as_deref())?;
        println!("Resolved partition UUIDs from {}", data_device.display());
    } else {
        log::warn!("[install] no --data-device given; UUID placeholders left in place");
    }

    if report.failures() > 0 {
        println!(
            "{} ISO(s) need manual attention; search {} for '# ERROR' and '(generic)'",
            report.failures(),
            grub_cfg.display()
        );
    }
    Ok(())
}

pub(crate) fn apply_uuids_cmd(grub_cfg: &Path, devices: &DeviceArgs) -> Result<()> {
    let Some(data_device) = &devices.data_device else {
        bail!("apply-uuids needs --data-device");
    };
    check_required_tools(INSTALL_TOOLS)?;

    let backup = apply_partition_uuids(grub_cfg, data_device, devices.efi_device.as_deref())?;
    println!(
        "Updated {} (backup: {})",
        grub_cfg.display(),
        backup.display()
    );
    Ok(())
}
