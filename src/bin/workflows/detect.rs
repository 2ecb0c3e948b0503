use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use multiboot_usb::detect::detect;
use multiboot_usb::preflight::{check_required_tools, require_root, DETECT_TOOLS};
use multiboot_usb::scan::scan_isos;
use multiboot_usb::{LoopMounter, Settings};

fn preflight_mounting(action: &str) -> Result<()> {
    check_required_tools(DETECT_TOOLS)?;
    require_root(action)
}

pub(crate) fn detect_cmd(settings: &Settings, isos: &[PathBuf], json: bool) -> Result<()> {
    preflight_mounting("detect")?;
    let mounter = LoopMounter::default();

    let mut results = Vec::new();
    for iso in isos {
        let file_name = iso
            .file_name()
            .with_context(|| format!("'{}' has no file name", iso.display()))?
            .to_string_lossy()
            .into_owned();
        let target = settings.layout.boot_target(&file_name);

        match detect(&mounter, iso, &settings.mount_dir, &target) {
            Ok(result) => {
                if !json {
                    println!("{}:", iso.display());
                    println!("  distribution: {}", result.distribution);
                    println!(
                        "  kernel:       {}",
                        result.kernel_path.as_deref().unwrap_or("(not found)")
                    );
                    println!(
                        "  initrd:       {}",
                        result.initrd_path.as_deref().unwrap_or("(not found)")
                    );
                    println!("  parameters:   {}", result.boot_parameters);
                }
                results.push(serde_json::json!({
                    "iso": iso,
                    "detection": result,
                }));
            }
            Err(err) => {
                log::error!("[detect:{}] {:#}", file_name, err);
                results.push(serde_json::json!({
                    "iso": iso,
                    "error": format!("{err:#}"),
                }));
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }
    Ok(())
}

pub(crate) fn generate_cmd(
    settings: &Settings,
    output: Option<&Path>,
    report_json: Option<&Path>,
) -> Result<()> {
    preflight_mounting("generate")?;
    let report = scan_isos(&LoopMounter::default(), settings)?;

    match output {
        Some(path) => {
            fs::write(path, &report.fragment)
                .with_context(|| format!("writing fragment '{}'", path.display()))?;
            log::info!("[generate] wrote {}", path.display());
        }
        None => print!("{}", report.fragment),
    }

    if let Some(path) = report_json {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json)
            .with_context(|| format!("writing report '{}'", path.display()))?;
    }
    Ok(())
}
