//! Settings file (`config.toml`) and target-layout validation.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::grub::{PartitionScheme, TargetLayout};

const CONFIG_DIR_NAME: &str = "multiboot-usb";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Validated settings for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Host directory holding the source `.iso` files.
    pub iso_dir: PathBuf,
    /// Scratch directory ISOs are loop-mounted at, one at a time.
    pub mount_dir: PathBuf,
    /// Descend into subdirectories of `iso_dir`.
    pub recursive: bool,
    pub layout: TargetLayout,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            iso_dir: PathBuf::from("isos"),
            mount_dir: std::env::temp_dir().join("multiboot-usb-iso"),
            recursive: false,
            layout: TargetLayout::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsToml {
    iso_dir: Option<PathBuf>,
    mount_dir: Option<PathBuf>,
    recursive: Option<bool>,
    target: Option<TargetToml>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TargetToml {
    partition_scheme: Option<PartitionScheme>,
    data_partition: Option<u32>,
    iso_dir: Option<String>,
    data_label: Option<String>,
}

/// `$XDG_CONFIG_HOME/multiboot-usb/config.toml`, if a config dir is known.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load settings from `path`, or from the default location.
///
/// An explicit path must exist. A missing default file yields defaults.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.is_file() => path,
            _ => {
                log::debug!("[config] no config file; using defaults");
                return Ok(Settings::default());
            }
        },
    };

    let text = fs::read_to_string(&path)
        .with_context(|| format!("reading config '{}'", path.display()))?;
    let settings = parse_settings(&text, &path)?;
    log::debug!("[config] loaded {}", path.display());
    Ok(settings)
}

/// Parse and validate a settings TOML document. `origin` names it in errors.
pub fn parse_settings(text: &str, origin: &Path) -> Result<Settings> {
    let parsed: SettingsToml = toml::from_str(text)
        .with_context(|| format!("parsing config '{}'", origin.display()))?;

    let mut settings = Settings::default();
    if let Some(iso_dir) = parsed.iso_dir {
        settings.iso_dir = iso_dir;
    }
    if let Some(mount_dir) = parsed.mount_dir {
        settings.mount_dir = mount_dir;
    }
    if let Some(recursive) = parsed.recursive {
        settings.recursive = recursive;
    }

    if let Some(target) = parsed.target {
        let layout = &mut settings.layout;
        if let Some(scheme) = target.partition_scheme {
            layout.scheme = scheme;
        }
        if let Some(number) = target.data_partition {
            layout.data_partition = number;
        }
        if let Some(iso_dir) = target.iso_dir {
            layout.iso_dir = iso_dir;
        }
        if let Some(label) = target.data_label {
            layout.data_label = label;
        }
    }

    validate_layout(&settings.layout)
        .with_context(|| format!("invalid config '{}'", origin.display()))?;
    Ok(settings)
}

/// Reject layouts GRUB or the kernel command line cannot express.
pub fn validate_layout(layout: &TargetLayout) -> Result<()> {
    if layout.data_partition == 0 {
        bail!("target.data_partition is 1-based; 0 is not a partition");
    }

    let label = layout.data_label.trim();
    if label.is_empty() {
        bail!("target.data_label must not be empty");
    }
    if label.chars().any(char::is_whitespace) {
        bail!(
            "target.data_label '{}' contains whitespace, which breaks root=live:CDLABEL=",
            layout.data_label
        );
    }

    for component in Path::new(&layout.iso_dir).components() {
        if matches!(component, Component::ParentDir | Component::Prefix(_)) {
            bail!(
                "target.iso_dir '{}' must not contain '..' components",
                layout.iso_dir
            );
        }
    }
    if layout.iso_dir.chars().any(char::is_whitespace) {
        bail!(
            "target.iso_dir '{}' contains whitespace, which breaks kernel parameters",
            layout.iso_dir
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Settings> {
        parse_settings(text, Path::new("test.toml"))
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(parse("").unwrap(), Settings::default());
    }

    #[test]
    fn test_full_config() {
        let settings = parse(
            r#"
iso_dir = "/srv/isos"
mount_dir = "/run/multiboot-usb"
recursive = true

[target]
partition_scheme = "mbr"
data_partition = 2
iso_dir = "/images"
data_label = "USBDATA"
"#,
        )
        .unwrap();

        assert_eq!(settings.iso_dir, PathBuf::from("/srv/isos"));
        assert_eq!(settings.mount_dir, PathBuf::from("/run/multiboot-usb"));
        assert!(settings.recursive);
        assert_eq!(settings.layout.scheme, PartitionScheme::Mbr);
        assert_eq!(settings.layout.root_reference(), "(hd0,msdos2)");
        assert_eq!(settings.layout.iso_path("a.iso"), "/images/a.iso");
        assert_eq!(settings.layout.data_label, "USBDATA");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(parse("iso_directory = \"/srv\"").is_err());
        assert!(parse("[target]\nlabel = \"X\"").is_err());
    }

    #[test]
    fn test_bad_scheme_is_rejected() {
        assert!(parse("[target]\npartition_scheme = \"apm\"").is_err());
    }

    #[test]
    fn test_layout_validation() {
        assert!(parse("[target]\ndata_partition = 0").is_err());
        assert!(parse("[target]\ndata_label = \"MY USB\"").is_err());
        assert!(parse("[target]\ndata_label = \"\"").is_err());
        assert!(parse("[target]\niso_dir = \"/isos/../etc\"").is_err());
        assert!(parse("[target]\niso_dir = \"/my isos\"").is_err());
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(load_settings(Some(&temp.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "recursive = true\n").unwrap();
        assert!(load_settings(Some(&path)).unwrap().recursive);
    }
}
