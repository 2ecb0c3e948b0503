//! GRUB2 configuration rendering.
//!
//! Every ISO becomes one `menuentry` block that loopback-mounts the image
//! from the data partition and boots the detected kernel. Missing pieces are
//! left as `# ERROR` / `# WARNING` comments in the block instead of dropping
//! the entry, so a reader of `grub.cfg` can see which ISOs need fixing.
//!
//! - [`install`] - writing a fragment into a live `grub.cfg`

pub mod install;

use anyhow::{bail, Result};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::detect::params::{self, BootTarget, DATA_UUID_PLACEHOLDER};
use crate::detect::{DetectionResult, Distribution};

pub const MISSING_KERNEL_MARKER: &str = "# ERROR: No kernel found!";
pub const MISSING_INITRD_MARKER: &str = "# WARNING: No initrd found";

/// Paths tried when an ISO could not be inspected at all.
pub const GENERIC_KERNEL_PATH: &str = "/boot/vmlinuz";
pub const GENERIC_INITRD_PATH: &str = "/boot/initrd.img";

const INDENT: &str = "    ";

/// Partition table type of the USB drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionScheme {
    Mbr,
    #[default]
    Gpt,
}

impl PartitionScheme {
    /// GRUB's partition-map name.
    pub fn grub_name(self) -> &'static str {
        match self {
            PartitionScheme::Mbr => "msdos",
            PartitionScheme::Gpt => "gpt",
        }
    }
}

impl fmt::Display for PartitionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PartitionScheme::Mbr => "mbr",
            PartitionScheme::Gpt => "gpt",
        })
    }
}

impl FromStr for PartitionScheme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mbr" | "msdos" | "dos" => Ok(PartitionScheme::Mbr),
            "gpt" => Ok(PartitionScheme::Gpt),
            other => bail!("unsupported partition scheme '{}'; expected 'mbr' or 'gpt'", other),
        }
    }
}

/// How the data partition of the drive is laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLayout {
    pub scheme: PartitionScheme,
    /// 1-based number of the partition holding the ISOs.
    pub data_partition: u32,
    /// Directory on the data partition holding the ISOs, rooted at `/`.
    pub iso_dir: String,
    /// Filesystem label of the data partition.
    pub data_label: String,
}

impl Default for TargetLayout {
    fn default() -> Self {
        Self {
            scheme: PartitionScheme::Gpt,
            data_partition: 1,
            iso_dir: "/isos".to_string(),
            data_label: "MULTIBOOT".to_string(),
        }
    }
}

impl TargetLayout {
    /// GRUB device name of the data partition, e.g. `(hd0,gpt1)`.
    pub fn root_reference(&self) -> String {
        format!("(hd0,{}{})", self.scheme.grub_name(), self.data_partition)
    }

    /// Absolute path of an ISO on the data partition.
    pub fn iso_path(&self, iso_file_name: &str) -> String {
        let dir = self.iso_dir.trim_matches('/');
        if dir.is_empty() {
            format!("/{iso_file_name}")
        } else {
            format!("/{dir}/{iso_file_name}")
        }
    }

    pub fn boot_target(&self, iso_file_name: &str) -> BootTarget {
        BootTarget {
            iso_path: self.iso_path(iso_file_name),
            label: self.data_label.clone(),
        }
    }
}

/// One rendered-to-be `menuentry` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub title: String,
    pub class_tags: Vec<String>,
    pub root_reference: String,
    pub iso_path: String,
    /// Lines after the loopback setup: `linux`, `initrd` or their markers.
    pub body: Vec<String>,
    /// Comment lines placed at the top of the block.
    pub notes: Vec<String>,
}

impl MenuEntry {
    pub fn render(&self) -> String {
        let classes: String = self
            .class_tags
            .iter()
            .map(|class| format!(" --class {class}"))
            .collect();

        let mut lines = vec![format!(
            "menuentry \"{}\"{} {{",
            escape_quoted(&self.title),
            classes
        )];
        lines.extend(self.notes.iter().map(|note| format!("{INDENT}# {note}")));
        lines.push(format!("{INDENT}insmod loopback"));
        lines.push(format!("{INDENT}insmod iso9660"));
        lines.push(format!("{INDENT}set root='{}'", self.root_reference));
        lines.push(format!(
            "{INDENT}search --no-floppy --fs-uuid --set=root {DATA_UUID_PLACEHOLDER}"
        ));
        lines.push(format!(
            "{INDENT}set isofile=\"{}\"",
            escape_quoted(&self.iso_path)
        ));
        lines.push(format!("{INDENT}loopback loop \"$isofile\""));
        lines.extend(self.body.iter().map(|line| format!("{INDENT}{line}")));
        lines.push("}".to_string());

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}

/// Escape text for a GRUB double-quoted string.
pub fn escape_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '"' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape GRUB metacharacters in an unquoted command word.
///
/// Whitespace is left alone so a parameter string keeps its word breaks.
pub fn escape_word(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '\\' | '"' | '\'' | '$' | ';' | '&' | '|' | '<' | '>' | '(' | ')' | '{' | '}'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn linux_line(kernel: &str, parameters: &str) -> String {
    format!(
        "linux (loop){} {}",
        escape_word(kernel),
        escape_word(parameters)
    )
}

fn initrd_line(initrd: &str) -> String {
    format!("initrd (loop){}", escape_word(initrd))
}

fn entry_title(distribution: Distribution, iso_file_name: &str) -> String {
    format!("{} ({})", distribution.display_name(), iso_file_name)
}

fn class_tags(distribution: Distribution) -> Vec<String> {
    distribution
        .class_tags()
        .iter()
        .map(|class| class.to_string())
        .collect()
}

/// Build the entry for a detection result.
pub fn menu_entry(result: &DetectionResult, iso_file_name: &str, layout: &TargetLayout) -> MenuEntry {
    let kernel_line = match &result.kernel_path {
        Some(kernel) => linux_line(kernel, &result.boot_parameters),
        None => MISSING_KERNEL_MARKER.to_string(),
    };
    let initrd_line = match &result.initrd_path {
        Some(initrd) => initrd_line(initrd),
        None => MISSING_INITRD_MARKER.to_string(),
    };

    MenuEntry {
        title: entry_title(result.distribution, iso_file_name),
        class_tags: class_tags(result.distribution),
        root_reference: layout.root_reference(),
        iso_path: layout.iso_path(iso_file_name),
        body: vec![kernel_line, initrd_line],
        notes: Vec::new(),
    }
}

/// Render the `menuentry` block for a detection result.
pub fn render_menu_entry(
    result: &DetectionResult,
    iso_file_name: &str,
    layout: &TargetLayout,
) -> String {
    menu_entry(result, iso_file_name, layout).render()
}

/// Render a best-guess block for an ISO that could not be inspected.
pub fn render_generic_entry(iso_file_name: &str, layout: &TargetLayout) -> String {
    let target = layout.boot_target(iso_file_name);
    let params = params::render(params::GENERIC_TEMPLATE, &target);

    MenuEntry {
        title: format!("{iso_file_name} (generic)"),
        class_tags: class_tags(Distribution::Unknown),
        root_reference: layout.root_reference(),
        iso_path: target.iso_path,
        body: vec![
            linux_line(GENERIC_KERNEL_PATH, &params),
            initrd_line(GENERIC_INITRD_PATH),
        ],
        notes: vec![
            "Automatic detection failed for this ISO.".to_string(),
            "Kernel and initrd paths below are guesses; verify them.".to_string(),
        ],
    }
    .render()
}

/// Header for a `grub.cfg` that does not exist yet.
pub fn base_config(layout: &TargetLayout) -> String {
    let lines = [
        "# GRUB configuration generated by multiboot-usb".to_string(),
        "set timeout=10".to_string(),
        "set default=0".to_string(),
        String::new(),
        format!("insmod part_{}", layout.scheme.grub_name()),
        "insmod fat".to_string(),
        "insmod exfat".to_string(),
        "insmod loopback".to_string(),
        "insmod iso9660".to_string(),
        String::new(),
        format!("set root='{}'", layout.root_reference()),
        format!("search --no-floppy --fs-uuid --set=root {DATA_UUID_PLACEHOLDER}"),
        String::new(),
        "if loadfont unicode ; then".to_string(),
        format!("{INDENT}set gfxmode=auto"),
        format!("{INDENT}insmod all_video"),
        format!("{INDENT}insmod gfxterm"),
        format!("{INDENT}terminal_output gfxterm"),
        "fi".to_string(),
    ];
    let mut out = lines.join("\n");
    out.push_str("\n\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ubuntu() -> DetectionResult {
        DetectionResult {
            distribution: Distribution::Ubuntu,
            kernel_path: Some("/casper/vmlinuz".to_string()),
            initrd_path: Some("/casper/initrd".to_string()),
            boot_parameters: "boot=casper iso-scan/filename=/isos/ubuntu.iso".to_string(),
        }
    }

    #[test]
    fn test_root_reference_per_scheme() {
        let mut layout = TargetLayout::default();
        assert_eq!(layout.root_reference(), "(hd0,gpt1)");
        layout.scheme = PartitionScheme::Mbr;
        layout.data_partition = 2;
        assert_eq!(layout.root_reference(), "(hd0,msdos2)");
    }

    #[test]
    fn test_iso_path_is_rooted() {
        let mut layout = TargetLayout::default();
        assert_eq!(layout.iso_path("a.iso"), "/isos/a.iso");
        layout.iso_dir = "iso/linux/".to_string();
        assert_eq!(layout.iso_path("a.iso"), "/iso/linux/a.iso");
        layout.iso_dir = "/".to_string();
        assert_eq!(layout.iso_path("a.iso"), "/a.iso");
    }

    #[test]
    fn test_scheme_parsing() {
        assert_eq!("MBR".parse::<PartitionScheme>().unwrap(), PartitionScheme::Mbr);
        assert_eq!("msdos".parse::<PartitionScheme>().unwrap(), PartitionScheme::Mbr);
        assert_eq!("gpt".parse::<PartitionScheme>().unwrap(), PartitionScheme::Gpt);
        assert!("apm".parse::<PartitionScheme>().is_err());
    }

    #[test]
    fn test_render_full_entry() {
        let text = render_menu_entry(&ubuntu(), "ubuntu.iso", &TargetLayout::default());
        let expected = "\
menuentry \"Ubuntu (ubuntu.iso)\" --class ubuntu --class gnu-linux --class gnu --class os {
    insmod loopback
    insmod iso9660
    set root='(hd0,gpt1)'
    search --no-floppy --fs-uuid --set=root @DATA_UUID@
    set isofile=\"/isos/ubuntu.iso\"
    loopback loop \"$isofile\"
    linux (loop)/casper/vmlinuz boot=casper iso-scan/filename=/isos/ubuntu.iso
    initrd (loop)/casper/initrd
}
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_is_idempotent() {
        let layout = TargetLayout::default();
        let result = ubuntu();
        assert_eq!(
            render_menu_entry(&result, "ubuntu.iso", &layout),
            render_menu_entry(&result, "ubuntu.iso", &layout)
        );
    }

    #[test]
    fn test_missing_files_leave_markers() {
        let result = DetectionResult {
            distribution: Distribution::Unknown,
            kernel_path: None,
            initrd_path: None,
            boot_parameters: "iso-scan/filename=/isos/x.iso".to_string(),
        };
        let text = render_menu_entry(&result, "x.iso", &TargetLayout::default());
        assert!(text.contains(&format!("    {MISSING_KERNEL_MARKER}\n")));
        assert!(text.contains(&format!("    {MISSING_INITRD_MARKER}\n")));
        assert!(!text.contains("linux (loop)"));
        assert!(text.starts_with("menuentry \"Linux (x.iso)\""));
    }

    #[test]
    fn test_missing_initrd_only() {
        let mut result = ubuntu();
        result.initrd_path = None;
        let text = render_menu_entry(&result, "u.iso", &TargetLayout::default());
        assert!(text.contains("linux (loop)/casper/vmlinuz"));
        assert!(text.contains(MISSING_INITRD_MARKER));
        assert!(!text.contains(MISSING_KERNEL_MARKER));
    }

    #[test]
    fn test_generic_entry() {
        let text = render_generic_entry("mystery.iso", &TargetLayout::default());
        assert!(text.starts_with("menuentry \"mystery.iso (generic)\""));
        assert!(text.contains("# Automatic detection failed"));
        assert!(text.contains("linux (loop)/boot/vmlinuz iso-scan/filename=/isos/mystery.iso"));
        assert!(text.contains("initrd (loop)/boot/initrd.img"));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn test_titles_are_escaped() {
        assert_eq!(escape_quoted(r#"a "b" $c \d"#), r#"a \"b\" \$c \\d"#);
        let text = render_generic_entry("we\"ird$.iso", &TargetLayout::default());
        assert!(text.starts_with("menuentry \"we\\\"ird\\$.iso (generic)\""));
    }

    #[test]
    fn test_kernel_line_escapes_metacharacters() {
        let text = render_generic_entry("a$x;b.iso", &TargetLayout::default());
        assert!(text.contains("    set isofile=\"/isos/a\\$x;b.iso\"\n"));
        assert!(text.contains(
            "    linux (loop)/boot/vmlinuz iso-scan/filename=/isos/a\\$x\\;b.iso\n"
        ));

        let result = DetectionResult {
            distribution: Distribution::Ubuntu,
            kernel_path: Some("/casper/vmlinuz(1)".to_string()),
            initrd_path: Some("/casper/initrd&x".to_string()),
            boot_parameters: "boot=casper iso-scan/filename=/isos/\"q\".iso quiet".to_string(),
        };
        let text = render_menu_entry(&result, "q.iso", &TargetLayout::default());
        assert!(text.contains(
            "linux (loop)/casper/vmlinuz\\(1\\) boot=casper iso-scan/filename=/isos/\\\"q\\\".iso quiet\n"
        ));
        assert!(text.contains("initrd (loop)/casper/initrd\\&x\n"));
    }

    #[test]
    fn test_escape_word_keeps_plain_parameters() {
        let params = "img_dev=/dev/disk/by-uuid/@DATA_UUID@ img_loop=/isos/arch.iso";
        assert_eq!(escape_word(params), params);
        assert_eq!(escape_word("a b"), "a b");
    }

    #[test]
    fn test_base_config_uses_layout() {
        let layout = TargetLayout {
            scheme: PartitionScheme::Mbr,
            ..TargetLayout::default()
        };
        let text = base_config(&layout);
        assert!(text.contains("insmod part_msdos"));
        assert!(text.contains("set root='(hd0,msdos1)'"));
        assert!(text.contains(DATA_UUID_PLACEHOLDER));
    }
}
