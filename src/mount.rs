//! Read-only loop mounting of ISO images.
//!
//! [`IsoMounter`] is the seam between detection and the host: production code
//! uses [`LoopMounter`] (`mount -o loop,ro`), tests substitute their own
//! implementation. [`MountedIso`] unmounts on drop so an early return never
//! leaves the scratch directory busy for the next ISO.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::process::Cmd;
use crate::tree::DirTree;

/// Mount and unmount an ISO image at a directory.
pub trait IsoMounter {
    /// Mount `iso` read-only at `target`. `target` already exists.
    fn mount(&self, iso: &Path, target: &Path) -> Result<()>;

    /// Unmount whatever is mounted at `target`.
    fn unmount(&self, target: &Path) -> Result<()>;
}

/// Mounts through `mount(8)` using a loop device.
#[derive(Debug, Clone)]
pub struct LoopMounter {
    /// Unmount attempts before falling back to a lazy unmount.
    pub unmount_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for LoopMounter {
    fn default() -> Self {
        Self {
            unmount_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl IsoMounter for LoopMounter {
    fn mount(&self, iso: &Path, target: &Path) -> Result<()> {
        Cmd::new("mount")
            .args(["-o", "loop,ro"])
            .arg_path(iso)
            .arg_path(target)
            .error_msg(format!(
                "mounting '{}' at '{}' failed",
                iso.display(),
                target.display()
            ))
            .run()?;
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        for attempt in 1..=self.unmount_attempts {
            let result = Cmd::new("umount").arg_path(target).allow_fail().run()?;
            if result.success() {
                return Ok(());
            }
            log::warn!(
                "umount '{}' failed (attempt {}/{}): {}",
                target.display(),
                attempt,
                self.unmount_attempts,
                result.stderr.trim()
            );
            thread::sleep(self.retry_delay);
        }

        Cmd::new("umount")
            .arg("-l")
            .arg_path(target)
            .error_msg(format!("lazy unmount of '{}' failed", target.display()))
            .run()?;
        Ok(())
    }
}

/// An ISO mounted at a scratch directory; unmounted on drop.
pub struct MountedIso<'a> {
    mounter: &'a dyn IsoMounter,
    mount_dir: PathBuf,
    mounted: bool,
}

impl<'a> MountedIso<'a> {
    /// Create `mount_dir` if needed and mount `iso` there.
    pub fn mount(mounter: &'a dyn IsoMounter, iso: &Path, mount_dir: &Path) -> Result<Self> {
        if !iso.is_file() {
            bail!("ISO image '{}' does not exist", iso.display());
        }
        fs::create_dir_all(mount_dir)
            .with_context(|| format!("creating mount directory '{}'", mount_dir.display()))?;
        mounter.mount(iso, mount_dir)?;
        Ok(Self {
            mounter,
            mount_dir: mount_dir.to_path_buf(),
            mounted: true,
        })
    }

    pub fn mount_dir(&self) -> &Path {
        &self.mount_dir
    }

    /// View the mounted contents.
    pub fn tree(&self) -> DirTree {
        DirTree::new(&self.mount_dir)
    }

    /// Unmount now, reporting failure.
    pub fn unmount(mut self) -> Result<()> {
        self.mounted = false;
        self.mounter.unmount(&self.mount_dir)
    }
}

impl Drop for MountedIso<'_> {
    fn drop(&mut self) {
        if !self.mounted {
            return;
        }
        if let Err(err) = self.mounter.unmount(&self.mount_dir) {
            log::warn!("leaving '{}' mounted: {:#}", self.mount_dir.display(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingMounter {
        calls: RefCell<Vec<String>>,
    }

    impl IsoMounter for RecordingMounter {
        fn mount(&self, iso: &Path, _target: &Path) -> Result<()> {
            self.calls
                .borrow_mut()
                .push(format!("mount {}", iso.file_name().unwrap().to_string_lossy()));
            Ok(())
        }

        fn unmount(&self, _target: &Path) -> Result<()> {
            self.calls.borrow_mut().push("unmount".to_string());
            Ok(())
        }
    }

    #[test]
    fn test_drop_unmounts() {
        let temp = TempDir::new().unwrap();
        let iso = temp.path().join("a.iso");
        fs::write(&iso, b"").unwrap();
        let mounter = RecordingMounter::default();

        {
            let mounted = MountedIso::mount(&mounter, &iso, &temp.path().join("mnt")).unwrap();
            assert!(mounted.mount_dir().is_dir());
        }

        assert_eq!(*mounter.calls.borrow(), vec!["mount a.iso", "unmount"]);
    }

    #[test]
    fn test_explicit_unmount_runs_once() {
        let temp = TempDir::new().unwrap();
        let iso = temp.path().join("b.iso");
        fs::write(&iso, b"").unwrap();
        let mounter = RecordingMounter::default();

        let mounted = MountedIso::mount(&mounter, &iso, &temp.path().join("mnt")).unwrap();
        mounted.unmount().unwrap();

        assert_eq!(*mounter.calls.borrow(), vec!["mount b.iso", "unmount"]);
    }

    #[test]
    fn test_missing_iso_is_not_mounted() {
        let temp = TempDir::new().unwrap();
        let mounter = RecordingMounter::default();

        let result = MountedIso::mount(&mounter, &temp.path().join("nope.iso"), temp.path());
        assert!(result.is_err());
        assert!(mounter.calls.borrow().is_empty());
    }
}
