//! Backup-then-rename file replacement.
//!
//! Every file in a [`Transaction`] is first written to a temporary sibling.
//! Only when all temporaries exist does the swap start: the live file is
//! renamed to `<file>.bak` and the temporary renamed into place. If any
//! rename fails, files already swapped are put back from their backups, so
//! the set is replaced together or not at all. Should the restore itself
//! fail, the original content is still in the `.bak` sibling.

use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

/// Mode given to a file that did not exist before.
pub const NEW_FILE_MODE: u32 = 0o644;
/// Mode given to a new file holding secrets, and to every temporary.
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// Path of the backup kept next to `target`.
pub fn backup_path(target: &Path) -> PathBuf {
    sibling(target, "bak")
}

fn temp_path(target: &Path) -> PathBuf {
    sibling(target, "tmp")
}

fn sibling(target: &Path, suffix: &str) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    target.with_file_name(name)
}

/// Whether the process runs with root privileges, i.e. may change owners.
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

/// Read a file, treating a missing file as empty.
pub fn read_or_empty(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

/// Replace one file with `contents`.
pub fn replace_file(target: &Path, contents: &str) -> Result<()> {
    let mut tx = Transaction::new();
    tx.stage(target, contents);
    tx.commit()
}

/// Replace one file with `contents`, creating it owner-only if new.
pub fn replace_private_file(target: &Path, contents: &str) -> Result<()> {
    let mut tx = Transaction::new();
    tx.stage_with_mode(target, contents, PRIVATE_FILE_MODE);
    tx.commit()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(not(test), allow(dead_code))]
pub(crate) enum Step {
    Install,
    Restore,
}

struct Staged {
    target: PathBuf,
    contents: String,
    /// Used only when `target` does not exist yet
    new_mode: u32,
}

/// A set of files replaced together.
#[derive(Default)]
pub struct Transaction {
    staged: Vec<Staged>,
    #[cfg(test)]
    failures: Vec<(usize, Step)>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `target` to be replaced with `contents`.
    pub fn stage(&mut self, target: impl Into<PathBuf>, contents: impl Into<String>) -> &mut Self {
        self.stage_with_mode(target, contents, NEW_FILE_MODE)
    }

    /// Like [`stage`](Self::stage), with the mode for a target that does
    /// not exist yet. An existing target keeps its own mode.
    pub fn stage_with_mode(
        &mut self,
        target: impl Into<PathBuf>,
        contents: impl Into<String>,
        new_mode: u32,
    ) -> &mut Self {
        self.staged.push(Staged {
            target: target.into(),
            contents: contents.into(),
            new_mode,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Make the given step fail for the staged file at `index`.
    #[cfg(test)]
    pub(crate) fn fail_at(&mut self, index: usize, step: Step) -> &mut Self {
        self.failures.push((index, step));
        self
    }

    #[cfg(test)]
    fn injected(&self, index: usize, step: Step) -> std::io::Result<()> {
        if self.failures.contains(&(index, step)) {
            return Err(std::io::Error::other(format!("injected {step:?} failure")));
        }
        Ok(())
    }

    #[cfg(not(test))]
    #[allow(clippy::unused_self)]
    fn injected(&self, _index: usize, _step: Step) -> std::io::Result<()> {
        Ok(())
    }

    /// Write every staged file, swapping them into place together.
    pub fn commit(self) -> Result<()> {
        let mut written = Vec::with_capacity(self.staged.len());
        for staged in &self.staged {
            match write_temp(staged) {
                Ok(temp) => written.push(temp),
                Err(e) => {
                    for temp in &written {
                        let _ = fs::remove_file(temp);
                    }
                    return Err(e);
                }
            }
        }

        // Whether each swapped file had an original that now lives in .bak
        let mut swapped: Vec<bool> = Vec::with_capacity(self.staged.len());
        for (index, (staged, temp)) in self.staged.iter().zip(&written).enumerate() {
            let target = &staged.target;
            let mut backed_up = false;

            let result = (|| -> std::io::Result<()> {
                if target.exists() {
                    fs::rename(target, backup_path(target))?;
                    backed_up = true;
                }
                self.injected(index, Step::Install)?;
                fs::rename(temp, target)
            })();

            if let Err(source) = result {
                log::error!("Failed to install {}: {}", target.display(), source);
                // A file that never got moved aside is still intact
                if backed_up {
                    swapped.push(true);
                }
                let restored = self.rollback(&swapped);
                for temp in &written[index..] {
                    let _ = fs::remove_file(temp);
                }
                return Err(Error::Swap {
                    path: target.clone(),
                    source,
                    restored,
                });
            }

            log::debug!("Replaced {}", target.display());
            swapped.push(backed_up);
        }

        Ok(())
    }

    /// Put every swapped file back from its backup. Returns false if any
    /// restore failed.
    fn rollback(&self, swapped: &[bool]) -> bool {
        let mut restored = true;
        for (index, (staged, &had_original)) in self.staged.iter().zip(swapped).enumerate().rev() {
            let target = &staged.target;
            let result = if had_original {
                self.injected(index, Step::Restore)
                    .and_then(|()| fs::rename(backup_path(target), target))
            } else {
                match fs::remove_file(target) {
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    other => other,
                }
            };
            if let Err(e) = result {
                log::error!(
                    "Could not restore {}: {} (original kept in {})",
                    target.display(),
                    e,
                    backup_path(target).display()
                );
                restored = false;
            }
        }
        restored
    }
}

/// Write the staged contents to the temporary sibling of its target.
///
/// The temporary is created owner-only, so nothing can read it while it is
/// being filled. It then takes the original's mode and, when running as
/// root, its owner. A new target gets the staged mode.
fn write_temp(staged: &Staged) -> Result<PathBuf> {
    let target = &staged.target;
    let temp = temp_path(target);
    // Left behind by an interrupted run
    if let Err(e) = fs::remove_file(&temp)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        return Err(e.into());
    }

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(PRIVATE_FILE_MODE)
        .open(&temp)?;
    file.write_all(staged.contents.as_bytes())?;
    file.sync_all()?;

    let mode = match fs::metadata(target) {
        Ok(meta) => {
            if is_root() {
                std::os::unix::fs::chown(&temp, Some(meta.uid()), Some(meta.gid()))?;
            }
            meta.mode() & 0o7777
        }
        Err(_) => staged.new_mode,
    };
    fs::set_permissions(&temp, fs::Permissions::from_mode(mode))?;

    Ok(temp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backup_path() {
        assert_eq!(
            backup_path(Path::new("/etc/ntp.conf")),
            PathBuf::from("/etc/ntp.conf.bak")
        );
    }

    #[test]
    fn test_replace_file_keeps_backup() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("ntp.conf");
        fs::write(&target, "server old\n").unwrap();

        replace_file(&target, "server new\n").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "server new\n");
        assert_eq!(fs::read_to_string(backup_path(&target)).unwrap(), "server old\n");
        assert!(!temp_path(&target).exists());
    }

    #[test]
    fn test_replace_missing_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("resolv.conf");

        replace_file(&target, "nameserver 192.0.2.1\n").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "nameserver 192.0.2.1\n");
        assert!(!backup_path(&target).exists());
    }

    #[test]
    fn test_preserves_mode() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("shadow");
        fs::write(&target, "old").unwrap();
        fs::set_permissions(&target, fs::Permissions::from_mode(0o640)).unwrap();

        replace_file(&target, "new").unwrap();

        let mode = fs::metadata(&target).unwrap().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn test_new_file_modes() {
        let dir = TempDir::new().unwrap();
        let public = dir.path().join("resolv.conf");
        let private = dir.path().join("shadow");

        replace_file(&public, "nameserver 192.0.2.1\n").unwrap();
        replace_private_file(&private, "alice:$6$salt$hash:::::::\n").unwrap();

        assert_eq!(fs::metadata(&public).unwrap().mode() & 0o777, NEW_FILE_MODE);
        assert_eq!(fs::metadata(&private).unwrap().mode() & 0o777, PRIVATE_FILE_MODE);
    }

    #[test]
    fn test_stale_readable_temp_is_not_reused() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("shadow");
        let temp = temp_path(&target);
        fs::write(&temp, "stale").unwrap();
        fs::set_permissions(&temp, fs::Permissions::from_mode(0o644)).unwrap();

        let mut tx = Transaction::new();
        tx.stage_with_mode(&target, "alice:!:::::::\n", PRIVATE_FILE_MODE);
        let staged = &tx.staged[0];
        let written = write_temp(staged).unwrap();

        assert_eq!(written, temp);
        assert_eq!(fs::read_to_string(&temp).unwrap(), "alice:!:::::::\n");
        assert_eq!(fs::metadata(&temp).unwrap().mode() & 0o777, PRIVATE_FILE_MODE);
    }

    #[test]
    fn test_install_failure_restores_all_files() {
        let dir = TempDir::new().unwrap();
        let passwd = dir.path().join("passwd");
        let shadow = dir.path().join("shadow");
        fs::write(&passwd, "passwd-old").unwrap();
        fs::write(&shadow, "shadow-old").unwrap();

        let mut tx = Transaction::new();
        tx.stage(&passwd, "passwd-new").stage(&shadow, "shadow-new");
        tx.fail_at(1, Step::Install);
        let err = tx.commit().unwrap_err();

        assert!(matches!(err, Error::Swap { restored: true, .. }));
        assert_eq!(fs::read_to_string(&passwd).unwrap(), "passwd-old");
        assert_eq!(fs::read_to_string(&shadow).unwrap(), "shadow-old");
        assert!(!temp_path(&passwd).exists());
        assert!(!temp_path(&shadow).exists());
    }

    #[test]
    fn test_failed_restore_leaves_original_in_backup() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("ntp.conf");
        fs::write(&target, "server original\n").unwrap();

        let mut tx = Transaction::new();
        tx.stage(&target, "server replacement\n");
        tx.fail_at(0, Step::Install).fail_at(0, Step::Restore);
        let err = tx.commit().unwrap_err();

        assert!(matches!(err, Error::Swap { restored: false, .. }));
        assert!(!target.exists());
        assert_eq!(
            fs::read_to_string(backup_path(&target)).unwrap(),
            "server original\n"
        );
    }

    #[test]
    fn test_failure_removes_newly_created_file() {
        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("group");
        let created = dir.path().join("gshadow");
        fs::write(&existing, "old").unwrap();

        let mut tx = Transaction::new();
        tx.stage(&created, "new").stage(&existing, "new");
        tx.fail_at(1, Step::Install);
        tx.commit().unwrap_err();

        assert!(!created.exists());
        assert_eq!(fs::read_to_string(&existing).unwrap(), "old");
    }
}
