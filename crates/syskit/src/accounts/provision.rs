//! Home directories and `~/.ssh/authorized_keys` for managed accounts.
//!
//! Everything here runs after the account records are committed and is
//! best-effort: a failure is recorded in the [`ProvisionReport`] and does
//! not undo the records.

use crate::error::Result;
use crate::swap::{self, is_root};
use reconcile::{AuthorizedKey, Collection};
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One provisioning step that did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionFailure {
    pub user: String,
    pub step: &'static str,
    pub message: String,
}

/// What the provisioning pass after an account store did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub homes_created: Vec<String>,
    pub homes_removed: Vec<String>,
    pub key_files: Vec<String>,
    pub failures: Vec<ProvisionFailure>,
}

impl ProvisionReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Record the outcome of one step for `user`.
    pub(crate) fn record<T>(&mut self, user: &str, step: &'static str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("{step} for '{user}' failed: {e}");
                self.failures.push(ProvisionFailure {
                    user: user.to_string(),
                    step,
                    message: e.to_string(),
                });
                None
            }
        }
    }
}

fn set_owner(path: &Path, uid: u32, gid: u32) -> io::Result<()> {
    if is_root() {
        std::os::unix::fs::lchown(path, Some(uid), Some(gid))
    } else {
        log::trace!("not root, leaving owner of {}", path.display());
        Ok(())
    }
}

/// Create `home` with mode 0700 owned by the account, then copy `skel` in.
///
/// Returns false when the directory already existed; it is left alone.
pub fn create_home(home: &Path, skel: &Path, uid: u32, gid: u32) -> Result<bool> {
    if home.exists() {
        log::debug!("home {} already exists", home.display());
        return Ok(false);
    }
    if let Some(parent) = home.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::create_dir(home)?;
    fs::set_permissions(home, fs::Permissions::from_mode(0o700))?;
    set_owner(home, uid, gid)?;
    copy_skel(skel, home, uid, gid)?;
    Ok(true)
}

/// Copy the skeleton tree into a fresh home, preserving modes and links.
fn copy_skel(skel: &Path, home: &Path, uid: u32, gid: u32) -> Result<()> {
    if !skel.is_dir() {
        log::info!("no skeleton directory at {}", skel.display());
        return Ok(());
    }

    for entry in WalkDir::new(skel).min_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(skel)
            .map_err(|e| io::Error::other(e.to_string()))?;
        let dest = home.join(relative);
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            std::os::unix::fs::symlink(fs::read_link(entry.path())?, &dest)?;
        } else if file_type.is_dir() {
            fs::create_dir(&dest)?;
            fs::set_permissions(&dest, entry.metadata().map_err(io::Error::from)?.permissions())?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
        set_owner(&dest, uid, gid)?;
    }
    Ok(())
}

/// Delete a removed account's home, but only below `home_base`.
pub fn remove_home(home: &Path, home_base: &Path) -> Result<bool> {
    if home == home_base || !home.starts_with(home_base) {
        log::warn!(
            "not removing {}: outside {}",
            home.display(),
            home_base.display()
        );
        return Ok(false);
    }
    match fs::remove_dir_all(home) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

pub fn authorized_keys_path(home: &Path) -> PathBuf {
    home.join(".ssh").join("authorized_keys")
}

/// Render one key as `<algorithm> <data> <name>`.
pub fn format_key(key: &AuthorizedKey) -> String {
    format!("{} {} {}", key.algorithm, key.data, key.name)
}

fn is_key_type(word: &str) -> bool {
    word.starts_with("ssh-") || word.starts_with("ecdsa-") || word.starts_with("sk-")
}

/// Parsed authorized_keys file: managed keys plus every other line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyFile {
    /// Comments, option-prefixed keys and anything else not managed here,
    /// kept verbatim
    pub kept: Vec<String>,
    pub keys: Collection<AuthorizedKey>,
}

impl KeyFile {
    /// Parse authorized_keys text.
    ///
    /// Keys are named by their comment; a key without one is named after its
    /// line (`key3`). Lines with leading options are not managed and kept.
    pub fn parse(content: &str) -> Self {
        let mut file = Self::default();
        for (line_num, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                file.kept.push(raw.to_string());
                continue;
            }
            let mut words = line.split_whitespace();
            let (Some(algorithm), Some(data)) = (words.next(), words.next()) else {
                log::debug!("keeping unrecognised authorized_keys line {}", line_num + 1);
                file.kept.push(raw.to_string());
                continue;
            };
            if !is_key_type(algorithm) {
                log::debug!("keeping authorized_keys line {} with options", line_num + 1);
                file.kept.push(raw.to_string());
                continue;
            }
            let name = words
                .next()
                .map_or_else(|| format!("key{}", line_num + 1), str::to_string);
            file.keys.upsert(
                AuthorizedKey::new(name)
                    .with_algorithm(algorithm)
                    .with_data(data),
            );
        }
        file
    }

    /// Kept lines first, then one line per managed key.
    pub fn render(&self) -> String {
        let mut content = String::new();
        for line in &self.kept {
            content.push_str(line);
            content.push('\n');
        }
        for key in &self.keys {
            content.push_str(&format_key(key));
            content.push('\n');
        }
        content
    }
}

/// Managed keys in authorized_keys text.
pub fn parse_keys(content: &str) -> Collection<AuthorizedKey> {
    KeyFile::parse(content).keys
}

fn read_key_file(home: &Path) -> Result<Option<KeyFile>> {
    match fs::read_to_string(authorized_keys_path(home)) {
        Ok(content) => Ok(Some(KeyFile::parse(&content))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Keys currently installed for an account. A missing file has no keys.
pub fn read_authorized_keys(home: &Path) -> Result<Collection<AuthorizedKey>> {
    Ok(read_key_file(home)?.map(|file| file.keys).unwrap_or_default())
}

/// Write the account's managed keys into its authorized_keys file, creating
/// `~/.ssh` (0700) as needed and keeping lines not managed here. The file
/// gets mode 0600. Nothing is written for an account without keys and
/// without an existing file.
pub fn write_authorized_keys(
    home: &Path,
    keys: &Collection<AuthorizedKey>,
    uid: u32,
    gid: u32,
) -> Result<bool> {
    let path = authorized_keys_path(home);
    let mut file = match read_key_file(home)? {
        Some(file) => file,
        None if keys.is_empty() => return Ok(false),
        None => KeyFile::default(),
    };

    let ssh_dir = home.join(".ssh");
    if !ssh_dir.exists() {
        fs::create_dir_all(&ssh_dir)?;
        fs::set_permissions(&ssh_dir, fs::Permissions::from_mode(0o700))?;
        set_owner(&ssh_dir, uid, gid)?;
    }

    file.keys = keys.clone();
    swap::replace_private_file(&path, &file.render())?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    set_owner(&path, uid, gid)?;
    Ok(true)
}
