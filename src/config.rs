use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use syskit::{AccountPaths, RetryConfig, UidRange};

/// Settings file read when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sysreconcile/config.toml";

/// Datastore directory when running as root
pub const SYSTEM_DATASTORE_DIR: &str = "/var/lib/sysreconcile";

// ============================================================================
// Settings
// ============================================================================

/// How DNS configuration reaches the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DnsBackend {
    /// systemd-resolved over the system bus
    #[default]
    Resolved,
    /// Plain /etc/resolv.conf
    ResolvConf,
}

/// Which collections are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Features {
    pub dns_resolver: bool,
    pub ntp: bool,
    pub authentication: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self::all()
    }
}

impl Features {
    pub fn all() -> Self {
        Self {
            dns_resolver: true,
            ntp: true,
            authentication: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DnsSettings {
    pub backend: DnsBackend,
    /// Network link the resolver settings apply to
    pub ifindex: i32,
    pub resolv_conf: PathBuf,
    pub busctl: String,
}

impl Default for DnsSettings {
    fn default() -> Self {
        Self {
            backend: DnsBackend::default(),
            ifindex: 1,
            resolv_conf: PathBuf::from(syskit::resolv_conf::DEFAULT_PATH),
            busctl: "busctl".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NtpSettings {
    pub config: PathBuf,
}

impl Default for NtpSettings {
    fn default() -> Self {
        Self {
            config: PathBuf::from(syskit::ntp_conf::DEFAULT_PATH),
        }
    }
}

/// Contents of the settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    pub features: Features,
    pub dns: DnsSettings,
    pub ntp: NtpSettings,
    pub accounts: AccountPaths,
    pub uid_range: UidRange,
    /// Where startup.toml and running.toml live
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datastore: Option<String>,
    pub retry: RetryConfig,
}

impl Settings {
    /// Load settings from `path`, or from the default location.
    ///
    /// A missing file at the default location yields built-in defaults; an
    /// explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        if !explicit && !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Datastore directory: configured, system-wide for root, or per-user.
    pub fn datastore_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.datastore {
            return Ok(PathBuf::from(shellexpand::tilde(dir).as_ref()));
        }
        if syskit::swap::is_root() {
            return Ok(PathBuf::from(SYSTEM_DATASTORE_DIR));
        }
        let state = dirs::state_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("state")))
            .context("Could not determine state directory")?;
        Ok(state.join("sysreconcile"))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize settings")
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.features.ntp);
        assert_eq!(settings.dns.backend, DnsBackend::Resolved);
        assert_eq!(settings.dns.ifindex, 1);
        assert_eq!(settings.uid_range.min, 1000);
        assert_eq!(settings.accounts.passwd, PathBuf::from("/etc/passwd"));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
datastore = "/tmp/store"

[features]
authentication = false

[dns]
backend = "resolv-conf"
resolv-conf = "/run/resolv.conf"

[uid-range]
min = 2000

[retry]
max-attempts = 5
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert!(!settings.features.authentication);
        assert!(settings.features.dns_resolver);
        assert_eq!(settings.dns.backend, DnsBackend::ResolvConf);
        assert_eq!(settings.dns.resolv_conf, PathBuf::from("/run/resolv.conf"));
        assert_eq!(settings.uid_range.min, 2000);
        assert_eq!(settings.uid_range.max, 65533);
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(
            settings.datastore_dir().unwrap(),
            PathBuf::from("/tmp/store")
        );
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(Settings::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[dns]\nbackend = \"dnsmasq\"\n").unwrap();
        let err = Settings::load(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("dnsmasq"));
    }

    #[test]
    fn test_settings_round_trip_through_toml() {
        let text = Settings::default().to_toml().unwrap();
        let parsed: Settings = toml::from_str(&text).unwrap();
        assert_eq!(parsed.dns, DnsSettings::default());
        assert_eq!(parsed.accounts, AccountPaths::default());
    }
}
