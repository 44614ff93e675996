//! Resolver bus backend using the `busctl` command.

use crate::bus::{
    DnsEntry, DomainEntry, INTERFACE, OBJECT_PATH, ResolverBus, SERVICE, parse_dns, parse_domains,
    set_link_dns_args, set_link_domains_args,
};
use crate::error::{Error, Result};
use std::process::{Command, Output};

/// Backend that executes real `busctl` commands against the system bus.
pub struct BusctlBackend {
    /// Path to the busctl executable
    busctl_path: String,
}

impl Default for BusctlBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BusctlBackend {
    /// Create a backend that runs `busctl` from `PATH`.
    pub fn new() -> Self {
        Self::with_path("busctl")
    }

    /// Create a backend using a specific busctl executable.
    pub fn with_path(busctl_path: impl Into<String>) -> Self {
        Self {
            busctl_path: busctl_path.into(),
        }
    }

    /// Check if busctl can be executed.
    pub fn is_available(&self) -> bool {
        self.run_busctl(&["--version"]).is_ok_and(|o| o.status.success())
    }

    /// Run a busctl command and return output.
    fn run_busctl<S: AsRef<str>>(&self, args: &[S]) -> Result<Output> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        log::trace!("{} {}", self.busctl_path, args.join(" "));
        Command::new(&self.busctl_path)
            .arg("--system")
            .args(&args)
            .output()
            .map_err(|e| Error::Bus {
                message: format!("failed to execute {}: {}", self.busctl_path, e),
            })
    }

    /// Run a busctl command and check for success.
    fn run_busctl_checked<S: AsRef<str>>(&self, args: &[S]) -> Result<Vec<u8>> {
        let output = self.run_busctl(args)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::from_busctl_output(&stderr));
        }

        Ok(output.stdout)
    }

    fn get_property(&self, property: &str) -> Result<serde_json::Value> {
        let stdout = self.run_busctl_checked(&[
            "--json=short",
            "get-property",
            SERVICE,
            OBJECT_PATH,
            INTERFACE,
            property,
        ])?;
        Ok(serde_json::from_slice(&stdout)?)
    }
}

impl ResolverBus for BusctlBackend {
    fn dns(&self) -> Result<Vec<DnsEntry>> {
        parse_dns(&self.get_property("DNS")?)
    }

    fn domains(&self) -> Result<Vec<DomainEntry>> {
        parse_domains(&self.get_property("Domains")?)
    }

    fn set_link_dns(&self, ifindex: i32, servers: &[(i32, Vec<u8>)]) -> Result<()> {
        self.run_busctl_checked(&set_link_dns_args(ifindex, servers))?;
        Ok(())
    }

    fn set_link_domains(&self, ifindex: i32, domains: &[(String, bool)]) -> Result<()> {
        self.run_busctl_checked(&set_link_domains_args(ifindex, domains))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_executable_is_transport_error() {
        let backend = BusctlBackend::with_path("/nonexistent/busctl");
        assert!(!backend.is_available());
        let err = backend.dns().unwrap_err();
        assert!(err.is_retryable());
    }
}
