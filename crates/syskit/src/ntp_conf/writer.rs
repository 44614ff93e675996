//! Writer for NTP daemon configuration.

use crate::error::{Error, Result};
use crate::ntp_conf::NtpConf;
use reconcile::NtpServer;
use std::fmt::Write;

/// Render one association line.
pub fn write_server(server: &NtpServer) -> Result<String> {
    let incomplete = |field: &str| Error::Encode {
        what: format!("ntp server '{}'", server.name),
        message: format!("missing {field}"),
    };
    let address = server.address.as_ref().ok_or_else(|| incomplete("address"))?;
    let association = server
        .association_type
        .ok_or_else(|| incomplete("association type"))?;
    if server.name.chars().any(char::is_control) {
        return Err(Error::Encode {
            what: format!("ntp server '{}'", server.name.escape_debug()),
            message: "name contains control characters".to_string(),
        });
    }
    address.validate("address").map_err(|e| Error::Encode {
        what: format!("ntp server '{}'", server.name),
        message: e.to_string(),
    })?;

    let word = address.with_port(server.port);
    let mut line = format!("{} {word}", association.as_str());
    if server.iburst {
        line.push_str(" iburst");
    }
    if server.prefer {
        line.push_str(" prefer");
    }
    if server.name != word {
        let _ = write!(line, " # {}", server.name);
    }
    Ok(line)
}

/// Render the whole file: leading kept lines, the association block, then
/// the remaining kept lines.
pub fn write_string(conf: &NtpConf) -> Result<String> {
    let mut output = String::new();
    for line in &conf.before {
        let _ = writeln!(output, "{line}");
    }
    for server in &conf.servers {
        let _ = writeln!(output, "{}", write_server(server)?);
    }
    for line in &conf.after {
        let _ = writeln!(output, "{line}");
    }
    Ok(output)
}
