//! Parser for NTP daemon configuration.
//!
//! Association lines follow a restricted grammar:
//! ```text
//! server 192.0.2.1 iburst
//! pool 0.pool.ntp.org:123 iburst prefer  # campus
//! peer [2001:db8::7]:1123
//! ```
//! A trailing comment carries the server's name when it differs from the
//! address word. All other lines are kept verbatim.

use crate::error::{Error, Result};
use crate::ntp_conf::NtpConf;
use reconcile::{AssociationType, IpAddress, NtpServer};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// One association line, with an optional trailing `# name` comment.
static ASSOCIATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(server|pool|peer)\s+(\S+)((?:\s+(?:iburst|prefer))*)\s*(?:#\s*(.*?)\s*)?$")
        .expect("Invalid association regex")
});

/// Parse an NTP configuration file. A missing file parses as empty.
pub fn parse_file(path: &Path) -> Result<NtpConf> {
    let content = crate::swap::read_or_empty(path)?;
    parse_string(&content, path)
}

/// Parse NTP configuration text; `origin` names it in errors.
pub fn parse_string(content: &str, origin: &Path) -> Result<NtpConf> {
    let mut conf = NtpConf::default();

    for (line_num, raw) in content.lines().enumerate() {
        let line = raw.trim();
        let keyword = line.split_whitespace().next().unwrap_or_default();
        if !matches!(keyword, "server" | "pool" | "peer") {
            // Kept lines between association lines move below the block
            if conf.servers.is_empty() {
                conf.before.push(raw.to_string());
            } else {
                conf.after.push(raw.to_string());
            }
            continue;
        }

        let server = parse_association(line).map_err(|message| Error::Parse {
            path: origin.to_path_buf(),
            line: line_num + 1,
            message,
        })?;
        if conf.servers.iter().any(|s| s.name == server.name) {
            return Err(Error::Parse {
                path: origin.to_path_buf(),
                line: line_num + 1,
                message: format!("duplicate server name '{}'", server.name),
            });
        }
        conf.servers.push(server);
    }

    Ok(conf)
}

fn parse_association(line: &str) -> std::result::Result<NtpServer, String> {
    let caps = ASSOCIATION
        .captures(line)
        .ok_or_else(|| format!("unsupported association line '{line}'"))?;

    let association: AssociationType = caps[1]
        .parse()
        .map_err(|e: reconcile::Error| e.to_string())?;
    let word = &caps[2];
    let (address, port) = split_port(word)?;
    let options: Vec<&str> = caps[3].split_whitespace().collect();
    let name = caps
        .get(4)
        .map(|m| m.as_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(word);

    let mut server = NtpServer::new(name)
        .with_address(IpAddress::parse(address))
        .with_association(association)
        .with_iburst(options.contains(&"iburst"))
        .with_prefer(options.contains(&"prefer"));
    server.port = port;
    Ok(server)
}

/// Split `host:port` or `[v6]:port`. Bare IPv6 literals have no port.
pub(crate) fn split_port(word: &str) -> std::result::Result<(&str, Option<u16>), String> {
    let parse = |port: &str| {
        port.parse::<u16>()
            .map(Some)
            .map_err(|_| format!("invalid port '{port}' in '{word}'"))
    };

    if let Some(rest) = word.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| format!("unterminated '[' in '{word}'"))?;
        return match tail.strip_prefix(':') {
            Some(port) => Ok((host, parse(port)?)),
            None if tail.is_empty() => Ok((host, None)),
            None => Err(format!("unexpected '{tail}' after address in '{word}'")),
        };
    }

    match word.split_once(':') {
        Some((host, port)) if !port.contains(':') => Ok((host, parse(port)?)),
        _ => Ok((word, None)),
    }
}
