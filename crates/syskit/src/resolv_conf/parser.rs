//! Parser for the resolver configuration file.
//!
//! Recognizes the directives this crate manages:
//! ```text
//! nameserver 192.0.2.53
//! search corp.example lab.example
//! options timeout:5 attempts:2 ndots:1
//! ```
//! Everything else (comments, `domain`, `sortlist`, unknown options) is kept
//! so a rewrite does not lose it.

use crate::error::{Error, Result};
use crate::resolv_conf::{ResolvConf, ResolverOptions};
use reconcile::IpAddress;
use std::ops::RangeInclusive;
use std::path::Path;

pub(crate) const TIMEOUT_RANGE: RangeInclusive<u8> = 1..=30;
pub(crate) const ATTEMPTS_RANGE: RangeInclusive<u8> = 1..=5;
pub(crate) const NDOTS_RANGE: RangeInclusive<u8> = 1..=15;

/// Parse a resolver configuration file. A missing file parses as empty.
pub fn parse_file(path: &Path) -> Result<ResolvConf> {
    let content = crate::swap::read_or_empty(path)?;
    parse_string(&content, path)
}

/// Parse resolver configuration text; `origin` names it in errors.
pub fn parse_string(content: &str, origin: &Path) -> Result<ResolvConf> {
    let mut conf = ResolvConf::default();

    for (line_num, raw) in content.lines().enumerate() {
        let line = raw.trim();
        let fail = |message: String| Error::Parse {
            path: origin.to_path_buf(),
            line: line_num + 1,
            message,
        };

        let mut words = line.split_whitespace();
        match words.next() {
            Some("nameserver") => {
                let value = words
                    .next()
                    .ok_or_else(|| fail("nameserver without an address".to_string()))?;
                let address = IpAddress::parse(value);
                if !address.is_ip() {
                    return Err(fail(format!("nameserver '{value}' is not an IP address")));
                }
                conf.nameservers.push(address);
            }
            // The last search line wins
            Some("search") => {
                conf.search = words.map(str::to_string).collect();
            }
            Some("options") => {
                for word in words {
                    parse_option(&mut conf.options, word).map_err(fail)?;
                }
            }
            _ => conf.other.push(raw.to_string()),
        }
    }

    Ok(conf)
}

fn parse_option(options: &mut ResolverOptions, word: &str) -> std::result::Result<(), String> {
    let Some((name, value)) = word.split_once(':') else {
        options.extra.push(word.to_string());
        return Ok(());
    };
    let (slot, range) = match name {
        "timeout" => (&mut options.timeout, TIMEOUT_RANGE),
        "attempts" => (&mut options.attempts, ATTEMPTS_RANGE),
        "ndots" => (&mut options.ndots, NDOTS_RANGE),
        _ => {
            options.extra.push(word.to_string());
            return Ok(());
        }
    };
    let parsed: u8 = value
        .parse()
        .map_err(|_| format!("option {name} value '{value}' is not a number"))?;
    if !range.contains(&parsed) {
        return Err(format!(
            "option {name}:{parsed} outside {}..={}",
            range.start(),
            range.end()
        ));
    }
    *slot = parsed;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<ResolvConf> {
        parse_string(content, Path::new("resolv.conf"))
    }

    #[test]
    fn test_parse_directives() {
        let conf = parse(
            "# Generated by NetworkManager\n\
             search corp.example lab.example\n\
             nameserver 192.0.2.53\n\
             nameserver 2001:db8::53\n\
             options timeout:3 attempts:4 rotate\n",
        )
        .unwrap();

        assert_eq!(conf.search, vec!["corp.example", "lab.example"]);
        assert_eq!(conf.nameservers.len(), 2);
        assert_eq!(conf.nameservers[1], IpAddress::parse("2001:db8::53"));
        assert_eq!(conf.options.timeout, 3);
        assert_eq!(conf.options.attempts, 4);
        assert_eq!(conf.options.ndots, 1);
        assert_eq!(conf.options.extra, vec!["rotate"]);
        assert_eq!(conf.other, vec!["# Generated by NetworkManager"]);
    }

    #[test]
    fn test_last_search_line_wins() {
        let conf = parse("search a.example\nsearch b.example\n").unwrap();
        assert_eq!(conf.search, vec!["b.example"]);
    }

    #[test]
    fn test_option_out_of_range() {
        let err = parse("options ndots:16\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));
    }

    #[test]
    fn test_hostname_nameserver_rejected() {
        let err = parse("\nnameserver dns.example\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }

    #[test]
    fn test_empty_input() {
        let conf = parse("").unwrap();
        assert!(conf.nameservers.is_empty());
        assert_eq!(conf.options, ResolverOptions::default());
    }
}
