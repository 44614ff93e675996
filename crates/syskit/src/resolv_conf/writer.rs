//! Writer for the resolver configuration file.

use crate::resolv_conf::{ResolvConf, ResolverOptions};
use std::fmt::Write;

/// Render `conf`: kept lines first, then `search`, `nameserver` and
/// `options`.
pub fn write_string(conf: &ResolvConf) -> String {
    let mut output = String::new();

    for line in &conf.other {
        let _ = writeln!(output, "{line}");
    }

    if !conf.search.is_empty() {
        let _ = writeln!(output, "search {}", conf.search.join(" "));
    }

    for address in &conf.nameservers {
        let _ = writeln!(output, "nameserver {address}");
    }

    if conf.options != ResolverOptions::default() {
        let o = &conf.options;
        let _ = write!(
            output,
            "options timeout:{} attempts:{} ndots:{}",
            o.timeout, o.attempts, o.ndots
        );
        for word in &o.extra {
            let _ = write!(output, " {word}");
        }
        output.push('\n');
    }

    output
}
