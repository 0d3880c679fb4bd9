//! Rendering of the canonical domain set into Unbound configuration
//!
//! Every domain becomes a redirect zone answered with the sinkhole address:
//!
//! ```text
//! local-zone: "example.com" redirect
//! local-data: "example.com A 145.237.235.240"
//! ```
//!
//! The output is a pure function of its inputs, so an unchanged registry
//! yields byte-identical files cycle after cycle.

use std::fmt::Write as _;
use std::net::IpAddr;

use crate::normalize::CanonicalDomainSet;

/// Complete resolver configuration text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedConfig {
    text: String,
}

impl RenderedConfig {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of configuration lines (two per domain)
    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

/// Render `domains` as Unbound `local-zone`/`local-data` pairs pointing at
/// `redirect`
///
/// IPv4 targets produce `A` records, IPv6 targets `AAAA` records. An empty
/// set renders to an empty (but valid) include file. Every domain in a
/// [`CanonicalDomainSet`] passed [`is_renderable_domain`], so each one yields
/// exactly two lines.
///
/// [`is_renderable_domain`]: crate::normalize::is_renderable_domain
pub fn render(domains: &CanonicalDomainSet, redirect: IpAddr) -> RenderedConfig {
    let record_type = match redirect {
        IpAddr::V4(_) => "A",
        IpAddr::V6(_) => "AAAA",
    };

    let mut text = String::new();
    for domain in domains.iter() {
        // Writing into a String cannot fail
        let _ = writeln!(text, "local-zone: \"{}\" redirect", domain);
        let _ = writeln!(text, "local-data: \"{} {} {}\"", domain, record_type, redirect);
    }

    RenderedConfig { text }
}
