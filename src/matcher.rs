//! Address specifications and the matcher set built from them.

use crate::error::GateError;
use ipnet::IpNet;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Parsed form of an address specification.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SpecKind {
    /// Exact match on one address.
    Single(IpAddr),
    /// Prefix match on a CIDR block.
    Network(IpNet),
}

/// A single IP address or CIDR block, keeping the text it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSpec {
    literal: String,
    kind: SpecKind,
}

impl AddressSpec {
    /// Parse a bare address (`10.0.0.1`, `::1`) or a CIDR block
    /// (`10.0.0.0/8`, `fd00::/8`).
    pub fn parse(literal: &str) -> Result<Self, GateError> {
        let trimmed = literal.trim();

        let kind = if let Ok(ip) = trimmed.parse::<IpAddr>() {
            SpecKind::Single(ip)
        } else if let Ok(net) = trimmed.parse::<IpNet>() {
            SpecKind::Network(net)
        } else {
            return Err(GateError::InvalidAddress(literal.to_string()));
        };

        Ok(Self {
            literal: literal.to_string(),
            kind,
        })
    }

    /// The text this spec was parsed from.
    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// Whether this spec is a CIDR block rather than a single address.
    pub fn is_network(&self) -> bool {
        matches!(self.kind, SpecKind::Network(_))
    }

    /// Check if an address falls within this spec.
    ///
    /// Families never cross: an IPv4 address does not match an IPv6 spec.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match &self.kind {
            SpecKind::Single(addr) => addr == ip,
            SpecKind::Network(net) => net.contains(ip),
        }
    }
}

impl FromStr for AddressSpec {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AddressSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.literal)
    }
}

/// Immutable set of address specs; an address matches if any spec contains it.
#[derive(Debug, Clone)]
pub struct MatcherSet {
    specs: Vec<AddressSpec>,
}

impl MatcherSet {
    /// Build a matcher set, failing on the first entry that does not parse.
    pub fn new<I, S>(entries: I) -> Result<Self, GateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let specs = entries
            .into_iter()
            .map(|entry| AddressSpec::parse(entry.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        if specs.is_empty() {
            return Err(GateError::EmptyList);
        }

        Ok(Self { specs })
    }

    /// Check a caller-supplied address string.
    ///
    /// An absent or unparseable address never matches. Surrounding
    /// whitespace is ignored, and an address carrying a port
    /// (`10.1.2.3:8080`, `[::1]:443`) matches on its address part.
    pub fn matches(&self, address: Option<&str>) -> bool {
        address
            .and_then(parse_client_address)
            .is_some_and(|ip| self.contains(&ip))
    }

    /// Check an already parsed address.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.specs.iter().any(|spec| spec.contains(ip))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AddressSpec> {
        self.specs.iter()
    }
}

/// Parse a client address, accepting a trailing port (`1.2.3.4:80`, `[::1]:80`).
fn parse_client_address(address: &str) -> Option<IpAddr> {
    let trimmed = address.trim();
    trimmed
        .parse::<IpAddr>()
        .ok()
        .or_else(|| trimmed.parse::<SocketAddr>().ok().map(|sock| sock.ip()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spec_ip() {
        let spec = AddressSpec::parse("192.168.1.1").unwrap();
        assert!(!spec.is_network());
        assert_eq!(spec.literal(), "192.168.1.1");
    }

    #[test]
    fn test_parse_spec_cidr() {
        let spec: AddressSpec = "10.0.0.0/8".parse().unwrap();
        assert!(spec.is_network());
        assert_eq!(spec.to_string(), "10.0.0.0/8");
    }

    #[test]
    fn test_parse_spec_ipv6() {
        assert!(!AddressSpec::parse("::1").unwrap().is_network());
        assert!(AddressSpec::parse("fd00::/8").unwrap().is_network());
    }

    #[test]
    fn test_parse_spec_invalid() {
        for bad in ["bup", "10.0.0.0/33", "300.1.1.1", "", "10.0.0.0/"] {
            match AddressSpec::parse(bad) {
                Err(GateError::InvalidAddress(literal)) => assert_eq!(literal, bad),
                other => panic!("expected InvalidAddress for {bad:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_matcher_set_names_offending_entry() {
        let err = MatcherSet::new(["127.0.0.1", "10.0.0.0/8", "not-an-ip", "::1"]).unwrap_err();
        assert!(matches!(err, GateError::InvalidAddress(ref s) if s == "not-an-ip"));
    }

    #[test]
    fn test_matcher_set_empty() {
        let entries: Vec<String> = Vec::new();
        assert!(matches!(MatcherSet::new(entries), Err(GateError::EmptyList)));
    }

    #[test]
    fn test_exact_spec_is_reflexive() {
        for addr in ["127.0.0.1", "192.168.1.1", "::1", "2001:db8::42"] {
            let set = MatcherSet::new([addr]).unwrap();
            assert!(set.matches(Some(addr)), "{addr} should match itself");
        }

        let set = MatcherSet::new(["192.168.1.1"]).unwrap();
        assert!(!set.matches(Some("192.168.1.2")));
    }

    #[test]
    fn test_cidr_containment() {
        let set = MatcherSet::new(["192.168.0.0/24"]).unwrap();

        for last in 0..=255u8 {
            let addr = format!("192.168.0.{last}");
            assert!(set.matches(Some(addr.as_str())), "{addr} should match");
        }
        assert!(!set.matches(Some("192.168.1.1")));
        assert!(!set.matches(Some("10.0.0.1")));
    }

    #[test]
    fn test_cidr_with_host_bits() {
        // Only the network bits of the spec count.
        let set = MatcherSet::new(["192.168.0.77/24"]).unwrap();
        assert!(set.matches(Some("192.168.0.1")));
        assert!(!set.matches(Some("192.168.1.77")));
    }

    #[test]
    fn test_families_do_not_cross() {
        let v4 = MatcherSet::new(["0.0.0.0/0"]).unwrap();
        assert!(!v4.matches(Some("::1")));
        assert!(!v4.matches(Some("::ffff:10.0.0.1")));

        let v6 = MatcherSet::new(["::/0"]).unwrap();
        assert!(!v6.matches(Some("10.0.0.1")));
        assert!(v6.matches(Some("2001:db8::1")));
    }

    #[test]
    fn test_multiple_specs() {
        let set = MatcherSet::new(["172.24.42.0/16", "192.168.1.0/24"]).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.matches(Some("192.168.1.1")));
        assert!(set.matches(Some("172.24.0.9")));
        assert!(!set.matches(Some("172.25.0.1")));
    }

    #[test]
    fn test_absent_or_malformed_address() {
        let set = MatcherSet::new(["0.0.0.0/0", "::/0"]).unwrap();
        assert!(!set.matches(None));
        assert!(!set.matches(Some("")));
        assert!(!set.matches(Some("not-an-ip")));
        assert!(!set.matches(Some("10.0.0.1, 10.0.0.2")));
    }

    #[test]
    fn test_address_with_port() {
        let set = MatcherSet::new(["10.0.0.0/8", "::1"]).unwrap();
        assert!(set.matches(Some("10.1.2.3:8080")));
        assert!(set.matches(Some("[::1]:443")));
        assert!(set.matches(Some(" 10.1.2.3 ")));
    }

    #[test]
    fn test_iter_preserves_order() {
        let set = MatcherSet::new(["10.0.0.0/8", "127.0.0.1", "::1"]).unwrap();
        let literals: Vec<&str> = set.iter().map(AddressSpec::literal).collect();
        assert_eq!(literals, vec!["10.0.0.0/8", "127.0.0.1", "::1"]);
    }
}
