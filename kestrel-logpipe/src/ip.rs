//! IP patterns used by `ip("...")` line and label filters
//!
//! A pattern is one of:
//! - a single address: `192.168.0.1`, `::1`
//! - a CIDR block: `10.0.0.0/8`, `2001:db8::/32`
//! - an inclusive range: `192.168.0.10-192.168.0.20`

use crate::error::{PipelineError, Result};
use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpPattern {
    Single(IpAddr),
    Cidr { network: IpAddr, prefix: u8 },
    Range { start: IpAddr, end: IpAddr },
}

impl IpPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let pattern = pattern.trim();

        if let Some((addr, prefix)) = pattern.split_once('/') {
            let network = parse_addr(pattern, addr)?;
            let prefix: u8 = prefix
                .parse()
                .map_err(|_| PipelineError::invalid_ip(pattern, "invalid prefix length"))?;
            if u32::from(prefix) > width(&network) {
                return Err(PipelineError::invalid_ip(pattern, "prefix length out of range"));
            }
            return Ok(IpPattern::Cidr { network, prefix });
        }

        if let Some((start, end)) = pattern.split_once('-') {
            let start = parse_addr(pattern, start)?;
            let end = parse_addr(pattern, end)?;
            if start.is_ipv4() != end.is_ipv4() {
                return Err(PipelineError::invalid_ip(pattern, "mixed address families in range"));
            }
            if to_bits(&start) > to_bits(&end) {
                return Err(PipelineError::invalid_ip(pattern, "range start is after range end"));
            }
            return Ok(IpPattern::Range { start, end });
        }

        Ok(IpPattern::Single(parse_addr(pattern, pattern)?))
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        match self {
            IpPattern::Single(addr) => addr == ip,
            IpPattern::Cidr { network, prefix } => {
                if network.is_ipv4() != ip.is_ipv4() {
                    return false;
                }
                let mask = prefix_mask(width(network), u32::from(*prefix));
                to_bits(network) & mask == to_bits(ip) & mask
            }
            IpPattern::Range { start, end } => {
                if start.is_ipv4() != ip.is_ipv4() {
                    return false;
                }
                let bits = to_bits(ip);
                to_bits(start) <= bits && bits <= to_bits(end)
            }
        }
    }

    /// Find whether any address embedded in `line` falls in the pattern
    pub fn matches_line(&self, line: &str) -> bool {
        line.split(|c: char| !(c.is_ascii_hexdigit() || c == '.' || c == ':'))
            .filter(|token| token.len() >= 2)
            .any(|token| self.matches_token(trim_token(token)))
    }

    /// Match a token, or failing that any suffix following a `:`, so an
    /// address glued to a hex word (`dead:10.1.2.3`) is still found
    fn matches_token(&self, token: &str) -> bool {
        let matches = |s: &str| s.parse::<IpAddr>().map_or(false, |ip| self.contains(&ip));
        matches(token)
            || token
                .match_indices(':')
                .map(|(idx, _)| &token[idx + 1..])
                .filter(|rest| !rest.is_empty() && !rest.starts_with(':'))
                .any(|rest| matches(rest))
    }
}

/// Strip sentence punctuation around a token, keeping the `::` of a
/// compressed IPv6 address
fn trim_token(token: &str) -> &str {
    let mut token = token.trim_matches('.');
    if token.starts_with(':') && !token.starts_with("::") {
        token = &token[1..];
    }
    if token.ends_with(':') && !token.ends_with("::") {
        token = &token[..token.len() - 1];
    }
    token
}

fn parse_addr(pattern: &str, addr: &str) -> Result<IpAddr> {
    addr.trim()
        .parse()
        .map_err(|_| PipelineError::invalid_ip(pattern, format!("invalid address {:?}", addr)))
}

fn width(ip: &IpAddr) -> u32 {
    if ip.is_ipv4() {
        32
    } else {
        128
    }
}

fn to_bits(ip: &IpAddr) -> u128 {
    match ip {
        IpAddr::V4(v4) => u128::from(u32::from(*v4)),
        IpAddr::V6(v6) => u128::from(*v6),
    }
}

fn prefix_mask(width: u32, prefix: u32) -> u128 {
    if prefix == 0 {
        return 0;
    }
    let full = if width == 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    };
    (u128::MAX << (width - prefix)) & full
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_single_address() {
        let p = IpPattern::parse("192.168.0.1").unwrap();
        assert!(p.contains(&ip("192.168.0.1")));
        assert!(!p.contains(&ip("192.168.0.2")));
    }

    #[test]
    fn test_cidr() {
        let p = IpPattern::parse("10.0.0.0/8").unwrap();
        assert!(p.contains(&ip("10.200.3.4")));
        assert!(!p.contains(&ip("11.0.0.1")));
        assert!(!p.contains(&ip("::1")));

        let p = IpPattern::parse("2001:db8::/32").unwrap();
        assert!(p.contains(&ip("2001:db8:1::5")));
        assert!(!p.contains(&ip("2001:db9::1")));

        let p = IpPattern::parse("0.0.0.0/0").unwrap();
        assert!(p.contains(&ip("8.8.8.8")));
    }

    #[test]
    fn test_range() {
        let p = IpPattern::parse("192.168.0.10-192.168.0.20").unwrap();
        assert!(p.contains(&ip("192.168.0.10")));
        assert!(p.contains(&ip("192.168.0.15")));
        assert!(p.contains(&ip("192.168.0.20")));
        assert!(!p.contains(&ip("192.168.0.21")));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(IpPattern::parse("not-an-ip").is_err());
        assert!(IpPattern::parse("10.0.0.0/33").is_err());
        assert!(IpPattern::parse("192.168.0.20-192.168.0.10").is_err());
        assert!(IpPattern::parse("10.0.0.1-::1").is_err());
    }

    #[test]
    fn test_matches_line() {
        let p = IpPattern::parse("10.0.0.0/8").unwrap();
        assert!(p.matches_line("GET /index.html from 10.1.2.3 took 5ms"));
        assert!(p.matches_line("addr:10.1.2.3"));
        assert!(p.matches_line("client=10.0.0.7,"));
        assert!(!p.matches_line("GET /index.html from 192.168.1.1"));
        assert!(!p.matches_line("no address here"));
    }

    #[test]
    fn test_matches_line_compressed_ipv6() {
        let loopback = IpPattern::parse("::1").unwrap();
        assert!(loopback.matches_line("conn from ::1"));
        assert!(loopback.matches_line("peer=[::1]:8080"));

        let link_local = IpPattern::parse("fe80::/10").unwrap();
        assert!(link_local.matches_line("addr fe80::"));
        assert!(link_local.matches_line("addr fe80::1."));
        assert!(!link_local.matches_line("addr 2001:db8::1"));
    }

    #[test]
    fn test_matches_line_hex_prefixed_address() {
        let p = IpPattern::parse("10.1.2.3").unwrap();
        assert!(p.matches_line("dead:10.1.2.3"));
        assert!(p.matches_line("id=beef:10.1.2.3:"));
        assert!(!p.matches_line("dead:10.1.2.4"));

        let v6 = IpPattern::parse("2001:db8::/32").unwrap();
        assert!(v6.matches_line("cafe:2001:db8::7"));
    }
}
