use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;

use ipnet::IpNet;

use crate::error::{PolicyError, Result};
use crate::types::{Action, AddressToken, PortToken, Rule, ANY, APP_DEFAULT};

/// Regex pattern for a port token
/// Format: port[-port]
static PORT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,5})(?:\s*-\s*(\d{1,5}))?$")
        .expect("PORT_PATTERN: hardcoded regex is invalid")
});

impl FromStr for AddressToken {
    type Err = PolicyError;

    /// Parse a resolved address literal.
    /// Examples: "any", "10.0.0.5", "10.0.0.0/24", "10.0.0.1-10.0.0.50", "2001:db8::/32"
    fn from_str(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.eq_ignore_ascii_case(ANY) {
            return Ok(AddressToken::Any);
        }

        let malformed = || PolicyError::MalformedAddressToken(text.to_string());

        if let Some((start, end)) = text.split_once('-') {
            let start: IpAddr = start.trim().parse().map_err(|_| malformed())?;
            let end: IpAddr = end.trim().parse().map_err(|_| malformed())?;
            if start.is_ipv4() != end.is_ipv4() || start > end {
                return Err(malformed());
            }
            return Ok(AddressToken::Range(start, end));
        }

        if text.contains('/') {
            // Host bits are allowed and dropped, "10.0.0.5/24" is 10.0.0.0/24
            let net: IpNet = text.parse().map_err(|_| malformed())?;
            return Ok(AddressToken::Cidr(net.trunc()));
        }

        text.parse::<IpAddr>()
            .map(AddressToken::Ip)
            .map_err(|_| malformed())
    }
}

impl TryFrom<String> for AddressToken {
    type Error = PolicyError;

    fn try_from(text: String) -> Result<Self> {
        text.parse()
    }
}

impl FromStr for PortToken {
    type Err = PolicyError;

    /// Parse a single port token.
    /// Examples: "443", "8000-9000", "any", "app-default"
    fn from_str(text: &str) -> Result<Self> {
        let text = text.trim().to_lowercase();
        if text == ANY {
            return Ok(PortToken::Any);
        }
        if text == APP_DEFAULT {
            return Ok(PortToken::AppDefault);
        }

        let malformed = || PolicyError::MalformedPortToken(text.clone());
        let captures = PORT_PATTERN.captures(&text).ok_or_else(malformed)?;
        let number = |m: regex::Match<'_>| -> Result<u16> {
            m.as_str().parse::<u16>().map_err(|_| malformed())
        };

        let start = match captures.get(1) {
            Some(m) => number(m)?,
            None => return Err(malformed()),
        };
        match captures.get(2) {
            Some(m) => {
                let end = number(m)?;
                if start > end {
                    return Err(PolicyError::MalformedPortToken(format!(
                        "Invalid port range: {} > {}",
                        start, end
                    )));
                }
                Ok(PortToken::Range(start, end))
            }
            None => Ok(PortToken::Single(start)),
        }
    }
}

impl TryFrom<String> for PortToken {
    type Error = PolicyError;

    fn try_from(text: String) -> Result<Self> {
        text.parse()
    }
}

impl FromStr for Action {
    type Err = PolicyError;

    /// Parse a rule action. The deny family (`drop`, `reset-*`) maps to `Deny`.
    fn from_str(text: &str) -> Result<Self> {
        match text.trim().to_lowercase().as_str() {
            "allow" => Ok(Action::Allow),
            "deny" | "drop" | "reset-client" | "reset-server" | "reset-both" => Ok(Action::Deny),
            other => Err(PolicyError::InvalidAction(other.to_string())),
        }
    }
}

impl TryFrom<String> for Action {
    type Error = PolicyError;

    fn try_from(text: String) -> Result<Self> {
        text.parse()
    }
}

/// Parse the action a caller requests for a flow: only `allow` or `deny`
pub fn parse_flow_action(text: &str) -> Result<Action> {
    match text.trim().to_lowercase().as_str() {
        "allow" => Ok(Action::Allow),
        "deny" => Ok(Action::Deny),
        other => Err(PolicyError::InvalidAction(other.to_string())),
    }
}

/// Parse a comma-separated port list as found in a rule's service entry.
/// Examples: "443", "80,443", "80, 8000-8080", "any", "app-default"
pub fn parse_port_list(text: &str) -> Result<Vec<PortToken>> {
    let ports = text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<PortToken>>>()?;

    if ports.is_empty() {
        return Err(PolicyError::MalformedPortToken(text.to_string()));
    }
    Ok(ports)
}

/// Parse the ports of a candidate flow.
///
/// An empty list means `any`. Literal ports must be 1-65535 and the
/// `app-default` sentinel is rejected, it only has meaning inside a rule.
pub fn parse_candidate_ports(text: &str) -> Result<Vec<PortToken>> {
    if text.trim().is_empty() {
        return Ok(vec![PortToken::Any]);
    }

    let ports = parse_port_list(text)?;
    for port in &ports {
        match port {
            PortToken::AppDefault => {
                return Err(PolicyError::InvalidFlow(
                    "app-default is not a valid flow port".to_string(),
                ))
            }
            PortToken::Single(0) | PortToken::Range(0, _) => {
                return Err(PolicyError::InvalidFlow(format!(
                    "port out of range 1-65535: {}",
                    port
                )))
            }
            _ => {}
        }
    }
    Ok(ports)
}

/// Parse a rulebase from a JSON array of rule records.
///
/// Rule indices must be unique within one rulebase.
pub fn parse_rulebase(json: &str) -> Result<Vec<Rule>> {
    let rules: Vec<Rule> = serde_json::from_str(json)?;

    let mut seen = HashSet::with_capacity(rules.len());
    for rule in &rules {
        if !seen.insert(rule.index) {
            return Err(PolicyError::ParseError(format!(
                "duplicate rule index {} ({})",
                rule.index, rule.name
            )));
        }
    }
    Ok(rules)
}

/// Parse a rulebase from a JSON file.
pub fn parse_rulebase_from_file(path: impl AsRef<Path>) -> Result<Vec<Rule>> {
    let text = fs::read_to_string(path)?;
    parse_rulebase(&text)
}
