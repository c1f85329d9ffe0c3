use std::net::IpAddr;

use super::Matcher;
use crate::types::AddressToken;

/// Check whether a single rule address token covers the candidate.
///
/// `any` on either side always matches. Otherwise the candidate's first and
/// last address must both fall inside the rule token, and the address
/// families must agree. A single IP is its own one-address span, a CIDR
/// spans network to broadcast.
pub fn address_matches(candidate: &AddressToken, rule: &AddressToken) -> bool {
    let (Some((rule_first, rule_last)), Some((cand_first, cand_last))) =
        (span(rule), span(candidate))
    else {
        return true;
    };

    if rule_first.is_ipv4() != cand_first.is_ipv4() {
        return false;
    }
    rule_first <= cand_first && cand_last <= rule_last
}

/// First and last address of a token, `None` for `any`
fn span(token: &AddressToken) -> Option<(IpAddr, IpAddr)> {
    match *token {
        AddressToken::Any => None,
        AddressToken::Ip(ip) => Some((ip, ip)),
        AddressToken::Cidr(net) => Some((net.network(), net.broadcast())),
        AddressToken::Range(start, end) => Some((start, end)),
    }
}

/// Address matcher for one rule field (source or destination)
#[derive(Debug, Clone)]
pub struct AddressMatcher {
    tokens: Vec<AddressToken>,
    negate: bool,
}

impl AddressMatcher {
    pub fn new(tokens: Vec<AddressToken>, negate: bool) -> Self {
        Self { tokens, negate }
    }

    pub fn tokens(&self) -> &[AddressToken] {
        &self.tokens
    }

    pub fn is_negated(&self) -> bool {
        self.negate
    }
}

impl Matcher<AddressToken> for AddressMatcher {
    /// Tokens are alternatives. The negate flag inverts the result, except
    /// for an `any` candidate which is never negated. A field with no tokens
    /// matches nothing, an `any` candidate included.
    fn matches(&self, candidate: &AddressToken) -> bool {
        let matched = self
            .tokens
            .iter()
            .any(|token| address_matches(candidate, token));

        if self.negate && !candidate.is_any() {
            !matched
        } else {
            matched
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(text: &str) -> AddressToken {
        text.parse().unwrap()
    }

    fn matcher(tokens: &[&str], negate: bool) -> AddressMatcher {
        AddressMatcher::new(tokens.iter().map(|t| token(t)).collect(), negate)
    }

    #[test]
    fn test_any_on_either_side() {
        assert!(address_matches(&token("any"), &token("10.0.0.0/8")));
        assert!(address_matches(&token("192.168.1.1"), &token("any")));
        assert!(address_matches(&token("2001:db8::1"), &token("any")));
    }

    #[test]
    fn test_ip_in_range() {
        let rule = token("10.0.0.10-10.0.0.20");
        assert!(address_matches(&token("10.0.0.10"), &rule));
        assert!(address_matches(&token("10.0.0.20"), &rule));
        assert!(address_matches(&token("10.0.0.15"), &rule));
        assert!(!address_matches(&token("10.0.0.21"), &rule));
        assert!(!address_matches(&token("10.0.0.9"), &rule));
    }

    #[test]
    fn test_cidr_in_range() {
        let rule = token("10.0.0.0-10.0.1.255");
        assert!(address_matches(&token("10.0.1.0/24"), &rule));
        assert!(address_matches(&token("10.0.0.0/23"), &rule));
        assert!(!address_matches(&token("10.0.0.0/22"), &rule));
    }

    #[test]
    fn test_cidr_containment() {
        let rule = token("10.0.0.0/24");
        assert!(address_matches(&token("10.0.0.5"), &rule));
        assert!(address_matches(&token("10.0.0.128/25"), &rule));
        assert!(address_matches(&token("10.0.0.0/24"), &rule));
        assert!(!address_matches(&token("10.0.0.0/16"), &rule));
        assert!(!address_matches(&token("10.0.1.5"), &rule));
    }

    #[test]
    fn test_single_ip_rule() {
        let rule = token("10.0.0.5");
        assert!(address_matches(&token("10.0.0.5"), &rule));
        assert!(address_matches(&token("10.0.0.5/32"), &rule));
        assert!(!address_matches(&token("10.0.0.6"), &rule));
        assert!(!address_matches(&token("10.0.0.0/24"), &rule));
    }

    #[test]
    fn test_family_mismatch() {
        assert!(!address_matches(&token("::ffff:10.0.0.5"), &token("10.0.0.0/8")));
        assert!(!address_matches(&token("10.0.0.5"), &token("::/0")));
        assert!(address_matches(&token("2001:db8::1"), &token("2001:db8::/32")));
    }

    #[test]
    fn test_candidate_range_in_cidr() {
        let rule = token("10.0.0.0/24");
        assert!(address_matches(&token("10.0.0.1-10.0.0.9"), &rule));
        assert!(!address_matches(&token("10.0.0.250-10.0.1.3"), &rule));
    }

    #[test]
    fn test_tokens_are_alternatives() {
        let m = matcher(&["192.168.0.0/16", "10.0.0.5"], false);
        assert!(m.matches(&token("10.0.0.5")));
        assert!(m.matches(&token("192.168.4.4")));
        assert!(!m.matches(&token("172.16.0.1")));

        let empty = AddressMatcher::new(Vec::new(), false);
        assert!(!empty.matches(&token("10.0.0.5")));
        assert!(!empty.matches(&token("any")));
    }

    #[test]
    fn test_negation_inverts() {
        let plain = matcher(&["10.0.0.0/24"], false);
        let negated = matcher(&["10.0.0.0/24"], true);
        for candidate in ["10.0.0.5", "10.0.1.5", "10.0.0.0/25", "10.0.0.0/8"] {
            let candidate = token(candidate);
            assert_eq!(negated.matches(&candidate), !plain.matches(&candidate));
        }
    }

    #[test]
    fn test_any_candidate_never_negated() {
        let negated = matcher(&["10.0.0.0/24"], true);
        assert!(negated.matches(&token("any")));
    }

    #[test]
    fn test_wildcard_absorbs_candidates() {
        let m = matcher(&["10.9.9.9", "any"], false);
        for candidate in ["1.2.3.4", "10.0.0.0/8", "2001:db8::1", "10.0.0.1-10.0.0.2"] {
            assert!(m.matches(&token(candidate)));
        }
    }

    #[test]
    fn test_range_containment_monotonic() {
        let rule = token("10.0.0.0-10.0.0.255");
        let inner = token("10.0.0.16/28");
        let outer = token("10.0.0.0/26");
        assert!(address_matches(&outer, &rule));
        assert!(address_matches(&inner, &rule));
    }
}
