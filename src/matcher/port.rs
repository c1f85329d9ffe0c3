use crate::types::PortToken;

/// Check whether a single rule port token covers a candidate port token.
///
/// - `any` on either side matches
/// - `app-default` never takes part in numeric containment. It matches only
///   when the entry is application-governed (`app_governed`); an `any`
///   candidate is already covered above.
/// - otherwise the candidate's range must lie within the rule's range
///   (a literal port is a one-port range)
pub fn port_matches(candidate: PortToken, rule: PortToken, app_governed: bool) -> bool {
    match (rule, candidate) {
        (PortToken::Any, _) | (_, PortToken::Any) => true,
        (PortToken::AppDefault, _) => app_governed,
        (_, PortToken::AppDefault) => false,
        (rule, candidate) => match (rule.bounds(), candidate.bounds()) {
            (Some((rule_start, rule_end)), Some((cand_start, cand_end))) => {
                cand_start >= rule_start && cand_end <= rule_end
            }
            _ => false,
        },
    }
}

/// Destination-port matcher for one service entry
#[derive(Debug, Clone)]
pub struct PortMatcher {
    tokens: Vec<PortToken>,
    app_governed: bool,
}

impl PortMatcher {
    /// `app_governed` is set when the entry names a specific application,
    /// which then decides what `app-default` covers.
    pub fn new(tokens: Vec<PortToken>, app_governed: bool) -> Self {
        Self {
            tokens,
            app_governed,
        }
    }

    pub fn tokens(&self) -> &[PortToken] {
        &self.tokens
    }

    /// Find the rule token hit by the candidate ports.
    ///
    /// Candidate ports are tried in order and the first rule token that
    /// covers one of them is returned.
    pub fn find(&self, candidate: &[PortToken]) -> Option<PortToken> {
        candidate.iter().find_map(|cand| {
            self.tokens
                .iter()
                .copied()
                .find(|rule| port_matches(*cand, *rule, self.app_governed))
        })
    }

    pub fn matches(&self, candidate: &[PortToken]) -> bool {
        self.find(candidate).is_some()
    }
}
