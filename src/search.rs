//! Policy search.
//!
//! Scans a rulebase in enforcement order and splits the fully matching
//! rules by whether they carry the requested action or its opposite.

use log::debug;

use crate::compile::CompiledRule;
use crate::evaluate::evaluate;
use crate::types::{CandidateFlow, MatchRecord};

/// Result of scanning one rulebase for a flow
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    /// Indices of fully matching rules with the requested action, ascending
    pub permitting: Vec<u32>,
    /// Indices of fully matching rules with the opposite action, ascending
    pub negating: Vec<u32>,
    /// One record per enabled rule, ascending by index
    pub records: Vec<MatchRecord>,
}

impl SearchResult {
    /// Lowest permitting index, `None` when there is none
    pub fn min_permitting(&self) -> Option<u32> {
        self.permitting.iter().min().copied()
    }

    /// Lowest negating index, `None` when there is none
    pub fn min_negating(&self) -> Option<u32> {
        self.negating.iter().min().copied()
    }
}

/// Search a rulebase for rules that fully match the flow.
///
/// Rules need not be sorted; they are scanned in ascending index order.
pub fn search(flow: &CandidateFlow, rules: &[CompiledRule]) -> SearchResult {
    let mut ordered: Vec<&CompiledRule> = rules.iter().collect();
    ordered.sort_by_key(|rule| rule.index);

    let mut result = SearchResult::default();
    for rule in ordered {
        let Some(record) = evaluate(flow, rule) else {
            continue;
        };

        if record.is_full_match() {
            if rule.action == flow.desired_action {
                result.permitting.push(rule.index);
            } else {
                result.negating.push(rule.index);
            }
        }
        result.records.push(record);
    }

    debug!(
        "search: {} rules, permitting {:?}, negating {:?}",
        rules.len(),
        result.permitting,
        result.negating
    );
    result
}
