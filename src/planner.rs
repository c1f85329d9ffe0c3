//! Reconciliation planner.
//!
//! Decides, for one firewall, whether the requested flow is already
//! governed by a rule of the desired action, is intercepted first by a
//! contradictory rule, or can be reached by editing the nearest rule.

use log::debug;

use crate::compile::{compile, CompiledRule};
use crate::search::{search, SearchResult};
use crate::types::{CandidateFlow, FirewallSnapshot, MatchRecord, Verdict, ANY};

/// Reconcile a flow against an ordered rulebase.
pub fn plan(flow: &CandidateFlow, rules: &[CompiledRule]) -> Verdict {
    plan_from_search(&search(flow, rules))
}

/// Derive the verdict from a finished search.
///
/// Decision order, first applicable wins:
/// 1. a permitting match ahead of every negating match: `AlreadyPermitted`
/// 2. the enabled rule ahead of the first negating match that shares the most
///    fields with the flow, lowest index on ties: `ModifiableRule`
/// 3. a negating match with no such rule ahead of it: `Shadowed`
/// 4. otherwise `NoCandidate`
pub fn plan_from_search(result: &SearchResult) -> Verdict {
    let permitting = result.min_permitting();
    let negating = result.min_negating();

    if let Some(rule_index) = permitting {
        if negating.map_or(true, |n| rule_index < n) {
            return Verdict::AlreadyPermitted { rule_index };
        }
    }

    if let Some(record) = nearest_candidate(&result.records, negating) {
        debug!(
            "plan: rule {} is nearest with {} matching fields",
            record.rule_index,
            record.matched_field_count()
        );
        return Verdict::ModifiableRule {
            rule_index: record.rule_index,
            differing_fields: record.differing_fields(),
        };
    }

    match negating {
        Some(negating_rule_index) => Verdict::Shadowed {
            negating_rule_index,
        },
        None => Verdict::NoCandidate,
    }
}

/// The record below `limit` with the most matching fields, lowest index on ties.
/// Records sharing no field with the flow are not candidates.
fn nearest_candidate(records: &[MatchRecord], limit: Option<u32>) -> Option<&MatchRecord> {
    records
        .iter()
        .filter(|r| limit.map_or(true, |n| r.rule_index < n))
        .map(|r| (r.matched_field_count(), r))
        .filter(|(count, _)| *count > 0)
        .max_by(|(a_count, a), (b_count, b)| {
            a_count
                .cmp(b_count)
                .then_with(|| b.rule_index.cmp(&a.rule_index))
        })
        .map(|(_, r)| r)
}

/// Reconcile a flow against one firewall's snapshot.
///
/// The firewall's zone context is applied first: an `any` zone in the flow
/// takes the zone the firewall places the endpoint in, and a specific zone
/// that disagrees with it yields `ZoneMismatch` without searching.
pub fn plan_firewall(flow: &CandidateFlow, firewall: &FirewallSnapshot) -> Verdict {
    let flow = match apply_zone_context(flow, firewall) {
        Ok(flow) => flow,
        Err(mismatch) => return mismatch,
    };

    if firewall.rules.is_empty() {
        debug!("firewall {}: empty rulebase", firewall.id);
        return Verdict::NoCandidate;
    }

    let rules = compile(&firewall.rules);
    plan(&flow, rules.rules())
}

fn apply_zone_context(
    flow: &CandidateFlow,
    firewall: &FirewallSnapshot,
) -> std::result::Result<CandidateFlow, Verdict> {
    let (source_zone, source_ok) =
        resolve_zone(&flow.source_zone, firewall.zones.source_zone.as_deref());
    let (destination_zone, destination_ok) = resolve_zone(
        &flow.destination_zone,
        firewall.zones.destination_zone.as_deref(),
    );

    if !source_ok || !destination_ok {
        return Err(Verdict::ZoneMismatch {
            source: !source_ok,
            destination: !destination_ok,
        });
    }

    let mut flow = flow.clone();
    flow.source_zone = source_zone;
    flow.destination_zone = destination_zone;
    Ok(flow)
}

/// Returns the zone to evaluate with and whether the requested zone is consistent
fn resolve_zone(requested: &str, known: Option<&str>) -> (String, bool) {
    match known {
        None => (requested.to_string(), true),
        Some(known) if requested.eq_ignore_ascii_case(ANY) => (known.to_string(), true),
        Some(known) => (requested.to_string(), requested.eq_ignore_ascii_case(known)),
    }
}
