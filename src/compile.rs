use log::warn;

use crate::evaluate::evaluate;
use crate::matcher::{AddressMatcher, FieldMatcher, PortMatcher};
use crate::planner::plan_from_search;
use crate::search::{search, SearchResult};
use crate::types::{
    Action, AddressToken, CandidateFlow, MatchRecord, PortToken, Rule, ServiceEntry, Verdict,
    ANY,
};

/// A compiled service entry
#[derive(Debug, Clone)]
pub struct CompiledService {
    /// Protocol matcher
    pub protocol: FieldMatcher,
    /// Destination-port matcher
    pub ports: PortMatcher,
    /// Application matcher
    pub application: FieldMatcher,
    /// The entry as configured
    pub entry: ServiceEntry,
}

/// A compiled rule ready for evaluation
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// Evaluation precedence, lower first
    pub index: u32,
    pub name: String,
    pub action: Action,
    pub source: AddressMatcher,
    pub destination: AddressMatcher,
    pub from_zones: FieldMatcher,
    pub to_zones: FieldMatcher,
    pub services: Vec<CompiledService>,
    pub disabled: bool,
}

impl CompiledRule {
    /// Evaluate this rule against a flow, `None` if the rule is disabled
    pub fn evaluate(&self, flow: &CandidateFlow) -> Option<MatchRecord> {
        evaluate(flow, self)
    }

    /// Check if this rule fully matches the flow, ignoring action
    pub fn matches(&self, flow: &CandidateFlow) -> bool {
        self.evaluate(flow).is_some_and(|r| r.is_full_match())
    }
}

/// Compiled rulebase of one firewall
#[derive(Debug, Clone, Default)]
pub struct CompiledRuleSet {
    rules: Vec<CompiledRule>,
}

impl CompiledRuleSet {
    pub fn new(rules: Vec<CompiledRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Get the number of rules
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Find permitting and negating matches for the flow
    pub fn search(&self, flow: &CandidateFlow) -> SearchResult {
        search(flow, &self.rules)
    }

    /// Reconcile the flow against this rulebase
    pub fn plan(&self, flow: &CandidateFlow) -> Verdict {
        plan_from_search(&self.search(flow))
    }
}

/// Compile rule records into a CompiledRuleSet
pub fn compile(rules: &[Rule]) -> CompiledRuleSet {
    CompiledRuleSet::new(rules.iter().map(compile_rule).collect())
}

/// Compile a single rule.
///
/// Address and port tokens that do not parse are dropped with a warning, so
/// they can never match.
pub fn compile_rule(rule: &Rule) -> CompiledRule {
    let source = compile_addresses(rule, &rule.source_addresses, "source");
    let destination = compile_addresses(rule, &rule.destination_addresses, "destination");

    CompiledRule {
        index: rule.index,
        name: rule.name.clone(),
        action: rule.action,
        source: AddressMatcher::new(source, rule.negate_source),
        destination: AddressMatcher::new(destination, rule.negate_destination),
        from_zones: FieldMatcher::new(&rule.from_zones),
        to_zones: FieldMatcher::new(&rule.to_zones),
        services: rule
            .service_entries
            .iter()
            .map(|entry| compile_service(rule, entry))
            .collect(),
        disabled: rule.disabled,
    }
}

fn compile_addresses(rule: &Rule, tokens: &[String], field: &str) -> Vec<AddressToken> {
    tokens
        .iter()
        .filter_map(|text| match text.parse::<AddressToken>() {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(
                    "rule {} ({}): ignoring {} token: {}",
                    rule.index, rule.name, field, e
                );
                None
            }
        })
        .collect()
}

fn compile_service(rule: &Rule, entry: &ServiceEntry) -> CompiledService {
    let ports = compile_ports(rule, &entry.destination_port);
    let app_governed = !entry.application.trim().eq_ignore_ascii_case(ANY);

    CompiledService {
        protocol: FieldMatcher::new([&entry.protocol]),
        ports: PortMatcher::new(ports, app_governed),
        application: FieldMatcher::new([&entry.application]),
        entry: entry.clone(),
    }
}

fn compile_ports(rule: &Rule, text: &str) -> Vec<PortToken> {
    // Parse token by token so one bad token does not discard the whole list
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|token| match token.parse::<PortToken>() {
            Ok(port) => Some(port),
            Err(e) => {
                warn!(
                    "rule {} ({}): ignoring port token: {}",
                    rule.index, rule.name, e
                );
                None
            }
        })
        .collect()
}
