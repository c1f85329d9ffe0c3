//! Policy Engine - first-match policy reconciliation for firewall rulebases
//!
//! Given a candidate network flow and the ordered security rules of one or
//! more firewalls, this library determines:
//! - whether the flow is already allowed/denied, and by which rule
//! - whether an opposite-action rule ahead of it would intercept a new rule
//! - otherwise, the nearest existing rule and the fields it would need changed
//!
//! Matching follows first-match firewall semantics: ascending rule index,
//! `any` wildcards, IP/CIDR/range containment, negated address fields and
//! multi-valued service entries. Everything happens in memory.
//!
//! # Example
//!
//! ```rust
//! use policy_engine_r::{
//!     Action, CandidateFlow, EngineOptions, FirewallSnapshot, PolicyEngine, PortToken, Rule,
//!     Verdict,
//! };
//!
//! let rules = vec![
//!     Rule::new(1, "block-guest", Action::Deny)
//!         .with_sources(&["192.168.50.0/24"])
//!         .with_from_zones(&["guest"]),
//!     Rule::new(3, "web", Action::Allow)
//!         .with_sources(&["10.0.0.0/24"])
//!         .with_service("tcp", "8443", "any"),
//! ];
//! let firewalls = vec![FirewallSnapshot::new("fw-east", rules)];
//!
//! let flow = CandidateFlow::new(
//!     "10.0.0.5".parse().unwrap(),
//!     "any".parse().unwrap(),
//!     Action::Allow,
//! )
//! .with_source_zone("trust")
//! .with_protocol("tcp")
//! .with_ports(vec![PortToken::Single(443)]);
//!
//! let engine = PolicyEngine::new(EngineOptions::new());
//! let groups = engine.evaluate(&flow, &firewalls);
//!
//! assert_eq!(groups[0].firewalls, vec!["fw-east"]);
//! assert!(matches!(groups[0].verdict, Verdict::ModifiableRule { rule_index: 3, .. }));
//! ```
//!
//! # Token Syntax
//!
//! ## Addresses
//!
//! | Type | Example |
//! |------|---------|
//! | IP | `10.0.0.5` |
//! | CIDR | `10.0.0.0/24` |
//! | Range | `10.0.0.1-10.0.0.50` |
//! | All | `any` |
//!
//! ## Ports
//!
//! - `443` - single port
//! - `8000-9000` - inclusive range
//! - `80,443,8000-8080` - set
//! - `any` - every port
//! - `app-default` - the ports of the entry's application (rules only)

pub mod aggregate;
pub mod catalog;
pub mod compile;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod matcher;
pub mod parser;
pub mod planner;
pub mod search;
pub mod types;

// Re-export commonly used items
pub use aggregate::aggregate;
pub use catalog::AppDefaultCatalog;
pub use compile::{compile, compile_rule, CompiledRule, CompiledRuleSet, CompiledService};
pub use engine::{EngineOptions, PolicyEngine, DEFAULT_WORKER_THREADS};
pub use error::{PolicyError, Result};
pub use evaluate::evaluate;
pub use matcher::{address_matches, port_matches, AddressMatcher, FieldMatcher, Matcher, PortMatcher};
pub use parser::{
    parse_candidate_ports, parse_flow_action, parse_port_list, parse_rulebase,
    parse_rulebase_from_file,
};
pub use planner::{plan, plan_firewall, plan_from_search};
pub use search::{search, SearchResult};
pub use types::{
    Action, AddressToken, CandidateFlow, Field, FirewallSnapshot, GroupedVerdict, MatchRecord,
    PortToken, Rule, ServiceEntry, ServiceMatch, Verdict, ZoneContext, ANY, APP_DEFAULT,
};
