//! Rule evaluator.
//!
//! Tests one compiled rule against one candidate flow and records the
//! outcome field by field.

use crate::compile::{CompiledRule, CompiledService};
use crate::matcher::Matcher;
use crate::types::{CandidateFlow, MatchRecord, ServiceMatch};

/// Per-entry outcome, used to pick the closest entry when none fully matches
#[derive(Debug, Clone, Copy, Default)]
struct ServiceFields {
    port: bool,
    protocol: bool,
    application: bool,
}

impl ServiceFields {
    fn count(&self) -> usize {
        [self.port, self.protocol, self.application]
            .iter()
            .filter(|m| **m)
            .count()
    }
}

/// Evaluate a rule against a flow.
///
/// Disabled rules are never evaluated and yield `None`. Each address and zone
/// field matches if any of its tokens matches. The service field matches if
/// one entry satisfies port, protocol and application at once; the first
/// such entry wins.
pub fn evaluate(flow: &CandidateFlow, rule: &CompiledRule) -> Option<MatchRecord> {
    if rule.disabled {
        return None;
    }

    let (fields, service) = evaluate_services(flow, &rule.services);

    Some(MatchRecord {
        rule_index: rule.index,
        source_matched: rule.source.matches(&flow.source_address),
        destination_matched: rule.destination.matches(&flow.destination_address),
        source_zone_matched: rule.from_zones.matches(flow.source_zone.as_str()),
        destination_zone_matched: rule.to_zones.matches(flow.destination_zone.as_str()),
        port_matched: fields.port,
        protocol_matched: fields.protocol,
        application_matched: fields.application,
        service,
    })
}

fn evaluate_services(
    flow: &CandidateFlow,
    services: &[CompiledService],
) -> (ServiceFields, Option<ServiceMatch>) {
    let mut closest = ServiceFields::default();

    for service in services {
        let port = service.ports.find(&flow.ports);
        let protocol = service.protocol.matching_token(&flow.protocol);
        let application = service.application.matching_token(&flow.application);

        if let (Some(port), Some(protocol), Some(application)) = (port, protocol, application) {
            let matched = ServiceMatch {
                protocol: protocol.to_string(),
                port: port.to_string(),
                application: application.to_string(),
            };
            let all = ServiceFields {
                port: true,
                protocol: true,
                application: true,
            };
            return (all, Some(matched));
        }

        let fields = ServiceFields {
            port: port.is_some(),
            protocol: protocol.is_some(),
            application: application.is_some(),
        };
        if fields.count() > closest.count() {
            closest = fields;
        }
    }

    (closest, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile_rule;
    use crate::parser::parse_candidate_ports;
    use crate::types::{Action, Rule, ServiceEntry};

    fn flow(source: &str, destination: &str, ports: &str) -> CandidateFlow {
        CandidateFlow::new(
            source.parse().unwrap(),
            destination.parse().unwrap(),
            Action::Allow,
        )
        .with_ports(parse_candidate_ports(ports).unwrap())
    }

    #[test]
    fn test_full_match() {
        let rule = compile_rule(
            &Rule::new(1, "web", Action::Allow)
                .with_sources(&["10.0.0.0/24"])
                .with_service("tcp", "443", "ssl"),
        );
        let flow = flow("10.0.0.5", "any", "443")
            .with_protocol("tcp")
            .with_application("ssl");
        let record = evaluate(&flow, &rule).unwrap();
        assert!(record.is_full_match());
        assert_eq!(
            record.service,
            Some(ServiceMatch {
                protocol: "tcp".into(),
                port: "443".into(),
                application: "ssl".into(),
            })
        );
    }

    #[test]
    fn test_disabled_rule_skipped() {
        let rule = compile_rule(&Rule::new(1, "off", Action::Allow).with_disabled(true));
        assert!(evaluate(&flow("10.0.0.5", "any", "443"), &rule).is_none());
    }

    #[test]
    fn test_service_needs_one_entry_for_all_fields() {
        // tcp matches the first entry and 53 the second, but no single entry has both
        let rule = compile_rule(&Rule::new(1, "split", Action::Allow).with_services(vec![
            ServiceEntry::new("tcp", "443", "any"),
            ServiceEntry::new("udp", "53", "any"),
        ]));
        let flow = flow("10.0.0.5", "any", "53").with_protocol("tcp");
        let record = evaluate(&flow, &rule).unwrap();
        assert!(record.service.is_none());
        assert!(!record.is_full_match());
        assert!(record.protocol_matched);
        assert!(record.application_matched);
        assert!(!record.port_matched);
    }

    #[test]
    fn test_first_matching_entry_wins() {
        let entries = vec![
            ServiceEntry::new("any", "any", "any"),
            ServiceEntry::new("tcp", "443", "ssl"),
        ];
        let flow = flow("10.0.0.5", "any", "443")
            .with_protocol("tcp")
            .with_application("ssl");

        let any_first = compile_rule(&Rule::new(1, "a", Action::Allow).with_services(entries.clone()));
        let matched = evaluate(&flow, &any_first).unwrap().service.unwrap();
        assert_eq!(matched.protocol, "any");
        assert_eq!(matched.port, "any");

        let reversed: Vec<_> = entries.into_iter().rev().collect();
        let specific_first = compile_rule(&Rule::new(1, "b", Action::Allow).with_services(reversed));
        let matched = evaluate(&flow, &specific_first).unwrap().service.unwrap();
        assert_eq!(matched.protocol, "tcp");
        assert_eq!(matched.port, "443");
    }

    #[test]
    fn test_token_order_does_not_change_outcome() {
        let forward = compile_rule(
            &Rule::new(1, "f", Action::Allow)
                .with_sources(&["192.168.0.0/16", "10.0.0.0/8"])
                .with_to_zones(&["dmz", "untrust"]),
        );
        let backward = compile_rule(
            &Rule::new(1, "b", Action::Allow)
                .with_sources(&["10.0.0.0/8", "192.168.0.0/16"])
                .with_to_zones(&["untrust", "dmz"]),
        );
        for source in ["10.1.1.1", "192.168.1.1", "172.16.0.1"] {
            let flow = flow(source, "any", "any").with_destination_zone("untrust");
            assert_eq!(
                evaluate(&flow, &forward).map(|r| r.is_full_match()),
                evaluate(&flow, &backward).map(|r| r.is_full_match())
            );
        }
    }

    #[test]
    fn test_zone_mismatch_recorded() {
        let rule = compile_rule(
            &Rule::new(1, "zones", Action::Allow)
                .with_from_zones(&["trust"])
                .with_to_zones(&["untrust"]),
        );
        let flow = flow("10.0.0.5", "any", "any")
            .with_source_zone("dmz")
            .with_destination_zone("UNTRUST");
        let record = evaluate(&flow, &rule).unwrap();
        assert!(!record.source_zone_matched);
        assert!(record.destination_zone_matched);
    }

    #[test]
    fn test_no_service_entries() {
        let rule = compile_rule(&Rule::new(1, "empty", Action::Allow).with_services(Vec::new()));
        let record = evaluate(&flow("10.0.0.5", "any", "any"), &rule).unwrap();
        assert!(!record.port_matched);
        assert!(!record.protocol_matched);
        assert!(!record.application_matched);
        assert!(!record.is_full_match());
    }
}
