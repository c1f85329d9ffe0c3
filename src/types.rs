use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Deserializer, Serialize};

/// Wildcard token accepted by every rule and flow field
pub const ANY: &str = "any";

/// Port sentinel meaning "the application's default ports"
pub const APP_DEFAULT: &str = "app-default";

/// Rule action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Action {
    Allow,
    Deny,
}

impl Action {
    /// The action that contradicts this one
    pub fn opposite(self) -> Action {
        match self {
            Action::Allow => Action::Deny,
            Action::Deny => Action::Allow,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Deny => "deny",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

/// A resolved address literal: single IP, CIDR, inclusive range, or `any`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AddressToken {
    Any,
    Ip(IpAddr),
    Cidr(IpNet),
    Range(IpAddr, IpAddr),
}

impl AddressToken {
    pub fn is_any(&self) -> bool {
        matches!(self, AddressToken::Any)
    }
}

impl fmt::Display for AddressToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressToken::Any => f.write_str(ANY),
            AddressToken::Ip(ip) => write!(f, "{}", ip),
            AddressToken::Cidr(net) => write!(f, "{}", net),
            AddressToken::Range(start, end) => write!(f, "{}-{}", start, end),
        }
    }
}

impl From<AddressToken> for String {
    fn from(token: AddressToken) -> Self {
        token.to_string()
    }
}

/// A destination port token: single port, inclusive range, `any` or `app-default`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PortToken {
    Any,
    AppDefault,
    Single(u16),
    Range(u16, u16),
}

impl PortToken {
    pub fn is_any(&self) -> bool {
        matches!(self, PortToken::Any)
    }

    /// Inclusive numeric bounds, `None` for the non-numeric sentinels
    pub fn bounds(&self) -> Option<(u16, u16)> {
        match *self {
            PortToken::Single(port) => Some((port, port)),
            PortToken::Range(start, end) => Some((start, end)),
            PortToken::Any | PortToken::AppDefault => None,
        }
    }
}

impl fmt::Display for PortToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortToken::Any => f.write_str(ANY),
            PortToken::AppDefault => f.write_str(APP_DEFAULT),
            PortToken::Single(port) => write!(f, "{}", port),
            PortToken::Range(start, end) => write!(f, "{}-{}", start, end),
        }
    }
}

impl From<PortToken> for String {
    fn from(token: PortToken) -> Self {
        token.to_string()
    }
}

/// The network flow a caller wants permitted or denied.
///
/// Zones, protocol and application default to `any`. Protocol and
/// application are kept lower-case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFlow {
    pub source_address: AddressToken,
    pub destination_address: AddressToken,
    #[serde(default = "any_string")]
    pub source_zone: String,
    #[serde(default = "any_string")]
    pub destination_zone: String,
    #[serde(default = "any_ports", deserialize_with = "de::port_list")]
    pub ports: Vec<PortToken>,
    #[serde(default = "any_string", deserialize_with = "de::lowercase")]
    pub protocol: String,
    #[serde(default = "any_string", deserialize_with = "de::lowercase")]
    pub application: String,
    #[serde(deserialize_with = "de::strict_action")]
    pub desired_action: Action,
}

impl CandidateFlow {
    /// Create a flow between two endpoints with every other field set to `any`
    pub fn new(source: AddressToken, destination: AddressToken, action: Action) -> Self {
        Self {
            source_address: source,
            destination_address: destination,
            source_zone: any_string(),
            destination_zone: any_string(),
            ports: any_ports(),
            protocol: any_string(),
            application: any_string(),
            desired_action: action,
        }
    }

    pub fn with_source_zone(mut self, zone: impl Into<String>) -> Self {
        self.source_zone = zone.into();
        self
    }

    pub fn with_destination_zone(mut self, zone: impl Into<String>) -> Self {
        self.destination_zone = zone.into();
        self
    }

    pub fn with_ports(mut self, ports: Vec<PortToken>) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into().to_lowercase();
        self
    }

    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.application = application.into().to_lowercase();
        self
    }

    /// True when the ports are the single `any` token
    pub fn has_any_port(&self) -> bool {
        matches!(self.ports.as_slice(), [PortToken::Any])
    }
}

/// One protocol/port/application binding of a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntry {
    #[serde(default = "any_string")]
    pub protocol: String,
    #[serde(default = "any_string", alias = "destination_port")]
    pub destination_port: String,
    #[serde(default = "any_string")]
    pub application: String,
}

impl ServiceEntry {
    pub fn new(
        protocol: impl Into<String>,
        destination_port: impl Into<String>,
        application: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            destination_port: destination_port.into(),
            application: application.into(),
        }
    }

    /// The `any/any/any` entry
    pub fn any() -> Self {
        Self::new(ANY, ANY, ANY)
    }
}

/// A security rule as materialised from the management plane.
///
/// Address and port tokens are kept as text. They are parsed when the rule
/// is compiled, and tokens that fail to parse are dropped there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub index: u32,
    #[serde(default)]
    pub name: String,
    pub action: Action,
    #[serde(default = "any_list", alias = "source")]
    pub source_addresses: Vec<String>,
    #[serde(default = "any_list", alias = "destination")]
    pub destination_addresses: Vec<String>,
    #[serde(default, alias = "negate-source", deserialize_with = "de::flag")]
    pub negate_source: bool,
    #[serde(default, alias = "negate-destination", deserialize_with = "de::flag")]
    pub negate_destination: bool,
    #[serde(default = "any_list", alias = "from")]
    pub from_zones: Vec<String>,
    #[serde(default = "any_list", alias = "to")]
    pub to_zones: Vec<String>,
    #[serde(default = "any_services", alias = "entries")]
    pub service_entries: Vec<ServiceEntry>,
    #[serde(default, deserialize_with = "de::flag")]
    pub disabled: bool,
}

impl Rule {
    /// Create an enabled any-to-any rule with a single `any/any/any` service entry
    pub fn new(index: u32, name: impl Into<String>, action: Action) -> Self {
        Self {
            index,
            name: name.into(),
            action,
            source_addresses: any_list(),
            destination_addresses: any_list(),
            negate_source: false,
            negate_destination: false,
            from_zones: any_list(),
            to_zones: any_list(),
            service_entries: any_services(),
            disabled: false,
        }
    }

    pub fn with_sources(mut self, sources: &[&str]) -> Self {
        self.source_addresses = to_strings(sources);
        self
    }

    pub fn with_destinations(mut self, destinations: &[&str]) -> Self {
        self.destination_addresses = to_strings(destinations);
        self
    }

    pub fn with_from_zones(mut self, zones: &[&str]) -> Self {
        self.from_zones = to_strings(zones);
        self
    }

    pub fn with_to_zones(mut self, zones: &[&str]) -> Self {
        self.to_zones = to_strings(zones);
        self
    }

    pub fn with_negate_source(mut self, negate: bool) -> Self {
        self.negate_source = negate;
        self
    }

    pub fn with_negate_destination(mut self, negate: bool) -> Self {
        self.negate_destination = negate;
        self
    }

    /// Replace the service entries with a single entry
    pub fn with_service(self, protocol: &str, port: &str, application: &str) -> Self {
        self.with_services(vec![ServiceEntry::new(protocol, port, application)])
    }

    pub fn with_services(mut self, entries: Vec<ServiceEntry>) -> Self {
        self.service_entries = entries;
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// A flow field that can differ from a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Source,
    Destination,
    SourceZone,
    DestinationZone,
    Port,
    Protocol,
    Application,
}

impl Field {
    /// All fields in reporting order
    pub const ALL: [Field; 7] = [
        Field::Source,
        Field::Destination,
        Field::SourceZone,
        Field::DestinationZone,
        Field::Port,
        Field::Protocol,
        Field::Application,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Source => "source",
            Field::Destination => "destination",
            Field::SourceZone => "sourceZone",
            Field::DestinationZone => "destinationZone",
            Field::Port => "port",
            Field::Protocol => "protocol",
            Field::Application => "application",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The service entry tokens that satisfied a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMatch {
    pub protocol: String,
    pub port: String,
    pub application: String,
}

/// Per-field outcome of evaluating one rule against one flow.
///
/// `port_matched`, `protocol_matched` and `application_matched` describe the
/// closest service entry; `service` is set only when one entry matched all three.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub rule_index: u32,
    pub source_matched: bool,
    pub destination_matched: bool,
    pub source_zone_matched: bool,
    pub destination_zone_matched: bool,
    pub port_matched: bool,
    pub protocol_matched: bool,
    pub application_matched: bool,
    pub service: Option<ServiceMatch>,
}

impl MatchRecord {
    pub fn is_matched(&self, field: Field) -> bool {
        match field {
            Field::Source => self.source_matched,
            Field::Destination => self.destination_matched,
            Field::SourceZone => self.source_zone_matched,
            Field::DestinationZone => self.destination_zone_matched,
            Field::Port => self.port_matched,
            Field::Protocol => self.protocol_matched,
            Field::Application => self.application_matched,
        }
    }

    /// Every address and zone field matched and one service entry matched as a whole
    pub fn is_full_match(&self) -> bool {
        self.source_matched
            && self.destination_matched
            && self.source_zone_matched
            && self.destination_zone_matched
            && self.service.is_some()
    }

    pub fn matched_field_count(&self) -> usize {
        Field::ALL.iter().filter(|f| self.is_matched(**f)).count()
    }

    pub fn differing_fields(&self) -> Vec<Field> {
        Field::ALL
            .iter()
            .copied()
            .filter(|f| !self.is_matched(*f))
            .collect()
    }
}

/// Reconciliation outcome for one firewall
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Verdict {
    /// A rule of the desired action already governs the flow
    AlreadyPermitted { rule_index: u32 },
    /// An opposite-action rule wins before any rule that could be inserted
    Shadowed { negating_rule_index: u32 },
    /// The nearest rule to edit, and the fields that need to change
    ModifiableRule {
        rule_index: u32,
        differing_fields: Vec<Field>,
    },
    /// The flow's endpoints are not in the requested zones on this firewall
    ZoneMismatch { source: bool, destination: bool },
    NoCandidate,
}

/// Firewalls that reached the same verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedVerdict {
    pub firewalls: Vec<String>,
    pub verdict: Verdict,
}

/// Zones a firewall places the flow's endpoints in, when known
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneContext {
    #[serde(default)]
    pub source_zone: Option<String>,
    #[serde(default)]
    pub destination_zone: Option<String>,
}

/// One firewall's rulebase and zone context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallSnapshot {
    pub id: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub zones: ZoneContext,
}

impl FirewallSnapshot {
    pub fn new(id: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            id: id.into(),
            rules,
            zones: ZoneContext::default(),
        }
    }

    /// A firewall whose rule data could not be retrieved
    pub fn unavailable(id: impl Into<String>) -> Self {
        Self::new(id, Vec::new())
    }

    pub fn with_zones(
        mut self,
        source_zone: Option<&str>,
        destination_zone: Option<&str>,
    ) -> Self {
        self.zones = ZoneContext {
            source_zone: source_zone.map(str::to_string),
            destination_zone: destination_zone.map(str::to_string),
        };
        self
    }
}

fn any_string() -> String {
    ANY.to_string()
}

fn any_list() -> Vec<String> {
    vec![any_string()]
}

fn any_services() -> Vec<ServiceEntry> {
    vec![ServiceEntry::any()]
}

fn any_ports() -> Vec<PortToken> {
    vec![PortToken::Any]
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Deserialisers for the loosely-typed exporter fields
mod de {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    /// Accepts `true`/`false` or the exporter's `"yes"`/`"no"`
    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Flag::deserialize(deserializer)? {
            Flag::Bool(value) => Ok(value),
            Flag::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "yes" | "true" => Ok(true),
                "no" | "false" | "" => Ok(false),
                other => Err(serde::de::Error::custom(format!(
                    "expected yes/no, got {:?}",
                    other
                ))),
            },
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortList {
        Text(String),
        List(Vec<String>),
    }

    /// Accepts `"80,443"` or `["80", "443"]`
    pub fn port_list<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<PortToken>, D::Error> {
        let text = match PortList::deserialize(deserializer)? {
            PortList::Text(text) => text,
            PortList::List(items) => items.join(","),
        };
        crate::parser::parse_candidate_ports(&text).map_err(serde::de::Error::custom)
    }

    pub fn lowercase<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(String::deserialize(deserializer)?.trim().to_lowercase())
    }

    /// Flows only accept the literal `allow`/`deny`
    pub fn strict_action<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Action, D::Error> {
        let text = String::deserialize(deserializer)?;
        crate::parser::parse_flow_action(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_opposite() {
        assert_eq!(Action::Allow.opposite(), Action::Deny);
        assert_eq!(Action::Deny.opposite(), Action::Allow);
    }

    #[test]
    fn test_has_any_port_single_token_only() {
        let flow = CandidateFlow::new(AddressToken::Any, AddressToken::Any, Action::Allow);
        assert!(flow.has_any_port());

        let mixed = flow
            .clone()
            .with_ports(vec![PortToken::Single(80), PortToken::Any]);
        assert!(!mixed.has_any_port());

        let literal = flow.with_ports(vec![PortToken::Single(443)]);
        assert!(!literal.has_any_port());
    }

    #[test]
    fn test_rule_without_entries_defaults_to_any_service() {
        let rule: Rule = serde_json::from_str(r#"{"index": 1, "action": "allow"}"#).unwrap();
        assert_eq!(rule.service_entries, vec![ServiceEntry::any()]);
        assert_eq!(rule, Rule::new(1, "", Action::Allow));
    }

    #[test]
    fn test_match_record_differing_fields() {
        let record = MatchRecord {
            rule_index: 3,
            source_matched: true,
            destination_matched: false,
            source_zone_matched: true,
            destination_zone_matched: true,
            port_matched: false,
            protocol_matched: true,
            application_matched: true,
            service: None,
        };
        assert!(!record.is_full_match());
        assert_eq!(record.matched_field_count(), 5);
        assert_eq!(
            record.differing_fields(),
            vec![Field::Destination, Field::Port]
        );
    }

    #[test]
    fn test_rule_deserialize_exporter_names() {
        let json = r#"{
            "index": 4,
            "name": "web",
            "action": "reset-both",
            "source": ["10.0.0.0/24"],
            "destination": ["any"],
            "negate-source": "yes",
            "from": ["trust"],
            "to": ["untrust"],
            "entries": [{"protocol": "tcp", "destination_port": "443", "application": "ssl"}],
            "disabled": "no"
        }"#;
        let rule: Rule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.index, 4);
        assert_eq!(rule.action, Action::Deny);
        assert!(rule.negate_source);
        assert!(!rule.negate_destination);
        assert!(!rule.disabled);
        assert_eq!(rule.from_zones, vec!["trust"]);
        assert_eq!(rule.service_entries[0].destination_port, "443");
    }

    #[test]
    fn test_flow_deserialize_defaults() {
        let json = r#"{
            "sourceAddress": "10.0.0.5",
            "destinationAddress": "any",
            "ports": "443, 8000-8080",
            "protocol": "TCP",
            "desiredAction": "allow"
        }"#;
        let flow: CandidateFlow = serde_json::from_str(json).unwrap();
        assert_eq!(flow.source_zone, ANY);
        assert_eq!(flow.application, ANY);
        assert_eq!(flow.protocol, "tcp");
        assert_eq!(
            flow.ports,
            vec![PortToken::Single(443), PortToken::Range(8000, 8080)]
        );
    }

    #[test]
    fn test_flow_rejects_deny_family_actions() {
        let json = r#"{
            "sourceAddress": "any",
            "destinationAddress": "any",
            "desiredAction": "drop"
        }"#;
        assert!(serde_json::from_str::<CandidateFlow>(json).is_err());
    }

    #[test]
    fn test_verdict_serializes_camel_case() {
        let verdict = Verdict::ModifiableRule {
            rule_index: 3,
            differing_fields: vec![Field::SourceZone],
        };
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["kind"], "modifiableRule");
        assert_eq!(json["ruleIndex"], 3);
        assert_eq!(json["differingFields"][0], "sourceZone");
    }
}
