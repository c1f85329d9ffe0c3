use std::collections::{BTreeMap, HashMap};

use crate::types::{GroupedVerdict, Verdict};

/// Group firewalls that produced identical verdicts.
///
/// Firewall ids within a group are sorted, and groups are ordered by their
/// first firewall id. If an id appears more than once the last verdict wins.
pub fn aggregate<I, K>(verdicts: I) -> Vec<GroupedVerdict>
where
    I: IntoIterator<Item = (K, Verdict)>,
    K: Into<String>,
{
    let by_firewall: BTreeMap<String, Verdict> = verdicts
        .into_iter()
        .map(|(id, verdict)| (id.into(), verdict))
        .collect();

    let mut groups: Vec<GroupedVerdict> = Vec::new();
    let mut positions: HashMap<Verdict, usize> = HashMap::new();

    for (firewall, verdict) in by_firewall {
        match positions.get(&verdict) {
            Some(&pos) => groups[pos].firewalls.push(firewall),
            None => {
                positions.insert(verdict.clone(), groups.len());
                groups.push(GroupedVerdict {
                    firewalls: vec![firewall],
                    verdict,
                });
            }
        }
    }

    groups
}
