//! Rule matching.
//!
//! [`evaluate`] runs every rule against every scanned resource and records
//! which rules fully matched. Conditions within a rule are a strict
//! conjunction evaluated in order; evaluation stops at the first false one.

use crate::rules::{Condition, Rule};
use armkit::Resource;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::btree_map;

/// A resource together with every rule that matched it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchEntry {
    pub resource: Resource,
    /// One element per matching rule, in rule order.
    pub rules: Vec<Rule>,
}

/// Resource id to match entry, iterated in id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MatchTable {
    entries: BTreeMap<String, MatchEntry>,
}

impl MatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `rule` with `resource`, creating the entry on first match.
    pub fn insert(&mut self, resource: &Resource, rule: &Rule) {
        self.entries
            .entry(resource.id.clone())
            .or_insert_with(|| MatchEntry {
                resource: resource.clone(),
                rules: Vec::new(),
            })
            .rules
            .push(rule.clone());
    }

    pub fn get(&self, id: &str) -> Option<&MatchEntry> {
        self.entries.get(id)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, MatchEntry> {
        self.entries.iter()
    }

    /// Matched resources in id order.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.entries.values().map(|e| &e.resource)
    }

    /// Number of matched resources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total (resource, rule) associations.
    pub fn rule_count(&self) -> usize {
        self.entries.values().map(|e| e.rules.len()).sum()
    }
}

impl<'a> IntoIterator for &'a MatchTable {
    type Item = (&'a String, &'a MatchEntry);
    type IntoIter = btree_map::Iter<'a, String, MatchEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Build the match table for `resources` against `rules`.
pub fn evaluate(rules: &[Rule], resources: &[Resource]) -> MatchTable {
    let mut table = MatchTable::new();

    for resource in resources {
        for rule in rules {
            if rule_matches(rule, resource) {
                log::debug!("Rule `{}` matched {}", rule.name, resource.id);
                table.insert(resource, rule);
            }
        }
    }

    log::info!(
        "{} of {} resources matched {} rule(s)",
        table.len(),
        resources.len(),
        rules.len()
    );
    table
}

/// Whether every condition of `rule` holds for `resource`.
///
/// A rule without conditions matches every resource.
pub fn rule_matches(rule: &Rule, resource: &Resource) -> bool {
    rule.conditions.iter().all(|condition| {
        condition_holds(condition, resource).unwrap_or_else(|| {
            log::warn!(
                "Unknown condition type `{}` in rule `{}`; rule skipped for {}",
                condition.kind(),
                rule.name,
                resource.id
            );
            false
        })
    })
}

/// Evaluate a single condition. `None` for unknown condition types.
fn condition_holds(condition: &Condition, resource: &Resource) -> Option<bool> {
    let holds = match condition {
        Condition::NoTags => resource.tags.is_empty(),
        Condition::TagEqual { tag, value } => resource.tag(tag) == Some(Some(value.as_str())),
        Condition::TagNotEqual { tag, value } => {
            matches!(resource.tag(tag), Some(current) if current != Some(value.as_str()))
        }
        Condition::TagExists { tag } => resource.has_tag(tag),
        Condition::TagNotExists { tag } => !resource.has_tag(tag),
        Condition::RegionEqual { region } => resource.region == *region,
        Condition::RegionNotEqual { region } => resource.region != *region,
        Condition::RgEqual { resource_group } => resource.resource_group == *resource_group,
        Condition::RgNotEqual { resource_group } | Condition::ResEqual { resource_group } => {
            resource.resource_group != *resource_group
        }
        Condition::Unknown { .. } => return None,
    };
    Some(holds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Action;
    use armkit::{PLATFORM_AZURE, Tags};
    use std::collections::BTreeMap;

    fn resource(name: &str, group: &str, tags: &[(&str, Option<&str>)]) -> Resource {
        Resource {
            id: format!("/subscriptions/s/resourceGroups/{group}/providers/Microsoft.Compute/disks/{name}"),
            name: name.to_string(),
            region: "westeurope".to_string(),
            resource_group: group.to_string(),
            platform: PLATFORM_AZURE.to_string(),
            kind: "Microsoft.Compute/disks".to_string(),
            tags: tags
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.map(str::to_string)))
                .collect::<Tags>(),
        }
    }

    fn rule(name: &str, conditions: Vec<Condition>) -> Rule {
        Rule {
            name: name.to_string(),
            conditions,
            actions: vec![Action::CleanTags],
        }
    }

    fn tag_cond(kind: &str, tag: &str, value: &str) -> Condition {
        match kind {
            "eq" => Condition::TagEqual {
                tag: tag.into(),
                value: value.into(),
            },
            _ => Condition::TagNotEqual {
                tag: tag.into(),
                value: value.into(),
            },
        }
    }

    #[test]
    fn test_no_tags() {
        let r = rule("untagged", vec![Condition::NoTags]);
        assert!(rule_matches(&r, &resource("a", "rg", &[])));
        assert!(!rule_matches(&r, &resource("b", "rg", &[("env", None)])));
    }

    #[test]
    fn test_tag_equal_and_not_equal() {
        let tagged = resource("a", "rg", &[("owner", Some("alice"))]);
        let flag = resource("b", "rg", &[("owner", None)]);
        let bare = resource("c", "rg", &[]);

        assert!(rule_matches(&rule("r", vec![tag_cond("eq", "owner", "alice")]), &tagged));
        assert!(!rule_matches(&rule("r", vec![tag_cond("eq", "owner", "bob")]), &tagged));
        assert!(!rule_matches(&rule("r", vec![tag_cond("eq", "owner", "alice")]), &flag));

        assert!(rule_matches(&rule("r", vec![tag_cond("ne", "owner", "bob")]), &tagged));
        assert!(!rule_matches(&rule("r", vec![tag_cond("ne", "owner", "alice")]), &tagged));
        assert!(rule_matches(&rule("r", vec![tag_cond("ne", "owner", "alice")]), &flag));
        // Absent tag is neither equal nor different.
        assert!(!rule_matches(&rule("r", vec![tag_cond("ne", "owner", "alice")]), &bare));
    }

    #[test]
    fn test_tag_exists() {
        let flag = resource("a", "rg", &[("temp", None)]);
        let exists = rule("r", vec![Condition::TagExists { tag: "temp".into() }]);
        let missing = rule("r", vec![Condition::TagNotExists { tag: "temp".into() }]);
        assert!(rule_matches(&exists, &flag));
        assert!(!rule_matches(&missing, &flag));
        assert!(rule_matches(&missing, &resource("b", "rg", &[])));
    }

    #[test]
    fn test_region_and_group() {
        let r = resource("a", "rg-app", &[]);
        let cases = [
            (Condition::RegionEqual { region: "westeurope".into() }, true),
            (Condition::RegionNotEqual { region: "westeurope".into() }, false),
            (Condition::RgEqual { resource_group: "rg-app".into() }, true),
            (Condition::RgNotEqual { resource_group: "rg-app".into() }, false),
            (Condition::RgNotEqual { resource_group: "rg-other".into() }, true),
        ];
        for (condition, expected) in cases {
            assert_eq!(rule_matches(&rule("r", vec![condition.clone()]), &r), expected, "{condition:?}");
        }
    }

    #[test]
    fn test_res_equal_behaves_like_rg_not_equal() {
        let r = resource("a", "rg-app", &[]);
        let same = rule("r", vec![Condition::ResEqual { resource_group: "rg-app".into() }]);
        let other = rule("r", vec![Condition::ResEqual { resource_group: "rg-x".into() }]);
        assert!(!rule_matches(&same, &r));
        assert!(rule_matches(&other, &r));
    }

    #[test]
    fn test_unknown_condition_never_matches() {
        let r = rule(
            "future",
            vec![Condition::Unknown {
                kind: "tagMatches".into(),
                params: BTreeMap::new(),
            }],
        );
        assert!(!rule_matches(&r, &resource("a", "rg", &[])));
    }

    #[test]
    fn test_empty_conditions_match_everything() {
        assert!(rule_matches(&rule("all", vec![]), &resource("a", "rg", &[("x", Some("y"))])));
    }

    #[test]
    fn test_conjunction() {
        let r = rule(
            "both",
            vec![
                Condition::RgEqual { resource_group: "rg".into() },
                Condition::TagExists { tag: "env".into() },
            ],
        );
        assert!(rule_matches(&r, &resource("a", "rg", &[("env", Some("dev"))])));
        assert!(!rule_matches(&r, &resource("b", "rg", &[])));
        assert!(!rule_matches(&r, &resource("c", "other", &[("env", Some("dev"))])));
    }

    #[test]
    fn test_evaluate_accumulates_rules_per_resource() {
        let resources = vec![
            resource("b", "rg", &[]),
            resource("a", "rg", &[("owner", Some("alice"))]),
        ];
        let rules = vec![
            rule("untagged", vec![Condition::NoTags]),
            rule("everything", vec![]),
            rule("everything", vec![]),
        ];

        let table = evaluate(&rules, &resources);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rule_count(), 5);

        let ids: Vec<&String> = table.iter().map(|(id, _)| id).collect();
        assert!(ids[0].ends_with("/a"));

        let untagged = table.get(&resources[0].id).unwrap();
        assert_eq!(untagged.rules.len(), 3);
        assert_eq!(untagged.rules[0].name, "untagged");
    }
}
