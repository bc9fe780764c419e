//! Rule definitions.
//!
//! A rule file holds an ordered list of rules. Each rule pairs a conjunction
//! of conditions with an ordered list of tag actions. On disk, conditions and
//! actions are flat objects keyed by `type`:
//!
//! ```json
//! {
//!   "dryRun": false,
//!   "rules": [
//!     {
//!       "name": "tag-untagged",
//!       "conditions": [{ "type": "noTags" }],
//!       "actions": [{ "type": "addTag", "tag": "env", "value": "prod" }]
//!     }
//!   ]
//! }
//! ```
//!
//! Unknown `type` strings are kept as [`Condition::Unknown`] /
//! [`Action::Unknown`] so a newer rule file never fails to load.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Raw parameter values of a condition or action.
pub type Params = BTreeMap<String, Value>;

/// Wire form of a condition or action: a `type` plus flat parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RawItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(flatten)]
    params: Params,
}

impl RawItem {
    fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            params: BTreeMap::new(),
        }
    }

    fn with(mut self, key: &str, value: &str) -> Self {
        self.params
            .insert(key.to_string(), Value::String(value.to_string()));
        self
    }

    /// Remove `key` as a string. Numbers and booleans are accepted in their
    /// textual form.
    fn take(&mut self, key: &str) -> std::result::Result<String, String> {
        match self.params.remove(key) {
            Some(Value::String(value)) => Ok(value),
            Some(value @ (Value::Number(_) | Value::Bool(_))) => Ok(value.to_string()),
            Some(_) => Err(format!(
                "`{}` parameter `{}` must be a string",
                self.kind, key
            )),
            None => Err(format!("`{}` requires parameter `{}`", self.kind, key)),
        }
    }
}

/// A single rule condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawItem", into = "RawItem")]
pub enum Condition {
    /// Resource has no tags at all.
    NoTags,
    /// Tag is present with exactly `value`.
    TagEqual { tag: String, value: String },
    /// Tag is present with a value other than `value`.
    TagNotEqual { tag: String, value: String },
    TagExists { tag: String },
    TagNotExists { tag: String },
    RegionEqual { region: String },
    RegionNotEqual { region: String },
    RgEqual { resource_group: String },
    RgNotEqual { resource_group: String },
    /// Evaluates exactly like [`Condition::RgNotEqual`]. The name suggests a
    /// resource-type check; the observed behavior is kept until that is settled.
    ResEqual { resource_group: String },
    /// Unrecognized condition type; never matches.
    Unknown {
        kind: String,
        params: Params,
    },
}

impl Condition {
    /// The `type` string this condition is written as.
    pub fn kind(&self) -> &str {
        match self {
            Self::NoTags => "noTags",
            Self::TagEqual { .. } => "tagEqual",
            Self::TagNotEqual { .. } => "tagNotEqual",
            Self::TagExists { .. } => "tagExists",
            Self::TagNotExists { .. } => "tagNotExists",
            Self::RegionEqual { .. } => "regionEqual",
            Self::RegionNotEqual { .. } => "regionNotEqual",
            Self::RgEqual { .. } => "rgEqual",
            Self::RgNotEqual { .. } => "rgNotEqual",
            Self::ResEqual { .. } => "resEqual",
            Self::Unknown { kind, .. } => kind,
        }
    }
}

impl TryFrom<RawItem> for Condition {
    type Error = String;

    fn try_from(mut raw: RawItem) -> std::result::Result<Self, Self::Error> {
        let condition = match raw.kind.as_str() {
            "noTags" => Self::NoTags,
            "tagEqual" => Self::TagEqual {
                tag: raw.take("tag")?,
                value: raw.take("value")?,
            },
            "tagNotEqual" => Self::TagNotEqual {
                tag: raw.take("tag")?,
                value: raw.take("value")?,
            },
            "tagExists" => Self::TagExists {
                tag: raw.take("tag")?,
            },
            "tagNotExists" => Self::TagNotExists {
                tag: raw.take("tag")?,
            },
            "regionEqual" => Self::RegionEqual {
                region: raw.take("region")?,
            },
            "regionNotEqual" => Self::RegionNotEqual {
                region: raw.take("region")?,
            },
            "rgEqual" => Self::RgEqual {
                resource_group: raw.take("resourceGroup")?,
            },
            "rgNotEqual" => Self::RgNotEqual {
                resource_group: raw.take("resourceGroup")?,
            },
            "resEqual" => Self::ResEqual {
                resource_group: raw.take("resourceGroup")?,
            },
            _ => Self::Unknown {
                kind: raw.kind,
                params: raw.params,
            },
        };
        Ok(condition)
    }
}

impl From<Condition> for RawItem {
    fn from(condition: Condition) -> Self {
        let kind = condition.kind().to_string();
        match condition {
            Condition::NoTags => RawItem::new(&kind),
            Condition::TagEqual { tag, value } | Condition::TagNotEqual { tag, value } => {
                RawItem::new(&kind).with("tag", &tag).with("value", &value)
            }
            Condition::TagExists { tag } | Condition::TagNotExists { tag } => {
                RawItem::new(&kind).with("tag", &tag)
            }
            Condition::RegionEqual { region } | Condition::RegionNotEqual { region } => {
                RawItem::new(&kind).with("region", &region)
            }
            Condition::RgEqual { resource_group }
            | Condition::RgNotEqual { resource_group }
            | Condition::ResEqual { resource_group } => {
                RawItem::new(&kind).with("resourceGroup", &resource_group)
            }
            Condition::Unknown { kind, params } => RawItem { kind, params },
        }
    }
}

/// A single tag action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawItem", into = "RawItem")]
pub enum Action {
    /// Set `tag` to `value` unless the tag already exists.
    AddTag { tag: String, value: String },
    /// Remove `tag` if present.
    DelTag { tag: String },
    /// Replace the tag set with an empty one.
    CleanTags,
    /// Unrecognized action type; skipped at execution.
    Unknown {
        kind: String,
        params: Params,
    },
}

impl Action {
    /// The `type` string this action is written as.
    pub fn kind(&self) -> &str {
        match self {
            Self::AddTag { .. } => "addTag",
            Self::DelTag { .. } => "delTag",
            Self::CleanTags => "cleanTags",
            Self::Unknown { kind, .. } => kind,
        }
    }

    /// Whether executing this action can issue a write.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Unknown { .. })
    }
}

impl TryFrom<RawItem> for Action {
    type Error = String;

    fn try_from(mut raw: RawItem) -> std::result::Result<Self, Self::Error> {
        let action = match raw.kind.as_str() {
            "addTag" => Self::AddTag {
                tag: raw.take("tag")?,
                value: raw.take("value")?,
            },
            "delTag" => Self::DelTag {
                tag: raw.take("tag")?,
            },
            "cleanTags" => Self::CleanTags,
            _ => Self::Unknown {
                kind: raw.kind,
                params: raw.params,
            },
        };
        Ok(action)
    }
}

impl From<Action> for RawItem {
    fn from(action: Action) -> Self {
        match action {
            Action::AddTag { tag, value } => RawItem::new("addTag")
                .with("tag", &tag)
                .with("value", &value),
            Action::DelTag { tag } => RawItem::new("delTag").with("tag", &tag),
            Action::CleanTags => RawItem::new("cleanTags"),
            Action::Unknown { kind, params } => RawItem { kind, params },
        }
    }
}

/// A named conjunction of conditions with an ordered action list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// The contents of a rules file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Forces dry-run regardless of the command line.
    #[serde(default, rename = "dryRun", alias = "dryrun", alias = "dry_run")]
    pub dry_run: bool,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    /// Load a rules file. `.toml` files are read as TOML, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;

        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

        let parsed = if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        };

        parsed.map_err(|e| match e {
            Error::RuleFile { message, .. } => Error::RuleFile {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Parse a JSON rules document.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let rules: Self = serde_json::from_str(content).map_err(|e| Error::RuleFile {
            path: "<json>".into(),
            message: e.to_string(),
        })?;
        rules.validate()?;
        Ok(rules)
    }

    /// Parse a TOML rules document (`[[rules]]` tables).
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let rules: Self = toml::from_str(content).map_err(|e| Error::RuleFile {
            path: "<toml>".into(),
            message: e.to_string(),
        })?;
        rules.validate()?;
        Ok(rules)
    }

    /// Structural checks that serde cannot express.
    fn validate(&self) -> Result<()> {
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.name.trim().is_empty() {
                return Err(Error::RuleDefinition {
                    rule: format!("#{}", index + 1),
                    message: "rule name must not be empty".to_string(),
                });
            }
            if rule.actions.is_empty() {
                log::warn!("Rule `{}` has no actions", rule.name);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
