//! Versioned SLA rule table.
//!
//! The table is the auditable source of truth for which party owes each
//! obligation. It is loaded once, validated, and handed to the engine as an
//! immutable value; nothing in the engine hardcodes actor/action pairs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::Actor;

/// Builtin rule table shipped with the engine.
static BUILTIN_RULES: &str = include_str!("../sla-rules.toml");

/// One obligation: `actor` owes `action_type` within `max_days`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaRule {
    pub actor: Actor,
    pub action_type: String,
    pub max_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Errors raised while loading or validating a rule table.
#[derive(Debug, thiserror::Error)]
pub enum SlaConfigError {
    #[error("failed to read SLA rule table {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid SLA rule table: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("SLA rule table has an empty version")]
    EmptyVersion,

    #[error("SLA rule for {actor} has an empty action type")]
    EmptyActionType { actor: Actor },

    #[error("duplicate SLA rule for ({actor}, {action_type})")]
    DuplicateRule { actor: Actor, action_type: String },

    #[error("action type '{action_type}' is owed by both {first} and {second}")]
    AmbiguousActionType {
        action_type: String,
        first: Actor,
        second: Actor,
    },

    #[error("SLA rule ({actor}, {action_type}) has a zero-day threshold")]
    ZeroThreshold { actor: Actor, action_type: String },
}

/// On-disk shape of a rule table.
#[derive(Deserialize)]
struct RuleTableFile {
    version: String,
    #[serde(default, rename = "rule")]
    rules: Vec<SlaRule>,
}

#[derive(Serialize)]
struct RuleTableView<'a> {
    version: &'a str,
    rules: Vec<&'a SlaRule>,
}

/// A validated, versioned SLA rule table keyed by (actor, action type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaRuleTable {
    version: String,
    rules: BTreeMap<(Actor, String), SlaRule>,
    owed_by: BTreeMap<String, Actor>,
}

impl SlaRuleTable {
    /// Build a table from rules, enforcing the table invariants.
    pub fn new(version: impl Into<String>, rules: Vec<SlaRule>) -> Result<Self, SlaConfigError> {
        let version = version.into();
        if version.trim().is_empty() {
            return Err(SlaConfigError::EmptyVersion);
        }

        let mut table = SlaRuleTable {
            version,
            rules: BTreeMap::new(),
            owed_by: BTreeMap::new(),
        };

        for rule in rules {
            if rule.action_type.trim().is_empty() {
                return Err(SlaConfigError::EmptyActionType { actor: rule.actor });
            }
            if rule.max_days == 0 {
                return Err(SlaConfigError::ZeroThreshold {
                    actor: rule.actor,
                    action_type: rule.action_type,
                });
            }
            if let Some(&first) = table.owed_by.get(&rule.action_type) {
                if first == rule.actor {
                    return Err(SlaConfigError::DuplicateRule {
                        actor: rule.actor,
                        action_type: rule.action_type,
                    });
                }
                return Err(SlaConfigError::AmbiguousActionType {
                    action_type: rule.action_type,
                    first,
                    second: rule.actor,
                });
            }
            table
                .owed_by
                .insert(rule.action_type.clone(), rule.actor);
            table
                .rules
                .insert((rule.actor, rule.action_type.clone()), rule);
        }

        Ok(table)
    }

    /// Parse a TOML rule table.
    pub fn from_toml_str(source: &str) -> Result<Self, SlaConfigError> {
        let file: RuleTableFile = toml::from_str(source)?;
        Self::new(file.version, file.rules)
    }

    /// Read and parse a TOML rule table from disk.
    pub fn from_path(path: &Path) -> Result<Self, SlaConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| SlaConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// The rule table embedded in the engine.
    pub fn builtin() -> Result<Self, SlaConfigError> {
        Self::from_toml_str(BUILTIN_RULES)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Rules in (actor, action type) order.
    pub fn rules(&self) -> impl Iterator<Item = &SlaRule> {
        self.rules.values()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, actor: Actor, action_type: &str) -> Option<&SlaRule> {
        self.rules.get(&(actor, action_type.to_string()))
    }

    /// The rule naming who owes `action_type`, i.e. who is responsible
    /// when it is breached.
    pub fn obligation_for(&self, action_type: &str) -> Option<&SlaRule> {
        let actor = *self.owed_by.get(action_type)?;
        self.get(actor, action_type)
    }

    /// JSON view for reviewers: `{ version, rules: [...] }`.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        let view = RuleTableView {
            version: &self.version,
            rules: self.rules.values().collect(),
        };
        serde_json::to_value(view)
    }
}
