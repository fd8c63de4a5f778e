//! # GitLabSource Status
//!
//! Status types and condition bookkeeping.
//!
//! The conditions a resource carries are declared once in a static
//! [`ConditionSet`] and handed to [`ConditionManager`] explicitly. The
//! manager keeps a derived `Ready` condition in step with the conditions that
//! contribute to readiness.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const CONDITION_READY: &str = "Ready";
pub const CONDITION_SINK_PROVIDED: &str = "SinkProvided";
pub const CONDITION_DEPLOYED: &str = "Deployed";
pub const CONDITION_WEBHOOK_CONFIGURED: &str = "WebhookConfigured";

const STATUS_TRUE: &str = "True";
const STATUS_FALSE: &str = "False";
const STATUS_UNKNOWN: &str = "Unknown";

/// Status of the GitLabSource resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitLabSourceStatus {
    /// Generation last handled by the controller
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Resolved address of the sink
    #[serde(default)]
    pub sink_uri: Option<String>,
    /// ID of the hook registered on GitLab; unset until created and after deletion
    #[serde(default, rename = "webhookID")]
    pub webhook_id: Option<i64>,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// CloudEvent types and source this GitLabSource emits
    #[serde(default)]
    pub ce_attributes: Vec<CloudEventAttributes>,
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct CloudEventAttributes {
    pub r#type: String,
    pub source: String,
}

impl GitLabSourceStatus {
    #[must_use]
    pub fn condition(&self, name: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == name)
    }

    /// Whether the derived Ready condition is True
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.condition(CONDITION_READY)
            .is_some_and(|c| c.status == STATUS_TRUE)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConditionDef {
    pub name: &'static str,
    pub contributes_to_ready: bool,
}

/// Conditions a resource type carries, in display order after `ready`
#[derive(Debug, Clone, Copy)]
pub struct ConditionSet {
    pub ready: &'static str,
    pub conditions: &'static [ConditionDef],
}

pub static GITLAB_SOURCE_CONDITIONS: ConditionSet = ConditionSet {
    ready: CONDITION_READY,
    conditions: &[
        ConditionDef {
            name: CONDITION_SINK_PROVIDED,
            contributes_to_ready: true,
        },
        ConditionDef {
            name: CONDITION_DEPLOYED,
            contributes_to_ready: true,
        },
        ConditionDef {
            name: CONDITION_WEBHOOK_CONFIGURED,
            contributes_to_ready: true,
        },
    ],
};

/// Mutates a condition list according to a [`ConditionSet`]
///
/// `lastTransitionTime` moves only when a condition's status changes, so
/// marking the same state twice leaves the list untouched.
#[derive(Debug)]
pub struct ConditionManager<'a> {
    set: &'a ConditionSet,
    conditions: &'a mut Vec<Condition>,
    now: String,
}

impl<'a> ConditionManager<'a> {
    pub fn new(set: &'a ConditionSet, conditions: &'a mut Vec<Condition>, now: DateTime<Utc>) -> Self {
        Self {
            set,
            conditions,
            now: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }

    /// Add every missing condition as Unknown and order the list
    pub fn initialize(&mut self) {
        let set = self.set;
        let names = std::iter::once(set.ready).chain(set.conditions.iter().map(|d| d.name));
        for name in names {
            if !self.conditions.iter().any(|c| c.r#type == name) {
                self.conditions.push(Condition {
                    r#type: name.to_string(),
                    status: STATUS_UNKNOWN.to_string(),
                    last_transition_time: Some(self.now.clone()),
                    reason: None,
                    message: None,
                });
            }
        }
        let position = |name: &str| {
            if name == set.ready {
                return 0;
            }
            set.conditions
                .iter()
                .position(|d| d.name == name)
                .map_or(usize::MAX, |p| p + 1)
        };
        self.conditions.sort_by_key(|c| position(&c.r#type));
        self.recompute_ready();
    }

    pub fn mark_true(&mut self, name: &str) {
        self.set_condition(name, STATUS_TRUE, None, None);
    }

    pub fn mark_false(&mut self, name: &str, reason: &str, message: impl Into<String>) {
        self.set_condition(name, STATUS_FALSE, Some(reason), Some(message.into()));
    }

    pub fn mark_unknown(&mut self, name: &str, reason: &str, message: impl Into<String>) {
        self.set_condition(name, STATUS_UNKNOWN, Some(reason), Some(message.into()));
    }

    fn set_condition(&mut self, name: &str, status: &str, reason: Option<&str>, message: Option<String>) {
        self.write(name, status, reason.map(str::to_string), message);
        if name != self.set.ready {
            self.recompute_ready();
        }
    }

    fn write(&mut self, name: &str, status: &str, reason: Option<String>, message: Option<String>) {
        match self.conditions.iter_mut().find(|c| c.r#type == name) {
            Some(existing) => {
                if existing.status != status {
                    existing.status = status.to_string();
                    existing.last_transition_time = Some(self.now.clone());
                }
                existing.reason = reason;
                existing.message = message;
            }
            None => self.conditions.push(Condition {
                r#type: name.to_string(),
                status: status.to_string(),
                last_transition_time: Some(self.now.clone()),
                reason,
                message,
            }),
        }
    }

    /// Ready is False if any contributing condition is False, Unknown if any is
    /// Unknown or missing, True otherwise
    fn recompute_ready(&mut self) {
        let set = self.set;
        let mut unknown: Option<(Option<String>, Option<String>)> = None;
        for def in set.conditions.iter().filter(|d| d.contributes_to_ready) {
            match self.conditions.iter().find(|c| c.r#type == def.name) {
                Some(c) if c.status == STATUS_FALSE => {
                    let (reason, message) = (c.reason.clone(), c.message.clone());
                    self.write(set.ready, STATUS_FALSE, reason, message);
                    return;
                }
                Some(c) if c.status == STATUS_TRUE => {}
                Some(c) => {
                    unknown.get_or_insert((c.reason.clone(), c.message.clone()));
                }
                None => {
                    unknown.get_or_insert((None, None));
                }
            }
        }
        match unknown {
            Some((reason, message)) => self.write(set.ready, STATUS_UNKNOWN, reason, message),
            None => self.write(set.ready, STATUS_TRUE, None, None),
        }
    }
}
