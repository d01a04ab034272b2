//! Rule — a static filter/rewrite applied to every inbound request.
//!
//! Rules are the access-control mechanism of the pipeline: a request that
//! matches no rule is dropped (default-deny). A matching rule may retarget,
//! recommand, or repayload the request before it is queued.

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::id::ItemId;
use crate::message::Message;
use crate::value::Value;

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
}

/// What a condition is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Subject {
    /// The request's own original message.
    This,
    /// The live status of the named item.
    Item(ItemId),
}

impl From<String> for Subject {
    fn from(value: String) -> Self {
        if value == "this" {
            Self::This
        } else {
            Self::Item(ItemId::from(value))
        }
    }
}

impl From<Subject> for String {
    fn from(subject: Subject) -> Self {
        match subject {
            Subject::This => "this".to_string(),
            Subject::Item(id) => id.to_string(),
        }
    }
}

/// Where a matching rule redirects the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TargetOverride {
    /// Redirect back to the request's sender.
    This,
    /// Redirect to the named item.
    Item(ItemId),
}

impl From<String> for TargetOverride {
    fn from(value: String) -> Self {
        if value == "this" {
            Self::This
        } else {
            Self::Item(ItemId::from(value))
        }
    }
}

impl From<TargetOverride> for String {
    fn from(target: TargetOverride) -> Self {
        match target {
            TargetOverride::This => "this".to_string(),
            TargetOverride::Item(id) => id.to_string(),
        }
    }
}

/// A single predicate; all of a rule's conditions must hold (logical AND).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub subject: Subject,
    pub feature: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    /// Evaluate against a resolved mapping.
    ///
    /// Total: a missing feature or a type-mismatched comparison is `false`,
    /// never an error.
    #[must_use]
    pub fn matches(&self, msg: &Message) -> bool {
        let Some(actual) = msg.get(&self.feature) else {
            return false;
        };
        match self.operator {
            Operator::Eq => actual == &self.value,
            Operator::Ne => actual != &self.value,
            Operator::Gt => actual.partial_cmp(&self.value) == Some(std::cmp::Ordering::Greater),
            Operator::Lt => actual.partial_cmp(&self.value) == Some(std::cmp::Ordering::Less),
        }
    }
}

/// A request filter/rewrite, static for the life of the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: ItemId,
    /// Disabled rules never apply.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Sender filter: the request sender's id, or a group the sender
    /// belongs to.
    pub sender: ItemId,
    /// Retarget the request; `None` keeps the original target.
    #[serde(default)]
    pub target: Option<TargetOverride>,
    /// Replace the command; `None` keeps the original.
    #[serde(default)]
    pub command: Option<Command>,
    /// Replace the payload; an empty override passes the original message
    /// through instead.
    #[serde(default)]
    pub payload: Message,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

fn default_enabled() -> bool {
    true
}
