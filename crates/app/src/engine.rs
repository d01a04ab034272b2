//! Rule engine — default-deny filtering and rewriting of inbound requests.
//!
//! Every externally-originated request passes through [`RuleEngine::submit`].
//! A request that matches no enabled rule is dropped silently; each matching
//! rule emits one rewritten request into the queue.

use std::sync::Arc;

use homeguard_domain::item::{ItemKind, ItemSettings};
use homeguard_domain::message::Message;
use homeguard_domain::rule::{Rule, Subject, TargetOverride};
use tracing::{debug, trace, warn};

use crate::queue::RequestQueue;
use crate::registry::Registry;
use crate::request::Request;

pub struct RuleEngine {
    registry: Arc<Registry>,
    queue: Arc<RequestQueue>,
    rules: Vec<Rule>,
}

impl RuleEngine {
    /// Compile the rule set out of the registry's rule items. Rules without
    /// a sender filter could never apply and are skipped with a warning.
    #[must_use]
    pub fn new(registry: Arc<Registry>, queue: Arc<RequestQueue>) -> Self {
        let rules = registry
            .of_kind(ItemKind::Rule)
            .into_iter()
            .filter_map(|item| {
                let settings = item.settings();
                let ItemSettings::Rule(rule) = settings else {
                    return None;
                };
                let id = item.id().clone();
                let compiled = rule.into_rule(id.clone());
                if compiled.is_none() {
                    warn!(rule = %id, "rule has no sender filter, skipping");
                }
                compiled
            })
            .collect();
        Self {
            registry,
            queue,
            rules,
        }
    }

    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Evaluate a request against the rule set and queue every rewrite that
    /// validates. Matching no rule means the request is dropped.
    pub fn submit(&self, request: Request) {
        let mut queued = 0_usize;
        for rule in &self.rules {
            if !self.applies(rule, &request) {
                continue;
            }
            let rewritten = self.rewrite(rule, &request);
            if rewritten.validate() {
                trace!(
                    rule = %rule.id,
                    request = %rewritten.id,
                    origin = %request.id,
                    "rule matched, request queued"
                );
                self.queue.enqueue(rewritten);
                queued += 1;
            } else {
                debug!(rule = %rule.id, origin = %request.id, "rewrite did not validate");
            }
        }
        if queued == 0 {
            debug!(origin = %request.id, "no rule matched, request dropped");
        }
    }

    /// Sender filter plus conditions. The sender matches by identity or by
    /// membership in the group the rule names.
    fn applies(&self, rule: &Rule, request: &Request) -> bool {
        if !rule.enabled {
            return false;
        }
        let sender_matches = request.sender.is(&rule.sender)
            || request
                .sender
                .item()
                .is_some_and(|item| item.groups().contains(&rule.sender));
        if !sender_matches {
            return false;
        }
        rule.conditions
            .iter()
            .all(|condition| condition.matches(&self.subject_of(&condition.subject, request)))
    }

    /// Resolve a condition subject to the mapping it is evaluated against:
    /// the request's own message, or the named item's live status. An
    /// unresolved item yields an empty mapping, which no condition matches.
    fn subject_of(&self, subject: &Subject, request: &Request) -> Message {
        match subject {
            Subject::This => request.message.clone(),
            Subject::Item(id) => self
                .registry
                .get(id)
                .map_or_else(Message::new, |item| item.status()),
        }
    }

    fn rewrite(&self, rule: &Rule, request: &Request) -> Request {
        let target = match &rule.target {
            None => request.target.clone(),
            Some(TargetOverride::This) => request.sender.clone(),
            Some(TargetOverride::Item(id)) => self.registry.resolve(id),
        };
        let payload = if rule.payload.is_empty() {
            request.message.clone()
        } else {
            rule.payload.clone()
        };
        let mut rewritten = Request::new(request.sender.clone())
            .with_target(target)
            .with_payload(payload)
            .with_message(request.message.clone());
        if let Some(command) = rule.command.clone().or_else(|| request.command.clone()) {
            rewritten = rewritten.with_command(command);
        }
        rewritten
    }
}
