//! Ordered, concurrent rule evaluation
//!
//! Every enabled rule is dispatched at once. Results land in slots indexed by
//! rule rank and are committed strictly left to right, so the lowest-ranked
//! blocking rule wins no matter which call returns first. Once the decision is
//! known the remaining calls are aborted.

use super::client::RuleExecutor;
use super::types::{RuleDecision, RulePrompt, RuleResult, StatusMessage};
use super::RuleError;
use crate::config::{PluginConfig, RuleAction, RuleConfig, RuleType};
use crate::protocol::ChatCompletionRequest;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Committed effect of one rule
#[derive(Debug, Clone, PartialEq)]
struct RuleOutcome {
    blocked: bool,
    message: String,
    redaction: Option<String>,
}

#[derive(Clone)]
pub struct RulePipeline {
    executor: Arc<dyn RuleExecutor>,
}

impl RulePipeline {
    pub fn new(executor: Arc<dyn RuleExecutor>) -> Self {
        Self { executor }
    }

    /// Evaluate `rules` against `request`
    ///
    /// The request is never modified; redactions are applied to the copy in
    /// [`RuleDecision::messages`].
    pub async fn evaluate(
        &self,
        rules: &[RuleConfig],
        request: &ChatCompletionRequest,
    ) -> Result<RuleDecision, RuleError> {
        let target = request.first_user_index().ok_or(RuleError::NoUserMessage)?;

        let mut active: Vec<&RuleConfig> = rules.iter().filter(|r| r.enabled).collect();
        // Stable: equal order numbers keep declaration order
        active.sort_by_key(|r| r.order_number);

        let mut messages = request.messages.clone();
        if active.is_empty() {
            return Ok(passed(messages));
        }

        debug!(
            rules = active.len(),
            inspection_chars = request.user_prompt().len(),
            "Evaluating input rules"
        );

        let prompt = Arc::new(RulePrompt::from(request));
        let mut tasks = JoinSet::new();
        for (slot, rule) in active.iter().enumerate() {
            let executor = Arc::clone(&self.executor);
            let prompt = Arc::clone(&prompt);
            let config: PluginConfig = rule.config.clone();
            tasks.spawn(async move { (slot, executor.execute(&prompt, &config).await) });
        }

        let mut slots: Vec<Option<RuleOutcome>> = vec![None; active.len()];
        let mut next = 0;

        while let Some(joined) = tasks.join_next().await {
            let (slot, result) = match joined {
                Ok(pair) => pair,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => {
                    // The slot is unknown, so nothing can be committed past this point
                    error!(error = %e, "Rule task panicked, blocking request");
                    tasks.abort_all();
                    return Ok(RuleDecision {
                        blocked: true,
                        message: RuleError::Task(e.to_string()).to_string(),
                        messages,
                        blocked_by: None,
                    });
                }
            };

            slots[slot] = Some(apply_policy(active[slot], result));

            while let Some(outcome) = slots.get(next).and_then(Option::as_ref) {
                let rule = active[next];
                if let Some(content) = &outcome.redaction {
                    messages[target].content = content.clone();
                    debug!(rule = %rule.name, "Applied redaction");
                }
                if outcome.blocked {
                    tasks.abort_all();
                    info!(rule = %rule.name, rule_type = %rule.rule_type, "Request blocked");
                    return Ok(RuleDecision {
                        blocked: true,
                        message: outcome.message.clone(),
                        messages,
                        blocked_by: Some(rule.name.clone()),
                    });
                }
                next += 1;
            }

            if next == active.len() {
                break;
            }
        }

        Ok(passed(messages))
    }
}

fn passed(messages: Vec<crate::protocol::ChatMessage>) -> RuleDecision {
    RuleDecision {
        blocked: false,
        message: StatusMessage::non_blocked("input").render(),
        messages,
        blocked_by: None,
    }
}

/// Decide one rule from its service result
fn apply_policy(rule: &RuleConfig, result: Result<RuleResult, RuleError>) -> RuleOutcome {
    let result = match result {
        Ok(result) => result,
        Err(e) => {
            error!(rule = %rule.name, error = %e, "Rule execution failed, blocking request");
            return RuleOutcome {
                blocked: true,
                message: e.to_string(),
                redaction: None,
            };
        }
    };

    let rule_type = rule.rule_type.as_str();
    match rule.rule_type {
        RuleType::PiiFilter => {
            if !result.inspection.check_result {
                debug!(rule = %rule.name, "No PII detected");
                return not_blocked(rule_type);
            }
            let redaction = Some(result.inspection.anonymized_content.clone().unwrap_or_default());
            let mut outcome = decide(rule, true, StatusMessage::blocked(rule_type).render());
            outcome.redaction = redaction;
            outcome
        }
        RuleType::LlamaGuard => {
            if !result.matched {
                return not_blocked(rule_type);
            }
            let violations = relevant_violations(&rule.config, result.inspection.violated_categories());
            if violations.is_empty() {
                debug!(rule = %rule.name, "No configured category violated");
                return not_blocked(rule_type);
            }
            let message = StatusMessage::blocked(rule_type)
                .with_categories(&violations)
                .render();
            decide(rule, true, message)
        }
        _ => {
            debug!(rule = %rule.name, matched = result.matched, score = result.inspection.score, "Rule evaluated");
            decide(rule, result.matched, StatusMessage::blocked(rule_type).render())
        }
    }
}

/// Block or monitor a match according to the rule action
fn decide(rule: &RuleConfig, matched: bool, block_message: String) -> RuleOutcome {
    if !matched {
        return not_blocked(rule.rule_type.as_str());
    }
    match rule.action {
        RuleAction::Block => RuleOutcome {
            blocked: true,
            message: block_message,
            redaction: None,
        },
        RuleAction::Monitor => {
            warn!(rule = %rule.name, rule_type = %rule.rule_type, "Rule matched in monitor mode");
            not_blocked(rule.rule_type.as_str())
        }
    }
}

fn not_blocked(rule_type: &str) -> RuleOutcome {
    RuleOutcome {
        blocked: false,
        message: StatusMessage::non_blocked(rule_type).render(),
        redaction: None,
    }
}

/// Violations limited to the configured categories; none configured keeps all
fn relevant_violations(config: &PluginConfig, violated: Vec<String>) -> Vec<String> {
    match &config.plugin {
        crate::config::Plugin::LlamaGuard { categories } if !categories.is_empty() => violated
            .into_iter()
            .filter(|v| categories.contains(v))
            .collect(),
        _ => violated,
    }
}
