//! Input policy rules
//!
//! Each enabled rule is checked by the external rule execution service. The
//! [`RulePipeline`] fans the calls out concurrently and commits their effects in
//! rule order: redactions from PII rules, then the first block.

mod client;
mod pipeline;
mod types;

pub use client::{HttpRuleExecutor, RuleExecutor};
pub use pipeline::RulePipeline;
pub use types::{Inspection, RuleDecision, RuleError, RulePrompt, RuleRequest, RuleResult};
