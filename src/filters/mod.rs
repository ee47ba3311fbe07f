/// Filter pipeline and rule implementations
pub mod pipeline;
pub mod rules;

pub use pipeline::{Clock, FilterDecision, FilterPipeline, LocalClock};
pub use rules::{Classification, DropReason, FilterCategory, FilterRule, RuleContext, Verdict};
