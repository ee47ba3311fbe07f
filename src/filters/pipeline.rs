use crate::config::FilterConfig;
use crate::events::Event;
use crate::filters::rules::{
    ClassificationRule, DropReason, FilterRule, QuietHoursRule, RuleContext, ScoreRule, Verdict,
    ZoneRule,
};
use chrono::{Local, NaiveTime};
use log::{debug, info};
use std::sync::Arc;

/// Source of the current time of day for quiet-hours checks
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn time_of_day(&self) -> NaiveTime;
}

/// Wall clock in the local timezone
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn time_of_day(&self) -> NaiveTime {
        Local::now().time()
    }
}

/// Outcome of running an event through the filter pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum FilterDecision {
    Notify,
    Drop(DropReason),
}

impl FilterDecision {
    pub fn should_notify(&self) -> bool {
        matches!(self, FilterDecision::Notify)
    }

    /// Reason for the first failing rule, if the event was dropped
    pub fn drop_reason(&self) -> Option<&DropReason> {
        match self {
            FilterDecision::Notify => None,
            FilterDecision::Drop(reason) => Some(reason),
        }
    }
}

/// Runs the filter rules in their fixed order
///
/// The order is quiet hours, zone, label, score, sublabel. Evaluation stops at
/// the first rule that suppresses the event, so a drop is always attributed to
/// the earliest failing rule and later rules are never consulted.
pub struct FilterPipeline {
    rules: Vec<Box<dyn FilterRule>>,
    clock: Arc<dyn Clock>,
}

impl Default for FilterPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterPipeline {
    /// Create a pipeline reading the local wall clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(LocalClock))
    }

    /// Create a pipeline with a custom time source
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let rules: Vec<Box<dyn FilterRule>> = vec![
            Box::new(QuietHoursRule),
            Box::new(ZoneRule),
            Box::new(ClassificationRule::label()),
            Box::new(ScoreRule),
            Box::new(ClassificationRule::sublabel()),
        ];
        Self { rules, clock }
    }

    /// Decide whether an event should produce a notification
    ///
    /// The configuration snapshot is passed on every call so a reloaded
    /// configuration takes effect for the next event.
    pub fn evaluate(&self, event: &Event, config: &FilterConfig) -> FilterDecision {
        self.evaluate_at(event, config, self.clock.time_of_day())
    }

    /// Same as [`FilterPipeline::evaluate`] with an explicit time of day
    pub fn evaluate_at(&self, event: &Event, config: &FilterConfig, now: NaiveTime) -> FilterDecision {
        let ctx = RuleContext { config, now };

        for rule in &self.rules {
            if let Verdict::Suppress(reason) = rule.evaluate(event, &ctx) {
                info!("Event dropped - {}: event_id={}", reason, event.id);
                return FilterDecision::Drop(reason);
            }
        }

        debug!("Event passed all filters: event_id={}", event.id);
        FilterDecision::Notify
    }

    /// Names of the configured rules in evaluation order
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    /// Get the number of configured rules
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
