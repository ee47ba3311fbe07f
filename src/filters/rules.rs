//! Built-in filter rules
//!
//! Each rule is a stateless predicate over one event and a configuration
//! snapshot. Rules never mutate anything; the pipeline decides what to do
//! with a suppression.

use crate::config::{FilterConfig, ListPolicy, ListVerdict, UnzonedAction};
use crate::events::Event;
use chrono::NaiveTime;
use serde::Serialize;
use std::fmt;

/// Inputs shared by every rule for one evaluation
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub config: &'a FilterConfig,
    /// Wall-clock time of day at evaluation
    pub now: NaiveTime,
}

/// Result of evaluating a single rule
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass,
    Suppress(DropReason),
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Trait for rules deciding whether an event may produce a notification
pub trait FilterRule: Send + Sync {
    /// Evaluate this rule for one event
    fn evaluate(&self, event: &Event, ctx: &RuleContext<'_>) -> Verdict;

    /// Get a human-readable name for this rule
    fn name(&self) -> &str;

    /// Rule category reported in drop reasons
    fn category(&self) -> FilterCategory;
}

/// Category of the rule that dropped an event
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FilterCategory {
    QuietHours,
    Zone,
    Label,
    Score,
    Sublabel,
}

/// Which classification field a block/allow check applies to
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Label,
    Sublabel,
}

impl Classification {
    /// Lists configured for this classification
    pub fn policy<'a>(&self, config: &'a FilterConfig) -> &'a ListPolicy {
        match self {
            Classification::Label => &config.labels.lists,
            Classification::Sublabel => &config.sublabels,
        }
    }

    /// Values of the event checked for this classification
    ///
    /// An event without sublabels is checked once against the empty string,
    /// so operators can block or allow "no sublabel" explicitly.
    pub fn values<'e>(&self, event: &'e Event) -> Vec<&'e str> {
        match self {
            Classification::Label => vec![event.label.as_str()],
            Classification::Sublabel if event.sub_labels.is_empty() => vec![""],
            Classification::Sublabel => event.sub_labels.iter().map(String::as_str).collect(),
        }
    }

    pub fn category(&self) -> FilterCategory {
        match self {
            Classification::Label => FilterCategory::Label,
            Classification::Sublabel => FilterCategory::Sublabel,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Label => write!(f, "label"),
            Classification::Sublabel => write!(f, "sublabel"),
        }
    }
}

/// Why an event was dropped, with the offending values for audit logs
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DropReason {
    QuietHours {
        start: NaiveTime,
        end: NaiveTime,
        now: NaiveTime,
    },
    Unzoned,
    ZoneBlocked {
        zone: String,
        zones: Vec<String>,
    },
    ZoneNotAllowed {
        zones: Vec<String>,
    },
    Blocked {
        kind: Classification,
        value: String,
    },
    NotAllowed {
        kind: Classification,
        value: String,
    },
    ScoreTooLow {
        score: f64,
        min_score: f64,
    },
}

impl DropReason {
    pub fn category(&self) -> FilterCategory {
        match self {
            DropReason::QuietHours { .. } => FilterCategory::QuietHours,
            DropReason::Unzoned
            | DropReason::ZoneBlocked { .. }
            | DropReason::ZoneNotAllowed { .. } => FilterCategory::Zone,
            DropReason::Blocked { kind, .. } | DropReason::NotAllowed { kind, .. } => {
                kind.category()
            }
            DropReason::ScoreTooLow { .. } => FilterCategory::Score,
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::QuietHours { start, end, now } => write!(
                f,
                "Quiet hours ({}-{}, now {})",
                start.format("%H:%M"),
                end.format("%H:%M"),
                now.format("%H:%M:%S")
            ),
            DropReason::Unzoned => write!(f, "Outside of zone"),
            DropReason::ZoneBlocked { zone, zones } => {
                write!(f, "Zone block list (zone={}, zones={})", zone, zones.join(","))
            }
            DropReason::ZoneNotAllowed { zones } => {
                write!(f, "Not on zone allow list (zones={})", zones.join(","))
            }
            DropReason::Blocked { kind, value } => {
                write!(f, "{} block list ({}={:?})", kind, kind, value)
            }
            DropReason::NotAllowed { kind, value } => {
                write!(f, "Not on {} allow list ({}={:?})", kind, kind, value)
            }
            DropReason::ScoreTooLow { score, min_score } => write!(
                f,
                "Does not meet minimum label score (score={:.1}, min={:.1})",
                score, min_score
            ),
        }
    }
}

/// Suppresses every event while the configured quiet-hours window is active
#[derive(Debug, Default)]
pub struct QuietHoursRule;

impl FilterRule for QuietHoursRule {
    fn evaluate(&self, _event: &Event, ctx: &RuleContext<'_>) -> Verdict {
        match ctx.config.quiet {
            Some(quiet) if quiet.contains(ctx.now) => Verdict::Suppress(DropReason::QuietHours {
                start: quiet.start,
                end: quiet.end,
                now: ctx.now,
            }),
            _ => Verdict::Pass,
        }
    }

    fn name(&self) -> &str {
        "QuietHoursRule"
    }

    fn category(&self) -> FilterCategory {
        FilterCategory::QuietHours
    }
}

/// Zone block/allow lists plus the policy for unzoned events
///
/// A blocked zone suppresses the event even if another of its zones is
/// allow-listed. With a non-empty allow list, one allowed zone is enough.
#[derive(Debug, Default)]
pub struct ZoneRule;

impl FilterRule for ZoneRule {
    fn evaluate(&self, event: &Event, ctx: &RuleContext<'_>) -> Verdict {
        let zones = &ctx.config.zones;

        if event.is_unzoned() {
            return match zones.unzoned {
                UnzonedAction::Drop => Verdict::Suppress(DropReason::Unzoned),
                UnzonedAction::Allow => Verdict::Pass,
            };
        }

        if let Some(zone) = event
            .current_zones
            .iter()
            .find(|zone| zones.lists.is_blocked(zone))
        {
            return Verdict::Suppress(DropReason::ZoneBlocked {
                zone: zone.clone(),
                zones: event.current_zones.clone(),
            });
        }

        if !zones.lists.restricts()
            || event
                .current_zones
                .iter()
                .any(|zone| zones.lists.is_allow_listed(zone))
        {
            Verdict::Pass
        } else {
            Verdict::Suppress(DropReason::ZoneNotAllowed {
                zones: event.current_zones.clone(),
            })
        }
    }

    fn name(&self) -> &str {
        "ZoneRule"
    }

    fn category(&self) -> FilterCategory {
        FilterCategory::Zone
    }
}

/// Block/allow check on the label or on every sublabel
///
/// All checked values must pass; the first failing one is reported.
#[derive(Debug)]
pub struct ClassificationRule {
    kind: Classification,
}

impl ClassificationRule {
    pub fn new(kind: Classification) -> Self {
        Self { kind }
    }

    pub fn label() -> Self {
        Self::new(Classification::Label)
    }

    pub fn sublabel() -> Self {
        Self::new(Classification::Sublabel)
    }

    pub fn kind(&self) -> Classification {
        self.kind
    }
}

impl FilterRule for ClassificationRule {
    fn evaluate(&self, event: &Event, ctx: &RuleContext<'_>) -> Verdict {
        let policy = self.kind.policy(ctx.config);

        for value in self.kind.values(event) {
            let reason = match policy.check(value) {
                ListVerdict::Allowed => continue,
                ListVerdict::Blocked => DropReason::Blocked {
                    kind: self.kind,
                    value: value.to_string(),
                },
                ListVerdict::NotAllowed => DropReason::NotAllowed {
                    kind: self.kind,
                    value: value.to_string(),
                },
            };
            return Verdict::Suppress(reason);
        }

        Verdict::Pass
    }

    fn name(&self) -> &str {
        match self.kind {
            Classification::Label => "LabelRule",
            Classification::Sublabel => "SublabelRule",
        }
    }

    fn category(&self) -> FilterCategory {
        self.kind.category()
    }
}

/// Minimum detection score, compared in percent
#[derive(Debug, Default)]
pub struct ScoreRule;

impl FilterRule for ScoreRule {
    fn evaluate(&self, event: &Event, ctx: &RuleContext<'_>) -> Verdict {
        let score = event.score_percent();
        let min_score = ctx.config.labels.min_score;

        // NaN on either side fails the comparison and suppresses
        if score >= min_score {
            Verdict::Pass
        } else {
            Verdict::Suppress(DropReason::ScoreTooLow { score, min_score })
        }
    }

    fn name(&self) -> &str {
        "ScoreRule"
    }

    fn category(&self) -> FilterCategory {
        FilterCategory::Score
    }
}
