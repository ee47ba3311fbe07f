//! Core event type for camera detections
//!
//! An [`Event`] is built by the ingestion side from raw source data, is never
//! mutated afterwards, and flows once through the filter pipeline and, if
//! admitted, through provider dispatch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// One detection reported by the surveillance system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Opaque unique identifier assigned by the source
    pub id: String,
    /// Camera that produced the detection
    #[serde(default)]
    pub camera: String,
    /// Primary detected category, e.g. "person"
    pub label: String,
    /// Secondary categories refining the label, in source order
    #[serde(default, alias = "sub_label")]
    pub sub_labels: Vec<String>,
    /// Detection confidence in the range 0.0..=1.0
    pub top_score: f64,
    /// Zones the object currently occupies
    #[serde(default, alias = "zones")]
    pub current_zones: Vec<String>,
    /// Whether a snapshot image can be fetched for this event
    #[serde(default)]
    pub has_snapshot: bool,
    /// When the detection started, if known
    #[serde(default)]
    pub start_time: Option<Timestamp>,
}

impl Event {
    /// Create an event with the fields the filter pipeline looks at
    pub fn new(id: impl Into<String>, label: impl Into<String>, top_score: f64) -> Self {
        Self {
            id: id.into(),
            camera: String::new(),
            label: label.into(),
            sub_labels: Vec::new(),
            top_score,
            current_zones: Vec::new(),
            has_snapshot: false,
            start_time: None,
        }
    }

    pub fn with_camera(mut self, camera: impl Into<String>) -> Self {
        self.camera = camera.into();
        self
    }

    pub fn with_sub_labels<I, S>(mut self, sub_labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sub_labels = sub_labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_zones<I, S>(mut self, zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.current_zones = zones.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_snapshot(mut self, has_snapshot: bool) -> Self {
        self.has_snapshot = has_snapshot;
        self
    }

    pub fn with_start_time(mut self, start_time: Timestamp) -> Self {
        self.start_time = Some(start_time);
        self
    }

    /// Detection confidence expressed as a percentage
    pub fn score_percent(&self) -> f64 {
        self.top_score * 100.0
    }

    /// True when the object is not inside any configured zone
    pub fn is_unzoned(&self) -> bool {
        self.current_zones.is_empty()
    }
}
