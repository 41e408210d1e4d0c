use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// One still frame, JPEG encoded, tagged with its capture time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub captured_at: DateTime<Utc>,
    pub jpeg: Arc<[u8]>,
}

/// Time-ordered frames captured at a fixed interval; one unit of evidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSeries {
    images: Vec<CapturedImage>,
    interval: Duration,
}

impl ImageSeries {
    /// Returns `None` unless timestamps strictly increase.
    pub fn new(images: Vec<CapturedImage>, interval: Duration) -> Option<Self> {
        let ordered = images
            .windows(2)
            .all(|pair| pair[0].captured_at < pair[1].captured_at);
        if images.is_empty() || !ordered {
            return None;
        }
        Some(Self { images, interval })
    }

    pub fn images(&self) -> &[CapturedImage] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn latest(&self) -> &CapturedImage {
        // Non-empty by construction.
        &self.images[self.images.len() - 1]
    }
}

/// The oracle's verdict on one series. Immutable once built.
#[derive(Debug, Clone)]
pub struct Judgment {
    pub failed: bool,
    pub confidence: f32,
    pub explanation: String,
    pub source_series: Arc<ImageSeries>,
}

impl Judgment {
    pub fn new(failed: bool, confidence: f32, explanation: impl Into<String>, source_series: Arc<ImageSeries>) -> Self {
        Self {
            failed,
            confidence: confidence.clamp(0.0, 1.0),
            explanation: explanation.into(),
            source_series,
        }
    }
}

/// Confirmed print failure, handed to the alert sink and not retained.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub timestamp: DateTime<Utc>,
    pub confirmed: bool,
    pub explanation: String,
    pub representative_image: CapturedImage,
}

/// Published once per completed analysis cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub timestamp: DateTime<Utc>,
    pub print_failed: bool,
    pub description: String,
}
