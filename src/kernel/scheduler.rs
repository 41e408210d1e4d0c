use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::event::{CapturedImage, ImageSeries};
use super::resilience::ResilientCapture;
use super::time::Pacer;
use crate::error::{CaptureError, CycleError};

pub const DEFAULT_IMAGES_PER_SERIES: usize = 3;
pub const DEFAULT_INTERVAL_BETWEEN_IMAGES: Duration = Duration::from_secs(10);

/// Shape of one series: how many frames and how far apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesPlan {
    pub images: usize,
    pub interval: Duration,
}

impl Default for SeriesPlan {
    fn default() -> Self {
        Self {
            images: DEFAULT_IMAGES_PER_SERIES,
            interval: DEFAULT_INTERVAL_BETWEEN_IMAGES,
        }
    }
}

/// Acquires image series from the frame source, one grab at a time.
#[derive(Clone)]
pub struct CaptureScheduler {
    capture: ResilientCapture,
    plan: SeriesPlan,
}

impl CaptureScheduler {
    pub fn new(capture: ResilientCapture, plan: SeriesPlan) -> Self {
        Self { capture, plan }
    }

    pub fn plan(&self) -> SeriesPlan {
        self.plan
    }

    /// Primary analysis series at the configured cadence.
    pub async fn run_cycle(&self, pacer: &Pacer) -> Result<Arc<ImageSeries>, CycleError> {
        self.capture_series(self.plan, pacer).await
    }

    /// Capture `plan.images` frames, waiting `plan.interval` between grabs.
    /// Any missing frame fails the whole series; it is never shortened.
    pub async fn capture_series(&self, plan: SeriesPlan, pacer: &Pacer) -> Result<Arc<ImageSeries>, CycleError> {
        let mut images = Vec::with_capacity(plan.images);

        for index in 0..plan.images {
            if index > 0 {
                pacer.wait(plan.interval).await?;
            }

            let jpeg = self.capture.grab(pacer).await?;
            let captured_at = pacer.now();
            debug!(index, bytes = jpeg.len(), captured_at = %captured_at, "Frame captured");

            images.push(CapturedImage {
                captured_at,
                jpeg: Arc::from(jpeg),
            });
        }

        ImageSeries::new(images, plan.interval)
            .map(Arc::new)
            .ok_or_else(|| CycleError::Capture(CaptureError::Transient("series timestamps not strictly increasing".to_string())))
    }
}
