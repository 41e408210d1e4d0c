//! Inference oracle capability: a failure judgment for an image series.

pub mod client;
pub mod prompt;
pub mod signing;
pub mod verdict;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::OracleError;
use crate::kernel::event::{ImageSeries, Judgment};
use crate::kernel::resilience::credentials::SessionKeys;

pub use client::VisionOracle;
pub use verdict::Verdict;

#[async_trait]
pub trait Oracle: Send + Sync {
    async fn judge(&self, series: Arc<ImageSeries>, keys: &SessionKeys) -> Result<Judgment, OracleError>;
}
