//! Frame source capability: one still image per request.

pub mod ffmpeg;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::CaptureError;

pub use ffmpeg::FfmpegFrameSource;

#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Grab one frame as JPEG bytes within `timeout`.
    async fn capture(&self, timeout: Duration) -> Result<Vec<u8>, CaptureError>;
}
