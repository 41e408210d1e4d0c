use async_trait::async_trait;
use image::imageops::FilterType;
use image::{GenericImageView, ImageOutputFormat};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use super::FrameSource;
use crate::error::CaptureError;

/// Frames larger than this on the long edge are downscaled before analysis.
pub const MAX_FRAME_EDGE: u32 = 1280;
const JPEG_QUALITY: u8 = 85;

/// Grabs single frames from an RTSP stream through an `ffmpeg` subprocess.
pub struct FfmpegFrameSource {
    stream_url: String,
    binary: String,
}

impl FfmpegFrameSource {
    pub fn new(stream_url: impl Into<String>) -> Self {
        Self {
            stream_url: stream_url.into(),
            binary: "ffmpeg".to_string(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    /// The child is killed when the timeout drops the future.
    async fn capture(&self, timeout: Duration) -> Result<Vec<u8>, CaptureError> {
        debug!(stream = %self.stream_url, "Grabbing frame");

        let child = Command::new(&self.binary)
            .args([
                "-rtsp_transport", "tcp",
                "-i", self.stream_url.as_str(),
                "-frames:v", "1",
                "-f", "image2pipe",
                "-vcodec", "mjpeg",
                "-loglevel", "error",
                "-y",
                "-",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CaptureError::Permanent(format!("ffmpeg spawn failed: {e}")))?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(CaptureError::Transient(format!("ffmpeg execution failed: {e}"))),
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "ffmpeg timeout, process killed");
                return Err(CaptureError::Transient(format!("ffmpeg timeout ({}s)", timeout.as_secs())));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::Transient(format!("ffmpeg failed: {}", stderr.trim())));
        }
        if output.stdout.is_empty() {
            return Err(CaptureError::Transient("ffmpeg returned empty output".to_string()));
        }

        // Decoding is CPU-bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || normalize_frame(&output.stdout))
            .await
            .map_err(|e| CaptureError::Transient(format!("frame normalization aborted: {e}")))?
    }
}

/// Validate a grabbed frame and re-encode it as a bounded-size JPEG.
pub fn normalize_frame(raw: &[u8]) -> Result<Vec<u8>, CaptureError> {
    let frame = image::load_from_memory(raw)
        .map_err(|e| CaptureError::Transient(format!("undecodable frame: {e}")))?;

    let (width, height) = frame.dimensions();
    let frame = if width.max(height) > MAX_FRAME_EDGE {
        frame.resize(MAX_FRAME_EDGE, MAX_FRAME_EDGE, FilterType::Triangle)
    } else {
        frame
    };

    let mut jpeg = Vec::new();
    frame
        .write_to(&mut jpeg, ImageOutputFormat::Jpeg(JPEG_QUALITY))
        .map_err(|e| CaptureError::Transient(format!("jpeg encode failed: {e}")))?;
    Ok(jpeg)
}
