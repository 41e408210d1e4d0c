use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::kernel::event::ImageSeries;

pub const SYSTEM_PROMPT: &str = "You are a precise 3D printing quality inspector. You analyze images of active 3D prints and determine if a print failure is occurring.";

const RESPONSE_CONTRACT: &str = "Respond only with a JSON object containing exactly these keys: 'print_failed' (boolean), 'confidence' (number between 0 and 1) and 'explanation' (one short sentence).";

const FAILURE_SIGNS: &str = "A common sign of failure is loose or tangled filament (known as 'spaghetti'). Other signs are a part detached from the bed, a nozzle printing into the air, or a blob of plastic around the nozzle.";

const MAX_TOKENS: u32 = 500;

/// Instruction text; the shape depends on how many frames are attached.
pub fn instruction(series: &ImageSeries) -> String {
    if series.len() == 1 {
        format!(
            "Based on this image of a 3D printer in progress, determine if the print has failed. {FAILURE_SIGNS} {RESPONSE_CONTRACT}"
        )
    } else {
        format!(
            "These {} images of a 3D printer in progress were taken {} seconds apart, oldest first. \
             Compare them to determine if the print has failed; filament that keeps moving or piling up between frames is a strong sign. \
             {FAILURE_SIGNS} {RESPONSE_CONTRACT}",
            series.len(),
            series.interval().as_secs()
        )
    }
}

/// Request body in the `messages-v1` schema: every frame as an image block, then the instruction.
pub fn request_body(series: &ImageSeries) -> Value {
    let mut content: Vec<Value> = series
        .images()
        .iter()
        .map(|image| {
            json!({
                "image": {
                    "format": "jpeg",
                    "source": { "bytes": STANDARD.encode(&image.jpeg) }
                }
            })
        })
        .collect();
    content.push(json!({ "text": instruction(series) }));

    json!({
        "schemaVersion": "messages-v1",
        "system": [{ "text": SYSTEM_PROMPT }],
        "messages": [{ "role": "user", "content": content }],
        "inferenceConfig": {
            "maxTokens": MAX_TOKENS,
            "temperature": 0,
            "topP": 1,
            "topK": 1
        }
    })
}
