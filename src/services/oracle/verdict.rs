use serde::{Deserialize, Serialize};

use crate::error::OracleError;

/// Structured answer the model must return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Verdict {
    pub print_failed: bool,
    pub confidence: f32,
    pub explanation: String,
}

#[derive(Deserialize)]
struct InvokeResponse {
    output: ResponseOutput,
}

#[derive(Deserialize)]
struct ResponseOutput {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

/// Pull the model's text out of a runtime response body.
pub fn response_text(body: &str) -> Result<String, OracleError> {
    let response: InvokeResponse = serde_json::from_str(body)
        .map_err(|e| OracleError::Permanent(format!("malformed oracle response: {e}")))?;

    response
        .output
        .message
        .content
        .into_iter()
        .find_map(|block| block.text)
        .ok_or_else(|| OracleError::Permanent("oracle response has no text block".to_string()))
}

/// Parse the verdict JSON, tolerating markdown fences or prose around the object.
pub fn parse_verdict(text: &str) -> Result<Verdict, OracleError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let object = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => return Err(OracleError::Permanent(format!("no JSON object in judgment: {}", text.trim()))),
    };

    let verdict: Verdict = serde_json::from_str(object)
        .map_err(|e| OracleError::Permanent(format!("unparseable judgment: {e}")))?;

    if !verdict.confidence.is_finite() {
        return Err(OracleError::Permanent("judgment confidence is not a number".to_string()));
    }
    Ok(verdict)
}
