//! Hugging Face inference API types

use serde::{Deserialize, Serialize};

/// Text-generation request
#[derive(Debug, Serialize)]
pub struct HuggingFaceRequest {
    pub inputs: String,
    pub parameters: HuggingFaceParameters,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct HuggingFaceParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<u32>,
    pub return_full_text: bool,
}

/// One element of the non-streaming response array
#[derive(Debug, Deserialize)]
pub struct GeneratedText {
    #[serde(default)]
    pub generated_text: String,
}

/// Streamed token event
#[derive(Debug, Deserialize)]
pub struct HuggingFaceStreamEvent {
    pub token: StreamToken,

    /// Set only on the last event of a stream
    #[serde(default)]
    pub generated_text: Option<String>,

    #[serde(default)]
    pub details: Option<StreamDetails>,
}

#[derive(Debug, Deserialize)]
pub struct StreamToken {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub special: bool,
}

#[derive(Debug, Deserialize)]
pub struct StreamDetails {
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub generated_tokens: Option<u32>,
}
