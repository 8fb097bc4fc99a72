//! @ai:module:intent Request shaping for the ElevenLabs text-to-speech API
//! @ai:module:layer infrastructure
//! @ai:module:stateless true

use super::{Capability, ProviderCall, SpeechRequest};
use crate::request::RequestBody;
use serde_json::json;

const DEFAULT_VOICE: &str = "21m00Tcm4TlvDq8ikWAM";
const DEFAULT_MODEL: &str = "eleven_multilingual_v2";

pub(super) fn unit_price(capability: Capability) -> Option<f64> {
    match capability {
        Capability::GenerateSpeech => Some(0.30),
        _ => None,
    }
}

pub(super) fn speech(request: &SpeechRequest) -> ProviderCall {
    let voice = request.voice.as_deref().unwrap_or(DEFAULT_VOICE);
    ProviderCall {
        endpoint: format!("/v1/text-to-speech/{voice}"),
        payload: RequestBody::Json(json!({
            "text": request.text,
            "model_id": request.model.as_deref().unwrap_or(DEFAULT_MODEL),
        })),
        inputs: json!({ "text": request.text }),
        required: &["text"],
        headers: vec![("Accept".to_string(), "audio/mpeg".to_string())],
    }
}
