//! @ai:module:intent Request shaping for the OpenAI API
//! @ai:module:layer infrastructure
//! @ai:module:stateless true

use super::{Capability, ImageRequest, ProviderCall, SpeechRequest, TextRequest};
use crate::request::RequestBody;
use serde_json::json;

const IMAGE_MODEL: &str = "dall-e-3";
const TEXT_MODEL: &str = "gpt-4o-mini";
const SPEECH_MODEL: &str = "tts-1";

pub(super) fn unit_price(capability: Capability) -> Option<f64> {
    match capability {
        Capability::GenerateImage => Some(0.04),
        Capability::GenerateText => Some(0.0006),
        Capability::GenerateSpeech => Some(0.015),
        Capability::RemoveBackground | Capability::TransformImage => None,
    }
}

pub(super) fn image(request: &ImageRequest) -> ProviderCall {
    ProviderCall {
        endpoint: "/images/generations".to_string(),
        payload: RequestBody::Json(json!({
            "model": request.model.as_deref().unwrap_or(IMAGE_MODEL),
            "prompt": request.prompt,
            "n": request.count.unwrap_or(1),
            "size": request.size.as_deref().unwrap_or("1024x1024"),
        })),
        inputs: json!({ "prompt": request.prompt }),
        required: &["prompt"],
        headers: Vec::new(),
    }
}

pub(super) fn text(request: &TextRequest) -> ProviderCall {
    let mut messages = Vec::new();
    if let Some(system) = &request.system {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.push(json!({ "role": "user", "content": request.prompt }));

    let mut payload = json!({
        "model": request.model.as_deref().unwrap_or(TEXT_MODEL),
        "messages": messages,
    });
    if let Some(max_tokens) = request.max_tokens {
        payload["max_tokens"] = json!(max_tokens);
    }

    ProviderCall {
        endpoint: "/chat/completions".to_string(),
        payload: RequestBody::Json(payload),
        inputs: json!({ "prompt": request.prompt }),
        required: &["prompt"],
        headers: Vec::new(),
    }
}

pub(super) fn speech(request: &SpeechRequest) -> ProviderCall {
    ProviderCall {
        endpoint: "/audio/speech".to_string(),
        payload: RequestBody::Json(json!({
            "model": request.model.as_deref().unwrap_or(SPEECH_MODEL),
            "input": request.text,
            "voice": request.voice.as_deref().unwrap_or("alloy"),
        })),
        inputs: json!({ "text": request.text }),
        required: &["text"],
        headers: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_includes_system_message_first() {
        let call = text(&TextRequest {
            prompt: "summarize".into(),
            system: Some("be brief".into()),
            max_tokens: Some(64),
            ..Default::default()
        });
        let RequestBody::Json(payload) = &call.payload else {
            panic!("chat completions take a JSON body");
        };
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["content"], "summarize");
        assert_eq!(payload["max_tokens"], 64);
        assert_eq!(payload["model"], TEXT_MODEL);
    }
}
