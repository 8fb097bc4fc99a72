//! @ai:module:intent Request shaping for the Stability AI v2beta API
//! @ai:module:layer infrastructure
//! @ai:module:stateless true

use super::{Capability, ImageEditRequest, ImageRequest, ProviderCall};
use crate::request::{FormPart, RequestBody};
use serde_json::json;

const DEFAULT_STRENGTH: f32 = 0.6;

pub(super) fn unit_price(capability: Capability) -> Option<f64> {
    match capability {
        Capability::GenerateImage => Some(0.03),
        Capability::RemoveBackground => Some(0.02),
        Capability::TransformImage => Some(0.065),
        Capability::GenerateText | Capability::GenerateSpeech => None,
    }
}

/// Stability takes aspect ratios rather than pixel sizes
fn aspect_ratio(size: Option<&str>) -> &'static str {
    match size {
        Some("1792x1024") | Some("16:9") => "16:9",
        Some("1024x1792") | Some("9:16") => "9:16",
        Some("1536x1024") | Some("3:2") => "3:2",
        Some("1024x1536") | Some("2:3") => "2:3",
        _ => "1:1",
    }
}

/// @ai:intent Sniff the upload's type from its magic bytes; Stability accepts png, jpeg and webp
/// @ai:effects pure
fn image_type(bytes: &[u8]) -> (&'static str, &'static str) {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => ("image/png", "image.png"),
        [0xFF, 0xD8, ..] => ("image/jpeg", "image.jpg"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => {
            ("image/webp", "image.webp")
        }
        _ => ("application/octet-stream", "image"),
    }
}

fn image_part(bytes: &[u8]) -> FormPart {
    let (content_type, file_name) = image_type(bytes);
    FormPart::File {
        name: "image".to_string(),
        file_name: file_name.to_string(),
        content_type: content_type.to_string(),
        bytes: bytes.to_vec(),
    }
}

/// Base64 JSON back instead of raw image bytes
fn json_accept() -> Vec<(String, String)> {
    vec![("Accept".to_string(), "application/json".to_string())]
}

/// Validation view of an edit request; the image counts as present when it has bytes
fn edit_inputs(request: &ImageEditRequest) -> serde_json::Value {
    json!({
        "image": (!request.image.is_empty()).then_some("upload"),
        "prompt": request.prompt,
    })
}

pub(super) fn image(request: &ImageRequest) -> ProviderCall {
    ProviderCall {
        endpoint: "/v2beta/stable-image/generate/core".to_string(),
        payload: RequestBody::Form(vec![
            FormPart::text("prompt", request.prompt.as_str()),
            FormPart::text("aspect_ratio", aspect_ratio(request.size.as_deref())),
            FormPart::text("output_format", "png"),
        ]),
        inputs: json!({ "prompt": request.prompt }),
        required: &["prompt"],
        headers: json_accept(),
    }
}

pub(super) fn remove_background(request: &ImageEditRequest) -> ProviderCall {
    ProviderCall {
        endpoint: "/v2beta/stable-image/edit/remove-background".to_string(),
        payload: RequestBody::Form(vec![
            image_part(&request.image),
            FormPart::text("output_format", "png"),
        ]),
        inputs: edit_inputs(request),
        required: &["image"],
        headers: json_accept(),
    }
}

pub(super) fn transform(request: &ImageEditRequest) -> ProviderCall {
    let strength = request.strength.unwrap_or(DEFAULT_STRENGTH).clamp(0.0, 1.0);
    ProviderCall {
        endpoint: "/v2beta/stable-image/generate/sd3".to_string(),
        payload: RequestBody::Form(vec![
            FormPart::text("mode", "image-to-image"),
            image_part(&request.image),
            FormPart::text("prompt", request.prompt.clone().unwrap_or_default()),
            FormPart::text("strength", strength.to_string()),
            FormPart::text("output_format", "png"),
        ]),
        inputs: edit_inputs(request),
        required: &["image", "prompt"],
        headers: json_accept(),
    }
}
