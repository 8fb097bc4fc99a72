//! @ai:module:intent Closed set of provider variants behind one capability interface
//! @ai:module:layer application
//! @ai:module:public_api ProviderKind, Capability, ProviderClient, ImageRequest, TextRequest, SpeechRequest, ImageEditRequest, CostEstimate
//! @ai:module:stateless true

mod elevenlabs;
mod openai;
mod stability;

use crate::error::{ClassifiedError, ErrorKind, Result};
use crate::request::classify;
use crate::request::{
    AuthScheme, ExecuteOptions, HttpTransport, RequestBody, RequestExecutor, ReqwestTransport,
    ResponseBody, DEFAULT_MAX_RETRIES,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// @ai:intent Upstream AI service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Stability,
    ElevenLabs,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::OpenAi,
        ProviderKind::Stability,
        ProviderKind::ElevenLabs,
    ];

    /// @ai:intent Short key used for scheduling and error attribution
    /// @ai:effects pure
    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Stability => "stability",
            ProviderKind::ElevenLabs => "elevenlabs",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Stability => "https://api.stability.ai",
            ProviderKind::ElevenLabs => "https://api.elevenlabs.io",
        }
    }

    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Stability => "STABILITY_API_KEY",
            ProviderKind::ElevenLabs => "ELEVENLABS_API_KEY",
        }
    }

    pub fn auth_scheme(&self) -> AuthScheme {
        match self {
            ProviderKind::ElevenLabs => AuthScheme::Header("xi-api-key".to_string()),
            ProviderKind::OpenAi | ProviderKind::Stability => AuthScheme::Bearer,
        }
    }

    /// @ai:intent Per-unit USD price, None when the capability is not offered
    /// @ai:effects pure
    pub fn unit_price(&self, capability: Capability) -> Option<f64> {
        match self {
            ProviderKind::OpenAi => openai::unit_price(capability),
            ProviderKind::Stability => stability::unit_price(capability),
            ProviderKind::ElevenLabs => elevenlabs::unit_price(capability),
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.unit_price(capability).is_some()
    }

    /// @ai:intent Price a capability call without contacting the provider
    /// @ai:effects pure
    pub fn estimate_cost(&self, capability: Capability, units: u32) -> Result<CostEstimate> {
        let price = self
            .unit_price(capability)
            .ok_or_else(|| ClassifiedError::unsupported(self.id(), capability.as_str()))?;

        Ok(CostEstimate {
            provider: *self,
            capability,
            units,
            unit: capability.unit().to_string(),
            usd: price * f64::from(units),
        })
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ProviderKind {
    type Err = ClassifiedError;

    fn from_str(s: &str) -> Result<Self> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                ClassifiedError::new(ErrorKind::Validation, s, format!("unknown provider: {s}"))
            })
    }
}

/// @ai:intent Operations a provider may offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    GenerateImage,
    GenerateText,
    GenerateSpeech,
    RemoveBackground,
    TransformImage,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::GenerateImage => "generate_image",
            Capability::GenerateText => "generate_text",
            Capability::GenerateSpeech => "generate_speech",
            Capability::RemoveBackground => "remove_background",
            Capability::TransformImage => "transform_image",
        }
    }

    /// @ai:intent What one billing unit of this capability means
    /// @ai:effects pure
    pub fn unit(&self) -> &'static str {
        match self {
            Capability::GenerateImage | Capability::RemoveBackground | Capability::TransformImage => {
                "image"
            }
            Capability::GenerateText => "1k tokens",
            Capability::GenerateSpeech => "1k characters",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    pub model: Option<String>,
    /// e.g. "1024x1024"; providers using aspect ratios map common sizes
    pub size: Option<String>,
    pub count: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: Option<String>,
    pub model: Option<String>,
}

/// @ai:intent Input for image-to-image operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageEditRequest {
    /// Encoded source image (png, jpeg or webp)
    pub image: Vec<u8>,
    pub prompt: Option<String>,
    pub strength: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub provider: ProviderKind,
    pub capability: Capability,
    pub units: u32,
    pub unit: String,
    pub usd: f64,
}

/// Provider-shaped request, ready for the executor
#[derive(Debug, Clone)]
struct ProviderCall {
    endpoint: String,
    payload: RequestBody,
    /// Caller inputs checked for presence before any network call
    inputs: serde_json::Value,
    required: &'static [&'static str],
    headers: Vec<(String, String)>,
}

/// @ai:intent Uniform capability client for one provider
#[derive(Debug, Clone)]
pub struct ProviderClient<T = ReqwestTransport> {
    kind: ProviderKind,
    executor: RequestExecutor<T>,
    max_retries: u32,
}

impl<T: HttpTransport> ProviderClient<T> {
    /// @ai:intent Bind a provider variant to an executor
    /// @ai:effects pure
    pub fn new(kind: ProviderKind, executor: RequestExecutor<T>) -> Self {
        Self {
            kind,
            executor,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// @ai:effects network
    pub async fn generate_image(&self, request: &ImageRequest) -> Result<ResponseBody> {
        let call = match self.kind {
            ProviderKind::OpenAi => openai::image(request),
            ProviderKind::Stability => stability::image(request),
            ProviderKind::ElevenLabs => return Err(self.unsupported(Capability::GenerateImage)),
        };
        self.send(call).await
    }

    /// @ai:effects network
    pub async fn generate_text(&self, request: &TextRequest) -> Result<ResponseBody> {
        let call = match self.kind {
            ProviderKind::OpenAi => openai::text(request),
            ProviderKind::Stability | ProviderKind::ElevenLabs => {
                return Err(self.unsupported(Capability::GenerateText))
            }
        };
        self.send(call).await
    }

    /// @ai:effects network
    pub async fn generate_speech(&self, request: &SpeechRequest) -> Result<ResponseBody> {
        let call = match self.kind {
            ProviderKind::OpenAi => openai::speech(request),
            ProviderKind::ElevenLabs => elevenlabs::speech(request),
            ProviderKind::Stability => return Err(self.unsupported(Capability::GenerateSpeech)),
        };
        self.send(call).await
    }

    /// @ai:effects network
    pub async fn remove_background(&self, request: &ImageEditRequest) -> Result<ResponseBody> {
        let call = match self.kind {
            ProviderKind::Stability => stability::remove_background(request),
            ProviderKind::OpenAi | ProviderKind::ElevenLabs => {
                return Err(self.unsupported(Capability::RemoveBackground))
            }
        };
        self.send(call).await
    }

    /// @ai:effects network
    pub async fn transform_image(&self, request: &ImageEditRequest) -> Result<ResponseBody> {
        let call = match self.kind {
            ProviderKind::Stability => stability::transform(request),
            ProviderKind::OpenAi | ProviderKind::ElevenLabs => {
                return Err(self.unsupported(Capability::TransformImage))
            }
        };
        self.send(call).await
    }

    /// @ai:effects pure
    pub fn estimate_cost(&self, capability: Capability, units: u32) -> Result<CostEstimate> {
        self.kind.estimate_cost(capability, units)
    }

    fn unsupported(&self, capability: Capability) -> ClassifiedError {
        ClassifiedError::unsupported(self.kind.id(), capability.as_str())
    }

    async fn send(&self, call: ProviderCall) -> Result<ResponseBody> {
        let required: Vec<String> = call.required.iter().map(|f| f.to_string()).collect();
        classify::require_fields(self.kind.id(), Some(&call.inputs), &required)?;

        let mut options = ExecuteOptions::default().max_retries(self.max_retries);
        for (name, value) in call.headers {
            options = options.header(name, value);
        }

        self.executor
            .send(&call.endpoint, Some(&call.payload), &options)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::executor::tests::{Reply, ScriptedTransport};
    use crate::request::CallConfig;
    use pretty_assertions::assert_eq;

    fn client(kind: ProviderKind, replies: Vec<Reply>) -> (ProviderClient<ScriptedTransport>, ScriptedTransport) {
        let transport = ScriptedTransport::new(replies);
        let config = CallConfig::new(kind.id(), "key", kind.default_base_url()).with_auth(kind.auth_scheme());
        let executor = RequestExecutor::with_transport(config, transport.clone());
        (ProviderClient::new(kind, executor), transport)
    }

    fn ok_json() -> Reply {
        Reply::Status(200, vec![("content-type", "application/json")], r#"{"data":[]}"#)
    }

    #[test]
    fn test_provider_ids_round_trip() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.id().parse::<ProviderKind>().unwrap(), kind);
        }
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert!("midjourney".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_capability_matrix() {
        use Capability::*;
        assert!(ProviderKind::OpenAi.supports(GenerateImage));
        assert!(ProviderKind::OpenAi.supports(GenerateText));
        assert!(ProviderKind::OpenAi.supports(GenerateSpeech));
        assert!(!ProviderKind::OpenAi.supports(RemoveBackground));
        assert!(ProviderKind::Stability.supports(RemoveBackground));
        assert!(ProviderKind::Stability.supports(TransformImage));
        assert!(!ProviderKind::Stability.supports(GenerateSpeech));
        assert!(ProviderKind::ElevenLabs.supports(GenerateSpeech));
        assert!(!ProviderKind::ElevenLabs.supports(GenerateImage));
    }

    #[tokio::test]
    async fn test_unsupported_operation_is_generic_without_network() {
        let (client, transport) = client(ProviderKind::ElevenLabs, vec![ok_json()]);
        let err = client
            .generate_image(&ImageRequest {
                prompt: "a fox".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Generic);
        assert_eq!(err.details.operation.as_deref(), Some("generate_image"));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_prompt_is_validation_error() {
        let (client, transport) = client(ProviderKind::OpenAi, vec![ok_json()]);
        let err = client
            .generate_text(&TextRequest::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.details.missing_fields, vec!["prompt".to_string()]);
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_openai_image_payload() {
        let (client, transport) = client(ProviderKind::OpenAi, vec![ok_json()]);
        client
            .generate_image(&ImageRequest {
                prompt: "a fox".into(),
                count: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].url, "https://api.openai.com/v1/images/generations");
        let Some(RequestBody::Json(body)) = &seen[0].body else {
            panic!("expected a JSON body");
        };
        assert_eq!(body["prompt"], "a fox");
        assert_eq!(body["n"], 2);
        assert_eq!(body["size"], "1024x1024");
    }

    #[tokio::test]
    async fn test_elevenlabs_speech_uses_key_header() {
        let (client, transport) = client(
            ProviderKind::ElevenLabs,
            vec![Reply::Status(200, vec![("content-type", "audio/mpeg")], "ID3")],
        );
        let body = client
            .generate_speech(&SpeechRequest {
                text: "hello".into(),
                voice: Some("rachel".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(matches!(body, ResponseBody::Binary { .. }));
        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].url, "https://api.elevenlabs.io/v1/text-to-speech/rachel");
        assert!(seen[0]
            .headers
            .contains(&("xi-api-key".to_string(), "key".to_string())));
    }

    #[tokio::test]
    async fn test_transform_requires_image_and_prompt() {
        let (client, _) = client(ProviderKind::Stability, vec![ok_json()]);
        let err = client
            .transform_image(&ImageEditRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.details.missing_fields, vec!["image".to_string(), "prompt".to_string()]);
    }

    #[tokio::test]
    async fn test_stability_remove_background_sends_multipart_upload() {
        use crate::request::FormPart;

        let (client, transport) = client(ProviderKind::Stability, vec![ok_json()]);
        let png = vec![0x89, b'P', b'N', b'G', 0, 0];
        client
            .remove_background(&ImageEditRequest {
                image: png.clone(),
                ..Default::default()
            })
            .await
            .unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(
            seen[0].url,
            "https://api.stability.ai/v2beta/stable-image/edit/remove-background"
        );
        assert!(seen[0]
            .headers
            .contains(&("Accept".to_string(), "application/json".to_string())));
        let Some(RequestBody::Form(parts)) = &seen[0].body else {
            panic!("expected a multipart body");
        };
        assert!(parts.contains(&FormPart::File {
            name: "image".into(),
            file_name: "image.png".into(),
            content_type: "image/png".into(),
            bytes: png,
        }));
    }

    #[test]
    fn test_estimate_cost() {
        let (client, _) = client(ProviderKind::OpenAi, vec![]);
        let estimate = client.estimate_cost(Capability::GenerateImage, 3).unwrap();
        assert!((estimate.usd - 0.12).abs() < 1e-9);
        assert_eq!(estimate.unit, "image");

        let err = client.estimate_cost(Capability::RemoveBackground, 1).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Generic);
    }
}
