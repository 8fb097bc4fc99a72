//! @ai:module:intent HTTP transport seam between the executor and the network
//! @ai:module:layer infrastructure
//! @ai:module:public_api HttpTransport, ReqwestTransport, HttpRequest, RequestBody, FormPart, HttpResponse, TransportError
//! @ai:module:stateless true

use reqwest::Method;
use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;

/// @ai:intent One outgoing request, fully resolved
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

/// @ai:intent Outgoing payload encoding
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    /// `multipart/form-data`, rebuilt from its parts on every send
    Form(Vec<FormPart>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormPart::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FormPart::Text { name, .. } | FormPart::File { name, .. } => name,
        }
    }
}

impl RequestBody {
    /// @ai:intent Field view used for required-field checks; empty files and blank texts read as absent
    /// @ai:effects pure
    pub fn fields(&self) -> serde_json::Value {
        match self {
            RequestBody::Json(value) => value.clone(),
            RequestBody::Form(parts) => {
                let fields = parts
                    .iter()
                    .map(|part| {
                        let value = match part {
                            FormPart::Text { value, .. } => serde_json::Value::String(value.clone()),
                            FormPart::File { bytes, .. } if bytes.is_empty() => serde_json::Value::Null,
                            FormPart::File { file_name, .. } => {
                                serde_json::Value::String(file_name.clone())
                            }
                        };
                        (part.name().to_string(), value)
                    })
                    .collect();
                serde_json::Value::Object(fields)
            }
        }
    }
}

/// @ai:intent Raw response as received; header names are lowercased
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// @ai:intent Low-level failure before any HTTP status was received
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// @ai:intent Trait for sending one HTTP request
pub trait HttpTransport: Send + Sync {
    /// @ai:intent Send the request and collect the full response body
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// @ai:intent Transport backed by a shared reqwest client
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// @ai:intent Create a transport with a default reqwest client
    /// @ai:effects pure
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    /// @ai:intent Issue the request over the network
    /// @ai:effects network
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        match request.body {
            Some(RequestBody::Json(body)) => builder = builder.json(&body),
            Some(RequestBody::Form(parts)) => builder = builder.multipart(multipart(parts)?),
            None => {}
        }

        let response = builder.send().await.map_err(describe)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(describe)?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn multipart(parts: Vec<FormPart>) -> Result<reqwest::multipart::Form, TransportError> {
    let mut form = reqwest::multipart::Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name, value),
            FormPart::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                let file = reqwest::multipart::Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(&content_type)
                    .map_err(describe)?;
                form.part(name, file)
            }
        };
    }
    Ok(form)
}

/// @ai:intent Flatten a reqwest error and its sources into one message
/// @ai:effects pure
fn describe(err: reqwest::Error) -> TransportError {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    TransportError::new(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("retry-after".to_string(), "5".to_string());
        let response = HttpResponse {
            status: 429,
            headers,
            body: Vec::new(),
        };
        assert_eq!(response.header("Retry-After"), Some("5"));
        assert!(!response.is_success());
    }

    #[test]
    fn test_form_with_bad_content_type_is_transport_error() {
        let parts = vec![
            FormPart::text("prompt", "a fox"),
            FormPart::File {
                name: "image".into(),
                file_name: "in.png".into(),
                content_type: "not a mime type".into(),
                bytes: vec![1, 2, 3],
            },
        ];
        assert!(multipart(parts).is_err());
    }

    #[test]
    fn test_form_fields_view() {
        let body = RequestBody::Form(vec![
            FormPart::text("prompt", "a fox"),
            FormPart::File {
                name: "image".into(),
                file_name: "in.png".into(),
                content_type: "image/png".into(),
                bytes: Vec::new(),
            },
        ]);
        assert_eq!(
            body.fields(),
            serde_json::json!({ "prompt": "a fox", "image": null })
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let transport = ReqwestTransport::new();
        let request = HttpRequest {
            method: Method::GET,
            url: "http://127.0.0.1:1/unreachable".to_string(),
            headers: Vec::new(),
            body: None,
        };
        let err = transport.send(request).await.unwrap_err();
        assert!(!err.message.is_empty());
    }
}
