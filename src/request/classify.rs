//! @ai:module:intent Map raw attempt outcomes onto the failure taxonomy
//! @ai:module:layer domain
//! @ai:module:public_api classify_response, classify_transport, timed_out, parse_retry_after, require_fields, MAX_RETRY_AFTER
//! @ai:module:stateless true

use crate::error::{ClassifiedError, ErrorKind, Result};
use crate::request::transport::{HttpResponse, TransportError};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Longest upstream wait hint honoured; larger hints are clamped to this
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// @ai:intent Classify a non-2xx response: 429, then 401/403, then everything else
/// @ai:pre !response.is_success()
/// @ai:effects pure
pub fn classify_response(provider: &str, response: &HttpResponse) -> ClassifiedError {
    let status = response.status;
    match status {
        429 => {
            let retry_after = response
                .header("retry-after")
                .and_then(|value| parse_retry_after(value, Utc::now()));
            ClassifiedError::new(ErrorKind::RateLimit, provider, "rate limit exceeded")
                .with_status(status)
                .with_retry_after(retry_after)
        }
        401 | 403 => ClassifiedError::new(
            ErrorKind::Auth,
            provider,
            format!("credentials rejected (HTTP {status})"),
        )
        .with_status(status),
        _ => {
            let body = parse_body(&response.body);
            let message = body
                .as_ref()
                .and_then(upstream_message)
                .unwrap_or_else(|| format!("request failed with HTTP {status}"));
            ClassifiedError::new(ErrorKind::Generic, provider, message)
                .with_status(status)
                .with_body(body)
        }
    }
}

/// @ai:intent Connection, DNS or TLS failure
/// @ai:effects pure
pub fn classify_transport(provider: &str, err: &TransportError) -> ClassifiedError {
    ClassifiedError::new(
        ErrorKind::Network,
        provider,
        format!("transport failure: {}", err.message),
    )
}

/// @ai:intent Attempt aborted because the configured timeout elapsed
/// @ai:effects pure
pub fn timed_out(provider: &str, timeout: Duration) -> ClassifiedError {
    ClassifiedError::new(
        ErrorKind::Network,
        provider,
        format!("request timed out after {}s", timeout.as_secs_f64()),
    )
}

/// @ai:intent Parse a Retry-After value: delta seconds or an HTTP date
/// @ai:post result <= MAX_RETRY_AFTER
/// @ai:effects pure
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<f64>() {
        if secs.is_nan() || secs < 0.0 {
            return None;
        }
        let hint = Duration::try_from_secs_f64(secs).unwrap_or(MAX_RETRY_AFTER);
        return Some(hint.min(MAX_RETRY_AFTER));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    let hint = (at - now).to_std().unwrap_or(Duration::ZERO);
    Some(hint.min(MAX_RETRY_AFTER))
}

/// @ai:intent Fail with VALIDATION_ERROR when any required payload field is absent or blank
/// @ai:effects pure
pub fn require_fields(
    provider: &str,
    payload: Option<&serde_json::Value>,
    required: &[String],
) -> Result<()> {
    let missing: Vec<String> = required
        .iter()
        .filter(|field| {
            let value = payload.and_then(|p| p.get(field.as_str()));
            match value {
                None | Some(serde_json::Value::Null) => true,
                Some(serde_json::Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            }
        })
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ClassifiedError::missing_fields(provider, missing))
    }
}

fn parse_body(body: &[u8]) -> Option<serde_json::Value> {
    if body.is_empty() {
        return None;
    }
    match serde_json::from_slice(body) {
        Ok(value) => Some(value),
        Err(_) => Some(serde_json::Value::String(
            String::from_utf8_lossy(body).into_owned(),
        )),
    }
}

/// Common upstream shapes: {"error": {"message": ..}}, {"error": ".."}, {"message": ..}
fn upstream_message(body: &serde_json::Value) -> Option<String> {
    let candidate = body
        .pointer("/error/message")
        .or_else(|| body.get("error"))
        .or_else(|| body.get("message"))
        .or_else(|| body.pointer("/detail/message"))?;
    candidate.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn response(status: u16, headers: &[(&str, &str)], body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_429_with_hint() {
        let err = classify_response("openai", &response(429, &[("retry-after", "7")], ""));
        assert_eq!(err.kind, ErrorKind::RateLimit);
        assert_eq!(err.details.retry_after, Some(Duration::from_secs(7)));
        assert_eq!(err.details.status, Some(429));
    }

    #[test]
    fn test_429_without_hint() {
        let err = classify_response("openai", &response(429, &[], ""));
        assert_eq!(err.kind, ErrorKind::RateLimit);
        assert_eq!(err.details.retry_after, None);
    }

    #[test]
    fn test_401_and_403_are_auth() {
        for status in [401, 403] {
            let err = classify_response("stability", &response(status, &[], "denied"));
            assert_eq!(err.kind, ErrorKind::Auth);
        }
    }

    #[test]
    fn test_other_status_is_generic_with_body() {
        let err = classify_response(
            "openai",
            &response(500, &[], r#"{"error":{"message":"server exploded"}}"#),
        );
        assert_eq!(err.kind, ErrorKind::Generic);
        assert_eq!(err.message, "server exploded");
        assert_eq!(err.details.status, Some(500));
        assert!(err.details.body.is_some());
    }

    #[test]
    fn test_non_json_body_kept_as_text() {
        let err = classify_response("openai", &response(502, &[], "Bad Gateway"));
        assert_eq!(
            err.details.body,
            Some(serde_json::Value::String("Bad Gateway".into()))
        );
        assert_eq!(err.message, "request failed with HTTP 502");
    }

    #[test]
    fn test_retry_after_http_date() {
        let now = DateTime::parse_from_rfc2822("Wed, 21 Oct 2015 07:28:00 GMT")
            .unwrap()
            .with_timezone(&Utc);
        let hint = parse_retry_after("Wed, 21 Oct 2015 07:28:30 GMT", now);
        assert_eq!(hint, Some(Duration::from_secs(30)));

        let past = parse_retry_after("Wed, 21 Oct 2015 07:27:00 GMT", now);
        assert_eq!(past, Some(Duration::ZERO));
    }

    #[test]
    fn test_huge_retry_after_is_clamped() {
        assert_eq!(parse_retry_after("1e20", Utc::now()), Some(MAX_RETRY_AFTER));
        assert_eq!(parse_retry_after("inf", Utc::now()), Some(MAX_RETRY_AFTER));
        assert_eq!(parse_retry_after("172800", Utc::now()), Some(MAX_RETRY_AFTER));

        let now = DateTime::parse_from_rfc2822("Wed, 21 Oct 2015 07:28:00 GMT")
            .unwrap()
            .with_timezone(&Utc);
        let far = parse_retry_after("Fri, 31 Dec 9999 23:59:59 GMT", now);
        assert_eq!(far, Some(MAX_RETRY_AFTER));
    }

    #[test]
    fn test_retry_after_garbage_is_no_hint() {
        assert_eq!(parse_retry_after("soon", Utc::now()), None);
        assert_eq!(parse_retry_after("-3", Utc::now()), None);
        assert_eq!(parse_retry_after("NaN", Utc::now()), None);
    }

    #[test]
    fn test_transport_and_timeout_are_network() {
        let err = classify_transport("openai", &TransportError::new("connection refused"));
        assert_eq!(err.kind, ErrorKind::Network);
        assert!(err.message.contains("connection refused"));

        let err = timed_out("openai", Duration::from_secs(60));
        assert_eq!(err.kind, ErrorKind::Network);
        assert!(err.message.contains("timed out"));
    }

    #[test]
    fn test_require_fields_reports_all_missing() {
        let payload = serde_json::json!({ "prompt": "  ", "size": "1024x1024", "n": null });
        let required = vec!["prompt".to_string(), "size".to_string(), "n".to_string(), "model".to_string()];
        let err = require_fields("openai", Some(&payload), &required).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(
            err.details.missing_fields,
            vec!["prompt".to_string(), "n".to_string(), "model".to_string()]
        );
    }

    #[test]
    fn test_require_fields_passes_when_present() {
        let payload = serde_json::json!({ "prompt": "a cat" });
        assert!(require_fields("openai", Some(&payload), &["prompt".to_string()]).is_ok());
        assert!(require_fields("openai", None, &[]).is_ok());
    }
}
