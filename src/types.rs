use std::time::Duration;

use reqwest::header::HeaderMap;
use serde_json::Value;

/// Decoded response body.
///
/// Downstream code matches on the variant instead of probing a dynamic
/// value: a body is JSON, plain text, or recorded as unparseable when the
/// content type claimed JSON but the payload was not.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
    Unparseable,
}

impl Body {
    /// Decodes a raw body using the response content type.
    ///
    /// A JSON content type with an invalid payload yields
    /// [`Body::Unparseable`] rather than an error, so observation never
    /// aborts the flow being observed.
    pub fn from_raw(content_type: Option<&str>, raw: &str) -> Self {
        let is_json = content_type
            .map(|value| value.to_ascii_lowercase().contains("json"))
            .unwrap_or(false);

        if is_json {
            match serde_json::from_str::<Value>(raw) {
                Ok(value) => Self::Json(value),
                Err(_) => Self::Unparseable,
            }
        } else {
            Self::Text(raw.to_owned())
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Textual rendering used by substring and pattern assertions.
    pub fn render(&self) -> String {
        match self {
            Self::Json(value) => value.to_string(),
            Self::Text(value) => value.clone(),
            Self::Unparseable => "<unparseable>".to_owned(),
        }
    }
}

/// Recorded outcome of a single HTTP call.
#[derive(Clone, Debug)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers; lookup through `HeaderMap` is case-insensitive.
    pub headers: HeaderMap,
    /// Decoded body.
    pub body: Body,
    /// Wall-clock duration of the attempt that produced this response.
    pub duration: Duration,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Types carrying an observable HTTP status code.
///
/// The retry executor uses this to decide whether a returned value is a
/// transient failure worth another attempt.
pub trait HasStatus {
    fn status_code(&self) -> u16;
}

impl HasStatus for ApiResponse {
    fn status_code(&self) -> u16 {
        self.status
    }
}

impl HasStatus for reqwest::Response {
    fn status_code(&self) -> u16 {
        self.status().as_u16()
    }
}
