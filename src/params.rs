use std::time::{SystemTime, UNIX_EPOCH};

use crate::{HarnessError, Result};

/// Percent-encodes key/value pairs as `application/x-www-form-urlencoded`.
pub fn encode_form(pairs: &[(&str, &str)]) -> Result<String> {
    serde_urlencoded::to_string(pairs)
        .map_err(|err| HarnessError::Decode(format!("form encoding failed: {err}")))
}

/// Millisecond epoch timestamp used to build collision-free test data.
pub fn unique_suffix() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0)
}

/// `prefix_<suffix>`, unique per call within clock resolution.
pub fn unique_username(prefix: &str) -> String {
    format!("{prefix}_{}", unique_suffix())
}

/// `prefix+<suffix>@example.com`, unique per call within clock resolution.
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}+{}@example.com", unique_suffix())
}
