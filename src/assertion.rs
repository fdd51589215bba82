use regex::Regex;

use crate::{ApiResponse, HarnessError, Result};

/// Expectation applied to a response header.
#[derive(Clone, Debug)]
pub enum HeaderExpectation {
    /// Header must exist; any value accepted.
    Present,
    /// Header value must equal the string exactly.
    Equals(String),
    /// Header value must match the pattern.
    Matches(Regex),
}

fn fail(message: String) -> HarnessError {
    HarnessError::Assertion(message)
}

/// Fails unless the response status equals `expected`.
pub fn assert_status(response: &ApiResponse, expected: u16) -> Result<()> {
    if response.status == expected {
        Ok(())
    } else {
        Err(fail(format!(
            "expected status {expected}, got {}",
            response.status
        )))
    }
}

/// Fails unless the named header is present and matches the expectation.
///
/// Lookup is case-insensitive per `HeaderMap` semantics.
pub fn assert_header(
    response: &ApiResponse,
    name: &str,
    expectation: &HeaderExpectation,
) -> Result<()> {
    let Some(value) = response.headers.get(name) else {
        return Err(fail(format!("expected header '{name}' to be present")));
    };
    let actual = value.to_str().unwrap_or("<non-ascii>");

    match expectation {
        HeaderExpectation::Present => Ok(()),
        HeaderExpectation::Equals(expected) => {
            if actual == expected {
                Ok(())
            } else {
                Err(fail(format!(
                    "expected header '{name}' to equal '{expected}', got '{actual}'"
                )))
            }
        }
        HeaderExpectation::Matches(pattern) => {
            if pattern.is_match(actual) {
                Ok(())
            } else {
                Err(fail(format!(
                    "expected header '{name}' to match /{pattern}/, got '{actual}'"
                )))
            }
        }
    }
}

/// Fails unless the body's textual rendering contains `needle`.
pub fn assert_body_contains(response: &ApiResponse, needle: &str) -> Result<()> {
    let rendered = response.body.render();
    if rendered.contains(needle) {
        Ok(())
    } else {
        Err(fail(format!(
            "expected body to contain '{needle}'; body was: {rendered}"
        )))
    }
}

/// Fails unless the body's textual rendering matches `pattern`.
pub fn assert_body_matches(response: &ApiResponse, pattern: &Regex) -> Result<()> {
    let rendered = response.body.render();
    if pattern.is_match(&rendered) {
        Ok(())
    } else {
        Err(fail(format!(
            "expected body to match /{pattern}/; body was: {rendered}"
        )))
    }
}

/// Fails unless the body is a JSON array, optionally of the given length.
pub fn assert_body_is_array(response: &ApiResponse, expected_len: Option<usize>) -> Result<()> {
    let array = response
        .body
        .as_json()
        .and_then(|value| value.as_array())
        .ok_or_else(|| fail("expected body to be a JSON array".to_owned()))?;

    match expected_len {
        Some(expected) if array.len() != expected => Err(fail(format!(
            "expected array of {expected} items, got {}",
            array.len()
        ))),
        _ => Ok(()),
    }
}

/// Fails unless both responses carry the same status and deep-equal bodies.
pub fn validate_idempotency(first: &ApiResponse, second: &ApiResponse) -> Result<()> {
    if first.status != second.status {
        return Err(fail(format!(
            "idempotency violated: status {} vs {}",
            first.status, second.status
        )));
    }
    if first.body != second.body {
        return Err(fail(format!(
            "idempotency violated: bodies differ: {} vs {}",
            first.body.render(),
            second.body.render()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use regex::Regex;
    use reqwest::header::HeaderMap;
    use serde_json::json;

    use super::{
        assert_body_contains, assert_body_is_array, assert_body_matches, assert_header,
        assert_status, validate_idempotency, HeaderExpectation,
    };
    use crate::{ApiResponse, Body, HarnessError};

    fn response(status: u16, body: Body) -> ApiResponse {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", "application/json".parse().expect("valid header"));
        ApiResponse {
            status,
            headers,
            body,
            duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn status_mismatch_names_both_values() {
        let err = assert_status(&response(404, Body::Text(String::new())), 200)
            .expect_err("404 is not 200");
        let message = err.to_string();
        assert!(message.contains("expected status 200"));
        assert!(message.contains("404"));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = response(200, Body::Text(String::new()));
        assert_header(&response, "content-type", &HeaderExpectation::Present)
            .expect("lowercase lookup finds the header");
        assert_header(
            &response,
            "CONTENT-TYPE",
            &HeaderExpectation::Equals("application/json".to_owned()),
        )
        .expect("uppercase lookup finds the header");
    }

    #[test]
    fn header_pattern_expectation() {
        let response = response(200, Body::Text(String::new()));
        let pattern = Regex::new(r"^application/").expect("valid pattern");
        assert_header(&response, "content-type", &HeaderExpectation::Matches(pattern))
            .expect("prefix pattern matches");

        let err = assert_header(&response, "x-request-id", &HeaderExpectation::Present)
            .expect_err("absent header fails");
        assert!(matches!(err, HarnessError::Assertion(_)));
    }

    #[test]
    fn body_contains_and_matches() {
        let response = response(200, Body::Json(json!({"name": "Blue Top"})));
        assert_body_contains(&response, "Blue Top").expect("substring present");
        assert_body_matches(&response, &Regex::new("Blue (Top|Dress)").expect("valid pattern"))
            .expect("pattern matches");

        let err = assert_body_contains(&response, "Winter Coat").expect_err("absent substring");
        assert!(err.to_string().contains("Winter Coat"));
    }

    #[test]
    fn array_length_only_checked_when_supplied() {
        let response = response(200, Body::Json(json!([1, 2, 3])));
        assert_body_is_array(&response, None).expect("any length accepted");
        assert_body_is_array(&response, Some(3)).expect("exact length accepted");

        let err = assert_body_is_array(&response, Some(5)).expect_err("wrong length");
        assert!(err.to_string().contains("expected array of 5 items, got 3"));
    }

    #[test]
    fn idempotency_requires_equal_status_and_body() {
        let first = response(200, Body::Json(json!({"id": 1})));
        let same = response(200, Body::Json(json!({"id": 1})));
        let other_body = response(200, Body::Json(json!({"id": 2})));
        let other_status = response(201, Body::Json(json!({"id": 1})));

        validate_idempotency(&first, &same).expect("identical responses pass");
        assert!(validate_idempotency(&first, &other_body).is_err());
        assert!(validate_idempotency(&first, &other_status).is_err());
    }
}
