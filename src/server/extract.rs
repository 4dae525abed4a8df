use std::collections::HashMap;
use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::{header::{AUTHORIZATION, CONTENT_TYPE}, request::Parts},
    Form,
};
use serde_json::{Map, Value};
use crate::auth::{self, Caller};
use crate::server::SharedState;
use crate::validation::{Input, ValidationErrors};
use crate::Error;

/// Protected handlers take a `Caller`; a missing or invalid token rejects
/// the request with 401 before the body is read.
impl FromRequestParts<SharedState> for Caller {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let store = state.store.lock().await;
        auth::authenticate(&store, header)
    }
}

/// The `{id}` path segment. Anything that is not an integer cannot name a
/// row, so it is a 404 rather than a bad request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordId(pub i64);

impl<S: Send + Sync> FromRequestParts<S> for RecordId {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| Error::UnknownId(String::new()))?;
        raw.parse::<i64>().map(RecordId).map_err(|_| Error::UnknownId(raw))
    }
}

/// A write body, parsed eagerly but reported late.
///
/// Update handlers look up their target first, so a bad body on a missing
/// record is still a 404. JSON and form-encoded bodies are accepted; an empty
/// body is an empty input.
#[derive(Debug)]
pub struct RequestBody(Result<Input, ValidationErrors>);

impl RequestBody {
    pub fn into_input(self) -> Result<Input, ValidationErrors> {
        self.0
    }
}

impl<S: Send + Sync> FromRequest<S> for RequestBody {
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let parsed = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map(|Form(fields)| {
                    let fields: Map<String, Value> =
                        fields.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
                    Input::from(fields)
                })
                .map_err(|_| ValidationErrors::single("body", "The request body could not be read."));
            return Ok(Self(parsed));
        }

        let parsed = match Bytes::from_request(req, state).await {
            Ok(bytes) => parse_json(&bytes),
            Err(_) => Err(ValidationErrors::single("body", "The request body could not be read.")),
        };
        Ok(Self(parsed))
    }
}

fn parse_json(bytes: &[u8]) -> Result<Input, ValidationErrors> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Input::default());
    }
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|_| ValidationErrors::single("body", "The request body must be valid JSON."))?;
    Input::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_body_is_empty_input() {
        let input = parse_json(b"  \n").unwrap();
        assert!(!input.has("name"));
    }

    #[test]
    fn test_malformed_json_is_a_body_error() {
        let errors = parse_json(br#"{"name":"#).unwrap_err();
        assert_eq!(errors.messages("body"), ["The request body must be valid JSON."]);

        let errors = parse_json(b"[1, 2]").unwrap_err();
        assert!(errors.has("body"));
    }
}
