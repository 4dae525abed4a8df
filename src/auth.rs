//! API token authentication
//!
//! Tokens are random strings handed out once by `zipcodes token issue`.
//! Only their blake3 hash is persisted. A request is authenticated when its
//! `Authorization: Bearer <token>` header hashes to an active row; the result
//! is an explicit [`Caller`] passed to the handler.

use rand::Rng;
use rand::distributions::Alphanumeric;
use crate::{Error, Result};
use crate::storage::{ApiToken, SqliteStore};

const TOKEN_PREFIX: &str = "zc_";
const TOKEN_LEN: usize = 40;

/// The verified identity behind an authenticated request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub token_id: i64,
    pub name: String,
}

/// A freshly issued token; `plain_text` is never shown again
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: ApiToken,
    pub plain_text: String,
}

pub fn hash_token(token: &str) -> String {
    blake3::hash(token.as_bytes()).to_hex().to_string()
}

fn generate_token() -> String {
    let body: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect();
    format!("{}{}", TOKEN_PREFIX, body)
}

/// Create and store a new token under `name`
pub fn issue_token(store: &SqliteStore, name: &str) -> Result<IssuedToken> {
    let plain_text = generate_token();
    let token = store.insert_token(name, &hash_token(&plain_text))?;
    tracing::info!(id = token.id, name = %token.name, "issued api token");
    Ok(IssuedToken { token, plain_text })
}

/// Extract the token from an `Authorization` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolve an `Authorization` header to a caller
pub fn authenticate(store: &SqliteStore, header: Option<&str>) -> Result<Caller> {
    let Some(token) = header.and_then(bearer_token) else {
        tracing::warn!("request without bearer token");
        return Err(Error::Unauthenticated);
    };
    let Some(api_token) = store.find_active_token(&hash_token(token))? else {
        tracing::warn!("request with unknown or revoked token");
        return Err(Error::Unauthenticated);
    };
    store.touch_token(api_token.id)?;
    Ok(Caller { token_id: api_token.id, name: api_token.name })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_token_authenticates() {
        let store = SqliteStore::open_in_memory().unwrap();
        let issued = issue_token(&store, "deploy").unwrap();
        assert!(issued.plain_text.starts_with(TOKEN_PREFIX));

        let header = format!("Bearer {}", issued.plain_text);
        let caller = authenticate(&store, Some(&header)).unwrap();
        assert_eq!(caller, Caller { token_id: issued.token.id, name: "deploy".into() });
        assert!(store.get_token(issued.token.id).unwrap().unwrap().last_used_at.is_some());
    }

    #[test]
    fn test_revoked_and_unknown_tokens_are_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let issued = issue_token(&store, "old").unwrap();
        store.revoke_token(issued.token.id).unwrap();

        let header = format!("Bearer {}", issued.plain_text);
        assert!(matches!(authenticate(&store, Some(&header)), Err(Error::Unauthenticated)));
        assert!(matches!(authenticate(&store, Some("Bearer nope")), Err(Error::Unauthenticated)));
        assert!(matches!(authenticate(&store, None), Err(Error::Unauthenticated)));
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer   abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }

    #[test]
    fn test_only_hash_is_stored() {
        let store = SqliteStore::open_in_memory().unwrap();
        let issued = issue_token(&store, "ci").unwrap();
        assert!(store.find_active_token(&issued.plain_text).unwrap().is_none());
        assert!(store.find_active_token(&hash_token(&issued.plain_text)).unwrap().is_some());
    }
}
