//! # Access Tokens
//!
//! Page loads embed a token derived from the visitor's address; the contact
//! form and the stream history endpoint only answer callers that echo it back.
//!
//! The token is an HS256 JWT of `{"ip": <address>}` with no expiry, so the
//! same address always yields the same token and any holder can replay it.
//! Existing page scripts depend on that shape.

use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;

use crate::error::{AppError, Result};

#[derive(Serialize)]
struct Claims<'a> {
    ip: &'a str,
}

#[derive(Clone)]
pub struct AccessTokens {
    key: EncodingKey,
}

impl AccessTokens {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
        }
    }

    pub fn issue(&self, client: &str) -> Result<String> {
        encode(&Header::default(), &Claims { ip: client }, &self.key)
            .map_err(|e| AppError::Internal(format!("token encoding failed: {e}")))
    }

    /// A token is valid when re-issuing it for the same client yields it verbatim.
    pub fn verify(&self, token: &str, client: &str) -> bool {
        match self.issue(client) {
            Ok(expected) => !token.is_empty() && expected == token,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_client_same_token() {
        let tokens = AccessTokens::new(b"S");
        let a = tokens.issue("1.2.3.4").unwrap();
        let b = tokens.issue("1.2.3.4").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, tokens.issue("5.6.7.8").unwrap());
    }

    #[test]
    fn token_is_bound_to_the_secret() {
        let a = AccessTokens::new(b"first").issue("1.2.3.4").unwrap();
        let b = AccessTokens::new(b"second").issue("1.2.3.4").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_requires_an_exact_echo() {
        let tokens = AccessTokens::new(b"S");
        let token = tokens.issue("1.2.3.4").unwrap();

        assert!(tokens.verify(&token, "1.2.3.4"));
        assert!(!tokens.verify(&token, "5.6.7.8"));
        assert!(!tokens.verify(&format!("{token}x"), "1.2.3.4"));
        assert!(!tokens.verify("", "1.2.3.4"));
    }

    #[test]
    fn token_is_a_three_part_jwt() {
        let token = AccessTokens::new(b"S").issue("1.2.3.4").unwrap();
        assert_eq!(token.split('.').count(), 3);
    }
}
