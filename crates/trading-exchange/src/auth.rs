//! Request signing.
//!
//! Every private call carries an HS256 JWT. When the request has parameters,
//! the token also binds them through a SHA-512 hash of the url-encoded query.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use trading_core::error::ExchangeError;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const JWT_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Serialize)]
struct Claims<'a> {
    access_key: &'a str,
    nonce: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash_alg: Option<&'static str>,
}

/// API key pair.
#[derive(Clone)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// `Authorization` header value for a request with `query` parameters.
    pub fn authorization(&self, query: Option<&str>) -> Result<String, ExchangeError> {
        Ok(format!("Bearer {}", self.token(query)?))
    }

    fn token(&self, query: Option<&str>) -> Result<String, ExchangeError> {
        let query_hash = query.filter(|q| !q.is_empty()).map(|q| hex::encode(Sha512::digest(q)));
        let claims = Claims {
            access_key: &self.access_key,
            nonce: Uuid::new_v4().to_string(),
            query_hash_alg: query_hash.as_ref().map(|_| "SHA512"),
            query_hash,
        };
        let payload =
            serde_json::to_vec(&claims).map_err(|e| ExchangeError::Configuration(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(JWT_HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| ExchangeError::Configuration(e.to_string()))?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_json(part: &str) -> serde_json::Value {
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(part).unwrap()).unwrap()
    }

    #[test]
    fn test_token_binds_query() {
        let creds = Credentials::new("access", "secret");
        let token = creds.token(Some("market=KRW-BTC&side=bid")).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        assert_eq!(decode_json(parts[0])["alg"], "HS256");
        let claims = decode_json(parts[1]);
        assert_eq!(claims["access_key"], "access");
        assert_eq!(claims["query_hash_alg"], "SHA512");
        assert_eq!(
            claims["query_hash"],
            hex::encode(Sha512::digest("market=KRW-BTC&side=bid"))
        );

        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(format!("{}.{}", parts[0], parts[1]).as_bytes());
        mac.verify_slice(&URL_SAFE_NO_PAD.decode(parts[2]).unwrap())
            .unwrap();
    }

    #[test]
    fn test_token_without_query_has_no_hash() {
        let creds = Credentials::new("access", "secret");
        let token = creds.token(None).unwrap();
        let claims = decode_json(token.split('.').nth(1).unwrap());
        assert!(claims.get("query_hash").is_none());
        assert!(claims["nonce"].as_str().unwrap().len() >= 32);

        // Fresh nonce per request.
        assert_ne!(creds.token(None).unwrap(), token);
    }

    #[test]
    fn test_debug_hides_secret() {
        let creds = Credentials::new("access", "secret");
        assert!(!format!("{creds:?}").contains("secret\""));
    }
}
