// Copyright (c) 2024-present, The Portico Authors.
//
// This program is free software: you can use, redistribute, and/or modify
// it under the terms of the GNU Affero General Public License, version 3
// or later ("AGPL"), as published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <http://www.gnu.org/licenses/>.

//! Credential check and token issue/verify.
//!
//! One configured identity, HS256 tokens with a bounded lifetime. There is
//! no authorization logic beyond "the token verifies": handlers only gate on
//! a valid bearer token.

use crate::config::PorticoConfig;
use crate::error::{PorticoError, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// The claims carried by an issued token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The authenticated identity.
    pub sub: String,
    /// Issue time, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

/// Checks the credentials and issues a signed token.
///
/// The comparison accumulates over every byte of both fields instead of
/// returning at the first mismatch, so a wrong id and a wrong password take
/// the same path.
pub fn login(config: &PorticoConfig, id: &str, password: &str) -> Result<String> {
    let id_ok = eq_no_short_circuit(id, &config.auth_id);
    let pw_ok = eq_no_short_circuit(password, &config.auth_password);
    if !(id_ok & pw_ok) {
        return Err(PorticoError::Unauthorized("Invalid credentials".to_string()));
    }

    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: id.to_string(),
        iat: now,
        exp: now + config.token_ttl_secs,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| PorticoError::Internal(format!("failed to sign token: {}", e)))
}

/// Verifies a token's signature and expiry and returns its claims.
pub fn verify(config: &PorticoConfig, token: &str) -> Result<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| PorticoError::Unauthenticated(e.to_string()))
}

/// Extracts the token from an `Authorization: Bearer {token}` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn eq_no_short_circuit(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let mut diff = a.len() ^ b.len();
    for i in 0..a.len().min(b.len()) {
        diff |= (a[i] ^ b[i]) as usize;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> PorticoConfig {
        PorticoConfig {
            region: "ap-northeast-2".to_string(),
            endpoint: None,
            bucket: "memory".to_string(),
            key_prefix: "uploads".to_string(),
            table: "portico-test".to_string(),
            topic_arn: String::new(),
            auth_id: "admin".to_string(),
            auth_password: "hunter2".to_string(),
            jwt_secret: "portico-test-secret".to_string(),
            token_ttl_secs: 3600,
        }
    }

    #[test]
    fn login_then_verify_round_trips() {
        let config = test_config();
        let token = login(&config, "admin", "hunter2").unwrap();
        let claims = verify(&config, &token).unwrap();
        assert_eq!("admin", claims.sub);
        assert_eq!(claims.iat + 3600, claims.exp);
    }

    #[test]
    fn wrong_credentials_are_unauthorized() {
        let config = test_config();
        assert!(matches!(
            login(&config, "admin", "wrong"),
            Err(PorticoError::Unauthorized(_))
        ));
        assert!(matches!(
            login(&config, "intruder", "hunter2"),
            Err(PorticoError::Unauthorized(_))
        ));
    }

    #[test]
    fn tampered_token_fails_verification() {
        let config = test_config();
        let mut other = test_config();
        other.jwt_secret = "some-other-secret".to_string();

        let token = login(&other, "admin", "hunter2").unwrap();
        assert!(matches!(
            verify(&config, &token),
            Err(PorticoError::Unauthenticated(_))
        ));
    }

    #[test]
    fn expired_token_fails_verification() {
        let mut config = test_config();
        // jsonwebtoken applies a 60s default leeway; go well past it.
        config.token_ttl_secs = -120;
        let token = login(&config, "admin", "hunter2").unwrap();
        assert!(matches!(
            verify(&config, &token),
            Err(PorticoError::Unauthenticated(_))
        ));
    }

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(Some("abc"), bearer_token("Bearer abc"));
        assert_eq!(None, bearer_token("Basic abc"));
        assert_eq!(None, bearer_token("Bearer "));
    }
}
