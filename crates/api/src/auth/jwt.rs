//! JWT validation for the Bearer tokens issued by the external identity
//! system.
//!
//! There are no login or refresh endpoints here; authentication is
//! out of scope for this service. The platform's identity system signs
//! tokens with a shared secret and this module only verifies them and
//! extracts the stable user id.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use minimuse_core::types::DbId;
use serde::{Deserialize, Serialize};

/// JWT configuration shared with the identity system.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC secret for HS256 verification.
    pub secret: String,
}

impl JwtConfig {
    /// Load from the `JWT_SECRET` env var.
    ///
    /// Panics when unset: a missing secret would make every token
    /// verifiable with an empty key, which must fail fast instead.
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").expect("JWT_SECRET must be set");
        Self { secret }
    }
}

/// Claims carried by a platform access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The user's stable id in the external identity system.
    pub sub: DbId,
    /// Expiry as a Unix timestamp.
    pub exp: i64,
}

/// Verify a token's signature and expiry, returning its claims.
pub fn validate_token(token: &str, config: &JwtConfig) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Sign a token for `user_id`, valid for one hour.
///
/// Production tokens come from the identity system; this exists for
/// integration tests and operational tooling.
pub fn create_token(user_id: DbId, config: &JwtConfig) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: user_id,
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".into(),
        }
    }

    #[test]
    fn round_trip_preserves_subject() {
        let config = test_config();
        let token = create_token(42, &config).unwrap();
        let claims = validate_token(&token, &config).unwrap();
        assert_eq!(claims.sub, 42);
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = create_token(42, &test_config()).unwrap();
        let other = JwtConfig {
            secret: "different-secret".into(),
        };
        assert!(validate_token(&token, &other).is_err());
    }

    #[test]
    fn garbage_token_rejected() {
        assert!(validate_token("not-a-jwt", &test_config()).is_err());
    }
}
