use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    access::Identity,
    error::{ErrorMessage, HttpError},
};

/// Claims issued by the identity provider. `sub` is the user id.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub email: String,
    pub iat: usize,
    pub exp: usize,
}

/// Verify signature and expiry, then turn the claims into an [`Identity`].
pub fn decode_token<T: Into<String>>(token: T, secret: &[u8]) -> Result<Identity, HttpError> {
    let decoded = decode::<TokenClaims>(
        &token.into(),
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256), // also rejects expired tokens
    )
    .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    let id = Uuid::parse_str(&decoded.claims.sub)
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    Ok(Identity {
        id,
        email: decoded.claims.email,
    })
}

/// Sign a token the way the identity provider does. Tests only.
#[cfg(test)]
pub fn create_token(
    user_id: Uuid,
    email: &str,
    secret: &[u8],
    expires_in_seconds: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{EncodingKey, Header, encode};

    let now = Utc::now();
    let claims = TokenClaims {
        sub: user_id.to_string(),
        email: email.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::seconds(expires_in_seconds)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn round_trips_identity() {
        let id = Uuid::new_v4();
        let token = create_token(id, "sam@example.com", SECRET, 60).expect("token");

        let identity = decode_token(token, SECRET).expect("valid token");

        assert_eq!(identity.id, id);
        assert_eq!(identity.email, "sam@example.com");
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = create_token(Uuid::new_v4(), "sam@example.com", SECRET, 60).expect("token");

        let err = decode_token(token, b"other-secret").expect_err("should reject");

        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, ErrorMessage::InvalidToken.to_string());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = create_token(Uuid::new_v4(), "sam@example.com", SECRET, -3600).expect("token");

        assert!(decode_token(token, SECRET).is_err());
    }
}
