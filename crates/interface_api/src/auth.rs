//! Authentication and authorization
//!
//! Token issuance lives with the external auth collaborator; this module
//! only validates bearer tokens and reduces them to the opaque
//! [`Principal`] the handlers gate on. Token creation is kept for the
//! test suite and local tooling.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use core_kernel::{Principal, Role, UserId};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// The caller's role
    pub role: String,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Unrecognized principal: {0}")]
    InvalidPrincipal(String),
}

/// Creates a JWT for a user and role
pub fn create_token(
    user: UserId,
    role: Role,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: user.as_uuid().to_string(),
        role: role.as_str().to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT and returns its claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        if matches!(
            e.kind(),
            jsonwebtoken::errors::ErrorKind::ExpiredSignature
        ) {
            AuthError::TokenExpired
        } else {
            AuthError::InvalidToken
        }
    })?;

    Ok(token_data.claims)
}

/// Reduces validated claims to the principal the handlers consume
pub fn principal_from_claims(claims: &Claims) -> Result<Principal, AuthError> {
    let user: UserId = claims
        .sub
        .parse()
        .map_err(|_| AuthError::InvalidPrincipal(claims.sub.clone()))?;
    let role: Role = claims
        .role
        .parse()
        .map_err(|_| AuthError::InvalidPrincipal(claims.role.clone()))?;
    Ok(Principal::new(user, role))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let user = UserId::new();
        let token = create_token(user, Role::Accountant, "secret", 60).unwrap();
        let claims = validate_token(&token, "secret").unwrap();
        let principal = principal_from_claims(&claims).unwrap();

        assert_eq!(principal.user, user);
        assert_eq!(principal.role, Role::Accountant);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token(UserId::new(), Role::Staff, "secret", 60).unwrap();
        assert!(matches!(
            validate_token(&token, "other"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn garbage_role_is_rejected() {
        let claims = Claims {
            sub: UserId::new().as_uuid().to_string(),
            role: "janitor".to_string(),
            exp: 0,
            iat: 0,
        };
        assert!(principal_from_claims(&claims).is_err());
    }
}
