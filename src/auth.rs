use std::time::Duration;

use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::error_code::ErrorCode;

const ISSUER: &str = "vid-rs-access";

#[derive(Debug, serde::Deserialize, serde::Serialize)]
struct Claims {
    iss: String,
    sub: String,
    iat: u64,
    exp: u64,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum AuthError {
    #[error("Couldn't find a bearer token in the request")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("Token subject is not a user id")]
    InvalidSubject(#[source] uuid::Error),

    #[error("Failed to sign token")]
    Sign(#[source] jsonwebtoken::errors::Error),
}

impl AuthError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingToken => ErrorCode::MISSING_TOKEN,
            Self::InvalidToken(_) | Self::InvalidSubject(_) => ErrorCode::INVALID_TOKEN,
            Self::Sign(_) => ErrorCode::TOKEN_ERROR,
        }
    }

    pub(crate) const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Sign(_))
    }
}

/// Pull the credential out of an `Authorization: Bearer <token>` header
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MissingToken)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MissingToken);
    }

    let token = token.trim();

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }

    Ok(token)
}

/// Verify an HS256 access token and return the caller's id
pub(crate) fn validate_jwt(token: &str, secret: &str) -> Result<Uuid, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);
    validation.leeway = 0;

    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!("Token rejected: {e}");
        AuthError::InvalidToken(e)
    })?;

    Uuid::parse_str(&data.claims.sub).map_err(AuthError::InvalidSubject)
}

/// Issue an access token for `user_id`, valid for `expires_in`
pub(crate) fn make_jwt(
    user_id: Uuid,
    secret: &str,
    expires_in: Duration,
) -> Result<String, AuthError> {
    let now = time::OffsetDateTime::now_utc().unix_timestamp().max(0) as u64;

    let claims = Claims {
        iss: String::from(ISSUER),
        sub: user_id.to_string(),
        iat: now,
        exp: now.saturating_add(expires_in.as_secs()),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(AuthError::Sign)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use actix_web::http::header::{HeaderMap, HeaderValue, AUTHORIZATION};
    use uuid::Uuid;

    use super::{bearer_token, make_jwt, validate_jwt, AuthError};

    const SECRET: &str = "correct horse battery staple";

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(bearer_token(&headers("bearer abc.def")).unwrap(), "abc.def");
    }

    #[test]
    fn rejects_missing_or_malformed_header() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            bearer_token(&headers("Basic dXNlcjpwYXNz")),
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            bearer_token(&headers("Bearer ")),
            Err(AuthError::MissingToken)
        ));
        assert!(matches!(
            bearer_token(&headers("abc.def")),
            Err(AuthError::MissingToken)
        ));
    }

    #[test]
    fn token_round_trip_yields_user() {
        let user = Uuid::new_v4();
        let token = make_jwt(user, SECRET, Duration::from_secs(60)).unwrap();

        assert_eq!(validate_jwt(&token, SECRET).unwrap(), user);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = make_jwt(Uuid::new_v4(), SECRET, Duration::from_secs(60)).unwrap();

        let err = validate_jwt(&token, "another secret").unwrap_err();

        assert!(matches!(err, AuthError::InvalidToken(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = make_jwt(Uuid::new_v4(), SECRET, Duration::ZERO).unwrap();

        std::thread::sleep(Duration::from_millis(1100));

        assert!(matches!(
            validate_jwt(&token, SECRET),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn huge_lifetimes_saturate() {
        let user = Uuid::new_v4();
        let token = make_jwt(user, SECRET, Duration::from_secs(u64::MAX)).unwrap();

        assert_eq!(validate_jwt(&token, SECRET).unwrap(), user);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            validate_jwt("not-a-jwt", SECRET),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
