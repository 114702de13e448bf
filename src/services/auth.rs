use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

/// Claims carried by client bearer tokens. `sub` is the user id.
#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

/// Verifies bearer tokens and resolves the caller's user id.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Resolve the caller from an `Authorization` header value.
    pub fn caller_from_header(&self, header: Option<&str>) -> Result<Uuid, AuthError> {
        let header = header.ok_or(AuthError::MissingToken)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::MissingToken)?;
        self.caller_from_token(token)
    }

    pub fn caller_from_token(&self, token: &str) -> Result<Uuid, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        data.claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidToken("subject is not a user id".to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid bearer token: {0}")]
    InvalidToken(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: usize,
    }

    fn token_for(secret: &str, sub: &str) -> String {
        let claims = TestClaims {
            sub: sub.to_string(),
            exp: 4102444800, // far future
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn resolves_caller_from_valid_token() {
        let verifier = TokenVerifier::new("test-secret");
        let user_id = Uuid::new_v4();
        let token = token_for("test-secret", &user_id.to_string());

        let caller = verifier
            .caller_from_header(Some(&format!("Bearer {token}")))
            .unwrap();
        assert_eq!(caller, user_id);
    }

    #[test]
    fn rejects_missing_header() {
        let verifier = TokenVerifier::new("test-secret");
        assert!(matches!(
            verifier.caller_from_header(None),
            Err(AuthError::MissingToken)
        ));
    }

    #[test]
    fn rejects_wrong_secret() {
        let verifier = TokenVerifier::new("test-secret");
        let token = token_for("other-secret", &Uuid::new_v4().to_string());
        assert!(matches!(
            verifier.caller_from_header(Some(&format!("Bearer {token}"))),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn rejects_non_uuid_subject() {
        let verifier = TokenVerifier::new("test-secret");
        let token = token_for("test-secret", "not-a-uuid");
        assert!(matches!(
            verifier.caller_from_token(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
