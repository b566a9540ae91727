use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub lichess_username: String,
    pub exp: i64,
}

pub fn create_token(
    user_id: i64,
    lichess_username: &str,
    secret: &str,
    expire_hours: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = Utc::now() + Duration::hours(expire_hours);
    let claims = Claims {
        user_id,
        lichess_username: lichess_username.to_string(),
        exp: expiration.timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let token = create_token(42, "someone", "secret", 1).unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.lichess_username, "someone");
    }

    #[test]
    fn test_wrong_secret_or_expired_token_rejected() {
        let token = create_token(42, "someone", "secret", 1).unwrap();
        assert!(verify_token(&token, "other").is_none());

        let expired = create_token(42, "someone", "secret", -2).unwrap();
        assert!(verify_token(&expired, "secret").is_none());
    }
}
