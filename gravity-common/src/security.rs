//! Password hashing and signed-token helpers.
//!
//! Hashing is delegated to `bcrypt` and token signing to `jsonwebtoken`.
//! Tokens are stateless: validity depends only on signature and expiry at
//! decode time. Revocation has to be layered on by the caller.

use crate::error::{GravityError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use std::env;
use std::str::FromStr;

/// Decoded or to-be-encoded token claims.
pub type Claims = Map<String, Value>;

/// Claim holding the token type.
pub const TOKEN_TYPE_CLAIM: &str = "type";

/// Token type set on refresh tokens.
pub const REFRESH_TOKEN_TYPE: &str = "refresh";

/// Default access token lifetime in minutes.
pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 30;

/// Default refresh token lifetime in days.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// Longest password bcrypt hashes without truncation.
pub const MAX_PASSWORD_BYTES: usize = 72;

fn check_password_length(password: &str) -> Result<()> {
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(GravityError::validation(format!(
            "Password must be at most {MAX_PASSWORD_BYTES} bytes, got {}",
            password.len()
        )));
    }
    Ok(())
}

/// Hash a password with bcrypt and a random salt.
///
/// # Errors
///
/// Returns a validation error for passwords longer than 72 bytes, or a bad
/// request error if bcrypt rejects the input.
pub fn hash_password(password: &str) -> Result<String> {
    hash_password_with_cost(password, bcrypt::DEFAULT_COST)
}

/// Hash a password with an explicit bcrypt cost (4..=31).
///
/// # Errors
///
/// Returns a validation error for passwords longer than 72 bytes, or a bad
/// request error for an out-of-range cost.
pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String> {
    check_password_length(password)?;
    Ok(bcrypt::hash(password, cost)?)
}

/// Verify a plain password against a bcrypt hash.
///
/// # Errors
///
/// Returns a validation error for passwords longer than 72 bytes, or a bad
/// request error if `hashed` is not a valid bcrypt hash. A well-formed hash
/// that does not match yields `Ok(false)`.
pub fn verify_password(plain: &str, hashed: &str) -> Result<bool> {
    check_password_length(plain)?;
    Ok(bcrypt::verify(plain, hashed)?)
}

/// Signing key for `algorithm`.
///
/// HMAC algorithms use `key` as a shared secret; RSA, ECDSA and EdDSA
/// algorithms expect a PEM-encoded private key.
fn encoding_key(algorithm: Algorithm, key: &str) -> Result<EncodingKey> {
    let pem = key.as_bytes();
    let parsed = match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            return Ok(EncodingKey::from_secret(pem));
        }
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => EncodingKey::from_rsa_pem(pem),
        Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(pem),
        Algorithm::EdDSA => EncodingKey::from_ed_pem(pem),
    };
    parsed.map_err(|e| GravityError::bad_request(format!("Invalid {algorithm:?} signing key: {e}")))
}

/// Verification key for `algorithm`.
///
/// HMAC algorithms use `key` as a shared secret; the others expect a
/// PEM-encoded public key.
fn decoding_key(algorithm: Algorithm, key: &str) -> Result<DecodingKey> {
    let pem = key.as_bytes();
    let parsed = match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            return Ok(DecodingKey::from_secret(pem));
        }
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => DecodingKey::from_rsa_pem(pem),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(pem),
    };
    parsed.map_err(|e| {
        GravityError::bad_request(format!("Invalid {algorithm:?} verification key: {e}"))
    })
}

fn encode_with_expiry(
    claims: &Claims,
    secret: &str,
    algorithm: Algorithm,
    ttl: Duration,
    token_type: Option<&str>,
) -> Result<String> {
    let key = encoding_key(algorithm, secret)?;

    let now = Utc::now();
    let mut to_encode = claims.clone();
    to_encode.insert("exp".to_string(), Value::from((now + ttl).timestamp()));
    to_encode.insert("iat".to_string(), Value::from(now.timestamp()));
    if let Some(token_type) = token_type {
        to_encode.insert(TOKEN_TYPE_CLAIM.to_string(), Value::from(token_type));
    }

    jsonwebtoken::encode(&Header::new(algorithm), &to_encode, &key)
        .map_err(|e| GravityError::bad_request(format!("Could not encode token: {e}")))
}

/// Create a signed access token.
///
/// Adds `exp` (now + `ttl`, default 30 minutes) and `iat` to a copy of
/// `claims`.
///
/// # Errors
///
/// Returns a bad request error for an unusable key or encoding failures.
pub fn create_access_token(
    claims: &Claims,
    secret: &str,
    algorithm: Algorithm,
    ttl: Option<Duration>,
) -> Result<String> {
    let ttl = ttl.unwrap_or_else(|| Duration::minutes(ACCESS_TOKEN_TTL_MINUTES));
    encode_with_expiry(claims, secret, algorithm, ttl, None)
}

/// Create a signed refresh token.
///
/// Like [`create_access_token`] with a default lifetime of 7 days and
/// `type = "refresh"`.
///
/// # Errors
///
/// Returns a bad request error for an unusable key or encoding failures.
pub fn create_refresh_token(
    claims: &Claims,
    secret: &str,
    algorithm: Algorithm,
    ttl: Option<Duration>,
) -> Result<String> {
    let ttl = ttl.unwrap_or_else(|| Duration::days(REFRESH_TOKEN_TTL_DAYS));
    encode_with_expiry(claims, secret, algorithm, ttl, Some(REFRESH_TOKEN_TYPE))
}

/// Decode a token, verifying signature, algorithm and expiry.
///
/// `key` is the shared secret for HMAC algorithms and the PEM-encoded public
/// key otherwise. Expiry is checked without leeway.
///
/// # Errors
///
/// Returns an unauthorized error wrapping the verification failure, or a bad
/// request error if `key` cannot be parsed.
pub fn decode_token(token: &str, key: &str, algorithm: Algorithm) -> Result<Claims> {
    let key = decoding_key(algorithm, key)?;

    let mut validation = Validation::new(algorithm);
    validation.leeway = 0;
    validation.validate_aud = false;

    jsonwebtoken::decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| GravityError::unauthorized(format!("Could not validate credentials: {e}")))
}

/// Alias of [`decode_token`] for access tokens.
///
/// # Errors
///
/// See [`decode_token`].
pub fn decode_access_token(token: &str, key: &str, algorithm: Algorithm) -> Result<Claims> {
    decode_token(token, key, algorithm)
}

/// Check the `type` claim of decoded claims.
///
/// `None` matches claims without a string `type`, such as access tokens.
#[must_use]
pub fn validate_token_type(claims: &Claims, expected: Option<&str>) -> bool {
    claims.get(TOKEN_TYPE_CLAIM).and_then(Value::as_str) == expected
}

/// Signing settings shared by a service's token endpoints.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    /// Shared HMAC secret, or PEM private key for asymmetric algorithms
    pub secret: SecretString,
    /// PEM public key used to verify asymmetric signatures
    pub public_key: Option<String>,
    /// Signing algorithm
    pub algorithm: Algorithm,
    /// Access token lifetime
    pub access_ttl: Duration,
    /// Refresh token lifetime
    pub refresh_ttl: Duration,
}

impl TokenSettings {
    /// Settings with default algorithm (HS256) and lifetimes.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
            public_key: None,
            algorithm: Algorithm::HS256,
            access_ttl: Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
            refresh_ttl: Duration::days(REFRESH_TOKEN_TTL_DAYS),
        }
    }

    /// Load settings from environment variables.
    ///
    /// Reads `JWT_SECRET_KEY` (required), `JWT_PUBLIC_KEY`, `JWT_ALGORITHM`,
    /// `ACCESS_TOKEN_EXPIRE_MINUTES` and `REFRESH_TOKEN_EXPIRE_DAYS`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the secret is missing or a value cannot
    /// be parsed.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let secret = env::var("JWT_SECRET_KEY")
            .map_err(|_| GravityError::validation("JWT_SECRET_KEY is not set"))?;
        let mut settings = Self::new(secret);

        if let Ok(alg) = env::var("JWT_ALGORITHM") {
            settings = settings.with_algorithm(parse_algorithm(&alg)?);
        }
        if let Ok(public_key) = env::var("JWT_PUBLIC_KEY") {
            settings = settings.with_public_key(public_key);
        }
        if let Ok(minutes) = env::var("ACCESS_TOKEN_EXPIRE_MINUTES") {
            let minutes: i64 = minutes.parse().map_err(|_| {
                GravityError::validation(format!("Invalid ACCESS_TOKEN_EXPIRE_MINUTES: {minutes}"))
            })?;
            settings.access_ttl = Duration::minutes(minutes);
        }
        if let Ok(days) = env::var("REFRESH_TOKEN_EXPIRE_DAYS") {
            let days: i64 = days.parse().map_err(|_| {
                GravityError::validation(format!("Invalid REFRESH_TOKEN_EXPIRE_DAYS: {days}"))
            })?;
            settings.refresh_ttl = Duration::days(days);
        }

        Ok(settings)
    }

    /// Use another signing algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Verify with a PEM public key instead of the signing secret.
    #[must_use]
    pub fn with_public_key(mut self, public_key: impl Into<String>) -> Self {
        self.public_key = Some(public_key.into());
        self
    }

    /// Issue an access token with the configured lifetime.
    ///
    /// # Errors
    ///
    /// See [`create_access_token`].
    pub fn issue_access(&self, claims: &Claims) -> Result<String> {
        create_access_token(
            claims,
            self.secret.expose_secret(),
            self.algorithm,
            Some(self.access_ttl),
        )
    }

    /// Issue a refresh token with the configured lifetime.
    ///
    /// # Errors
    ///
    /// See [`create_refresh_token`].
    pub fn issue_refresh(&self, claims: &Claims) -> Result<String> {
        create_refresh_token(
            claims,
            self.secret.expose_secret(),
            self.algorithm,
            Some(self.refresh_ttl),
        )
    }

    /// Decode and verify a token signed with these settings.
    ///
    /// # Errors
    ///
    /// See [`decode_token`].
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let key = self
            .public_key
            .as_deref()
            .unwrap_or_else(|| self.secret.expose_secret());
        decode_token(token, key, self.algorithm)
    }
}

/// Parse an algorithm name such as `"HS256"`.
///
/// # Errors
///
/// Returns a validation error for unknown names.
pub fn parse_algorithm(name: &str) -> Result<Algorithm> {
    Algorithm::from_str(&name.to_uppercase())
        .map_err(|_| GravityError::validation(format!("Invalid JWT algorithm: {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    const SECRET: &str = "test-secret-key";
    const ES256_PRIVATE: &str = include_str!("../tests/fixtures/es256_private.pem");
    const ES256_PUBLIC: &str = include_str!("../tests/fixtures/es256_public.pem");

    fn claims() -> Claims {
        let mut claims = Claims::new();
        claims.insert("sub".to_string(), json!("user-123"));
        claims.insert("roles".to_string(), json!(["admin"]));
        claims
    }

    #[test]
    fn test_password_hash_and_verify() {
        let hash = hash_password("s3cret").unwrap();
        assert_ne!(hash, "s3cret");
        assert!(verify_password("s3cret", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn test_password_hash_is_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("same", &a).unwrap());
        assert!(verify_password("same", &b).unwrap());
    }

    #[test]
    fn test_verify_malformed_hash() {
        let err = verify_password("x", "not-a-bcrypt-hash").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn test_access_token_round_trip() {
        let token = create_access_token(&claims(), SECRET, Algorithm::HS256, None).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let decoded = decode_token(&token, SECRET, Algorithm::HS256).unwrap();
        assert_eq!(decoded["sub"], json!("user-123"));
        assert_eq!(decoded["roles"], json!(["admin"]));

        let exp = decoded["exp"].as_i64().unwrap();
        let iat = decoded["iat"].as_i64().unwrap();
        assert_eq!(exp - iat, ACCESS_TOKEN_TTL_MINUTES * 60);
        assert!(!decoded.contains_key(TOKEN_TYPE_CLAIM));
    }

    #[test]
    fn test_refresh_token_has_type() {
        let token = create_refresh_token(&claims(), SECRET, Algorithm::HS512, None).unwrap();
        let decoded = decode_token(&token, SECRET, Algorithm::HS512).unwrap();

        assert!(validate_token_type(&decoded, Some(REFRESH_TOKEN_TYPE)));
        assert!(!validate_token_type(&decoded, Some("access")));
        assert!(!validate_token_type(&decoded, None));
        let lifetime = decoded["exp"].as_i64().unwrap() - decoded["iat"].as_i64().unwrap();
        assert_eq!(lifetime, REFRESH_TOKEN_TTL_DAYS * 24 * 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_access_token(&claims(), SECRET, Algorithm::HS256, None).unwrap();
        let err = decode_token(&token, "other-secret", Algorithm::HS256).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(err.message().starts_with("Could not validate credentials"));
    }

    #[test]
    fn test_algorithm_mismatch_rejected() {
        let token = create_access_token(&claims(), SECRET, Algorithm::HS256, None).unwrap();
        let err = decode_token(&token, SECRET, Algorithm::HS384).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = create_access_token(
            &claims(),
            SECRET,
            Algorithm::HS256,
            Some(Duration::seconds(-1)),
        )
        .unwrap();

        let err = decode_token(&token, SECRET, Algorithm::HS256).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_es256_round_trip() {
        let token = create_access_token(&claims(), ES256_PRIVATE, Algorithm::ES256, None).unwrap();
        let decoded = decode_token(&token, ES256_PUBLIC, Algorithm::ES256).unwrap();
        assert_eq!(decoded["sub"], json!("user-123"));

        let err = decode_token(&token, SECRET, Algorithm::HS256).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_unparseable_pem_key_rejected() {
        let err = create_access_token(&claims(), SECRET, Algorithm::RS256, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);

        let err = decode_token("a.b.c", "not a pem", Algorithm::ES256).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn test_validate_token_type_absent() {
        let access = create_access_token(&claims(), SECRET, Algorithm::HS256, None).unwrap();
        let refresh = create_refresh_token(&claims(), SECRET, Algorithm::HS256, None).unwrap();
        let access = decode_token(&access, SECRET, Algorithm::HS256).unwrap();
        let refresh = decode_token(&refresh, SECRET, Algorithm::HS256).unwrap();

        assert!(validate_token_type(&access, None));
        assert!(!validate_token_type(&access, Some(REFRESH_TOKEN_TYPE)));
        assert!(!validate_token_type(&refresh, None));
        assert!(!validate_token_type(&Claims::new(), Some("refresh")));
    }

    #[test]
    fn test_long_password_rejected() {
        let hashed_pw = format!("{}y", "a".repeat(MAX_PASSWORD_BYTES));
        let other_pw = format!("{}x", "a".repeat(MAX_PASSWORD_BYTES));

        let err = hash_password_with_cost(&hashed_pw, 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let hash = hash_password_with_cost(&"a".repeat(MAX_PASSWORD_BYTES), 4).unwrap();
        let err = verify_password(&other_pw, &hash).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(verify_password(&"a".repeat(MAX_PASSWORD_BYTES), &hash).unwrap());
    }

    #[test]
    fn test_token_settings() {
        let settings = TokenSettings::new(SECRET).with_algorithm(Algorithm::HS384);

        let access = settings.issue_access(&claims()).unwrap();
        let refresh = settings.issue_refresh(&claims()).unwrap();

        assert!(validate_token_type(&settings.decode(&access).unwrap(), None));
        assert!(validate_token_type(&settings.decode(&refresh).unwrap(), Some(REFRESH_TOKEN_TYPE)));
    }

    #[test]
    fn test_token_settings_with_public_key() {
        let settings = TokenSettings::new(ES256_PRIVATE)
            .with_algorithm(Algorithm::ES256)
            .with_public_key(ES256_PUBLIC);

        let refresh = settings.issue_refresh(&claims()).unwrap();
        let decoded = settings.decode(&refresh).unwrap();
        assert!(validate_token_type(&decoded, Some(REFRESH_TOKEN_TYPE)));
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!(parse_algorithm("hs256").unwrap(), Algorithm::HS256);
        assert!(parse_algorithm("none").is_err());
    }
}
