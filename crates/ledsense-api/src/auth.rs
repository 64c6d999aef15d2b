//! Bearer tokens and password hashing.
//!
//! Tokens are HS256 JWTs carrying `{user_id, exp}`. Passwords are stored
//! as salted Argon2id hashes in PHC string form and verified in constant
//! time by the `argon2` crate.

use std::fmt;

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Default token lifetime in hours.
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Authentication failures.
///
/// The `Display` text of the first three variants is sent to clients
/// verbatim.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No `Authorization: Bearer <token>` header.
    #[error("Token no proporcionado")]
    MissingToken,

    /// The token failed decoding or verification.
    #[error("Token inválido")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    /// Unknown user name or wrong password.
    #[error("Usuario o contraseña incorrectos")]
    InvalidCredentials,

    /// The configured signing secret is empty.
    #[error("token signing secret must not be empty")]
    EmptySecret,

    /// The token lifetime is not positive or overflows.
    #[error("invalid token lifetime: {0} hours")]
    InvalidTtl(i64),

    /// Signing a token failed.
    #[error("token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    /// Hashing a password failed.
    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl AuthError {
    /// Whether this failure is the caller's fault (HTTP 401) rather than a
    /// server-side problem.
    pub const fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::MissingToken | Self::InvalidToken(_) | Self::InvalidCredentials
        )
    }
}

/// Token payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The authenticated user.
    pub user_id: i64,
    /// Expiry as seconds since the Unix epoch.
    pub exp: i64,
}

/// Signing and verification keys derived from the shared secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: TimeDelta,
}

impl fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenKeys")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenKeys {
    /// Build keys from a shared secret and a token lifetime in hours.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmptySecret`] for an empty secret and
    /// [`AuthError::InvalidTtl`] for a non-positive lifetime.
    pub fn new(secret: &str, ttl_hours: i64) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::EmptySecret);
        }
        let ttl = TimeDelta::try_hours(ttl_hours)
            .filter(|ttl| *ttl > TimeDelta::zero())
            .ok_or(AuthError::InvalidTtl(ttl_hours))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        })
    }

    /// Token lifetime.
    pub const fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Issue a token for `user_id` expiring one lifetime from now.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Signing`] if encoding fails.
    pub fn issue(&self, user_id: i64) -> Result<String, AuthError> {
        self.issue_at(user_id, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Signing`] if encoding fails.
    pub fn issue_at(&self, user_id: i64, now: DateTime<Utc>) -> Result<String, AuthError> {
        let exp = now
            .checked_add_signed(self.ttl)
            .map_or(i64::MAX, |expiry| expiry.timestamp());
        let claims = Claims { user_id, exp };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(AuthError::Signing)
    }

    /// Decode and verify a token, returning its claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] if the token is malformed,
    /// expired, or signed with a different key or algorithm.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(AuthError::InvalidToken)
    }
}

/// A well-formed Argon2id hash, with the default cost parameters, that
/// matches no known password.
///
/// Login verifies against it when the user name is unknown, so both
/// failures take the same time.
pub const DUMMY_PASSWORD_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$bGVkc2Vuc2UtdGltaW5nIQ$AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8";

/// Hash a password with a fresh random salt.
///
/// # Errors
///
/// Returns [`AuthError::Hash`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Check `password` against a stored PHC hash.
///
/// A stored value that is not a valid PHC string never matches.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    fn keys() -> TokenKeys {
        TokenKeys::new("test-secret", DEFAULT_TOKEN_TTL_HOURS).unwrap()
    }

    #[test]
    fn token_round_trips_user_id() {
        let keys = keys();
        for user_id in [1, 42, i64::from(i32::MAX) + 1] {
            let token = keys.issue(user_id).unwrap();
            assert_eq!(keys.verify(&token).unwrap().user_id, user_id);
        }
    }

    #[test]
    fn token_expires_after_ttl() {
        let keys = keys();
        let issued = Utc::now() - TimeDelta::hours(25);
        let token = keys.issue_at(7, issued).unwrap();
        assert!(matches!(keys.verify(&token), Err(AuthError::InvalidToken(_))));

        let fresh = keys.issue_at(7, Utc::now() - TimeDelta::hours(23)).unwrap();
        assert_eq!(keys.verify(&fresh).unwrap().user_id, 7);
    }

    #[test]
    fn expiry_is_one_ttl_after_issue() {
        let keys = keys();
        let now = Utc::now();
        let token = keys.issue_at(3, now).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.exp, now.timestamp() + 24 * 3600);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let other = TokenKeys::new("another-secret", 24).unwrap();
        let token = other.issue(1).unwrap();
        assert!(matches!(keys().verify(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(keys().verify("not.a.jwt").is_err());
        assert!(keys().verify("").is_err());
    }

    #[test]
    fn empty_secret_and_bad_ttl_are_rejected() {
        assert!(matches!(TokenKeys::new("", 24), Err(AuthError::EmptySecret)));
        assert!(matches!(TokenKeys::new("s", 0), Err(AuthError::InvalidTtl(0))));
        assert!(matches!(TokenKeys::new("s", -1), Err(AuthError::InvalidTtl(-1))));
    }

    #[test]
    fn password_hash_verifies_only_the_right_password() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("clave").unwrap();
        let b = hash_password("clave").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn plaintext_stored_value_never_matches() {
        assert!(!verify_password("clave", "clave"));
        assert!(!verify_password("", ""));
    }

    #[test]
    fn dummy_hash_costs_as_much_as_a_real_one() {
        let parsed = PasswordHash::new(DUMMY_PASSWORD_HASH).unwrap();
        assert_eq!(parsed.algorithm.as_str(), "argon2id");
        let params = argon2::Params::try_from(&parsed).unwrap();
        assert_eq!(params.m_cost(), argon2::Params::DEFAULT_M_COST);
        assert_eq!(params.t_cost(), argon2::Params::DEFAULT_T_COST);
        assert_eq!(params.p_cost(), argon2::Params::DEFAULT_P_COST);
        assert!(!verify_password("", DUMMY_PASSWORD_HASH));
        assert!(!verify_password("clave", DUMMY_PASSWORD_HASH));
    }

    #[test]
    fn client_facing_messages() {
        assert_eq!(AuthError::MissingToken.to_string(), "Token no proporcionado");
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "Usuario o contraseña incorrectos"
        );
        assert!(AuthError::InvalidCredentials.is_unauthorized());
        assert!(!AuthError::EmptySecret.is_unauthorized());
    }
}
