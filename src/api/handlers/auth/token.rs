//! PASETO v4.public session tokens.
//!
//! Flow Overview:
//! 1) Build session claims (`sub`, `iat`, `exp`) with RFC3339 timestamps.
//! 2) Sign the PASETO pre-auth input with the server's Ed25519 key.
//! 3) On each request, check the signature first, then the expiry.
//!
//! Tokens are stateless: nothing is stored server side, so logout only clears
//! the client's cookie.

use base64ct::{Base64, Base64UrlUnpadded, Encoding};
use ed25519_dalek::SigningKey;
use pasetors::{
    errors::Error as PasetorsError,
    keys::{AsymmetricPublicKey, AsymmetricSecretKey},
    token::UntrustedToken,
    version4::{PublicToken, V4},
    Public,
};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

const SEED_LENGTH: usize = 32;
// Accepted clock drift for `iat` in the future.
const CLOCK_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("session key must be {SEED_LENGTH} bytes of base64")]
    InvalidKey,
    #[error("session ttl must be positive and representable")]
    InvalidTtl,
    #[error("malformed session token")]
    Malformed,
    #[error("invalid session token signature")]
    BadSignature,
    #[error("invalid session token claims")]
    InvalidClaims,
    #[error("session token expired")]
    Expired,
    #[error("failed to encode session token: {0}")]
    Encode(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    iat: String,
    exp: String,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: String,
}

pub struct SessionSigner {
    secret_key: AsymmetricSecretKey<V4>,
    public_key: AsymmetricPublicKey<V4>,
}

impl fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSigner")
            .field(
                "public_key",
                &Base64UrlUnpadded::encode_string(self.public_key.as_bytes()),
            )
            .finish_non_exhaustive()
    }
}

impl SessionSigner {
    /// Build a signer from a 32 byte Ed25519 seed.
    ///
    /// # Errors
    /// Returns [`TokenError::InvalidKey`] if the derived key pair is rejected.
    pub fn from_seed(seed: &[u8; SEED_LENGTH]) -> Result<Self, TokenError> {
        // PASETO v4 secret keys are `seed || public key`.
        let keypair = SigningKey::from_bytes(seed).to_keypair_bytes();
        let secret_key =
            AsymmetricSecretKey::<V4>::from(keypair.as_slice()).map_err(|_| TokenError::InvalidKey)?;
        let public_key = AsymmetricPublicKey::<V4>::try_from(&secret_key)
            .map_err(|_| TokenError::InvalidKey)?;
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// Build a signer from a base64 encoded 32 byte seed.
    ///
    /// # Errors
    /// Returns [`TokenError::InvalidKey`] if the value is not valid base64 or has the wrong length.
    pub fn from_base64(seed: &str) -> Result<Self, TokenError> {
        let bytes = Base64::decode_vec(seed.trim()).map_err(|_| TokenError::InvalidKey)?;
        let seed: [u8; SEED_LENGTH] = bytes.try_into().map_err(|_| TokenError::InvalidKey)?;
        Self::from_seed(&seed)
    }

    /// Build a signer with a random key. Tokens do not survive a restart.
    ///
    /// # Errors
    /// Returns an error if the OS random source fails.
    pub fn generate() -> Result<Self, TokenError> {
        let mut seed = [0u8; SEED_LENGTH];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|err| TokenError::Encode(err.to_string()))?;
        Self::from_seed(&seed)
    }

    /// Issue a session token for `user_id` valid for `ttl_seconds`.
    ///
    /// # Errors
    /// Returns an error if the ttl is not positive or encoding fails.
    pub fn issue(&self, user_id: Uuid, ttl_seconds: i64) -> Result<IssuedToken, TokenError> {
        self.issue_at(user_id, ttl_seconds, OffsetDateTime::now_utc())
    }

    fn issue_at(
        &self,
        user_id: Uuid,
        ttl_seconds: i64,
        now: OffsetDateTime,
    ) -> Result<IssuedToken, TokenError> {
        if ttl_seconds <= 0 {
            return Err(TokenError::InvalidTtl);
        }
        let now = now
            .replace_nanosecond(0)
            .map_err(|err| TokenError::Encode(err.to_string()))?;
        let expires = now
            .checked_add(Duration::seconds(ttl_seconds))
            .ok_or(TokenError::InvalidTtl)?;
        let iat = now
            .format(&Rfc3339)
            .map_err(|err| TokenError::Encode(err.to_string()))?;
        let exp = expires
            .format(&Rfc3339)
            .map_err(|_| TokenError::InvalidTtl)?;

        let claims = SessionClaims {
            sub: user_id.to_string(),
            iat,
            exp: exp.clone(),
        };
        let payload =
            serde_json::to_vec(&claims).map_err(|err| TokenError::Encode(err.to_string()))?;
        let token = PublicToken::sign(&self.secret_key, &payload, None, None)
            .map_err(|err| TokenError::Encode(err.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_at: exp,
        })
    }

    /// Verify a session token and return the user id it was issued for.
    ///
    /// # Errors
    /// Returns an error if the token is malformed, forged, or expired.
    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        self.verify_at(token, OffsetDateTime::now_utc())
    }

    fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<Uuid, TokenError> {
        let untrusted =
            UntrustedToken::<Public, V4>::try_from(token).map_err(|err| map_paseto_error(&err))?;
        // Session tokens never carry a footer.
        if !untrusted.untrusted_footer().is_empty() {
            return Err(TokenError::Malformed);
        }
        let trusted = PublicToken::verify(&self.public_key, &untrusted, None, None)
            .map_err(|err| map_paseto_error(&err))?;

        let claims: SessionClaims =
            serde_json::from_str(trusted.payload()).map_err(|_| TokenError::InvalidClaims)?;
        let iat = OffsetDateTime::parse(&claims.iat, &Rfc3339)
            .map_err(|_| TokenError::InvalidClaims)?;
        let exp = OffsetDateTime::parse(&claims.exp, &Rfc3339)
            .map_err(|_| TokenError::InvalidClaims)?;

        if exp <= iat || iat > now + Duration::seconds(CLOCK_SKEW_SECONDS) {
            return Err(TokenError::InvalidClaims);
        }
        if exp <= now {
            return Err(TokenError::Expired);
        }

        Uuid::parse_str(&claims.sub).map_err(|_| TokenError::InvalidClaims)
    }
}

fn map_paseto_error(err: &PasetorsError) -> TokenError {
    match err {
        PasetorsError::TokenValidation => TokenError::BadSignature,
        _ => TokenError::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn signer() -> SessionSigner {
        SessionSigner::from_seed(&[7u8; SEED_LENGTH]).expect("valid seed")
    }

    #[test]
    fn issued_token_verifies() -> Result<()> {
        let user_id = Uuid::new_v4();
        let issued = signer().issue(user_id, 60)?;
        assert!(issued.token.starts_with("v4.public."));
        assert!(!issued.expires_at.is_empty());
        assert_eq!(signer().verify(&issued.token)?, user_id);
        Ok(())
    }

    #[test]
    fn other_key_is_rejected() -> Result<()> {
        let issued = signer().issue(Uuid::new_v4(), 60)?;
        let other = SessionSigner::from_seed(&[8u8; SEED_LENGTH])?;
        assert_eq!(other.verify(&issued.token), Err(TokenError::BadSignature));
        Ok(())
    }

    #[test]
    fn expired_token_is_rejected() -> Result<()> {
        let issued = signer().issue(Uuid::new_v4(), 60)?;
        let later = OffsetDateTime::now_utc() + Duration::seconds(120);
        assert_eq!(
            signer().verify_at(&issued.token, later),
            Err(TokenError::Expired)
        );
        Ok(())
    }

    #[test]
    fn token_from_the_future_is_rejected() -> Result<()> {
        let future = OffsetDateTime::now_utc() + Duration::hours(1);
        let issued = signer().issue_at(Uuid::new_v4(), 60, future)?;
        assert_eq!(
            signer().verify(&issued.token),
            Err(TokenError::InvalidClaims)
        );
        Ok(())
    }

    #[test]
    fn tampered_token_is_rejected() -> Result<()> {
        let issued = signer().issue(Uuid::new_v4(), 60)?;
        let header = PublicToken::HEADER;
        let body = issued.token.trim_start_matches(header);
        let mut message = Base64UrlUnpadded::decode_vec(body).map_err(|e| anyhow::anyhow!("{e}"))?;
        message[2] ^= 0x01;
        let forged = format!("{header}{}", Base64UrlUnpadded::encode_string(&message));
        assert_eq!(signer().verify(&forged), Err(TokenError::BadSignature));
        Ok(())
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let signer = signer();
        for token in ["", "v4.local.abc", "v4.public.", "v4.public.abc.def", "v4.public.!!"] {
            assert_eq!(signer.verify(token), Err(TokenError::Malformed), "{token}");
        }
    }

    #[test]
    fn footer_is_rejected_even_when_signed() -> Result<()> {
        let signer = signer();
        let payload = serde_json::to_vec(&SessionClaims {
            sub: Uuid::new_v4().to_string(),
            iat: OffsetDateTime::now_utc().format(&Rfc3339)?,
            exp: (OffsetDateTime::now_utc() + Duration::minutes(5)).format(&Rfc3339)?,
        })?;
        let token = PublicToken::sign(&signer.secret_key, &payload, Some(b"{}"), None)?;
        assert_eq!(signer.verify(&token), Err(TokenError::Malformed));
        Ok(())
    }

    #[test]
    fn ttl_must_be_positive() {
        assert!(matches!(
            signer().issue(Uuid::new_v4(), 0),
            Err(TokenError::InvalidTtl)
        ));
    }

    #[test]
    fn oversized_ttl_is_an_error() {
        assert_eq!(
            signer().issue(Uuid::new_v4(), i64::MAX).map(|_| ()),
            Err(TokenError::InvalidTtl)
        );
    }

    #[test]
    fn base64_seed_round_trips_to_same_key() -> Result<()> {
        let encoded = Base64::encode_string(&[7u8; SEED_LENGTH]);
        let from_b64 = SessionSigner::from_base64(&encoded)?;
        let issued = signer().issue(Uuid::new_v4(), 60)?;
        assert!(from_b64.verify(&issued.token).is_ok());

        assert_eq!(
            SessionSigner::from_base64("c2hvcnQ=").map(|_| ()),
            Err(TokenError::InvalidKey)
        );
        Ok(())
    }
}
