//! Access token issuance and verification (Ed25519).

use std::collections::HashSet;
use std::sync::Arc;

use base64::Engine as _;
use jwt_simple::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_ACCESS_TOKEN_EXPIRY_SECS: i64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub email: String,
}

/// Verified token contents.
#[derive(Debug, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("JWT_PRIVATE_KEY must be set")]
    Missing,
    #[error("JWT_PRIVATE_KEY must be valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("JWT_PRIVATE_KEY must be a valid Ed25519 key: {0}")]
    Key(String),
}

#[derive(Clone)]
pub struct JwtConfig {
    key_pair: Arc<Ed25519KeyPair>,
    public_key: Arc<Ed25519PublicKey>,
    pub access_token_expiry: i64,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl JwtConfig {
    /// Reads the base64 Ed25519 key from `JWT_PRIVATE_KEY`.
    pub fn from_env(config: &crate::config::JwtConfig) -> Result<Self, KeyError> {
        let encoded = std::env::var("JWT_PRIVATE_KEY").map_err(|_| KeyError::Missing)?;
        Ok(Self::from_base64(&encoded)?.with_settings(config))
    }

    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
        let key_pair =
            Ed25519KeyPair::from_bytes(&bytes).map_err(|e| KeyError::Key(e.to_string()))?;
        Ok(Self::from_key_pair(key_pair))
    }

    pub fn from_key_pair(key_pair: Ed25519KeyPair) -> Self {
        let public_key = key_pair.public_key();
        Self {
            key_pair: Arc::new(key_pair),
            public_key: Arc::new(public_key),
            access_token_expiry: DEFAULT_ACCESS_TOKEN_EXPIRY_SECS,
            issuer: None,
            audience: None,
        }
    }

    pub fn with_settings(mut self, config: &crate::config::JwtConfig) -> Self {
        self.access_token_expiry = config.access_token_expiry_secs;
        self.issuer = config.issuer.clone();
        self.audience = config.audience.clone();
        self
    }

    /// Returns `(private, public)` base64 strings for a fresh key pair.
    pub fn generate_key_pair() -> (String, String) {
        let key_pair = Ed25519KeyPair::generate();
        let engine = base64::engine::general_purpose::STANDARD;
        (
            engine.encode(key_pair.to_bytes()),
            engine.encode(key_pair.public_key().to_bytes()),
        )
    }

    pub fn generate_access_token(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> Result<String, jwt_simple::Error> {
        let custom_claims = AccessClaims {
            email: email.to_string(),
        };

        let mut claims = jwt_simple::claims::Claims::with_custom_claims(
            custom_claims,
            Duration::from_secs(self.access_token_expiry.max(1) as u64),
        )
        .with_subject(user_id.to_string());

        if let Some(issuer) = &self.issuer {
            claims = claims.with_issuer(issuer);
        }
        if let Some(audience) = &self.audience {
            claims = claims.with_audience(audience);
        }

        self.key_pair.sign(claims)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, jwt_simple::Error> {
        let mut options = VerificationOptions::default();
        if let Some(issuer) = &self.issuer {
            options.allowed_issuers = Some(HashSet::from([issuer.clone()]));
        }
        if let Some(audience) = &self.audience {
            options.allowed_audiences = Some(HashSet::from([audience.clone()]));
        }

        let token_data = self
            .public_key
            .verify_token::<AccessClaims>(token, Some(options))?;

        let sub = token_data
            .subject
            .as_deref()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| jwt_simple::Error::msg("token subject is not a user id"))?;

        Ok(Claims {
            sub,
            email: token_data.custom.email,
            exp: token_data
                .expires_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
            iat: token_data
                .issued_at
                .map(|t| t.as_secs() as i64)
                .unwrap_or(0),
        })
    }
}
