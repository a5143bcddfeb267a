//! Session verification.
//!
//! Users sign in through the auth service, which hands out session tokens of the form
//!
//! ```text
//! <user_id>.<organization_id | ->.<expiry as unix seconds>.<base64 HMAC-SHA256 of the first three parts>
//! ```
//!
//! keyed with `DUKA_SESSION_SECRET`. This server never issues tokens for real users, it only checks them. Handlers
//! take a [`SessionClaims`] argument to require a valid session.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use chrono::{DateTime, Utc};
use duka_common::Secret;
use hmac::{Hmac, Mac};
use log::*;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::errors::{AuthError, ServerError};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub user_id: String,
    /// Set for merchant staff. Customers have no organization.
    pub organization_id: Option<i64>,
    pub expires_at: DateTime<Utc>,
}

impl SessionClaims {
    /// The organization the caller manages, or a 403 if they are not a merchant.
    pub fn merchant(&self) -> Result<i64, ServerError> {
        self.organization_id
            .ok_or_else(|| ServerError::InsufficientPermissions("This action is only available to merchants".into()))
    }
}

#[derive(Clone, Debug)]
pub struct SessionVerifier {
    secret: Secret<String>,
}

impl SessionVerifier {
    pub fn new(secret: Secret<String>) -> Self {
        Self { secret }
    }

    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, AuthError> {
        let mut parts = token.trim().rsplitn(4, '.');
        let signature = parts.next().unwrap_or_default();
        let (Some(expiry), Some(org), Some(user_id)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(AuthError::PoorlyFormattedToken("expected 4 dot-separated parts".into()));
        };
        if user_id.is_empty() {
            return Err(AuthError::PoorlyFormattedToken("empty user id".into()));
        }
        let signed = format!("{user_id}.{org}.{expiry}");
        let expected = base64::decode(signature).map_err(|_| AuthError::InvalidSignature)?;
        let mut mac = self.mac()?;
        mac.update(signed.as_bytes());
        mac.verify_slice(&expected).map_err(|_| AuthError::InvalidSignature)?;
        let organization_id = match org {
            "-" => None,
            s => Some(s.parse::<i64>().map_err(|e| AuthError::PoorlyFormattedToken(format!("organization: {e}")))?),
        };
        let expiry = expiry.parse::<i64>().map_err(|e| AuthError::PoorlyFormattedToken(format!("expiry: {e}")))?;
        let expires_at = DateTime::from_timestamp(expiry, 0)
            .ok_or_else(|| AuthError::PoorlyFormattedToken(format!("expiry {expiry} is out of range")))?;
        if expires_at <= now {
            return Err(AuthError::Expired);
        }
        Ok(SessionClaims { user_id: user_id.to_string(), organization_id, expires_at })
    }

    /// Produces a token that [`Self::verify`] accepts. Used by tooling and tests; production tokens come from the
    /// auth service.
    pub fn issue(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        let org = claims.organization_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string());
        let signed = format!("{}.{org}.{}", claims.user_id, claims.expires_at.timestamp());
        let mut mac = self.mac()?;
        mac.update(signed.as_bytes());
        Ok(format!("{signed}.{}", base64::encode(mac.finalize().into_bytes())))
    }

    fn mac(&self) -> Result<HmacSha256, AuthError> {
        HmacSha256::new_from_slice(self.secret.reveal().as_bytes()).map_err(|_| AuthError::InvalidSignature)
    }
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl FromRequest for SessionClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(verifier) = req.app_data::<web::Data<SessionVerifier>>() else {
            error!("🔐️ No session verifier has been configured. Every authenticated request will fail.");
            return ready(Err(ServerError::ConfigurationError("Session verification is not configured".into())));
        };
        let Some(token) = bearer_token(req) else {
            trace!("🔐️ No session token in request to {}", req.path());
            return ready(Err(AuthError::MissingToken.into()));
        };
        let result = verifier.verify(token, Utc::now()).map_err(|e| {
            debug!("🔐️ Session token rejected. {e}");
            ServerError::from(e)
        });
        ready(result)
    }
}
