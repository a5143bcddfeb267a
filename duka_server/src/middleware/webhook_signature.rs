//! Webhook signature middleware for Actix Web.
//!
//! Paypack signs every webhook call with an HMAC-SHA256 of the raw request body, keyed with the webhook secret
//! configured in the Paypack dashboard, and sends the base64-encoded result in the `X-Paypack-Signature` header.
//!
//! Wrap the webhook scope with [`WebhookSignatureMiddlewareFactory`] to reject calls that are not signed with
//! `DUKA_WEBHOOK_SECRET`. When no secret is configured the check is skipped, with a warning on every call.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorBadRequest,
    web,
    Error,
};
use duka_common::Secret;
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use paypack_tools::helpers::{verify_webhook_signature, SIGNATURE_HEADER};

use crate::errors::{AuthError, ServerError};

pub struct WebhookSignatureMiddlewareFactory {
    key: Secret<String>,
}

impl WebhookSignatureMiddlewareFactory {
    pub fn new(key: Secret<String>) -> Self {
        WebhookSignatureMiddlewareFactory { key }
    }
}

impl<S, B> Transform<S, ServiceRequest> for WebhookSignatureMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = WebhookSignatureMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(WebhookSignatureMiddlewareService { key: self.key.clone(), service: Rc::new(service) }))
    }
}

pub struct WebhookSignatureMiddlewareService<S> {
    key: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for WebhookSignatureMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let secret = self.key.reveal().clone();
        Box::pin(async move {
            if secret.is_empty() {
                warn!("🔐️ No webhook secret is configured. Accepting {} without a signature check.", req.path());
                return service.call(req).await;
            }
            trace!("🔐️ Checking webhook signature");
            let data = req.extract::<web::Bytes>().await.map_err(|e| {
                warn!("🔐️ Failed to extract request data: {:?}", e);
                ErrorBadRequest("Failed to extract request data.")
            })?;
            let signature = req
                .headers()
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| {
                    warn!("🔐️ No webhook signature found in request. Denying access.");
                    Error::from(ServerError::from(AuthError::InvalidWebhookSignature))
                })?
                .to_string();
            if verify_webhook_signature(&secret, data.as_ref(), &signature) {
                trace!("🔐️ Webhook signature check ✅️");
                req.set_payload(bytes_to_payload(data));
                service.call(req).await
            } else {
                warn!("🔐️ Invalid webhook signature found in request. Denying access.");
                Err(ServerError::from(AuthError::InvalidWebhookSignature).into())
            }
        })
    }
}

fn bytes_to_payload(buf: web::Bytes) -> Payload {
    let (_, mut pl) = h1::Payload::create(true);
    pl.unread_data(buf);
    Payload::from(pl)
}
