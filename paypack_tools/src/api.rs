use std::sync::Arc;

use chrono::Utc;
use duka_common::Money;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tokio::sync::RwLock;

use crate::{
    config::PaypackConfig,
    helpers::paypack_amount,
    AccessToken,
    PaypackApiError,
    TransactionEvents,
    TransactionResponse,
};

/// Refresh the access token when it has less than this many seconds left.
const TOKEN_REFRESH_MARGIN: i64 = 60;

#[derive(Clone)]
pub struct PaypackApi {
    config: PaypackConfig,
    client: Arc<Client>,
    token: Arc<RwLock<Option<AccessToken>>>,
}

impl PaypackApi {
    pub fn new(config: PaypackConfig) -> Result<Self, PaypackApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| PaypackApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), token: Arc::new(RwLock::new(None)) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<B>,
        bearer: Option<&str>,
    ) -> Result<T, PaypackApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(token) = bearer {
            req = req.bearer_auth(token).header("X-Webhook-Mode", self.config.webhook_mode.as_str());
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| PaypackApiError::RestRequestError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| PaypackApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| PaypackApiError::RestResponseError(e.to_string()))?;
            Err(PaypackApiError::QueryError { status, message })
        }
    }

    /// Returns a valid access token, authorizing again if the cached one is missing or about to expire.
    async fn access_token(&self) -> Result<String, PaypackApiError> {
        if let Some(token) = self.token.read().await.as_ref() {
            if !token.is_stale(Utc::now(), TOKEN_REFRESH_MARGIN) {
                return Ok(token.access.clone());
            }
        }
        let mut guard = self.token.write().await;
        // Another task may have refreshed the token while we waited for the lock
        if let Some(token) = guard.as_ref() {
            if !token.is_stale(Utc::now(), TOKEN_REFRESH_MARGIN) {
                return Ok(token.access.clone());
            }
        }
        debug!("Authorizing with Paypack");
        let body = json!({
            "client_id": self.config.client_id,
            "client_secret": self.config.client_secret.reveal(),
        });
        let token = self
            .rest_query::<AccessToken, _>(Method::POST, "/auth/agents/authorize", &[], Some(body), None)
            .await
            .map_err(|e| PaypackApiError::AuthorizationFailed(e.to_string()))?;
        let access = token.access.clone();
        *guard = Some(token);
        info!("Paypack access token refreshed");
        Ok(access)
    }

    /// Asks the customer's mobile-money wallet at `number` to pay `amount` into the merchant account.
    pub async fn cash_in(&self, number: &str, amount: Money) -> Result<TransactionResponse, PaypackApiError> {
        self.transaction("/transactions/cashin", number, amount).await
    }

    /// Sends `amount` from the merchant account to the mobile-money wallet at `number`.
    pub async fn cash_out(&self, number: &str, amount: Money) -> Result<TransactionResponse, PaypackApiError> {
        self.transaction("/transactions/cashout", number, amount).await
    }

    async fn transaction(
        &self,
        path: &str,
        number: &str,
        amount: Money,
    ) -> Result<TransactionResponse, PaypackApiError> {
        let amount = paypack_amount(amount)?;
        let token = self.access_token().await?;
        let body = json!({ "amount": amount, "number": number });
        debug!("Requesting {path} for {amount} RWF");
        let result = self.rest_query::<TransactionResponse, _>(Method::POST, path, &[], Some(body), Some(&token)).await?;
        info!("Paypack accepted {} [{}] with status {}", result.kind, result.reference, result.status);
        Ok(result)
    }

    /// Fetches the transaction event feed for a single transaction reference.
    pub async fn transaction_events(&self, reference: &str) -> Result<TransactionEvents, PaypackApiError> {
        let token = self.access_token().await?;
        let params = [("ref", reference)];
        let events = self
            .rest_query::<TransactionEvents, ()>(Method::GET, "/events/transactions", &params, None, Some(&token))
            .await?;
        trace!("{} events found for [{reference}]", events.transactions.len());
        Ok(events)
    }
}
