use duka_common::Secret;
use log::*;

const DEFAULT_PAYPACK_URL: &str = "https://payments.paypack.rw/api";

#[derive(Debug, Clone)]
pub struct PaypackConfig {
    /// Base url of the agent API, without a trailing slash
    pub base_url: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// Sent as `X-Webhook-Mode` on transaction requests. Paypack only delivers webhooks configured for the same
    /// mode, so this is `development` for sandbox setups and `production` otherwise.
    pub webhook_mode: String,
}

impl Default for PaypackConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PAYPACK_URL.to_string(),
            client_id: String::default(),
            client_secret: Secret::default(),
            webhook_mode: "development".to_string(),
        }
    }
}

impl PaypackConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("DUKA_PAYPACK_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_PAYPACK_URL.to_string());
        let client_id = std::env::var("DUKA_PAYPACK_CLIENT_ID").unwrap_or_else(|_| {
            warn!("DUKA_PAYPACK_CLIENT_ID not set. Payment initiation will fail until it is configured.");
            String::default()
        });
        let client_secret = Secret::new(std::env::var("DUKA_PAYPACK_CLIENT_SECRET").unwrap_or_else(|_| {
            warn!("DUKA_PAYPACK_CLIENT_SECRET not set. Payment initiation will fail until it is configured.");
            String::default()
        }));
        let webhook_mode = std::env::var("DUKA_PAYPACK_WEBHOOK_MODE").unwrap_or_else(|_| {
            info!("DUKA_PAYPACK_WEBHOOK_MODE not set, using 'development'");
            "development".to_string()
        });
        Self { base_url, client_id, client_secret, webhook_mode }
    }
}
