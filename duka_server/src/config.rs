use std::env;

use chrono::Duration;
use duka_common::{helpers::parse_boolean_flag, Secret};
use duka_engine::{
    duka_api::{
        fees::{DEFAULT_PLATFORM_FEE_BPS, DEFAULT_PROVIDER_FEE_BPS},
        order_flow_api::DEFAULT_TOKEN_TTL_HOURS,
    },
    FeeSchedule,
};
use log::*;
use paypack_tools::PaypackConfig;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

const DEFAULT_DUKA_HOST: &str = "127.0.0.1";
const DEFAULT_DUKA_PORT: u16 = 8470;
const DEFAULT_APP_URL: &str = "http://localhost:3000";
const DEFAULT_SUBSCRIPTION_CHECK_SECS: i64 = 3600;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The customer-facing web app. Confirmation links redirect to pages under this url.
    pub app_url: String,
    /// Verifies the session tokens issued by the auth service.
    pub session_secret: Secret<String>,
    /// Verifies the `X-Paypack-Signature` header on webhook calls. If empty, signatures are not checked.
    pub webhook_secret: Secret<String>,
    /// Expected in the `X-Cron-Secret` header of the scheduled-job endpoints. If empty, those endpoints are closed.
    pub cron_secret: Secret<String>,
    /// Realtime gateway that receives engine events. Events are only logged when this is not set.
    pub realtime_url: Option<String>,
    pub fees: FeeSchedule,
    /// How long a merchant confirmation link stays valid.
    pub token_ttl: Duration,
    /// How often the in-process subscription worker runs. Zero disables the worker.
    pub subscription_check_interval: Duration,
    pub paypack: PaypackConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DUKA_HOST.to_string(),
            port: DEFAULT_DUKA_PORT,
            database_url: String::default(),
            app_url: DEFAULT_APP_URL.to_string(),
            session_secret: Secret::default(),
            webhook_secret: Secret::default(),
            cron_secret: Secret::default(),
            realtime_url: None,
            fees: FeeSchedule::default(),
            token_ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
            subscription_check_interval: Duration::seconds(DEFAULT_SUBSCRIPTION_CHECK_SECS),
            paypack: PaypackConfig::default(),
        }
    }
}

/// The slice of configuration that route handlers need.
#[derive(Clone, Debug, Default)]
pub struct RouteConfig {
    pub app_url: String,
    pub cron_secret: Secret<String>,
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("DUKA_HOST").ok().unwrap_or_else(|| DEFAULT_DUKA_HOST.into());
        let port = env::var("DUKA_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for DUKA_PORT. {e} Using the default, {DEFAULT_DUKA_PORT}, \
                         instead."
                    );
                    DEFAULT_DUKA_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_DUKA_PORT);
        let database_url = env::var("DUKA_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ DUKA_DATABASE_URL is not set. Please set it to the URL for the Duka database.");
            String::default()
        });
        let app_url = env::var("DUKA_APP_URL").map(|s| s.trim_end_matches('/').to_string()).unwrap_or_else(|_| {
            warn!("🪛️ DUKA_APP_URL is not set. Confirmation links will redirect to {DEFAULT_APP_URL}");
            DEFAULT_APP_URL.to_string()
        });
        let session_secret = configure_session_secret();
        let webhook_secret = Secret::new(env::var("DUKA_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!(
                "🪛️ DUKA_WEBHOOK_SECRET is not set. Webhook signatures will NOT be checked. Do not run like this in \
                 production."
            );
            String::default()
        }));
        let cron_secret = Secret::new(env::var("DUKA_CRON_SECRET").unwrap_or_else(|_| {
            info!("🪛️ DUKA_CRON_SECRET is not set. The /cron endpoints will refuse every call.");
            String::default()
        }));
        let realtime_url = env::var("DUKA_REALTIME_URL").ok().filter(|s| !s.trim().is_empty());
        if realtime_url.is_none() {
            info!("🪛️ DUKA_REALTIME_URL is not set. Realtime events will only be logged.");
        }
        let fees = FeeSchedule::new(
            bps_from_env("DUKA_PROVIDER_FEE_BPS", DEFAULT_PROVIDER_FEE_BPS),
            bps_from_env("DUKA_PLATFORM_FEE_BPS", DEFAULT_PLATFORM_FEE_BPS),
        );
        let token_ttl = env::var("DUKA_TOKEN_TTL_HOURS")
            .ok()
            .and_then(|s| {
                s.parse::<i64>()
                    .ok()
                    .filter(|h| *h > 0)
                    .or_else(|| {
                        error!("🪛️ Invalid DUKA_TOKEN_TTL_HOURS: {s}. Using {DEFAULT_TOKEN_TTL_HOURS} hours.");
                        None
                    })
            })
            .map(Duration::hours)
            .unwrap_or_else(|| Duration::hours(DEFAULT_TOKEN_TTL_HOURS));
        let subscription_check_interval = configure_subscription_interval();
        let paypack = PaypackConfig::new_from_env_or_default();
        Self {
            host,
            port,
            database_url,
            app_url,
            session_secret,
            webhook_secret,
            cron_secret,
            realtime_url,
            fees,
            token_ttl,
            subscription_check_interval,
            paypack,
        }
    }

    pub fn route_config(&self) -> RouteConfig {
        RouteConfig { app_url: self.app_url.clone(), cron_secret: self.cron_secret.clone() }
    }
}

fn configure_session_secret() -> Secret<String> {
    match env::var("DUKA_SESSION_SECRET") {
        Ok(s) if !s.is_empty() => Secret::new(s),
        _ => {
            warn!(
                "🪛️ DUKA_SESSION_SECRET is not set. A random secret will be used, so no session token issued by the \
                 auth service will be accepted."
            );
            let random = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect::<String>();
            Secret::new(random)
        },
    }
}

fn bps_from_env(name: &str, default: u32) -> u32 {
    match env::var(name) {
        Ok(s) => s.trim().parse::<u32>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default of {default} bps.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default of {default} bps.");
            default
        },
    }
}

/// `DUKA_SUBSCRIPTION_CHECK_INTERVAL` is in seconds. `0`, `off` or `false` disable the worker, leaving the cron
/// endpoint as the only trigger.
fn configure_subscription_interval() -> Duration {
    let Ok(value) = env::var("DUKA_SUBSCRIPTION_CHECK_INTERVAL") else {
        return Duration::seconds(DEFAULT_SUBSCRIPTION_CHECK_SECS);
    };
    if !parse_boolean_flag(Some(value.clone()), true) {
        info!("🪛️ The subscription worker is disabled. Use POST /cron/subscriptions to run the job.");
        return Duration::zero();
    }
    match value.trim().parse::<i64>() {
        Ok(secs) if secs >= 0 => Duration::seconds(secs),
        _ => {
            error!(
                "🪛️ Invalid DUKA_SUBSCRIPTION_CHECK_INTERVAL: {value}. Using {DEFAULT_SUBSCRIPTION_CHECK_SECS} seconds."
            );
            Duration::seconds(DEFAULT_SUBSCRIPTION_CHECK_SECS)
        },
    }
}
