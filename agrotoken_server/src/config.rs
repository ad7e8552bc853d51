use std::{env, time::Duration};

use agt_common::{helpers::parse_boolean_flag, Secret};
use chain_tools::ChainConfig;
use log::*;
use pinning_tools::PinningConfig;

const DEFAULT_AGT_HOST: &str = "127.0.0.1";
const DEFAULT_AGT_PORT: u16 = 8360;
const DEFAULT_PRICE_POLL_INTERVAL: Duration = Duration::from_secs(15 * 60);
const DEFAULT_PRICE_FRESHNESS: Duration = Duration::from_secs(60 * 60);
const DEFAULT_MINT_POLL_INTERVAL: Duration = Duration::from_secs(15);
const DEFAULT_MINT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MINT_BACKOFF_BASE: Duration = Duration::from_secs(2);
const DEFAULT_MINT_MAX_ATTEMPTS: u32 = 5;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub webhook: WebhookConfig,
    pub prices: PriceConfig,
    pub minting: MintConfig,
    pub chain: ChainConfig,
    pub pinning: PinningConfig,
}

#[derive(Clone, Debug, Default)]
pub struct WebhookConfig {
    /// The shared secret the payment gateway signs webhook bodies with.
    pub hmac_secret: Secret<String>,
    /// The header carrying the hex-encoded HMAC-SHA256 signature.
    pub hmac_header: String,
    /// If false, signature checks are skipped. Only ever disable this in local development.
    pub hmac_checks: bool,
}

#[derive(Clone, Debug)]
pub struct PriceConfig {
    pub feed_url: String,
    /// Commodity symbols to poll, e.g. WHEAT, MAIZE, SOY.
    pub symbols: Vec<String>,
    pub poll_interval: Duration,
    /// Quotes older than this are discarded instead of stored.
    pub freshness_threshold: Duration,
}

#[derive(Clone, Debug)]
pub struct MintConfig {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub poll_interval: Duration,
    pub backoff_base: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_AGT_HOST.to_string(),
            port: DEFAULT_AGT_PORT,
            database_url: String::default(),
            webhook: WebhookConfig::default(),
            prices: PriceConfig::default(),
            minting: MintConfig::default(),
            chain: ChainConfig::default(),
            pinning: PinningConfig::default(),
        }
    }
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            feed_url: String::default(),
            symbols: Vec::new(),
            poll_interval: DEFAULT_PRICE_POLL_INTERVAL,
            freshness_threshold: DEFAULT_PRICE_FRESHNESS,
        }
    }
}

impl Default for MintConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MINT_MAX_ATTEMPTS,
            attempt_timeout: DEFAULT_MINT_ATTEMPT_TIMEOUT,
            poll_interval: DEFAULT_MINT_POLL_INTERVAL,
            backoff_base: DEFAULT_MINT_BACKOFF_BASE,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("AGT_HOST").ok().unwrap_or_else(|| DEFAULT_AGT_HOST.into());
        let port = env::var("AGT_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for AGT_PORT. {e} Using the default, {DEFAULT_AGT_PORT}, instead."
                    );
                    DEFAULT_AGT_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_AGT_PORT);
        let database_url = env::var("AGT_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ AGT_DATABASE_URL is not set. Please set it to the URL for the settlement database.");
            String::default()
        });
        let webhook = WebhookConfig::from_env_or_default();
        let prices = PriceConfig::from_env_or_default();
        let minting = MintConfig::from_env_or_default();
        let chain = ChainConfig::new_from_env_or_default();
        let pinning = PinningConfig::new_from_env_or_default();
        Self { host, port, database_url, webhook, prices, minting, chain, pinning }
    }
}

impl WebhookConfig {
    pub fn from_env_or_default() -> Self {
        let hmac_secret = Secret::from_env("AGT_WEBHOOK_HMAC_SECRET");
        if hmac_secret.is_unset() {
            error!("🪛️ AGT_WEBHOOK_HMAC_SECRET is not set. Every signed webhook will be rejected.");
        }
        let hmac_header =
            env::var("AGT_WEBHOOK_HMAC_HEADER").ok().unwrap_or_else(|| "X-Gateway-Signature".to_string());
        let hmac_checks = parse_boolean_flag(env::var("AGT_WEBHOOK_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🚨️ Webhook HMAC checks are DISABLED. Anyone can post forged payment events to this server.");
        }
        Self { hmac_secret, hmac_header, hmac_checks }
    }
}

impl PriceConfig {
    pub fn from_env_or_default() -> Self {
        let feed_url = env::var("AGT_PRICE_FEED_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ AGT_PRICE_FEED_URL is not set. The price poller will be disabled.");
            String::default()
        });
        let symbols = env::var("AGT_PRICE_SYMBOLS")
            .ok()
            .map(|s| s.split(',').map(|sym| sym.trim().to_uppercase()).filter(|sym| !sym.is_empty()).collect())
            .unwrap_or_else(|| {
                info!("🪛️ AGT_PRICE_SYMBOLS is not set. Using WHEAT,MAIZE,SOY as default.");
                vec!["WHEAT".into(), "MAIZE".into(), "SOY".into()]
            });
        let poll_interval = duration_from_env("AGT_PRICE_POLL_INTERVAL_SECS", DEFAULT_PRICE_POLL_INTERVAL);
        let freshness_threshold = duration_from_env("AGT_PRICE_FRESHNESS_SECS", DEFAULT_PRICE_FRESHNESS);
        Self { feed_url, symbols, poll_interval, freshness_threshold }
    }
}

impl MintConfig {
    pub fn from_env_or_default() -> Self {
        let max_attempts = env::var("AGT_MINT_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| {
                s.parse::<u32>().map_err(|e| warn!("🪛️ Invalid value for AGT_MINT_MAX_ATTEMPTS. {e}")).ok()
            })
            .unwrap_or(DEFAULT_MINT_MAX_ATTEMPTS);
        let attempt_timeout = duration_from_env("AGT_MINT_ATTEMPT_TIMEOUT_SECS", DEFAULT_MINT_ATTEMPT_TIMEOUT);
        let poll_interval = duration_from_env("AGT_MINT_POLL_INTERVAL_SECS", DEFAULT_MINT_POLL_INTERVAL);
        let backoff_base = duration_from_env("AGT_MINT_BACKOFF_BASE_SECS", DEFAULT_MINT_BACKOFF_BASE);
        Self { max_attempts, attempt_timeout, poll_interval, backoff_base }
    }
}

fn duration_from_env(key: &str, default: Duration) -> Duration {
    env::var(key)
        .map_err(|_| info!("🪛️ {key} is not set. Using the default value of {}s.", default.as_secs()))
        .and_then(|s| {
            s.parse::<u64>().map(Duration::from_secs).map_err(|e| warn!("🪛️ Invalid configuration value for {key}. {e}"))
        })
        .ok()
        .unwrap_or(default)
}
