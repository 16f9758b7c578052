use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use psbt_swap::{Network, RetryPolicy};
use url::Url;

const DEFAULT_SIGNER_URL: &str = "http://127.0.0.1:8789/rpc";
const DEFAULT_CAPABILITY_MAX_ATTEMPTS: u64 = 20;
const DEFAULT_CAPABILITY_RETRY_DELAY_MS: u64 = 100;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub network: Network,
    pub esplora_url: String,
    pub signer_url: String,
    pub capability_max_attempts: u64,
    pub capability_retry_delay_ms: u64,
    pub http_timeout_secs: u64,
}

impl CliConfig {
    /// Read `PSBT_SWAP_*` variables; the Esplora default follows `network`.
    pub fn from_env(network: Network) -> Result<Self> {
        let esplora_url =
            env_var_or_default("PSBT_SWAP_ESPLORA_URL", network.default_esplora_url());
        let signer_url = env_var_or_default("PSBT_SWAP_SIGNER_URL", DEFAULT_SIGNER_URL);

        let capability_max_attempts = parse_u64_env(
            "PSBT_SWAP_CAPABILITY_MAX_ATTEMPTS",
            DEFAULT_CAPABILITY_MAX_ATTEMPTS,
        )?;
        let capability_retry_delay_ms = parse_u64_env(
            "PSBT_SWAP_CAPABILITY_RETRY_DELAY_MS",
            DEFAULT_CAPABILITY_RETRY_DELAY_MS,
        )?;
        let http_timeout_secs =
            parse_u64_env("PSBT_SWAP_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;

        Ok(Self {
            network,
            esplora_url,
            signer_url,
            capability_max_attempts,
            capability_retry_delay_ms,
            http_timeout_secs,
        })
    }

    pub fn validate(&self) -> Result<()> {
        validate_http_url("PSBT_SWAP_ESPLORA_URL", &self.esplora_url)?;
        validate_http_url("PSBT_SWAP_SIGNER_URL", &self.signer_url)?;

        if self.capability_max_attempts == 0 || self.capability_max_attempts > u64::from(u32::MAX)
        {
            bail!("PSBT_SWAP_CAPABILITY_MAX_ATTEMPTS must be in 1..={}", u32::MAX);
        }

        if self.capability_retry_delay_ms == 0 {
            bail!("PSBT_SWAP_CAPABILITY_RETRY_DELAY_MS must be > 0");
        }

        if self.http_timeout_secs == 0 {
            bail!("PSBT_SWAP_HTTP_TIMEOUT_SECS must be > 0");
        }

        Ok(())
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: u32::try_from(self.capability_max_attempts).unwrap_or(u32::MAX),
            delay: Duration::from_millis(self.capability_retry_delay_ms),
        }
    }

    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn validate_http_url(key: &str, raw: &str) -> Result<()> {
    let url = Url::parse(raw).with_context(|| format!("{key} must be a valid URL"))?;

    match url.scheme() {
        "http" | "https" => {}
        other => bail!("{key} scheme must be http or https; got '{other}'"),
    }

    if url.host_str().is_none() {
        bail!("{key} must include a host");
    }

    Ok(())
}

fn env_var_or_default(key: &str, default_value: &str) -> String {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default_value.to_string())
}

fn parse_u64_env(key: &str, default_value: u64) -> Result<u64> {
    let raw = env_var_or_default(key, &default_value.to_string());
    u64::from_str(raw.trim()).with_context(|| format!("{key} must be a valid u64 integer"))
}
