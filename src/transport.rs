//! Connection policy and consistency configuration for the transport client.
//!
//! Pure translation of flat settings into the policy object handed to the
//! document-store transport. No I/O happens here; building the same
//! settings twice yields value-equal configurations.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{keys, Settings};
use crate::errors::SinkError;

/// Fixed identifier reported to the store for server-side observability.
const CONNECTOR_ID: &str = "docsink";

pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 9;
pub const DEFAULT_RETRY_MAX_WAIT: Duration = Duration::from_secs(30);

const REGION_DELIMITER: char = ';';

/// How the transport reaches the store.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    /// All requests routed through the service gateway.
    #[default]
    Gateway,
    /// Direct connectivity to replica nodes.
    Direct,
}

impl FromStr for ConnectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gateway" => Ok(Self::Gateway),
            "direct" => Ok(Self::Direct),
            other => Err(format!("unknown connection mode '{other}'")),
        }
    }
}

/// Read/write visibility guarantee negotiated with the store.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyLevel {
    Strong,
    BoundedStaleness,
    #[default]
    Session,
    Eventual,
}

impl FromStr for ConsistencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strong" => Ok(Self::Strong),
            "bounded_staleness" => Ok(Self::BoundedStaleness),
            "session" => Ok(Self::Session),
            "eventual" => Ok(Self::Eventual),
            other => Err(format!("unknown consistency level '{other}'")),
        }
    }
}

/// Throttle retry tuning applied by the transport, not the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryOptions {
    pub max_retry_attempts_on_throttle: u32,
    pub max_retry_wait: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retry_attempts_on_throttle: DEFAULT_RETRY_MAX_ATTEMPTS,
            max_retry_wait: DEFAULT_RETRY_MAX_WAIT,
        }
    }
}

/// Opaque account secret. Debug and Display never print the content.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Hand the raw secret to the transport.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(****)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

/// Full connection policy handed to the transport client.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionPolicy {
    pub mode: ConnectionMode,
    pub max_pool_size: Option<usize>,
    pub request_timeout: Option<Duration>,
    pub idle_connection_timeout: Option<Duration>,
    pub user_agent_suffix: String,
    pub preferred_regions: Vec<String>,
    pub retry: RetryOptions,
}

/// Immutable transport configuration, built once per pipeline instance.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub endpoint: String,
    pub credential: Credential,
    pub connection_policy: ConnectionPolicy,
    pub consistency_level: ConsistencyLevel,
}

impl TransportConfig {
    /// Build a transport configuration from flat settings.
    ///
    /// `endpoint` and `credential` must resolve; every other key has a
    /// default. Fails fast without partial construction.
    pub fn from_settings(settings: &Settings) -> Result<Self, SinkError> {
        let endpoint = settings.require(keys::ENDPOINT)?.to_owned();
        let credential = Credential::new(settings.require(keys::CREDENTIAL)?);

        let mode = settings
            .get::<ConnectionMode>(keys::CONNECTION_MODE)?
            .unwrap_or_default();
        let max_pool_size = settings.get::<usize>(keys::MAX_POOL_SIZE)?;
        let request_timeout = settings
            .get::<u64>(keys::REQUEST_TIMEOUT_MS)?
            .map(Duration::from_millis);
        let idle_connection_timeout = settings
            .get::<u64>(keys::IDLE_TIMEOUT_MS)?
            .map(Duration::from_millis);
        let preferred_regions = settings
            .get_str(keys::PREFERRED_REGIONS)
            .map(parse_region_list)
            .unwrap_or_default();
        let consistency_level = settings
            .get::<ConsistencyLevel>(keys::CONSISTENCY_LEVEL)?
            .unwrap_or_default();

        let mut retry = RetryOptions::default();
        if let Some(attempts) = settings.get::<u32>(keys::RETRY_MAX_ATTEMPTS)? {
            retry.max_retry_attempts_on_throttle = attempts;
        }
        if let Some(wait_ms) = settings.get::<u64>(keys::RETRY_MAX_WAIT_MS)? {
            retry.max_retry_wait = Duration::from_millis(wait_ms);
        }

        Ok(Self {
            endpoint,
            credential,
            connection_policy: ConnectionPolicy {
                mode,
                max_pool_size,
                request_timeout,
                idle_connection_timeout,
                user_agent_suffix: user_agent_suffix(),
                preferred_regions,
                retry,
            },
            consistency_level,
        })
    }
}

/// Split a delimiter-separated region list into trimmed names.
/// Empty entries (trailing delimiters, doubled delimiters) are dropped.
fn parse_region_list(raw: &str) -> Vec<String> {
    raw.split(REGION_DELIMITER)
        .map(str::trim)
        .filter(|region| !region.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Connector identifier plus process id. Server-side observability only.
fn user_agent_suffix() -> String {
    format!("{CONNECTOR_ID}-{}", std::process::id())
}
