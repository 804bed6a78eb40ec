//! Configuration validation

use crate::{AppConfig, ChainConfig, ConfigError, Result, StoreBackend};

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the entire application configuration, reporting every problem
/// found rather than the first
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let mut errors = Vec::new();

    // Network
    if let Err(e) = validate_log_level(&config.network.log_level) {
        errors.push(e);
    }

    if config.network.metrics_enabled && config.network.metrics_port == 0 {
        errors.push(ValidationError::new(
            "network.metrics_port",
            "metrics port must be greater than 0",
        ));
    }

    if config.network.api_port == 0 {
        errors.push(ValidationError::new(
            "network.api_port",
            "api port must be greater than 0",
        ));
    } else if config.network.metrics_enabled
        && config.network.api_port == config.network.metrics_port
    {
        errors.push(ValidationError::new(
            "network.api_port",
            "api port must differ from the metrics port",
        ));
    }

    // Chains
    for (chain_name, chain_config) in &config.chains {
        if let Err(e) = validate_chain_config(chain_config) {
            errors.push(ValidationError::new(format!("chains.{chain_name}"), e));
        }
    }

    // Timelocks: each window must end after the previous one
    let timelocks = &config.timelocks;
    if timelocks.withdrawal_secs == 0 {
        errors.push(ValidationError::new(
            "timelocks.withdrawal_secs",
            "must be greater than 0",
        ));
    }
    if timelocks.public_withdrawal_secs <= timelocks.withdrawal_secs {
        errors.push(ValidationError::new(
            "timelocks.public_withdrawal_secs",
            "must be greater than withdrawal_secs",
        ));
    }
    if timelocks.cancellation_secs <= timelocks.public_withdrawal_secs {
        errors.push(ValidationError::new(
            "timelocks.cancellation_secs",
            "must be greater than public_withdrawal_secs",
        ));
    }

    // Coordinator
    if config.coordinator.grace_period_secs == 0 {
        errors.push(ValidationError::new(
            "coordinator.grace_period_secs",
            "must be greater than 0",
        ));
    }

    if config.coordinator.grace_period_secs >= timelocks.withdrawal_secs {
        errors.push(ValidationError::new(
            "coordinator.grace_period_secs",
            format!(
                "grace period {}s must be shorter than the exclusive withdrawal window {}s",
                config.coordinator.grace_period_secs, timelocks.withdrawal_secs
            ),
        ));
    }

    if config.coordinator.poll_interval_ms == 0 {
        errors.push(ValidationError::new(
            "coordinator.poll_interval_ms",
            "must be greater than 0",
        ));
    }

    if config.coordinator.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "coordinator.sweep_interval_secs",
            "must be greater than 0",
        ));
    }

    if config.coordinator.store == StoreBackend::Sqlite
        && config.coordinator.database_path.is_empty()
    {
        errors.push(ValidationError::new(
            "coordinator.database_path",
            "database path is required for the sqlite store",
        ));
    }

    if config.auction.default_duration_secs == 0 {
        errors.push(ValidationError::new(
            "auction.default_duration_secs",
            "must be greater than 0",
        ));
    }

    // Resolver
    if config.resolver.min_profit_bps > 10000 {
        errors.push(ValidationError::new(
            "resolver.min_profit_bps",
            "must be <= 10000 (100%)",
        ));
    }

    if config.resolver.safety_deposit_bps > 10000 {
        errors.push(ValidationError::new(
            "resolver.safety_deposit_bps",
            "must be <= 10000 (100%)",
        ));
    }

    if config.resolver.retry_initial_delay_ms > config.resolver.retry_max_delay_ms {
        errors.push(ValidationError::new(
            "resolver.retry_initial_delay_ms",
            "must not exceed retry_max_delay_ms",
        ));
    }

    for chain_id in &config.resolver.supported_chains {
        if !config.chains.contains_key(chain_id) {
            errors.push(ValidationError::new(
                "resolver.supported_chains",
                format!("chain '{chain_id}' not found in chains config"),
            ));
        }
    }

    if !errors.is_empty() {
        let error_msg = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ConfigError::ValidationError(error_msg));
    }

    Ok(())
}

pub fn validate_chain_config(chain: &ChainConfig) -> std::result::Result<(), String> {
    if chain.chain_id.is_empty() {
        return Err("chain_id is required".to_string());
    }

    validate_url(&chain.rpc_url)?;

    if chain.poll_interval_ms == 0 {
        return Err("poll_interval_ms must be greater than 0".to_string());
    }

    if chain.timeout_ms == 0 {
        return Err("timeout_ms must be greater than 0".to_string());
    }

    Ok(())
}

pub fn validate_url(url: &str) -> std::result::Result<(), String> {
    if url.is_empty() {
        return Err("URL cannot be empty".to_string());
    }

    if !url.starts_with("http://")
        && !url.starts_with("https://")
        && !url.starts_with("ws://")
        && !url.starts_with("wss://")
    {
        return Err("URL must start with http://, https://, ws://, or wss://".to_string());
    }

    Ok(())
}

fn validate_log_level(level: &str) -> std::result::Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new(
            "network.log_level",
            format!(
                "invalid log level '{level}', must be one of: trace, debug, info, warn, error"
            ),
        )),
    }
}
