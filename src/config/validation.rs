use crate::config::types::{Config, CrawlerConfig, ExtractorConfig, InputConfig, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Upper bound on concurrent fetch pipelines
const MAX_CONCURRENCY: u32 = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_input_config(&config.input)?;
    validate_output_config(&config.output)?;
    validate_extractor_config(&config.extractor)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency_limit < 1 || config.concurrency_limit > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "concurrency_limit must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.concurrency_limit
        )));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(
            "batch_size must be >= 1".to_string(),
        ));
    }

    if config.shard_size < 1 {
        return Err(ConfigError::Validation(
            "shard_size must be >= 1".to_string(),
        ));
    }

    if config.jitter_max_ms < config.jitter_min_ms {
        return Err(ConfigError::Validation(format!(
            "jitter_max_ms ({}) must be >= jitter_min_ms ({})",
            config.jitter_max_ms, config.jitter_min_ms
        )));
    }

    if config.fetch_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    // Validate contact URL
    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    // Validate contact email (basic validation)
    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates input configuration
fn validate_input_config(config: &InputConfig) -> Result<(), ConfigError> {
    if config.catalog_dir.is_empty() {
        return Err(ConfigError::Validation(
            "catalog_dir cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.shard_dir.is_empty() {
        return Err(ConfigError::Validation(
            "shard_dir cannot be empty".to_string(),
        ));
    }

    if config.ledger_path.is_empty() {
        return Err(ConfigError::Validation(
            "ledger_path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.as_deref() == Some("") {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Every extractor selector must parse as CSS
fn validate_extractor_config(config: &ExtractorConfig) -> Result<(), ConfigError> {
    for (field, selector) in config.selectors() {
        if Selector::parse(selector).is_err() {
            return Err(ConfigError::InvalidSelector {
                field: field.to_string(),
                selector: selector.to_string(),
            });
        }
    }
    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    // Domain part should contain at least one dot
    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
