use serde::Deserialize;
use service_core::config::load_config;
use service_core::error::AppError;

/// Engine configuration: numbering defaults, invoice payment terms, and
/// how many times optimistic-concurrency conflicts are retried.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_invoice_prefix")]
    pub invoice_number_prefix: String,
    #[serde(default = "default_quote_prefix")]
    pub quote_number_prefix: String,
    #[serde(default = "default_number_padding")]
    pub number_padding: i32,
    #[serde(default = "default_payment_terms_days")]
    pub payment_terms_days: i64,
    #[serde(default = "default_max_write_attempts")]
    pub max_write_attempts: u32,
}

fn default_invoice_prefix() -> String {
    "INV-".to_string()
}

fn default_quote_prefix() -> String {
    "QUO-".to_string()
}

fn default_number_padding() -> i32 {
    4
}

fn default_payment_terms_days() -> i64 {
    30
}

fn default_max_write_attempts() -> u32 {
    3
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            invoice_number_prefix: default_invoice_prefix(),
            quote_number_prefix: default_quote_prefix(),
            number_padding: default_number_padding(),
            payment_terms_days: default_payment_terms_days(),
            max_write_attempts: default_max_write_attempts(),
        }
    }
}

impl LedgerConfig {
    pub fn load() -> Result<Self, AppError> {
        let config: Self = load_config()?;
        config.check()?;
        Ok(config)
    }

    /// Reject configurations the numbering sequencer cannot honor.
    pub fn check(&self) -> Result<(), AppError> {
        if !(2..=10).contains(&self.number_padding) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "number_padding must be between 2 and 10, got {}",
                self.number_padding
            )));
        }
        if self.payment_terms_days < 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "payment_terms_days cannot be negative"
            )));
        }
        if self.max_write_attempts == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "max_write_attempts must be at least 1"
            )));
        }
        Ok(())
    }
}
