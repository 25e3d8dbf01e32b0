use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::de::DeserializeOwned;

/// Load a typed configuration section from `configuration.*` (optional) and
/// `APP__`-prefixed environment variables, with `.env` support.
pub fn load_config<T: DeserializeOwned>() -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let config = Cfg::builder()
        .add_source(File::with_name("configuration").required(false))
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;

    Ok(config.try_deserialize()?)
}
