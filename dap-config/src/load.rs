use serde::de::DeserializeOwned;
use std::path::Path;

use crate::environment::Environment;

/// Directory, relative to the working directory, holding the YAML files.
const CONFIGURATION_DIR: &str = "configuration";

/// File loaded for every environment before the environment-specific one.
const BASE_CONFIG_FILE: &str = "base.yaml";

/// Prefix of environment variables overriding file values.
const ENV_PREFIX: &str = "APP";

const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested keys, e.g. `APP_API__CLIENT_ID` sets `api.client_id`.
const ENV_SEPARATOR: &str = "__";

/// Separator for list values, e.g. `APP_REPLICATION__TABLES=users,courses`.
const LIST_SEPARATOR: &str = ",";

/// Implemented by configuration roots that can be loaded with [`load_config`].
pub trait Config {
    /// Keys whose environment variable values are split on `,` into lists.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Errors raised while locating or reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    #[error("failed to parse `APP_ENVIRONMENT`: {0}")]
    Environment(#[source] std::io::Error),

    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),
}

/// Loads configuration from the `configuration` directory of the current working directory.
///
/// Sources are layered in this order, later ones winning:
/// 1. `configuration/base.yaml`
/// 2. `configuration/{APP_ENVIRONMENT}.yaml`
/// 3. `APP_` prefixed environment variables
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let environment = Environment::load().map_err(LoadConfigError::Environment)?;

    load_config_from(&base_path.join(CONFIGURATION_DIR), environment)
}

/// Loads configuration from an explicit directory and environment.
pub fn load_config_from<T>(
    configuration_directory: &Path,
    environment: Environment,
) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let mut environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    if !T::LIST_PARSE_KEYS.is_empty() {
        environment_source = environment_source
            .try_parsing(true)
            .list_separator(LIST_SEPARATOR);

        for key in T::LIST_PARSE_KEYS {
            environment_source = environment_source.with_list_parse_key(key);
        }
    }

    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join(BASE_CONFIG_FILE),
        ))
        .add_source(config::File::from(
            configuration_directory.join(environment.config_file_name()),
        ))
        .add_source(environment_source)
        .build()?;

    Ok(settings.try_deserialize::<T>()?)
}
