use std::fmt;
use std::io::Error;
use std::str::FromStr;

/// Environment variable selecting which environment file is layered on top of `base.yaml`.
const APP_ENVIRONMENT_ENV_NAME: &str = "APP_ENVIRONMENT";

const PROD_ENV_NAME: &str = "prod";
const STAGING_ENV_NAME: &str = "staging";
const DEV_ENV_NAME: &str = "dev";

/// Deployment the replicator runs in.
///
/// Selects the environment-specific configuration file and the logging
/// backend: production-like environments write JSON logs to rolling files,
/// development writes pretty logs to the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Scheduled production runs.
    Prod,
    /// Scheduled runs against a staging database.
    Staging,
    /// Ad-hoc runs from a workstation.
    Dev,
}

impl Environment {
    /// Reads the environment from `APP_ENVIRONMENT`.
    ///
    /// Falls back to [`Environment::Prod`] when the variable is unset.
    pub fn load() -> Result<Environment, Error> {
        match std::env::var(APP_ENVIRONMENT_ENV_NAME) {
            Ok(value) => value.parse(),
            Err(_) => Ok(Environment::Prod),
        }
    }

    /// Exports this environment through `APP_ENVIRONMENT` for the current process.
    pub fn set(&self) {
        unsafe { std::env::set_var(APP_ENVIRONMENT_ENV_NAME, self.to_string()) }
    }

    /// Returns `true` for [`Environment::Prod`] and [`Environment::Staging`].
    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod | Self::Staging)
    }

    /// Name of the YAML file holding this environment's overrides.
    pub fn config_file_name(&self) -> String {
        format!("{self}.yaml")
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Environment::Prod => PROD_ENV_NAME,
            Environment::Staging => STAGING_ENV_NAME,
            Environment::Dev => DEV_ENV_NAME,
        };

        f.write_str(name)
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            PROD_ENV_NAME => Ok(Self::Prod),
            STAGING_ENV_NAME => Ok(Self::Staging),
            DEV_ENV_NAME => Ok(Self::Dev),
            other => Err(Error::other(format!(
                "`{other}` is not a supported environment, use `{PROD_ENV_NAME}`, `{STAGING_ENV_NAME}` or `{DEV_ENV_NAME}`",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_environment_names_case_insensitively() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert_eq!(" staging ".parse::<Environment>().unwrap(), Environment::Staging);
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Dev);
        assert!("local".parse::<Environment>().is_err());
    }

    #[test]
    fn config_file_name_follows_environment() {
        assert_eq!(Environment::Staging.config_file_name(), "staging.yaml");
        assert!(Environment::Staging.is_prod());
        assert!(!Environment::Dev.is_prod());
    }
}
