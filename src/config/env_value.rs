// ABOUTME: Config values that are either literals or read from the environment.
// ABOUTME: Keeps passwords out of config files by referencing an env var instead.

use crate::error::{Error, Result};
use secrecy::SecretString;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    pub fn resolve(&self) -> Result<String> {
        match self {
            EnvValue::Literal(s) => Ok(s.clone()),
            EnvValue::FromEnv { var, default } => match std::env::var(var) {
                Ok(val) => Ok(val),
                Err(_) => default
                    .clone()
                    .ok_or_else(|| Error::MissingEnvVar(var.clone())),
            },
        }
    }

    /// Resolve into a secret so the value never shows up in Debug output.
    pub fn resolve_secret(&self) -> Result<SecretString> {
        self.resolve().map(SecretString::new)
    }
}

/// Read a secret straight from a named environment variable.
pub fn secret_from_env(var: &str) -> Result<SecretString> {
    EnvValue::FromEnv {
        var: var.to_string(),
        default: None,
    }
    .resolve_secret()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn literal_resolves_to_itself() {
        let value: EnvValue = serde_yaml::from_str("s3cret").unwrap();
        assert_eq!(value.resolve().unwrap(), "s3cret");
    }

    #[test]
    fn env_reference_reads_variable() {
        let value: EnvValue = serde_yaml::from_str("env: SSHRUN_TEST_ENV_VALUE").unwrap();
        temp_env::with_var("SSHRUN_TEST_ENV_VALUE", Some("from-env"), || {
            assert_eq!(value.resolve_secret().unwrap().expose_secret(), "from-env");
        });
    }

    #[test]
    fn env_reference_falls_back_to_default() {
        let value: EnvValue =
            serde_yaml::from_str("{ env: SSHRUN_TEST_UNSET_VAR, default: fallback }").unwrap();
        temp_env::with_var_unset("SSHRUN_TEST_UNSET_VAR", || {
            assert_eq!(value.resolve().unwrap(), "fallback");
        });
    }

    #[test]
    fn missing_env_var_without_default_is_an_error() {
        temp_env::with_var_unset("SSHRUN_TEST_UNSET_VAR", || {
            let err = secret_from_env("SSHRUN_TEST_UNSET_VAR").unwrap_err();
            assert!(matches!(err, Error::MissingEnvVar(ref v) if v == "SSHRUN_TEST_UNSET_VAR"));
        });
    }
}
