//! Engine configuration.

use std::str::FromStr;

use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RecoveryCodesConfig {
    /// Maximum number of live codes per user.
    pub max_count: usize,
    /// Characters per generated code.
    pub code_length: usize,
}

impl Default for RecoveryCodesConfig {
    fn default() -> Self {
        Self {
            max_count: 10,
            code_length: 10,
        }
    }
}

/// Settings of [`Commands`](crate::Commands).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Automatic reload/revalidate/repush attempts after an optimistic
    /// concurrency rejection. `0` leaves retrying to the caller.
    pub max_conflict_retries: u32,
    pub recovery_codes: RecoveryCodesConfig,
    /// Failed recovery code checks before the user is locked; `0` disables
    /// the lockout.
    pub max_recovery_code_attempts: u32,
    /// Whether org domains must be verified when no org policy says otherwise.
    pub validate_org_domains: bool,
    /// Suffix of the primary domain generated for new organisations.
    pub instance_domain: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 0,
            recovery_codes: RecoveryCodesConfig::default(),
            max_recovery_code_attempts: 0,
            validate_org_domains: true,
            instance_domain: "localhost".to_string(),
        }
    }
}

impl CommandsConfig {
    /// Read `WARDEN_*` variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Invalid values are logged
    /// and replaced by the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            max_conflict_retries: parse_var(
                &lookup,
                "WARDEN_MAX_CONFLICT_RETRIES",
                defaults.max_conflict_retries,
            ),
            recovery_codes: RecoveryCodesConfig {
                max_count: parse_var(
                    &lookup,
                    "WARDEN_RECOVERY_CODES_MAX_COUNT",
                    defaults.recovery_codes.max_count,
                ),
                code_length: parse_var(
                    &lookup,
                    "WARDEN_RECOVERY_CODES_LENGTH",
                    defaults.recovery_codes.code_length,
                ),
            },
            max_recovery_code_attempts: parse_var(
                &lookup,
                "WARDEN_MAX_RECOVERY_CODE_ATTEMPTS",
                defaults.max_recovery_code_attempts,
            ),
            validate_org_domains: parse_var(
                &lookup,
                "WARDEN_VALIDATE_ORG_DOMAINS",
                defaults.validate_org_domains,
            ),
            instance_domain: lookup("WARDEN_INSTANCE_DOMAIN")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.instance_domain),
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(%key, value = %raw, %default, "invalid configuration value; using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn missing_variables_yield_defaults() {
        assert_eq!(CommandsConfig::from_lookup(lookup(&[])), CommandsConfig::default());
    }

    #[test]
    fn variables_override_defaults() {
        let config = CommandsConfig::from_lookup(lookup(&[
            ("WARDEN_MAX_CONFLICT_RETRIES", "3"),
            ("WARDEN_RECOVERY_CODES_MAX_COUNT", "5"),
            ("WARDEN_VALIDATE_ORG_DOMAINS", "false"),
            ("WARDEN_INSTANCE_DOMAIN", "warden.test"),
        ]));
        assert_eq!(config.max_conflict_retries, 3);
        assert_eq!(config.recovery_codes.max_count, 5);
        assert_eq!(config.recovery_codes.code_length, 10);
        assert!(!config.validate_org_domains);
        assert_eq!(config.instance_domain, "warden.test");
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = CommandsConfig::from_lookup(lookup(&[("WARDEN_MAX_CONFLICT_RETRIES", "many")]));
        assert_eq!(config.max_conflict_retries, 0);
    }
}
