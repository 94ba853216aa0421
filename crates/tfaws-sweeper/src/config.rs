//! Sweeper configuration from the environment

use crate::error::ConfigError;
use crate::sweep::Sweeper;
use crate::wait::RetryPolicy;
use std::time::Duration;
use tfaws_common::defaults::{DEFAULT_ASSUME_ROLE_DURATION_SECS, DEFAULT_MAX_RETRIES};

pub const AWS_PROFILE: &str = "AWS_PROFILE";
pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const AWS_CONTAINER_CREDENTIALS_FULL_URI: &str = "AWS_CONTAINER_CREDENTIALS_FULL_URI";
pub const TF_AWS_ASSUME_ROLE_ARN: &str = "TF_AWS_ASSUME_ROLE_ARN";
pub const TF_AWS_ASSUME_ROLE_DURATION: &str = "TF_AWS_ASSUME_ROLE_DURATION";
pub const TF_AWS_ASSUME_ROLE_EXTERNAL_ID: &str = "TF_AWS_ASSUME_ROLE_EXTERNAL_ID";
pub const TF_AWS_ASSUME_ROLE_SESSION_NAME: &str = "TF_AWS_ASSUME_ROLE_SESSION_NAME";

/// Role the sweeper assumes before talking to AWS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleConfig {
    pub role_arn: String,
    pub duration: Duration,
    pub external_id: Option<String>,
    pub session_name: Option<String>,
}

/// Credentials and client settings for sweeper runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweeperConfig {
    /// Named profile (overrides default credential resolution)
    pub profile: Option<String>,
    pub assume_role: Option<AssumeRoleConfig>,
    /// SDK-level retries per API call, on top of the sweeper's own retries
    pub max_retries: u32,
}

impl SweeperConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, treating empty values as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let credential_sources = [
            AWS_PROFILE,
            AWS_ACCESS_KEY_ID,
            AWS_CONTAINER_CREDENTIALS_FULL_URI,
        ];
        if credential_sources.iter().all(|&name| get(name).is_none()) {
            return Err(ConfigError::MissingCredentials {
                names: credential_sources.to_vec(),
                purpose: "credentials for running sweepers",
            });
        }

        if get(AWS_ACCESS_KEY_ID).is_some() && get(AWS_SECRET_ACCESS_KEY).is_none() {
            return Err(ConfigError::MissingSecretKey {
                name: AWS_SECRET_ACCESS_KEY,
                purpose: format!("static credentials value when using {AWS_ACCESS_KEY_ID}"),
            });
        }

        let assume_role = match get(TF_AWS_ASSUME_ROLE_ARN) {
            Some(role_arn) => {
                let duration = match get(TF_AWS_ASSUME_ROLE_DURATION) {
                    Some(value) => {
                        let secs = value.parse::<u64>().map_err(|source| {
                            ConfigError::InvalidDuration {
                                name: TF_AWS_ASSUME_ROLE_DURATION,
                                value: value.clone(),
                                source,
                            }
                        })?;
                        Duration::from_secs(secs)
                    }
                    None => Duration::from_secs(DEFAULT_ASSUME_ROLE_DURATION_SECS),
                };

                Some(AssumeRoleConfig {
                    role_arn,
                    duration,
                    external_id: get(TF_AWS_ASSUME_ROLE_EXTERNAL_ID),
                    session_name: get(TF_AWS_ASSUME_ROLE_SESSION_NAME),
                })
            }
            None => None,
        };

        Ok(Self {
            profile: get(AWS_PROFILE),
            assume_role,
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// SDK max attempts (first attempt plus retries)
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Retry policy for sweep units
    pub fn sweep_policy(&self) -> RetryPolicy {
        Sweeper::default_policy()
    }

    /// Sweeper using this configuration's policy
    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new().with_policy(self.sweep_policy())
    }
}
