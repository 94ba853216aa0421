//! Shared AWS configuration context
//!
//! Loads SDK configuration once per region, applying the sweeper's profile,
//! retry and assume-role settings, and creates service clients from it.

use crate::config::SweeperConfig;
use aws_config::retry::RetryConfig;
use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, ConfigLoader, Region, SdkConfig};
use std::sync::Arc;
use tracing::{debug, info};

/// Loaded SDK configuration for one region.
///
/// # Example
/// ```ignore
/// let config = SweeperConfig::from_env()?;
/// let aws = AwsContext::new("us-west-2", &config).await;
/// let waf = aws.wafregional_client();
/// ```
#[derive(Clone)]
pub struct AwsContext {
    config: Arc<SdkConfig>,
    region: String,
}

impl AwsContext {
    /// Load AWS configuration for `region`.
    ///
    /// Credentials come from the named profile when one is configured and
    /// from the default chain otherwise. With an assume-role ARN the loaded
    /// credentials are only used to call STS; clients get the role's
    /// credentials.
    pub async fn new(region: &str, sweeper: &SweeperConfig) -> Self {
        let base = loader(region, sweeper).load().await;

        let config = match &sweeper.assume_role {
            Some(role) => {
                debug!(region, role_arn = %role.role_arn, "Assuming role for sweeper");
                let mut builder = AssumeRoleProvider::builder(role.role_arn.clone())
                    .region(Region::new(region.to_string()))
                    .session_length(role.duration)
                    .configure(&base);
                if let Some(external_id) = &role.external_id {
                    builder = builder.external_id(external_id.clone());
                }
                if let Some(session_name) = &role.session_name {
                    builder = builder.session_name(session_name.clone());
                }
                let provider = builder.build().await;

                loader(region, sweeper)
                    .credentials_provider(provider)
                    .load()
                    .await
            }
            None => base,
        };

        info!(
            region,
            profile = sweeper.profile.as_deref().unwrap_or("default"),
            assume_role = sweeper.assume_role.is_some(),
            max_attempts = sweeper.max_attempts(),
            "Loaded AWS configuration"
        );

        Self {
            config: Arc::new(config),
            region: region.to_string(),
        }
    }

    /// Get the underlying SDK config for direct client construction.
    pub fn sdk_config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Create a WAF Regional client from this context.
    pub fn wafregional_client(&self) -> aws_sdk_wafregional::Client {
        aws_sdk_wafregional::Client::new(self.sdk_config())
    }
}

fn loader(region: &str, sweeper: &SweeperConfig) -> ConfigLoader {
    let loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .retry_config(RetryConfig::standard().with_max_attempts(sweeper.max_attempts()));

    match &sweeper.profile {
        Some(profile) => loader.profile_name(profile),
        None => loader,
    }
}

impl std::fmt::Debug for AwsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsContext")
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn static_config() -> SweeperConfig {
        SweeperConfig {
            profile: None,
            assume_role: None,
            max_retries: 3,
        }
    }

    #[tokio::test]
    #[ignore = "loads the AWS credential chain"]
    async fn test_context_creation() {
        let ctx = AwsContext::new("us-west-2", &static_config()).await;
        assert_eq!(ctx.region(), "us-west-2");
        assert_eq!(
            ctx.sdk_config().region().map(|r| r.as_ref()),
            Some("us-west-2")
        );
        let _client = ctx.wafregional_client();
    }

    #[tokio::test]
    #[ignore = "loads the AWS credential chain"]
    async fn test_retry_config_applied() {
        let ctx = AwsContext::new("us-east-1", &static_config()).await;
        let retry = ctx.sdk_config().retry_config().cloned().unwrap();
        assert_eq!(retry.max_attempts(), 4);
    }
}
