//! Change-token retries bound to a WAF Regional client

use super::context::AwsContext;
use super::error::SdkResultExt;
use crate::error::RetryError;
use crate::token::ChangeTokenRetryer;
use anyhow::Context;
use std::future::Future;
use tracing::debug;

/// Runs WAF Regional mutations with a fresh change token, one at a time per
/// region.
///
/// # Example
/// ```ignore
/// let locks = KeyedMutex::new();
/// let waf = WafRegionalRetryer::from_context(&aws, ChangeTokenRetryer::new(locks));
/// waf.retry_with_token(|token| {
///     let client = waf.client().clone();
///     async move {
///         client
///             .delete_rate_based_rule()
///             .rule_id(rule_id)
///             .change_token(token)
///             .send()
///             .await
///             .api_context("Failed to delete rate-based rule")
///     }
/// })
/// .await?;
/// ```
#[derive(Clone, Debug)]
pub struct WafRegionalRetryer {
    client: aws_sdk_wafregional::Client,
    region: String,
    retryer: ChangeTokenRetryer,
}

impl WafRegionalRetryer {
    pub fn new(
        client: aws_sdk_wafregional::Client,
        region: impl Into<String>,
        retryer: ChangeTokenRetryer,
    ) -> Self {
        Self {
            client,
            region: region.into(),
            retryer,
        }
    }

    pub fn from_context(ctx: &AwsContext, retryer: ChangeTokenRetryer) -> Self {
        Self::new(ctx.wafregional_client(), ctx.region(), retryer)
    }

    pub fn client(&self) -> &aws_sdk_wafregional::Client {
        &self.client
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Fetch a new change token.
    pub async fn get_change_token(&self) -> anyhow::Result<String> {
        let out = self
            .client
            .get_change_token()
            .send()
            .await
            .api_context("Failed to get WAF Regional change token")?;

        let token = out
            .change_token()
            .map(str::to_string)
            .context("GetChangeToken returned no token")?;
        debug!(region = %self.region, "Acquired WAF Regional change token");
        Ok(token)
    }

    /// Run `operation` with a fresh change token under this region's lock,
    /// retrying while the token comes back stale.
    pub async fn retry_with_token<T, F, Fut>(&self, operation: F) -> Result<T, RetryError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.retryer
            .run_with_token(&self.region, || self.get_change_token(), operation)
            .await
    }
}
