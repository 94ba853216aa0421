//! AWS integration tests for WAF Regional change tokens
//!
//! These tests call real AWS APIs and require credentials.
//!
//! Run with:
//! ```
//! AWS_PROFILE=your_profile cargo test --test aws_integration -- --ignored --nocapture
//! ```

use tfaws_sweeper::aws::{WafRegionalRetryer, aws_regional_clients};
use tfaws_sweeper::aws::error::SdkResultExt;
use tfaws_sweeper::{ChangeTokenRetryer, KeyedMutex, SweeperConfig};
use tfaws_test_utils::{get_test_region, init_tracing};

#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn test_change_token_round_trip() {
    init_tracing();

    let config = SweeperConfig::from_env().expect("sweeper credentials must be configured");
    let region = get_test_region();
    let clients = aws_regional_clients(config);
    let aws = clients.get(&region).await.expect("Failed to load AWS config");

    let waf = WafRegionalRetryer::from_context(&aws, ChangeTokenRetryer::new(KeyedMutex::new()));
    let client = waf.client().clone();

    let status = waf
        .retry_with_token(|token| {
            let client = client.clone();
            async move {
                let out = client
                    .get_change_token_status()
                    .change_token(token)
                    .send()
                    .await
                    .api_context("Failed to get change token status")?;
                anyhow::Ok(out.change_token_status().map(|s| s.as_str().to_string()))
            }
        })
        .await
        .expect("change token status");

    assert!(status.is_some());
}

#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn test_regional_clients_are_cached() {
    init_tracing();

    let config = SweeperConfig::from_env().expect("sweeper credentials must be configured");
    let region = get_test_region();
    let clients = aws_regional_clients(config);

    let a = clients.get(&region).await.unwrap();
    let b = clients.get(&region).await.unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));
    assert_eq!(a.region(), region);
}
