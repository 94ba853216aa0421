//! AWS SDK plumbing for sweepers
//!
//! - context: SDK configuration with profile, retry and assume-role settings
//! - clients: per-region client cache
//! - error: SDK errors mapped onto [`tfaws_common::ApiError`]
//! - waf: change-token retries bound to a WAF Regional client

pub mod clients;
pub mod context;
pub mod error;
pub mod waf;

pub use clients::{RegionalClients, aws_regional_clients};
pub use context::AwsContext;
pub use error::{SdkResultExt, sdk_api_error};
pub use waf::WafRegionalRetryer;
