//! A leftover resource paired with the operation that deletes it

use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type DeleteFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// One resource to sweep.
///
/// The delete closure owns whatever it needs to run (client, resource
/// metadata) and may be called more than once, so it should be idempotent or
/// naturally convergent.
#[derive(Clone)]
pub struct SweepUnit {
    id: String,
    delete: DeleteFn,
}

impl SweepUnit {
    pub fn new<F, Fut>(id: impl Into<String>, delete: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            id: id.into(),
            delete: Arc::new(move || delete().boxed()),
        }
    }

    /// Identifier used in logs and in the aggregated error
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn delete(&self) -> anyhow::Result<()> {
        (self.delete)().await
    }
}

impl fmt::Debug for SweepUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SweepUnit").field("id", &self.id).finish()
    }
}
