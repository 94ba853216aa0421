//! In-memory stand-ins for AWS behavior
//!
//! These fakes return [`ApiError`]s with real AWS codes so the production
//! classifier sees the same errors it would see from the SDK.

use std::collections::VecDeque;
use std::future::Ready;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tfaws_common::ApiError;

/// One scripted result: `Ok(())` or the AWS error code to fail with
pub type Step = Result<(), &'static str>;

/// An operation that replays a fixed sequence of outcomes.
///
/// Once the script runs out, the last step repeats. Calls are counted so
/// tests can assert how often a retry loop invoked it.
#[derive(Debug)]
pub struct ScriptedOperation {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Step>,
    calls: AtomicU32,
}

impl ScriptedOperation {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        let steps: VecDeque<Step> = steps.into_iter().collect();
        let last = steps.back().copied().unwrap_or(Ok(()));
        Arc::new(Self {
            steps: Mutex::new(steps),
            last: Mutex::new(last),
            calls: AtomicU32::new(0),
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::new([Ok(())])
    }

    /// Fail `times` times with `code`, then succeed.
    pub fn failing(code: &'static str, times: usize) -> Arc<Self> {
        Self::new(std::iter::repeat(Err(code)).take(times).chain([Ok(())]))
    }

    pub fn always_failing(code: &'static str) -> Arc<Self> {
        Self::new([Err(code)])
    }

    /// Run the next step.
    pub fn call(&self) -> anyhow::Result<()> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let step = self
            .steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let step = match step {
            Some(step) => step,
            None => *self.last.lock().unwrap_or_else(PoisonError::into_inner),
        };

        step.map_err(|code| ApiError::new(code, format!("scripted failure on call {n}")).into())
    }

    /// A delete closure for `SweepUnit::new` backed by this script
    pub fn as_delete(
        self: &Arc<Self>,
    ) -> impl Fn() -> Ready<anyhow::Result<()>> + Send + Sync + 'static {
        let op = Arc::clone(self);
        move || std::future::ready(op.call())
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Records how many tasks are inside a section at once.
#[derive(Debug, Default)]
pub struct ConcurrencyProbe {
    current: AtomicUsize,
    max: AtomicUsize,
    entries: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Enter the section; leaving happens when the guard drops.
    pub fn enter(&self) -> ProbeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        self.entries.fetch_add(1, Ordering::SeqCst);
        ProbeGuard { probe: self }
    }

    /// Stay inside the section for `duration`.
    pub async fn hold(&self, duration: Duration) {
        let _guard = self.enter();
        tokio::time::sleep(duration).await;
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous occupants seen
    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }

    pub fn entries(&self) -> usize {
        self.entries.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct ProbeGuard<'a> {
    probe: &'a ConcurrencyProbe,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.probe.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct TokenState {
    issued: u32,
    current: Option<String>,
    consumed: u32,
    stale: u32,
}

/// A change-token service with WAF's rules.
///
/// Only the most recently issued token is valid, and only once. Issuing a
/// new token or consuming the current one makes every older token stale,
/// which is reported as `WAFStaleDataException`.
#[derive(Debug, Default)]
pub struct FakeTokenServer {
    state: Mutex<TokenState>,
}

impl FakeTokenServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, TokenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a new token, superseding the previous one.
    pub fn issue(&self) -> String {
        let mut state = self.state();
        state.issued += 1;
        let token = format!("token-{:04}", state.issued);
        state.current = Some(token.clone());
        token
    }

    /// Use `token` for a mutating call.
    pub fn consume(&self, token: &str) -> Result<(), ApiError> {
        let mut state = self.state();
        if state.current.as_deref() == Some(token) {
            state.current = None;
            state.consumed += 1;
            Ok(())
        } else {
            state.stale += 1;
            Err(ApiError::new(
                "WAFStaleDataException",
                format!("The input token {token} is no longer current."),
            ))
        }
    }

    /// Simulate another process taking a token out from under us.
    pub fn interfere(&self) {
        self.issue();
    }

    pub fn issued(&self) -> u32 {
        self.state().issued
    }

    pub fn consumed(&self) -> u32 {
        self.state().consumed
    }

    /// Number of calls rejected with a stale token
    pub fn stale_rejections(&self) -> u32 {
        self.state().stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfaws_common::ErrorReason;

    #[test]
    fn test_script_replays_then_repeats_last() {
        let op = ScriptedOperation::new([Err("Throttling"), Ok(()), Err("NoSuchEntity")]);

        assert!(op.call().is_err());
        assert!(op.call().is_ok());
        let err = op.call().unwrap_err();
        assert!(err.to_string().starts_with("NoSuchEntity:"));
        assert!(op.call().is_err());
        assert_eq!(op.calls(), 4);
    }

    #[test]
    fn test_failing_then_succeeding() {
        let op = ScriptedOperation::failing("ThrottlingException", 2);
        assert!(op.call().is_err());
        assert!(op.call().is_err());
        assert!(op.call().is_ok());
        assert!(op.call().is_ok());
    }

    #[test]
    fn test_probe_tracks_max() {
        let probe = ConcurrencyProbe::new();
        {
            let _a = probe.enter();
            let _b = probe.enter();
            assert_eq!(probe.current(), 2);
        }
        let _c = probe.enter();
        assert_eq!(probe.current(), 1);
        assert_eq!(probe.max(), 2);
        assert_eq!(probe.entries(), 3);
    }

    #[test]
    fn test_token_server_rejects_superseded_tokens() {
        let server = FakeTokenServer::new();

        let first = server.issue();
        let second = server.issue();
        let err = server.consume(&first).unwrap_err();
        assert_eq!(err.classify().reason, ErrorReason::StaleToken);

        server.consume(&second).unwrap();
        // Tokens are single use
        assert!(server.consume(&second).is_err());

        let third = server.issue();
        server.interfere();
        assert!(server.consume(&third).is_err());

        assert_eq!(server.issued(), 4);
        assert_eq!(server.consumed(), 1);
        assert_eq!(server.stale_rejections(), 3);
    }
}
