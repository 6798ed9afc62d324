// src/probe.rs
//! Deferred one-shot feature probe: `unchecked -> probing -> done`.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ProbeConfig;
use crate::upstream::FlagEndpoint;

/// Status the feature endpoint answers with when the feature is switched off.
pub const FORBIDDEN: u16 = 403;

const UNCHECKED: u8 = 0;
const PROBING: u8 = 1;
const DONE_ENABLED: u8 = 2;
const DONE_DISABLED: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProbeState {
    Unchecked,
    Probing,
    Done { enabled: bool },
}

/// When the probe may start.
#[derive(Debug, Clone)]
pub enum Deferral {
    /// Wait for the idle hook to fire, but no longer than `timeout`.
    Idle { hook: Arc<Notify>, timeout: Duration },
    /// Fixed delay, for when no idle hook is wired.
    Delay(Duration),
}

impl Deferral {
    pub fn from_config(cfg: &ProbeConfig, idle_hook: Option<Arc<Notify>>) -> Self {
        match idle_hook {
            Some(hook) => Deferral::Idle {
                hook,
                timeout: Duration::from_millis(cfg.idle_timeout_ms),
            },
            None => Deferral::Delay(Duration::from_millis(cfg.fallback_delay_ms)),
        }
    }

    async fn wait(&self) {
        match self {
            Deferral::Idle { hook, timeout } => {
                let _ = tokio::time::timeout(*timeout, hook.notified()).await;
            }
            Deferral::Delay(d) => tokio::time::sleep(*d).await,
        }
    }
}

/// Forbidden means off; any other answer, or no answer at all, means on.
pub fn feature_enabled(outcome: &anyhow::Result<u16>) -> bool {
    !matches!(outcome, Ok(FORBIDDEN))
}

pub struct FeatureProber {
    endpoint: Arc<dyn FlagEndpoint>,
    deferral: Deferral,
    state: AtomicU8,
    cancelled: AtomicBool,
}

impl FeatureProber {
    pub fn new(endpoint: Arc<dyn FlagEndpoint>, deferral: Deferral) -> Self {
        Self {
            endpoint,
            deferral,
            state: AtomicU8::new(UNCHECKED),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> ProbeState {
        match self.state.load(Ordering::Acquire) {
            UNCHECKED => ProbeState::Unchecked,
            PROBING => ProbeState::Probing,
            DONE_DISABLED => ProbeState::Done { enabled: false },
            _ => ProbeState::Done { enabled: true },
        }
    }

    /// Shown unless a finished probe said otherwise.
    pub fn enabled(&self) -> bool {
        self.state.load(Ordering::Acquire) != DONE_DISABLED
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Suppress the result of any probe still running. Does not abort the request.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Start the deferred probe. Returns `None` when a probe already ran, is
    /// running, or the prober was cancelled.
    pub fn schedule(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.is_cancelled() || self.state.load(Ordering::Acquire) != UNCHECKED {
            return None;
        }
        let me = Arc::clone(self);
        Some(tokio::spawn(async move {
            me.deferral.wait().await;
            if me.is_cancelled() {
                return;
            }
            me.run().await;
        }))
    }

    /// Probe now. Returns false without touching the endpoint unless the
    /// state was `unchecked`.
    pub async fn run(&self) -> bool {
        if self
            .state
            .compare_exchange(UNCHECKED, PROBING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let outcome = self.endpoint.probe().await;
        let enabled = feature_enabled(&outcome);
        match &outcome {
            Ok(status) => info!(target: "probe", status, enabled, "feature probe answered"),
            Err(e) => warn!(target: "probe", error = ?e, "feature probe failed; keeping feature on"),
        }
        counter!("feature_probe_total", "enabled" => if enabled { "true" } else { "false" })
            .increment(1);

        if self.is_cancelled() {
            return true;
        }
        let done = if enabled { DONE_ENABLED } else { DONE_DISABLED };
        self.state.store(done, Ordering::Release);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_forbidden_disables() {
        assert!(!feature_enabled(&Ok(403)));
        assert!(feature_enabled(&Ok(200)));
        assert!(feature_enabled(&Ok(500)));
        assert!(feature_enabled(&Ok(401)));
        assert!(feature_enabled(&Err(anyhow::anyhow!("offline"))));
    }

    #[test]
    fn deferral_prefers_idle_hook() {
        let cfg = ProbeConfig::default();
        match Deferral::from_config(&cfg, Some(Arc::new(Notify::new()))) {
            Deferral::Idle { timeout, .. } => assert_eq!(timeout, Duration::from_millis(1500)),
            other => panic!("expected idle deferral, got {other:?}"),
        }
        match Deferral::from_config(&cfg, None) {
            Deferral::Delay(d) => assert_eq!(d, Duration::from_millis(800)),
            other => panic!("expected fixed delay, got {other:?}"),
        }
    }
}
