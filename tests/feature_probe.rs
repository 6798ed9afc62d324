// tests/feature_probe.rs
//
// Deferred one-shot feature probe against a scripted endpoint.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use home_dashboard::probe::{Deferral, FeatureProber, ProbeState};
use home_dashboard::upstream::FixtureUpstream;

fn prober(up: &Arc<FixtureUpstream>, deferral: Deferral) -> Arc<FeatureProber> {
    Arc::new(FeatureProber::new(up.clone(), deferral))
}

fn now() -> Deferral {
    Deferral::Delay(Duration::ZERO)
}

async fn wait_for_calls(up: &FixtureUpstream, n: usize) {
    for _ in 0..200 {
        if up.probe_calls() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {n} probe call(s), saw {}", up.probe_calls());
}

#[tokio::test]
async fn forbidden_hides_the_feature() {
    let up = Arc::new(FixtureUpstream::new().with_probe_status(403));
    let p = prober(&up, now());
    assert!(p.enabled(), "shown until the probe says otherwise");

    assert!(p.run().await);
    assert_eq!(p.state(), ProbeState::Done { enabled: false });
    assert!(!p.enabled());
}

#[tokio::test]
async fn any_other_status_keeps_the_feature() {
    for status in [200, 401, 500] {
        let up = Arc::new(FixtureUpstream::new().with_probe_status(status));
        let p = prober(&up, now());
        assert!(p.run().await);
        assert_eq!(p.state(), ProbeState::Done { enabled: true }, "status {status}");
    }
}

#[tokio::test]
async fn network_failure_keeps_the_feature() {
    let up = Arc::new(FixtureUpstream::new().failing_probe());
    let p = prober(&up, now());
    assert!(p.run().await);
    assert!(p.enabled());
    assert_eq!(p.state(), ProbeState::Done { enabled: true });
}

#[tokio::test]
async fn second_trigger_while_pending_issues_no_request() {
    let gate = Arc::new(Notify::new());
    let up = Arc::new(
        FixtureUpstream::new()
            .with_probe_status(403)
            .with_probe_gate(Arc::clone(&gate)),
    );
    let p = prober(&up, now());

    let handle = p.schedule().expect("first schedule starts a probe");
    wait_for_calls(&up, 1).await;
    assert_eq!(p.state(), ProbeState::Probing);
    assert!(p.enabled());

    assert!(p.schedule().is_none());
    assert!(!p.run().await);

    gate.notify_one();
    handle.await.unwrap();

    assert_eq!(up.probe_calls(), 1);
    assert_eq!(p.state(), ProbeState::Done { enabled: false });
    assert!(p.schedule().is_none(), "finished probes are not repeated");
    assert!(!p.run().await);
    assert_eq!(up.probe_calls(), 1);
}

#[tokio::test]
async fn cancelled_probe_result_is_discarded() {
    let gate = Arc::new(Notify::new());
    let up = Arc::new(
        FixtureUpstream::new()
            .with_probe_status(403)
            .with_probe_gate(Arc::clone(&gate)),
    );
    let p = prober(&up, now());

    let handle = p.schedule().unwrap();
    wait_for_calls(&up, 1).await;
    p.cancel();
    gate.notify_one();
    handle.await.unwrap();

    assert!(p.is_cancelled());
    assert_eq!(p.state(), ProbeState::Probing);
    assert!(p.enabled());
}

#[tokio::test]
async fn cancelled_before_deferral_ends_never_probes() {
    let hook = Arc::new(Notify::new());
    let up = Arc::new(FixtureUpstream::new());
    let p = prober(
        &up,
        Deferral::Idle {
            hook: Arc::clone(&hook),
            timeout: Duration::from_secs(10),
        },
    );

    let handle = p.schedule().unwrap();
    p.cancel();
    hook.notify_one();
    handle.await.unwrap();

    assert_eq!(up.probe_calls(), 0);
    assert_eq!(p.state(), ProbeState::Unchecked);
    assert!(p.schedule().is_none());
}

#[tokio::test]
async fn probe_waits_for_the_idle_hook() {
    let hook = Arc::new(Notify::new());
    let up = Arc::new(FixtureUpstream::new());
    let p = prober(
        &up,
        Deferral::Idle {
            hook: Arc::clone(&hook),
            timeout: Duration::from_secs(10),
        },
    );

    let handle = p.schedule().unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(up.probe_calls(), 0, "still deferred");

    hook.notify_one();
    handle.await.unwrap();
    assert_eq!(up.probe_calls(), 1);
    assert_eq!(p.state(), ProbeState::Done { enabled: true });
}

#[tokio::test]
async fn idle_timeout_bounds_the_deferral() {
    let up = Arc::new(FixtureUpstream::new());
    let p = prober(
        &up,
        Deferral::Idle {
            hook: Arc::new(Notify::new()),
            timeout: Duration::from_millis(20),
        },
    );
    tokio::time::timeout(Duration::from_secs(2), p.schedule().unwrap())
        .await
        .expect("probe ran after the idle timeout")
        .unwrap();
    assert_eq!(up.probe_calls(), 1);
}
