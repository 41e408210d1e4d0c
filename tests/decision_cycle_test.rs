mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Harness, RefusingAlertSink, Reply};
use printwatch::kernel::reactor::CycleOutcome;
use printwatch::kernel::state::DecisionState;
use printwatch::kernel::time::Clock;
use printwatch::kernel::telemetry::event::TelemetryEvent;
use printwatch::services::notify::Notifier;

#[tokio::test]
async fn test_clear_primary_stays_monitoring() {
    let h = Harness::new();
    let mut reactor = h.reactor();

    let step = reactor.step(DecisionState::Monitoring, &h.pacer).await.unwrap();

    assert!(matches!(step.outcome, CycleOutcome::Clear));
    assert!(step.next.is_monitoring());
    assert_eq!(h.frames.calls(), 3, "one grab per image in the series");
    assert_eq!(h.oracle.calls(), 1, "no verification after a negative judgment");
    assert_eq!(h.oracle.series_sizes(), vec![3]);

    let statuses = h.statuses.statuses();
    assert_eq!(statuses.len(), 1, "exactly one status per completed cycle");
    assert!(!statuses[0].print_failed);
    assert!(h.alerts.alerts().is_empty());

    // Two waits of the image interval between three grabs.
    assert_eq!(h.clock.sleeps(), vec![Duration::from_secs(10), Duration::from_secs(10)]);
}

#[tokio::test]
async fn test_confirmed_failure_alerts_once_and_cools_down() {
    let h = Harness::new();
    let mut reactor = h.reactor();

    // 1. Primary sees a failure
    h.oracle.push(Reply::Failed("detached part"));
    let step = reactor.step(DecisionState::Monitoring, &h.pacer).await.unwrap();
    assert!(matches!(step.outcome, CycleOutcome::Suspected));
    assert_eq!(step.next.label(), "verifying");
    assert!(h.statuses.statuses().is_empty(), "no status until verification decides");

    // 2. Three of four re-checks agree
    h.oracle.push_votes(&[true, true, true, false]);
    let step = reactor.step(step.next, &h.pacer).await.unwrap();

    let until = match step.outcome {
        CycleOutcome::Confirmed { cooldown_until, failure_votes } => {
            assert_eq!(failure_votes, 3);
            cooldown_until
        }
        other => panic!("expected confirmation, got {other:?}"),
    };
    assert_eq!(until, h.clock.now() + chrono::Duration::minutes(15));
    assert_eq!(step.next.cooldown_until(), Some(until));

    // 3. One alert, one failed status, evidence from the last positive re-check
    let alerts = h.alerts.alerts();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].confirmed);
    assert_eq!(alerts[0].explanation, "spaghetti on the bed");

    let statuses = h.statuses.statuses();
    assert_eq!(statuses.len(), 1);
    assert!(statuses[0].print_failed);
    assert!(statuses[0].description.contains("3 of 4"));

    assert_eq!(h.oracle.calls(), 5, "primary plus four re-checks");
    assert_eq!(h.frames.calls(), 15);

    let snapshot = reactor.telemetry.snapshot();
    assert_eq!(snapshot.verification_stats.confirmed, 1);
    assert_eq!(snapshot.alert_stats.dispatched, 1);
    assert_eq!(snapshot.cycle_stats.reported_failed, 1);
    assert!(reactor
        .telemetry
        .events()
        .any(|e| *e == TelemetryEvent::VerificationDecided { failure_votes: 3, rounds: 4, confirmed: true }));
}

#[tokio::test]
async fn test_unanimous_verification_confirms() {
    let h = Harness::new();
    let mut reactor = h.reactor();

    h.oracle.push(Reply::Failed("layer shift"));
    h.oracle.push_votes(&[true, true, true, true]);

    let step = reactor.step(DecisionState::Monitoring, &h.pacer).await.unwrap();
    let step = reactor.step(step.next, &h.pacer).await.unwrap();

    assert!(matches!(step.outcome, CycleOutcome::Confirmed { failure_votes: 4, .. }));
    assert_eq!(h.alerts.alerts().len(), 1);
}

#[tokio::test]
async fn test_two_of_four_is_rejected() {
    let h = Harness::new();
    let mut reactor = h.reactor();

    h.oracle.push(Reply::Failed("stringing"));
    h.oracle.push_votes(&[true, true, false, false]);

    let step = reactor.step(DecisionState::Monitoring, &h.pacer).await.unwrap();
    let step = reactor.step(step.next, &h.pacer).await.unwrap();

    assert!(matches!(step.outcome, CycleOutcome::Rejected { failure_votes: 2 }));
    assert!(step.next.is_monitoring());
    assert!(h.alerts.alerts().is_empty(), "below quorum never alerts");

    let statuses = h.statuses.statuses();
    assert_eq!(statuses.len(), 1);
    assert!(!statuses[0].print_failed);
}

#[tokio::test]
async fn test_verification_uses_short_interval() {
    let h = Harness::new();
    let mut reactor = h.reactor();

    h.oracle.push(Reply::Failed("blob"));
    h.oracle.push_votes(&[false, false, false, false]);

    let step = reactor.step(DecisionState::Monitoring, &h.pacer).await.unwrap();
    let before = h.clock.sleeps().len();
    reactor.step(step.next, &h.pacer).await.unwrap();

    let verification_sleeps: Vec<Duration> = h.clock.sleeps()[before..].to_vec();
    assert_eq!(verification_sleeps.len(), 8, "two waits per re-check series");
    assert!(verification_sleeps.iter().all(|d| *d == Duration::from_secs(2)));
}

#[tokio::test]
async fn test_unverifiable_failure_returns_to_monitoring() {
    let h = Harness::new();
    let mut reactor = h.reactor();

    h.oracle.push(Reply::Failed("nozzle clog"));
    h.frames.succeed(3);
    h.frames.fail_permanently(4);

    let step = reactor.step(DecisionState::Monitoring, &h.pacer).await.unwrap();
    let step = reactor.step(step.next, &h.pacer).await.unwrap();

    assert!(matches!(step.outcome, CycleOutcome::Unverified));
    assert!(step.next.is_monitoring());
    assert!(h.alerts.alerts().is_empty());
    assert_eq!(h.oracle.calls(), 1, "no re-check ever reached the oracle");
}

#[tokio::test]
async fn test_inconclusive_recheck_votes_no_failure() {
    let h = Harness::new();
    let mut reactor = h.reactor();

    h.oracle.push(Reply::Failed("warping"));
    h.oracle.push_all([
        Reply::Failed("warping"),
        Reply::Failed("warping"),
        Reply::Err(printwatch::error::OracleError::Permanent("unparseable".into())),
        Reply::Clear,
    ]);

    let step = reactor.step(DecisionState::Monitoring, &h.pacer).await.unwrap();
    let step = reactor.step(step.next, &h.pacer).await.unwrap();

    assert!(matches!(step.outcome, CycleOutcome::Rejected { failure_votes: 2 }));
}

#[tokio::test]
async fn test_cooldown_suppresses_all_analysis() {
    let h = Harness::new();
    let mut reactor = h.reactor();

    let until = h.clock.now() + chrono::Duration::minutes(15);
    let mut state = DecisionState::Cooldown { until };
    let mut polls = 0;

    loop {
        let step = reactor.step(state, &h.pacer).await.unwrap();
        state = step.next;
        match step.outcome {
            CycleOutcome::Suppressed { .. } => polls += 1,
            CycleOutcome::CooldownElapsed => break,
            other => panic!("unexpected outcome in cooldown: {other:?}"),
        }
    }

    assert!(state.is_monitoring());
    assert_eq!(polls, 30, "one poll every 30s across 15 minutes");
    assert_eq!(h.clock.now(), until, "resumes on the first poll at or after expiry");
    assert_eq!(h.frames.calls(), 0);
    assert_eq!(h.oracle.calls(), 0);
    assert!(h.statuses.statuses().is_empty());
    assert!(h.clock.sleeps().iter().all(|d| *d == Duration::from_secs(30)));
}

#[tokio::test]
async fn test_undelivered_alert_still_enters_cooldown() {
    let h = Harness::new();
    let notifier = Notifier::new()
        .with_alert_sink(Arc::new(RefusingAlertSink))
        .with_status_sink(h.statuses.clone());
    let mut reactor = h.reactor_with(h.frames.clone(), notifier);

    h.oracle.push(Reply::Failed("spaghetti"));
    h.oracle.push_votes(&[true, true, true, true]);

    let step = reactor.step(DecisionState::Monitoring, &h.pacer).await.unwrap();
    let step = reactor.step(step.next, &h.pacer).await.unwrap();

    assert!(step.next.cooldown_until().is_some());
    assert_eq!(reactor.telemetry.snapshot().alert_stats.undelivered, 1);
    assert!(h.statuses.statuses()[0].print_failed);
}

#[tokio::test]
async fn test_run_loop_stops_on_cancel() {
    let h = Harness::new();
    let mut reactor = h.reactor();
    let pacer = h.pacer.clone();

    let task = tokio::spawn(async move {
        reactor.run(&pacer).await;
        reactor
    });

    while h.oracle.calls() < 3 {
        tokio::task::yield_now().await;
    }
    h.cancel.cancel();

    let reactor = task.await.unwrap();
    let snapshot = reactor.telemetry.snapshot();
    assert!(snapshot.cycle_stats.completed >= 3);
    assert_eq!(snapshot.cycle_stats.errors, 0, "shutdown is not a cycle failure");
    assert_eq!(h.statuses.statuses().len() as u64, snapshot.cycle_stats.completed);
}

#[tokio::test]
async fn test_cancelled_before_start_does_nothing() {
    let h = Harness::new();
    let mut reactor = h.reactor();

    h.cancel.cancel();
    reactor.run(&h.pacer).await;

    assert_eq!(h.frames.calls(), 0);
    assert!(h.statuses.statuses().is_empty());
}

#[tokio::test]
async fn test_run_loop_paces_each_kind_of_cycle() {
    let h = Harness::new();
    let mut reactor = h.reactor();
    let pacer = h.pacer.clone();

    // 1. Clear, then suspected and rejected, then confirmed, then clear again after cooldown
    h.oracle.push(Reply::Clear);
    h.oracle.push(Reply::Failed("stringing"));
    h.oracle.push_votes(&[false, false, false, false]);
    h.oracle.push(Reply::Failed("spaghetti"));
    h.oracle.push_votes(&[true, true, true, true]);

    let task = tokio::spawn(async move {
        reactor.run(&pacer).await;
        reactor
    });

    while h.oracle.calls() < 12 {
        tokio::task::yield_now().await;
    }
    h.cancel.cancel();
    task.await.unwrap();

    // 2. Analysis interval only after settling cycles, none after suspicion or cooldown exit
    let secs = |d: &Duration| d.as_secs();
    let mut expected: Vec<u64> = vec![10, 10, 10];
    expected.extend([10, 10]);
    expected.extend([2; 8]);
    expected.push(10);
    expected.extend([10, 10]);
    expected.extend([2; 8]);
    expected.extend([30; 30]);
    expected.extend([10, 10]);

    let sleeps: Vec<u64> = h.clock.sleeps().iter().map(secs).collect();
    assert!(sleeps.len() >= expected.len(), "run stopped early: {sleeps:?}");
    assert_eq!(sleeps[..expected.len()], expected[..]);

    // 3. One status per decided cycle, one alert
    let failed: Vec<bool> = h.statuses.statuses().iter().map(|s| s.print_failed).collect();
    assert_eq!(failed[..3], [false, false, true]);
    assert_eq!(h.alerts.alerts().len(), 1);
}
