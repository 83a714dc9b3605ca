mod common;

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use expirybot::models::{
    AutoCloseReason, ExpirationAction, NotificationKind, PositionStatus, SignalOutcome,
    SignalStatus,
};
use expirybot::store::memory::MemStore;
use expirybot::store::ExpirationStore;

use common::{
    build_engine, build_engine_over, make_position, make_signal, preference_with_action,
    FaultyStore,
};

#[tokio::test]
async fn auto_close_closes_position_and_notifies() {
    let engine = build_engine();

    let signal = make_signal(-5);
    let user = Uuid::new_v4();
    let position = make_position(signal.id, user);
    engine.store.insert_signal(signal.clone());
    engine.store.insert_position(position.clone());
    engine
        .store
        .insert_preference(preference_with_action(user, ExpirationAction::AutoClose));

    let outcome = engine.orchestrator.handle_expiration(&signal).await.unwrap();

    assert_eq!(outcome.positions_processed, 1);
    assert_eq!(outcome.positions_closed, 1);
    assert_eq!(outcome.positions_notified, 1);
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.results[0].reason, AutoCloseReason::SignalExpired);

    let stored = engine.store.position(position.id).unwrap();
    assert_eq!(stored.status, PositionStatus::AutoClosed);
    assert_eq!(stored.auto_close_reason, Some(AutoCloseReason::SignalExpired));
    assert!(stored.closed_at.is_some());

    let sent = engine.transport.delivered.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::PositionAutoClosed);
}

#[tokio::test]
async fn notify_only_leaves_position_open_with_manual_sentinel() {
    let engine = build_engine();

    let signal = make_signal(-5);
    let user = Uuid::new_v4();
    let position = make_position(signal.id, user);
    engine.store.insert_signal(signal.clone());
    engine.store.insert_position(position.clone());
    engine
        .store
        .insert_preference(preference_with_action(user, ExpirationAction::NotifyOnly));

    let outcome = engine.orchestrator.handle_expiration(&signal).await.unwrap();

    assert_eq!(outcome.positions_closed, 0);
    assert_eq!(outcome.positions_notified, 1);
    assert_eq!(outcome.results[0].reason, AutoCloseReason::UserManual);
    assert!(outcome.results[0].success);

    let stored = engine.store.position(position.id).unwrap();
    assert_eq!(stored.status, PositionStatus::Open);

    let sent = engine.transport.delivered.lock().unwrap();
    assert_eq!(sent[0].kind, NotificationKind::SignalExpired);
}

#[tokio::test]
async fn extend_grace_period_only_notifies() {
    let engine = build_engine();

    let signal = make_signal(-5);
    let user = Uuid::new_v4();
    let position = make_position(signal.id, user);
    engine.store.insert_signal(signal.clone());
    engine.store.insert_position(position.clone());
    engine.store.insert_preference(preference_with_action(
        user,
        ExpirationAction::ExtendGracePeriod,
    ));

    let outcome = engine.orchestrator.handle_expiration(&signal).await.unwrap();

    assert_eq!(outcome.positions_closed, 0);
    assert_eq!(outcome.positions_notified, 1);
    assert_eq!(outcome.results[0].reason, AutoCloseReason::UserManual);

    assert_eq!(
        engine.store.position(position.id).unwrap().status,
        PositionStatus::Open
    );
    let sent = engine.transport.delivered.lock().unwrap();
    assert_eq!(sent[0].kind, NotificationKind::GracePeriodStarted);
}

#[tokio::test]
async fn do_nothing_produces_no_side_effects() {
    let engine = build_engine();

    let signal = make_signal(-5);
    let user = Uuid::new_v4();
    let position = make_position(signal.id, user);
    engine.store.insert_signal(signal.clone());
    engine.store.insert_position(position.clone());
    engine
        .store
        .insert_preference(preference_with_action(user, ExpirationAction::DoNothing));

    let outcome = engine.orchestrator.handle_expiration(&signal).await.unwrap();

    assert_eq!(outcome.positions_closed, 0);
    assert_eq!(outcome.positions_notified, 0);
    assert_eq!(outcome.results[0].reason, AutoCloseReason::UserManual);
    assert!(engine.transport.delivered.lock().unwrap().is_empty());
    assert!(engine.store.all_notifications().is_empty());
}

#[tokio::test]
async fn unknown_user_gets_default_notify_only_preference() {
    let engine = build_engine();

    let signal = make_signal(-5);
    let user = Uuid::new_v4();
    let position = make_position(signal.id, user);
    engine.store.insert_signal(signal.clone());
    engine.store.insert_position(position.clone());
    // No preference row seeded.

    let outcome = engine.orchestrator.handle_expiration(&signal).await.unwrap();

    assert_eq!(outcome.positions_closed, 0);
    assert_eq!(outcome.positions_notified, 1);

    // The default preference was materialized on first access.
    let stored = engine
        .store
        .find_preference(user)
        .await
        .unwrap()
        .expect("preference created");
    assert_eq!(stored.default_action, ExpirationAction::NotifyOnly);
    assert_eq!(stored.grace_period_minutes, 30);
}

#[tokio::test]
async fn auto_close_respects_muted_notification_flag() {
    let engine = build_engine();

    let signal = make_signal(-5);
    let user = Uuid::new_v4();
    let position = make_position(signal.id, user);
    engine.store.insert_signal(signal.clone());
    engine.store.insert_position(position.clone());

    let mut preference = preference_with_action(user, ExpirationAction::AutoClose);
    preference.notify_on_auto_close = false;
    engine.store.insert_preference(preference);

    let outcome = engine.orchestrator.handle_expiration(&signal).await.unwrap();

    assert_eq!(outcome.positions_closed, 1);
    assert_eq!(outcome.positions_notified, 0);
    assert!(engine.transport.delivered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancellation_closes_positions_ignoring_preferences() {
    let engine = build_engine();

    let signal = make_signal(30);
    let user = Uuid::new_v4();
    let position = make_position(signal.id, user);
    engine.store.insert_signal(signal.clone());
    engine.store.insert_position(position.clone());
    engine
        .store
        .insert_preference(preference_with_action(user, ExpirationAction::DoNothing));

    let outcome = engine
        .orchestrator
        .handle_cancellation(&signal)
        .await
        .unwrap();

    assert_eq!(outcome.positions_closed, 1);
    assert_eq!(outcome.results[0].reason, AutoCloseReason::SignalCancelled);

    let stored = engine.store.position(position.id).unwrap();
    assert_eq!(stored.status, PositionStatus::AutoClosed);
    assert_eq!(
        stored.auto_close_reason,
        Some(AutoCloseReason::SignalCancelled)
    );

    let sent = engine.transport.delivered.lock().unwrap();
    assert_eq!(sent[0].kind, NotificationKind::SignalCancelled);
}

#[tokio::test]
async fn grace_period_end_closes_positions_and_signal_once() {
    let engine = build_engine();

    let signal = make_signal(-60);
    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();
    let pos_a = make_position(signal.id, user_a);
    let pos_b = make_position(signal.id, user_b);
    engine.store.insert_signal(signal.clone());
    engine.store.insert_position(pos_a.clone());
    engine.store.insert_position(pos_b.clone());

    let outcome = engine
        .orchestrator
        .handle_grace_period_end(&signal)
        .await
        .unwrap();

    assert_eq!(outcome.positions_closed, 2);
    for position_id in [pos_a.id, pos_b.id] {
        let stored = engine.store.position(position_id).unwrap();
        assert_eq!(stored.status, PositionStatus::AutoClosed);
        assert_eq!(
            stored.auto_close_reason,
            Some(AutoCloseReason::GracePeriodEnded)
        );
    }

    let stored_signal = engine.store.signal(signal.id).unwrap();
    assert_eq!(stored_signal.status, SignalStatus::Closed);
    assert_eq!(stored_signal.outcome, Some(SignalOutcome::Expired));
    assert!(stored_signal.grace_period_ends_at.is_none());

    // Re-running finds no open positions and keeps the signal CLOSED.
    let second = engine
        .orchestrator
        .handle_grace_period_end(&stored_signal)
        .await
        .unwrap();
    assert_eq!(second.positions_processed, 0);
    assert_eq!(second.positions_closed, 0);
}

#[tokio::test]
async fn handling_expiration_twice_does_not_reclose_positions() {
    let engine = build_engine();

    let signal = make_signal(-5);
    let user = Uuid::new_v4();
    let position = make_position(signal.id, user);
    engine.store.insert_signal(signal.clone());
    engine.store.insert_position(position.clone());
    engine
        .store
        .insert_preference(preference_with_action(user, ExpirationAction::AutoClose));

    let first = engine.orchestrator.handle_expiration(&signal).await.unwrap();
    assert_eq!(first.positions_closed, 1);
    let closed_at = engine.store.position(position.id).unwrap().closed_at;

    // Second pass sees no OPEN positions and touches nothing.
    let second = engine.orchestrator.handle_expiration(&signal).await.unwrap();
    assert_eq!(second.positions_processed, 0);
    assert_eq!(second.positions_closed, 0);

    let stored = engine.store.position(position.id).unwrap();
    assert_eq!(stored.status, PositionStatus::AutoClosed);
    assert_eq!(stored.closed_at, closed_at);
    assert_eq!(engine.store.all_notifications().len(), 1);
}

#[tokio::test]
async fn close_position_is_idempotent_on_terminal_positions() {
    let engine = build_engine();

    let signal = make_signal(-5);
    let user = Uuid::new_v4();
    let mut position = make_position(signal.id, user);
    position.status = PositionStatus::ManuallyClosed;
    engine.store.insert_signal(signal);
    engine.store.insert_position(position.clone());

    let closed = engine
        .orchestrator
        .close_position(&position, AutoCloseReason::SignalExpired)
        .await
        .unwrap();

    assert!(!closed);
    assert_eq!(
        engine.store.position(position.id).unwrap().status,
        PositionStatus::ManuallyClosed
    );
}

#[tokio::test]
async fn one_failing_position_does_not_abort_the_batch() {
    let inner = Arc::new(MemStore::new());

    let signal = make_signal(-5);
    let healthy_user = Uuid::new_v4();
    let failing_user = Uuid::new_v4();
    let healthy = make_position(signal.id, healthy_user);
    let failing = make_position(signal.id, failing_user);
    inner.insert_signal(signal.clone());
    inner.insert_position(healthy.clone());
    inner.insert_position(failing.clone());
    inner.insert_preference(preference_with_action(
        healthy_user,
        ExpirationAction::AutoClose,
    ));
    inner.insert_preference(preference_with_action(
        failing_user,
        ExpirationAction::AutoClose,
    ));

    let faulty = Arc::new(FaultyStore {
        inner: inner.clone(),
        fail_position_updates: HashSet::from([failing.id]),
    });
    let engine = build_engine_over(faulty as Arc<dyn ExpirationStore>, 30);

    let outcome = engine.orchestrator.handle_expiration(&signal).await.unwrap();

    assert_eq!(outcome.positions_processed, 2);
    assert_eq!(outcome.positions_closed, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].contains(&failing.id.to_string()));

    let failed_result = outcome
        .results
        .iter()
        .find(|r| r.position_id == failing.id)
        .unwrap();
    assert!(!failed_result.success);
    assert!(failed_result.error.is_some());

    assert_eq!(
        inner.position(healthy.id).unwrap().status,
        PositionStatus::AutoClosed
    );
    assert_eq!(
        inner.position(failing.id).unwrap().status,
        PositionStatus::Open
    );
}
