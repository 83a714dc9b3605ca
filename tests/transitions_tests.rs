mod common;

use chrono::Utc;
use uuid::Uuid;

use expirybot::errors::AppError;
use expirybot::models::{SignalOutcome, SignalStatus};

use common::{build_engine, make_signal};

#[tokio::test]
async fn mark_expired_with_grace_opens_window() {
    let engine = build_engine();
    let signal = make_signal(-5);
    engine.store.insert_signal(signal.clone());

    let before = Utc::now();
    let updated = engine.transitions.mark_expired(signal.id, 30).await.unwrap();

    assert_eq!(updated.status, SignalStatus::Expired);
    assert_eq!(updated.outcome, Some(SignalOutcome::Expired));
    assert!(updated.closed_at.is_none());

    let ends = updated.grace_period_ends_at.expect("grace window set");
    let lead = ends - before;
    assert!(lead.num_minutes() >= 29 && lead.num_minutes() <= 30);

    // Change is persisted, not just returned.
    let stored = engine.store.signal(signal.id).unwrap();
    assert_eq!(stored.status, SignalStatus::Expired);
}

#[tokio::test]
async fn mark_expired_without_grace_sets_closed_at() {
    let engine = build_engine();
    let signal = make_signal(-5);
    engine.store.insert_signal(signal.clone());

    let updated = engine.transitions.mark_expired(signal.id, 0).await.unwrap();

    assert_eq!(updated.status, SignalStatus::Expired);
    assert!(updated.grace_period_ends_at.is_none());
    assert!(updated.closed_at.is_some());
}

#[tokio::test]
async fn mark_closed_clears_grace_window() {
    let engine = build_engine();
    let signal = make_signal(-60);
    engine.store.insert_signal(signal.clone());
    engine.transitions.mark_expired(signal.id, 15).await.unwrap();

    let closed = engine
        .transitions
        .mark_closed(signal.id, SignalOutcome::Expired)
        .await
        .unwrap();

    assert_eq!(closed.status, SignalStatus::Closed);
    assert_eq!(closed.outcome, Some(SignalOutcome::Expired));
    assert!(closed.grace_period_ends_at.is_none());
    assert!(closed.closed_at.is_some());
}

#[tokio::test]
async fn cancel_sets_cancelled_outcome() {
    let engine = build_engine();
    let signal = make_signal(45);
    engine.store.insert_signal(signal.clone());

    let cancelled = engine.transitions.cancel(signal.id).await.unwrap();

    assert_eq!(cancelled.status, SignalStatus::Cancelled);
    assert_eq!(cancelled.outcome, Some(SignalOutcome::Cancelled));
    assert!(cancelled.closed_at.is_some());
}

#[tokio::test]
async fn transitions_on_missing_signal_are_not_found() {
    let engine = build_engine();

    let err = engine
        .transitions
        .mark_expired(Uuid::new_v4(), 30)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = engine.transitions.cancel(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
