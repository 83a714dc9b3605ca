use crate::models::{AutoCloseReason, ExpirationAction};

/// Notification side-effect of a policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyNotice {
    AutoClosed,
    SignalExpired,
    GracePeriodStarted,
}

/// What the orchestrator must do for one position when its signal
/// expires. `close_with = None` leaves the position OPEN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyPlan {
    pub close_with: Option<AutoCloseReason>,
    pub notice: Option<PolicyNotice>,
}

/// The action -> plan dispatch table. Adding an action means adding a
/// row here; no other call site branches on the action.
///
/// EXTEND_GRACE_PERIOD is deliberately notify-only: the signal's own
/// grace window is owned by the transition service and is never
/// altered from a per-user preference.
pub fn plan_for(action: ExpirationAction) -> PolicyPlan {
    match action {
        ExpirationAction::AutoClose => PolicyPlan {
            close_with: Some(AutoCloseReason::SignalExpired),
            notice: Some(PolicyNotice::AutoClosed),
        },
        ExpirationAction::NotifyOnly => PolicyPlan {
            close_with: None,
            notice: Some(PolicyNotice::SignalExpired),
        },
        ExpirationAction::ExtendGracePeriod => PolicyPlan {
            close_with: None,
            notice: Some(PolicyNotice::GracePeriodStarted),
        },
        ExpirationAction::DoNothing => PolicyPlan {
            close_with: None,
            notice: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_close_closes_with_signal_expired() {
        let plan = plan_for(ExpirationAction::AutoClose);
        assert_eq!(plan.close_with, Some(AutoCloseReason::SignalExpired));
        assert_eq!(plan.notice, Some(PolicyNotice::AutoClosed));
    }

    #[test]
    fn only_auto_close_closes() {
        for action in [
            ExpirationAction::NotifyOnly,
            ExpirationAction::ExtendGracePeriod,
            ExpirationAction::DoNothing,
        ] {
            assert_eq!(plan_for(action).close_with, None);
        }
    }

    #[test]
    fn do_nothing_has_no_side_effects() {
        let plan = plan_for(ExpirationAction::DoNothing);
        assert_eq!(plan.close_with, None);
        assert_eq!(plan.notice, None);
    }
}
