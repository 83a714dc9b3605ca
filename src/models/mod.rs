pub mod notification;
pub mod position;
pub mod preference;
pub mod signal;

pub use notification::{
    ExpirationNotification, NotificationChannel, NotificationKind, NotificationStatus,
};
pub use position::{AutoCloseReason, CopiedPosition, PositionStatus};
pub use preference::{ExpirationAction, UserExpirationPreference};
pub use signal::{Signal, SignalOutcome, SignalStatus};
