pub mod notifications;
pub mod orchestrator;
pub mod policy;
pub mod queries;
pub mod transitions;

pub use notifications::{
    InAppTransport, NotificationService, NotificationTransport, WebhookTransport,
};
pub use orchestrator::{ExpirationOrchestrator, ExpirationOutcome, PositionCloseResult};
pub use policy::{plan_for, PolicyNotice, PolicyPlan};
pub use queries::{ExpirationCheck, ExpirationQueries, ExpirationSummary};
pub use transitions::SignalTransitions;
