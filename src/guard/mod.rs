pub mod alert;
pub mod machine;
pub mod state;

pub use alert::{AlertConfig, AlertEvent, BlinkAlertTimer};
pub use machine::{GuardConfig, ScreenGuardStateMachine};
pub use state::{GuardReason, GuardState, GuardStatus, GuardTransition};
