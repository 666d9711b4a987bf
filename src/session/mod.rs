pub mod commands;
pub mod controller;
pub mod engine;
pub mod events;
pub mod scheduler;
pub mod state;
mod worker;

pub use commands::{apply_message, InboundMessage};
pub use controller::{SessionController, SessionHistory};
pub use engine::{SessionEngine, SessionSnapshot};
pub use events::{EventBus, MonitorEvent};
pub use scheduler::RecurringTask;
pub use state::{MonitorStatus, SessionState};
