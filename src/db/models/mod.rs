pub mod session;

pub use session::{Session, SessionInfo, SessionProgress, SessionScore, SessionStatus};
