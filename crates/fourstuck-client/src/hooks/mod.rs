mod use_persisted_session;
mod use_session;

pub use use_persisted_session::use_persisted_session;
pub use use_session::{SessionHandle, use_session};
