use fourstuck_core::persist::PersistedSession;
use yew::prelude::*;

use crate::services::storage::LocalStore;

/// The stored identity and last session, read once on mount.
#[hook]
pub fn use_persisted_session() -> UseStateHandle<PersistedSession> {
    use_state(|| PersistedSession::load(&LocalStore))
}
