//! Application routes.

use fourstuck_core::{PlayerId, SessionId};
use yew_router::prelude::*;

#[derive(Clone, Routable, PartialEq)]
pub enum Route {
    /// Join form; offers to rejoin the remembered session.
    #[at("/")]
    Home,
    /// A running game session seen by one player.
    #[at("/session/:session_id/player/:user_id")]
    Session {
        session_id: SessionId,
        user_id: PlayerId,
    },
    #[not_found]
    #[at("/404")]
    NotFound,
}
