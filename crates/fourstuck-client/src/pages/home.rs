//! Join page: pick a session and player, or rejoin the remembered one.

use fourstuck_core::{PlayerId, SessionId};
use web_sys::HtmlInputElement;
use yew::prelude::*;
use yew_router::prelude::*;

use crate::hooks::use_persisted_session;
use crate::routes::Route;

fn parse_id(input: &NodeRef) -> Option<i64> {
    input
        .cast::<HtmlInputElement>()?
        .value()
        .trim()
        .parse()
        .ok()
        .filter(|id: &i64| *id > 0)
}

#[function_component(HomePage)]
pub fn home_page() -> Html {
    let persisted = use_persisted_session();
    let navigator = use_navigator();
    let session_input = use_node_ref();
    let player_input = use_node_ref();
    let error = use_state(|| None::<&'static str>);

    let onsubmit = {
        let session_input = session_input.clone();
        let player_input = player_input.clone();
        let error = error.clone();
        Callback::from(move |event: SubmitEvent| {
            event.prevent_default();
            let session_id: Option<SessionId> = parse_id(&session_input);
            let user_id: Option<PlayerId> = parse_id(&player_input);
            match (session_id, user_id, &navigator) {
                (Some(session_id), Some(user_id), Some(navigator)) => {
                    tracing::info!(session_id, user_id, "joining session");
                    navigator.push(&Route::Session {
                        session_id,
                        user_id,
                    });
                }
                (None, _, _) => error.set(Some("Enter a valid session id.")),
                (_, None, _) => error.set(Some("Enter a valid player id.")),
                (_, _, None) => tracing::warn!("no router available"),
            }
        })
    };

    let greeting = persisted.username.as_ref().map(|name| {
        html! { <p class="greeting">{ format!("Welcome back, {name}!") }</p> }
    });
    let last_session = persisted
        .can_rejoin()
        .then_some(persisted.session_id)
        .flatten()
        .map(|id| id.to_string())
        .unwrap_or_default();

    html! {
        <main class="page home-page">
            <h1>{ "4stuck" }</h1>
            { for greeting }
            <form class="join-form" {onsubmit}>
                <label>
                    { "Session" }
                    <input ref={session_input} type="number" min="1" value={last_session} />
                </label>
                <label>
                    { "Player" }
                    <input ref={player_input} type="number" min="1" />
                </label>
                <button type="submit">{ "Join game" }</button>
            </form>
            { for (*error).map(|message| html! { <p class="error-message">{ message }</p> }) }
        </main>
    }
}
