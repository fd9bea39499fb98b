//! Main application component.

use yew::prelude::*;
use yew_router::prelude::*;

use crate::pages::{HomePage, NotFoundPage, SessionPage};
use crate::routes::Route;

fn switch(routes: Route) -> Html {
    match routes {
        Route::Home => html! { <HomePage /> },
        Route::Session {
            session_id,
            user_id,
        } => html! { <SessionPage {session_id} {user_id} /> },
        Route::NotFound => html! { <NotFoundPage /> },
    }
}

/// Root application component with router.
#[function_component(App)]
pub fn app() -> Html {
    html! {
        <BrowserRouter>
            <Switch<Route> render={switch} />
        </BrowserRouter>
    }
}
