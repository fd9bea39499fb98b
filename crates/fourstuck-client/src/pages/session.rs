//! Session page: standings, the local puzzle and teammate activity.

use fourstuck_core::{GameStatus, PlayerId, SessionId, SessionStatus};
use web_sys::{Element, MouseEvent};
use yew::prelude::*;
use yew_router::prelude::*;

use crate::components::{CursorLayer, NotificationFeed, PointFeed, PuzzleView, Standings};
use crate::hooks::{SessionHandle, use_session};
use crate::routes::Route;
use crate::services::geometry;

#[derive(Properties, PartialEq)]
pub struct SessionPageProps {
    pub session_id: SessionId,
    pub user_id: PlayerId,
}

#[function_component(SessionPage)]
pub fn session_page(props: &SessionPageProps) -> Html {
    let SessionHandle { runtime, view } = use_session(props.session_id, props.user_id);
    let navigator = use_navigator();
    let playfield = use_node_ref();

    let on_input = {
        let runtime = runtime.clone();
        Callback::from(move |input| runtime.input(input))
    };
    let onmousemove = {
        let runtime = runtime.clone();
        let playfield = playfield.clone();
        Callback::from(move |event: MouseEvent| {
            if let Some(element) = playfield.cast::<Element>() {
                runtime.pointer_moved(
                    geometry::client_point(&event),
                    geometry::playfield(&element),
                    geometry::viewport(),
                );
            }
        })
    };
    let on_leave = {
        let runtime = runtime.clone();
        Callback::from(move |_: MouseEvent| {
            runtime.return_to_lobby();
            if let Some(navigator) = &navigator {
                navigator.push(&Route::Home);
            }
        })
    };

    let players = view
        .snapshot
        .as_ref()
        .map(|s| s.players.clone())
        .unwrap_or_default();
    let team = view
        .snapshot
        .as_ref()
        .and_then(|s| s.team.as_ref())
        .map(|t| t.name.clone());
    let feeds = html! {
        <aside class="session-feeds">
            <NotificationFeed lines={view.notifications.clone()} />
            <PointFeed changes={view.point_changes.clone()} />
        </aside>
    };

    let content = match view.status.status {
        GameStatus::Loading => html! {
            <div class="connecting-overlay">
                <div class="connecting-spinner"></div>
                <p>{ "Connecting to game..." }</p>
                { feeds }
            </div>
        },
        GameStatus::Countdown => html! {
            <div class="countdown-overlay">
                <p>{ "Get ready! The game is about to start." }</p>
                <Standings players={players} user_id={props.user_id} colors={view.colors.clone()} />
            </div>
        },
        GameStatus::GameOver => html! {
            <div class="game-over">
                <h2>{ "Game Over" }</h2>
                <Standings
                    players={view.status.final_standings.clone()}
                    user_id={props.user_id}
                    colors={view.colors.clone()}
                    title="Final standings"
                />
                <button class="primary" onclick={on_leave}>{ "Return to Lobby" }</button>
            </div>
        },
        GameStatus::Eliminated => html! {
            <div class="eliminated">
                <h2>{ "You have been eliminated." }</h2>
                <p>{ format!("{} players still standing.", view.status.active_players_count) }</p>
                <Standings players={players} user_id={props.user_id} colors={view.colors.clone()} />
                { feeds }
                <button onclick={on_leave}>{ "Return to Lobby" }</button>
            </div>
        },
        GameStatus::Active | GameStatus::Waiting => {
            let puzzle = match (&view.engine, &view.engine_error) {
                (_, Some(error)) => html! {
                    <div class="puzzle invalid">
                        <p>{ "Invalid puzzle data." }</p>
                        <p class="error-detail">{ error }</p>
                    </div>
                },
                (Some((_, engine)), None) => html! {
                    <PuzzleView
                        engine={engine.clone()}
                        on_input={on_input}
                        submitting={view.submitting}
                    />
                },
                (None, None) => {
                    let started = view
                        .snapshot
                        .as_ref()
                        .is_some_and(|s| s.session.status == SessionStatus::Active);
                    let message = if started {
                        "Waiting for your next puzzle..."
                    } else {
                        "Waiting for the game to start..."
                    };
                    html! { <p class="waiting">{ message }</p> }
                }
            };
            let feedback = view.feedback.as_ref().map(|feedback| {
                html! {
                    <p class={classes!(
                        "feedback",
                        if feedback.is_positive() { "success" } else { "error" },
                    )}>
                        { feedback.text() }
                    </p>
                }
            });
            html! {
                <div class="session-layout">
                    <Standings players={players} user_id={props.user_id} colors={view.colors.clone()} />
                    <section class="playfield">
                        { puzzle }
                        { for feedback }
                    </section>
                    { feeds }
                </div>
            }
        }
    };

    let cursors = playfield
        .cast::<Element>()
        .map(|element| runtime.cursors(&geometry::playfield(&element), &geometry::viewport()))
        .unwrap_or_default();

    html! {
        <main class="page session-page" ref={playfield} {onmousemove}>
            <header class="session-header">
                <h1>{ team.unwrap_or_else(|| format!("Session {}", props.session_id)) }</h1>
            </header>
            { content }
            <CursorLayer {cursors} glyph_size={runtime.glyph_size()} />
        </main>
    }
}
