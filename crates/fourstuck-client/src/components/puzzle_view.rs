//! Renders the bound puzzle engine and turns DOM input into [`PuzzleInput`].

use fourstuck_core::{Point, PuzzleEngine};
use fourstuck_core::engine::PuzzleInput;
use fourstuck_core::engine::concentration::{ConcentrationEngine, ConcentrationResult};
use fourstuck_core::engine::memory::{MemoryEngine, MemoryPhase};
use fourstuck_core::engine::multitasking::MultitaskingEngine;
use fourstuck_core::engine::spatial::{SpatialEngine, SpatialOutcome};
use web_sys::{Element, MouseEvent};
use yew::prelude::*;

use crate::services::geometry::local_point;

#[derive(Properties, PartialEq)]
pub struct PuzzleViewProps {
    pub engine: PuzzleEngine,
    pub on_input: Callback<PuzzleInput>,
    #[prop_or_default]
    pub submitting: bool,
}

#[function_component(PuzzleView)]
pub fn puzzle_view(props: &PuzzleViewProps) -> Html {
    let body = match &props.engine {
        PuzzleEngine::Memory(m) => memory(m, &props.on_input, props.submitting),
        PuzzleEngine::Concentration(c) => concentration(c, &props.on_input),
        PuzzleEngine::Spatial(s) => html! {
            <SpatialBoard engine={s.clone()} on_input={props.on_input.clone()} />
        },
        PuzzleEngine::Multitasking(g) => multitasking(g, &props.on_input),
    };
    html! {
        <div class={classes!("puzzle", props.engine.kind().as_str())}>
            { body }
            { if props.submitting {
                html! { <p class="puzzle-submitting">{ "Submitting..." }</p> }
            } else {
                html! {}
            }}
        </div>
    }
}

fn memory(engine: &MemoryEngine, on_input: &Callback<PuzzleInput>, submitting: bool) -> Html {
    let data = engine.data();
    if engine.phase() == MemoryPhase::Revealing {
        return html! {
            <div class="memory-mapping">
                <h3>{ "Memory Puzzle" }</h3>
                <p class="countdown">{ format!("Memorize! {}s", engine.seconds_left()) }</p>
                <div class="mapping-grid">
                    { for data.mapping.iter().map(|(number, color)| html! {
                        <div class="mapping-item" key={number.clone()}>
                            <span class="number">{ number }</span>
                            <span class={classes!("color", format!("player-{color}"))}>{ color }</span>
                        </div>
                    })}
                </div>
            </div>
        };
    }

    let locked = engine.selected().is_some() || submitting;
    html! {
        <div class="memory-form">
            <h3>{ "Memory Puzzle" }</h3>
            <p class="question">
                <strong>{ "Question:" }</strong>
                { format!(" What color is associated with the number {}?", data.question_number) }
            </p>
            <div class="choices" role="radiogroup" aria-label="Choices">
                { for data.choices.iter().map(|choice| {
                    let selected = engine.selected() == Some(choice.as_str());
                    let onclick = {
                        let on_input = on_input.clone();
                        let choice = choice.clone();
                        Callback::from(move |_: MouseEvent| {
                            on_input.emit(PuzzleInput::SelectColor(choice.clone()));
                        })
                    };
                    html! {
                        <button
                            key={choice.clone()}
                            class={classes!("choice-option", selected.then_some("selected"))}
                            disabled={locked}
                            {onclick}
                        >
                            { choice }
                        </button>
                    }
                })}
            </div>
        </div>
    }
}

fn concentration(engine: &ConcentrationEngine, on_input: &Callback<PuzzleInput>) -> Html {
    if let Some(result) = engine.result() {
        let message = match (result, engine.clicked_index()) {
            (ConcentrationResult::Success, _) => "Success! You clicked at the right time!",
            (ConcentrationResult::Failure, Some(_)) => "You clicked at the wrong time.",
            (ConcentrationResult::Failure, None) => "Time's up! You didn't click in time.",
        };
        return html! {
            <div class="concentration-result">
                <h3>{ "Concentration Puzzle" }</h3>
                <p class={classes!(
                    "result",
                    (result == ConcentrationResult::Success).then_some("success"),
                )}>{ message }</p>
            </div>
        };
    }

    let onclick = {
        let on_input = on_input.clone();
        Callback::from(move |_: MouseEvent| on_input.emit(PuzzleInput::Click))
    };
    let pair = engine.current_pair();
    html! {
        <div class="concentration">
            <h3>{ "Concentration Puzzle" }</h3>
            <p class="instructions">{ "Click the circle when the word names its color." }</p>
            <div class="progress">
                <div class="progress-bar" style={format!("width: {:.0}%;", engine.progress_percent())} />
            </div>
            { for pair.map(|pair| html! {
                <button
                    class={classes!("color-circle", engine.has_clicked().then_some("clicked"))}
                    style={format!("background: {};", pair.circle_color)}
                    {onclick}
                >
                    <span class="color-word">{ &pair.color_word }</span>
                </button>
            })}
            <p class="pair-counter">
                { format!("{} / {}", engine.current_pair_index() + 1, engine.data().pairs.len()) }
            </p>
        </div>
    }
}

fn multitasking(engine: &MultitaskingEngine, on_input: &Callback<PuzzleInput>) -> Html {
    let finished = engine.is_finished();
    let status = if engine.is_complete() {
        html! { <p class="result success">{ "All 6s found!" }</p> }
    } else if engine.is_timed_out() {
        html! { <p class="result">{ "Time's up!" }</p> }
    } else {
        html! { <p class="countdown">{ format!("{}s left", engine.seconds_left()) }</p> }
    };
    html! {
        <div class="multitasking">
            <h3>{ "Find the 6 in every row" }</h3>
            { status }
            <div class="progress">
                <div class="progress-bar" style={format!("width: {:.0}%;", engine.progress_percent())} />
            </div>
            <div class="digit-grid">
                { for engine.grid().iter().enumerate().map(|(row, digits)| {
                    let found = engine.selections().get(row).copied().flatten();
                    html! {
                        <div class="digit-row" key={row}>
                            { for digits.iter().enumerate().map(|(col, &digit)| {
                                let is_found = found == Some(col);
                                let clickable = !finished && digit == '6';
                                let onclick = {
                                    let on_input = on_input.clone();
                                    Callback::from(move |_: MouseEvent| {
                                        on_input.emit(PuzzleInput::GridClick { row, col });
                                    })
                                };
                                html! {
                                    <button
                                        class={classes!(
                                            "grid-digit",
                                            is_found.then_some("found"),
                                            clickable.then_some("clickable"),
                                        )}
                                        disabled={!clickable}
                                        {onclick}
                                    >
                                        { digit.to_string() }
                                    </button>
                                }
                            })}
                        </div>
                    }
                })}
            </div>
        </div>
    }
}

#[derive(Properties, PartialEq)]
struct SpatialBoardProps {
    engine: SpatialEngine,
    on_input: Callback<PuzzleInput>,
}

#[function_component(SpatialBoard)]
fn spatial_board(props: &SpatialBoardProps) -> Html {
    let board = use_node_ref();
    let engine = &props.engine;
    let config = engine.config();

    let pointer = |make: fn(Point) -> PuzzleInput| {
        let board = board.clone();
        let on_input = props.on_input.clone();
        Callback::from(move |event: MouseEvent| {
            if let Some(element) = board.cast::<Element>() {
                on_input.emit(make(local_point(&event, &element)));
            }
        })
    };
    let onmousedown = pointer(PuzzleInput::PointerDown);
    let onmousemove = pointer(PuzzleInput::PointerMove);
    let release = {
        let on_input = props.on_input.clone();
        Callback::from(move |_: MouseEvent| on_input.emit(PuzzleInput::PointerUp))
    };

    let circle = engine.circle();
    let obstacle = engine.obstacle();
    let r = config.circle_radius;
    let outcome = engine.outcome().map(|outcome| match outcome {
        SpatialOutcome::Solved => html! {
            <p class="result success">{ "Success! You reached the bottom safely!" }</p>
        },
        SpatialOutcome::Collision => html! {
            <p class="result">{ "Game Over! You hit the obstacle." }</p>
        },
    });

    html! {
        <div class="spatial">
            <h3>{ "Navigate the Circle" }</h3>
            <p class="instructions">{ "Drag the circle to the bottom without touching the obstacle." }</p>
            <svg
                ref={board}
                class={classes!("spatial-board", engine.is_dragging().then_some("dragging"))}
                width={config.width.to_string()}
                height={config.height.to_string()}
                {onmousedown}
                {onmousemove}
                onmouseup={release.clone()}
                onmouseleave={release}
            >
                <rect
                    class="goal"
                    x="0"
                    y={(config.height - config.goal_margin).to_string()}
                    width={config.width.to_string()}
                    height={config.goal_margin.to_string()}
                />
                <rect
                    class="obstacle"
                    x={obstacle.x.to_string()}
                    y={obstacle.y.to_string()}
                    width={config.obstacle_width.to_string()}
                    height={config.obstacle_height.to_string()}
                />
                <circle
                    class="player-circle"
                    cx={(circle.x + r).to_string()}
                    cy={(circle.y + r).to_string()}
                    r={r.to_string()}
                />
            </svg>
            { for outcome }
        </div>
    }
}
