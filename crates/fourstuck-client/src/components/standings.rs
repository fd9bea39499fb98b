//! Team standings panel.

use fourstuck_core::{ColorScheme, Player, PlayerId};
use yew::prelude::*;

#[derive(Properties, PartialEq)]
pub struct StandingsProps {
    pub players: Vec<Player>,
    pub user_id: PlayerId,
    pub colors: ColorScheme,
    #[prop_or(AttrValue::Static("Team"))]
    pub title: AttrValue,
}

/// Players in the given order, eliminated ones dimmed.
#[function_component(Standings)]
pub fn standings(props: &StandingsProps) -> Html {
    html! {
        <div class="standings">
            <div class="standings-header">{ props.title.clone() }</div>
            <ol class="standings-list">
                { for props.players.iter().map(|player| {
                    let color = props.colors.color_of(player);
                    let is_self = player.id == props.user_id;
                    html! {
                        <li
                            key={player.id}
                            class={classes!(
                                "standings-item",
                                props.colors.class_name(color),
                                is_self.then_some("self"),
                                player.is_eliminated().then_some("eliminated"),
                            )}
                        >
                            <span
                                class="standings-color"
                                style={format!("background: {};", props.colors.css_value(color))}
                            />
                            <span class="standings-name">
                                { &player.username }
                                { if is_self {
                                    html! { <span class="tag you">{ "YOU" }</span> }
                                } else {
                                    html! {}
                                }}
                            </span>
                            <span class="standings-points">{ format!("{} pts", player.points) }</span>
                        </li>
                    }
                })}
            </ol>
        </div>
    }
}
