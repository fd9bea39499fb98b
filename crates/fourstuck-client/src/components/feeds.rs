//! Notification and point-transfer feeds.

use fourstuck_core::session::{PointChange, PointChangeKind};
use yew::prelude::*;

#[derive(Properties, PartialEq)]
pub struct NotificationFeedProps {
    /// Newest first.
    pub lines: Vec<String>,
}

#[function_component(NotificationFeed)]
pub fn notification_feed(props: &NotificationFeedProps) -> Html {
    if props.lines.is_empty() {
        return html! {};
    }
    html! {
        <ul class="notification-feed">
            { for props.lines.iter().map(|line| html! {
                <li class="notification">{ line }</li>
            })}
        </ul>
    }
}

#[derive(Properties, PartialEq)]
pub struct PointFeedProps {
    /// Newest first.
    pub changes: Vec<PointChange>,
}

#[function_component(PointFeed)]
pub fn point_feed(props: &PointFeedProps) -> Html {
    if props.changes.is_empty() {
        return html! {};
    }
    html! {
        <ul class="point-feed">
            { for props.changes.iter().map(|change| {
                let class = match change.kind {
                    PointChangeKind::Gain => "gain",
                    PointChangeKind::Decay => "decay",
                    PointChangeKind::Loss => "loss",
                };
                html! {
                    <li class={classes!("point-change", class)}>{ change.describe() }</li>
                }
            })}
        </ul>
    }
}
