//! Teammate cursors, drawn in viewport coordinates above everything else.

use fourstuck_core::cursor::RenderedCursor;
use yew::prelude::*;

#[derive(Properties, PartialEq)]
pub struct CursorLayerProps {
    pub cursors: Vec<RenderedCursor>,
    pub glyph_size: f64,
}

#[function_component(CursorLayer)]
pub fn cursor_layer(props: &CursorLayerProps) -> Html {
    let size = props.glyph_size;
    html! {
        <div class="cursor-layer" aria-hidden="true">
            { for props.cursors.iter().map(|cursor| html! {
                <div
                    key={cursor.user_id}
                    class="remote-cursor"
                    style={format!(
                        "position: fixed; pointer-events: none; left: {}px; top: {}px; width: {size}px; height: {size}px;",
                        cursor.position.x, cursor.position.y,
                    )}
                >
                    <svg width={size.to_string()} height={size.to_string()} viewBox="0 0 20 20">
                        <path d="M2 2 L2 17 L6 13 L9 19 L12 18 L9 12 L15 12 Z" fill={cursor.color.clone()} stroke="#000" stroke-width="1" />
                    </svg>
                    { for cursor.label.as_ref().map(|label| html! {
                        <span class="remote-cursor-label" style={format!("background: {};", cursor.color)}>
                            { label }
                        </span>
                    })}
                </div>
            })}
        </div>
    }
}
