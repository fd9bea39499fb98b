//! Reads playfield and viewport geometry from the DOM.

use fourstuck_core::cursor::PlayfieldGeometry;
use fourstuck_core::{Point, ViewportInfo};
use web_sys::{Element, MouseEvent};

fn px(value: &str) -> f64 {
    value.trim().trim_end_matches("px").parse().unwrap_or(0.0)
}

/// Playfield rectangle in client coordinates, with its padding.
pub fn playfield(element: &Element) -> PlayfieldGeometry {
    let rect = element.get_bounding_client_rect();
    let style = web_sys::window().and_then(|w| w.get_computed_style(element).ok().flatten());
    let padding = |side: &str| {
        style
            .as_ref()
            .and_then(|s| s.get_property_value(side).ok())
            .map_or(0.0, |v| px(&v))
    };
    let padding_left = padding("padding-left");
    let padding_top = padding("padding-top");
    PlayfieldGeometry {
        left: rect.left(),
        top: rect.top(),
        padding_left,
        padding_top,
        width: (rect.width() - padding_left - padding("padding-right")).max(0.0),
        height: (rect.height() - padding_top - padding("padding-bottom")).max(0.0),
    }
}

pub fn viewport() -> ViewportInfo {
    let Some(window) = web_sys::window() else {
        return ViewportInfo::default();
    };
    let number = |v: Result<wasm_bindgen::JsValue, wasm_bindgen::JsValue>| {
        v.ok().and_then(|v| v.as_f64()).unwrap_or(0.0)
    };
    let (screen_width, screen_height) = window
        .screen()
        .map(|s| {
            (
                s.width().map_or(0.0, f64::from),
                s.height().map_or(0.0, f64::from),
            )
        })
        .unwrap_or_default();
    let viewport_width = number(window.inner_width());
    let outer_width = number(window.outer_width());
    ViewportInfo {
        screen_width,
        screen_height,
        viewport_width,
        viewport_height: number(window.inner_height()),
        device_pixel_ratio: window.device_pixel_ratio(),
        scroll_x: window.scroll_x().unwrap_or(0.0),
        scroll_y: window.scroll_y().unwrap_or(0.0),
        zoom_level: if viewport_width > 0.0 {
            outer_width / viewport_width
        } else {
            1.0
        },
    }
}

pub fn client_point(event: &MouseEvent) -> Point {
    Point::new(f64::from(event.client_x()), f64::from(event.client_y()))
}

/// Pointer position relative to `element`'s content box.
pub fn local_point(event: &MouseEvent, element: &Element) -> Point {
    let geometry = playfield(element);
    let origin = geometry.content_origin();
    let client = client_point(event);
    Point::new(client.x - origin.x, client.y - origin.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_px_parsing() {
        assert_eq!(px("12px"), 12.0);
        assert_eq!(px(" 7.5px "), 7.5);
        assert_eq!(px("auto"), 0.0);
    }
}
