//! Teammate pointer sharing.
//!
//! Pointers travel as fractions of the puzzle playfield so that teammates
//! with different window sizes see each other's cursor over the same cell.
//! Raw pixels and the sender's viewport are sent along for older clients.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};

use crate::config::CursorConfig;
use crate::connection::ConnectionManager;
use crate::model::{GameStateSnapshot, PlayerId};
use crate::palette::ColorScheme;
use crate::protocol::{CursorSample, OutboundMessage, format_timestamp};
use crate::schedule::{SharedScheduler, TimeoutHandle};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Position as a fraction of the playfield, each axis in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

/// Where the playfield sits, in the coordinate space of pointer events.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayfieldGeometry {
    pub left: f64,
    pub top: f64,
    pub padding_left: f64,
    pub padding_top: f64,
    pub width: f64,
    pub height: f64,
}

impl PlayfieldGeometry {
    pub fn content_origin(&self) -> Point {
        Point::new(self.left + self.padding_left, self.top + self.padding_top)
    }

    pub fn game_area(&self) -> GameArea {
        GameArea {
            left: self.left,
            top: self.top,
            width: self.width,
            height: self.height,
        }
    }
}

/// Browser viewport description attached to outbound samples.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewportInfo {
    pub screen_width: f64,
    pub screen_height: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub device_pixel_ratio: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub zoom_level: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct GameArea {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

fn fraction(offset: f64, extent: f64) -> f64 {
    if extent <= 0.0 {
        return 0.0;
    }
    (offset / extent).clamp(0.0, 1.0)
}

/// Pointer pixels to playfield fractions, clamped to the playfield.
pub fn normalize(pointer: Point, geometry: &PlayfieldGeometry) -> NormalizedPoint {
    let origin = geometry.content_origin();
    NormalizedPoint {
        x: fraction(pointer.x - origin.x, geometry.width),
        y: fraction(pointer.y - origin.y, geometry.height),
    }
}

/// Playfield fractions to the top-left corner of a cursor glyph centred on
/// that point.
pub fn denormalize(point: NormalizedPoint, geometry: &PlayfieldGeometry, glyph_size: f64) -> Point {
    let origin = geometry.content_origin();
    let half = glyph_size / 2.0;
    Point::new(
        origin.x + point.x * geometry.width - half,
        origin.y + point.y * geometry.height - half,
    )
}

/// Which information a remote position was reconstructed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Normalized,
    ViewportRatio,
    Raw,
}

/// Places a teammate's sample in local coordinates.
///
/// Prefers playfield fractions, then rescales by the sender's viewport,
/// and finally uses the raw pixels as sent.
pub fn resolve_remote(
    sample: &CursorSample,
    geometry: &PlayfieldGeometry,
    local_viewport: &ViewportInfo,
    glyph_size: f64,
) -> (Point, Resolution) {
    if let (Some(x), Some(y)) = (sample.normalized_x, sample.normalized_y) {
        let point = NormalizedPoint {
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
        };
        return (denormalize(point, geometry, glyph_size), Resolution::Normalized);
    }

    if let Some(remote) = sample
        .viewport
        .as_ref()
        .filter(|v| v.viewport_width > 0.0 && v.viewport_height > 0.0)
    {
        let half = glyph_size / 2.0;
        let x = sample.x * local_viewport.viewport_width / remote.viewport_width - half;
        let y = sample.y * local_viewport.viewport_height / remote.viewport_height - half;
        let max_x = (local_viewport.viewport_width - glyph_size).max(0.0);
        let max_y = (local_viewport.viewport_height - glyph_size).max(0.0);
        return (
            Point::new(x.clamp(0.0, max_x), y.clamp(0.0, max_y)),
            Resolution::ViewportRatio,
        );
    }

    (Point::new(sample.x, sample.y), Resolution::Raw)
}

#[derive(Debug, Clone)]
struct TrackedCursor {
    sample: CursorSample,
    received_at: f64,
}

/// A cursor ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCursor {
    pub user_id: PlayerId,
    pub label: Option<String>,
    pub position: Point,
    pub color: String,
}

/// Latest pointer per teammate, forgotten after a quiet period.
#[derive(Debug)]
pub struct CursorOverlay {
    local_id: PlayerId,
    stale_after_ms: f64,
    cursors: BTreeMap<PlayerId, TrackedCursor>,
}

impl CursorOverlay {
    pub fn new(local_id: PlayerId, stale_after_ms: f64) -> Self {
        Self {
            local_id,
            stale_after_ms,
            cursors: BTreeMap::new(),
        }
    }

    /// Stores a sample, replacing the sender's previous one. Own samples
    /// echoed back by the server are ignored.
    pub fn record(&mut self, sample: CursorSample, now: f64) -> bool {
        if sample.user_id == self.local_id {
            return false;
        }
        self.cursors.insert(
            sample.user_id,
            TrackedCursor {
                sample,
                received_at: now,
            },
        );
        true
    }

    /// Drops cursors not refreshed within the stale window.
    pub fn sweep(&mut self, now: f64) -> usize {
        let before = self.cursors.len();
        let limit = self.stale_after_ms;
        self.cursors.retain(|_, c| now - c.received_at <= limit);
        before - self.cursors.len()
    }

    pub fn contains(&self, user_id: PlayerId) -> bool {
        self.cursors.contains_key(&user_id)
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    pub fn clear(&mut self) {
        self.cursors.clear();
    }

    pub fn render(
        &self,
        geometry: &PlayfieldGeometry,
        viewport: &ViewportInfo,
        glyph_size: f64,
        snapshot: Option<&GameStateSnapshot>,
        scheme: &ColorScheme,
    ) -> Vec<RenderedCursor> {
        self.cursors
            .values()
            .map(|tracked| {
                let (position, _) = resolve_remote(&tracked.sample, geometry, viewport, glyph_size);
                let player = snapshot.and_then(|s| s.player(tracked.sample.user_id));
                let color_name = tracked
                    .sample
                    .color
                    .as_deref()
                    .or_else(|| player.map(|p| scheme.color_of(p)))
                    .unwrap_or_else(|| scheme.fallback());
                RenderedCursor {
                    user_id: tracked.sample.user_id,
                    label: player.map(|p| p.username.clone()),
                    position,
                    color: scheme.css_value(color_name).to_string(),
                }
            })
            .collect()
    }
}

struct PendingMove {
    pointer: Point,
    geometry: PlayfieldGeometry,
    viewport: ViewportInfo,
}

struct PublisherInner {
    scheduler: SharedScheduler,
    connection: ConnectionManager,
    user_id: PlayerId,
    config: CursorConfig,
    pending: RefCell<Option<PendingMove>>,
    timer: RefCell<Option<TimeoutHandle>>,
    last_sent: Cell<Option<Point>>,
}

/// Debounced outbound pointer broadcasting.
///
/// Each move restarts a `throttle_ms` timeout. When it fires the latest move
/// is sent unless it is within `min_move_px` of the previous broadcast on
/// both axes.
#[derive(Clone)]
pub struct PointerPublisher {
    inner: Rc<PublisherInner>,
}

impl PointerPublisher {
    pub fn new(
        scheduler: SharedScheduler,
        connection: ConnectionManager,
        user_id: PlayerId,
        config: CursorConfig,
    ) -> Self {
        Self {
            inner: Rc::new(PublisherInner {
                scheduler,
                connection,
                user_id,
                config,
                pending: RefCell::new(None),
                timer: RefCell::new(None),
                last_sent: Cell::new(None),
            }),
        }
    }

    pub fn pointer_moved(&self, pointer: Point, geometry: PlayfieldGeometry, viewport: ViewportInfo) {
        *self.inner.pending.borrow_mut() = Some(PendingMove {
            pointer,
            geometry,
            viewport,
        });
        let weak = Rc::downgrade(&self.inner);
        let handle = TimeoutHandle::schedule(
            &self.inner.scheduler,
            self.inner.config.throttle_ms,
            move || flush(&weak),
        );
        // Replacing the handle cancels the previous timeout.
        let previous = self.inner.timer.borrow_mut().replace(handle);
        drop(previous);
    }

    /// Drops any pending move.
    pub fn cancel(&self) {
        self.inner.pending.borrow_mut().take();
        self.inner.timer.borrow_mut().take();
    }
}

fn flush(weak: &Weak<PublisherInner>) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    inner.timer.borrow_mut().take();
    let Some(pending) = inner.pending.borrow_mut().take() else {
        return;
    };

    if let Some(last) = inner.last_sent.get() {
        let min = inner.config.min_move_px;
        if (pending.pointer.x - last.x).abs() < min && (pending.pointer.y - last.y).abs() < min {
            return;
        }
    }

    let normalized = normalize(pending.pointer, &pending.geometry);
    let sample = CursorSample {
        user_id: inner.user_id,
        x: pending.pointer.x,
        y: pending.pointer.y,
        normalized_x: Some(normalized.x),
        normalized_y: Some(normalized.y),
        timestamp: format_timestamp(inner.scheduler.now_ms()),
        viewport: Some(pending.viewport),
        game_area: Some(pending.geometry.game_area()),
        color: None,
    };
    match inner.connection.send(&OutboundMessage::MousePosition(sample)) {
        Ok(()) => inner.last_sent.set(Some(pending.pointer)),
        Err(e) => tracing::debug!("pointer sample not sent: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Endpoints, ReconnectPolicy};
    use crate::connection::{RecordingTransport, TransportEvent};
    use crate::schedule::ManualScheduler;

    fn geometry() -> PlayfieldGeometry {
        PlayfieldGeometry {
            left: 100.0,
            top: 50.0,
            padding_left: 10.0,
            padding_top: 10.0,
            width: 400.0,
            height: 200.0,
        }
    }

    fn sample(user_id: PlayerId) -> CursorSample {
        CursorSample {
            user_id,
            x: 300.0,
            y: 200.0,
            normalized_x: None,
            normalized_y: None,
            timestamp: None,
            viewport: None,
            game_area: None,
            color: None,
        }
    }

    #[test]
    fn test_normalize_subtracts_offset_and_clamps() {
        let g = geometry();
        let n = normalize(Point::new(310.0, 160.0), &g);
        assert!((n.x - 0.5).abs() < 1e-9);
        assert!((n.y - 0.5).abs() < 1e-9);

        let outside = normalize(Point::new(0.0, 1000.0), &g);
        assert_eq!(outside, NormalizedPoint { x: 0.0, y: 1.0 });
    }

    #[test]
    fn test_normalize_degenerate_geometry() {
        let n = normalize(Point::new(10.0, 10.0), &PlayfieldGeometry::default());
        assert_eq!(n, NormalizedPoint::default());
    }

    #[test]
    fn test_denormalize_centres_glyph() {
        let g = geometry();
        let p = denormalize(NormalizedPoint { x: 0.5, y: 0.5 }, &g, 20.0);
        assert_eq!(p, Point::new(300.0, 150.0));
    }

    #[test]
    fn test_resolve_remote_tiers() {
        let g = geometry();
        let local = ViewportInfo {
            viewport_width: 1200.0,
            viewport_height: 800.0,
            ..ViewportInfo::default()
        };

        let mut s = sample(2);
        s.normalized_x = Some(0.5);
        s.normalized_y = Some(0.5);
        assert_eq!(resolve_remote(&s, &g, &local, 20.0).1, Resolution::Normalized);

        let mut s = sample(2);
        s.x = 400.0;
        s.y = 300.0;
        s.viewport = Some(ViewportInfo {
            viewport_width: 800.0,
            viewport_height: 600.0,
            ..ViewportInfo::default()
        });
        let (p, via) = resolve_remote(&s, &g, &local, 20.0);
        assert_eq!(via, Resolution::ViewportRatio);
        assert_eq!(p, Point::new(590.0, 390.0));

        let s = sample(2);
        let (p, via) = resolve_remote(&s, &g, &local, 20.0);
        assert_eq!(via, Resolution::Raw);
        assert_eq!(p, Point::new(300.0, 200.0));
    }

    fn publisher() -> (Rc<ManualScheduler>, RecordingTransport, PointerPublisher) {
        let clock = Rc::new(ManualScheduler::new());
        let transport = RecordingTransport::new();
        let connection = ConnectionManager::new(
            Box::new(transport.clone()),
            clock.clone(),
            Endpoints::default(),
            ReconnectPolicy::default(),
        );
        connection.connect(1);
        transport.deliver(TransportEvent::Opened);
        let publisher =
            PointerPublisher::new(clock.clone(), connection, 1, CursorConfig::default());
        (clock, transport, publisher)
    }

    #[test]
    fn test_publisher_debounces_until_pointer_rests() {
        let (clock, transport, publisher) = publisher();
        let g = geometry();
        let viewport = ViewportInfo::default();

        for i in 0..5 {
            publisher.pointer_moved(Point::new(150.0 + f64::from(i) * 10.0, 100.0), g, viewport);
            clock.advance(30.0);
        }
        assert!(transport.sent().is_empty());

        clock.advance(30.0);
        let sent = transport.sent_json();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["type"], "mouse_position");
        assert_eq!(sent[0]["x"], 190.0);
    }

    #[test]
    fn test_publisher_skips_small_moves() {
        let (clock, transport, publisher) = publisher();
        let g = geometry();
        let viewport = ViewportInfo::default();

        publisher.pointer_moved(Point::new(150.0, 100.0), g, viewport);
        clock.advance(60.0);
        publisher.pointer_moved(Point::new(152.0, 101.0), g, viewport);
        clock.advance(60.0);
        publisher.pointer_moved(Point::new(160.0, 101.0), g, viewport);
        clock.advance(60.0);
        assert_eq!(transport.sent().len(), 2);
    }

    #[test]
    fn test_overlay_ignores_self_and_evicts_stale() {
        let mut overlay = CursorOverlay::new(1, 5000.0);
        assert!(!overlay.record(sample(1), 0.0));
        assert!(overlay.record(sample(2), 0.0));
        assert!(overlay.record(sample(3), 4000.0));

        assert_eq!(overlay.sweep(5000.0), 0);
        assert_eq!(overlay.sweep(5001.0), 1);
        assert!(!overlay.contains(2));
        assert!(overlay.contains(3));

        overlay.record(sample(3), 6000.0);
        assert_eq!(overlay.sweep(10_500.0), 0);
        assert_eq!(overlay.sweep(11_001.0), 1);
        assert!(overlay.is_empty());
    }

    #[test]
    fn test_overlay_render_uses_player_color() {
        let mut overlay = CursorOverlay::new(1, 5000.0);
        let mut s = sample(2);
        s.normalized_x = Some(0.0);
        s.normalized_y = Some(0.0);
        overlay.record(s, 0.0);

        let snapshot: GameStateSnapshot = serde_json::from_value(serde_json::json!({
            "session": {"id": 1, "status": "active"},
            "players": [{"id": 2, "username": "bo", "points": 5, "color": "blue"}]
        }))
        .unwrap();
        let rendered = overlay.render(
            &geometry(),
            &ViewportInfo::default(),
            20.0,
            Some(&snapshot),
            &ColorScheme::default(),
        );
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].color, "#4444ff");
        assert_eq!(rendered[0].label.as_deref(), Some("bo"));
        assert_eq!(rendered[0].position, Point::new(100.0, 50.0));
    }
}
