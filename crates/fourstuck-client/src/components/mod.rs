//! UI components for the 4stuck client.

mod cursor_layer;
mod feeds;
mod puzzle_view;
mod standings;

pub use cursor_layer::CursorLayer;
pub use feeds::{NotificationFeed, PointFeed};
pub use puzzle_view::PuzzleView;
pub use standings::Standings;
