//! Spatial puzzle: drag a circle to the bottom past a moving obstacle.

use serde::{Deserialize, Serialize};

use crate::cursor::Point;
use crate::error::PuzzleDataError;

pub const SOLVED_ANSWER: &str = "solved";
pub const COLLISION_ANSWER: &str = "collision";

/// Playfield geometry in pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpatialConfig {
    pub width: f64,
    pub height: f64,
    pub circle_radius: f64,
    pub obstacle_width: f64,
    pub obstacle_height: f64,
    /// Pixels per frame.
    pub obstacle_speed: f64,
    /// Distance from the bottom edge that counts as reaching it.
    pub goal_margin: f64,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            width: 400.0,
            height: 600.0,
            circle_radius: 20.0,
            obstacle_width: 80.0,
            obstacle_height: 30.0,
            obstacle_speed: 10.0,
            goal_margin: 10.0,
        }
    }
}

impl SpatialConfig {
    pub fn validate(&self) -> Result<(), PuzzleDataError> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(PuzzleDataError::SpatialConfig("playfield must have a positive size"));
        }
        if self.circle_radius <= 0.0 {
            return Err(PuzzleDataError::SpatialConfig("circle radius must be positive"));
        }
        if self.circle_radius * 2.0 > self.width {
            return Err(PuzzleDataError::SpatialConfig("circle does not fit the playfield"));
        }
        if self.obstacle_width > self.width {
            return Err(PuzzleDataError::SpatialConfig("obstacle is wider than the playfield"));
        }
        if self.obstacle_speed < 0.0 {
            return Err(PuzzleDataError::SpatialConfig("obstacle speed must not be negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialOutcome {
    Solved,
    Collision,
}

impl SpatialOutcome {
    pub fn answer(self) -> &'static str {
        match self {
            Self::Solved => SOLVED_ANSWER,
            Self::Collision => COLLISION_ANSWER,
        }
    }
}

/// Overlap test between the circle's bounding square (top-left at
/// `circle`) and the obstacle rectangle. Touching edges overlap.
pub fn collides(circle: Point, radius: f64, obstacle: Point, width: f64, height: f64) -> bool {
    let diameter = radius * 2.0;
    let (cl, cr, ct, cb) = (circle.x, circle.x + diameter, circle.y, circle.y + diameter);
    let (ol, or, ot, ob) = (obstacle.x, obstacle.x + width, obstacle.y, obstacle.y + height);
    !(cl > or || cr < ol || ct > ob || cb < ot)
}

/// Whether the circle's bottom edge is within `margin` of the bottom.
pub fn reached_goal(circle_y: f64, radius: f64, height: f64, margin: f64) -> bool {
    circle_y + radius * 2.0 >= height - margin
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpatialEngine {
    config: SpatialConfig,
    circle: Point,
    obstacle: Point,
    direction: Direction,
    drag_offset: Option<Point>,
    outcome: Option<SpatialOutcome>,
}

impl SpatialEngine {
    pub fn new(config: SpatialConfig) -> Self {
        Self {
            circle: Point::new(config.width / 2.0 - config.circle_radius, 20.0),
            obstacle: Point::new(0.0, config.height / 2.0 - config.obstacle_height / 2.0),
            direction: Direction::Right,
            drag_offset: None,
            outcome: None,
            config,
        }
    }

    pub fn config(&self) -> &SpatialConfig {
        &self.config
    }

    pub fn circle(&self) -> Point {
        self.circle
    }

    pub fn obstacle(&self) -> Point {
        self.obstacle
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn outcome(&self) -> Option<SpatialOutcome> {
        self.outcome
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_offset.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// One physics frame: move the obstacle, then check collision and goal.
    /// Returns the outcome on the frame that decides it.
    pub fn step(&mut self) -> Option<SpatialOutcome> {
        if self.outcome.is_some() {
            return None;
        }
        let c = &self.config;
        match self.direction {
            Direction::Right => {
                self.obstacle.x += c.obstacle_speed;
                if self.obstacle.x >= c.width - c.obstacle_width {
                    self.direction = Direction::Left;
                }
            }
            Direction::Left => {
                self.obstacle.x -= c.obstacle_speed;
                if self.obstacle.x <= 0.0 {
                    self.direction = Direction::Right;
                }
            }
        }

        let outcome = if collides(
            self.circle,
            c.circle_radius,
            self.obstacle,
            c.obstacle_width,
            c.obstacle_height,
        ) {
            Some(SpatialOutcome::Collision)
        } else if reached_goal(self.circle.y, c.circle_radius, c.height, c.goal_margin) {
            Some(SpatialOutcome::Solved)
        } else {
            None
        };
        if outcome.is_some() {
            self.outcome = outcome;
            self.drag_offset = None;
        }
        outcome
    }

    fn contains(&self, pointer: Point) -> bool {
        let r = self.config.circle_radius;
        let dx = pointer.x - (self.circle.x + r);
        let dy = pointer.y - (self.circle.y + r);
        (dx * dx + dy * dy).sqrt() <= r
    }

    /// Starts a drag if `pointer` (playfield coordinates) is on the circle.
    pub fn begin_drag(&mut self, pointer: Point) -> bool {
        if self.outcome.is_some() || !self.contains(pointer) {
            return false;
        }
        self.drag_offset = Some(Point::new(pointer.x - self.circle.x, pointer.y - self.circle.y));
        true
    }

    /// Moves the circle with the pointer, clamped to the playfield. Win and
    /// loss are only evaluated by [`step`](Self::step).
    pub fn drag_to(&mut self, pointer: Point) {
        let Some(offset) = self.drag_offset else {
            return;
        };
        let d = self.config.circle_radius * 2.0;
        self.circle = Point::new(
            (pointer.x - offset.x).clamp(0.0, (self.config.width - d).max(0.0)),
            (pointer.y - offset.y).clamp(0.0, (self.config.height - d).max(0.0)),
        );
    }

    pub fn end_drag(&mut self) -> bool {
        self.drag_offset.take().is_some()
    }
}
