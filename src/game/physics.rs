//! Stage geometry: rectangles, bounds and the jump arc

use serde::{Deserialize, Serialize};

use super::actor::Facing;

/// Axis-aligned rectangle (top-left origin, y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    /// Strict overlap on both axes; touching edges do not count
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Centered sub-rectangle covering the given fraction of each side
    pub fn centered_fraction(&self, fraction_w: f32, fraction_h: f32) -> Rect {
        let w = self.w * fraction_w;
        let h = self.h * fraction_h;
        Rect {
            x: self.x + (self.w - w) / 2.0,
            y: self.y + (self.h - h) / 2.0,
            w,
            h,
        }
    }

    /// Translate a body-relative rectangle into world space
    pub fn relative_to(&self, origin_x: f32, origin_y: f32) -> Rect {
        Rect {
            x: origin_x + self.x,
            y: origin_y + self.y,
            w: self.w,
            h: self.h,
        }
    }
}

/// Three-segment jump timing in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArcTiming {
    pub ascend: u64,
    pub apex: u64,
    pub descend: u64,
}

impl ArcTiming {
    pub fn total(&self) -> u64 {
        self.ascend + self.apex + self.descend
    }
}

/// Movement and geometry helpers
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Keep a body of `body_w` fully inside `[0, stage_w]`
    pub fn clamp_to_stage(x: f32, body_w: f32, stage_w: f32) -> f32 {
        x.clamp(0.0, (stage_w - body_w).max(0.0))
    }

    /// One tick of horizontal movement at `speed` px/tick
    pub fn step(x: f32, facing: Facing, speed: f32, body_w: f32, stage_w: f32) -> f32 {
        Self::clamp_to_stage(x + facing.sign() * speed, body_w, stage_w)
    }

    /// Height fraction (0..=1) of the jump arc after `elapsed` ticks:
    /// linear rise, flat apex, linear fall.
    pub fn jump_lift(elapsed: u64, timing: &ArcTiming) -> f32 {
        if elapsed >= timing.total() {
            return 0.0;
        }
        if elapsed < timing.ascend {
            return elapsed as f32 / timing.ascend as f32;
        }
        let after_apex = elapsed - timing.ascend;
        if after_apex < timing.apex {
            return 1.0;
        }
        let falling = after_apex - timing.apex;
        if timing.descend == 0 {
            return 0.0;
        }
        (1.0 - falling as f32 / timing.descend as f32).clamp(0.0, 1.0)
    }

    /// Horizontal distance between two actors
    pub fn distance(a_x: f32, b_x: f32) -> f32 {
        (a_x - b_x).abs()
    }

    /// Direction from `from_x` toward `to_x`, `None` when level
    pub fn direction_to(from_x: f32, to_x: f32) -> Option<Facing> {
        if to_x > from_x {
            Some(Facing::Right)
        } else if to_x < from_x {
            Some(Facing::Left)
        } else {
            None
        }
    }
}
