//! Gesture classification: one hand, one frame, no state.
//!
//! Rules are evaluated in a fixed order and the first match wins:
//!
//! | # | Gesture | Condition |
//! |---|---|---|
//! | 1 | OpenPalm   | every fingertip above its knuckle (tip.y < mcp.y) |
//! | 2 | ClosedFist | every fingertip below its knuckle (tip.y > mcp.y) |
//! | 3 | LeftSwipe  | Left hand, wrist.x < 0.3, thumb tip left of wrist |
//! | 4 | RightSwipe | Right hand, wrist.x > 0.7, thumb tip right of wrist |
//!
//! Finger shape is therefore decided before hand position.  A hand with a
//! missing joint or an unknown handedness label is never classified.

use std::fmt;

use crate::landmark::{Finger, HandObservation, Handedness, Joint, Point};

/// Wrist x below which a left hand counts as being at the left edge.
pub const LEFT_SWIPE_MAX_X: f32 = 0.3;

/// Wrist x above which a right hand counts as being at the right edge.
pub const RIGHT_SWIPE_MIN_X: f32 = 0.7;

// ════════════════════════════════════════════════════════════════════════════
// GestureLabel
// ════════════════════════════════════════════════════════════════════════════

/// Discrete gesture recognised for one hand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GestureLabel {
    OpenPalm,
    ClosedFist,
    LeftSwipe,
    RightSwipe,
    None,
}

impl GestureLabel {
    pub fn is_none(self) -> bool { self == GestureLabel::None }

    pub fn name(self) -> &'static str {
        match self {
            GestureLabel::OpenPalm   => "Open Palm",
            GestureLabel::ClosedFist => "Closed Fist",
            GestureLabel::LeftSwipe  => "Left Swipe",
            GestureLabel::RightSwipe => "Right Swipe",
            GestureLabel::None       => "-",
        }
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HandGeometry: the joints the rules read, all guaranteed present
// ════════════════════════════════════════════════════════════════════════════

struct HandGeometry {
    handedness: Handedness,
    wrist:      Point,
    thumb_tip:  Point,
    /// (knuckle, tip) per finger, index → pinky.
    fingers:    [(Point, Point); 4],
}

impl HandGeometry {
    fn extract(obs: &HandObservation) -> Option<Self> {
        let handedness = obs.handedness?;
        let wrist      = obs.joint(Joint::Wrist)?;
        let thumb_tip  = obs.joint(Joint::ThumbTip)?;
        let mut fingers = [(Point::default(), Point::default()); 4];
        for (slot, finger) in fingers.iter_mut().zip(Finger::ALL) {
            *slot = (obs.joint(finger.knuckle())?, obs.joint(finger.tip())?);
        }
        Some(HandGeometry { handedness, wrist, thumb_tip, fingers })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Rule table
// ════════════════════════════════════════════════════════════════════════════

type Rule = fn(&HandGeometry) -> bool;

const RULES: [(GestureLabel, Rule); 4] = [
    (GestureLabel::OpenPalm,   is_open_palm),
    (GestureLabel::ClosedFist, is_closed_fist),
    (GestureLabel::LeftSwipe,  is_left_swipe),
    (GestureLabel::RightSwipe, is_right_swipe),
];

fn is_open_palm(h: &HandGeometry) -> bool {
    h.fingers.iter().all(|(mcp, tip)| tip.y < mcp.y)
}

fn is_closed_fist(h: &HandGeometry) -> bool {
    h.fingers.iter().all(|(mcp, tip)| tip.y > mcp.y)
}

fn is_left_swipe(h: &HandGeometry) -> bool {
    h.handedness == Handedness::Left
        && h.wrist.x < LEFT_SWIPE_MAX_X
        && h.thumb_tip.x < h.wrist.x
}

fn is_right_swipe(h: &HandGeometry) -> bool {
    h.handedness == Handedness::Right
        && h.wrist.x > RIGHT_SWIPE_MIN_X
        && h.thumb_tip.x > h.wrist.x
}

/// Classify one hand observation.
pub fn classify(obs: &HandObservation) -> GestureLabel {
    let Some(geometry) = HandGeometry::extract(obs) else {
        return GestureLabel::None;
    };
    RULES.iter()
        .find(|(_, rule)| rule(&geometry))
        .map_or(GestureLabel::None, |(label, _)| *label)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
