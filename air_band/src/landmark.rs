//! Hand landmark data as delivered by a landmark source.
//!
//! Positions are normalized frame coordinates: `[0, 1]` on both axes, origin
//! at the top-left, `y` growing downward.  Only the joints the classifier
//! reads are modelled.

use std::fmt;

// ── Joint definitions ──────────────────────────────────────

/// The tracked joints used for gesture classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Joint {
    Wrist,
    ThumbTip,
    IndexMcp,
    IndexTip,
    MiddleMcp,
    MiddleTip,
    RingMcp,
    RingTip,
    PinkyMcp,
    PinkyTip,
}

impl Joint {
    pub const ALL: [Joint; 10] = [
        Joint::Wrist,
        Joint::ThumbTip,
        Joint::IndexMcp,
        Joint::IndexTip,
        Joint::MiddleMcp,
        Joint::MiddleTip,
        Joint::RingMcp,
        Joint::RingTip,
        Joint::PinkyMcp,
        Joint::PinkyTip,
    ];

    /// Total number of modelled joints.
    pub const COUNT: usize = Self::ALL.len();

    /// Array index (0-9).
    pub fn index(self) -> usize { self as usize }

    /// Position of this joint in the 21-point hand-landmark layout
    /// (wrist = 0, thumb tip = 4, finger MCP/tip pairs at 5/8, 9/12, 13/16, 17/20).
    pub fn landmark_index(self) -> usize {
        match self {
            Joint::Wrist     => 0,
            Joint::ThumbTip  => 4,
            Joint::IndexMcp  => 5,
            Joint::IndexTip  => 8,
            Joint::MiddleMcp => 9,
            Joint::MiddleTip => 12,
            Joint::RingMcp   => 13,
            Joint::RingTip   => 16,
            Joint::PinkyMcp  => 17,
            Joint::PinkyTip  => 20,
        }
    }
}

/// The four non-thumb fingers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finger {
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 4] = [Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky];

    /// Metacarpophalangeal (knuckle) joint.
    pub fn knuckle(self) -> Joint {
        match self {
            Finger::Index  => Joint::IndexMcp,
            Finger::Middle => Joint::MiddleMcp,
            Finger::Ring   => Joint::RingMcp,
            Finger::Pinky  => Joint::PinkyMcp,
        }
    }

    pub fn tip(self) -> Joint {
        match self {
            Finger::Index  => Joint::IndexTip,
            Finger::Middle => Joint::MiddleTip,
            Finger::Ring   => Joint::RingTip,
            Finger::Pinky  => Joint::PinkyTip,
        }
    }
}

// ── Handedness ─────────────────────────────────────────────

/// Which hand the detector believes it is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// Parse a detector label (`"Left"` / `"Right"`, any ASCII case).
    pub fn from_label(label: &str) -> Option<Self> {
        if label.eq_ignore_ascii_case("left") {
            Some(Handedness::Left)
        } else if label.eq_ignore_ascii_case("right") {
            Some(Handedness::Right)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Handedness::Left  => "Left",
            Handedness::Right => "Right",
        }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// ── Point ──────────────────────────────────────────────────

/// Normalized 2D frame position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self { Point { x, y } }
}

// ── HandObservation ────────────────────────────────────────

/// One detected hand in one frame.
///
/// Joints the detector did not report are `None`; the classifier treats any
/// missing required joint as "no gesture".
#[derive(Debug, Clone, PartialEq)]
pub struct HandObservation {
    /// `None` when the detector's label was missing or unrecognised.
    pub handedness: Option<Handedness>,
    /// Detector confidence for the handedness label, when reported.
    pub score:      Option<f32>,
    joints:         [Option<Point>; Joint::COUNT],
}

impl HandObservation {
    /// An observation with no joints yet.
    pub fn new(handedness: Option<Handedness>) -> Self {
        HandObservation { handedness, score: None, joints: [None; Joint::COUNT] }
    }

    /// Build from a 21-point landmark list.  Joints beyond the end of a
    /// short list are left missing.
    pub fn from_landmarks(handedness: Option<Handedness>, landmarks: &[[f32; 2]]) -> Self {
        let mut obs = HandObservation::new(handedness);
        for joint in Joint::ALL {
            if let Some(&[x, y]) = landmarks.get(joint.landmark_index()) {
                obs.set(joint, Point::new(x, y));
            }
        }
        obs
    }

    pub fn with_joint(mut self, joint: Joint, p: Point) -> Self {
        self.set(joint, p);
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    pub fn set(&mut self, joint: Joint, p: Point) {
        self.joints[joint.index()] = Some(p);
    }

    pub fn joint(&self, joint: Joint) -> Option<Point> {
        self.joints[joint.index()]
    }

    pub fn wrist(&self) -> Option<Point> { self.joint(Joint::Wrist) }

    /// True when every modelled joint is present.
    pub fn is_complete(&self) -> bool {
        self.joints.iter().all(Option::is_some)
    }

    /// Reflect horizontally (`x → 1 − x`) for a selfie-view camera.
    ///
    /// The handedness label is kept as reported.
    pub fn mirrored(&self) -> Self {
        let mut out = self.clone();
        for p in out.joints.iter_mut().flatten() {
            p.x = 1.0 - p.x;
        }
        out
    }

    /// Present joints with their positions, for drawing.
    pub fn joints(&self) -> impl Iterator<Item = (Joint, Point)> + '_ {
        Joint::ALL.into_iter().filter_map(move |j| self.joint(j).map(|p| (j, p)))
    }
}

// ── LandmarkFrame ──────────────────────────────────────────

/// All hands observed in a single captured frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkFrame {
    pub hands: Vec<HandObservation>,
}

impl LandmarkFrame {
    pub fn new(hands: Vec<HandObservation>) -> Self { LandmarkFrame { hands } }

    pub fn is_empty(&self) -> bool { self.hands.is_empty() }

    /// Apply detector-side filtering: drop hands scored below
    /// `min_confidence`, keep at most `max_hands`, and optionally mirror.
    pub fn filtered(self, max_hands: usize, min_confidence: f32, mirror: bool) -> Self {
        let hands = self.hands.into_iter()
            .filter(|h| h.score.map_or(true, |s| s >= min_confidence))
            .take(max_hands)
            .map(|h| if mirror { h.mirrored() } else { h })
            .collect();
        LandmarkFrame { hands }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn full_landmarks() -> Vec<[f32; 2]> {
        (0..21).map(|i| [i as f32 / 100.0, 0.5]).collect()
    }

    #[test]
    fn handedness_labels() {
        assert_eq!(Handedness::from_label("Left"),  Some(Handedness::Left));
        assert_eq!(Handedness::from_label("RIGHT"), Some(Handedness::Right));
        assert_eq!(Handedness::from_label(""),      None);
        assert_eq!(Handedness::from_label("Both"),  None);
    }

    #[test]
    fn from_landmarks_picks_indexed_joints() {
        let obs = HandObservation::from_landmarks(Some(Handedness::Left), &full_landmarks());
        assert!(obs.is_complete());
        assert_eq!(obs.joint(Joint::ThumbTip).unwrap().x, 0.04);
        assert_eq!(obs.joint(Joint::PinkyTip).unwrap().x, 0.20);
    }

    #[test]
    fn short_landmark_list_leaves_joints_missing() {
        let obs = HandObservation::from_landmarks(Some(Handedness::Right), &full_landmarks()[..10]);
        assert!(!obs.is_complete());
        assert!(obs.joint(Joint::MiddleMcp).is_some()); // index 9
        assert!(obs.joint(Joint::MiddleTip).is_none()); // index 12
    }

    #[test]
    fn mirrored_reflects_x_only() {
        let obs = HandObservation::new(Some(Handedness::Left))
            .with_joint(Joint::Wrist, Point::new(0.25, 0.6));
        let m = obs.mirrored();
        assert_eq!(m.wrist(), Some(Point::new(0.75, 0.6)));
        assert_eq!(m.handedness, Some(Handedness::Left));
    }

    #[test]
    fn filtered_drops_low_confidence_and_caps_count() {
        let hand = |s: f32| HandObservation::new(Some(Handedness::Left)).with_score(s);
        let frame = LandmarkFrame::new(vec![
            hand(0.9), hand(0.5), hand(0.8), hand(0.95),
            HandObservation::new(None), // unscored hands pass
        ]);
        let out = frame.filtered(2, 0.7, false);
        assert_eq!(out.hands.len(), 2);
        assert_eq!(out.hands[0].score, Some(0.9));
        assert_eq!(out.hands[1].score, Some(0.8));
    }
}
