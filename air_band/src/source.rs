//! Landmark sources: where per-frame hand observations come from.
//!
//! The public interface is [`SourceEvent`] delivered over an `mpsc` channel.
//! The frame loop doesn't need to know whether frames came from the keyboard
//! simulator, an external camera + landmark-model process, or LeapMotion
//! hardware.

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::landmark::{Finger, HandObservation, Handedness, Joint, LandmarkFrame, Point};

// ════════════════════════════════════════════════════════════════════════════
// SourceEvent
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub enum SourceEvent {
    /// Everything observed in one captured frame (possibly no hands).
    Frame(LandmarkFrame),
    /// The source is finished, or the user asked to quit.
    Quit,
}

// ════════════════════════════════════════════════════════════════════════════
// LandmarkSource trait
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can deliver [`SourceEvent`]s over a channel.
pub trait LandmarkSource: Send + 'static {
    fn run(self: Box<Self>, tx: Sender<SourceEvent>);
}

/// Spawn a landmark source on its own thread and return the receiving end.
pub fn spawn_landmark_source<S: LandmarkSource>(source: S) -> Receiver<SourceEvent> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || Box::new(source).run(tx));
    rx
}

// ════════════════════════════════════════════════════════════════════════════
// SimLandmarkSource: keyboard-selected synthetic poses (always available)
// ════════════════════════════════════════════════════════════════════════════

/// Pose a simulated hand can be put in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimPose {
    /// Hand not in frame.
    Hidden,
    /// Low in the frame, fingers mixed: no gesture.
    Neutral,
    OpenPalm,
    Fist,
    /// At the outer edge of the frame with the thumb trailing outward.
    Swipe,
    /// Wrist in the upper half of the frame, no gesture.
    Raised,
}

impl SimPose {
    pub fn name(self) -> &'static str {
        match self {
            SimPose::Hidden   => "hidden",
            SimPose::Neutral  => "neutral",
            SimPose::OpenPalm => "open palm",
            SimPose::Fist     => "fist",
            SimPose::Swipe    => "swipe",
            SimPose::Raised   => "raised",
        }
    }

    /// Synthetic landmarks for this pose, or `None` when hidden.
    ///
    /// The hand is drawn as seen in a selfie view: the left hand's thumb
    /// points toward the left edge, the right hand's toward the right edge.
    pub fn observation(self, side: Handedness) -> Option<HandObservation> {
        // (wrist x for the left hand, wrist y, fingertips up?)
        let (left_x, wrist_y, tips): (f32, f32, [bool; 4]) = match self {
            SimPose::Hidden   => return None,
            SimPose::Neutral  => (0.35, 0.75, MIXED),
            SimPose::OpenPalm => (0.35, 0.75, [true; 4]),
            SimPose::Fist     => (0.35, 0.75, [false; 4]),
            SimPose::Swipe    => (0.15, 0.75, MIXED),
            SimPose::Raised   => (0.35, 0.30, MIXED),
        };
        let (wrist_x, outward) = match side {
            Handedness::Left  => (left_x,       -1.0),
            Handedness::Right => (1.0 - left_x,  1.0),
        };
        let knuckle_y = wrist_y - 0.10;

        let mut obs = HandObservation::new(Some(side))
            .with_score(0.95)
            .with_joint(Joint::Wrist,    Point::new(wrist_x, wrist_y))
            .with_joint(Joint::ThumbTip, Point::new(wrist_x + outward * 0.07, wrist_y - 0.05));
        for (i, (finger, up)) in Finger::ALL.into_iter().zip(tips).enumerate() {
            let x = wrist_x + outward * (0.03 - 0.02 * i as f32);
            let tip_y = if up { knuckle_y - 0.12 } else { knuckle_y + 0.05 };
            obs.set(finger.knuckle(), Point::new(x, knuckle_y));
            obs.set(finger.tip(),     Point::new(x, tip_y));
        }
        Some(obs)
    }
}

/// Index finger up, the rest curled.
const MIXED: [bool; 4] = [true, false, false, false];

/// Raw input event from the simulation window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimInput {
    KeyDown(SimKey),
}

/// Simulated key actions (mapped from minifb keys by the visualizer).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimKey {
    Pose(Handedness, SimPose),
    Quit,
}

/// Landmark source driven by [`SimInput`] events from the visualizer.
///
/// Each hand holds its last selected pose; the current poses are re-emitted
/// as a frame every `interval`, so a held pose keeps proposing its gesture
/// the way a real camera feed does.
pub struct SimLandmarkSource {
    pub rx:       Receiver<SimInput>,
    pub interval: Duration,
}

impl SimLandmarkSource {
    pub fn new(rx: Receiver<SimInput>, interval: Duration) -> Self {
        SimLandmarkSource { rx, interval }
    }

    /// The frame produced by the given (left, right) poses.
    pub fn frame_for(left: SimPose, right: SimPose) -> LandmarkFrame {
        let hands = [(left, Handedness::Left), (right, Handedness::Right)]
            .into_iter()
            .filter_map(|(pose, side)| pose.observation(side))
            .collect();
        LandmarkFrame::new(hands)
    }
}

impl LandmarkSource for SimLandmarkSource {
    fn run(self: Box<Self>, tx: Sender<SourceEvent>) {
        let mut left  = SimPose::Neutral;
        let mut right = SimPose::Neutral;
        let mut last_emit: Option<Instant> = None;

        loop {
            let wait = last_emit.map_or(Duration::ZERO, |t| self.interval.saturating_sub(t.elapsed()));
            let mut changed = false;
            match self.rx.recv_timeout(wait) {
                Ok(SimInput::KeyDown(SimKey::Pose(side, pose))) => {
                    log::debug!("[sim] {} hand → {}", side, pose.name());
                    match side {
                        Handedness::Left  => left  = pose,
                        Handedness::Right => right = pose,
                    }
                    changed = true;
                }
                Ok(SimInput::KeyDown(SimKey::Quit)) | Err(RecvTimeoutError::Disconnected) => {
                    let _ = tx.send(SourceEvent::Quit);
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {}
            }

            let due = last_emit.map_or(true, |t| t.elapsed() >= self.interval);
            if changed || due {
                last_emit = Some(Instant::now());
                if tx.send(SourceEvent::Frame(Self::frame_for(left, right))).is_err() {
                    return;
                }
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// JsonLandmarkSource: JSON lines from an external landmark model
// ════════════════════════════════════════════════════════════════════════════

/// One line of the landmark stream.
#[derive(Debug, Deserialize)]
struct WireFrame {
    #[serde(default)]
    hands: Vec<WireHand>,
}

#[derive(Debug, Deserialize)]
struct WireHand {
    #[serde(default)]
    handedness: Option<String>,
    #[serde(default)]
    score:      Option<f32>,
    #[serde(default)]
    landmarks:  Vec<WirePoint>,
}

/// `[x, y]`, `[x, y, z]` or `{"x": .., "y": ..}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WirePoint {
    List(Vec<f32>),
    Object { x: f32, y: f32 },
}

impl WirePoint {
    fn xy(&self) -> Option<[f32; 2]> {
        match self {
            WirePoint::List(v) => match v.as_slice() {
                [x, y, ..] => Some([*x, *y]),
                _          => None,
            },
            WirePoint::Object { x, y } => Some([*x, *y]),
        }
    }
}

impl WireHand {
    fn into_observation(self) -> HandObservation {
        let handedness = self.handedness.as_deref().and_then(Handedness::from_label);
        // A malformed point ends the usable list; later joints stay missing.
        let points: Vec<[f32; 2]> = self.landmarks.iter().map_while(WirePoint::xy).collect();
        let mut obs = HandObservation::from_landmarks(handedness, &points);
        obs.score = self.score;
        obs
    }
}

/// Parse one line of the landmark stream.
pub fn parse_frame(line: &str) -> Result<LandmarkFrame, serde_json::Error> {
    let wire: WireFrame = serde_json::from_str(line)?;
    Ok(LandmarkFrame::new(wire.hands.into_iter().map(WireHand::into_observation).collect()))
}

/// Landmark source reading one JSON frame per line.
///
/// ```text
/// {"hands":[{"handedness":"Left","score":0.93,"landmarks":[[0.41,0.72],…]}]}
/// ```
///
/// Landmarks use the 21-point hand layout.  Malformed lines are logged and
/// skipped; end of input ends the session.
pub struct JsonLandmarkSource<R> {
    reader: R,
    pace:   Option<Duration>,
}

impl<R: BufRead + Send + 'static> JsonLandmarkSource<R> {
    pub fn new(reader: R) -> Self {
        JsonLandmarkSource { reader, pace: None }
    }

    /// Sleep `interval` after each frame, for replaying a recorded file at
    /// capture speed.
    pub fn with_pace(mut self, interval: Duration) -> Self {
        self.pace = Some(interval);
        self
    }
}

impl<R: BufRead + Send + 'static> LandmarkSource for JsonLandmarkSource<R> {
    fn run(self: Box<Self>, tx: Sender<SourceEvent>) {
        let JsonLandmarkSource { reader, pace } = *self;
        for (n, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(l)  => l,
                Err(e) => {
                    log::error!("[json] read error: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() { continue; }

            match parse_frame(&line) {
                Ok(frame) => {
                    if tx.send(SourceEvent::Frame(frame)).is_err() { return; }
                }
                Err(e) => log::warn!("[json] line {}: {}", n + 1, e),
            }
            if let Some(p) = pace { thread::sleep(p); }
        }
        log::info!("[json] end of landmark stream");
        let _ = tx.send(SourceEvent::Quit);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LeapLandmarkSource: real hardware (feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// Landmark source backed by a LeapMotion controller.
///
/// Requires the `leap` feature flag and the LeapC shared library installed.
/// Joint positions (millimetres, y up) are projected onto the frame plane:
/// x over `[-250, 250]` mm and height over `[50, 450]` mm map to `[0, 1]`,
/// with height inverted so raised hands get small `y`.
#[cfg(feature = "leap")]
pub struct LeapLandmarkSource;

#[cfg(feature = "leap")]
impl LeapLandmarkSource {
    fn project(x: f32, y: f32) -> Point {
        Point::new((x + 250.0) / 500.0, 1.0 - (y - 50.0) / 400.0)
    }
}

#[cfg(feature = "leap")]
impl LandmarkSource for LeapLandmarkSource {
    fn run(self: Box<Self>, tx: Sender<SourceEvent>) {
        use leaprs::*;

        let mut connection = match Connection::create(ConnectionConfig::default()) {
            Ok(c)  => c,
            Err(e) => {
                log::error!("[leap] failed to create LeapC connection: {:?}", e);
                let _ = tx.send(SourceEvent::Quit);
                return;
            }
        };
        if let Err(e) = connection.open() {
            log::error!("[leap] failed to open LeapMotion device: {:?}", e);
            let _ = tx.send(SourceEvent::Quit);
            return;
        }

        loop {
            let msg = match connection.poll(100) {
                Ok(m)  => m,
                Err(_) => continue,
            };
            if let Event::Tracking(frame) = msg.event() {
                let hands = frame.hands().into_iter().map(|hand| {
                    let side = match hand.hand_type() {
                        HandType::Left  => Handedness::Left,
                        HandType::Right => Handedness::Right,
                    };
                    let mut obs = HandObservation::new(Some(side));
                    let digits: Vec<_> = hand.digits().into_iter().collect();
                    if digits.len() < 5 { return obs; }

                    let wrist = digits[2].metacarpal().prev_joint();
                    obs.set(Joint::Wrist, Self::project(wrist.x, wrist.y));
                    let thumb = digits[0].distal().next_joint();
                    obs.set(Joint::ThumbTip, Self::project(thumb.x, thumb.y));
                    for (finger, digit) in Finger::ALL.into_iter().zip(&digits[1..]) {
                        let knuckle = digit.metacarpal().next_joint();
                        let tip     = digit.distal().next_joint();
                        obs.set(finger.knuckle(), Self::project(knuckle.x, knuckle.y));
                        obs.set(finger.tip(),     Self::project(tip.x, tip.y));
                    }
                    obs
                }).collect();
                if tx.send(SourceEvent::Frame(LandmarkFrame::new(hands))).is_err() {
                    return;
                }
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
