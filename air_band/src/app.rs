//! Top-level application state and frame loop.
//!
//! `AppState` owns the [`Arbiter`], the audio sink and the two status lines.
//! It consumes one [`LandmarkFrame`] at a time; [`run`] and [`run_headless`]
//! wire it to a landmark source, the player and (for `run`) the visualizer.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use air_synth::{BankError, SoundBank, SoundId, DEFAULT_SAMPLE_RATE};
use serde::Deserialize;

use crate::arbiter::{
    Arbiter, ArbiterConfig, ClassifiedHand, FrameOutcome, RaisedHands, TriggerSource,
    GESTURE_COOLDOWN, RAISE_THRESHOLD,
};
use crate::classifier::GestureLabel;
use crate::landmark::LandmarkFrame;
use crate::player::{AudioSink, Player};
use crate::source::{
    spawn_landmark_source, JsonLandmarkSource, SimInput, SimLandmarkSource, SourceEvent,
};
use crate::visualizer::Visualizer;

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

const MAX_COOLDOWN_SECS: f64 = 3600.0;

/// Where landmark frames come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Keyboard-driven synthetic hands (needs the window).
    #[default]
    Sim,
    /// JSON lines from `input`, or stdin when no input file is set.
    Json,
    /// LeapMotion controller (`leap` feature).
    Leap,
}

/// Configuration for the full application.
///
/// Every field has a default, so a config file only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding (or receiving) the five WAV files.
    pub sound_dir:         PathBuf,
    pub sample_rate:       u32,
    pub cooldown_secs:     f64,
    pub raise_threshold:   f32,
    pub max_hands:         usize,
    pub min_confidence:    f32,
    /// Reflect x to give a selfie view.
    pub mirror:            bool,
    /// Simulator frame period; also the replay pace for a JSON input file.
    pub frame_interval_ms: u64,
    pub source:            SourceKind,
    pub input:             Option<PathBuf>,
    pub headless:          bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            sound_dir:         PathBuf::from("."),
            sample_rate:       DEFAULT_SAMPLE_RATE,
            cooldown_secs:     GESTURE_COOLDOWN.as_secs_f64(),
            raise_threshold:   RAISE_THRESHOLD,
            max_hands:         2,
            min_confidence:    0.7,
            mirror:            false,
            frame_interval_ms: 33,
            source:            SourceKind::Sim,
            input:             None,
            headless:          false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("parsing config {}: {source}", .path.display())]
    Parse { path: PathBuf, source: serde_json::Error },

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cooldown_secs must lie in [0, 3600] (got {0})")]
    Cooldown(f64),

    #[error("min_confidence must lie in [0, 1] (got {0})")]
    Confidence(f32),

    #[error("raise_threshold must lie in [0, 1] (got {0})")]
    RaiseThreshold(f32),

    #[error("sample_rate must be positive")]
    SampleRate,

    #[error("max_hands must be at least 1")]
    MaxHands,
}

impl AppConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let cfg: AppConfig = serde_json::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=MAX_COOLDOWN_SECS).contains(&self.cooldown_secs) {
            return Err(ConfigError::Cooldown(self.cooldown_secs));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::Confidence(self.min_confidence));
        }
        if !(0.0..=1.0).contains(&self.raise_threshold) {
            return Err(ConfigError::RaiseThreshold(self.raise_threshold));
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::SampleRate);
        }
        if self.max_hands == 0 {
            return Err(ConfigError::MaxHands);
        }
        Ok(())
    }

    /// An out-of-range cooldown falls back to the default; call
    /// [`validate`](Self::validate) to reject it instead.
    pub fn arbiter_config(&self) -> ArbiterConfig {
        let cooldown = if (0.0..=MAX_COOLDOWN_SECS).contains(&self.cooldown_secs) {
            Duration::from_secs_f64(self.cooldown_secs)
        } else {
            GESTURE_COOLDOWN
        };
        ArbiterConfig {
            cooldown,
            raise_threshold: self.raise_threshold,
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("sound bank: {0}")]
    Bank(#[from] BankError),

    #[error("window: {0}")]
    Window(#[from] minifb::Error),

    #[error("opening landmark input {}: {source}", .path.display())]
    Input { path: PathBuf, source: io::Error },

    #[error("the keyboard simulator needs the window; use --source json or leap for headless runs")]
    SimNeedsWindow,

    #[error("LeapMotion support is not compiled in (rebuild with --features leap)")]
    LeapUnavailable,
}

// ════════════════════════════════════════════════════════════════════════════
// AppState
// ════════════════════════════════════════════════════════════════════════════

pub struct AppState<S: AudioSink> {
    arbiter:        Arbiter,
    sink:           S,

    // ── frame filtering ──────────────────────────────────────────────────
    max_hands:      usize,
    min_confidence: f32,
    mirror:         bool,

    // ── last frame, for the render loop ──────────────────────────────────
    last_frame:     LandmarkFrame,
    last_gestures:  Vec<GestureLabel>,
    raised:         RaisedHands,

    // ── status lines ─────────────────────────────────────────────────────
    status:         String,
    chorus_status:  String,
}

impl<S: AudioSink> AppState<S> {
    pub fn new(cfg: &AppConfig, sink: S) -> Self {
        AppState {
            arbiter:        Arbiter::new(cfg.arbiter_config()),
            sink,
            max_hands:      cfg.max_hands,
            min_confidence: cfg.min_confidence,
            mirror:         cfg.mirror,
            last_frame:     LandmarkFrame::default(),
            last_gestures:  Vec::new(),
            raised:         RaisedHands::default(),
            status:         String::new(),
            chorus_status:  String::new(),
        }
    }

    // ── process one LandmarkFrame ────────────────────────────────────────

    /// Classify every hand in `frame`, arbitrate, and start each fired sound.
    pub fn handle_frame(&mut self, frame: LandmarkFrame, now: Instant) -> FrameOutcome {
        let frame = frame.filtered(self.max_hands, self.min_confidence, self.mirror);
        let hands: Vec<ClassifiedHand> =
            frame.hands.iter().map(ClassifiedHand::from_observation).collect();

        let outcome = self.arbiter.process(&hands, now);

        for trigger in &outcome.triggers {
            self.sink.play(trigger.sound);
            match trigger.source {
                TriggerSource::Hand(side) => {
                    log::info!("{} ({} hand)", trigger.status(), side);
                    self.status = trigger.status().to_string();
                }
                TriggerSource::BothHandsRaised => {
                    log::info!("{} (both hands raised)", trigger.status());
                    self.chorus_status = trigger.status().to_string();
                }
            }
        }
        for s in &outcome.suppressed {
            log::debug!("{} held back, {:.2}s of cooldown left", s.sound, s.remaining.as_secs_f64());
        }

        self.last_gestures = hands.iter().map(|h| h.gesture).collect();
        self.last_frame    = frame;
        self.raised        = outcome.raised;
        outcome
    }

    // ── Accessors for the render loop ─────────────────────────────────────

    pub fn status(&self)        -> &str            { &self.status }
    pub fn chorus_status(&self) -> &str            { &self.chorus_status }
    pub fn last_frame(&self)    -> &LandmarkFrame  { &self.last_frame }
    pub fn last_gestures(&self) -> &[GestureLabel] { &self.last_gestures }
    pub fn raised(&self)        -> RaisedHands     { self.raised }
    pub fn arbiter(&self)       -> &Arbiter        { &self.arbiter }
    pub fn sink(&self)          -> &S              { &self.sink }
}

/// Feed every event from `rx` to `app` until the source quits or hangs up.
/// Returns the number of sounds started.
pub fn drive<S: AudioSink>(app: &mut AppState<S>, rx: &Receiver<SourceEvent>) -> usize {
    let mut fired = 0;
    for event in rx.iter() {
        match event {
            SourceEvent::Frame(frame) => fired += app.handle_frame(frame, Instant::now()).triggers.len(),
            SourceEvent::Quit         => break,
        }
    }
    fired
}

// ════════════════════════════════════════════════════════════════════════════
// Source wiring
// ════════════════════════════════════════════════════════════════════════════

fn spawn_external_source(cfg: &AppConfig) -> Result<Receiver<SourceEvent>, AppError> {
    match cfg.source {
        SourceKind::Sim => Err(AppError::SimNeedsWindow),
        SourceKind::Json => match &cfg.input {
            Some(path) => {
                let file = File::open(path)
                    .map_err(|source| AppError::Input { path: path.clone(), source })?;
                log::info!("landmarks: replaying {}", path.display());
                let source = JsonLandmarkSource::new(BufReader::new(file))
                    .with_pace(cfg.frame_interval());
                Ok(spawn_landmark_source(source))
            }
            None => {
                log::info!("landmarks: reading JSON lines from stdin");
                Ok(spawn_landmark_source(JsonLandmarkSource::new(BufReader::new(io::stdin()))))
            }
        },
        SourceKind::Leap => spawn_leap_source(),
    }
}

#[cfg(feature = "leap")]
fn spawn_leap_source() -> Result<Receiver<SourceEvent>, AppError> {
    log::info!("landmarks: LeapMotion controller");
    Ok(spawn_landmark_source(crate::source::LeapLandmarkSource))
}

#[cfg(not(feature = "leap"))]
fn spawn_leap_source() -> Result<Receiver<SourceEvent>, AppError> {
    Err(AppError::LeapUnavailable)
}

fn load_bank(cfg: &AppConfig) -> Result<Arc<SoundBank>, AppError> {
    let bank = SoundBank::load_or_synthesize(&cfg.sound_dir, cfg.sample_rate)?;
    log::info!("sound bank ready: {} Hz", bank.sample_rate());
    Ok(Arc::new(bank))
}

// ════════════════════════════════════════════════════════════════════════════
// run(): the windowed application loop
// ════════════════════════════════════════════════════════════════════════════

/// Run the full application.
///
/// This is the entry point called from `main.rs`.  It loads the sound bank,
/// starts the player, the landmark source and the visualizer, and drives
/// the event/render loop at ~60 fps.
pub fn run(cfg: AppConfig) -> Result<(), AppError> {
    cfg.validate()?;
    let bank   = load_bank(&cfg)?;
    let player = Player::spawn(bank);

    // ── Landmark source (sim input comes from the window) ────────────────
    let (frame_rx, sim_tx) = match cfg.source {
        SourceKind::Sim => {
            let (sim_tx, sim_rx) = mpsc::channel::<SimInput>();
            let rx = spawn_landmark_source(SimLandmarkSource::new(sim_rx, cfg.frame_interval()));
            (rx, Some(sim_tx))
        }
        _ => (spawn_external_source(&cfg)?, None),
    };

    let mut vis = Visualizer::new(sim_tx)?;
    let mut app = AppState::new(&cfg, player);

    // ── Main loop ─────────────────────────────────────────────────────────
    while vis.is_open() {
        if !vis.poll_input() { break; }

        loop {
            match frame_rx.try_recv() {
                Ok(SourceEvent::Frame(frame)) => { app.handle_frame(frame, Instant::now()); }
                Ok(SourceEvent::Quit)           => {
                    app.sink().quit();
                    return Ok(());
                }
                Err(TryRecvError::Empty)        => break,
                Err(TryRecvError::Disconnected) => {
                    app.sink().quit();
                    return Ok(());
                }
            }
        }

        vis.render(
            app.last_frame(),
            app.last_gestures(),
            app.raised(),
            app.arbiter().config().raise_threshold,
            app.status(),
            app.chorus_status(),
        );
    }

    app.sink().quit();
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// run_headless(): no window, status lines go to the log
// ════════════════════════════════════════════════════════════════════════════

/// Run without a window, until the landmark source ends.
pub fn run_headless(cfg: AppConfig) -> Result<(), AppError> {
    cfg.validate()?;
    let frame_rx = spawn_external_source(&cfg)?;
    let bank     = load_bank(&cfg)?;
    let mut app  = AppState::new(&cfg, Player::spawn(bank));

    let fired = drive(&mut app, &frame_rx);
    log::info!("landmark stream ended; {} sound(s) triggered", fired);

    if fired > 0 {
        // Let the last clips ring out before the player goes away.
        let longest = SoundId::ALL.iter().map(|s| s.duration_secs()).fold(0.0, f64::max);
        thread::sleep(Duration::from_secs_f64(longest));
    }
    app.sink().quit();
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmark::{Finger, HandObservation, Handedness, Joint, Point};
    use crate::source::SimPose;
    use std::cell::RefCell;
    use std::io::Cursor;

    #[derive(Default)]
    struct RecordingSink {
        played: RefCell<Vec<SoundId>>,
    }

    impl AudioSink for RecordingSink {
        fn play(&self, sound: SoundId) { self.played.borrow_mut().push(sound); }
    }

    fn make_app() -> AppState<RecordingSink> {
        AppState::new(&AppConfig::default(), RecordingSink::default())
    }

    fn played(app: &AppState<RecordingSink>) -> Vec<SoundId> {
        app.sink().played.borrow().clone()
    }

    fn poses(left: SimPose, right: SimPose) -> LandmarkFrame {
        SimLandmarkSource::frame_for(left, right)
    }

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    // ── config ───────────────────────────────────────────────────────────

    #[test]
    fn config_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.sample_rate, 44_100);
        assert_eq!(cfg.cooldown_secs, 1.0);
        assert_eq!(cfg.raise_threshold, 0.5);
        assert_eq!(cfg.max_hands, 2);
        assert_eq!(cfg.min_confidence, 0.7);
        assert_eq!(cfg.arbiter_config(), ArbiterConfig::default());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_partial_json_keeps_defaults() {
        let cfg = AppConfig::from_json_str(r#"{"cooldown_secs": 0.25, "mirror": true, "source": "json"}"#).unwrap();
        assert_eq!(cfg.arbiter_config().cooldown, ms(250));
        assert!(cfg.mirror);
        assert_eq!(cfg.source, SourceKind::Json);
        assert_eq!(cfg.max_hands, 2);
    }

    #[test]
    fn config_rejects_bad_values() {
        assert!(matches!(AppConfig::from_json_str(r#"{"cooldown_secs": -1}"#), Err(ConfigError::Cooldown(_))));
        assert!(matches!(AppConfig::from_json_str(r#"{"min_confidence": 1.5}"#), Err(ConfigError::Confidence(_))));
        assert!(matches!(AppConfig::from_json_str(r#"{"sample_rate": 0}"#), Err(ConfigError::SampleRate)));
        assert!(matches!(AppConfig::from_json_str(r#"{"max_hands": 0}"#), Err(ConfigError::MaxHands)));
        assert!(matches!(AppConfig::from_json_str(r#"{"source": "webcam"}"#), Err(ConfigError::Json(_))));
    }

    #[test]
    fn config_file_round_trip_and_missing_file() {
        let path = std::env::temp_dir().join(format!("air_band_cfg_{}.json", std::process::id()));
        std::fs::write(&path, r#"{"frame_interval_ms": 20, "raise_threshold": 0.375}"#).unwrap();
        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.frame_interval(), ms(20));
        assert_eq!(cfg.raise_threshold, 0.375);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Read { .. })));
    }

    // ── frame handling ───────────────────────────────────────────────────

    #[test]
    fn open_palm_plays_drum_and_sets_status() {
        let mut app = make_app();
        let out = app.handle_frame(poses(SimPose::Hidden, SimPose::OpenPalm), Instant::now());
        assert_eq!(out.triggers.len(), 1);
        assert_eq!(played(&app), vec![SoundId::Drum]);
        assert_eq!(app.status(), "Playing Drum");
        assert_eq!(app.chorus_status(), "");
        assert_eq!(app.last_gestures(), &[GestureLabel::OpenPalm]);
    }

    #[test]
    fn held_pose_retriggers_only_after_cooldown() {
        let mut app = make_app();
        let t0 = Instant::now();
        for i in 0..30 {
            app.handle_frame(poses(SimPose::Swipe, SimPose::Hidden), t0 + ms(33 * i));
        }
        assert_eq!(played(&app), vec![SoundId::Guitar]);
        assert_eq!(app.status(), "Strumming Guitar");

        app.handle_frame(poses(SimPose::Swipe, SimPose::Hidden), t0 + ms(1_050));
        assert_eq!(played(&app), vec![SoundId::Guitar, SoundId::Guitar]);
    }

    #[test]
    fn both_hands_raised_plays_chorus_once() {
        let mut app = make_app();
        let t0 = Instant::now();
        app.handle_frame(poses(SimPose::Fist, SimPose::Hidden), t0);
        app.handle_frame(poses(SimPose::Raised, SimPose::Raised), t0 + ms(100));
        app.handle_frame(poses(SimPose::Raised, SimPose::Raised), t0 + ms(133));

        assert_eq!(played(&app), vec![SoundId::Bass, SoundId::Chorus]);
        assert_eq!(app.status(), "Playing Bass");
        assert_eq!(app.chorus_status(), "Playing Chorus");
        assert!(app.raised().both());
        assert!(app.arbiter().chorus_active());
    }

    #[test]
    fn empty_frame_rearms_chorus() {
        let mut app = make_app();
        let t0 = Instant::now();
        app.handle_frame(poses(SimPose::Raised, SimPose::Raised), t0);
        app.handle_frame(LandmarkFrame::default(), t0 + ms(500));
        assert!(!app.arbiter().chorus_active());
        app.handle_frame(poses(SimPose::Raised, SimPose::Raised), t0 + ms(1_200));
        assert_eq!(played(&app), vec![SoundId::Chorus, SoundId::Chorus]);
    }

    #[test]
    fn low_confidence_hands_are_ignored() {
        let mut app = make_app();
        let mut frame = poses(SimPose::Hidden, SimPose::OpenPalm);
        frame.hands[0].score = Some(0.5);
        app.handle_frame(frame, Instant::now());
        assert!(played(&app).is_empty());
        assert!(app.last_frame().is_empty());
    }

    #[test]
    fn extra_hands_beyond_max_are_dropped() {
        let mut app = make_app();
        let mut frame = poses(SimPose::Neutral, SimPose::Neutral);
        frame.hands.push(SimPose::Fist.observation(Handedness::Right).unwrap());
        app.handle_frame(frame, Instant::now());
        assert!(played(&app).is_empty());
        assert_eq!(app.last_frame().hands.len(), 2);
    }

    #[test]
    fn mirror_moves_swipe_zone() {
        let cfg = AppConfig { mirror: true, ..AppConfig::default() };
        let mut app = AppState::new(&cfg, RecordingSink::default());
        // Left hand at the right edge, thumb pointing right: mirrored into a left swipe.
        let mut obs = HandObservation::new(Some(Handedness::Left))
            .with_joint(Joint::Wrist,    Point::new(0.875, 0.75))
            .with_joint(Joint::ThumbTip, Point::new(0.9375, 0.7));
        for (finger, up) in Finger::ALL.into_iter().zip([true, false, false, false]) {
            obs.set(finger.knuckle(), Point::new(0.875, 0.625));
            obs.set(finger.tip(),     Point::new(0.875, if up { 0.5 } else { 0.75 }));
        }
        app.handle_frame(LandmarkFrame::new(vec![obs]), Instant::now());
        assert_eq!(played(&app), vec![SoundId::Guitar]);
    }

    #[test]
    fn drive_consumes_json_stream() {
        fn line(hand: &HandObservation) -> String {
            let mut pts = vec![[0.0f32, 0.0]; 21];
            for (j, p) in hand.joints() {
                pts[j.landmark_index()] = [p.x, p.y];
            }
            let pts: Vec<String> = pts.iter().map(|[x, y]| format!("[{},{}]", x, y)).collect();
            format!(
                r#"{{"hands":[{{"handedness":"{}","score":0.9,"landmarks":[{}]}}]}}"#,
                hand.handedness.map_or("", Handedness::as_str), pts.join(",")
            )
        }
        let fist = SimPose::Fist.observation(Handedness::Left).unwrap();
        let palm = SimPose::OpenPalm.observation(Handedness::Right).unwrap();
        let input = format!("{}\n{}\nnot json\n", line(&fist), line(&palm));

        let rx = spawn_landmark_source(JsonLandmarkSource::new(Cursor::new(input)));
        let mut app = make_app();
        let fired = drive(&mut app, &rx);
        assert_eq!(fired, 2);
        assert_eq!(played(&app), vec![SoundId::Bass, SoundId::Drum]);
    }

    #[test]
    fn headless_rejects_simulator() {
        let cfg = AppConfig::default();
        assert!(matches!(run_headless(cfg), Err(AppError::SimNeedsWindow)));
    }

    #[cfg(not(feature = "leap"))]
    #[test]
    fn leap_source_needs_feature() {
        let cfg = AppConfig { source: SourceKind::Leap, ..AppConfig::default() };
        assert!(matches!(spawn_external_source(&cfg), Err(AppError::LeapUnavailable)));
    }

    #[test]
    fn missing_input_file_is_reported() {
        let cfg = AppConfig {
            source: SourceKind::Json,
            input:  Some(PathBuf::from("/nonexistent/air_band/frames.jsonl")),
            ..AppConfig::default()
        };
        assert!(matches!(spawn_external_source(&cfg), Err(AppError::Input { .. })));
    }
}
