//! Playback arbitration: turns per-frame gesture labels into debounced sound
//! triggers.
//!
//! Two independent channels are evaluated every frame:
//!
//! 1. **Per hand.**  Each classified hand proposes the sound mapped to its
//!    gesture.  The sound fires only if its cooldown has elapsed.
//! 2. **Composite.**  When a left and a right hand are both raised (wrist in
//!    the upper half of the frame) the Chorus fires once on the rising edge,
//!    again subject to its own cooldown.  The latch re-arms as soon as either
//!    hand drops or disappears, even inside the cooldown window.
//!
//! The [`Arbiter`] owns the only cooldown table and chorus latch of a
//! session.

use std::time::{Duration, Instant};

use air_synth::SoundId;

use crate::classifier::{classify, GestureLabel};
use crate::landmark::{HandObservation, Handedness};

/// Minimum time between two triggers of the same sound.
pub const GESTURE_COOLDOWN: Duration = Duration::from_secs(1);

/// A wrist with `y` below this is "raised" (upper half of the frame).
pub const RAISE_THRESHOLD: f32 = 0.5;

/// Sound proposed by a single-hand gesture.
pub fn sound_for(label: GestureLabel) -> Option<SoundId> {
    match label {
        GestureLabel::OpenPalm   => Some(SoundId::Drum),
        GestureLabel::ClosedFist => Some(SoundId::Bass),
        GestureLabel::LeftSwipe  => Some(SoundId::Guitar),
        GestureLabel::RightSwipe => Some(SoundId::Cymbal),
        GestureLabel::None       => None,
    }
}

/// Status line shown when `sound` starts playing.
pub fn status_text(sound: SoundId) -> &'static str {
    match sound {
        SoundId::Drum   => "Playing Drum",
        SoundId::Bass   => "Playing Bass",
        SoundId::Guitar => "Strumming Guitar",
        SoundId::Cymbal => "Playing Cymbal",
        SoundId::Chorus => "Playing Chorus",
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ArbiterConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArbiterConfig {
    pub cooldown:        Duration,
    pub raise_threshold: f32,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        ArbiterConfig { cooldown: GESTURE_COOLDOWN, raise_threshold: RAISE_THRESHOLD }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Per-frame input snapshot
// ════════════════════════════════════════════════════════════════════════════

/// What the arbiter needs to know about one hand in the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifiedHand {
    pub handedness: Option<Handedness>,
    /// Wrist height, if the wrist was tracked.
    pub wrist_y:    Option<f32>,
    pub gesture:    GestureLabel,
}

impl ClassifiedHand {
    /// Classify `obs` and keep the fields the arbiter reads.
    pub fn from_observation(obs: &HandObservation) -> Self {
        ClassifiedHand {
            handedness: obs.handedness,
            wrist_y:    obs.wrist().map(|w| w.y),
            gesture:    classify(obs),
        }
    }

    fn is_raised(&self, threshold: f32) -> bool {
        self.wrist_y.map_or(false, |y| y < threshold)
    }
}

/// Which hands are raised in the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RaisedHands {
    pub left:  bool,
    pub right: bool,
}

impl RaisedHands {
    /// A hand absent from the frame counts as not raised; so does a hand
    /// whose handedness is unknown.
    pub fn compute(hands: &[ClassifiedHand], threshold: f32) -> Self {
        let raised = |side: Handedness| hands.iter()
            .any(|h| h.handedness == Some(side) && h.is_raised(threshold));
        RaisedHands { left: raised(Handedness::Left), right: raised(Handedness::Right) }
    }

    pub fn both(self) -> bool { self.left && self.right }
}

// ════════════════════════════════════════════════════════════════════════════
// Per-frame output
// ════════════════════════════════════════════════════════════════════════════

/// The channel that produced a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Hand(Handedness),
    BothHandsRaised,
}

/// A request to start playing `sound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub sound:  SoundId,
    pub source: TriggerSource,
}

impl Trigger {
    pub fn status(&self) -> &'static str { status_text(self.sound) }
}

/// A candidate the cooldown held back.  Not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suppressed {
    pub sound:     SoundId,
    pub source:    TriggerSource,
    /// Time left until `sound` may fire again.
    pub remaining: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameOutcome {
    pub triggers:   Vec<Trigger>,
    pub suppressed: Vec<Suppressed>,
    pub raised:     RaisedHands,
}

impl FrameOutcome {
    pub fn fired(&self, sound: SoundId) -> bool {
        self.triggers.iter().any(|t| t.sound == sound)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CooldownState
// ════════════════════════════════════════════════════════════════════════════

/// Last trigger time per sound.  A sound that never fired is always ready.
#[derive(Debug, Clone, Default)]
pub struct CooldownState {
    last: [Option<Instant>; SoundId::COUNT],
}

impl CooldownState {
    pub fn last_trigger(&self, sound: SoundId) -> Option<Instant> {
        self.last[sound.index()]
    }

    /// `Ok` when strictly more than `cooldown` has passed since the last
    /// trigger, otherwise the time still to wait.
    pub fn check(&self, sound: SoundId, now: Instant, cooldown: Duration) -> Result<(), Duration> {
        match self.last[sound.index()] {
            None => Ok(()),
            Some(last) => {
                let elapsed = now.saturating_duration_since(last);
                if elapsed > cooldown {
                    Ok(())
                } else {
                    Err(cooldown - elapsed)
                }
            }
        }
    }

    fn mark(&mut self, sound: SoundId, now: Instant) {
        self.last[sound.index()] = Some(now);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Arbiter
// ════════════════════════════════════════════════════════════════════════════

/// Session state: the cooldown table and the chorus latch.
#[derive(Debug, Clone, Default)]
pub struct Arbiter {
    config:        ArbiterConfig,
    cooldowns:     CooldownState,
    /// True from the frame the Chorus fired until either hand drops.
    chorus_active: bool,
}

impl Arbiter {
    pub fn new(config: ArbiterConfig) -> Self {
        Arbiter { config, ..Default::default() }
    }

    pub fn config(&self)        -> &ArbiterConfig  { &self.config }
    pub fn cooldowns(&self)     -> &CooldownState  { &self.cooldowns }
    pub fn chorus_active(&self) -> bool            { self.chorus_active }

    /// Decide which sounds fire for one frame.
    pub fn process(&mut self, hands: &[ClassifiedHand], now: Instant) -> FrameOutcome {
        let mut out = FrameOutcome::default();

        // ── per-hand gestures ─────────────────────────────────────────────
        for hand in hands {
            let (Some(side), Some(sound)) = (hand.handedness, sound_for(hand.gesture)) else {
                continue;
            };
            self.attempt(sound, TriggerSource::Hand(side), now, &mut out);
        }

        // ── both hands raised → chorus ────────────────────────────────────
        out.raised = RaisedHands::compute(hands, self.config.raise_threshold);
        if out.raised.both() {
            if !self.chorus_active
                && self.attempt(SoundId::Chorus, TriggerSource::BothHandsRaised, now, &mut out)
            {
                self.chorus_active = true;
            }
        } else {
            self.chorus_active = false;
        }

        out
    }

    /// Fire `sound` if its cooldown allows; returns whether it fired.
    fn attempt(
        &mut self,
        sound:  SoundId,
        source: TriggerSource,
        now:    Instant,
        out:    &mut FrameOutcome,
    ) -> bool {
        match self.cooldowns.check(sound, now, self.config.cooldown) {
            Ok(()) => {
                self.cooldowns.mark(sound, now);
                out.triggers.push(Trigger { sound, source });
                true
            }
            Err(remaining) => {
                out.suppressed.push(Suppressed { sound, source, remaining });
                false
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn hand(side: Handedness, wrist_y: f32, gesture: GestureLabel) -> ClassifiedHand {
        ClassifiedHand { handedness: Some(side), wrist_y: Some(wrist_y), gesture }
    }

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    use GestureLabel as G;
    use Handedness::{Left, Right};

    #[test]
    fn gesture_to_sound_table() {
        assert_eq!(sound_for(G::OpenPalm),   Some(SoundId::Drum));
        assert_eq!(sound_for(G::ClosedFist), Some(SoundId::Bass));
        assert_eq!(sound_for(G::LeftSwipe),  Some(SoundId::Guitar));
        assert_eq!(sound_for(G::RightSwipe), Some(SoundId::Cymbal));
        assert_eq!(sound_for(G::None),       None);
    }

    #[test]
    fn first_gesture_fires_immediately() {
        let mut arb = Arbiter::default();
        let out = arb.process(&[hand(Right, 0.8, G::OpenPalm)], Instant::now());
        assert_eq!(out.triggers, vec![Trigger { sound: SoundId::Drum, source: TriggerSource::Hand(Right) }]);
        assert_eq!(out.triggers[0].status(), "Playing Drum");
    }

    #[test]
    fn repeat_within_cooldown_is_suppressed() {
        let t0 = Instant::now();
        let mut arb = Arbiter::default();
        let frame = [hand(Right, 0.8, G::ClosedFist)];

        assert!(arb.process(&frame, t0).fired(SoundId::Bass));
        let held = arb.process(&frame, t0 + ms(500));
        assert!(held.triggers.is_empty());
        assert_eq!(held.suppressed.len(), 1);
        assert_eq!(held.suppressed[0].sound, SoundId::Bass);
        assert_eq!(held.suppressed[0].remaining, ms(500));
        // Suppression leaves the timestamp alone.
        assert_eq!(arb.cooldowns().last_trigger(SoundId::Bass), Some(t0));
    }

    #[test]
    fn repeat_after_cooldown_fires() {
        let t0 = Instant::now();
        let mut arb = Arbiter::default();
        let frame = [hand(Left, 0.8, G::LeftSwipe)];

        assert!(arb.process(&frame, t0).fired(SoundId::Guitar));
        assert!(arb.process(&frame, t0 + ms(1_001)).fired(SoundId::Guitar));
        assert!(!arb.process(&frame, t0 + ms(1_500)).fired(SoundId::Guitar));
        assert!(arb.process(&frame, t0 + ms(2_200)).fired(SoundId::Guitar));
    }

    #[test]
    fn cooldown_boundary_is_exclusive() {
        let t0 = Instant::now();
        let mut arb = Arbiter::default();
        let frame = [hand(Right, 0.8, G::RightSwipe)];
        arb.process(&frame, t0);
        assert!(!arb.process(&frame, t0 + GESTURE_COOLDOWN).fired(SoundId::Cymbal));
    }

    #[test]
    fn cooldowns_are_per_sound() {
        let t0 = Instant::now();
        let mut arb = Arbiter::default();
        arb.process(&[hand(Right, 0.8, G::OpenPalm)], t0);
        let out = arb.process(&[hand(Right, 0.8, G::ClosedFist)], t0 + ms(100));
        assert!(out.fired(SoundId::Bass));
    }

    #[test]
    fn same_sound_from_two_hands_fires_once_per_frame() {
        let mut arb = Arbiter::default();
        let out = arb.process(
            &[hand(Left, 0.8, G::OpenPalm), hand(Right, 0.8, G::OpenPalm)],
            Instant::now(),
        );
        assert_eq!(out.triggers.len(), 1);
        assert_eq!(out.triggers[0].source, TriggerSource::Hand(Left));
        assert_eq!(out.suppressed.len(), 1);
    }

    #[test]
    fn unlabelled_hand_proposes_nothing() {
        let mut arb = Arbiter::default();
        let out = arb.process(
            &[ClassifiedHand { handedness: None, wrist_y: Some(0.2), gesture: G::OpenPalm }],
            Instant::now(),
        );
        assert!(out.triggers.is_empty());
        assert!(out.suppressed.is_empty());
    }

    #[test]
    fn raised_requires_both_sides() {
        let only_left = [hand(Left, 0.3, G::None), hand(Left, 0.2, G::None)];
        assert_eq!(RaisedHands::compute(&only_left, 0.5), RaisedHands { left: true, right: false });

        let low_right = [hand(Left, 0.3, G::None), hand(Right, 0.5, G::None)];
        assert!(!RaisedHands::compute(&low_right, 0.5).both());

        let untracked = [
            hand(Left, 0.3, G::None),
            ClassifiedHand { handedness: Some(Right), wrist_y: None, gesture: G::None },
        ];
        assert!(!RaisedHands::compute(&untracked, 0.5).both());
        assert!(!RaisedHands::compute(&[], 0.5).both());
    }

    #[test]
    fn chorus_fires_once_on_rising_edge() {
        let t0 = Instant::now();
        let mut arb = Arbiter::default();
        let up = [hand(Left, 0.3, G::None), hand(Right, 0.4, G::None)];

        let first = arb.process(&up, t0);
        assert_eq!(first.triggers, vec![Trigger { sound: SoundId::Chorus, source: TriggerSource::BothHandsRaised }]);
        assert!(arb.chorus_active());

        // Held up, even long after the cooldown: no retrigger.
        let held = arb.process(&up, t0 + ms(33));
        assert!(held.triggers.is_empty());
        assert!(held.suppressed.is_empty());
        assert!(arb.process(&up, t0 + ms(5_000)).triggers.is_empty());
    }

    #[test]
    fn chorus_rearms_after_a_hand_drops() {
        let t0 = Instant::now();
        let mut arb = Arbiter::default();
        let up   = [hand(Left, 0.3, G::None), hand(Right, 0.4, G::None)];
        let down = [hand(Left, 0.3, G::None), hand(Right, 0.8, G::None)];

        assert!(arb.process(&up, t0).fired(SoundId::Chorus));
        arb.process(&down, t0 + ms(1_500));
        assert!(!arb.chorus_active());
        assert!(arb.process(&up, t0 + ms(1_600)).fired(SoundId::Chorus));
    }

    #[test]
    fn chorus_rearm_is_not_cooldown_gated_but_trigger_is() {
        let t0 = Instant::now();
        let mut arb = Arbiter::default();
        let up = [hand(Left, 0.3, G::None), hand(Right, 0.4, G::None)];

        assert!(arb.process(&up, t0).fired(SoundId::Chorus));
        // Hands vanish inside the cooldown: the latch resets anyway.
        arb.process(&[], t0 + ms(200));
        assert!(!arb.chorus_active());

        // Raised again inside the cooldown: suppressed, latch stays open.
        let early = arb.process(&up, t0 + ms(400));
        assert!(!early.fired(SoundId::Chorus));
        assert_eq!(early.suppressed[0].sound, SoundId::Chorus);
        assert!(!arb.chorus_active());

        // Still raised once the cooldown expires: fires without another drop.
        assert!(arb.process(&up, t0 + ms(1_100)).fired(SoundId::Chorus));
        assert!(arb.chorus_active());
    }

    #[test]
    fn hand_and_chorus_channels_coexist() {
        let mut arb = Arbiter::default();
        let out = arb.process(
            &[hand(Left, 0.3, G::OpenPalm), hand(Right, 0.4, G::ClosedFist)],
            Instant::now(),
        );
        let sounds: Vec<SoundId> = out.triggers.iter().map(|t| t.sound).collect();
        assert_eq!(sounds, vec![SoundId::Drum, SoundId::Bass, SoundId::Chorus]);
    }

    #[test]
    fn custom_config_applies() {
        let t0 = Instant::now();
        let mut arb = Arbiter::new(ArbiterConfig { cooldown: ms(100), raise_threshold: 0.2 });
        let frame = [hand(Right, 0.8, G::OpenPalm)];
        arb.process(&frame, t0);
        assert!(arb.process(&frame, t0 + ms(150)).fired(SoundId::Drum));

        let up = [hand(Left, 0.3, G::None), hand(Right, 0.1, G::None)];
        assert!(!arb.process(&up, t0 + ms(200)).raised.both());
    }

    #[test]
    fn from_observation_classifies() {
        use crate::landmark::{Finger, Joint, Point};
        let mut obs = HandObservation::new(Some(Left))
            .with_joint(Joint::Wrist,    Point::new(0.4, 0.3))
            .with_joint(Joint::ThumbTip, Point::new(0.45, 0.25));
        for f in Finger::ALL {
            obs.set(f.knuckle(), Point::new(0.4, 0.2));
            obs.set(f.tip(),     Point::new(0.4, 0.1));
        }
        let c = ClassifiedHand::from_observation(&obs);
        assert_eq!(c.gesture, G::OpenPalm);
        assert_eq!(c.wrist_y, Some(0.3));
        assert_eq!(c.handedness, Some(Left));
    }
}
