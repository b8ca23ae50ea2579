//! # air_band
//!
//! Hand-gesture air band: per-frame hand landmarks are classified into
//! gestures, debounced by a per-sound cooldown, and played from a
//! procedurally synthesized sound bank.
//!
//! ## Gesture → Sound mapping
//!
//! | Gesture | Hand | Sound | Status line |
//! |---|---|---|---|
//! | Open palm (all fingertips above knuckles) | Either | Drum | `Playing Drum` |
//! | Closed fist (all fingertips below knuckles) | Either | Bass | `Playing Bass` |
//! | Wrist at the left edge, thumb trailing left | Left | Guitar | `Strumming Guitar` |
//! | Wrist at the right edge, thumb trailing right | Right | Cymbal | `Playing Cymbal` |
//! | Both wrists in the upper half of the frame | Both | Chorus | `Playing Chorus` |
//!
//! Each sound fires at most once per second.  The Chorus fires once per
//! raise: hands must drop before it can fire again.
//!
//! ## Landmark sources
//!
//! * `sim` (default): **Simulation mode**; keyboard keys pose two synthetic hands.
//! * `json`: one JSON frame per line from an external camera + hand-landmark
//!   model, on stdin or from a recorded file.
//! * `leap`: polls a real LeapMotion controller via LeapC (feature `leap`).
//!
//! ### Simulation keyboard shortcuts
//!
//! | Left hand | Right hand | Pose |
//! |---|---|---|
//! | `A` | `J` | Open palm |
//! | `S` | `K` | Fist |
//! | `D` | `L` | Swipe (outer edge) |
//! | `W` | `I` | Raised |
//! | `E` | `O` | Neutral |
//! | `X` | `M` | Hidden |
//!
//! `Q` or `Escape` quits.

pub mod landmark;
pub mod classifier;
pub mod arbiter;
pub mod source;
pub mod player;
pub mod visualizer;
pub mod app;
