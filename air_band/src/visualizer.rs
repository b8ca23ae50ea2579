//! Software-rendered visualizer using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  status line                  ┆                ┆           │
//! │  chorus status line           ┆                ┆           │
//! │                               ┆   hand         ┆           │
//! │- - - - - - - - - - - - - - - -┆- skeletons - - ┆- - - - - -│  raise line
//! │                               ┆                ┆           │
//! │  gesture legend (3 lines)     ┆                ┆           │
//! ├────────────────────────────────────────────────────────────┤
//! │  simulation key legend                                     │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The two vertical guides mark the swipe zones, the dashed line the raise
//! threshold.

use std::sync::mpsc::Sender;

use minifb::{Key, KeyRepeat, Window, WindowOptions};

use crate::arbiter::RaisedHands;
use crate::classifier::{GestureLabel, LEFT_SWIPE_MAX_X, RIGHT_SWIPE_MIN_X};
use crate::landmark::{Finger, HandObservation, Handedness, Joint, LandmarkFrame, Point};
use crate::source::{SimInput, SimKey, SimPose};

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:     usize = 960;
pub const WIN_H:     usize = 600;
const VIEW_H:        usize = 540;
const TEXT_SCALE:    usize = 3;
const BG_COLOR:      u32   = 0xFF1A1A2E;
const FOOTER_BG:     u32   = 0xFF0F3460;
const GUIDE_COLOR:   u32   = 0xFF3A3A5E;
const STATUS_COLOR:  u32   = 0xFF55FF55;
const CHORUS_COLOR:  u32   = 0xFFFF5555;
const LEGEND_COLOR:  u32   = 0xFFEEEEEE;
const LEFT_COLOR:    u32   = 0xFF55CCFF;
const RIGHT_COLOR:   u32   = 0xFFFFAA55;
const RAISED_COLOR:  u32   = 0xFFFFD700;

pub const LEGEND: [&str; 3] = [
    "Open Palm: Drum | Closed Fist: Bass",
    "Left Swipe: Guitar | Right Swipe: Cymbal",
    "Both Hands Raised: Chorus",
];

const KEY_LEGEND: &str =
    "Left hand A=palm S=fist D=swipe W=raise E=rest X=hide   Right hand J K L I O M   Q=quit";

/// Keyboard → simulated hand pose.
const KEYMAP: [(Key, Handedness, SimPose); 12] = [
    (Key::A, Handedness::Left,  SimPose::OpenPalm),
    (Key::S, Handedness::Left,  SimPose::Fist),
    (Key::D, Handedness::Left,  SimPose::Swipe),
    (Key::W, Handedness::Left,  SimPose::Raised),
    (Key::E, Handedness::Left,  SimPose::Neutral),
    (Key::X, Handedness::Left,  SimPose::Hidden),
    (Key::J, Handedness::Right, SimPose::OpenPalm),
    (Key::K, Handedness::Right, SimPose::Fist),
    (Key::L, Handedness::Right, SimPose::Swipe),
    (Key::I, Handedness::Right, SimPose::Raised),
    (Key::O, Handedness::Right, SimPose::Neutral),
    (Key::M, Handedness::Right, SimPose::Hidden),
];

/// The simulator action bound to `key`, if any.
pub fn key_action(key: Key) -> Option<SimKey> {
    if matches!(key, Key::Q | Key::Escape) {
        return Some(SimKey::Quit);
    }
    KEYMAP.iter()
        .find(|(k, _, _)| *k == key)
        .map(|&(_, side, pose)| SimKey::Pose(side, pose))
}

/// Normalized frame position → pixel in the view area, clamped to it.
pub fn to_px(p: Point) -> (usize, usize) {
    let x = (p.x.clamp(0.0, 1.0) * (WIN_W - 1) as f32).round() as usize;
    let y = (p.y.clamp(0.0, 1.0) * (VIEW_H - 1) as f32).round() as usize;
    (x, y)
}

/// Bones drawn for one hand.
/// Row of the dashed raise guide; a wrist above it (smaller y) counts as raised.
pub fn raise_guide_y(threshold: f32) -> usize {
    to_px(Point::new(0.0, threshold)).1
}

fn bones() -> impl Iterator<Item = (Joint, Joint)> {
    let thumb = std::iter::once((Joint::Wrist, Joint::ThumbTip));
    let fingers = Finger::ALL.into_iter().flat_map(|f| {
        [(Joint::Wrist, f.knuckle()), (f.knuckle(), f.tip())]
    });
    thumb.chain(fingers)
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window: Window,
    buf:    Vec<u32>,
    /// Present only when the simulator drives the landmarks.
    sim_tx: Option<Sender<SimInput>>,
}

impl Visualizer {
    pub fn new(sim_tx: Option<Sender<SimInput>>) -> Result<Self, minifb::Error> {
        let mut window = Window::new(
            "AirBand - Q to quit",
            WIN_W, WIN_H,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        )?;

        window.limit_update_rate(Some(std::time::Duration::from_millis(16))); // ~60fps

        Ok(Visualizer {
            window,
            buf: vec![BG_COLOR; WIN_W * WIN_H],
            sim_tx,
        })
    }

    /// Returns false when the window should close.
    pub fn is_open(&self) -> bool { self.window.is_open() }

    /// Poll the keyboard.  Pose keys go to the simulator; returns false once
    /// the user asked to quit.
    pub fn poll_input(&mut self) -> bool {
        if !self.window.is_open() { return false; }

        let pressed = self.window.get_keys_pressed(KeyRepeat::No);
        for key in pressed {
            match key_action(key) {
                Some(SimKey::Quit) => {
                    if let Some(tx) = &self.sim_tx {
                        let _ = tx.send(SimInput::KeyDown(SimKey::Quit));
                    }
                    return false;
                }
                Some(action) => {
                    if let Some(tx) = &self.sim_tx {
                        let _ = tx.send(SimInput::KeyDown(action));
                    }
                }
                None => {}
            }
        }
        true
    }

    /// Render one frame.
    pub fn render(
        &mut self,
        frame:         &LandmarkFrame,
        gestures:      &[GestureLabel],
        raised:        RaisedHands,
        raise_line:    f32,
        status:        &str,
        chorus_status: &str,
    ) {
        self.buf.fill(BG_COLOR);

        // ── Guides ────────────────────────────────────────────────────────
        for x in [LEFT_SWIPE_MAX_X, RIGHT_SWIPE_MIN_X] {
            let (px, _) = to_px(Point::new(x, 0.0));
            self.fill_rect(px, 0, 1, VIEW_H, GUIDE_COLOR);
        }
        let raise_y = raise_guide_y(raise_line);
        for x in (0..WIN_W).step_by(12) {
            self.fill_rect(x, raise_y, 6, 1, GUIDE_COLOR);
        }

        // ── Hands ─────────────────────────────────────────────────────────
        for (i, hand) in frame.hands.iter().enumerate() {
            let gesture = gestures.get(i).copied().unwrap_or(GestureLabel::None);
            self.draw_hand(hand, gesture, raised);
        }

        // ── Status lines ──────────────────────────────────────────────────
        self.draw_label(status,        10, 30, TEXT_SCALE, STATUS_COLOR);
        self.draw_label(chorus_status, 10, 80, TEXT_SCALE, CHORUS_COLOR);

        // ── Gesture legend ────────────────────────────────────────────────
        for (i, line) in LEGEND.iter().enumerate() {
            let y = VIEW_H - 100 + i * 30;
            self.draw_label(line, 10, y, TEXT_SCALE, LEGEND_COLOR);
        }

        // ── Key legend ────────────────────────────────────────────────────
        self.fill_rect(0, VIEW_H, WIN_W, WIN_H - VIEW_H, FOOTER_BG);
        if self.sim_tx.is_some() {
            self.draw_label(KEY_LEGEND, 10, VIEW_H + 20, 2, 0xFF888888);
        } else {
            self.draw_label("Q=quit", 10, VIEW_H + 20, 2, 0xFF888888);
        }

        if let Err(e) = self.window.update_with_buffer(&self.buf, WIN_W, WIN_H) {
            log::warn!("[vis] update failed: {}", e);
        }
    }

    // ── Hand skeleton ─────────────────────────────────────────────────────

    fn draw_hand(&mut self, hand: &HandObservation, gesture: GestureLabel, raised: RaisedHands) {
        let (color, is_raised) = match hand.handedness {
            Some(Handedness::Left)  => (LEFT_COLOR,  raised.left),
            Some(Handedness::Right) => (RIGHT_COLOR, raised.right),
            None                    => (GUIDE_COLOR, false),
        };

        for (a, b) in bones() {
            if let (Some(pa), Some(pb)) = (hand.joint(a), hand.joint(b)) {
                let (x0, y0) = to_px(pa);
                let (x1, y1) = to_px(pb);
                self.draw_line(x0, y0, x1, y1, color);
            }
        }
        for (_, p) in hand.joints() {
            let (x, y) = to_px(p);
            self.fill_rect(x.saturating_sub(3), y.saturating_sub(3), 7, 7, 0xFFFFFFFF);
        }

        // Label under the wrist: handedness and gesture.
        if let Some(w) = hand.wrist() {
            let (x, y) = to_px(w);
            let side = hand.handedness.map_or("?", Handedness::as_str);
            let label = format!("{} {}", side, gesture);
            let label_color = if is_raised { RAISED_COLOR } else { color };
            self.draw_label(&label, x.saturating_sub(30), (y + 14).min(VIEW_H - 12), 2, label_color);
        }
    }

    // ── Primitive drawing helpers ─────────────────────────────────────────

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y+h).min(WIN_H) {
            for col in x..(x+w).min(WIN_W) {
                self.buf[row * WIN_W + col] = color;
            }
        }
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        if x < WIN_W && y < WIN_H {
            self.buf[y * WIN_W + x] = color;
        }
    }

    /// Bresenham, two pixels thick.
    fn draw_line(&mut self, x0: usize, y0: usize, x1: usize, y1: usize, color: u32) {
        let (mut x, mut y) = (x0 as isize, y0 as isize);
        let (x1, y1) = (x1 as isize, y1 as isize);
        let dx =  (x1 - x).abs();
        let dy = -(y1 - y).abs();
        let sx = if x < x1 { 1 } else { -1 };
        let sy = if y < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.set_pixel(x as usize,     y as usize, color);
            self.set_pixel(x as usize + 1, y as usize, color);
            if x == x1 && y == y1 { break; }
            let e2 = 2 * err;
            if e2 >= dy { err += dy; x += sx; }
            if e2 <= dx { err += dx; y += sy; }
        }
    }

    /// 3×5 bitmap font, each bit drawn as a `scale`×`scale` block.
    fn draw_label(&mut self, text: &str, x: usize, y: usize, scale: usize, color: u32) {
        let mut cx = x;
        for ch in text.chars() {
            let glyph = char_glyph(ch);
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..3usize {
                    if bits & (1 << (2 - col)) != 0 {
                        self.fill_rect(cx + col * scale, y + row * scale, scale, scale, color);
                    }
                }
            }
            cx += 4 * scale; // 3 wide + 1 gap
            if cx + 4 * scale > WIN_W { break; }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Minimal 3×5 bitmap font
// ────────────────────────────────────────────────────────────────────────────

fn char_glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'a' | 'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'b' | 'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'c' | 'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'd' | 'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'e' | 'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'f' | 'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'g' | 'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'h' | 'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'i' | 'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'j' | 'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'k' | 'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'l' | 'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'm' | 'M' => [0b101, 0b111, 0b101, 0b101, 0b101],
        'n' | 'N' => [0b111, 0b101, 0b101, 0b101, 0b101],
        'o' | 'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'p' | 'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'q' | 'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'r' | 'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        's' | 'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        't' | 'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'u' | 'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'v' | 'V' => [0b101, 0b101, 0b101, 0b010, 0b010],
        'w' | 'W' => [0b101, 0b101, 0b101, 0b111, 0b101],
        'x' | 'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'y' | 'Y' => [0b101, 0b101, 0b111, 0b010, 0b010],
        'z' | 'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '|' => [0b010, 0b010, 0b010, 0b010, 0b010],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        '?' => [0b111, 0b001, 0b011, 0b000, 0b010],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        _   => [0b000, 0b000, 0b010, 0b000, 0b000], // fallback dot
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const FALLBACK: [u8; 5] = [0b000, 0b000, 0b010, 0b000, 0b000];

    #[test]
    fn overlay_text_has_glyphs() {
        let texts = LEGEND.iter().copied()
            .chain([KEY_LEGEND, "Strumming Guitar", "Playing Chorus", "Left Closed Fist"]);
        for text in texts {
            for ch in text.chars() {
                assert!(ch == '.' || char_glyph(ch) != FALLBACK, "no glyph for {:?}", ch);
            }
        }
    }

    #[test]
    fn quit_keys() {
        assert_eq!(key_action(Key::Q), Some(SimKey::Quit));
        assert_eq!(key_action(Key::Escape), Some(SimKey::Quit));
        assert_eq!(key_action(Key::Z), None);
    }

    #[test]
    fn pose_keys_cover_every_pose_for_both_hands() {
        let poses = [
            SimPose::Hidden, SimPose::Neutral, SimPose::OpenPalm,
            SimPose::Fist, SimPose::Swipe, SimPose::Raised,
        ];
        for side in [Handedness::Left, Handedness::Right] {
            for pose in poses {
                let bound = KEYMAP.iter().any(|&(k, s, p)| {
                    s == side && p == pose && key_action(k) == Some(SimKey::Pose(side, pose))
                });
                assert!(bound, "{:?} {:?}", side, pose);
            }
        }
    }

    #[test]
    fn to_px_maps_corners_and_clamps() {
        assert_eq!(to_px(Point::new(0.0, 0.0)), (0, 0));
        assert_eq!(to_px(Point::new(1.0, 1.0)), (WIN_W - 1, VIEW_H - 1));
        assert_eq!(to_px(Point::new(-0.5, 2.0)), (0, VIEW_H - 1));
    }

    #[test]
    fn raise_guide_follows_threshold() {
        assert_eq!(raise_guide_y(0.5), to_px(Point::new(0.0, 0.5)).1);
        assert_eq!(raise_guide_y(0.25), to_px(Point::new(0.0, 0.25)).1);
        assert!(raise_guide_y(0.25) < raise_guide_y(0.5));
    }

    #[test]
    fn skeleton_has_nine_bones() {
        assert_eq!(bones().count(), 9);
        assert!(bones().all(|(a, b)| a != b));
    }
}
