//! Tray icon variants derived from the unread count.
//!
//! Icons are drawn procedurally into RGBA buffers: an envelope outline, plus a
//! red badge carrying the digit (1-9) or a `+` once the count overflows.

#[cfg(any(target_os = "macos", target_os = "windows"))]
use anyhow::{Result, anyhow};

const SIZE: i32 = 22;
const ENVELOPE_COLOR: (u8, u8, u8) = (220, 220, 220);
const BADGE_COLOR: (u8, u8, u8) = (234, 67, 53);
const GLYPH_COLOR: (u8, u8, u8) = (255, 255, 255);

/// Counts from this value up share the overflow icon.
pub const OVERFLOW_THRESHOLD: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrayIconKey {
    /// No unread mail.
    Base,
    /// One icon per count from 1 to 9.
    Unread(u8),
    /// Ten or more.
    Overflow,
}

pub fn tray_icon_key(count: u32) -> TrayIconKey {
    match count {
        0 => TrayIconKey::Base,
        n if n < OVERFLOW_THRESHOLD => TrayIconKey::Unread(n as u8),
        _ => TrayIconKey::Overflow,
    }
}

/// Dock badge / tray title text: empty at zero, the decimal count otherwise.
pub fn badge_text(count: u32) -> String {
    if count == 0 {
        String::new()
    } else {
        count.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconImage {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

pub fn render_tray_icon(key: TrayIconKey) -> IconImage {
    let mut pixels = vec![0u8; (SIZE * SIZE * 4) as usize];

    draw_envelope(&mut pixels);

    match key {
        TrayIconKey::Base => {}
        TrayIconKey::Unread(n) => {
            draw_badge(&mut pixels);
            draw_glyph(&mut pixels, glyph_for_digit(n));
        }
        TrayIconKey::Overflow => {
            draw_badge(&mut pixels);
            draw_glyph(&mut pixels, &PLUS);
        }
    }

    IconImage {
        rgba: pixels,
        width: SIZE as u32,
        height: SIZE as u32,
    }
}

#[cfg(any(target_os = "macos", target_os = "windows"))]
pub fn create_tray_icon(key: TrayIconKey) -> Result<tray_icon::Icon> {
    let image = render_tray_icon(key);
    tray_icon::Icon::from_rgba(image.rgba, image.width, image.height)
        .map_err(|err| anyhow!("failed to build tray icon: {err}"))
}

fn put(pixels: &mut [u8], x: i32, y: i32, (r, g, b): (u8, u8, u8), alpha: u8) {
    if x >= 0 && x < SIZE && y >= 0 && y < SIZE {
        let idx = ((y * SIZE + x) * 4) as usize;
        pixels[idx] = r;
        pixels[idx + 1] = g;
        pixels[idx + 2] = b;
        pixels[idx + 3] = alpha;
    }
}

fn draw_envelope(pixels: &mut [u8]) {
    let (left, top, right, bottom) = (2, 5, 19, 16);
    for x in left..=right {
        put(pixels, x, top, ENVELOPE_COLOR, 255);
        put(pixels, x, bottom, ENVELOPE_COLOR, 255);
    }
    for y in top..=bottom {
        put(pixels, left, y, ENVELOPE_COLOR, 255);
        put(pixels, right, y, ENVELOPE_COLOR, 255);
    }
    // Flap: two diagonals meeting under the top edge.
    for step in 0..=8 {
        put(pixels, left + step, top + step * 6 / 8, ENVELOPE_COLOR, 255);
        put(pixels, right - step, top + step * 6 / 8, ENVELOPE_COLOR, 255);
    }
}

const BADGE_CENTER: (i32, i32) = (16, 6);
const BADGE_RADIUS: i32 = 5;

fn draw_badge(pixels: &mut [u8]) {
    let (cx, cy) = BADGE_CENTER;
    for dy in -BADGE_RADIUS..=BADGE_RADIUS {
        for dx in -BADGE_RADIUS..=BADGE_RADIUS {
            if dx * dx + dy * dy <= BADGE_RADIUS * BADGE_RADIUS {
                put(pixels, cx + dx, cy + dy, BADGE_COLOR, 255);
            }
        }
    }
}

type Glyph = [&'static str; 5];

const DIGITS: [Glyph; 9] = [
    [".#.", "##.", ".#.", ".#.", "###"],
    ["##.", "..#", ".#.", "#..", "###"],
    ["##.", "..#", ".#.", "..#", "##."],
    ["#.#", "#.#", "###", "..#", "..#"],
    ["###", "#..", "##.", "..#", "##."],
    [".##", "#..", "###", "#.#", "###"],
    ["###", "..#", ".#.", ".#.", ".#."],
    ["###", "#.#", "###", "#.#", "###"],
    ["###", "#.#", "###", "..#", "##."],
];

const PLUS: Glyph = ["...", ".#.", "###", ".#.", "..."];

fn glyph_for_digit(n: u8) -> &'static Glyph {
    let index = usize::from(n.clamp(1, 9)) - 1;
    &DIGITS[index]
}

fn draw_glyph(pixels: &mut [u8], glyph: &Glyph) {
    let (cx, cy) = BADGE_CENTER;
    for (row, line) in glyph.iter().enumerate() {
        for (col, cell) in line.chars().enumerate() {
            if cell == '#' {
                put(pixels, cx - 1 + col as i32, cy - 2 + row as i32, GLYPH_COLOR, 255);
            }
        }
    }
}
