//! Colours for the meter screen.

use ratatui::style::Color;

use crate::config::ColorMode;

pub const BACKGROUND: Color = Color::Rgb(0, 0, 0);
pub const FOREGROUND: Color = Color::Rgb(206, 224, 220);
pub const DIM: Color = Color::Rgb(90, 96, 104);
pub const ACCENT: Color = Color::Rgb(185, 207, 212);
pub const ALERT: Color = Color::Rgb(239, 68, 68);
pub const IDLE_LINE: Color = Color::Rgb(64, 64, 64);

/// Gradient stops: purple, pink, blue, green, yellow.
const GRADIENT: [(f32, (u8, u8, u8)); 5] = [
    (0.0, (139, 92, 246)),
    (0.25, (236, 72, 153)),
    (0.5, (59, 130, 246)),
    (0.75, (34, 197, 94)),
    (1.0, (251, 191, 36)),
];

/// Waveform colour at horizontal position `t` in [0, 1].
pub fn waveform_color(mode: ColorMode, t: f32) -> Color {
    match mode {
        ColorMode::Default => ACCENT,
        ColorMode::Gradient => gradient_at(t),
    }
}

/// Colour of spectrum bar `index` out of `count`.
pub fn bar_color(mode: ColorMode, index: usize, count: usize) -> Color {
    match mode {
        ColorMode::Default => FOREGROUND,
        ColorMode::Gradient => {
            let hue = index as f32 / count.max(1) as f32 * 360.0;
            hsl(hue, 0.7, 0.6)
        }
    }
}

fn gradient_at(t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    for pair in GRADIENT.windows(2) {
        let (start, from) = pair[0];
        let (end, to) = pair[1];
        if t <= end {
            let local = (t - start) / (end - start);
            return Color::Rgb(lerp(from.0, to.0, local), lerp(from.1, to.1, local), lerp(from.2, to.2, local));
        }
    }
    let (_, last) = GRADIENT[GRADIENT.len() - 1];
    Color::Rgb(last.0, last.1, last.2)
}

fn lerp(a: u8, b: u8, t: f32) -> u8 {
    (f32::from(a) + (f32::from(b) - f32::from(a)) * t).round() as u8
}

/// HSL (hue in degrees) to an RGB colour.
fn hsl(hue: f32, saturation: f32, lightness: f32) -> Color {
    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let h = (hue.rem_euclid(360.0)) / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = lightness - c / 2.0;
    let to_byte = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Color::Rgb(to_byte(r), to_byte(g), to_byte(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_hits_its_stops() {
        assert_eq!(gradient_at(0.0), Color::Rgb(139, 92, 246));
        assert_eq!(gradient_at(0.5), Color::Rgb(59, 130, 246));
        assert_eq!(gradient_at(1.0), Color::Rgb(251, 191, 36));
        assert_eq!(gradient_at(7.0), Color::Rgb(251, 191, 36));
    }

    #[test]
    fn default_mode_is_flat() {
        assert_eq!(waveform_color(ColorMode::Default, 0.1), waveform_color(ColorMode::Default, 0.9));
        assert_eq!(bar_color(ColorMode::Default, 0, 10), bar_color(ColorMode::Default, 9, 10));
    }

    #[test]
    fn hsl_primaries() {
        assert_eq!(hsl(0.0, 1.0, 0.5), Color::Rgb(255, 0, 0));
        assert_eq!(hsl(120.0, 1.0, 0.5), Color::Rgb(0, 255, 0));
        assert_eq!(hsl(240.0, 1.0, 0.5), Color::Rgb(0, 0, 255));
    }
}
