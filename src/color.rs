//! RGB color storage and the numeric transition primitives `Cue` builds on.

use fixed::types::U0F8;
pub use palette::{Hsl, Mix, Srgb};
use serde::{Deserialize, Serialize};

/// Describes an RGB color. This is the format used for storing colors,
/// both in a `Cue` record and on the wire.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Color {
    red: u8,
    green: u8,
    blue: u8,
}

impl Color {
    pub fn new(red: u8, green: u8, blue: u8) -> Color {
        Color { red, green, blue }
    }

    pub fn red(&self) -> u8 {
        self.red
    }

    pub fn green(&self) -> u8 {
        self.green
    }

    pub fn blue(&self) -> u8 {
        self.blue
    }

    pub fn black() -> Color {
        [0, 0, 0].into()
    }

    pub fn white() -> Color {
        [255, 255, 255].into()
    }

    pub fn from_hsl(h: u16, s: u8, l: u8) -> Color {
        let float_hsl = Hsl::new(h as f32, s as f32, l as f32);
        float_hsl.into()
    }

    /// Linearly interpolate this color towards `other` independently on
    /// each of R, G and B, per spec.md §4.1's `LinearRGB` ramp.
    pub fn linear_mix_rgb(&self, other: &Color, t_ms: u32, ramp_parameter: u32, duration: u32) -> Color {
        Color {
            red: asymmetric_linear(self.red, other.red, t_ms, ramp_parameter, duration),
            green: asymmetric_linear(self.green, other.green, t_ms, ramp_parameter, duration),
            blue: asymmetric_linear(self.blue, other.blue, t_ms, ramp_parameter, duration),
        }
    }

    /// Mix this color towards `other` in HSL space. `wrap_hue` picks the
    /// shorter way around the color wheel instead of always going through
    /// increasing hue.
    ///
    /// spec.md leaves `LinearHSL` unimplemented ("return opaque white") but
    /// explicitly allows replacing that placeholder with a real lerp; this
    /// is that real lerp, following the same `palette::Hsl::mix` approach
    /// the teacher library already used for its own HSL ramp.
    pub fn linear_mix_hsl(self, other: Color, factor: U0F8, wrap_hue: bool) -> Color {
        let self_hsl: Hsl = self.into();
        let mut other_hsl: Hsl = other.into();

        if wrap_hue {
            let delta = other_hsl.hue.to_positive_degrees() - self_hsl.hue.to_positive_degrees();
            if delta > 180.0 {
                other_hsl.hue = (other_hsl.hue.to_positive_degrees() - 360.0).into();
            } else if delta < -180.0 {
                other_hsl.hue = (other_hsl.hue.to_positive_degrees() + 360.0).into();
            }
        }

        let new_hsl = self_hsl.mix(&other_hsl, factor.to_num());
        new_hsl.into()
    }
}

/// Compute one transition leg for a channel that rises from `start` to
/// `end` (or falls, if `start > end`) until `ramp_parameter`, then returns
/// to `start` by `duration`.
///
/// This is spec.md §4.1's `asymmetric_linear`: the up-leg and down-leg are
/// computed with separate integer divisions so no intermediate value goes
/// negative, matching the structure of the original firmware's
/// `Cue::linear_transition` (see `original_source/cue.h`).
///
/// Callers must uphold `ramp_parameter <= duration` and `t_ms < duration`;
/// these are exactly the invariants spec.md §3 places on `Cue` records, so
/// a caller walking valid stored cues never trips a division by zero:
/// `ramp_parameter == 0` always takes the falling branch, and
/// `ramp_parameter == duration` always takes the rising one.
pub fn asymmetric_linear(start: u8, end: u8, t_ms: u32, ramp_parameter: u32, duration: u32) -> u8 {
    let start = start as u32;
    let end = end as u32;
    let delta = if start > end { start - end } else { end - start };

    let offset = if t_ms < ramp_parameter {
        (delta * t_ms) / ramp_parameter
    } else {
        delta - (delta * (t_ms - ramp_parameter)) / (duration - ramp_parameter)
    };

    if start > end {
        (start - offset) as u8
    } else {
        (start + offset) as u8
    }
}

/// Interpolate between two numbers using a fixed-point factor between 0 and 1.
/// # Examples
/// ```
/// use iris_core::color::interpolate;
/// use fixed::types::U0F8;
/// use fixed_macro::types::U0F8;
///
/// assert_eq!(interpolate(0, 200, U0F8!(0.5)), 100);
/// assert_eq!(interpolate(200, 100, U0F8!(0.2)), 180);
/// assert_eq!(interpolate(0, 99, U0F8!(0.333)), 33);
/// assert_eq!(interpolate(20, 120, U0F8!(0.5)), 70);
///
/// // U0F8 can hold any x where 0 ≤ x < 1, so use MAX instead of 1
/// assert_eq!(interpolate(33, 250, U0F8::MAX), 250);
/// assert_eq!(interpolate(199, 5, U0F8::MAX), 5);
/// ```
pub fn interpolate(start: u8, end: u8, factor: U0F8) -> u8 {
    let positive_delta = start < end;
    let delta = if positive_delta { end - start } else { start - end };

    // As both factors are u8, the output of the multiplication will fit into u16
    // After dividing by 256, it fits exactly into a u8 again.
    let scaled_summand = ((delta as u16 * factor.to_bits() as u16) / u8::MAX as u16) as u8;

    if positive_delta {
        start + scaled_summand
    } else {
        start - scaled_summand
    }
}

impl From<Hsl> for Color {
    fn from(hsl: Hsl) -> Color {
        let float_rgb: Srgb = hsl.into();
        let u8_rgb: Srgb<u8> = float_rgb.into_format();
        u8_rgb.into()
    }
}

impl From<Color> for Hsl {
    fn from(color: Color) -> Hsl {
        let u8_rgb: Srgb<u8> = color.into();
        let float_rgb: Srgb = u8_rgb.into_format();
        float_rgb.into()
    }
}

/// Allow conversion to palette's integer RGB type
impl From<Color> for Srgb<u8> {
    fn from(color: Color) -> Srgb<u8> {
        Srgb::<u8>::from_components((color.red, color.green, color.blue))
    }
}

/// Allow conversion from palette's integer RGB type
impl From<Srgb<u8>> for Color {
    fn from(u8_rgb: Srgb<u8>) -> Color {
        let (red, green, blue) = u8_rgb.into_components();
        Color { red, green, blue }
    }
}

/// Allow conversion to iterable array. Useful for sending colors on the wire.
impl From<Color> for [u8; 3] {
    fn from(color: Color) -> [u8; 3] {
        [color.red, color.green, color.blue]
    }
}

/// Allow conversion from array
impl From<[u8; 3]> for Color {
    fn from(arr: [u8; 3]) -> Color {
        Color {
            red: arr[0],
            green: arr[1],
            blue: arr[2],
        }
    }
}
