//! A `Cue` is a single parameterized color animation: a ramp between two
//! colors, repeated on a cycle, optionally phase-shifted per channel.

use crate::color::Color;
use core::convert::{TryFrom, TryInto};
use core::num::{NonZeroU32, NonZeroU8};
use fixed::types::U0F8;
use serde::{Deserialize, Serialize};

/// Number of RGB-LEDs on the ring. The total number of LEDs to drive is
/// three times this (one per color component).
pub const CHANNELS: u8 = 12;

/// The algorithm used for transitioning between two colors.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum RampType {
    /// Hard cut, no interpolation between colors.
    Jump,
    /// Interpolate R, G and B linearly. Will sometimes lead to ugly colors
    /// in between the two specified ones.
    LinearRGB,
    /// Interpolate H, S and L linearly.
    LinearHSL,
}

impl RampType {
    fn to_byte(self) -> u8 {
        match self {
            RampType::Jump => 0,
            RampType::LinearRGB => 1,
            RampType::LinearHSL => 2,
        }
    }

    fn from_byte(byte: u8) -> Option<RampType> {
        match byte {
            0 => Some(RampType::Jump),
            1 => Some(RampType::LinearRGB),
            2 => Some(RampType::LinearHSL),
            _ => None,
        }
    }
}

/// A simple animation that transitions between two colors cyclically: it
/// ramps from `start_color` to `end_color` and back, once per `duration`.
///
/// Field widths and reserved fields follow spec.md §3's fixed-size, ~14
/// byte on-disk record exactly, so that `Store::store_all`/`load_all`
/// round-trip byte-for-byte (spec.md §8's persistence invariant).
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct Cue {
    /// 12-bit mask of channels this cue is active on when played inside a
    /// `Schedule`. Ignored by `interpolate` itself -- `LedMatrix::draw_cue`
    /// is what consults it (spec.md §4.4).
    pub channels: u16,
    /// Play the ramp in reverse channel order.
    pub reverse: bool,
    /// Reserved: currently ignored by every implemented ramp.
    pub wrap_hue: bool,
    /// Repeat the pattern after reaching a certain LED. Example values:
    /// - *12*: one full rotation with no visible seams
    /// - *6*: two moving elements with no visible seams
    /// - *1*: no channel offset, all LEDs animate identically
    pub time_divisor: NonZeroU8,
    /// Reserved.
    pub delay: u16,
    /// Duration of one animation period, in milliseconds.
    pub duration: NonZeroU32,
    /// The algorithm to use for transitioning between the two colors.
    pub ramp_type: RampType,
    /// The breakpoint, in milliseconds within `duration`, where the ramp
    /// switches from rising (start -> end) to falling (end -> start).
    /// Must satisfy `0 <= ramp_parameter <= duration`.
    pub ramp_parameter: u32,
    /// The color to start from.
    pub start_color: Color,
    /// The color to transition to.
    pub end_color: Color,
    /// Reserved.
    pub offset_color: Color,
}

impl Default for Cue {
    /// Default Cue is black; change at least the colors to make it visible.
    fn default() -> Cue {
        Cue {
            channels: 0b1111_1111_1111,
            reverse: false,
            wrap_hue: false,
            time_divisor: NonZeroU8::new(12).unwrap(),
            delay: 0,
            duration: NonZeroU32::new(1000).unwrap(),
            ramp_type: RampType::Jump,
            ramp_parameter: 500,
            start_color: Color::black(),
            end_color: Color::black(),
            offset_color: Color::black(),
        }
    }
}

impl Cue {
    /// Create a pre-built Cue displaying a clockwise rotating rainbow.
    pub fn rainbow() -> Cue {
        Cue {
            duration: NonZeroU32::new(3000).unwrap(),
            ramp_type: RampType::LinearHSL,
            ramp_parameter: 3000,
            start_color: Color::from_hsl(0, 100, 50),
            end_color: Color::from_hsl(359, 100, 50),
            ..Default::default()
        }
    }

    /// Create a pre-built Cue displaying a clockwise rotating black/white split.
    pub fn black_white_jump() -> Cue {
        Cue {
            duration: NonZeroU32::new(3000).unwrap(),
            ramp_parameter: 1500,
            start_color: Color::white(),
            end_color: Color::black(),
            ..Default::default()
        }
    }

    /// Create a pre-built Cue displaying a white breathing effect.
    pub fn white_breathing() -> Cue {
        Cue {
            duration: NonZeroU32::new(3600).unwrap(),
            ramp_type: RampType::LinearRGB,
            ramp_parameter: 1440,
            time_divisor: NonZeroU8::new(1).unwrap(),
            start_color: Color::black(),
            end_color: Color::white(),
            ..Default::default()
        }
    }

    /// Calculate the Color of a single LED at a given point in time.
    ///
    /// Implements spec.md §4.1 exactly: per-channel phase shift, then
    /// dispatch on `ramp_type`.
    pub fn current_color(&self, t_ms: u32, channel: u8) -> Color {
        let t_prime = self.phase_shifted_time(t_ms, channel);

        match self.ramp_type {
            RampType::Jump => self.color_jump(t_prime),
            RampType::LinearRGB => {
                self.start_color
                    .linear_mix_rgb(&self.end_color, t_prime, self.ramp_parameter, self.duration.get())
            }
            RampType::LinearHSL => self.linear_hsl_color(t_prime),
        }
    }

    /// spec.md §4.1 step 1-2: compute the effective channel ordinal and
    /// phase-shifted time `t'`.
    fn phase_shifted_time(&self, t_ms: u32, channel: u8) -> u32 {
        debug_assert!(channel < CHANNELS);

        let effective_channel = if self.reverse {
            channel
        } else {
            CHANNELS - 1 - channel
        };

        let duration = self.duration.get();
        let time_divisor = self.time_divisor.get() as u32;

        let t = t_ms + (duration / time_divisor) * effective_channel as u32;
        t % duration
    }

    fn color_jump(&self, t_prime: u32) -> Color {
        if t_prime > self.ramp_parameter {
            self.end_color
        } else {
            self.start_color
        }
    }

    /// Real HSL lerp, supplementing spec.md's placeholder per SPEC_FULL.md
    /// §4.1: reuses the same rising/falling mixing factor as `LinearRGB`,
    /// expressed as a `U0F8` fraction instead of raw milliseconds.
    fn linear_hsl_color(&self, t_prime: u32) -> Color {
        let duration = self.duration.get();
        let ramp_parameter = self.ramp_parameter;

        let factor_u32 = if ramp_parameter == 0 {
            // rising phase skipped entirely (spec.md §4.1 numeric edge case)
            u8::MAX as u32
        } else if t_prime < ramp_parameter {
            (t_prime * u8::MAX as u32) / ramp_parameter
        } else if duration == ramp_parameter {
            0
        } else {
            let falling_progress = (t_prime - ramp_parameter) * u8::MAX as u32 / (duration - ramp_parameter);
            (u8::MAX as u32).saturating_sub(falling_progress)
        };

        let factor = U0F8::from_bits(factor_u32.min(u8::MAX as u32) as u8);
        self.start_color.linear_mix_hsl(self.end_color, factor, self.wrap_hue)
    }

    /// Serialize this record field-by-field, little-endian, for
    /// persistence (spec.md §6, §9). Deliberately not a `transmute`/raw
    /// memcpy: field widths and order are fixed here so the layout doesn't
    /// depend on the compiler's struct layout choices.
    pub fn to_le_bytes(&self) -> [u8; BYTE_LEN] {
        let mut buf = [0u8; BYTE_LEN];
        let mut i = 0;
        macro_rules! put {
            ($bytes:expr) => {{
                let bytes = $bytes;
                buf[i..i + bytes.len()].copy_from_slice(&bytes);
                i += bytes.len();
            }};
        }
        put!(self.channels.to_le_bytes());
        put!([self.reverse as u8]);
        put!([self.wrap_hue as u8]);
        put!([self.time_divisor.get()]);
        put!(self.delay.to_le_bytes());
        put!(self.duration.get().to_le_bytes());
        put!([self.ramp_type.to_byte()]);
        put!(self.ramp_parameter.to_le_bytes());
        put!(<[u8; 3]>::from(self.start_color));
        put!(<[u8; 3]>::from(self.end_color));
        put!(<[u8; 3]>::from(self.offset_color));
        debug_assert_eq!(i, BYTE_LEN);
        buf
    }

    /// Inverse of [`Cue::to_le_bytes`]. Returns `None` if any reserved
    /// invariant (nonzero `time_divisor`/`duration`, valid `ramp_type`
    /// discriminant) is violated, which can only happen for corrupted
    /// storage.
    pub fn from_le_bytes(bytes: &[u8; BYTE_LEN]) -> Option<Cue> {
        let mut i = 0;
        macro_rules! take {
            ($n:expr) => {{
                let slice = &bytes[i..i + $n];
                i += $n;
                slice
            }};
        }

        let channels = u16::from_le_bytes(take!(2).try_into().unwrap());
        let reverse = take!(1)[0] != 0;
        let wrap_hue = take!(1)[0] != 0;
        let time_divisor = NonZeroU8::new(take!(1)[0])?;
        let delay = u16::from_le_bytes(take!(2).try_into().unwrap());
        let duration = NonZeroU32::new(u32::from_le_bytes(take!(4).try_into().unwrap()))?;
        let ramp_type = RampType::from_byte(take!(1)[0])?;
        let ramp_parameter = u32::from_le_bytes(take!(4).try_into().unwrap());
        let start_color: Color = <[u8; 3]>::try_from(take!(3)).unwrap().into();
        let end_color: Color = <[u8; 3]>::try_from(take!(3)).unwrap().into();
        let offset_color: Color = <[u8; 3]>::try_from(take!(3)).unwrap().into();
        debug_assert_eq!(i, BYTE_LEN);

        Some(Cue {
            channels,
            reverse,
            wrap_hue,
            time_divisor,
            delay,
            duration,
            ramp_type,
            ramp_parameter,
            start_color,
            end_color,
            offset_color,
        })
    }
}

/// On-disk/wire size of one serialized [`Cue`] record.
pub const BYTE_LEN: usize = 25;
