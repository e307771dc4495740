//! Composes per-channel `Cue` colors into the `DisplayedFrame` the BCM
//! driver scans out, via the fixed Charlieplex pin geometry.

use crate::color::Color;
use crate::constants::{BCM_RESOLUTION, CHARLIE_PINS, NUM_CHANNELS};
use crate::cue::Cue;

/// `[sink_pin, source_pin]` for one color component of one channel.
type PinPair = [u8; 2];

const RED: usize = 0;
const GREEN: usize = 1;
const BLUE: usize = 2;

/// Fixed hardware geometry: for each of the 12 channels and each of its 3
/// color components, the (sink, source) Charlieplex pin pair that LED is
/// wired to. Reproduced exactly from the ring's wiring -- this is not
/// derivable from first principles, only from the schematic.
pub const COLOR_CHANNEL_PIN_MAP: [[PinPair; 3]; NUM_CHANNELS as usize] = [
    [[0, 1], [1, 0], [5, 2]],
    [[6, 1], [2, 0], [0, 2]],
    [[2, 1], [3, 0], [1, 2]],
    [[3, 1], [4, 0], [6, 2]],
    [[4, 1], [5, 0], [3, 2]],
    [[5, 1], [6, 0], [4, 2]],
    [[3, 4], [4, 3], [2, 5]],
    [[6, 4], [5, 3], [3, 5]],
    [[5, 4], [0, 3], [4, 5]],
    [[0, 4], [1, 3], [6, 5]],
    [[1, 4], [2, 3], [0, 5]],
    [[2, 4], [6, 3], [1, 5]],
];

/// The frame the BCM driver scans out: `frame[sink_pin][bit]` is the byte
/// written to the 8-pin GPIO port while that pin sinks current and that
/// BCM bit is being displayed.
pub type DisplayedFrame = [[u8; BCM_RESOLUTION as usize]; CHARLIE_PINS as usize];

/// Holds the current `DisplayedFrame` and knows how to draw into it.
///
/// Owned by the BCM driver on target; on the host it is plain data with no
/// synchronization of its own (spec.md §5: "access is coordinated by
/// write-order only").
#[derive(Clone)]
pub struct LedMatrix {
    frame: DisplayedFrame,
}

impl Default for LedMatrix {
    fn default() -> LedMatrix {
        LedMatrix {
            frame: [[0; BCM_RESOLUTION as usize]; CHARLIE_PINS as usize],
        }
    }
}

impl LedMatrix {
    pub fn new() -> LedMatrix {
        LedMatrix::default()
    }

    pub fn frame(&self) -> &DisplayedFrame {
        &self.frame
    }

    /// Write one logical RGB LED's color into the frame, per spec.md §4.4.
    pub fn draw_led(&mut self, channel: u8, color: Color) {
        debug_assert!(channel < NUM_CHANNELS);
        let components = [color.red(), color.green(), color.blue()];
        let pin_map = &COLOR_CHANNEL_PIN_MAP[channel as usize];

        for color_i in [RED, GREEN, BLUE] {
            let [sink_pin, source_pin] = pin_map[color_i];
            let component = components[color_i];
            for bit in 0..BCM_RESOLUTION {
                let bit_set = (component >> bit) & 1 != 0;
                let byte = &mut self.frame[sink_pin as usize][bit as usize];
                if bit_set {
                    *byte |= 1 << source_pin;
                } else {
                    *byte &= !(1 << source_pin);
                }
            }
        }
    }

    /// Draw every channel of `cue` at `t_ms`, per spec.md §4.4: channels
    /// outside the cue's mask are left untouched unless
    /// `draw_disabled_channels` asks for them to be blanked.
    pub fn draw_cue(&mut self, cue: &Cue, t_ms: u32, draw_disabled_channels: bool) {
        for channel in 0..NUM_CHANNELS {
            if cue.channels & (1 << channel) != 0 {
                self.draw_led(channel, cue.current_color(t_ms, channel));
            } else if draw_disabled_channels {
                self.draw_led(channel, Color::black());
            }
        }
    }
}
