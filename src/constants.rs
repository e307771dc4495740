//! Hardware and protocol constants shared across the crate.
//!
//! These mirror the `const`s scattered through the original firmware's
//! `led_ring.h` and `schedule.h` headers; gathering them here keeps the
//! magic numbers in one place instead of duplicated per module.

/// Number of Bit-Code-Modulation significance bits per color channel.
pub const BCM_RESOLUTION: usize = 8;

/// Number of tri-state GPIO pins used for Charlieplexing.
pub const CHARLIE_PINS: usize = 7;

/// Number of logical RGB LEDs ("channels") driven by the ring.
pub const NUM_CHANNELS: u8 = 12;

/// How many of the least-significant BCM bits are rendered inline
/// ("loop-unrolled") inside the interrupt handler rather than being
/// scheduled via the output-compare register.
pub const BCM_LOOP_UNROLL_AMOUNT: usize = 3;

/// Target dwell, in timer ticks, for each BCM significance bit.
pub const BCM_BRIGHTNESS_MAP: [u16; BCM_RESOLUTION] = [8, 16, 32, 64, 128, 256, 512, 1024];

/// Largest cue-id that may be referenced by a schedule/period delimiter.
pub const MAXIMUM_CUE_ID: u8 = 0xFE;

/// Sentinel cue-id meaning "no cue" / "invalid".
pub const INVALID_CUE_ID: u8 = 0xFF;

/// Largest legal delay value encodable in a code unit.
pub const MAXIMUM_DELAY: u16 = 0xFDFE;

/// Sentinel delay value meaning "no delay" / "invalid".
pub const INVALID_DELAY: u16 = 0xFDFF;

/// High byte of a code unit that introduces a new schedule.
pub const SCHEDULE_DELIMITER_FLAG: u8 = 0xFF;

/// High byte of a code unit that introduces a new period.
pub const PERIOD_DELIMITER_FLAG: u8 = 0xFE;

/// Timer prescaler: one timer tick equals this many CPU cycles.
pub const TIMER_PRESCALER: u16 = 8;

/// Maximum time, in milliseconds, `SerialProto` waits for a `RequestNext`
/// signal before aborting a multi-message transfer.
pub const REQUEST_NEXT_TIMEOUT_MS: u32 = 2000;

/// Polling granularity, in milliseconds, while waiting for `RequestNext`.
pub const REQUEST_NEXT_POLL_MS: u32 = 3;

/// Leading byte that marks an outgoing message as diagnostic text rather
/// than a binary-encoded message.
pub const DIAGNOSTIC_MARKER: u8 = 0x04;

/// Maximum size, in bytes, of the internal buffer used by the message
/// decoder's read callback.
pub const MAX_MESSAGE_BUFFER: usize = 300;
