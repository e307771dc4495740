//! The packed schedule byte stream: a self-delimiting sequence of 16-bit
//! `CodeUnit`s mixing schedule/period delimiters and delays, plus the
//! structured external representation used for host exchange.

use crate::constants::{
    INVALID_CUE_ID, INVALID_DELAY, MAXIMUM_CUE_ID, MAXIMUM_DELAY, PERIOD_DELIMITER_FLAG,
    SCHEDULE_DELIMITER_FLAG,
};
use heapless::Vec as HVec;
use serde::{Deserialize, Serialize};

/// A single 16-bit element of the packed schedule byte stream.
///
/// spec.md §9 explicitly calls for this to be "a plain 16-bit word plus
/// accessors", not a union exposed at the API level -- unlike the original
/// firmware's `delay_t`, which really was a C `union`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct CodeUnit(u16);

impl CodeUnit {
    /// Build the delimiter that introduces a new schedule (and its first period).
    pub fn schedule_delimiter(cue_id: u8) -> CodeUnit {
        CodeUnit::delimiter(SCHEDULE_DELIMITER_FLAG, cue_id)
    }

    /// Build the delimiter that introduces a new period within the current schedule.
    pub fn period_delimiter(cue_id: u8) -> CodeUnit {
        CodeUnit::delimiter(PERIOD_DELIMITER_FLAG, cue_id)
    }

    fn delimiter(flag: u8, cue_id: u8) -> CodeUnit {
        let cue_id = cue_id.min(MAXIMUM_CUE_ID);
        CodeUnit(((flag as u16) << 8) | cue_id as u16)
    }

    /// Build a delay code unit. Values above `MAXIMUM_DELAY` are clamped,
    /// mirroring the original firmware's guarantee that `INVALID_DELAY`
    /// (`0xFDFF`) can never be produced by a legitimate delay.
    pub fn delay(value: u16) -> CodeUnit {
        CodeUnit(value.min(MAXIMUM_DELAY))
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn from_raw(value: u16) -> CodeUnit {
        CodeUnit(value)
    }

    fn high_byte(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn is_schedule_delimiter(self) -> bool {
        self.high_byte() == SCHEDULE_DELIMITER_FLAG
    }

    pub fn is_period_delimiter(self) -> bool {
        self.high_byte() == PERIOD_DELIMITER_FLAG
    }

    pub fn is_delimiter(self) -> bool {
        self.is_schedule_delimiter() || self.is_period_delimiter()
    }

    pub fn is_delay(self) -> bool {
        !self.is_delimiter()
    }

    /// The cue-id carried by a delimiter, or `INVALID_CUE_ID` if this code
    /// unit is a delay.
    pub fn cue_id(self) -> u8 {
        if self.is_delimiter() {
            (self.0 & 0xFF) as u8
        } else {
            INVALID_CUE_ID
        }
    }

    /// The delay value, or `INVALID_DELAY` if this code unit is a delimiter.
    pub fn delay_value(self) -> u16 {
        if self.is_delay() {
            self.0
        } else {
            INVALID_DELAY
        }
    }
}

impl From<u16> for CodeUnit {
    fn from(value: u16) -> CodeUnit {
        CodeUnit(value)
    }
}

impl From<CodeUnit> for u16 {
    fn from(unit: CodeUnit) -> u16 {
        unit.0
    }
}

/// Maximum number of periods the structured (host-exchange) representation
/// of a single `Schedule` can hold.
pub const MAX_PERIODS: usize = 16;
/// Maximum number of delays the structured representation of a single
/// `Period` can hold.
pub const MAX_DELAYS: usize = 16;

/// The expanded, structured form of a single period: which cue plays, and
/// the on/off delay list, used for host exchange (spec.md §4.2, "External
/// representation").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Period {
    pub cue_id: u8,
    pub delays: HVec<u16, MAX_DELAYS>,
}

/// The expanded, structured form of a schedule: an optional loop duration
/// plus its periods.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleMessage {
    /// `None` when the schedule has no explicit duration (loops at each
    /// period's own rhythm).
    pub duration: Option<u16>,
    pub periods: HVec<Period, MAX_PERIODS>,
}

/// Errors produced while expanding or reflattening a schedule.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScheduleCodecError {
    /// The structured representation has more periods or delays than the
    /// bounded buffers can hold.
    CapacityExceeded,
}

/// Classify the code unit at the head of a slice and locate the end of the
/// schedule starting there (spec.md §4.2's `begin`/`end` over the index map
/// is implemented on `Store`; these are the pure, buffer-only primitives
/// the schedule codec itself needs).
///
/// Expand the code units of a single schedule (from its leading delimiter
/// up to, but excluding, the next schedule delimiter or end of buffer) into
/// a `ScheduleMessage`.
pub fn expand(units: &[CodeUnit]) -> Result<ScheduleMessage, ScheduleCodecError> {
    let mut iter = units.iter().copied().peekable();

    let Some(leading) = iter.next() else {
        return Ok(ScheduleMessage {
            duration: None,
            periods: HVec::new(),
        });
    };
    debug_assert!(leading.is_schedule_delimiter());

    let mut duration = None;
    if let Some(&next) = iter.peek() {
        if next.is_delay() && next.delay_value() != 0 {
            duration = Some(next.delay_value());
            iter.next();
        }
    }

    let mut periods: HVec<Period, MAX_PERIODS> = HVec::new();
    let mut current_cue_id = leading.cue_id();
    let mut current_delays: HVec<u16, MAX_DELAYS> = HVec::new();

    for unit in iter {
        if unit.is_period_delimiter() {
            periods
                .push(Period {
                    cue_id: current_cue_id,
                    delays: current_delays,
                })
                .map_err(|_| ScheduleCodecError::CapacityExceeded)?;
            current_cue_id = unit.cue_id();
            current_delays = HVec::new();
        } else {
            current_delays
                .push(unit.delay_value())
                .map_err(|_| ScheduleCodecError::CapacityExceeded)?;
        }
    }

    periods
        .push(Period {
            cue_id: current_cue_id,
            delays: current_delays,
        })
        .map_err(|_| ScheduleCodecError::CapacityExceeded)?;

    Ok(ScheduleMessage { duration, periods })
}

/// Reflatten a `ScheduleMessage` back into code units, appending them to
/// `out`. Inverse of [`expand`]; spec.md §8 requires this round-trip to be
/// exact.
pub fn flatten(message: &ScheduleMessage, out: &mut HVec<CodeUnit, 256>) -> Result<(), ScheduleCodecError> {
    let mut periods = message.periods.iter();
    let Some(first) = periods.next() else {
        return Ok(());
    };

    out.push(CodeUnit::schedule_delimiter(first.cue_id))
        .map_err(|_| ScheduleCodecError::CapacityExceeded)?;
    if let Some(duration) = message.duration {
        out.push(CodeUnit::delay(duration))
            .map_err(|_| ScheduleCodecError::CapacityExceeded)?;
    }
    for &delay in &first.delays {
        out.push(CodeUnit::delay(delay))
            .map_err(|_| ScheduleCodecError::CapacityExceeded)?;
    }

    for period in periods {
        out.push(CodeUnit::period_delimiter(period.cue_id))
            .map_err(|_| ScheduleCodecError::CapacityExceeded)?;
        for &delay in &period.delays {
            out.push(CodeUnit::delay(delay))
                .map_err(|_| ScheduleCodecError::CapacityExceeded)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classification_by_high_byte() {
        assert!(CodeUnit::schedule_delimiter(1).is_schedule_delimiter());
        assert!(CodeUnit::period_delimiter(2).is_period_delimiter());
        assert!(CodeUnit::delay(200).is_delay());
        assert_eq!(CodeUnit::schedule_delimiter(1).cue_id(), 1);
        assert_eq!(CodeUnit::delay(200).cue_id(), INVALID_CUE_ID);
        assert_eq!(CodeUnit::delay(200).delay_value(), 200);
    }

    /// spec.md §8 "Schedule encoding round-trip" invariant, using the exact
    /// stream from spec.md §8 scenario 3.
    #[test]
    fn expand_then_flatten_round_trips() {
        let units: HVec<CodeUnit, 256> = [0xFF01u16, 0x03E8, 0x00C8, 0x00C8, 0xFE02, 0x0064, 0x0064]
            .iter()
            .map(|&raw| CodeUnit::from_raw(raw))
            .collect();

        let message = expand(&units).unwrap();
        assert_eq!(message.duration, Some(1000));
        assert_eq!(message.periods.len(), 2);
        assert_eq!(message.periods[0].cue_id, 1);
        assert_eq!(&message.periods[0].delays[..], &[200, 200]);
        assert_eq!(message.periods[1].cue_id, 2);
        assert_eq!(&message.periods[1].delays[..], &[100, 100]);

        let mut reflattened: HVec<CodeUnit, 256> = HVec::new();
        flatten(&message, &mut reflattened).unwrap();
        assert_eq!(reflattened.as_slice(), units.as_slice());
    }

    #[test]
    fn no_duration_when_followed_by_delimiter_or_zero_delay() {
        // Duration-less: leading delimiter directly followed by a period delimiter.
        let units: HVec<CodeUnit, 256> = [CodeUnit::schedule_delimiter(0), CodeUnit::period_delimiter(1)]
            .into_iter()
            .collect();
        assert_eq!(expand(&units).unwrap().duration, None);

        // Duration-less: leading delimiter followed by a zero-valued delay.
        let units: HVec<CodeUnit, 256> = [CodeUnit::schedule_delimiter(0), CodeUnit::delay(0)]
            .into_iter()
            .collect();
        assert_eq!(expand(&units).unwrap().duration, None);
    }

    #[test]
    fn empty_schedule_renders_nothing_but_parses_cleanly() {
        let units: HVec<CodeUnit, 256> = [CodeUnit::schedule_delimiter(0)].into_iter().collect();
        let message = expand(&units).unwrap();
        assert_eq!(message.duration, None);
        assert_eq!(message.periods.len(), 1);
        assert!(message.periods[0].delays.is_empty());
    }
}
