//! In-memory cue/schedule storage and its persistence to/from a
//! byte-addressable non-volatile region.

use crate::cue::{Cue, BYTE_LEN as CUE_BYTE_LEN};
use crate::diagnostic;
use crate::schedule::CodeUnit;
use heapless::Vec as HVec;

/// Maximum number of `Cue` records the store can hold.
pub const MAX_CUES: usize = 64;
/// Maximum number of schedule code units the store can hold.
pub const MAX_SCHEDULE_ELEMENTS: usize = 1024;
/// Maximum number of schedules the index map can track.
pub const MAX_SCHEDULES: usize = 64;

/// Width, in bytes, of each header field (`number_of_cues`,
/// `number_of_schedule_elements`). Chosen to match the 8-bit target's
/// natural register width per SPEC_FULL.md §3.1, rather than a
/// host-dependent `usize`.
const HEADER_FIELD_BYTES: usize = 2;

/// Errors produced while persisting or restoring a [`Store`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// `store_all` would have written more than `maximum_size` bytes.
    WouldOverflow { needed: usize, maximum: usize },
    /// A `Cue` buffer or schedule code unit could not be appended because
    /// the bounded in-memory store is full.
    StoreFull,
}

/// A destination for persisted bytes: either an NVRAM page writer or a
/// plain RAM buffer, per spec.md §4.6.
pub trait ByteSink {
    fn write_byte(&mut self, byte: u8);
}

impl<const N: usize> ByteSink for HVec<u8, N> {
    fn write_byte(&mut self, byte: u8) {
        // Capacity was already checked by `store_all` before any bytes
        // were written; a push failure here would mean that check was wrong.
        let _ = self.push(byte);
    }
}

impl<F: FnMut(u8)> ByteSink for F {
    fn write_byte(&mut self, byte: u8) {
        self(byte)
    }
}

/// In-memory storage for all loaded cues and schedules, plus the schedule
/// index map (spec.md §3 "Store", "Schedule index map").
///
/// Mutated only from the main execution context; the BCM interrupt driver
/// never touches this type directly (spec.md §5).
#[derive(Default)]
pub struct Store {
    cues: HVec<Cue, MAX_CUES>,
    schedule_elements: HVec<CodeUnit, MAX_SCHEDULE_ELEMENTS>,
    schedule_index_map: HVec<usize, MAX_SCHEDULES>,
}

impl Store {
    pub fn new() -> Store {
        Store::default()
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn schedule_elements(&self) -> &[CodeUnit] {
        &self.schedule_elements
    }

    pub fn schedule_index_map(&self) -> &[usize] {
        &self.schedule_index_map
    }

    /// Load a cue record. Returns `Err` (and logs a diagnostic) if the
    /// bounded cue buffer is already full.
    pub fn push_cue(&mut self, cue: Cue) -> Result<(), StoreError> {
        self.cues.push(cue).map_err(|_| {
            diagnostic::log("cue store full, dropping cue");
            StoreError::StoreFull
        })
    }

    /// Load a schedule code unit. If it is a schedule delimiter, its
    /// position is recorded in the index map (spec.md §3 "Schedule index
    /// map": "Rebuilt on every push of a schedule delimiter").
    pub fn push_schedule_element(&mut self, element: CodeUnit) -> Result<(), StoreError> {
        if element.is_schedule_delimiter() {
            self.schedule_index_map
                .push(self.schedule_elements.len())
                .map_err(|_| {
                    diagnostic::log("schedule index map full, dropping schedule");
                    StoreError::StoreFull
                })?;
        }
        self.schedule_elements.push(element).map_err(|_| {
            diagnostic::log("schedule element buffer full, dropping element");
            StoreError::StoreFull
        })
    }

    pub fn clear(&mut self) {
        self.cues.clear();
        self.schedule_elements.clear();
        self.schedule_index_map.clear();
    }

    pub fn cue(&self, cue_id: u8) -> Option<&Cue> {
        self.cues.get(cue_id as usize)
    }

    pub fn schedule_count(&self) -> usize {
        self.schedule_index_map.len()
    }

    /// Byte offset into `schedule_elements()` at which schedule `id`
    /// begins, per spec.md §4.2's `begin(id)`.
    pub fn schedule_begin(&self, id: usize) -> usize {
        self.schedule_index_map
            .get(id)
            .copied()
            .unwrap_or(self.schedule_elements.len())
    }

    /// Byte offset one past the end of schedule `id`, per spec.md §4.2's
    /// `end(id)`: `begin(id+1)`, or the end of the buffer if there is no
    /// schedule `id+1`.
    pub fn schedule_end(&self, id: usize) -> usize {
        self.schedule_begin(id + 1)
    }

    pub fn schedule_units(&self, id: usize) -> &[CodeUnit] {
        &self.schedule_elements[self.schedule_begin(id)..self.schedule_end(id)]
    }

    /// Total size, in bytes, `store_all` would write for the store's
    /// current contents.
    pub fn persisted_size(&self) -> usize {
        2 * HEADER_FIELD_BYTES + self.cues.len() * CUE_BYTE_LEN + self.schedule_elements.len() * 2
    }

    /// Write the header, then cue records, then schedule code units,
    /// little-endian, through `sink`. Refuses (and logs) without writing
    /// anything if the total size would exceed `maximum_size`, per spec.md
    /// §4.6/§7(a).
    pub fn store_all<S: ByteSink>(&self, sink: &mut S, maximum_size: usize) -> Result<(), StoreError> {
        let needed = self.persisted_size();
        if needed > maximum_size {
            diagnostic::log("store_all: would overflow destination region");
            return Err(StoreError::WouldOverflow {
                needed,
                maximum: maximum_size,
            });
        }

        for byte in (self.cues.len() as u16).to_le_bytes() {
            sink.write_byte(byte);
        }
        for byte in (self.schedule_elements.len() as u16).to_le_bytes() {
            sink.write_byte(byte);
        }
        for cue in &self.cues {
            for byte in cue.to_le_bytes() {
                sink.write_byte(byte);
            }
        }
        for unit in &self.schedule_elements {
            for byte in unit.raw().to_le_bytes() {
                sink.write_byte(byte);
            }
        }

        Ok(())
    }

    /// Clear both buffers, then read the header and that many cues and
    /// schedule code units from `bytes`, short-circuiting cleanly if the
    /// input runs out (spec.md §4.6).
    pub fn load_all<I: Iterator<Item = u8>>(&mut self, mut bytes: I) -> Result<(), StoreError> {
        self.clear();

        let Some(number_of_cues) = read_u16(&mut bytes) else {
            return Ok(());
        };
        let Some(number_of_schedule_elements) = read_u16(&mut bytes) else {
            return Ok(());
        };

        for _ in 0..number_of_cues {
            let mut buf = [0u8; CUE_BYTE_LEN];
            for slot in &mut buf {
                match bytes.next() {
                    Some(b) => *slot = b,
                    None => return Ok(()),
                }
            }
            match Cue::from_le_bytes(&buf) {
                Some(cue) => self.push_cue(cue)?,
                None => {
                    diagnostic::log("load_all: malformed cue record, stopping");
                    return Ok(());
                }
            }
        }

        for _ in 0..number_of_schedule_elements {
            let Some(raw) = read_u16(&mut bytes) else {
                return Ok(());
            };
            self.push_schedule_element(CodeUnit::from_raw(raw))?;
        }

        Ok(())
    }
}

fn read_u16<I: Iterator<Item = u8>>(bytes: &mut I) -> Option<u16> {
    let low = bytes.next()?;
    let high = bytes.next()?;
    Some(u16::from_le_bytes([low, high]))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cue::Cue;

    /// spec.md §8 invariant: `schedule_index_map[i] < schedule_index_map[i+1]`.
    #[test]
    fn index_map_strictly_increasing() {
        let mut store = Store::new();
        store.push_schedule_element(CodeUnit::schedule_delimiter(0)).unwrap();
        store.push_schedule_element(CodeUnit::delay(100)).unwrap();
        store.push_schedule_element(CodeUnit::schedule_delimiter(1)).unwrap();

        let map = store.schedule_index_map();
        assert_eq!(map, &[0, 2]);
        for pair in map.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    /// spec.md §8 scenario 4: persistence round trip.
    #[test]
    fn persistence_round_trip() {
        let mut store = Store::new();
        store.push_cue(Cue::default()).unwrap();
        store.push_schedule_element(CodeUnit::schedule_delimiter(0)).unwrap();

        let mut buffer: HVec<u8, 1024> = HVec::new();
        store.store_all(&mut buffer, 1024).unwrap();

        let mut restored = Store::new();
        restored.load_all(buffer.iter().copied()).unwrap();

        assert_eq!(restored.cues().len(), store.cues().len());
        assert_eq!(restored.cues()[0].to_le_bytes(), store.cues()[0].to_le_bytes());
        assert_eq!(restored.schedule_elements(), store.schedule_elements());
        assert_eq!(restored.schedule_index_map(), store.schedule_index_map());
    }

    #[test]
    fn store_all_refuses_when_it_would_overflow() {
        let mut store = Store::new();
        store.push_cue(Cue::default()).unwrap();

        let mut buffer: HVec<u8, 4> = HVec::new();
        let err = store.store_all(&mut buffer, 4).unwrap_err();
        assert!(matches!(err, StoreError::WouldOverflow { .. }));
        assert!(buffer.is_empty());
    }

    #[test]
    fn load_all_short_circuits_on_truncated_input() {
        let mut store = Store::new();
        // Header claims one cue, but no cue bytes follow.
        let bytes = [1u8, 0, 0, 0];
        store.load_all(bytes.into_iter()).unwrap();
        assert!(store.cues().is_empty());
    }
}
