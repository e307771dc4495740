//! Bit-Code-Modulation scan-out driver: the per-interrupt state machine
//! that walks the `DisplayedFrame` bit by bit and drives the Charlieplex
//! port, with closed-loop dwell-time correction.

use crate::constants::{BCM_BRIGHTNESS_MAP, BCM_LOOP_UNROLL_AMOUNT, BCM_RESOLUTION, CHARLIE_PINS, TIMER_PRESCALER};
use crate::matrix::DisplayedFrame;
use core::cell::RefCell;
use critical_section::Mutex;

/// Abstraction over the 8-pin GPIO port used for Charlieplexing: one
/// register for data direction, one for output level.
pub trait Charlieport {
    fn set_data_direction(&mut self, mask: u8);
    fn set_output(&mut self, mask: u8);
}

/// Abstraction over the hardware timer driving the BCM output-compare
/// interrupt.
pub trait BcmTimer {
    /// Current free-running count.
    fn count(&self) -> u16;
    /// Reset the count to zero.
    fn reset(&mut self);
    /// Program the output-compare register.
    fn set_compare(&mut self, ticks: u16);
}

/// Number of 4-cycle busy-wait iterations equivalent to `ticks` timer
/// ticks at the configured prescaler, per spec.md §4.5 step 2.
fn busy_wait_iterations(ticks: u16) -> u32 {
    ticks as u32 * (TIMER_PRESCALER as u32 / 4)
}

/// Drives the Charlieplex scan-out. Owns the BCM state machine; the frame
/// it scans out is shared with the main execution context through a
/// `critical_section::Mutex`, since `LedMatrix::draw_*` runs outside the
/// interrupt.
pub struct BcmDriver {
    frame: Mutex<RefCell<DisplayedFrame>>,
    line_index: u8,
    bit_index: u8,
    interrupt_counter: u32,
    line_counter: u32,
    frame_counter: u32,
    counts: [u16; BCM_RESOLUTION],
    delay_correction: [u16; BCM_RESOLUTION],
}

impl Default for BcmDriver {
    fn default() -> BcmDriver {
        BcmDriver {
            frame: Mutex::new(RefCell::new([[0; BCM_RESOLUTION]; CHARLIE_PINS])),
            // Primed one step before wrap, so the first interrupt always
            // completes a line-index advance and unrolls line 0's opening
            // bits, rather than leaving the first 1-7 interrupts half-done.
            line_index: (CHARLIE_PINS - 1) as u8,
            bit_index: (BCM_RESOLUTION - 1) as u8,
            interrupt_counter: 0,
            line_counter: 0,
            frame_counter: 0,
            counts: [0; BCM_RESOLUTION],
            delay_correction: [0; BCM_RESOLUTION],
        }
    }
}

impl BcmDriver {
    pub fn new() -> BcmDriver {
        BcmDriver::default()
    }

    pub fn interrupt_counter(&self) -> u32 {
        self.interrupt_counter
    }

    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    pub fn delay_correction(&self) -> [u16; BCM_RESOLUTION] {
        self.delay_correction
    }

    /// Replace the scanned-out frame. Called from the main execution
    /// context; the next interrupt picks up the new contents line by line.
    pub fn set_frame(&self, frame: DisplayedFrame) {
        critical_section::with(|cs| *self.frame.borrow(cs).borrow_mut() = frame);
    }

    fn line_byte(&self, cs: critical_section::CriticalSection, bit: u8) -> u8 {
        self.frame.borrow(cs).borrow()[self.line_index as usize][bit as usize]
    }

    fn sink_masks(&self) -> (u8, u8) {
        let ddr = 1u8 << self.line_index;
        let port = !ddr;
        (ddr, port)
    }

    /// Run one step of the per-interrupt algorithm (spec.md §4.5). Meant
    /// to be called from the timer's output-compare ISR.
    pub fn on_interrupt<Port: Charlieport, Timer: BcmTimer>(&mut self, port: &mut Port, timer: &mut Timer) {
        self.interrupt_counter += 1;

        self.bit_index = (self.bit_index + 1) % BCM_RESOLUTION as u8;
        if self.bit_index == 0 {
            self.line_counter += 1;
            self.line_index = (self.line_index + 1) % CHARLIE_PINS as u8;
            let (ddr, sink_port) = self.sink_masks();
            port.set_data_direction(ddr);
            port.set_output(sink_port);

            for _ in 0..BCM_LOOP_UNROLL_AMOUNT {
                self.render_bit::<Port, Timer>(port, timer);
                self.bit_index += 1;
            }
        } else {
            let ticks = BCM_BRIGHTNESS_MAP[self.bit_index as usize]
                .wrapping_sub(self.delay_correction[self.bit_index as usize]);
            timer.set_compare(ticks);
            let byte = critical_section::with(|cs| self.line_byte(cs, self.bit_index));
            let (ddr, sink_port) = self.sink_masks();
            port.set_data_direction(ddr | byte);
            port.set_output(sink_port & byte);
            self.counts[self.bit_index as usize] = timer.count();
            timer.reset();
        }

        if self.bit_index as usize == BCM_RESOLUTION - 1 {
            self.frame_counter += 1;
            self.update_delay_correction();
        }
    }

    /// Loop-unrolled rendering of one bit inline (spec.md §4.5 step 2): no
    /// output-compare programming, just an immediate write followed by a
    /// busy-wait sized to the bit's target dwell.
    fn render_bit<Port: Charlieport, Timer: BcmTimer>(&mut self, port: &mut Port, timer: &mut Timer) {
        let byte = critical_section::with(|cs| self.line_byte(cs, self.bit_index));
        let (ddr, sink_port) = self.sink_masks();
        port.set_data_direction(ddr | byte);
        port.set_output(sink_port & byte);
        self.counts[self.bit_index as usize] = timer.count();
        timer.reset();

        let target = BCM_BRIGHTNESS_MAP[self.bit_index as usize]
            .wrapping_sub(self.delay_correction[self.bit_index as usize]);
        for _ in 0..busy_wait_iterations(target) {
            core::hint::spin_loop();
        }
    }

    /// spec.md §4.5 step 4: adjust `delay_correction` from the
    /// phase-shifted measured counts once the last bit of a line has been
    /// rendered.
    fn update_delay_correction(&mut self) {
        for i in 0..BCM_RESOLUTION {
            let measured = self.counts[(i + 1) % BCM_RESOLUTION];
            let target = BCM_BRIGHTNESS_MAP[i];

            if measured > target && self.delay_correction[i] + 1 < BCM_BRIGHTNESS_MAP[i] {
                self.delay_correction[i] += 1;
            } else if measured < target {
                self.delay_correction[i] = self.delay_correction[i].wrapping_sub(1);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct FakePort {
        ddr: u8,
        output: u8,
    }

    impl Charlieport for FakePort {
        fn set_data_direction(&mut self, mask: u8) {
            self.ddr = mask;
        }
        fn set_output(&mut self, mask: u8) {
            self.output = mask;
        }
    }

    struct FakeTimer {
        count: u16,
        compare: u16,
        reset_calls: u32,
    }

    impl BcmTimer for FakeTimer {
        fn count(&self) -> u16 {
            self.count
        }
        fn reset(&mut self) {
            self.reset_calls += 1;
            self.count = 0;
        }
        fn set_compare(&mut self, ticks: u16) {
            self.compare = ticks;
        }
    }

    fn fakes() -> (FakePort, FakeTimer) {
        (
            FakePort { ddr: 0, output: 0 },
            FakeTimer { count: 0, compare: 0, reset_calls: 0 },
        )
    }

    #[test]
    fn bit_index_wraps_and_advances_line_on_wrap() {
        let mut driver = BcmDriver::new();
        let (mut port, mut timer) = fakes();

        // First interrupt wraps bit_index to 0 and advances the line,
        // then loop-unrolls BCM_LOOP_UNROLL_AMOUNT bits inline.
        driver.on_interrupt(&mut port, &mut timer);
        assert_eq!(driver.line_counter, 1);
        assert_eq!(driver.bit_index as usize, BCM_LOOP_UNROLL_AMOUNT);
    }

    #[test]
    fn delay_correction_never_reaches_its_target() {
        let mut driver = BcmDriver::new();
        let (mut port, mut timer) = fakes();

        // Force every measured count far above target so correction keeps
        // climbing (the overshoot branch), and confirm the "never reach
        // target" clamp holds even after many cycles.
        timer.count = 0xFFFF;
        for _ in 0..(BCM_RESOLUTION * 2000) {
            driver.on_interrupt(&mut port, &mut timer);
        }

        for i in 0..BCM_RESOLUTION {
            assert!(driver.delay_correction()[i] < BCM_BRIGHTNESS_MAP[i]);
        }
    }

    /// spec.md §8 scenario 5: an overshoot on the phase-shifted measured
    /// count nudges correction up (bounded below the target), an undershoot
    /// nudges it down (wrapping, unbounded below).
    #[test]
    fn update_delay_correction_matches_scenario_5() {
        let mut driver = BcmDriver::new();
        driver.counts[4] = 66; // measured for bit 3, target BCM_BRIGHTNESS_MAP[3] == 64
        driver.update_delay_correction();
        assert_eq!(driver.delay_correction()[3], 1);

        let mut driver = BcmDriver::new();
        driver.counts[4] = 62;
        driver.update_delay_correction();
        assert_eq!(driver.delay_correction()[3], 0xFFFF);
    }

    #[test]
    fn set_frame_is_visible_to_the_next_interrupt() {
        let driver = BcmDriver::new();
        let mut frame = [[0u8; BCM_RESOLUTION]; CHARLIE_PINS];
        frame[0][0] = 0xAB;
        driver.set_frame(frame);

        critical_section::with(|cs| {
            assert_eq!(driver.frame.borrow(cs).borrow()[0][0], 0xAB);
        });
    }
}
