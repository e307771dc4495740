//! A thin logging facade so the rest of the crate can report diagnostics
//! without hard-wiring itself to RTT. On target (`feature = "rtt"`),
//! messages go out over `rtt-target`'s channel 0; otherwise (host tests,
//! or a build with the feature disabled) they are dropped.
//!
//! Grounded on the teacher's own `rtt`/`panic-rtt-target` usage pattern:
//! `rprintln!` is only ever reached for out-of-band diagnostics, never for
//! data the firmware depends on, so a no-op fallback is always safe.

#[cfg(feature = "rtt")]
pub fn log(message: &str) {
    rtt_target::rprintln!("{}", message);
}

#[cfg(not(feature = "rtt"))]
pub fn log(_message: &str) {}
