//! This crate defines the data structure and operations on the Freilite Iris 16,
//! a smart vandal switch with a lit ring consisting of 12 individual RGB LEDs.

#![cfg_attr(not(test), no_std)]

pub mod bcm;
pub mod color;
pub mod constants;
pub mod cue;
pub mod diagnostic;
pub mod matrix;
pub mod schedule;
pub mod serial;
pub mod store;
pub mod timeline;

