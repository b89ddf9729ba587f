// src/scoring/mod.rs
//
// The adaptive scoring core. Everything in here is pure and synchronous:
// handlers fetch rows, hand plain values to these modules, and persist
// whatever comes back. No module in this tree touches the database.

pub mod attempts;
pub mod calibration;
pub mod gate;
pub mod irt;
pub mod params;
pub mod randomizer;
pub mod scale;
pub mod shuffle;
