//! Summary shaping: wide per-date table and per-crop/activity subsets.

pub mod shaper;

pub use shaper::*;
