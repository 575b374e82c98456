//! Party race simulation core.
//!
//! Racers move around a lap for a fixed duration, a catch-up model keeps the field close,
//! a spacing controller stops racers from stacking on top of each other and scheduled random
//! events stir things up. At the end a rank-based rule picks who "wins" (e.g. who buys coffee).

pub mod core;
pub mod interfaces;
pub mod post;
pub mod pre;
