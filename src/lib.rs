//! Slipstream - low-latency HLS playlist server.
//!
//! This library crate exposes the synthetic demo source for integration
//! testing; the real functionality lives in the slip-* crates.

pub mod synth;
