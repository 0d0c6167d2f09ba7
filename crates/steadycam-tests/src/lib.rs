//! Integration test crate for SteadyCam.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on the steadycam crates to verify they work together.

#[cfg(test)]
mod stabilization;

#[cfg(test)]
mod pipeline;
