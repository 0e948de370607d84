//! Adapters Layer
//!
//! Implementations of the domain ports against real infrastructure.

pub mod outbound;
