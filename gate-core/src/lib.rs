#![no_std]

extern crate alloc;

// Shared logic for the gate dialing protocol.
//
// The crate stays portable between host tooling and embedded presentation
// controllers by avoiding the Rust standard library. Rendering, audio and
// object replication are reached only through the `effects` seam.

pub mod address;
pub mod chevron;
pub mod clock;
pub mod dialing;
pub mod effects;
pub mod gate;
pub mod link;
pub mod network;
pub mod repl;
pub mod ring;
pub mod scheduler;
pub mod telemetry;
pub mod transit;
