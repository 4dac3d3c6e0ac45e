//! Operator REPL shared by the emulator and any other host.
//!
//! [`grammar`] turns a line into a [`grammar::Command`], [`commands`] runs it
//! against a [`commands::GateControl`], and [`completion`] and [`status`]
//! serve the line editor.

pub mod catalog;
pub mod commands;
pub mod completion;
pub mod grammar;
pub mod status;
