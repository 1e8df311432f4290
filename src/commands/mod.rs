// src/commands/mod.rs

pub mod actions;
pub mod chat;
pub mod streaming;

pub use actions::*;
pub use streaming::*;
