// src/models/mod.rs

pub mod discovery;

pub use discovery::*;
