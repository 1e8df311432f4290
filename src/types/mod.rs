// src/types/mod.rs

pub mod chat;
pub mod config;
pub mod debug;
pub mod discovery;
pub mod openai;

pub use chat::*;
pub use config::*;
pub use debug::*;
pub use discovery::*;
pub use openai::*;
