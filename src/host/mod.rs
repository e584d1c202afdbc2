//! Host-facing boundary: message types and the console bridge

pub mod console;
pub mod protocol;
