//! Text extraction from parsed messages.

pub mod collector;
pub mod decode;
