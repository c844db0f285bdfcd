//! Core data types.

pub mod entity;
pub mod message;
