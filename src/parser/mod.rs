//! Mailbox and message parsing.

pub mod mbox;
pub mod message;
