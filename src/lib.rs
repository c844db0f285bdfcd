//! `mboxner` — named-entity extraction from MBOX archives.
//!
//! This crate provides the core library for iterating MBOX mailboxes,
//! decoding the plain-text content of their messages, running a
//! named-entity-recognition pass over that content, and merging the
//! recognized entity names into category-partitioned entity-book files.

pub mod books;
pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod ner;
pub mod parser;
