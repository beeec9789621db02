// src/control/mod.rs

//! dpkg control-file support
//!
//! This module provides the in-memory form of a status database
//! ([`Stanza`], [`Database`]) and the codec that reads and writes it.

pub mod codec;
pub mod stanza;

pub use codec::{
    Database, ParseMode, parse, parse_reader, parse_str, serialize, write_database,
};
pub use stanza::{Fields, Stanza};
