//! Ginvoice Core - Shared business types.
//!
//! This crate provides the data model shared by every Ginvoice component:
//! - `sync` - Offline-first local state and synchronization core
//! - `cli` - Command-line driver for inspecting and syncing a device cache
//!
//! # Architecture
//!
//! The core crate contains only types and pure invariants - no I/O, no
//! persistence, no HTTP clients. Every type serializes to the same camelCase
//! JSON the web client keeps under its `ginvoice_v1_state` key.
//!
//! # Modules
//!
//! - [`types`] - Ids, emails, roles, catalog, sales, expenditures, profile and snapshot

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
