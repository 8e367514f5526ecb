//! Core types for Ginvoice.
//!
//! This module provides type-safe wrappers for the business domain.

pub mod business;
pub mod catalog;
pub mod email;
pub mod error;
pub mod expenditure;
pub mod id;
pub mod sale;
pub mod snapshot;
pub mod status;

pub use business::{BusinessProfile, Theme};
pub use catalog::{Product, UnitVariant};
pub use email::{Email, EmailError};
pub use error::ModelError;
pub use expenditure::Expenditure;
pub use id::*;
pub use sale::{SelectedUnit, Transaction, TransactionLine, unrecorded_time};
pub use snapshot::{BusinessSnapshot, SyncMarker};
pub use status::*;
