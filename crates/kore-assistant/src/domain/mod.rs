//! Core domain types shared by the scanner, store, and presenters.

pub mod errors;
pub mod model;
