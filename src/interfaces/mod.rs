//! Inbound adapters: file formats the CLI accepts.

pub mod csv;
pub mod fixture;
