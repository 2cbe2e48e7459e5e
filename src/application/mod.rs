//! Application layer: the workflows that drive the ports.
//!
//! [`tracking`] answers "has this address been paid", [`payments`] turns a confirmed
//! payment into a paid order, and [`delivery`] hands a paid order's goods over.

pub mod delivery;
pub mod orders;
pub mod payments;
pub mod tracking;
