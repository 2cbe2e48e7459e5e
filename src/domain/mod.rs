//! Domain model and the ports through which the pipeline reaches its collaborators.

pub mod delivery;
pub mod order;
pub mod payment;
pub mod ports;
pub mod product;
pub mod tracking;
pub mod webhook;
