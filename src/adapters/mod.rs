//! Adapters — implementations of the port traits.
//!
//! Everything hardware- or host-specific lives here, behind the port
//! traits in [`crate::app::ports`]. The control core never imports from
//! this module.

pub mod gpio_outputs;
pub mod log_sink;
pub mod memory_store;
pub mod sim_oven;
pub mod time;
