//! ReflowWizard controller library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. Hardware-specific code lives behind the port traits in
//! [`app::ports`]; the adapters here are the host-side implementations.

#![deny(unused_must_use)]

pub mod app;
pub mod channels;
pub mod control;
pub mod error;
pub mod fsm;
pub mod learning;
pub mod profile;
pub mod safety;
pub mod settings;

pub mod adapters;
