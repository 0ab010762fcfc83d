//! `neolight` is the Rust crate implementing the core features of the neolight
//! daemon, which bridges an MQTT command bus and an addressable LED strip such
//! as the Raspberry Pi NeoPixel HAT.
//!
//! The crate is organized around the light-state engine: MQTT delivers partial
//! state updates (power, color, brightness), the engine merges them into the
//! canonical light state, renders that state to the output device, and hands
//! back the canonical state for publication on the state topic.

#[macro_use]
extern crate tracing;

pub mod api;
pub mod device;
pub mod engine;
pub mod models;
pub mod mqtt;
