
#[macro_use]
extern crate lazy_static;

// External data representation, a protocol for serializing data to be sent over the network
pub mod xdr;

// Remote procedure call, a protocol build on top of XDR to provide something like C-style function calls over the network
pub mod rpc;

// A protocol using RPC that's meant to communicate with instruments like oscilloscopes, power supplies, waveform generators, etc
pub mod vxi11;

// SCPI sessions over VXI-11 or a raw socket, addressed by VISA resource strings
pub mod scpi;

// Module for devices that speak SCPI
pub mod devices;

pub mod config;
pub mod errors;

pub use crate::config::ScopeConfig;
pub use crate::devices::dsox3000::{Acquisition, DSOX3000};
pub use crate::errors::{Error, Result};
