//! SAT>IP Core - Core types and descriptor parsing
//!
//! This crate provides the foundational types for satip-detect:
//! - Device records describing discovered SAT>IP servers
//! - Frontend capability maps keyed by delivery system
//! - Parsing of UPnP device descriptors carrying the `X_SATIPCAP` field

pub mod descriptor;
pub mod device;

pub use descriptor::{parse_capabilities, parse_descriptor, DescriptorError};
pub use device::{DeviceRecord, FrontendCapabilities, NetworkInterface};
