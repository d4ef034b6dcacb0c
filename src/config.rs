//! Configuration module
//!
//! Default parameters and the runtime configuration of a node.

pub mod node;
pub mod params;

pub use node::{
    AlignmentConfig, ConfigError, ControllerGains, CurrentSenseConfig, LoopSelect, NodeConfig,
    PidGains,
};
pub use params::*;
