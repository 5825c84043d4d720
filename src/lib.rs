//! Gas Town deacon - watchdog and recovery control loop for agent fleets

pub mod agent;
pub mod collab;
pub mod commands;
pub mod config;
pub mod deacon;
pub mod error;
pub mod state;
pub mod subprocess;
pub mod telemetry;
