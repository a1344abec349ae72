//! Real-time drone delivery tracking: a broker subscription manager that
//! survives reconnects, a monotonic per-delivery tracking state machine fed
//! by pushes and a REST poll loop, geo sanitization for hostile coordinate
//! data, and a motion simulator for when no live telemetry exists.

pub mod broker;
pub mod config;
pub mod constants;
pub mod geo;
pub mod logger;
pub mod messages;
pub mod rest;
pub mod simulator;
pub mod tracking;
pub mod types;
