pub mod state_machine;
pub mod tracker;

pub use state_machine::{TrackingEffect, TrackingStateMachine};
pub use tracker::DeliveryTracker;
