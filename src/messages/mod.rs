pub mod broker_messages;
pub mod tracking_messages;
