//! Wire schemas for the MQTT light protocol

/// Schema definitions as Serde serializable structures and enums
pub mod message;
