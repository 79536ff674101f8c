//! # Gatewayエンドポイント

pub mod v1_drop;

pub use v1_drop::{handle_drop, process_drop, DROP_PATH};
