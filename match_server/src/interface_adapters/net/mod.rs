// Network adapter for client WebSocket connections.

pub mod client;

pub use client::{event_serializer, ws_handler};
