//! WebSocket event frames.
//!
//! Every frame is a JSON object `{"event": <name>, "data": {...}}`.

pub mod log;
