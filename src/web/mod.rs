//! HTTP surface of the bridge.
//! Motion routes drive the sequencer; camera routes return Base64 JPEG frames.

pub mod api;
pub mod models;
