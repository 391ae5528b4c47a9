// Server side of the live-update channel: a broadcast hub plus the WebSocket
// endpoint clients hold open and the publish endpoint services push through.

pub mod handlers;
pub mod hub;

pub use hub::PushHub;
