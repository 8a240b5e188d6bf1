//! Wire protocol handling: the HTTP proxy surface, the WebSocket gateway and
//! its log stream multiplexer, and the multiplexed log frame codec.

pub mod frame;
pub mod http;
pub mod logs;
pub mod websocket;
