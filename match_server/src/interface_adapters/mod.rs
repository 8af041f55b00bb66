// Interface adapters: wire protocol, WebSocket handling and HTTP routes.

pub mod http;
pub mod net;
pub mod protocol;
pub mod state;
pub mod utils;
