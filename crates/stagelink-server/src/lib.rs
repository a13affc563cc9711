//! Network surface of the stagelink orchestrator: the WebSocket endpoint
//! devices connect to and the HTTP API the authoring tool publishes to.

pub mod dispatcher;
pub mod http_api;
pub mod ws_server;

pub use http_api::AppState;
pub use ws_server::WsServer;
