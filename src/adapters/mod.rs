// Adapters layer: concrete implementations for external systems (http, registry files, stdio).

pub mod crawler;
pub mod http;
pub mod loader;
pub mod session;
