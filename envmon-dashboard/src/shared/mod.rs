/// Shared modules for the environment dashboard
pub mod api;
pub mod config;
pub mod current;
pub mod history;
pub mod ingestion;
pub mod projector;
pub mod session;
pub mod stomp;
pub mod types;
pub mod websocket;
pub mod widget;
