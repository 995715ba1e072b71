pub mod api;
pub mod audit;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod events;
pub mod models;
pub mod observability;
pub mod realtime;
pub mod state;
pub mod store;
