pub mod activity;
pub mod api;
pub mod cancel;
pub mod config;
pub mod drag;
pub mod search;
pub mod store;
pub mod types;
