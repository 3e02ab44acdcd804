pub mod analytics;
pub mod api;
pub mod config;
pub mod intercept;
pub mod models;
pub mod state;
pub mod storage;
