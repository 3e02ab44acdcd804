pub mod analytics;
pub mod handlers;
pub mod routes;

pub use routes::{create_analytics_router, create_app};
