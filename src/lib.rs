pub mod error;
pub mod config;
pub mod filter;
pub mod schema;
pub mod stub;
pub mod repo;
pub mod model;
pub mod ids;
pub mod audit;
pub mod types;
pub mod accounting;
pub mod dispatch;
pub mod api;
