pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod images;
pub mod output;
pub mod pipeline;
pub mod providers;
pub mod query;
pub mod schema;
pub mod throttle;
