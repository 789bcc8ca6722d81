pub mod api;
pub mod config;
pub mod focus;
pub mod model;
pub mod neighbors;
pub mod pipeline;
pub mod render;
pub mod session;
pub mod store;
