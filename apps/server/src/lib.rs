pub mod config;
pub mod error;
pub mod rpc;
pub mod server;
pub mod service;
pub mod tools;
mod main_lib;

pub use main_lib::{build_state, default_sources, init_tracing};
pub use service::PriceService;
