pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
mod main_lib;
pub mod providers;
pub mod secrets;

pub use main_lib::{build_state, init_tracing, load_initial_config, AppState};
