pub mod config;
pub mod models;
pub mod providers;
pub mod services;
pub mod store;
pub mod ui;

pub use store::{ChatStore, StoreEvent, StoreOptions};
