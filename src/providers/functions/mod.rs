pub mod adapter;

pub use adapter::{FunctionsClient, FunctionsConfig};
