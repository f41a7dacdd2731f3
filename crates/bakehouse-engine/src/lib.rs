pub mod config;
pub mod engine;
pub mod store;
pub mod sweep;

pub use config::*;
pub use engine::*;
pub use store::*;
pub use sweep::*;
