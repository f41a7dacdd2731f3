pub mod agent;
pub mod bake;
pub mod error;
pub mod submission;

pub use agent::*;
pub use bake::*;
pub use error::*;
pub use submission::*;
