pub mod book;
pub mod entry;

pub use book::*;
pub use entry::*;
