pub mod config;
pub mod stats;
pub mod timer;
pub mod todo;
