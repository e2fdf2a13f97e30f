pub mod config;
pub mod event;
pub mod node;
pub mod task;

pub use config::*;
pub use event::*;
pub use node::*;
pub use task::*;
