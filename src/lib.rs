pub mod cli;
pub mod error;
pub mod io;
pub mod model;
pub mod ops;
pub mod util;

pub use error::TreeError;
pub use model::node::{Identified, Node, NodeId, Path};
pub use ops::filter_bank::{Filter, FilterBank, FilterParams};
pub use ops::main_tree::MainTree;
pub use ops::queue::{MutationQueue, Priority, Request};
pub use ops::tree::{Tree, ViewId};
pub use ops::view::FilteredView;
