pub mod check;
pub mod filter_bank;
pub mod main_tree;
pub mod queue;
pub mod task_filters;
pub mod tree;
pub mod view;
