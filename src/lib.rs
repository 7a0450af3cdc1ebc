pub mod feedback;
pub mod form;
pub mod model;

pub use model::{Node, Path, diff, get, leaf_diff, normalized_diff, normalized_leaf_diff, set};
