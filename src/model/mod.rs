//! Untyped model trees and the path algebra over them.

mod access;
mod diff;
mod node;
mod path;

pub use access::{Assignment, BranchPolicy, Getter, Setter, get, set};
pub use diff::{
    DiffEntry, DiffFrom, DiffOptions, DiffStatus, DiffStrategy, apply, diff, leaf_diff,
    normalized_diff, normalized_leaf_diff,
};
pub use node::{Fields, Node};
pub use path::{Path, Segment};
