//! Storage seam behind a datastore
//!
//! The datastore orchestrates locking, validation and notification; the
//! aggregator owns the actual config tree. Edits are all-or-nothing at this
//! level: a failed `edit_config` leaves the tree as it was.

use crate::edit::{EditConfigRequest, EditContainmentNode};
use crate::errors::Result;
use crate::filter::FilterNode;
use crate::xml::Element;

pub trait Aggregator: Send + Sync {
    /// Apply an edit and return the edit trees as they took effect
    ///
    /// Nodes that turned out to be no-ops (a `remove` of absent data) are
    /// left out of the returned trees.
    ///
    /// # Errors
    ///
    /// Edit-model errors such as `DataExists`, `DataMissing` or
    /// `DuplicateSibling`.
    fn edit_config(&mut self, request: &EditConfigRequest) -> Result<Vec<EditContainmentNode>>;

    /// Current config, optionally narrowed by a filter tree
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn get_config(&self, filter: Option<&FilterNode>) -> Result<Vec<Element>>;

    /// Replace the whole tree, used to roll back
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn replace_all(&mut self, content: Vec<Element>) -> Result<()>;
}
