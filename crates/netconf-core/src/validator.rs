//! Post-edit validation
//!
//! After an edit is applied the validator sees the resulting tree. It either
//! rejects the edit (the datastore rolls back) or accepts it, possibly asking
//! for further edits that the change implies (default values, cleanup of
//! dangling references). Implied edits are applied in the same transaction
//! and reported to subsystems with the `implied` flag set.

use netconf_core_types::ClientInfo;

use crate::aggregator::Aggregator;
use crate::edit::{EditConfigRequest, EditContainmentNode};
use crate::errors::RpcError;

pub trait Validator: Send + Sync {
    /// Check the tree after `applied` took effect
    ///
    /// # Errors
    ///
    /// The RPC error that rejects the edit.
    fn validate(
        &self,
        tree: &dyn Aggregator,
        applied: &[EditContainmentNode],
        request: &EditConfigRequest,
        client: &ClientInfo,
    ) -> Result<Vec<EditConfigRequest>, RpcError>;
}

/// Accepts every edit and implies nothing
///
/// # Example
/// ```
/// use netconf_core::validator::{NoopValidator, Validator};
/// use netconf_core::edit::EditConfigRequest;
/// use netconf_core::core_types::ClientInfo;
/// # use netconf_core::aggregator::Aggregator;
/// # use netconf_core::edit::EditContainmentNode;
/// # use netconf_core::filter::FilterNode;
/// # use netconf_core::xml::Element;
/// # struct Empty;
/// # impl Aggregator for Empty {
/// #     fn edit_config(&mut self, _: &EditConfigRequest) -> netconf_core::Result<Vec<EditContainmentNode>> { Ok(vec![]) }
/// #     fn get_config(&self, _: Option<&FilterNode>) -> netconf_core::Result<Vec<Element>> { Ok(vec![]) }
/// #     fn replace_all(&mut self, _: Vec<Element>) -> netconf_core::Result<()> { Ok(()) }
/// # }
///
/// let request = EditConfigRequest::new("running", vec![]);
/// let implied = NoopValidator
///     .validate(&Empty, &[], &request, &ClientInfo::new(1, "admin"))
///     .unwrap();
/// assert!(implied.is_empty());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

impl Validator for NoopValidator {
    fn validate(
        &self,
        _tree: &dyn Aggregator,
        _applied: &[EditContainmentNode],
        _request: &EditConfigRequest,
        _client: &ClientInfo,
    ) -> Result<Vec<EditConfigRequest>, RpcError> {
        Ok(Vec::new())
    }
}
