//! Subtree selection of data against a filter tree
//!
//! Several filter branches can select the same instance (for example two
//! unmergeable `artist` nodes that both match). The instance is then returned
//! once with the union of what those branches select.

use crate::filter::FilterNode;
use crate::schema::{SchemaLookup, SchemaPath};
use crate::xml::Element;

/// Select the parts of `data` described by the filter rooted at `root`
///
/// A root without select or containment nodes selects nothing.
pub fn apply_filter<S: SchemaLookup + ?Sized>(
    data: &[Element],
    root: &FilterNode,
    schema: &S,
) -> Vec<Element> {
    let root_path = SchemaPath::root();
    data.iter()
        .filter_map(|element| {
            let qname = element.qname();
            if root.has_select_node(&qname) {
                return Some(element.clone());
            }
            let branches = matching_branches(element, root.children_of_type(&qname), &root_path, schema);
            if branches.is_empty() {
                None
            } else {
                Some(select_content(element, &branches, &root_path.child(qname), schema))
            }
        })
        .collect()
}

/// Filter branches whose match nodes `element` satisfies
///
/// `parent_path` is the schema path of the element's parent. Match nodes on
/// state leaves are not checked against config data and count as satisfied.
pub fn matching_branches<'a, S: SchemaLookup + ?Sized>(
    element: &Element,
    candidates: impl Iterator<Item = &'a FilterNode>,
    parent_path: &SchemaPath,
    schema: &S,
) -> Vec<&'a FilterNode> {
    let path = parent_path.child(element.qname());
    candidates
        .filter(|branch| branch.is_of_type(&element.qname()))
        .filter(|branch| {
            branch.match_nodes().iter().all(|m| {
                let leaf_path = path.child(m.qname());
                !schema.is_config(&leaf_path)
                    || element.child_text(&m.qname()) == Some(m.value.trim())
            })
        })
        .collect()
}

fn select_content<S: SchemaLookup + ?Sized>(
    element: &Element,
    branches: &[&FilterNode],
    path: &SchemaPath,
    schema: &S,
) -> Element {
    if branches.iter().any(|branch| branch.is_select_all()) {
        return element.clone();
    }

    let keys = schema.list_keys(path);
    let mut selected = Element {
        children: Vec::new(),
        text: None,
        ..element.clone()
    };

    for child in &element.children {
        let qname = child.qname();
        let wanted_leaf = keys.contains(&qname)
            || branches
                .iter()
                .any(|b| b.has_match_node(&qname) || b.has_select_node(&qname));
        if wanted_leaf {
            selected.children.push(child.clone());
            continue;
        }
        let nested: Vec<&FilterNode> = branches
            .iter()
            .flat_map(|branch| matching_branches(child, branch.children_of_type(&qname), path, schema))
            .collect();
        if !nested.is_empty() {
            selected
                .children
                .push(select_content(child, &nested, &path.child(qname), schema));
        }
    }
    selected
}
