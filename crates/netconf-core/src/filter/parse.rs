//! Filter XML ↔ filter tree
//!
//! Classification of each element below a top-level filter element:
//!
//! | element                  | becomes          |
//! |--------------------------|------------------|
//! | has element children     | containment node |
//! | leaf with text           | match node       |
//! | empty leaf               | select node      |

use std::collections::BTreeMap;

use crate::errors::{NetconfError, Result};
use crate::filter::{FilterMatchNode, FilterNode};
use crate::schema::NamespaceContext;
use crate::xml::{Element, NETCONF_BASE_NS};

type PrefixScope = BTreeMap<String, String>;

/// Parse filter fragments into a fresh root
///
/// Accepts either the top-level filter elements or the enclosing
/// `<filter>` element itself.
///
/// # Errors
///
/// `MalformedFilter` for mixed content, an unresolvable prefix, a top-level
/// element without a namespace, or a content match at the top level.
pub fn parse<C: NamespaceContext + ?Sized>(fragments: &[Element], ctx: &C) -> Result<FilterNode> {
    let mut root = FilterNode::root();
    for fragment in fragments {
        if fragment.is(NETCONF_BASE_NS, "filter") {
            for inner in &fragment.children {
                add_top_level(&mut root, inner, ctx)?;
            }
        } else {
            add_top_level(&mut root, fragment, ctx)?;
        }
    }
    Ok(root)
}

/// Parse each fragment and merge it into `root`
///
/// The resulting tree is the same whatever order the fragments come in.
///
/// # Errors
///
/// Any error [`parse`] reports.
pub fn build_merged_filter<C: NamespaceContext + ?Sized>(
    root: &mut FilterNode,
    fragments: &[Element],
    ctx: &C,
) -> Result<()> {
    for fragment in fragments {
        let parsed = parse(std::slice::from_ref(fragment), ctx)?;
        root.merge(parsed)?;
    }
    Ok(())
}

fn add_top_level<C: NamespaceContext + ?Sized>(
    root: &mut FilterNode,
    element: &Element,
    ctx: &C,
) -> Result<()> {
    if element.is_leaf() && element.text_content().is_some() {
        return Err(NetconfError::MalformedFilter {
            reason: format!("content match <{}> at top level", element.name),
        });
    }
    add_element(root, element, None, &PrefixScope::new(), ctx)
}

fn add_element<C: NamespaceContext + ?Sized>(
    parent: &mut FilterNode,
    element: &Element,
    inherited: Option<&str>,
    scope: &PrefixScope,
    ctx: &C,
) -> Result<()> {
    let mut scope = scope.clone();
    let declarations: Vec<(String, String)> = element
        .attributes
        .iter()
        .filter(|attr| attr.is_namespace_declaration())
        .map(|attr| (attr.name.clone(), attr.value.clone()))
        .collect();
    for (name, value) in &declarations {
        if let Some(prefix) = name.strip_prefix("xmlns:") {
            scope.insert(prefix.to_string(), value.clone());
        }
    }

    let namespace = resolve_namespace(element, inherited, &scope, ctx)?;

    if !element.children.is_empty() {
        if element.text_content().is_some() {
            return Err(NetconfError::MalformedFilter {
                reason: format!("mixed content in <{}>", element.name),
            });
        }
        let mut node = FilterNode::new(namespace.clone(), element.name.clone());
        for (name, value) in declarations {
            node.add_attribute(name, value);
        }
        for child in &element.children {
            add_element(&mut node, child, Some(&namespace), &scope, ctx)?;
        }
        parent.add_or_merge_child(node);
    } else if let Some(text) = element.text_content() {
        parent.add_match_node(FilterMatchNode::new(namespace, element.name.clone(), text));
    } else {
        parent.add_select_node(FilterNode::new(namespace, element.name.clone()));
    }
    Ok(())
}

fn resolve_namespace<C: NamespaceContext + ?Sized>(
    element: &Element,
    inherited: Option<&str>,
    scope: &PrefixScope,
    ctx: &C,
) -> Result<String> {
    if let Some(namespace) = element.namespace.as_deref().filter(|ns| !ns.is_empty()) {
        return Ok(namespace.to_string());
    }
    if let Some(prefix) = element.prefix.as_deref() {
        return scope
            .get(prefix)
            .cloned()
            .or_else(|| ctx.namespace_for(prefix))
            .ok_or_else(|| NetconfError::MalformedFilter {
                reason: format!("unknown prefix '{}' on <{}>", prefix, element.name),
            });
    }
    inherited
        .map(str::to_string)
        .ok_or_else(|| NetconfError::MalformedFilter {
            reason: format!("top-level element <{}> has no namespace", element.name),
        })
}

/// Render a filter tree back to XML
///
/// The root renders as a `<filter type="subtree">` wrapper; any other node
/// renders as itself. Prefixes come from `ctx`.
pub fn filter_to_xml<C: NamespaceContext + ?Sized>(node: &FilterNode, ctx: &C) -> Element {
    if node.is_root() {
        return Element::new(NETCONF_BASE_NS, "filter")
            .with_attribute(None, "type", "subtree")
            .with_children(node.select_nodes().iter().map(|s| render(s, ctx)))
            .with_children(node.child_nodes().iter().map(|c| render(c, ctx)));
    }
    render(node, ctx)
}

fn qualified<C: NamespaceContext + ?Sized>(namespace: &str, name: &str, ctx: &C) -> Element {
    let element = Element::new(namespace, name);
    match ctx.prefix_for(namespace) {
        Some(prefix) => element.with_prefix(prefix),
        None => element,
    }
}

fn render<C: NamespaceContext + ?Sized>(node: &FilterNode, ctx: &C) -> Element {
    let mut element = qualified(node.namespace(), node.node_name(), ctx);
    for (name, value) in node.attributes() {
        element = element.with_attribute(None, name.clone(), value.clone());
    }
    element
        .with_children(node.match_nodes().iter().map(|m| {
            qualified(&m.namespace, &m.node_name, ctx).with_text(m.value.clone())
        }))
        .with_children(
            node.select_nodes()
                .iter()
                .map(|s| qualified(s.namespace(), s.node_name(), ctx)),
        )
        .with_children(node.child_nodes().iter().map(|c| render(c, ctx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StaticSchema;

    const NS: &str = "urn:example:jukebox";

    fn ctx() -> StaticSchema {
        StaticSchema::new().with_prefix("jbox", NS)
    }

    fn lenny_albums() -> Element {
        Element::new(NS, "library").with_child(
            Element::unqualified("artist")
                .with_child(Element::unqualified("name").with_text("Lenny"))
                .with_child(Element::unqualified("album")),
        )
    }

    #[test]
    fn test_parse_classifies_elements() {
        let root = parse(&[lenny_albums()], &ctx()).unwrap();

        let library = &root.child_nodes()[0];
        assert_eq!(library.node_name(), "library");
        let artist = &library.child_nodes()[0];
        assert_eq!(artist.namespace(), NS);
        assert_eq!(artist.match_nodes()[0].value, "Lenny");
        assert_eq!(artist.select_nodes()[0].node_name(), "album");
    }

    #[test]
    fn test_parse_resolves_prefix_through_context() {
        let fragment = Element::unqualified("library").with_prefix("jbox");
        let root = parse(&[fragment], &ctx()).unwrap();
        assert_eq!(root.select_nodes()[0].namespace(), NS);
    }

    #[test]
    fn test_parse_resolves_prefix_from_local_declaration() {
        let fragment = Element::unqualified("library")
            .with_prefix("x")
            .with_attribute(None, "xmlns:x", "urn:other")
            .with_child(Element::unqualified("artist").with_prefix("x"));
        let root = parse(&[fragment], &StaticSchema::new()).unwrap();
        let library = &root.child_nodes()[0];
        assert_eq!(library.namespace(), "urn:other");
        assert_eq!(library.attributes().get("xmlns:x").map(String::as_str), Some("urn:other"));
    }

    #[test]
    fn test_parse_rejects_unknown_prefix() {
        let fragment = Element::unqualified("library").with_prefix("nope");
        let err = parse(&[fragment], &ctx()).unwrap_err();
        assert!(matches!(err, NetconfError::MalformedFilter { .. }));
    }

    #[test]
    fn test_parse_rejects_mixed_content() {
        let fragment = Element::new(NS, "library")
            .with_text("oops")
            .with_child(Element::new(NS, "artist"));
        let err = parse(&[fragment], &ctx()).unwrap_err();
        assert!(matches!(err, NetconfError::MalformedFilter { .. }));
    }

    #[test]
    fn test_parse_unwraps_filter_element() {
        let wrapped = Element::new(NETCONF_BASE_NS, "filter").with_child(lenny_albums());
        assert_eq!(
            parse(&[wrapped], &ctx()).unwrap(),
            parse(&[lenny_albums()], &ctx()).unwrap()
        );
    }

    #[test]
    fn test_build_merged_filter_folds_fragments() {
        let genre = Element::new(NS, "library").with_child(
            Element::new(NS, "artist")
                .with_child(Element::leaf(NS, "name", "Lenny"))
                .with_child(Element::new(NS, "genre")),
        );
        let mut root = FilterNode::root();
        build_merged_filter(&mut root, &[lenny_albums(), genre], &ctx()).unwrap();

        assert_eq!(root.child_nodes().len(), 1);
        let artist = &root.child_nodes()[0].child_nodes()[0];
        assert_eq!(artist.select_nodes().len(), 2);
    }

    #[test]
    fn test_filter_to_xml_reparses_to_same_tree() {
        let root = parse(&[lenny_albums()], &ctx()).unwrap();
        let xml = filter_to_xml(&root, &ctx());
        assert!(xml.is(NETCONF_BASE_NS, "filter"));
        assert_eq!(xml.children[0].prefix.as_deref(), Some("jbox"));
        assert_eq!(parse(&[xml], &ctx()).unwrap(), root);
    }
}
