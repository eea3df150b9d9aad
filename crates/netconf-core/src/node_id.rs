//! Hierarchical node identifiers
//!
//! A [`NodeId`] is the root-to-leaf list of RDNs naming one data node. Each
//! tree level contributes one `container` RDN (the element name) followed by
//! zero or more key RDNs (one per list key, in the order they were given).
//!
//! ```text
//! /library/artist[name='Lenny']/album[name='Greatest']
//!
//!   container=library
//!   container=artist  name=Lenny
//!   container=album   name=Greatest
//! ```
//!
//! Ids are values: appending always yields a new id, so an id handed to
//! another component can never change under it.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{NetconfError, Result};
use crate::schema::NamespaceContext;

/// RDN kind marking an element level (as opposed to a list key)
pub const CONTAINER: &str = "container";

/// One level component of a [`NodeId`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rdn {
    /// `container` or the local name of a list key
    pub rdn_type: String,
    pub namespace: String,
    pub value: String,
}

impl Rdn {
    pub fn new(
        rdn_type: impl Into<String>,
        namespace: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            rdn_type: rdn_type.into(),
            namespace: namespace.into(),
            value: value.into(),
        }
    }

    /// Element level RDN
    pub fn container(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(CONTAINER, namespace, name)
    }

    /// List key RDN
    pub fn key(
        namespace: impl Into<String>,
        key_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::new(key_name, namespace, value)
    }

    pub fn is_container(&self) -> bool {
        self.rdn_type == CONTAINER
    }
}

fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Compare two values, treating purely numeric values as integers
///
/// Every numeric value sorts before every non-numeric one. Numerically equal
/// values with different spellings (`7` and `007`) still order by their text
/// so the ordering stays consistent with equality.
fn compare_values(a: &str, b: &str) -> Ordering {
    match (is_numeric(a), is_numeric(b)) {
        (true, true) => {
            let a_digits = a.trim_start_matches('0');
            let b_digits = b.trim_start_matches('0');
            a_digits
                .len()
                .cmp(&b_digits.len())
                .then_with(|| a_digits.cmp(b_digits))
                .then_with(|| a.cmp(b))
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(b),
    }
}

impl Ord for Rdn {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rdn_type
            .cmp(&other.rdn_type)
            .then_with(|| self.namespace.cmp(&other.namespace))
            .then_with(|| compare_values(&self.value, &other.value))
    }
}

impl PartialOrd for Rdn {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One tree level: the container RDN and the key RDNs that follow it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level<'a> {
    pub container: &'a Rdn,
    pub keys: &'a [Rdn],
}

impl Level<'_> {
    fn key_set(&self) -> BTreeSet<&Rdn> {
        self.keys.iter().collect()
    }
}

/// Ordered path identifier of a data node
///
/// Ordering is level by level with numeric-aware values; a shorter id sorts
/// before any id it is a prefix of. `Option<NodeId>` puts `None` first, which
/// is the ordering used wherever an id may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    rdns: Vec<Rdn>,
}

impl NodeId {
    /// The empty (datastore root) id
    pub fn new() -> Self {
        Self { rdns: Vec::new() }
    }

    pub fn from_rdns(rdns: Vec<Rdn>) -> Self {
        Self { rdns }
    }

    /// Builder-style append used while an id is still being constructed
    pub fn with_rdn(mut self, rdn: Rdn) -> Self {
        self.rdns.push(rdn);
        self
    }

    /// Copy of this id with `rdn` appended
    pub fn append(&self, rdn: Rdn) -> NodeId {
        let mut rdns = Vec::with_capacity(self.rdns.len() + 1);
        rdns.extend(self.rdns.iter().cloned());
        rdns.push(rdn);
        NodeId { rdns }
    }

    /// Copy of this id extended by one element level and its keys
    pub fn child(&self, container: Rdn, keys: impl IntoIterator<Item = Rdn>) -> NodeId {
        let mut id = self.append(container);
        id.rdns.extend(keys);
        id
    }

    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    pub fn len(&self) -> usize {
        self.rdns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    pub fn last_rdn(&self) -> Option<&Rdn> {
        self.rdns.last()
    }

    /// The id of the enclosing element level, `None` at the root
    ///
    /// Trailing key RDNs belong to the last level and go with it.
    pub fn parent(&self) -> Option<NodeId> {
        if self.rdns.is_empty() {
            return None;
        }
        let cut = self
            .rdns
            .iter()
            .rposition(Rdn::is_container)
            .unwrap_or(0);
        Some(NodeId {
            rdns: self.rdns[..cut].to_vec(),
        })
    }

    /// Group RDNs into element levels
    ///
    /// Key RDNs appearing before any container RDN form a level with the
    /// first of them standing in as its container.
    pub fn levels(&self) -> Vec<Level<'_>> {
        let mut levels = Vec::new();
        let mut start = 0;
        while start < self.rdns.len() {
            let mut end = start + 1;
            while end < self.rdns.len() && !self.rdns[end].is_container() {
                end += 1;
            }
            levels.push(Level {
                container: &self.rdns[start],
                keys: &self.rdns[start + 1..end],
            });
            start = end;
        }
        levels
    }

    /// Exact-order prefix match
    pub fn begins_with_template(&self, template: &NodeId) -> bool {
        template.rdns.len() <= self.rdns.len()
            && template
                .rdns
                .iter()
                .zip(self.rdns.iter())
                .all(|(t, s)| t == s)
    }

    /// Prefix match comparing each level's keys as sets
    ///
    /// Every template level except the last must carry exactly this id's key
    /// set; the last template level may name a subset of the keys, so a
    /// template without keys matches every instance of that list.
    pub fn begins_with_template_ignore_key_order(&self, template: &NodeId) -> bool {
        let own = self.levels();
        let wanted = template.levels();
        if wanted.len() > own.len() {
            return false;
        }
        let last = wanted.len().saturating_sub(1);
        wanted.iter().zip(own.iter()).enumerate().all(|(i, (t, s))| {
            if t.container != s.container {
                return false;
            }
            if i == last {
                t.key_set().is_subset(&s.key_set())
            } else {
                t.key_set() == s.key_set()
            }
        })
    }

    /// Same length and equal at every level, ignoring key order
    pub fn matches_template(&self, template: &NodeId) -> bool {
        if self.rdns.len() != template.rdns.len() {
            return false;
        }
        let own = self.levels();
        let wanted = template.levels();
        own.len() == wanted.len()
            && own
                .iter()
                .zip(wanted.iter())
                .all(|(s, t)| s.container == t.container && s.key_set() == t.key_set())
    }

    /// True when `self` is a strict ancestor of `other`
    pub fn is_ancestor_of(&self, other: &NodeId) -> bool {
        self.rdns.len() < other.rdns.len() && other.begins_with_template(self)
    }

    /// Render as `/prefix:name[prefix:key='value']/...`
    pub fn xpath_string<C: NamespaceContext + ?Sized>(&self, ctx: &C) -> String {
        let qualify = |namespace: &str, name: &str| match ctx.prefix_for(namespace) {
            Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, name),
            _ => name.to_string(),
        };
        let mut out = String::new();
        for level in self.levels() {
            out.push('/');
            if level.container.is_container() {
                out.push_str(&qualify(&level.container.namespace, &level.container.value));
            } else {
                out.push_str(&qualify(
                    &level.container.namespace,
                    &level.container.rdn_type,
                ));
            }
            for key in level.keys {
                let quote = if key.value.contains('\'') { '"' } else { '\'' };
                out.push('[');
                out.push_str(&qualify(&key.namespace, &key.rdn_type));
                out.push('=');
                out.push(quote);
                out.push_str(&key.value);
                out.push(quote);
                out.push(']');
            }
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }

    /// Flat reversible form: `/ns=kind=value` per RDN, with `\`, `/` and `=`
    /// escaped inside each field
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for rdn in &self.rdns {
            out.push('/');
            escape_into(&rdn.namespace, &mut out);
            out.push('=');
            escape_into(&rdn.rdn_type, &mut out);
            out.push('=');
            escape_into(&rdn.value, &mut out);
        }
        out
    }

    /// Inverse of [`NodeId::encode`]
    ///
    /// # Errors
    ///
    /// Returns `InvalidNodeId` if the input is not a well-formed encoding.
    pub fn decode(input: &str) -> Result<NodeId> {
        let invalid = |reason: &str| NetconfError::InvalidNodeId {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        if input.is_empty() {
            return Ok(NodeId::new());
        }
        if !input.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let mut rdns = Vec::new();
        let mut fields: Vec<String> = Vec::with_capacity(3);
        let mut field = String::new();
        let mut chars = input[1..].chars();

        let finish_segment = |fields: &mut Vec<String>,
                              field: &mut String,
                              rdns: &mut Vec<Rdn>|
         -> Result<()> {
            fields.push(std::mem::take(field));
            if fields.len() != 3 {
                return Err(invalid("each segment needs namespace=kind=value"));
            }
            let value = fields.pop().unwrap_or_default();
            let rdn_type = fields.pop().unwrap_or_default();
            let namespace = fields.pop().unwrap_or_default();
            rdns.push(Rdn::new(rdn_type, namespace, value));
            Ok(())
        };

        while let Some(ch) = chars.next() {
            match ch {
                '\\' => match chars.next() {
                    Some(escaped @ ('\\' | '/' | '=')) => field.push(escaped),
                    Some(_) => return Err(invalid("unknown escape sequence")),
                    None => return Err(invalid("dangling escape")),
                },
                '=' => fields.push(std::mem::take(&mut field)),
                '/' => finish_segment(&mut fields, &mut field, &mut rdns)?,
                other => field.push(other),
            }
        }
        finish_segment(&mut fields, &mut field, &mut rdns)?;

        Ok(NodeId { rdns })
    }
}

fn escape_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        if matches!(ch, '\\' | '/' | '=') {
            out.push('\\');
        }
        out.push(ch);
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.rdns.iter().zip(other.rdns.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                non_eq => return non_eq,
            }
        }
        self.rdns.len().cmp(&other.rdns.len())
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for NodeId {
    type Err = NetconfError;

    fn from_str(s: &str) -> Result<Self> {
        NodeId::decode(s)
    }
}
