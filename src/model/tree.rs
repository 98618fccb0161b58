//! The record tree, stored as an arena of nodes addressed by uuid.
//!
//! Groups reference their children by id; a separate parent index makes
//! cycle checks and path lookups a walk up the parents.  The index is not
//! persisted: it is rebuilt (and the structure validated) on load.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Result, VaultError};

use super::node::{Entry, Group, Node};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TreeRepr", into = "TreeRepr")]
pub struct Tree {
    root: Uuid,
    nodes: BTreeMap<Uuid, Node>,
    parents: BTreeMap<Uuid, Uuid>,
}

/// Serialized form: the root id and a flat node list.
#[derive(Serialize, Deserialize)]
struct TreeRepr {
    root: Uuid,
    nodes: Vec<Node>,
}

impl Tree {
    /// A tree holding only an empty root group.
    pub fn new(root_name: &str, now: DateTime<Utc>) -> Self {
        let root = Group::new(root_name, now);
        let id = root.uuid;
        let mut nodes = BTreeMap::new();
        nodes.insert(id, Node::Group(root));
        Self {
            root: id,
            nodes,
            parents: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> Uuid {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn parent_of(&self, id: Uuid) -> Option<Uuid> {
        self.parents.get(&id).copied()
    }

    pub fn group(&self, id: Uuid) -> Result<&Group> {
        match self.nodes.get(&id) {
            Some(Node::Group(g)) => Ok(g),
            Some(Node::Entry(_)) => Err(VaultError::InvalidOperation(format!(
                "{id} is an entry, not a group"
            ))),
            None => Err(VaultError::NotFound(format!("group {id}"))),
        }
    }

    pub fn group_mut(&mut self, id: Uuid) -> Result<&mut Group> {
        match self.nodes.get_mut(&id) {
            Some(Node::Group(g)) => Ok(g),
            Some(Node::Entry(_)) => Err(VaultError::InvalidOperation(format!(
                "{id} is an entry, not a group"
            ))),
            None => Err(VaultError::NotFound(format!("group {id}"))),
        }
    }

    pub fn entry(&self, id: Uuid) -> Result<&Entry> {
        match self.nodes.get(&id) {
            Some(Node::Entry(e)) => Ok(e),
            _ => Err(VaultError::NotFound(format!("entry {id}"))),
        }
    }

    pub fn entry_mut(&mut self, id: Uuid) -> Result<&mut Entry> {
        match self.nodes.get_mut(&id) {
            Some(Node::Entry(e)) => Ok(e),
            _ => Err(VaultError::NotFound(format!("entry {id}"))),
        }
    }

    /// Insert a new node under `parent` at `index` (appended when `None`
    /// or past the end).  Groups must be inserted empty.
    pub fn insert(&mut self, parent: Uuid, node: Node, index: Option<usize>) -> Result<Uuid> {
        let id = node.uuid();
        if self.nodes.contains_key(&id) {
            return Err(VaultError::InvalidOperation(format!(
                "a node with id {id} already exists"
            )));
        }
        if let Node::Group(g) = &node {
            if !g.children.is_empty() {
                return Err(VaultError::InvalidOperation(
                    "groups must be inserted without children".into(),
                ));
            }
        }

        let group = self.group_mut(parent)?;
        let at = index.unwrap_or(group.children.len()).min(group.children.len());
        group.children.insert(at, id);

        self.nodes.insert(id, node);
        self.parents.insert(id, parent);
        Ok(id)
    }

    /// True if `id` is `ancestor` or lies somewhere below it.
    pub fn is_within(&self, id: Uuid, ancestor: Uuid) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent_of(current);
        }
        false
    }

    /// Re-parent `id` under `new_parent` at `index`.
    ///
    /// Fails with `InvalidOperation` when moving the root or moving a group
    /// into its own subtree; the tree is untouched on any failure.
    pub fn move_node(
        &mut self,
        id: Uuid,
        new_parent: Uuid,
        index: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if id == self.root {
            return Err(VaultError::InvalidOperation(
                "the root group cannot be moved".into(),
            ));
        }
        if !self.nodes.contains_key(&id) {
            return Err(VaultError::NotFound(format!("node {id}")));
        }
        self.group(new_parent)?;
        if self.is_within(new_parent, id) {
            return Err(VaultError::InvalidOperation(format!(
                "cannot move {id} into its own subtree"
            )));
        }

        let old_parent = self
            .parent_of(id)
            .ok_or_else(|| VaultError::Unexpected(format!("node {id} has no parent")))?;
        self.group_mut(old_parent)?.children.retain(|c| *c != id);

        let group = self.group_mut(new_parent)?;
        let at = index.unwrap_or(group.children.len()).min(group.children.len());
        group.children.insert(at, id);
        self.parents.insert(id, new_parent);

        if let Some(node) = self.nodes.get_mut(&id) {
            node.times_mut().touch_location(now);
        }
        Ok(())
    }

    /// Remove a node and, for groups, everything beneath it.  Returns the
    /// number of nodes removed.
    pub fn remove(&mut self, id: Uuid) -> Result<usize> {
        if id == self.root {
            return Err(VaultError::InvalidOperation(
                "the root group cannot be removed".into(),
            ));
        }
        if !self.nodes.contains_key(&id) {
            return Err(VaultError::NotFound(format!("node {id}")));
        }

        let doomed = self.subtree(id);
        if let Some(parent) = self.parent_of(id) {
            self.group_mut(parent)?.children.retain(|c| *c != id);
        }
        for node_id in &doomed {
            self.nodes.remove(node_id);
            self.parents.remove(node_id);
        }
        Ok(doomed.len())
    }

    /// Ids of `id` and all of its descendants, depth-first pre-order.
    pub fn subtree(&self, id: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            match self.nodes.get(&current) {
                Some(Node::Group(g)) => {
                    out.push(current);
                    stack.extend(g.children.iter().rev());
                }
                Some(Node::Entry(_)) => out.push(current),
                None => {}
            }
        }
        out
    }

    /// All entries, depth-first in child order.
    pub fn entries(&self) -> Vec<&Entry> {
        self.subtree(self.root)
            .into_iter()
            .filter_map(|id| self.nodes.get(&id).and_then(Node::as_entry))
            .collect()
    }

    /// All groups including the root, depth-first in child order.
    pub fn groups(&self) -> Vec<&Group> {
        self.subtree(self.root)
            .into_iter()
            .filter_map(|id| self.nodes.get(&id).and_then(Node::as_group))
            .collect()
    }

    /// Every distinct tag used by any entry, sorted.
    pub fn tags(&self) -> BTreeSet<String> {
        self.entries()
            .into_iter()
            .flat_map(|e| e.tags.iter().cloned())
            .collect()
    }

    /// Group names from the root down to the node's own group (for an
    /// entry) or the group itself.
    pub fn path_of(&self, id: Uuid) -> Result<Vec<String>> {
        if !self.nodes.contains_key(&id) {
            return Err(VaultError::NotFound(format!("node {id}")));
        }
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if let Some(Node::Group(g)) = self.nodes.get(&current) {
                names.push(g.name.clone());
            }
            cursor = self.parent_of(current);
        }
        names.reverse();
        Ok(names)
    }

    /// Auto-type sequence for an entry: its own default, else the nearest
    /// ancestor group's override, else `global_default`.  Empty strings
    /// count as unset.
    pub fn effective_autotype_sequence(&self, id: Uuid, global_default: &str) -> Result<String> {
        let entry = self.entry(id)?;
        let own = entry
            .auto_type
            .as_ref()
            .and_then(|a| a.default_sequence.as_deref())
            .filter(|s| !s.is_empty());
        if let Some(seq) = own {
            return Ok(seq.to_string());
        }

        let mut cursor = self.parent_of(id);
        while let Some(group_id) = cursor {
            let inherited = self
                .group(group_id)?
                .default_autotype_sequence
                .as_deref()
                .filter(|s| !s.is_empty());
            if let Some(seq) = inherited {
                return Ok(seq.to_string());
            }
            cursor = self.parent_of(group_id);
        }
        Ok(global_default.to_string())
    }

    /// Find a direct child group of `parent` by name.
    pub fn child_group_named(&self, parent: Uuid, name: &str) -> Option<Uuid> {
        let group = self.group(parent).ok()?;
        group.children.iter().copied().find(|c| {
            matches!(self.nodes.get(c), Some(Node::Group(g)) if g.name == name)
        })
    }
}

impl TryFrom<TreeRepr> for Tree {
    type Error = VaultError;

    fn try_from(repr: TreeRepr) -> Result<Self> {
        let corrupt = |msg: String| VaultError::DatabaseError(format!("corrupted tree: {msg}"));

        let mut nodes = BTreeMap::new();
        for node in repr.nodes {
            let id = node.uuid();
            if nodes.insert(id, node).is_some() {
                return Err(corrupt(format!("duplicate node {id}")));
            }
        }

        match nodes.get(&repr.root) {
            Some(Node::Group(_)) => {}
            Some(Node::Entry(_)) => return Err(corrupt("root is not a group".into())),
            None => return Err(corrupt("root node missing".into())),
        }

        let mut parents = BTreeMap::new();
        for (id, node) in &nodes {
            if let Node::Group(g) = node {
                for child in &g.children {
                    if !nodes.contains_key(child) {
                        return Err(corrupt(format!("group {id} references missing {child}")));
                    }
                    if *child == repr.root || parents.insert(*child, *id).is_some() {
                        return Err(corrupt(format!("node {child} has more than one parent")));
                    }
                }
            }
        }

        let tree = Self {
            root: repr.root,
            nodes,
            parents,
        };
        let reachable = tree.subtree(tree.root).len();
        if reachable != tree.nodes.len() {
            return Err(corrupt(format!(
                "{} node(s) unreachable from the root",
                tree.nodes.len() - reachable
            )));
        }
        Ok(tree)
    }
}

impl From<Tree> for TreeRepr {
    fn from(tree: Tree) -> Self {
        Self {
            root: tree.root,
            nodes: tree.nodes.into_values().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::meta::AutoType;
    use crate::model::node::fields;
    use crate::model::value::Value;

    fn entry(title: &str) -> Node {
        let mut e = Entry::new(Utc::now());
        e.set_field(fields::TITLE, Value::text(title));
        Node::Entry(e)
    }

    fn group(name: &str) -> Node {
        Node::Group(Group::new(name, Utc::now()))
    }

    /// root ─ a ─ b ─ e1
    ///      └ e2
    fn sample() -> (Tree, Uuid, Uuid, Uuid, Uuid) {
        let mut tree = Tree::new("Root", Utc::now());
        let root = tree.root();
        let a = tree.insert(root, group("a"), None).unwrap();
        let b = tree.insert(a, group("b"), None).unwrap();
        let e1 = tree.insert(b, entry("one"), None).unwrap();
        tree.insert(root, entry("two"), None).unwrap();
        (tree, a, b, e1, root)
    }

    #[test]
    fn moving_group_into_descendant_is_rejected() {
        let (mut tree, a, b, _, _) = sample();
        let before = tree.clone();

        let err = tree.move_node(a, b, None, Utc::now()).unwrap_err();
        assert!(matches!(err, VaultError::InvalidOperation(_)));
        let err = tree.move_node(a, a, None, Utc::now()).unwrap_err();
        assert!(matches!(err, VaultError::InvalidOperation(_)));
        assert_eq!(tree, before);
    }

    #[test]
    fn root_cannot_be_moved_or_removed() {
        let (mut tree, a, _, _, root) = sample();
        assert!(matches!(
            tree.move_node(root, a, None, Utc::now()),
            Err(VaultError::InvalidOperation(_))
        ));
        assert!(matches!(
            tree.remove(root),
            Err(VaultError::InvalidOperation(_))
        ));
    }

    #[test]
    fn move_reparents_and_orders() {
        let (mut tree, a, _, e1, root) = sample();
        tree.move_node(e1, root, Some(0), Utc::now()).unwrap();
        assert_eq!(tree.parent_of(e1), Some(root));
        assert_eq!(tree.group(root).unwrap().children[0], e1);
        assert!(!tree.is_within(e1, a));
    }

    #[test]
    fn remove_cascades() {
        let (mut tree, a, b, e1, _) = sample();
        assert_eq!(tree.remove(a).unwrap(), 3);
        assert!(!tree.contains(a));
        assert!(!tree.contains(b));
        assert!(!tree.contains(e1));
        assert_eq!(tree.entries().len(), 1);
        assert!(matches!(tree.remove(a), Err(VaultError::NotFound(_))));
    }

    #[test]
    fn entries_are_depth_first() {
        let (tree, ..) = sample();
        let titles: Vec<_> = tree.entries().iter().map(|e| e.text(fields::TITLE)).collect();
        assert_eq!(titles, vec!["one", "two"]);
    }

    #[test]
    fn path_of_lists_group_names() {
        let (tree, _, _, e1, _) = sample();
        assert_eq!(tree.path_of(e1).unwrap(), vec!["Root", "a", "b"]);
    }

    #[test]
    fn autotype_falls_back_through_groups() {
        let (mut tree, a, _, e1, _) = sample();
        assert_eq!(tree.effective_autotype_sequence(e1, "{GLOBAL}").unwrap(), "{GLOBAL}");

        tree.group_mut(a).unwrap().default_autotype_sequence = Some("{GROUP}".into());
        assert_eq!(tree.effective_autotype_sequence(e1, "{GLOBAL}").unwrap(), "{GROUP}");

        tree.entry_mut(e1).unwrap().auto_type = Some(AutoType {
            default_sequence: Some(String::new()),
            ..AutoType::default()
        });
        assert_eq!(tree.effective_autotype_sequence(e1, "{GLOBAL}").unwrap(), "{GROUP}");

        tree.entry_mut(e1).unwrap().auto_type = Some(AutoType {
            default_sequence: Some("{ENTRY}".into()),
            ..AutoType::default()
        });
        assert_eq!(tree.effective_autotype_sequence(e1, "{GLOBAL}").unwrap(), "{ENTRY}");
    }

    #[test]
    fn serde_roundtrip_rebuilds_parent_index() {
        let (tree, _, b, e1, _) = sample();
        let json = serde_json::to_string(&tree).unwrap();
        let back: Tree = serde_json::from_str(&json).unwrap();
        assert_eq!(back.parent_of(e1), Some(b));
        assert_eq!(back, tree);
    }

    #[test]
    fn dangling_child_is_corruption() {
        let (tree, a, ..) = sample();
        let mut value = serde_json::to_value(&tree).unwrap();
        let missing = Uuid::new_v4().to_string();
        for node in value["nodes"].as_array_mut().unwrap() {
            if node["uuid"] == a.to_string() {
                node["children"].as_array_mut().unwrap().push(missing.clone().into());
            }
        }
        let err = serde_json::from_value::<Tree>(value).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn unreachable_node_is_corruption() {
        let (tree, ..) = sample();
        let mut value = serde_json::to_value(&tree).unwrap();
        let orphan = serde_json::to_value(entry("orphan")).unwrap();
        value["nodes"].as_array_mut().unwrap().push(orphan);
        let err = serde_json::from_value::<Tree>(value).unwrap_err();
        assert!(err.to_string().contains("unreachable"));
    }
}
