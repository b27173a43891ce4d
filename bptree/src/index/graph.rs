//! Graphviz export of the tree shape.
//!
//! Leaves are green HTML tables named `LEAF_<id>`, internal nodes pink tables
//! named `INT_<id>` with one port per child. Parent edges leave through the
//! child's port; `next` edges join consecutive leaves on the same rank.

use std::fmt::{self, Display, Formatter};

use crate::index::node::{Node, NodeId};
use crate::index::tree::BPlusTree;

const LEAF_PREFIX: &str = "LEAF_";
const INTERNAL_PREFIX: &str = "INT_";
const TABLE_OPEN: &str =
    r#"<<TABLE BORDER="0" CELLBORDER="1" CELLSPACING="0" CELLPADDING="4">"#;

/// Display adapter rendering a tree as a `digraph`.
pub struct Dot<'a, K, V> {
    tree: &'a BPlusTree<K, V>,
}

impl<K: Ord + Clone + Display, V> BPlusTree<K, V> {
    /// Graphviz description of the tree, for debugging.
    #[must_use]
    pub const fn dot(&self) -> Dot<'_, K, V> {
        Dot { tree: self }
    }

    #[must_use]
    pub fn to_dot(&self) -> String {
        self.dot().to_string()
    }
}

impl<K: Ord + Clone + Display, V> Display for Dot<'_, K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "digraph G {{")?;
        if let Some(root) = self.tree.root_id() {
            self.write_node(f, root)?;
        }
        writeln!(f, "}}")
    }
}

impl<K: Ord + Clone + Display, V> Dot<'_, K, V> {
    fn write_node(&self, f: &mut Formatter<'_>, id: NodeId) -> fmt::Result {
        let Some(node) = self.tree.node(id) else {
            return Ok(());
        };
        let (prefix, color) = match node {
            Node::Leaf(_) => (LEAF_PREFIX, "green"),
            Node::Internal(_) => (INTERNAL_PREFIX, "pink"),
        };

        let span = node.len();
        writeln!(f, "{prefix}{id}[shape=plain color={color} label={TABLE_OPEN}")?;
        writeln!(f, r#"<TR><TD COLSPAN="{span}">P={id}</TD></TR>"#)?;
        writeln!(
            f,
            r#"<TR><TD COLSPAN="{span}">max_size={},min_size={}</TD></TR>"#,
            node.max_size(),
            node.min_size()
        )?;
        write!(f, "<TR>")?;

        match node {
            Node::Leaf(leaf) => {
                for entry in leaf.entries() {
                    writeln!(f, "<TD>{}</TD>", entry.key)?;
                }
            }
            Node::Internal(internal) => {
                for (i, child) in internal.children().iter().enumerate() {
                    match internal.separator(i) {
                        Some(key) => writeln!(f, r#"<TD PORT="p{child}">{key}</TD>"#)?,
                        None => writeln!(f, r#"<TD PORT="p{child}"> </TD>"#)?,
                    }
                }
            }
        }
        writeln!(f, "</TR></TABLE>>];")?;

        if let Some(parent) = node.parent() {
            writeln!(f, "{INTERNAL_PREFIX}{parent}:p{id} -> {prefix}{id};")?;
        }

        match node {
            Node::Leaf(leaf) => {
                if let Some(next) = leaf.next() {
                    writeln!(f, "{LEAF_PREFIX}{id} -> {LEAF_PREFIX}{next};")?;
                    writeln!(f, "{{rank=same {LEAF_PREFIX}{id} {LEAF_PREFIX}{next}}};")?;
                }
            }
            Node::Internal(internal) => {
                let mut previous: Option<NodeId> = None;
                for &child in internal.children() {
                    self.write_node(f, child)?;
                    let child_is_internal =
                        self.tree.node(child).is_some_and(|node| !node.is_leaf());
                    if let Some(previous) = previous.filter(|_| child_is_internal) {
                        writeln!(
                            f,
                            "{{rank=same {INTERNAL_PREFIX}{previous} {INTERNAL_PREFIX}{child}}};"
                        )?;
                    }
                    previous = Some(child);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::TreeConfig;
    use crate::index::iter::LeafRef;
    use crate::index::node::Node;
    use crate::index::tree::BPlusTree;

    #[test]
    fn test_empty_tree_graph() {
        let tree: BPlusTree<i64, String> = BPlusTree::new();
        assert_eq!(tree.to_dot(), "digraph G {\n}\n");
    }

    #[test]
    fn test_single_leaf_graph() {
        let mut tree = BPlusTree::new();
        tree.insert(7, "seven").expect("insert");
        tree.insert(3, "three").expect("insert");

        let root = tree.root_id().expect("root");
        let dot = tree.to_dot();

        assert!(dot.starts_with("digraph G {\n"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains(&format!("LEAF_{root}[shape=plain color=green")));
        assert!(dot.contains(&format!(r#"<TR><TD COLSPAN="2">P={root}</TD></TR>"#)));
        assert!(dot.contains("max_size=255,min_size=127"));
        assert!(dot.find("<TD>3</TD>") < dot.find("<TD>7</TD>"));
        assert!(!dot.contains("->"));
    }

    #[test]
    fn test_internal_node_graph() {
        let mut tree = BPlusTree::with_config(TreeConfig::new(3, 3)).expect("config");
        for key in [1, 5, 12, 18] {
            tree.insert(key, ()).expect("insert");
        }

        let dot = tree.to_dot();
        let root = tree.root_id().expect("root");
        let root_node = tree
            .node(root)
            .and_then(Node::as_internal)
            .expect("internal root");
        let left = root_node.children()[0];
        let right = root_node.children()[1];

        assert!(dot.contains(&format!("INT_{root}[shape=plain color=pink")));
        assert!(dot.contains(&format!(r#"<TD PORT="p{left}"> </TD>"#)));
        assert!(dot.contains(&format!(r#"<TD PORT="p{right}">5</TD>"#)));
        assert!(dot.contains(&format!("INT_{root}:p{left} -> INT_{left};")));
        assert!(dot.contains(&format!("{{rank=same INT_{left} INT_{right}}};")));

        let leaves: Vec<_> = tree.leaves().map(LeafRef::id).collect();
        assert_eq!(leaves.len(), 3);
        assert!(dot.contains(&format!("LEAF_{} -> LEAF_{};", leaves[0], leaves[1])));
        assert_eq!(dot.matches("color=green").count(), 3);
    }
}
