//! In-memory bookmark tree.
//!
//! Nodes live in an arena owned by [`Tree`]. A folder owns the ordered list of
//! its children's handles; every slot also records its parent handle so a node
//! can be detached or walked upwards without searching. Handles carry a
//! generation, so a [`NodeRef`] kept across a `remove` stops resolving instead
//! of pointing at whatever reused the slot.

mod builder;
mod ops;

pub use ops::{NewBookmark, NewFolder, Selector};

use crate::wire::{BookmarkRecord, FolderRecord, Item};
use std::collections::VecDeque;

/// Identifier of the synthetic root folder. Never serialized.
pub const ROOT_ID: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: i64,
    pub title: Option<String>,
    children: Vec<NodeRef>,
}

impl Folder {
    pub fn children(&self) -> &[NodeRef] {
        &self.children
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Bookmark(Bookmark),
    Folder(Folder),
}

impl Node {
    pub fn id(&self) -> i64 {
        match self {
            Node::Bookmark(b) => b.id,
            Node::Folder(f) => f.id,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            Node::Bookmark(b) => b.title.as_deref(),
            Node::Folder(f) => f.title.as_deref(),
        }
    }

    pub fn as_bookmark(&self) -> Option<&Bookmark> {
        match self {
            Node::Bookmark(b) => Some(b),
            Node::Folder(_) => None,
        }
    }

    pub fn as_folder(&self) -> Option<&Folder> {
        match self {
            Node::Folder(f) => Some(f),
            Node::Bookmark(_) => None,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Node::Folder(_))
    }
}

#[derive(Debug, Clone)]
struct Entry {
    node: Node,
    parent: Option<NodeRef>,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

#[derive(Debug, Clone)]
pub struct Tree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeRef,
    live: usize,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Empty tree holding only the synthetic root.
    pub fn new() -> Self {
        let mut tree = Tree {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeRef { index: 0, generation: 0 },
            live: 0,
        };
        tree.root = tree.alloc(Node::Folder(Folder { id: ROOT_ID, title: None, children: Vec::new() }));
        tree
    }

    pub fn root(&self) -> NodeRef {
        self.root
    }

    pub fn get(&self, node: NodeRef) -> Option<&Node> {
        self.entry(node).map(|e| &e.node)
    }

    pub fn contains(&self, node: NodeRef) -> bool {
        self.entry(node).is_some()
    }

    pub fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        self.entry(node).and_then(|e| e.parent)
    }

    /// Children of a folder in display order; empty for bookmarks and stale handles.
    pub fn children(&self, node: NodeRef) -> &[NodeRef] {
        match self.get(node) {
            Some(Node::Folder(f)) => &f.children,
            _ => &[],
        }
    }

    /// Number of nodes, not counting the root.
    pub fn len(&self) -> usize {
        self.live - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Breadth-first walk starting at the root (root included).
    pub fn bfs(&self) -> Bfs<'_> {
        Bfs { tree: self, queue: VecDeque::from([self.root]) }
    }

    /// Parent, grandparent, ... up to and including the root.
    pub fn ancestors(&self, node: NodeRef) -> Ancestors<'_> {
        Ancestors { tree: self, next: self.parent(node) }
    }

    /// Levels below the root: top-level nodes are 1, the root 0.
    pub fn depth(&self, node: NodeRef) -> usize {
        self.ancestors(node).count()
    }

    /// Folder titles from the top level down to the node's parent.
    /// The root is left out; untitled folders show up as "".
    pub fn path_titles(&self, node: NodeRef) -> Vec<&str> {
        let mut path: Vec<&str> = self
            .ancestors(node)
            .filter(|a| *a != self.root)
            .map(|a| self.get(a).and_then(Node::title).unwrap_or(""))
            .collect();
        path.reverse();
        path
    }

    // ── serialization ──

    /// External representation: the root's children.
    pub fn to_external(&self) -> Vec<Item> {
        self.children(self.root).iter().filter_map(|c| self.export(*c)).collect()
    }

    /// Owned copy of one subtree in wire form.
    pub fn export(&self, node: NodeRef) -> Option<Item> {
        Some(match self.get(node)? {
            Node::Bookmark(b) => Item::Bookmark(BookmarkRecord {
                id: b.id,
                title: b.title.clone(),
                description: b.description.clone(),
                url: b.url.clone(),
                tags: b.tags.clone(),
            }),
            Node::Folder(f) => Item::Folder(FolderRecord {
                id: f.id,
                title: f.title.clone(),
                children: f.children.iter().filter_map(|c| self.export(*c)).collect(),
            }),
        })
    }

    // ── arena internals ──

    fn entry(&self, node: NodeRef) -> Option<&Entry> {
        self.slots
            .get(node.index as usize)
            .filter(|s| s.generation == node.generation)
            .and_then(|s| s.entry.as_ref())
    }

    fn entry_mut(&mut self, node: NodeRef) -> Option<&mut Entry> {
        self.slots
            .get_mut(node.index as usize)
            .filter(|s| s.generation == node.generation)
            .and_then(|s| s.entry.as_mut())
    }

    fn folder_mut(&mut self, node: NodeRef) -> Option<&mut Folder> {
        match self.entry_mut(node) {
            Some(Entry { node: Node::Folder(f), .. }) => Some(f),
            _ => None,
        }
    }

    /// Store a detached node and hand out its handle.
    fn alloc(&mut self, node: Node) -> NodeRef {
        let entry = Entry { node, parent: None };
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            NodeRef { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, entry: Some(entry) });
            NodeRef { index, generation: 0 }
        }
    }

    /// Insert `child` into `parent` at `index` (clamped to the end).
    /// `child` must be detached and `parent` a live folder.
    fn insert_child(&mut self, parent: NodeRef, index: usize, child: NodeRef) {
        if let Some(folder) = self.folder_mut(parent) {
            let index = index.min(folder.children.len());
            folder.children.insert(index, child);
            if let Some(entry) = self.entry_mut(child) {
                entry.parent = Some(parent);
            }
        }
    }

    fn push_child(&mut self, parent: NodeRef, child: NodeRef) {
        self.insert_child(parent, usize::MAX, child);
    }

    /// Unlink a node from its parent's child list. The subtree stays allocated.
    fn detach(&mut self, node: NodeRef) {
        let Some(parent) = self.entry_mut(node).and_then(|e| e.parent.take()) else {
            return;
        };
        if let Some(folder) = self.folder_mut(parent) {
            folder.children.retain(|c| *c != node);
        }
    }

    /// Free a detached subtree's slots, returning its contents.
    fn release(&mut self, node: NodeRef) -> Option<Item> {
        let item = self.export(node)?;
        let mut queue = VecDeque::from([node]);
        while let Some(current) = queue.pop_front() {
            queue.extend(self.children(current).iter().copied());
            let slot = &mut self.slots[current.index as usize];
            slot.entry = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(current.index);
            self.live -= 1;
        }
        Some(item)
    }
}

pub struct Bfs<'a> {
    tree: &'a Tree,
    queue: VecDeque<NodeRef>,
}

impl Iterator for Bfs<'_> {
    type Item = NodeRef;

    fn next(&mut self) -> Option<NodeRef> {
        let node = self.queue.pop_front()?;
        self.queue.extend(self.tree.children(node).iter().copied());
        Some(node)
    }
}

pub struct Ancestors<'a> {
    tree: &'a Tree,
    next: Option<NodeRef>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeRef;

    fn next(&mut self) -> Option<NodeRef> {
        let node = self.next?;
        self.next = self.tree.parent(node);
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire;
    use proptest::prelude::*;
    use serde_json::json;

    pub(crate) fn tree_from(value: serde_json::Value) -> Tree {
        Tree::build(wire::validate(&value).unwrap()).unwrap()
    }

    #[test]
    fn empty_tree() {
        let tree = Tree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.get(tree.root()).unwrap().id(), ROOT_ID);
        assert_eq!(tree.to_external(), vec![]);
    }

    #[test]
    fn parent_links_agree_with_children() {
        let tree = tree_from(json!([
            { "id": 1, "url": "1url" },
            { "id": 2, "children": [{ "id": 21, "url": "21url" }, { "id": 22, "children": [] }] }
        ]));
        for node in tree.bfs() {
            for child in tree.children(node) {
                assert_eq!(tree.parent(*child), Some(node));
            }
        }
        assert_eq!(tree.parent(tree.root()), None);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn ancestors_and_path() {
        let tree = tree_from(json!([
            { "id": 1, "title": "Dev", "children": [
                { "id": 2, "children": [
                    { "id": 3, "url": "https://rust-lang.org" }
                ]}
            ]}
        ]));
        let bm = tree.find_by_id(3).unwrap();
        let ids: Vec<i64> = tree.ancestors(bm).map(|a| tree.get(a).unwrap().id()).collect();
        assert_eq!(ids, vec![2, 1, ROOT_ID]);
        assert_eq!(tree.path_titles(bm), vec!["Dev", ""]);
        assert_eq!(tree.depth(bm), 3);
        assert_eq!(tree.depth(tree.root()), 0);
    }

    #[test]
    fn stale_handle_after_remove() {
        let mut tree = tree_from(json!([{ "id": 1, "url": "a" }, { "id": 2, "url": "b" }]));
        let first = tree.find_by_id(1).unwrap();
        tree.remove(first).unwrap();
        assert!(!tree.contains(first));

        // the freed slot is reused, the old handle must not see the new node
        tree.add_folder(NewFolder::default(), tree.root()).unwrap();
        assert!(tree.get(first).is_none());
        assert_eq!(tree.len(), 2);
    }

    // ── properties ──

    #[derive(Debug, Clone)]
    enum Shape {
        Leaf(Option<String>, Option<String>, Vec<String>),
        Branch(Option<String>, Vec<Shape>),
    }

    fn shape() -> impl Strategy<Value = Shape> {
        let leaf = (
            proptest::option::of("[a-z ]{0,6}"),
            proptest::option::of("[a-z]{0,6}"),
            proptest::collection::vec("[a-z]{1,4}", 0..3),
        )
            .prop_map(|(title, desc, tags)| Shape::Leaf(title, desc, tags));
        leaf.prop_recursive(4, 48, 6, |inner| {
            (proptest::option::of("[a-z ]{0,6}"), proptest::collection::vec(inner, 0..6))
                .prop_map(|(title, children)| Shape::Branch(title, children))
        })
    }

    fn assign_ids(shapes: Vec<Shape>, next: &mut i64) -> Vec<Item> {
        shapes
            .into_iter()
            .map(|s| {
                *next += 1;
                let id = *next;
                match s {
                    Shape::Leaf(title, description, tags) => Item::Bookmark(BookmarkRecord {
                        id,
                        title,
                        description,
                        url: format!("https://example.org/{}", id),
                        tags,
                    }),
                    Shape::Branch(title, children) => Item::Folder(FolderRecord {
                        id,
                        title,
                        children: assign_ids(children, next),
                    }),
                }
            })
            .collect()
    }

    fn arb_items() -> impl Strategy<Value = Vec<Item>> {
        (proptest::collection::vec(shape(), 0..6), 0i64..1000).prop_map(|(shapes, start)| {
            let mut next = start;
            assign_ids(shapes, &mut next)
        })
    }

    fn max_id(items: &[Item]) -> i64 {
        items
            .iter()
            .map(|i| match i {
                Item::Bookmark(b) => b.id,
                Item::Folder(f) => f.id.max(max_id(&f.children)),
            })
            .max()
            .unwrap_or(ROOT_ID)
    }

    proptest! {
        #[test]
        fn build_then_serialize_is_identity(items in arb_items()) {
            let tree = Tree::build(items.clone()).unwrap();
            prop_assert_eq!(tree.to_external(), items);
        }

        #[test]
        fn json_roundtrip_through_validator(items in arb_items()) {
            let json = wire::to_json(&items).unwrap();
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            let tree = Tree::build(wire::validate(&value).unwrap()).unwrap();
            prop_assert_eq!(wire::to_json(&tree.to_external()).unwrap(), json);
        }

        #[test]
        fn next_identifier_is_max_plus_one(items in arb_items()) {
            let expected = Some(max_id(&items) + 1);
            let tree = Tree::build(items).unwrap();
            prop_assert_eq!(tree.next_identifier(), expected);
        }

        #[test]
        fn move_preserves_count_and_subtree(items in arb_items(), a in any::<prop::sample::Index>(), b in any::<prop::sample::Index>()) {
            let mut tree = Tree::build(items).unwrap();
            let nodes: Vec<NodeRef> = tree.bfs().skip(1).collect();
            prop_assume!(!nodes.is_empty());
            let folders: Vec<NodeRef> = tree.bfs().filter(|n| tree.get(*n).unwrap().is_folder()).collect();

            let source = nodes[a.index(nodes.len())];
            let dest = folders[b.index(folders.len())];
            let before_len = tree.len();
            let before_subtree = tree.export(source);

            match tree.move_node(source, dest) {
                Ok(_) => {
                    prop_assert_eq!(tree.parent(source), Some(dest));
                    prop_assert_eq!(tree.children(dest).last().copied(), Some(source));
                }
                Err(e) => prop_assert_eq!(e, crate::error::MutationError::CyclicMove),
            }
            prop_assert_eq!(tree.len(), before_len);
            prop_assert_eq!(tree.export(source), before_subtree);
        }
    }
}
