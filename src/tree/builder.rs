use super::{Bookmark, Folder, Node, NodeRef, Tree, ROOT_ID};
use crate::error::BuildError;
use crate::wire::{FolderRecord, Item, MAX_DEPTH};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::debug;

impl Tree {
    /// Build a live tree from validated top-level records.
    ///
    /// Discovery is breadth-first so every parent is materialized before any
    /// of its children. Nothing is materialized until all ids are known to be
    /// unique; duplicates anywhere fail the whole build, as does nesting
    /// deeper than [`MAX_DEPTH`].
    pub fn build(items: Vec<Item>) -> Result<Tree, BuildError> {
        let root = Item::Folder(FolderRecord { id: ROOT_ID, title: None, children: items });

        // ── discovery ──
        let mut queue: VecDeque<(Option<i64>, usize, Item)> = VecDeque::from([(None, 0, root)]);
        let mut discovered: Vec<(Option<i64>, Node)> = Vec::new();
        while let Some((parent, depth, item)) = queue.pop_front() {
            if depth > MAX_DEPTH {
                return Err(BuildError::TooDeep { id: item.id(), depth });
            }
            let node = match item {
                Item::Bookmark(b) => Node::Bookmark(Bookmark {
                    id: b.id,
                    title: b.title,
                    description: b.description,
                    url: b.url,
                    tags: b.tags,
                }),
                Item::Folder(f) => {
                    queue.extend(f.children.into_iter().map(|c| (Some(f.id), depth + 1, c)));
                    Node::Folder(Folder { id: f.id, title: f.title, children: Vec::new() })
                }
            };
            discovered.push((parent, node));
        }

        let mut seen = HashSet::with_capacity(discovered.len());
        let duplicates: BTreeSet<i64> = discovered
            .iter()
            .map(|(_, n)| n.id())
            .filter(|id| !seen.insert(*id))
            .collect();
        if !duplicates.is_empty() {
            return Err(BuildError::DuplicateIdentifier(duplicates.into_iter().collect()));
        }

        // ── materialize ──
        let mut tree = Tree::new();
        let mut folders: HashMap<i64, NodeRef> = HashMap::from([(ROOT_ID, tree.root())]);
        for (parent, node) in discovered.into_iter().skip(1) {
            let id = node.id();
            let parent_ref = parent
                .and_then(|p| folders.get(&p).copied())
                .ok_or(BuildError::OrphanNode { id, parent })?;
            let is_folder = node.is_folder();
            let node_ref = tree.alloc(node);
            tree.push_child(parent_ref, node_ref);
            if is_folder {
                folders.insert(id, node_ref);
            }
        }

        debug!(nodes = tree.len(), folders = folders.len() - 1, "built bookmark tree");
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{self, BookmarkRecord};
    use serde_json::json;

    fn build(value: serde_json::Value) -> Result<Tree, BuildError> {
        Tree::build(wire::validate(&value).unwrap())
    }

    #[test]
    fn empty_input() {
        let tree = build(json!([])).unwrap();
        assert!(tree.is_empty());
        assert!(tree.to_external().is_empty());
    }

    #[test]
    fn keeps_sibling_order() {
        let input = json!([
            { "id": 3, "url": "c" },
            { "id": 1, "title": "f", "children": [
                { "id": 12, "url": "x" },
                { "id": 10, "children": [] },
                { "id": 11, "url": "y", "tags": ["t2", "t1"] }
            ]},
            { "id": 2, "url": "b" }
        ]);
        let tree = build(input.clone()).unwrap();
        assert_eq!(serde_json::to_value(tree.to_external()).unwrap(), input);
    }

    #[test]
    fn not_alter_structure() {
        let input = json!([
            { "id": 1, "title": "1t", "description": "1d", "url": "1url" },
            { "id": 2, "title": "2t", "children": [
                { "id": 21, "title": "21t", "description": "21d", "url": "21url" },
                { "id": 22, "title": "22t", "children": [] }
            ]}
        ]);
        let tree = build(input.clone()).unwrap();
        assert_eq!(serde_json::to_value(tree.to_external()).unwrap(), input);
    }

    #[test]
    fn duplicate_ids_across_depths() {
        let err = build(json!([
            { "id": 1, "url": "a" },
            { "id": 2, "children": [{ "id": 1, "url": "b" }, { "id": 2, "children": [] }] }
        ]))
        .unwrap_err();
        assert_eq!(err, BuildError::DuplicateIdentifier(vec![1, 2]));
    }

    #[test]
    fn duplicate_of_root_id() {
        let err = build(json!([{ "id": -1, "url": "a" }])).unwrap_err();
        assert_eq!(err, BuildError::DuplicateIdentifier(vec![ROOT_ID]));
    }

    fn chain(levels: i64) -> Vec<Item> {
        let mut items = vec![Item::Bookmark(BookmarkRecord {
            id: levels,
            title: None,
            description: None,
            url: "leaf".into(),
            tags: vec![],
        })];
        for id in (1..levels).rev() {
            items = vec![Item::Folder(FolderRecord { id, title: None, children: items })];
        }
        items
    }

    #[test]
    fn depth_limit() {
        let tree = Tree::build(chain(MAX_DEPTH as i64)).unwrap();
        assert_eq!(tree.len(), MAX_DEPTH);

        let err = Tree::build(chain(MAX_DEPTH as i64 + 1)).unwrap_err();
        assert_eq!(err, BuildError::TooDeep { id: MAX_DEPTH as i64 + 1, depth: MAX_DEPTH + 1 });
    }

    #[test]
    fn negative_ids_are_fine_otherwise() {
        let tree = build(json!([{ "id": -5, "url": "a" }])).unwrap();
        assert!(tree.find_bookmark_by_id(-5).is_some());
    }
}
