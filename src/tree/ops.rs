use super::{Bookmark, Folder, Node, NodeRef, Tree};
use crate::error::MutationError;
use crate::wire::{Item, MAX_DEPTH};

/// Names a node either by live handle or by bookmark/folder id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Ref(NodeRef),
    Id(i64),
}

impl From<NodeRef> for Selector {
    fn from(node: NodeRef) -> Self {
        Selector::Ref(node)
    }
}

impl From<i64> for Selector {
    fn from(id: i64) -> Self {
        Selector::Id(id)
    }
}

/// Fields for a bookmark created through [`Tree::add_bookmark`]; the id is allocated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewBookmark {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: String,
    pub tags: Vec<String>,
}

impl NewBookmark {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), ..Default::default() }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewFolder {
    pub title: Option<String>,
}

impl NewFolder {
    pub fn titled(title: impl Into<String>) -> Self {
        Self { title: Some(title.into()) }
    }
}

impl Tree {
    // ── queries (breadth-first, first match wins) ──

    /// One past the largest id in the tree, the root's -1 included.
    /// `None` once that id is `i64::MAX`.
    pub fn next_identifier(&self) -> Option<i64> {
        self.bfs()
            .filter_map(|n| self.get(n))
            .map(Node::id)
            .max()
            .unwrap_or(super::ROOT_ID)
            .checked_add(1)
    }

    pub fn find_by_id(&self, id: i64) -> Option<NodeRef> {
        self.bfs().find(|n| self.get(*n).map(Node::id) == Some(id))
    }

    pub fn find_folder_by_id(&self, id: i64) -> Option<NodeRef> {
        self.bfs()
            .find(|n| matches!(self.get(*n), Some(Node::Folder(f)) if f.id == id))
    }

    pub fn find_bookmark_by_id(&self, id: i64) -> Option<NodeRef> {
        self.bfs()
            .find(|n| matches!(self.get(*n), Some(Node::Bookmark(b)) if b.id == id))
    }

    /// Shallowest folder with exactly this title.
    pub fn find_folder_by_title(&self, title: &str) -> Option<NodeRef> {
        self.bfs()
            .find(|n| matches!(self.get(*n), Some(Node::Folder(f)) if f.title.as_deref() == Some(title)))
    }

    pub fn find_all_bookmarks(&self) -> Vec<NodeRef> {
        self.bfs()
            .filter(|n| matches!(self.get(*n), Some(Node::Bookmark(_))))
            .collect()
    }

    // ── mutations ──
    // every lookup and check happens before the first write

    /// Append a new bookmark to `destination`. Returns the destination folder.
    pub fn add_bookmark(
        &mut self,
        fields: NewBookmark,
        destination: impl Into<Selector>,
    ) -> Result<NodeRef, MutationError> {
        let (id, dst) = self.prepare_add(destination.into())?;
        let node = self.alloc(Node::Bookmark(Bookmark {
            id,
            title: fields.title,
            description: fields.description,
            url: fields.url,
            tags: fields.tags,
        }));
        self.push_child(dst, node);
        Ok(dst)
    }

    /// Append a new empty folder to `destination`. Returns the destination folder.
    pub fn add_folder(
        &mut self,
        fields: NewFolder,
        destination: impl Into<Selector>,
    ) -> Result<NodeRef, MutationError> {
        let (id, dst) = self.prepare_add(destination.into())?;
        let node = self.alloc(Node::Folder(Folder { id, title: fields.title, children: Vec::new() }));
        self.push_child(dst, node);
        Ok(dst)
    }

    /// Move `source` to the end of `destination`. Returns the destination folder.
    pub fn move_node(
        &mut self,
        source: impl Into<Selector>,
        destination: impl Into<Selector>,
    ) -> Result<NodeRef, MutationError> {
        let (src, dst) = self.prepare_move(source.into(), destination.into())?;
        self.detach(src);
        self.push_child(dst, src);
        Ok(dst)
    }

    /// Move `source` into `destination` right after `after`, or to the front
    /// when `after` is `None`. An `after` that is not a child of the
    /// destination appends at the end.
    pub fn move_to(
        &mut self,
        source: impl Into<Selector>,
        destination: impl Into<Selector>,
        after: Option<Selector>,
    ) -> Result<NodeRef, MutationError> {
        let (src, dst) = self.prepare_move(source.into(), destination.into())?;
        self.detach(src);
        let index = match after {
            None => 0,
            Some(sibling) => self
                .position_in(dst, sibling)
                .map(|i| i + 1)
                .unwrap_or(usize::MAX),
        };
        self.insert_child(dst, index, src);
        Ok(dst)
    }

    /// Detach `target` and its subtree, returning what was removed.
    pub fn remove(&mut self, target: impl Into<Selector>) -> Result<Item, MutationError> {
        let node = self.resolve(target.into()).ok_or(MutationError::TargetNotFound)?;
        if self.parent(node).is_none() {
            return Err(MutationError::TargetHasNoParent);
        }
        self.detach(node);
        self.release(node).ok_or(MutationError::TargetNotFound)
    }

    // ── helpers ──

    fn resolve(&self, selector: Selector) -> Option<NodeRef> {
        match selector {
            Selector::Ref(node) => self.contains(node).then_some(node),
            Selector::Id(id) => self.find_by_id(id),
        }
    }

    fn resolve_folder(&self, selector: Selector) -> Option<NodeRef> {
        match selector {
            Selector::Ref(node) => self.get(node).filter(|n| n.is_folder()).map(|_| node),
            Selector::Id(id) => self.find_folder_by_id(id),
        }
    }

    fn prepare_move(&self, source: Selector, destination: Selector) -> Result<(NodeRef, NodeRef), MutationError> {
        let src = self.resolve(source).ok_or(MutationError::SourceNotFound)?;
        let dst = self.resolve_folder(destination).ok_or(MutationError::DestinationNotFound)?;
        if self.parent(src).is_none() {
            return Err(MutationError::SourceHasNoParent);
        }
        // dst inside src's subtree would orphan the whole branch
        if dst == src || self.ancestors(dst).any(|a| a == src) {
            return Err(MutationError::CyclicMove);
        }
        if self.depth(dst) + self.height(src) > MAX_DEPTH {
            return Err(MutationError::TooDeep);
        }
        Ok((src, dst))
    }

    fn prepare_add(&self, destination: Selector) -> Result<(i64, NodeRef), MutationError> {
        let dst = self.resolve_folder(destination).ok_or(MutationError::DestinationNotFound)?;
        if self.depth(dst) + 1 > MAX_DEPTH {
            return Err(MutationError::TooDeep);
        }
        let id = self.next_identifier().ok_or(MutationError::IdentifierExhausted)?;
        Ok((id, dst))
    }

    /// Levels in the subtree under `node`, itself included.
    fn height(&self, node: NodeRef) -> usize {
        let mut height = 0;
        let mut level = vec![node];
        while !level.is_empty() {
            height += 1;
            level = level.iter().flat_map(|n| self.children(*n).iter().copied()).collect();
        }
        height
    }

    fn position_in(&self, folder: NodeRef, sibling: Selector) -> Option<usize> {
        self.children(folder).iter().position(|c| match sibling {
            Selector::Ref(node) => *c == node,
            Selector::Id(id) => self.get(*c).map(Node::id) == Some(id),
        })
    }
}
