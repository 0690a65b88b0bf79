use std::{marker::PhantomData, sync::Arc};

use crate::{
    buffer::BufferManager,
    common::PageId,
    error::Result,
    segment::Segment,
};

use self::node::{InnerNodeMut, InnerNodeRef, LeafNodeMut, LeafNodeRef, NodeCodec};

pub mod node;

/// A disk-backed B+-tree over one segment. Every node lives as its
/// in-memory byte layout on a page of the buffer manager; each access fixes
/// the node's page (shared for lookup, exclusive for mutation) and unfixes
/// it with the dirty flag.
///
/// The tree is single-writer: all mutating operations take `&mut self`, and
/// concurrent readers are only safe while no writer is active.
pub struct BTree<K, V> {
    segment: Segment,
    root: Option<PageId>,
    _marker: PhantomData<(K, V)>,
}

impl<K: NodeCodec + Ord, V: NodeCodec> BTree<K, V> {
    pub fn new(segment_id: u16, buffer_manager: Arc<BufferManager>) -> Self {
        Self {
            segment: Segment::new(segment_id, buffer_manager),
            root: None,
            _marker: PhantomData,
        }
    }

    pub fn lookup(&self, key: &K) -> Result<Option<V>> {
        let Some(root) = self.root else {
            return Ok(None);
        };
        let mut page_id = root;
        loop {
            let guard = self.segment.buffer_manager().fix_page(page_id, false)?;
            let data = guard.data();
            if node::is_leaf(data) {
                let leaf = LeafNodeRef::<K, V>::new(data);
                let (index, found) = leaf.lower_bound(key);
                return Ok(if found { Some(leaf.value(index)) } else { None });
            }
            let inner = InnerNodeRef::<K>::new(data);
            page_id = inner.child(inner.descend_index(key));
        }
    }

    /// Inserts the pair, replacing the value if the key is already present.
    pub fn insert(&mut self, key: &K, value: &V) -> Result<()> {
        // the guards below must not borrow `self`, which stays mutable for
        // page allocation and root updates
        let manager = self.segment.buffer_manager().clone();
        let root = match self.root {
            Some(root) => root,
            None => {
                let page_id = self.segment.allocate_page();
                let mut guard = manager.fix_page(page_id, true)?;
                LeafNodeMut::<K, V>::init(guard.data_mut());
                guard.mark_dirty();
                self.root = Some(page_id);
                page_id
            }
        };

        let mut page_id = root;
        loop {
            let mut guard = manager.fix_page(page_id, true)?;
            if !node::is_leaf(guard.data()) {
                let inner = InnerNodeRef::<K>::new(guard.data());
                page_id = inner.child(inner.descend_index(key));
                continue;
            }

            let mut leaf = LeafNodeMut::<K, V>::new(guard.data_mut());
            let (_, found) = leaf.as_ref().lower_bound(key);
            if found || leaf.as_ref().count() < leaf.as_ref().capacity() {
                leaf.insert(key, value);
                guard.mark_dirty();
                return Ok(());
            }

            // Full leaf: move its upper half to a fresh page, place the new
            // entry in whichever half covers it, then lift the separator.
            let new_page_id = self.segment.allocate_page();
            let mut new_guard = manager.fix_page(new_page_id, true)?;
            let mut right = LeafNodeMut::<K, V>::init(new_guard.data_mut());
            let separator = leaf.split(&mut right);
            if *key < separator {
                leaf.insert(key, value);
            } else {
                right.insert(key, value);
            }
            let parent = leaf.as_ref().parent_page_id();
            guard.mark_dirty();
            new_guard.mark_dirty();
            drop(guard);
            drop(new_guard);
            return self.insert_separator(page_id, 0, parent, separator, new_page_id);
        }
    }

    /// Removes the key from its leaf if present. Nodes are never merged;
    /// an emptied leaf simply stays behind.
    pub fn erase(&mut self, key: &K) -> Result<()> {
        let Some(root) = self.root else {
            return Ok(());
        };
        let manager = self.segment.buffer_manager().clone();
        let mut page_id = root;
        loop {
            let mut guard = manager.fix_page(page_id, true)?;
            if !node::is_leaf(guard.data()) {
                let inner = InnerNodeRef::<K>::new(guard.data());
                page_id = inner.child(inner.descend_index(key));
                continue;
            }
            let mut leaf = LeafNodeMut::<K, V>::new(guard.data_mut());
            if leaf.erase(key) {
                guard.mark_dirty();
            }
            return Ok(());
        }
    }

    /// All keys in leaf order. Debug and test helper; walks the whole tree.
    pub fn keys(&self) -> Result<Vec<K>> {
        let mut keys = vec![];
        if let Some(root) = self.root {
            self.collect_leaf_keys(root, &mut keys)?;
        }
        Ok(keys)
    }

    fn collect_leaf_keys(&self, page_id: PageId, out: &mut Vec<K>) -> Result<()> {
        let guard = self.segment.buffer_manager().fix_page(page_id, false)?;
        if node::is_leaf(guard.data()) {
            out.extend(LeafNodeRef::<K, V>::new(guard.data()).keys());
            return Ok(());
        }
        let children = InnerNodeRef::<K>::new(guard.data()).children();
        drop(guard);
        for child in children {
            self.collect_leaf_keys(child, out)?;
        }
        Ok(())
    }

    /// Lifts `separator` between the nodes `left` and `right` into the
    /// parent of `left`, splitting full ancestors on the way up. A split of
    /// the root grows the tree by one level.
    fn insert_separator(
        &mut self,
        left: PageId,
        left_level: u16,
        parent: Option<PageId>,
        separator: K,
        right: PageId,
    ) -> Result<()> {
        let manager = self.segment.buffer_manager().clone();
        let Some(parent_id) = parent else {
            // `left` was the root: allocate a new root one level higher
            // holding the separator and both children.
            let root_id = self.segment.allocate_page();
            let mut root_guard = manager.fix_page(root_id, true)?;
            let mut root = InnerNodeMut::<K>::init(root_guard.data_mut(), left_level + 1);
            root.write_entries(&[separator], &[left, right]);
            root_guard.mark_dirty();
            drop(root_guard);
            self.set_parent(left, root_id)?;
            self.set_parent(right, root_id)?;
            self.root = Some(root_id);
            return Ok(());
        };

        let mut parent_guard = manager.fix_page(parent_id, true)?;
        let (count, capacity, parent_level, grandparent) = {
            let inner = InnerNodeRef::<K>::new(parent_guard.data());
            (
                inner.count(),
                inner.capacity(),
                inner.level(),
                inner.parent_page_id(),
            )
        };
        if count < capacity {
            InnerNodeMut::<K>::new(parent_guard.data_mut()).insert(&separator, right);
            parent_guard.mark_dirty();
            drop(parent_guard);
            return self.set_parent(right, parent_id);
        }

        // Full parent: fold the new separator into the key sequence, promote
        // the middle key and distribute the rest across the two halves.
        let (mut keys, mut children) = {
            let inner = InnerNodeRef::<K>::new(parent_guard.data());
            (inner.keys(), inner.children())
        };
        let position = keys.partition_point(|k| k < &separator);
        keys.insert(position, separator);
        children.insert(position + 1, right);
        let middle = keys.len() / 2;
        let promoted = keys[middle];

        let new_inner_id = self.segment.allocate_page();
        let mut new_guard = manager.fix_page(new_inner_id, true)?;
        let mut right_node = InnerNodeMut::<K>::init(new_guard.data_mut(), parent_level);
        right_node.write_entries(&keys[middle + 1..], &children[middle + 1..]);
        InnerNodeMut::<K>::new(parent_guard.data_mut())
            .write_entries(&keys[..middle], &children[..=middle]);
        parent_guard.mark_dirty();
        new_guard.mark_dirty();

        // children handed to the new half (and the freshly split child, if
        // it stayed left) get their parent pointers rewired
        for &child in &children[middle + 1..] {
            self.set_parent(child, new_inner_id)?;
        }
        if position < middle {
            self.set_parent(right, parent_id)?;
        }
        drop(parent_guard);
        drop(new_guard);
        self.insert_separator(parent_id, parent_level, grandparent, promoted, new_inner_id)
    }

    fn set_parent(&self, page_id: PageId, parent: PageId) -> Result<()> {
        let mut guard = self.segment.buffer_manager().fix_page(page_id, true)?;
        node::set_parent_page_id(guard.data_mut(), Some(parent));
        guard.mark_dirty();
        Ok(())
    }
}
