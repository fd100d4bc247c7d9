//! InterfaceTree: the ordered, acyclic hierarchy of interface items.
//!
//! [`InterfaceTree`] owns every socket and panel declared by a node group. It
//! is the only way to create, copy, move and destroy items, and it keeps the
//! following invariants after every operation:
//!
//! 1. Every item except the root panel has exactly one parent, and no panel
//!    is its own ancestor.
//! 2. Item identifiers are unique across the tree.
//! 3. Only panels have children.
//! 4. Child order is explicit and preserved; nothing is ever sorted.
//! 5. The active item, if any, is an item currently in the tree.
//!
//! # Storage
//!
//! Items live as node weights in a petgraph `StableGraph`. A `Contains` edge
//! from a panel to a child is the child's parent back-reference; the panel's
//! own child vector carries the order. Both are updated together in every
//! mutation and checked against each other by [`InterfaceTree::validate`]
//! (asserted after each mutation in debug builds).
//!
//! Callers hold [`ItemId`] handles, which map to graph indices through an
//! explicit table and are never reused.
//!
//! # Notification
//!
//! Mutating methods only mutate. Telling dependent caches that the interface
//! changed is the caller's job (see [`ChangeNotifier`](crate::host::ChangeNotifier)),
//! which lets a batch of edits notify once.

use std::collections::{HashMap, HashSet};

use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::Dfs;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::InterfaceError;
use crate::host::TreeType;
use crate::id::{IdentifierGenerator, ItemId};
use crate::item::{
    InterfaceItem, InterfacePanel, InterfaceSocket, ItemKind, ItemType, SocketFlags,
};
use crate::outline::InterfaceOutline;
use crate::registry::{SocketExtension, SocketTypeRegistry};
use crate::value::{SocketValue, ValueRange};

/// Containment edge from a panel to one of its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contains;

/// A detached copy of an item subtree.
struct ItemTemplate {
    kind: ItemKind,
    children: Vec<ItemTemplate>,
}

/// The interface of one node group: a root panel and everything under it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceTree {
    /// Item arena; edges are panel -> child containment.
    graph: StableGraph<InterfaceItem, Contains, Directed, u32>,
    /// Handle to arena index.
    nodes: HashMap<ItemId, NodeIndex<u32>>,
    /// Identifier to handle, for uniqueness checks and lookup.
    identifiers: HashMap<String, ItemId>,
    root: ItemId,
    active: Option<ItemId>,
    next_item_id: u32,
    uids: IdentifierGenerator,
}

impl InterfaceTree {
    /// Creates an interface containing only the root panel.
    pub fn new() -> Self {
        let root = ItemId(0);
        let mut graph = StableGraph::new();
        let root_idx = graph.add_node(InterfaceItem {
            id: root,
            identifier: String::new(),
            kind: ItemKind::Panel(InterfacePanel::new("")),
        });

        let mut nodes = HashMap::new();
        nodes.insert(root, root_idx);

        InterfaceTree {
            graph,
            nodes,
            identifiers: HashMap::new(),
            root,
            active: None,
            next_item_id: 1,
            uids: IdentifierGenerator::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    /// Handle of the root panel. Valid as a parent argument, but the root is
    /// not itself an item: it cannot be found, copied, moved or removed.
    pub fn root_id(&self) -> ItemId {
        self.root
    }

    /// Number of items, not counting the root panel.
    pub fn len(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn index_of(&self, id: ItemId) -> Option<NodeIndex<u32>> {
        self.nodes.get(&id).copied()
    }

    pub fn item(&self, id: ItemId) -> Option<&InterfaceItem> {
        self.index_of(id).and_then(|idx| self.graph.node_weight(idx))
    }

    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut InterfaceItem> {
        let idx = self.index_of(id)?;
        self.graph.node_weight_mut(idx)
    }

    pub fn socket(&self, id: ItemId) -> Option<&InterfaceSocket> {
        self.item(id).and_then(InterfaceItem::as_socket)
    }

    pub fn socket_mut(&mut self, id: ItemId) -> Option<&mut InterfaceSocket> {
        self.item_mut(id).and_then(InterfaceItem::as_socket_mut)
    }

    pub fn panel(&self, id: ItemId) -> Option<&InterfacePanel> {
        self.item(id).and_then(InterfaceItem::as_panel)
    }

    pub fn panel_mut(&mut self, id: ItemId) -> Option<&mut InterfacePanel> {
        self.item_mut(id).and_then(InterfaceItem::as_panel_mut)
    }

    /// Children of a panel in order. Empty for sockets and unknown handles.
    pub fn children(&self, id: ItemId) -> &[ItemId] {
        self.panel(id).map(InterfacePanel::items).unwrap_or(&[])
    }

    /// Looks up an item by its identifier.
    pub fn find_by_identifier(&self, identifier: &str) -> Option<ItemId> {
        self.identifiers.get(identifier).copied()
    }

    /// First item with the given name in depth-first display order.
    pub fn find_by_name(&self, name: &str) -> Option<ItemId> {
        self.items_tree()
            .into_iter()
            .find(|&id| self.item(id).is_some_and(|item| item.name() == name))
    }

    // -----------------------------------------------------------------------
    // Hierarchy queries
    // -----------------------------------------------------------------------

    fn parent_index(&self, idx: NodeIndex<u32>) -> Option<NodeIndex<u32>> {
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .next()
    }

    /// Chain of panels from the direct parent up to and including the root.
    /// Empty for the root and for unknown handles.
    pub fn ancestors(&self, id: ItemId) -> SmallVec<[ItemId; 8]> {
        let mut chain = SmallVec::new();
        let Some(mut idx) = self.index_of(id) else {
            return chain;
        };
        // Bounded so corrupted (deserialized) data cannot loop forever.
        for _ in 0..self.nodes.len() {
            match self.parent_index(idx) {
                Some(parent) => {
                    chain.push(self.graph[parent].id);
                    idx = parent;
                }
                None => break,
            }
        }
        chain
    }

    /// Whether `id` is an item of this tree, i.e. reachable from the root.
    pub fn find_item(&self, id: ItemId) -> bool {
        id != self.root && self.ancestors(id).last() == Some(&self.root)
    }

    /// The panel directly containing `id`. `None` for the root and for
    /// items not in the tree.
    pub fn find_item_parent(&self, id: ItemId) -> Option<ItemId> {
        if !self.find_item(id) {
            return None;
        }
        let idx = self.index_of(id)?;
        self.parent_index(idx).map(|parent| self.graph[parent].id)
    }

    /// Index of `id` within its parent's children.
    pub fn item_position(&self, id: ItemId) -> Option<usize> {
        let parent = self.find_item_parent(id)?;
        self.children(parent).iter().position(|&child| child == id)
    }

    /// Whether `candidate` lies strictly below `ancestor`.
    pub fn is_descendant(&self, candidate: ItemId, ancestor: ItemId) -> bool {
        self.ancestors(candidate).contains(&ancestor)
    }

    /// All items in depth-first display order, root excluded.
    pub fn items_tree(&self) -> Vec<ItemId> {
        let mut out = Vec::with_capacity(self.len());
        self.collect_preorder(self.root, &mut out);
        out
    }

    fn collect_preorder(&self, panel: ItemId, out: &mut Vec<ItemId>) {
        for &child in self.children(panel) {
            out.push(child);
            self.collect_preorder(child, out);
        }
    }

    /// Item at a position of [`items_tree`](Self::items_tree).
    pub fn item_at(&self, index: usize) -> Option<ItemId> {
        self.items_tree().get(index).copied()
    }

    /// All items in the subtree rooted at `id`, including `id`. Unordered.
    fn subtree(&self, id: ItemId) -> Vec<ItemId> {
        let Some(start) = self.index_of(id) else {
            return Vec::new();
        };
        let mut dfs = Dfs::new(&self.graph, start);
        let mut out = Vec::new();
        while let Some(idx) = dfs.next(&self.graph) {
            out.push(self.graph[idx].id);
        }
        out
    }

    // -----------------------------------------------------------------------
    // Active item
    // -----------------------------------------------------------------------

    /// The active item. Never refers to an item that is gone.
    pub fn active_item(&self) -> Option<ItemId> {
        self.active.filter(|&id| self.find_item(id))
    }

    /// Sets the active item. The handle is not validated here; a handle not
    /// in the tree reads back as no active item.
    pub fn set_active_item(&mut self, item: Option<ItemId>) {
        self.active = item;
    }

    /// Position of the active item in [`items_tree`](Self::items_tree).
    pub fn active_index(&self) -> Option<usize> {
        let active = self.active_item()?;
        self.items_tree().iter().position(|&id| id == active)
    }

    /// Activates the item at a flat index. Returns `false` if out of range.
    pub fn set_active_index(&mut self, index: usize) -> bool {
        match self.item_at(index) {
            Some(id) => {
                self.active = Some(id);
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Internal structure helpers
    // -----------------------------------------------------------------------

    /// Resolves an optional parent argument to a panel of this tree.
    fn resolve_parent(&self, parent: Option<ItemId>) -> Result<ItemId, InterfaceError> {
        match parent {
            None => Ok(self.root),
            Some(p) if p == self.root => Ok(p),
            Some(p) if self.find_item(p) && self.panel(p).is_some() => Ok(p),
            Some(p) => Err(InterfaceError::InvalidParent { parent: p }),
        }
    }

    fn new_identifier(&mut self, item_type: ItemType) -> String {
        let identifiers = &self.identifiers;
        self.uids
            .generate(item_type.identifier_prefix(), |candidate| {
                identifiers.contains_key(candidate)
            })
    }

    /// Adds a new node under a validated parent panel.
    fn attach(&mut self, kind: ItemKind, parent: ItemId, index: usize) -> ItemId {
        let identifier = self.new_identifier(kind.item_type());
        let id = ItemId(self.next_item_id);
        self.next_item_id += 1;

        let idx = self.graph.add_node(InterfaceItem {
            id,
            identifier: identifier.clone(),
            kind,
        });
        self.nodes.insert(id, idx);
        self.identifiers.insert(identifier, id);
        self.link(id, parent, index);
        id
    }

    /// Makes `child` a child of `parent` at `index` (clamped).
    fn link(&mut self, child: ItemId, parent: ItemId, index: usize) {
        let (Some(child_idx), Some(parent_idx)) = (self.index_of(child), self.index_of(parent))
        else {
            return;
        };
        if let Some(panel) = self.graph[parent_idx].as_panel_mut() {
            let index = index.min(panel.items.len());
            panel.items.insert(index, child);
            self.graph.add_edge(parent_idx, child_idx, Contains);
        }
    }

    /// Detaches `child` from its parent. Returns the former parent and
    /// position.
    fn unlink(&mut self, child: ItemId) -> Option<(ItemId, usize)> {
        let child_idx = self.index_of(child)?;
        let parent_idx = self.parent_index(child_idx)?;
        let position = self.graph[parent_idx]
            .as_panel()?
            .items
            .iter()
            .position(|&c| c == child)?;
        let edge = self.graph.find_edge(parent_idx, child_idx)?;

        self.graph.remove_edge(edge);
        let parent = &mut self.graph[parent_idx];
        if let Some(panel) = parent.as_panel_mut() {
            panel.items.remove(position);
        }
        Some((parent.id, position))
    }

    /// Drops a single node and its bookkeeping.
    fn destroy(&mut self, id: ItemId) {
        if let Some(idx) = self.nodes.remove(&id) {
            if let Some(item) = self.graph.remove_node(idx) {
                self.identifiers.remove(&item.identifier);
            }
        }
        if self.active == Some(id) {
            self.active = None;
        }
    }

    fn template(&self, id: ItemId) -> Option<ItemTemplate> {
        let item = self.item(id)?;
        Some(match &item.kind {
            ItemKind::Socket(socket) => ItemTemplate {
                kind: ItemKind::Socket(socket.clone()),
                children: Vec::new(),
            },
            ItemKind::Panel(panel) => ItemTemplate {
                kind: ItemKind::Panel(panel.without_items()),
                children: panel
                    .items
                    .iter()
                    .filter_map(|&child| self.template(child))
                    .collect(),
            },
        })
    }

    fn instantiate(&mut self, template: ItemTemplate, parent: ItemId, index: usize) -> ItemId {
        let id = self.attach(template.kind, parent, index);
        for child in template.children {
            self.instantiate(child, id, usize::MAX);
        }
        id
    }

    // -----------------------------------------------------------------------
    // Item creation
    // -----------------------------------------------------------------------

    /// Appends a new socket to `parent` (the root if `None`).
    ///
    /// The socket kind is `socket_type` if the registry knows it and the tree
    /// type supports it; otherwise the first supported kind in registration
    /// order. Fails with [`InterfaceError::InvalidParent`] or
    /// [`InterfaceError::UnsupportedSocketKind`] without touching the tree.
    #[allow(clippy::too_many_arguments)]
    pub fn add_socket(
        &mut self,
        registry: &SocketTypeRegistry,
        tree_type: &dyn TreeType,
        name: &str,
        description: &str,
        socket_type: &str,
        flags: SocketFlags,
        parent: Option<ItemId>,
    ) -> Result<ItemId, InterfaceError> {
        let parent = self.resolve_parent(parent)?;
        let typeinfo = registry.resolve_socket_type(tree_type, socket_type)?;
        if typeinfo.idname() != socket_type {
            tracing::debug!(
                requested = socket_type,
                resolved = typeinfo.idname(),
                "socket type unsupported, using fallback"
            );
        }

        let socket = InterfaceSocket::new(name, description, typeinfo, flags);
        let id = self.attach(ItemKind::Socket(socket), parent, usize::MAX);
        tracing::debug!(%id, %parent, item_name = name, "added socket");

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(id)
    }

    /// Appends a new empty panel to `parent` (the root if `None`).
    pub fn add_panel(&mut self, name: &str, parent: Option<ItemId>) -> Result<ItemId, InterfaceError> {
        let parent = self.resolve_parent(parent)?;
        let id = self.attach(ItemKind::Panel(InterfacePanel::new(name)), parent, usize::MAX);
        tracing::debug!(%id, %parent, item_name = name, "added panel");

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(id)
    }

    /// Inserts a deep copy of `item` as child `index` of `parent` (the root
    /// if `None`). `index` is clamped to the parent's child count.
    ///
    /// Every copied node gets a fresh identifier. The source subtree is
    /// captured before insertion, so copying a panel into itself or one of
    /// its descendants is well defined.
    pub fn insert_item_copy(
        &mut self,
        item: ItemId,
        parent: Option<ItemId>,
        index: usize,
    ) -> Result<ItemId, InterfaceError> {
        let parent = self.resolve_parent(parent)?;
        if !self.find_item(item) {
            return Err(InterfaceError::ItemNotFound { id: item });
        }
        let template = self
            .template(item)
            .ok_or(InterfaceError::ItemNotFound { id: item })?;

        let index = index.min(self.children(parent).len());
        let copy = self.instantiate(template, parent, index);
        tracing::debug!(source = %item, %copy, %parent, index, "copied item");

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(copy)
    }

    /// Copies `item` into its own parent, right after itself.
    pub fn copy(&mut self, item: ItemId) -> Result<ItemId, InterfaceError> {
        let parent = self
            .find_item_parent(item)
            .ok_or(InterfaceError::ItemNotFound { id: item })?;
        let position = self
            .item_position(item)
            .ok_or(InterfaceError::ItemNotFound { id: item })?;
        self.insert_item_copy(item, Some(parent), position + 1)
    }

    // -----------------------------------------------------------------------
    // Item removal
    // -----------------------------------------------------------------------

    /// Removes `item` from the tree.
    ///
    /// For a panel with `move_content_to_parent`, its children take the
    /// panel's place in the parent, in their original order. Otherwise the
    /// whole subtree is destroyed. The active item is cleared if it was
    /// destroyed.
    pub fn remove_item(
        &mut self,
        item: ItemId,
        move_content_to_parent: bool,
    ) -> Result<(), InterfaceError> {
        if !self.find_item(item) {
            return Err(InterfaceError::ItemNotFound { id: item });
        }
        let hoisted: Vec<ItemId> = if move_content_to_parent {
            self.children(item).to_vec()
        } else {
            Vec::new()
        };

        let (parent, position) = self.unlink(item).ok_or_else(|| InterfaceError::InconsistentTree {
            reason: format!("item {} has no parent panel", item),
        })?;

        if move_content_to_parent {
            for (offset, &child) in hoisted.iter().enumerate() {
                self.unlink(child);
                self.link(child, parent, position + offset);
            }
            self.destroy(item);
        } else {
            for id in self.subtree(item) {
                self.destroy(id);
            }
        }
        tracing::debug!(%item, %parent, hoisted = hoisted.len(), "removed item");

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(())
    }

    /// Destroys every item. The root panel stays, the active item is cleared.
    pub fn clear_items(&mut self) {
        let items: Vec<ItemId> = self
            .nodes
            .keys()
            .copied()
            .filter(|&id| id != self.root)
            .collect();
        for id in items {
            self.destroy(id);
        }
        let root = self.root;
        if let Some(panel) = self.panel_mut(root) {
            panel.items.clear();
        }
        self.active = None;
        tracing::debug!("cleared interface");

        #[cfg(debug_assertions)]
        self.assert_consistency();
    }

    // -----------------------------------------------------------------------
    // Reordering and reparenting
    // -----------------------------------------------------------------------

    /// Moves `item` to position `to_index` (clamped) among its siblings.
    /// Returns `false` without effect for the root or unknown items.
    pub fn move_item(&mut self, item: ItemId, to_index: usize) -> bool {
        let Some(parent) = self.find_item_parent(item) else {
            return false;
        };
        let Some(panel) = self.panel_mut(parent) else {
            return false;
        };
        let Some(from) = panel.items.iter().position(|&c| c == item) else {
            return false;
        };
        panel.items.remove(from);
        let to = to_index.min(panel.items.len());
        panel.items.insert(to, item);
        tracing::debug!(%item, from, to, "moved item");

        #[cfg(debug_assertions)]
        self.assert_consistency();

        true
    }

    /// Moves `item` into `new_parent` (the root if `None`) at `to_index`
    /// (clamped, counted after `item` left its old place).
    ///
    /// Rejected without mutation if the item is not in the tree, the parent
    /// is not a panel of the tree, or the parent is the item itself or one of
    /// its descendants.
    pub fn move_item_to_parent(
        &mut self,
        item: ItemId,
        new_parent: Option<ItemId>,
        to_index: usize,
    ) -> Result<(), InterfaceError> {
        if !self.find_item(item) {
            return Err(InterfaceError::ItemNotFound { id: item });
        }
        let new_parent = self.resolve_parent(new_parent)?;
        if new_parent == item || self.is_descendant(new_parent, item) {
            tracing::warn!(%item, parent = %new_parent, "rejected move into own subtree");
            return Err(InterfaceError::CycleDetected {
                item,
                parent: new_parent,
            });
        }

        let (old_parent, _) = self.unlink(item).ok_or_else(|| InterfaceError::InconsistentTree {
            reason: format!("item {} has no parent panel", item),
        })?;
        let index = to_index.min(self.children(new_parent).len());
        self.link(item, new_parent, index);
        tracing::debug!(%item, from = %old_parent, to = %new_parent, index, "reparented item");

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Socket type helpers
    // -----------------------------------------------------------------------

    /// Changes the kind of a socket. The kind must be registered and offered
    /// by the tree type (no subtype, accepted by its predicate); a different
    /// kind replaces the default value with that kind's initial record.
    pub fn set_socket_type(
        &mut self,
        item: ItemId,
        registry: &SocketTypeRegistry,
        tree_type: &dyn TreeType,
        idname: &str,
    ) -> Result<(), InterfaceError> {
        if !self.find_item(item) {
            return Err(InterfaceError::ItemNotFound { id: item });
        }
        let typeinfo = registry
            .find(idname)
            .ok_or_else(|| InterfaceError::RegistryKeyUnknown {
                idname: idname.to_string(),
            })?;
        if !registry.is_supported(tree_type, idname) {
            return Err(InterfaceError::UnsupportedSocketKind {
                requested: idname.to_string(),
                tree_type: tree_type.idname().to_string(),
            });
        }
        let socket = self
            .socket_mut(item)
            .ok_or(InterfaceError::NotASocket { id: item })?;

        if socket.socket_type != typeinfo.idname() {
            socket.socket_type = typeinfo.idname().to_string();
            socket.default_value = SocketValue::for_type(typeinfo.data_type(), typeinfo.subtype());
        }
        Ok(())
    }

    /// UI range of a socket's numeric default value, after repairing an
    /// inverted soft range. `None` for non-numeric values.
    pub fn default_value_range(
        &mut self,
        item: ItemId,
        registry: &SocketTypeRegistry,
    ) -> Result<Option<ValueRange>, InterfaceError> {
        if !self.find_item(item) {
            return Err(InterfaceError::ItemNotFound { id: item });
        }
        // A kind missing from the registry counts as unqualified.
        let subtype = self
            .socket(item)
            .and_then(|socket| registry.find(socket.socket_type()))
            .map(|info| info.subtype())
            .unwrap_or_default();
        let socket = self
            .socket_mut(item)
            .ok_or(InterfaceError::NotASocket { id: item })?;
        Ok(socket.default_value.ui_range(subtype))
    }

    /// The registered extension of a socket's kind, if any.
    pub fn socket_extension<'r>(
        &self,
        item: ItemId,
        registry: &'r SocketTypeRegistry,
    ) -> Option<&'r SocketExtension> {
        self.socket(item)
            .and_then(|socket| registry.find(socket.socket_type()))
            .and_then(|info| info.extension())
    }

    /// Nested snapshot of the interface in display order.
    pub fn outline(&self) -> InterfaceOutline {
        InterfaceOutline::from_tree(self)
    }

    // -----------------------------------------------------------------------
    // Consistency
    // -----------------------------------------------------------------------

    /// Checks the structural invariants. Useful after deserialization.
    pub fn validate(&self) -> Result<(), InterfaceError> {
        fn fail(reason: String) -> Result<(), InterfaceError> {
            Err(InterfaceError::InconsistentTree { reason })
        }

        if self.graph.node_count() != self.nodes.len() {
            return fail(format!(
                "{} graph nodes but {} handles",
                self.graph.node_count(),
                self.nodes.len()
            ));
        }
        if self.identifiers.len() != self.len() {
            return fail(format!(
                "{} identifiers for {} items",
                self.identifiers.len(),
                self.len()
            ));
        }

        let mut seen_children = HashSet::new();
        for (&id, &idx) in &self.nodes {
            let Some(item) = self.graph.node_weight(idx) else {
                return fail(format!("handle {} points at a missing node", id));
            };
            if item.id != id {
                return fail(format!("handle {} maps to node of {}", id, item.id));
            }

            let incoming = self.graph.edges_directed(idx, Direction::Incoming).count();
            let expected_incoming = usize::from(id != self.root);
            if incoming != expected_incoming {
                return fail(format!("item {} has {} parents", id, incoming));
            }

            if id != self.root {
                if self.identifiers.get(&item.identifier) != Some(&id) {
                    return fail(format!("identifier '{}' not indexed", item.identifier));
                }
                if !self.find_item(id) {
                    return fail(format!("item {} is not reachable from the root", id));
                }
            }

            let outgoing = self.graph.edges_directed(idx, Direction::Outgoing).count();
            match item.as_panel() {
                Some(panel) => {
                    if outgoing != panel.items.len() {
                        return fail(format!(
                            "panel {} lists {} children but has {} edges",
                            id,
                            panel.items.len(),
                            outgoing
                        ));
                    }
                    for &child in &panel.items {
                        let linked = self
                            .index_of(child)
                            .is_some_and(|child_idx| self.graph.find_edge(idx, child_idx).is_some());
                        if !linked {
                            return fail(format!("panel {} child {} is not linked", id, child));
                        }
                        if !seen_children.insert(child) {
                            return fail(format!("item {} appears twice", child));
                        }
                    }
                }
                None if outgoing != 0 => {
                    return fail(format!("socket {} has children", id));
                }
                None => {}
            }
        }

        if self.item(self.root).is_some_and(|root| !root.is_panel()) {
            return fail("root is not a panel".to_string());
        }
        Ok(())
    }

    /// Verifies the structural invariants.
    ///
    /// Only called in debug builds (via `cfg(debug_assertions)`).
    #[cfg(debug_assertions)]
    fn assert_consistency(&self) {
        if let Err(err) = self.validate() {
            panic!("{}", err);
        }
    }
}

impl Default for InterfaceTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::BuiltinTreeType;
    use crate::registry::{HookSet, PropSubtype, SocketDataType};
    use std::sync::Arc;

    fn registry() -> SocketTypeRegistry {
        SocketTypeRegistry::with_builtins()
    }

    fn add_float(
        tree: &mut InterfaceTree,
        reg: &SocketTypeRegistry,
        name: &str,
        parent: Option<ItemId>,
    ) -> ItemId {
        tree.add_socket(
            reg,
            &BuiltinTreeType::Geometry,
            name,
            "",
            "NodeSocketFloat",
            SocketFlags::input(),
            parent,
        )
        .unwrap()
    }

    #[test]
    fn new_tree_is_empty() {
        let tree = InterfaceTree::new();
        assert!(tree.is_empty());
        assert!(tree.items_tree().is_empty());
        assert!(tree.active_item().is_none());
        assert!(!tree.find_item(tree.root_id()));
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn add_socket_appends_to_root() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let a = add_float(&mut tree, &reg, "A", None);
        let b = add_float(&mut tree, &reg, "B", None);

        assert_eq!(tree.children(tree.root_id()), &[a, b]);
        assert_eq!(tree.item(a).unwrap().identifier(), "Socket_0");
        assert_eq!(tree.item(b).unwrap().identifier(), "Socket_1");
        assert_eq!(tree.find_item_parent(a), Some(tree.root_id()));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn add_socket_into_panel() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let panel = tree.add_panel("Inputs", None).unwrap();
        let s = add_float(&mut tree, &reg, "Value", Some(panel));

        assert_eq!(tree.children(panel), &[s]);
        assert_eq!(tree.find_item_parent(s), Some(panel));
        assert_eq!(tree.item(panel).unwrap().identifier(), "Panel_0");
    }

    #[test]
    fn add_into_socket_parent_is_invalid() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let s = add_float(&mut tree, &reg, "Value", None);

        assert_eq!(
            tree.add_panel("P", Some(s)),
            Err(InterfaceError::InvalidParent { parent: s })
        );
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn add_into_removed_panel_is_invalid() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let panel = tree.add_panel("Gone", None).unwrap();
        tree.remove_item(panel, false).unwrap();

        let result = tree.add_socket(
            &reg,
            &BuiltinTreeType::Geometry,
            "X",
            "",
            "NodeSocketFloat",
            SocketFlags::input(),
            Some(panel),
        );
        assert_eq!(result, Err(InterfaceError::InvalidParent { parent: panel }));
        assert!(tree.is_empty());
    }

    #[test]
    fn unknown_socket_type_falls_back() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let s = tree
            .add_socket(
                &reg,
                &BuiltinTreeType::Geometry,
                "Mystery",
                "",
                "NodeSocketDoesNotExist",
                SocketFlags::output(),
                None,
            )
            .unwrap();
        assert_eq!(tree.socket(s).unwrap().socket_type(), "NodeSocketFloat");
    }

    #[test]
    fn fallback_respects_registration_order() {
        let mut reg = SocketTypeRegistry::new();
        reg.register_builtin("NodeSocketShader", SocketDataType::Shader, PropSubtype::None);
        reg.register_builtin("NodeSocketColor", SocketDataType::Color, PropSubtype::None);
        reg.register_builtin("NodeSocketFloat", SocketDataType::Float, PropSubtype::None);

        let mut tree = InterfaceTree::new();
        // Geometry rejects shader sockets, so the first acceptable kind is Color.
        let s = tree
            .add_socket(
                &reg,
                &BuiltinTreeType::Geometry,
                "S",
                "",
                "Nope",
                SocketFlags::input(),
                None,
            )
            .unwrap();
        assert_eq!(tree.socket(s).unwrap().socket_type(), "NodeSocketColor");
    }

    #[test]
    fn unsupported_socket_type_without_fallback_fails() {
        let reg = SocketTypeRegistry::new();
        let mut tree = InterfaceTree::new();
        let result = tree.add_socket(
            &reg,
            &BuiltinTreeType::Geometry,
            "S",
            "",
            "NodeSocketFloat",
            SocketFlags::input(),
            None,
        );
        assert!(matches!(
            result,
            Err(InterfaceError::UnsupportedSocketKind { .. })
        ));
        assert!(tree.is_empty());
    }

    #[test]
    fn remove_preserves_sibling_order() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let a = add_float(&mut tree, &reg, "a", None);
        let x = add_float(&mut tree, &reg, "x", None);
        let b = add_float(&mut tree, &reg, "b", None);
        let c = add_float(&mut tree, &reg, "c", None);

        tree.remove_item(x, false).unwrap();

        assert_eq!(tree.children(tree.root_id()), &[a, b, c]);
        assert_eq!(tree.item(a).unwrap().name(), "a");
        assert!(!tree.find_item(x));
        assert!(tree.find_by_identifier("Socket_1").is_none());
    }

    #[test]
    fn remove_panel_with_hoist() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let a = add_float(&mut tree, &reg, "A", None);
        let p = tree.add_panel("P", None).unwrap();
        let b = add_float(&mut tree, &reg, "B", None);
        let s1 = add_float(&mut tree, &reg, "s1", Some(p));
        let s2 = add_float(&mut tree, &reg, "s2", Some(p));

        tree.remove_item(p, true).unwrap();

        assert_eq!(tree.children(tree.root_id()), &[a, s1, s2, b]);
        assert_eq!(tree.find_item_parent(s1), Some(tree.root_id()));
        assert!(!tree.find_item(p));
    }

    #[test]
    fn remove_panel_destroys_subtree() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let p = tree.add_panel("P", None).unwrap();
        let q = tree.add_panel("Q", Some(p)).unwrap();
        let s = add_float(&mut tree, &reg, "s", Some(q));

        tree.remove_item(p, false).unwrap();

        assert!(tree.is_empty());
        assert!(!tree.find_item(q));
        assert!(!tree.find_item(s));
        assert!(tree.socket(s).is_none());
    }

    #[test]
    fn remove_root_or_missing_fails() {
        let mut tree = InterfaceTree::new();
        let root = tree.root_id();
        assert_eq!(
            tree.remove_item(root, false),
            Err(InterfaceError::ItemNotFound { id: root })
        );
        assert_eq!(
            tree.remove_item(ItemId(42), true),
            Err(InterfaceError::ItemNotFound { id: ItemId(42) })
        );
    }

    #[test]
    fn removing_active_item_clears_it() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let x = add_float(&mut tree, &reg, "x", None);
        tree.set_active_item(Some(x));
        assert_eq!(tree.active_item(), Some(x));

        tree.remove_item(x, false).unwrap();
        assert_eq!(tree.active_item(), None);
    }

    #[test]
    fn removing_panel_clears_active_descendant() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let p = tree.add_panel("P", None).unwrap();
        let s = add_float(&mut tree, &reg, "s", Some(p));
        tree.set_active_item(Some(s));

        tree.remove_item(p, false).unwrap();
        assert_eq!(tree.active_item(), None);
    }

    #[test]
    fn hoisting_keeps_active_child() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let p = tree.add_panel("P", None).unwrap();
        let s = add_float(&mut tree, &reg, "s", Some(p));
        tree.set_active_item(Some(s));

        tree.remove_item(p, true).unwrap();
        assert_eq!(tree.active_item(), Some(s));
    }

    #[test]
    fn clear_items_keeps_root() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let p = tree.add_panel("P", None).unwrap();
        let s = add_float(&mut tree, &reg, "s", Some(p));
        tree.set_active_item(Some(s));

        tree.clear_items();

        assert!(tree.is_empty());
        assert!(tree.children(tree.root_id()).is_empty());
        assert_eq!(tree.active_item(), None);

        // Still usable afterwards.
        let t = add_float(&mut tree, &reg, "t", None);
        assert!(tree.find_item(t));
    }

    #[test]
    fn copy_places_clone_after_original() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let a = add_float(&mut tree, &reg, "a", None);
        let b = add_float(&mut tree, &reg, "b", None);

        let a2 = tree.copy(a).unwrap();

        assert_eq!(tree.children(tree.root_id()), &[a, a2, b]);
        assert_eq!(tree.item(a2).unwrap().name(), "a");
        assert_ne!(
            tree.item(a2).unwrap().identifier(),
            tree.item(a).unwrap().identifier()
        );
    }

    #[test]
    fn copy_of_panel_is_independent() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let p = tree.add_panel("P", None).unwrap();
        let s1 = add_float(&mut tree, &reg, "s1", Some(p));
        let s2 = add_float(&mut tree, &reg, "s2", Some(p));

        let p2 = tree.insert_item_copy(p, None, 0).unwrap();
        let clones = tree.children(p2).to_vec();

        assert_eq!(clones.len(), 2);
        let original_ids: Vec<String> = [s1, s2]
            .iter()
            .map(|&id| tree.item(id).unwrap().identifier().to_string())
            .collect();
        for &clone in &clones {
            let identifier = tree.item(clone).unwrap().identifier();
            assert!(!original_ids.iter().any(|o| o == identifier));
        }

        tree.item_mut(clones[0]).unwrap().set_name("renamed");
        tree.item_mut(p2).unwrap().set_name("P copy");
        assert_eq!(tree.item(s1).unwrap().name(), "s1");
        assert_eq!(tree.item(p).unwrap().name(), "P");
        assert_eq!(tree.children(tree.root_id()), &[p2, p]);
    }

    #[test]
    fn copy_panel_into_itself() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let p = tree.add_panel("P", None).unwrap();
        add_float(&mut tree, &reg, "s", Some(p));

        let copy = tree.insert_item_copy(p, Some(p), 99).unwrap();

        assert_eq!(tree.find_item_parent(copy), Some(p));
        assert_eq!(tree.children(p).len(), 2);
        assert_eq!(tree.children(copy).len(), 1);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn copy_into_socket_is_invalid() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let s = add_float(&mut tree, &reg, "s", None);
        let p = tree.add_panel("P", None).unwrap();
        let before = tree.outline();

        assert_eq!(
            tree.insert_item_copy(s, Some(s), 0),
            Err(InterfaceError::InvalidParent { parent: s })
        );
        assert_eq!(
            tree.insert_item_copy(p, Some(s), 0),
            Err(InterfaceError::InvalidParent { parent: s })
        );
        assert_eq!(tree.outline(), before);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn copy_into_removed_panel_is_invalid() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let s = add_float(&mut tree, &reg, "s", None);
        let gone = tree.add_panel("Gone", None).unwrap();
        tree.remove_item(gone, false).unwrap();
        let before = tree.outline();

        assert_eq!(
            tree.insert_item_copy(s, Some(gone), 0),
            Err(InterfaceError::InvalidParent { parent: gone })
        );
        assert_eq!(tree.outline(), before);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn copy_root_fails() {
        let mut tree = InterfaceTree::new();
        let root = tree.root_id();
        assert_eq!(
            tree.copy(root),
            Err(InterfaceError::ItemNotFound { id: root })
        );
    }

    #[test]
    fn copy_does_not_take_active_state() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let a = add_float(&mut tree, &reg, "a", None);
        tree.set_active_item(Some(a));
        tree.copy(a).unwrap();
        assert_eq!(tree.active_item(), Some(a));
    }

    #[test]
    fn move_item_clamps_index() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let a = add_float(&mut tree, &reg, "a", None);
        let b = add_float(&mut tree, &reg, "b", None);
        let c = add_float(&mut tree, &reg, "c", None);

        assert!(tree.move_item(a, 100));
        assert_eq!(tree.children(tree.root_id()), &[b, c, a]);

        assert!(tree.move_item(a, 1));
        assert_eq!(tree.children(tree.root_id()), &[b, a, c]);

        assert!(!tree.move_item(tree.root_id(), 0));
        assert!(!tree.move_item(ItemId(77), 0));
    }

    #[test]
    fn move_to_parent_and_back_restores_structure() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let a = add_float(&mut tree, &reg, "a", None);
        let x = add_float(&mut tree, &reg, "x", None);
        let p = tree.add_panel("P", None).unwrap();
        add_float(&mut tree, &reg, "inner", Some(p));

        let before = tree.outline();
        let original_index = tree.item_position(x).unwrap();

        tree.move_item_to_parent(x, Some(p), 0).unwrap();
        assert_eq!(tree.find_item_parent(x), Some(p));
        assert_eq!(tree.children(p)[0], x);
        assert_eq!(tree.children(tree.root_id())[0], a);

        tree.move_item_to_parent(x, None, original_index).unwrap();
        assert_eq!(tree.outline(), before);
    }

    #[test]
    fn move_into_descendant_is_rejected() {
        let mut tree = InterfaceTree::new();
        let p = tree.add_panel("P", None).unwrap();
        let q = tree.add_panel("Q", Some(p)).unwrap();
        let before = tree.outline();

        assert_eq!(
            tree.move_item_to_parent(p, Some(q), 0),
            Err(InterfaceError::CycleDetected { item: p, parent: q })
        );
        assert_eq!(
            tree.move_item_to_parent(p, Some(p), 0),
            Err(InterfaceError::CycleDetected { item: p, parent: p })
        );
        assert_eq!(tree.outline(), before);
        assert_eq!(tree.find_item_parent(q), Some(p));
    }

    #[test]
    fn move_to_invalid_parent_is_rejected() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let s = add_float(&mut tree, &reg, "s", None);
        let t = add_float(&mut tree, &reg, "t", None);

        assert_eq!(
            tree.move_item_to_parent(s, Some(t), 0),
            Err(InterfaceError::InvalidParent { parent: t })
        );
        assert_eq!(tree.children(tree.root_id()), &[s, t]);
    }

    #[test]
    fn flat_index_and_active_index() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let a = add_float(&mut tree, &reg, "a", None);
        let p = tree.add_panel("P", None).unwrap();
        let s = add_float(&mut tree, &reg, "s", Some(p));
        let b = add_float(&mut tree, &reg, "b", None);

        assert_eq!(tree.items_tree(), vec![a, p, s, b]);
        assert_eq!(tree.item_at(2), Some(s));
        assert!(tree.set_active_index(3));
        assert_eq!(tree.active_item(), Some(b));
        assert_eq!(tree.active_index(), Some(3));
        assert!(!tree.set_active_index(4));
    }

    #[test]
    fn stale_active_handle_reads_as_none() {
        let mut tree = InterfaceTree::new();
        tree.set_active_item(Some(ItemId(500)));
        assert_eq!(tree.active_item(), None);
        assert_eq!(tree.active_index(), None);
    }

    #[test]
    fn lookup_by_name_and_identifier() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let p = tree.add_panel("Group", None).unwrap();
        let s = add_float(&mut tree, &reg, "Scale", Some(p));

        assert_eq!(tree.find_by_name("Scale"), Some(s));
        assert_eq!(tree.find_by_name("Group"), Some(p));
        assert_eq!(tree.find_by_name("Missing"), None);
        assert_eq!(tree.find_by_identifier("Socket_1"), Some(s));
        assert_eq!(tree.ancestors(s).as_slice(), &[p, tree.root_id()]);
        assert!(tree.is_descendant(s, p));
        assert!(!tree.is_descendant(p, s));
    }

    #[test]
    fn identifiers_unique_after_copy_remove_copy() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let a = add_float(&mut tree, &reg, "a", None);
        let b = tree.copy(a).unwrap();
        tree.remove_item(b, false).unwrap();
        let c = tree.copy(a).unwrap();
        let d = tree.copy(c).unwrap();

        let mut seen = HashSet::new();
        for id in tree.items_tree() {
            assert!(seen.insert(tree.item(id).unwrap().identifier().to_string()));
        }
        assert_eq!(seen.len(), 3);
        assert!(tree.find_item(d));
    }

    #[test]
    fn set_socket_type_reseeds_default_value() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let s = add_float(&mut tree, &reg, "s", None);

        tree.set_socket_type(s, &reg, &BuiltinTreeType::Geometry, "NodeSocketBool").unwrap();
        let socket = tree.socket(s).unwrap();
        assert_eq!(socket.socket_type(), "NodeSocketBool");
        assert_eq!(socket.default_value, SocketValue::Bool { value: false });

        assert_eq!(
            tree.set_socket_type(s, &reg, &BuiltinTreeType::Geometry, "Unknown"),
            Err(InterfaceError::RegistryKeyUnknown {
                idname: "Unknown".into()
            })
        );
        assert_eq!(tree.socket(s).unwrap().socket_type(), "NodeSocketBool");

        let p = tree.add_panel("P", None).unwrap();
        assert_eq!(
            tree.set_socket_type(p, &reg, &BuiltinTreeType::Geometry, "NodeSocketInt"),
            Err(InterfaceError::NotASocket { id: p })
        );
    }

    #[test]
    fn set_socket_type_rejects_kinds_the_tree_type_does_not_offer() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let s = add_float(&mut tree, &reg, "s", None);

        for kind in ["NodeSocketFloatFactor", "NodeSocketShader"] {
            match tree.set_socket_type(s, &reg, &BuiltinTreeType::Geometry, kind) {
                Err(InterfaceError::UnsupportedSocketKind {
                    requested,
                    tree_type,
                }) => {
                    assert_eq!(requested, kind);
                    assert_eq!(tree_type, "GeometryNodeTree");
                }
                other => panic!("expected UnsupportedSocketKind, got {:?}", other),
            }
        }
        let socket = tree.socket(s).unwrap();
        assert_eq!(socket.socket_type(), "NodeSocketFloat");
        assert!(matches!(socket.default_value, SocketValue::Float(_)));

        tree.set_socket_type(s, &reg, &BuiltinTreeType::Shader, "NodeSocketShader")
            .unwrap();
        assert_eq!(tree.socket(s).unwrap().socket_type(), "NodeSocketShader");
    }

    #[test]
    fn unsigned_range_uses_zero_hard_min() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let s = add_float(&mut tree, &reg, "s", None);
        // Subtyped kinds are not offered for editing; they arrive through
        // stored data.
        let socket = tree.socket_mut(s).unwrap();
        socket.socket_type = "NodeSocketIntUnsigned".into();
        socket.default_value = SocketValue::for_type(SocketDataType::Int, PropSubtype::Unsigned);

        match tree.default_value_range(s, &reg).unwrap() {
            Some(ValueRange::Int { hard_min, .. }) => assert_eq!(hard_min, 0),
            other => panic!("expected int range, got {:?}", other),
        }
    }

    #[test]
    fn socket_extension_follows_registration() {
        let mut reg = registry();
        let mut tree = InterfaceTree::new();
        let s = add_float(&mut tree, &reg, "s", None);
        assert!(tree.socket_extension(s, &reg).is_none());

        reg.register(
            "NodeSocketFloat",
            PropSubtype::None,
            Some(SocketExtension::new("FloatUi", Arc::new(()), HookSet::all(), |_, _, _| {})),
        );
        assert_eq!(tree.socket_extension(s, &reg).unwrap().name(), "FloatUi");

        reg.unregister("NodeSocketFloat").unwrap();
        assert!(tree.socket_extension(s, &reg).is_none());
        assert_eq!(tree.socket(s).unwrap().socket_type(), "NodeSocketFloat");
    }

    #[test]
    fn serde_roundtrip_preserves_structure() {
        let reg = registry();
        let mut tree = InterfaceTree::new();
        let p = tree.add_panel("P", None).unwrap();
        let s = add_float(&mut tree, &reg, "s", Some(p));
        tree.set_active_item(Some(s));

        let json = serde_json::to_string(&tree).unwrap();
        let back: InterfaceTree = serde_json::from_str(&json).unwrap();

        assert!(back.validate().is_ok());
        assert_eq!(back.outline(), tree.outline());
        assert_eq!(back.active_item(), Some(s));

        // Identifier generation continues where it left off.
        let mut back = back;
        let t = add_float(&mut back, &reg, "t", None);
        assert_eq!(back.item(t).unwrap().identifier(), "Socket_2");
    }
}
