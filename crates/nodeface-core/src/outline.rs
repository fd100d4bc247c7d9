//! Deterministic nested snapshot of an interface.
//!
//! The tree itself stores items in an arena keyed by handle, which is not a
//! useful shape to print or compare. [`InterfaceOutline`] walks the hierarchy
//! in display order and records what a user would see.

use serde::{Deserialize, Serialize};

use crate::id::ItemId;
use crate::item::ItemKind;
use crate::tree::InterfaceTree;

/// One entry of an outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutlineItem {
    Socket {
        identifier: String,
        name: String,
        socket_type: String,
        is_input: bool,
        is_output: bool,
    },
    Panel {
        identifier: String,
        name: String,
        items: Vec<OutlineItem>,
    },
}

impl OutlineItem {
    pub fn identifier(&self) -> &str {
        match self {
            OutlineItem::Socket { identifier, .. } | OutlineItem::Panel { identifier, .. } => {
                identifier
            }
        }
    }
}

/// Snapshot of the whole interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceOutline {
    pub items: Vec<OutlineItem>,
    /// Identifier of the active item.
    pub active: Option<String>,
}

impl InterfaceOutline {
    pub fn from_tree(tree: &InterfaceTree) -> Self {
        let items = outline_children(tree, tree.root_id());
        let active = tree
            .active_item()
            .and_then(|id| tree.item(id))
            .map(|item| item.identifier().to_string());
        InterfaceOutline { items, active }
    }
}

fn outline_children(tree: &InterfaceTree, panel: ItemId) -> Vec<OutlineItem> {
    tree.children(panel)
        .iter()
        .filter_map(|&child| {
            let item = tree.item(child)?;
            let identifier = item.identifier().to_string();
            Some(match item.kind() {
                ItemKind::Socket(socket) => OutlineItem::Socket {
                    identifier,
                    name: socket.name.clone(),
                    socket_type: socket.socket_type().to_string(),
                    is_input: socket.is_input(),
                    is_output: socket.is_output(),
                },
                ItemKind::Panel(p) => OutlineItem::Panel {
                    identifier,
                    name: p.name.clone(),
                    items: outline_children(tree, child),
                },
            })
        })
        .collect()
}
