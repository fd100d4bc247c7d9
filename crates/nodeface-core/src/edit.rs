//! Batched interface edits with user-facing reporting.
//!
//! [`InterfaceEdit`] is a serializable description of one interface
//! operation, with items referenced by identifier. [`EditSession`] applies
//! edits to a tree, translates failures into [`ReportList`] messages, and
//! notifies the host once when the batch is finished.
//!
//! Notification is two-phase: [`EditSession::apply`] only mutates and counts
//! structural changes, [`EditSession::finish`] signals the
//! [`ChangeNotifier`] if anything changed.

use serde::{Deserialize, Serialize};

use crate::error::InterfaceError;
use crate::host::{ChangeNotifier, ReportLevel, ReportList, TreeType};
use crate::id::ItemId;
use crate::item::SocketFlags;
use crate::registry::SocketTypeRegistry;
use crate::tree::InterfaceTree;

fn default_true() -> bool {
    true
}

/// One interface operation. Items and parents are referenced by identifier;
/// a missing parent means the root panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum InterfaceEdit {
    AddSocket {
        name: String,
        #[serde(default)]
        description: String,
        socket_type: String,
        #[serde(default)]
        is_input: bool,
        #[serde(default)]
        is_output: bool,
        #[serde(default)]
        parent: Option<String>,
    },
    AddPanel {
        name: String,
        #[serde(default)]
        parent: Option<String>,
    },
    /// Duplicate an item right after itself.
    Copy { item: String },
    CopyToParent {
        item: String,
        #[serde(default)]
        parent: Option<String>,
        index: usize,
    },
    Remove {
        item: String,
        #[serde(default = "default_true")]
        move_content_to_parent: bool,
    },
    Clear,
    Move { item: String, to_index: usize },
    MoveToParent {
        item: String,
        #[serde(default)]
        parent: Option<String>,
        to_index: usize,
    },
    SetActive { item: Option<String> },
    SetSocketType { item: String, socket_type: String },
    Rename { item: String, name: String },
}

impl InterfaceEdit {
    /// Short operation name for logs.
    pub fn op_name(&self) -> &'static str {
        match self {
            InterfaceEdit::AddSocket { .. } => "add_socket",
            InterfaceEdit::AddPanel { .. } => "add_panel",
            InterfaceEdit::Copy { .. } => "copy",
            InterfaceEdit::CopyToParent { .. } => "copy_to_parent",
            InterfaceEdit::Remove { .. } => "remove",
            InterfaceEdit::Clear => "clear",
            InterfaceEdit::Move { .. } => "move",
            InterfaceEdit::MoveToParent { .. } => "move_to_parent",
            InterfaceEdit::SetActive { .. } => "set_active",
            InterfaceEdit::SetSocketType { .. } => "set_socket_type",
            InterfaceEdit::Rename { .. } => "rename",
        }
    }

    /// Whether a successful application changes the declared interface.
    /// Selecting the active item does not.
    pub fn is_structural(&self) -> bool {
        !matches!(self, InterfaceEdit::SetActive { .. })
    }
}

/// Result of a successfully applied edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditOutcome {
    /// A new item was created (add or copy).
    Created(ItemId),
    Modified,
    /// The edit was valid but had nothing to do.
    Unchanged,
}

/// Applies edits to one tree and collects reports.
pub struct EditSession<'a> {
    tree: &'a mut InterfaceTree,
    registry: &'a SocketTypeRegistry,
    tree_type: &'a dyn TreeType,
    reports: ReportList,
    applied: usize,
}

impl<'a> EditSession<'a> {
    pub fn new(
        tree: &'a mut InterfaceTree,
        registry: &'a SocketTypeRegistry,
        tree_type: &'a dyn TreeType,
    ) -> Self {
        EditSession {
            tree,
            registry,
            tree_type,
            reports: ReportList::new(),
            applied: 0,
        }
    }

    pub fn tree(&self) -> &InterfaceTree {
        self.tree
    }

    pub fn reports(&self) -> &ReportList {
        &self.reports
    }

    /// Number of structural changes applied so far.
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Applies one edit. On failure the tree is untouched, a report is added
    /// and the error is returned.
    pub fn apply(&mut self, edit: &InterfaceEdit) -> Result<EditOutcome, InterfaceError> {
        match self.apply_inner(edit) {
            Ok(outcome) => {
                if outcome != EditOutcome::Unchanged && edit.is_structural() {
                    self.applied += 1;
                }
                tracing::debug!(op = edit.op_name(), ?outcome, "applied edit");
                Ok(outcome)
            }
            Err(err) => {
                tracing::warn!(op = edit.op_name(), error = %err, "edit failed");
                let (level, message) = report_for(edit, &err);
                self.reports.report(level, message);
                Err(err)
            }
        }
    }

    /// Applies edits in order, continuing past failures. Returns the number
    /// of edits that failed.
    pub fn apply_all<'e>(&mut self, edits: impl IntoIterator<Item = &'e InterfaceEdit>) -> usize {
        edits
            .into_iter()
            .filter(|edit| self.apply(edit).is_err())
            .count()
    }

    /// Ends the session, notifying once if anything structural changed.
    pub fn finish(self, notifier: &mut dyn ChangeNotifier) -> ReportList {
        if self.applied > 0 {
            tracing::debug!(changes = self.applied, "interface changed");
            notifier.interface_changed(self.tree);
        }
        self.reports
    }

    fn lookup(&self, identifier: &str) -> Result<ItemId, InterfaceError> {
        self.tree
            .find_by_identifier(identifier)
            .ok_or_else(|| InterfaceError::UnknownIdentifier {
                identifier: identifier.to_string(),
            })
    }

    fn lookup_parent(&self, parent: Option<&str>) -> Result<Option<ItemId>, InterfaceError> {
        parent.map(|identifier| self.lookup(identifier)).transpose()
    }

    fn apply_inner(&mut self, edit: &InterfaceEdit) -> Result<EditOutcome, InterfaceError> {
        match edit {
            InterfaceEdit::AddSocket {
                name,
                description,
                socket_type,
                is_input,
                is_output,
                parent,
            } => {
                let parent = self.lookup_parent(parent.as_deref())?;
                let id = self.tree.add_socket(
                    self.registry,
                    self.tree_type,
                    name,
                    description,
                    socket_type,
                    SocketFlags::in_out(*is_input, *is_output),
                    parent,
                )?;
                Ok(EditOutcome::Created(id))
            }
            InterfaceEdit::AddPanel { name, parent } => {
                let parent = self.lookup_parent(parent.as_deref())?;
                let id = self.tree.add_panel(name, parent)?;
                Ok(EditOutcome::Created(id))
            }
            InterfaceEdit::Copy { item } => {
                let item = self.lookup(item)?;
                Ok(EditOutcome::Created(self.tree.copy(item)?))
            }
            InterfaceEdit::CopyToParent {
                item,
                parent,
                index,
            } => {
                let item = self.lookup(item)?;
                let parent = self.lookup_parent(parent.as_deref())?;
                let id = self.tree.insert_item_copy(item, parent, *index)?;
                Ok(EditOutcome::Created(id))
            }
            InterfaceEdit::Remove {
                item,
                move_content_to_parent,
            } => {
                let item = self.lookup(item)?;
                self.tree.remove_item(item, *move_content_to_parent)?;
                Ok(EditOutcome::Modified)
            }
            InterfaceEdit::Clear => {
                if self.tree.is_empty() {
                    return Ok(EditOutcome::Unchanged);
                }
                self.tree.clear_items();
                Ok(EditOutcome::Modified)
            }
            InterfaceEdit::Move { item, to_index } => {
                let item = self.lookup(item)?;
                let before = self.tree.item_position(item);
                if !self.tree.move_item(item, *to_index) {
                    return Err(InterfaceError::ItemNotFound { id: item });
                }
                if self.tree.item_position(item) == before {
                    Ok(EditOutcome::Unchanged)
                } else {
                    Ok(EditOutcome::Modified)
                }
            }
            InterfaceEdit::MoveToParent {
                item,
                parent,
                to_index,
            } => {
                let item = self.lookup(item)?;
                let parent = self.lookup_parent(parent.as_deref())?;
                let before = (self.tree.find_item_parent(item), self.tree.item_position(item));
                self.tree.move_item_to_parent(item, parent, *to_index)?;
                let after = (self.tree.find_item_parent(item), self.tree.item_position(item));
                if after == before {
                    Ok(EditOutcome::Unchanged)
                } else {
                    Ok(EditOutcome::Modified)
                }
            }
            InterfaceEdit::SetActive { item } => {
                let item = self.lookup_parent(item.as_deref())?;
                self.tree.set_active_item(item);
                Ok(EditOutcome::Modified)
            }
            InterfaceEdit::SetSocketType { item, socket_type } => {
                let item = self.lookup(item)?;
                let current = self.tree.socket(item).map(|s| s.socket_type().to_string());
                self.tree
                    .set_socket_type(item, self.registry, self.tree_type, socket_type)?;
                if current.as_deref() == Some(socket_type.as_str()) {
                    Ok(EditOutcome::Unchanged)
                } else {
                    Ok(EditOutcome::Modified)
                }
            }
            InterfaceEdit::Rename { item, name } => {
                let item = self.lookup(item)?;
                let entry = self
                    .tree
                    .item_mut(item)
                    .ok_or(InterfaceError::ItemNotFound { id: item })?;
                if entry.name() == name {
                    return Ok(EditOutcome::Unchanged);
                }
                entry.set_name(name.as_str());
                Ok(EditOutcome::Modified)
            }
        }
    }
}

/// User-facing message for a failed edit.
fn report_for(edit: &InterfaceEdit, err: &InterfaceError) -> (ReportLevel, String) {
    match err {
        InterfaceError::InvalidParent { .. } => (
            ReportLevel::InvalidInput,
            "Parent is not part of the interface".to_string(),
        ),
        InterfaceError::UnsupportedSocketKind { .. } => (
            ReportLevel::Error,
            "Could not find supported socket type".to_string(),
        ),
        _ if matches!(
            edit,
            InterfaceEdit::Copy { .. } | InterfaceEdit::CopyToParent { .. }
        ) =>
        {
            (ReportLevel::Error, "Unable to copy item".to_string())
        }
        other => (ReportLevel::Error, other.to_string()),
    }
}
