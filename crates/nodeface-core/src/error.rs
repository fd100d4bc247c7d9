//! Core error types for nodeface-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of interface tree edits and socket type registration. Every
//! operation that returns one of these has left the tree untouched.

use crate::id::ItemId;
use thiserror::Error;

/// Errors produced by interface tree and socket type registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterfaceError {
    /// A parent reference is not a panel of this interface.
    #[error("parent is not part of the interface: ItemId({id})", id = parent.0)]
    InvalidParent { parent: ItemId },

    /// The requested socket type is unusable and no fallback type exists.
    #[error("could not find supported socket type for '{requested}' in '{tree_type}'")]
    UnsupportedSocketKind { requested: String, tree_type: String },

    /// The operand item is absent from the interface (or is the root panel).
    #[error("item not found: ItemId({id})", id = id.0)]
    ItemNotFound { id: ItemId },

    /// No socket type with this idname has ever been registered.
    #[error("socket type not registered: '{idname}'")]
    RegistryKeyUnknown { idname: String },

    /// A move would make a panel its own ancestor.
    #[error("cannot move ItemId({item}) into its own descendant ItemId({parent})", item = item.0, parent = parent.0)]
    CycleDetected { item: ItemId, parent: ItemId },

    /// A socket-only operation was given a panel.
    #[error("item is not a socket: ItemId({id})", id = id.0)]
    NotASocket { id: ItemId },

    /// An edit referenced an identifier that no item carries.
    #[error("no item with identifier '{identifier}'")]
    UnknownIdentifier { identifier: String },

    /// Structural bookkeeping disagrees with the item hierarchy.
    #[error("interface inconsistency: {reason}")]
    InconsistentTree { reason: String },
}
