//! Interface items: sockets and panels.
//!
//! An [`InterfaceItem`] is a tagged union over [`InterfaceSocket`] (a leaf
//! declaring one input and/or output) and [`InterfacePanel`] (an ordered group
//! of child items). Items are only created and destroyed through
//! [`InterfaceTree`](crate::tree::InterfaceTree); the fields that take part in
//! tree invariants (identifier, child order, socket type) are read-only here.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::id::ItemId;
use crate::registry::SocketTypeInfo;
use crate::value::SocketValue;

/// Direction and display flags of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SocketFlags {
    pub is_input: bool,
    pub is_output: bool,
    /// Hide the input value even when the socket is not connected.
    pub hide_value: bool,
    /// Don't show the input value in the modifier interface.
    pub hide_in_modifier: bool,
}

impl SocketFlags {
    pub fn input() -> Self {
        Self::in_out(true, false)
    }

    pub fn output() -> Self {
        Self::in_out(false, true)
    }

    pub fn in_out(is_input: bool, is_output: bool) -> Self {
        SocketFlags {
            is_input,
            is_output,
            ..Self::default()
        }
    }
}

/// Attribute domain the modifier binding layer uses for attribute outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AttrDomain {
    #[default]
    Auto,
    Point,
    Edge,
    Face,
    FaceCorner,
    Curve,
    Instance,
}

/// A custom property attached to a socket by scripts or extensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    FloatArray(Vec<f64>),
}

/// A socket declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceSocket {
    pub name: String,
    pub description: String,
    pub(crate) socket_type: String,
    pub flags: SocketFlags,
    pub attribute_domain: AttrDomain,
    pub default_attribute_name: String,
    pub default_value: SocketValue,
    /// Open bag of custom named properties, in insertion order.
    pub properties: IndexMap<String, PropertyValue>,
}

impl InterfaceSocket {
    pub(crate) fn new(
        name: &str,
        description: &str,
        typeinfo: &SocketTypeInfo,
        flags: SocketFlags,
    ) -> Self {
        InterfaceSocket {
            name: name.to_string(),
            description: description.to_string(),
            socket_type: typeinfo.idname().to_string(),
            flags,
            attribute_domain: AttrDomain::default(),
            default_attribute_name: String::new(),
            default_value: SocketValue::for_type(typeinfo.data_type(), typeinfo.subtype()),
            properties: IndexMap::new(),
        }
    }

    /// Idname of the socket kind in the registry.
    pub fn socket_type(&self) -> &str {
        &self.socket_type
    }

    pub fn is_input(&self) -> bool {
        self.flags.is_input
    }

    pub fn is_output(&self) -> bool {
        self.flags.is_output
    }
}

/// A panel grouping an ordered sequence of child items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfacePanel {
    pub name: String,
    pub description: String,
    pub default_closed: bool,
    pub(crate) items: Vec<ItemId>,
}

impl InterfacePanel {
    pub(crate) fn new(name: &str) -> Self {
        InterfacePanel {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Child items in display order.
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    /// Same panel without children, for copying.
    pub(crate) fn without_items(&self) -> Self {
        InterfacePanel {
            name: self.name.clone(),
            description: self.description.clone(),
            default_closed: self.default_closed,
            items: Vec::new(),
        }
    }
}

/// Discriminator of an item without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    Socket,
    Panel,
}

impl ItemType {
    /// Prefix for generated identifiers.
    pub fn identifier_prefix(self) -> &'static str {
        match self {
            ItemType::Socket => "Socket",
            ItemType::Panel => "Panel",
        }
    }
}

/// Payload of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemKind {
    Socket(InterfaceSocket),
    Panel(InterfacePanel),
}

impl ItemKind {
    pub fn item_type(&self) -> ItemType {
        match self {
            ItemKind::Socket(_) => ItemType::Socket,
            ItemKind::Panel(_) => ItemType::Panel,
        }
    }
}

/// A node in the interface tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceItem {
    pub(crate) id: ItemId,
    pub(crate) identifier: String,
    pub(crate) kind: ItemKind,
}

impl InterfaceItem {
    /// Handle of this item in its tree.
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Tree-unique identifier, fixed at creation.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn kind(&self) -> &ItemKind {
        &self.kind
    }

    pub fn item_type(&self) -> ItemType {
        self.kind.item_type()
    }

    pub fn name(&self) -> &str {
        match &self.kind {
            ItemKind::Socket(socket) => &socket.name,
            ItemKind::Panel(panel) => &panel.name,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        match &mut self.kind {
            ItemKind::Socket(socket) => socket.name = name.into(),
            ItemKind::Panel(panel) => panel.name = name.into(),
        }
    }

    pub fn as_socket(&self) -> Option<&InterfaceSocket> {
        match &self.kind {
            ItemKind::Socket(socket) => Some(socket),
            ItemKind::Panel(_) => None,
        }
    }

    pub fn as_socket_mut(&mut self) -> Option<&mut InterfaceSocket> {
        match &mut self.kind {
            ItemKind::Socket(socket) => Some(socket),
            ItemKind::Panel(_) => None,
        }
    }

    pub fn as_panel(&self) -> Option<&InterfacePanel> {
        match &self.kind {
            ItemKind::Panel(panel) => Some(panel),
            ItemKind::Socket(_) => None,
        }
    }

    pub fn as_panel_mut(&mut self) -> Option<&mut InterfacePanel> {
        match &mut self.kind {
            ItemKind::Panel(panel) => Some(panel),
            ItemKind::Socket(_) => None,
        }
    }

    pub fn is_panel(&self) -> bool {
        matches!(self.kind, ItemKind::Panel(_))
    }

    pub fn is_socket(&self) -> bool {
        matches!(self.kind, ItemKind::Socket(_))
    }
}
