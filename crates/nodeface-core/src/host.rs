//! Contracts between the interface core and the host application.
//!
//! - [`TreeType`]: the graph type's socket acceptance predicate.
//! - [`ReportList`]: sink for human-readable failure messages.
//! - [`ChangeNotifier`]: what the caller invokes after a successful mutation.
//!   The core never calls it on its own, so a batch of edits can notify once.

use serde::{Deserialize, Serialize};

use crate::registry::{SocketDataType, SocketTypeInfo};
use crate::tree::InterfaceTree;

/// The kind of graph an interface belongs to.
pub trait TreeType {
    /// Idname of the graph type, used in diagnostics.
    fn idname(&self) -> &str;

    /// Whether sockets of this kind are legal in the graph type. Graph types
    /// without a restriction accept everything.
    fn accepts_socket_type(&self, _socket_type: &SocketTypeInfo) -> bool {
        true
    }
}

/// The graph types shipped with the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinTreeType {
    Geometry,
    Shader,
    Compositor,
    Texture,
}

impl BuiltinTreeType {
    pub const ALL: [BuiltinTreeType; 4] = [
        BuiltinTreeType::Geometry,
        BuiltinTreeType::Shader,
        BuiltinTreeType::Compositor,
        BuiltinTreeType::Texture,
    ];

    /// Looks up a builtin tree type by idname.
    pub fn from_idname(idname: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.idname() == idname)
    }
}

impl TreeType for BuiltinTreeType {
    fn idname(&self) -> &str {
        match self {
            BuiltinTreeType::Geometry => "GeometryNodeTree",
            BuiltinTreeType::Shader => "ShaderNodeTree",
            BuiltinTreeType::Compositor => "CompositorNodeTree",
            BuiltinTreeType::Texture => "TextureNodeTree",
        }
    }

    fn accepts_socket_type(&self, socket_type: &SocketTypeInfo) -> bool {
        use SocketDataType as D;
        let data_type = socket_type.data_type();
        match self {
            BuiltinTreeType::Geometry => !matches!(data_type, D::Shader | D::Custom),
            BuiltinTreeType::Shader => {
                matches!(data_type, D::Float | D::Vector | D::Color | D::Shader)
            }
            BuiltinTreeType::Compositor | BuiltinTreeType::Texture => {
                matches!(data_type, D::Float | D::Vector | D::Color)
            }
        }
    }
}

/// A host-defined graph type without socket restrictions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomTreeType {
    idname: String,
}

impl CustomTreeType {
    pub fn new(idname: impl Into<String>) -> Self {
        CustomTreeType {
            idname: idname.into(),
        }
    }
}

impl TreeType for CustomTreeType {
    fn idname(&self) -> &str {
        &self.idname
    }
}

/// Severity of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportLevel {
    Info,
    Warning,
    Error,
    /// The caller passed an argument the operation cannot accept.
    InvalidInput,
}

/// One user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub level: ReportLevel,
    pub message: String,
}

/// Ordered collection of reports produced during an edit session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportList {
    reports: Vec<Report>,
}

impl ReportList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, level: ReportLevel, message: impl Into<String>) {
        self.reports.push(Report {
            level,
            message: message.into(),
        });
    }

    /// Returns `true` if any report is an error or invalid-input report.
    pub fn has_errors(&self) -> bool {
        self.reports
            .iter()
            .any(|r| matches!(r.level, ReportLevel::Error | ReportLevel::InvalidInput))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Report> {
        self.reports.iter()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn clear(&mut self) {
        self.reports.clear();
    }
}

/// Receives the structural-change signal after an interface mutation.
pub trait ChangeNotifier {
    fn interface_changed(&mut self, tree: &InterfaceTree);
}

impl<F: FnMut(&InterfaceTree)> ChangeNotifier for F {
    fn interface_changed(&mut self, tree: &InterfaceTree) {
        self(tree)
    }
}

/// Dirty flag for the cached interface representation of a graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateTags {
    interface_dirty: bool,
    change_count: u32,
}

impl UpdateTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_interface_dirty(&self) -> bool {
        self.interface_dirty
    }

    /// Number of notifications received since creation.
    pub fn change_count(&self) -> u32 {
        self.change_count
    }

    /// Clears the dirty flag, returning its previous value.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.interface_dirty)
    }
}

impl ChangeNotifier for UpdateTags {
    fn interface_changed(&mut self, _tree: &InterfaceTree) {
        self.interface_dirty = true;
        self.change_count += 1;
    }
}
