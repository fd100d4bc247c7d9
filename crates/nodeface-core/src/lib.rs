pub mod error;
pub mod id;
pub mod value;
pub mod registry;
pub mod item;
pub mod host;
pub mod tree;
pub mod outline;
pub mod edit;

// Re-export commonly used types
pub use error::InterfaceError;
pub use id::ItemId;
pub use value::{Bounds, SocketValue, ValueRange};
pub use registry::{
    ExtensionHook, HookSet, PropSubtype, RegistryEvent, SocketDataType, SocketExtension,
    SocketTypeInfo, SocketTypeRegistry, SocketTypeState,
};
pub use item::{
    AttrDomain, InterfaceItem, InterfacePanel, InterfaceSocket, ItemKind, ItemType, PropertyValue,
    SocketFlags,
};
pub use host::{
    BuiltinTreeType, ChangeNotifier, CustomTreeType, Report, ReportLevel, ReportList, TreeType,
    UpdateTags,
};
pub use tree::InterfaceTree;
pub use outline::{InterfaceOutline, OutlineItem};
pub use edit::{EditOutcome, EditSession, InterfaceEdit};
