//! Socket type registry: socket kind idnames mapped to behavior descriptors.
//!
//! A [`SocketTypeInfo`] holds the base metadata of a socket kind (data type
//! and property subtype) plus an optional runtime-registered
//! [`SocketExtension`] carrying host callbacks. Registration order is
//! preserved, since fallback resolution picks the *first* supported kind.
//!
//! Interface items refer to kinds by idname only. A socket whose kind is later
//! unregistered simply resolves to a descriptor without extension, and a kind
//! that was never registered resolves to nothing.
//!
//! # Descriptor states
//!
//! - *unregistered*: no descriptor for the idname.
//! - *builtin-only*: descriptor without extension.
//! - *extended*: descriptor with extension. [`SocketTypeRegistry::register`]
//!   moves builtin-only to extended (or replaces the extension),
//!   [`SocketTypeRegistry::unregister`] moves extended back to builtin-only.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::InterfaceError;
use crate::host::TreeType;

/// Value category of a socket kind. Decides the default value record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketDataType {
    Float,
    Int,
    Bool,
    Vector,
    Color,
    String,
    Rotation,
    Object,
    Image,
    Geometry,
    Collection,
    Texture,
    Material,
    Shader,
    Menu,
    /// Kinds introduced by runtime registration without a builtin base.
    Custom,
}

/// Property subtype qualifying a socket kind's data type.
///
/// Only kinds with subtype [`PropSubtype::None`] are offered as generic
/// interface socket kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PropSubtype {
    #[default]
    None,
    Unsigned,
    Percentage,
    Factor,
    Angle,
    Time,
    Distance,
    Translation,
    Direction,
    Velocity,
    Acceleration,
    Euler,
    Xyz,
}

/// The three optional hooks an extension can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtensionHook {
    /// Draw the socket's interface properties.
    Draw,
    /// Initialize a socket instance created from the interface declaration.
    InitSocket,
    /// Derive the interface declaration from an existing socket instance.
    FromSocket,
}

/// Which hooks an extension implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HookSet {
    pub draw: bool,
    pub init_socket: bool,
    pub from_socket: bool,
}

impl HookSet {
    /// All three hooks present.
    pub fn all() -> Self {
        HookSet {
            draw: true,
            init_socket: true,
            from_socket: true,
        }
    }

    pub fn contains(&self, hook: ExtensionHook) -> bool {
        match hook {
            ExtensionHook::Draw => self.draw,
            ExtensionHook::InitSocket => self.init_socket,
            ExtensionHook::FromSocket => self.from_socket,
        }
    }
}

/// Opaque host data an extension's callbacks operate on.
pub type ExtensionHandle = Arc<dyn Any + Send + Sync>;

type CallFn = Box<dyn Fn(&ExtensionHandle, ExtensionHook, &mut dyn Any) + Send + Sync>;
type ReleaseFn = Box<dyn FnOnce(ExtensionHandle) + Send + Sync>;
type Listener = Box<dyn Fn(&RegistryEvent) + Send + Sync>;

/// Runtime-registered behavior for a socket kind.
///
/// The registry never looks inside the handle or the hook arguments; it only
/// stores the record and hands it back by idname. The release routine runs
/// exactly once, when the record is dropped.
pub struct SocketExtension {
    name: String,
    handle: ExtensionHandle,
    hooks: HookSet,
    call: CallFn,
    release: Option<ReleaseFn>,
}

impl SocketExtension {
    /// Creates an extension record. `call` is invoked for every hook listed
    /// in `hooks`.
    pub fn new(
        name: impl Into<String>,
        handle: ExtensionHandle,
        hooks: HookSet,
        call: impl Fn(&ExtensionHandle, ExtensionHook, &mut dyn Any) + Send + Sync + 'static,
    ) -> Self {
        SocketExtension {
            name: name.into(),
            handle,
            hooks,
            call: Box::new(call),
            release: None,
        }
    }

    /// Attaches the routine that frees host resources behind the handle.
    pub fn with_release(
        mut self,
        release: impl FnOnce(ExtensionHandle) + Send + Sync + 'static,
    ) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    /// Name of the registered host type.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> &ExtensionHandle {
        &self.handle
    }

    pub fn hooks(&self) -> HookSet {
        self.hooks
    }

    /// Invokes a hook. Returns `false` without calling anything if the
    /// extension does not provide it.
    pub fn invoke(&self, hook: ExtensionHook, args: &mut dyn Any) -> bool {
        if !self.hooks.contains(hook) {
            return false;
        }
        (self.call)(&self.handle, hook, args);
        true
    }
}

impl Drop for SocketExtension {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(Arc::clone(&self.handle));
        }
    }
}

impl fmt::Debug for SocketExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketExtension")
            .field("name", &self.name)
            .field("hooks", &self.hooks)
            .field("has_release", &self.release.is_some())
            .finish_non_exhaustive()
    }
}

/// Lifecycle state of a registered descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketTypeState {
    BuiltinOnly,
    Extended,
}

/// Behavior descriptor of one socket kind.
#[derive(Debug)]
pub struct SocketTypeInfo {
    idname: String,
    data_type: SocketDataType,
    subtype: PropSubtype,
    builtin: bool,
    extension: Option<SocketExtension>,
}

impl SocketTypeInfo {
    pub fn idname(&self) -> &str {
        &self.idname
    }

    pub fn data_type(&self) -> SocketDataType {
        self.data_type
    }

    pub fn subtype(&self) -> PropSubtype {
        self.subtype
    }

    /// `true` if the base metadata was registered as a builtin type.
    pub fn is_builtin(&self) -> bool {
        self.builtin
    }

    pub fn extension(&self) -> Option<&SocketExtension> {
        self.extension.as_ref()
    }

    pub fn state(&self) -> SocketTypeState {
        if self.extension.is_some() {
            SocketTypeState::Extended
        } else {
            SocketTypeState::BuiltinOnly
        }
    }
}

/// Change emitted to the registry listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    Registered { idname: String },
    Unregistered { idname: String },
}

/// Idname-keyed store of socket kind descriptors, in registration order.
#[derive(Default)]
pub struct SocketTypeRegistry {
    types: IndexMap<String, SocketTypeInfo>,
    listener: Option<Listener>,
}

/// Builtin kinds in registration order.
const BUILTIN_TYPES: &[(&str, SocketDataType, PropSubtype)] = &[
    ("NodeSocketFloat", SocketDataType::Float, PropSubtype::None),
    ("NodeSocketFloatFactor", SocketDataType::Float, PropSubtype::Factor),
    ("NodeSocketFloatUnsigned", SocketDataType::Float, PropSubtype::Unsigned),
    ("NodeSocketFloatAngle", SocketDataType::Float, PropSubtype::Angle),
    ("NodeSocketInt", SocketDataType::Int, PropSubtype::None),
    ("NodeSocketIntUnsigned", SocketDataType::Int, PropSubtype::Unsigned),
    ("NodeSocketBool", SocketDataType::Bool, PropSubtype::None),
    ("NodeSocketVector", SocketDataType::Vector, PropSubtype::None),
    ("NodeSocketVectorTranslation", SocketDataType::Vector, PropSubtype::Translation),
    ("NodeSocketRotation", SocketDataType::Rotation, PropSubtype::None),
    ("NodeSocketColor", SocketDataType::Color, PropSubtype::None),
    ("NodeSocketString", SocketDataType::String, PropSubtype::None),
    ("NodeSocketMenu", SocketDataType::Menu, PropSubtype::None),
    ("NodeSocketObject", SocketDataType::Object, PropSubtype::None),
    ("NodeSocketImage", SocketDataType::Image, PropSubtype::None),
    ("NodeSocketGeometry", SocketDataType::Geometry, PropSubtype::None),
    ("NodeSocketCollection", SocketDataType::Collection, PropSubtype::None),
    ("NodeSocketTexture", SocketDataType::Texture, PropSubtype::None),
    ("NodeSocketMaterial", SocketDataType::Material, PropSubtype::None),
    ("NodeSocketShader", SocketDataType::Shader, PropSubtype::None),
];

impl SocketTypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the builtin socket kinds pre-registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for &(idname, data_type, subtype) in BUILTIN_TYPES {
            registry.register_builtin(idname, data_type, subtype);
        }
        registry
    }

    /// Installs the observer notified after register/unregister.
    pub fn set_listener(&mut self, listener: impl Fn(&RegistryEvent) + Send + Sync + 'static) {
        self.listener = Some(Box::new(listener));
    }

    fn emit(&self, event: RegistryEvent) {
        if let Some(listener) = &self.listener {
            listener(&event);
        }
    }

    /// Registers (or redefines) the base metadata of a builtin kind. An
    /// existing extension is kept.
    pub fn register_builtin(
        &mut self,
        idname: &str,
        data_type: SocketDataType,
        subtype: PropSubtype,
    ) -> &SocketTypeInfo {
        let entry = self
            .types
            .entry(idname.to_string())
            .or_insert_with(|| SocketTypeInfo {
                idname: idname.to_string(),
                data_type,
                subtype,
                builtin: true,
                extension: None,
            });
        entry.data_type = data_type;
        entry.subtype = subtype;
        entry.builtin = true;
        entry
    }

    /// Registers a socket kind with an optional extension.
    ///
    /// An existing descriptor keeps its base metadata; only its extension is
    /// replaced, and the old extension is released before the new one is
    /// installed. A new idname gets a fresh descriptor with data type
    /// [`SocketDataType::Custom`] and the given subtype.
    pub fn register(
        &mut self,
        idname: &str,
        subtype: PropSubtype,
        extension: Option<SocketExtension>,
    ) -> &SocketTypeInfo {
        let (index, created) = match self.types.get_index_of(idname) {
            Some(index) => (index, false),
            None => {
                let (index, _) = self.types.insert_full(
                    idname.to_string(),
                    SocketTypeInfo {
                        idname: idname.to_string(),
                        data_type: SocketDataType::Custom,
                        subtype,
                        builtin: false,
                        extension: None,
                    },
                );
                (index, true)
            }
        };

        let info = &mut self.types[index];
        // Release the previous record before the replacement goes in.
        drop(info.extension.take());
        info.extension = extension;

        tracing::info!(
            idname,
            created,
            extended = info.extension.is_some(),
            "registered socket type"
        );
        self.emit(RegistryEvent::Registered {
            idname: idname.to_string(),
        });
        &self.types[index]
    }

    /// Releases the extension of a registered kind. The descriptor and its
    /// base metadata stay.
    ///
    /// Returns whether an extension was released, or
    /// [`InterfaceError::RegistryKeyUnknown`] if the idname was never
    /// registered.
    pub fn unregister(&mut self, idname: &str) -> Result<bool, InterfaceError> {
        let info = self
            .types
            .get_mut(idname)
            .ok_or_else(|| InterfaceError::RegistryKeyUnknown {
                idname: idname.to_string(),
            })?;

        let released = info.extension.take();
        let had_extension = released.is_some();
        drop(released);

        tracing::info!(idname, had_extension, "unregistered socket type");
        self.emit(RegistryEvent::Unregistered {
            idname: idname.to_string(),
        });
        Ok(had_extension)
    }

    /// Looks up a descriptor by idname.
    pub fn find(&self, idname: &str) -> Option<&SocketTypeInfo> {
        self.types.get(idname)
    }

    pub fn contains(&self, idname: &str) -> bool {
        self.types.contains_key(idname)
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterates descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &SocketTypeInfo> {
        self.types.values()
    }

    /// A kind is usable as a generic interface socket if it is registered,
    /// has no subtype qualification and the tree type accepts it.
    pub fn is_supported(&self, tree_type: &dyn TreeType, idname: &str) -> bool {
        self.find(idname)
            .is_some_and(|info| Self::info_supported(tree_type, info))
    }

    fn info_supported(tree_type: &dyn TreeType, info: &SocketTypeInfo) -> bool {
        info.subtype == PropSubtype::None && tree_type.accepts_socket_type(info)
    }

    /// First supported kind in registration order.
    pub fn find_first_supported(&self, tree_type: &dyn TreeType) -> Option<&SocketTypeInfo> {
        self.iter()
            .find(|info| Self::info_supported(tree_type, info))
    }

    /// All kinds the tree type can offer in a socket kind picker.
    pub fn supported_types<'a>(
        &'a self,
        tree_type: &'a dyn TreeType,
    ) -> impl Iterator<Item = &'a SocketTypeInfo> + 'a {
        self.iter()
            .filter(move |info| Self::info_supported(tree_type, info))
    }

    /// Resolves the kind a new socket gets: the requested one if supported,
    /// otherwise the first supported kind.
    pub fn resolve_socket_type(
        &self,
        tree_type: &dyn TreeType,
        requested: &str,
    ) -> Result<&SocketTypeInfo, InterfaceError> {
        if let Some(info) = self.find(requested) {
            if Self::info_supported(tree_type, info) {
                return Ok(info);
            }
        }
        self.find_first_supported(tree_type)
            .ok_or_else(|| InterfaceError::UnsupportedSocketKind {
                requested: requested.to_string(),
                tree_type: tree_type.idname().to_string(),
            })
    }
}

impl fmt::Debug for SocketTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketTypeRegistry")
            .field("types", &self.types)
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

static GLOBAL_REGISTRY: Lazy<RwLock<SocketTypeRegistry>> =
    Lazy::new(|| RwLock::new(SocketTypeRegistry::with_builtins()));

/// The process-wide registry, seeded with the builtin kinds on first use.
pub fn global() -> &'static RwLock<SocketTypeRegistry> {
    &GLOBAL_REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{BuiltinTreeType, CustomTreeType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn counting_extension(name: &str, released: Arc<AtomicUsize>) -> SocketExtension {
        SocketExtension::new(name, Arc::new(()), HookSet::all(), |_, _, _| {})
            .with_release(move |_| {
                released.fetch_add(1, Ordering::SeqCst);
            })
    }

    #[test]
    fn builtins_are_registered_in_order() {
        let reg = SocketTypeRegistry::with_builtins();
        assert_eq!(reg.len(), BUILTIN_TYPES.len());
        let first = reg.iter().next().unwrap();
        assert_eq!(first.idname(), "NodeSocketFloat");
        assert!(first.is_builtin());
        assert_eq!(first.state(), SocketTypeState::BuiltinOnly);
    }

    #[test]
    fn register_new_kind_creates_custom_descriptor() {
        let mut reg = SocketTypeRegistry::new();
        let info = reg.register("MySocket", PropSubtype::None, None);
        assert_eq!(info.data_type(), SocketDataType::Custom);
        assert!(!info.is_builtin());
        assert!(reg.contains("MySocket"));
    }

    #[test]
    fn register_existing_keeps_base_metadata() {
        let mut reg = SocketTypeRegistry::with_builtins();
        let released = Arc::new(AtomicUsize::new(0));

        let info = reg.register(
            "NodeSocketFloatFactor",
            PropSubtype::None,
            Some(counting_extension("Ext", released.clone())),
        );
        assert_eq!(info.data_type(), SocketDataType::Float);
        assert_eq!(info.subtype(), PropSubtype::Factor);
        assert_eq!(info.state(), SocketTypeState::Extended);
        assert_eq!(released.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn replacing_extension_releases_old_one_first() {
        let mut reg = SocketTypeRegistry::with_builtins();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        reg.register(
            "NodeSocketFloat",
            PropSubtype::None,
            Some(counting_extension("A", first.clone())),
        );
        reg.register(
            "NodeSocketFloat",
            PropSubtype::None,
            Some(counting_extension("B", second.clone())),
        );

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
        let ext = reg.find("NodeSocketFloat").unwrap().extension().unwrap();
        assert_eq!(ext.name(), "B");
    }

    #[test]
    fn unregister_releases_extension_only() {
        let mut reg = SocketTypeRegistry::with_builtins();
        let released = Arc::new(AtomicUsize::new(0));
        reg.register(
            "NodeSocketInt",
            PropSubtype::None,
            Some(counting_extension("IntExt", released.clone())),
        );

        assert_eq!(reg.unregister("NodeSocketInt"), Ok(true));
        assert_eq!(released.load(Ordering::SeqCst), 1);

        let info = reg.find("NodeSocketInt").unwrap();
        assert_eq!(info.state(), SocketTypeState::BuiltinOnly);
        assert_eq!(info.data_type(), SocketDataType::Int);

        // Nothing left to release.
        assert_eq!(reg.unregister("NodeSocketInt"), Ok(false));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregister_unknown_kind_fails() {
        let mut reg = SocketTypeRegistry::with_builtins();
        match reg.unregister("NoSuchSocket") {
            Err(InterfaceError::RegistryKeyUnknown { idname }) => {
                assert_eq!(idname, "NoSuchSocket");
            }
            other => panic!("expected RegistryKeyUnknown, got {:?}", other),
        }
    }

    #[test]
    fn listener_sees_register_and_unregister() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();

        let mut reg = SocketTypeRegistry::with_builtins();
        reg.set_listener(move |event| sink.lock().unwrap().push(event.clone()));

        reg.register("Custom", PropSubtype::None, None);
        reg.unregister("Custom").unwrap();
        let _ = reg.unregister("Missing");

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                RegistryEvent::Registered {
                    idname: "Custom".into()
                },
                RegistryEvent::Unregistered {
                    idname: "Custom".into()
                },
            ]
        );
    }

    #[test]
    fn invoke_only_calls_provided_hooks() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let hooks = HookSet {
            draw: true,
            init_socket: false,
            from_socket: false,
        };
        let ext = SocketExtension::new("Drawn", Arc::new(7_u32), hooks, move |handle, hook, args| {
            let value = handle.downcast_ref::<u32>().copied();
            if let Some(out) = args.downcast_mut::<Vec<u32>>() {
                out.extend(value);
            }
            sink.lock().unwrap().push(hook);
        });

        let mut out: Vec<u32> = Vec::new();
        assert!(ext.invoke(ExtensionHook::Draw, &mut out));
        assert!(!ext.invoke(ExtensionHook::InitSocket, &mut out));
        assert_eq!(out, vec![7]);
        assert_eq!(*calls.lock().unwrap(), vec![ExtensionHook::Draw]);
    }

    #[test]
    fn subtyped_kinds_are_not_supported() {
        let reg = SocketTypeRegistry::with_builtins();
        let tree = BuiltinTreeType::Geometry;
        assert!(reg.is_supported(&tree, "NodeSocketFloat"));
        assert!(!reg.is_supported(&tree, "NodeSocketFloatFactor"));
        assert!(!reg.is_supported(&tree, "Unknown"));
    }

    #[test]
    fn resolve_falls_back_to_first_supported() {
        let reg = SocketTypeRegistry::with_builtins();
        let tree = BuiltinTreeType::Shader;

        let info = reg.resolve_socket_type(&tree, "NodeSocketGeometry").unwrap();
        assert_eq!(info.idname(), "NodeSocketFloat");

        let info = reg.resolve_socket_type(&tree, "NodeSocketColor").unwrap();
        assert_eq!(info.idname(), "NodeSocketColor");
    }

    #[test]
    fn resolve_without_candidates_errors() {
        let mut reg = SocketTypeRegistry::new();
        reg.register_builtin("NodeSocketFloatFactor", SocketDataType::Float, PropSubtype::Factor);
        let tree = CustomTreeType::new("MyTree");

        match reg.resolve_socket_type(&tree, "Whatever") {
            Err(InterfaceError::UnsupportedSocketKind { requested, tree_type }) => {
                assert_eq!(requested, "Whatever");
                assert_eq!(tree_type, "MyTree");
            }
            other => panic!("expected UnsupportedSocketKind, got {:?}", other),
        }
    }

    #[test]
    fn supported_types_respect_tree_predicate() {
        let reg = SocketTypeRegistry::with_builtins();
        let names: Vec<&str> = reg
            .supported_types(&BuiltinTreeType::Compositor)
            .map(|info| info.idname())
            .collect();
        assert_eq!(names, vec!["NodeSocketFloat", "NodeSocketVector", "NodeSocketColor"]);
    }

    #[test]
    fn global_registry_has_builtins() {
        let reg = global().read().unwrap();
        assert!(reg.contains("NodeSocketGeometry"));
    }
}
