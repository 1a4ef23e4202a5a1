//! Driver type identity reporting.
//!
//! Code written against an async driver sometimes checks which driver type it was handed.
//! Facades implement [`Masquerade`] to report the identity of the driver type they stand in
//! for. The identity is looked up by name in a process-wide registry, so a facade only
//! masquerades when the named type is actually known; an unknown name simply means no
//! masquerade.
//!
//! With the `mongodb` feature the async driver's handle types are registered up front.
//! Other types can be registered at any time with [`register_driver_type`].

use std::{
    any::{TypeId, type_name},
    collections::HashMap,
};

use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// Identity of a registered driver type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeIdentity {
    /// Fully qualified name the type is registered under (`mongodb::Client`).
    pub name: &'static str,
    pub type_id: TypeId,
    /// Compiler-reported name of the registered type.
    pub type_name: &'static str,
}

impl TypeIdentity {
    pub fn of<T: 'static>(name: &'static str) -> Self {
        Self {
            name,
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }
}

static DRIVER_TYPES: Lazy<RwLock<HashMap<&'static str, TypeIdentity>>> = Lazy::new(|| {
    #[allow(unused_mut)]
    let mut types = HashMap::new();

    #[cfg(feature = "mongodb")]
    for identity in [
        TypeIdentity::of::<mongodb::Cursor<mongodb::bson::Document>>(targets::CURSOR),
        TypeIdentity::of::<mongodb::Collection<mongodb::bson::Document>>(targets::COLLECTION),
        TypeIdentity::of::<mongodb::Database>(targets::DATABASE),
        TypeIdentity::of::<mongodb::Client>(targets::CLIENT),
    ] {
        types.insert(identity.name, identity);
    }

    RwLock::new(types)
});

/// Names of the driver types the facades stand in for.
pub mod targets {
    pub const CURSOR: &str = "mongodb::Cursor";
    pub const COMMAND_CURSOR: &str = "mongodb::CommandCursor";
    pub const LATENT_COMMAND_CURSOR: &str = "mongodb::LatentCommandCursor";
    pub const COLLECTION: &str = "mongodb::Collection";
    pub const DATABASE: &str = "mongodb::Database";
    pub const CLIENT: &str = "mongodb::Client";
}

/// Registers `T` as the driver type known by `name`, replacing any earlier registration.
pub fn register_driver_type<T: 'static>(name: &'static str) -> TypeIdentity {
    let identity = TypeIdentity::of::<T>(name);
    DRIVER_TYPES.write().insert(name, identity);
    identity
}

/// Resolves a driver type by name.
pub fn resolve(name: &str) -> Option<TypeIdentity> {
    DRIVER_TYPES.read().get(name).copied()
}

/// Reports a driver type identity in place of the implementor's own.
pub trait Masquerade {
    /// Fully qualified name of the driver type this facade stands in for.
    const TARGET: &'static str;

    /// The identity reported to callers; `None` when the target type is unknown.
    fn reported_type(&self) -> Option<TypeIdentity> {
        resolve(Self::TARGET)
    }

    fn reports_as<T: 'static>(&self) -> bool {
        self.reported_type()
            .is_some_and(|identity| identity.type_id == TypeId::of::<T>())
    }

    fn reports_as_name(&self, name: &str) -> bool {
        self.reported_type()
            .is_some_and(|identity| identity.name == name || identity.type_name == name)
    }
}
