//! Pieces shared by the client, database and collection facades.

use bson::Bson;
use tokio::runtime::Handle;

use crate::{
    build_info::BuildInfo,
    error::{FacadeError, FacadeResult},
};

/// Result of resolving a name against a facade.
///
/// A name the Store handle knows as one of its own attributes resolves to that attribute;
/// any other name resolves to a child facade of that name.
#[derive(Debug, Clone)]
pub enum Member<C> {
    Attribute(Bson),
    Child(C),
}

impl<C> Member<C> {
    pub fn attribute(&self) -> Option<&Bson> {
        match self {
            Member::Attribute(value) => Some(value),
            Member::Child(_) => None,
        }
    }

    pub fn into_child(self) -> Option<C> {
        match self {
            Member::Attribute(_) => None,
            Member::Child(child) => Some(child),
        }
    }
}

/// Which runtime a client's facades report as their event loop.
#[derive(Debug, Clone, Default)]
pub enum LoopBinding {
    /// A runtime handle supplied when the client was built.
    Explicit(Handle),
    /// Whatever runtime is current when the loop is asked for.
    #[default]
    Ambient,
}

impl LoopBinding {
    pub fn resolve(&self) -> FacadeResult<Handle> {
        match self {
            LoopBinding::Explicit(handle) => Ok(handle.clone()),
            LoopBinding::Ambient => Handle::try_current().map_err(|err| FacadeError::NoRuntime(err.to_string())),
        }
    }
}

/// Configuration a client hands down to every facade derived from it.
#[derive(Debug, Clone, Default)]
pub(crate) struct ClientContext {
    pub(crate) build_info: BuildInfo,
    pub(crate) loop_binding: LoopBinding,
}
