//! Sync-to-async method bridging.
//!
//! Facade methods that only forward to their Store handle are declared in tables. Each
//! table expands into one method per entry plus an associated `&[MethodSpec]` constant
//! listing the entries, and every generated method goes through one of two forwarding
//! functions:
//!
//! - [`bridge_async`] wraps a synchronous call in an `async fn`. The call runs to
//!   completion when the future is first polled; nothing ever yields.
//! - [`bridge_chaining`] runs a synchronous mutator and hands back the facade, so that
//!   configuration calls chain (`cursor.skip(2).limit(2)`).
//!
//! ```ignore
//! async_bridged! {
//!     AsyncMockCollection => delegate as StoreCollection, table ASYNC_METHODS;
//!     "count_documents" => fn count_documents(filter: Document) -> u64;
//! }
//! ```

use docmock_core::error::StoreResult;

use crate::error::FacadeResult;

/// How a bridged method relates to its Store counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    /// Awaitable; resolves to the Store call's result.
    Async,
    /// Synchronous; returns the facade instead of the Store call's result.
    Chaining,
}

/// One entry of a facade's bridged-method table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodSpec {
    /// The driver-facing method name.
    pub name: &'static str,
    pub discipline: Discipline,
}

impl MethodSpec {
    pub const fn asynchronous(name: &'static str) -> Self {
        Self {
            name,
            discipline: Discipline::Async,
        }
    }

    pub const fn chaining(name: &'static str) -> Self {
        Self {
            name,
            discipline: Discipline::Chaining,
        }
    }
}

/// Whether `table` declares a method called `name`.
pub fn declares(table: &[MethodSpec], name: &str) -> bool {
    table.iter().any(|spec| spec.name == name)
}

/// Runs a synchronous Store call behind a suspension point.
pub async fn bridge_async<T, F>(call: F) -> FacadeResult<T>
where
    F: FnOnce() -> StoreResult<T>,
{
    Ok(call()?)
}

/// Runs a synchronous mutator against `facade` and returns `facade` for chaining.
pub fn bridge_chaining<F, M>(facade: &mut F, mutate: M) -> &mut F
where
    F: ?Sized,
    M: FnOnce(&mut F),
{
    mutate(facade);
    facade
}

/// Declares async-bridged methods forwarding to a Store handle.
///
/// `$delegate` names the facade's accessor for its handle and `$store` the Store trait
/// the handle implements; calls are made through the trait path.
macro_rules! async_bridged {
    (
        $facade:ty => $delegate:ident as $store:path, table $table:ident;
        $(
            $(#[$meta:meta])*
            $name:literal => fn $method:ident ( $( $arg:ident : $arg_ty:ty ),* ) -> $ret:ty;
        )*
    ) => {
        impl $facade {
            /// Methods of this table, in declaration order.
            pub const $table: &'static [$crate::bridge::MethodSpec] = &[
                $( $crate::bridge::MethodSpec::asynchronous($name), )*
            ];

            $(
                $(#[$meta])*
                pub async fn $method(&self, $( $arg: $arg_ty ),*) -> $crate::error::FacadeResult<$ret> {
                    let delegate = &**self.$delegate();
                    $crate::bridge::bridge_async(|| <dyn $store>::$method(delegate, $( $arg ),*)).await
                }
            )*
        }
    };
}

/// Declares chaining-bridged methods forwarding to a mutable Store cursor.
macro_rules! chaining_bridged {
    (
        $facade:ty => $delegate:ident as $store:path, table $table:ident;
        $(
            $(#[$meta:meta])*
            $name:literal => fn $method:ident ( $( $arg:ident : $arg_ty:ty ),* );
        )*
    ) => {
        impl $facade {
            /// Methods of this table, in declaration order.
            pub const $table: &'static [$crate::bridge::MethodSpec] = &[
                $( $crate::bridge::MethodSpec::chaining($name), )*
            ];

            $(
                $(#[$meta])*
                pub fn $method(&mut self, $( $arg: $arg_ty ),*) -> &mut Self {
                    $crate::bridge::bridge_chaining(self, |facade| {
                        <dyn $store>::$method(facade.$delegate(), $( $arg ),*)
                    })
                }
            )*
        }
    };
}

pub(crate) use async_bridged;
pub(crate) use chaining_bridged;

#[cfg(test)]
mod tests {
    use super::*;
    use docmock_core::error::StoreError;

    #[derive(Debug, Default)]
    struct Counter {
        value: i32,
    }

    #[tokio::test]
    async fn test_bridge_async_passes_results_through() {
        assert_eq!(bridge_async(|| Ok::<_, StoreError>(3)).await.unwrap(), 3);

        let err = bridge_async(|| Err::<(), _>(StoreError::not_implemented("x")))
            .await
            .unwrap_err();
        assert!(err.is_not_implemented());
    }

    #[test]
    fn test_bridge_chaining_returns_facade() {
        let mut counter = Counter::default();
        let returned = bridge_chaining(&mut counter, |counter| counter.value += 1) as *const Counter;

        assert_eq!(returned, &counter as *const Counter);
        assert_eq!(counter.value, 1);
    }

    #[test]
    fn test_declares() {
        let table = [MethodSpec::asynchronous("find_one"), MethodSpec::chaining("limit")];
        assert!(declares(&table, "limit"));
        assert!(!declares(&table, "find"));
    }
}
