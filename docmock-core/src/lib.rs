//! Core contract of the docmock workspace.
//!
//! This crate defines the synchronous Store that the async facade wraps:
//!
//! - **Store handles** ([`store`]) - Traits for client, database and collection handles
//! - **Cursors** ([`cursor`]) - Synchronous cursor traits and a materialized cursor
//! - **Hooks** ([`hooks`]) - The interception seam used to adapt collection handles
//! - **Queries** ([`query`]) - Filter AST and sort keys
//! - **Options and results** ([`options`], [`results`]) - Per-call options and write results
//! - **Commands** ([`command`]) - Admin command representation
//! - **Document paths** ([`document`]) - Dotted-path access helpers
//! - **Error handling** ([`error`]) - Store error and result types

#[allow(unused_extern_crates)]
extern crate self as docmock_core;

pub mod command;
pub mod cursor;
pub mod document;
pub mod error;
pub mod hooks;
pub mod options;
pub mod query;
pub mod results;
pub mod store;
