#![no_std]
#![forbid(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::missing_docs_in_private_items,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links
)]
#![allow(rustdoc::private_intra_doc_links)]
//! Internal implementation crate for [`polycept`].
//!
//! # Overview
//!
//! This crate contains the low-level, type-erased storage strategies and the
//! unsafe lifecycle plumbing that the [`polycept`] polymorphic values are
//! built on.
//!
//! **This crate is an implementation detail.** No semantic versioning
//! guarantees are provided. Users should depend on the [`polycept`] crate,
//! not this one.
//!
//! # Architecture
//!
//! - **[`util`]**: the [`Erased`] pointee marker and the [`ErasedFn`] slot type
//!   every dispatch table stores.
//! - **[`object`]**: [`StorageInfo`] and the [`ObjectTable`] contract, the
//!   minimal set of lifecycle operations a storage needs from a dispatch table.
//! - **[`storage`]**: the [`Storage`] and [`OwningStorage`] traits and every
//!   physical placement:
//!   - [`Remote`]: one heap allocation per object
//!   - [`Local`]: a fixed inline buffer
//!   - [`Sbo`]: inline when it fits, heap otherwise
//!   - [`Shared`]: a reference-counted heap object
//!   - [`Borrowed`] and [`BorrowedMut`]: non-owning references
//!   - [`Fallback`]: a primary storage with a secondary one behind it
//!
//! # Safety Strategy
//!
//! A storage never knows the concrete type it holds. Every operation that
//! needs the type (copying, relocating, destroying) takes an [`ObjectTable`]
//! argument, and the caller promises that the table describes the object
//! currently held. The polymorphic value in [`polycept`] is the only place
//! that pairs a storage with its table, and it keeps the pair in lockstep.
//!
//! Storages keep their fields module-private so the invariants of each
//! variant can be verified by reading a single file.
//!
//! [`polycept`]: https://docs.rs/polycept/latest/polycept/
//! [`Erased`]: util::Erased
//! [`ErasedFn`]: util::ErasedFn
//! [`StorageInfo`]: object::StorageInfo
//! [`ObjectTable`]: object::ObjectTable
//! [`Storage`]: storage::Storage
//! [`OwningStorage`]: storage::OwningStorage
//! [`Remote`]: storage::Remote
//! [`Local`]: storage::Local
//! [`Sbo`]: storage::Sbo
//! [`Shared`]: storage::Shared
//! [`Borrowed`]: storage::Borrowed
//! [`BorrowedMut`]: storage::BorrowedMut
//! [`Fallback`]: storage::Fallback

extern crate alloc;

pub mod object;
pub mod storage;
pub mod util;

pub use self::{
    object::{ObjectTable, StorageInfo},
    util::{Erased, ErasedFn},
};
