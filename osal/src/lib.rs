// Copyright (c) 2026 the osal authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Portable kernel-object abstraction layer.
//!
//! A host-independent core of typed handles ([`id::ObjectId`]),
//! condition-variable-protected object tables ([`table::TypeTable`]), and
//! the create/lookup/delete state machine ([`transaction::Transaction`])
//! that every object class in this crate builds on: streams and sockets
//! ([`stream`]), filesystem volumes and mount points ([`filesys`]),
//! loadable modules ([`module`]), condition variables ([`condvar`]),
//! consoles ([`console`]), and timer callbacks ([`timebase`]).
//!
//! The core never touches the outside world directly; every I/O
//! operation crosses the [`hooks::ImplHooks`] boundary into a host
//! backend. [`backend::std_hosted`] is the reference backend built on
//! `std::fs`, `std::net`, and `libloading`, used by this crate's own
//! tests and suitable as a hosted (non-embedded) target on its own.
//!
//! [`Osal`] ties one configured set of tables to one backend; construct
//! one per independent instance you need (there is no process-global
//! singleton).

mod condvar;
mod config;
mod console;
mod error;
mod event;
mod filesys;
mod hooks;
mod id;
mod iterator;
mod module;
mod osal;
mod record;
mod stream;
mod table;
mod time;
mod timebase;
mod transaction;

pub mod backend;

pub use condvar::{CondVarSession, CondVarTable};
pub use config::{OsConfig, MAX_API_NAME, MAX_FILE_NAME, MAX_LOCAL_PATH_LEN, MAX_PATH_LEN};
pub use console::ConsoleTable;
pub use error::OsError;
pub use event::{EventHandler, EventKind, EventNotify};
pub use filesys::{FilesysFlags, FilesysTable, FsType};
pub use hooks::{
    AccessMode, ClockHooks, CondVarHooks, FileStat, FilesysHooks, HostHandle, ImplHooks, ModuleHooks, NetworkHooks,
    OpenFlags, SeekWhence, SocketDomain, SocketType, StreamHooks,
};
pub use id::{ObjectId, ObjectType};
pub use iterator::{always, by_creator, by_name, count, for_each, lookup_by_name, ObjectIterator};
pub use module::{ModuleTable, StaticSymbol};
pub use osal::Osal;
pub use record::ObjectRecord;
pub use stream::{StreamState, StreamTable};
pub use time::TimeValue;
pub use timebase::{TimeBaseTable, TimerCallback};
pub use transaction::LockMode;
