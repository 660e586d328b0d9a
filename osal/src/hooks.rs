// Copyright (c) 2026 the osal authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The per-host contract invoked by the portable core while holding
//! whatever lock a transaction's mode calls for (`spec.md` §4.8). The core
//! never inspects a hook's private state; every stateful resource (an open
//! file, a loaded module, a socket) is handed back and forth as an opaque
//! [`HostHandle`].
//!
//! Any method may return [`OsError::NotImplemented`] for a capability the
//! host lacks; the core surfaces this unchanged.

use crate::error::OsError;
use crate::time::TimeValue;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// An opaque per-resource handle returned by an open/load/mount hook and
/// passed back unexamined to every subsequent hook on that resource. The
/// concrete backend downcasts it to whatever it actually stored.
///
/// `Arc`, not `Box`: a blocking I/O call (`GenericRead`, `Accept`, …) runs
/// under `REFCOUNT` mode, which releases the per-type table lock before
/// the call. The table code clones this handle out while the lock is
/// still held and operates on the clone afterwards, so the handle itself
/// must be cheaply shareable rather than uniquely owned by the slot.
pub type HostHandle = Arc<dyn Any + Send + Sync>;

/// File open flags (`spec.md` §6 file-open flags).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlags {
    pub create: bool,
    pub truncate: bool,
}

/// Access mode for a freshly opened file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// `SEEK_SET`/`SEEK_CUR`/`SEEK_END`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekWhence {
    Set,
    Current,
    End,
}

/// POSIX-style permission/kind bits (`spec.md` §6 filesystem mode bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub is_directory: bool,
    pub mode_exec: bool,
    pub mode_write: bool,
    pub mode_read: bool,
}

/// Transport/address family for a socket (subset relevant to a hosted
/// backend; `spec.md` leaves the full enumeration host-defined).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketDomain {
    Inet4,
    Inet6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketType {
    Stream,
    Datagram,
}

/// Module load/symbol-lookup contract.
pub trait ModuleHooks: Send + Sync {
    /// # Errors
    /// Host error translating/opening the shared object at `native_path`.
    fn module_load(&self, native_path: &str) -> Result<HostHandle, OsError>;
    /// # Errors
    /// Never fails in the reference backend; reserved for hosts that can.
    fn module_unload(&self, handle: &HostHandle) -> Result<(), OsError>;
    /// # Errors
    /// [`OsError::NameNotFound`] if `symbol_name` isn't exported.
    fn module_symbol_lookup(&self, handle: &HostHandle, symbol_name: &str) -> Result<usize, OsError>;
}

/// Filesystem volume lifecycle contract.
///
/// `start_volume` returns the native (system) mount point the backend
/// prepared: for a fixed map the caller already knows this path and passes
/// it as `fixed_mountpt`; for `mkfs`/`initfs` the backend picks one (e.g.
/// a temp-directory-relative path keyed by `device_name`) and hands it
/// back so the core can record it before `mount_volume` is ever called.
pub trait FilesysHooks: Send + Sync {
    /// # Errors
    /// Host I/O error preparing `device_name`'s backing storage.
    fn start_volume(
        &self,
        device_name: &str,
        is_ram: bool,
        blocksize: u32,
        numblocks: u32,
        fixed_mountpt: Option<&str>,
    ) -> Result<String, OsError>;
    fn stop_volume(&self, device_name: &str) -> Result<(), OsError>;
    /// # Errors
    /// Host error formatting the volume (`mkfs`).
    fn format_volume(&self, device_name: &str) -> Result<(), OsError>;
    /// `system_mountpt` is whatever `start_volume` returned for this record.
    fn mount_volume(&self, system_mountpt: &str) -> Result<(), OsError>;
    fn unmount_volume(&self, system_mountpt: &str) -> Result<(), OsError>;
}

/// File and socket I/O contract. Both streams share this trait; the
/// distinguishing factor is which `open`/`socket_open` variant produced
/// the [`HostHandle`].
pub trait StreamHooks: Send + Sync {
    /// # Errors
    /// Host I/O error opening `native_path`.
    fn file_open(&self, native_path: &str, flags: OpenFlags, access: AccessMode) -> Result<HostHandle, OsError>;
    fn generic_close(&self, handle: &HostHandle) -> Result<(), OsError>;
    /// # Errors
    /// [`OsError::Timeout`] if `timeout` elapses with nothing available.
    fn generic_read(&self, handle: &HostHandle, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize, OsError>;
    /// # Errors
    /// [`OsError::Timeout`] if `timeout` elapses before the write completes.
    fn generic_write(&self, handle: &HostHandle, buf: &[u8], timeout: Option<Duration>) -> Result<usize, OsError>;
    fn generic_seek(&self, handle: &HostHandle, offset: i64, whence: SeekWhence) -> Result<u64, OsError>;
    fn file_chmod(&self, native_path: &str, mode_write: bool, mode_read: bool) -> Result<(), OsError>;
    fn file_stat(&self, native_path: &str) -> Result<FileStat, OsError>;
    fn file_rename(&self, old_native_path: &str, new_native_path: &str) -> Result<(), OsError>;
    fn file_remove(&self, native_path: &str) -> Result<(), OsError>;

    fn socket_open(&self, domain: SocketDomain, ty: SocketType) -> Result<HostHandle, OsError>;
    fn bind(&self, handle: &HostHandle, addr: SocketAddr) -> Result<SocketAddr, OsError>;
    fn connect(&self, handle: &HostHandle, addr: SocketAddr, timeout: Option<Duration>) -> Result<(), OsError>;
    /// # Errors
    /// [`OsError::Timeout`] if `timeout` elapses with no incoming connection.
    fn accept(&self, handle: &HostHandle, timeout: Option<Duration>) -> Result<(HostHandle, SocketAddr), OsError>;
    fn shutdown(&self, handle: &HostHandle) -> Result<(), OsError>;
    fn recv_from(&self, handle: &HostHandle, buf: &mut [u8], timeout: Option<Duration>) -> Result<(usize, SocketAddr), OsError>;
    fn send_to(&self, handle: &HostHandle, buf: &[u8], addr: SocketAddr) -> Result<usize, OsError>;
}

/// Condition-variable contract (`spec.md` §4.8 CondVar hook group):
/// `Create`/`Delete`/`Lock`/`Unlock`/`Signal`/`Broadcast`/`Wait`/`TimedWait`,
/// the same shape as every other object class's impl hooks rather than a
/// primitive hardcoded into the portable core.
pub trait CondVarHooks: Send + Sync {
    fn create(&self) -> Result<HostHandle, OsError>;
    fn delete(&self, handle: &HostHandle) -> Result<(), OsError>;
    fn lock(&self, handle: &HostHandle) -> Result<(), OsError>;
    fn unlock(&self, handle: &HostHandle) -> Result<(), OsError>;
    fn signal(&self, handle: &HostHandle) -> Result<(), OsError>;
    fn broadcast(&self, handle: &HostHandle) -> Result<(), OsError>;
    fn wait(&self, handle: &HostHandle) -> Result<(), OsError>;
    /// # Errors
    /// Never fails in the reference backend; returns `Ok(false)` on a
    /// timeout rather than an error (`spec.md` §4.8 `TimedWait`).
    fn timed_wait(&self, handle: &HostHandle, timeout: Duration) -> Result<bool, OsError>;
}

/// Wall-clock contract (`spec.md` §4.8 Clock, §9 hosted Clock hooks).
pub trait ClockHooks: Send + Sync {
    fn get_local_time(&self) -> TimeValue;
    /// # Errors
    /// [`OsError::NotImplemented`] on hosts that don't allow setting the
    /// wall clock from user space (the common case for a hosted backend).
    fn set_local_time(&self, time: TimeValue) -> Result<(), OsError>;
}

/// Host identity (`spec.md` §4.8 Network).
pub trait NetworkHooks: Send + Sync {
    fn network_get_host_name(&self) -> Result<String, OsError>;
    /// The original collapses success/failure into one `int32` (`-1` =
    /// error); this port keeps the status in `Result` and returns the id
    /// as the success payload instead of an aliased sentinel value (see
    /// `DESIGN.md`).
    fn network_get_id(&self) -> Result<i32, OsError>;
}

/// Everything a host backend must supply. A concrete backend typically
/// implements this directly on a single zero-sized or config-holding
/// struct; see `crate::backend::std_hosted` for the reference
/// implementation used by this crate's own tests.
pub trait ImplHooks: Send + Sync {
    fn module(&self) -> &dyn ModuleHooks;
    fn filesys(&self) -> &dyn FilesysHooks;
    fn stream(&self) -> &dyn StreamHooks;
    fn condvar(&self) -> &dyn CondVarHooks;
    fn clock(&self) -> &dyn ClockHooks;
    fn network(&self) -> &dyn NetworkHooks;
}
