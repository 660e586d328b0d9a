// Copyright (c) 2026 the osal authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Files and sockets share one id space and one table (`spec.md` §4.4).
//! `socket_domain` tells the two apart: `None` is a regular file, `Some`
//! is a socket in whatever state its `StreamState` bits describe.

use crate::error::OsError;
use crate::filesys::FilesysTable;
use crate::hooks::{
    AccessMode, FileStat, HostHandle, OpenFlags, SeekWhence, SocketDomain, SocketType, StreamHooks,
};
use crate::id::{ObjectId, ObjectType};
use crate::iterator::{by_name, ObjectIterator};
use crate::record::ObjectRecord;
use crate::table::TypeTable;
use crate::transaction::{allocate_new, LockMode, Transaction};
use bitflags::bitflags;
use std::net::SocketAddr;
use std::time::Duration;

bitflags! {
    /// Socket lifecycle bits (`spec.md` §4.4 state machine).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StreamState: u8 {
        const BOUND = 0b0001;
        const CONNECTED = 0b0010;
        const READABLE = 0b0100;
        const WRITABLE = 0b1000;
    }
}

impl Default for SocketType {
    fn default() -> Self {
        SocketType::Stream
    }
}

/// Per-slot state specific to the Stream class.
#[derive(Default)]
pub struct StreamExtra {
    pub socket_domain: Option<SocketDomain>,
    pub socket_type: SocketType,
    pub state: StreamState,
    pub handle: Option<HostHandle>,
}

/// The Stream object class: open files and sockets.
pub struct StreamTable {
    table: TypeTable<StreamExtra>,
}

impl StreamTable {
    #[must_use]
    pub fn new(max: u32) -> Self {
        StreamTable {
            table: TypeTable::new(ObjectType::Stream, max),
        }
    }

    #[must_use]
    pub fn inner(&self) -> &TypeTable<StreamExtra> {
        &self.table
    }

    /// Open a regular file: translate the virtual path, call the impl
    /// hook, finalize.
    ///
    /// # Errors
    /// Whatever path translation or [`StreamHooks::file_open`] returns.
    pub fn open_file(
        &self,
        hooks: &dyn StreamHooks,
        filesys: &FilesysTable,
        virt_path: &str,
        flags: OpenFlags,
        access: AccessMode,
        creator: ObjectId,
    ) -> Result<ObjectId, OsError> {
        let native_path = filesys.translate(virt_path)?;
        let (txn, id) = allocate_new(&self.table, Some(virt_path.to_string()), creator)?;
        match hooks.file_open(&native_path, flags, access) {
            Ok(handle) => {
                txn.finish_with(Some(id), |rec| rec.extra.handle = Some(handle));
                Ok(id)
            }
            Err(e) => {
                // Allocation failed past ConvertToken: the slot is
                // RESERVED, not yet a live id, so finalize to UNDEFINED
                // rather than the generic Exclusive restore (which would
                // restore the freshly claimed id itself).
                txn.finish(Some(ObjectId::UNDEFINED));
                Err(e)
            }
        }
    }

    /// Open a socket of the given domain/type, leaving it in the empty
    /// (not bound, not connected) state.
    ///
    /// # Errors
    /// Whatever [`StreamHooks::socket_open`] returns.
    pub fn socket_open(
        &self,
        hooks: &dyn StreamHooks,
        domain: SocketDomain,
        ty: SocketType,
        creator: ObjectId,
    ) -> Result<ObjectId, OsError> {
        let (txn, id) = allocate_new(&self.table, None, creator)?;
        match hooks.socket_open(domain, ty) {
            Ok(handle) => {
                txn.finish_with(Some(id), |rec| {
                    rec.extra.socket_domain = Some(domain);
                    rec.extra.socket_type = ty;
                    rec.extra.state = StreamState::empty();
                    rec.extra.handle = Some(handle);
                });
                Ok(id)
            }
            Err(e) => {
                txn.finish(Some(ObjectId::UNDEFINED));
                Err(e)
            }
        }
    }

    /// # Errors
    /// [`OsError::IncorrectObjState`] if already bound or connected,
    /// otherwise whatever [`StreamHooks::bind`] returns.
    pub fn bind(&self, hooks: &dyn StreamHooks, id: ObjectId, addr: SocketAddr) -> Result<(), OsError> {
        let mut txn = Transaction::init_for_id(&self.table, LockMode::Global, ObjectType::Stream, id)?;
        txn.convert()?;
        let rec = txn.record_mut();
        if rec.extra.state.intersects(StreamState::BOUND | StreamState::CONNECTED) {
            txn.finish(None);
            return Err(OsError::IncorrectObjState);
        }
        let Some(handle) = rec.extra.handle.clone() else {
            txn.finish(None);
            return Err(OsError::InvalidId);
        };
        match hooks.bind(&handle, addr) {
            Ok(bound_addr) => {
                let rec = txn.record_mut();
                rec.extra.state |= StreamState::BOUND;
                rec.name = Some(format!("{bound_addr}"));
                txn.finish(None);
                Ok(())
            }
            Err(e) => {
                txn.finish(None);
                Err(e)
            }
        }
    }

    /// # Errors
    /// [`OsError::IncorrectObjState`] unless this is a stream socket not
    /// already connected, otherwise whatever [`StreamHooks::connect`]
    /// returns.
    pub fn connect(
        &self,
        hooks: &dyn StreamHooks,
        id: ObjectId,
        addr: SocketAddr,
        timeout: Option<Duration>,
    ) -> Result<(), OsError> {
        let mut txn = Transaction::init_for_id(&self.table, LockMode::Refcount, ObjectType::Stream, id)?;
        let handle = {
            let rec = txn.record_mut();
            if rec.extra.socket_type != SocketType::Stream || rec.extra.state.contains(StreamState::CONNECTED) {
                txn.cancel();
                return Err(OsError::IncorrectObjState);
            }
            let Some(handle) = rec.extra.handle.clone() else {
                txn.cancel();
                return Err(OsError::InvalidId);
            };
            handle
        };
        txn.convert()?; // refcount +1, table lock released (Refcount mode)
        let result = hooks.connect(&handle, addr, timeout);
        if result.is_ok() {
            let mut set_state = Transaction::init_for_id(&self.table, LockMode::Global, ObjectType::Stream, id)?;
            set_state.convert()?;
            set_state.record_mut().extra.state |= StreamState::CONNECTED | StreamState::READABLE | StreamState::WRITABLE;
            set_state.finish(None);
        }
        txn.finish(None);
        result
    }

    /// Server must be bound, not connected, and a stream socket. Creates
    /// a brand new Stream slot for the accepted connection.
    ///
    /// # Errors
    /// [`OsError::IncorrectObjState`] if the server isn't in the right
    /// state, otherwise whatever [`StreamHooks::accept`] returns.
    pub fn accept(
        &self,
        hooks: &dyn StreamHooks,
        server: ObjectId,
        timeout: Option<Duration>,
        creator: ObjectId,
    ) -> Result<ObjectId, OsError> {
        let mut server_txn =
            Transaction::init_for_id(&self.table, LockMode::Refcount, ObjectType::Stream, server)?;
        let (domain, handle, server_name) = {
            let rec = server_txn.record_mut();
            let state = rec.extra.state;
            if rec.extra.socket_type != SocketType::Stream
                || !state.contains(StreamState::BOUND)
                || state.contains(StreamState::CONNECTED)
            {
                server_txn.cancel();
                return Err(OsError::IncorrectObjState);
            }
            let Some(domain) = rec.extra.socket_domain else {
                server_txn.cancel();
                return Err(OsError::IncorrectObjState);
            };
            let Some(handle) = rec.extra.handle.clone() else {
                server_txn.cancel();
                return Err(OsError::InvalidId);
            };
            (domain, handle, rec.name.clone().unwrap_or_default())
        };
        server_txn.convert()?;
        let accept_result = hooks.accept(&handle, timeout);
        server_txn.finish(None);
        let (new_handle, remote_addr) = accept_result?;

        let (txn, new_id) = allocate_new(
            &self.table,
            Some(format!("{remote_addr}-{server_name}")),
            creator,
        )?;
        txn.finish_with(Some(new_id), |rec| {
            rec.extra.socket_domain = Some(domain);
            rec.extra.socket_type = SocketType::Stream;
            rec.extra.state = StreamState::CONNECTED | StreamState::READABLE | StreamState::WRITABLE;
            rec.extra.handle = Some(new_handle);
        });
        Ok(new_id)
    }

    /// Datagram-only; requires the socket be bound.
    ///
    /// # Errors
    /// [`OsError::IncorrectObjState`] if not a bound datagram socket,
    /// otherwise whatever [`StreamHooks::recv_from`] returns.
    pub fn recv_from(
        &self,
        hooks: &dyn StreamHooks,
        id: ObjectId,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<(usize, SocketAddr), OsError> {
        self.with_handle_refcount(id, |rec| {
            if rec.extra.socket_type != SocketType::Datagram || !rec.extra.state.contains(StreamState::BOUND) {
                return Err(OsError::IncorrectObjState);
            }
            rec.extra.handle.clone().ok_or(OsError::InvalidId)
        }, |handle| hooks.recv_from(handle, buf, timeout))
    }

    /// Datagram-only send.
    ///
    /// # Errors
    /// Whatever [`StreamHooks::send_to`] returns.
    pub fn send_to(&self, hooks: &dyn StreamHooks, id: ObjectId, buf: &[u8], addr: SocketAddr) -> Result<usize, OsError> {
        self.with_handle_refcount(id, |rec| {
            if rec.extra.socket_type != SocketType::Datagram {
                return Err(OsError::IncorrectObjState);
            }
            rec.extra.handle.clone().ok_or(OsError::InvalidId)
        }, |handle| hooks.send_to(handle, buf, addr))
    }

    /// Blocking read/write against a file or connected socket.
    ///
    /// # Errors
    /// Whatever the corresponding [`StreamHooks`] method returns.
    pub fn read(&self, hooks: &dyn StreamHooks, id: ObjectId, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize, OsError> {
        self.with_handle_refcount(id, |rec| rec.extra.handle.clone().ok_or(OsError::InvalidId), |handle| {
            hooks.generic_read(handle, buf, timeout)
        })
    }

    pub fn write(&self, hooks: &dyn StreamHooks, id: ObjectId, buf: &[u8], timeout: Option<Duration>) -> Result<usize, OsError> {
        self.with_handle_refcount(id, |rec| rec.extra.handle.clone().ok_or(OsError::InvalidId), |handle| {
            hooks.generic_write(handle, buf, timeout)
        })
    }

    pub fn seek(&self, hooks: &dyn StreamHooks, id: ObjectId, offset: i64, whence: SeekWhence) -> Result<u64, OsError> {
        self.with_handle_refcount(id, |rec| rec.extra.handle.clone().ok_or(OsError::InvalidId), |handle| {
            hooks.generic_seek(handle, offset, whence)
        })
    }

    /// Validate/extract under `REFCOUNT` mode (lock held only for
    /// `extract`), run `f` on the extracted handle without the lock held,
    /// then release the refcount.
    fn with_handle_refcount<T>(
        &self,
        id: ObjectId,
        extract: impl FnOnce(&mut ObjectRecord<StreamExtra>) -> Result<HostHandle, OsError>,
        f: impl FnOnce(&HostHandle) -> Result<T, OsError>,
    ) -> Result<T, OsError> {
        let mut txn = Transaction::init_for_id(&self.table, LockMode::Refcount, ObjectType::Stream, id)?;
        let handle = match extract(txn.record_mut()) {
            Ok(h) => h,
            Err(e) => {
                txn.cancel();
                return Err(e);
            }
        };
        txn.convert()?;
        let result = f(&handle);
        txn.finish(None);
        result
    }

    /// `close`: exclusive delete, running the impl's close hook (for
    /// files) or shutdown hook (for sockets).
    ///
    /// # Errors
    /// Whatever the impl's close/shutdown hook returns.
    pub fn close(&self, hooks: &dyn StreamHooks, id: ObjectId) -> Result<(), OsError> {
        let mut txn = Transaction::init_for_id(&self.table, LockMode::Exclusive, ObjectType::Stream, id)?;
        let (handle, is_socket) = {
            let rec = txn.record_mut();
            (rec.extra.handle.take(), rec.extra.socket_domain.is_some())
        };
        txn.convert()?;
        let result = match &handle {
            Some(h) if is_socket => hooks.shutdown(h),
            Some(h) => hooks.generic_close(h),
            None => Ok(()),
        };
        txn.finish(Some(ObjectId::UNDEFINED));
        result
    }

    /// `CloseFileByName`: iterate, skip sockets, close every file whose
    /// recorded name equals `virt_path`. Continues past failures,
    /// returning the first one seen.
    ///
    /// # Errors
    /// The first error from any matching `close`, if any matched entry
    /// failed to close. [`OsError::FsPathInvalid`] if nothing matched.
    pub fn close_file_by_name(&self, hooks: &dyn StreamHooks, virt_path: &str) -> Result<(), OsError> {
        let mut matched = false;
        let mut first_err = None;
        let mut it = ObjectIterator::init(&self.table);
        let name_matches = by_name::<StreamExtra>(virt_path);
        while it.get_next(|id, rec| rec.extra.socket_domain.is_none() && name_matches(id, rec)) {
            matched = true;
            if let Err(e) = it.process_entry(|found| self.close(hooks, found)) {
                first_err.get_or_insert(e);
            }
        }
        it.destroy();
        if !matched {
            return Err(OsError::FsPathInvalid);
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// `rename`: translate both virtual paths, call the impl hook once,
    /// then walk the stream table renaming every matching (non-socket)
    /// `stream_name` entry so already-open handles keep resolving under
    /// the new name.
    ///
    /// # Errors
    /// Whatever path translation or [`StreamHooks::file_rename`] returns.
    pub fn rename(&self, hooks: &dyn StreamHooks, filesys: &FilesysTable, old_virt_path: &str, new_virt_path: &str) -> Result<(), OsError> {
        let old_native = filesys.translate(old_virt_path)?;
        let new_native = filesys.translate(new_virt_path)?;
        hooks.file_rename(&old_native, &new_native)?;

        let mut matches = Vec::new();
        let mut it = ObjectIterator::init(&self.table);
        let name_matches = by_name::<StreamExtra>(old_virt_path);
        while it.get_next(|id, rec| rec.extra.socket_domain.is_none() && name_matches(id, rec)) {
            matches.push(it.current().expect("get_next just returned true"));
        }
        it.destroy();

        let new_name = new_virt_path.to_string();
        for id in matches {
            if let Ok(mut txn) = Transaction::init_for_id(&self.table, LockMode::Global, ObjectType::Stream, id) {
                if txn.convert().is_ok() {
                    txn.record_mut().name = Some(new_name.clone());
                    txn.finish(None);
                }
            }
        }
        Ok(())
    }

    /// `chmod`: translate the virtual path and call the impl hook.
    /// chmod/stat/remove have no open-stream record to mutate, so the
    /// transaction carries no lock (`LockMode::None`) and exists only to
    /// run every hook call through the same chokepoint as the rest of
    /// this table's operations.
    ///
    /// # Errors
    /// Whatever path translation or [`StreamHooks::file_chmod`] returns.
    pub fn chmod(&self, hooks: &dyn StreamHooks, filesys: &FilesysTable, virt_path: &str, mode_write: bool, mode_read: bool) -> Result<(), OsError> {
        let _txn = Transaction::init(&self.table, LockMode::None)?;
        let native_path = filesys.translate(virt_path)?;
        hooks.file_chmod(&native_path, mode_write, mode_read)
    }

    /// `stat`.
    ///
    /// # Errors
    /// Whatever path translation or [`StreamHooks::file_stat`] returns.
    pub fn stat(&self, hooks: &dyn StreamHooks, filesys: &FilesysTable, virt_path: &str) -> Result<FileStat, OsError> {
        let _txn = Transaction::init(&self.table, LockMode::None)?;
        let native_path = filesys.translate(virt_path)?;
        hooks.file_stat(&native_path)
    }

    /// `remove`.
    ///
    /// # Errors
    /// Whatever path translation or [`StreamHooks::file_remove`] returns.
    pub fn remove(&self, hooks: &dyn StreamHooks, filesys: &FilesysTable, virt_path: &str) -> Result<(), OsError> {
        let _txn = Transaction::init(&self.table, LockMode::None)?;
        let native_path = filesys.translate(virt_path)?;
        hooks.file_remove(&native_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::FilesysHooks;

    struct FailingOpen;
    impl StreamHooks for FailingOpen {
        fn file_open(&self, _native_path: &str, _flags: OpenFlags, _access: AccessMode) -> Result<HostHandle, OsError> {
            Err(OsError::NameNotFound)
        }
        fn generic_close(&self, _handle: &HostHandle) -> Result<(), OsError> {
            Ok(())
        }
        fn generic_read(&self, _handle: &HostHandle, _buf: &mut [u8], _timeout: Option<Duration>) -> Result<usize, OsError> {
            Err(OsError::NotImplemented)
        }
        fn generic_write(&self, _handle: &HostHandle, _buf: &[u8], _timeout: Option<Duration>) -> Result<usize, OsError> {
            Err(OsError::NotImplemented)
        }
        fn generic_seek(&self, _handle: &HostHandle, _offset: i64, _whence: SeekWhence) -> Result<u64, OsError> {
            Err(OsError::NotImplemented)
        }
        fn file_chmod(&self, _native_path: &str, _mode_write: bool, _mode_read: bool) -> Result<(), OsError> {
            Err(OsError::NotImplemented)
        }
        fn file_stat(&self, _native_path: &str) -> Result<FileStat, OsError> {
            Err(OsError::NotImplemented)
        }
        fn file_rename(&self, _old_native_path: &str, _new_native_path: &str) -> Result<(), OsError> {
            Err(OsError::NotImplemented)
        }
        fn file_remove(&self, _native_path: &str) -> Result<(), OsError> {
            Err(OsError::NotImplemented)
        }
        fn socket_open(&self, _domain: SocketDomain, _ty: SocketType) -> Result<HostHandle, OsError> {
            Err(OsError::NotImplemented)
        }
        fn bind(&self, _handle: &HostHandle, _addr: SocketAddr) -> Result<SocketAddr, OsError> {
            Err(OsError::NotImplemented)
        }
        fn connect(&self, _handle: &HostHandle, _addr: SocketAddr, _timeout: Option<Duration>) -> Result<(), OsError> {
            Err(OsError::NotImplemented)
        }
        fn accept(&self, _handle: &HostHandle, _timeout: Option<Duration>) -> Result<(HostHandle, SocketAddr), OsError> {
            Err(OsError::NotImplemented)
        }
        fn shutdown(&self, _handle: &HostHandle) -> Result<(), OsError> {
            Ok(())
        }
        fn recv_from(&self, _handle: &HostHandle, _buf: &mut [u8], _timeout: Option<Duration>) -> Result<(usize, SocketAddr), OsError> {
            Err(OsError::NotImplemented)
        }
        fn send_to(&self, _handle: &HostHandle, _buf: &[u8], _addr: SocketAddr) -> Result<usize, OsError> {
            Err(OsError::NotImplemented)
        }
    }

    struct PassThroughFs;
    impl FilesysHooks for PassThroughFs {
        fn start_volume(&self, _: &str, _: bool, _: u32, _: u32, fixed: Option<&str>) -> Result<String, OsError> {
            Ok(fixed.unwrap_or("/tmp").to_string())
        }
        fn stop_volume(&self, _: &str) -> Result<(), OsError> {
            Ok(())
        }
        fn format_volume(&self, _: &str) -> Result<(), OsError> {
            Ok(())
        }
        fn mount_volume(&self, _: &str) -> Result<(), OsError> {
            Ok(())
        }
        fn unmount_volume(&self, _: &str) -> Result<(), OsError> {
            Ok(())
        }
    }

    #[test]
    fn failed_open_file_frees_the_slot_for_retry() {
        let filesys = FilesysTable::new(1);
        filesys.add_fixed_map(&PassThroughFs, "/data", "/mnt").unwrap();
        let streams = StreamTable::new(4);
        let hooks = FailingOpen;
        let flags = OpenFlags::default();
        assert_eq!(
            streams.open_file(&hooks, &filesys, "/mnt/a.txt", flags, AccessMode::ReadOnly, ObjectId::UNDEFINED).unwrap_err(),
            OsError::NameNotFound
        );
        // A slot stuck live under "/mnt/a.txt" would make this retry fail
        // with NAME_TAKEN instead of repeating the same open failure.
        assert_eq!(
            streams.open_file(&hooks, &filesys, "/mnt/a.txt", flags, AccessMode::ReadOnly, ObjectId::UNDEFINED).unwrap_err(),
            OsError::NameNotFound
        );
    }
}
