// Copyright (c) 2026 the osal authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The virtual-mount registry and path translation algorithm (`spec.md`
//! §4.5). Every other object class opens resources by virtual path; this
//! table is what turns a virtual path into the native one an
//! [`crate::hooks::ImplHooks`] backend actually understands.

use crate::config::{MAX_FILE_NAME, MAX_LOCAL_PATH_LEN, MAX_PATH_LEN};
use crate::error::OsError;
use crate::hooks::FilesysHooks;
use crate::id::{ObjectId, ObjectType};
use crate::table::TypeTable;
use crate::transaction::{allocate_new, LockMode, Transaction};
use bitflags::bitflags;

bitflags! {
    /// Mount-table status bits (`spec.md` §4.5 `FilesysRecord`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FilesysFlags: u8 {
        const IS_READY = 0b0001;
        const IS_MOUNTED_SYSTEM = 0b0010;
        const IS_MOUNTED_VIRTUAL = 0b0100;
        const IS_FIXED = 0b1000;
    }
}

/// `VOLATILE_DISK` for a RAM-backed device, `NORMAL_DISK` otherwise
/// (`spec.md` §4.5 `mkfs`/`initfs` device-name-prefix rule).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FsType {
    #[default]
    NormalDisk,
    VolatileDisk,
}

/// Per-slot state specific to the FileSys class.
#[derive(Debug, Clone, Default)]
pub struct FilesysExtra {
    pub device_name: String,
    pub volume_name: String,
    pub system_mountpt: String,
    pub virtual_mountpt: String,
    pub fstype: FsType,
    pub flags: FilesysFlags,
    pub blocksize: u32,
    pub numblocks: u32,
}

/// The FileSys object class: the virtual-mount table.
pub struct FilesysTable {
    table: TypeTable<FilesysExtra>,
}

impl FilesysTable {
    #[must_use]
    pub fn new(max: u32) -> Self {
        FilesysTable {
            table: TypeTable::new(ObjectType::FileSys, max),
        }
    }

    #[must_use]
    pub fn inner(&self) -> &TypeTable<FilesysExtra> {
        &self.table
    }

    /// `Translate`: turn a virtual path into the native path an impl hook
    /// should operate on. Never follows symlinks or normalizes `..`
    /// segments — the original does a pure string splice against the
    /// mount table, and this port keeps that exactly, deliberately, since
    /// normalizing would change which mount point a path with `..` in it
    /// resolves against.
    ///
    /// # Errors
    /// [`OsError::FsPathInvalid`] if `virt_path` doesn't start with `/` or
    /// no mounted record's `virtual_mountpt` is a proper prefix of it,
    /// [`OsError::FsNameTooLong`] if the basename exceeds [`MAX_FILE_NAME`],
    /// [`OsError::NameTooLong`] if `virt_path` exceeds [`MAX_PATH_LEN`], or
    /// [`OsError::FsPathTooLong`] if the translated native path exceeds
    /// [`MAX_LOCAL_PATH_LEN`].
    pub fn translate(&self, virt_path: &str) -> Result<String, OsError> {
        if !virt_path.starts_with('/') {
            return Err(OsError::FsPathInvalid);
        }
        if virt_path.len() > MAX_PATH_LEN {
            return Err(OsError::NameTooLong);
        }
        let basename = virt_path.rsplit('/').next().unwrap_or("");
        if basename.len() > MAX_FILE_NAME {
            return Err(OsError::FsNameTooLong);
        }

        let guard = self.table.lock();
        let found = guard.slots.iter().find_map(|rec| {
            if !rec.active_id.is_defined() || rec.active_id.is_reserved() {
                return None;
            }
            if !rec.extra.flags.contains(FilesysFlags::IS_MOUNTED_VIRTUAL) {
                return None;
            }
            find_virt_mount_point(virt_path, &rec.extra.virtual_mountpt)
                .map(|tail| (rec.extra.system_mountpt.clone(), tail))
        });
        drop(guard);

        let (system_mountpt, tail) = found.ok_or(OsError::FsPathInvalid)?;
        let native = format!("{system_mountpt}{tail}");
        if native.len() > MAX_LOCAL_PATH_LEN {
            return Err(OsError::FsPathTooLong);
        }
        Ok(native)
    }

    /// `AddFixedMap`: a mount that is ready and mounted from the moment of
    /// creation, bypassing the separate mkfs/mount steps.
    ///
    /// # Errors
    /// Whatever impl `start_volume`/`mount_volume` returns.
    pub fn add_fixed_map(
        &self,
        hooks: &dyn FilesysHooks,
        phys_path: &str,
        virt_path: &str,
    ) -> Result<ObjectId, OsError> {
        let dev_name = phys_path.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or(phys_path);
        let (mut txn, id) = allocate_new(&self.table, Some(dev_name.to_string()), ObjectId::UNDEFINED)?;
        let system_mountpt = match hooks.start_volume(dev_name, false, 0, 0, Some(phys_path)) {
            Ok(path) => path,
            Err(e) => {
                // Allocation failed past ConvertToken: finalize the
                // RESERVED slot to UNDEFINED, not the claimed id.
                txn.finish(Some(ObjectId::UNDEFINED));
                return Err(e);
            }
        };
        if let Err(e) = hooks.mount_volume(&system_mountpt) {
            txn.finish(Some(ObjectId::UNDEFINED));
            return Err(e);
        }
        txn.finish_with(Some(id), |rec| {
            rec.extra.device_name = dev_name.to_string();
            rec.extra.system_mountpt = system_mountpt;
            rec.extra.virtual_mountpt = virt_path.to_string();
            rec.extra.flags =
                FilesysFlags::IS_FIXED | FilesysFlags::IS_READY | FilesysFlags::IS_MOUNTED_SYSTEM | FilesysFlags::IS_MOUNTED_VIRTUAL;
        });
        Ok(id)
    }

    /// `mkfs`/`initfs`: allocate a volume record and prepare its backing
    /// storage. `format` selects `mkfs` (calls impl `format_volume`) over
    /// `initfs` (adopts existing on-device content unchanged).
    ///
    /// # Errors
    /// Whatever impl `start_volume`/`format_volume` returns.
    pub fn make_fs(
        &self,
        hooks: &dyn FilesysHooks,
        device_name: &str,
        volume_name: &str,
        blocksize: u32,
        numblocks: u32,
        format: bool,
    ) -> Result<ObjectId, OsError> {
        let fstype = if device_name.starts_with("RAM") {
            FsType::VolatileDisk
        } else {
            FsType::NormalDisk
        };
        let is_ram = fstype == FsType::VolatileDisk;
        let (mut txn, id) = allocate_new(&self.table, Some(device_name.to_string()), ObjectId::UNDEFINED)?;
        let system_mountpt = match hooks.start_volume(device_name, is_ram, blocksize, numblocks, None) {
            Ok(path) => path,
            Err(e) => {
                // Allocation failed past ConvertToken: finalize the
                // RESERVED slot to UNDEFINED, not the claimed id.
                txn.finish(Some(ObjectId::UNDEFINED));
                return Err(e);
            }
        };
        if format {
            if let Err(e) = hooks.format_volume(device_name) {
                txn.finish(Some(ObjectId::UNDEFINED));
                return Err(e);
            }
        }
        txn.finish_with(Some(id), |rec| {
            rec.extra.device_name = device_name.to_string();
            rec.extra.volume_name = volume_name.to_string();
            rec.extra.system_mountpt = system_mountpt;
            rec.extra.fstype = fstype;
            rec.extra.blocksize = blocksize;
            rec.extra.numblocks = numblocks;
            rec.extra.flags = FilesysFlags::IS_READY;
        });
        Ok(id)
    }

    /// # Errors
    /// [`OsError::NameNotFound`] if no record matches `device_name`,
    /// [`OsError::IncorrectObjState`] unless `IS_READY` and neither mount
    /// bit is already set, otherwise whatever impl `mount_volume` returns.
    pub fn mount(&self, hooks: &dyn FilesysHooks, device_name: &str, mountpoint: &str) -> Result<(), OsError> {
        let id = self.find_by_device_name(device_name)?;
        let mut txn = Transaction::init_for_id(&self.table, LockMode::Global, ObjectType::FileSys, id)?;
        txn.convert()?;
        let rec = txn.record_mut();
        let flags = rec.extra.flags;
        if !flags.contains(FilesysFlags::IS_READY)
            || flags.intersects(FilesysFlags::IS_MOUNTED_SYSTEM | FilesysFlags::IS_MOUNTED_VIRTUAL)
        {
            txn.finish(None);
            return Err(OsError::IncorrectObjState);
        }
        if rec.extra.system_mountpt.is_empty() {
            txn.finish(None);
            return Err(OsError::FsPathInvalid);
        }
        let system_mountpt = rec.extra.system_mountpt.clone();
        match hooks.mount_volume(&system_mountpt) {
            Ok(()) => {
                let rec = txn.record_mut();
                rec.extra.virtual_mountpt = mountpoint.to_string();
                rec.extra.flags |= FilesysFlags::IS_MOUNTED_SYSTEM | FilesysFlags::IS_MOUNTED_VIRTUAL;
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
    /// [`OsError::NameNotFound`] if no record's `virtual_mountpt` equals
    /// `mountpoint`, [`OsError::IncorrectObjState`] unless ready and fully
    /// mounted, otherwise whatever impl `unmount_volume` returns.
    pub fn unmount(&self, hooks: &dyn FilesysHooks, mountpoint: &str) -> Result<(), OsError> {
        let id = self.find_by_virtual_mountpt(mountpoint)?;
        let mut txn = Transaction::init_for_id(&self.table, LockMode::Global, ObjectType::FileSys, id)?;
        txn.convert()?;
        let rec = txn.record_mut();
        let required = FilesysFlags::IS_READY | FilesysFlags::IS_MOUNTED_SYSTEM | FilesysFlags::IS_MOUNTED_VIRTUAL;
        if !rec.extra.flags.contains(required) {
            txn.finish(None);
            return Err(OsError::IncorrectObjState);
        }
        let native_mountpoint = rec.extra.system_mountpt.clone();
        match hooks.unmount_volume(&native_mountpoint) {
            Ok(()) => {
                let rec = txn.record_mut();
                rec.extra.flags.remove(FilesysFlags::IS_MOUNTED_SYSTEM | FilesysFlags::IS_MOUNTED_VIRTUAL);
                txn.finish(None);
                Ok(())
            }
            Err(e) => {
                txn.finish(None);
                Err(e)
            }
        }
    }

    /// `rmfs`: exclusive delete of a volume record not currently mounted.
    ///
    /// # Errors
    /// [`OsError::NameNotFound`] if no record matches `device_name`,
    /// otherwise whatever impl `stop_volume` returns.
    pub fn remove_fs(&self, hooks: &dyn FilesysHooks, device_name: &str) -> Result<(), OsError> {
        let id = self.find_by_device_name(device_name)?;
        let mut txn = Transaction::init_for_id(&self.table, LockMode::Exclusive, ObjectType::FileSys, id)?;
        let name = txn.record_mut().extra.device_name.clone();
        txn.convert()?;
        let result = hooks.stop_volume(&name);
        txn.finish(Some(ObjectId::UNDEFINED));
        result
    }

    fn find_by_device_name(&self, device_name: &str) -> Result<ObjectId, OsError> {
        let guard = self.table.lock();
        let found = guard.slots.iter().find_map(|rec| {
            (rec.active_id.is_defined() && !rec.active_id.is_reserved() && rec.extra.device_name == device_name)
                .then_some(rec.active_id)
        });
        drop(guard);
        found.ok_or(OsError::NameNotFound)
    }

    fn find_by_virtual_mountpt(&self, mountpoint: &str) -> Result<ObjectId, OsError> {
        let guard = self.table.lock();
        let found = guard.slots.iter().find_map(|rec| {
            (rec.active_id.is_defined() && !rec.active_id.is_reserved() && rec.extra.virtual_mountpt == mountpoint)
                .then_some(rec.active_id)
        });
        drop(guard);
        found.ok_or(OsError::NameNotFound)
    }
}

/// Match predicate for [`crate::iterator::ObjectIterator`] traversal over mounted records
/// whose `virtual_mountpt` is a prefix of `path` (`spec.md` §4.3
/// by-virtual-mount-prefix built-in predicate).
#[must_use]
pub fn by_virtual_mount_prefix(path: &str) -> impl Fn(ObjectId, &crate::record::ObjectRecord<FilesysExtra>) -> bool + '_ {
    move |_id, rec| {
        rec.extra.flags.contains(FilesysFlags::IS_MOUNTED_VIRTUAL)
            && find_virt_mount_point(path, &rec.extra.virtual_mountpt).is_some()
    }
}

/// `FindVirtMountPoint`'s matching rule applied to one candidate mount
/// point: `Some(tail)` when `mountpt` is a proper prefix of `target` and
/// the next character is `/` or the target ends there.
fn find_virt_mount_point<'t>(target: &'t str, mountpt: &str) -> Option<&'t str> {
    let tail = target.strip_prefix(mountpt)?;
    if tail.is_empty() || tail.starts_with('/') {
        Some(tail)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeFs {
        calls: StdMutex<Vec<String>>,
    }

    impl FilesysHooks for FakeFs {
        fn start_volume(
            &self,
            device_name: &str,
            _is_ram: bool,
            _blocksize: u32,
            _numblocks: u32,
            fixed_mountpt: Option<&str>,
        ) -> Result<String, OsError> {
            self.calls.lock().unwrap().push(format!("start:{device_name}"));
            Ok(fixed_mountpt.map_or_else(|| format!("/tmp/osal-test/{device_name}"), ToString::to_string))
        }
        fn stop_volume(&self, device_name: &str) -> Result<(), OsError> {
            self.calls.lock().unwrap().push(format!("stop:{device_name}"));
            Ok(())
        }
        fn format_volume(&self, device_name: &str) -> Result<(), OsError> {
            self.calls.lock().unwrap().push(format!("format:{device_name}"));
            Ok(())
        }
        fn mount_volume(&self, system_mountpt: &str) -> Result<(), OsError> {
            self.calls.lock().unwrap().push(format!("mount:{system_mountpt}"));
            Ok(())
        }
        fn unmount_volume(&self, system_mountpt: &str) -> Result<(), OsError> {
            self.calls.lock().unwrap().push(format!("unmount:{system_mountpt}"));
            Ok(())
        }
    }

    #[test]
    fn find_virt_mount_point_rejects_aliasing() {
        assert!(find_virt_mount_point("/mnt/abcd/file", "/mnt/abc").is_none());
        assert_eq!(find_virt_mount_point("/mnt/abc/file", "/mnt/abc"), Some("/file"));
        assert_eq!(find_virt_mount_point("/mnt/abc", "/mnt/abc"), Some(""));
    }

    #[test]
    fn mkfs_mount_translate_unmount_rmfs_scenario() {
        let table = FilesysTable::new(4);
        let hooks = FakeFs::default();
        table.make_fs(&hooks, "RAM3", "RAM3", 512, 64, true).unwrap();
        table.mount(&hooks, "RAM3", "/drive3").unwrap();

        let native = table.translate("/drive3/foo").unwrap();
        assert_eq!(native, "/tmp/osal-test/RAM3/foo");

        table.unmount(&hooks, "/drive3").unwrap();
        assert!(table.translate("/drive3/foo").is_err());

        table.remove_fs(&hooks, "RAM3").unwrap();
        assert_eq!(table.mount(&hooks, "RAM3", "/drive3").unwrap_err(), OsError::NameNotFound);
    }

    #[test]
    fn translate_rejects_relative_and_oversized_paths() {
        let table = FilesysTable::new(4);
        assert_eq!(table.translate("no/leading/slash").unwrap_err(), OsError::FsPathInvalid);
        let long = format!("/{}", "a".repeat(MAX_PATH_LEN));
        assert_eq!(table.translate(&long).unwrap_err(), OsError::NameTooLong);
    }

    #[test]
    fn translate_unmounted_prefix_is_path_invalid() {
        let table = FilesysTable::new(4);
        assert_eq!(table.translate("/nowhere/file").unwrap_err(), OsError::FsPathInvalid);
    }

    #[derive(Default)]
    struct FailingMount;
    impl FilesysHooks for FailingMount {
        fn start_volume(&self, _: &str, _: bool, _: u32, _: u32, fixed: Option<&str>) -> Result<String, OsError> {
            Ok(fixed.unwrap_or("/tmp/unused").to_string())
        }
        fn stop_volume(&self, _: &str) -> Result<(), OsError> {
            Ok(())
        }
        fn format_volume(&self, _: &str) -> Result<(), OsError> {
            Ok(())
        }
        fn mount_volume(&self, _: &str) -> Result<(), OsError> {
            Err(OsError::Error)
        }
        fn unmount_volume(&self, _: &str) -> Result<(), OsError> {
            Ok(())
        }
    }

    #[test]
    fn failed_add_fixed_map_frees_the_slot_for_retry() {
        let table = FilesysTable::new(4);
        let hooks = FailingMount;
        assert_eq!(table.add_fixed_map(&hooks, "/dev/x", "/mnt/x").unwrap_err(), OsError::Error);
        // A stuck RESERVED-turned-live slot under device "x" would make
        // this second attempt fail with NAME_TAKEN instead of repeating
        // the same mount failure.
        assert_eq!(table.add_fixed_map(&hooks, "/dev/x", "/mnt/x").unwrap_err(), OsError::Error);
    }
}
