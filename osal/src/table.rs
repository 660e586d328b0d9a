// Copyright (c) 2026 the osal authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! One table per object class: a fixed-size slot array plus the
//! condition-variable-protected global lock that mediates every mutation.

use crate::error::OsError;
use crate::id::{ObjectId, ObjectType, OBJECT_INDEX_MASK};
use crate::record::ObjectRecord;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::ThreadId;

/// State guarded by the per-type lock: the slot array plus the allocator's
/// bookkeeping (`ObjectTypeState` in `spec.md` §3.1).
pub struct TableData<E> {
    pub slots: Vec<ObjectRecord<E>>,
    last_id_issued: ObjectId,
    transaction_count: u64,
    /// Diagnostic only: imprinted while the lock is held, used to log a
    /// mismatch rather than to make locking itself sound (`std::sync::Mutex`
    /// already guarantees only the holder can release it).
    owner_key: u32,
}

impl<E> TableData<E> {
    /// Current allocator high-water mark, as a serial number.
    pub fn last_serial(&self) -> u32 {
        self.last_id_issued.serial()
    }

    pub fn set_last_id_issued(&mut self, id: ObjectId) {
        self.last_id_issued = id;
    }

    pub fn transaction_count(&self) -> u64 {
        self.transaction_count
    }

    /// The key imprinted on this guard by whichever `lock()`/
    /// `wait_for_state_change()` call last acquired it.
    pub fn owner_key(&self) -> u32 {
        self.owner_key
    }
}

/// One object class's table: slots plus lock/condvar.
pub struct TypeTable<E> {
    pub ty: ObjectType,
    max: u32,
    data: Mutex<TableData<E>>,
    cv: Condvar,
    owner_key_seed: AtomicU64,
    debug_printf: std::sync::atomic::AtomicBool,
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "owner_key is a diagnostic hash, not an addressable value"
)]
fn owner_key_for(thread: ThreadId, counter: u64) -> u32 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    use std::hash::{Hash, Hasher};
    thread.hash(&mut hasher);
    let thread_hash = hasher.finish() as u32;
    (0x4D00_0000u32) ^ thread_hash ^ (counter as u32)
}

impl<E: Default> TypeTable<E> {
    #[must_use]
    pub fn new(ty: ObjectType, max: u32) -> Self {
        let mut slots = Vec::with_capacity(max as usize);
        slots.resize_with(max as usize, ObjectRecord::empty);
        TypeTable {
            ty,
            max,
            data: Mutex::new(TableData {
                slots,
                last_id_issued: ObjectId::UNDEFINED,
                transaction_count: 0,
                owner_key: 0,
            }),
            cv: Condvar::new(),
            owner_key_seed: AtomicU64::new(0),
            debug_printf: std::sync::atomic::AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Gates the `log::warn!` emitted by [`TypeTable::unlock_checked`] on an
    /// `owner_key` mismatch (`OsConfig::debug_printf`, `spec.md` §7).
    pub fn set_debug_printf(&self, on: bool) {
        self.debug_printf.store(on, Ordering::Relaxed);
    }

    fn debug_printf_enabled(&self) -> bool {
        self.debug_printf.load(Ordering::Relaxed)
    }

    /// Acquire the per-type global lock. Used for `LockMode::Global`,
    /// `Refcount`, and `Exclusive`; `None` transactions never call this.
    pub fn lock(&self) -> MutexGuard<'_, TableData<E>> {
        let mut guard = self.data.lock().expect("object table mutex poisoned");
        guard.transaction_count += 1;
        let counter = self.owner_key_seed.fetch_add(1, Ordering::Relaxed);
        guard.owner_key = owner_key_for(std::thread::current().id(), counter);
        guard
    }

    /// Release-and-reacquire used by `ConvertToken`'s retry loop: the
    /// caller's owner key is cleared before sleeping and restored on wake.
    pub fn wait_for_state_change<'a>(
        &'a self,
        mut guard: MutexGuard<'a, TableData<E>>,
    ) -> MutexGuard<'a, TableData<E>> {
        guard.owner_key = 0;
        guard = self
            .cv
            .wait(guard)
            .expect("object table mutex poisoned while waiting");
        let counter = self.owner_key_seed.fetch_add(1, Ordering::Relaxed);
        guard.owner_key = owner_key_for(std::thread::current().id(), counter);
        guard
    }

    pub fn notify_all(&self) {
        self.cv.notify_all();
    }

    /// `Unlock`: verify `guard`'s imprinted owner key still matches
    /// `expected_key` before releasing. A mismatch can only mean a held
    /// guard's imprint was overwritten out from under its holder, which
    /// `std::sync::Mutex` never permits on its own — so it signals a bug
    /// in this table's own bookkeeping, logged rather than panicked so
    /// the release still completes (`spec.md` §3.2, §7).
    pub fn unlock_checked(&self, mut guard: MutexGuard<'_, TableData<E>>, expected_key: u32) {
        if guard.owner_key != expected_key {
            if self.debug_printf_enabled() {
                log::warn!(
                    target: "osal::table",
                    "owner_key mismatch unlocking {:?}: expected {expected_key:#010x}, found {:#010x}",
                    self.ty,
                    guard.owner_key,
                );
            }
            guard.owner_key = 0;
        }
        drop(guard);
    }

    /// `FindNextFree`: search forward from `last_id_issued + 1`, wrapping the
    /// serial counter at `OBJECT_INDEX_MASK`, claiming the first free slot.
    ///
    /// # Errors
    /// [`OsError::NotImplemented`] if this class has zero capacity,
    /// otherwise [`OsError::NoFreeIds`] if every slot is occupied.
    pub fn find_next_free(
        data: &mut TableData<E>,
        ty: ObjectType,
        max: u32,
        creator: ObjectId,
    ) -> Result<(usize, ObjectId), OsError> {
        if max == 0 {
            return Err(OsError::NotImplemented);
        }
        let mut serial = data.last_id_issued.serial();
        for _ in 0..max {
            serial = serial.wrapping_add(1);
            if serial >= OBJECT_INDEX_MASK {
                serial %= max;
            }
            let index = (serial % max) as usize;
            if data.slots[index].active_id.is_undefined() {
                let new_id = ObjectId::compose(ty, serial);
                data.slots[index] = ObjectRecord {
                    active_id: new_id,
                    name: None,
                    creator,
                    refcount: 0,
                    extra: E::default(),
                };
                data.last_id_issued = new_id;
                return Ok((index, new_id));
            }
        }
        Err(OsError::NoFreeIds)
    }

    /// Linear scan for a live slot with the given name, used by the
    /// `AllocateNew` name-collision check and by name-based lookups.
    pub fn find_by_name<'a>(data: &'a TableData<E>, name: &str) -> Option<(usize, ObjectId)> {
        data.slots.iter().enumerate().find_map(|(i, rec)| {
            if rec.active_id.is_defined()
                && !rec.active_id.is_reserved()
                && rec.name.as_deref() == Some(name)
            {
                Some((i, rec.active_id))
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_next_free_claims_and_advances() {
        let table: TypeTable<()> = TypeTable::new(ObjectType::Task, 4);
        let mut data = table.data.lock().unwrap();
        let (idx, id) =
            TypeTable::<()>::find_next_free(&mut data, ObjectType::Task, 4, ObjectId::UNDEFINED)
                .unwrap();
        assert_eq!(idx, id.serial() as usize % 4);
        assert!(data.slots[idx].active_id.is_defined());
    }

    #[test]
    fn find_next_free_exhausts() {
        let table: TypeTable<()> = TypeTable::new(ObjectType::Task, 2);
        let mut data = table.data.lock().unwrap();
        for _ in 0..2 {
            TypeTable::<()>::find_next_free(&mut data, ObjectType::Task, 2, ObjectId::UNDEFINED)
                .unwrap();
        }
        assert_eq!(
            TypeTable::<()>::find_next_free(&mut data, ObjectType::Task, 2, ObjectId::UNDEFINED),
            Err(OsError::NoFreeIds)
        );
    }

    #[test]
    fn zero_capacity_is_not_implemented() {
        let table: TypeTable<()> = TypeTable::new(ObjectType::Queue, 0);
        let mut data = table.data.lock().unwrap();
        assert_eq!(
            TypeTable::<()>::find_next_free(&mut data, ObjectType::Queue, 0, ObjectId::UNDEFINED),
            Err(OsError::NotImplemented)
        );
    }
}
