// Copyright (c) 2026 the osal authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The single chokepoint every operation on a managed object passes
//! through to acquire whatever concurrency rights it needs, and to release
//! them on every exit path (`spec.md` §4.2).

use crate::error::OsError;
use crate::id::{ObjectId, ObjectType};
use crate::record::ObjectRecord;
use crate::table::{TableData, TypeTable};
use std::sync::MutexGuard;

/// How a transaction wants to hold the per-type global lock, mirroring the
/// table in `spec.md` §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Not held on return, refcount unaffected. Rarely used: a lockless,
    /// informational read of a slot that doesn't go through `convert()`.
    None,
    /// Held on return, refcount +1. Short ops that mutate record fields.
    Global,
    /// Released before returning, refcount +1. Long ops that may block.
    Refcount,
    /// Released before returning (`active_id` left `RESERVED`), refcount
    /// +1, requires all other refs drained first. Create/delete.
    Exclusive,
    /// Held on return, refcount +1, matches against `RESERVED` instead of
    /// the captured id. Used for the recursive re-entry a creator/deleter
    /// task makes into its own slot while it is still `RESERVED` (the impl
    /// hook callback, event notification, and the `Finish` step all run
    /// against an already-`RESERVED` record).
    Reserved,
}

const MAX_CONVERT_ATTEMPTS: u32 = 5;

/// A transaction in flight against one slot of one [`TypeTable`]. Lives for
/// the duration of a single public `Osal` method call; never stored past
/// the call that created it.
pub struct Transaction<'a, E> {
    table: &'a TypeTable<E>,
    mode: LockMode,
    idx: usize,
    captured_id: ObjectId,
    guard: Option<MutexGuard<'a, TableData<E>>>,
    /// The `owner_key` imprinted on `guard` as of the last time it was
    /// freshly (re)acquired, checked against the guard's key again at
    /// release (`TypeTable::unlock_checked`).
    lock_key: u32,
}

impl<'a, E: Default> Transaction<'a, E> {
    /// `TransactionInit`: acquire the per-type lock (unless `mode ==
    /// None`) and record the mode/type on a fresh token.
    ///
    /// # Errors
    /// [`OsError::InvalidId`] if this class has zero configured capacity.
    pub fn init(table: &'a TypeTable<E>, mode: LockMode) -> Result<Self, OsError> {
        if table.max() == 0 {
            return Err(OsError::InvalidId);
        }
        let guard = if mode == LockMode::None {
            None
        } else {
            Some(table.lock())
        };
        let lock_key = guard.as_ref().map_or(0, |g| g.owner_key());
        Ok(Transaction {
            table,
            mode,
            idx: usize::MAX,
            captured_id: ObjectId::UNDEFINED,
            guard,
            lock_key,
        })
    }

    /// Begin a transaction against a specific, already-known id (the
    /// `OS_ObjectIdGetById` path): init plus array-index resolution.
    ///
    /// # Errors
    /// [`OsError::InvalidId`] if `id`'s type doesn't match `ty`, or its
    /// index is out of range for this table.
    pub fn init_for_id(
        table: &'a TypeTable<E>,
        mode: LockMode,
        ty: ObjectType,
        id: ObjectId,
    ) -> Result<Self, OsError> {
        let mut txn = Self::init(table, mode)?;
        let idx = match id.to_array_index(Some(ty), table.max()) {
            Ok(idx) => idx,
            Err(e) => {
                txn.cancel();
                return Err(e);
            }
        };
        txn.idx = idx;
        txn.captured_id = id;
        Ok(txn)
    }

    /// `ConvertToken`: validate that the slot still holds the id this
    /// transaction expects, then convert the held global lock into
    /// whatever this transaction's `mode` calls for.
    ///
    /// # Errors
    /// [`OsError::InvalidId`] if the slot no longer holds the expected id
    /// (and isn't merely `RESERVED` by another in-flight transaction), or
    /// [`OsError::ObjectInUse`] if the retry budget is exhausted waiting
    /// for a `RESERVED` slot or a draining refcount.
    pub fn convert(&mut self) -> Result<(), OsError> {
        enum Step {
            Success,
            Contend,
            Fail,
        }

        let mut expected = if self.mode == LockMode::Reserved {
            ObjectId::RESERVED
        } else {
            self.captured_id
        };
        let mut attempts = 0;
        let outcome: Result<(), OsError> = loop {
            let mut guard = self.guard.take().expect("convert() requires a held lock");
            let step = {
                let rec = &mut guard.slots[self.idx];
                if rec.active_id == expected {
                    if self.mode == LockMode::Exclusive {
                        if expected != ObjectId::RESERVED {
                            expected = ObjectId::RESERVED;
                            rec.active_id = ObjectId::RESERVED;
                        }
                        if rec.refcount == 0 {
                            Step::Success
                        } else {
                            Step::Contend
                        }
                    } else {
                        Step::Success
                    }
                } else if rec.active_id.is_reserved() {
                    Step::Contend
                } else {
                    Step::Fail
                };
                if let Step::Success = &step {
                    rec.refcount += 1;
                }
                step
            };

            match step {
                Step::Success => {
                    self.guard = Some(guard);
                    break Ok(());
                }
                Step::Fail => {
                    self.guard = Some(guard);
                    break Err(OsError::InvalidId);
                }
                Step::Contend => {
                    attempts += 1;
                    if attempts >= MAX_CONVERT_ATTEMPTS {
                        self.guard = Some(guard);
                        break Err(OsError::ObjectInUse);
                    }
                    let guard = self.table.wait_for_state_change(guard);
                    self.lock_key = guard.owner_key();
                    self.guard = Some(guard);
                }
            }
        };

        // An Exclusive attempt that flipped the slot to RESERVED but then
        // failed (refcount never drained within the retry budget) must put
        // the original id back so the slot isn't stranded as RESERVED.
        if outcome.is_err() && self.mode == LockMode::Exclusive && expected == ObjectId::RESERVED {
            let mut guard = self.guard.take().expect("guard held after convert loop");
            guard.slots[self.idx].active_id = self.captured_id;
            self.guard = Some(guard);
        }

        match outcome {
            Ok(()) => {
                self.release_if_needed();
                Ok(())
            }
            Err(e) => {
                self.cancel();
                Err(e)
            }
        }
    }

    fn release_if_needed(&mut self) {
        if matches!(self.mode, LockMode::Refcount | LockMode::Exclusive) {
            if let Some(guard) = self.guard.take() {
                self.table.unlock_checked(guard, self.lock_key);
            }
        }
    }

    /// `TransactionCancel`: abort a transaction that never reached a
    /// committed operation (e.g. a failed `convert()`). Releases the lock
    /// if still held.
    pub fn cancel(&mut self) {
        if let Some(guard) = self.guard.take() {
            self.table.unlock_checked(guard, self.lock_key);
        }
        self.mode = LockMode::None;
    }

    /// Direct mutable access to this slot's record, valid only while the
    /// global lock is actually held (`Global` mode, or between `init` and
    /// `convert` for any mode).
    pub fn record_mut(&mut self) -> &mut ObjectRecord<E> {
        &mut self
            .guard
            .as_mut()
            .expect("record_mut() requires a held lock")
            .slots[self.idx]
    }

    pub fn index(&self) -> usize {
        self.idx
    }

    pub fn captured_id(&self) -> ObjectId {
        self.captured_id
    }

    /// `TransactionFinish`: re-acquire the lock if this mode released it,
    /// decrement refcount, write `new_id` (create/delete finalization) or
    /// restore the captured id (failed `Exclusive` op), then release.
    pub fn finish(self, new_id: Option<ObjectId>) {
        self.finish_with(new_id, |_| {});
    }

    /// Like [`Transaction::finish`], but runs `f` against the record before
    /// the id/refcount bookkeeping, under the re-acquired lock. Needed by
    /// any caller that populates extra fields after a mode that released
    /// the lock on `convert()` (`Refcount`/`Exclusive`) — `record_mut()`
    /// isn't available at that point since there's no guard to borrow from.
    pub fn finish_with(mut self, new_id: Option<ObjectId>, f: impl FnOnce(&mut ObjectRecord<E>)) {
        let mut guard = match self.guard.take() {
            Some(guard) => guard,
            None => {
                let guard = self.table.lock();
                self.lock_key = guard.owner_key();
                guard
            }
        };
        {
            let rec = &mut guard.slots[self.idx];
            f(rec);
            rec.refcount = rec.refcount.saturating_sub(1);
            if let Some(id) = new_id {
                rec.active_id = id;
            } else if self.mode == LockMode::Exclusive {
                rec.active_id = self.captured_id;
            }
        }
        self.table.notify_all();
        self.table.unlock_checked(guard, self.lock_key);
        self.mode = LockMode::None;
    }
}

impl<E> Drop for Transaction<'_, E> {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            drop(guard);
        }
    }
}

/// `AllocateNew`: claim a fresh slot for `ty`, rejecting a name collision,
/// and leave the transaction holding an `Exclusive` lock on it ready for
/// `finish(Some(new_id))`. `creator` is the calling task's id, recorded
/// for `by_creator` iteration and diagnostics.
///
/// # Errors
/// [`OsError::NameTaken`] if `name` is already in use in this table,
/// otherwise whatever [`TypeTable::find_next_free`] returns.
pub fn allocate_new<'a, E: Default>(
    table: &'a TypeTable<E>,
    name: Option<String>,
    creator: ObjectId,
) -> Result<(Transaction<'a, E>, ObjectId), OsError> {
    let mut txn = Transaction::init(table, LockMode::Exclusive)?;
    {
        let guard = txn.guard.as_ref().expect("init(Exclusive) holds the lock");
        if let Some(name) = &name {
            if TypeTable::<E>::find_by_name(guard, name).is_some() {
                txn.cancel();
                return Err(OsError::NameTaken);
            }
        }
    }
    let (idx, new_id) = {
        let guard = txn.guard.as_mut().expect("init(Exclusive) holds the lock");
        match TypeTable::<E>::find_next_free(guard, table.ty, table.max(), creator) {
            Ok(pair) => pair,
            Err(e) => {
                txn.cancel();
                return Err(e);
            }
        }
    };
    txn.idx = idx;
    txn.captured_id = new_id;
    if let Some(name) = name {
        txn.record_mut().name = Some(name);
    }
    txn.convert()?;
    Ok((txn, new_id))
}
