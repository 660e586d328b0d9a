// Copyright (c) 2026 the osal authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! User-visible condition variables (`spec.md` §4.8 CondVar hook group,
//! §9 "condition variables with an adjacent mutex").
//!
//! The original exposes `Create`/`Delete`/`Lock`/`Unlock`/`Signal`/
//! `Broadcast`/`Wait`/`TimedWait` as free functions taking a bare id,
//! because C has no scoped ownership: `Lock` and the matching `Unlock`
//! are two calls with arbitrary caller code between them. This port
//! folds `Lock`+body+`Unlock` into one scoped call, [`CondVarTable::with_lock`],
//! whose closure receives a [`CondVarSession`] standing in for the locked
//! critical section, released on `Drop`. Like every other object class, the
//! actual primitive lives behind [`crate::hooks::CondVarHooks`] rather than
//! inside this table, so a host backend can supply its own. See `DESIGN.md`.

use crate::error::OsError;
use crate::hooks::{CondVarHooks, HostHandle};
use crate::id::{ObjectId, ObjectType};
use crate::table::TypeTable;
use crate::transaction::{allocate_new, LockMode, Transaction};
use std::time::Duration;

/// Per-slot state specific to the CondVar class.
#[derive(Default)]
pub struct CondVarExtra {
    handle: Option<HostHandle>,
}

/// An open critical section: the locked handle plus the hooks it was
/// locked through. Dropped (and thus unlocked) when [`CondVarTable::with_lock`]'s
/// closure returns.
pub struct CondVarSession<'a> {
    hooks: &'a dyn CondVarHooks,
    handle: HostHandle,
}

impl CondVarSession<'_> {
    /// `Wait`: block until [`CondVarSession::signal`]/[`CondVarSession::broadcast`]
    /// from another session on the same object wakes this one.
    ///
    /// # Panics
    /// If the backend's `wait` hook fails; the reference backend never
    /// does.
    pub fn wait(&mut self) {
        self.hooks.wait(&self.handle).expect("condvar wait hook failed");
    }

    /// `TimedWait`: as [`CondVarSession::wait`], but gives up after
    /// `timeout` elapses. Returns `true` if woken by a signal, `false` on
    /// timeout. The original takes an absolute wakeup time; converting
    /// that to a relative duration against the current clock is the
    /// caller's job at the public API boundary (`spec.md` §9).
    ///
    /// # Panics
    /// If the backend's `timed_wait` hook fails.
    pub fn timed_wait(&mut self, timeout: Duration) -> bool {
        self.hooks.timed_wait(&self.handle, timeout).expect("condvar timed_wait hook failed")
    }

    /// `Signal`: wake one waiter, if any.
    pub fn signal(&self) {
        let _ = self.hooks.signal(&self.handle);
    }

    /// `Broadcast`: wake every waiter.
    pub fn broadcast(&self) {
        let _ = self.hooks.broadcast(&self.handle);
    }
}

impl Drop for CondVarSession<'_> {
    fn drop(&mut self) {
        let _ = self.hooks.unlock(&self.handle);
    }
}

/// The CondVar object class.
pub struct CondVarTable {
    table: TypeTable<CondVarExtra>,
}

impl CondVarTable {
    #[must_use]
    pub fn new(max: u32) -> Self {
        CondVarTable {
            table: TypeTable::new(ObjectType::CondVar, max),
        }
    }

    #[must_use]
    pub fn inner(&self) -> &TypeTable<CondVarExtra> {
        &self.table
    }

    /// `Create`: allocate a record with a fresh host-backed handle.
    ///
    /// # Errors
    /// [`OsError::NameTaken`] if `name` is already registered, whatever
    /// [`crate::transaction::allocate_new`] returns, or whatever
    /// [`CondVarHooks::create`] returns.
    pub fn create(&self, hooks: &dyn CondVarHooks, name: &str, creator: ObjectId) -> Result<ObjectId, OsError> {
        let (txn, id) = allocate_new(&self.table, Some(name.to_string()), creator)?;
        let handle = match hooks.create() {
            Ok(handle) => handle,
            Err(e) => {
                txn.finish(Some(ObjectId::UNDEFINED));
                return Err(e);
            }
        };
        txn.finish_with(Some(id), |rec| {
            rec.extra.handle = Some(handle);
        });
        Ok(id)
    }

    /// `Delete`: exclusive removal. Any session still holding a clone of
    /// the handle keeps it alive until that session ends, matching the
    /// original's requirement that an in-progress `Wait` not be disturbed
    /// by a concurrent delete (`spec.md` §5 cancellation note, applied
    /// here to delete instead).
    ///
    /// # Errors
    /// Whatever [`crate::transaction::Transaction::init_for_id`] returns
    /// for an unknown `id`, or whatever [`CondVarHooks::delete`] returns.
    pub fn delete(&self, hooks: &dyn CondVarHooks, id: ObjectId) -> Result<(), OsError> {
        let mut txn = Transaction::init_for_id(&self.table, LockMode::Exclusive, ObjectType::CondVar, id)?;
        let handle = txn.record_mut().extra.handle.take();
        txn.convert()?;
        let result = match &handle {
            Some(h) => hooks.delete(h),
            None => Ok(()),
        };
        txn.finish(Some(ObjectId::UNDEFINED));
        result
    }

    /// `Lock` + caller body + `Unlock` as one scoped call: locks the
    /// object's handle, runs `f` against the open [`CondVarSession`], then
    /// unlocks on return.
    ///
    /// # Errors
    /// [`OsError::InvalidId`] if `id` doesn't name a live CondVar, or
    /// whatever [`CondVarHooks::lock`] returns.
    pub fn with_lock<T>(&self, hooks: &dyn CondVarHooks, id: ObjectId, f: impl FnOnce(&mut CondVarSession<'_>) -> T) -> Result<T, OsError> {
        let handle = self.handle_for(id)?;
        hooks.lock(&handle)?;
        let mut session = CondVarSession { hooks, handle };
        Ok(f(&mut session))
    }

    fn handle_for(&self, id: ObjectId) -> Result<HostHandle, OsError> {
        let idx = id.to_array_index(Some(ObjectType::CondVar), self.table.max())?;
        let guard = self.table.lock();
        let rec = &guard.slots[idx];
        if rec.active_id != id {
            drop(guard);
            return Err(OsError::InvalidId);
        }
        let handle = rec.extra.handle.clone().expect("live CondVar slot always has a handle");
        drop(guard);
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::std_hosted::StdHostedBackend;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn mutual_exclusion_scenario() {
        let backend = StdHostedBackend;
        let hooks = backend.condvar();
        let table = Arc::new(CondVarTable::new(2));
        let id = table.create(hooks, "c", ObjectId::UNDEFINED).unwrap();
        let x = Arc::new(AtomicU32::new(0));

        let t1 = {
            let table = table.clone();
            let x = x.clone();
            thread::spawn(move || {
                let backend = StdHostedBackend;
                table
                    .with_lock(backend.condvar(), id, |s| {
                        while x.load(Ordering::SeqCst) == 0 {
                            s.wait();
                        }
                        x.load(Ordering::SeqCst)
                    })
                    .unwrap()
            })
        };

        thread::sleep(Duration::from_millis(20));
        table
            .with_lock(hooks, id, |s| {
                x.store(1, Ordering::SeqCst);
                s.signal();
            })
            .unwrap();

        assert_eq!(t1.join().unwrap(), 1);
    }

    #[test]
    fn timed_wait_reports_timeout() {
        let backend = StdHostedBackend;
        let hooks = backend.condvar();
        let table = CondVarTable::new(2);
        let id = table.create(hooks, "c", ObjectId::UNDEFINED).unwrap();
        let woke = table.with_lock(hooks, id, |s| s.timed_wait(Duration::from_millis(10))).unwrap();
        assert!(!woke);
    }

    #[test]
    fn delete_then_lock_is_invalid() {
        let backend = StdHostedBackend;
        let hooks = backend.condvar();
        let table = CondVarTable::new(2);
        let id = table.create(hooks, "c", ObjectId::UNDEFINED).unwrap();
        table.delete(hooks, id).unwrap();
        assert_eq!(table.with_lock(hooks, id, |_| ()).unwrap_err(), OsError::InvalidId);
    }
}
