// Copyright (c) 2026 the osal authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Filtered traversal of one object class under its global lock, with a
//! callback dispatch mode that safely relinquishes the lock around
//! caller-supplied closures (`spec.md` §4.3).

use crate::error::OsError;
use crate::id::ObjectId;
use crate::record::ObjectRecord;
use crate::table::{TableData, TypeTable};
use std::sync::MutexGuard;

/// An in-progress traversal. Holds the `GLOBAL` lock for its whole
/// lifetime except during [`ObjectIterator::process_entry`], which releases it
/// around the callback so the callback may itself start a transaction.
pub struct ObjectIterator<'a, E> {
    table: &'a TypeTable<E>,
    guard: Option<MutexGuard<'a, TableData<E>>>,
    next_idx: usize,
    current: Option<(usize, ObjectId)>,
}

impl<'a, E: Default> ObjectIterator<'a, E> {
    /// `Iterator.Init`: acquire the `GLOBAL` lock and start positioned
    /// before the first slot.
    #[must_use]
    pub fn init(table: &'a TypeTable<E>) -> Self {
        ObjectIterator {
            table,
            guard: Some(table.lock()),
            next_idx: 0,
            current: None,
        }
    }

    /// `Iterator.GetNext`: advance past the current position until
    /// `matchfn` accepts a live slot or the table is exhausted.
    pub fn get_next<F>(&mut self, mut matchfn: F) -> bool
    where
        F: FnMut(ObjectId, &ObjectRecord<E>) -> bool,
    {
        let guard = self.guard.as_ref().expect("iterator used after destroy");
        while self.next_idx < guard.slots.len() {
            let idx = self.next_idx;
            self.next_idx += 1;
            let rec = &guard.slots[idx];
            if rec.active_id.is_defined()
                && !rec.active_id.is_reserved()
                && matchfn(rec.active_id, rec)
            {
                self.current = Some((idx, rec.active_id));
                return true;
            }
        }
        self.current = None;
        false
    }

    /// The id the last successful [`ObjectIterator::get_next`] landed on.
    #[must_use]
    pub fn current(&self) -> Option<ObjectId> {
        self.current.map(|(_, id)| id)
    }

    /// Direct access to the current slot's record while the lock is held.
    #[must_use]
    pub fn current_record(&self) -> Option<&ObjectRecord<E>> {
        let (idx, _) = self.current?;
        self.guard.as_ref().map(|g| &g.slots[idx])
    }

    /// `Iterator.ProcessEntry`: release the global lock, invoke `f` with
    /// the id captured at the current position, then re-acquire. `f` may
    /// delete or otherwise mutate the entry (e.g. `close` on a file id);
    /// the slot is not re-validated here; the next [`ObjectIterator::get_next`]
    /// call re-reads whatever the table looks like on return.
    ///
    /// # Errors
    /// Whatever `f` returns.
    ///
    /// # Panics
    /// If called before any successful `get_next`, or after `destroy`.
    pub fn process_entry<F>(&mut self, f: F) -> Result<(), OsError>
    where
        F: FnOnce(ObjectId) -> Result<(), OsError>,
    {
        let (_, id) = self.current.expect("process_entry with no current entry");
        let guard = self.guard.take().expect("iterator used after destroy");
        drop(guard);
        let result = f(id);
        self.guard = Some(self.table.lock());
        result
    }

    /// `Iterator.Destroy`: release the lock early. Also runs on `Drop`.
    pub fn destroy(mut self) {
        self.guard.take();
    }
}

impl<E> Drop for ObjectIterator<'_, E> {
    fn drop(&mut self) {
        self.guard.take();
    }
}

/// Match predicate accepting every live slot.
#[must_use]
pub fn always<E>(_id: ObjectId, _rec: &ObjectRecord<E>) -> bool {
    true
}

/// Match predicate for slots created by a specific task/owner id.
#[must_use]
pub fn by_creator<E>(creator: ObjectId) -> impl Fn(ObjectId, &ObjectRecord<E>) -> bool {
    move |_id, rec| rec.creator == creator
}

/// Match predicate for a slot with an exact recorded name.
#[must_use]
pub fn by_name<'n, E>(name: &'n str) -> impl Fn(ObjectId, &ObjectRecord<E>) -> bool + 'n {
    move |_id, rec| rec.name.as_deref() == Some(name)
}

/// Run `f` over every slot accepted by `matchfn`, in index order, via
/// plain `GetNext` (no lock release around `f` — use
/// [`ObjectIterator::process_entry`] directly instead when `f` itself starts a
/// transaction on the table being iterated).
pub fn for_each<E, M, F>(table: &TypeTable<E>, mut matchfn: M, mut f: F)
where
    E: Default,
    M: FnMut(ObjectId, &ObjectRecord<E>) -> bool,
    F: FnMut(ObjectId),
{
    let mut it = ObjectIterator::init(table);
    while it.get_next(&mut matchfn) {
        if let Some(id) = it.current() {
            f(id);
        }
    }
    it.destroy();
}

/// `OS_ObjectIdGetByName`: the id of the live slot named exactly `name`,
/// if any. A thin public wrapper over the same lookup `AllocateNew` uses
/// internally for its name-collision check.
#[must_use]
pub fn lookup_by_name<E: Default>(table: &TypeTable<E>, name: &str) -> Option<ObjectId> {
    let guard = table.lock();
    let found = TypeTable::<E>::find_by_name(&guard, name).map(|(_, id)| id);
    drop(guard);
    found
}

/// `OS_ForEachObjectOfType`'s count-only variant: how many live slots in
/// `table` satisfy `matchfn`.
#[must_use]
pub fn count<E, M>(table: &TypeTable<E>, mut matchfn: M) -> u32
where
    E: Default,
    M: FnMut(ObjectId, &ObjectRecord<E>) -> bool,
{
    let mut n = 0u32;
    let mut it = ObjectIterator::init(table);
    while it.get_next(&mut matchfn) {
        n += 1;
    }
    it.destroy();
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ObjectType;
    use crate::transaction::{allocate_new, LockMode, Transaction};

    #[test]
    fn get_next_skips_free_and_reserved_slots() {
        let table: TypeTable<()> = TypeTable::new(ObjectType::Queue, 4);
        let (a, _) = allocate_new(&table, Some("a".into()), ObjectId::UNDEFINED).unwrap();
        a.finish(Some(a.captured_id()));
        let (b, _) = allocate_new(&table, Some("b".into()), ObjectId::UNDEFINED).unwrap();
        b.finish(Some(b.captured_id()));

        let mut it = ObjectIterator::init(&table);
        let mut seen = Vec::new();
        while it.get_next(always) {
            seen.push(it.current().unwrap());
        }
        assert_eq!(seen.len(), 2);
        it.destroy();
    }

    #[test]
    fn process_entry_allows_nested_transaction() {
        let table: TypeTable<()> = TypeTable::new(ObjectType::Stream, 4);
        let (txn, id) = allocate_new(&table, Some("f".into()), ObjectId::UNDEFINED).unwrap();
        txn.finish(Some(id));

        let mut it = ObjectIterator::init(&table);
        assert!(it.get_next(by_name("f")));
        it.process_entry(|found| {
            assert_eq!(found, id);
            let mut del =
                Transaction::init_for_id(&table, LockMode::Exclusive, ObjectType::Stream, found)?;
            del.convert()?;
            del.finish(Some(ObjectId::UNDEFINED));
            Ok(())
        })
        .unwrap();
        it.destroy();

        let guard = table.lock();
        assert!(guard.slots[id.serial() as usize % 4].active_id.is_undefined());
        drop(guard);
    }

    #[test]
    fn for_each_by_creator() {
        let table: TypeTable<()> = TypeTable::new(ObjectType::Mutex, 8);
        let creator = ObjectId::compose(ObjectType::Task, 1);
        for i in 0..3 {
            let owner = if i < 2 { creator } else { ObjectId::UNDEFINED };
            let (txn, new_id) = allocate_new(&table, None, owner).unwrap();
            txn.finish(Some(new_id));
        }

        let mut count = 0;
        for_each(&table, by_creator(creator), |_id| count += 1);
        assert_eq!(count, 2);
    }

    #[test]
    fn lookup_by_name_finds_live_slot_only() {
        let table: TypeTable<()> = TypeTable::new(ObjectType::Stream, 4);
        let (txn, id) = allocate_new(&table, Some("f".into()), ObjectId::UNDEFINED).unwrap();
        txn.finish(Some(id));
        assert_eq!(lookup_by_name(&table, "f"), Some(id));
        assert_eq!(lookup_by_name(&table, "missing"), None);

        let mut del = Transaction::init_for_id(&table, LockMode::Exclusive, ObjectType::Stream, id).unwrap();
        del.convert().unwrap();
        del.finish(Some(ObjectId::UNDEFINED));
        assert_eq!(lookup_by_name(&table, "f"), None);
    }
}
