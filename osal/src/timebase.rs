// Copyright (c) 2026 the osal authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! TimeBase/Timer periodic-callback objects (`spec.md` §3.1 enumerates
//! both as types; see `SPEC_FULL.md` §2 for what a complete
//! implementation adds): a time base is a named tick source; one or
//! more timers attach to it with a start delay and a repeat interval
//! and fire an application callback.
//!
//! A hosted OS has no real tick interrupt, so driving timers forward is
//! the host's job: `crate::backend::std_hosted` runs a background
//! thread that calls [`TimeBaseTable::tick`] once per host-chosen
//! period, exactly the role the original's architecture-specific
//! `BSP_TimerCallback` plays for the hardware tick source.

use crate::error::OsError;
use crate::id::{ObjectId, ObjectType};
use crate::iterator::ObjectIterator;
use crate::table::TypeTable;
use crate::time::TimeValue;
use crate::transaction::{allocate_new, LockMode, Transaction};
use std::sync::Arc;

/// Invoked once per elapsed timer interval.
pub trait TimerCallback: Send + Sync {
    fn on_tick(&self, timer_id: ObjectId);
}

/// Per-slot state specific to the TimeBase class. Free-standing: a time
/// base has no fields of its own beyond its name/creator (already
/// tracked by [`crate::record::ObjectRecord`]); timers reference it by id.
#[derive(Default)]
pub struct TimeBaseExtra;

/// Per-slot state specific to the TimerCb class.
pub struct TimerCbExtra {
    timebase: ObjectId,
    start: TimeValue,
    interval: TimeValue,
    remaining: TimeValue,
    callback: Option<Arc<dyn TimerCallback>>,
}

impl Default for TimerCbExtra {
    fn default() -> Self {
        TimerCbExtra {
            timebase: ObjectId::UNDEFINED,
            start: TimeValue::ZERO,
            interval: TimeValue::ZERO,
            remaining: TimeValue::ZERO,
            callback: None,
        }
    }
}

/// The TimeBase and TimerCb object classes together, since every timer
/// operation needs to scan the timers attached to one time base.
pub struct TimeBaseTable {
    bases: TypeTable<TimeBaseExtra>,
    timers: TypeTable<TimerCbExtra>,
}

impl TimeBaseTable {
    #[must_use]
    pub fn new(max_bases: u32, max_timers: u32) -> Self {
        TimeBaseTable {
            bases: TypeTable::new(ObjectType::TimeBase, max_bases),
            timers: TypeTable::new(ObjectType::TimerCb, max_timers),
        }
    }

    #[must_use]
    pub fn bases(&self) -> &TypeTable<TimeBaseExtra> {
        &self.bases
    }

    #[must_use]
    pub fn timers(&self) -> &TypeTable<TimerCbExtra> {
        &self.timers
    }

    /// # Errors
    /// [`OsError::NameTaken`] if `name` is already registered.
    pub fn create(&self, name: &str, creator: ObjectId) -> Result<ObjectId, OsError> {
        let (txn, id) = allocate_new(&self.bases, Some(name.to_string()), creator)?;
        txn.finish(Some(id));
        Ok(id)
    }

    /// Deletes the time base and every timer still attached to it.
    ///
    /// # Errors
    /// [`OsError::InvalidId`] if `id` doesn't name a live time base.
    pub fn delete(&self, id: ObjectId) -> Result<(), OsError> {
        let mut txn = Transaction::init_for_id(&self.bases, LockMode::Exclusive, ObjectType::TimeBase, id)?;
        txn.convert()?;
        txn.finish(Some(ObjectId::UNDEFINED));

        let mut it = ObjectIterator::init(&self.timers);
        while it.get_next(|_id, rec| rec.extra.timebase == id) {
            it.process_entry(|found| self.detach(found))?;
        }
        it.destroy();
        Ok(())
    }

    /// `OS_TimerAdd` + `OS_TimerSet`: attach a new timer to `timebase_id`.
    /// `interval == TimeValue::ZERO` means one-shot: the callback fires
    /// once after `start` elapses and the timer is left expired (not
    /// re-armed) rather than being deleted automatically, matching the
    /// original's leave-it-for-the-caller-to-delete lifetime.
    ///
    /// # Errors
    /// [`OsError::InvalidId`] if `timebase_id` doesn't name a live time base.
    pub fn attach(
        &self,
        timebase_id: ObjectId,
        name: &str,
        start: TimeValue,
        interval: TimeValue,
        callback: Arc<dyn TimerCallback>,
        creator: ObjectId,
    ) -> Result<ObjectId, OsError> {
        {
            let idx = timebase_id.to_array_index(Some(ObjectType::TimeBase), self.bases.max())?;
            let guard = self.bases.lock();
            if guard.slots[idx].active_id != timebase_id {
                drop(guard);
                return Err(OsError::InvalidId);
            }
            drop(guard);
        }
        let (txn, id) = allocate_new(&self.timers, Some(name.to_string()), creator)?;
        txn.finish_with(Some(id), |rec| {
            rec.extra.timebase = timebase_id;
            rec.extra.start = start;
            rec.extra.interval = interval;
            rec.extra.remaining = start;
            rec.extra.callback = Some(callback);
        });
        Ok(id)
    }

    /// # Errors
    /// [`OsError::InvalidId`] if `timer_id` doesn't name a live timer.
    pub fn detach(&self, timer_id: ObjectId) -> Result<(), OsError> {
        let mut txn = Transaction::init_for_id(&self.timers, LockMode::Exclusive, ObjectType::TimerCb, timer_id)?;
        txn.convert()?;
        txn.finish(Some(ObjectId::UNDEFINED));
        Ok(())
    }

    /// The host's manual drive point: advance every timer attached to
    /// `timebase_id` by `elapsed`, firing callbacks for every timer whose
    /// remaining time ran out (possibly more than once if `elapsed`
    /// spans multiple intervals). One-shot timers (`interval ==
    /// TimeValue::ZERO`) fire at most once and then sit expired.
    pub fn tick(&self, timebase_id: ObjectId, elapsed: TimeValue) {
        let guard = self.timers.lock();
        let due: Vec<(ObjectId, Arc<dyn TimerCallback>)> = guard
            .slots
            .iter()
            .filter(|rec| rec.active_id.is_defined() && !rec.active_id.is_reserved())
            .filter(|rec| rec.extra.timebase == timebase_id)
            .filter_map(|rec| rec.extra.callback.clone().map(|cb| (rec.active_id, cb)))
            .collect();
        drop(guard);

        for (timer_id, _) in &due {
            let mut txn = match Transaction::init_for_id(&self.timers, LockMode::Global, ObjectType::TimerCb, *timer_id) {
                Ok(txn) => txn,
                Err(_) => continue,
            };
            if txn.convert().is_err() {
                continue;
            }
            let rec = txn.record_mut();
            rec.extra.remaining = rec.extra.remaining.subtract(elapsed);
            let should_fire = rec.extra.remaining <= TimeValue::ZERO;
            if should_fire {
                if rec.extra.interval > TimeValue::ZERO {
                    rec.extra.remaining = rec.extra.interval;
                } else {
                    rec.extra.remaining = TimeValue::ZERO;
                }
            }
            txn.finish(None);

            if should_fire {
                if let Some((_, cb)) = due.iter().find(|(id, _)| id == timer_id) {
                    cb.on_tick(*timer_id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counter(Arc<AtomicU32>);
    impl TimerCallback for Counter {
        fn on_tick(&self, _timer_id: ObjectId) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn periodic_timer_fires_on_interval() {
        let table = TimeBaseTable::new(2, 4);
        let base = table.create("tb0", ObjectId::UNDEFINED).unwrap();
        let count = Arc::new(AtomicU32::new(0));
        let start = TimeValue::from_milliseconds(10);
        let interval = TimeValue::from_milliseconds(10);
        table
            .attach(base, "t0", start, interval, Arc::new(Counter(count.clone())), ObjectId::UNDEFINED)
            .unwrap();

        table.tick(base, TimeValue::from_milliseconds(5));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        table.tick(base, TimeValue::from_milliseconds(5));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        table.tick(base, TimeValue::from_milliseconds(10));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn one_shot_fires_once() {
        let table = TimeBaseTable::new(2, 4);
        let base = table.create("tb0", ObjectId::UNDEFINED).unwrap();
        let count = Arc::new(AtomicU32::new(0));
        table
            .attach(
                base,
                "t0",
                TimeValue::from_milliseconds(10),
                TimeValue::ZERO,
                Arc::new(Counter(count.clone())),
                ObjectId::UNDEFINED,
            )
            .unwrap();
        table.tick(base, TimeValue::from_milliseconds(10));
        table.tick(base, TimeValue::from_milliseconds(10));
        table.tick(base, TimeValue::from_milliseconds(10));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delete_timebase_removes_its_timers() {
        let table = TimeBaseTable::new(2, 4);
        let base = table.create("tb0", ObjectId::UNDEFINED).unwrap();
        let count = Arc::new(AtomicU32::new(0));
        let timer = table
            .attach(base, "t0", TimeValue::ZERO, TimeValue::ZERO, Arc::new(Counter(count)), ObjectId::UNDEFINED)
            .unwrap();
        table.delete(base).unwrap();
        assert_eq!(table.detach(timer).unwrap_err(), OsError::InvalidId);
    }
}
