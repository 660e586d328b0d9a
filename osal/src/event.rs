// Copyright (c) 2026 the osal authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The single application-registered callback notified as resources are
//! allocated, created, deleted, or as a task starts (`spec.md` §4.4,
//! §6 event callback contract).
//!
//! Only one handler may be registered for the lifetime of an [`Osal`]
//! instance, matching the original's single `EventHandler` slot in its
//! shared globals; there is no unregister.
//!
//! [`Osal`]: crate::Osal

use crate::error::OsError;
use crate::id::ObjectId;
use std::sync::RwLock;

/// The four points in an object's lifecycle the handler observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The slot has been claimed (`active_id = RESERVED`) but the impl
    /// hook has not yet run. Runs with the type's global lock held; a
    /// nonzero return aborts the create with whatever error the handler
    /// chooses.
    ResourceAllocated,
    /// The object is fully constructed and its id is live. Runs with no
    /// lock held; the return value is ignored.
    ResourceCreated,
    /// The object has just been invalidated (`active_id = UNDEFINED`).
    /// Runs with no lock held; the return value is ignored.
    ResourceDeleted,
    /// A new task has begun executing. Runs with no lock held.
    TaskStartup,
}

/// An application event callback. Must not block indefinitely — it may
/// run with a per-type global lock held (see [`EventKind::ResourceAllocated`]).
pub trait EventHandler: Send + Sync {
    /// Handle one lifecycle event. Only the [`EventKind::ResourceAllocated`]
    /// return value is meaningful: a non-`Ok` result aborts the in-progress
    /// create and is surfaced to the caller as the create operation's error.
    fn on_event(&self, kind: EventKind, object_id: ObjectId) -> Result<(), OsError>;
}

/// Holds the one registered [`EventHandler`], if any.
#[derive(Default)]
pub struct EventNotify {
    handler: RwLock<Option<Box<dyn EventHandler>>>,
}

impl EventNotify {
    #[must_use]
    pub fn new() -> Self {
        EventNotify::default()
    }

    /// Register the application's callback. Replaces any previously
    /// registered handler (the original has no unregister either).
    pub fn register(&self, handler: Box<dyn EventHandler>) {
        *self.handler.write().expect("event handler lock poisoned") = Some(handler);
    }

    /// `OS_NotifyEvent`: dispatch one event to the registered handler, if
    /// any. Returns `Ok(())` when no handler is registered, matching the
    /// original's no-op-if-unset behavior.
    ///
    /// # Errors
    /// Only [`EventKind::ResourceAllocated`] can fail; every other kind's
    /// handler result is ignored, mirroring `FinalizeNew`/`FinalizeDelete`
    /// only emitting on the already-decided success path.
    pub fn notify(&self, kind: EventKind, object_id: ObjectId) -> Result<(), OsError> {
        let guard = self.handler.read().expect("event handler lock poisoned");
        let Some(handler) = guard.as_ref() else {
            return Ok(());
        };
        let result = handler.on_event(kind, object_id);
        if kind == EventKind::ResourceAllocated {
            result
        } else {
            if let Err(e) = result {
                log::warn!("event handler returned {e:?} for {kind:?}, ignored");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct Counter(Arc<AtomicU32>);
    impl EventHandler for Counter {
        fn on_event(&self, _kind: EventKind, _object_id: ObjectId) -> Result<(), OsError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn unregistered_notify_is_a_no_op() {
        let notify = EventNotify::new();
        assert!(notify
            .notify(EventKind::TaskStartup, ObjectId::UNDEFINED)
            .is_ok());
    }

    #[test]
    fn registered_handler_is_invoked() {
        let notify = EventNotify::new();
        let count = Arc::new(AtomicU32::new(0));
        notify.register(Box::new(Counter(count.clone())));
        notify
            .notify(EventKind::ResourceCreated, ObjectId::UNDEFINED)
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    struct Rejecter;
    impl EventHandler for Rejecter {
        fn on_event(&self, _kind: EventKind, _object_id: ObjectId) -> Result<(), OsError> {
            Err(OsError::NoFreeIds)
        }
    }

    #[test]
    fn resource_allocated_failure_propagates() {
        let notify = EventNotify::new();
        notify.register(Box::new(Rejecter));
        assert_eq!(
            notify.notify(EventKind::ResourceAllocated, ObjectId::UNDEFINED),
            Err(OsError::NoFreeIds)
        );
    }

    #[test]
    fn resource_created_failure_is_swallowed() {
        let notify = EventNotify::new();
        notify.register(Box::new(Rejecter));
        assert!(notify
            .notify(EventKind::ResourceCreated, ObjectId::UNDEFINED)
            .is_ok());
    }
}
