// Copyright (c) 2026 the osal authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The Console object class (`spec.md` §3.1 enumerates `Console` as a
//! type; no operations are specified there — see `SPEC_FULL.md` §2).
//! A console here is just a named sink that writes lines through the
//! [`log`] facade, keeping the id space complete and testable without a
//! real terminal driver.

use crate::error::OsError;
use crate::id::{ObjectId, ObjectType};
use crate::table::TypeTable;
use crate::transaction::{allocate_new, LockMode, Transaction};

/// Per-slot state specific to the Console class.
#[derive(Default)]
pub struct ConsoleExtra {
    device_name: String,
}

/// The Console object class.
pub struct ConsoleTable {
    table: TypeTable<ConsoleExtra>,
}

impl ConsoleTable {
    #[must_use]
    pub fn new(max: u32) -> Self {
        ConsoleTable {
            table: TypeTable::new(ObjectType::Console, max),
        }
    }

    #[must_use]
    pub fn inner(&self) -> &TypeTable<ConsoleExtra> {
        &self.table
    }

    /// # Errors
    /// [`OsError::NameTaken`] if `name` is already registered.
    pub fn create(&self, name: &str, creator: ObjectId) -> Result<ObjectId, OsError> {
        let (txn, id) = allocate_new(&self.table, Some(name.to_string()), creator)?;
        txn.finish_with(Some(id), |rec| rec.extra.device_name = name.to_string());
        Ok(id)
    }

    /// # Errors
    /// [`OsError::InvalidId`] if `id` doesn't name a live console.
    pub fn delete(&self, id: ObjectId) -> Result<(), OsError> {
        let mut txn = Transaction::init_for_id(&self.table, LockMode::Exclusive, ObjectType::Console, id)?;
        txn.convert()?;
        txn.finish(Some(ObjectId::UNDEFINED));
        Ok(())
    }

    /// `OS_ConsoleWrite`: emit one line through `log`, tagged with the
    /// console's device name.
    ///
    /// # Errors
    /// [`OsError::InvalidId`] if `id` doesn't name a live console.
    pub fn write(&self, id: ObjectId, line: &str) -> Result<(), OsError> {
        let idx = id.to_array_index(Some(ObjectType::Console), self.table.max())?;
        let guard = self.table.lock();
        let rec = &guard.slots[idx];
        if rec.active_id != id {
            drop(guard);
            return Err(OsError::InvalidId);
        }
        log::info!(target: "osal::console", "[{}] {line}", rec.extra.device_name);
        drop(guard);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_write_delete() {
        let table = ConsoleTable::new(2);
        let id = table.create("cons0", ObjectId::UNDEFINED).unwrap();
        table.write(id, "hello").unwrap();
        table.delete(id).unwrap();
        assert_eq!(table.write(id, "late").unwrap_err(), OsError::InvalidId);
    }

    #[test]
    fn duplicate_name_rejected() {
        let table = ConsoleTable::new(2);
        table.create("dup", ObjectId::UNDEFINED).unwrap();
        assert_eq!(
            table.create("dup", ObjectId::UNDEFINED).unwrap_err(),
            OsError::NameTaken
        );
    }
}
