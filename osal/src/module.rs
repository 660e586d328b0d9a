// Copyright (c) 2026 the osal authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Loadable module registry: a static, link-time symbol table checked
//! before ever reaching for the host's dynamic loader (`spec.md` §4.6).

use crate::error::OsError;
use crate::filesys::FilesysTable;
use crate::hooks::{HostHandle, ModuleHooks};
use crate::id::{ObjectId, ObjectType};
use crate::table::TypeTable;
use crate::transaction::{allocate_new, LockMode, Transaction};

/// One entry in the build-time static symbol table. A `None` address is a
/// "module present but no symbols" placeholder: the module name resolves
/// for `module_load`/`module_type` purposes but exports nothing.
#[derive(Debug, Clone)]
pub struct StaticSymbol {
    pub name: String,
    pub module: String,
    pub address: Option<usize>,
}

/// Whether a loaded module's lifetime is owned by this table (`Dynamic`,
/// unloaded via the impl hook) or by the static link (`Static`, a no-op
/// placeholder with no corresponding [`HostHandle`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Static,
    Dynamic,
}

impl Default for ModuleKind {
    fn default() -> Self {
        ModuleKind::Dynamic
    }
}

/// Per-slot state specific to the Module class.
#[derive(Default)]
pub struct ModuleExtra {
    pub kind: ModuleKind,
    pub file_name: String,
    pub handle: Option<HostHandle>,
}

/// The Module object class, plus the static symbol table consulted ahead
/// of (and as a fallback after) every impl-backed load/lookup.
pub struct ModuleTable {
    table: TypeTable<ModuleExtra>,
    static_symbols: Vec<StaticSymbol>,
}

impl ModuleTable {
    #[must_use]
    pub fn new(max: u32, static_symbols: Vec<StaticSymbol>) -> Self {
        ModuleTable {
            table: TypeTable::new(ObjectType::Module, max),
            static_symbols,
        }
    }

    #[must_use]
    pub fn inner(&self) -> &TypeTable<ModuleExtra> {
        &self.table
    }

    /// `ModuleLoad`: if `module_name` is present in the static table, mark
    /// this record `Static` and skip the impl loader entirely. Otherwise
    /// translate `filename` through `filesys` and call impl `module_load`.
    ///
    /// # Errors
    /// [`OsError::NameTooLong`] if `module_name` exceeds the configured
    /// limit, whatever path translation returns if not a static module,
    /// otherwise whatever [`ModuleHooks::module_load`] returns.
    pub fn load(
        &self,
        hooks: &dyn ModuleHooks,
        filesys: &FilesysTable,
        module_name: &str,
        filename: &str,
        creator: ObjectId,
    ) -> Result<ObjectId, OsError> {
        if module_name.len() >= crate::config::MAX_API_NAME {
            return Err(OsError::NameTooLong);
        }

        // Translated ahead of allocation, mirroring the original's
        // lock-ordering note: path translation takes its own table lock
        // and must not be attempted while the Module table's lock is held.
        let translated = filesys.translate(filename);

        let (txn, id) = allocate_new(&self.table, Some(module_name.to_string()), creator)?;

        if self.static_symbols.iter().any(|s| s.module == module_name) {
            txn.finish_with(Some(id), |rec| rec.extra.kind = ModuleKind::Static);
            return Ok(id);
        }

        let native_path = match translated {
            Ok(p) => p,
            Err(e) => {
                // Allocation failed past ConvertToken: finalize the
                // RESERVED slot to UNDEFINED, not the claimed id.
                txn.finish(Some(ObjectId::UNDEFINED));
                return Err(e);
            }
        };
        match hooks.module_load(&native_path) {
            Ok(handle) => {
                txn.finish_with(Some(id), |rec| {
                    rec.extra.kind = ModuleKind::Dynamic;
                    rec.extra.file_name = filename.to_string();
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

    /// Only calls the impl hook for a `Dynamic` module; a `Static` entry
    /// is just a placeholder removed from the table.
    ///
    /// # Errors
    /// Whatever [`ModuleHooks::module_unload`] returns for a `Dynamic`
    /// module.
    pub fn unload(&self, hooks: &dyn ModuleHooks, id: ObjectId) -> Result<(), OsError> {
        let mut txn = Transaction::init_for_id(&self.table, LockMode::Exclusive, ObjectType::Module, id)?;
        let (kind, handle) = {
            let rec = txn.record_mut();
            (rec.extra.kind, rec.extra.handle.take())
        };
        txn.convert()?;
        let result = match (kind, &handle) {
            (ModuleKind::Dynamic, Some(h)) => hooks.module_unload(h),
            _ => Ok(()),
        };
        txn.finish(Some(ObjectId::UNDEFINED));
        result
    }

    /// `SymbolLookup`, global variant: tries the impl's loaded modules
    /// first (scanning every `Dynamic` entry), then falls back to the
    /// static table with no module-name filter.
    ///
    /// # Errors
    /// [`OsError::NameNotFound`] if `symbol_name` resolves nowhere.
    pub fn symbol_lookup(&self, hooks: &dyn ModuleHooks, symbol_name: &str) -> Result<usize, OsError> {
        self.symbol_lookup_impl(hooks, symbol_name, None)
    }

    /// Module-scoped variant: resolves only within `module_id`'s handle
    /// (if dynamic) or the static table filtered to its module name (if
    /// static).
    ///
    /// # Errors
    /// [`OsError::NameNotFound`] if `symbol_name` isn't exported by this
    /// specific module.
    pub fn symbol_lookup_in(
        &self,
        hooks: &dyn ModuleHooks,
        module_id: ObjectId,
        symbol_name: &str,
    ) -> Result<usize, OsError> {
        let idx = module_id.to_array_index(Some(ObjectType::Module), self.table.max())?;
        let guard = self.table.lock();
        let rec = &guard.slots[idx];
        if rec.active_id != module_id {
            drop(guard);
            return Err(OsError::InvalidId);
        }
        let (kind, handle, module_name) = (rec.extra.kind, rec.extra.handle.clone(), rec.name.clone());
        drop(guard);

        if let (ModuleKind::Dynamic, Some(h)) = (kind, &handle) {
            if let Ok(addr) = hooks.module_symbol_lookup(h, symbol_name) {
                return Ok(addr);
            }
        }
        self.static_lookup(symbol_name, module_name.as_deref())
    }

    fn symbol_lookup_impl(
        &self,
        hooks: &dyn ModuleHooks,
        symbol_name: &str,
        module_name_filter: Option<&str>,
    ) -> Result<usize, OsError> {
        let guard = self.table.lock();
        let handles: Vec<HostHandle> = guard
            .slots
            .iter()
            .filter(|rec| rec.active_id.is_defined() && !rec.active_id.is_reserved())
            .filter(|rec| rec.extra.kind == ModuleKind::Dynamic)
            .filter_map(|rec| rec.extra.handle.clone())
            .collect();
        drop(guard);

        for handle in &handles {
            if let Ok(addr) = hooks.module_symbol_lookup(handle, symbol_name) {
                return Ok(addr);
            }
        }
        self.static_lookup(symbol_name, module_name_filter)
    }

    fn static_lookup(&self, symbol_name: &str, module_name_filter: Option<&str>) -> Result<usize, OsError> {
        self.static_symbols
            .iter()
            .find(|s| s.name == symbol_name && module_name_filter.map_or(true, |m| s.module == m))
            .and_then(|s| s.address)
            .ok_or(OsError::NameNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeLoader;
    impl ModuleHooks for FakeLoader {
        fn module_load(&self, _native_path: &str) -> Result<HostHandle, OsError> {
            Ok(std::sync::Arc::new(42usize))
        }
        fn module_unload(&self, _handle: &HostHandle) -> Result<(), OsError> {
            Ok(())
        }
        fn module_symbol_lookup(&self, _handle: &HostHandle, symbol_name: &str) -> Result<usize, OsError> {
            if symbol_name == "dyn_symbol" {
                Ok(0x1000)
            } else {
                Err(OsError::NameNotFound)
            }
        }
    }

    #[test]
    fn static_module_skips_impl_load() {
        let statics = vec![StaticSymbol { name: "foo".into(), module: "builtin".into(), address: Some(0x10) }];
        let table = ModuleTable::new(4, statics);
        let filesys = FilesysTable::new(1);
        let hooks = FakeLoader;
        let id = table.load(&hooks, &filesys, "builtin", "/irrelevant.so", ObjectId::UNDEFINED).unwrap();
        let addr = table.symbol_lookup(&hooks, "foo").unwrap();
        assert_eq!(addr, 0x10);
        // Static unload is a no-op; must not fail even though there's no handle.
        table.unload(&hooks, id).unwrap();
    }

    #[test]
    fn static_placeholder_with_no_address() {
        let statics = vec![StaticSymbol { name: String::new(), module: "placeholder".into(), address: None }];
        let table = ModuleTable::new(4, statics);
        assert_eq!(
            table.static_lookup("anything", Some("placeholder")),
            Err(OsError::NameNotFound)
        );
    }

    #[test]
    fn symbol_lookup_falls_back_to_static_after_impl_miss() {
        let statics = vec![StaticSymbol { name: "static_only".into(), module: "m".into(), address: Some(0x20) }];
        let table = ModuleTable::new(4, statics);
        let hooks = FakeLoader;
        assert_eq!(table.symbol_lookup(&hooks, "static_only").unwrap(), 0x20);
        assert_eq!(table.symbol_lookup(&hooks, "nope"), Err(OsError::NameNotFound));
    }

    struct FailingLoader;
    impl ModuleHooks for FailingLoader {
        fn module_load(&self, _native_path: &str) -> Result<HostHandle, OsError> {
            Err(OsError::NameNotFound)
        }
        fn module_unload(&self, _handle: &HostHandle) -> Result<(), OsError> {
            Ok(())
        }
        fn module_symbol_lookup(&self, _handle: &HostHandle, _symbol_name: &str) -> Result<usize, OsError> {
            Err(OsError::NameNotFound)
        }
    }

    #[test]
    fn failed_load_frees_the_slot_for_retry() {
        let table = ModuleTable::new(4, Vec::new());
        let filesys = FilesysTable::new(1);
        let hooks = FailingLoader;
        assert_eq!(
            table.load(&hooks, &filesys, "m", "/missing.so", ObjectId::UNDEFINED).unwrap_err(),
            OsError::FsPathInvalid
        );
        // If the aborted allocation had left the slot looking live under
        // the name "m", this retry would see NAME_TAKEN instead of
        // reaching (and failing) path translation again.
        assert_eq!(
            table.load(&hooks, &filesys, "m", "/missing.so", ObjectId::UNDEFINED).unwrap_err(),
            OsError::FsPathInvalid
        );
    }
}
