// Copyright (c) 2026 the osal authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Per-instance table sizing and feature toggles.
//!
//! The original is a compile-time configuration header; this port makes the
//! same knobs a runtime value handed to [`crate::Osal::new`] so a single
//! process can host more than one differently-sized instance (handy in
//! tests). A future const-generic variant could recover true compile-time
//! sizing — see `DESIGN.md`.

/// Name and path length limits, matching `spec.md` §6.
pub const MAX_API_NAME: usize = 20;
pub const MAX_PATH_LEN: usize = 64;
pub const MAX_LOCAL_PATH_LEN: usize = 256;
pub const MAX_FILE_NAME: usize = 20;

/// Per-class table capacities plus the handful of global feature toggles
/// from `spec.md` §6. Every field is a capped positive integer or bool.
#[derive(Debug, Clone)]
pub struct OsConfig {
    pub max_tasks: u32,
    pub max_queues: u32,
    pub max_bin_semaphores: u32,
    pub max_count_semaphores: u32,
    pub max_mutexes: u32,
    pub max_open_files: u32,
    pub max_open_dirs: u32,
    pub max_timebases: u32,
    pub max_timers: u32,
    pub max_modules: u32,
    pub max_file_systems: u32,
    pub max_consoles: u32,
    pub max_condvars: u32,
    pub sockaddr_max_len: u32,
    pub include_static_loader: bool,
    pub debug_printf: bool,
}

impl Default for OsConfig {
    fn default() -> Self {
        OsConfig {
            max_tasks: 64,
            max_queues: 64,
            max_bin_semaphores: 64,
            max_count_semaphores: 64,
            max_mutexes: 64,
            max_open_files: 64,
            max_open_dirs: 8,
            max_timebases: 8,
            max_timers: 32,
            max_modules: 16,
            max_file_systems: 16,
            max_consoles: 2,
            max_condvars: 32,
            sockaddr_max_len: 28,
            include_static_loader: true,
            debug_printf: true,
        }
    }
}

impl OsConfig {
    /// The configured table capacity for one object class.
    #[must_use]
    pub fn max_for(&self, ty: crate::id::ObjectType) -> u32 {
        use crate::id::ObjectType as T;
        match ty {
            T::Task => self.max_tasks,
            T::Queue => self.max_queues,
            T::BinSem => self.max_bin_semaphores,
            T::CountSem => self.max_count_semaphores,
            T::Mutex => self.max_mutexes,
            T::Stream => self.max_open_files,
            T::Dir => self.max_open_dirs,
            T::TimeBase => self.max_timebases,
            T::TimerCb => self.max_timers,
            T::Module => self.max_modules,
            T::FileSys => self.max_file_systems,
            T::Console => self.max_consoles,
            T::CondVar => self.max_condvars,
        }
    }
}
