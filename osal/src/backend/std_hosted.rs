// Copyright (c) 2026 the osal authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A reference [`ImplHooks`] backend for hosted desktop/server OSes,
//! built directly on `std::fs`, `std::net`, and `libloading` — the same
//! role the original's POSIX impl files play, ported to safe standard
//! APIs wherever one exists (`os-impl-posix-*.c`, `os-impl-posix-dl-loader.c`).
//! This is the only backend this crate carries; a flight target would
//! supply its own.

use crate::hooks::{
    AccessMode, ClockHooks, CondVarHooks, FileStat, FilesysHooks, HostHandle, ImplHooks,
    ModuleHooks, NetworkHooks, OpenFlags, SeekWhence, SocketDomain, SocketType, StreamHooks,
};
use crate::error::OsError;
use crate::id::ObjectId;
use crate::time::TimeValue;
use crate::timebase::TimeBaseTable;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

fn io_err(e: std::io::Error) -> OsError {
    log::debug!(target: "osal::backend", "host I/O error: {e}");
    match e.kind() {
        std::io::ErrorKind::NotFound => OsError::NameNotFound,
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => OsError::Timeout,
        std::io::ErrorKind::AlreadyExists => OsError::NameTaken,
        _ => OsError::Error,
    }
}

/// A loaded module's host resource.
struct LoadedModule {
    #[allow(dead_code, reason = "kept alive for as long as the handle exists; never read back")]
    library: libloading::Library,
}

enum SocketInner {
    TcpListener(TcpListener),
    TcpStream(TcpStream),
    Udp(UdpSocket),
}

/// Everything the reference backend needs per host resource, downcast out
/// of the opaque [`HostHandle`] by the one method that created it.
enum Resource {
    File(Mutex<File>),
    Socket(Mutex<SocketInner>),
}

impl Resource {
    fn as_file(handle: &HostHandle) -> Result<&Mutex<File>, OsError> {
        match handle.downcast_ref::<Resource>() {
            Some(Resource::File(f)) => Ok(f),
            _ => Err(OsError::InvalidId),
        }
    }

    fn as_socket(handle: &HostHandle) -> Result<&Mutex<SocketInner>, OsError> {
        match handle.downcast_ref::<Resource>() {
            Some(Resource::Socket(s)) => Ok(s),
            _ => Err(OsError::InvalidId),
        }
    }
}

/// The reference hosted backend. Zero-sized: every hook is a pure
/// function of its arguments, no shared state beyond the host OS itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdHostedBackend;

struct ModuleImpl;
struct FilesysImpl;
struct StreamImpl;
struct CondVarImpl;
struct ClockImpl;
struct NetworkImpl;

/// A condition variable's host resource: a "locked" flag plus the condvar
/// that waiters block on, the same pairing `std::sync::Condvar` itself
/// requires. `Lock`/`Unlock` just flip the flag rather than holding a
/// `MutexGuard` across hook calls, since a guard can't be stored in a
/// type-erased [`HostHandle`] without unsafe lifetime erasure.
struct HostedCondVar {
    locked: Mutex<bool>,
    cv: Condvar,
}

impl HostedCondVar {
    fn downcast(handle: &HostHandle) -> Result<&HostedCondVar, OsError> {
        handle.downcast_ref::<HostedCondVar>().ok_or(OsError::InvalidId)
    }
}

impl CondVarHooks for CondVarImpl {
    fn create(&self) -> Result<HostHandle, OsError> {
        Ok(Arc::new(HostedCondVar { locked: Mutex::new(false), cv: Condvar::new() }))
    }

    fn delete(&self, _handle: &HostHandle) -> Result<(), OsError> {
        Ok(())
    }

    fn lock(&self, handle: &HostHandle) -> Result<(), OsError> {
        let cv = HostedCondVar::downcast(handle)?;
        let mut locked = cv.locked.lock().expect("condvar mutex poisoned");
        while *locked {
            locked = cv.cv.wait(locked).expect("condvar mutex poisoned");
        }
        *locked = true;
        Ok(())
    }

    fn unlock(&self, handle: &HostHandle) -> Result<(), OsError> {
        let cv = HostedCondVar::downcast(handle)?;
        let mut locked = cv.locked.lock().expect("condvar mutex poisoned");
        *locked = false;
        cv.cv.notify_one();
        Ok(())
    }

    fn signal(&self, handle: &HostHandle) -> Result<(), OsError> {
        let cv = HostedCondVar::downcast(handle)?;
        cv.cv.notify_one();
        Ok(())
    }

    fn broadcast(&self, handle: &HostHandle) -> Result<(), OsError> {
        let cv = HostedCondVar::downcast(handle)?;
        cv.cv.notify_all();
        Ok(())
    }

    fn wait(&self, handle: &HostHandle) -> Result<(), OsError> {
        let cv = HostedCondVar::downcast(handle)?;
        let mut locked = cv.locked.lock().expect("condvar mutex poisoned");
        *locked = false;
        cv.cv.notify_one();
        locked = cv.cv.wait(locked).expect("condvar mutex poisoned");
        while *locked {
            locked = cv.cv.wait(locked).expect("condvar mutex poisoned");
        }
        *locked = true;
        Ok(())
    }

    fn timed_wait(&self, handle: &HostHandle, timeout: Duration) -> Result<bool, OsError> {
        let cv = HostedCondVar::downcast(handle)?;
        let mut locked = cv.locked.lock().expect("condvar mutex poisoned");
        *locked = false;
        cv.cv.notify_one();
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                *locked = true;
                return Ok(false);
            }
            let (next, result) = cv.cv.wait_timeout(locked, remaining).expect("condvar mutex poisoned");
            locked = next;
            if !*locked {
                *locked = true;
                return Ok(true);
            }
            if result.timed_out() {
                *locked = true;
                return Ok(false);
            }
        }
    }
}

impl ModuleHooks for ModuleImpl {
    fn module_load(&self, native_path: &str) -> Result<HostHandle, OsError> {
        // Safety: dlopen/LoadLibrary semantics — the loaded code runs with
        // the host process's full privileges and may register atexit
        // handlers, spawn threads, etc. Mirrors the original's direct,
        // unchecked dlopen() call (os-impl-posix-dl-loader.c).
        let library = unsafe { libloading::Library::new(native_path) }.map_err(|e| {
            log::debug!(target: "osal::backend", "module load failed for {native_path}: {e}");
            OsError::Error
        })?;
        Ok(Arc::new(LoadedModule { library }))
    }

    fn module_unload(&self, _handle: &HostHandle) -> Result<(), OsError> {
        // Dropping the last Arc reference runs libloading::Library's Drop,
        // which calls dlclose(); nothing else to do here.
        Ok(())
    }

    fn module_symbol_lookup(&self, handle: &HostHandle, symbol_name: &str) -> Result<usize, OsError> {
        let module = handle.downcast_ref::<LoadedModule>().ok_or(OsError::InvalidId)?;
        // Safety: the symbol name is looked up by name only, and the
        // returned address is never called through — only its numeric
        // value is observed, so there is no type-mismatch hazard here.
        unsafe {
            let sym: libloading::Symbol<'_, *const std::ffi::c_void> =
                module.library.get(symbol_name.as_bytes()).map_err(|_| OsError::NameNotFound)?;
            Ok(*sym as usize)
        }
    }
}

impl FilesysHooks for FilesysImpl {
    fn start_volume(
        &self,
        device_name: &str,
        _is_ram: bool,
        _blocksize: u32,
        _numblocks: u32,
        fixed_mountpt: Option<&str>,
    ) -> Result<String, OsError> {
        if let Some(path) = fixed_mountpt {
            return Ok(path.to_string());
        }
        // Mirrors os-impl-filesys.c's StartVolume_Impl: the system mount
        // point for a fresh volume is a temp-directory path keyed by the
        // device name, created here so mount_volume has somewhere real to
        // point at.
        let root = std::env::temp_dir().join("osal").join(device_name);
        std::fs::create_dir_all(&root).map_err(io_err)?;
        Ok(root.to_string_lossy().into_owned())
    }

    fn stop_volume(&self, _device_name: &str) -> Result<(), OsError> {
        Ok(())
    }

    fn format_volume(&self, _device_name: &str) -> Result<(), OsError> {
        Ok(())
    }

    fn mount_volume(&self, system_mountpt: &str) -> Result<(), OsError> {
        std::fs::create_dir_all(system_mountpt).map_err(io_err)
    }

    fn unmount_volume(&self, _system_mountpt: &str) -> Result<(), OsError> {
        Ok(())
    }
}

impl StreamHooks for StreamImpl {
    fn file_open(&self, native_path: &str, flags: OpenFlags, access: AccessMode) -> Result<HostHandle, OsError> {
        let mut opts = OpenOptions::new();
        match access {
            AccessMode::ReadOnly => {
                opts.read(true);
            }
            AccessMode::WriteOnly => {
                opts.write(true);
            }
            AccessMode::ReadWrite => {
                opts.read(true).write(true);
            }
        }
        opts.create(flags.create).truncate(flags.truncate);
        let file = opts.open(native_path).map_err(io_err)?;
        Ok(Arc::new(Resource::File(Mutex::new(file))))
    }

    fn generic_close(&self, _handle: &HostHandle) -> Result<(), OsError> {
        Ok(())
    }

    fn generic_read(&self, handle: &HostHandle, buf: &mut [u8], timeout: Option<Duration>) -> Result<usize, OsError> {
        if let Ok(file) = Resource::as_file(handle) {
            let mut file = file.lock().expect("file mutex poisoned");
            return file.read(buf).map_err(io_err);
        }
        let sock = Resource::as_socket(handle)?;
        let mut sock = sock.lock().expect("socket mutex poisoned");
        match &mut *sock {
            SocketInner::TcpStream(s) => {
                s.set_read_timeout(timeout).map_err(io_err)?;
                s.read(buf).map_err(io_err)
            }
            _ => Err(OsError::OperationNotSupported),
        }
    }

    fn generic_write(&self, handle: &HostHandle, buf: &[u8], timeout: Option<Duration>) -> Result<usize, OsError> {
        if let Ok(file) = Resource::as_file(handle) {
            let mut file = file.lock().expect("file mutex poisoned");
            return file.write(buf).map_err(io_err);
        }
        let sock = Resource::as_socket(handle)?;
        let mut sock = sock.lock().expect("socket mutex poisoned");
        match &mut *sock {
            SocketInner::TcpStream(s) => {
                s.set_write_timeout(timeout).map_err(io_err)?;
                s.write(buf).map_err(io_err)
            }
            _ => Err(OsError::OperationNotSupported),
        }
    }

    fn generic_seek(&self, handle: &HostHandle, offset: i64, whence: SeekWhence) -> Result<u64, OsError> {
        let file = Resource::as_file(handle)?;
        let mut file = file.lock().expect("file mutex poisoned");
        let pos = match whence {
            SeekWhence::Set => SeekFrom::Start(u64::try_from(offset).map_err(|_| OsError::InvalidSize)?),
            SeekWhence::Current => SeekFrom::Current(offset),
            SeekWhence::End => SeekFrom::End(offset),
        };
        file.seek(pos).map_err(io_err)
    }

    fn file_chmod(&self, native_path: &str, mode_write: bool, mode_read: bool) -> Result<(), OsError> {
        cfg_if::cfg_if! {
            if #[cfg(unix)] {
                use std::os::unix::fs::PermissionsExt;
                let mut mode = 0o000;
                if mode_read { mode |= 0o444; }
                if mode_write { mode |= 0o222; }
                std::fs::set_permissions(native_path, std::fs::Permissions::from_mode(mode)).map_err(io_err)
            } else {
                let mut perms = std::fs::metadata(native_path).map_err(io_err)?.permissions();
                perms.set_readonly(!mode_write);
                let _ = mode_read;
                std::fs::set_permissions(native_path, perms).map_err(io_err)
            }
        }
    }

    fn file_stat(&self, native_path: &str) -> Result<FileStat, OsError> {
        let meta = std::fs::metadata(native_path).map_err(io_err)?;
        cfg_if::cfg_if! {
            if #[cfg(unix)] {
                use std::os::unix::fs::PermissionsExt;
                let mode = meta.permissions().mode();
                Ok(FileStat {
                    size: meta.len(),
                    is_directory: meta.is_dir(),
                    mode_exec: mode & 0o111 != 0,
                    mode_write: mode & 0o222 != 0,
                    mode_read: mode & 0o444 != 0,
                })
            } else {
                Ok(FileStat {
                    size: meta.len(),
                    is_directory: meta.is_dir(),
                    mode_exec: false,
                    mode_write: !meta.permissions().readonly(),
                    mode_read: true,
                })
            }
        }
    }

    fn file_rename(&self, old_native_path: &str, new_native_path: &str) -> Result<(), OsError> {
        std::fs::rename(old_native_path, new_native_path).map_err(io_err)
    }

    fn file_remove(&self, native_path: &str) -> Result<(), OsError> {
        std::fs::remove_file(native_path).map_err(io_err)
    }

    fn socket_open(&self, domain: SocketDomain, ty: SocketType) -> Result<HostHandle, OsError> {
        let unspecified = match domain {
            SocketDomain::Inet4 => SocketAddr::from(([0, 0, 0, 0], 0)),
            SocketDomain::Inet6 => SocketAddr::from(([0; 16], 0)),
        };
        let inner = match ty {
            SocketType::Datagram => SocketInner::Udp(UdpSocket::bind(unspecified).map_err(io_err)?),
            // A stream socket starts life as a listener; connect() for a
            // client replaces this with a freshly connected TcpStream.
            SocketType::Stream => SocketInner::TcpListener(TcpListener::bind(unspecified).map_err(io_err)?),
        };
        Ok(Arc::new(Resource::Socket(Mutex::new(inner))))
    }

    fn bind(&self, handle: &HostHandle, addr: SocketAddr) -> Result<SocketAddr, OsError> {
        let sock = Resource::as_socket(handle)?;
        let mut sock = sock.lock().expect("socket mutex poisoned");
        match &*sock {
            SocketInner::Udp(_) => {
                *sock = SocketInner::Udp(UdpSocket::bind(addr).map_err(io_err)?);
            }
            SocketInner::TcpListener(_) => {
                *sock = SocketInner::TcpListener(TcpListener::bind(addr).map_err(io_err)?);
            }
            SocketInner::TcpStream(_) => return Err(OsError::IncorrectObjState),
        }
        match &*sock {
            SocketInner::Udp(s) => s.local_addr().map_err(io_err),
            SocketInner::TcpListener(s) => s.local_addr().map_err(io_err),
            SocketInner::TcpStream(_) => unreachable!(),
        }
    }

    fn connect(&self, handle: &HostHandle, addr: SocketAddr, timeout: Option<Duration>) -> Result<(), OsError> {
        let sock = Resource::as_socket(handle)?;
        let stream = match timeout {
            Some(t) => TcpStream::connect_timeout(&addr, t).map_err(io_err)?,
            None => TcpStream::connect(addr).map_err(io_err)?,
        };
        let mut sock = sock.lock().expect("socket mutex poisoned");
        *sock = SocketInner::TcpStream(stream);
        Ok(())
    }

    fn accept(&self, handle: &HostHandle, timeout: Option<Duration>) -> Result<(HostHandle, SocketAddr), OsError> {
        let sock = Resource::as_socket(handle)?;
        let sock = sock.lock().expect("socket mutex poisoned");
        let SocketInner::TcpListener(listener) = &*sock else {
            return Err(OsError::IncorrectObjState);
        };
        // std::net::TcpListener::accept has no timeout parameter; poll via
        // nonblocking mode, matching how a reference/test backend (not a
        // production one) can honor the timeout contract without a
        // platform-specific poll(2)/kqueue binding.
        listener.set_nonblocking(true).map_err(io_err)?;
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            match listener.accept() {
                Ok((stream, remote)) => {
                    let _ = listener.set_nonblocking(false);
                    let _ = stream.set_nonblocking(false);
                    return Ok((Arc::new(Resource::Socket(Mutex::new(SocketInner::TcpStream(stream)))), remote));
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if let Some(deadline) = deadline {
                        if Instant::now() >= deadline {
                            let _ = listener.set_nonblocking(false);
                            return Err(OsError::Timeout);
                        }
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(e) => {
                    let _ = listener.set_nonblocking(false);
                    return Err(io_err(e));
                }
            }
        }
    }

    fn shutdown(&self, handle: &HostHandle) -> Result<(), OsError> {
        let sock = Resource::as_socket(handle)?;
        let sock = sock.lock().expect("socket mutex poisoned");
        match &*sock {
            SocketInner::TcpStream(s) => s.shutdown(Shutdown::Both).or(Ok(())),
            _ => Ok(()),
        }
    }

    fn recv_from(&self, handle: &HostHandle, buf: &mut [u8], timeout: Option<Duration>) -> Result<(usize, SocketAddr), OsError> {
        let sock = Resource::as_socket(handle)?;
        let sock = sock.lock().expect("socket mutex poisoned");
        let SocketInner::Udp(s) = &*sock else {
            return Err(OsError::IncorrectObjState);
        };
        s.set_read_timeout(timeout).map_err(io_err)?;
        s.recv_from(buf).map_err(io_err)
    }

    fn send_to(&self, handle: &HostHandle, buf: &[u8], addr: SocketAddr) -> Result<usize, OsError> {
        let sock = Resource::as_socket(handle)?;
        let sock = sock.lock().expect("socket mutex poisoned");
        let SocketInner::Udp(s) = &*sock else {
            return Err(OsError::IncorrectObjState);
        };
        s.send_to(buf, addr).map_err(io_err)
    }
}

impl ClockHooks for ClockImpl {
    fn get_local_time(&self) -> TimeValue {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => TimeValue::assemble_from_nanoseconds(
                i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
                i64::from(d.subsec_nanos()),
            ),
            Err(_) => TimeValue::ZERO,
        }
    }

    fn set_local_time(&self, _time: TimeValue) -> Result<(), OsError> {
        // No portable std API lets user space set the wall clock; the
        // original's POSIX impl needs clock_settime() + CAP_SYS_TIME.
        Err(OsError::NotImplemented)
    }
}

impl NetworkHooks for NetworkImpl {
    fn network_get_host_name(&self) -> Result<String, OsError> {
        std::env::var("HOSTNAME").or_else(|_| std::env::var("COMPUTERNAME")).or(Ok("localhost".to_string()))
    }

    fn network_get_id(&self) -> Result<i32, OsError> {
        Ok(i32::try_from(std::process::id() % 0x7FFF_FFFF).unwrap_or(0))
    }
}

impl ImplHooks for StdHostedBackend {
    fn module(&self) -> &dyn ModuleHooks {
        &ModuleImpl
    }

    fn filesys(&self) -> &dyn FilesysHooks {
        &FilesysImpl
    }

    fn stream(&self) -> &dyn StreamHooks {
        &StreamImpl
    }

    fn condvar(&self) -> &dyn CondVarHooks {
        &CondVarImpl
    }

    fn clock(&self) -> &dyn ClockHooks {
        &ClockImpl
    }

    fn network(&self) -> &dyn NetworkHooks {
        &NetworkImpl
    }
}

/// A background thread driving one time base forward, the hosted
/// stand-in for the original's hardware tick interrupt calling
/// `BSP_TimerCallback`. Dropping or [`TickerHandle::stop`]ping joins the
/// thread before returning.
pub struct TickerHandle {
    stop: Arc<std::sync::atomic::AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl TickerHandle {
    /// Signal the thread to stop and wait for it to exit.
    pub fn stop(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.store(true, std::sync::atomic::Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// Spawn a thread that calls [`TimeBaseTable::tick`] on `timebase_id`
/// once every `period`, advancing by `period` each time. The caller is
/// responsible for creating `timebase_id` first.
#[must_use]
pub fn spawn_ticker(table: Arc<TimeBaseTable>, timebase_id: ObjectId, period: Duration) -> TickerHandle {
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let stop_flag = stop.clone();
    let elapsed = TimeValue::from_microseconds(i64::try_from(period.as_micros()).unwrap_or(i64::MAX));
    let join = std::thread::spawn(move || {
        while !stop_flag.load(std::sync::atomic::Ordering::Relaxed) {
            std::thread::sleep(period);
            if stop_flag.load(std::sync::atomic::Ordering::Relaxed) {
                break;
            }
            table.tick(timebase_id, elapsed);
        }
    });
    TickerHandle { stop, join: Some(join) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timebase::TimerCallback;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn ticker_drives_a_real_timer() {
        struct Counter(Arc<AtomicU32>);
        impl TimerCallback for Counter {
            fn on_tick(&self, _timer_id: ObjectId) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let table = Arc::new(TimeBaseTable::new(1, 1));
        let base = table.create("tb0", ObjectId::UNDEFINED).unwrap();
        let count = Arc::new(AtomicU32::new(0));
        table
            .attach(base, "t0", TimeValue::ZERO, TimeValue::from_milliseconds(5), Arc::new(Counter(count.clone())), ObjectId::UNDEFINED)
            .unwrap();

        let ticker = spawn_ticker(table, base, Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(60));
        ticker.stop();
        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn file_roundtrip() {
        let backend = StdHostedBackend;
        let dir = std::env::temp_dir().join(format!("osal-backend-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("f.txt");
        let handle = backend
            .stream()
            .file_open(path.to_str().unwrap(), OpenFlags { create: true, truncate: true }, AccessMode::ReadWrite)
            .unwrap();
        backend.stream().generic_write(&handle, b"hello", None).unwrap();
        backend.stream().generic_seek(&handle, 0, SeekWhence::Set).unwrap();
        let mut buf = [0u8; 5];
        let n = backend.stream().generic_read(&handle, &mut buf, None).unwrap();
        assert_eq!(&buf[..n], b"hello");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn clock_reads_nonzero_time() {
        let backend = StdHostedBackend;
        assert!(backend.clock().get_local_time().total_seconds() > 0);
    }

    #[test]
    fn tcp_roundtrip() {
        let backend = StdHostedBackend;
        let server = backend.stream().socket_open(SocketDomain::Inet4, SocketType::Stream).unwrap();
        let addr = backend.stream().bind(&server, SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();

        let client = backend.stream().socket_open(SocketDomain::Inet4, SocketType::Stream).unwrap();
        let connect_thread = std::thread::spawn({
            let backend = backend;
            move || backend.stream().connect(&client, addr, Some(Duration::from_secs(2)))
        });

        let (accepted, _remote) = backend.stream().accept(&server, Some(Duration::from_secs(2))).unwrap();
        connect_thread.join().unwrap().unwrap();

        backend.stream().generic_write(&accepted, b"ping", None).unwrap();
        let mut buf = [0u8; 4];
        // give the loopback write time to land
        std::thread::sleep(Duration::from_millis(20));
        let n = backend
            .stream()
            .generic_read(&client, &mut buf, Some(Duration::from_secs(1)))
            .unwrap();
        assert_eq!(&buf[..n], b"ping");
    }
}
