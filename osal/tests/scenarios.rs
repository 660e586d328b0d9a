// Copyright (c) 2026 the osal authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Cross-module scenarios, against the real `std_hosted` backend rather
//! than per-module fakes.

use osal::backend::StdHostedBackend;
use osal::{ImplHooks, ObjectId, ObjectType, OpenFlags, OsConfig, SocketDomain, SocketType, StreamTable};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Scenario 2: accepting a connection produces a new, distinct id that
/// identifies as the same object type as the server.
#[test]
fn socket_accept_creates_distinct_id() {
    let backend = StdHostedBackend;
    let streams = Arc::new(StreamTable::new(8));
    let hooks = backend.stream();

    let server = streams.socket_open(hooks, SocketDomain::Inet4, SocketType::Stream, ObjectId::UNDEFINED).unwrap();
    streams.bind(hooks, server, SocketAddr::from(([127, 0, 0, 1], 0))).unwrap();

    let addr = {
        let guard = streams.inner().lock();
        let idx = server.to_array_index(Some(ObjectType::Stream), streams.inner().max()).unwrap();
        guard.slots[idx].name.clone().unwrap().parse::<SocketAddr>().unwrap()
    };

    let client = streams.socket_open(hooks, SocketDomain::Inet4, SocketType::Stream, ObjectId::UNDEFINED).unwrap();
    let connect_thread = std::thread::spawn({
        let streams = streams.clone();
        move || {
            let backend = StdHostedBackend;
            streams.connect(backend.stream(), client, addr, Some(Duration::from_secs(2)))
        }
    });

    let accepted = streams.accept(hooks, server, Some(Duration::from_secs(2)), ObjectId::UNDEFINED).unwrap();
    connect_thread.join().unwrap().unwrap();

    assert_ne!(accepted, server);
    assert_eq!(accepted.ty(), Some(ObjectType::Stream));
    assert_eq!(server.ty(), Some(ObjectType::Stream));

    streams.close(hooks, accepted).unwrap();
    // server stays usable for another accept: a second bind attempt
    // correctly reports it's already bound rather than InvalidId.
    assert_eq!(
        streams.bind(hooks, server, SocketAddr::from(([127, 0, 0, 1], 0))).unwrap_err(),
        osal::OsError::IncorrectObjState
    );
}

/// Scenario 3: opening the same virtual path twice, then closing by
/// name, invalidates both ids; a second close-by-name finds nothing.
#[test]
fn close_file_by_name_with_duplicates() {
    use osal::{AccessMode, FilesysTable};

    let backend = StdHostedBackend;
    let filesys = FilesysTable::new(4);
    let dir = std::env::temp_dir().join(format!("osal-scenario-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    filesys.add_fixed_map(backend.filesys(), dir.to_str().unwrap(), "/scenario").unwrap();

    let streams = StreamTable::new(4);
    let flags = OpenFlags { create: true, truncate: true };
    let a = streams.open_file(backend.stream(), &filesys, "/scenario/dup.txt", flags, AccessMode::ReadWrite, ObjectId::UNDEFINED).unwrap();
    let b = streams.open_file(backend.stream(), &filesys, "/scenario/dup.txt", flags, AccessMode::ReadWrite, ObjectId::UNDEFINED).unwrap();
    assert_ne!(a, b);

    streams.close_file_by_name(backend.stream(), "/scenario/dup.txt").unwrap();
    assert_eq!(streams.write(backend.stream(), a, b"x", None).unwrap_err(), osal::OsError::InvalidId);
    assert_eq!(streams.write(backend.stream(), b, b"x", None).unwrap_err(), osal::OsError::InvalidId);
    assert_eq!(
        streams.close_file_by_name(backend.stream(), "/scenario/dup.txt").unwrap_err(),
        osal::OsError::FsPathInvalid
    );

    std::fs::remove_dir_all(&dir).ok();
}

/// Scenario 6: deleting and recreating an object of the same type never
/// reuses a live id's raw value for the next live object.
#[test]
fn id_recycling_does_not_alias() {
    use osal::ConsoleTable;

    let table = ConsoleTable::new(4);
    let id1 = table.create("c0", ObjectId::UNDEFINED).unwrap();
    table.delete(id1).unwrap();
    let id2 = table.create("c0", ObjectId::UNDEFINED).unwrap();
    assert_ne!(id1, id2);
}

/// Scenario 5: time conversion idempotence and addition across units.
#[test]
fn time_conversion_idempotence() {
    use osal::TimeValue;

    let t = TimeValue::assemble_from_milliseconds(1, 901);
    assert_eq!(t.total_milliseconds(), 1901);

    let a = TimeValue::assemble_from_nanoseconds(3, 777_777_777);
    let b = TimeValue::assemble_from_nanoseconds(4, 888_888_888);
    assert_eq!(a.add(b).total_milliseconds(), 8666);
}

/// A complete instance wires every table to one backend and keeps each
/// class's id space independently well-formed.
#[test]
fn osal_instance_identifies_objects_across_classes() {
    let osal = osal::Osal::new(&OsConfig::default(), Box::new(StdHostedBackend), Vec::new());
    let console = osal.consoles().create("main", ObjectId::UNDEFINED).unwrap();
    let condvar = osal.condvars().create(osal.hooks().condvar(), "cv0", ObjectId::UNDEFINED).unwrap();
    assert_eq!(osal.identify_object(console), Ok(ObjectType::Console));
    assert_eq!(osal.identify_object(condvar), Ok(ObjectType::CondVar));
    assert_ne!(console.raw(), condvar.raw());
}
