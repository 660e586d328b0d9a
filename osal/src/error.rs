// Copyright (c) 2026 the osal authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The closed return-code taxonomy. This enum *is* the ABI: every public
//! operation returns `Result<T, OsError>` and no code silently swallows an
//! impl-layer failure (it either propagates unchanged or is explicitly
//! mapped, never both).

/// Closed set of error codes surfaced by the core. Mirrors the negative
/// `int32` return-code table one-for-one so a host binding can re-export
/// these as the stable wire values if needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, onlyerror::Error)]
pub enum OsError {
    /// Generic failure with no more specific code available.
    #[error("generic OSAL error")]
    Error,
    #[error("invalid pointer argument")]
    InvalidPointer,
    #[error("name exceeds the configured name length limit")]
    NameTooLong,
    #[error("no object with that name exists")]
    NameNotFound,
    #[error("an object with that name already exists")]
    NameTaken,
    #[error("the object table for this type is full")]
    NoFreeIds,
    #[error("the handle does not name a live object of the expected type")]
    InvalidId,
    #[error("invalid size argument")]
    InvalidSize,
    #[error("the object is not in a state that permits this operation")]
    IncorrectObjState,
    #[error("the object is not of the expected type")]
    IncorrectObjType,
    #[error("invalid memory address")]
    BadAddress,
    #[error("the object has outstanding references and cannot be deleted yet")]
    ObjectInUse,
    #[error("this host backend does not implement the requested operation")]
    NotImplemented,
    #[error("this operation is not supported for this kind of object")]
    OperationNotSupported,
    #[error("operation timed out")]
    Timeout,
    #[error("resource temporarily unavailable, retry")]
    TryAgain,
    #[error("output buffer too small for the result")]
    OutputTooLarge,
    #[error("no entries matched")]
    EmptySet,
    #[error("translated filesystem path exceeds the local path length limit")]
    FsPathTooLong,
    #[error("filesystem path is malformed")]
    FsPathInvalid,
    #[error("filesystem basename exceeds the name length limit")]
    FsNameTooLong,
    #[error("the backing device/volume has not been created")]
    FsDriveNotCreated,
    #[error("the backing device is still in use")]
    FsDeviceNotFree,
    #[error("internal timer subsystem error")]
    TimerInternal,
    #[error("timer subsystem unavailable on this host")]
    TimerUnavailable,
    #[error("semaphore operation failed")]
    SemFailure,
}
