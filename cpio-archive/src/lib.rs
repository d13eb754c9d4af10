// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! cpio archive reading and writing.

This crate implements the *New ASCII* (`newc`, magic `070701`) flavor of cpio
archives. This is the flavor used for the payload of RPM packages.

[NewcReader] reads archives as a cursor over members: it implements [Iterator]
over member headers and [std::io::Read] for the content of the current member.
[NewcBuilder] writes archives member by member and emits the `TRAILER!!!`
end-of-archive marker on [NewcBuilder::finish].
*/

pub mod newc;
pub use newc::{NewcBuilder, NewcHeader, NewcReader};

/// File type bits of `mode`.
pub const MODE_TYPE_MASK: u32 = 0o170000;
/// Regular file type bits.
pub const MODE_REGULAR_FILE: u32 = 0o100000;
/// Directory type bits.
pub const MODE_DIRECTORY: u32 = 0o040000;
/// Symbolic link type bits.
pub const MODE_SYMLINK: u32 = 0o120000;

/// Name of the special member marking the end of an archive.
pub const TRAILER_NAME: &str = "TRAILER!!!";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad magic value encountered")]
    BadMagic,

    #[error("value in header is not an ASCII string")]
    BadHeaderString,

    #[error("string value in header is not in hex: {0}")]
    BadHeaderHex(String),

    #[error("filename could not be decoded")]
    FilenameDecode,

    #[error("filename contains a NUL byte: {0}")]
    FilenameNul(String),

    #[error("member data size mismatch for {name}: header declares {expected} bytes; got {actual}")]
    DataSizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("member {0} is too large for the newc format")]
    MemberTooLarge(String),

    #[error("archive has already been finished")]
    Finished,
}

/// Result type for this crate.
pub type CpioResult<T> = Result<T, Error>;

/// Compute the number of padding bytes needed to align `offset` to 4 bytes.
pub(crate) fn pad4(offset: u64) -> usize {
    ((4 - (offset % 4)) % 4) as usize
}
