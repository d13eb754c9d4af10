// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use thiserror::Error;

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum RpmError {
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("I/O error while {stage}: {source:?}")]
    IoContext {
        stage: &'static str,
        source: std::io::Error,
    },

    #[error("cpio error: {0}")]
    Cpio(#[from] cpio_archive::Error),

    #[error("PGP error: {0:?}")]
    Pgp(#[from] pgp::errors::Error),

    #[error("hex parsing error: {0:?}")]
    Hex(#[from] hex::FromHexError),

    #[error("integer parsing error: {0:?}")]
    ParseInt(#[from] std::num::ParseIntError),

    #[error("bad RPM lead magic")]
    BadLeadMagic,

    #[error("unsupported RPM lead format version {0}.{1}")]
    UnsupportedLeadVersion(u8, u8),

    #[error("bad header section magic")]
    BadHeaderMagic,

    #[error("header section is truncated: {0}")]
    HeaderTruncated(&'static str),

    #[error("header section exceeds limits: {0}")]
    HeaderTooLarge(&'static str),

    #[error("header entry for tag {tag} points outside of the data store")]
    HeaderEntryOutOfBounds { tag: u32 },

    #[error("string data for tag {tag} lacks a NUL terminator")]
    HeaderStringMissingNul { tag: u32 },

    #[error("string data for tag {tag} is not valid UTF-8")]
    HeaderInvalidUtf8 { tag: u32 },

    #[error("header value for tag {tag} cannot be rendered: {reason}")]
    HeaderValueInvalid { tag: u32, reason: &'static str },

    #[error("tag {tag} declares type {expected}; got {actual}")]
    TagTypeMismatch {
        tag: u32,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("required tag missing from header: {0}")]
    MissingTag(u32),

    #[error("unknown payload coding: {0}")]
    UnknownPayloadCoding(String),

    #[error("invalid flags for payload coding {coding}: {flags}")]
    InvalidPayloadFlags { coding: &'static str, flags: String },

    #[error("unsupported payload format: {0}")]
    UnsupportedPayloadFormat(String),

    #[error("failed to parse version string: {0}")]
    VersionParse(String),

    #[error("invalid path in package: {0}")]
    InvalidPath(String),

    #[error("payload recorder has already been finished")]
    RecorderFinished,

    #[error("RPM writer has already been finished")]
    WriterFinished,

    #[error("no payload set on RPM writer")]
    PayloadNotSet,

    #[error("processor protocol violation: {0}")]
    ProcessorState(&'static str),

    #[error("payload copy stopped after {copied} of {expected} bytes")]
    PayloadCopyTruncated { copied: u64, expected: u64 },

    #[error("digest mismatch for signature tag {tag}")]
    DigestMismatch { tag: u32 },

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl RpmError {
    /// Wrap an I/O error with the stage of the operation that produced it.
    pub fn io_context(stage: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::IoContext { stage, source }
    }
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, RpmError>;
