// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! RPM packaging primitives.

This crate defines pure Rust implementations of the RPM package file format, as
used by Fedora, RHEL, openSUSE and other RPM based Linux distributions.

The canonical home of this crate is <https://github.com/indygreg/PyOxidizer>. Please file issues
and pull requests there.

# Goals

## Compatibility

Files produced by this crate should be readable and verifiable by the official `rpm` tooling.
This means byte-level compatibility of header sections, including the region entries and data
alignment rules `rpm` enforces when reading.

## Determinism and Reproducibility

Given the same inputs and a fixed build time, building a package produces byte-for-byte
identical output. Signature headers are always rendered with sorted tags.

# A Tour of Functionality

An RPM file consists of a *lead*, a *signature header*, a *metadata header* and a compressed
*payload*.

The [lead] module handles the fixed size legacy lead, [lead::RpmLead].

Both header sections share a binary encoding of tagged, typed values. The [header] module
implements this encoding: [header::Header] is a tag to value mapping, typed by a tag namespace.
Tag namespaces are defined in [tag]: [tag::SignatureTag] for the signature header and
[tag::RpmTag] for the metadata header.

The payload is a `newc` cpio archive (see the `cpio-archive` crate) compressed by one of the
codings in [payload::coding]. [payload::PayloadRecorder] assembles a payload from files,
directories and symlinks while digesting content and feeding [payload::PayloadProcessor]s.

Entries of the signature header are derived from the rendered metadata header and the
compressed payload by [signature::SignatureProcessor]s. Built-in processors compute sizes and
digests. [signature::pgp::PgpSignatureProcessor] produces OpenPGP signatures.

[writer::RpmWriter] writes a complete file from a metadata header and a finished payload.
[reader::RpmReader] reads files back and can verify their digests.

[builder::PackageBuilder] is a higher-level interface for creating binary packages. It derives
the file metadata, dependency and payload entries of the metadata header.

The [version] module implements RPM version comparison ([version::rpmvercmp]) and
`epoch:version-release` strings ([version::RpmVersion]). The [dependency] module defines
package relationships and their header encoding. [digest] defines the digest algorithms used
for file content and payload digests.
*/

pub mod builder;
pub mod dependency;
pub mod digest;
pub mod error;
pub mod header;
pub mod lead;
pub mod payload;
pub mod reader;
pub mod signature;
pub mod tag;
pub mod version;
pub mod writer;
