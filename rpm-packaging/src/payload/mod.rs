// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The package payload.

The payload of an RPM is a `newc` cpio archive compressed with one of the
codings in [coding].
*/

pub mod coding;
pub mod processor;
pub mod recorder;

pub use {
    coding::{decompressing_reader, PayloadCoding, PayloadEncoder, PayloadFlags},
    processor::{PayloadDigestProcessor, PayloadProcessor},
    recorder::{normalize_path, FinishedPayload, PayloadEntry, PayloadRecorder},
};
