// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Observers of payload bytes. */

use {
    crate::{digest::DigestAlgorithm, error::Result, header::Header, tag::RpmTag},
    log::debug,
};

/// Derives metadata header entries from payload content.
///
/// Processors registered on a [super::PayloadRecorder] see every byte of the
/// uncompressed archive and of the compressed payload, in order. When the
/// recorder finishes, each processor writes its entries into a header that
/// is merged into the package's metadata header.
pub trait PayloadProcessor {
    /// Receive a chunk of the uncompressed cpio archive.
    fn feed_raw_payload_data(&mut self, data: &[u8]);

    /// Receive a chunk of the compressed payload.
    fn feed_payload_data(&mut self, data: &[u8]);

    /// Write derived entries.
    fn finish(self: Box<Self>, header: &mut Header<RpmTag>) -> Result<()>;
}

/// Records digests of the compressed and uncompressed payload.
///
/// Emits `PAYLOADDIGEST`, `PAYLOADDIGESTALT` and `PAYLOADDIGESTALGO`.
pub struct PayloadDigestProcessor {
    algorithm: DigestAlgorithm,
    raw: Box<dyn digest::DynDigest + Send>,
    compressed: Box<dyn digest::DynDigest + Send>,
}

impl PayloadDigestProcessor {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            raw: algorithm.new_hasher(),
            compressed: algorithm.new_hasher(),
        }
    }
}

impl Default for PayloadDigestProcessor {
    fn default() -> Self {
        Self::new(DigestAlgorithm::Sha256)
    }
}

impl PayloadProcessor for PayloadDigestProcessor {
    fn feed_raw_payload_data(&mut self, data: &[u8]) {
        self.raw.update(data);
    }

    fn feed_payload_data(&mut self, data: &[u8]) {
        self.compressed.update(data);
    }

    fn finish(self: Box<Self>, header: &mut Header<RpmTag>) -> Result<()> {
        let this = *self;
        let compressed = hex::encode(this.compressed.finalize());
        let raw = hex::encode(this.raw.finalize());

        debug!("payload {} digest: {}", this.algorithm, compressed);

        header.set(RpmTag::PayloadDigest, vec![compressed])?;
        header.set(RpmTag::PayloadDigestAlt, vec![raw])?;
        header.set(RpmTag::PayloadDigestAlgo, this.algorithm.id())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_digests() -> Result<()> {
        let mut processor = Box::new(PayloadDigestProcessor::default());
        processor.feed_raw_payload_data(b"hello ");
        processor.feed_raw_payload_data(b"world");
        processor.feed_payload_data(b"compressed");

        let mut header = Header::new();
        processor.finish(&mut header)?;

        assert_eq!(
            header.get_string_array(RpmTag::PayloadDigest)?,
            Some(&[DigestAlgorithm::Sha256.digest_hex(b"compressed")][..])
        );
        assert_eq!(
            header.get_string_array(RpmTag::PayloadDigestAlt)?,
            Some(&[DigestAlgorithm::Sha256.digest_hex(b"hello world")][..])
        );
        assert_eq!(header.get_u32(RpmTag::PayloadDigestAlgo)?, Some(8));

        Ok(())
    }
}
