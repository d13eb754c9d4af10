// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Built-in size and digest processors. */

use {
    super::SignatureProcessor,
    crate::{
        digest::DigestAlgorithm,
        error::{Result, RpmError},
        header::{Header, HeaderValue},
        tag::SignatureTag,
    },
};

/// Records the combined size of the metadata header and payload.
///
/// Emits `SIZE`, or `LONGSIZE` when the size doesn't fit in 32 bits.
#[derive(Default)]
pub struct SizeProcessor {
    size: u64,
}

impl SignatureProcessor for SizeProcessor {
    fn feed_header(&mut self, data: &[u8]) {
        self.size += data.len() as u64;
    }

    fn feed_payload_data(&mut self, data: &[u8]) {
        self.size += data.len() as u64;
    }

    fn finish(self: Box<Self>, header: &mut Header<SignatureTag>) -> Result<()> {
        match u32::try_from(self.size) {
            Ok(size) => header.set(SignatureTag::Size, size),
            Err(_) => header.set(SignatureTag::LongSize, self.size),
        }
    }
}

/// Records the size of the uncompressed payload archive.
///
/// Emits `PAYLOADSIZE`, or `LONGARCHIVESIZE` when the size doesn't fit in
/// 32 bits.
#[derive(Default)]
pub struct PayloadSizeProcessor {
    archive_size: Option<u64>,
}

impl SignatureProcessor for PayloadSizeProcessor {
    fn init(&mut self, archive_size: u64) {
        self.archive_size = Some(archive_size);
    }

    fn feed_header(&mut self, _data: &[u8]) {}

    fn feed_payload_data(&mut self, _data: &[u8]) {}

    fn finish(self: Box<Self>, header: &mut Header<SignatureTag>) -> Result<()> {
        let size = self.archive_size.ok_or(RpmError::ProcessorState(
            "archive size was not provided by init",
        ))?;

        match u32::try_from(size) {
            Ok(size) => header.set(SignatureTag::PayloadSize, size),
            Err(_) => header.set(SignatureTag::LongArchiveSize, size),
        }
    }
}

/// Records the hex digest of the metadata header.
pub struct HeaderDigestProcessor {
    tag: SignatureTag,
    hasher: Box<dyn digest::DynDigest + Send>,
}

impl HeaderDigestProcessor {
    /// Emits `SHA1HEADER`.
    pub fn sha1() -> Self {
        Self {
            tag: SignatureTag::Sha1Header,
            hasher: DigestAlgorithm::Sha1.new_hasher(),
        }
    }

    /// Emits `SHA256HEADER`.
    pub fn sha256() -> Self {
        Self {
            tag: SignatureTag::Sha256Header,
            hasher: DigestAlgorithm::Sha256.new_hasher(),
        }
    }
}

impl SignatureProcessor for HeaderDigestProcessor {
    fn feed_header(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn feed_payload_data(&mut self, _data: &[u8]) {}

    fn finish(self: Box<Self>, header: &mut Header<SignatureTag>) -> Result<()> {
        let this = *self;

        header.set(this.tag, hex::encode(this.hasher.finalize()))
    }
}

/// Records the MD5 digest of the metadata header and payload as `MD5`.
pub struct Md5Processor {
    hasher: Box<dyn digest::DynDigest + Send>,
}

impl Default for Md5Processor {
    fn default() -> Self {
        Self {
            hasher: DigestAlgorithm::Md5.new_hasher(),
        }
    }
}

impl SignatureProcessor for Md5Processor {
    fn feed_header(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn feed_payload_data(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn finish(self: Box<Self>, header: &mut Header<SignatureTag>) -> Result<()> {
        let this = *self;

        header.set(
            SignatureTag::Md5,
            HeaderValue::Bin(this.hasher.finalize().to_vec()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_sizes() -> Result<()> {
        let mut size = Box::new(SizeProcessor::default());
        size.feed_header(&[0u8; 16]);
        size.size += u32::MAX as u64;

        let mut payload_size = Box::new(PayloadSizeProcessor::default());
        payload_size.init(u32::MAX as u64 + 1);

        let mut header = Header::new();
        size.finish(&mut header)?;
        payload_size.finish(&mut header)?;

        assert!(!header.contains(SignatureTag::Size));
        assert_eq!(
            header.get_u64(SignatureTag::LongSize)?,
            Some(u32::MAX as u64 + 16)
        );
        assert!(!header.contains(SignatureTag::PayloadSize));
        assert_eq!(
            header.get_u64(SignatureTag::LongArchiveSize)?,
            Some(u32::MAX as u64 + 1)
        );

        Ok(())
    }

    #[test]
    fn size_at_boundary() -> Result<()> {
        let mut payload_size = Box::new(PayloadSizeProcessor::default());
        payload_size.init(u32::MAX as u64);

        let mut header = Header::new();
        payload_size.finish(&mut header)?;
        assert_eq!(header.get_u32(SignatureTag::PayloadSize)?, Some(u32::MAX));

        Ok(())
    }

    #[test]
    fn header_digest_ignores_payload() -> Result<()> {
        let mut a = Box::new(HeaderDigestProcessor::sha256());
        a.feed_header(b"header");
        a.feed_payload_data(b"payload");

        let mut header = Header::new();
        a.finish(&mut header)?;

        assert_eq!(
            header.get_str(SignatureTag::Sha256Header)?,
            Some(DigestAlgorithm::Sha256.digest_hex(b"header").as_str())
        );

        Ok(())
    }
}
