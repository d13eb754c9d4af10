// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Reading RPM files.

[RpmReader] parses the lead and both header sections up front. The stream
is then positioned at the start of the compressed payload.
*/

use {
    crate::{
        digest::DigestAlgorithm,
        error::{Result, RpmError},
        header::Header,
        lead::{RpmLead, LEAD_SIZE},
        payload::{decompressing_reader, PayloadCoding, PayloadFlags},
        signature::{
            pad8, HeaderDigestProcessor, Md5Processor, SignatureProcessors, SizeProcessor,
        },
        tag::{HeaderTag, RpmTag, SignatureTag},
    },
    cpio_archive::{NewcHeader, NewcReader},
    log::{debug, warn},
    std::{io::Read, str::FromStr},
};

/// Signature tags checked by [RpmReader::verify_digests].
const VERIFIABLE_TAGS: [SignatureTag; 5] = [
    SignatureTag::Size,
    SignatureTag::LongSize,
    SignatureTag::Md5,
    SignatureTag::Sha1Header,
    SignatureTag::Sha256Header,
];

/// A member of the payload archive.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PayloadMember {
    pub header: NewcHeader,
    /// File content, or the target of a symlink.
    pub data: Vec<u8>,
}

/// Outcome of a successful [RpmReader::verify_digests].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VerifiedDigests {
    /// Signature header entries that were recomputed and matched.
    pub signature_tags: Vec<SignatureTag>,
    /// Whether `PAYLOADDIGEST` was present and matched.
    pub payload_digest: bool,
}

/// Reads an RPM file.
pub struct RpmReader<R: Read> {
    reader: R,
    lead: RpmLead,
    signature: Header<SignatureTag>,
    signature_data: Vec<u8>,
    header: Header<RpmTag>,
    header_data: Vec<u8>,
}

impl<R: Read> RpmReader<R> {
    /// Parse the lead and headers of an RPM.
    pub fn new(mut reader: R) -> Result<Self> {
        let lead = RpmLead::read_from(&mut reader)?;
        let (signature, signature_data) = Header::<SignatureTag>::read_from(&mut reader)?;

        let mut padding = [0u8; 8];
        let padding = &mut padding[0..pad8(LEAD_SIZE + signature_data.len())];
        reader.read_exact(padding).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                RpmError::HeaderTruncated("signature header padding")
            }
            _ => RpmError::Io(e),
        })?;

        let (header, header_data) = Header::<RpmTag>::read_from(&mut reader)?;

        debug!(
            "read RPM {}: {} signature entries, {} metadata entries",
            lead.name,
            signature.len(),
            header.len()
        );

        Ok(Self {
            reader,
            lead,
            signature,
            signature_data,
            header,
            header_data,
        })
    }

    pub fn lead(&self) -> &RpmLead {
        &self.lead
    }

    pub fn signature(&self) -> &Header<SignatureTag> {
        &self.signature
    }

    /// The raw bytes of the signature header section, without padding.
    pub fn signature_data(&self) -> &[u8] {
        &self.signature_data
    }

    pub fn header(&self) -> &Header<RpmTag> {
        &self.header
    }

    /// The raw bytes of the metadata header section.
    pub fn header_data(&self) -> &[u8] {
        &self.header_data
    }

    /// Resolve the payload coding from the metadata header.
    ///
    /// A missing `PAYLOADCOMPRESSOR` means gzip.
    pub fn coding(&self) -> Result<PayloadCoding> {
        match self.header.get_str(RpmTag::PayloadFormat)? {
            None | Some("cpio") => {}
            Some(format) => return Err(RpmError::UnsupportedPayloadFormat(format.to_string())),
        }

        let coding = match self.header.get_str(RpmTag::PayloadCompressor)? {
            Some(name) => PayloadCoding::from_str(name)?,
            None => PayloadCoding::Gzip,
        };
        debug!("payload coding is {}", coding);

        Ok(coding)
    }

    /// Parse `PAYLOADFLAGS`, if present.
    pub fn payload_flags(&self) -> Result<Option<PayloadFlags>> {
        match self.header.get_str(RpmTag::PayloadFlags)? {
            Some(flags) => Ok(Some(PayloadFlags::parse(self.coding()?, flags)?)),
            None => Ok(None),
        }
    }

    /// Obtain the stream of the compressed payload.
    pub fn into_raw_payload(self) -> R {
        self.reader
    }

    /// Obtain a reader of the decompressed payload archive.
    pub fn into_payload_reader<'a>(self) -> Result<Box<dyn Read + 'a>>
    where
        R: 'a,
    {
        let coding = self.coding()?;

        decompressing_reader(coding, self.reader)
    }

    /// Read all members of the payload archive.
    pub fn payload_entries(self) -> Result<Vec<PayloadMember>> {
        let mut archive = NewcReader::new(self.into_payload_reader()?);

        let mut res = vec![];
        while let Some(header) = archive.read_next()? {
            let mut data = Vec::with_capacity(header.file_size as usize);
            archive.read_to_end(&mut data)?;

            res.push(PayloadMember { header, data });
        }

        Ok(res)
    }

    /// Verify the size and digest entries against the file content.
    ///
    /// `SIZE`/`LONGSIZE`, `MD5`, `SHA1HEADER`, `SHA256HEADER` and the
    /// metadata header's `PAYLOADDIGEST` are recomputed when present. Entries
    /// that are absent are skipped. The payload is consumed.
    pub fn verify_digests(mut self) -> Result<VerifiedDigests> {
        let mut processors = SignatureProcessors::new();
        processors.add(Box::new(SizeProcessor::default()))?;
        processors.add(Box::new(Md5Processor::default()))?;
        processors.add(Box::new(HeaderDigestProcessor::sha1()))?;
        processors.add(Box::new(HeaderDigestProcessor::sha256()))?;
        processors.feed_header(&self.header_data)?;

        let mut payload_digest = match self.header.get_string_array(RpmTag::PayloadDigest)? {
            Some(digests) => {
                let id = self
                    .header
                    .get_u32(RpmTag::PayloadDigestAlgo)?
                    .unwrap_or(DigestAlgorithm::Sha256.id());
                let algorithm = DigestAlgorithm::from_id(id).ok_or_else(|| {
                    RpmError::Unsupported(format!("payload digest algorithm {}", id))
                })?;

                Some((digests.to_vec(), algorithm.new_hasher()))
            }
            None => None,
        };

        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            let count = self
                .reader
                .read(&mut buffer)
                .map_err(RpmError::io_context("reading payload"))?;
            if count == 0 {
                break;
            }

            processors.feed_payload_data(&buffer[0..count])?;
            if let Some((_, hasher)) = payload_digest.as_mut() {
                hasher.update(&buffer[0..count]);
            }
        }

        let computed = processors.finish()?;

        let mut res = VerifiedDigests::default();

        for tag in VERIFIABLE_TAGS {
            if let Some(expected) = self.signature.get(tag) {
                if computed.get(tag) != Some(expected) {
                    warn!("signature entry {} does not match content", tag.id());
                    return Err(RpmError::DigestMismatch { tag: tag.id() });
                }

                res.signature_tags.push(tag);
            }
        }

        if let Some((expected, hasher)) = payload_digest {
            let actual = hex::encode(hasher.finalize());

            if !expected.iter().any(|digest| digest == &actual) {
                warn!("payload digest does not match content");
                return Err(RpmError::DigestMismatch {
                    tag: RpmTag::PayloadDigest.id(),
                });
            }

            res.payload_digest = true;
        }

        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            lead::PackageType,
            payload::{PayloadDigestProcessor, PayloadRecorder},
            writer::RpmWriter,
        },
        std::io::Cursor,
    };

    fn package(coding: PayloadCoding) -> Result<Vec<u8>> {
        let mut recorder = PayloadRecorder::new(coding, None, DigestAlgorithm::Sha256)?;
        recorder.add_processor(Box::new(PayloadDigestProcessor::default()))?;
        recorder.add_directory("/opt/demo", 0o755, 7)?;
        recorder.add_file_data("/opt/demo/hello.txt", b"hello, world\n", 0o644, 7)?;
        recorder.add_symlink("/opt/demo/link", "hello.txt", 7)?;

        let mut writer = RpmWriter::new(
            vec![],
            RpmLead::new(PackageType::Binary, "aarch64", "demo-1.0-1"),
        );
        writer.header_mut().set(RpmTag::Name, "demo")?;
        writer.header_mut().set(RpmTag::Version, "1.0")?;
        writer.set_payload(recorder.finish()?);

        writer.finish()
    }

    #[test]
    fn read_written_package() -> Result<()> {
        for coding in [PayloadCoding::Gzip, PayloadCoding::Xz, PayloadCoding::Zstd] {
            let data = package(coding)?;
            let reader = RpmReader::new(Cursor::new(data))?;

            assert_eq!(reader.lead().name, "demo-1.0-1");
            assert_eq!(reader.lead().architecture, 19);
            assert_eq!(reader.header().get_str(RpmTag::Version)?, Some("1.0"));
            assert_eq!(reader.coding()?, coding);
            assert_eq!(reader.payload_flags()?, Some(coding.default_flags()));

            let entries = reader.payload_entries()?;
            assert_eq!(entries.len(), 3);
            assert_eq!(entries[0].header.name, "./opt/demo");
            assert!(entries[0].header.is_directory());
            assert_eq!(entries[1].header.name, "./opt/demo/hello.txt");
            assert_eq!(entries[1].data, b"hello, world\n");
            assert!(entries[2].header.is_symlink());
            assert_eq!(entries[2].data, b"hello.txt");
        }

        Ok(())
    }

    #[test]
    fn verify_intact_package() -> Result<()> {
        let reader = RpmReader::new(Cursor::new(package(PayloadCoding::Gzip)?))?;
        let verified = reader.verify_digests()?;

        assert_eq!(
            verified.signature_tags,
            vec![
                SignatureTag::Size,
                SignatureTag::Md5,
                SignatureTag::Sha1Header,
                SignatureTag::Sha256Header
            ]
        );
        assert!(verified.payload_digest);

        Ok(())
    }

    #[test]
    fn verify_detects_tampering() -> Result<()> {
        let mut data = package(PayloadCoding::None)?;
        let last = data.len() - 1;
        data[last] ^= 0xff;

        let reader = RpmReader::new(Cursor::new(data))?;
        assert!(matches!(
            reader.verify_digests(),
            Err(RpmError::DigestMismatch { tag }) if tag == SignatureTag::Md5.id()
        ));

        Ok(())
    }

    #[test]
    fn malformed_input() -> Result<()> {
        assert!(matches!(
            RpmReader::new(Cursor::new(vec![0u8; 200])),
            Err(RpmError::BadLeadMagic)
        ));
        assert!(matches!(
            RpmReader::new(Cursor::new(vec![])),
            Err(RpmError::BadLeadMagic)
        ));

        let data = package(PayloadCoding::Gzip)?;
        assert!(matches!(
            RpmReader::new(Cursor::new(&data[0..LEAD_SIZE + 20])),
            Err(RpmError::HeaderTruncated(_))
        ));

        Ok(())
    }

    #[test]
    fn missing_compressor_means_gzip() -> Result<()> {
        let data = package(PayloadCoding::Gzip)?;
        let mut reader = RpmReader::new(Cursor::new(data))?;
        reader.header.remove(RpmTag::PayloadCompressor);
        assert_eq!(reader.coding()?, PayloadCoding::Gzip);

        reader.header.set(RpmTag::PayloadFormat, "drpm")?;
        assert!(matches!(
            reader.coding(),
            Err(RpmError::UnsupportedPayloadFormat(_))
        ));

        Ok(())
    }
}
