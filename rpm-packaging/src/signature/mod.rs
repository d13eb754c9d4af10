// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Derivation of the signature header.

Entries of the signature header (sizes, digests and cryptographic
signatures) are produced by [SignatureProcessor]s. Every processor is fed
the rendered metadata header and then the compressed payload, in order.
[SignatureProcessors] drives a set of processors in lock-step and enforces
the order of calls.
*/

pub mod pgp;
pub mod processors;

pub use processors::{HeaderDigestProcessor, Md5Processor, PayloadSizeProcessor, SizeProcessor};

use {
    crate::{
        error::{Result, RpmError},
        header::Header,
        tag::SignatureTag,
    },
    log::debug,
};

/// Derives signature header entries from header and payload bytes.
pub trait SignatureProcessor {
    /// Receive the size of the uncompressed payload archive.
    ///
    /// Called at most once, before anything is fed.
    fn init(&mut self, _archive_size: u64) {}

    /// Receive the rendered metadata header. Called exactly once.
    fn feed_header(&mut self, data: &[u8]);

    /// Receive a chunk of the compressed payload.
    fn feed_payload_data(&mut self, data: &[u8]);

    /// Write derived entries to the signature header.
    fn finish(self: Box<Self>, header: &mut Header<SignatureTag>) -> Result<()>;
}

/// Where a [SignatureProcessors] instance is in the call sequence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProcessorPhase {
    Created,
    Initialized,
    HeaderFed,
    PayloadFed,
    Finished,
}

/// A set of [SignatureProcessor] fed in lock-step.
pub struct SignatureProcessors<'a> {
    processors: Vec<Box<dyn SignatureProcessor + 'a>>,
    phase: ProcessorPhase,
}

impl<'a> Default for SignatureProcessors<'a> {
    fn default() -> Self {
        Self {
            processors: vec![],
            phase: ProcessorPhase::Created,
        }
    }
}

impl<'a> SignatureProcessors<'a> {
    /// Construct an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a set of the standard size and digest processors.
    pub fn defaults() -> Self {
        let mut res = Self::new();
        res.processors = vec![
            Box::new(SizeProcessor::default()),
            Box::new(PayloadSizeProcessor::default()),
            Box::new(HeaderDigestProcessor::sha1()),
            Box::new(HeaderDigestProcessor::sha256()),
            Box::new(Md5Processor::default()),
        ];

        res
    }

    pub fn phase(&self) -> ProcessorPhase {
        self.phase
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Register a processor. Only possible before anything is fed.
    pub fn add(&mut self, processor: Box<dyn SignatureProcessor + 'a>) -> Result<()> {
        if self.phase != ProcessorPhase::Created {
            return Err(RpmError::ProcessorState(
                "processors must be registered before feeding",
            ));
        }

        self.processors.push(processor);

        Ok(())
    }

    pub fn init(&mut self, archive_size: u64) -> Result<()> {
        if self.phase != ProcessorPhase::Created {
            return Err(RpmError::ProcessorState(
                "init must be called once, before feeding",
            ));
        }

        for processor in self.processors.iter_mut() {
            processor.init(archive_size);
        }
        self.phase = ProcessorPhase::Initialized;

        Ok(())
    }

    pub fn feed_header(&mut self, data: &[u8]) -> Result<()> {
        if !matches!(
            self.phase,
            ProcessorPhase::Created | ProcessorPhase::Initialized
        ) {
            return Err(RpmError::ProcessorState(
                "header must be fed exactly once, before payload data",
            ));
        }

        for processor in self.processors.iter_mut() {
            processor.feed_header(data);
        }
        self.phase = ProcessorPhase::HeaderFed;

        Ok(())
    }

    pub fn feed_payload_data(&mut self, data: &[u8]) -> Result<()> {
        if !matches!(
            self.phase,
            ProcessorPhase::HeaderFed | ProcessorPhase::PayloadFed
        ) {
            return Err(RpmError::ProcessorState(
                "payload data must be fed after the header and before finishing",
            ));
        }

        for processor in self.processors.iter_mut() {
            processor.feed_payload_data(data);
        }
        self.phase = ProcessorPhase::PayloadFed;

        Ok(())
    }

    /// Finish all processors, producing the signature header.
    pub fn finish(&mut self) -> Result<Header<SignatureTag>> {
        if !matches!(
            self.phase,
            ProcessorPhase::HeaderFed | ProcessorPhase::PayloadFed
        ) {
            return Err(RpmError::ProcessorState(
                "finish requires the header to be fed and may only be called once",
            ));
        }
        self.phase = ProcessorPhase::Finished;

        let mut header = Header::new();
        for processor in std::mem::take(&mut self.processors) {
            processor.finish(&mut header)?;
        }

        debug!("signature header has {} entries", header.len());

        Ok(header)
    }
}

/// Pad `offset` to the next multiple of 8.
pub(crate) fn pad8(offset: usize) -> usize {
    (8 - offset % 8) % 8
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::digest::DigestAlgorithm,
        md5::Digest,
    };

    #[test]
    fn reference_values() -> Result<()> {
        let header = b"rendered header bytes".to_vec();
        let payload = vec![3u8; 10_000];

        let mut processors = SignatureProcessors::defaults();
        processors.init(123_456)?;
        processors.feed_header(&header)?;
        for chunk in payload.chunks(999) {
            processors.feed_payload_data(chunk)?;
        }
        let sig = processors.finish()?;

        let mut whole = header.clone();
        whole.extend_from_slice(&payload);

        assert_eq!(
            sig.get_u32(SignatureTag::Size)?,
            Some((header.len() + payload.len()) as u32)
        );
        assert!(!sig.contains(SignatureTag::LongSize));
        assert_eq!(sig.get_u32(SignatureTag::PayloadSize)?, Some(123_456));
        assert_eq!(
            sig.get_str(SignatureTag::Sha1Header)?,
            Some(DigestAlgorithm::Sha1.digest_hex(&header).as_str())
        );
        assert_eq!(
            sig.get_str(SignatureTag::Sha256Header)?,
            Some(DigestAlgorithm::Sha256.digest_hex(&header).as_str())
        );
        assert_eq!(
            sig.get_bytes(SignatureTag::Md5)?,
            Some(md5::Md5::digest(&whole).as_slice())
        );

        Ok(())
    }

    #[test]
    fn call_order() -> Result<()> {
        let mut processors = SignatureProcessors::defaults();
        assert!(matches!(
            processors.feed_payload_data(b"x"),
            Err(RpmError::ProcessorState(_))
        ));
        assert!(matches!(
            processors.finish(),
            Err(RpmError::ProcessorState(_))
        ));

        processors.feed_header(b"header")?;
        assert_eq!(processors.phase(), ProcessorPhase::HeaderFed);
        assert!(processors.init(1).is_err());
        assert!(processors.feed_header(b"again").is_err());
        assert!(processors.add(Box::new(Md5Processor::default())).is_err());

        // Without init, the payload size processor has nothing to report.
        assert!(matches!(
            processors.finish(),
            Err(RpmError::ProcessorState(_))
        ));
        assert_eq!(processors.phase(), ProcessorPhase::Finished);
        assert!(processors.finish().is_err());

        let mut processors = SignatureProcessors::new();
        processors.add(Box::new(SizeProcessor::default()))?;
        processors.feed_header(b"header")?;
        let sig = processors.finish()?;
        assert_eq!(sig.get_u32(SignatureTag::Size)?, Some(6));

        Ok(())
    }

    #[test]
    fn padding() {
        assert_eq!(pad8(0), 0);
        assert_eq!(pad8(1), 7);
        assert_eq!(pad8(96 + 16 + 16 + 16), 0);
        assert_eq!(pad8(100), 4);
    }
}
