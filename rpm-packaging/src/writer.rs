// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Writing RPM files.

An RPM file is written in one pass once all of its parts are known:

1. The metadata header is rendered.
2. Signature processors are fed the rendered metadata header and the
   compressed payload, producing the signature header.
3. The lead, the signature header (padded to 8 bytes), the metadata header
   and the payload are written in order.
*/

use {
    crate::{
        error::{Result, RpmError},
        header::Header,
        lead::{RpmLead, LEAD_SIZE},
        payload::FinishedPayload,
        signature::{pad8, SignatureProcessor, SignatureProcessors},
        tag::RpmTag,
    },
    log::{debug, info},
    std::io::{Read, Write},
};

const FEED_BUFFER_SIZE: usize = 64 * 1024;

/// Writes an RPM file.
///
/// The payload tags (`PAYLOADFORMAT`, `PAYLOADCOMPRESSOR`, `PAYLOADFLAGS`)
/// and entries derived by payload processors are added to the metadata
/// header from the payload.
pub struct RpmWriter<'a, W: Write> {
    writer: Option<W>,
    lead: RpmLead,
    header: Header<RpmTag>,
    payload: Option<FinishedPayload>,
    processors: SignatureProcessors<'a>,
}

impl<'a, W: Write> RpmWriter<'a, W> {
    /// Construct a new instance writing to `writer`.
    ///
    /// The standard size and digest signature processors are registered.
    pub fn new(writer: W, lead: RpmLead) -> Self {
        Self {
            writer: Some(writer),
            lead,
            header: Header::new(),
            payload: None,
            processors: SignatureProcessors::defaults(),
        }
    }

    pub fn lead(&self) -> &RpmLead {
        &self.lead
    }

    pub fn header(&self) -> &Header<RpmTag> {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Header<RpmTag> {
        &mut self.header
    }

    pub fn set_header(&mut self, header: Header<RpmTag>) {
        self.header = header;
    }

    pub fn set_payload(&mut self, payload: FinishedPayload) {
        self.payload = Some(payload);
    }

    /// Register an additional signature processor, such as a signer.
    pub fn add_signature_processor(
        &mut self,
        processor: Box<dyn SignatureProcessor + 'a>,
    ) -> Result<()> {
        if self.writer.is_none() {
            return Err(RpmError::WriterFinished);
        }

        self.processors.add(processor)
    }

    /// Write the RPM file, returning the destination writer.
    ///
    /// The writer cannot be used afterwards. If an error occurs the output is
    /// incomplete and should be discarded.
    pub fn finish(&mut self) -> Result<W> {
        if self.writer.is_none() {
            return Err(RpmError::WriterFinished);
        }
        let payload = self.payload.take().ok_or(RpmError::PayloadNotSet)?;
        let mut writer = self.writer.take().ok_or(RpmError::WriterFinished)?;

        let mut header = self.header.clone();
        header.set(RpmTag::PayloadFormat, "cpio")?;
        header.set(RpmTag::PayloadCompressor, payload.coding().name())?;
        header.set(RpmTag::PayloadFlags, payload.flags().to_string())?;
        header.extend(payload.additional_header());

        let header_data = header.render(true)?;
        debug!("metadata header is {} bytes", header_data.len());

        let mut processors = std::mem::take(&mut self.processors);
        processors.init(payload.archive_size())?;
        processors.feed_header(&header_data)?;

        let mut source = payload.open()?;
        let mut buffer = vec![0u8; FEED_BUFFER_SIZE];
        loop {
            let count = source
                .read(&mut buffer)
                .map_err(RpmError::io_context("reading payload for signatures"))?;
            if count == 0 {
                break;
            }
            processors.feed_payload_data(&buffer[0..count])?;
        }

        let signature = processors.finish()?;
        let signature_data = signature.render(true)?;
        let padding = pad8(LEAD_SIZE + signature_data.len());

        self.lead.write(&mut writer)?;
        writer
            .write_all(&signature_data)
            .map_err(RpmError::io_context("writing signature header"))?;
        writer
            .write_all(&vec![0u8; padding])
            .map_err(RpmError::io_context("writing signature header"))?;
        writer
            .write_all(&header_data)
            .map_err(RpmError::io_context("writing metadata header"))?;

        // std::io::copy uses kernel copies when both ends are files.
        let mut source = payload.open()?;
        let copied = std::io::copy(&mut source, &mut writer)
            .map_err(RpmError::io_context("copying payload"))?;
        if copied != payload.payload_size() {
            return Err(RpmError::PayloadCopyTruncated {
                copied,
                expected: payload.payload_size(),
            });
        }

        writer
            .flush()
            .map_err(RpmError::io_context("flushing RPM"))?;

        info!(
            "wrote RPM {}: {} byte signature header, {} byte metadata header, {} byte {} payload",
            self.lead.name,
            signature_data.len() + padding,
            header_data.len(),
            copied,
            payload.coding()
        );

        Ok(writer)
    }
}
