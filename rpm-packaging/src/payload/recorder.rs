// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Payload assembly.

[PayloadRecorder] writes a cpio archive through a compressor into a temporary
file. Every uncompressed and compressed byte is also handed to registered
[PayloadProcessor]s.
*/

use {
    crate::{
        digest::{DigestAlgorithm, DigestingReader},
        error::{Result, RpmError},
        header::Header,
        payload::{
            coding::{PayloadCoding, PayloadEncoder, PayloadFlags},
            processor::PayloadProcessor,
        },
        tag::RpmTag,
    },
    cpio_archive::{NewcBuilder, NewcHeader},
    log::{debug, info},
    std::{
        fs::File,
        io::{BufWriter, Read, Seek, SeekFrom, Write},
        path::Path,
    },
    tempfile::NamedTempFile,
};

/// Normalize a path of an installed file to its absolute form.
///
/// Leading `/` and `./` are optional. Empty paths and paths with `.` or `..`
/// components are rejected.
pub fn normalize_path(path: &str) -> Result<String> {
    let invalid = || RpmError::InvalidPath(path.to_string());

    if path.contains('\0') {
        return Err(invalid());
    }

    let trimmed = path.strip_prefix("./").unwrap_or(path);
    let components = trimmed
        .split('/')
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>();

    if components.is_empty() || components.iter().any(|c| *c == "." || *c == "..") {
        return Err(invalid());
    }

    Ok(format!("/{}", components.join("/")))
}

/// Result of adding an entry to a payload.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PayloadEntry {
    /// The normalized absolute path of the entry.
    pub path: String,
    /// Inode number assigned in the archive.
    pub inode: u32,
    /// Size of the content. For symlinks, the length of the target.
    pub size: u64,
    /// Digest of file content. `None` for directories and symlinks.
    pub digest: Option<Vec<u8>>,
}

/// The writer the cpio archive is written to.
struct PayloadStream {
    encoder: PayloadEncoder<Vec<u8>>,
    output: BufWriter<NamedTempFile>,
    processors: Vec<Box<dyn PayloadProcessor>>,
    archive_size: u64,
    payload_size: u64,
}

impl PayloadStream {
    /// Move compressed bytes from the encoder buffer to the output.
    fn drain(&mut self) -> std::io::Result<()> {
        let buffer = self.encoder.get_mut();

        if !buffer.is_empty() {
            for processor in self.processors.iter_mut() {
                processor.feed_payload_data(buffer);
            }
            self.output.write_all(buffer)?;
            self.payload_size += buffer.len() as u64;
            buffer.clear();
        }

        Ok(())
    }

    fn finish(self) -> Result<FinishedPayload> {
        let Self {
            encoder,
            mut output,
            mut processors,
            archive_size,
            mut payload_size,
        } = self;

        let tail = encoder
            .finish()
            .map_err(RpmError::io_context("finishing payload compression"))?;

        for processor in processors.iter_mut() {
            processor.feed_payload_data(&tail);
        }
        output.write_all(&tail)?;
        payload_size += tail.len() as u64;

        let file = output
            .into_inner()
            .map_err(|e| RpmError::IoContext {
                stage: "flushing payload",
                source: e.into_error(),
            })?;

        let mut header = Header::new();
        for processor in processors {
            processor.finish(&mut header)?;
        }

        Ok(FinishedPayload {
            file,
            archive_size,
            payload_size,
            flags: PayloadFlags::default(),
            header,
        })
    }
}

impl Write for PayloadStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        for processor in self.processors.iter_mut() {
            processor.feed_raw_payload_data(buf);
        }

        self.encoder.write_all(buf)?;
        self.archive_size += buf.len() as u64;
        self.drain()?;

        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        // The encoder isn't flushed: that would alter the compressed stream.
        self.output.flush()
    }
}

/// A finished payload.
///
/// The compressed payload lives in a temporary file that is deleted when
/// this instance is dropped.
pub struct FinishedPayload {
    file: NamedTempFile,
    archive_size: u64,
    payload_size: u64,
    flags: PayloadFlags,
    header: Header<RpmTag>,
}

impl FinishedPayload {
    /// Open a new reader of the compressed payload, positioned at its start.
    pub fn open(&self) -> Result<File> {
        self.file
            .reopen()
            .map_err(RpmError::io_context("reopening payload"))
    }

    /// Size of the uncompressed cpio archive.
    pub fn archive_size(&self) -> u64 {
        self.archive_size
    }

    /// Size of the compressed payload.
    pub fn payload_size(&self) -> u64 {
        self.payload_size
    }

    pub fn coding(&self) -> PayloadCoding {
        self.flags.coding
    }

    pub fn flags(&self) -> &PayloadFlags {
        &self.flags
    }

    /// Entries derived by payload processors.
    pub fn additional_header(&self) -> &Header<RpmTag> {
        &self.header
    }
}

/// Assembles a compressed cpio payload.
pub struct PayloadRecorder {
    archive: Option<NewcBuilder<PayloadStream>>,
    flags: PayloadFlags,
    file_digest: DigestAlgorithm,
    next_inode: u32,
}

impl PayloadRecorder {
    /// Construct a new recorder.
    ///
    /// `flags` defaults to the coding's default flags. The flags must be for
    /// `coding`.
    pub fn new(
        coding: PayloadCoding,
        flags: Option<PayloadFlags>,
        file_digest: DigestAlgorithm,
    ) -> Result<Self> {
        let flags = flags.unwrap_or_else(|| coding.default_flags());
        if flags.coding != coding {
            return Err(RpmError::InvalidPayloadFlags {
                coding: coding.name(),
                flags: format!("{} flags {}", flags.coding, flags),
            });
        }

        let output = NamedTempFile::new().map_err(RpmError::io_context("creating payload file"))?;

        let stream = PayloadStream {
            encoder: PayloadEncoder::new(vec![], &flags)?,
            output: BufWriter::new(output),
            processors: vec![],
            archive_size: 0,
            payload_size: 0,
        };

        Ok(Self {
            archive: Some(NewcBuilder::new(stream)),
            flags,
            file_digest,
            next_inode: 1,
        })
    }

    pub fn flags(&self) -> &PayloadFlags {
        &self.flags
    }

    /// The algorithm used to digest file content.
    pub fn file_digest(&self) -> DigestAlgorithm {
        self.file_digest
    }

    /// Register a processor.
    ///
    /// Processors must be registered before any entry is added.
    pub fn add_processor(&mut self, processor: Box<dyn PayloadProcessor>) -> Result<()> {
        let archive = self.archive.as_mut().ok_or(RpmError::RecorderFinished)?;

        if archive.offset() != 0 {
            return Err(RpmError::ProcessorState(
                "payload processors must be registered before entries are added",
            ));
        }

        archive.get_mut().processors.push(processor);

        Ok(())
    }

    fn archive(&mut self) -> Result<&mut NewcBuilder<PayloadStream>> {
        self.archive.as_mut().ok_or(RpmError::RecorderFinished)
    }

    fn take_inode(&mut self) -> u32 {
        let inode = self.next_inode;
        self.next_inode += 1;

        inode
    }

    fn append_file(
        &mut self,
        path: &str,
        size: u64,
        data: impl Read,
        permissions: u32,
        mtime: u32,
    ) -> Result<PayloadEntry> {
        let path = normalize_path(path)?;
        let file_size = u32::try_from(size)
            .map_err(|_| RpmError::Cpio(cpio_archive::Error::MemberTooLarge(path.clone())))?;

        let inode = self.take_inode();
        let mut header = NewcHeader::new_file(format!(".{}", path), permissions, file_size);
        header.inode = inode;
        header.mtime = mtime;

        let mut reader = DigestingReader::new(data, self.file_digest);
        self.archive()?.append(&header, &mut reader)?;
        let digest = reader.finish();

        debug!("added file {} to payload ({} bytes)", path, size);

        Ok(PayloadEntry {
            path,
            inode,
            size,
            digest: Some(digest),
        })
    }

    /// Add a regular file with content from a buffer.
    pub fn add_file_data(
        &mut self,
        path: &str,
        data: &[u8],
        permissions: u32,
        mtime: u32,
    ) -> Result<PayloadEntry> {
        self.append_file(path, data.len() as u64, data, permissions, mtime)
    }

    /// Add a regular file with content from a filesystem path.
    pub fn add_file_path(
        &mut self,
        path: &str,
        source: impl AsRef<Path>,
        permissions: u32,
        mtime: u32,
    ) -> Result<PayloadEntry> {
        let file = File::open(source.as_ref())
            .map_err(RpmError::io_context("opening payload source file"))?;
        let size = file.metadata()?.len();

        self.append_file(path, size, file, permissions, mtime)
    }

    /// Add a regular file with content from a stream.
    ///
    /// The stream is spooled to a temporary file to learn its size, which cpio
    /// headers record before the content.
    pub fn add_file_reader(
        &mut self,
        path: &str,
        mut reader: impl Read,
        permissions: u32,
        mtime: u32,
    ) -> Result<PayloadEntry> {
        self.archive()?;

        let mut spool =
            tempfile::tempfile().map_err(RpmError::io_context("creating spool file"))?;
        let size = std::io::copy(&mut reader, &mut spool)
            .map_err(RpmError::io_context("spooling payload source"))?;
        spool.seek(SeekFrom::Start(0))?;

        self.append_file(path, size, spool, permissions, mtime)
    }

    /// Add a directory.
    pub fn add_directory(
        &mut self,
        path: &str,
        permissions: u32,
        mtime: u32,
    ) -> Result<PayloadEntry> {
        let path = normalize_path(path)?;

        let inode = self.take_inode();
        let mut header = NewcHeader::new_directory(format!(".{}", path), permissions);
        header.inode = inode;
        header.mtime = mtime;

        self.archive()?.append(&header, &mut std::io::empty())?;

        debug!("added directory {} to payload", path);

        Ok(PayloadEntry {
            path,
            inode,
            size: 0,
            digest: None,
        })
    }

    /// Add a symbolic link pointing at `target`.
    pub fn add_symlink(&mut self, path: &str, target: &str, mtime: u32) -> Result<PayloadEntry> {
        let path = normalize_path(path)?;

        if target.is_empty() || target.contains('\0') {
            return Err(RpmError::InvalidPath(target.to_string()));
        }

        let inode = self.take_inode();
        let mut header = NewcHeader::new_symlink(
            format!(".{}", path),
            0o777,
            target.len() as u32,
        );
        header.inode = inode;
        header.mtime = mtime;

        self.archive()?.append(&header, &mut target.as_bytes())?;

        debug!("added symlink {} -> {} to payload", path, target);

        Ok(PayloadEntry {
            path,
            inode,
            size: target.len() as u64,
            digest: None,
        })
    }

    /// Finish the payload.
    ///
    /// Writes the archive trailer, flushes the compressor and finalizes all
    /// processors. The recorder cannot be used afterwards.
    pub fn finish(&mut self) -> Result<FinishedPayload> {
        let archive = self.archive.take().ok_or(RpmError::RecorderFinished)?;

        let stream = archive.finish()?;
        let mut finished = stream.finish()?;
        finished.flags = self.flags;

        info!(
            "payload finished; {} bytes archive, {} bytes {} payload",
            finished.archive_size,
            finished.payload_size,
            finished.flags.coding
        );

        Ok(finished)
    }
}
