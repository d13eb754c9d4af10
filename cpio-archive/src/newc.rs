// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! New ASCII format support.
//!
//! Each member is a 110 byte ASCII header (`070701` followed by 13 fields of 8
//! hex digits), the NUL terminated member name, padding to a 4 byte boundary,
//! the member data and padding to a 4 byte boundary.

use {
    crate::{
        pad4, CpioResult, Error, MODE_DIRECTORY, MODE_REGULAR_FILE, MODE_SYMLINK, MODE_TYPE_MASK,
        TRAILER_NAME,
    },
    chrono::{DateTime, Utc},
    std::{
        ffi::CStr,
        io::{Read, Take, Write},
    },
};

pub const MAGIC: &[u8] = b"070701";

/// Size of a header before the member name.
pub const HEADER_SIZE: usize = 110;

fn u32_from_hex(data: &[u8]) -> CpioResult<u32> {
    let s = std::str::from_utf8(data).map_err(|_| Error::BadHeaderString)?;
    u32::from_str_radix(s, 16).map_err(|_| Error::BadHeaderHex(s.to_string()))
}

fn read_hex(reader: &mut impl Read, count: usize) -> CpioResult<u32> {
    let mut buffer = vec![0u8; count];
    reader.read_exact(&mut buffer)?;

    u32_from_hex(&buffer)
}

fn skip(reader: &mut impl Read, count: usize) -> CpioResult<()> {
    let mut pad = [0u8; 4];
    reader.read_exact(&mut pad[0..count])?;

    Ok(())
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NewcHeader {
    pub inode: u32,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub mtime: u32,
    pub file_size: u32,
    pub dev_major: u32,
    pub dev_minor: u32,
    pub rdev_major: u32,
    pub rdev_minor: u32,
    pub checksum: u32,
    pub name: String,
}

impl NewcHeader {
    /// Construct a header for a regular file.
    ///
    /// `permissions` are the permission bits; the file type bits are added.
    pub fn new_file(name: impl ToString, permissions: u32, file_size: u32) -> Self {
        Self {
            mode: MODE_REGULAR_FILE | (permissions & !MODE_TYPE_MASK),
            nlink: 1,
            file_size,
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Construct a header for a directory.
    pub fn new_directory(name: impl ToString, permissions: u32) -> Self {
        Self {
            mode: MODE_DIRECTORY | (permissions & !MODE_TYPE_MASK),
            nlink: 2,
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Construct a header for a symbolic link whose target has `target_size` bytes.
    pub fn new_symlink(name: impl ToString, permissions: u32, target_size: u32) -> Self {
        Self {
            mode: MODE_SYMLINK | (permissions & !MODE_TYPE_MASK),
            nlink: 1,
            file_size: target_size,
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn trailer() -> Self {
        Self {
            nlink: 1,
            name: TRAILER_NAME.to_string(),
            ..Default::default()
        }
    }

    /// Parse a header from a reader positioned just after the magic.
    pub fn from_reader(reader: &mut impl Read) -> CpioResult<Self> {
        let inode = read_hex(reader, 8)?;
        let mode = read_hex(reader, 8)?;
        let uid = read_hex(reader, 8)?;
        let gid = read_hex(reader, 8)?;
        let nlink = read_hex(reader, 8)?;
        let mtime = read_hex(reader, 8)?;
        let file_size = read_hex(reader, 8)?;
        let dev_major = read_hex(reader, 8)?;
        let dev_minor = read_hex(reader, 8)?;
        let rdev_major = read_hex(reader, 8)?;
        let rdev_minor = read_hex(reader, 8)?;
        let name_length = read_hex(reader, 8)?;
        let checksum = read_hex(reader, 8)?;

        let mut name_data = vec![0u8; name_length as usize];
        reader.read_exact(&mut name_data)?;

        let name = CStr::from_bytes_with_nul(&name_data)
            .map_err(|_| Error::FilenameDecode)?
            .to_str()
            .map_err(|_| Error::FilenameDecode)?
            .to_string();

        // Header plus name is padded to a 4 byte boundary.
        skip(reader, pad4((HEADER_SIZE + name_data.len()) as u64))?;

        Ok(Self {
            inode,
            mode,
            uid,
            gid,
            nlink,
            mtime,
            file_size,
            dev_major,
            dev_minor,
            rdev_major,
            rdev_minor,
            checksum,
            name,
        })
    }

    /// Serialize this header, including the name and its padding.
    ///
    /// Returns the number of bytes written.
    pub fn write(&self, writer: &mut impl Write) -> CpioResult<u64> {
        if self.name.as_bytes().contains(&0) {
            return Err(Error::FilenameNul(self.name.clone()));
        }

        let name_size = self.name.len() + 1;

        let mut data = Vec::with_capacity(HEADER_SIZE + name_size + 3);
        data.extend_from_slice(MAGIC);
        for value in [
            self.inode,
            self.mode,
            self.uid,
            self.gid,
            self.nlink,
            self.mtime,
            self.file_size,
            self.dev_major,
            self.dev_minor,
            self.rdev_major,
            self.rdev_minor,
            name_size as u32,
            self.checksum,
        ] {
            data.extend_from_slice(format!("{:08x}", value).as_bytes());
        }
        data.extend_from_slice(self.name.as_bytes());
        data.push(0);
        data.resize(data.len() + pad4(data.len() as u64), 0);

        writer.write_all(&data)?;

        Ok(data.len() as u64)
    }

    /// Modified time as a [DateTime].
    pub fn modified_time(&self) -> DateTime<Utc> {
        // Every u32 is in range.
        DateTime::from_timestamp(self.mtime as i64, 0).unwrap_or_default()
    }

    /// Permission bits of the mode, without the file type.
    pub fn permissions(&self) -> u32 {
        self.mode & !MODE_TYPE_MASK
    }

    pub fn is_file(&self) -> bool {
        self.mode & MODE_TYPE_MASK == MODE_REGULAR_FILE
    }

    pub fn is_directory(&self) -> bool {
        self.mode & MODE_TYPE_MASK == MODE_DIRECTORY
    }

    pub fn is_symlink(&self) -> bool {
        self.mode & MODE_TYPE_MASK == MODE_SYMLINK
    }
}

/// A cpio archive reader for *New ASCII format* archives.
///
/// Instances behave like a cursor over members of the archive. The cursor is
/// advanced by calling [Self::read_next]. When the cursor is advanced, the
/// [Read] trait will read data for this and only this archive member. The reader
/// will hit EOF at the end of the current archive member.
pub struct NewcReader<T: Read + Sized> {
    archive_reader: Option<T>,
    entry_reader: Option<Take<T>>,
    entry_data_pad: usize,
}

impl<T: Read + Sized> NewcReader<T> {
    /// Construct a new instance from a reader.
    pub fn new(reader: T) -> Self {
        Self {
            archive_reader: Some(reader),
            entry_reader: None,
            entry_data_pad: 0,
        }
    }

    /// Read the next header from the archive.
    ///
    /// `Some` on another file entry. `None` if at end of archive.
    ///
    /// The special `TRAILER!!!` entry is not emitted.
    pub fn read_next(&mut self) -> CpioResult<Option<NewcHeader>> {
        self.finish()?;

        if let Some(mut reader) = self.archive_reader.take() {
            let mut magic = [0u8; 6];

            match reader.read_exact(&mut magic) {
                Ok(_) => {}
                Err(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(e) => {
                    return Err(e.into());
                }
            }

            if magic != MAGIC {
                return Err(Error::BadMagic);
            }

            let header = NewcHeader::from_reader(&mut reader)?;

            if header.name == TRAILER_NAME {
                // The archive reader isn't restored: the trailer ends the archive.
                Ok(None)
            } else {
                self.entry_reader = Some(reader.take(header.file_size as _));
                self.entry_data_pad = pad4(header.file_size as u64);
                Ok(Some(header))
            }
        } else {
            Ok(None)
        }
    }

    /// Finish reading the current member.
    ///
    /// This will advance the reader to the next archive member if the
    /// current member hasn't been fully consumed.
    pub fn finish(&mut self) -> CpioResult<()> {
        if let Some(mut reader) = self.entry_reader.take() {
            std::io::copy(&mut reader, &mut std::io::sink())?;

            if reader.limit() != 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
            }

            let mut reader = reader.into_inner();
            skip(&mut reader, self.entry_data_pad)?;
            self.entry_data_pad = 0;

            self.archive_reader = Some(reader);
        }

        Ok(())
    }
}

impl<T: Read + Sized> Iterator for NewcReader<T> {
    type Item = CpioResult<NewcHeader>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(r)) => Some(Ok(r)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl<T: Read + Sized> Read for NewcReader<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, std::io::Error> {
        if let Some(reader) = &mut self.entry_reader {
            reader.read(buf)
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "no current archive entry to read from",
            ))
        }
    }
}

/// A streaming writer of *New ASCII format* archives.
///
/// Members are appended in order via [Self::append]. The archive is closed
/// with [Self::finish], which writes the trailer member and returns the
/// underlying writer.
pub struct NewcBuilder<W: Write> {
    writer: W,
    offset: u64,
}

impl<W: Write> NewcBuilder<W> {
    /// Construct a new instance writing to a destination.
    pub fn new(writer: W) -> Self {
        Self { writer, offset: 0 }
    }

    /// Number of bytes written to the archive so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Append a member.
    ///
    /// Exactly `header.file_size` bytes are copied from `data`. A reader
    /// yielding fewer bytes is an error.
    ///
    /// Returns the number of bytes the member occupies in the archive.
    pub fn append(&mut self, header: &NewcHeader, data: &mut impl Read) -> CpioResult<u64> {
        let start = self.offset;

        self.offset += header.write(&mut self.writer)?;

        let expected = header.file_size as u64;
        let copied = std::io::copy(&mut data.take(expected), &mut self.writer)?;
        if copied != expected {
            return Err(Error::DataSizeMismatch {
                name: header.name.clone(),
                expected,
                actual: copied,
            });
        }
        self.offset += copied;

        let pad = pad4(copied);
        self.writer.write_all(&[0u8; 4][0..pad])?;
        self.offset += pad as u64;

        Ok(self.offset - start)
    }

    /// Write the trailer member and return the destination writer.
    pub fn finish(mut self) -> CpioResult<W> {
        self.offset += NewcHeader::trailer().write(&mut self.writer)?;
        self.writer.flush()?;

        Ok(self.writer)
    }
}
