// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Payload compression.

The compression applied to the payload is recorded in the metadata header
as a coding name (`PAYLOADCOMPRESSOR`) and a coding specific flags string
(`PAYLOADFLAGS`). Codings other than `gzip` require a minimum version of
the RPM library to read, which is declared as an `rpmlib()` requirement.
*/

use {
    crate::{
        dependency::Dependency,
        error::{Result, RpmError},
    },
    std::{
        fmt::{Display, Formatter},
        io::{Read, Write},
        str::FromStr,
    },
};

/// A payload compression scheme.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PayloadCoding {
    None,
    Gzip,
    Bzip2,
    Lzma,
    Xz,
    Zstd,
}

impl Default for PayloadCoding {
    fn default() -> Self {
        Self::Gzip
    }
}

impl PayloadCoding {
    /// All codings, in registry order.
    pub const ALL: [PayloadCoding; 6] = [
        Self::None,
        Self::Gzip,
        Self::Bzip2,
        Self::Lzma,
        Self::Xz,
        Self::Zstd,
    ];

    /// The name recorded in `PAYLOADCOMPRESSOR`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
            Self::Lzma => "lzma",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }

    /// The `rpmlib()` feature and version readers need to decode this coding.
    pub fn rpmlib_feature(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::None | Self::Gzip => None,
            Self::Bzip2 => Some(("PayloadIsBzip2", "3.0.5-1")),
            Self::Lzma => Some(("PayloadIsLzma", "4.4.6-1")),
            Self::Xz => Some(("PayloadIsXz", "5.2-1")),
            Self::Zstd => Some(("PayloadIsZstd", "5.4.18-1")),
        }
    }

    /// The requirement a package using this coding must declare.
    pub fn rpmlib_dependency(&self) -> Option<Dependency> {
        self.rpmlib_feature()
            .map(|(feature, version)| Dependency::rpmlib(feature, version))
    }

    /// Flags used when none are specified.
    pub fn default_flags(&self) -> PayloadFlags {
        let level = match self {
            Self::None => None,
            Self::Gzip | Self::Bzip2 => Some(9),
            Self::Lzma | Self::Xz => Some(6),
            Self::Zstd => Some(19),
        };

        PayloadFlags {
            coding: *self,
            level,
            ..Default::default()
        }
    }
}

impl Display for PayloadCoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PayloadCoding {
    type Err = RpmError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|c| c.name() == s)
            .copied()
            .ok_or_else(|| RpmError::UnknownPayloadCoding(s.to_string()))
    }
}

/// Coding specific compression settings.
///
/// The string form is what is recorded in `PAYLOADFLAGS`:
///
/// * `gzip`: `[0-9]` (level)
/// * `bzip2`: `[1-9]s?` (level, small memory mode)
/// * `lzma`: `[0-9]` (level)
/// * `xz`: `[0-9](T[0-9]+)?` (level, threads)
/// * `zstd`: `([0-9]+)?(T[0-9]+)?(L[0-9]+)?` (level, threads, window log)
/// * `none`: empty
///
/// Every component may be omitted, meaning the codec default.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PayloadFlags {
    pub coding: PayloadCoding,
    pub level: Option<u32>,
    /// Thread count. Recorded only; compression is single threaded.
    pub threads: Option<u32>,
    pub window_log: Option<u32>,
    /// bzip2 small memory decompression. Recorded only.
    pub small: bool,
}

struct FlagsCursor<'a> {
    data: &'a [u8],
}

impl<'a> FlagsCursor<'a> {
    fn number(&mut self, max_digits: usize) -> Option<Option<u32>> {
        let len = self
            .data
            .iter()
            .take(max_digits + 1)
            .take_while(|c| c.is_ascii_digit())
            .count();

        if len == 0 {
            return Some(None);
        }
        if len > max_digits {
            return None;
        }

        let (digits, rest) = self.data.split_at(len);
        self.data = rest;

        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| u32::from_str(s).ok())
            .map(Some)
    }

    fn prefixed(&mut self, prefix: u8) -> Option<Option<u32>> {
        if self.data.first() == Some(&prefix) {
            self.data = &self.data[1..];
            // A prefix without digits is invalid.
            self.number(9)?.map(Some)
        } else {
            Some(None)
        }
    }

    fn flag(&mut self, c: u8) -> bool {
        if self.data.first() == Some(&c) {
            self.data = &self.data[1..];
            true
        } else {
            false
        }
    }
}

impl PayloadFlags {
    /// Parse a flags string for a coding.
    pub fn parse(coding: PayloadCoding, s: &str) -> Result<Self> {
        let invalid = || RpmError::InvalidPayloadFlags {
            coding: coding.name(),
            flags: s.to_string(),
        };

        let mut cursor = FlagsCursor { data: s.as_bytes() };
        let mut flags = Self {
            coding,
            ..Default::default()
        };

        match coding {
            PayloadCoding::None => {}
            PayloadCoding::Gzip | PayloadCoding::Lzma => {
                flags.level = cursor.number(1).ok_or_else(invalid)?;
            }
            PayloadCoding::Bzip2 => {
                flags.level = cursor.number(1).ok_or_else(invalid)?;
                if flags.level == Some(0) {
                    return Err(invalid());
                }
                flags.small = cursor.flag(b's');
            }
            PayloadCoding::Xz => {
                flags.level = cursor.number(1).ok_or_else(invalid)?;
                flags.threads = cursor.prefixed(b'T').ok_or_else(invalid)?;
            }
            PayloadCoding::Zstd => {
                flags.level = cursor.number(2).ok_or_else(invalid)?;
                flags.threads = cursor.prefixed(b'T').ok_or_else(invalid)?;
                flags.window_log = cursor.prefixed(b'L').ok_or_else(invalid)?;

                if matches!(flags.level, Some(level) if level > 22)
                    || matches!(flags.window_log, Some(wlog) if !(10..=31).contains(&wlog))
                {
                    return Err(invalid());
                }
            }
        }

        // Anything left over, or a non-canonical spelling like leading zeros,
        // doesn't round trip.
        if !cursor.data.is_empty() || flags.to_string() != s {
            return Err(invalid());
        }

        Ok(flags)
    }

    /// The compression level to use, falling back to the coding default.
    pub fn effective_level(&self) -> u32 {
        self.level
            .or_else(|| self.coding.default_flags().level)
            .unwrap_or(0)
    }
}

impl Display for PayloadFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(level) = self.level {
            write!(f, "{}", level)?;
        }
        if self.small {
            f.write_str("s")?;
        }
        if let Some(threads) = self.threads {
            write!(f, "T{}", threads)?;
        }
        if let Some(wlog) = self.window_log {
            write!(f, "L{}", wlog)?;
        }

        Ok(())
    }
}

/// A compressing writer for a payload coding.
pub enum PayloadEncoder<W: Write> {
    None(W),
    Gzip(flate2::write::GzEncoder<W>),
    Bzip2(bzip2::write::BzEncoder<W>),
    Xz(xz2::write::XzEncoder<W>),
    Zstd(zstd::stream::write::Encoder<'static, W>),
}

impl<W: Write> PayloadEncoder<W> {
    /// Construct a new encoder writing compressed data to `writer`.
    pub fn new(writer: W, flags: &PayloadFlags) -> Result<Self> {
        let level = flags.effective_level();

        Ok(match flags.coding {
            PayloadCoding::None => Self::None(writer),
            PayloadCoding::Gzip => Self::Gzip(flate2::write::GzEncoder::new(
                writer,
                flate2::Compression::new(level.min(9)),
            )),
            PayloadCoding::Bzip2 => Self::Bzip2(bzip2::write::BzEncoder::new(
                writer,
                bzip2::Compression::new(level.clamp(1, 9)),
            )),
            PayloadCoding::Lzma => {
                let options = xz2::stream::LzmaOptions::new_preset(level.min(9))
                    .map_err(|e| RpmError::Io(e.into()))?;
                let stream = xz2::stream::Stream::new_lzma_encoder(&options)
                    .map_err(|e| RpmError::Io(e.into()))?;

                Self::Xz(xz2::write::XzEncoder::new_stream(writer, stream))
            }
            PayloadCoding::Xz => Self::Xz(xz2::write::XzEncoder::new(writer, level.min(9))),
            PayloadCoding::Zstd => {
                let mut encoder = zstd::stream::write::Encoder::new(writer, level.min(22) as i32)?;
                if let Some(wlog) = flags.window_log {
                    encoder.window_log(wlog)?;
                }

                Self::Zstd(encoder)
            }
        })
    }

    /// Obtain a mutable reference to the destination of compressed data.
    pub fn get_mut(&mut self) -> &mut W {
        match self {
            Self::None(w) => w,
            Self::Gzip(e) => e.get_mut(),
            Self::Bzip2(e) => e.get_mut(),
            Self::Xz(e) => e.get_mut(),
            Self::Zstd(e) => e.get_mut(),
        }
    }

    /// Write any buffered data and stream trailer, returning the destination.
    pub fn finish(self) -> std::io::Result<W> {
        match self {
            Self::None(mut w) => {
                w.flush()?;
                Ok(w)
            }
            Self::Gzip(e) => e.finish(),
            Self::Bzip2(e) => e.finish(),
            Self::Xz(e) => e.finish(),
            Self::Zstd(e) => e.finish(),
        }
    }
}

impl<W: Write> Write for PayloadEncoder<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::None(w) => w.write(buf),
            Self::Gzip(e) => e.write(buf),
            Self::Bzip2(e) => e.write(buf),
            Self::Xz(e) => e.write(buf),
            Self::Zstd(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::None(w) => w.flush(),
            Self::Gzip(e) => e.flush(),
            Self::Bzip2(e) => e.flush(),
            Self::Xz(e) => e.flush(),
            Self::Zstd(e) => e.flush(),
        }
    }
}

/// Obtain a reader decompressing a payload stream.
pub fn decompressing_reader<'a>(
    coding: PayloadCoding,
    reader: impl Read + 'a,
) -> Result<Box<dyn Read + 'a>> {
    Ok(match coding {
        PayloadCoding::None => Box::new(reader),
        PayloadCoding::Gzip => Box::new(flate2::read::MultiGzDecoder::new(reader)),
        PayloadCoding::Bzip2 => Box::new(bzip2::read::MultiBzDecoder::new(reader)),
        PayloadCoding::Lzma => {
            let stream = xz2::stream::Stream::new_lzma_decoder(u64::MAX)
                .map_err(|e| RpmError::Io(e.into()))?;

            Box::new(xz2::read::XzDecoder::new_stream(reader, stream))
        }
        PayloadCoding::Xz => Box::new(xz2::read::XzDecoder::new_multi_decoder(reader)),
        PayloadCoding::Zstd => {
            let mut decoder = zstd::stream::read::Decoder::new(reader)?;
            decoder.window_log_max(31)?;

            Box::new(decoder)
        }
    })
}

/// Compress a buffer in memory.
pub fn compress(flags: &PayloadFlags, data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = PayloadEncoder::new(vec![], flags)?;
    encoder.write_all(data)?;

    Ok(encoder.finish()?)
}

/// Decompress a buffer in memory.
pub fn decompress(coding: PayloadCoding, data: &[u8]) -> Result<Vec<u8>> {
    let mut res = vec![];
    decompressing_reader(coding, data)?.read_to_end(&mut res)?;

    Ok(res)
}
