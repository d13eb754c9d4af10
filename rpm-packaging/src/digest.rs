// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Content digests. */

use {
    crate::error::{Result, RpmError},
    std::{
        fmt::{Display, Formatter},
        io::Read,
        str::FromStr,
    },
};

/// A digest algorithm usable for file and payload digests.
///
/// Numeric ids are the OpenPGP hash algorithm ids RPM records in
/// `FILEDIGESTALGO` and `PAYLOADDIGESTALGO`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl Default for DigestAlgorithm {
    fn default() -> Self {
        Self::Sha256
    }
}

impl DigestAlgorithm {
    pub fn id(&self) -> u32 {
        match self {
            Self::Md5 => 1,
            Self::Sha1 => 2,
            Self::Sha256 => 8,
            Self::Sha384 => 9,
            Self::Sha512 => 10,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(Self::Md5),
            2 => Some(Self::Sha1),
            8 => Some(Self::Sha256),
            9 => Some(Self::Sha384),
            10 => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Size in bytes of digests produced by this algorithm.
    pub fn output_size(&self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Obtain a new hasher for this algorithm.
    pub fn new_hasher(&self) -> Box<dyn digest::DynDigest + Send> {
        match self {
            Self::Md5 => Box::new(md5::Md5::default()),
            Self::Sha1 => Box::new(sha1::Sha1::default()),
            Self::Sha256 => Box::new(sha2::Sha256::default()),
            Self::Sha384 => Box::new(sha2::Sha384::default()),
            Self::Sha512 => Box::new(sha2::Sha512::default()),
        }
    }

    /// Compute the digest of a byte slice.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        let mut hasher = self.new_hasher();
        hasher.update(data);

        hasher.finalize().to_vec()
    }

    /// Compute the hex encoded digest of a byte slice.
    pub fn digest_hex(&self, data: &[u8]) -> String {
        hex::encode(self.digest(data))
    }
}

impl Display for DigestAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        })
    }
}

impl FromStr for DigestAlgorithm {
    type Err = RpmError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(RpmError::Unsupported(format!("digest algorithm {}", s))),
        }
    }
}

/// A reader that digests content as it is read.
pub struct DigestingReader<R> {
    source: R,
    hasher: Box<dyn digest::DynDigest + Send>,
    bytes_read: u64,
}

impl<R: Read> DigestingReader<R> {
    pub fn new(source: R, algorithm: DigestAlgorithm) -> Self {
        Self {
            source,
            hasher: algorithm.new_hasher(),
            bytes_read: 0,
        }
    }

    /// Number of bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Finish reading, returning the digest of all content read.
    pub fn finish(self) -> Vec<u8> {
        self.hasher.finalize().to_vec()
    }
}

impl<R: Read> Read for DigestingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let size = self.source.read(buf)?;
        self.hasher.update(&buf[0..size]);
        self.bytes_read += size as u64;

        Ok(size)
    }
}

/// Compute the digest of all content of a reader.
pub fn digest_reader(algorithm: DigestAlgorithm, reader: impl Read) -> Result<(u64, Vec<u8>)> {
    let mut reader = DigestingReader::new(reader, algorithm);
    std::io::copy(&mut reader, &mut std::io::sink())?;

    Ok((reader.bytes_read(), reader.finish()))
}

#[cfg(test)]
mod tests {
    use {super::*, sha2::Digest};

    #[test]
    fn known_digests() {
        assert_eq!(
            DigestAlgorithm::Md5.digest_hex(b"abc"),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_eq!(
            DigestAlgorithm::Sha1.digest_hex(b"abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            DigestAlgorithm::Sha256.digest_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );

        for alg in [
            DigestAlgorithm::Md5,
            DigestAlgorithm::Sha1,
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha384,
            DigestAlgorithm::Sha512,
        ] {
            assert_eq!(alg.digest(b"").len(), alg.output_size());
            assert_eq!(DigestAlgorithm::from_id(alg.id()), Some(alg));
            assert_eq!(DigestAlgorithm::from_str(&alg.to_string()).ok(), Some(alg));
        }
    }

    #[test]
    fn digesting_reader() -> Result<()> {
        let data = vec![42u8; 100_000];

        let (size, digest) = digest_reader(DigestAlgorithm::Sha512, std::io::Cursor::new(&data))?;
        assert_eq!(size, 100_000);
        assert_eq!(digest, sha2::Sha512::digest(&data).to_vec());

        Ok(())
    }
}
