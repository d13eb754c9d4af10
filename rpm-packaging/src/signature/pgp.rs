// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! OpenPGP signatures of packages.

Two detached signatures are produced: one over the metadata header alone and
one over the metadata header followed by the compressed payload. Which
signature tags they are stored in depends on the public key algorithm of the
signing key.
*/

use {
    super::SignatureProcessor,
    crate::{
        error::{Result, RpmError},
        header::{Header, HeaderValue},
        tag::SignatureTag,
    },
    chrono::{DateTime, SubsecRound, Utc},
    log::debug,
    pgp::{
        crypto::{HashAlgorithm, Hasher, PublicKeyAlgorithm},
        packet::{Packet, SignatureConfig, SignatureType, Subpacket},
        ser::Serialize,
        types::{KeyTrait, KeyVersion, SecretKeyTrait},
        Signature, SignedSecretKey,
    },
    smallvec::SmallVec,
};

/// Resolve the header-only and header+payload signature tags for a key algorithm.
///
/// RSA keys use `RSAHEADER` and `PGP`. DSA, ECDSA and legacy EdDSA keys use
/// `DSAHEADER` and `GPG`.
pub fn signature_tags(algorithm: PublicKeyAlgorithm) -> Result<(SignatureTag, SignatureTag)> {
    match algorithm as u8 {
        1 | 2 | 3 => Ok((SignatureTag::RsaHeader, SignatureTag::Pgp)),
        17 | 19 | 22 => Ok((SignatureTag::DsaHeader, SignatureTag::Gpg)),
        id => Err(RpmError::Unsupported(format!(
            "signing with public key algorithm {}",
            id
        ))),
    }
}

/// Signs packages with an OpenPGP secret key.
pub struct PgpSignatureProcessor<'key> {
    key: &'key SignedSecretKey,
    passphrase: Box<dyn Fn() -> String + 'key>,
    hash_algorithm: HashAlgorithm,
    created: DateTime<Utc>,
    header_tag: SignatureTag,
    full_tag: SignatureTag,
    header_hasher: Box<dyn Hasher>,
    full_hasher: Box<dyn Hasher>,
}

impl<'key> PgpSignatureProcessor<'key> {
    /// Construct a new instance.
    ///
    /// `passphrase` unlocks the secret key. `created` is recorded as the
    /// signature creation time.
    pub fn new(
        key: &'key SignedSecretKey,
        passphrase: impl Fn() -> String + 'key,
        hash_algorithm: HashAlgorithm,
        created: DateTime<Utc>,
    ) -> Result<Self> {
        let (header_tag, full_tag) = signature_tags(key.algorithm())?;

        Ok(Self {
            key,
            passphrase: Box::new(passphrase),
            hash_algorithm,
            created: created.trunc_subsecs(0),
            header_tag,
            full_tag,
            header_hasher: hash_algorithm.new_hasher()?,
            full_hasher: hash_algorithm.new_hasher()?,
        })
    }

    fn sign(&self, mut hasher: Box<dyn Hasher>) -> Result<Vec<u8>> {
        let hashed_subpackets = vec![
            Subpacket::IssuerFingerprint(
                KeyVersion::V4,
                SmallVec::from_slice(&self.key.fingerprint()),
            ),
            Subpacket::SignatureCreationTime(self.created),
        ];
        let unhashed_subpackets = vec![Subpacket::Issuer(self.key.key_id())];

        let config = SignatureConfig::new_v4(
            Default::default(),
            SignatureType::Binary,
            self.key.algorithm(),
            self.hash_algorithm,
            hashed_subpackets,
            unhashed_subpackets,
        );

        let len = config.hash_signature_data(&mut *hasher)?;
        hasher.update(&config.trailer(len));
        let digest = hasher.finish();

        let mpis = self
            .key
            .create_signature(|| (self.passphrase)(), self.hash_algorithm, &digest)?;
        let signature = Signature::from_config(config, [digest[0], digest[1]], mpis);

        Ok(Packet::Signature(signature).to_bytes()?)
    }
}

impl<'key> SignatureProcessor for PgpSignatureProcessor<'key> {
    fn feed_header(&mut self, data: &[u8]) {
        self.header_hasher.update(data);
        self.full_hasher.update(data);
    }

    fn feed_payload_data(&mut self, data: &[u8]) {
        self.full_hasher.update(data);
    }

    fn finish(self: Box<Self>, header: &mut Header<SignatureTag>) -> Result<()> {
        let mut this = *self;

        let header_hasher = std::mem::replace(
            &mut this.header_hasher,
            this.hash_algorithm.new_hasher()?,
        );
        let full_hasher =
            std::mem::replace(&mut this.full_hasher, this.hash_algorithm.new_hasher()?);

        let header_signature = this.sign(header_hasher)?;
        let full_signature = this.sign(full_hasher)?;

        debug!(
            "signed package with key {}",
            hex::encode_upper(this.key.key_id().as_ref())
        );

        header.set(this.header_tag, HeaderValue::Bin(header_signature))?;
        header.set(this.full_tag, HeaderValue::Bin(full_signature))?;

        Ok(())
    }
}
