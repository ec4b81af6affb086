//! OpenSSL "traditional" PEM encryption (`Proc-Type: 4,ENCRYPTED` + `DEK-Info`).

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::{BlockCipher, BlockDecryptMut, KeyInit, KeyIvInit, block_padding::Pkcs7};
use des::{Des, TdesEde2, TdesEde3};
use md5::{Digest, Md5};
use pkcs8::der::{Decode, asn1::SequenceRef};
use zeroize::Zeroizing;

use super::{EncryptedKeyPair, KeyPair};
use crate::error::KeyDecryptionError;

/// Ciphers accepted in a `DEK-Info` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyCipher {
    Aes128Cbc,
    Aes192Cbc,
    Aes256Cbc,
    DesEde3Cbc,
    DesEdeCbc,
    DesCbc,
}

impl LegacyCipher {
    pub fn from_name(name: &str) -> Option<Self> {
        let cipher = match name.to_ascii_uppercase().as_str() {
            "AES-128-CBC" => Self::Aes128Cbc,
            "AES-192-CBC" => Self::Aes192Cbc,
            "AES-256-CBC" => Self::Aes256Cbc,
            "DES-EDE3-CBC" => Self::DesEde3Cbc,
            "DES-EDE-CBC" => Self::DesEdeCbc,
            "DES-CBC" => Self::DesCbc,
            _ => return None,
        };

        Some(cipher)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Aes128Cbc => "AES-128-CBC",
            Self::Aes192Cbc => "AES-192-CBC",
            Self::Aes256Cbc => "AES-256-CBC",
            Self::DesEde3Cbc => "DES-EDE3-CBC",
            Self::DesEdeCbc => "DES-EDE-CBC",
            Self::DesCbc => "DES-CBC",
        }
    }

    fn key_len(self) -> usize {
        match self {
            Self::Aes128Cbc | Self::DesEdeCbc => 16,
            Self::Aes192Cbc | Self::DesEde3Cbc => 24,
            Self::Aes256Cbc => 32,
            Self::DesCbc => 8,
        }
    }

    fn iv_len(self) -> usize {
        match self {
            Self::Aes128Cbc | Self::Aes192Cbc | Self::Aes256Cbc => 16,
            Self::DesEde3Cbc | Self::DesEdeCbc | Self::DesCbc => 8,
        }
    }

    fn decrypt(
        self,
        key: &[u8],
        iv: &[u8],
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, KeyDecryptionError> {
        match self {
            Self::Aes128Cbc => decrypt_cbc::<Aes128>(key, iv, ciphertext),
            Self::Aes192Cbc => decrypt_cbc::<Aes192>(key, iv, ciphertext),
            Self::Aes256Cbc => decrypt_cbc::<Aes256>(key, iv, ciphertext),
            Self::DesEde3Cbc => decrypt_cbc::<TdesEde3>(key, iv, ciphertext),
            Self::DesEdeCbc => decrypt_cbc::<TdesEde2>(key, iv, ciphertext),
            Self::DesCbc => decrypt_cbc::<Des>(key, iv, ciphertext),
        }
    }
}

impl EncryptedKeyPair {
    /// Decrypts the key pair with `passphrase`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the `DEK-Info` cipher is not supported
    /// - the IV does not fit the cipher
    /// - the padding or the decrypted DER structure is invalid, which is what a wrong
    ///   passphrase looks like
    pub fn decrypt(&self, passphrase: &str) -> Result<KeyPair, KeyDecryptionError> {
        let cipher = LegacyCipher::from_name(&self.cipher)
            .ok_or_else(|| KeyDecryptionError::UnsupportedCipher(self.cipher.clone()))?;

        if self.iv.len() != cipher.iv_len() {
            return Err(KeyDecryptionError::InvalidIv {
                cipher: cipher.name(),
                actual: self.iv.len(),
            });
        }

        let key = bytes_to_key(passphrase.as_bytes(), &self.iv[..8], cipher.key_len());
        let der = cipher.decrypt(&key, &self.iv, &self.ciphertext)?;

        // Roughly one wrong passphrase in 256 still yields valid padding.
        if SequenceRef::from_der(&der).is_err() {
            return Err(KeyDecryptionError::BadDecrypt);
        }

        Ok(KeyPair {
            algorithm: self.algorithm,
            der,
        })
    }
}

/// OpenSSL `EVP_BytesToKey` with MD5 and a single iteration.
fn bytes_to_key(passphrase: &[u8], salt: &[u8], len: usize) -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(Vec::with_capacity(len + 16));
    let mut block = Zeroizing::new(Vec::new());

    while key.len() < len {
        let mut hasher = Md5::new();
        hasher.update(block.as_slice());
        hasher.update(passphrase);
        hasher.update(salt);
        *block = hasher.finalize().to_vec();
        key.extend_from_slice(&block);
    }

    key.truncate(len);
    key
}

pub(super) fn decrypt_cbc<C>(
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, KeyDecryptionError>
where
    C: BlockCipher + BlockDecryptMut + KeyInit,
{
    let decryptor =
        cbc::Decryptor::<C>::new_from_slices(key, iv).map_err(|_| KeyDecryptionError::BadDecrypt)?;

    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| KeyDecryptionError::BadDecrypt)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::scanner::{KeyAlgorithm, PemEntry, scan};

    const PASSPHRASE: &str = "changeit";

    fn encrypted(text: &str) -> EncryptedKeyPair {
        match scan(text).next() {
            Some(Ok(PemEntry::EncryptedKeyPair(key))) => key,
            other => panic!("expected an encrypted key pair, got {other:?}"),
        }
    }

    fn plain(text: &str) -> KeyPair {
        match scan(text).next() {
            Some(Ok(PemEntry::KeyPair(key))) => key,
            other => panic!("expected a key pair, got {other:?}"),
        }
    }

    #[rstest]
    #[case::aes256(
        include_str!("../../testdata/client-rsa-aes256.key"),
        include_str!("../../testdata/client-rsa.key"),
    )]
    #[case::des3(
        include_str!("../../testdata/client-rsa-des3.key"),
        include_str!("../../testdata/client-rsa.key"),
    )]
    #[case::des_ede(
        include_str!("../../testdata/client-rsa-des-ede.key"),
        include_str!("../../testdata/client-rsa.key"),
    )]
    #[case::ec_aes128(
        include_str!("../../testdata/ec-sec1-aes128.key"),
        include_str!("../../testdata/ec-sec1.key"),
    )]
    fn decrypts_to_the_plain_key(#[case] encrypted_pem: &str, #[case] plain_pem: &str) {
        let decrypted = encrypted(encrypted_pem).decrypt(PASSPHRASE).unwrap();
        let expected = plain(plain_pem);

        assert_eq!(decrypted.algorithm, expected.algorithm);
        assert_eq!(decrypted.der, expected.der);
    }

    #[test]
    fn wrong_passphrase_is_a_bad_decrypt() {
        let key = encrypted(include_str!("../../testdata/client-rsa-aes256.key"));

        assert!(matches!(
            key.decrypt("not-the-passphrase"),
            Err(KeyDecryptionError::BadDecrypt)
        ));
    }

    #[rstest]
    #[case("CAMELLIA-128-CBC")]
    #[case("BF-CBC")]
    #[case("AES-256-CFB")]
    #[case("AES-128-OFB")]
    fn unknown_cipher_is_rejected(#[case] cipher: &str) {
        let key = EncryptedKeyPair {
            algorithm: KeyAlgorithm::Rsa,
            cipher: cipher.to_owned(),
            iv: vec![0; 16],
            ciphertext: vec![0; 32],
        };

        assert!(matches!(
            key.decrypt(PASSPHRASE),
            Err(KeyDecryptionError::UnsupportedCipher(name)) if name == cipher
        ));
    }

    #[test]
    fn iv_length_must_match_the_cipher() {
        let key = EncryptedKeyPair {
            algorithm: KeyAlgorithm::Rsa,
            cipher: "AES-128-CBC".to_owned(),
            iv: vec![0; 8],
            ciphertext: vec![0; 32],
        };

        assert!(matches!(
            key.decrypt(PASSPHRASE),
            Err(KeyDecryptionError::InvalidIv { actual: 8, .. })
        ));
    }

    #[test]
    fn bytes_to_key_matches_openssl() {
        // openssl enc -aes-128-cbc -pass pass:password -S 0102030405060708 -md md5 -P
        let key = bytes_to_key(b"password", &[1, 2, 3, 4, 5, 6, 7, 8], 16);
        assert_eq!(
            hex::encode(key.as_slice()),
            "e7b0971e52ca5cc8d0539fb3412f6316"
        );
    }
}
