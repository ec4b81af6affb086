//! Password based encryption of PKCS#8 `EncryptedPrivateKeyInfo`.
//!
//! PBES2 is handed to the `pkcs8` crate. PBES1 (PKCS#5 v1.5) and the PKCS#12 `pbeWithSHAAnd*`
//! schemes are decrypted here.

use cbc::cipher::{BlockDecryptMut, InnerIvInit, block_padding::Pkcs7};
use der::asn1::{ObjectIdentifier, OctetStringRef};
use der::{Decode, Sequence};
use des::{Des, TdesEde2, TdesEde3};
use md5::Md5;
use pkcs8::AlgorithmIdentifierRef;
use rc2::Rc2;
use rustls::pki_types::PrivatePkcs8KeyDer;
use sha1::{Digest, Sha1};
use zeroize::Zeroizing;

use super::EncryptedPrivateKeyInfo;
use super::legacy::decrypt_cbc;
use crate::error::KeyDecryptionError;

const PBES2: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.5.13");

const PBE_MD5_DES_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.5.3");
const PBE_MD5_RC2_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.5.6");
const PBE_SHA1_DES_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.5.10");
const PBE_SHA1_RC2_CBC: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.5.11");

const PBE_SHA_3KEY_TDES_CBC: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.12.1.3");
const PBE_SHA_2KEY_TDES_CBC: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.12.1.4");
const PBE_SHA_RC2_128_CBC: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.12.1.5");
const PBE_SHA_RC2_40_CBC: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.12.1.6");

/// PKCS#12 key derivation diversifiers.
const PKCS12_KEY_ID: u8 = 1;
const PKCS12_IV_ID: u8 = 2;

/// Block size of every cipher used by the PBES1 and PKCS#12 schemes.
const IV_LEN: usize = 8;

#[derive(Sequence)]
struct EncryptedKeyInfo<'a> {
    encryption_algorithm: AlgorithmIdentifierRef<'a>,
    encrypted_data: OctetStringRef<'a>,
}

/// `PBEParameter` (PKCS#5) and `pkcs-12PbeParams` share this shape.
#[derive(Sequence)]
struct PbeParameters<'a> {
    salt: OctetStringRef<'a>,
    iterations: u32,
}

/// Password based encryption schemes that predate PBES2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PbeScheme {
    /// `pbeWithMD5AndDES-CBC`
    Md5DesCbc,
    /// `pbeWithMD5AndRC2-CBC`
    Md5Rc2Cbc,
    /// `pbeWithSHA1AndDES-CBC`
    Sha1DesCbc,
    /// `pbeWithSHA1AndRC2-CBC`
    Sha1Rc2Cbc,
    /// `pbeWithSHAAnd3-KeyTripleDES-CBC`
    Pkcs12TdesEde3Cbc,
    /// `pbeWithSHAAnd2-KeyTripleDES-CBC`
    Pkcs12TdesEde2Cbc,
    /// `pbeWithSHAAnd128BitRC2-CBC`
    Pkcs12Rc2Cbc128,
    /// `pbeWithSHAAnd40BitRC2-CBC`
    Pkcs12Rc2Cbc40,
}

impl PbeScheme {
    pub fn from_oid(oid: ObjectIdentifier) -> Option<Self> {
        const SCHEMES: [(ObjectIdentifier, PbeScheme); 8] = [
            (PBE_MD5_DES_CBC, PbeScheme::Md5DesCbc),
            (PBE_MD5_RC2_CBC, PbeScheme::Md5Rc2Cbc),
            (PBE_SHA1_DES_CBC, PbeScheme::Sha1DesCbc),
            (PBE_SHA1_RC2_CBC, PbeScheme::Sha1Rc2Cbc),
            (PBE_SHA_3KEY_TDES_CBC, PbeScheme::Pkcs12TdesEde3Cbc),
            (PBE_SHA_2KEY_TDES_CBC, PbeScheme::Pkcs12TdesEde2Cbc),
            (PBE_SHA_RC2_128_CBC, PbeScheme::Pkcs12Rc2Cbc128),
            (PBE_SHA_RC2_40_CBC, PbeScheme::Pkcs12Rc2Cbc40),
        ];

        SCHEMES
            .iter()
            .find(|(known, _)| *known == oid)
            .map(|&(_, scheme)| scheme)
    }

    fn key_len(self) -> usize {
        match self {
            Self::Md5DesCbc | Self::Md5Rc2Cbc | Self::Sha1DesCbc | Self::Sha1Rc2Cbc => 8,
            Self::Pkcs12TdesEde3Cbc => 24,
            Self::Pkcs12TdesEde2Cbc | Self::Pkcs12Rc2Cbc128 => 16,
            Self::Pkcs12Rc2Cbc40 => 5,
        }
    }

    /// Derives the key and IV. PBES1 splits one PBKDF1 output, PKCS#12 derives them separately.
    fn derive(
        self,
        passphrase: &str,
        salt: &[u8],
        iterations: u32,
    ) -> (Zeroizing<Vec<u8>>, Zeroizing<Vec<u8>>) {
        let derived = match self {
            Self::Md5DesCbc | Self::Md5Rc2Cbc => pbkdf1::<Md5>(passphrase, salt, iterations),
            Self::Sha1DesCbc | Self::Sha1Rc2Cbc => pbkdf1::<Sha1>(passphrase, salt, iterations),
            Self::Pkcs12TdesEde3Cbc
            | Self::Pkcs12TdesEde2Cbc
            | Self::Pkcs12Rc2Cbc128
            | Self::Pkcs12Rc2Cbc40 => {
                let key = pkcs12_kdf(passphrase, salt, PKCS12_KEY_ID, iterations, self.key_len());
                let iv = pkcs12_kdf(passphrase, salt, PKCS12_IV_ID, iterations, IV_LEN);
                return (key, iv);
            }
        };

        let (key, iv) = derived.split_at(self.key_len());
        (Zeroizing::new(key.to_vec()), Zeroizing::new(iv.to_vec()))
    }

    fn decrypt(
        self,
        passphrase: &str,
        parameters: &PbeParameters<'_>,
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, KeyDecryptionError> {
        let (key, iv) = self.derive(
            passphrase,
            parameters.salt.as_bytes(),
            parameters.iterations,
        );

        match self {
            Self::Md5DesCbc | Self::Sha1DesCbc => decrypt_cbc::<Des>(&key, &iv, ciphertext),
            Self::Pkcs12TdesEde3Cbc => decrypt_cbc::<TdesEde3>(&key, &iv, ciphertext),
            Self::Pkcs12TdesEde2Cbc => decrypt_cbc::<TdesEde2>(&key, &iv, ciphertext),
            Self::Md5Rc2Cbc | Self::Sha1Rc2Cbc | Self::Pkcs12Rc2Cbc128 | Self::Pkcs12Rc2Cbc40 => {
                decrypt_rc2(&key, &iv, ciphertext)
            }
        }
    }
}

impl EncryptedPrivateKeyInfo {
    /// Decrypts with the scheme named by the structure's own algorithm identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the structure is not valid DER
    /// - the scheme is neither PBES2, PBES1 nor a PKCS#12 PBE scheme with a block cipher
    /// - the passphrase is wrong or the data is corrupt
    pub fn decrypt(
        &self,
        passphrase: &str,
    ) -> Result<PrivatePkcs8KeyDer<'static>, KeyDecryptionError> {
        let info = EncryptedKeyInfo::from_der(&self.der).map_err(pkcs8::Error::from)?;
        let algorithm = info.encryption_algorithm;

        let der = if algorithm.oid == PBES2 {
            let info = pkcs8::EncryptedPrivateKeyInfo::try_from(self.der.as_slice())
                .map_err(pkcs8::Error::from)?;
            Zeroizing::new(info.decrypt(passphrase.as_bytes())?.as_bytes().to_vec())
        } else {
            let scheme = PbeScheme::from_oid(algorithm.oid)
                .ok_or_else(|| KeyDecryptionError::UnsupportedScheme(algorithm.oid.to_string()))?;
            let parameters = algorithm
                .parameters
                .ok_or(pkcs8::Error::ParametersMalformed)?
                .decode_as::<PbeParameters<'_>>()
                .map_err(pkcs8::Error::from)?;

            scheme.decrypt(passphrase, &parameters, info.encrypted_data.as_bytes())?
        };

        if pkcs8::PrivateKeyInfo::try_from(der.as_slice()).is_err() {
            return Err(KeyDecryptionError::BadDecrypt);
        }

        Ok(PrivatePkcs8KeyDer::from(der.to_vec()))
    }
}

/// PKCS#5 PBKDF1, returning the whole 16 bytes needed for an 8 byte key and IV.
fn pbkdf1<D: Digest>(passphrase: &str, salt: &[u8], iterations: u32) -> Zeroizing<Vec<u8>> {
    let mut block = D::new()
        .chain_update(passphrase.as_bytes())
        .chain_update(salt)
        .finalize();
    for _ in 1..iterations {
        block = D::digest(&block);
    }

    Zeroizing::new(block[..2 * IV_LEN].to_vec())
}

/// PKCS#12 key derivation (RFC 7292, appendix B) with SHA-1.
fn pkcs12_kdf(
    passphrase: &str,
    salt: &[u8],
    id: u8,
    iterations: u32,
    len: usize,
) -> Zeroizing<Vec<u8>> {
    const BLOCK: usize = 64;

    // BMPString with a trailing NUL.
    let password = Zeroizing::new(
        passphrase
            .encode_utf16()
            .chain([0])
            .flat_map(u16::to_be_bytes)
            .collect::<Vec<u8>>(),
    );

    let fill = |data: &[u8]| {
        let len = data.len().div_ceil(BLOCK) * BLOCK;
        data.iter().copied().cycle().take(len).collect::<Vec<u8>>()
    };
    let mut input = Zeroizing::new(fill(salt));
    input.extend(fill(password.as_slice()));

    let mut output = Zeroizing::new(Vec::with_capacity(len + 20));
    while output.len() < len {
        let mut block = Sha1::new()
            .chain_update([id; BLOCK])
            .chain_update(input.as_slice())
            .finalize();
        for _ in 1..iterations {
            block = Sha1::digest(block);
        }
        output.extend_from_slice(&block);

        // I_j = (I_j + B + 1) mod 2^512 for every 64 byte chunk of the input.
        let addend = block.iter().copied().cycle().take(BLOCK).collect::<Vec<u8>>();
        for chunk in input.chunks_mut(BLOCK) {
            let mut carry = 1u16;
            for (byte, add) in chunk.iter_mut().zip(&addend).rev() {
                let sum = u16::from(*byte) + u16::from(*add) + carry;
                *byte = sum as u8;
                carry = sum >> 8;
            }
        }
    }

    output.truncate(len);
    output
}

/// RC2 in CBC mode with an effective key length equal to the key length.
fn decrypt_rc2(
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, KeyDecryptionError> {
    let cipher = Rc2::new_with_eff_key_len(key, key.len() * 8);
    let decryptor = cbc::Decryptor::<Rc2>::inner_iv_slice_init(cipher, iv)
        .map_err(|_| KeyDecryptionError::BadDecrypt)?;

    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| KeyDecryptionError::BadDecrypt)
}
