// Wallet-level libraries for bitcoin protocol by LNP/BP Association
//
// Written in 2020-2022 by
//     Dr. Maxim Orlovsky <orlovsky@lnp-bp.org>
//
// This software is distributed without any warranty.
//
// You should have received a copy of the Apache-2.0 License
// along with this software.
// If not, see <https://opensource.org/licenses/Apache-2.0>.

//! Extended private and public keys: master derivation from a seed, normal
//! and hardened child derivation, BIP32 binary layout and Base58Check
//! import/export.
//!
//! Keys do not store any network information; the network is provided as an
//! explicit argument at each (de)serialization call.

use std::borrow::Borrow;

use amplify::{Bytes20, Bytes32, Bytes4};
use bitcoin_hashes::{hash160, sha512, Hash, HashEngine, Hmac, HmacEngine};
use secp256k1::{PublicKey, Scalar, SecretKey, XOnlyPublicKey, SECP256K1};

use crate::index::{DerivationIndex, Idx, NormalIndex};
use crate::network::{
    wif_encode, Network, VERSION_MAGIC_TPRV, VERSION_MAGIC_TPUB, VERSION_MAGIC_XPRV,
    VERSION_MAGIC_XPUB,
};

/// Errors in master key generation from seed entropy.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum SeedError {
    /// seed length {0} is outside of the allowed 16 to 64 byte range.
    WrongSeedLength(usize),

    /// the seed produced an invalid master secret key; a different seed must
    /// be used.
    InvalidEntropy,
}

/// Errors in child key derivation.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum DeriveError {
    /// derivation at child number {0:#010x} produced an invalid key; the
    /// caller should skip to the next index.
    InvalidChild(u32),

    /// derivation depth exceeds the BIP32 limit of 255.
    DepthOverflow,
}

/// Errors in parsing the 78-byte binary form of extended keys.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum XkeyDecodeError {
    /// wrong length of extended key data ({0}).
    WrongExtendedKeyLength(usize),

    /// extended key version magic {0:#06X?} does not match the requested
    /// network and key type.
    VersionMismatch([u8; 4]),

    /// provided data is not a BIP32 extended key (unknown version magic
    /// {0:#06X?}).
    UnknownKeyType([u8; 4]),

    /// xpriv contains invalid byte for the secret key type ({0:#04x}) which
    /// must be set to zero.
    InvalidType(u8),

    /// xpriv secret key value is zero or overflows the group order.
    InvalidSecretKey,

    /// extended pubkey contains an invalid public key value.
    InvalidPublicKey,
}

/// Errors in parsing the Base58Check string form of extended keys.
#[derive(Clone, Eq, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum XkeyParseError {
    /// wrong Base58 encoding of extended key data. Details: {0}
    #[from]
    Base58(base58::Error),

    /// Error in the decoded key data.
    #[display(inner)]
    #[from]
    Decode(XkeyDecodeError),
}

/// BIP32 chain code used for hierarchical derivation
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
#[derive(Wrapper, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, From)]
#[wrapper(Deref, RangeOps)]
pub struct ChainCode(Bytes32);

impl AsRef<[u8]> for ChainCode {
    fn as_ref(&self) -> &[u8] { self.0.as_ref() }
}

impl From<[u8; 32]> for ChainCode {
    fn from(value: [u8; 32]) -> Self { Self(value.into()) }
}

impl From<ChainCode> for [u8; 32] {
    fn from(value: ChainCode) -> Self { value.0.to_byte_array() }
}

/// Extended key fingerprint: the first four bytes of the key identifier.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
#[derive(Wrapper, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug, Display, From)]
#[wrapper(RangeOps, Hex, FromStr)]
#[display(LowerHex)]
pub struct XpubFp(
    #[from]
    #[from([u8; 4])]
    Bytes4,
);

impl AsRef<[u8]> for XpubFp {
    fn as_ref(&self) -> &[u8] { self.0.as_ref() }
}

impl From<XpubFp> for [u8; 4] {
    fn from(value: XpubFp) -> Self { value.0.to_byte_array() }
}

impl XpubFp {
    /// Fingerprint put into the parent slot of a master key (all zeros).
    pub const fn master() -> Self { Self(Bytes4::zero()) }
}

/// Extended key identifier: `RIPEMD160(SHA256(serialized public key))`.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
#[derive(Wrapper, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug, Display, From)]
#[wrapper(RangeOps, Hex, FromStr)]
#[display(LowerHex)]
pub struct XpubId(
    #[from]
    #[from([u8; 20])]
    Bytes20,
);

impl AsRef<[u8]> for XpubId {
    fn as_ref(&self) -> &[u8] { self.0.as_ref() }
}

impl From<XpubId> for [u8; 20] {
    fn from(value: XpubId) -> Self { value.0.to_byte_array() }
}

/// Derivation metadata shared between extended private and public keys.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
struct XkeyMeta {
    depth: u8,
    parent_fp: XpubFp,
    child_number: DerivationIndex,
}

impl XkeyMeta {
    const MASTER: XkeyMeta = XkeyMeta {
        depth: 0,
        parent_fp: XpubFp::master(),
        child_number: DerivationIndex::Normal(NormalIndex::ZERO),
    };

    fn child(&self, parent_fp: XpubFp, child_number: DerivationIndex) -> Result<Self, DeriveError> {
        let depth = self.depth.checked_add(1).ok_or(DeriveError::DepthOverflow)?;
        Ok(XkeyMeta {
            depth,
            parent_fp,
            child_number,
        })
    }
}

/// Extended private key.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Xpriv {
    meta: XkeyMeta,
    private_key: SecretKey,
    chain_code: ChainCode,
}

/// Extended public key.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct Xpub {
    meta: XkeyMeta,
    public_key: PublicKey,
    chain_code: ChainCode,
}

impl Xpriv {
    /// Constructs a master key from seed entropy, which must be 16 to 64
    /// bytes long.
    pub fn new_master(seed: &[u8]) -> Result<Xpriv, SeedError> {
        if seed.len() < 16 || seed.len() > 64 {
            return Err(SeedError::WrongSeedLength(seed.len()));
        }
        let mut hmac_engine: HmacEngine<sha512::Hash> = HmacEngine::new(b"Bitcoin seed");
        hmac_engine.input(seed);
        let hmac = Hmac::from_engine(hmac_engine).to_byte_array();

        let private_key =
            SecretKey::from_slice(&hmac[..32]).map_err(|_| SeedError::InvalidEntropy)?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&hmac[32..]);

        Ok(Xpriv {
            meta: XkeyMeta::MASTER,
            private_key,
            chain_code: chain_code.into(),
        })
    }

    /// Number of derivation steps from the master key.
    #[inline]
    pub fn depth(&self) -> u8 { self.meta.depth }

    /// Fingerprint of the parent key (all zeros for the master key).
    #[inline]
    pub fn parent_fp(&self) -> XpubFp { self.meta.parent_fp }

    /// Child number under which this key was derived from its parent.
    #[inline]
    pub fn child_number(&self) -> DerivationIndex { self.meta.child_number }

    /// BIP32 chain code.
    #[inline]
    pub fn chain_code(&self) -> ChainCode { self.chain_code }

    /// Returns the inner secret key.
    #[inline]
    pub fn to_secret_key(&self) -> SecretKey { self.private_key }

    /// Serializes the inner secret key in WIF format with the compressed
    /// flag set.
    #[inline]
    pub fn to_wif(&self, network: Network) -> String { wif_encode(network, &self.private_key) }

    /// Creates the matching extended public key; all non-key fields are
    /// preserved.
    pub fn to_xpub(&self) -> Xpub {
        Xpub {
            meta: self.meta,
            public_key: PublicKey::from_secret_key(SECP256K1, &self.private_key),
            chain_code: self.chain_code,
        }
    }

    /// Returns the key identifier of the matching public key.
    #[inline]
    pub fn identifier(&self) -> XpubId { self.to_xpub().identifier() }

    /// Returns the first four bytes of the key identifier.
    #[inline]
    pub fn fingerprint(&self) -> XpubFp { self.to_xpub().fingerprint() }

    /// Private-to-private child key derivation, normal or hardened.
    pub fn ckd_priv(&self, idx: impl Into<DerivationIndex>) -> Result<Xpriv, DeriveError> {
        let idx = idx.into();
        let meta = self.meta.child(self.fingerprint(), idx)?;

        let mut hmac_engine: HmacEngine<sha512::Hash> = HmacEngine::new(self.chain_code.as_ref());
        match idx {
            DerivationIndex::Normal(_) => {
                // Normal child: commit to the public key
                hmac_engine.input(
                    &PublicKey::from_secret_key(SECP256K1, &self.private_key).serialize(),
                );
            }
            DerivationIndex::Hardened(_) => {
                // Hardened child: only secret data enter the commitment,
                // preventing public derivation
                hmac_engine.input(&[0u8]);
                hmac_engine.input(&self.private_key.secret_bytes());
            }
        }
        hmac_engine.input(&idx.to_derivation_value().to_be_bytes());
        let hmac = Hmac::from_engine(hmac_engine).to_byte_array();

        let tweak = SecretKey::from_slice(&hmac[..32])
            .map_err(|_| DeriveError::InvalidChild(idx.to_derivation_value()))?;
        let private_key = tweak
            .add_tweak(&self.private_key.into())
            .map_err(|_| DeriveError::InvalidChild(idx.to_derivation_value()))?;

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&hmac[32..]);

        Ok(Xpriv {
            meta,
            private_key,
            chain_code: chain_code.into(),
        })
    }

    /// Derives an extended private key along the given path, folding from
    /// the outermost to the innermost segment.
    pub fn derive_priv<I: Into<DerivationIndex>>(
        &self,
        path: impl IntoIterator<Item = I>,
    ) -> Result<Xpriv, DeriveError> {
        let mut xpriv = *self;
        for idx in path {
            xpriv = xpriv.ckd_priv(idx.into())?;
        }
        Ok(xpriv)
    }

    /// Parses the BIP32 binary form, verifying the version magic against the
    /// requested network.
    pub fn decode(network: Network, data: impl Borrow<[u8]>) -> Result<Xpriv, XkeyDecodeError> {
        let data = data.borrow();
        if data.len() != 78 {
            return Err(XkeyDecodeError::WrongExtendedKeyLength(data.len()));
        }

        check_version(&data[0..4], network.xprv_magic())?;
        let meta = decode_meta(data);

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);

        if data[45] != 0x00 {
            return Err(XkeyDecodeError::InvalidType(data[45]));
        }
        let private_key =
            SecretKey::from_slice(&data[46..78]).map_err(|_| XkeyDecodeError::InvalidSecretKey)?;

        Ok(Xpriv {
            meta,
            private_key,
            chain_code: chain_code.into(),
        })
    }

    /// Serializes the key into the 78-byte BIP32 binary form under the
    /// version magic of the given network.
    pub fn encode(&self, network: Network) -> [u8; 78] {
        let mut ret = [0u8; 78];
        ret[0..4].copy_from_slice(&network.xprv_magic());
        encode_meta(&mut ret, &self.meta);
        ret[13..45].copy_from_slice(self.chain_code.as_ref());
        ret[45] = 0;
        ret[46..78].copy_from_slice(&self.private_key.secret_bytes());
        ret
    }

    /// Exports the key as a Base58Check string (`xprv…`/`tprv…`).
    pub fn to_base58(&self, network: Network) -> String {
        base58::encode_check(&self.encode(network))
    }

    /// Imports the key from a Base58Check string, verifying the version
    /// magic against the requested network.
    pub fn from_base58(network: Network, s: &str) -> Result<Xpriv, XkeyParseError> {
        let data = base58::decode_check(s)?;
        Ok(Xpriv::decode(network, data)?)
    }
}

impl Xpub {
    /// Number of derivation steps from the master key.
    #[inline]
    pub fn depth(&self) -> u8 { self.meta.depth }

    /// Fingerprint of the parent key (all zeros for the master key).
    #[inline]
    pub fn parent_fp(&self) -> XpubFp { self.meta.parent_fp }

    /// Child number under which this key was derived from its parent.
    #[inline]
    pub fn child_number(&self) -> DerivationIndex { self.meta.child_number }

    /// BIP32 chain code.
    #[inline]
    pub fn chain_code(&self) -> ChainCode { self.chain_code }

    /// Returns the inner public key.
    #[inline]
    pub fn to_public_key(&self) -> PublicKey { self.public_key }

    /// Returns the BIP340 x-only projection of the inner public key.
    #[inline]
    pub fn to_xonly_pk(&self) -> XOnlyPublicKey { XOnlyPublicKey::from(self.public_key) }

    /// Returns the key identifier (HASH160 of the serialized public key).
    pub fn identifier(&self) -> XpubId {
        let hash = hash160::Hash::hash(&self.public_key.serialize());
        XpubId::from(hash.to_byte_array())
    }

    /// Returns the first four bytes of the key identifier.
    pub fn fingerprint(&self) -> XpubFp {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.identifier()[..4]);
        XpubFp::from(bytes)
    }

    /// Computes the scalar tweak and the child chain code for a normal child
    /// of this key.
    pub fn ckd_pub_tweak(
        &self,
        child_no: NormalIndex,
    ) -> Result<(Scalar, ChainCode), DeriveError> {
        let mut hmac_engine: HmacEngine<sha512::Hash> = HmacEngine::new(self.chain_code.as_ref());
        hmac_engine.input(&self.public_key.serialize());
        hmac_engine.input(&child_no.to_derivation_value().to_be_bytes());
        let hmac = Hmac::from_engine(hmac_engine).to_byte_array();

        let tweak = SecretKey::from_slice(&hmac[..32])
            .map_err(|_| DeriveError::InvalidChild(child_no.index()))?;
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&hmac[32..]);
        Ok((tweak.into(), chain_code.into()))
    }

    /// Public-to-public child key derivation; only normal children can be
    /// derived this way.
    pub fn ckd_pub(&self, child_no: NormalIndex) -> Result<Xpub, DeriveError> {
        let meta = self.meta.child(self.fingerprint(), child_no.into())?;
        let (tweak, chain_code) = self.ckd_pub_tweak(child_no)?;
        let public_key = self
            .public_key
            .add_exp_tweak(SECP256K1, &tweak)
            .map_err(|_| DeriveError::InvalidChild(child_no.index()))?;

        Ok(Xpub {
            meta,
            public_key,
            chain_code,
        })
    }

    /// Derives an extended public key along a path of normal indexes.
    pub fn derive_pub<I: Into<NormalIndex>>(
        &self,
        path: impl IntoIterator<Item = I>,
    ) -> Result<Xpub, DeriveError> {
        let mut xpub = *self;
        for idx in path {
            xpub = xpub.ckd_pub(idx.into())?;
        }
        Ok(xpub)
    }

    /// Parses the BIP32 binary form, verifying the version magic against the
    /// requested network.
    pub fn decode(network: Network, data: impl Borrow<[u8]>) -> Result<Xpub, XkeyDecodeError> {
        let data = data.borrow();
        if data.len() != 78 {
            return Err(XkeyDecodeError::WrongExtendedKeyLength(data.len()));
        }

        check_version(&data[0..4], network.xpub_magic())?;
        let meta = decode_meta(data);

        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&data[13..45]);

        let public_key = PublicKey::from_slice(&data[45..78])
            .map_err(|_| XkeyDecodeError::InvalidPublicKey)?;

        Ok(Xpub {
            meta,
            public_key,
            chain_code: chain_code.into(),
        })
    }

    /// Serializes the key into the 78-byte BIP32 binary form under the
    /// version magic of the given network.
    pub fn encode(&self, network: Network) -> [u8; 78] {
        let mut ret = [0u8; 78];
        ret[0..4].copy_from_slice(&network.xpub_magic());
        encode_meta(&mut ret, &self.meta);
        ret[13..45].copy_from_slice(self.chain_code.as_ref());
        ret[45..78].copy_from_slice(&self.public_key.serialize());
        ret
    }

    /// Exports the key as a Base58Check string (`xpub…`/`tpub…`).
    pub fn to_base58(&self, network: Network) -> String {
        base58::encode_check(&self.encode(network))
    }

    /// Imports the key from a Base58Check string, verifying the version
    /// magic against the requested network.
    pub fn from_base58(network: Network, s: &str) -> Result<Xpub, XkeyParseError> {
        let data = base58::decode_check(s)?;
        Ok(Xpub::decode(network, data)?)
    }
}

fn check_version(magic: &[u8], expected: [u8; 4]) -> Result<(), XkeyDecodeError> {
    if magic == expected {
        return Ok(());
    }
    let mut found = [0u8; 4];
    found.copy_from_slice(magic);
    match found {
        VERSION_MAGIC_XPRV | VERSION_MAGIC_XPUB | VERSION_MAGIC_TPRV | VERSION_MAGIC_TPUB => {
            Err(XkeyDecodeError::VersionMismatch(found))
        }
        _ => Err(XkeyDecodeError::UnknownKeyType(found)),
    }
}

// Decodes depth, parent fingerprint and child number. Zero-depth keys with
// non-zero parent data are accepted, matching BIP32 import laxness.
fn decode_meta(data: &[u8]) -> XkeyMeta {
    let mut parent_fp = [0u8; 4];
    parent_fp.copy_from_slice(&data[5..9]);
    let mut child_number = [0u8; 4];
    child_number.copy_from_slice(&data[9..13]);
    XkeyMeta {
        depth: data[4],
        parent_fp: parent_fp.into(),
        child_number: DerivationIndex::from_derivation_value(u32::from_be_bytes(child_number)),
    }
}

fn encode_meta(ret: &mut [u8; 78], meta: &XkeyMeta) {
    ret[4] = meta.depth;
    ret[5..9].copy_from_slice(meta.parent_fp.as_ref());
    ret[9..13].copy_from_slice(&meta.child_number.to_derivation_value().to_be_bytes());
}

/// Union of the two extended key kinds for APIs accepting either of them.
#[derive(Copy, Clone, Eq, PartialEq, Debug, From)]
pub enum ExtendedKey {
    /// Extended private key.
    #[from]
    Xpriv(Xpriv),

    /// Extended public key.
    #[from]
    Xpub(Xpub),
}

impl ExtendedKey {
    /// Detects whether the key contains private material.
    #[inline]
    pub fn is_priv(&self) -> bool { matches!(self, ExtendedKey::Xpriv(_)) }

    /// Projects the key onto the public side; for extended public keys this
    /// is an identity operation.
    pub fn to_xpub(&self) -> Xpub {
        match self {
            ExtendedKey::Xpriv(xpriv) => xpriv.to_xpub(),
            ExtendedKey::Xpub(xpub) => *xpub,
        }
    }

    /// Returns the inner extended private key, if present.
    pub fn as_xpriv(&self) -> Option<&Xpriv> {
        match self {
            ExtendedKey::Xpriv(xpriv) => Some(xpriv),
            ExtendedKey::Xpub(_) => None,
        }
    }
}

#[cfg(test)]
mod test {
    use amplify::hex::FromHex;

    use super::*;
    use crate::network::wif_decode;
    use crate::path::DerivationPath;

    fn master(seed_hex: &str) -> Xpriv {
        let seed = Vec::<u8>::from_hex(seed_hex).unwrap();
        Xpriv::new_master(&seed).unwrap()
    }

    fn test_path(seed_hex: &str, path: &str, expected_xpriv: &str, expected_xpub: &str) {
        let master = master(seed_hex);
        let path: DerivationPath = path.parse().unwrap();

        let xpriv = master.derive_priv(&path).unwrap();
        let xpub = xpriv.to_xpub();
        assert_eq!(xpriv.to_base58(Network::Mainnet), expected_xpriv);
        assert_eq!(xpub.to_base58(Network::Mainnet), expected_xpub);

        // step-by-step derivation must agree between private and public
        // sides for every normal segment
        let mut sk = master;
        let mut pk = master.to_xpub();
        for idx in &path {
            sk = sk.ckd_priv(idx).unwrap();
            match NormalIndex::try_from(idx) {
                Ok(normal) => {
                    let pk2 = pk.ckd_pub(normal).unwrap();
                    pk = sk.to_xpub();
                    assert_eq!(pk, pk2);
                }
                Err(_) => pk = sk.to_xpub(),
            }
        }
        assert_eq!(sk, xpriv);
        assert_eq!(pk, xpub);

        // text and binary round-trips
        assert_eq!(
            Xpriv::from_base58(Network::Mainnet, expected_xpriv),
            Ok(xpriv)
        );
        assert_eq!(Xpub::from_base58(Network::Mainnet, expected_xpub), Ok(xpub));
        assert_eq!(
            Xpriv::decode(Network::Mainnet, &xpriv.encode(Network::Mainnet)[..]),
            Ok(xpriv)
        );
        assert_eq!(
            Xpub::decode(Network::Mainnet, &xpub.encode(Network::Mainnet)[..]),
            Ok(xpub)
        );
    }

    #[test]
    fn bip32_vector_1() {
        let seed = "000102030405060708090a0b0c0d0e0f";
        test_path(seed, "m",
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi",
            "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8");
        test_path(seed, "m/0'",
            "xprv9uHRZZhk6KAJC1avXpDAp4MDc3sQKNxDiPvvkX8Br5ngLNv1TxvUxt4cV1rGL5hj6KCesnDYUhd7oWgT11eZG7XnxHrnYeSvkzY7d2bhkJ7",
            "xpub68Gmy5EdvgibQVfPdqkBBCHxA5htiqg55crXYuXoQRKfDBFA1WEjWgP6LHhwBZeNK1VTsfTFUHCdrfp1bgwQ9xv5ski8PX9rL2dZXvgGDnw");
        test_path(seed, "m/0'/1",
            "xprv9wTYmMFdV23N2TdNG573QoEsfRrWKQgWeibmLntzniatZvR9BmLnvSxqu53Kw1UmYPxLgboyZQaXwTCg8MSY3H2EU4pWcQDnRnrVA1xe8fs",
            "xpub6ASuArnXKPbfEwhqN6e3mwBcDTgzisQN1wXN9BJcM47sSikHjJf3UFHKkNAWbWMiGj7Wf5uMash7SyYq527Hqck2AxYysAA7xmALppuCkwQ");
        test_path(seed, "m/0'/1/2'",
            "xprv9z4pot5VBttmtdRTWfWQmoH1taj2axGVzFqSb8C9xaxKymcFzXBDptWmT7FwuEzG3ryjH4ktypQSAewRiNMjANTtpgP4mLTj34bhnZX7UiM",
            "xpub6D4BDPcP2GT577Vvch3R8wDkScZWzQzMMUm3PWbmWvVJrZwQY4VUNgqFJPMM3No2dFDFGTsxxpG5uJh7n7epu4trkrX7x7DogT5Uv6fcLW5");
        test_path(seed, "m/0'/1/2'/2",
            "xprvA2JDeKCSNNZky6uBCviVfJSKyQ1mDYahRjijr5idH2WwLsEd4Hsb2Tyh8RfQMuPh7f7RtyzTtdrbdqqsunu5Mm3wDvUAKRHSC34sJ7in334",
            "xpub6FHa3pjLCk84BayeJxFW2SP4XRrFd1JYnxeLeU8EqN3vDfZmbqBqaGJAyiLjTAwm6ZLRQUMv1ZACTj37sR62cfN7fe5JnJ7dh8zL4fiyLHV");
        test_path(seed, "m/0'/1/2'/2/1000000000",
            "xprvA41z7zogVVwxVSgdKUHDy1SKmdb533PjDz7J6N6mV6uS3ze1ai8FHa8kmHScGpWmj4WggLyQjgPie1rFSruoUihUZREPSL39UNdE3BBDu76",
            "xpub6H1LXWLaKsWFhvm6RVpEL9P4KfRZSW7abD2ttkWP3SSQvnyA8FSVqNTEcYFgJS2UaFcxupHiYkro49S8yGasTvXEYBVPamhGW6cFJodrTHy");
    }

    #[test]
    fn bip32_vector_2() {
        let seed = "fffcf9f6f3f0edeae7e4e1dedbd8d5d2cfccc9c6c3c0bdbab7b4b1aeaba8a5a29f9c999693908d8a8784817e7b7875726f6c696663605d5a5754514e4b484542";
        test_path(seed, "m",
            "xprv9s21ZrQH143K31xYSDQpPDxsXRTUcvj2iNHm5NUtrGiGG5e2DtALGdso3pGz6ssrdK4PFmM8NSpSBHNqPqm55Qn3LqFtT2emdEXVYsCzC2U",
            "xpub661MyMwAqRbcFW31YEwpkMuc5THy2PSt5bDMsktWQcFF8syAmRUapSCGu8ED9W6oDMSgv6Zz8idoc4a6mr8BDzTJY47LJhkJ8UB7WEGuduB");
        test_path(seed, "m/0",
            "xprv9vHkqa6EV4sPZHYqZznhT2NPtPCjKuDKGY38FBWLvgaDx45zo9WQRUT3dKYnjwih2yJD9mkrocEZXo1ex8G81dwSM1fwqWpWkeS3v86pgKt",
            "xpub69H7F5d8KSRgmmdJg2KhpAK8SR3DjMwAdkxj3ZuxV27CprR9LgpeyGmXUbC6wb7ERfvrnKZjXoUmmDznezpbZb7ap6r1D3tgFxHmwMkQTPH");
        test_path(seed, "m/0/2147483647'",
            "xprv9wSp6B7kry3Vj9m1zSnLvN3xH8RdsPP1Mh7fAaR7aRLcQMKTR2vidYEeEg2mUCTAwCd6vnxVrcjfy2kRgVsFawNzmjuHc2YmYRmagcEPdU9",
            "xpub6ASAVgeehLbnwdqV6UKMHVzgqAG8Gr6riv3Fxxpj8ksbH9ebxaEyBLZ85ySDhKiLDBrQSARLq1uNRts8RuJiHjaDMBU4Zn9h8LZNnBC5y4a");
        test_path(seed, "m/0/2147483647'/1",
            "xprv9zFnWC6h2cLgpmSA46vutJzBcfJ8yaJGg8cX1e5StJh45BBciYTRXSd25UEPVuesF9yog62tGAQtHjXajPPdbRCHuWS6T8XA2ECKADdw4Ef",
            "xpub6DF8uhdarytz3FWdA8TvFSvvAh8dP3283MY7p2V4SeE2wyWmG5mg5EwVvmdMVCQcoNJxGoWaU9DCWh89LojfZ537wTfunKau47EL2dhHKon");
        test_path(seed, "m/0/2147483647'/1/2147483646'",
            "xprvA1RpRA33e1JQ7ifknakTFpgNXPmW2YvmhqLQYMmrj4xJXXWYpDPS3xz7iAxn8L39njGVyuoseXzU6rcxFLJ8HFsTjSyQbLYnMpCqE2VbFWc",
            "xpub6ERApfZwUNrhLCkDtcHTcxd75RbzS1ed54G1LkBUHQVHQKqhMkhgbmJbZRkrgZw4koxb5JaHWkY4ALHY2grBGRjaDMzQLcgJvLJuZZvRcEL");
        test_path(seed, "m/0/2147483647'/1/2147483646'/2",
            "xprvA2nrNbFZABcdryreWet9Ea4LvTJcGsqrMzxHx98MMrotbir7yrKCEXw7nadnHM8Dq38EGfSh6dqA9QWTyefMLEcBYJUuekgW4BYPJcr9E7j",
            "xpub6FnCn6nSzZAw5Tw7cgR9bi15UV96gLZhjDstkXXxvCLsUXBGXPdSnLFbdpq8p9HmGsApME5hQTZ3emM2rnY5agb9rXpVGyy3bdW6EEgAtqt");
    }

    #[test]
    fn bip32_vector_3() {
        let seed = "4b381541583be4423346c643850da4b320e46a87ae3d2a4e6da11eba819cd4acba45d239319ac14f863b8d5ab5a0d0c64d2e8a1e7d1457df2e5a3c51c73235be";
        test_path(seed, "m",
            "xprv9s21ZrQH143K25QhxbucbDDuQ4naNntJRi4KUfWT7xo4EKsHt2QJDu7KXp1A3u7Bi1j8ph3EGsZ9Xvz9dGuVrtHHs7pXeTzjuxBrCmmhgC6",
            "xpub661MyMwAqRbcEZVB4dScxMAdx6d4nFc9nvyvH3v4gJL378CSRZiYmhRoP7mBy6gSPSCYk6SzXPTf3ND1cZAceL7SfJ1Z3GC8vBgp2epUt13");
        test_path(seed, "m/0'",
            "xprv9uPDJpEQgRQfDcW7BkF7eTya6RPxXeJCqCJGHuCJ4GiRVLzkTXBAJMu2qaMWPrS7AANYqdq6vcBcBUdJCVVFceUvJFjaPdGZ2y9WACViL4L",
            "xpub68NZiKmJWnxxS6aaHmn81bvJeTESw724CRDs6HbuccFQN9Ku14VQrADWgqbhhTHBaohPX4CjNLf9fq9MYo6oDaPPLPxSb7gwQN3ih19Zm4Y");
    }

    #[test]
    fn bip32_vector_4() {
        // leading zeros in the derived secret keys
        let seed = "3ddd5602285899a946114506157c7997e5444528f3003f6134712147db19b678";
        test_path(seed, "m",
            "xprv9s21ZrQH143K48vGoLGRPxgo2JNkJ3J3fqkirQC2zVdk5Dgd5w14S7fRDyHH4dWNHUgkvsvNDCkvAwcSHNAQwhwgNMgZhLtQC63zxwhQmRv",
            "xpub661MyMwAqRbcGczjuMoRm6dXaLDEhW1u34gKenbeYqAix21mdUKJyuyu5F1rzYGVxyL6tmgBUAEPrEz92mBXjByMRiJdba9wpnN37RLLAXa");
        test_path(seed, "m/0'",
            "xprv9vB7xEWwNp9kh1wQRfCCQMnZUEG21LpbR9NPCNN1dwhiZkjjeGRnaALmPXCX7SgjFTiCTT6bXes17boXtjq3xLpcDjzEuGLQBM5ohqkao9G",
            "xpub69AUMk3qDBi3uW1sXgjCmVjJ2G6WQoYSnNHyzkmdCHEhSZ4tBok37xfFEqHd2AddP56Tqp4o56AePAgCjYdvpW2PU2jbUPFKsav5ut6Ch1m");
        test_path(seed, "m/0'/1'",
            "xprv9xJocDuwtYCMNAo3Zw76WENQeAS6WGXQ55RCy7tDJ8oALr4FWkuVoHJeHVAcAqiZLE7Je3vZJHxspZdFHfnBEjHqU5hG1Jaj32dVoS6XLT1",
            "xpub6BJA1jSqiukeaesWfxcoNHzkZsi9GLYVQFeVazWnMY8s3XhYh2VXaYgTupdyfzqnEhsqT1C7C8Pco4HTkeWzVLjsBV5duK8Dg5i7KWzEMMo");
    }

    #[test]
    fn import_rejects_invalid_secret_keys() {
        // vector 5 style corrupted keys: zero and overflowing secrets
        let zero = "xprv9s21ZrQH143K24Mfq5zL5MhWK9hUhhGbd45hLXo2Pq2oqzMMo63oStZzF93Y5wvzdUayhgkkFoicQZcP3y52uPPxFnfoLZB21Teqt1VvEHx";
        let overflow = "xprv9s21ZrQH143K24Mfq5zL5MhWK9hUhhGbd45hLXo2Pq2oqzMMo63oStZzFAzHGBP2UuGCqWLTAPLcMtD9y5gkZ6Eq3Rjuahrv17fENZ3QzxW";
        for broken in [zero, overflow] {
            assert_eq!(
                Xpriv::from_base58(Network::Mainnet, broken),
                Err(XkeyParseError::Decode(XkeyDecodeError::InvalidSecretKey))
            );
        }
    }

    #[test]
    fn import_rejects_wrong_version() {
        let xpriv = master("000102030405060708090a0b0c0d0e0f");

        // a testnet key is not importable as a mainnet one
        let tprv = xpriv.to_base58(Network::Testnet);
        assert_eq!(
            Xpriv::from_base58(Network::Mainnet, &tprv),
            Err(XkeyParseError::Decode(XkeyDecodeError::VersionMismatch(
                VERSION_MAGIC_TPRV
            )))
        );
        // an xpub is not importable as an xpriv
        let xpub = xpriv.to_xpub().to_base58(Network::Mainnet);
        assert_eq!(
            Xpriv::from_base58(Network::Mainnet, &xpub),
            Err(XkeyParseError::Decode(XkeyDecodeError::VersionMismatch(
                VERSION_MAGIC_XPUB
            )))
        );

        // garbage magic is reported as an unknown key type
        let mut data = xpriv.encode(Network::Mainnet);
        data[0..4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(
            Xpriv::decode(Network::Mainnet, &data[..]),
            Err(XkeyDecodeError::UnknownKeyType([0xDE, 0xAD, 0xBE, 0xEF]))
        );
    }

    #[test]
    fn import_rejects_nonzero_padding() {
        let xpriv = master("000102030405060708090a0b0c0d0e0f");
        let mut data = xpriv.encode(Network::Mainnet);
        data[45] = 0x01;
        assert_eq!(
            Xpriv::decode(Network::Mainnet, &data[..]),
            Err(XkeyDecodeError::InvalidType(0x01))
        );
    }

    #[test]
    fn import_rejects_wrong_length() {
        assert_eq!(
            Xpriv::decode(Network::Mainnet, &[0u8; 77][..]),
            Err(XkeyDecodeError::WrongExtendedKeyLength(77))
        );
        assert_eq!(
            Xpub::decode(Network::Mainnet, &[0u8; 79][..]),
            Err(XkeyDecodeError::WrongExtendedKeyLength(79))
        );
    }

    #[test]
    fn import_rejects_invalid_pubkey() {
        let xpub = master("000102030405060708090a0b0c0d0e0f").to_xpub();
        let mut data = xpub.encode(Network::Mainnet);
        // 0x04 is the uncompressed prefix, never valid in a 33-byte key
        data[45] = 0x04;
        assert_eq!(
            Xpub::decode(Network::Mainnet, &data[..]),
            Err(XkeyDecodeError::InvalidPublicKey)
        );
    }

    #[test]
    fn fingerprint_is_shared_between_sides() {
        let xpriv = master("000102030405060708090a0b0c0d0e0f");
        assert_eq!(xpriv.fingerprint(), xpriv.to_xpub().fingerprint());
        assert_eq!(xpriv.identifier(), xpriv.to_xpub().identifier());

        let child = xpriv.ckd_priv(NormalIndex::ZERO).unwrap();
        assert_eq!(child.parent_fp(), xpriv.fingerprint());
        assert_eq!(child.depth(), 1);
    }

    #[test]
    fn path_append_composes() {
        let xpriv = master("000102030405060708090a0b0c0d0e0f");
        let a: DerivationPath = "0'/1".parse().unwrap();
        let b: DerivationPath = "2'/2".parse().unwrap();
        let joined = a.extended(b.clone());
        assert_eq!(
            xpriv.derive_priv(&joined).unwrap(),
            xpriv.derive_priv(&a).unwrap().derive_priv(&b).unwrap()
        );
    }

    #[test]
    fn depth_overflow() {
        let xpriv = master("000102030405060708090a0b0c0d0e0f");
        let path: DerivationPath<NormalIndex> =
            (0..256).map(|_| NormalIndex::ZERO).collect();
        assert_eq!(xpriv.derive_priv(&path), Err(DeriveError::DepthOverflow));
    }

    #[test]
    fn seed_length_limits() {
        assert_eq!(
            Xpriv::new_master(&[0u8; 15]),
            Err(SeedError::WrongSeedLength(15))
        );
        assert_eq!(
            Xpriv::new_master(&[0u8; 65]),
            Err(SeedError::WrongSeedLength(65))
        );
        assert!(Xpriv::new_master(&[0u8; 16]).is_ok());
        assert!(Xpriv::new_master(&[0u8; 64]).is_ok());
    }

    #[test]
    fn wif_export() {
        let xpriv = master("000102030405060708090a0b0c0d0e0f");
        let wif = xpriv.to_wif(Network::Mainnet);
        assert_eq!(
            wif_decode(Network::Mainnet, &wif),
            Ok(xpriv.to_secret_key())
        );
    }
}
