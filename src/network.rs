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

//! Network parameter tables consumed by key serialization and address
//! construction. No network value is ever stored inside a key: every
//! operation which needs one takes it as an explicit argument.

use std::str::FromStr;

use bech32::Hrp;
use secp256k1::SecretKey;

/// Magical version bytes for xpub: bitcoin mainnet public key
pub const VERSION_MAGIC_XPUB: [u8; 4] = [0x04, 0x88, 0xB2, 0x1E];
/// Magical version bytes for xprv: bitcoin mainnet private key
pub const VERSION_MAGIC_XPRV: [u8; 4] = [0x04, 0x88, 0xAD, 0xE4];
/// Magical version bytes for tpub: bitcoin testnet/signet/regtest public key
pub const VERSION_MAGIC_TPUB: [u8; 4] = [0x04, 0x35, 0x87, 0xCF];
/// Magical version bytes for tprv: bitcoin testnet/signet/regtest private key
pub const VERSION_MAGIC_TPRV: [u8; 4] = [0x04, 0x35, 0x83, 0x94];

/// Bitcoin network kind.
///
/// The three test networks share extended-key version magics and legacy
/// address prefixes; they differ only in the bech32 human-readable part.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "lowercase")
)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display)]
#[display(lowercase)]
pub enum Network {
    /// Bitcoin mainnet
    Mainnet,
    /// Bitcoin testnet
    Testnet,
    /// Bitcoin signet
    Signet,
    /// Local regtest network
    Regtest,
}

impl Network {
    /// Detects whether the network belongs to the testnet family.
    #[inline]
    pub fn is_testnet(self) -> bool { self != Network::Mainnet }

    /// Version magic prefixing serialized extended private keys.
    #[inline]
    pub fn xprv_magic(self) -> [u8; 4] {
        match self {
            Network::Mainnet => VERSION_MAGIC_XPRV,
            _ => VERSION_MAGIC_TPRV,
        }
    }

    /// Version magic prefixing serialized extended public keys.
    #[inline]
    pub fn xpub_magic(self) -> [u8; 4] {
        match self {
            Network::Mainnet => VERSION_MAGIC_XPUB,
            _ => VERSION_MAGIC_TPUB,
        }
    }

    /// Prefix byte for WIF-encoded secret keys.
    #[inline]
    pub fn wif_prefix(self) -> u8 {
        match self {
            Network::Mainnet => 0x80,
            _ => 0xEF,
        }
    }

    /// Prefix byte for Base58Check P2PKH addresses.
    #[inline]
    pub fn p2pkh_prefix(self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            _ => 0x6F,
        }
    }

    /// Prefix byte for Base58Check P2SH addresses.
    #[inline]
    pub fn p2sh_prefix(self) -> u8 {
        match self {
            Network::Mainnet => 0x05,
            _ => 0xC4,
        }
    }

    /// Human-readable part for segwit addresses.
    #[inline]
    pub fn bech32_hrp(self) -> Hrp {
        match self {
            Network::Mainnet => bech32::hrp::BC,
            Network::Testnet | Network::Signet => bech32::hrp::TB,
            Network::Regtest => bech32::hrp::BCRT,
        }
    }
}

/// the provided network name `{0}` is not known.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub struct NetworkParseError(pub String);

impl FromStr for Network {
    type Err = NetworkParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "mainnet" | "bitcoin" => Network::Mainnet,
            "testnet" => Network::Testnet,
            "signet" => Network::Signet,
            "regtest" => Network::Regtest,
            _ => return Err(NetworkParseError(s.to_owned())),
        })
    }
}

/// Errors decoding WIF-serialized secret keys.
#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum WifError {
    /// error in Base58 WIF encoding. Details: {0}
    #[from]
    Base58(base58::Error),

    /// WIF payload has invalid length {0}.
    WrongLength(usize),

    /// WIF prefix byte {0:#04x} does not match the requested network.
    WrongPrefix(u8),

    /// WIF key is not marked as compressed.
    Uncompressed,

    /// WIF data do not represent a valid secret key.
    InvalidSecretKey,
}

/// Serializes a secret key in WIF format with the compressed public key flag
/// set.
pub fn wif_encode(network: Network, secret: &SecretKey) -> String {
    let mut data = Vec::with_capacity(34);
    data.push(network.wif_prefix());
    data.extend_from_slice(&secret.secret_bytes());
    data.push(0x01);
    base58::encode_check(&data)
}

/// Deserializes a compressed-flagged WIF string, checking its network prefix.
pub fn wif_decode(network: Network, wif: &str) -> Result<SecretKey, WifError> {
    let data = base58::decode_check(wif)?;
    if data.len() != 34 {
        return Err(WifError::WrongLength(data.len()));
    }
    if data[0] != network.wif_prefix() {
        return Err(WifError::WrongPrefix(data[0]));
    }
    if data[33] != 0x01 {
        return Err(WifError::Uncompressed);
    }
    SecretKey::from_slice(&data[1..33]).map_err(|_| WifError::InvalidSecretKey)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn network_prefixes() {
        assert_eq!(Network::Mainnet.xprv_magic(), VERSION_MAGIC_XPRV);
        assert_eq!(Network::Mainnet.xpub_magic(), VERSION_MAGIC_XPUB);
        for net in [Network::Testnet, Network::Signet, Network::Regtest] {
            assert_eq!(net.xprv_magic(), VERSION_MAGIC_TPRV);
            assert_eq!(net.xpub_magic(), VERSION_MAGIC_TPUB);
        }
    }

    #[test]
    fn network_display_parse() {
        for net in [
            Network::Mainnet,
            Network::Testnet,
            Network::Signet,
            Network::Regtest,
        ] {
            assert_eq!(net.to_string().parse::<Network>(), Ok(net));
        }
        assert_eq!(
            "florinet".parse::<Network>(),
            Err(NetworkParseError(s!("florinet")))
        );
    }

    #[test]
    fn wif_roundtrip() {
        let secret = SecretKey::from_slice(&[0x11u8; 32]).unwrap();
        let wif = wif_encode(Network::Mainnet, &secret);
        assert_eq!(wif_decode(Network::Mainnet, &wif), Ok(secret));
        assert_eq!(
            wif_decode(Network::Testnet, &wif),
            Err(WifError::WrongPrefix(0x80))
        );
    }

    #[test]
    fn wif_rejects_uncompressed() {
        let secret = SecretKey::from_slice(&[0x11u8; 32]).unwrap();
        let mut data = Vec::with_capacity(33);
        data.push(Network::Mainnet.wif_prefix());
        data.extend_from_slice(&secret.secret_bytes());
        let wif = base58::encode_check(&data);
        assert_eq!(
            wif_decode(Network::Mainnet, &wif),
            Err(WifError::WrongLength(33))
        );
    }
}
