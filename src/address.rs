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

//! Address derivation from extended public keys: P2PKH, P2WPKH,
//! P2SH-wrapped P2WPKH and sorted m-of-n P2SH multisig, together with
//! restartable address iterators.

use std::fmt::{self, Display, Formatter};

use amplify::{Bytes20, Bytes32};
use bitcoin_hashes::{hash160, Hash};
use secp256k1::PublicKey;

use crate::index::{IndexCycle, NormalIndex};
use crate::network::Network;
use crate::xkey::{DeriveError, Xpub};

const OP_DUP: u8 = 0x76;
const OP_EQUAL: u8 = 0x87;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_HASH160: u8 = 0xA9;
const OP_CHECKSIG: u8 = 0xAC;
const OP_CHECKMULTISIG: u8 = 0xAE;
const OP_PUSHBYTES_20: u8 = 0x14;
const OP_PUSHBYTES_32: u8 = 0x20;
const OP_PUSHBYTES_33: u8 = 0x21;
// OP_1 is 0x51; OP_2 through OP_16 follow it
const OP_PUSHNUM_BASE: u8 = 0x50;

fn hash160(data: &[u8]) -> Bytes20 {
    Bytes20::from_byte_array(hash160::Hash::hash(data).to_byte_array())
}

/// Type of a single-key address derived from an extended public key.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display)]
pub enum AddressFormat {
    /// Pay-to-pubkey-hash legacy address.
    #[display("p2pkh")]
    P2pkh,

    /// Pay-to-witness-pubkey-hash native segwit address.
    #[display("p2wpkh")]
    P2wpkh,

    /// P2WPKH nested into P2SH for pre-segwit compatibility.
    #[display("p2sh-p2wpkh")]
    P2shWpkh,
}

/// Network-independent part of a bitcoin address.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, From)]
pub enum AddressPayload {
    /// Hash of a public key (P2PKH).
    PubkeyHash(Bytes20),

    /// Hash of a script (P2SH).
    ScriptHash(Bytes20),

    /// Version 0 witness program of a public key hash (P2WPKH).
    WPubkeyHash(Bytes20),

    /// Version 1 witness program: x-only taproot output key (P2TR).
    Taproot(Bytes32),
}

/// Bitcoin address: a payload combined with the network it belongs to.
///
/// Displays as Base58Check for the legacy payloads and as bech32/bech32m for
/// the witness ones.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct Address {
    /// Network-independent address payload.
    pub payload: AddressPayload,
    /// Network defining address prefixes.
    pub network: Network,
}

impl Address {
    /// Constructs address from its components.
    #[inline]
    pub fn new(payload: AddressPayload, network: Network) -> Self { Address { payload, network } }

    /// Generates the `scriptPubkey` matching this address.
    pub fn script_pubkey(&self) -> Vec<u8> {
        match self.payload {
            AddressPayload::PubkeyHash(hash) => {
                let mut script = Vec::with_capacity(25);
                script.extend([OP_DUP, OP_HASH160, OP_PUSHBYTES_20]);
                script.extend_from_slice(hash.as_ref());
                script.extend([OP_EQUALVERIFY, OP_CHECKSIG]);
                script
            }
            AddressPayload::ScriptHash(hash) => {
                let mut script = Vec::with_capacity(23);
                script.extend([OP_HASH160, OP_PUSHBYTES_20]);
                script.extend_from_slice(hash.as_ref());
                script.push(OP_EQUAL);
                script
            }
            AddressPayload::WPubkeyHash(hash) => {
                let mut script = Vec::with_capacity(22);
                script.extend([0x00, OP_PUSHBYTES_20]);
                script.extend_from_slice(hash.as_ref());
                script
            }
            AddressPayload::Taproot(output_key) => {
                let mut script = Vec::with_capacity(34);
                script.extend([OP_PUSHNUM_BASE + 1, OP_PUSHBYTES_32]);
                script.extend_from_slice(output_key.as_ref());
                script
            }
        }
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.payload {
            AddressPayload::PubkeyHash(hash) => {
                let mut data = [0u8; 21];
                data[0] = self.network.p2pkh_prefix();
                data[1..].copy_from_slice(hash.as_ref());
                base58::encode_check_to_fmt(f, &data)
            }
            AddressPayload::ScriptHash(hash) => {
                let mut data = [0u8; 21];
                data[0] = self.network.p2sh_prefix();
                data[1..].copy_from_slice(hash.as_ref());
                base58::encode_check_to_fmt(f, &data)
            }
            AddressPayload::WPubkeyHash(hash) => {
                let addr =
                    bech32::segwit::encode(self.network.bech32_hrp(), bech32::segwit::VERSION_0, hash.as_ref())
                        .expect("20-byte witness program is always encodable");
                f.write_str(&addr)
            }
            AddressPayload::Taproot(output_key) => {
                let addr = bech32::segwit::encode(
                    self.network.bech32_hrp(),
                    bech32::segwit::VERSION_1,
                    output_key.as_ref(),
                )
                .expect("32-byte witness program is always encodable");
                f.write_str(&addr)
            }
        }
    }
}

/// Multisig construction errors.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum MultisigError {
    /// multisig script must contain at least one key.
    NoKeys,

    /// multisig threshold must be a non-zero value.
    ZeroThreshold,

    /// multisig threshold {threshold} exceeds the number of participating
    /// keys {keys}.
    ThresholdExceedsKeys {
        /// Required number of signatures.
        threshold: u8,
        /// Number of the provided keys.
        keys: usize,
    },

    /// {0} keys exceed the 15-key limit of standard multisig scripts.
    TooManyKeys(usize),

    /// Error deriving one of the child keys.
    #[display(inner)]
    #[from]
    Derive(DeriveError),
}

/// Redeem script for a P2SH output.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct RedeemScript(Vec<u8>);

impl AsRef<[u8]> for RedeemScript {
    fn as_ref(&self) -> &[u8] { &self.0 }
}

impl RedeemScript {
    /// Constructs the P2WPKH witness program used as a redeem script in
    /// P2SH-wrapped segwit outputs.
    pub fn p2wpkh(pubkey_hash: Bytes20) -> RedeemScript {
        let mut script = Vec::with_capacity(22);
        script.extend([0x00, OP_PUSHBYTES_20]);
        script.extend_from_slice(pubkey_hash.as_ref());
        RedeemScript(script)
    }

    /// Constructs an m-of-n `OP_CHECKMULTISIG` redeem script. The provided
    /// keys are sorted by their compressed serialization, so any key order
    /// produces the same script.
    pub fn multisig(threshold: u8, keys: &[PublicKey]) -> Result<RedeemScript, MultisigError> {
        if keys.is_empty() {
            return Err(MultisigError::NoKeys);
        }
        if keys.len() > 15 {
            return Err(MultisigError::TooManyKeys(keys.len()));
        }
        if threshold == 0 {
            return Err(MultisigError::ZeroThreshold);
        }
        if threshold as usize > keys.len() {
            return Err(MultisigError::ThresholdExceedsKeys {
                threshold,
                keys: keys.len(),
            });
        }

        let mut serialized: Vec<[u8; 33]> = keys.iter().map(PublicKey::serialize).collect();
        serialized.sort();

        let mut script = Vec::with_capacity(3 + 34 * keys.len());
        script.push(OP_PUSHNUM_BASE + threshold);
        for key in serialized {
            script.push(OP_PUSHBYTES_33);
            script.extend_from_slice(&key);
        }
        script.push(OP_PUSHNUM_BASE + keys.len() as u8);
        script.push(OP_CHECKMULTISIG);
        Ok(RedeemScript(script))
    }

    /// Computes HASH160 of the script, used as a P2SH address payload.
    #[inline]
    pub fn script_hash(&self) -> Bytes20 { hash160(&self.0) }

    /// Returns the raw script bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] { &self.0 }

    /// Converts into the raw script bytes.
    #[inline]
    pub fn into_vec(self) -> Vec<u8> { self.0 }
}

impl Xpub {
    /// Constructs an address of the given format from this key, without any
    /// further derivation.
    pub fn to_address(&self, network: Network, format: AddressFormat) -> Address {
        let pubkey_hash = hash160(&self.to_public_key().serialize());
        let payload = match format {
            AddressFormat::P2pkh => AddressPayload::PubkeyHash(pubkey_hash),
            AddressFormat::P2wpkh => AddressPayload::WPubkeyHash(pubkey_hash),
            AddressFormat::P2shWpkh => {
                AddressPayload::ScriptHash(RedeemScript::p2wpkh(pubkey_hash).script_hash())
            }
        };
        Address { payload, network }
    }

    /// Derives a child along a normal path and constructs its address.
    pub fn derive_address<I: Into<NormalIndex>>(
        &self,
        network: Network,
        format: AddressFormat,
        path: impl IntoIterator<Item = I>,
    ) -> Result<Address, DeriveError> {
        Ok(self.derive_pub(path)?.to_address(network, format))
    }

    /// Returns an infinite iterator over addresses of the children of this
    /// key, starting from the given index and skipping indexes at which the
    /// derivation is invalid.
    pub fn addresses(
        &self,
        network: Network,
        format: AddressFormat,
        from: NormalIndex,
    ) -> AddressIter {
        AddressIter {
            parent: *self,
            network,
            format,
            cycle: from.cycle(),
        }
    }
}

/// Iterator over addresses of children of a single extended public key.
///
/// The iterator wraps at the hardened boundary and never terminates unless
/// the parent key is already at the maximum derivation depth.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct AddressIter {
    parent: Xpub,
    network: Network,
    format: AddressFormat,
    cycle: IndexCycle,
}

impl Iterator for AddressIter {
    type Item = (NormalIndex, Address);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let index = self.cycle.next().expect("index cycle is infinite");
            match self.parent.ckd_pub(index) {
                Ok(child) => return Some((index, child.to_address(self.network, self.format))),
                // the BIP32 skip-to-next-index rule
                Err(DeriveError::InvalidChild(_)) => continue,
                Err(DeriveError::DepthOverflow) => return None,
            }
        }
    }
}

/// Derives the child at `index` from each of the participating keys and
/// builds a sorted m-of-n P2SH multisig output.
///
/// Returns the address together with the redeem script which must be
/// revealed at spend time.
pub fn derive_multisig(
    network: Network,
    keys: &[Xpub],
    threshold: u8,
    index: NormalIndex,
) -> Result<(Address, RedeemScript), MultisigError> {
    let points = keys
        .iter()
        .map(|xpub| xpub.ckd_pub(index).map(|child| child.to_public_key()))
        .collect::<Result<Vec<_>, _>>()?;
    let redeem = RedeemScript::multisig(threshold, &points)?;
    let address = Address {
        payload: AddressPayload::ScriptHash(redeem.script_hash()),
        network,
    };
    Ok((address, redeem))
}

/// Iterator over multisig addresses derived at successive indexes from a set
/// of extended public keys.
#[derive(Clone, Debug)]
pub struct MultisigIter<'keys> {
    network: Network,
    keys: &'keys [Xpub],
    threshold: u8,
    cycle: IndexCycle,
}

impl<'keys> MultisigIter<'keys> {
    /// Constructs the iterator starting from the given index.
    pub fn new(
        network: Network,
        keys: &'keys [Xpub],
        threshold: u8,
        from: NormalIndex,
    ) -> Self {
        MultisigIter {
            network,
            keys,
            threshold,
            cycle: from.cycle(),
        }
    }
}

impl Iterator for MultisigIter<'_> {
    type Item = (NormalIndex, Address, RedeemScript);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let index = self.cycle.next().expect("index cycle is infinite");
            match derive_multisig(self.network, self.keys, self.threshold, index) {
                Ok((address, redeem)) => return Some((index, address, redeem)),
                Err(MultisigError::Derive(DeriveError::InvalidChild(_))) => continue,
                Err(_) => return None,
            }
        }
    }
}
