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

//! BIP32 hierarchical deterministic key engine with BIP341 taproot output
//! derivation.
//!
//! The crate implements the extended-key tree — master derivation from seed,
//! normal and hardened child derivation for both private and public keys,
//! typed derivation paths with their textual form, Base58Check import and
//! export under explicit network version prefixes — together with taproot
//! output construction from an internal key and a script tree: tweak
//! computation, merkle proofs, control blocks and script-path verification.
//!
//! All operations are pure functions over immutable values; every failure
//! mode is returned as a typed error value. Network parameters are never
//! global: they are passed explicitly into each serialization and address
//! call.

// Coding conventions
#![deny(
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case,
    unused_mut,
    unused_imports,
    dead_code,
    missing_docs
)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

#[macro_use]
extern crate amplify;

#[cfg(feature = "serde")]
#[macro_use]
extern crate serde_crate as serde;

pub mod address;
mod index;
mod network;
mod path;
pub mod taproot;
mod xkey;

pub use address::{
    derive_multisig, Address, AddressFormat, AddressIter, AddressPayload, MultisigError,
    MultisigIter, RedeemScript,
};
pub use index::{
    DerivationIndex, HardenedIndex, HardenedIndexExpected, Idx, IndexCycle, IndexOverflow,
    IndexParseError, NormalIndex, UnhardenedIndexExpected,
};
pub use network::{
    wif_decode, wif_encode, Network, NetworkParseError, WifError, VERSION_MAGIC_TPRV,
    VERSION_MAGIC_TPUB, VERSION_MAGIC_XPRV, VERSION_MAGIC_XPUB,
};
pub use path::{ApplyError, DerivationParseError, DerivationPath, ParsedPath};
pub use xkey::{
    ChainCode, DeriveError, ExtendedKey, SeedError, XkeyDecodeError, XkeyParseError, Xpriv, Xpub,
    XpubFp, XpubId,
};

/// Constant determining BIP32 boundary for u32 values after which index
/// is treated as hardened
pub const HARDENED_INDEX_BOUNDARY: u32 = 1 << 31;
