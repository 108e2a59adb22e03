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

//! Taproot output construction: script trees, tagged hashes, output key
//! tweaking, merkle proofs, control blocks and script-path spend
//! verification.

use std::fmt::{self, Formatter, LowerHex, UpperHex};
use std::ops::Deref;
use std::slice;
use std::vec;

use amplify::{ByteArray, Bytes32};
use bitcoin_hashes::{sha256, Hash, HashEngine};
use secp256k1::{Scalar, XOnlyPublicKey, SECP256K1};

use crate::address::{Address, AddressPayload};
use crate::network::Network;

/// First byte of the optional taproot witness annex element.
pub const TAPROOT_ANNEX_PREFIX: u8 = 0x50;
/// Leaf version used by tapscript leaves.
pub const TAPROOT_LEAF_TAPSCRIPT: u8 = 0xC0;
/// Bit mask extracting the leaf version from the control block first byte.
pub const TAPROOT_LEAF_MASK: u8 = 0xFE;
/// Maximum number of hashes in a taproot merkle path.
pub const TAPROOT_MAX_MERKLE_PATH_LEN: usize = 128;

const OP_PUSHNUM_1: u8 = 0x51;
const OP_PUSHBYTES_32: u8 = 0x20;

// BIP-340 tagged hash engine: SHA256(SHA256(tag) || SHA256(tag) || msg)
fn tagged_hash_engine(tag: &[u8]) -> sha256::HashEngine {
    let tag_hash = sha256::Hash::hash(tag);
    let mut engine = sha256::Hash::engine();
    engine.input(tag_hash.as_byte_array());
    engine.input(tag_hash.as_byte_array());
    engine
}

fn input_compact_size(engine: &mut sha256::HashEngine, len: usize) {
    let len = len as u64;
    match len {
        0..=0xFC => engine.input(&[len as u8]),
        0xFD..=0xFFFF => {
            engine.input(&[0xFD]);
            engine.input(&(len as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            engine.input(&[0xFE]);
            engine.input(&(len as u32).to_le_bytes());
        }
        _ => {
            engine.input(&[0xFF]);
            engine.input(&len.to_le_bytes());
        }
    }
}

/// Trait for the types convertible into a universal taproot tree node hash.
pub trait IntoTapHash {
    /// Converts the hash into a universal tree node hash.
    fn into_tap_hash(self) -> TapNodeHash;
}

/// Tagged hash of a single leaf script.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
#[derive(Wrapper, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, From)]
#[wrapper(Index, RangeOps, BorrowSlice, Hex, Display, FromStr)]
pub struct TapLeafHash(
    #[from]
    #[from([u8; 32])]
    Bytes32,
);

impl TapLeafHash {
    /// Computes leaf hash of the given leaf script.
    pub fn with_leaf_script(leaf_script: &LeafScript) -> Self {
        Self::with_raw_script(leaf_script.version, &leaf_script.script)
    }

    /// Computes leaf hash of a script under the given leaf version.
    pub fn with_raw_script(version: LeafVer, script: &[u8]) -> Self {
        let mut engine = tagged_hash_engine(b"TapLeaf");
        engine.input(&[version.to_consensus_u8()]);
        input_compact_size(&mut engine, script.len());
        engine.input(script);
        Self(sha256::Hash::from_engine(engine).to_byte_array().into())
    }
}

impl IntoTapHash for TapLeafHash {
    fn into_tap_hash(self) -> TapNodeHash { TapNodeHash(self.0) }
}

/// Tagged hash of a pair of child tree nodes.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
#[derive(Wrapper, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, From)]
#[wrapper(Index, RangeOps, BorrowSlice, Hex, Display, FromStr)]
pub struct TapBranchHash(
    #[from]
    #[from([u8; 32])]
    Bytes32,
);

impl TapBranchHash {
    /// Computes branch hash of two child nodes, ordering them
    /// lexicographically as required by the consensus rules.
    pub fn with_nodes(node1: TapNodeHash, node2: TapNodeHash) -> Self {
        let mut engine = tagged_hash_engine(b"TapBranch");
        if node1.to_byte_array() < node2.to_byte_array() {
            engine.input(node1.as_ref());
            engine.input(node2.as_ref());
        } else {
            engine.input(node2.as_ref());
            engine.input(node1.as_ref());
        }
        Self(sha256::Hash::from_engine(engine).to_byte_array().into())
    }
}

impl IntoTapHash for TapBranchHash {
    fn into_tap_hash(self) -> TapNodeHash { TapNodeHash(self.0) }
}

/// Universal taproot tree node hash: either a leaf or a branch hash.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
#[derive(Wrapper, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, From)]
#[wrapper(Index, RangeOps, BorrowSlice, Hex, Display, FromStr)]
pub struct TapNodeHash(
    #[from]
    #[from([u8; 32])]
    #[from(TapLeafHash)]
    #[from(TapBranchHash)]
    Bytes32,
);

impl IntoTapHash for TapNodeHash {
    fn into_tap_hash(self) -> TapNodeHash { self }
}

impl AsRef<[u8]> for TapNodeHash {
    fn as_ref(&self) -> &[u8] { self.0.as_ref() }
}

/// invalid taproot leaf version {0:#04x}.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub struct InvalidLeafVer(pub u8);

/// Version of a taproot leaf script.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default)]
pub enum LeafVer {
    /// Tapscript leaf version (0xc0).
    #[default]
    TapScript,

    /// Future leaf version, reserved for upgrades.
    Future(FutureLeafVer),
}

impl LeafVer {
    /// Constructs leaf version from the consensus byte value.
    pub fn from_consensus_u8(version: u8) -> Result<Self, InvalidLeafVer> {
        match version {
            TAPROOT_LEAF_TAPSCRIPT => Ok(LeafVer::TapScript),
            TAPROOT_ANNEX_PREFIX => Err(InvalidLeafVer(TAPROOT_ANNEX_PREFIX)),
            future => FutureLeafVer::from_consensus(future).map(LeafVer::Future),
        }
    }

    /// Returns the consensus byte value of the leaf version.
    pub fn to_consensus_u8(self) -> u8 {
        match self {
            LeafVer::TapScript => TAPROOT_LEAF_TAPSCRIPT,
            LeafVer::Future(version) => version.to_consensus(),
        }
    }
}

impl LowerHex for LeafVer {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result { LowerHex::fmt(&self.to_consensus_u8(), f) }
}

impl UpperHex for LeafVer {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result { UpperHex::fmt(&self.to_consensus_u8(), f) }
}

/// Leaf version from a future taproot upgrade: an even byte value which is
/// neither the tapscript version nor the annex prefix.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct FutureLeafVer(u8);

impl FutureLeafVer {
    pub(self) fn from_consensus(version: u8) -> Result<FutureLeafVer, InvalidLeafVer> {
        match version {
            TAPROOT_LEAF_TAPSCRIPT => unreachable!("covered by LeafVer::from_consensus_u8"),
            TAPROOT_ANNEX_PREFIX => Err(InvalidLeafVer(TAPROOT_ANNEX_PREFIX)),
            odd if odd & TAPROOT_LEAF_MASK != odd => Err(InvalidLeafVer(odd)),
            even => Ok(FutureLeafVer(even)),
        }
    }

    /// Returns the consensus byte value of the leaf version.
    #[inline]
    pub fn to_consensus(self) -> u8 { self.0 }
}

/// Leaf script: a script with the leaf version under which it is committed
/// into the tree.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default)]
pub struct LeafScript {
    /// Version of the leaf.
    pub version: LeafVer,
    /// Raw script bytes.
    pub script: Vec<u8>,
}

impl LeafScript {
    /// Constructs leaf script with an explicit leaf version.
    #[inline]
    pub fn with_bytes(version: LeafVer, script: Vec<u8>) -> Self { LeafScript { version, script } }

    /// Constructs tapscript-versioned leaf script.
    #[inline]
    pub fn tap_script(script: Vec<u8>) -> Self {
        LeafScript {
            version: LeafVer::TapScript,
            script,
        }
    }

    /// Computes the tagged leaf hash committing to this script.
    #[inline]
    pub fn tap_leaf_hash(&self) -> TapLeafHash { TapLeafHash::with_leaf_script(self) }
}

/// Parity of the y-coordinate of the tweaked output key.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Display)]
#[display(lowercase)]
#[repr(u8)]
pub enum Parity {
    /// The y-coordinate is even.
    Even = 0,
    /// The y-coordinate is odd.
    Odd = 1,
}

impl From<secp256k1::Parity> for Parity {
    fn from(parity: secp256k1::Parity) -> Self {
        match parity {
            secp256k1::Parity::Even => Parity::Even,
            secp256k1::Parity::Odd => Parity::Odd,
        }
    }
}

impl Parity {
    /// Returns the consensus bit value of the parity.
    #[inline]
    pub fn to_consensus_u8(self) -> u8 { self as u8 }
}

/// invalid x-only public key value.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub struct InvalidXOnlyPk;

/// the taproot tweak value overflows the group order or produces the point
/// at infinity.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub struct InvalidTweak;

/// Internal taproot key: the untweaked x-only key committed into the output.
#[derive(Wrapper, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, From)]
#[wrapper(Deref, LowerHex, Display, FromStr)]
pub struct InternalPk(XOnlyPublicKey);

impl InternalPk {
    /// Constructs the internal key from its 32-byte serialization.
    pub fn from_byte_array(data: [u8; 32]) -> Result<Self, InvalidXOnlyPk> {
        XOnlyPublicKey::from_slice(&data)
            .map(Self)
            .map_err(|_| InvalidXOnlyPk)
    }

    /// Returns the 32-byte serialization of the key.
    #[inline]
    pub fn to_byte_array(&self) -> [u8; 32] { self.0.serialize() }

    /// Computes the tweaked output key committing to an optional merkle root
    /// of a script tree.
    ///
    /// Computes `t = H_TapTweak(x(P) || root)`, and the output key as
    /// `lift_x(P) + t·G`. Fails with negligible probability when the tweak
    /// overflows the group order or the result is the point at infinity.
    pub fn to_output_pk(
        &self,
        merkle_root: Option<TapNodeHash>,
    ) -> Result<(OutputPk, Parity), InvalidTweak> {
        let mut engine = tagged_hash_engine(b"TapTweak");
        engine.input(&self.0.serialize());
        if let Some(merkle_root) = merkle_root {
            engine.input(merkle_root.as_ref());
        }
        let tweak_bytes = sha256::Hash::from_engine(engine).to_byte_array();
        let tweak = Scalar::from_be_bytes(tweak_bytes).map_err(|_| InvalidTweak)?;
        let (output_key, parity) =
            self.0.add_tweak(SECP256K1, &tweak).map_err(|_| InvalidTweak)?;
        Ok((OutputPk(output_key), parity.into()))
    }
}

/// Output taproot key: the tweaked key exposed in the `scriptPubkey`.
#[derive(Wrapper, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, From)]
#[wrapper(Deref, LowerHex, Display, FromStr)]
pub struct OutputPk(XOnlyPublicKey);

impl OutputPk {
    /// Constructs the output key from its 32-byte serialization.
    pub fn from_byte_array(data: [u8; 32]) -> Result<Self, InvalidXOnlyPk> {
        XOnlyPublicKey::from_slice(&data)
            .map(Self)
            .map_err(|_| InvalidXOnlyPk)
    }

    /// Returns the 32-byte serialization of the key.
    #[inline]
    pub fn to_byte_array(&self) -> [u8; 32] { self.0.serialize() }
}

/// maximum taproot script tree depth exceeded.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub struct MaxDepthExceeded;

/// Merkle path from a leaf to the tree root, ordered bottom-up.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default)]
pub struct TapMerklePath(Vec<TapNodeHash>);

impl Deref for TapMerklePath {
    type Target = [TapNodeHash];

    fn deref(&self) -> &Self::Target { &self.0 }
}

impl TryFrom<Vec<TapNodeHash>> for TapMerklePath {
    type Error = MaxDepthExceeded;

    fn try_from(path: Vec<TapNodeHash>) -> Result<Self, Self::Error> {
        if path.len() > TAPROOT_MAX_MERKLE_PATH_LEN {
            return Err(MaxDepthExceeded);
        }
        Ok(Self(path))
    }
}

impl IntoIterator for TapMerklePath {
    type Item = TapNodeHash;
    type IntoIter = vec::IntoIter<TapNodeHash>;

    fn into_iter(self) -> Self::IntoIter { self.0.into_iter() }
}

impl<'path> IntoIterator for &'path TapMerklePath {
    type Item = &'path TapNodeHash;
    type IntoIter = slice::Iter<'path, TapNodeHash>;

    fn into_iter(self) -> Self::IntoIter { self.0.iter() }
}

impl TapMerklePath {
    /// Constructs an empty merkle path, matching a tree consisting of a
    /// single leaf.
    #[inline]
    pub fn new() -> Self { Self::default() }
}

/// Taproot script tree.
///
/// Leaves carry versioned scripts; branch nodes carry no data of their own.
/// The `Hidden` variant keeps a pre-computed node hash in place of a subtree
/// which is not known in full — for instance when only a merkle proof for
/// one of the leaves is available — and makes [`TapTree::merkle_root`]
/// total.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum TapTree {
    /// Leaf node with a versioned script.
    Leaf(LeafScript),

    /// Branch node with two child subtrees.
    Branch(Box<TapTree>, Box<TapTree>),

    /// Subtree known only through its node hash.
    Hidden(TapNodeHash),
}

impl TapTree {
    /// Constructs a single tapscript leaf.
    #[inline]
    pub fn with_tap_script(script: Vec<u8>) -> TapTree {
        TapTree::Leaf(LeafScript::tap_script(script))
    }

    /// Constructs a leaf with an explicit leaf version.
    #[inline]
    pub fn leaf(version: LeafVer, script: Vec<u8>) -> TapTree {
        TapTree::Leaf(LeafScript::with_bytes(version, script))
    }

    /// Constructs a hidden node carrying a pre-computed subtree hash.
    #[inline]
    pub fn hidden(hash: TapNodeHash) -> TapTree { TapTree::Hidden(hash) }

    /// Joins two subtrees under a new branch node; fails if the resulting
    /// tree exceeds the taproot depth limit.
    pub fn branch(first: TapTree, last: TapTree) -> Result<TapTree, MaxDepthExceeded> {
        if first.depth().max(last.depth()) + 1 > TAPROOT_MAX_MERKLE_PATH_LEN {
            return Err(MaxDepthExceeded);
        }
        Ok(TapTree::Branch(Box::new(first), Box::new(last)))
    }

    /// Returns the number of branch levels in the known part of the tree.
    pub fn depth(&self) -> usize {
        match self {
            TapTree::Leaf(_) | TapTree::Hidden(_) => 0,
            TapTree::Branch(first, last) => first.depth().max(last.depth()) + 1,
        }
    }

    /// Computes the merkle root committing to the whole tree. The function
    /// is total: hidden nodes contribute their stored hash.
    pub fn merkle_root(&self) -> TapNodeHash {
        match self {
            TapTree::Leaf(leaf_script) => leaf_script.tap_leaf_hash().into_tap_hash(),
            TapTree::Branch(first, last) => {
                TapBranchHash::with_nodes(first.merkle_root(), last.merkle_root()).into_tap_hash()
            }
            TapTree::Hidden(hash) => *hash,
        }
    }

    /// Enumerates all known leaves together with their merkle proofs,
    /// ordered from the leaf sibling up to the root. Leaves behind hidden
    /// nodes are not included.
    pub fn merkle_proofs(&self) -> Vec<(LeafScript, TapMerklePath)> {
        fn recurse(tree: &TapTree) -> Vec<(LeafScript, Vec<TapNodeHash>)> {
            match tree {
                TapTree::Leaf(leaf_script) => vec![(leaf_script.clone(), vec![])],
                TapTree::Hidden(_) => vec![],
                TapTree::Branch(first, last) => {
                    let first_hash = first.merkle_root();
                    let last_hash = last.merkle_root();
                    let mut proofs = recurse(first);
                    for (_, path) in &mut proofs {
                        path.push(last_hash);
                    }
                    let mut tail = recurse(last);
                    for (_, path) in &mut tail {
                        path.push(first_hash);
                    }
                    proofs.extend(tail);
                    proofs
                }
            }
        }
        recurse(self)
            .into_iter()
            .map(|(leaf_script, path)| {
                let path = TapMerklePath::try_from(path)
                    .expect("tree depth is limited at the construction time");
                (leaf_script, path)
            })
            .collect()
    }
}

/// Control block of a taproot script-path spend.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ControlBlock {
    /// Version of the spent leaf.
    pub leaf_version: LeafVer,
    /// Parity of the y-coordinate of the output key.
    pub output_key_parity: Parity,
    /// Internal key the output commits to.
    pub internal_pk: InternalPk,
    /// Merkle path from the spent leaf to the tree root.
    pub merkle_branch: TapMerklePath,
}

/// Errors parsing serialized control blocks.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum ControlBlockError {
    /// control block length {0} does not match `1 + 32 + 32·m` for `m` up
    /// to 128.
    InvalidLength(usize),

    /// Leaf version byte is invalid.
    #[display(inner)]
    #[from]
    InvalidLeafVer(InvalidLeafVer),

    /// control block contains an invalid internal key value.
    InvalidInternalKey,
}

impl ControlBlock {
    /// Constructs control block from its components.
    #[inline]
    pub fn with(
        leaf_version: LeafVer,
        internal_pk: InternalPk,
        output_key_parity: Parity,
        merkle_branch: TapMerklePath,
    ) -> Self {
        ControlBlock {
            leaf_version,
            output_key_parity,
            internal_pk,
            merkle_branch,
        }
    }

    /// Serializes the control block into the witness element form
    /// `(leaf_version | parity) || internal_key || merkle_path`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(33 + 32 * self.merkle_branch.len());
        data.push(self.leaf_version.to_consensus_u8() | self.output_key_parity.to_consensus_u8());
        data.extend_from_slice(&self.internal_pk.to_byte_array());
        for step in &self.merkle_branch {
            data.extend_from_slice(step.as_ref());
        }
        data
    }

    /// Parses a control block from its witness element serialization.
    pub fn deserialize(data: &[u8]) -> Result<ControlBlock, ControlBlockError> {
        if data.len() < 33
            || (data.len() - 33) % 32 != 0
            || (data.len() - 33) / 32 > TAPROOT_MAX_MERKLE_PATH_LEN
        {
            return Err(ControlBlockError::InvalidLength(data.len()));
        }

        let leaf_version = LeafVer::from_consensus_u8(data[0] & TAPROOT_LEAF_MASK)?;
        let output_key_parity = match data[0] & 0x01 {
            0 => Parity::Even,
            _ => Parity::Odd,
        };

        let mut key = [0u8; 32];
        key.copy_from_slice(&data[1..33]);
        let internal_pk =
            InternalPk::from_byte_array(key).map_err(|_| ControlBlockError::InvalidInternalKey)?;

        let merkle_branch = data[33..]
            .chunks_exact(32)
            .map(|chunk| {
                let mut hash = [0u8; 32];
                hash.copy_from_slice(chunk);
                TapNodeHash::from(hash)
            })
            .collect::<Vec<_>>();
        let merkle_branch =
            TapMerklePath::try_from(merkle_branch).expect("length is checked above");

        Ok(ControlBlock {
            leaf_version,
            output_key_parity,
            internal_pk,
            merkle_branch,
        })
    }
}

/// Errors in taproot annex construction.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Error)]
#[display(doc_comments)]
pub enum AnnexError {
    /// annex must be a non-empty byte string.
    Empty,

    /// annex must start with the 0x50 prefix byte, not {0:#04x}.
    WrongFirstByte(u8),
}

/// Optional annex element of a taproot witness stack.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct Annex(Vec<u8>);

impl Annex {
    /// Constructs annex from raw bytes, verifying the prefix byte.
    pub fn new(annex_bytes: Vec<u8>) -> Result<Self, AnnexError> {
        match annex_bytes.first() {
            None => Err(AnnexError::Empty),
            Some(&TAPROOT_ANNEX_PREFIX) => Ok(Self(annex_bytes)),
            Some(&other) => Err(AnnexError::WrongFirstByte(other)),
        }
    }

    /// Returns raw annex bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] { &self.0 }

    /// Converts into raw annex bytes.
    #[inline]
    pub fn into_vec(self) -> Vec<u8> { self.0 }
}

/// Data required to spend a taproot output along the script path.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ScriptPathSpend {
    /// Witness stack elements satisfying the leaf script, ordered as they
    /// appear in the final witness.
    pub stack: Vec<Vec<u8>>,
    /// The spent leaf script.
    pub script: LeafScript,
    /// Control block proving the leaf commitment.
    pub control_block: ControlBlock,
    /// Optional annex.
    pub annex: Option<Annex>,
}

impl ScriptPathSpend {
    /// Constructs a spend with an empty witness stack and no annex.
    pub fn with(script: LeafScript, control_block: ControlBlock) -> Self {
        ScriptPathSpend {
            stack: vec![],
            script,
            control_block,
            annex: None,
        }
    }

    /// Builds the full witness stack:
    /// `stack || script || control_block || annex?`.
    pub fn to_witness(&self) -> Vec<Vec<u8>> {
        let mut witness = self.stack.clone();
        witness.push(self.script.script.clone());
        witness.push(self.control_block.serialize());
        if let Some(annex) = &self.annex {
            witness.push(annex.as_slice().to_vec());
        }
        witness
    }
}

/// Taproot output: an internal key optionally committing to a script tree.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct TaprootOutput {
    /// Internal key the output is built from.
    pub internal_key: InternalPk,
    /// Optional script tree committed into the output key.
    pub tree: Option<TapTree>,
}

impl TaprootOutput {
    /// Constructs a key-path-only output without a script tree.
    #[inline]
    pub fn key_only(internal_key: InternalPk) -> Self {
        TaprootOutput {
            internal_key,
            tree: None,
        }
    }

    /// Constructs an output committing to the given script tree.
    #[inline]
    pub fn with_tree(internal_key: InternalPk, tree: TapTree) -> Self {
        TaprootOutput {
            internal_key,
            tree: Some(tree),
        }
    }

    /// Computes the merkle root of the script tree, if one is present.
    #[inline]
    pub fn merkle_root(&self) -> Option<TapNodeHash> {
        self.tree.as_ref().map(TapTree::merkle_root)
    }

    /// Computes the tweaked output key and its parity.
    #[inline]
    pub fn output_key(&self) -> Result<(OutputPk, Parity), InvalidTweak> {
        self.internal_key.to_output_pk(self.merkle_root())
    }

    /// Generates the v1 witness program `scriptPubkey` of the output.
    pub fn script_pubkey(&self) -> Result<Vec<u8>, InvalidTweak> {
        let (output_key, _) = self.output_key()?;
        let mut script = Vec::with_capacity(34);
        script.extend([OP_PUSHNUM_1, OP_PUSHBYTES_32]);
        script.extend_from_slice(&output_key.to_byte_array());
        Ok(script)
    }

    /// Generates the bech32m address of the output on the given network.
    pub fn address(&self, network: Network) -> Result<Address, InvalidTweak> {
        let (output_key, _) = self.output_key()?;
        Ok(Address::new(
            AddressPayload::Taproot(Bytes32::from_byte_array(output_key.to_byte_array())),
            network,
        ))
    }

    /// Produces script-path spend templates — with empty witness stacks —
    /// for every known leaf of the tree, together with their control blocks.
    pub fn script_path_spends(&self) -> Result<Vec<ScriptPathSpend>, InvalidTweak> {
        let (_, parity) = self.output_key()?;
        let Some(tree) = &self.tree else {
            return Ok(vec![]);
        };
        Ok(tree
            .merkle_proofs()
            .into_iter()
            .map(|(leaf_script, merkle_branch)| {
                let control_block = ControlBlock::with(
                    leaf_script.version,
                    self.internal_key,
                    parity,
                    merkle_branch,
                );
                ScriptPathSpend::with(leaf_script, control_block)
            })
            .collect())
    }
}

/// Verifies a script-path spend against the output key of the spent output.
///
/// The merkle root is reconstructed by folding the control-block path from
/// the leaf hash, sorting the node pair at every step; then the tweak is
/// recomputed and the candidate output key is compared against the provided
/// one, including the parity bit stored in the control block.
pub fn verify_script_path(output_key: OutputPk, spend: &ScriptPathSpend) -> bool {
    let control_block = &spend.control_block;
    let leaf_hash =
        TapLeafHash::with_raw_script(control_block.leaf_version, &spend.script.script);
    let mut node = leaf_hash.into_tap_hash();
    for step in &control_block.merkle_branch {
        node = TapBranchHash::with_nodes(node, *step).into_tap_hash();
    }
    let Ok((candidate, parity)) = control_block.internal_pk.to_output_pk(Some(node)) else {
        return false;
    };
    candidate == output_key && parity == control_block.output_key_parity
}

#[cfg(test)]
mod test {
    use amplify::hex::FromHex;

    use super::*;

    fn internal(hex: &str) -> InternalPk {
        InternalPk::from_byte_array(<[u8; 32]>::from_hex(hex).unwrap()).unwrap()
    }

    fn script(hex: &str) -> Vec<u8> { Vec::<u8>::from_hex(hex).unwrap() }

    fn node(hex: &str) -> TapNodeHash { hex.parse().unwrap() }

    #[test]
    fn tagged_hash_construction() {
        // H_tag(x) = SHA256(SHA256(tag) || SHA256(tag) || x)
        let tag_hash = sha256::Hash::hash(b"TapLeaf");
        let mut engine = sha256::Hash::engine();
        engine.input(tag_hash.as_byte_array());
        engine.input(tag_hash.as_byte_array());
        engine.input(&[0xC0, 0x01, 0x51]);
        let manual = sha256::Hash::from_engine(engine).to_byte_array();

        let leaf = TapLeafHash::with_raw_script(LeafVer::TapScript, &[0x51]);
        assert_eq!(leaf.to_byte_array(), manual);
    }

    #[test]
    fn leaf_version_consensus() {
        assert_eq!(
            LeafVer::from_consensus_u8(0xC0),
            Ok(LeafVer::TapScript)
        );
        assert_eq!(
            LeafVer::from_consensus_u8(0x50),
            Err(InvalidLeafVer(0x50))
        );
        assert_eq!(LeafVer::from_consensus_u8(0xC1), Err(InvalidLeafVer(0xC1)));
        let future = LeafVer::from_consensus_u8(0xFA).unwrap();
        assert_eq!(future.to_consensus_u8(), 0xFA);
    }

    #[test]
    fn branch_hash_is_symmetric() {
        let a = node("0101010101010101010101010101010101010101010101010101010101010101");
        let b = node("0202020202020202020202020202020202020202020202020202020202020202");
        assert_eq!(
            TapBranchHash::with_nodes(a, b),
            TapBranchHash::with_nodes(b, a)
        );
    }

    #[test]
    fn bip341_keypath_only() {
        // BIP-341 wallet vectors, scriptPubKey[0]
        let output = TaprootOutput::key_only(internal(
            "d6889cb081036e0faefa3a35157ad71086b123b2b144b649798b494c300a961d",
        ));
        assert_eq!(output.merkle_root(), None);
        let (output_key, _) = output.output_key().unwrap();
        assert_eq!(
            output_key.to_byte_array(),
            <[u8; 32]>::from_hex(
                "53a1f6e454df1aa2776a2814a721372d6258050de330b3c6d10ee8f4e0dda343"
            )
            .unwrap()
        );
        assert_eq!(
            output.script_pubkey().unwrap(),
            script("512053a1f6e454df1aa2776a2814a721372d6258050de330b3c6d10ee8f4e0dda343")
        );
        assert_eq!(
            output.address(Network::Mainnet).unwrap().to_string(),
            "bc1p2wsldez5mud2yam29q22wgfh9439spgduvct83k3pm50fcxa5dps59h4z5"
        );
        assert!(output.script_path_spends().unwrap().is_empty());
    }

    #[test]
    fn bip341_single_leaf() {
        // BIP-341 wallet vectors, scriptPubKey[2]
        let leaf = LeafScript::tap_script(script(
            "20b617298552a72ade070667e86ca63b8f5789a9fe8731ef91202a91c9f3459007ac",
        ));
        assert_eq!(
            leaf.tap_leaf_hash().into_tap_hash(),
            node("c525714a7f49c28aedbbba78c005931a81c234b2f6c99a73e4d06082adc8bf2b")
        );

        let output = TaprootOutput::with_tree(
            internal("93478e9488f956df2396be2ce6c5cced75f900dfa18e7dabd2428aae78451820"),
            TapTree::Leaf(leaf),
        );
        assert_eq!(
            output.merkle_root(),
            Some(node(
                "c525714a7f49c28aedbbba78c005931a81c234b2f6c99a73e4d06082adc8bf2b"
            ))
        );
        let (output_key, parity) = output.output_key().unwrap();
        assert_eq!(
            output_key.to_byte_array(),
            <[u8; 32]>::from_hex(
                "e4d810fd50586274face62b8a807eb9719cef49c04177cc6b76a9a4251d5450e"
            )
            .unwrap()
        );
        assert_eq!(parity, Parity::Even);
        assert_eq!(
            output.address(Network::Mainnet).unwrap().to_string(),
            "bc1punvppl2stp38f7kwv2u2spltjuvuaayuqsthe34hd2dyy5w4g58qqfuag5"
        );

        let spends = output.script_path_spends().unwrap();
        assert_eq!(spends.len(), 1);
        assert_eq!(
            spends[0].control_block.serialize(),
            script("c093478e9488f956df2396be2ce6c5cced75f900dfa18e7dabd2428aae78451820")
        );
        assert!(verify_script_path(output_key, &spends[0]));
    }

    #[test]
    fn bip341_two_leaves() {
        // BIP-341 wallet vectors, scriptPubKey entry with two tapscript
        // leaves
        let script_a =
            script("2044b178d64c32c4a05cc4f4d1407268f764c940d20ce97abfd44db5c3592b72fdac");
        let script_b = script("07546170726f6f74");

        let leaf_a = LeafScript::tap_script(script_a.clone());
        let leaf_b = LeafScript::tap_script(script_b.clone());
        assert_eq!(
            leaf_a.tap_leaf_hash().into_tap_hash(),
            node("64512fecdb5afa04f98839b50e6f0cb7b1e539bf6f205f67934083cdcc3c8d89")
        );
        assert_eq!(
            leaf_b.tap_leaf_hash().into_tap_hash(),
            node("2cb2b90daa543b544161530c925f285b06196940d6085ca9474d41dc3822c5cb")
        );

        let tree = TapTree::branch(TapTree::Leaf(leaf_a), TapTree::Leaf(leaf_b)).unwrap();
        assert_eq!(
            tree.merkle_root(),
            node("ab179431c28d3b68fb798957faf5497d69c883c6fb1e1cd9f81483d87bac90cc")
        );

        let output = TaprootOutput::with_tree(
            internal("f9f400803e683727b14f463836e1e78e1c64417638aa066919291a225f0e8dd8"),
            tree,
        );
        let (output_key, parity) = output.output_key().unwrap();
        assert_eq!(
            output_key.to_byte_array(),
            <[u8; 32]>::from_hex(
                "77e30a5522dd9f894c3f8b8bd4c4b2cf82ca7da8a3ea6a239655c39c050ab220"
            )
            .unwrap()
        );
        assert_eq!(parity, Parity::Odd);
        assert_eq!(
            output.script_pubkey().unwrap(),
            script("512077e30a5522dd9f894c3f8b8bd4c4b2cf82ca7da8a3ea6a239655c39c050ab220")
        );
        assert_eq!(
            output.address(Network::Mainnet).unwrap().to_string(),
            "bc1pwl3s54fzmk0cjnpl3w9af39je7pv5ldg504x5guk2hpecpg2kgsqaqstjq"
        );

        let spends = output.script_path_spends().unwrap();
        assert_eq!(spends.len(), 2);
        assert_eq!(spends[0].script.script, script_a);
        assert_eq!(spends[1].script.script, script_b);
        assert_eq!(
            spends[0].control_block.serialize(),
            script(
                "c1f9f400803e683727b14f463836e1e78e1c64417638aa066919291a225f0e8dd8\
                 2cb2b90daa543b544161530c925f285b06196940d6085ca9474d41dc3822c5cb"
            )
        );
        assert_eq!(
            spends[1].control_block.serialize(),
            script(
                "c1f9f400803e683727b14f463836e1e78e1c64417638aa066919291a225f0e8dd8\
                 64512fecdb5afa04f98839b50e6f0cb7b1e539bf6f205f67934083cdcc3c8d89"
            )
        );
        for spend in &spends {
            assert!(verify_script_path(output_key, spend));
        }

        // tampering with the script must break verification
        let mut broken = spends[0].clone();
        broken.script.script[1] ^= 0x01;
        assert!(!verify_script_path(output_key, &broken));

        // so must a wrong parity bit
        let mut broken = spends[0].clone();
        broken.control_block.output_key_parity = Parity::Even;
        assert!(!verify_script_path(output_key, &broken));
    }

    #[test]
    fn hidden_commitment_preserves_root() {
        let leaf_a = TapTree::with_tap_script(script("51"));
        let leaf_b = TapTree::with_tap_script(script("52"));
        let hidden_b = TapTree::hidden(leaf_b.merkle_root());

        let full = TapTree::branch(leaf_a.clone(), leaf_b).unwrap();
        let pruned = TapTree::branch(leaf_a, hidden_b).unwrap();
        assert_eq!(full.merkle_root(), pruned.merkle_root());

        // only the known leaf is enumerated, with the same proof as in the
        // full tree
        let full_proofs = full.merkle_proofs();
        let pruned_proofs = pruned.merkle_proofs();
        assert_eq!(full_proofs.len(), 2);
        assert_eq!(pruned_proofs.len(), 1);
        assert_eq!(full_proofs[0], pruned_proofs[0]);

        let output = TaprootOutput::with_tree(
            internal("d6889cb081036e0faefa3a35157ad71086b123b2b144b649798b494c300a961d"),
            pruned,
        );
        let (output_key, _) = output.output_key().unwrap();
        let spends = output.script_path_spends().unwrap();
        assert_eq!(spends.len(), 1);
        assert!(verify_script_path(output_key, &spends[0]));
    }

    #[test]
    fn nested_tree_spends_verify() {
        // tree of three leaves: ((A, B), C)
        let a = TapTree::with_tap_script(script("51"));
        let b = TapTree::with_tap_script(script("52"));
        let c = TapTree::with_tap_script(script("53"));
        let tree = TapTree::branch(TapTree::branch(a, b).unwrap(), c).unwrap();
        assert_eq!(tree.depth(), 2);

        let output = TaprootOutput::with_tree(
            internal("93478e9488f956df2396be2ce6c5cced75f900dfa18e7dabd2428aae78451820"),
            tree,
        );
        let (output_key, _) = output.output_key().unwrap();
        let spends = output.script_path_spends().unwrap();
        assert_eq!(spends.len(), 3);
        assert_eq!(spends[0].control_block.merkle_branch.len(), 2);
        assert_eq!(spends[2].control_block.merkle_branch.len(), 1);
        for spend in &spends {
            assert!(verify_script_path(output_key, spend));
        }
    }

    #[test]
    fn control_block_roundtrip() {
        let output = TaprootOutput::with_tree(
            internal("93478e9488f956df2396be2ce6c5cced75f900dfa18e7dabd2428aae78451820"),
            TapTree::branch(
                TapTree::with_tap_script(script("51")),
                TapTree::with_tap_script(script("52")),
            )
            .unwrap(),
        );
        for spend in output.script_path_spends().unwrap() {
            let serialized = spend.control_block.serialize();
            assert_eq!(
                ControlBlock::deserialize(&serialized),
                Ok(spend.control_block)
            );
        }
    }

    #[test]
    fn control_block_rejects_malformed() {
        assert_eq!(
            ControlBlock::deserialize(&[0xC0; 32]),
            Err(ControlBlockError::InvalidLength(32))
        );
        assert_eq!(
            ControlBlock::deserialize(&[0xC0; 50]),
            Err(ControlBlockError::InvalidLength(50))
        );
        // annex prefix is not a valid leaf version
        let mut data = vec![0x50];
        data.extend_from_slice(&[0x01; 32]);
        assert_eq!(
            ControlBlock::deserialize(&data),
            Err(ControlBlockError::InvalidLeafVer(InvalidLeafVer(0x50)))
        );
    }

    #[test]
    fn witness_stack_order() {
        let output = TaprootOutput::with_tree(
            internal("93478e9488f956df2396be2ce6c5cced75f900dfa18e7dabd2428aae78451820"),
            TapTree::with_tap_script(script("51")),
        );
        let mut spend = output.script_path_spends().unwrap().remove(0);
        spend.stack = vec![vec![0xAA], vec![0xBB]];
        spend.annex = Some(Annex::new(vec![TAPROOT_ANNEX_PREFIX, 0x01]).unwrap());

        let witness = spend.to_witness();
        assert_eq!(witness.len(), 5);
        assert_eq!(witness[0], vec![0xAA]);
        assert_eq!(witness[1], vec![0xBB]);
        assert_eq!(witness[2], script("51"));
        assert_eq!(witness[3], spend.control_block.serialize());
        assert_eq!(witness[4], vec![TAPROOT_ANNEX_PREFIX, 0x01]);
    }

    #[test]
    fn annex_prefix_check() {
        assert_eq!(Annex::new(vec![]), Err(AnnexError::Empty));
        assert_eq!(Annex::new(vec![0x51]), Err(AnnexError::WrongFirstByte(0x51)));
        assert!(Annex::new(vec![0x50, 0xFF]).is_ok());
    }

    #[test]
    fn tree_depth_limit() {
        let mut tree = TapTree::with_tap_script(script("51"));
        for _ in 0..TAPROOT_MAX_MERKLE_PATH_LEN {
            tree = TapTree::branch(tree, TapTree::with_tap_script(script("52"))).unwrap();
        }
        assert_eq!(
            TapTree::branch(tree, TapTree::with_tap_script(script("53"))),
            Err(MaxDepthExceeded)
        );
    }
}
