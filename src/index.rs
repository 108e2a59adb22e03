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

//! Typed derivation-path segments: normal (unhardened), hardened and mixed
//! index types together with their textual forms.

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::num::ParseIntError;
use std::str::FromStr;

use crate::HARDENED_INDEX_BOUNDARY;

/// invalid derivation index value {0}; it must be lower than 2^31.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub struct IndexOverflow(pub u32);

/// Errors parsing derivation index strings.
#[derive(Clone, Eq, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum IndexParseError {
    /// invalid decimal integer in derivation index: {0}
    #[from]
    InvalidInteger(ParseIntError),

    /// Index value overflowing the hardened boundary.
    #[display(inner)]
    #[from]
    Overflow(IndexOverflow),

    /// hardened derivation suffix is not allowed for a normal (unhardened)
    /// index.
    UnexpectedHardenedSuffix,

    /// hardened index must be marked with a `'`, `h` or `H` suffix.
    ExpectedHardenedSuffix,
}

/// normal derivation index {0} met when a hardened index was required.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub struct HardenedIndexExpected(pub NormalIndex);

/// hardened derivation index {0} met when a normal (unhardened) index was
/// required.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub struct UnhardenedIndexExpected(pub HardenedIndex);

/// Trait defining common API for different types of indexes which may be
/// present in a certain derivation path segment: hardened, normal, mixed.
pub trait Idx
where
    Self: Sized + Copy + Eq + Ord,
{
    /// Index equal to zero.
    const ZERO: Self;

    /// Index equal to one.
    const ONE: Self;

    /// Largest index value (2^31 - 1 within the segment class).
    const MAX: Self;

    /// Constructs index from a zero-based value, which must lie in range
    /// `0..`[`HARDENED_INDEX_BOUNDARY`].
    fn from_index(index: u32) -> Result<Self, IndexOverflow>;

    /// Returns zero-based index value, always lower than
    /// [`HARDENED_INDEX_BOUNDARY`].
    fn index(&self) -> u32;

    /// Returns the raw 32-bit value used during the derivation (bit 31 set
    /// for hardened indexes).
    fn to_derivation_value(&self) -> u32;

    /// Increases the index by one step; fails on overflow over
    /// [`HARDENED_INDEX_BOUNDARY`].
    fn checked_inc(&self) -> Option<Self>;

    /// Increases the index by one step, wrapping [`Idx::MAX`] back to
    /// [`Idx::ZERO`].
    fn wrapping_inc(&self) -> Self {
        self.checked_inc().unwrap_or(Self::ZERO)
    }

    /// Detects whether the index is a hardened one.
    fn is_hardened(&self) -> bool;
}

/// Index for normal (unhardened) children derivation; ensures that the inner
/// value is always < 2^31.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug, Display, From)]
#[display(inner)]
pub struct NormalIndex(
    #[from(u8)]
    #[from(u16)]
    u32,
);

impl Idx for NormalIndex {
    const ZERO: Self = NormalIndex(0);
    const ONE: Self = NormalIndex(1);
    const MAX: Self = NormalIndex(HARDENED_INDEX_BOUNDARY - 1);

    fn from_index(index: u32) -> Result<Self, IndexOverflow> {
        if index >= HARDENED_INDEX_BOUNDARY {
            return Err(IndexOverflow(index));
        }
        Ok(NormalIndex(index))
    }

    #[inline]
    fn index(&self) -> u32 { self.0 }

    #[inline]
    fn to_derivation_value(&self) -> u32 { self.0 }

    #[inline]
    fn checked_inc(&self) -> Option<Self> {
        if self.0 >= HARDENED_INDEX_BOUNDARY - 1 {
            return None;
        }
        Some(NormalIndex(self.0 + 1))
    }

    #[inline]
    fn is_hardened(&self) -> bool { false }
}

impl NormalIndex {
    /// Returns an infinite iterator over normal indexes starting from `self`
    /// and wrapping at the hardened boundary back to zero.
    #[inline]
    pub fn cycle(self) -> IndexCycle { IndexCycle { next: self } }
}

impl FromStr for NormalIndex {
    type Err = IndexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.ends_with(['\'', 'h', 'H']) {
            return Err(IndexParseError::UnexpectedHardenedSuffix);
        }
        Ok(NormalIndex::from_index(u32::from_str(s)?)?)
    }
}

/// Index for hardened children derivation; the inner value is zero-based,
/// i.e. always reduced by [`HARDENED_INDEX_BOUNDARY`].
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", transparent)
)]
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default, Debug, Display, From)]
#[display("{0}'", alt = "{0}h")]
pub struct HardenedIndex(
    #[from(u8)]
    #[from(u16)]
    u32,
);

impl Idx for HardenedIndex {
    const ZERO: Self = HardenedIndex(0);
    const ONE: Self = HardenedIndex(1);
    const MAX: Self = HardenedIndex(HARDENED_INDEX_BOUNDARY - 1);

    fn from_index(index: u32) -> Result<Self, IndexOverflow> {
        if index >= HARDENED_INDEX_BOUNDARY {
            return Err(IndexOverflow(index));
        }
        Ok(HardenedIndex(index))
    }

    #[inline]
    fn index(&self) -> u32 { self.0 }

    #[inline]
    fn to_derivation_value(&self) -> u32 { self.0 | HARDENED_INDEX_BOUNDARY }

    #[inline]
    fn checked_inc(&self) -> Option<Self> {
        if self.0 >= HARDENED_INDEX_BOUNDARY - 1 {
            return None;
        }
        Some(HardenedIndex(self.0 + 1))
    }

    #[inline]
    fn is_hardened(&self) -> bool { true }
}

impl FromStr for HardenedIndex {
    type Err = IndexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s
            .strip_suffix(['\'', 'h', 'H'])
            .ok_or(IndexParseError::ExpectedHardenedSuffix)?;
        Ok(HardenedIndex::from_index(u32::from_str(s)?)?)
    }
}

/// Derivation segment which may be either hardened or normal.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "camelCase")
)]
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, From)]
pub enum DerivationIndex {
    /// Normal derivation segment usable in both public and private
    /// derivation.
    #[from]
    #[from(u8)]
    #[from(u16)]
    Normal(NormalIndex),

    /// Hardened derivation segment requiring access to the parent private
    /// key.
    #[from]
    Hardened(HardenedIndex),
}

impl DerivationIndex {
    /// Constructs normal derivation segment; errors if the value overflows
    /// the hardened boundary.
    #[inline]
    pub fn normal(index: u32) -> Result<Self, IndexOverflow> {
        NormalIndex::from_index(index).map(Self::Normal)
    }

    /// Constructs hardened derivation segment from a zero-based index value;
    /// errors if the value overflows the hardened boundary.
    #[inline]
    pub fn hardened(index: u32) -> Result<Self, IndexOverflow> {
        HardenedIndex::from_index(index).map(Self::Hardened)
    }

    /// Constructs segment from the raw 32-bit derivation value, interpreting
    /// bit 31 as the hardness flag. The conversion is total.
    #[inline]
    pub fn from_derivation_value(value: u32) -> Self {
        if value & HARDENED_INDEX_BOUNDARY != 0 {
            DerivationIndex::Hardened(HardenedIndex(value ^ HARDENED_INDEX_BOUNDARY))
        } else {
            DerivationIndex::Normal(NormalIndex(value))
        }
    }
}

impl Idx for DerivationIndex {
    const ZERO: Self = DerivationIndex::Normal(NormalIndex::ZERO);
    const ONE: Self = DerivationIndex::Normal(NormalIndex::ONE);
    const MAX: Self = DerivationIndex::Hardened(HardenedIndex::MAX);

    #[inline]
    fn from_index(index: u32) -> Result<Self, IndexOverflow> {
        NormalIndex::from_index(index).map(Self::Normal)
    }

    #[inline]
    fn index(&self) -> u32 {
        match self {
            DerivationIndex::Normal(index) => index.index(),
            DerivationIndex::Hardened(index) => index.index(),
        }
    }

    #[inline]
    fn to_derivation_value(&self) -> u32 {
        match self {
            DerivationIndex::Normal(index) => index.to_derivation_value(),
            DerivationIndex::Hardened(index) => index.to_derivation_value(),
        }
    }

    #[inline]
    fn checked_inc(&self) -> Option<Self> {
        match self {
            DerivationIndex::Normal(index) => index.checked_inc().map(Self::Normal),
            DerivationIndex::Hardened(index) => index.checked_inc().map(Self::Hardened),
        }
    }

    #[inline]
    fn is_hardened(&self) -> bool {
        matches!(self, DerivationIndex::Hardened(_))
    }
}

// The ordering is not the ordering of raw derivation values: segments
// compare by their zero-based index first, with hardness breaking the tie
// (hardened greater). Under raw-value ordering any hardened index would
// exceed any normal one.
impl Ord for DerivationIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index()
            .cmp(&other.index())
            .then_with(|| self.is_hardened().cmp(&other.is_hardened()))
    }
}

impl PartialOrd for DerivationIndex {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl TryFrom<DerivationIndex> for NormalIndex {
    type Error = UnhardenedIndexExpected;

    fn try_from(value: DerivationIndex) -> Result<Self, Self::Error> {
        match value {
            DerivationIndex::Normal(index) => Ok(index),
            DerivationIndex::Hardened(index) => Err(UnhardenedIndexExpected(index)),
        }
    }
}

impl TryFrom<DerivationIndex> for HardenedIndex {
    type Error = HardenedIndexExpected;

    fn try_from(value: DerivationIndex) -> Result<Self, Self::Error> {
        match value {
            DerivationIndex::Hardened(index) => Ok(index),
            DerivationIndex::Normal(index) => Err(HardenedIndexExpected(index)),
        }
    }
}

impl Display for DerivationIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DerivationIndex::Normal(index) => Display::fmt(index, f),
            DerivationIndex::Hardened(index) => Display::fmt(index, f),
        }
    }
}

impl FromStr for DerivationIndex {
    type Err = IndexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_suffix(['\'', 'h', 'H']) {
            Some(base) => Ok(HardenedIndex::from_index(u32::from_str(base)?)?.into()),
            None => Ok(NormalIndex::from_index(u32::from_str(s)?)?.into()),
        }
    }
}

/// Infinite restartable iterator over normal derivation indexes wrapping at
/// the hardened boundary back to zero.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct IndexCycle {
    next: NormalIndex,
}

impl IndexCycle {
    /// Constructs the cycle starting from the given index.
    #[inline]
    pub fn starting_from(start: NormalIndex) -> Self { IndexCycle { next: start } }
}

impl Iterator for IndexCycle {
    type Item = NormalIndex;

    fn next(&mut self) -> Option<Self::Item> {
        let curr = self.next;
        self.next = curr.wrapping_inc();
        Some(curr)
    }
}
