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

//! Derivation paths over typed segments and their application to extended
//! keys.
//!
//! [`DerivationPath`] is generic over the segment type: instantiated with
//! [`NormalIndex`] it can never contain a hardened step and is usable with
//! any extended public key; with [`HardenedIndex`] it is hard-only; with the
//! default [`DerivationIndex`] both kinds of steps may mix.

use core::fmt::{self, Display, Formatter};
use core::str::FromStr;
use std::borrow::{Borrow, BorrowMut};
use std::ops::{Deref, DerefMut};

use crate::index::{
    DerivationIndex, HardenedIndex, HardenedIndexExpected, Idx, IndexParseError, NormalIndex,
    UnhardenedIndexExpected,
};
use crate::xkey::{DeriveError, ExtendedKey, Xpriv, Xpub};

/// Errors parsing derivation path strings.
#[derive(Clone, Eq, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum DerivationParseError {
    /// derivation path contains an empty segment.
    EmptySegment,

    /// Error parsing one of the path segments.
    #[display(inner)]
    #[from]
    InvalidIndex(IndexParseError),
}

/// Derivation path consisting of a single type of segments.
///
/// Depending on the segment type the path is guaranteed to be normal-only
/// (usable for public derivation), hardened-only, or may mix both segment
/// kinds.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, From)]
pub struct DerivationPath<Segment = DerivationIndex>(Vec<Segment>)
where
    Segment: Idx;

impl<Segment> Deref for DerivationPath<Segment>
where
    Segment: Idx,
{
    type Target = Vec<Segment>;

    fn deref(&self) -> &Self::Target { &self.0 }
}

impl<Segment> DerefMut for DerivationPath<Segment>
where
    Segment: Idx,
{
    fn deref_mut(&mut self) -> &mut Self::Target { &mut self.0 }
}

impl<Segment> Default for DerivationPath<Segment>
where
    Segment: Idx,
{
    fn default() -> Self { Self(vec![]) }
}

impl<Segment> From<&[Segment]> for DerivationPath<Segment>
where
    Segment: Idx,
{
    fn from(path: &[Segment]) -> Self { Self(path.to_vec()) }
}

impl<Segment> AsRef<[Segment]> for DerivationPath<Segment>
where
    Segment: Idx,
{
    #[inline]
    fn as_ref(&self) -> &[Segment] { &self.0 }
}

impl<Segment> Borrow<[Segment]> for DerivationPath<Segment>
where
    Segment: Idx,
{
    #[inline]
    fn borrow(&self) -> &[Segment] { &self.0 }
}

impl<Segment> BorrowMut<[Segment]> for DerivationPath<Segment>
where
    Segment: Idx,
{
    #[inline]
    fn borrow_mut(&mut self) -> &mut [Segment] { &mut self.0 }
}

impl<Segment> IntoIterator for DerivationPath<Segment>
where
    Segment: Idx,
{
    type Item = Segment;
    type IntoIter = std::vec::IntoIter<Segment>;

    fn into_iter(self) -> Self::IntoIter { self.0.into_iter() }
}

impl<'path, Segment> IntoIterator for &'path DerivationPath<Segment>
where
    Segment: Idx,
{
    type Item = Segment;
    type IntoIter = std::iter::Copied<std::slice::Iter<'path, Segment>>;

    fn into_iter(self) -> Self::IntoIter { self.0.iter().copied() }
}

impl<Segment> FromIterator<Segment> for DerivationPath<Segment>
where
    Segment: Idx,
{
    fn from_iter<T: IntoIterator<Item = Segment>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<Segment> Extend<Segment> for DerivationPath<Segment>
where
    Segment: Idx,
{
    fn extend<T: IntoIterator<Item = Segment>>(&mut self, iter: T) { self.0.extend(iter) }
}

impl<Segment> DerivationPath<Segment>
where
    Segment: Idx,
{
    /// Constructs empty derivation path, matching the master key.
    pub fn new() -> Self { Self::default() }

    /// Detects whether the path corresponds to the master key, i.e. is
    /// empty.
    #[inline]
    pub fn is_master(&self) -> bool { self.0.is_empty() }

    /// Constructs a new path with `child` appended at the end.
    pub fn child(&self, child: Segment) -> Self {
        let mut path = self.clone();
        path.push(child);
        path
    }

    /// Concatenates `self` with another sequence of segments of the same
    /// type, returning the resulting new path.
    pub fn extended(&self, tail: impl IntoIterator<Item = Segment>) -> Self {
        let mut path = self.clone();
        path.extend(tail);
        path
    }

    /// Counts the length of the longest shared prefix with `other`.
    pub fn shared_prefix(&self, other: impl AsRef<[Segment]>) -> usize {
        self.0
            .iter()
            .zip(other.as_ref())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Detects whether `prefix` is a prefix of this path.
    pub fn starts_with(&self, prefix: impl AsRef<[Segment]>) -> bool {
        let prefix = prefix.as_ref();
        self.shared_prefix(prefix) == prefix.len()
    }

    /// Widens the path into a mixed-segment path. The conversion is total
    /// and preserves hardness of each segment.
    pub fn to_any(&self) -> DerivationPath<DerivationIndex>
    where
        Segment: Into<DerivationIndex>,
    {
        self.0.iter().map(|segment| (*segment).into()).collect()
    }
}

impl DerivationPath<DerivationIndex> {
    /// Narrows the path into a normal-only path; errors on the first
    /// hardened segment.
    pub fn to_normal(&self) -> Result<DerivationPath<NormalIndex>, UnhardenedIndexExpected> {
        self.0
            .iter()
            .map(|segment| NormalIndex::try_from(*segment))
            .collect()
    }

    /// Narrows the path into a hardened-only path; errors on the first
    /// normal segment.
    pub fn to_hardened(&self) -> Result<DerivationPath<HardenedIndex>, HardenedIndexExpected> {
        self.0
            .iter()
            .map(|segment| HardenedIndex::try_from(*segment))
            .collect()
    }

    /// Detects whether the path contains no hardened segments.
    #[inline]
    pub fn is_normal(&self) -> bool { !self.0.iter().any(Idx::is_hardened) }
}

impl From<DerivationPath<NormalIndex>> for DerivationPath<DerivationIndex> {
    fn from(path: DerivationPath<NormalIndex>) -> Self { path.to_any() }
}

impl From<DerivationPath<HardenedIndex>> for DerivationPath<DerivationIndex> {
    fn from(path: DerivationPath<HardenedIndex>) -> Self { path.to_any() }
}

impl<Segment> Display for DerivationPath<Segment>
where
    Segment: Idx + Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut iter = self.0.iter();
        if let Some(first) = iter.next() {
            Display::fmt(first, f)?;
        }
        for segment in iter {
            f.write_str("/")?;
            Display::fmt(segment, f)?;
        }
        Ok(())
    }
}

impl<Segment> FromStr for DerivationPath<Segment>
where
    Segment: Idx + FromStr<Err = IndexParseError>,
{
    type Err = DerivationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == "m" || s == "m/" {
            return Ok(Self::new());
        }
        let s = s.strip_prefix("m/").unwrap_or(s);
        s.split('/')
            .map(|segment| {
                if segment.is_empty() {
                    return Err(DerivationParseError::EmptySegment);
                }
                Segment::from_str(segment).map_err(DerivationParseError::from)
            })
            .collect()
    }
}

/// Parsed textual derivation path carrying its application mode.
///
/// A leading `m` means "derive on the private side"; a leading `M` means
/// "derive and present the result as an extended public key"; the absence of
/// a prefix leaves the interpretation to the key the path is applied to.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum ParsedPath {
    /// `m/`-prefixed path requiring an extended private key.
    Private(DerivationPath),

    /// `M/`-prefixed path producing an extended public key.
    Public(DerivationPath),

    /// Path without a prefix; the interpretation is defined by the key it is
    /// applied to.
    Bare(DerivationPath),
}

/// Errors applying a [`ParsedPath`] to an extended key.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum ApplyError {
    /// a `m/`-prefixed derivation path requires an extended private key.
    PrivateKeyExpected,

    /// public derivation is impossible for a path containing hardened
    /// segments.
    HardenedStep,

    /// Error from the derivation engine.
    #[display(inner)]
    #[from]
    Derive(DeriveError),
}

impl ParsedPath {
    /// Returns the inner derivation path without the application mode.
    pub fn path(&self) -> &DerivationPath {
        match self {
            ParsedPath::Private(path) | ParsedPath::Public(path) | ParsedPath::Bare(path) => path,
        }
    }

    /// Applies the path to the given extended key following the prefix
    /// rules.
    ///
    /// - `m/` derives privately and fails on public keys;
    /// - `M/` derives privately and projects to an xpub, or, when only an
    ///   xpub is given, derives publicly and fails on hardened segments;
    /// - a bare path derives privately on private keys and behaves as `M/`
    ///   on public ones.
    pub fn apply(&self, key: &ExtendedKey) -> Result<ExtendedKey, ApplyError> {
        match (self, key) {
            (ParsedPath::Private(path), ExtendedKey::Xpriv(xpriv)) => {
                Ok(xpriv.derive_priv(path)?.into())
            }
            (ParsedPath::Private(_), ExtendedKey::Xpub(_)) => Err(ApplyError::PrivateKeyExpected),
            (ParsedPath::Public(path), ExtendedKey::Xpriv(xpriv)) => {
                Ok(xpriv.derive_priv(path)?.to_xpub().into())
            }
            (ParsedPath::Bare(path), ExtendedKey::Xpriv(xpriv)) => {
                Ok(xpriv.derive_priv(path)?.into())
            }
            (ParsedPath::Public(path) | ParsedPath::Bare(path), ExtendedKey::Xpub(xpub)) => {
                let path = path.to_normal().map_err(|_| ApplyError::HardenedStep)?;
                Ok(xpub.derive_pub(&path)?.into())
            }
        }
    }

    /// Applies the path to an extended private key.
    #[inline]
    pub fn apply_priv(&self, xpriv: &Xpriv) -> Result<ExtendedKey, ApplyError> {
        self.apply(&ExtendedKey::Xpriv(*xpriv))
    }

    /// Applies the path to an extended public key.
    #[inline]
    pub fn apply_pub(&self, xpub: &Xpub) -> Result<ExtendedKey, ApplyError> {
        self.apply(&ExtendedKey::Xpub(*xpub))
    }
}

impl Display for ParsedPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let path = match self {
            ParsedPath::Private(path) => {
                f.write_str("m")?;
                path
            }
            ParsedPath::Public(path) => {
                f.write_str("M")?;
                path
            }
            ParsedPath::Bare(path) => path,
        };
        for segment in path.iter() {
            f.write_str("/")?;
            Display::fmt(segment, f)?;
        }
        Ok(())
    }
}

impl FromStr for ParsedPath {
    type Err = DerivationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "m" {
            return Ok(ParsedPath::Private(DerivationPath::new()));
        }
        if s == "M" {
            return Ok(ParsedPath::Public(DerivationPath::new()));
        }
        if let Some(tail) = s.strip_prefix("m/") {
            return Ok(ParsedPath::Private(DerivationPath::from_str(tail)?));
        }
        if let Some(tail) = s.strip_prefix("M/") {
            return Ok(ParsedPath::Public(DerivationPath::from_str(tail)?));
        }
        Ok(ParsedPath::Bare(DerivationPath::from_str(s)?))
    }
}
