//! Set-valued attribute semantics.
//!
//! Every node and edge in an [`AttrGraph`](crate::graph::AttrGraph) carries a
//! map from attribute key to a finite *set* of scalars. A key missing from
//! the map ("no attribute") is distinct from a key present but mapped to the
//! empty set ("empty set").

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The name of an attribute. Schema-less: any string is a valid key.
pub type AttrKey = String;

/// A primitive attribute scalar.
///
/// `Ord` is derived so that `Bool < Int < Str`, giving `AttrVal`'s backing
/// `BTreeSet` one canonical iteration order regardless of insertion order;
/// this is what makes `AttrVal` usable as a deterministic serialization and
/// equality target.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

/// A finite set of scalars: the value type of one attribute key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttrVal(BTreeSet<Scalar>);

impl AttrVal {
    pub fn new() -> Self {
        AttrVal(BTreeSet::new())
    }

    pub fn singleton(s: impl Into<Scalar>) -> Self {
        let mut set = BTreeSet::new();
        set.insert(s.into());
        AttrVal(set)
    }

    pub fn from_scalars(scalars: impl IntoIterator<Item = Scalar>) -> Self {
        AttrVal(scalars.into_iter().collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scalar> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, s: &Scalar) -> bool {
        self.0.contains(s)
    }

    /// `true` iff every element of `self` is also an element of `other`.
    pub fn is_subset(&self, other: &AttrVal) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn union(&self, other: &AttrVal) -> AttrVal {
        AttrVal(self.0.union(&other.0).cloned().collect())
    }

    pub fn intersect(&self, other: &AttrVal) -> AttrVal {
        AttrVal(self.0.intersection(&other.0).cloned().collect())
    }

    pub fn difference(&self, other: &AttrVal) -> AttrVal {
        AttrVal(self.0.difference(&other.0).cloned().collect())
    }

    pub fn equal(&self, other: &AttrVal) -> bool {
        self.0 == other.0
    }
}

impl FromIterator<Scalar> for AttrVal {
    fn from_iter<T: IntoIterator<Item = Scalar>>(iter: T) -> Self {
        AttrVal(iter.into_iter().collect())
    }
}

/// Converts scalars, collections of scalars, or an existing [`AttrVal`] into
/// an `AttrVal`, so that callers of attribute-writing primitives can pass
/// whichever is most convenient and have it lifted via [`normalize`].
pub trait IntoAttrValue {
    fn into_attr_value(self) -> AttrVal;
}

impl IntoAttrValue for AttrVal {
    fn into_attr_value(self) -> AttrVal {
        self
    }
}

impl<T: Into<Scalar>> IntoAttrValue for T {
    fn into_attr_value(self) -> AttrVal {
        AttrVal::singleton(self.into())
    }
}

impl IntoAttrValue for Vec<Scalar> {
    fn into_attr_value(self) -> AttrVal {
        AttrVal::from_scalars(self)
    }
}

/// Lift a bare scalar to a singleton set; leave an already-set-valued input
/// unchanged. Every graph primitive that writes attributes routes its input
/// through this so callers may pass scalars or sets interchangeably.
pub fn normalize(v: impl IntoAttrValue) -> AttrVal {
    v.into_attr_value()
}

pub fn union(a: &AttrVal, b: &AttrVal) -> AttrVal {
    a.union(b)
}

pub fn intersect(a: &AttrVal, b: &AttrVal) -> AttrVal {
    a.intersect(b)
}

pub fn difference(a: &AttrVal, b: &AttrVal) -> AttrVal {
    a.difference(b)
}

pub fn subset(a: &AttrVal, b: &AttrVal) -> bool {
    a.is_subset(b)
}

pub fn equal(a: &AttrVal, b: &AttrVal) -> bool {
    a.equal(b)
}

/// An attribute map: schema-less key → set-of-scalars.
pub type AttrMap = std::collections::BTreeMap<AttrKey, AttrVal>;

/// `Attrs_A(x) ⊆ Attrs_B(y)` pointwise per key: a key absent from `a`
/// trivially satisfies the condition; a key present in `a` must be present
/// in `b` and be a superset there.
pub fn attrs_subset(a: &AttrMap, b: &AttrMap) -> bool {
    a.iter().all(|(k, v)| match b.get(k) {
        Some(bv) => v.is_subset(bv),
        None => v.is_empty(),
    })
}

/// Pointwise union of two attribute maps (used by pushout/merge).
pub fn attrs_union(a: &AttrMap, b: &AttrMap) -> AttrMap {
    let mut out = a.clone();
    for (k, v) in b {
        out.entry(k.clone())
            .and_modify(|existing| *existing = existing.union(v))
            .or_insert_with(|| v.clone());
    }
    out
}

/// Pointwise intersection of two attribute maps (used by pullback); a key
/// missing from either side is dropped, since "no attribute" intersected
/// with anything is "no attribute".
pub fn attrs_intersect(a: &AttrMap, b: &AttrMap) -> AttrMap {
    let mut out = AttrMap::new();
    for (k, v) in a {
        if let Some(bv) = b.get(k) {
            out.insert(k.clone(), v.intersect(bv));
        }
    }
    out
}
