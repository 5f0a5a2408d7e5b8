//! Curve collections
//!
//! A [`CurveCollection`] is an ordered multiset of shared curve handles
//! ([`CurveRef`]). Handles compare by identity: two curves built separately
//! from identical records are different elements, while the same handle held
//! by two collections is one element. Set algebra deduplicates by identity;
//! concatenation keeps order and duplicates.
//!
//! Every derived result is again a `CurveCollection`, so operations chain:
//!
//! ```rust
//! use tds_common::{CurveCollection, KeySelector, TrialRecord};
//!
//! let records = vec![
//!     TrialRecord::new([("SWEET", vec![1.0]), ("SOUR", vec![3.0])], 8.0)
//!         .with_meta("product", "A"),
//!     TrialRecord::new([("SWEET", vec![2.0]), ("SOUR", vec![0.5])], 6.0)
//!         .with_meta("product", "B"),
//!     TrialRecord::new([("SWEET", vec![0.4]), ("SOUR", vec![5.0])], 9.0)
//!         .with_meta("product", "A"),
//! ];
//! let panel = CurveCollection::from_records(&records, 100).unwrap();
//!
//! let by_product = panel.group_by(KeySelector::metadata("product"));
//! let product_a = by_product.values().next().unwrap().merge_as("Product A").unwrap();
//! assert_eq!(product_a.trial_count(), 2);
//! ```

use crate::curve::DominanceCurve;
use crate::meta::{MetaKey, normalize_key};
use crate::record::TrialRecord;
use crate::{Error, Result};
use indexmap::{IndexMap, IndexSet};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rand::Rng;
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, BitAnd, BitOr, BitXor, Range, Sub};
use std::sync::Arc;
use tracing::debug;

/// Shared handle to a curve with identity semantics
///
/// Cloning the handle does not copy the curve. Equality and hashing use the
/// allocation address, never the curve's contents.
#[derive(Debug, Clone)]
pub struct CurveRef(Arc<RwLock<DominanceCurve>>);

impl CurveRef {
    pub fn new(curve: DominanceCurve) -> Self {
        Self(Arc::new(RwLock::new(curve)))
    }

    /// Shared read access
    ///
    /// Recursive, so the same handle may be read more than once at a time
    /// (collections may hold duplicates).
    pub fn read(&self) -> RwLockReadGuard<'_, DominanceCurve> {
        self.0.read_recursive()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, DominanceCurve> {
        self.0.write()
    }

    pub fn ptr_eq(&self, other: &CurveRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Independent copy of the current curve state
    pub fn snapshot(&self) -> DominanceCurve {
        self.read().clone()
    }
}

impl From<DominanceCurve> for CurveRef {
    fn from(curve: DominanceCurve) -> Self {
        Self::new(curve)
    }
}

impl PartialEq for CurveRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for CurveRef {}

impl Hash for CurveRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

/// How `group_by` / `order_by` derive a key from a curve
pub enum KeySelector<'a> {
    /// Most recent metadata value under this key (null when absent)
    Metadata(String),
    /// Arbitrary function of the curve
    Function(Box<dyn Fn(&DominanceCurve) -> MetaKey + 'a>),
}

impl<'a> KeySelector<'a> {
    pub fn metadata(key: &str) -> Self {
        KeySelector::Metadata(normalize_key(key))
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&DominanceCurve) -> MetaKey + 'a,
    {
        KeySelector::Function(Box::new(f))
    }

    fn key_of(&self, curve: &DominanceCurve) -> MetaKey {
        match self {
            KeySelector::Metadata(key) => MetaKey::from(curve.get_meta(key).cloned()),
            KeySelector::Function(f) => f(curve),
        }
    }
}

/// Ordered multiset of shared dominance curves
#[derive(Debug, Clone, Default)]
pub struct CurveCollection {
    curves: Vec<CurveRef>,
}

impl CurveCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one single-trial curve per record, in record order
    pub fn from_records<'r, I>(records: I, resolution: usize) -> Result<Self>
    where
        I: IntoIterator<Item = &'r TrialRecord>,
    {
        records
            .into_iter()
            .map(|record| DominanceCurve::from_record(record, resolution))
            .collect()
    }

    pub fn from_refs<I>(refs: I) -> Self
    where
        I: IntoIterator<Item = CurveRef>,
    {
        Self {
            curves: refs.into_iter().collect(),
        }
    }

    /// Take ownership of a curve and append it; returns its handle
    pub fn push(&mut self, curve: DominanceCurve) -> CurveRef {
        let handle = CurveRef::new(curve);
        self.curves.push(handle.clone());
        handle
    }

    pub fn push_ref(&mut self, curve: CurveRef) {
        self.curves.push(curve);
    }

    pub fn len(&self) -> usize {
        self.curves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CurveRef> {
        self.curves.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CurveRef> {
        self.curves.iter()
    }

    pub fn contains(&self, curve: &CurveRef) -> bool {
        self.curves.contains(curve)
    }

    /// Sub-collection for an index range (clamped to the collection length)
    pub fn slice(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        Self::from_refs(self.curves[start..end].iter().cloned())
    }

    /// Sum of the members' trial counts (not the member count)
    pub fn trial_count(&self) -> usize {
        self.curves.iter().map(|c| c.read().trial_count()).sum()
    }

    // ------------------------------------------------------------------
    // Set algebra (by identity) and sequence operations
    // ------------------------------------------------------------------

    fn identities(&self) -> IndexSet<CurveRef> {
        self.curves.iter().cloned().collect()
    }

    /// Members of either collection, left operand first
    pub fn union(&self, other: &CurveCollection) -> Self {
        let mut set = self.identities();
        set.extend(other.curves.iter().cloned());
        Self::from_refs(set)
    }

    /// Members of both collections, in left operand order
    pub fn intersection(&self, other: &CurveCollection) -> Self {
        let right = other.identities();
        Self::from_refs(self.identities().into_iter().filter(|c| right.contains(c)))
    }

    /// Members of exactly one collection, left operand first
    pub fn symmetric_difference(&self, other: &CurveCollection) -> Self {
        let left = self.identities();
        let right = other.identities();
        Self::from_refs(
            left.iter()
                .filter(|c| !right.contains(*c))
                .chain(right.iter().filter(|c| !left.contains(*c)))
                .cloned(),
        )
    }

    /// Members of `self` that are not in `other`
    pub fn difference(&self, other: &CurveCollection) -> Self {
        let right = other.identities();
        Self::from_refs(self.identities().into_iter().filter(|c| !right.contains(c)))
    }

    /// Deduplicated collection without one curve
    pub fn without(&self, curve: &CurveRef) -> Self {
        Self::from_refs(self.identities().into_iter().filter(|c| c != curve))
    }

    /// Append without deduplication
    pub fn concat(&self, other: &CurveCollection) -> Self {
        Self::from_refs(self.curves.iter().chain(&other.curves).cloned())
    }

    /// The sequence repeated `times` times
    pub fn repeat(&self, times: usize) -> Self {
        Self {
            curves: (0..times).flat_map(|_| self.curves.iter().cloned()).collect(),
        }
    }

    /// Every (curve, item) pair, curves outermost
    pub fn product<T: Clone>(&self, items: &[T]) -> Vec<(CurveRef, T)> {
        self.curves
            .iter()
            .flat_map(|c| items.iter().map(move |item| (c.clone(), item.clone())))
            .collect()
    }

    // ------------------------------------------------------------------
    // Functional operations
    // ------------------------------------------------------------------

    /// Members for which `predicate` holds, order preserved
    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&DominanceCurve) -> bool,
    {
        Self::from_refs(self.curves.iter().filter(|c| predicate(&c.read())).cloned())
    }

    /// New collection of new curves produced by `f`; sources are untouched
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(&DominanceCurve) -> DominanceCurve,
    {
        Self::from_refs(self.curves.iter().map(|c| CurveRef::new(f(&c.read()))))
    }

    /// Fallible variant of [`map`](Self::map)
    pub fn try_map<F>(&self, f: F) -> Result<Self>
    where
        F: Fn(&DominanceCurve) -> Result<DominanceCurve>,
    {
        self.curves.iter().map(|c| f(&c.read())).collect()
    }

    /// Apply `f` to every member, collecting the results
    pub fn map_values<T, F>(&self, f: F) -> Vec<T>
    where
        F: Fn(&DominanceCurve) -> T,
    {
        self.curves.iter().map(|c| f(&c.read())).collect()
    }

    /// Partition into sub-collections keyed in first-occurrence order
    pub fn group_by(&self, selector: KeySelector<'_>) -> IndexMap<MetaKey, CurveCollection> {
        let mut groups: IndexMap<MetaKey, CurveCollection> = IndexMap::new();
        for curve in &self.curves {
            let key = selector.key_of(&curve.read());
            groups.entry(key).or_default().push_ref(curve.clone());
        }
        debug!("Grouped {} curves into {} groups", self.len(), groups.len());
        groups
    }

    /// Stable sort by key; descending keeps equal keys in their prior order
    pub fn order_by(&mut self, selector: KeySelector<'_>, descending: bool) -> &mut Self {
        let mut keyed: Vec<(MetaKey, CurveRef)> = self
            .curves
            .drain(..)
            .map(|c| {
                let key = selector.key_of(&c.read());
                (key, c)
            })
            .collect();
        if descending {
            keyed.sort_by(|a, b| b.0.cmp(&a.0));
        } else {
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
        }
        self.curves = keyed.into_iter().map(|(_, c)| c).collect();
        self
    }

    /// Resample `size` members (default: current length) uniformly with
    /// replacement
    pub fn bootstrap(&self, size: Option<usize>) -> Result<Self> {
        self.bootstrap_with(size, &mut rand::thread_rng())
    }

    /// [`bootstrap`](Self::bootstrap) with a caller-supplied random source
    pub fn bootstrap_with<R: Rng>(&self, size: Option<usize>, rng: &mut R) -> Result<Self> {
        let k = size.unwrap_or(self.len());
        if k > 0 && self.is_empty() {
            return Err(Error::InvalidInput(
                "cannot bootstrap from an empty collection".to_string(),
            ));
        }
        Ok(Self::from_refs(
            (0..k).map(|_| self.curves[rng.gen_range(0..self.len())].clone()),
        ))
    }

    // ------------------------------------------------------------------
    // Aggregation and statistics
    // ------------------------------------------------------------------

    /// Weighted average of every member
    pub fn merge(&self) -> Result<DominanceCurve> {
        let guards: Vec<_> = self.curves.iter().map(CurveRef::read).collect();
        DominanceCurve::merge(guards.iter().map(|g| &**g))
    }

    pub fn merge_as(&self, name: &str) -> Result<DominanceCurve> {
        let mut merged = self.merge()?;
        merged.set_name(name);
        Ok(merged)
    }

    /// Distance of every member from the merged average of the collection
    pub fn distance(&self) -> Result<Vec<f64>> {
        self.distance_with(DominanceCurve::distance)
    }

    /// [`distance`](Self::distance) with a custom distance function
    pub fn distance_with<F>(&self, distance: F) -> Result<Vec<f64>>
    where
        F: Fn(&DominanceCurve, &DominanceCurve) -> Result<f64>,
    {
        let merged = self.merge()?;
        self.curves.iter().map(|c| distance(&c.read(), &merged)).collect()
    }

    // ------------------------------------------------------------------
    // Batch metadata
    // ------------------------------------------------------------------

    pub fn get_meta(&self, key: &str) -> Vec<Option<Value>> {
        self.map_values(|c| c.get_meta(key).cloned())
    }

    pub fn get_meta_all(&self, key: &str) -> Vec<Vec<Value>> {
        self.map_values(|c| c.get_meta_all(key).to_vec())
    }

    /// Prepend `value` under `key` on every member (shared curves included)
    pub fn set_meta(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        for curve in &self.curves {
            curve.write().set_meta(key, value.clone());
        }
        self
    }

    pub fn set_meta_all(&mut self, key: &str, values: Option<Vec<Value>>) -> &mut Self {
        for curve in &self.curves {
            curve.write().set_meta_all(key, values.clone());
        }
        self
    }
}

impl PartialEq for CurveCollection {
    fn eq(&self, other: &Self) -> bool {
        self.curves == other.curves
    }
}

impl fmt::Display for CurveCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.trial_count();
        write!(
            f,
            "[CurveCollection of {} curves ({} trial{})]",
            self.len(),
            n,
            if n <= 1 { "" } else { "s" }
        )
    }
}

impl FromIterator<DominanceCurve> for CurveCollection {
    fn from_iter<I: IntoIterator<Item = DominanceCurve>>(iter: I) -> Self {
        Self::from_refs(iter.into_iter().map(CurveRef::new))
    }
}

impl FromIterator<CurveRef> for CurveCollection {
    fn from_iter<I: IntoIterator<Item = CurveRef>>(iter: I) -> Self {
        Self::from_refs(iter)
    }
}

impl Extend<CurveRef> for CurveCollection {
    fn extend<I: IntoIterator<Item = CurveRef>>(&mut self, iter: I) {
        self.curves.extend(iter);
    }
}

impl IntoIterator for CurveCollection {
    type Item = CurveRef;
    type IntoIter = std::vec::IntoIter<CurveRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.curves.into_iter()
    }
}

impl<'a> IntoIterator for &'a CurveCollection {
    type Item = &'a CurveRef;
    type IntoIter = std::slice::Iter<'a, CurveRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.curves.iter()
    }
}

impl BitOr for &CurveCollection {
    type Output = CurveCollection;

    fn bitor(self, rhs: Self) -> CurveCollection {
        self.union(rhs)
    }
}

impl BitAnd for &CurveCollection {
    type Output = CurveCollection;

    fn bitand(self, rhs: Self) -> CurveCollection {
        self.intersection(rhs)
    }
}

impl BitXor for &CurveCollection {
    type Output = CurveCollection;

    fn bitxor(self, rhs: Self) -> CurveCollection {
        self.symmetric_difference(rhs)
    }
}

impl Sub for &CurveCollection {
    type Output = CurveCollection;

    fn sub(self, rhs: Self) -> CurveCollection {
        self.difference(rhs)
    }
}

impl Add for &CurveCollection {
    type Output = CurveCollection;

    fn add(self, rhs: Self) -> CurveCollection {
        self.concat(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn single(a: f64, b: f64, assessor: &str) -> DominanceCurve {
        let record = TrialRecord::new([("A", vec![a]), ("B", vec![b])], 10.0)
            .with_meta("assessor", assessor);
        DominanceCurve::from_record(&record, 20).unwrap()
    }

    fn panel() -> CurveCollection {
        vec![
            single(1.0, 4.0, "kim"),
            single(2.0, 6.0, "lee"),
            single(0.5, 3.0, "kim"),
            single(5.0, 1.0, "park"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_identity_not_value_equality() {
        let mut c = CurveCollection::new();
        let first = c.push(single(1.0, 2.0, "x"));
        let second = c.push(single(1.0, 2.0, "x"));
        assert_ne!(first, second);
        assert_eq!(first, first.clone());
        assert_eq!(c.union(&c).len(), 2);
    }

    #[test]
    fn test_set_algebra() {
        let p = panel();
        let q = panel();
        let both = &p | &q;
        assert_eq!(both.len(), 8);
        assert_eq!(&both & &p, p);
        assert_eq!((&both - &p), q);
        assert_eq!((&p ^ &both), q);
        assert!((&p & &q).is_empty());

        let shared = p.slice(1..3);
        let mixed = &shared + &q;
        assert_eq!((&p & &mixed), shared);
        assert_eq!((&p ^ &mixed).len(), 2 + 4);
    }

    #[test]
    fn test_concat_keeps_duplicates_and_dedup_removes_them() {
        let p = panel();
        let doubled = &p + &p;
        assert_eq!(doubled.len(), 8);
        assert_eq!(doubled.repeat(2).len(), 16);
        assert_eq!(doubled.union(&CurveCollection::new()), p);

        let first = p.get(0).unwrap().clone();
        let rest = doubled.without(&first);
        assert_eq!(rest.len(), 3);
        assert!(!rest.contains(&first));
    }

    #[test]
    fn test_repeat_shares_handles_in_order() {
        let p = panel();
        let tripled = p.repeat(3);
        assert_eq!(tripled.len(), 12);
        assert_eq!(tripled.slice(8..12), p);
        assert_eq!(tripled.trial_count(), 12);
        assert!(p.repeat(0).is_empty());
    }

    #[test]
    fn test_group_by_metadata_first_occurrence_order() {
        let groups = panel().group_by(KeySelector::metadata("Assessor"));
        let keys: Vec<String> = groups.keys().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["kim", "lee", "park"]);
        assert_eq!(groups[&MetaKey::from("kim")].len(), 2);
    }

    #[test]
    fn test_group_by_function_and_missing_key() {
        let late = KeySelector::function(|c| MetaKey::from(c.delays()[0] > 3.5));
        let groups = panel().group_by(late);
        assert_eq!(groups[&MetaKey::from(true)].len(), 3);
        assert_eq!(groups[&MetaKey::from(false)].len(), 1);

        let groups = panel().group_by(KeySelector::metadata("product"));
        assert_eq!(groups.len(), 1);
        assert!(groups.keys().next().unwrap().is_null());
    }

    #[test]
    fn test_order_by_is_stable() {
        let mut p = panel();
        let original: Vec<CurveRef> = p.iter().cloned().collect();

        p.order_by(KeySelector::metadata("assessor"), false);
        let names: Vec<Value> = p.get_meta("assessor").into_iter().flatten().collect();
        assert_eq!(names, vec![json!("kim"), json!("kim"), json!("lee"), json!("park")]);
        assert_eq!(p.get(0), Some(&original[0]));
        assert_eq!(p.get(1), Some(&original[2]));

        p.order_by(KeySelector::metadata("assessor"), true);
        assert_eq!(p.get(0), Some(&original[3]));
        assert_eq!(p.get(2), Some(&original[0]));
        assert_eq!(p.get(3), Some(&original[2]));
    }

    #[test]
    fn test_bootstrap_size_and_membership() {
        let p = panel();
        let mut rng = StdRng::seed_from_u64(7);
        for k in [0, 1, 4, 25] {
            let sample = p.bootstrap_with(Some(k), &mut rng).unwrap();
            assert_eq!(sample.len(), k);
            assert!(sample.iter().all(|c| p.contains(c)));
        }
        assert_eq!(p.bootstrap(None).unwrap().len(), p.len());
        assert!(CurveCollection::new().bootstrap(Some(3)).is_err());
        assert!(CurveCollection::new().bootstrap(None).unwrap().is_empty());
    }

    #[test]
    fn test_trial_count_sums_members() {
        let p = panel();
        let mut c = CurveCollection::new();
        c.push(p.merge().unwrap());
        c.push(single(1.0, 2.0, "z"));
        assert_eq!(c.len(), 2);
        assert_eq!(c.trial_count(), 5);
        assert_eq!(c.to_string(), "[CurveCollection of 2 curves (5 trials)]");
    }

    #[test]
    fn test_distance_to_merged_average() {
        let p = panel();
        let distances = p.distance().unwrap();
        assert_eq!(distances.len(), 4);
        assert!(distances.iter().all(|d| (0.0..=1.0).contains(d)));

        let same: CurveCollection = vec![single(1.0, 2.0, "a"), single(1.0, 2.0, "b")]
            .into_iter()
            .collect();
        assert!(same.distance().unwrap().iter().all(|d| d.abs() < 1e-12));
        assert!(matches!(CurveCollection::new().distance(), Err(Error::EmptyAggregation)));
    }

    #[test]
    fn test_merge_with_duplicate_handles() {
        let p = panel();
        let doubled = &p + &p;
        let merged = doubled.merge_as("doubled").unwrap();
        assert_eq!(merged.trial_count(), 8);
        assert_eq!(merged.name(), "doubled");
    }

    #[test]
    fn test_batch_metadata_is_shared() {
        let p = panel();
        let mut view = p.slice(0..2);
        view.set_meta("session", 3);
        assert_eq!(p.get(0).unwrap().read().get_meta("SESSION"), Some(&json!(3)));
        assert_eq!(p.get(2).unwrap().read().get_meta("SESSION"), None);

        view.set_meta_all("session", None);
        assert!(p.get_meta_all("session").iter().all(Vec::is_empty));
    }

    #[test]
    fn test_filter_and_map() {
        let p = panel();
        let kims = p.filter(|c| c.get_meta("assessor") == Some(&json!("kim")));
        assert_eq!(kims.len(), 2);
        assert!(kims.iter().all(|c| p.contains(c)));

        let renamed = p.map(|c| {
            let mut copy = c.clone();
            copy.set_name("copy");
            copy
        });
        assert_eq!(renamed.len(), 4);
        assert!((&renamed & &p).is_empty());
        assert_eq!(p.get(0).unwrap().read().name(), crate::curve::DEFAULT_NAME);

        let pairs = p.slice(0..2).product(&[1, 2, 3]);
        assert_eq!(pairs.len(), 6);
        assert_eq!(pairs[1].1, 2);
    }
}
