//! Sets with memoized, identity-cached intersection and difference
//!
//! A [`MemoizedSet`] is an ordinary mutable hash set that remembers the
//! results of `intersection` and `difference` against other memoized sets.
//! Every result is a [`ReadonlyMemoizedSet`]: a shared, reference-counted
//! set that refuses mutation, so a value cached by two owners can never be
//! corrupted through either of them.
//!
//! # Cache coherence
//!
//! Each set carries a [`MemoToken`] identifying the current version of its
//! contents. Cache tables are keyed by the *partner's* token. Mutating a set
//! issues a fresh token and drops both of its tables wholesale, so:
//!
//! - the mutated set forgets everything it had memoized, and
//! - partners still holding entries under the old token never look them up
//!   again, because lookups always use the partner's current token.
//!
//! # Storage strength
//!
//! Tables owned by a mutable set hold their results strongly; tables owned by
//! a derived set hold them weakly. Strong edges therefore only run from
//! mutable sets to derived sets and derived sets cannot form cycles. Entries
//! whose partner has moved on to a newer token (or has been dropped) are
//! pruned whenever a table receives a new entry.
//!
//! # Concurrency
//!
//! Operations take `&self`, so any number of readers may compute results at
//! once. Publishing an intersection locks both operands' tables (in address
//! order) and keeps an entry that a racing caller already stored, so `a ∩ b`
//! and `b ∩ a` still resolve to one shared result.

use std::collections::{hash_set, HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identity of one version of a set's contents
///
/// Tokens are issued process-wide and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoToken(u64);

impl MemoToken {
    fn fresh() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

/// Returned when a caller tries to mutate a [`ReadonlyMemoizedSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("readonly memoized set cannot be mutated")]
pub struct ImmutableSetError;

#[derive(Clone, Copy)]
enum Table {
    Intersection,
    Difference,
}

/// How a table refers to a memoized result
enum Slot<T> {
    Strong(ReadonlyMemoizedSet<T>),
    Weak(Weak<Core<T>>),
}

impl<T> Slot<T> {
    fn get(&self) -> Option<ReadonlyMemoizedSet<T>> {
        match self {
            Slot::Strong(set) => Some(set.clone()),
            Slot::Weak(weak) => weak.upgrade().map(|core| ReadonlyMemoizedSet { core }),
        }
    }

    fn is_live(&self) -> bool {
        match self {
            Slot::Strong(_) => true,
            Slot::Weak(weak) => weak.strong_count() > 0,
        }
    }
}

struct Memo<T> {
    /// Partner's token cell, used to spot entries the partner has outgrown
    partner: Weak<AtomicU64>,
    result: Slot<T>,
}

impl<T> Memo<T> {
    fn is_live(&self, key: MemoToken) -> bool {
        self.result.is_live()
            && self
                .partner
                .upgrade()
                .is_some_and(|current| current.load(Ordering::Acquire) == key.0)
    }
}

struct Tables<T> {
    intersections: HashMap<MemoToken, Memo<T>>,
    differences: HashMap<MemoToken, Memo<T>>,
}

impl<T> Default for Tables<T> {
    fn default() -> Self {
        Self {
            intersections: HashMap::new(),
            differences: HashMap::new(),
        }
    }
}

impl<T> Tables<T> {
    fn table(&mut self, table: Table) -> &mut HashMap<MemoToken, Memo<T>> {
        match table {
            Table::Intersection => &mut self.intersections,
            Table::Difference => &mut self.differences,
        }
    }
}

/// State shared by both set flavours
struct Core<T> {
    values: HashSet<T>,
    token: MemoToken,
    /// Mirrors `token` so partners can tell when their entries went stale
    current: Arc<AtomicU64>,
    tables: Mutex<Tables<T>>,
}

impl<T> Core<T> {
    fn new(values: HashSet<T>) -> Self {
        let token = MemoToken::fresh();
        Self {
            values,
            token,
            current: Arc::new(AtomicU64::new(token.0)),
            tables: Mutex::new(Tables::default()),
        }
    }

    fn reset(&mut self) {
        self.token = MemoToken::fresh();
        self.current.store(self.token.0, Ordering::Release);
        *self.tables.get_mut() = Tables::default();
    }
}

/// A memoized operand together with its shared handle, if it is derived
struct Side<'a, T> {
    core: &'a Core<T>,
    shared: Option<&'a ReadonlyMemoizedSet<T>>,
}

impl<'a, T> Side<'a, T> {
    fn lookup(&self, table: Table, partner: MemoToken) -> Option<ReadonlyMemoizedSet<T>> {
        let mut tables = self.core.tables.lock();
        let cached = tables.table(table).get(&partner).and_then(|memo| memo.result.get());
        cached
    }

    fn memo(&self, partner: &Core<T>, result: &ReadonlyMemoizedSet<T>) -> Memo<T> {
        let slot = match self.shared {
            Some(_) => Slot::Weak(Arc::downgrade(&result.core)),
            None => Slot::Strong(result.clone()),
        };
        Memo {
            partner: Arc::downgrade(&partner.current),
            result: slot,
        }
    }

    /// Remember a difference, unless a racing caller got there first
    fn store(
        &self,
        table: Table,
        partner: &Core<T>,
        result: ReadonlyMemoizedSet<T>,
    ) -> ReadonlyMemoizedSet<T> {
        let memo = self.memo(partner, &result);
        let mut tables = self.core.tables.lock();
        let entries = tables.table(table);
        if let Some(existing) = live_result(entries, partner.token) {
            return existing;
        }
        remember(entries, partner.token, memo);
        result
    }
}

fn live_result<T>(
    entries: &HashMap<MemoToken, Memo<T>>,
    key: MemoToken,
) -> Option<ReadonlyMemoizedSet<T>> {
    entries
        .get(&key)
        .filter(|memo| memo.is_live(key))
        .and_then(|memo| memo.result.get())
}

fn remember<T>(entries: &mut HashMap<MemoToken, Memo<T>>, key: MemoToken, memo: Memo<T>) {
    entries.retain(|key, entry| entry.is_live(*key));
    entries.insert(key, memo);
}

/// Lock the tables of two distinct cores, always in address order
fn lock_pair<'a, T>(
    a: &'a Core<T>,
    b: &'a Core<T>,
) -> (MutexGuard<'a, Tables<T>>, MutexGuard<'a, Tables<T>>) {
    if (a as *const Core<T>) < (b as *const Core<T>) {
        let first = a.tables.lock();
        (first, b.tables.lock())
    } else {
        let first = b.tables.lock();
        (a.tables.lock(), first)
    }
}

/// Remember an intersection on both operands
///
/// Both tables are held while checking and inserting, so when `a ∩ b` and
/// `b ∩ a` miss concurrently the first result published is the one both
/// callers return.
fn publish_intersection<T>(
    this: &Side<'_, T>,
    other: &Side<'_, T>,
    result: ReadonlyMemoizedSet<T>,
) -> ReadonlyMemoizedSet<T> {
    let this_memo = this.memo(other.core, &result);

    if std::ptr::eq(this.core, other.core) {
        let mut tables = this.core.tables.lock();
        let entries = tables.table(Table::Intersection);
        if let Some(existing) = live_result(entries, other.core.token) {
            return existing;
        }
        remember(entries, other.core.token, this_memo);
        return result;
    }

    let other_memo = other.memo(this.core, &result);
    let (mut own_tables, mut their_tables) = lock_pair(this.core, other.core);
    let mine = own_tables.table(Table::Intersection);
    let theirs = their_tables.table(Table::Intersection);
    if let Some(existing) = live_result(mine, other.core.token)
        .or_else(|| live_result(theirs, this.core.token))
    {
        return existing;
    }
    remember(mine, other.core.token, this_memo);
    remember(theirs, this.core.token, other_memo);
    result
}

/// The right-hand side of a set operation
///
/// Only memoized operands engage the caches; a plain [`HashSet`] is
/// intersected or subtracted directly and the result is not remembered.
pub enum Operand<'a, T> {
    Plain(&'a HashSet<T>),
    Mutable(&'a MemoizedSet<T>),
    Derived(&'a ReadonlyMemoizedSet<T>),
}

impl<'a, T> Operand<'a, T> {
    fn memoized(&self) -> Result<Side<'a, T>, &'a HashSet<T>> {
        match *self {
            Operand::Plain(values) => Err(values),
            Operand::Mutable(set) => Ok(Side {
                core: &set.core,
                shared: None,
            }),
            Operand::Derived(set) => Ok(Side {
                core: &*set.core,
                shared: Some(set),
            }),
        }
    }
}

/// Anything that can appear on the right of `intersection`/`difference`
pub trait SetOperand<T> {
    fn operand(&self) -> Operand<'_, T>;
}

impl<T> SetOperand<T> for HashSet<T> {
    fn operand(&self) -> Operand<'_, T> {
        Operand::Plain(self)
    }
}

impl<T> SetOperand<T> for MemoizedSet<T> {
    fn operand(&self) -> Operand<'_, T> {
        Operand::Mutable(self)
    }
}

impl<T> SetOperand<T> for ReadonlyMemoizedSet<T> {
    fn operand(&self) -> Operand<'_, T> {
        Operand::Derived(self)
    }
}

fn intersect<T: Eq + Hash + Clone>(
    this: Side<'_, T>,
    other: Operand<'_, T>,
) -> ReadonlyMemoizedSet<T> {
    let other = match other.memoized() {
        Ok(side) => side,
        Err(plain) => {
            return ReadonlyMemoizedSet::from_set(
                this.core.values.intersection(plain).cloned().collect(),
            )
        }
    };

    if let Some(cached) = this.lookup(Table::Intersection, other.core.token) {
        return cached;
    }

    let (small, large) = if this.core.values.len() <= other.core.values.len() {
        (&this.core.values, &other.core.values)
    } else {
        (&other.core.values, &this.core.values)
    };
    let values: HashSet<T> = small.iter().filter(|v| large.contains(*v)).cloned().collect();

    let result = match (this.shared, other.shared) {
        (Some(own), _) if values.len() == this.core.values.len() => own.clone(),
        (_, Some(theirs)) if values.len() == other.core.values.len() => theirs.clone(),
        _ => ReadonlyMemoizedSet::from_set(values),
    };

    publish_intersection(&this, &other, result)
}

fn subtract<T: Eq + Hash + Clone>(
    this: Side<'_, T>,
    other: Operand<'_, T>,
) -> ReadonlyMemoizedSet<T> {
    let other = match other.memoized() {
        Ok(side) => side,
        Err(plain) => {
            return ReadonlyMemoizedSet::from_set(
                this.core.values.difference(plain).cloned().collect(),
            )
        }
    };

    if let Some(cached) = this.lookup(Table::Difference, other.core.token) {
        return cached;
    }

    let result = ReadonlyMemoizedSet::from_set(
        this.core
            .values
            .difference(&other.core.values)
            .cloned()
            .collect(),
    );
    this.store(Table::Difference, other.core, result)
}

/// Mutable set with memoized cross-set operations
pub struct MemoizedSet<T> {
    core: Core<T>,
}

impl<T> Default for MemoizedSet<T> {
    fn default() -> Self {
        Self {
            core: Core::new(HashSet::new()),
        }
    }
}

impl<T: Eq + Hash + Clone> MemoizedSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value`, returning whether the set grew
    ///
    /// Memoization is reset even when `value` was already present.
    pub fn add(&mut self, value: T) -> bool {
        self.reset_memoization();
        self.core.values.insert(value)
    }

    /// Remove `value`, returning whether it was present
    pub fn delete(&mut self, value: &T) -> bool {
        self.reset_memoization();
        self.core.values.remove(value)
    }

    /// Issue a fresh token and forget every memoized result
    pub fn reset_memoization(&mut self) {
        self.core.reset();
    }

    pub fn intersection<O: SetOperand<T> + ?Sized>(&self, other: &O) -> ReadonlyMemoizedSet<T> {
        intersect(self.side(), other.operand())
    }

    pub fn difference<O: SetOperand<T> + ?Sized>(&self, other: &O) -> ReadonlyMemoizedSet<T> {
        subtract(self.side(), other.operand())
    }

    /// Readonly copy of the current contents, memoized until the next mutation
    pub fn snapshot(&self) -> ReadonlyMemoizedSet<T> {
        self.intersection(self)
    }

    pub fn len(&self) -> usize {
        self.core.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.values.is_empty()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.core.values.contains(value)
    }

    pub fn iter(&self) -> hash_set::Iter<'_, T> {
        self.core.values.iter()
    }

    pub fn values(&self) -> &HashSet<T> {
        &self.core.values
    }

    pub fn token(&self) -> MemoToken {
        self.core.token
    }

    fn side(&self) -> Side<'_, T> {
        Side {
            core: &self.core,
            shared: None,
        }
    }
}

impl<T: Eq + Hash + Clone> FromIterator<T> for MemoizedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            core: Core::new(iter.into_iter().collect()),
        }
    }
}

impl<T> fmt::Debug for MemoizedSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizedSet")
            .field("len", &self.core.values.len())
            .field("token", &self.core.token)
            .finish()
    }
}

/// Derived, shared set produced by memoized operations
///
/// Cloning is cheap and preserves identity: clones compare equal under
/// [`ReadonlyMemoizedSet::ptr_eq`].
pub struct ReadonlyMemoizedSet<T> {
    core: Arc<Core<T>>,
}

impl<T> Clone for ReadonlyMemoizedSet<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T: Eq + Hash + Clone> ReadonlyMemoizedSet<T> {
    pub fn empty() -> Self {
        Self::from_set(HashSet::new())
    }

    fn from_set(values: HashSet<T>) -> Self {
        Self {
            core: Arc::new(Core::new(values)),
        }
    }

    /// Always fails; derived sets may be shared by several cache entries
    pub fn add(&self, _value: T) -> Result<bool, ImmutableSetError> {
        Err(ImmutableSetError)
    }

    /// Always fails; derived sets may be shared by several cache entries
    pub fn delete(&self, _value: &T) -> Result<bool, ImmutableSetError> {
        Err(ImmutableSetError)
    }

    pub fn intersection<O: SetOperand<T> + ?Sized>(&self, other: &O) -> ReadonlyMemoizedSet<T> {
        intersect(self.side(), other.operand())
    }

    pub fn difference<O: SetOperand<T> + ?Sized>(&self, other: &O) -> ReadonlyMemoizedSet<T> {
        subtract(self.side(), other.operand())
    }

    /// Whether both handles refer to the same set object
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    pub fn len(&self) -> usize {
        self.core.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.core.values.is_empty()
    }

    pub fn contains(&self, value: &T) -> bool {
        self.core.values.contains(value)
    }

    pub fn iter(&self) -> hash_set::Iter<'_, T> {
        self.core.values.iter()
    }

    pub fn values(&self) -> &HashSet<T> {
        &self.core.values
    }

    pub fn token(&self) -> MemoToken {
        self.core.token
    }

    fn side(&self) -> Side<'_, T> {
        Side {
            core: &*self.core,
            shared: Some(self),
        }
    }
}

impl<T: Eq + Hash + Clone> FromIterator<T> for ReadonlyMemoizedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_set(iter.into_iter().collect())
    }
}

impl<T> fmt::Debug for ReadonlyMemoizedSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadonlyMemoizedSet")
            .field("len", &self.core.values.len())
            .field("token", &self.core.token)
            .finish()
    }
}
