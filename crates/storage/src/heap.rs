//! Versioned heap
//!
//! Maps every object handle to its committed snapshots.
//!
//! # Design
//!
//! - DashMap: handle → `Arc<Slot>`, sharded, lookups only touch one shard
//! - FxHash: fast non-crypto hash for integer handles
//! - Slot: `ArcSwap` over an immutable, newest-first version chain, so a
//!   reader pins a chain with one atomic load and never waits for a writer
//! - Lock word: per-slot owner id, taken only by a committing transaction
//!
//! # Publication horizon
//!
//! Commits tick the clock, publish their snapshots slot by slot, then advance
//! the heap's *stable version* in version order. Transactions start their
//! snapshot at the stable version, so a reader never sees a commit that is
//! still half published.

use arc_swap::ArcSwap;
use dashmap::DashMap;
use mvstm_core::{ConflictKind, Handle, Result, StmError, Tranlocal, TxnId, Version};
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Number of committed versions retained per object by default
pub const DEFAULT_HISTORY_DEPTH: usize = 8;

/// Next handle to hand out, shared by every heap in the process
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Busy-wait iterations before yielding in [`VersionedHeap::advance_stable`]
const STABLE_SPIN_LIMIT: u32 = 64;

type FxBuildHasher = BuildHasherDefault<FxHasher>;

/// Newest-first committed versions of one object
///
/// Never empty. Replaced wholesale on every publish.
#[derive(Debug)]
struct VersionChain {
    entries: Vec<Arc<Tranlocal>>,
}

impl VersionChain {
    fn single(tranlocal: Arc<Tranlocal>) -> Self {
        Self {
            entries: vec![tranlocal],
        }
    }

    fn newest(&self) -> &Arc<Tranlocal> {
        &self.entries[0]
    }

    /// Newest entry visible at `version`
    fn at(&self, version: Version) -> Option<&Arc<Tranlocal>> {
        self.entries.iter().find(|t| t.version() <= version)
    }

    /// New chain with `tranlocal` in front, trimmed to `depth` entries
    fn prepend(&self, tranlocal: Arc<Tranlocal>, depth: usize) -> Self {
        let mut entries = Vec::with_capacity(depth);
        entries.push(tranlocal);
        entries.extend(self.entries.iter().take(depth - 1).cloned());
        Self { entries }
    }
}

/// Heap slot of one object
///
/// Holds the object's version chain and its commit lock. The lock is an owner
/// word: `0` when free, the raw [`TxnId`] of the holder otherwise.
pub struct Slot {
    handle: Handle,
    created: Version,
    owner: AtomicU64,
    chain: ArcSwap<VersionChain>,
}

impl Slot {
    fn new(tranlocal: Arc<Tranlocal>) -> Self {
        Self {
            handle: tranlocal.handle(),
            created: tranlocal.version(),
            owner: AtomicU64::new(0),
            chain: ArcSwap::from_pointee(VersionChain::single(tranlocal)),
        }
    }

    /// Handle of the object in this slot
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Version of the commit that created the object
    pub fn created(&self) -> Version {
        self.created
    }

    /// Latest committed snapshot
    pub fn latest(&self) -> Arc<Tranlocal> {
        Arc::clone(self.chain.load().newest())
    }

    /// Version of the latest committed snapshot
    pub fn latest_version(&self) -> Version {
        self.chain.load().newest().version()
    }

    /// Number of retained versions
    pub fn history_len(&self) -> usize {
        self.chain.load().entries.len()
    }

    /// Newest committed snapshot with a version at or below `version`
    ///
    /// # Errors
    ///
    /// - [`StmError::NoSuchObject`] if the object was created after `version`
    /// - [`ConflictKind::SnapshotTooOld`] if that version was already pruned
    pub fn read_at(&self, version: Version) -> Result<Arc<Tranlocal>> {
        if version < self.created {
            return Err(StmError::NoSuchObject {
                handle: self.handle,
            });
        }
        self.chain.load().at(version).cloned().ok_or_else(|| {
            StmError::conflict(
                self.handle,
                ConflictKind::SnapshotTooOld { requested: version },
            )
        })
    }

    /// Try to take the commit lock for `owner`, without waiting
    #[inline]
    pub fn try_lock(&self, owner: TxnId) -> bool {
        self.owner
            .compare_exchange(0, owner.as_u64(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the commit lock if `owner` holds it
    ///
    /// Returns false if the lock was not held by `owner`.
    #[inline]
    pub fn unlock(&self, owner: TxnId) -> bool {
        self.owner
            .compare_exchange(owner.as_u64(), 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Current lock holder
    pub fn owner(&self) -> Option<TxnId> {
        match self.owner.load(Ordering::Acquire) {
            0 => None,
            raw => Some(TxnId::from_raw(raw)),
        }
    }

    /// Check if the commit lock is held
    pub fn is_locked(&self) -> bool {
        self.owner().is_some()
    }

    /// Replace the version chain with `tranlocal` in front
    ///
    /// Only the holder of the commit lock calls this, so load-then-store does
    /// not lose updates.
    fn install(&self, tranlocal: Arc<Tranlocal>, depth: usize) {
        let current = self.chain.load();
        self.chain.store(Arc::new(current.prepend(tranlocal, depth)));
    }
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("handle", &self.handle)
            .field("created", &self.created)
            .field("owner", &self.owner())
            .field("latest_version", &self.latest_version())
            .finish()
    }
}

/// Handle → committed snapshot history
///
/// # Thread Safety
///
/// - reads: one shard read guard to clone the slot `Arc`, then a lock-free
///   `ArcSwap` load
/// - publish of an existing object: `ArcSwap` store, no shard write lock
/// - publish of a new object: one shard write lock for the insert
///
/// Callers serialize writers of the same object through the slot's commit
/// lock, the heap itself takes no lock for that.
pub struct VersionedHeap {
    slots: DashMap<Handle, Arc<Slot>, FxBuildHasher>,
    stable: AtomicU64,
    history_depth: usize,
}

impl VersionedHeap {
    /// Create an empty heap whose stable version starts at `dawn`
    pub fn new(dawn: Version) -> Self {
        Self::with_history_depth(dawn, DEFAULT_HISTORY_DEPTH)
    }

    /// Create an empty heap retaining up to `history_depth` versions per object
    ///
    /// A depth of zero is treated as one: the latest version is always kept.
    pub fn with_history_depth(dawn: Version, history_depth: usize) -> Self {
        Self {
            slots: DashMap::with_hasher(FxBuildHasher::default()),
            stable: AtomicU64::new(dawn),
            history_depth: history_depth.max(1),
        }
    }

    /// Number of versions retained per object
    pub fn history_depth(&self) -> usize {
        self.history_depth
    }

    /// Allocate a handle for a new object
    ///
    /// Handles start at 1 and are unique across every heap in the process, so
    /// a handle from one engine never names an object of another.
    pub fn allocate_handle(&self) -> Handle {
        Handle::from_raw(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    /// Slot of a committed object
    ///
    /// The null handle never names an object and is reported as not found.
    pub fn slot(&self, handle: Handle) -> Result<Arc<Slot>> {
        self.slots
            .get(&handle)
            .map(|slot| Arc::clone(slot.value()))
            .ok_or(StmError::NoSuchObject { handle })
    }

    /// Latest committed snapshot of `handle`
    #[inline]
    pub fn read(&self, handle: Handle) -> Result<Arc<Tranlocal>> {
        Ok(self.slot(handle)?.latest())
    }

    /// Newest committed snapshot of `handle` visible at `version`
    #[inline]
    pub fn read_at(&self, handle: Handle, version: Version) -> Result<Arc<Tranlocal>> {
        self.slot(handle)?.read_at(version)
    }

    /// Version of the latest committed snapshot of `handle`
    pub fn latest_version(&self, handle: Handle) -> Option<Version> {
        self.slots.get(&handle).map(|slot| slot.latest_version())
    }

    /// Check if `handle` names a committed object
    pub fn contains(&self, handle: Handle) -> bool {
        self.slots.contains_key(&handle)
    }

    /// Check if the commit lock of `handle` is held
    pub fn is_locked(&self, handle: Handle) -> bool {
        self.slots
            .get(&handle)
            .map(|slot| slot.is_locked())
            .unwrap_or(false)
    }

    /// Number of committed objects
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no object was ever committed
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Install uncommitted snapshots as the latest versions, tagged `version`
    ///
    /// The caller must hold the commit lock of every pre-existing handle in
    /// `writes`. Handles without a slot are new objects and get one.
    ///
    /// Returns the number of snapshots published.
    pub fn publish<I>(&self, writes: I, version: Version) -> usize
    where
        I: IntoIterator<Item = Tranlocal>,
    {
        let mut published = 0;
        for tranlocal in writes {
            let handle = tranlocal.handle();
            let committed = Arc::new(tranlocal.into_committed(version));
            let existing = self.slots.get(&handle).map(|slot| Arc::clone(slot.value()));
            match existing {
                Some(slot) => slot.install(committed, self.history_depth),
                None => {
                    self.slots.insert(handle, Arc::new(Slot::new(committed)));
                }
            }
            published += 1;
        }
        trace!(version, published, "published snapshots");
        published
    }

    /// Highest version whose commit, and every commit before it, is fully
    /// published
    #[inline]
    pub fn stable_version(&self) -> Version {
        self.stable.load(Ordering::Acquire)
    }

    /// Mark the commit at `version` as fully published
    ///
    /// Waits until every earlier commit has advanced the horizon, so the stable
    /// version moves through every version in order. Earlier commits are past
    /// their last fallible step when they tick the clock, so the wait is short.
    pub fn advance_stable(&self, version: Version) {
        debug_assert!(version > 0, "versions handed out by the clock start above dawn");
        let mut spins = 0u32;
        while self
            .stable
            .compare_exchange_weak(version - 1, version, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            if spins < STABLE_SPIN_LIMIT {
                spins += 1;
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
    }
}

impl Default for VersionedHeap {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for VersionedHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedHeap")
            .field("objects", &self.len())
            .field("stable_version", &self.stable_version())
            .field("history_depth", &self.history_depth)
            .finish()
    }
}
