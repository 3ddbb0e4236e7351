//! Listener registry for blocking retry
//!
//! A transaction that retries registers one [`Latch`] against every handle it
//! read, with the version it needs to see. Commits report the handles they
//! published and their version; every matching registration has its latch
//! opened and is consumed.
//!
//! # No lost wakeups
//!
//! Commits publish before they call [`ListenerRegistry::wakeup_listeners`].
//! Registration stores the listener first and then re-reads the latest
//! version of each handle. Whichever of the two runs second sees the other's
//! effect, so a commit that races with registration always opens the latch.

use crate::latch::Latch;
use dashmap::DashMap;
use mvstm_core::{Handle, Result, StmError, Version};
use mvstm_storage::VersionedHeap;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;
use std::sync::Arc;
use tracing::trace;

#[derive(Debug)]
struct Registration {
    version: Version,
    latch: Arc<Latch>,
}

/// Handle → pending registrations
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    listeners: DashMap<Handle, Vec<Registration>, BuildHasherDefault<FxHasher>>,
}

impl ListenerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `latch` to open once any of `handles` reaches `version`
    ///
    /// Opens the latch immediately if a handle is already at or past
    /// `version`.
    ///
    /// # Errors
    ///
    /// [`StmError::NoProgressPossible`] if `handles` is empty or contains the
    /// null handle. Nothing is registered and the latch is left unchanged.
    pub fn add_listener(
        &self,
        heap: &VersionedHeap,
        version: Version,
        handles: &[Handle],
        latch: &Arc<Latch>,
    ) -> Result<()> {
        if handles.is_empty() || handles.iter().any(|h| h.is_null()) {
            return Err(StmError::NoProgressPossible);
        }

        for &handle in handles {
            let mut entry = self.listeners.entry(handle).or_default();
            // Drop registrations that were already woken through another handle
            entry.retain(|r| !r.latch.is_open());
            entry.push(Registration {
                version,
                latch: Arc::clone(latch),
            });
        }
        trace!(version, handles = handles.len(), "listener registered");

        let already = handles.iter().find(|&&h| {
            heap.latest_version(h)
                .map_or(false, |latest| latest >= version)
        });
        if let Some(handle) = already {
            trace!(%handle, version, "listener satisfied at registration");
            latch.open();
        }
        Ok(())
    }

    /// Open and remove every registration on `touched` with a version at or
    /// below `version`
    ///
    /// Returns the number of latches opened.
    pub fn wakeup_listeners(&self, version: Version, touched: &[Handle]) -> usize {
        let mut woken = 0;
        for handle in touched {
            let drained = match self.listeners.get_mut(handle) {
                Some(mut entry) => {
                    entry.retain(|r| {
                        if r.version <= version {
                            if !r.latch.is_open() {
                                r.latch.open();
                                woken += 1;
                            }
                            false
                        } else {
                            true
                        }
                    });
                    entry.is_empty()
                }
                None => false,
            };
            // The shard guard above is released before removing
            if drained {
                self.listeners.remove_if(handle, |_, regs| regs.is_empty());
            }
        }
        if woken > 0 {
            trace!(version, woken, "listeners woken");
        }
        woken
    }

    /// Number of registrations pending on `handle`
    pub fn pending(&self, handle: Handle) -> usize {
        self.listeners.get(&handle).map_or(0, |regs| regs.len())
    }

    /// Check if no registration is pending
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
