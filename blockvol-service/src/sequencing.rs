// SPDX-License-Identifier: GPL-3.0-only

//! Process-wide attach/detach sequencing for self-managed hosts

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use blockvol_contracts::{VolumeError, VolumeErrorKind};

/// Non-blocking exclusivity token
///
/// Only one attach or detach may talk to the cloud at a time on a host that
/// resolves its own devices, since the before/after inventory diff cannot tell
/// two concurrent attaches apart.
#[derive(Debug, Default, Clone)]
pub struct AttachMutex {
    held: Arc<AtomicBool>,
}

impl AttachMutex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<AttachPermit> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| AttachPermit {
                held: Arc::clone(&self.held),
            })
    }

    /// Like [`try_acquire`](Self::try_acquire), failing with a retryable `Aborted`
    pub fn acquire_or_abort(&self, disk_id: &str) -> Result<AttachPermit, VolumeError> {
        self.try_acquire().ok_or_else(|| {
            VolumeError::new(
                VolumeErrorKind::Aborted,
                format!("attach/detach of {disk_id} is waiting for another operation in progress"),
            )
        })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct AttachPermit {
    held: Arc<AtomicBool>,
}

impl Drop for AttachPermit {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}
