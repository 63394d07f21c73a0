//! Per-session xid generation: a bare atomic counter with no stacking
//! logic of its own.

use std::sync::atomic::{AtomicI32, Ordering};

/// Generates strictly positive, strictly increasing xids for one session.
///
/// Xids wrap at `i32::MAX` back to `1` rather than into negative territory,
/// since negative xids are reserved (notification/ping/auth/close).
///
/// # Test
///
/// ```
/// use coord_client_engine::xid::XidGenerator;
///
/// let xids = XidGenerator::default();
/// assert_eq!(xids.next(), 1);
/// assert_eq!(xids.next(), 2);
/// assert_eq!(xids.next(), 3);
/// ```
pub struct XidGenerator(AtomicI32);

impl Default for XidGenerator {
    fn default() -> Self {
        Self(AtomicI32::new(0))
    }
}

impl XidGenerator {
    pub fn next(&self) -> i32 {
        loop {
            let current = self.0.load(Ordering::Relaxed);
            let next = if current >= i32::MAX - 1 { 0 } else { current };

            if self
                .0
                .compare_exchange_weak(current, next + 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return next + 1;
            }
        }
    }
}
