//! Global file-descriptor soft-limit bump (spec 4.2), scoped raise/restore.
//!
//! `datawelder.partition._update_soft_limit` raises `RLIMIT_NOFILE` for the
//! duration of opening all partition streams and restores it on the way out
//! of the context manager. `rlimit` gives us the same `getrlimit`/`setrlimit`
//! pair without reaching for raw `libc` calls.

use rlimit::Resource;

/// RAII guard: raises the process soft limit on open file descriptors on
/// construction, restores the previous soft limit on drop (even on panic
/// unwind, matching the teacher's "guarantee close on all paths" contract
/// for pooled resources).
pub struct FdLimitGuard {
    previous_soft: u64,
    hard: u64,
}

impl FdLimitGuard {
    /// Raise the soft limit to at least `desired`, clamped to the hard limit.
    /// Never lowers the current soft limit.
    pub fn raise_to(desired: u64) -> anyhow::Result<Self> {
        let (soft, hard) = Resource::NOFILE.get()?;
        let new_soft = desired.max(soft).min(hard);
        Resource::NOFILE.set(new_soft, hard)?;
        Ok(Self { previous_soft: soft, hard })
    }

    /// Raise enough to safely hold `num_shards` simultaneously-open streams.
    /// `N * 100` per spec 4.2's default, falling back to `N * 10` if the hard
    /// cap can't accommodate that (platforms with low hard caps).
    pub fn for_shard_count(num_shards: usize) -> anyhow::Result<Self> {
        let (_, hard) = Resource::NOFILE.get()?;
        let generous = (num_shards as u64).saturating_mul(100);
        let desired = if generous <= hard { generous } else { (num_shards as u64).saturating_mul(10) };
        Self::raise_to(desired)
    }
}

impl Drop for FdLimitGuard {
    fn drop(&mut self) {
        let _ = Resource::NOFILE.set(self.previous_soft, self.hard);
    }
}
