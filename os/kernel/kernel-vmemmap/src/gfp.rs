//! # Allocation Policy Flags

bitflags::bitflags! {
    /// Policy flags passed to the page allocator.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub struct GfpFlags: u32 {
        /// The allocator may reclaim, and therefore sleep.
        const RECLAIM       = 1 << 0;
        /// The allocator may start physical I/O.
        const IO            = 1 << 1;
        /// The allocator may call into filesystems.
        const FS            = 1 << 2;
        /// Emergency reserves may be used.
        const MEMALLOC      = 1 << 3;
        /// Retry reclaim, but fail rather than invoking the OOM killer.
        const RETRY_MAYFAIL = 1 << 4;
        /// Do not log allocation failures.
        const NOWARN        = 1 << 5;
        /// Do not retry after the first failed attempt.
        const NORETRY       = 1 << 6;
        /// Only the requested node may satisfy the request.
        const THISNODE      = 1 << 7;

        /// Ordinary kernel allocation.
        const KERNEL = Self::RECLAIM.bits() | Self::IO.bits() | Self::FS.bits();
    }
}

impl GfpFlags {
    /// Policy used for vmemmap blocks once the page allocator is up.
    pub const VMEMMAP_BLOCK: Self = Self::KERNEL
        .union(Self::MEMALLOC)
        .union(Self::RETRY_MAYFAIL)
        .union(Self::NOWARN);

    /// Whether an allocation under this policy may block.
    #[inline]
    #[must_use]
    pub const fn allows_blocking(self) -> bool {
        self.contains(Self::RECLAIM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_blocks_but_noretry_alone_does_not() {
        assert!(GfpFlags::KERNEL.allows_blocking());
        assert!(GfpFlags::VMEMMAP_BLOCK.allows_blocking());
        assert!(!(GfpFlags::NORETRY | GfpFlags::NOWARN).allows_blocking());
    }

    #[test]
    fn vmemmap_block_policy() {
        let gfp = GfpFlags::VMEMMAP_BLOCK;
        assert!(gfp.contains(GfpFlags::MEMALLOC | GfpFlags::RETRY_MAYFAIL | GfpFlags::NOWARN));
        assert!(!gfp.contains(GfpFlags::THISNODE));
        assert!(!(gfp - GfpFlags::NOWARN).contains(GfpFlags::NOWARN));
    }
}
