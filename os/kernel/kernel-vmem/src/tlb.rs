//! # TLB Maintenance

use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::VirtualAddress;

/// Invalidates cached translations for kernel virtual addresses.
pub trait TlbFlush {
    /// Invalidate every translation in `[start, end)`.
    fn flush_kernel_range(&self, start: VirtualAddress, end: VirtualAddress);
}

/// Flushes one page at a time with `invlpg` on the executing CPU.
///
/// Remote CPUs are not shot down; callers that share the kernel mapping
/// across CPUs must provide their own [`TlbFlush`].
#[derive(Debug, Default, Copy, Clone)]
pub struct InvlpgTlbFlush;

#[cfg(target_arch = "x86_64")]
impl TlbFlush for InvlpgTlbFlush {
    fn flush_kernel_range(&self, start: VirtualAddress, end: VirtualAddress) {
        log::trace!("invlpg [{start}, {end})");
        let mut va = start.as_u64();
        while va < end.as_u64() {
            unsafe {
                core::arch::asm!("invlpg [{}]", in(reg) va, options(nostack, preserves_flags));
            }
            va += PAGE_SIZE;
        }
    }
}
