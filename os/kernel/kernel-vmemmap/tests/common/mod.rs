//! A small simulated machine: RAM as host frames, a two-node topology, a
//! general page allocator with failure injection and a boot reserve.

#![allow(dead_code)]

use kernel_memory_addresses::{
    PageFrameNumber, PhysicalAddress, PhysicalPage, Size4K, VirtualAddress,
};
use kernel_vmem::{PageBytes, PhysMapper, TlbFlush};
use kernel_vmemmap::{
    BlockAllocator, BootAllocator, BootLimit, BootRequest, GfpFlags, NodeId, NodeTopology,
    PageAllocator, Vmemmap,
};
use std::cell::{RefCell, UnsafeCell};
use std::collections::BTreeSet;
use std::ops::Range;

/// Frame number of the first simulated RAM frame (16 MiB).
pub const RAM_BASE_PFN: u64 = 0x1000;
pub const RAM_FRAMES: u64 = 2048;

/// Frame indices (relative to [`RAM_BASE_PFN`]) of each region.
pub const ROOT_FRAME: u64 = 0;
pub const NODE0_POOL: Range<u64> = 1..768;
pub const NODE1_POOL: Range<u64> = 768..1024;
pub const BOOT_REGION: Range<u64> = 1024..1536;
pub const DEVICE_REGION: Range<u64> = 1536..2048;

pub fn frame(index: u64) -> PhysicalPage<Size4K> {
    PageFrameNumber::new(RAM_BASE_PFN + index).page()
}

pub fn vmemmap_addr(offset_pages: u64) -> VirtualAddress {
    VirtualAddress::new(kernel_vmem::info::VMEMMAP_BASE + offset_pages * 4096)
}

#[repr(C, align(4096))]
struct Frame(UnsafeCell<PageBytes>);

pub struct Ram {
    frames: Box<[Frame]>,
}

impl Ram {
    pub fn new() -> Self {
        let frames = (0..RAM_FRAMES)
            .map(|_| Frame(UnsafeCell::new([0; 4096])))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { frames }
    }

    fn index_of(&self, pa: PhysicalAddress) -> usize {
        let pfn = pa.as_u64() >> 12;
        assert!(
            (RAM_BASE_PFN..RAM_BASE_PFN + RAM_FRAMES).contains(&pfn),
            "{pa} is outside simulated RAM"
        );
        (pfn - RAM_BASE_PFN) as usize
    }

    pub fn fill(&self, page: PhysicalPage<Size4K>, byte: u8) {
        self.page_bytes_mut(page).fill(byte);
    }

    pub fn read(&self, page: PhysicalPage<Size4K>) -> Vec<u8> {
        self.page_bytes_mut(page).to_vec()
    }
}

impl PhysMapper for Ram {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let frame = &self.frames[self.index_of(pa)];
        let offset = pa.offset::<Size4K>() as usize;
        unsafe { &mut *frame.0.get().cast::<u8>().add(offset).cast::<T>() }
    }
}

/// Node 1 owns [`NODE1_POOL`]; everything else is node 0.
pub struct TwoNodes;

impl NodeTopology for TwoNodes {
    fn pfn_to_nid(&self, pfn: PageFrameNumber) -> NodeId {
        let index = pfn.as_u64().wrapping_sub(RAM_BASE_PFN);
        if NODE1_POOL.contains(&index) {
            NodeId::new(1)
        } else {
            NodeId::new(0)
        }
    }

    fn node_distance(&self, from: NodeId, to: NodeId) -> u8 {
        if from == to { 10 } else { 20 }
    }
}

#[derive(Default)]
pub struct RecordingTlb {
    pub flushes: RefCell<Vec<(VirtualAddress, VirtualAddress)>>,
}

impl TlbFlush for RecordingTlb {
    fn flush_kernel_range(&self, start: VirtualAddress, end: VirtualAddress) {
        self.flushes.borrow_mut().push((start, end));
    }
}

/// Order-0 page allocator over [`NODE0_POOL`] and [`NODE1_POOL`].
pub struct SimPageAllocator {
    pub available: bool,
    pools: [Vec<PhysicalPage<Size4K>>; 2],
    outstanding: BTreeSet<PhysicalPage<Size4K>>,
    pub requests: Vec<(NodeId, GfpFlags, u32)>,
    pub freed: Vec<PhysicalPage<Size4K>>,
    /// Fail the request with this 1-based number and every one after it.
    pub fail_from: Option<usize>,
}

impl SimPageAllocator {
    pub fn new() -> Self {
        // Reversed so that pops hand out ascending frames.
        let pool = |range: Range<u64>| range.rev().map(frame).collect::<Vec<_>>();
        Self {
            available: true,
            pools: [pool(NODE0_POOL), pool(NODE1_POOL)],
            outstanding: BTreeSet::new(),
            requests: Vec::new(),
            freed: Vec::new(),
            fail_from: None,
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    pub fn owns(&self, page: PhysicalPage<Size4K>) -> bool {
        self.outstanding.contains(&page)
    }
}

impl PageAllocator for SimPageAllocator {
    fn is_available(&self) -> bool {
        self.available
    }

    fn alloc_pages_node(
        &mut self,
        node: NodeId,
        gfp: GfpFlags,
        order: u32,
    ) -> Option<PhysicalPage<Size4K>> {
        self.requests.push((node, gfp, order));
        if self.fail_from.is_some_and(|k| self.requests.len() >= k) || order != 0 {
            return None;
        }

        let preferred = usize::from(node.as_u16() != 0);
        let page = match self.pools[preferred].pop() {
            Some(page) => page,
            None if !gfp.contains(GfpFlags::THISNODE) => self.pools[1 - preferred].pop()?,
            None => return None,
        };
        self.outstanding.insert(page);
        Some(page)
    }

    fn free_pages(&mut self, page: PhysicalPage<Size4K>, order: u32) {
        assert_eq!(order, 0);
        assert!(self.outstanding.remove(&page), "double free of {page:?}");
        self.freed.push(page);
    }
}

/// Bump reservation over [`BOOT_REGION`].
pub struct SimBootAllocator {
    next: u64,
    reserved: BTreeSet<PhysicalPage<Size4K>>,
    pub requests: Vec<BootRequest>,
    pub freed: Vec<PhysicalPage<Size4K>>,
}

impl SimBootAllocator {
    pub fn new() -> Self {
        Self {
            next: frame(BOOT_REGION.start).base().as_u64(),
            reserved: BTreeSet::new(),
            requests: Vec::new(),
            freed: Vec::new(),
        }
    }

    pub fn reserved(&self) -> usize {
        self.reserved.len()
    }
}

impl BootAllocator for SimBootAllocator {
    fn alloc_try_nid_raw(&mut self, req: BootRequest) -> Option<PhysicalAddress> {
        self.requests.push(req);
        let end = frame(BOOT_REGION.end).base().as_u64();
        let limit = match req.limit {
            BootLimit::Accessible => end,
            BootLimit::Below(pa) => end.min(pa.as_u64()),
        };

        let base = self.next.div_ceil(req.align) * req.align;
        if base + req.size > limit {
            return None;
        }
        self.next = base + req.size;

        let mut pa = base;
        while pa < base + req.size {
            self.reserved.insert(PhysicalAddress::new(pa).page());
            pa += 4096;
        }
        Some(PhysicalAddress::new(base))
    }

    fn free_bootmem_page(&mut self, page: PhysicalPage<Size4K>) {
        assert!(self.reserved.remove(&page), "{page:?} is not reserved");
        self.freed.push(page);
    }

    fn is_reserved(&self, page: PhysicalPage<Size4K>) -> bool {
        self.reserved.contains(&page)
    }
}

pub type SimBlockAllocator = BlockAllocator<SimPageAllocator, SimBootAllocator>;

/// Allocators with the page allocator up.
pub fn allocators() -> SimBlockAllocator {
    BlockAllocator::new(SimPageAllocator::new(), SimBootAllocator::new())
}

/// Allocators as seen during early boot.
pub fn early_allocators() -> SimBlockAllocator {
    let mut general = SimPageAllocator::new();
    general.available = false;
    BlockAllocator::new(general, SimBootAllocator::new())
}

pub struct Machine {
    pub ram: Ram,
    pub tlb: RecordingTlb,
    pub topology: TwoNodes,
    pub root: PhysicalPage<Size4K>,
}

impl Machine {
    pub fn new() -> Self {
        Self {
            ram: Ram::new(),
            tlb: RecordingTlb::default(),
            topology: TwoNodes,
            root: frame(ROOT_FRAME),
        }
    }

    pub fn vmemmap(&self) -> Vmemmap<'_, Ram> {
        Vmemmap::new(self.root, &self.ram, &self.tlb, &self.topology)
    }

    pub fn flushes(&self) -> Vec<(VirtualAddress, VirtualAddress)> {
        self.tlb.flushes.borrow().clone()
    }
}
