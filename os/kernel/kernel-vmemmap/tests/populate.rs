mod common;

use common::*;
use kernel_memory_addresses::{PageFrameNumber, PhysicalAddress};
use kernel_vmem::{PtEntry, TableLevel};
use kernel_vmemmap::{
    AllocError, AltmapError, BlockSource, BootLimit, GfpFlags, NodeId, SparseBuffer, VmemAltmap,
    VmemmapError,
};

const NODE0: NodeId = NodeId::new(0);
const NODE1: NodeId = NodeId::new(1);

#[test]
fn populate_maps_every_page_read_write() {
    let machine = Machine::new();
    let vmemmap = machine.vmemmap();
    let mut alloc = allocators();

    let stats = vmemmap
        .populate_basepages(&mut alloc, vmemmap_addr(0), vmemmap_addr(4), NODE0, None)
        .unwrap();
    assert_eq!(stats.mapped, 4);
    assert_eq!(stats.present, 0);
    assert_eq!(stats.offnode, 0);

    // PML4, PDPT, PD and PT first, then one leaf per page.
    for (i, expected) in (5..9).enumerate() {
        let pte = vmemmap.lookup(vmemmap_addr(i as u64)).unwrap();
        assert_eq!(pte, PtEntry::kernel(frame(expected)));
        assert!(pte.writable());
    }
    assert_eq!(alloc.general().outstanding(), 8);
    assert!(
        alloc
            .general()
            .requests
            .iter()
            .all(|&(node, gfp, order)| node == NODE0 && gfp == GfpFlags::VMEMMAP_BLOCK && order == 0)
    );
}

#[test]
fn tables_are_zeroed_but_leaves_are_not() {
    let machine = Machine::new();
    for index in 1..6 {
        machine.ram.fill(frame(index), 0xAA);
    }

    let vmemmap = machine.vmemmap();
    let mut alloc = allocators();
    vmemmap
        .populate_basepages(&mut alloc, vmemmap_addr(0), vmemmap_addr(1), NODE0, None)
        .unwrap();

    // The page table holds exactly one entry.
    let pt = machine.ram.read(frame(4));
    assert!(pt[8..].iter().all(|&b| b == 0));
    assert!(machine.ram.read(frame(5)).iter().all(|&b| b == 0xAA));
}

#[test]
fn populate_twice_allocates_nothing_new() {
    let machine = Machine::new();
    let vmemmap = machine.vmemmap();
    let mut alloc = allocators();

    vmemmap
        .populate_basepages(&mut alloc, vmemmap_addr(0), vmemmap_addr(4), NODE0, None)
        .unwrap();
    let requests = alloc.general().requests.len();

    let stats = vmemmap
        .populate_basepages(&mut alloc, vmemmap_addr(0), vmemmap_addr(4), NODE0, None)
        .unwrap();
    assert_eq!(stats.mapped, 0);
    assert_eq!(stats.present, 4);
    assert_eq!(stats.total(), 4);
    assert_eq!(alloc.general().requests.len(), requests);
}

#[test]
fn failure_keeps_lower_pages_and_retry_completes() {
    let machine = Machine::new();
    let vmemmap = machine.vmemmap();
    let mut alloc = allocators();

    // Four tables and the first leaf succeed; the second leaf fails.
    alloc.general_mut().fail_from = Some(6);
    let err = vmemmap
        .populate_basepages(&mut alloc, vmemmap_addr(0), vmemmap_addr(4), NODE0, None)
        .unwrap_err();
    assert_eq!(
        err,
        VmemmapError::OutOfMemory {
            level: TableLevel::Pt,
            addr: vmemmap_addr(1),
            source: AllocError::GeneralAllocator {
                order: 0,
                node: NODE0
            },
        }
    );
    assert!(!vmemmap.lookup(vmemmap_addr(0)).unwrap().is_none());
    assert!(vmemmap.lookup(vmemmap_addr(1)).unwrap().is_none());

    alloc.general_mut().fail_from = None;
    let stats = vmemmap
        .populate_basepages(&mut alloc, vmemmap_addr(0), vmemmap_addr(4), NODE0, None)
        .unwrap();
    assert_eq!(stats.present, 1);
    assert_eq!(stats.mapped, 3);
}

#[test]
fn table_failure_names_the_level() {
    let machine = Machine::new();
    let vmemmap = machine.vmemmap();
    let mut alloc = allocators();

    alloc.general_mut().fail_from = Some(3);
    let err = vmemmap
        .populate_basepages(&mut alloc, vmemmap_addr(0), vmemmap_addr(1), NODE0, None)
        .unwrap_err();
    assert!(matches!(
        err,
        VmemmapError::OutOfMemory {
            level: TableLevel::Pdpt,
            ..
        }
    ));
    assert_eq!(vmemmap.lookup(vmemmap_addr(0)), None);
}

#[test]
fn early_boot_uses_the_boot_reserve() {
    let machine = Machine::new();
    let vmemmap = machine.vmemmap();
    let mut alloc = early_allocators();

    let stats = vmemmap
        .populate_basepages(&mut alloc, vmemmap_addr(0), vmemmap_addr(2), NODE0, None)
        .unwrap();
    assert_eq!(stats.mapped, 2);
    assert!(alloc.general().requests.is_empty());
    assert_eq!(alloc.boot().reserved(), 6);

    let req = alloc.boot().requests[0];
    assert_eq!(req.size, 4096);
    assert_eq!(req.align, 4096);
    assert_eq!(req.goal, PhysicalAddress::new(16 << 20));
    assert_eq!(req.limit, BootLimit::Accessible);

    let leaf = vmemmap.lookup(vmemmap_addr(0)).unwrap().physical_page();
    assert!(BOOT_REGION.contains(&(leaf.pfn().as_u64() - RAM_BASE_PFN)));
}

#[test]
fn remote_frames_are_counted_not_rejected() {
    let machine = Machine::new();
    let vmemmap = machine.vmemmap();
    let mut alloc = early_allocators();

    // The boot region belongs to node 0.
    let stats = vmemmap
        .populate_basepages(&mut alloc, vmemmap_addr(0), vmemmap_addr(3), NODE1, None)
        .unwrap();
    assert_eq!(stats.mapped, 3);
    assert_eq!(stats.offnode, 3);

    let pte = vmemmap.lookup(vmemmap_addr(0)).unwrap();
    let page = vmemmap
        .verify(pte, NODE1, vmemmap_addr(0), vmemmap_addr(1))
        .unwrap();
    assert_eq!(page.requested, NODE1);
    assert_eq!(page.actual, NODE0);
    assert_eq!(page.pfn, pte.physical_page().pfn());
    assert_eq!(vmemmap.verify(pte, NODE0, vmemmap_addr(0), vmemmap_addr(1)), None);
}

#[test]
fn node_local_frames_are_preferred() {
    let machine = Machine::new();
    let vmemmap = machine.vmemmap();
    let mut alloc = allocators();

    let stats = vmemmap
        .populate_basepages(&mut alloc, vmemmap_addr(0), vmemmap_addr(2), NODE1, None)
        .unwrap();
    assert_eq!(stats.offnode, 0);
    let leaf = vmemmap.lookup(vmemmap_addr(1)).unwrap().physical_page();
    assert!(NODE1_POOL.contains(&(leaf.pfn().as_u64() - RAM_BASE_PFN)));
}

#[test]
fn sparse_buffer_backs_leaves_first() {
    let machine = Machine::new();
    let vmemmap = machine.vmemmap();
    let buffer_base = frame(DEVICE_REGION.start).base();
    let mut alloc = allocators().with_sparse_buffer(SparseBuffer::new(buffer_base, 2 * 4096));

    vmemmap
        .populate_basepages(&mut alloc, vmemmap_addr(0), vmemmap_addr(4), NODE0, None)
        .unwrap();

    let leaf = |i| vmemmap.lookup(vmemmap_addr(i)).unwrap().physical_page();
    assert_eq!(leaf(0), frame(DEVICE_REGION.start));
    assert_eq!(leaf(1), frame(DEVICE_REGION.start + 1));
    assert!(alloc.general().owns(leaf(2)));
    assert!(alloc.general().owns(leaf(3)));

    // Tables never come from the buffer.
    assert_eq!(alloc.general().outstanding(), 6);
    assert_eq!(alloc.sparse_buffer().remaining(), 0);
}

#[test]
fn altmap_backs_leaves_but_not_tables() {
    let machine = Machine::new();
    let vmemmap = machine.vmemmap();
    let mut alloc = allocators();
    let base = PageFrameNumber::new(RAM_BASE_PFN + DEVICE_REGION.start);
    let mut altmap = VmemAltmap::new(base, 2, 8);

    vmemmap
        .populate_basepages(
            &mut alloc,
            vmemmap_addr(0),
            vmemmap_addr(4),
            NODE0,
            Some(&mut altmap),
        )
        .unwrap();

    for i in 0..4 {
        let leaf = vmemmap.lookup(vmemmap_addr(i)).unwrap().physical_page();
        assert_eq!(leaf.pfn(), base + 2 + i);
    }
    assert_eq!(altmap.allocated(), 4);
    assert_eq!(altmap.nr_free(), 4);
    assert_eq!(alloc.general().outstanding(), 4);
}

#[test]
fn exhausted_altmap_fails_without_fallback() {
    let machine = Machine::new();
    let vmemmap = machine.vmemmap();
    let mut alloc = allocators();
    let base = PageFrameNumber::new(RAM_BASE_PFN + DEVICE_REGION.start);
    let mut altmap = VmemAltmap::new(base, 0, 2);

    let err = vmemmap
        .populate_basepages(
            &mut alloc,
            vmemmap_addr(0),
            vmemmap_addr(3),
            NODE0,
            Some(&mut altmap),
        )
        .unwrap_err();
    assert_eq!(
        err,
        VmemmapError::OutOfMemory {
            level: TableLevel::Pt,
            addr: vmemmap_addr(2),
            source: AllocError::Altmap(AltmapError::Exhausted {
                requested: 1,
                available: 0
            }),
        }
    );
    assert_eq!(alloc.general().outstanding(), 4);
}

#[test]
fn block_sources_are_tagged() {
    let machine = Machine::new();
    let vmemmap = machine.vmemmap();

    let mut early = early_allocators();
    let block = vmemmap.alloc_block_zero(&mut early, 4096, NODE0).unwrap();
    assert_eq!(block.source(), BlockSource::BootReserve);

    let mut alloc = allocators();
    machine.ram.fill(frame(1), 0x55);
    let block = vmemmap.alloc_block_zero(&mut alloc, 4096, NODE0).unwrap();
    assert_eq!(block.source(), BlockSource::General);
    assert_eq!(block.page(), frame(1));
    assert!(machine.ram.read(frame(1)).iter().all(|&b| b == 0));
}

#[test]
fn general_allocator_failure_does_not_fall_back() {
    let mut alloc = allocators();
    alloc.general_mut().fail_from = Some(1);

    assert_eq!(
        alloc.alloc_block(4096, NODE1),
        Err(AllocError::GeneralAllocator {
            order: 0,
            node: NODE1
        })
    );
    assert!(alloc.boot().requests.is_empty());
}

#[test]
fn taken_sparse_buffer_no_longer_backs_leaves() {
    let machine = Machine::new();
    let vmemmap = machine.vmemmap();
    let buffer_base = frame(DEVICE_REGION.start).base();
    let mut alloc = allocators().with_sparse_buffer(SparseBuffer::new(buffer_base, 2 * 4096));

    vmemmap
        .populate_basepages(&mut alloc, vmemmap_addr(0), vmemmap_addr(1), NODE0, None)
        .unwrap();
    let leftover = alloc.take_sparse_buffer();
    assert_eq!(leftover.remaining(), 4096);
    assert_eq!(alloc.sparse_buffer().remaining(), 0);

    vmemmap
        .populate_basepages(&mut alloc, vmemmap_addr(1), vmemmap_addr(2), NODE0, None)
        .unwrap();
    let leaf = vmemmap.lookup(vmemmap_addr(1)).unwrap().physical_page();
    assert_eq!(leaf, frame(5));

    let (general, boot) = alloc.into_parts();
    assert!(general.owns(leaf));
    assert_eq!(general.outstanding(), 5);
    assert!(boot.requests.is_empty());
}
