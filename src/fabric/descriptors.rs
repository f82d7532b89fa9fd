//! Host-managed view slots
//!
//! A simulation needs six views (read + read/write per array). The host owns a
//! [`DescriptorTable`], hands the simulation a base slot, and later binds or
//! samples views by [`ViewSlot`].

use crate::error::{FabricError, FabricResult};

/// Index of a view in a [`DescriptorTable`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewSlot(pub u32);

impl ViewSlot {
    pub fn offset(self, n: u32) -> ViewSlot {
        ViewSlot(self.0 + n)
    }
}

/// How a view exposes its array
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewAccess {
    Read,
    ReadWrite,
}

impl ViewAccess {
    pub fn name(self) -> &'static str {
        match self {
            ViewAccess::Read => "read",
            ViewAccess::ReadWrite => "read_write",
        }
    }
}

/// A registered view of one array
#[derive(Clone, Debug)]
pub struct ArrayView<A> {
    pub array: A,
    pub access: ViewAccess,
}

/// The pair of views registered for one physical array
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArrayViewSlots {
    pub read: ViewSlot,
    pub read_write: ViewSlot,
}

/// Fixed-capacity table of views, shared by every simulation a host runs
pub struct DescriptorTable<A> {
    entries: Vec<Option<ArrayView<A>>>,
    next_free: u32,
}

impl<A> DescriptorTable<A> {
    pub fn new(capacity: u32) -> Self {
        let mut entries = Vec::with_capacity(capacity as usize);
        entries.resize_with(capacity as usize, || None);
        Self { entries, next_free: 0 }
    }

    pub fn capacity(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Reserve `count` consecutive slots
    pub fn allocate(&mut self, count: u32) -> FabricResult<ViewSlot> {
        let base = self.next_free;
        self.check_range(ViewSlot(base), count)?;
        self.next_free += count;
        Ok(ViewSlot(base))
    }

    pub fn check_range(&self, base: ViewSlot, count: u32) -> FabricResult<()> {
        let end = base.0.saturating_add(count);
        if end > self.capacity() {
            return Err(FabricError::DescriptorRange {
                base: base.0,
                end,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }

    pub fn write(&mut self, slot: ViewSlot, view: ArrayView<A>) -> FabricResult<()> {
        self.check_range(slot, 1)?;
        self.entries[slot.0 as usize] = Some(view);
        Ok(())
    }

    pub fn get(&self, slot: ViewSlot) -> Option<&ArrayView<A>> {
        self.entries.get(slot.0 as usize).and_then(Option::as_ref)
    }

    /// Look up a slot and check it was registered with the expected access
    pub fn resolve(&self, slot: ViewSlot, access: ViewAccess) -> FabricResult<&A> {
        let view = self.get(slot).ok_or(FabricError::DescriptorsUnbound)?;
        if view.access != access {
            return Err(FabricError::ViewAccessMismatch {
                slot: slot.0,
                expected: access.name(),
                actual: view.access.name(),
            });
        }
        Ok(&view.array)
    }
}
