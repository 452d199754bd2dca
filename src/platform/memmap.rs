//! The firmware memory map (E820 table).
//!
//! The map is an append-only list of physical address ranges and what they are used for.
//! It has a fixed number of slots ([`MAX_ENTRIES`]).

/// Maximum number of entries in a [`MemoryMap`].
pub const MAX_ENTRIES: usize = 16;

/// The use of a memory region.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum RegionKind {
    /// RAM available to programs (type 1).
    Usable,
    /// Reserved by the firmware (type 2).
    Reserved,
    /// Any other type code.
    Other(u32)
}
impl RegionKind {
    /// The E820 type code of this kind.
    pub fn code(self) -> u32 {
        match self {
            RegionKind::Usable   => 1,
            RegionKind::Reserved => 2,
            RegionKind::Other(n) => n,
        }
    }
}
impl From<u32> for RegionKind {
    fn from(value: u32) -> Self {
        match value {
            1 => RegionKind::Usable,
            2 => RegionKind::Reserved,
            n => RegionKind::Other(n),
        }
    }
}

/// One entry of the memory map.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct E820Entry {
    /// First address of the region.
    pub base: u64,
    /// Length of the region in bytes.
    pub len: u64,
    /// The use of the region.
    pub kind: RegionKind
}
impl E820Entry {
    /// Whether the region covers the given address.
    pub fn contains(&self, addr: u64) -> bool {
        // base + len is checked on insertion
        (self.base..self.base + self.len).contains(&addr)
    }
}
impl std::fmt::Display for E820Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "base=0x{:X}, length=0x{:X}, type={}", self.base, self.len, self.kind.code())
    }
}

/// Errors from adding to a [`MemoryMap`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MemMapErr {
    /// Every slot is used.
    Full,
    /// The region extends past the end of the 64-bit address space.
    Overflow {
        /// First address of the region.
        base: u64,
        /// Length of the region.
        len: u64
    },
}
impl std::fmt::Display for MemMapErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemMapErr::Full => write!(f, "memory map is full ({MAX_ENTRIES} entries)"),
            MemMapErr::Overflow { base, len } => write!(f, "region at 0x{base:X} with length 0x{len:X} overflows the address space"),
        }
    }
}
impl std::error::Error for MemMapErr {}

/// The E820 memory map.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryMap {
    entries: Vec<E820Entry>
}
impl MemoryMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self { entries: Vec::with_capacity(MAX_ENTRIES) }
    }

    /// Creates the conventional real-mode map:
    /// 639 KiB of usable memory followed by a 1 KiB reserved region (the EBDA).
    pub fn conventional() -> Self {
        let mut map = Self::new();
        map.entries.push(E820Entry { base: 0x0, len: 0x9FC00, kind: RegionKind::Usable });
        map.entries.push(E820Entry { base: 0x9FC00, len: 0x400, kind: RegionKind::Reserved });
        map
    }

    /// Appends an entry.
    pub fn add(&mut self, base: u64, len: u64, kind: RegionKind) -> Result<(), MemMapErr> {
        if self.entries.len() >= MAX_ENTRIES {
            return Err(MemMapErr::Full);
        }
        if base.checked_add(len).is_none() {
            return Err(MemMapErr::Overflow { base, len });
        }

        let entry = E820Entry { base, len, kind };
        log::debug!("added E820 entry: {entry}");
        self.entries.push(entry);
        Ok(())
    }

    /// All entries, in the order they were added.
    pub fn entries(&self) -> &[E820Entry] {
        &self.entries
    }

    /// Finds the first entry covering an address.
    pub fn find(&self, addr: u64) -> Option<&E820Entry> {
        self.entries.iter().find(|e| e.contains(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::{MemMapErr, MemoryMap, RegionKind, MAX_ENTRIES};

    #[test]
    fn test_conventional() {
        let map = MemoryMap::conventional();
        assert_eq!(map.entries().len(), 2);
        assert_eq!(map.find(0x0).map(|e| e.kind), Some(RegionKind::Usable));
        assert_eq!(map.find(0x9FBFF).map(|e| e.kind), Some(RegionKind::Usable));
        assert_eq!(map.find(0x9FC00).map(|e| e.kind), Some(RegionKind::Reserved));
        assert_eq!(map.find(0xA0000), None);
        assert_eq!(map.entries()[1].to_string(), "base=0x9FC00, length=0x400, type=2");
    }

    #[test]
    fn test_full() {
        let mut map = MemoryMap::new();
        for i in 0..MAX_ENTRIES as u64 {
            map.add(i * 0x1000, 0x1000, RegionKind::from(1)).unwrap();
        }
        assert_eq!(map.add(0x100000, 0x1000, RegionKind::Reserved), Err(MemMapErr::Full));
        assert_eq!(map.entries().len(), MAX_ENTRIES);
    }

    #[test]
    fn test_overflow() {
        let mut map = MemoryMap::new();
        assert!(matches!(map.add(u64::MAX, 2, RegionKind::Other(3)), Err(MemMapErr::Overflow { .. })));
        assert!(map.entries().is_empty());
        assert_eq!(RegionKind::from(4), RegionKind::Other(4));
        assert_eq!(RegionKind::Other(4).code(), 4);
    }
}
