//! Machine state for the execution engine.
//!
//! This module consists of:
//! - [`Reg`]: A general-purpose register name.
//! - [`RegFile`]: The register file.
//! - [`Store`]: The byte-addressable instruction/data store.
//! - [`StoreInit`]: The strategy used to fill a fresh store.

use rand::rngs::StdRng;
use rand::Rng;

/// Number of general-purpose registers.
pub const NUM_REGS: usize = 8;

/// A general-purpose register (`R0`-`R7`).
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct Reg(u8);

/// Constants for each general-purpose register.
pub mod reg_consts {
    use super::Reg;

    #[allow(missing_docs)] pub const R0: Reg = Reg(0);
    #[allow(missing_docs)] pub const R1: Reg = Reg(1);
    #[allow(missing_docs)] pub const R2: Reg = Reg(2);
    #[allow(missing_docs)] pub const R3: Reg = Reg(3);
    #[allow(missing_docs)] pub const R4: Reg = Reg(4);
    #[allow(missing_docs)] pub const R5: Reg = Reg(5);
    #[allow(missing_docs)] pub const R6: Reg = Reg(6);
    #[allow(missing_docs)] pub const R7: Reg = Reg(7);
}

impl Reg {
    /// Gets the register number of this register.
    pub fn reg_no(self) -> u8 {
        self.0
    }
}
impl TryFrom<u8> for Reg {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match usize::from(value) < NUM_REGS {
            true  => Ok(Reg(value)),
            false => Err(()),
        }
    }
}
impl From<Reg> for usize {
    fn from(value: Reg) -> Self {
        usize::from(value.0)
    }
}
impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// The register file.
///
/// This struct can be indexed with a [`Reg`]
/// (which can be constructed using the [`reg_consts`] module or via [`Reg::try_from`]).
///
/// # Example
///
/// ```
/// use dos_sandbox::sim::mem::RegFile;
/// use dos_sandbox::sim::mem::reg_consts::R0;
///
/// let mut reg = RegFile::new();
/// reg[R0] = 11;
/// assert_eq!(reg[R0], 11);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegFile([u32; NUM_REGS]);
impl RegFile {
    /// Creates a zeroed register file.
    pub fn new() -> Self {
        Self([0; NUM_REGS])
    }

    /// Views every register in order (`R0` first).
    pub fn as_slice(&self) -> &[u32; NUM_REGS] {
        &self.0
    }
}
impl std::ops::Index<Reg> for RegFile {
    type Output = u32;

    fn index(&self, index: Reg) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}
impl std::ops::IndexMut<Reg> for RegFile {
    fn index_mut(&mut self, index: Reg) -> &mut Self::Output {
        &mut self.0[usize::from(index)]
    }
}

/// Trait that describes types that can produce the initial bytes of a [`Store`].
pub trait ByteFiller {
    /// Generate one byte.
    fn generate(&mut self) -> u8;
}
impl ByteFiller for () {
    /// This creates unseeded, non-deterministic values.
    fn generate(&mut self) -> u8 {
        rand::random()
    }
}
impl ByteFiller for u8 {
    /// Sets each byte to the given value.
    fn generate(&mut self) -> u8 {
        *self
    }
}
impl ByteFiller for StdRng {
    /// This creates deterministic, seeded values.
    fn generate(&mut self) -> u8 {
        self.gen()
    }
}

/// Strategy used to fill a fresh [`Store`] before a program image is copied in.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum StoreInit {
    /// Every byte is zero.
    #[default]
    Zeroed,

    /// Fills each byte randomly and non-deterministically.
    Unseeded,

    /// Fills each byte randomly and deterministically.
    Seeded {
        /// The seed the RNG is initialized with.
        seed: u64
    },

    /// Fills each byte with a known value.
    Known {
        /// The value of every byte.
        value: u8
    }
}
impl StoreInit {
    fn filler(&self) -> StoreFiller {
        use rand::SeedableRng;

        match *self {
            StoreInit::Zeroed => StoreFiller::Known(0),
            StoreInit::Unseeded => StoreFiller::Unseeded,
            StoreInit::Seeded { seed } => StoreFiller::Seeded(Box::new(StdRng::seed_from_u64(seed))),
            StoreInit::Known { value } => StoreFiller::Known(value),
        }
    }
}

enum StoreFiller {
    Unseeded,
    Seeded(Box<StdRng>),
    Known(u8)
}
impl ByteFiller for StoreFiller {
    fn generate(&mut self) -> u8 {
        match self {
            StoreFiller::Unseeded  => ().generate(),
            StoreFiller::Seeded(r) => r.generate(),
            StoreFiller::Known(k)  => k.generate(),
        }
    }
}

/// Error raised when an image does not fit in a [`Store`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ImageTooLarge {
    /// Address the image was to be loaded at.
    pub addr: usize,
    /// Length of the image.
    pub image_len: usize,
    /// Length of the store.
    pub store_len: usize,
}
impl std::fmt::Display for ImageTooLarge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "image of {} bytes does not fit at 0x{:X} in a store of {} bytes", self.image_len, self.addr, self.store_len)
    }
}
impl std::error::Error for ImageTooLarge {}

/// The instruction/data store.
///
/// This is a fixed-length byte buffer.
/// It is created by the host before the engine and lent to each engine step;
/// the engine never resizes it.
///
/// Addresses at or past [`Store::len`] are never valid (they do not wrap around).
///
/// ```
/// use dos_sandbox::sim::mem::{Store, StoreInit};
///
/// let mut store = Store::new(4, StoreInit::Zeroed);
/// store.load(1, &[0x90, 0x90]).unwrap();
/// assert_eq!(store.get(1), Some(0x90));
/// assert_eq!(store.get(4), None);
/// assert!(store.load(3, &[0x90, 0x90]).is_err());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Store {
    data: Box<[u8]>
}
impl Store {
    /// Creates a store of the given length, filled by the given strategy.
    pub fn new(len: usize, init: StoreInit) -> Self {
        let mut filler = init.filler();

        Self {
            data: std::iter::repeat_with(|| filler.generate())
                .take(len)
                .collect()
        }
    }

    /// Creates a store holding exactly the provided bytes.
    pub fn from_bytes(bytes: impl Into<Box<[u8]>>) -> Self {
        Self { data: bytes.into() }
    }

    /// The number of addressable bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the store has no addressable bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reads the byte at `addr`, or `None` if `addr` is out of range.
    pub fn get(&self, addr: usize) -> Option<u8> {
        self.data.get(addr).copied()
    }

    /// Gets a mutable reference to the byte at `addr`, or `None` if `addr` is out of range.
    pub fn get_mut(&mut self, addr: usize) -> Option<&mut u8> {
        self.data.get_mut(addr)
    }

    /// Copies an image into the store starting at `addr`.
    ///
    /// Nothing is written if the image does not fit.
    pub fn load(&mut self, addr: usize, image: &[u8]) -> Result<(), ImageTooLarge> {
        let err = ImageTooLarge { addr, image_len: image.len(), store_len: self.len() };
        let end = addr.checked_add(image.len()).ok_or(err)?;

        self.data.get_mut(addr..end)
            .ok_or(err)?
            .copy_from_slice(image);
        Ok(())
    }

    /// Views the whole store.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Views the whole store mutably.
    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
