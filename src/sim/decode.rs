//! The opcode decode table.
//!
//! Instructions are dispatched through an [`OpcodeTable`], which maps each opcode byte
//! to an optional [`OpcodeEntry`]. An entry records the instruction's mnemonic,
//! its total length in bytes, and the handler that applies its effect.
//!
//! New instructions are added by registering another entry;
//! the engine's step loop does not change.
//!
//! ```
//! use dos_sandbox::sim::decode::{InstrCtx, OpcodeEntry, OpcodeTable};
//! use dos_sandbox::sim::mem::reg_consts::R0;
//!
//! // INC R0
//! fn inc_r0(ctx: InstrCtx<'_>) {
//!     ctx.regs[R0] = ctx.regs[R0].wrapping_add(1);
//! }
//!
//! let mut table = OpcodeTable::new();
//! assert!(table.lookup(0x40).is_none());
//!
//! table.register(0x40, OpcodeEntry::new("INC R0", 1, inc_r0));
//! assert_eq!(table.lookup(0x40).map(|e| e.mnemonic()), Some("INC R0"));
//! ```

use super::mem::RegFile;

/// The no-operation opcode.
pub const NOP: u8 = 0x90;

/// State an instruction handler may touch.
///
/// Handlers cannot move the program counter;
/// the engine advances it by the entry's length after the handler returns.
#[derive(Debug)]
pub struct InstrCtx<'a> {
    /// The register file.
    pub regs: &'a mut RegFile,
    /// The flags word.
    pub flags: &'a mut u32,
    /// The bytes following the opcode (`len - 1` of them).
    pub operands: &'a [u8],
}

/// Applies an instruction's effect.
pub type Handler = fn(InstrCtx<'_>);

/// A registered instruction.
#[derive(Clone, Copy)]
pub struct OpcodeEntry {
    mnemonic: &'static str,
    len: u8,
    exec: Handler
}
impl OpcodeEntry {
    /// Creates a new entry.
    ///
    /// `len` is the instruction's full length in bytes, including the opcode.
    /// A length of 0 is treated as 1, so the program counter always moves forward.
    pub fn new(mnemonic: &'static str, len: u8, exec: Handler) -> Self {
        Self { mnemonic, len: len.max(1), exec }
    }

    /// The instruction's mnemonic.
    pub fn mnemonic(&self) -> &'static str {
        self.mnemonic
    }
    /// The instruction's full length in bytes.
    pub fn size(&self) -> u8 {
        self.len
    }
    /// Runs the handler.
    pub fn exec(&self, ctx: InstrCtx<'_>) {
        (self.exec)(ctx)
    }
}
impl std::fmt::Debug for OpcodeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpcodeEntry")
            .field("mnemonic", &self.mnemonic)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

fn nop(_: InstrCtx<'_>) {}

/// Maps opcode bytes to their instructions.
#[derive(Clone)]
pub struct OpcodeTable {
    entries: Box<[Option<OpcodeEntry>; 256]>
}
impl OpcodeTable {
    /// Creates a table with nothing registered.
    pub fn empty() -> Self {
        Self { entries: Box::new([None; 256]) }
    }

    /// Creates a table holding the base instruction set (currently only `NOP`).
    pub fn new() -> Self {
        let mut table = Self::empty();
        table.register(NOP, OpcodeEntry::new("NOP", 1, nop));
        table
    }

    /// Registers an instruction, returning the entry it replaced (if any).
    pub fn register(&mut self, opcode: u8, entry: OpcodeEntry) -> Option<OpcodeEntry> {
        self.entries[usize::from(opcode)].replace(entry)
    }

    /// Removes an instruction, returning its entry (if any).
    pub fn unregister(&mut self, opcode: u8) -> Option<OpcodeEntry> {
        self.entries[usize::from(opcode)].take()
    }

    /// Looks up the instruction for an opcode.
    pub fn lookup(&self, opcode: u8) -> Option<&OpcodeEntry> {
        self.entries[usize::from(opcode)].as_ref()
    }

    /// Iterates over every registered opcode in ascending order.
    pub fn iter(&self) -> impl Iterator<Item=(u8, &OpcodeEntry)> + '_ {
        (0..=u8::MAX).zip(self.entries.iter())
            .filter_map(|(op, e)| Some((op, e.as_ref()?)))
    }
}
impl Default for OpcodeTable {
    fn default() -> Self {
        Self::new()
    }
}
impl std::fmt::Debug for OpcodeTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(op, e)| (op, e.mnemonic())))
            .finish()
    }
}
