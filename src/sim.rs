//! Instruction execution for the emulated machine.
//!
//! This module consists of:
//! - [`Engine`]: The struct that executes instructions from a [`Store`].
//! - [`mem`]: The module handling the register file and the instruction store.
//! - [`decode`]: The module holding the open opcode table.
//! - [`interrupt`]: The module handling interrupt records and the interrupt queue.
//! - [`debug`]: The module holding the interactive debugger session.
//!
//! # Usage
//!
//! The store is created by the host and lent to the engine on every step:
//!
//! ```
//! use dos_sandbox::sim::Engine;
//! use dos_sandbox::sim::mem::Store;
//!
//! let store = Store::from_bytes(vec![0x90, 0x90, 0x90]);
//! let mut engine = Engine::new();
//!
//! engine.step(&store).unwrap();
//! engine.step(&store).unwrap();
//! engine.step(&store).unwrap();
//! assert_eq!(engine.pc, 3);
//!
//! // Nothing left to fetch:
//! assert!(engine.step(&store).is_err());
//! assert_eq!(engine.pc, 3);
//! ```
//!
//! ## Faults
//!
//! [`Engine::step`] never panics. It reports one of two [`StepErr`]s:
//! - [`StepErr::OutOfBoundsFetch`]: the PC is past the end of the store.
//!     Nothing is changed and the PC stays where it is.
//! - [`StepErr::UnknownOpcode`]: no instruction is registered for the byte at the PC.
//!     The byte is skipped (the PC moves forward by one) and nothing else is changed.
//!
//! The caller decides whether to keep stepping.
//!
//! ## Extending the instruction set
//!
//! Instructions live in the engine's [`OpcodeTable`] (the `opcodes` field).
//! Registering a new [`OpcodeEntry`] is all it takes for the engine to execute it:
//!
//! ```
//! use dos_sandbox::sim::{Engine, flags};
//! use dos_sandbox::sim::decode::{InstrCtx, OpcodeEntry};
//! use dos_sandbox::sim::mem::Store;
//!
//! // STI: set the interrupt-enable flag
//! fn sti(ctx: InstrCtx<'_>) {
//!     *ctx.flags |= flags::IF;
//! }
//!
//! let mut engine = Engine::new();
//! engine.opcodes.register(0xFB, OpcodeEntry::new("STI", 1, sti));
//!
//! let store = Store::from_bytes(vec![0xFB]);
//! engine.step(&store).unwrap();
//! assert!(engine.interrupts_enabled());
//! ```
//!
//! ## Interrupts
//!
//! Interrupts wait in an [`InterruptQueue`] until the engine polls it
//! (see [`Engine::poll_interrupt`] and [`Engine::step_with_interrupts`]).
//! While the interrupt-enable flag ([`flags::IF`]) is clear, polling leaves the queue untouched.
//!
//! [`Store`]: self::mem::Store
//! [`OpcodeTable`]: self::decode::OpcodeTable
//! [`OpcodeEntry`]: self::decode::OpcodeEntry
//! [`InterruptQueue`]: self::interrupt::InterruptQueue
pub mod mem;
pub mod decode;
pub mod interrupt;
pub mod debug;

use decode::{InstrCtx, OpcodeTable};
use interrupt::{Interrupt, InterruptQueue};
use mem::{RegFile, Store, StoreInit};

/// Bits of the flags word.
///
/// The engine only consults [`IF`]; the rest are laid out for instruction handlers.
pub mod flags {
    /// Carry.
    pub const CF: u32 = 1 << 0;
    /// Parity.
    pub const PF: u32 = 1 << 2;
    /// Auxiliary carry.
    pub const AF: u32 = 1 << 4;
    /// Zero.
    pub const ZF: u32 = 1 << 6;
    /// Sign.
    pub const SF: u32 = 1 << 7;
    /// Trap.
    pub const TF: u32 = 1 << 8;
    /// Interrupt enable.
    pub const IF: u32 = 1 << 9;
    /// Direction.
    pub const DF: u32 = 1 << 10;
    /// Overflow.
    pub const OF: u32 = 1 << 11;
}

/// The address the PC is set to when an interrupt is delivered.
pub const DISPATCH_TARGET: u32 = 0;

/// The default number of steps in a burst.
pub const DEFAULT_BURST_SIZE: u32 = 1000;

/// Errors that can occur during a step.
///
/// Neither of these is fatal. See the module-level documentation for how each is recovered.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StepErr {
    /// The PC (or an instruction's operands) lies outside the store.
    OutOfBoundsFetch {
        /// PC at the time of the fetch.
        pc: u32,
        /// Length of the store.
        len: usize
    },
    /// No instruction is registered for the fetched opcode.
    UnknownOpcode {
        /// The opcode byte.
        opcode: u8,
        /// PC the opcode was fetched from.
        pc: u32
    },
}
impl std::fmt::Display for StepErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepErr::OutOfBoundsFetch { pc, len } => write!(f, "PC=0x{pc:08X} is outside of memory (size 0x{len:X})"),
            StepErr::UnknownOpcode { opcode, pc } => write!(f, "unknown opcode 0x{opcode:02X} at PC=0x{pc:08X}"),
        }
    }
}
impl std::error::Error for StepErr {}

/// Configuration flags for a debugging session.
///
/// Read the field descriptions for more details.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SimFlags {
    /// The number of steps the `go` command runs before stopping.
    ///
    /// By default, this is [`DEFAULT_BURST_SIZE`].
    pub burst_size: u32,

    /// The number of slots in the interrupt queue.
    ///
    /// By default, this is [`interrupt::DEFAULT_QUEUE_CAPACITY`].
    pub queue_capacity: usize,

    /// How the store is filled before a program image is loaded.
    ///
    /// By default, this is [`StoreInit::Zeroed`].
    pub store_init: StoreInit,
}
impl Default for SimFlags {
    fn default() -> Self {
        Self {
            burst_size: DEFAULT_BURST_SIZE,
            queue_capacity: interrupt::DEFAULT_QUEUE_CAPACITY,
            store_init: StoreInit::Zeroed,
        }
    }
}

/// A copy of the engine's visible state.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Snapshot {
    /// The program counter.
    pub pc: u32,
    /// The flags word.
    pub flags: u32,
    /// The general-purpose registers.
    pub regs: RegFile,
}
impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "----- CPU state -----")?;
        writeln!(f, "PC: 0x{:08X}, FLAGS: 0x{:08X}", self.pc, self.flags)?;
        for (i, r) in self.regs.as_slice().iter().enumerate() {
            if i != 0 { f.write_str(" ")?; }
            write!(f, "R{i}: 0x{r:08X}")?;
        }
        writeln!(f)?;
        write!(f, "---------------------")
    }
}

/// Results of a burst of steps (see [`Engine::run_with_limit`]).
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct RunSummary {
    /// Number of steps which changed the machine state
    /// (executed instructions, skipped unknown opcodes, and delivered interrupts).
    pub steps: u32,
    /// Number of those steps which skipped an unknown opcode.
    pub unknown_opcodes: u32,
    /// Number of those steps which delivered an interrupt.
    pub interrupts: u32,
    /// The fault which ended the burst early, if any.
    pub stopped: Option<StepErr>,
}

/// One disassembled instruction (see [`Engine::disassemble`]).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DisasmLine {
    /// Address of the opcode.
    pub addr: u32,
    /// The instruction's bytes (fewer than its length if it runs off the store).
    pub bytes: Vec<u8>,
    /// The rendered instruction.
    pub text: String,
}
impl std::fmt::Display for DisasmLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08X}  {}", self.addr, self.text)
    }
}

/// Executes instructions.
#[derive(Debug, Clone)]
pub struct Engine {
    /// The register file.
    pub reg_file: RegFile,

    /// The program counter.
    pub pc: u32,

    /// The flags word. See [`flags`] for its bits.
    flags: u32,

    /// The number of instructions successfully run since this engine was created.
    ///
    /// This can be set to 0 to reset the counter.
    pub instructions_run: u64,

    /// The instruction set.
    ///
    /// This is preserved by [`Engine::reset`].
    pub opcodes: OpcodeTable,
}
impl Engine {
    /// Creates an engine with zeroed state and the base instruction set.
    pub fn new() -> Self {
        Self::with_opcodes(OpcodeTable::new())
    }

    /// Creates an engine with zeroed state and the given instruction set.
    pub fn with_opcodes(opcodes: OpcodeTable) -> Self {
        log::info!("engine initialized ({} opcodes)", opcodes.iter().count());

        Self {
            reg_file: RegFile::new(),
            pc: 0,
            flags: 0,
            instructions_run: 0,
            opcodes,
        }
    }

    /// Resets the machine state back to zero, preserving the instruction set.
    pub fn reset(&mut self) {
        let opcodes = std::mem::take(&mut self.opcodes);
        *self = Self::with_opcodes(opcodes);
    }

    /// The flags word.
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Sets or clears bits of the flags word.
    pub fn set_flag(&mut self, mask: u32, value: bool) {
        match value {
            true  => self.flags |= mask,
            false => self.flags &= !mask,
        }
    }

    /// Whether the interrupt-enable flag is set.
    pub fn interrupts_enabled(&self) -> bool {
        self.flags & flags::IF != 0
    }


    /// Copies out the program counter, flags, and registers.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot { pc: self.pc, flags: self.flags, regs: self.reg_file }
    }

    /// Simulate one step, executing one instruction.
    ///
    /// The interrupt queue is not consulted. For that, see [`Engine::step_with_interrupts`].
    pub fn step(&mut self, store: &Store) -> Result<(), StepErr> {
        let pc = self.pc;
        let addr = usize::try_from(pc).unwrap_or(usize::MAX);
        let oob = StepErr::OutOfBoundsFetch { pc, len: store.len() };

        let Some(opcode) = store.get(addr) else {
            log::warn!("{oob}");
            return Err(oob);
        };

        let Some(&entry) = self.opcodes.lookup(opcode) else {
            let err = StepErr::UnknownOpcode { opcode, pc };
            log::warn!("{err}, skipping");
            self.pc = pc.wrapping_add(1);
            return Err(err);
        };

        // The whole instruction has to be in the store before anything changes.
        let end = addr.saturating_add(usize::from(entry.size()));
        let Some(operands) = store.as_slice().get(addr + 1..end) else {
            log::warn!("{} at PC=0x{pc:08X} runs past the end of memory", entry.mnemonic());
            return Err(oob);
        };

        entry.exec(InstrCtx {
            regs: &mut self.reg_file,
            flags: &mut self.flags,
            operands
        });
        self.pc = pc.wrapping_add(u32::from(entry.size()));
        self.instructions_run = self.instructions_run.wrapping_add(1);

        log::trace!("executed {} at PC=0x{pc:08X}", entry.mnemonic());
        Ok(())
    }

    /// Redirects execution to the interrupt dispatch target.
    ///
    /// This sets the PC to [`DISPATCH_TARGET`].
    ///
    /// Note that this is a simplification of real interrupt delivery:
    /// no return context is saved, and the target does not depend on `interrupt.number()`.
    /// A full implementation would push the flags and PC and index a vector table by the interrupt number.
    pub fn deliver_interrupt(&mut self, interrupt: Interrupt) {
        log::debug!("delivering {interrupt} from PC=0x{:08X}", self.pc);
        self.pc = DISPATCH_TARGET;
    }

    /// Checks for an interrupt to deliver.
    ///
    /// If interrupts are enabled, the interrupt at the front of the queue (if any)
    /// is taken off, delivered (see [`Engine::deliver_interrupt`]), and returned.
    /// If interrupts are disabled, the queue is not touched.
    pub fn poll_interrupt(&mut self, queue: &mut InterruptQueue) -> Option<Interrupt> {
        if !self.interrupts_enabled() { return None };

        let interrupt = queue.dequeue().ok()?;
        self.deliver_interrupt(interrupt);
        Some(interrupt)
    }

    /// Simulate one step, delivering an interrupt instead of executing if one is ready.
    ///
    /// This returns the interrupt that was delivered, if any.
    pub fn step_with_interrupts(&mut self, store: &Store, queue: &mut InterruptQueue) -> Result<Option<Interrupt>, StepErr> {
        match self.poll_interrupt(queue) {
            Some(interrupt) => Ok(Some(interrupt)),
            None => self.step(store).map(|()| None),
        }
    }

    /// Runs up to `limit` steps (see [`Engine::step_with_interrupts`]).
    ///
    /// Unknown opcodes are skipped and the burst continues.
    /// An out-of-bounds fetch ends the burst, since no further step could make progress.
    pub fn run_with_limit(&mut self, store: &Store, queue: &mut InterruptQueue, limit: u32) -> RunSummary {
        let mut summary = RunSummary::default();

        while summary.steps < limit {
            match self.step_with_interrupts(store, queue) {
                Ok(Some(_)) => summary.interrupts += 1,
                Ok(None) => {},
                Err(StepErr::UnknownOpcode { .. }) => summary.unknown_opcodes += 1,
                Err(e @ StepErr::OutOfBoundsFetch { .. }) => {
                    summary.stopped = Some(e);
                    break;
                }
            }
            summary.steps += 1;
        }

        log::debug!("burst ran {} of {limit} steps", summary.steps);
        summary
    }

    /// Lists up to `count` instructions starting at `addr`, without executing them.
    ///
    /// Unregistered bytes are listed as `db XXh`. Listing stops at the end of the store.
    pub fn disassemble(&self, store: &Store, mut addr: u32, count: usize) -> Vec<DisasmLine> {
        let mut lines = vec![];

        for _ in 0..count {
            let start = usize::try_from(addr).unwrap_or(usize::MAX);
            let Some(opcode) = store.get(start) else { break };

            let (size, text) = match self.opcodes.lookup(opcode) {
                Some(e) => (usize::from(e.size()), e.mnemonic().to_string()),
                None => (1, format!("db {opcode:02X}h")),
            };

            let end = start.saturating_add(size).min(store.len());
            let bytes = store.as_slice()[start..end].to_vec();
            let text = match bytes.len() < size {
                true  => format!("{text} ; truncated"),
                false => text,
            };

            lines.push(DisasmLine { addr, bytes, text });
            // size <= u8::MAX
            addr = addr.wrapping_add(size as u32);
        }

        lines
    }
}
impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
