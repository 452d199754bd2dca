//! The virtual PC around the execution engine.
//!
//! The peripherals here are models of their state only;
//! none of them are wired to the engine's instruction stream yet.
//!
//! This module consists of:
//! - [`memmap`]: The firmware (E820) memory map.
//! - [`dma`]: The DMA controller.
//! - [`bus`]: The expansion bus device registry.
//! - [`timer`]: The tick counter.
//! - [`display`]: The VGA framebuffer.
//! - [`disk`]: The CHS-addressed disk image.
//!
//! [`Machine`] owns all of these together with the engine, store, and interrupt queue.
//!
//! ```
//! use std::io::Cursor;
//! use dos_sandbox::platform::Machine;
//! use dos_sandbox::sim::SimFlags;
//!
//! let mut machine = Machine::new(1024, SimFlags::default());
//! machine.load_program(0, &[0x90, 0x90, 0x90]).unwrap();
//!
//! let mut out = vec![];
//! machine.session(dos_sandbox::sim::debug::LineReader::new(Cursor::new("go\n")), &mut out)
//!     .run()
//!     .unwrap();
//!
//! // The zero bytes past the program are unknown opcodes, skipped one at a time.
//! assert_eq!(machine.engine.pc, 1000);
//! assert_eq!(machine.engine.instructions_run, 3);
//! ```

pub mod bus;
pub mod disk;
pub mod display;
pub mod dma;
pub mod memmap;
pub mod timer;

use std::io::Write;

use crate::sim::debug::{CommandSource, Session};
use crate::sim::interrupt::InterruptQueue;
use crate::sim::mem::{ImageTooLarge, Store};
use crate::sim::{Engine, SimFlags};

use bus::DeviceBus;
use disk::DiskImage;
use display::Framebuffer;
use dma::DmaController;
use memmap::MemoryMap;
use timer::TickCounter;

/// Default size of the store in bytes.
pub const DEFAULT_STORE_SIZE: usize = 1024;

/// A whole virtual machine.
#[derive(Debug)]
pub struct Machine {
    /// The execution engine.
    pub engine: Engine,
    /// The instruction/data store.
    pub store: Store,
    /// Pending interrupts.
    pub queue: InterruptQueue,
    /// Counts executed steps.
    pub timer: TickCounter,
    /// The expansion bus.
    pub bus: DeviceBus,
    /// The DMA controller.
    pub dma: DmaController,
    /// The VGA framebuffer.
    pub display: Framebuffer,
    /// The firmware memory map.
    pub memory_map: MemoryMap,
    /// The attached disk, if any.
    pub disk: Option<DiskImage>,
    /// Session configuration.
    pub flags: SimFlags,
}
impl Machine {
    /// Creates a machine with a store of `store_size` bytes and no disk.
    ///
    /// # Panics
    ///
    /// Panics if `flags.queue_capacity` is 0.
    pub fn new(store_size: usize, flags: SimFlags) -> Self {
        let machine = Self {
            engine: Engine::new(),
            store: Store::new(store_size, flags.store_init),
            queue: InterruptQueue::new(flags.queue_capacity),
            timer: TickCounter::new(),
            bus: DeviceBus::new(),
            dma: DmaController::new(),
            display: Framebuffer::new(),
            memory_map: MemoryMap::conventional(),
            disk: None,
            flags,
        };

        for entry in machine.memory_map.entries() {
            log::info!("E820 entry: {entry}");
        }
        log::info!("machine initialized ({store_size} byte store)");
        machine
    }

    /// Attaches a disk, replacing any previous one.
    pub fn attach_disk(&mut self, disk: DiskImage) -> Option<DiskImage> {
        self.disk.replace(disk)
    }

    /// Copies a program image into the store.
    pub fn load_program(&mut self, addr: usize, image: &[u8]) -> Result<(), ImageTooLarge> {
        self.store.load(addr, image)?;
        log::info!("loaded {} byte program at 0x{addr:X}", image.len());
        Ok(())
    }

    /// Starts a debugging session over this machine.
    pub fn session<S: CommandSource, W: Write>(&mut self, input: S, output: W) -> Session<'_, S, W> {
        Session::new(&mut self.engine, &self.store, &mut self.queue, self.flags, input, output)
            .with_timer(&mut self.timer)
    }
}
impl Default for Machine {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_SIZE, SimFlags::default())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::sim::debug::LineReader;
    use crate::sim::decode::NOP;
    use crate::sim::SimFlags;

    use super::memmap::RegionKind;
    use super::{Machine, DEFAULT_STORE_SIZE};

    #[test]
    fn test_default_machine() {
        let machine = Machine::default();
        assert_eq!(machine.store.len(), DEFAULT_STORE_SIZE);
        assert_eq!(machine.queue.capacity(), 256);
        assert!(machine.disk.is_none());

        let kinds: Vec<_> = machine.memory_map.entries().iter().map(|e| (e.base, e.len, e.kind)).collect();
        assert_eq!(kinds, [(0x0, 0x9FC00, RegionKind::Usable), (0x9FC00, 0x400, RegionKind::Reserved)]);
    }

    #[test]
    fn test_session_ticks_timer() {
        let flags = SimFlags { burst_size: 10, ..Default::default() };
        let mut machine = Machine::new(16, flags);
        machine.load_program(0, &[NOP; 16]).unwrap();

        let input = LineReader::new(Cursor::new("next\ngo\nstate\n"));
        machine.session(input, std::io::sink()).run().unwrap();

        assert_eq!(machine.engine.pc, 11);
        assert_eq!(machine.timer.ticks(), 11);
        assert_eq!(machine.engine.instructions_run, 11);
    }

    #[test]
    fn test_load_too_large() {
        let mut machine = Machine::new(2, SimFlags::default());
        assert!(machine.load_program(0, &[NOP; 3]).is_err());
        assert!(machine.load_program(1, &[NOP]).is_ok());
    }
}
