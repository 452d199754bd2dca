//! A scaffold for a DOS-era PC emulator, built around an interactive single-step debugger.
//!
//! The crate is split in two:
//! - [`sim`]: The execution engine, its instruction table, the interrupt queue,
//!     and the debugger session that drives them.
//! - [`platform`]: The virtual PC's peripherals and the [`platform::Machine`] that owns everything.
//!
//! # Usage
//!
//! The engine runs byte-coded instructions out of a [`sim::mem::Store`]:
//! ```
//! use dos_sandbox::sim::Engine;
//! use dos_sandbox::sim::mem::Store;
//!
//! let store = Store::from_bytes(vec![0x90, 0x90, 0x90]); // NOP NOP NOP
//! let mut engine = Engine::new();
//!
//! engine.step(&store).unwrap();
//! assert_eq!(engine.pc, 1);
//! ```
//!
//! The usual way to drive the engine is with a [`sim::debug::Session`],
//! which reads operator commands (`go`, `next`, `state`, `stop`) and prints the machine state:
//! ```
//! use std::io::Cursor;
//! use dos_sandbox::platform::Machine;
//! use dos_sandbox::sim::debug::LineReader;
//!
//! let mut machine = Machine::default();
//! machine.load_program(0, &[0x90, 0x90, 0x90]).unwrap();
//!
//! let mut out = vec![];
//! let input = LineReader::new(Cursor::new("next\nstate\nstop\n"));
//! machine.session(input, &mut out).run().unwrap();
//!
//! let out = String::from_utf8(out).unwrap();
//! assert!(out.contains("PC: 0x00000001"));
//! ```
#![warn(missing_docs)]

pub mod sim;
pub mod platform;
