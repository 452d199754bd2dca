//! The interactive debugger.
//!
//! The key type here is [`Session`], a command loop which reads one line of operator
//! text at a time and drives an [`Engine`] with it.
//!
//! The text protocol has exactly four commands (each matched by prefix):
//! - `next`: run one step, then print the machine state
//! - `go`: run a burst of steps (see [`SimFlags::burst_size`]), then print the machine state
//! - `state`: print the machine state
//! - `stop`: end the session
//!
//! Reaching the end of the input ends the session the same way `stop` does.
//!
//! Commands can come from any [`CommandSource`]:
//! - [`LineReader`]: reads lines from a [`BufRead`] (such as locked stdin).
//! - [`ChannelSource`]: receives lines over a channel, typically fed by [`spawn_console`].
//!
//! ```
//! use std::io::Cursor;
//! use dos_sandbox::sim::{Engine, SimFlags};
//! use dos_sandbox::sim::debug::{LineReader, Session, SessionState};
//! use dos_sandbox::sim::interrupt::InterruptQueue;
//! use dos_sandbox::sim::mem::Store;
//!
//! let store = Store::from_bytes(vec![0x90, 0x90, 0x90]);
//! let mut engine = Engine::new();
//! let mut queue = InterruptQueue::default();
//! let mut out = vec![];
//!
//! let input = LineReader::new(Cursor::new("next\nnext\nstop\n"));
//! let mut session = Session::new(&mut engine, &store, &mut queue, SimFlags::default(), input, &mut out);
//! session.run().unwrap();
//! assert_eq!(session.state(), SessionState::Halted);
//!
//! assert_eq!(engine.pc, 2);
//! ```
use std::io::{BufRead, Write};
use std::thread::JoinHandle;

use crossbeam_channel as cbc;
use logos::Logos;

use crate::platform::timer::TickCounter;

use super::interrupt::InterruptQueue;
use super::mem::Store;
use super::{Engine, SimFlags, StepErr};

const PROMPT: &str = "debugger command (go, next, stop, state): ";

/// A command line token.
///
/// Only the first token of a line is read, so each command is recognized by its prefix
/// (`nextstep` is `next`). The rest of the line is ignored.
#[derive(Debug, Logos, PartialEq, Eq, Clone, Copy)]
enum Token {
    #[token("go")]
    Go,
    #[token("next")]
    Next,
    #[token("stop")]
    Stop,
    #[token("state")]
    State,
}

/// A debugger command.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum Command {
    /// Execute exactly one step (`next`).
    Step,
    /// Execute a burst of steps (`go`).
    Run,
    /// Print the machine state (`state`).
    Inspect,
    /// End the session (`stop`).
    Halt,
}
impl From<Token> for Command {
    fn from(value: Token) -> Self {
        match value {
            Token::Go    => Command::Run,
            Token::Next  => Command::Step,
            Token::Stop  => Command::Halt,
            Token::State => Command::Inspect,
        }
    }
}
impl std::str::FromStr for Command {
    type Err = CommandErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim_end_matches(['\r', '\n']);

        match Token::lexer(line).next() {
            Some(Ok(token)) => Ok(Command::from(token)),
            _ => Err(CommandErr::Unknown(line.to_string())),
        }
    }
}

/// Errors raised from parsing operator input.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum CommandErr {
    /// The line does not start with any known command.
    Unknown(String),
}
impl std::fmt::Display for CommandErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandErr::Unknown(s) => write!(f, "unknown command {s:?}"),
        }
    }
}
impl std::error::Error for CommandErr {}

/// The state of a [`Session`].
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
pub enum SessionState {
    /// Waiting for a command.
    #[default]
    Idle,
    /// Running a single step.
    Stepping,
    /// Running a burst of steps.
    Running,
    /// Printing the machine state.
    Inspecting,
    /// The session has ended.
    Halted,
}

/// A source of operator command lines.
pub trait CommandSource {
    /// Blocks until the next line is available.
    ///
    /// This returns `None` once the input is exhausted.
    fn next_line(&mut self) -> Option<String>;
}

/// Reads command lines from a [`BufRead`].
///
/// Bytes which are not valid UTF-8 are replaced (and the line is then rejected as a command).
/// A read error is treated as the end of input.
#[derive(Debug)]
pub struct LineReader<R>(R);
impl<R: BufRead> LineReader<R> {
    /// Creates a new line reader.
    pub fn new(reader: R) -> Self {
        Self(reader)
    }
}
impl<R: BufRead> CommandSource for LineReader<R> {
    fn next_line(&mut self) -> Option<String> {
        let mut buf = vec![];
        match self.0.read_until(b'\n', &mut buf) {
            Ok(0) => None,
            Ok(_) => Some(String::from_utf8_lossy(&buf).into_owned()),
            Err(e) => {
                log::warn!("failed to read command: {e}");
                None
            }
        }
    }
}

/// Receives command lines over a channel.
///
/// Once every sender is dropped (and the channel is drained), the input is exhausted.
#[derive(Debug)]
pub struct ChannelSource(cbc::Receiver<String>);
impl ChannelSource {
    /// Wraps a receiver.
    pub fn new(rx: cbc::Receiver<String>) -> Self {
        Self(rx)
    }
}
impl CommandSource for ChannelSource {
    fn next_line(&mut self) -> Option<String> {
        self.0.recv().ok()
    }
}

/// Spawns a thread which forwards each line of `reader` into a channel,
/// returning the receiving end as a [`ChannelSource`].
///
/// Lines which are not valid UTF-8 are forwarded with the invalid bytes replaced.
/// The thread stops at the end of `reader`, on a read error,
/// or once the [`ChannelSource`] is dropped.
pub fn spawn_reader<R: BufRead + Send + 'static>(reader: R) -> (ChannelSource, JoinHandle<()>) {
    let (tx, rx) = cbc::unbounded();

    let handle = std::thread::spawn(move || {
        for line in reader.split(b'\n') {
            match line {
                Ok(line) => {
                    let line = String::from_utf8_lossy(&line).into_owned();
                    if tx.send(line).is_err() { break }
                },
                Err(e) => {
                    log::warn!("console reader stopped: {e}");
                    break;
                }
            }
        }
    });

    (ChannelSource::new(rx), handle)
}

/// Spawns a thread which forwards each line of stdin into a [`ChannelSource`].
///
/// See [`spawn_reader`].
pub fn spawn_console() -> (ChannelSource, JoinHandle<()>) {
    spawn_reader(std::io::BufReader::new(std::io::stdin()))
}

/// An interactive debugging session.
///
/// The session borrows the machine state it drives;
/// after it ends, the state can be inspected by the caller.
pub struct Session<'a, S, W> {
    engine: &'a mut Engine,
    store: &'a Store,
    queue: &'a mut InterruptQueue,
    timer: Option<&'a mut TickCounter>,
    flags: SimFlags,
    state: SessionState,

    input: S,
    output: W,
}
impl<'a, S: CommandSource, W: Write> Session<'a, S, W> {
    /// Creates a new session.
    pub fn new(
        engine: &'a mut Engine,
        store: &'a Store,
        queue: &'a mut InterruptQueue,
        flags: SimFlags,
        input: S,
        output: W
    ) -> Self {
        Self { engine, store, queue, timer: None, flags, state: SessionState::Idle, input, output }
    }

    /// Attaches a tick counter, which advances once for every step executed.
    pub fn with_timer(mut self, timer: &'a mut TickCounter) -> Self {
        self.timer = Some(timer);
        self
    }

    /// The current state of the session.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Gets a reference to the engine being debugged.
    pub fn engine(&self) -> &Engine {
        self.engine
    }

    /// Runs the command loop until `stop` or the end of input.
    pub fn run(&mut self) -> std::io::Result<()> {
        while self.state != SessionState::Halted {
            write!(self.output, "{PROMPT}")?;
            self.output.flush()?;

            match self.input.next_line() {
                Some(line) => self.handle_line(&line)?,
                None => {
                    writeln!(self.output)?;
                    self.execute(Command::Halt)?;
                }
            }
        }

        Ok(())
    }

    /// Parses and executes one line of operator text.
    ///
    /// Unrecognized text is reported and otherwise ignored.
    pub fn handle_line(&mut self, line: &str) -> std::io::Result<()> {
        match line.parse::<Command>() {
            Ok(cmd) => self.execute(cmd),
            Err(e) => {
                log::debug!("rejected operator input: {e}");
                writeln!(self.output, "{e}")
            }
        }
    }

    /// Executes a command.
    ///
    /// This does nothing once the session has halted.
    pub fn execute(&mut self, cmd: Command) -> std::io::Result<()> {
        if self.state == SessionState::Halted { return Ok(()) };

        let result = match cmd {
            Command::Step => {
                self.state = SessionState::Stepping;
                self.step()
            },
            Command::Run => {
                self.state = SessionState::Running;
                self.burst()
            },
            Command::Inspect => {
                self.state = SessionState::Inspecting;
                self.print_snapshot()
            },
            Command::Halt => {
                self.state = SessionState::Halted;
                log::info!("debugger stopped after {} instructions", self.engine.instructions_run);
                return writeln!(self.output, "debugger stopped");
            }
        };

        self.state = SessionState::Idle;
        result
    }

    fn tick(&mut self, n: u32) {
        if let Some(timer) = self.timer.as_deref_mut() {
            timer.advance(u64::from(n));
        }
    }

    fn step(&mut self) -> std::io::Result<()> {
        match self.engine.step_with_interrupts(self.store, self.queue) {
            Ok(Some(int)) => {
                self.tick(1);
                writeln!(self.output, "delivered {int}")?;
            },
            Ok(None) => self.tick(1),
            Err(e @ StepErr::UnknownOpcode { .. }) => {
                self.tick(1);
                writeln!(self.output, "{e}")?;
            },
            Err(e @ StepErr::OutOfBoundsFetch { .. }) => writeln!(self.output, "{e}")?,
        }

        self.print_snapshot()
    }

    fn burst(&mut self) -> std::io::Result<()> {
        let summary = self.engine.run_with_limit(self.store, self.queue, self.flags.burst_size);
        self.tick(summary.steps);

        if summary.unknown_opcodes > 0 {
            writeln!(self.output, "skipped {} unknown opcode(s)", summary.unknown_opcodes)?;
        }
        if summary.interrupts > 0 {
            writeln!(self.output, "delivered {} interrupt(s)", summary.interrupts)?;
        }
        if let Some(e) = summary.stopped {
            writeln!(self.output, "stopped after {} step(s): {e}", summary.steps)?;
        }

        self.print_snapshot()
    }

    fn print_snapshot(&mut self) -> std::io::Result<()> {
        writeln!(self.output, "{}", self.engine.snapshot())
    }
}
impl<S, W> std::fmt::Debug for Session<'_, S, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("engine", &self.engine)
            .field("state", &self.state)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::platform::timer::TickCounter;
    use crate::sim::decode::NOP;
    use crate::sim::interrupt::{Interrupt, InterruptQueue};
    use crate::sim::mem::Store;
    use crate::sim::{Engine, SimFlags};

    use super::{spawn_reader, ChannelSource, Command, CommandErr, CommandSource, LineReader, Session, SessionState};

    fn lines(s: &str) -> LineReader<Cursor<String>> {
        LineReader::new(Cursor::new(s.to_string()))
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!("go".parse(), Ok(Command::Run));
        assert_eq!("next\n".parse(), Ok(Command::Step));
        assert_eq!("stop\r\n".parse(), Ok(Command::Halt));
        assert_eq!("state".parse(), Ok(Command::Inspect));

        // prefix matching
        assert_eq!("gopher".parse(), Ok(Command::Run));
        assert_eq!("next 5".parse(), Ok(Command::Step));
        assert_eq!("stopped".parse(), Ok(Command::Halt));
        assert_eq!("statement".parse(), Ok(Command::Inspect));
    }

    #[test]
    fn test_parse_rejects() {
        for bad in ["foo", "", "\n", " go", "GO", "st", "nex", "g"] {
            let expected = CommandErr::Unknown(bad.trim_end_matches('\n').to_string());
            assert_eq!(bad.parse::<Command>(), Err(expected), "{bad:?}");
        }
    }

    #[test]
    fn test_three_steps() {
        let store = Store::from_bytes(vec![NOP, NOP, NOP]);
        let mut engine = Engine::new();
        let mut queue = InterruptQueue::default();
        let mut out = vec![];

        let mut session = Session::new(&mut engine, &store, &mut queue, SimFlags::default(), lines(""), &mut out);
        for expected in 1..=3 {
            session.execute(Command::Step).unwrap();
            assert_eq!(session.state(), SessionState::Idle);
            assert_eq!(session.engine().pc, expected);
        }
        drop(session);

        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.matches("----- CPU state -----").count(), 3);
        assert!(!out.contains("unknown opcode"));
        assert!(!out.contains("outside of memory"));
    }

    #[test]
    fn test_step_always_snapshots() {
        let store = Store::from_bytes(vec![0xFF]);
        let mut engine = Engine::new();
        let mut queue = InterruptQueue::default();
        let mut out = vec![];

        let mut session = Session::new(&mut engine, &store, &mut queue, SimFlags::default(), lines(""), &mut out);
        session.execute(Command::Step).unwrap(); // unknown opcode
        session.execute(Command::Step).unwrap(); // out of bounds
        drop(session);

        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.matches("----- CPU state -----").count(), 2);
        assert_eq!(out.matches("unknown opcode 0xFF").count(), 1);
        assert_eq!(out.matches("outside of memory").count(), 1);
        assert_eq!(engine.pc, 1);
    }

    #[test]
    fn test_burst() {
        let store = Store::from_bytes(vec![NOP; 4000]);
        let mut engine = Engine::new();
        let mut queue = InterruptQueue::default();
        let mut timer = TickCounter::new();
        let mut out = vec![];

        let mut session = Session::new(&mut engine, &store, &mut queue, SimFlags::default(), lines(""), &mut out)
            .with_timer(&mut timer);
        session.execute(Command::Run).unwrap();
        assert_eq!(session.engine().pc, 1000);
        session.execute(Command::Step).unwrap();
        assert_eq!(session.engine().pc, 1001);
        drop(session);

        assert_eq!(timer.ticks(), 1001);
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.matches("----- CPU state -----").count(), 2);
    }

    #[test]
    fn test_burst_stops_at_end_of_store() {
        let store = Store::from_bytes(vec![NOP; 5]);
        let mut engine = Engine::new();
        let mut queue = InterruptQueue::default();
        let mut timer = TickCounter::new();
        let flags = SimFlags { burst_size: 3, ..Default::default() };
        let mut out = vec![];

        let mut session = Session::new(&mut engine, &store, &mut queue, flags, lines(""), &mut out)
            .with_timer(&mut timer);
        session.execute(Command::Run).unwrap();
        assert_eq!(session.engine().pc, 3);
        session.execute(Command::Run).unwrap();
        assert_eq!(session.engine().pc, 5);
        drop(session);

        assert_eq!(timer.ticks(), 5);
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("stopped after 2 step(s)"));
    }

    #[test]
    fn test_inspect_does_not_step() {
        let store = Store::from_bytes(vec![NOP]);
        let mut engine = Engine::new();
        let mut queue = InterruptQueue::default();
        let mut out = vec![];

        let mut session = Session::new(&mut engine, &store, &mut queue, SimFlags::default(), lines(""), &mut out);
        session.execute(Command::Inspect).unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        drop(session);

        assert_eq!(engine.pc, 0);
        assert_eq!(engine.instructions_run, 0);
        assert!(String::from_utf8(out).unwrap().contains("PC: 0x00000000"));
    }

    #[test]
    fn test_unknown_command_is_one_diagnostic() {
        let store = Store::from_bytes(vec![NOP]);
        let mut engine = Engine::new();
        let mut queue = InterruptQueue::default();
        queue.enqueue(Interrupt::hardware(1, 0)).unwrap();
        let mut out = vec![];

        let mut session = Session::new(&mut engine, &store, &mut queue, SimFlags::default(), lines(""), &mut out);
        session.handle_line("foo\n").unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        drop(session);

        assert_eq!(engine.snapshot(), Engine::new().snapshot());
        assert_eq!(queue.len(), 1);
        assert_eq!(String::from_utf8(out).unwrap(), "unknown command \"foo\"\n");
    }

    #[test]
    fn test_stop_halts() {
        let store = Store::from_bytes(vec![NOP; 3]);
        let mut engine = Engine::new();
        let mut queue = InterruptQueue::default();
        let mut out = vec![];

        let mut session = Session::new(&mut engine, &store, &mut queue, SimFlags::default(), lines("next\nstop\nnext\n"), &mut out);
        session.run().unwrap();
        assert_eq!(session.state(), SessionState::Halted);

        // Nothing runs after halting.
        session.execute(Command::Step).unwrap();
        drop(session);
        assert_eq!(engine.pc, 1);
    }

    #[test]
    fn test_end_of_input_is_halt() {
        let run = |input: &str| {
            let store = Store::from_bytes(vec![NOP; 3]);
            let mut engine = Engine::new();
            let mut queue = InterruptQueue::default();
            let mut out = vec![];

            let mut session = Session::new(&mut engine, &store, &mut queue, SimFlags::default(), lines(input), &mut out);
            session.run().unwrap();
            let state = session.state();
            drop(session);
            (state, engine.snapshot())
        };

        assert_eq!(run("next\nnext\nstop\n"), run("next\nnext\n"));
        assert_eq!(run("").0, SessionState::Halted);
    }

    #[test]
    fn test_channel_source() {
        let (mut source, handle) = spawn_reader(Cursor::new("next\ngo\n"));
        assert_eq!(source.next_line().as_deref(), Some("next"));
        assert_eq!(source.next_line().as_deref(), Some("go"));
        assert_eq!(source.next_line(), None);
        handle.join().unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        let mut source = ChannelSource::new(rx);
        tx.send("state".to_string()).unwrap();
        drop(tx);
        assert_eq!(source.next_line().as_deref(), Some("state"));
        assert_eq!(source.next_line(), None);
    }

    fn run_nops<S: CommandSource>(input: S) -> (Engine, String) {
        let store = Store::from_bytes(vec![NOP; 3]);
        let mut engine = Engine::new();
        let mut queue = InterruptQueue::default();
        let mut out = vec![];

        let mut session = Session::new(&mut engine, &store, &mut queue, SimFlags::default(), input, &mut out);
        session.run().unwrap();
        assert_eq!(session.state(), SessionState::Halted);
        drop(session);

        (engine, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_invalid_utf8_is_unknown_command() {
        const INPUT: &[u8] = b"next\n\xFF\xFE\nnext\nstop\n";

        let (engine, out) = run_nops(LineReader::new(Cursor::new(INPUT.to_vec())));
        assert_eq!(engine.pc, 2);
        assert_eq!(out.matches("unknown command").count(), 1);
        assert_eq!(out.matches("----- CPU state -----").count(), 2);

        let (source, handle) = spawn_reader(Cursor::new(INPUT.to_vec()));
        let (engine, out) = run_nops(source);
        handle.join().unwrap();
        assert_eq!(engine.pc, 2);
        assert_eq!(out.matches("unknown command").count(), 1);
    }

    #[test]
    fn test_crlf_lines() {
        let (source, handle) = spawn_reader(Cursor::new("next\r\nnext\r\n"));
        let (engine, out) = run_nops(source);
        handle.join().unwrap();
        assert_eq!(engine.pc, 2);
        assert!(!out.contains("unknown command"));
    }
}
