//! Interrupt records and the bounded queue that holds them.
//!
//! The key types here are:
//! - [`Interrupt`]: An immutable interrupt record.
//! - [`InterruptQueue`]: A fixed-capacity FIFO of pending interrupts.
//!
//! The queue decouples interrupt producers (timers, devices, the host)
//! from the single point where the engine consumes them.
//! Nothing enqueues by default.

/// Default number of slots in an [`InterruptQueue`].
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// The source class of an interrupt.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum InterruptKind {
    /// Raised by a (virtual) hardware line.
    Hardware,
    /// Raised by software (e.g., an `INT n` instruction).
    Software,
    /// Raised by the emulator itself.
    Virtual,
}
impl std::fmt::Display for InterruptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterruptKind::Hardware => f.write_str("hardware"),
            InterruptKind::Software => f.write_str("software"),
            InterruptKind::Virtual  => f.write_str("virtual"),
        }
    }
}

/// An interrupt.
///
/// The priority is recorded but the [`InterruptQueue`] does not reorder by it.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Interrupt {
    kind: InterruptKind,
    number: u8,
    priority: u8
}
impl Interrupt {
    /// Creates a new interrupt.
    pub fn new(kind: InterruptKind, number: u8, priority: u8) -> Self {
        Self { kind, number, priority }
    }
    /// Creates a new hardware interrupt.
    pub fn hardware(number: u8, priority: u8) -> Self {
        Self::new(InterruptKind::Hardware, number, priority)
    }
    /// Creates a new software interrupt.
    pub fn software(number: u8, priority: u8) -> Self {
        Self::new(InterruptKind::Software, number, priority)
    }

    /// The source class of this interrupt.
    pub fn kind(&self) -> InterruptKind {
        self.kind
    }
    /// The interrupt number.
    pub fn number(&self) -> u8 {
        self.number
    }
    /// The stored priority.
    pub fn priority(&self) -> u8 {
        self.priority
    }
}
impl std::fmt::Display for Interrupt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} interrupt 0x{:02X} (priority {})", self.kind, self.number, self.priority)
    }
}

/// Errors that can occur when accessing an [`InterruptQueue`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum QueueErr {
    /// The queue already holds `capacity - 1` interrupts.
    Full,
    /// The queue holds no interrupts.
    Empty,
}
impl std::fmt::Display for QueueErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueErr::Full  => f.write_str("interrupt queue is full"),
            QueueErr::Empty => f.write_str("interrupt queue is empty"),
        }
    }
}
impl std::error::Error for QueueErr {}

/// A bounded circular FIFO of [`Interrupt`]s.
///
/// The queue has `capacity` slots and tracks its contents with only a head and tail index.
/// One slot is always left unused so that `head == tail` unambiguously means empty,
/// so at most `capacity - 1` interrupts can be pending at once.
///
/// Interrupts are dequeued strictly in the order they were enqueued.
///
/// ```
/// use dos_sandbox::sim::interrupt::{Interrupt, InterruptQueue, QueueErr};
///
/// let mut queue = InterruptQueue::new(3);
/// queue.enqueue(Interrupt::hardware(0, 7)).unwrap();
/// queue.enqueue(Interrupt::hardware(1, 0)).unwrap();
/// assert_eq!(queue.enqueue(Interrupt::hardware(2, 0)), Err(QueueErr::Full));
///
/// assert_eq!(queue.dequeue().map(|i| i.number()), Ok(0));
/// assert_eq!(queue.dequeue().map(|i| i.number()), Ok(1));
/// assert_eq!(queue.dequeue(), Err(QueueErr::Empty));
/// ```
#[derive(Debug, Clone)]
pub struct InterruptQueue {
    slots: Box<[Option<Interrupt>]>,
    head: usize,
    tail: usize
}
impl InterruptQueue {
    /// Creates an empty queue with the given number of slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "interrupt queue needs at least one slot");

        Self {
            slots: vec![None; capacity].into_boxed_slice(),
            head: 0,
            tail: 0
        }
    }

    /// The number of slots (one more than the maximum number of pending interrupts).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The number of pending interrupts.
    pub fn len(&self) -> usize {
        (self.tail + self.capacity() - self.head) % self.capacity()
    }

    /// Whether no interrupts are pending.
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Whether another enqueue would fail.
    pub fn is_full(&self) -> bool {
        self.advance(self.tail) == self.head
    }

    fn advance(&self, index: usize) -> usize {
        (index + 1) % self.capacity()
    }

    /// Appends an interrupt to the back of the queue.
    pub fn enqueue(&mut self, interrupt: Interrupt) -> Result<(), QueueErr> {
        let next = self.advance(self.tail);
        if next == self.head {
            return Err(QueueErr::Full);
        }

        self.slots[self.tail] = Some(interrupt);
        self.tail = next;
        log::trace!("queued {interrupt} ({} pending)", self.len());
        Ok(())
    }

    /// Removes the interrupt at the front of the queue.
    pub fn dequeue(&mut self) -> Result<Interrupt, QueueErr> {
        if self.is_empty() {
            return Err(QueueErr::Empty);
        }

        let interrupt = self.slots[self.head].take()
            .unwrap_or_else(|| unreachable!("occupied slot should hold an interrupt"));
        self.head = self.advance(self.head);
        Ok(interrupt)
    }

    /// Looks at the interrupt at the front of the queue without removing it.
    pub fn peek(&self) -> Option<&Interrupt> {
        match self.is_empty() {
            true  => None,
            false => self.slots[self.head].as_ref(),
        }
    }
}
impl Default for InterruptQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
