//! The DMA controller.

/// Number of DMA channels.
pub const NUM_CHANNELS: usize = 4;

/// Errors from a DMA transfer.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DmaErr {
    /// The channel number is not below [`NUM_CHANNELS`].
    BadChannel(u8),
    /// The channel is already in use.
    Busy(u8),
    /// The source and destination buffers differ in length.
    LengthMismatch {
        /// Length of the source.
        src: usize,
        /// Length of the destination.
        dst: usize
    },
}
impl std::fmt::Display for DmaErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DmaErr::BadChannel(c) => write!(f, "no DMA channel {c}"),
            DmaErr::Busy(c) => write!(f, "DMA channel {c} is busy"),
            DmaErr::LengthMismatch { src, dst } => write!(f, "cannot transfer {src} bytes into a buffer of {dst} bytes"),
        }
    }
}
impl std::error::Error for DmaErr {}

#[derive(Debug, Default, Clone, Copy)]
struct Channel {
    busy: bool,
    transferred: u64
}

/// A DMA controller with [`NUM_CHANNELS`] channels.
///
/// Transfers complete synchronously,
/// so a channel is only observed busy if it was explicitly claimed with [`DmaController::claim`].
#[derive(Debug, Default, Clone)]
pub struct DmaController {
    channels: [Channel; NUM_CHANNELS]
}
impl DmaController {
    /// Creates a controller with every channel idle.
    pub fn new() -> Self {
        Self::default()
    }

    fn channel_mut(&mut self, channel: u8) -> Result<&mut Channel, DmaErr> {
        self.channels.get_mut(usize::from(channel)).ok_or(DmaErr::BadChannel(channel))
    }

    /// Copies `src` into `dst` over the given channel,
    /// returning the number of bytes copied.
    pub fn transfer(&mut self, channel: u8, src: &[u8], dst: &mut [u8]) -> Result<usize, DmaErr> {
        let ch = self.channel_mut(channel)?;
        if ch.busy { return Err(DmaErr::Busy(channel)) };
        if src.len() != dst.len() {
            return Err(DmaErr::LengthMismatch { src: src.len(), dst: dst.len() });
        }

        ch.busy = true;
        dst.copy_from_slice(src);
        ch.transferred += src.len() as u64;
        ch.busy = false;

        log::debug!("DMA channel {channel} transferred {} bytes", src.len());
        Ok(src.len())
    }

    /// Marks a channel as in use, so transfers on it fail until it is released.
    pub fn claim(&mut self, channel: u8) -> Result<(), DmaErr> {
        let ch = self.channel_mut(channel)?;
        match ch.busy {
            true  => Err(DmaErr::Busy(channel)),
            false => {
                ch.busy = true;
                Ok(())
            }
        }
    }

    /// Releases a channel claimed with [`DmaController::claim`].
    pub fn release(&mut self, channel: u8) -> Result<(), DmaErr> {
        self.channel_mut(channel)?.busy = false;
        Ok(())
    }

    /// Whether a channel is in use (or `None` if the channel does not exist).
    pub fn is_busy(&self, channel: u8) -> Option<bool> {
        self.channels.get(usize::from(channel)).map(|c| c.busy)
    }

    /// Total bytes moved over a channel (or `None` if the channel does not exist).
    pub fn bytes_transferred(&self, channel: u8) -> Option<u64> {
        self.channels.get(usize::from(channel)).map(|c| c.transferred)
    }
}

#[cfg(test)]
mod tests {
    use super::{DmaController, DmaErr, NUM_CHANNELS};

    #[test]
    fn test_transfer() {
        let mut dma = DmaController::new();
        let src = [1, 2, 3, 4];
        let mut dst = [0; 4];

        assert_eq!(dma.transfer(2, &src, &mut dst), Ok(4));
        assert_eq!(dst, src);
        assert_eq!(dma.bytes_transferred(2), Some(4));
        assert_eq!(dma.is_busy(2), Some(false));
    }

    #[test]
    fn test_bad_channel() {
        let mut dma = DmaController::new();
        let bad = NUM_CHANNELS as u8;
        assert_eq!(dma.transfer(bad, &[], &mut []), Err(DmaErr::BadChannel(bad)));
        assert_eq!(dma.claim(bad), Err(DmaErr::BadChannel(bad)));
        assert_eq!(dma.is_busy(bad), None);
    }

    #[test]
    fn test_busy() {
        let mut dma = DmaController::new();
        let mut dst = [0; 2];

        dma.claim(0).unwrap();
        assert_eq!(dma.claim(0), Err(DmaErr::Busy(0)));
        assert_eq!(dma.transfer(0, &[9, 9], &mut dst), Err(DmaErr::Busy(0)));
        assert_eq!(dst, [0, 0]);

        // other channels are unaffected
        assert_eq!(dma.transfer(1, &[9, 9], &mut dst), Ok(2));

        dma.release(0).unwrap();
        assert_eq!(dma.transfer(0, &[7, 7], &mut dst), Ok(2));
        assert_eq!(dst, [7, 7]);
    }

    #[test]
    fn test_length_mismatch() {
        let mut dma = DmaController::new();
        let mut dst = [0; 3];
        assert_eq!(
            dma.transfer(0, &[1, 2], &mut dst),
            Err(DmaErr::LengthMismatch { src: 2, dst: 3 })
        );
        assert_eq!(dma.bytes_transferred(0), Some(0));
    }
}
