//! The VGA framebuffer.
//!
//! This is only the pixel memory; nothing presents it.

/// Default width in pixels.
pub const SCREEN_WIDTH: usize = 640;
/// Default height in pixels.
pub const SCREEN_HEIGHT: usize = 480;
/// Opaque black, in ARGB.
pub const BLACK: u32 = 0xFF00_0000;

/// A grid of ARGB pixels, stored row by row.
#[derive(Clone, PartialEq, Eq)]
pub struct Framebuffer {
    pixels: Box<[u32]>,
    width: usize,
    height: usize
}
impl Framebuffer {
    /// Creates a [`SCREEN_WIDTH`] x [`SCREEN_HEIGHT`] framebuffer filled with [`BLACK`].
    pub fn new() -> Self {
        Self::with_size(SCREEN_WIDTH, SCREEN_HEIGHT)
    }

    /// Creates a framebuffer of the given size filled with [`BLACK`].
    pub fn with_size(width: usize, height: usize) -> Self {
        Self {
            pixels: vec![BLACK; width * height].into_boxed_slice(),
            width,
            height
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }
    /// Height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    /// Reads the pixel at `(x, y)`, or `None` if it is off-screen.
    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// Writes the pixel at `(x, y)`, returning whether the write landed on-screen.
    pub fn set_pixel(&mut self, x: usize, y: usize, argb: u32) -> bool {
        match self.index(x, y) {
            Some(i) => {
                self.pixels[i] = argb;
                true
            },
            None => false,
        }
    }

    /// Fills every pixel with [`BLACK`].
    pub fn clear(&mut self) {
        self.pixels.fill(BLACK);
    }

    /// Views the pixels, row by row.
    pub fn as_slice(&self) -> &[u32] {
        &self.pixels
    }
}
impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}
impl std::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framebuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}
