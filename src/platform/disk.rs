//! A virtual hard disk addressed by cylinder/head/sector.
//!
//! A [`DiskImage`] is a flat sequence of [`SECTOR_SIZE`]-byte sectors in a backing store
//! (usually a file). CHS addresses are translated to a linear block address with
//! `lba = (cylinder * heads + head) * sectors + (sector - 1)`.
//!
//! ```
//! use std::io::Cursor;
//! use dos_sandbox::platform::disk::{Chs, DiskImage, Geometry, SECTOR_SIZE};
//!
//! let geometry = Geometry { cylinders: 2, heads: 2, sectors: 4 };
//! let backing = Cursor::new(vec![0; geometry.byte_len() as usize]);
//! let mut disk = DiskImage::new(backing, geometry);
//!
//! let chs = Chs { cylinder: 1, head: 0, sector: 1 };
//! disk.write_sector(chs, &[0xAB; SECTOR_SIZE]).unwrap();
//!
//! let mut buf = [0; SECTOR_SIZE];
//! disk.read_sector(chs, &mut buf).unwrap();
//! assert_eq!(buf, [0xAB; SECTOR_SIZE]);
//! ```

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Size of a sector in bytes.
pub const SECTOR_SIZE: usize = 512;

/// The shape of a disk.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Geometry {
    /// Number of cylinders.
    pub cylinders: u16,
    /// Number of heads per cylinder.
    pub heads: u8,
    /// Number of sectors per track.
    pub sectors: u8,
}
impl Geometry {
    /// Total number of sectors.
    pub fn total_sectors(&self) -> u64 {
        u64::from(self.cylinders) * u64::from(self.heads) * u64::from(self.sectors)
    }

    /// Total size of the disk in bytes.
    pub fn byte_len(&self) -> u64 {
        self.total_sectors() * SECTOR_SIZE as u64
    }

    /// Translates a CHS address to a linear block address,
    /// or `None` if the address is outside the disk.
    pub fn lba(&self, chs: Chs) -> Option<u64> {
        let Chs { cylinder, head, sector } = chs;
        let in_range = cylinder < u32::from(self.cylinders)
            && head < u32::from(self.heads)
            && (1..=u32::from(self.sectors)).contains(&sector);
        if !in_range { return None };

        let track = u64::from(cylinder) * u64::from(self.heads) + u64::from(head);
        Some(track * u64::from(self.sectors) + u64::from(sector - 1))
    }
}
impl Default for Geometry {
    /// 1024 cylinders, 16 heads, 63 sectors per track (about 504 MiB).
    fn default() -> Self {
        Self { cylinders: 1024, heads: 16, sectors: 63 }
    }
}

/// A cylinder/head/sector address. Sectors are numbered from 1.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Chs {
    #[allow(missing_docs)]
    pub cylinder: u32,
    #[allow(missing_docs)]
    pub head: u32,
    #[allow(missing_docs)]
    pub sector: u32,
}
impl std::fmt::Display for Chs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.cylinder, self.head, self.sector)
    }
}

/// Errors from disk access.
#[derive(Debug)]
pub enum DiskErr {
    /// The buffer cannot hold a whole sector.
    BufferTooSmall(usize),
    /// The CHS address is outside the disk's geometry.
    BadAddress(Chs),
    /// The backing store failed.
    Io(std::io::Error),
}
impl std::fmt::Display for DiskErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiskErr::BufferTooSmall(n) => write!(f, "buffer of {n} bytes is smaller than a sector ({SECTOR_SIZE} bytes)"),
            DiskErr::BadAddress(chs) => write!(f, "sector {chs} is outside the disk"),
            DiskErr::Io(_) => f.write_str("disk image IO failed"),
        }
    }
}
impl std::error::Error for DiskErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiskErr::Io(e) => Some(e),
            _ => None,
        }
    }
}
impl From<std::io::Error> for DiskErr {
    fn from(value: std::io::Error) -> Self {
        DiskErr::Io(value)
    }
}

/// A disk over some seekable backing store.
#[derive(Debug)]
pub struct DiskImage<B = File> {
    backing: B,
    geometry: Geometry
}
impl<B: Read + Write + Seek> DiskImage<B> {
    /// Wraps a backing store with the given geometry.
    pub fn new(backing: B, geometry: Geometry) -> Self {
        Self { backing, geometry }
    }

    /// The disk's geometry.
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn seek_to(&mut self, chs: Chs, buf_len: usize) -> Result<(), DiskErr> {
        if buf_len < SECTOR_SIZE {
            return Err(DiskErr::BufferTooSmall(buf_len));
        }
        let lba = self.geometry.lba(chs).ok_or(DiskErr::BadAddress(chs))?;
        self.backing.seek(SeekFrom::Start(lba * SECTOR_SIZE as u64))?;
        Ok(())
    }

    /// Reads one sector into the start of `buf`.
    pub fn read_sector(&mut self, chs: Chs, buf: &mut [u8]) -> Result<(), DiskErr> {
        self.seek_to(chs, buf.len())?;
        self.backing.read_exact(&mut buf[..SECTOR_SIZE])?;
        Ok(())
    }

    /// Writes one sector from the start of `buf`.
    pub fn write_sector(&mut self, chs: Chs, buf: &[u8]) -> Result<(), DiskErr> {
        self.seek_to(chs, buf.len())?;
        self.backing.write_all(&buf[..SECTOR_SIZE])?;
        self.backing.flush()?;
        Ok(())
    }

    /// Unwraps the backing store.
    pub fn into_inner(self) -> B {
        self.backing
    }
}
impl DiskImage<File> {
    /// Opens a file-backed disk image,
    /// creating it (zero-filled to the geometry's size) if it does not exist.
    pub fn open(path: impl AsRef<Path>, geometry: Geometry) -> Result<Self, DiskErr> {
        let path = path.as_ref();

        let file = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let f = OpenOptions::new().read(true).write(true).create_new(true).open(path)?;
                f.set_len(geometry.byte_len())?;
                log::info!("created disk image {} ({} bytes)", path.display(), geometry.byte_len());
                f
            },
            Err(e) => return Err(e.into()),
        };

        log::info!("opened disk image {}", path.display());
        Ok(Self::new(file, geometry))
    }
}
