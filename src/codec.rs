//! Little-endian record codec
//!
//! All multi-byte values in the archive and in the indexed data files are
//! little-endian. Primitive integers and floats go through `byteorder`'s
//! `ReadBytesExt`/`WriteBytesExt`; this module adds the two composite fields
//! the on-disk formats share: high-resolution time stamps and fixed-width
//! filename fields.

use std::io;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::time::HighTime;
use crate::vfs::MAX_FILENAME_LEN;

/// Read-side composite fields.
pub trait ReadRecordExt: io::Read {
    /// A time stamp as `i64` seconds followed by `f64` sub-seconds.
    fn read_high_time(&mut self) -> io::Result<HighTime> {
        let seconds = self.read_i64::<LittleEndian>()?;
        let sub_seconds = self.read_f64::<LittleEndian>()?;
        Ok(HighTime::new(seconds, sub_seconds))
    }

    /// A fixed-width, NUL-padded filename field.
    fn read_name(&mut self) -> io::Result<[u8; MAX_FILENAME_LEN]> {
        let mut name = [0u8; MAX_FILENAME_LEN];
        self.read_exact(&mut name)?;
        Ok(name)
    }
}

impl<R: io::Read + ?Sized> ReadRecordExt for R {}

/// Write-side composite fields.
pub trait WriteRecordExt: io::Write {
    fn write_high_time(&mut self, time: &HighTime) -> io::Result<()> {
        self.write_i64::<LittleEndian>(time.seconds())?;
        self.write_f64::<LittleEndian>(time.sub_seconds())
    }

    fn write_name(&mut self, name: &[u8; MAX_FILENAME_LEN]) -> io::Result<()> {
        self.write_all(name)
    }
}

impl<W: io::Write + ?Sized> WriteRecordExt for W {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_high_time_round_trip() {
        let mut buf = Vec::new();
        let t = HighTime::new(1_700_000_000, 0.125);
        buf.write_high_time(&t).unwrap();
        assert_eq!(buf.len(), 16);

        let got = Cursor::new(&buf).read_high_time().unwrap();
        assert_eq!(got.seconds(), 1_700_000_000);
        assert!((got.sub_seconds() - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_high_time_byte_order() {
        let mut buf = Vec::new();
        buf.write_high_time(&HighTime::new(0x0102_0304, 0.0)).unwrap();
        assert_eq!(&buf[..4], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_name_round_trip() {
        let mut name = [0u8; MAX_FILENAME_LEN];
        name[..5].copy_from_slice(b"chan1");

        let mut buf = Vec::new();
        buf.write_name(&name).unwrap();
        let got = Cursor::new(&buf).read_name().unwrap();
        assert_eq!(got, name);
    }
}
