//! Data file header format and helpers.
//!
//! The header is always the **first 8 bytes** of a data file:
//!
//! ```text
//! [cursor: u64 BE]   next free write offset
//! ```

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Result as IoResult, Seek, SeekFrom, Write};

/// Size of the header in bytes.
pub const HEADER_BYTES: u64 = 8;

/// Reads the write cursor from the start of `r`.
///
/// After this call the reader is positioned right after the header.
pub fn read_header<R: Read + Seek>(r: &mut R) -> IoResult<u64> {
    r.seek(SeekFrom::Start(0))?;
    r.read_u64::<BigEndian>()
}

/// Overwrites the header of `w` with `cursor`.
pub fn write_header<W: Write + Seek>(w: &mut W, cursor: u64) -> IoResult<()> {
    w.seek(SeekFrom::Start(0))?;
    w.write_u64::<BigEndian>(cursor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_round_trip_leaves_body_alone() {
        let mut buf = Cursor::new(vec![0xAA; 16]);
        write_header(&mut buf, 0x0102_0304).unwrap();
        assert_eq!(read_header(&mut buf).unwrap(), 0x0102_0304);
        assert_eq!(buf.position(), HEADER_BYTES);
        assert_eq!(&buf.get_ref()[..8], &[0, 0, 0, 0, 1, 2, 3, 4]);
        assert_eq!(&buf.get_ref()[8..], &[0xAA; 8]);
    }
}
