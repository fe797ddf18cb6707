//! Length-prefixed string helpers shared by the data, index and info files.
//!
//! ```text
//! [len: i32 BE][len bytes of UTF-8]
//! ```

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Encoded size of `s` in bytes, including the 4-byte length prefix.
pub fn string_size(s: &str) -> usize {
    4 + s.len()
}

/// Writes `s` as a length-prefixed UTF-8 string.
pub fn write_string<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    let len = i32::try_from(s.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "string too long"))?;
    w.write_i32::<BigEndian>(len)?;
    w.write_all(s.as_bytes())
}

/// Reads a length-prefixed UTF-8 string.
///
/// A negative length or invalid UTF-8 yields [`io::ErrorKind::InvalidData`];
/// a length running past the end of the input yields
/// [`io::ErrorKind::UnexpectedEof`]. The buffer grows with the bytes actually
/// read, so a corrupt length cannot trigger a huge allocation.
pub fn read_string<R: Read>(r: &mut R) -> io::Result<String> {
    let len = r.read_i32::<BigEndian>()?;
    if len < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("negative string length {len}"),
        ));
    }
    let mut bytes = Vec::new();
    r.take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len as usize {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
