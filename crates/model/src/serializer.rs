use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::codec::{read_string, string_size, write_string};
use crate::{PositionableModel, Record};

/// Encodes and decodes the payload of one record category.
///
/// Implementors only deal with the payload. The record header written in
/// front of every payload is handled by the provided methods:
///
/// ```text
/// [id: string][time: i64 BE][payload]
/// ```
///
/// `payload_size` must return exactly the number of bytes `write_payload`
/// produces; the data file reserves space from it before anything is written.
pub trait ObjectSerializer: Send + Sync {
    type Payload: PositionableModel;

    /// Encoded size of `payload` in bytes.
    fn payload_size(&self, payload: &Self::Payload) -> usize;

    fn write_payload<W: Write>(&self, w: &mut W, payload: &Self::Payload) -> io::Result<()>;

    fn read_payload<R: Read>(&self, r: &mut R) -> io::Result<Self::Payload>;

    /// Encoded size of the whole record, header included.
    fn size_of(&self, record: &Record<Self::Payload>) -> usize {
        string_size(&record.id) + 8 + self.payload_size(&record.data)
    }

    fn write<W: Write>(&self, w: &mut W, record: &Record<Self::Payload>) -> io::Result<()> {
        write_string(w, &record.id)?;
        w.write_i64::<BigEndian>(record.time)?;
        self.write_payload(w, &record.data)
    }

    fn read<R: Read>(&self, r: &mut R) -> io::Result<Record<Self::Payload>> {
        let id = self.read_id(r)?;
        let time = self.read_time(r)?;
        let data = self.read_payload(r)?;
        Ok(Record { id, time, data })
    }

    fn read_id<R: Read>(&self, r: &mut R) -> io::Result<String> {
        read_string(r)
    }

    fn read_time<R: Read>(&self, r: &mut R) -> io::Result<i64> {
        r.read_i64::<BigEndian>()
    }
}
