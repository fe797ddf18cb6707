use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::codec::{read_string, string_size, write_string};
use crate::{Envelope, ObjectSerializer, PositionableModel};

/// A camera-facing textured quad standing on the ground, used for trees.
#[derive(Debug, Clone, PartialEq)]
pub struct Billboard {
    pub id: String,
    pub time: i64,
    /// Centre of the quad's base.
    pub location: [f32; 3],
    pub width: f32,
    pub height: f32,
    pub texture: String,
}

impl Billboard {
    pub fn new(location: [f32; 3], width: f32, height: f32, texture: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            time: 0,
            location,
            width,
            height,
            texture: texture.into(),
        }
    }
}

impl PositionableModel for Billboard {
    /// The box swept by the quad when it rotates around its vertical axis.
    fn envelope(&self) -> Option<Envelope> {
        let [x, y, z] = self.location.map(f64::from);
        let half = f64::from(self.width) / 2.0;
        Some(Envelope::new(
            [x - half, y - half, z],
            [x + half, y + half, z + f64::from(self.height)],
            None,
        ))
    }

    fn assign_identity(&mut self, id: &str, time: i64) {
        self.id = id.to_string();
        self.time = time;
    }
}

/// Payload layout:
///
/// ```text
/// [x: f32][y: f32][z: f32][width: f32][height: f32][texture: string]
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BillboardSerializer;

impl ObjectSerializer for BillboardSerializer {
    type Payload = Billboard;

    fn payload_size(&self, payload: &Billboard) -> usize {
        5 * 4 + string_size(&payload.texture)
    }

    fn write_payload<W: Write>(&self, w: &mut W, payload: &Billboard) -> io::Result<()> {
        for v in payload.location {
            w.write_f32::<BigEndian>(v)?;
        }
        w.write_f32::<BigEndian>(payload.width)?;
        w.write_f32::<BigEndian>(payload.height)?;
        write_string(w, &payload.texture)
    }

    fn read_payload<R: Read>(&self, r: &mut R) -> io::Result<Billboard> {
        let mut location = [0f32; 3];
        for v in &mut location {
            *v = r.read_f32::<BigEndian>()?;
        }
        let width = r.read_f32::<BigEndian>()?;
        let height = r.read_f32::<BigEndian>()?;
        let texture = read_string(r)?;
        Ok(Billboard::new(location, width, height, texture))
    }
}
