use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::codec::{read_string, string_size, write_string};
use crate::{Envelope, ObjectSerializer, PositionableModel};

/// One textured triangle set of a world object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Geometry {
    pub texture: String,
    /// Flat `x, y, z` triples.
    pub ordinates: Vec<f32>,
    /// Flat `u, v` pairs.
    pub texture_ordinates: Vec<f32>,
}

/// A world-renderable object: a building, or a prototype other objects
/// reference.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldObject {
    pub id: String,
    pub time: i64,
    pub name: String,
    pub object_type: String,
    pub external_ref: String,
    pub bbox: Envelope,
    pub geometries: Vec<Geometry>,
}

impl WorldObject {
    pub fn new(name: impl Into<String>, bbox: Envelope) -> Self {
        Self {
            id: String::new(),
            time: 0,
            name: name.into(),
            object_type: String::new(),
            external_ref: String::new(),
            bbox,
            geometries: Vec::new(),
        }
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometries.push(geometry);
        self
    }
}

impl PositionableModel for WorldObject {
    fn envelope(&self) -> Option<Envelope> {
        Some(self.bbox.clone())
    }

    fn ordinate_count(&self) -> u32 {
        self.geometries.iter().map(|g| g.ordinates.len() as u32).sum()
    }

    fn texture_ordinate_count(&self) -> u32 {
        self.geometries
            .iter()
            .map(|g| g.texture_ordinates.len() as u32)
            .sum()
    }

    fn assign_identity(&mut self, id: &str, time: i64) {
        self.id = id.to_string();
        self.time = time;
    }
}

/// Payload layout, shared by buildings and prototypes:
///
/// ```text
/// [name: string][type: string][external ref: string]
/// [min x, y, z: f64][max x, y, z: f64]
/// [geometry count: i32]
///   [texture: string][n: i32][n × f32][m: i32][m × f32]   (per geometry)
/// ```
///
/// The bounding box is stored without its coordinate system; the store stamps
/// the dataset's coordinate system on envelopes it reads back.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldObjectSerializer;

fn write_floats<W: Write>(w: &mut W, values: &[f32]) -> io::Result<()> {
    let len = i32::try_from(values.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many ordinates"))?;
    w.write_i32::<BigEndian>(len)?;
    for v in values {
        w.write_f32::<BigEndian>(*v)?;
    }
    Ok(())
}

fn read_count<R: Read>(r: &mut R) -> io::Result<usize> {
    let n = r.read_i32::<BigEndian>()?;
    usize::try_from(n)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, format!("negative count {n}")))
}

fn read_floats<R: Read>(r: &mut R) -> io::Result<Vec<f32>> {
    let n = read_count(r)?;
    // capacity is capped so a corrupt count fails on EOF instead of allocating
    let mut values = Vec::with_capacity(n.min(1 << 16));
    for _ in 0..n {
        values.push(r.read_f32::<BigEndian>()?);
    }
    Ok(values)
}

impl ObjectSerializer for WorldObjectSerializer {
    type Payload = WorldObject;

    fn payload_size(&self, payload: &WorldObject) -> usize {
        let geometries: usize = payload
            .geometries
            .iter()
            .map(|g| {
                string_size(&g.texture) + 4 + 4 * g.ordinates.len() + 4 + 4 * g.texture_ordinates.len()
            })
            .sum();
        string_size(&payload.name)
            + string_size(&payload.object_type)
            + string_size(&payload.external_ref)
            + 6 * 8
            + 4
            + geometries
    }

    fn write_payload<W: Write>(&self, w: &mut W, payload: &WorldObject) -> io::Result<()> {
        write_string(w, &payload.name)?;
        write_string(w, &payload.object_type)?;
        write_string(w, &payload.external_ref)?;
        for v in payload.bbox.min.iter().chain(payload.bbox.max.iter()) {
            w.write_f64::<BigEndian>(*v)?;
        }
        let count = i32::try_from(payload.geometries.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many geometries"))?;
        w.write_i32::<BigEndian>(count)?;
        for g in &payload.geometries {
            write_string(w, &g.texture)?;
            write_floats(w, &g.ordinates)?;
            write_floats(w, &g.texture_ordinates)?;
        }
        Ok(())
    }

    fn read_payload<R: Read>(&self, r: &mut R) -> io::Result<WorldObject> {
        let name = read_string(r)?;
        let object_type = read_string(r)?;
        let external_ref = read_string(r)?;
        let mut corners = [0f64; 6];
        for v in &mut corners {
            *v = r.read_f64::<BigEndian>()?;
        }
        let bbox = Envelope::new(
            [corners[0], corners[1], corners[2]],
            [corners[3], corners[4], corners[5]],
            None,
        );
        let count = read_count(r)?;
        let mut geometries = Vec::with_capacity(count.min(1 << 10));
        for _ in 0..count {
            let texture = read_string(r)?;
            let ordinates = read_floats(r)?;
            let texture_ordinates = read_floats(r)?;
            geometries.push(Geometry {
                texture,
                ordinates,
                texture_ordinates,
            });
        }
        Ok(WorldObject {
            id: String::new(),
            time: 0,
            name,
            object_type,
            external_ref,
            bbox,
            geometries,
        })
    }
}
