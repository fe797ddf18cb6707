//! # Model
//!
//! In-memory value types shared by every layer of the model store.
//!
//! A store persists **records**: an identifier, a timestamp and a
//! category-specific payload. Payloads know their own spatial extent, so the
//! store can maintain a dataset envelope without understanding the payload
//! encoding itself. Encoding is delegated to an [`ObjectSerializer`], one per
//! [`Category`].
//!
//! ## Key properties
//! - **Envelopes only grow**: [`Envelope::merge`] is a component-wise union.
//! - **Pluggable encoding**: the store only ever calls the serializer to size,
//!   write and read payloads.
//! - **Big-endian on disk**: every integer, float and string length written by
//!   this workspace uses network byte order.
//!
//! ## Example
//! ```rust
//! use model::{Billboard, BillboardSerializer, ObjectSerializer, Record};
//!
//! let tree = Billboard::new([10.0, 20.0, 0.0], 4.0, 8.0, "oak.png");
//! let record = Record::new("tree-1", 1000, tree);
//!
//! let serializer = BillboardSerializer;
//! let mut buf = Vec::new();
//! serializer.write(&mut buf, &record).unwrap();
//! assert_eq!(buf.len(), serializer.size_of(&record));
//!
//! let decoded = serializer.read(&mut buf.as_slice()).unwrap();
//! assert_eq!(decoded, record);
//! ```

mod billboard;
pub mod codec;
mod envelope;
mod record;
mod serializer;
mod world;

pub use billboard::{Billboard, BillboardSerializer};
pub use envelope::{merge_into, Envelope};
pub use record::{Category, ParseCategoryError, PositionableModel, Record};
pub use serializer::ObjectSerializer;
pub use world::{Geometry, WorldObject, WorldObjectSerializer};
