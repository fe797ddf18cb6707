use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::Envelope;

/// A payload that occupies a region of space.
///
/// The store never interprets payload bytes; everything it needs to know to
/// maintain its dataset metadata is asked through this trait.
pub trait PositionableModel: Clone + fmt::Debug + Send + Sync {
    /// The bounding box of this payload, if it has one.
    fn envelope(&self) -> Option<Envelope>;

    /// Number of raw geometry ordinates carried by the payload.
    fn ordinate_count(&self) -> u32 {
        0
    }

    /// Number of raw texture ordinates carried by the payload.
    fn texture_ordinate_count(&self) -> u32 {
        0
    }

    /// Hands the record identity over to the payload before it is given to a
    /// renderer.
    fn assign_identity(&mut self, _id: &str, _time: i64) {}
}

/// A single stored entity.
///
/// The `id` is the identity of the record and can never change once the
/// record has been added to a store.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<P> {
    pub id: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub time: i64,
    pub data: P,
}

impl<P> Record<P> {
    pub fn new(id: impl Into<String>, time: i64, data: P) -> Self {
        Self {
            id: id.into(),
            time,
            data,
        }
    }
}

impl<P: PositionableModel> Record<P> {
    /// The bounding box of the payload.
    pub fn envelope(&self) -> Option<Envelope> {
        self.data.envelope()
    }

    /// Consumes the record, returning the payload with the record identity
    /// assigned to it.
    pub fn into_identified(self) -> P {
        let mut data = self.data;
        data.assign_identity(&self.id, self.time);
        data
    }
}

/// The kind of model a record holds; selects the store and serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Billboards, rendered as camera-facing textured quads.
    Tree,
    /// World-renderable objects with their own geometry.
    Building,
    /// Reusable geometry referenced by other objects.
    Prototype,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Tree, Category::Building, Category::Prototype];

    /// Base file name of the `.bin`/`.idx`/`.info` triplet for this category.
    pub fn file_stem(self) -> &'static str {
        match self {
            Category::Tree => "trees",
            Category::Building => "buildings",
            Category::Prototype => "prototypes",
        }
    }

    /// Whether payloads of this category carry raw geometry ordinates.
    pub fn carries_ordinates(self) -> bool {
        !matches!(self, Category::Tree)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Tree => "tree",
            Category::Building => "building",
            Category::Prototype => "prototype",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("unknown model category: {0}")]
pub struct ParseCategoryError(String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tree" | "trees" | "billboard" => Ok(Category::Tree),
            "building" | "buildings" | "stage" => Ok(Category::Building),
            "prototype" | "prototypes" => Ok(Category::Prototype),
            _ => Err(ParseCategoryError(s.to_string())),
        }
    }
}
