/// An axis-aligned 3D bounding box with an optional coordinate system name.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Lower corner `(x, y, z)`.
    pub min: [f64; 3],
    /// Upper corner `(x, y, z)`.
    pub max: [f64; 3],
    /// Name of the coordinate reference system, if known.
    pub crs: Option<String>,
}

impl Envelope {
    /// Creates an envelope from two corners.
    ///
    /// The corners are normalised component-wise, so `min <= max` holds on
    /// every axis regardless of the order they were given in.
    pub fn new(min: [f64; 3], max: [f64; 3], crs: Option<String>) -> Self {
        let mut lo = min;
        let mut hi = max;
        for axis in 0..3 {
            if lo[axis] > hi[axis] {
                std::mem::swap(&mut lo[axis], &mut hi[axis]);
            }
        }
        Self {
            min: lo,
            max: hi,
            crs,
        }
    }

    /// The domain a renderer starts out with before any dataset is applied:
    /// `[-1, -1, -1]` to `[1, 1, 1]`.
    pub fn default_domain() -> Self {
        Self::new([-1.0; 3], [1.0; 3], None)
    }

    /// Returns `true` if this envelope is still the [`default_domain`](Self::default_domain).
    pub fn is_default_domain(&self) -> bool {
        self.min == [-1.0; 3] && self.max == [1.0; 3]
    }

    /// Returns the smallest envelope containing both `self` and `other`.
    ///
    /// The coordinate system of `self` wins; `other`'s is used only when
    /// `self` has none.
    pub fn merge(&self, other: &Envelope) -> Envelope {
        let mut min = self.min;
        let mut max = self.max;
        for axis in 0..3 {
            min[axis] = min[axis].min(other.min[axis]);
            max[axis] = max[axis].max(other.max[axis]);
        }
        Envelope {
            min,
            max,
            crs: self.crs.clone().or_else(|| other.crs.clone()),
        }
    }

    /// Returns `true` if `other` lies entirely inside `self`.
    pub fn contains(&self, other: &Envelope) -> bool {
        (0..3).all(|axis| self.min[axis] <= other.min[axis] && other.max[axis] <= self.max[axis])
    }

    /// Replaces the coordinate system name when `crs` is given.
    pub fn with_crs(mut self, crs: Option<&str>) -> Self {
        if let Some(name) = crs {
            self.crs = Some(name.to_string());
        }
        self
    }
}

/// Folds `next` into a running envelope.
///
/// The first envelope seeds the accumulator; later ones extend it. A missing
/// `next` leaves the accumulator untouched.
pub fn merge_into(acc: Option<Envelope>, next: Option<&Envelope>) -> Option<Envelope> {
    match (acc, next) {
        (Some(a), Some(n)) => Some(a.merge(n)),
        (None, Some(n)) => Some(n.clone()),
        (a, None) => a,
    }
}
