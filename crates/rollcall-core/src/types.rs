use std::fmt;

/// Axis-aligned face box in pixel coordinates, `(top, right, bottom, left)` order.
///
/// The coordinate space depends on where the box came from: the encoder
/// reports boxes in processing resolution, and [`ScaleTransform`] maps them
/// to display resolution.
///
/// [`ScaleTransform`]: crate::sampling::ScaleTransform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl BoundingBox {
    pub fn new(top: u32, right: u32, bottom: u32, left: u32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// Face embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Euclidean distance between two embeddings.
    ///
    /// Returns `None` when the dimensions differ; such a pair is never
    /// comparable.
    pub fn euclidean_distance(&self, other: &Embedding) -> Option<f32> {
        if self.values.len() != other.values.len() {
            return None;
        }
        Some(
            self.values
                .iter()
                .zip(other.values.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f32>()
                .sqrt(),
        )
    }
}

/// One enrolled sample: a name and one reference embedding.
///
/// A name may appear in many entries (one per enrolled image).
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    pub identity_name: String,
    pub embedding: Embedding,
}

/// A face found on a processed frame, in processing-resolution coordinates.
#[derive(Debug, Clone)]
pub struct Detection {
    pub bounding_box: BoundingBox,
    pub embedding: Embedding,
}

/// Outcome of matching one embedding against the gallery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Known(String),
    Unknown,
}

impl Identity {
    pub fn is_known(&self) -> bool {
        matches!(self, Identity::Known(_))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Known(name) => f.write_str(name),
            Identity::Unknown => f.write_str("Unknown"),
        }
    }
}

/// A box in display resolution paired with who it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub bounding_box: BoundingBox,
    pub identity: Identity,
}
