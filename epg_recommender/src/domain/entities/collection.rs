use serde::{Deserialize, Serialize};

/// Metric used to score the closeness of two vectors.
///
/// Fixed when a collection is created: changing it requires recreating the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Similarity {
    Cosine,
    Dot,
}

impl Similarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Similarity::Cosine => "cosine",
            Similarity::Dot => "dot",
        }
    }

    /// Scores `a` against `b`. Cosine is 0 when one of the vectors has no magnitude.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();

        match self {
            Similarity::Dot => dot,
            Similarity::Cosine => {
                let norms = l2_norm(a) * l2_norm(b);
                if norms == 0.0 {
                    0.0
                } else {
                    dot / norms
                }
            }
        }
    }
}

impl std::fmt::Display for Similarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scales the vector to a unit length, leaving a zero vector untouched
pub fn normalize(vector: &mut [f32]) {
    let norm = l2_norm(vector);
    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Shape of a collection: every point shares its dimension and metric
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub dimension: u64,
    pub similarity: Similarity,
}
