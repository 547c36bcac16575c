use crate::domain::feature_vector::FeatureVector;

/// One fully encoded training example.
#[derive(Debug, Clone)]
pub struct LabeledSample {
    pub features: FeatureVector,
    /// Class index into the LabelMap
    pub label:    usize,
}

pub struct LesionDataset {
    samples: Vec<LabeledSample>,
}

impl LesionDataset {
    pub fn new(samples: Vec<LabeledSample>) -> Self { Self { samples } }

    pub fn get(&self, index: usize) -> Option<&LabeledSample> {
        self.samples.get(index)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[LabeledSample] {
        &self.samples
    }

    pub fn labels(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.label).collect()
    }
}
