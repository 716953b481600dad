//! # Stage Catalog
//!
//! The fixed, ordered list of treatment stages every run executes.
//! Stages are never skipped or reordered.

use crate::error::CatalogError;
use crate::types::TreatmentStage;
use std::collections::BTreeSet;

/// Stage order used by the platform.
pub const STANDARD_STAGES: [TreatmentStage; 3] = [
    TreatmentStage::Primary,
    TreatmentStage::Secondary,
    TreatmentStage::Tertiary,
];

/// Read-only ordered sequence of treatment stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCatalog {
    stages: Vec<TreatmentStage>,
}

impl Default for StageCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl StageCatalog {
    /// primary → secondary → tertiary.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            stages: STANDARD_STAGES.to_vec(),
        }
    }

    /// Build a catalog from an explicit order. Must be non-empty, no repeats.
    pub fn new(stages: Vec<TreatmentStage>) -> Result<Self, CatalogError> {
        if stages.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = BTreeSet::new();
        for stage in &stages {
            if !seen.insert(*stage) {
                return Err(CatalogError::Duplicate(*stage));
            }
        }
        Ok(Self { stages })
    }

    #[must_use]
    pub fn stages(&self) -> &[TreatmentStage] {
        &self.stages
    }

    pub fn iter(&self) -> impl Iterator<Item = TreatmentStage> + '_ {
        self.stages.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false for a constructed catalog.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Position of a stage in the catalog.
    #[must_use]
    pub fn position(&self, stage: TreatmentStage) -> Option<usize> {
        self.stages.iter().position(|s| *s == stage)
    }
}
