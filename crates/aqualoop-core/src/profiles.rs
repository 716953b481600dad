//! # Industry Profiles
//!
//! Catalogued industries and their typical untreated effluent, used to
//! prefill simulation requests.

use crate::types::{IndustryContext, Parameter, ParameterSet};

/// A catalogued industry with a default influent sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndustryProfile {
    pub key: &'static str,
    pub label: &'static str,
    /// bod, cod, ph, turbidity, tss
    pub defaults: [f64; 5],
}

impl IndustryProfile {
    /// The default influent sample as a complete parameter set.
    #[must_use]
    pub fn influent(&self) -> ParameterSet {
        Parameter::ALL
            .into_iter()
            .zip(self.defaults)
            .collect()
    }

    /// Context for a run of this industry.
    #[must_use]
    pub fn context(&self) -> IndustryContext {
        IndustryContext::new(self.key)
    }
}

pub const PROFILES: [IndustryProfile; 4] = [
    IndustryProfile {
        key: "textile",
        label: "Textile Processing",
        defaults: [420.0, 760.0, 5.6, 180.0, 360.0],
    },
    IndustryProfile {
        key: "food",
        label: "Food & Beverage",
        defaults: [1200.0, 2500.0, 4.5, 450.0, 800.0],
    },
    IndustryProfile {
        key: "chemical",
        label: "Chemical Plant",
        defaults: [300.0, 1500.0, 3.0, 100.0, 200.0],
    },
    IndustryProfile {
        key: "municipal",
        label: "Municipal Site",
        defaults: [200.0, 450.0, 7.2, 50.0, 250.0],
    },
];

/// Look a profile up by key, case-insensitively.
#[must_use]
pub fn profile(key: &str) -> Option<&'static IndustryProfile> {
    let key = key.trim();
    PROFILES.iter().find(|p| p.key.eq_ignore_ascii_case(key))
}
