use std::fmt::{self, Display};
use std::str::FromStr;

use crate::error::ConfigError;

/// B-tagging working point
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum WorkingPoint {
    Loose,
    Medium,
    Tight,
}

impl WorkingPoint {
    pub const ALL: [WorkingPoint; 3] = [Self::Loose, Self::Medium, Self::Tight];
}

impl FromStr for WorkingPoint {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l" | "loose" => Ok(Self::Loose),
            "m" | "medium" => Ok(Self::Medium),
            "t" | "tight" => Ok(Self::Tight),
            _ => Err(ConfigError::UnknownWorkingPoint(s.to_owned())),
        }
    }
}

impl Display for WorkingPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Loose => "L",
            Self::Medium => "M",
            Self::Tight => "T",
        };
        f.write_str(s)
    }
}

/// Discriminant thresholds, strictly increasing from loose to tight
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BTagThresholds {
    loose: f64,
    medium: f64,
    tight: f64,
}

impl BTagThresholds {
    pub fn new(loose: f64, medium: f64, tight: f64) -> Result<Self, ConfigError> {
        let finite = loose.is_finite() && medium.is_finite() && tight.is_finite();
        if !finite || loose >= medium || medium >= tight {
            return Err(ConfigError::BTagOrder {
                loose,
                medium,
                tight,
            });
        }
        Ok(Self {
            loose,
            medium,
            tight,
        })
    }

    pub fn threshold(&self, wp: WorkingPoint) -> f64 {
        match wp {
            WorkingPoint::Loose => self.loose,
            WorkingPoint::Medium => self.medium,
            WorkingPoint::Tight => self.tight,
        }
    }

    /// Test the discriminant against loose, medium, tight in turn,
    /// stopping at the first failure
    pub fn classify(&self, discriminant: f64) -> BTagFlags {
        let mut flags = BTagFlags::default();
        if discriminant > self.loose {
            flags.loose = true;
            if discriminant > self.medium {
                flags.medium = true;
                if discriminant > self.tight {
                    flags.tight = true;
                }
            }
        }
        flags
    }
}

/// Working points passed by a single jet
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct BTagFlags {
    pub loose: bool,
    pub medium: bool,
    pub tight: bool,
}

impl BTagFlags {
    pub fn passes(&self, wp: WorkingPoint) -> bool {
        match wp {
            WorkingPoint::Loose => self.loose,
            WorkingPoint::Medium => self.medium,
            WorkingPoint::Tight => self.tight,
        }
    }
}

/// Indices of the b-tagged jets for each working point
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BTaggedJets {
    loose: Vec<usize>,
    medium: Vec<usize>,
    tight: Vec<usize>,
}

impl BTaggedJets {
    pub fn get(&self, wp: WorkingPoint) -> &[usize] {
        match wp {
            WorkingPoint::Loose => &self.loose,
            WorkingPoint::Medium => &self.medium,
            WorkingPoint::Tight => &self.tight,
        }
    }

    /// Record the jet with the given index as passing its working points
    pub fn insert(&mut self, index: usize, flags: BTagFlags) {
        if flags.loose {
            self.loose.push(index);
        }
        if flags.medium {
            self.medium.push(index);
        }
        if flags.tight {
            self.tight.push(index);
        }
    }
}

/// Classifies jets and keeps track of the default working point
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BTagger {
    pub thresholds: BTagThresholds,
    pub default_wp: WorkingPoint,
}

impl BTagger {
    pub fn new(thresholds: BTagThresholds, default_wp: WorkingPoint) -> Self {
        Self {
            thresholds,
            default_wp,
        }
    }

    /// Classify a jet discriminant and append its index to the lists
    /// of all working points it passes
    pub fn tag(&self, index: usize, discriminant: f64, tagged: &mut BTaggedJets) -> BTagFlags {
        let flags = self.thresholds.classify(discriminant);
        tagged.insert(index, flags);
        flags
    }
}
