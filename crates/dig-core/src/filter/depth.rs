//! Depth (Z) interval matching

/// Observed min/max of find depths, fixed at load time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthExtent {
    pub min: f64,
    pub max: f64,
}

impl DepthExtent {
    /// `None` when no value is numeric
    pub fn observe(depths: impl IntoIterator<Item = Option<f64>>) -> Option<Self> {
        depths.into_iter().flatten().fold(None, |acc, z| {
            Some(match acc {
                Some(DepthExtent { min, max }) => DepthExtent {
                    min: min.min(z),
                    max: max.max(z),
                },
                None => DepthExtent { min: z, max: z },
            })
        })
    }

    pub fn clamp(&self, z: f64) -> f64 {
        z.clamp(self.min, self.max)
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Inclusive depth interval, always ordered `from <= to`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthRange {
    pub from: f64,
    pub to: f64,
}

impl DepthRange {
    /// Reversed bounds are swapped
    pub fn new(a: f64, b: f64) -> Self {
        if a > b {
            Self { from: b, to: a }
        } else {
            Self { from: a, to: b }
        }
    }

    /// Resolve slider values against the extent: a missing or non-numeric
    /// bound falls back to the extent's edge and both are clamped into it.
    pub fn from_inputs(from: Option<f64>, to: Option<f64>, extent: DepthExtent) -> Self {
        let from = from.filter(|z| z.is_finite()).unwrap_or(extent.min);
        let to = to.filter(|z| z.is_finite()).unwrap_or(extent.max);
        Self::new(extent.clamp(from), extent.clamp(to))
    }

    /// Fail-closed: a find without a numeric depth never matches
    pub fn matches(&self, z: Option<f64>) -> bool {
        match z {
            Some(z) => z >= self.from && z <= self.to,
            None => false,
        }
    }
}
