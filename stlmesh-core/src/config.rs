//! Load options

/// Default ceiling on the number of facets a single file may declare.
pub const DEFAULT_MAX_FACETS: u32 = 50_000_000;

/// Options controlling a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Files declaring more facets than this fail before any facet storage is allocated.
    pub max_facets: u32,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self {
            max_facets: DEFAULT_MAX_FACETS,
        }
    }

    pub fn with_max_facets(mut self, max_facets: u32) -> Self {
        self.max_facets = max_facets;
        self
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::new()
    }
}
