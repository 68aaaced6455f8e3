//! Registry for managing bibliographic source plugins.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::{
    arxiv::ArxivSource, mathscinet::MathSciNetSource, mref::MRefSource, zbmath::ZbMathSource,
    Source, SourceError,
};

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        const EXACT_LOOKUP = 1 << 1;
        const WEBSITE = 1 << 2;
        const PAGINATION = 1 << 3;
    }
}

/// Where each backend is reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceEndpoints {
    pub mathscinet: String,
    pub mref: String,
    pub zbmath: String,
    /// Prefix for the `.bib` links on zbMATH result pages
    pub zbmath_bib: String,
    pub arxiv: String,
}

impl Default for SourceEndpoints {
    fn default() -> Self {
        Self {
            mathscinet: "https://mathscinet.ams.org/mathscinet/search/publications.html".to_string(),
            mref: "https://mathscinet.ams.org/mathscinet-mref".to_string(),
            zbmath: "https://zbmath.org/".to_string(),
            zbmath_bib: "https://zbmath.org".to_string(),
            arxiv: "https://front.math.ucdavis.edu/search".to_string(),
        }
    }
}

/// The backends this crate knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    MRef,
    ZbMath,
    MathSciNet,
    Arxiv,
}

impl SourceKind {
    /// Arbitration order: exact lookup first, then the broader searches
    pub const PRIORITY: [SourceKind; 4] = [
        SourceKind::MRef,
        SourceKind::ZbMath,
        SourceKind::MathSciNet,
        SourceKind::Arxiv,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            SourceKind::MRef => "mref",
            SourceKind::ZbMath => "zbmath",
            SourceKind::MathSciNet => "mathscinet",
            SourceKind::Arxiv => "arxiv",
        }
    }

    /// Build the source. `find_other_ids` makes zbMATH look its records up in MRef.
    pub fn build(&self, endpoints: &SourceEndpoints, find_other_ids: bool) -> Arc<dyn Source> {
        match self {
            SourceKind::MRef => Arc::new(MRefSource::with_base_url(&endpoints.mref)),
            SourceKind::ZbMath => {
                let source = ZbMathSource::with_base_urls(&endpoints.zbmath, &endpoints.zbmath_bib);
                if find_other_ids {
                    Arc::new(source.with_other_ids(MRefSource::with_base_url(&endpoints.mref)))
                } else {
                    Arc::new(source)
                }
            }
            SourceKind::MathSciNet => Arc::new(MathSciNetSource::with_base_url(&endpoints.mathscinet)),
            SourceKind::Arxiv => Arc::new(ArxivSource::with_base_url(&endpoints.arxiv)),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for SourceKind {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mref" => Ok(SourceKind::MRef),
            "zbmath" | "zbl" => Ok(SourceKind::ZbMath),
            "mathscinet" | "msn" => Ok(SourceKind::MathSciNet),
            "arxiv" => Ok(SourceKind::Arxiv),
            _ => Err(SourceError::UnknownSource(s.to_string())),
        }
    }
}

/// Registry for all available bibliographic sources
///
/// The SourceRegistry holds one instance of every source and hands them out by
/// id or in arbitration order.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create a new registry with all available sources at their public endpoints
    pub fn new() -> Self {
        Self::with_endpoints(&SourceEndpoints::default(), false)
    }

    /// Create a registry with all sources at the given endpoints
    pub fn with_endpoints(endpoints: &SourceEndpoints, find_other_ids: bool) -> Self {
        let mut registry = Self {
            sources: HashMap::new(),
        };

        for kind in SourceKind::PRIORITY {
            registry.register(kind.build(endpoints, find_other_ids));
        }

        registry
    }

    /// Register a new source
    pub fn register(&mut self, source: Arc<dyn Source>) {
        self.sources.insert(source.id().to_string(), source);
    }

    /// Get a source by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Source>> {
        self.sources.get(id)
    }

    /// Get a source by ID, returning an error if not found
    pub fn get_required(&self, id: &str) -> Result<&Arc<dyn Source>, SourceError> {
        self.get(id)
            .ok_or_else(|| SourceError::UnknownSource(id.to_string()))
    }

    /// Registered sources in arbitration order; sources outside the known kinds come last
    pub fn in_priority_order(&self) -> Vec<Arc<dyn Source>> {
        let mut ordered: Vec<Arc<dyn Source>> = SourceKind::PRIORITY
            .iter()
            .filter_map(|kind| self.get(kind.id()).cloned())
            .collect();

        let mut rest: Vec<&Arc<dyn Source>> = self
            .all()
            .filter(|s| s.id().parse::<SourceKind>().is_err())
            .collect();
        rest.sort_by(|a, b| a.id().cmp(b.id()));
        ordered.extend(rest.into_iter().cloned());
        ordered
    }

    /// Get all registered sources
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Source>> {
        self.sources.values()
    }

    /// Get all source IDs
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(|s| s.as_str())
    }

    /// Get sources that support a specific capability
    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<&Arc<dyn Source>> {
        self.all()
            .filter(|s| s.capabilities().contains(capability))
            .collect()
    }

    /// Check if a source exists
    pub fn has(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    /// Get the number of registered sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
