//! Extractor registry and dispatch.
//!
//! Extractors register under a stable business-term id. For a classified
//! notice the registry yields the applicable subset in a canonical order:
//! declared dependencies first (topological sort), ties broken by entity
//! group, then business-term number, then id. The order is part of the
//! conversion contract: last-write-wins fields and synthetic ids are only
//! reproducible because the order is.

use indexmap::IndexMap;

use crate::detect::FormClassification;
use crate::document::Notice;
use crate::fragment::Fragment;

/// Entity group an extractor contributes to. Declaration order is the
/// coarse run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Group {
    Notice,
    Parties,
    Tender,
    Awards,
    Bids,
}

/// One business-term extractor.
///
/// Implementations are pure functions of the parsed document: `extract` may
/// not depend on the release being assembled, and returns `Ok(None)` rather
/// than an empty fragment when the term is absent from the notice.
pub trait BtExtractor: Send + Sync {
    /// Stable identifier, e.g. `bt-05-dispatch-date`.
    fn id(&self) -> &'static str;

    /// Entity group, the coarse ordering key.
    fn group(&self) -> Group;

    /// Business-term number, the fine ordering key within a group.
    fn bt(&self) -> u16;

    /// Ids of extractors that must run earlier.
    fn dependencies(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Whether this extractor applies to the classified notice.
    fn applies_to(&self, classification: &FormClassification) -> bool;

    /// Extract this term's fragment from the notice.
    fn extract(&self, notice: &Notice) -> Result<Option<Fragment>, String>;
}

/// Registry of extractors with a precomputed canonical run order.
pub struct ExtractorRegistry {
    extractors: IndexMap<&'static str, Box<dyn BtExtractor>>,
    order: Vec<&'static str>,
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("extractors", &self.extractors.keys().collect::<Vec<_>>())
            .field("order", &self.order)
            .finish()
    }
}

impl ExtractorRegistry {
    /// Build a registry from a list of extractors.
    ///
    /// Registering the same id twice replaces the earlier entry.
    ///
    /// # Errors
    /// Fails on unknown dependency ids or dependency cycles.
    pub fn from_extractors(list: Vec<Box<dyn BtExtractor>>) -> Result<Self, String> {
        let mut extractors: IndexMap<&'static str, Box<dyn BtExtractor>> = IndexMap::new();
        for extractor in list {
            extractors.insert(extractor.id(), extractor);
        }
        let order = compute_run_order(&extractors)?;
        Ok(Self { extractors, order })
    }

    /// Registry with the built-in extractor set.
    pub fn builtin() -> Result<Self, String> {
        Self::from_extractors(crate::extractors::builtin())
    }

    /// Number of registered extractors.
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Canonical run order over all registered extractors.
    pub fn run_order(&self) -> &[&'static str] {
        &self.order
    }

    /// Applicable extractors for a classification, in canonical order.
    ///
    /// Deterministic for a given classification. An unknown classification
    /// yields only the always-applicable extractors (base notice metadata),
    /// producing a minimal release rather than an error.
    pub fn applicable(&self, classification: &FormClassification) -> Vec<&dyn BtExtractor> {
        self.order
            .iter()
            .filter_map(|id| self.extractors.get(id))
            .map(|boxed| boxed.as_ref())
            .filter(|e| e.applies_to(classification))
            .collect()
    }
}

/// Topological sort (Kahn) with a deterministic tie-break.
///
/// The ready set is drained smallest-first by (group, business-term number,
/// id), so the order is total and reproducible regardless of registration
/// order.
fn compute_run_order(
    extractors: &IndexMap<&'static str, Box<dyn BtExtractor>>,
) -> Result<Vec<&'static str>, String> {
    let mut in_degree: IndexMap<&'static str, usize> = IndexMap::new();
    let mut dependents: IndexMap<&'static str, Vec<&'static str>> = IndexMap::new();

    for id in extractors.keys() {
        in_degree.insert(*id, 0);
        dependents.insert(*id, Vec::new());
    }

    for (id, extractor) in extractors {
        for dep in extractor.dependencies() {
            if !extractors.contains_key(dep) {
                return Err(format!(
                    "extractor '{}' depends on unregistered extractor '{}'",
                    id, dep
                ));
            }
            *in_degree.get_mut(id).unwrap() += 1;
            dependents.get_mut(dep).unwrap().push(*id);
        }
    }

    let sort_key = |id: &&'static str| {
        let e = &extractors[*id];
        (e.group(), e.bt(), *id)
    };

    let mut ready: Vec<&'static str> = in_degree
        .iter()
        .filter(|(_, &degree)| degree == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut sorted = Vec::with_capacity(extractors.len());

    while !ready.is_empty() {
        ready.sort_by_key(sort_key);
        let id = ready.remove(0);
        sorted.push(id);

        for dependent in &dependents[id] {
            let degree = in_degree.get_mut(dependent).unwrap();
            *degree -= 1;
            if *degree == 0 {
                ready.push(*dependent);
            }
        }
    }

    if sorted.len() != extractors.len() {
        let stuck: Vec<_> = extractors
            .keys()
            .filter(|id| !sorted.contains(id))
            .collect();
        return Err(format!("dependency cycle among extractors: {:?}", stuck));
    }

    Ok(sorted)
}
