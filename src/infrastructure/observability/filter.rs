//! Per-sink meter filters, applied once when a meter reaches a sink.

use std::collections::BTreeMap;

use super::meter::MeterId;

/// Process metric names as Prometheus conventionally exposes them
const PROMETHEUS_RENAMES: &[(&str, &str)] = &[
    ("process_files_open", "process_open_fds"),
    ("process_files_max", "process_max_fds"),
];

#[derive(Debug, Clone, PartialEq)]
pub enum MeterFilter {
    /// Drop every meter whose name does not start with one of the prefixes
    DenyUnlessNameStartsWith(Vec<String>),
    /// Rename meters by exact name match
    Rename(BTreeMap<String, String>),
}

impl MeterFilter {
    pub fn deny_unless_name_starts_with<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MeterFilter::DenyUnlessNameStartsWith(prefixes.into_iter().map(Into::into).collect())
    }

    pub fn rename<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        MeterFilter::Rename(
            pairs
                .into_iter()
                .map(|(from, to)| (from.into(), to.into()))
                .collect(),
        )
    }

    pub fn prometheus_rename() -> Self {
        Self::rename(PROMETHEUS_RENAMES.iter().copied())
    }

    /// Returns the id the sink should use, or `None` when the meter is denied
    pub fn map(&self, id: MeterId) -> Option<MeterId> {
        match self {
            MeterFilter::DenyUnlessNameStartsWith(prefixes) => prefixes
                .iter()
                .any(|p| id.name().starts_with(p.as_str()))
                .then_some(id),
            MeterFilter::Rename(names) => match names.get(id.name()) {
                Some(to) => Some(id.renamed(to.as_str())),
                None => Some(id),
            },
        }
    }
}

/// Run a filter chain; the first filter that denies wins
pub fn apply(filters: &[MeterFilter], id: &MeterId) -> Option<MeterId> {
    filters
        .iter()
        .try_fold(id.clone(), |id, filter| filter.map(id))
}
