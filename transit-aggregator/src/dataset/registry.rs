//! The catalog of registered datasets and their import order.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use super::descriptor::DatasetDescriptor;
use super::error::RegistryError;
use super::hooks::CredentialSource;

/// Validated, immutable set of dataset descriptors.
///
/// Construction rejects duplicate identifiers, links to unregistered
/// datasets and link cycles, so a registry that exists always has a
/// valid import order.
#[derive(Debug, Clone)]
pub struct DatasetRegistry {
    datasets: Vec<DatasetDescriptor>,
    order: Vec<usize>,
}

impl DatasetRegistry {
    /// Register `datasets`, in declaration order.
    pub fn new(datasets: Vec<DatasetDescriptor>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for dataset in &datasets {
            if !seen.insert(dataset.identifier.as_str()) {
                return Err(RegistryError::DuplicateIdentifier(dataset.identifier.clone()));
            }
        }

        for dataset in &datasets {
            if let Some(linked) = &dataset.linked_dataset
                && !seen.contains(linked.as_str())
            {
                return Err(RegistryError::UnknownLinkedDataset {
                    dataset: dataset.identifier.clone(),
                    linked: linked.clone(),
                });
            }
        }

        let order = import_order(&datasets)?;
        Ok(Self { datasets, order })
    }

    /// Decode a JSON array of descriptors.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let datasets: Vec<DatasetDescriptor> =
            serde_json::from_str(json).map_err(|e| RegistryError::Load {
                message: e.to_string(),
            })?;
        Self::new(datasets)
    }

    /// Load a registry file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| RegistryError::Load {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_json(&json)
    }

    /// Look up a dataset by identifier.
    pub fn get(&self, identifier: &str) -> Option<&DatasetDescriptor> {
        self.datasets.iter().find(|d| d.identifier == identifier)
    }

    /// Datasets in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &DatasetDescriptor> {
        self.datasets.iter()
    }

    /// Datasets ordered so every prerequisite precedes its dependents.
    pub fn import_order(&self) -> impl Iterator<Item = &DatasetDescriptor> {
        self.order.iter().map(|&i| &self.datasets[i])
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Check that every credential any download hook names is available.
    pub fn check_credentials(&self, credentials: &dyn CredentialSource) -> Result<(), RegistryError> {
        for dataset in &self.datasets {
            let Some(hook) = &dataset.download_hook else {
                continue;
            };
            for name in hook.credentials() {
                if credentials.get(name).is_none() {
                    return Err(RegistryError::MissingCredential {
                        dataset: dataset.identifier.clone(),
                        credential: name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Topologically sort by linked dataset, stable on declaration order.
///
/// Roots come out in declaration order; each dependent is queued as soon
/// as its prerequisite is emitted. Anything never emitted sits on a cycle.
fn import_order(datasets: &[DatasetDescriptor]) -> Result<Vec<usize>, RegistryError> {
    let index: HashMap<&str, usize> = datasets
        .iter()
        .enumerate()
        .map(|(i, d)| (d.identifier.as_str(), i))
        .collect();

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); datasets.len()];
    let mut ready = VecDeque::new();
    for (i, dataset) in datasets.iter().enumerate() {
        match dataset.linked_dataset.as_deref().and_then(|l| index.get(l)) {
            Some(&prerequisite) => dependents[prerequisite].push(i),
            None => ready.push_back(i),
        }
    }

    let mut order = Vec::with_capacity(datasets.len());
    while let Some(i) = ready.pop_front() {
        order.push(i);
        ready.extend(dependents[i].iter().copied());
    }

    if order.len() < datasets.len() {
        let emitted: HashSet<usize> = order.iter().copied().collect();
        let start = (0..datasets.len())
            .find(|i| !emitted.contains(i))
            .unwrap_or_default();
        return Err(RegistryError::DependencyCycle {
            path: cycle_path(datasets, &index, start),
        });
    }

    Ok(order)
}

/// Follow links from `start` until an identifier repeats.
fn cycle_path(
    datasets: &[DatasetDescriptor],
    index: &HashMap<&str, usize>,
    start: usize,
) -> Vec<String> {
    let mut path = Vec::new();
    let mut visited = HashSet::new();
    let mut current = Some(start);

    while let Some(i) = current {
        let identifier = datasets[i].identifier.clone();
        path.push(identifier);
        if !visited.insert(i) {
            break;
        }
        current = datasets[i]
            .linked_dataset
            .as_deref()
            .and_then(|l| index.get(l).copied());
    }

    path
}
