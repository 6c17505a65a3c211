//! The mapping cache.
//!
//! One [`Mapping`] exists per source parent whose children have been looked
//! at through the proxy. Mappings live in a generational arena; proxy
//! indexes carry the arena key of the mapping that owns them in their
//! internal id, so a torn-down mapping turns every index into it stale
//! instead of dangling.

use std::collections::HashMap;

use slotmap::{Key, KeyData, SlotMap, new_key_type};

use crate::model::{ModelIndex, Orientation};

new_key_type! {
    /// Arena key of a [`Mapping`].
    pub(crate) struct MappingId;
}

impl MappingId {
    /// Encodes the key as a proxy index internal id.
    pub(crate) fn to_internal_id(self) -> u64 {
        self.data().as_ffi()
    }

    /// Decodes a proxy index internal id.
    pub(crate) fn from_internal_id(id: u64) -> Self {
        KeyData::from_ffi(id).into()
    }
}

/// Translation tables for the children of one source parent.
#[derive(Debug, Clone)]
pub(crate) struct Mapping {
    /// Accepted source rows in proxy order.
    pub source_rows: Vec<usize>,
    /// Accepted source columns in proxy order.
    pub source_columns: Vec<usize>,
    /// Proxy row of each source row, `None` when filtered out.
    pub proxy_rows: Vec<Option<usize>>,
    /// Proxy column of each source column, `None` when filtered out.
    pub proxy_columns: Vec<Option<usize>>,
    /// Source parents below this one that have a mapping of their own.
    pub mapped_children: Vec<ModelIndex>,
    /// The source parent this mapping belongs to.
    pub source_parent: ModelIndex,
}

impl Mapping {
    pub fn new(source_parent: ModelIndex) -> Self {
        Self {
            source_rows: Vec::new(),
            source_columns: Vec::new(),
            proxy_rows: Vec::new(),
            proxy_columns: Vec::new(),
            mapped_children: Vec::new(),
            source_parent,
        }
    }

    /// Returns `(source_to_proxy, proxy_to_source)` for one axis.
    pub fn axis(&self, orientation: Orientation) -> (&[Option<usize>], &[usize]) {
        match orientation {
            Orientation::Vertical => (&self.proxy_rows, &self.source_rows),
            Orientation::Horizontal => (&self.proxy_columns, &self.source_columns),
        }
    }

    /// Mutable `(source_to_proxy, proxy_to_source)` for one axis.
    pub fn axis_mut(
        &mut self,
        orientation: Orientation,
    ) -> (&mut Vec<Option<usize>>, &mut Vec<usize>) {
        match orientation {
            Orientation::Vertical => (&mut self.proxy_rows, &mut self.source_rows),
            Orientation::Horizontal => (&mut self.proxy_columns, &mut self.source_columns),
        }
    }

    /// Checks that both axes are inverse permutations with holes.
    pub fn is_consistent(&self) -> bool {
        fn axis_ok(source_to_proxy: &[Option<usize>], proxy_to_source: &[usize]) -> bool {
            let mapped = source_to_proxy.iter().filter(|p| p.is_some()).count();
            mapped == proxy_to_source.len()
                && source_to_proxy.iter().enumerate().all(|(source, proxy)| match proxy {
                    Some(proxy) => proxy_to_source.get(*proxy) == Some(&source),
                    None => true,
                })
        }
        axis_ok(&self.proxy_rows, &self.source_rows)
            && axis_ok(&self.proxy_columns, &self.source_columns)
    }
}

/// A copy of one materialised mapping, for inspection and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingSnapshot {
    /// The source parent the mapping belongs to.
    pub source_parent: ModelIndex,
    /// Accepted source rows in proxy order.
    pub source_rows: Vec<usize>,
    /// Accepted source columns in proxy order.
    pub source_columns: Vec<usize>,
    /// Proxy row of each source row.
    pub proxy_rows: Vec<Option<usize>>,
    /// Proxy column of each source column.
    pub proxy_columns: Vec<Option<usize>>,
    /// Source parents below this one with their own mapping, sorted.
    pub mapped_children: Vec<ModelIndex>,
}

impl MappingSnapshot {
    /// Returns `true` if row and column tables are inverse permutations.
    pub fn is_consistent(&self) -> bool {
        let mapping = Mapping {
            source_rows: self.source_rows.clone(),
            source_columns: self.source_columns.clone(),
            proxy_rows: self.proxy_rows.clone(),
            proxy_columns: self.proxy_columns.clone(),
            mapped_children: Vec::new(),
            source_parent: self.source_parent.clone(),
        };
        mapping.is_consistent()
    }
}

impl From<&Mapping> for MappingSnapshot {
    fn from(mapping: &Mapping) -> Self {
        let mut mapped_children = mapping.mapped_children.clone();
        mapped_children.sort();
        Self {
            source_parent: mapping.source_parent.clone(),
            source_rows: mapping.source_rows.clone(),
            source_columns: mapping.source_columns.clone(),
            proxy_rows: mapping.proxy_rows.clone(),
            proxy_columns: mapping.proxy_columns.clone(),
            mapped_children,
        }
    }
}

/// Arena of mappings, keyed by source parent.
#[derive(Debug, Default)]
pub(crate) struct MappingCache {
    arena: SlotMap<MappingId, Mapping>,
    by_parent: HashMap<ModelIndex, MappingId>,
}

impl MappingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn find(&self, source_parent: &ModelIndex) -> Option<MappingId> {
        self.by_parent.get(source_parent).copied()
    }

    pub fn get(&self, id: MappingId) -> Option<&Mapping> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: MappingId) -> Option<&mut Mapping> {
        self.arena.get_mut(id)
    }

    pub fn ids(&self) -> Vec<MappingId> {
        self.arena.keys().collect()
    }

    /// Stores a freshly built mapping under its source parent.
    pub fn insert(&mut self, mapping: Mapping) -> MappingId {
        let key = mapping.source_parent.clone();
        let id = self.arena.insert(mapping);
        if let Some(previous) = self.by_parent.insert(key, id) {
            self.arena.remove(previous);
        }
        tracing::trace!(
            target: sieve_core::logging::targets::MAPPING,
            mappings = self.arena.len(),
            "mapping created"
        );
        id
    }

    /// Unlinks the mapping for `source_parent` from its key, keeping its id.
    ///
    /// Pair with [`attach`](Self::attach) to re-key a mapping whose parent
    /// moved.
    pub fn detach(&mut self, source_parent: &ModelIndex) -> Option<MappingId> {
        self.by_parent.remove(source_parent)
    }

    /// Links a detached mapping under its new source parent.
    pub fn attach(&mut self, source_parent: ModelIndex, id: MappingId) {
        if let Some(mapping) = self.arena.get_mut(id) {
            mapping.source_parent = source_parent.clone();
            self.by_parent.insert(source_parent, id);
        }
    }

    /// Destroys the mapping for `source_parent` and every mapping below it.
    ///
    /// The parent mapping's `mapped_children` list is left alone; callers
    /// that keep the parent fix that list themselves.
    pub fn remove_subtree(&mut self, source_parent: &ModelIndex) {
        let Some(id) = self.by_parent.remove(source_parent) else {
            return;
        };
        self.remove_by_id(id);
    }

    /// Destroys an already-detached mapping and everything below it.
    pub fn remove_by_id(&mut self, id: MappingId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let Some(mapping) = self.arena.remove(id) else {
                continue;
            };
            for child in &mapping.mapped_children {
                if let Some(child_id) = self.by_parent.remove(child) {
                    pending.push(child_id);
                }
            }
        }
        tracing::trace!(
            target: sieve_core::logging::targets::MAPPING,
            mappings = self.arena.len(),
            "mapping subtree destroyed"
        );
    }

    /// Destroys the subtree at `source_parent` and unlinks it from its
    /// parent's `mapped_children`.
    pub fn remove(&mut self, source_parent: &ModelIndex) {
        for mapping in self.arena.values_mut() {
            mapping.mapped_children.retain(|child| child != source_parent);
        }
        self.remove_subtree(source_parent);
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.by_parent.clear();
    }

    /// Snapshots every mapping, ordered by source parent.
    pub fn snapshot(&self) -> Vec<MappingSnapshot> {
        let mut snapshots: Vec<MappingSnapshot> =
            self.arena.values().map(MappingSnapshot::from).collect();
        snapshots.sort_by(|a, b| {
            a.source_parent
                .depth()
                .cmp(&b.source_parent.depth())
                .then_with(|| a.source_parent.cmp(&b.source_parent))
        });
        snapshots
    }
}
