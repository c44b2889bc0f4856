use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::trace;

use crate::client::Counter;
use crate::model::filter::{CompiledFilter, FilterCriteria};
use crate::model::sort::{SortCriteria, sort_counters};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("counter id {0:?} is not unique")]
    DuplicateId(String),
    #[error("unknown counter id {0:?}")]
    UnknownId(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    RowCountChanged { previous: usize, current: usize },
    /// Visible row indices whose content changed.
    RowsChanged { rows: Vec<usize> },
}

/// In memory collection of counters with the filtered and sorted view on top.
///
/// `items` are kept in sort order, `rows` are the indices into `items` that
/// pass the filter. Filtering a sorted list keeps its order, so `rows` always
/// equals sort(filter(items)).
#[derive(Default)]
pub struct DataStore {
    items: Vec<Counter>,
    id_index: HashMap<String, usize>,
    rows: Vec<usize>,
    filter: FilterCriteria,
    sort: SortCriteria,
    events: Vec<StoreEvent>,
}

impl DataStore {
    pub fn new(filter: FilterCriteria, sort: SortCriteria) -> Self {
        Self {
            filter,
            sort,
            ..Default::default()
        }
    }

    pub fn set_items(&mut self, items: Vec<Counter>) -> Result<(), StoreError> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in items.iter() {
            if !seen.insert(item.id.as_str()) {
                return Err(StoreError::DuplicateId(item.id.clone()));
            }
        }
        trace!("Setting {} counters", items.len());
        let previous = self.visible_ids();
        self.items = items;
        sort_counters(&mut self.items, self.sort);
        self.rebuild_index();
        self.refresh_with(previous, &HashSet::new());
        Ok(())
    }

    pub fn set_filter_args(&mut self, criteria: FilterCriteria) {
        self.filter = criteria;
    }

    /// Re-applies the filter criteria to all items.
    pub fn refresh(&mut self) {
        let previous = self.visible_ids();
        self.refresh_with(previous, &HashSet::new());
    }

    pub fn sort(&mut self, criteria: SortCriteria) {
        trace!("Sorting by {} (asc: {})", criteria.column, criteria.ascending);
        self.sort = criteria;
        self.re_sort();
    }

    /// Re-applies the current sort criteria.
    pub fn re_sort(&mut self) {
        let previous = self.visible_ids();
        sort_counters(&mut self.items, self.sort);
        self.rebuild_index();
        self.refresh_with(previous, &HashSet::new());
    }

    pub fn update_item(&mut self, id: &str, item: Counter) -> Result<(), StoreError> {
        let Some(&idx) = self.id_index.get(id) else {
            return Err(StoreError::UnknownId(id.to_string()));
        };
        if item.id != id && self.id_index.contains_key(&item.id) {
            return Err(StoreError::DuplicateId(item.id));
        }
        let previous = self.visible_ids();
        let new_id = item.id.clone();
        self.items[idx] = item;
        sort_counters(&mut self.items, self.sort);
        self.rebuild_index();

        let mut updated = HashSet::new();
        updated.insert(new_id);
        self.refresh_with(previous, &updated);
        Ok(())
    }

    fn rebuild_index(&mut self) {
        self.id_index = self
            .items
            .iter()
            .enumerate()
            .map(|(idx, item)| (item.id.clone(), idx))
            .collect();
    }

    // Recomputes the visible rows and queues the notifications describing the change.
    // `previous` holds the ids visible before the mutation, `updated` ids count as
    // changed wherever they land.
    fn refresh_with(&mut self, previous: Vec<String>, updated: &HashSet<String>) {
        let filter = CompiledFilter::compile(&self.filter);
        self.rows = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| filter.matches(item))
            .map(|(idx, _)| idx)
            .collect();

        let changed: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(pos, idx)| {
                let id = &self.items[**idx].id;
                updated.contains(id) || previous.get(*pos) != Some(id)
            })
            .map(|(pos, _)| pos)
            .collect();

        if previous.len() != self.rows.len() {
            self.events.push(StoreEvent::RowCountChanged {
                previous: previous.len(),
                current: self.rows.len(),
            });
        }
        if !changed.is_empty() {
            self.events.push(StoreEvent::RowsChanged { rows: changed });
        }
    }

    fn visible_ids(&self) -> Vec<String> {
        self.visible().map(|item| item.id.clone()).collect()
    }

    pub fn take_events(&mut self) -> Vec<StoreEvent> {
        std::mem::take(&mut self.events)
    }

    /// Number of visible rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn item(&self, row: usize) -> Option<&Counter> {
        self.rows.get(row).and_then(|&idx| self.items.get(idx))
    }

    pub fn item_by_id(&self, id: &str) -> Option<&Counter> {
        self.id_index.get(id).and_then(|&idx| self.items.get(idx))
    }

    pub fn row_of(&self, id: &str) -> Option<usize> {
        let idx = self.id_index.get(id)?;
        self.rows.iter().position(|r| r == idx)
    }

    pub fn visible(&self) -> impl Iterator<Item = &Counter> {
        self.rows.iter().filter_map(|&idx| self.items.get(idx))
    }

    pub fn items(&self) -> &[Counter] {
        &self.items
    }

    pub fn filter_criteria(&self) -> &FilterCriteria {
        &self.filter
    }

    pub fn sort_criteria(&self) -> SortCriteria {
        self.sort
    }
}
