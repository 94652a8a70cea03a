//! Sparse Q-table keyed by `(State, Action)`.
//!
//! The table is the single piece of learned state. It is shared behind an
//! `Arc` and guarded by one `RwLock`; every update is one write-lock critical
//! section, so concurrent updates to the same key serialize and none is lost.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use lieferlern_core::{Action, State};
use serde::{Deserialize, Serialize};

use crate::error::{QLearnError, Result};

const LOCK_POISONED: &str = "q-table lock poisoned";

/// Default number of rows returned by [`QTable::export`].
pub const DEFAULT_EXPORT_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Cell {
    q_value: f64,
    update_count: u64,
}

/// One learned `(state, action)` value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QEntry {
    pub state: State,
    pub action: Action,
    pub q_value: f64,
    pub update_count: u64,
}

/// Value of one action in a given state (explain view).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionValue {
    pub action: Action,
    pub q_value: f64,
    pub update_count: u64,
}

fn default_limit() -> usize {
    DEFAULT_EXPORT_LIMIT
}

/// Query for [`QTable::export`]. Empty filter returns the top 100 entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportFilter {
    /// Substring of the state key, e.g. `"Q5_"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Substring of the action name, e.g. `"TIER_1"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Inclusive lower bound on the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_q_value: Option<f64>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for ExportFilter {
    fn default() -> Self {
        Self {
            state: None,
            action: None,
            min_q_value: None,
            limit: DEFAULT_EXPORT_LIMIT,
        }
    }
}

impl ExportFilter {
    fn matches(&self, entry: &QEntry) -> bool {
        if let Some(needle) = &self.state {
            if !entry.state.to_string().contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(needle) = &self.action {
            if !entry.action.as_str().contains(needle.as_str()) {
                return false;
            }
        }
        self.min_q_value.map_or(true, |min| entry.q_value >= min)
    }
}

/// Serialized form of the whole table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QTableSnapshot {
    pub entries: Vec<QEntry>,
}

#[derive(Debug, Default)]
pub struct QTable {
    cells: RwLock<HashMap<(State, Action), Cell>>,
}

/// Value-desc, then state key, then action order. `State`'s derived order
/// matches the order of its string keys.
fn export_order(a: &QEntry, b: &QEntry) -> std::cmp::Ordering {
    b.q_value
        .total_cmp(&a.q_value)
        .then_with(|| a.state.cmp(&b.state))
        .then_with(|| a.action.cmp(&b.action))
}

fn max_value(cells: &HashMap<(State, Action), Cell>, state: &State) -> f64 {
    Action::ALL
        .iter()
        .map(|a| cells.get(&(*state, *a)).map_or(0.0, |c| c.q_value))
        .fold(f64::NEG_INFINITY, f64::max)
}

impl QTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: QTableSnapshot) -> Result<Self> {
        let table = Self::new();
        table.load(snapshot)?;
        Ok(table)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<(State, Action), Cell>>> {
        self.cells
            .read()
            .map_err(|_| QLearnError::Internal(LOCK_POISONED))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<(State, Action), Cell>>> {
        self.cells
            .write()
            .map_err(|_| QLearnError::Internal(LOCK_POISONED))
    }

    /// Current value, `0.0` for a key that was never updated.
    pub fn get(&self, state: &State, action: Action) -> Result<f64> {
        Ok(self
            .read()?
            .get(&(*state, action))
            .map_or(0.0, |c| c.q_value))
    }

    /// Highest-valued action among those observed in `state`.
    ///
    /// Ties go to the action listed first in [`Action::ALL`]; a state with no
    /// observations yields `(EXPLORE, 0.0)`.
    pub fn best_action(&self, state: &State) -> Result<(Action, f64)> {
        let cells = self.read()?;
        let mut best: Option<(Action, f64)> = None;
        for action in Action::ALL {
            if let Some(cell) = cells.get(&(*state, action)) {
                match best {
                    Some((_, value)) if cell.q_value <= value => {}
                    _ => best = Some((action, cell.q_value)),
                }
            }
        }
        Ok(best.unwrap_or((Action::Explore, 0.0)))
    }

    /// Applies one temporal-difference update and returns the new value:
    /// `new = old + α (r + γ max_a' Q(s', a') − old)`.
    ///
    /// The max over the next state runs over all six actions with unseen
    /// keys counting as `0.0`.
    pub fn update(
        &self,
        state: &State,
        action: Action,
        reward: f64,
        learning_rate: f64,
        discount_factor: f64,
        next_state: &State,
    ) -> Result<f64> {
        if !reward.is_finite() {
            return Err(QLearnError::NonFiniteReward(reward));
        }
        let mut cells = self.write()?;
        let next_max = max_value(&cells, next_state);
        let cell = cells.entry((*state, action)).or_default();
        let old = cell.q_value;
        let new = old + learning_rate * (reward + discount_factor * next_max - old);
        cell.q_value = new;
        cell.update_count += 1;
        Ok(new)
    }

    /// All six actions for `state`, value-desc then action order.
    pub fn entries_for(&self, state: &State) -> Result<Vec<ActionValue>> {
        let cells = self.read()?;
        let mut values: Vec<ActionValue> = Action::ALL
            .iter()
            .map(|action| {
                let cell = cells.get(&(*state, *action)).copied().unwrap_or_default();
                ActionValue {
                    action: *action,
                    q_value: cell.q_value,
                    update_count: cell.update_count,
                }
            })
            .collect();
        values.sort_by(|a, b| {
            b.q_value
                .total_cmp(&a.q_value)
                .then_with(|| a.action.cmp(&b.action))
        });
        Ok(values)
    }

    pub fn export(&self, filter: &ExportFilter) -> Result<Vec<QEntry>> {
        let mut entries: Vec<QEntry> = self
            .all_entries()?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();
        entries.sort_by(export_order);
        entries.truncate(filter.limit);
        Ok(entries)
    }

    fn all_entries(&self) -> Result<Vec<QEntry>> {
        Ok(self
            .read()?
            .iter()
            .map(|((state, action), cell)| QEntry {
                state: *state,
                action: *action,
                q_value: cell.q_value,
                update_count: cell.update_count,
            })
            .collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    /// Every entry in export order.
    pub fn snapshot(&self) -> Result<QTableSnapshot> {
        let mut entries = self.all_entries()?;
        entries.sort_by(export_order);
        Ok(QTableSnapshot { entries })
    }

    /// Replaces the table contents with `snapshot`.
    pub fn load(&self, snapshot: QTableSnapshot) -> Result<()> {
        let mut fresh = HashMap::with_capacity(snapshot.entries.len());
        for entry in snapshot.entries {
            if !entry.q_value.is_finite() {
                return Err(QLearnError::config(
                    "q_value",
                    format!("non-finite value for {} / {}", entry.state, entry.action),
                ));
            }
            fresh.insert(
                (entry.state, entry.action),
                Cell {
                    q_value: entry.q_value,
                    update_count: entry.update_count,
                },
            );
        }
        *self.write()? = fresh;
        Ok(())
    }
}
