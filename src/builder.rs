//! Flattening of channel groups into tables

use crate::error::Result;
use crate::parser::MdfContainer;
use crate::types::{Column, GroupData, GroupId, Table, Value};
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Seek};

/// Sheet name of the combined table
pub const COMBINED_SHEET_NAME: &str = "All_Channels";

/// First column of the combined table
pub const TIMESTAMP_COLUMN: &str = "timestamps";

/// Sheet name of a per-group table
pub fn group_sheet_name(id: GroupId) -> String {
    format!("Channel Group {id}")
}

/// Result of flattening a container
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome<T> {
    /// Tables were built
    Built(T),
    /// The container holds no groups, or no rows
    Empty,
    /// Reading the samples failed; the message describes why
    Failed(String),
}

impl<T> BuildOutcome<T> {
    fn from_result(result: Result<Option<T>>) -> Self {
        match result {
            Ok(Some(value)) => BuildOutcome::Built(value),
            Ok(None) => BuildOutcome::Empty,
            Err(e) => {
                warn!("Failed to build tables: {}", e);
                BuildOutcome::Failed(e.to_string())
            }
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> BuildOutcome<U> {
        match self {
            BuildOutcome::Built(value) => BuildOutcome::Built(f(value)),
            BuildOutcome::Empty => BuildOutcome::Empty,
            BuildOutcome::Failed(message) => BuildOutcome::Failed(message),
        }
    }
}

/// One table per channel group, keyed by group id
///
/// `progress` is called with (groups read, total groups) after each group.
pub fn build_per_group<R: Read + Seek>(
    container: &mut MdfContainer<R>,
    progress: impl FnMut(usize, usize),
) -> BuildOutcome<BTreeMap<GroupId, Table>> {
    BuildOutcome::from_result(read_all_groups(container, progress).map(|groups| {
        if groups.is_empty() {
            None
        } else {
            Some(groups.iter().map(|g| (g.id, group_table(g))).collect())
        }
    }))
}

/// A single table spanning the channels of every group
///
/// `progress` is called with (groups read, total groups) after each group.
pub fn build_combined<R: Read + Seek>(
    container: &mut MdfContainer<R>,
    progress: impl FnMut(usize, usize),
) -> BuildOutcome<Table> {
    BuildOutcome::from_result(
        read_all_groups(container, progress).map(|groups| combine_groups(&groups)),
    )
}

fn read_all_groups<R: Read + Seek>(
    container: &mut MdfContainer<R>,
    mut progress: impl FnMut(usize, usize),
) -> Result<Vec<GroupData>> {
    let ids = container.group_ids();
    let total = ids.len();
    let mut groups = Vec::with_capacity(total);
    for (done, id) in ids.into_iter().enumerate() {
        let group = container.read_group(id)?;
        debug!(
            "Read group {} '{}': {} channels, {} records",
            id,
            group.name,
            group.channels.len(),
            group.record_count()
        );
        groups.push(group);
        progress(done + 1, total);
    }
    Ok(groups)
}

/// Table of one group: every channel, master included, in channel order
pub fn group_table(group: &GroupData) -> Table {
    let mut table = Table::new(group_sheet_name(group.id));
    table.columns = group
        .channels
        .iter()
        .map(|channel| {
            Column::new(channel.info.name.clone(), channel.samples.clone())
                .with_unit(Some(channel.info.unit.clone()))
        })
        .collect();
    table
}

/// Outer join of all groups on their time axes
///
/// The first column holds the sorted union of every group's time values.
/// Each non-master channel holds, at every timestamp, its latest sample at
/// or before that time; cells before a group's first sample are empty.
/// Returns `None` when there are no groups or no timestamps.
pub fn combine_groups(groups: &[GroupData]) -> Option<Table> {
    if groups.is_empty() {
        return None;
    }

    let axes: Vec<Vec<f64>> = groups.iter().map(|g| g.time_axis()).collect();
    let mut timestamps: Vec<f64> = axes
        .iter()
        .flatten()
        .copied()
        .filter(|t| !t.is_nan())
        .collect();
    timestamps.sort_by(f64::total_cmp);
    timestamps.dedup();
    if timestamps.is_empty() {
        return None;
    }

    let names = combined_names(groups);
    let mut table = Table::new(COMBINED_SHEET_NAME);
    table.columns.push(Column::new(
        TIMESTAMP_COLUMN,
        timestamps.iter().map(|&t| Value::Float(t)).collect(),
    ));

    let mut names = names.into_iter();
    for (group, axis) in groups.iter().zip(&axes) {
        let mut order: Vec<usize> = (0..axis.len()).filter(|&i| !axis[i].is_nan()).collect();
        order.sort_by(|&a, &b| axis[a].total_cmp(&axis[b]));

        for channel in group.channels.iter().filter(|c| !c.info.is_master) {
            let name = names.next().unwrap_or_else(|| channel.info.name.clone());
            let values = hold_samples(&timestamps, axis, &order, &channel.samples);
            table.columns.push(
                Column::new(name, values).with_unit(Some(channel.info.unit.clone())),
            );
        }
    }

    debug!(
        "Combined {} groups into {} rows x {} columns",
        groups.len(),
        table.row_count(),
        table.column_count()
    );
    Some(table)
}

/// Zero-order hold of one channel onto the union time axis
fn hold_samples(timestamps: &[f64], axis: &[f64], order: &[usize], samples: &[Value]) -> Vec<Value> {
    let mut values = Vec::with_capacity(timestamps.len());
    let mut next = 0;
    let mut current: Option<usize> = None;
    for &t in timestamps {
        while next < order.len() && axis[order[next]] <= t {
            current = Some(order[next]);
            next += 1;
        }
        let value = current
            .and_then(|index| samples.get(index))
            .cloned()
            .unwrap_or(Value::Empty);
        values.push(value);
    }
    values
}

/// Column names of the combined table, in output order
///
/// A name used by channels of more than one group, or by the timestamp
/// column, gets the group id as suffix.
fn combined_names(groups: &[GroupData]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    counts.insert(TIMESTAMP_COLUMN, 1);
    for group in groups {
        for channel in group.channels.iter().filter(|c| !c.info.is_master) {
            *counts.entry(channel.info.name.as_str()).or_insert(0) += 1;
        }
    }

    let mut taken: HashMap<String, usize> = HashMap::new();
    taken.insert(TIMESTAMP_COLUMN.to_string(), 1);
    let mut names = Vec::new();
    for group in groups {
        for channel in group.channels.iter().filter(|c| !c.info.is_master) {
            let base = &channel.info.name;
            let mut name = if counts[base.as_str()] > 1 {
                format!("{}_{}", base, group.id)
            } else {
                base.clone()
            };
            // same name twice within one group
            if let Some(seen) = taken.get_mut(&name) {
                *seen += 1;
                name = format!("{}_{}", name, seen);
            }
            taken.entry(name.clone()).or_insert(1);
            names.push(name);
        }
    }
    names
}
