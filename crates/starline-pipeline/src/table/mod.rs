//! In-memory tabular data
//!
//! A [`Table`] is an ordered list of rows over named columns. Shaping rules
//! are written as pure functions over tables, so every operation here returns
//! a new table (or consumes `self`) instead of mutating shared data.

mod value;

pub use value::{ColumnType, Value};

use crate::error::{PipelineError, PipelineResult};
use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Empty table with the given columns
    pub fn new<S: Into<String>>(name: impl Into<String>, columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Table with rows; every row must match the column count
    pub fn from_rows<S: Into<String>>(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> PipelineResult<Self> {
        let mut table = Self::new(name, columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn require_column(&self, column: &str) -> PipelineResult<usize> {
        self.column_index(column)
            .ok_or_else(|| PipelineError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> PipelineResult<()> {
        if row.len() != self.columns.len() {
            return Err(PipelineError::invalid_value(
                &self.name,
                "*",
                format!(
                    "row has {} values but table has {} columns",
                    row.len(),
                    self.columns.len()
                ),
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Project onto `columns`, in the given order
    pub fn select(&self, columns: &[&str]) -> PipelineResult<Table> {
        let indices = columns
            .iter()
            .map(|c| self.require_column(c))
            .collect::<PipelineResult<Vec<_>>>()?;

        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Ok(Table {
            name: self.name.clone(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        })
    }

    /// Rename columns; pairs naming absent columns are ignored
    pub fn rename(mut self, pairs: &[(&str, &str)]) -> Table {
        for column in self.columns.iter_mut() {
            if let Some((_, to)) = pairs.iter().find(|(from, _)| *from == column.as_str()) {
                *column = to.to_string();
            }
        }
        self
    }

    pub fn drop_columns(mut self, columns: &[&str]) -> Table {
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&i| !columns.contains(&self.columns[i].as_str()))
            .collect();

        self.columns = keep.iter().map(|&i| self.columns[i].clone()).collect();
        self.rows = self
            .rows
            .into_iter()
            .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
            .collect();
        self
    }

    /// Append a column computed from each existing row
    pub fn add_column<F>(mut self, column: impl Into<String>, mut f: F) -> PipelineResult<Table>
    where
        F: FnMut(&[Value]) -> PipelineResult<Value>,
    {
        for row in self.rows.iter_mut() {
            let value = f(row)?;
            row.push(value);
        }
        self.columns.push(column.into());
        Ok(self)
    }

    /// Left join `right` onto `self`
    ///
    /// Every left row is kept. A left row with several matches is repeated
    /// once per match, a left row with none gets nulls for `right_columns`.
    /// Null keys never match.
    pub fn left_join(
        &self,
        right: &Table,
        left_key: &str,
        right_key: &str,
        right_columns: &[&str],
    ) -> PipelineResult<Table> {
        let left_idx = self.require_column(left_key)?;
        let right_idx = right.require_column(right_key)?;
        let picked = right_columns
            .iter()
            .map(|c| right.require_column(c))
            .collect::<PipelineResult<Vec<_>>>()?;

        let mut index: HashMap<&Value, Vec<usize>> = HashMap::new();
        for (i, row) in right.rows.iter().enumerate() {
            let key = &row[right_idx];
            if !key.is_null() {
                index.entry(key).or_default().push(i);
            }
        }

        let mut columns = self.columns.clone();
        columns.extend(right_columns.iter().map(|c| c.to_string()));

        let mut rows = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            match index.get(&row[left_idx]) {
                Some(matches) => {
                    for &m in matches {
                        let mut joined = row.clone();
                        joined.extend(picked.iter().map(|&i| right.rows[m][i].clone()));
                        rows.push(joined);
                    }
                }
                None => {
                    let mut joined = row.clone();
                    joined.extend(std::iter::repeat(Value::Null).take(picked.len()));
                    rows.push(joined);
                }
            }
        }

        Ok(Table {
            name: self.name.clone(),
            columns,
            rows,
        })
    }

    /// Remove fully duplicated rows, keeping the first occurrence
    pub fn drop_duplicates(mut self) -> Table {
        let mut seen = HashSet::with_capacity(self.rows.len());
        self.rows.retain(|row| seen.insert(row.clone()));
        self
    }

    /// Greatest timestamp in `column`, ignoring nulls
    pub fn max_timestamp(&self, column: &str) -> PipelineResult<Option<NaiveDateTime>> {
        let idx = self.require_column(column)?;
        let mut max: Option<NaiveDateTime> = None;
        for row in &self.rows {
            let value = &row[idx];
            if value.is_null() {
                continue;
            }
            let ts = value.to_timestamp().ok_or_else(|| {
                PipelineError::invalid_value(&self.name, column, format!("not a timestamp: {}", value))
            })?;
            max = Some(max.map_or(ts, |m| m.max(ts)));
        }
        Ok(max)
    }

    /// Append `other`'s rows, matching columns by name
    pub fn concat(mut self, other: &Table) -> PipelineResult<Table> {
        if self.columns.is_empty() && self.rows.is_empty() {
            self.columns = other.columns.clone();
        }
        let mapping = self
            .columns
            .iter()
            .map(|c| other.require_column(c))
            .collect::<PipelineResult<Vec<_>>>()?;

        self.rows.extend(
            other
                .rows
                .iter()
                .map(|row| mapping.iter().map(|&i| row[i].clone()).collect::<Vec<_>>()),
        );
        Ok(self)
    }

    /// Keep the last row seen for each value of `key`
    ///
    /// Rows are assumed to be in arrival order, so a later row is a newer
    /// version of the same record. The surviving row takes the position of
    /// the key's first appearance. Rows with a null key are kept as-is.
    pub fn latest_by_key(self, key: &str) -> PipelineResult<Table> {
        let idx = self.require_column(key)?;
        let mut slots: HashMap<Value, usize> = HashMap::new();
        let mut rows: Vec<Vec<Value>> = Vec::with_capacity(self.rows.len());

        for row in self.rows {
            let k = row[idx].clone();
            if k.is_null() {
                rows.push(row);
                continue;
            }
            match slots.get(&k) {
                Some(&slot) => rows[slot] = row,
                None => {
                    slots.insert(k, rows.len());
                    rows.push(row);
                }
            }
        }

        Ok(Table {
            name: self.name,
            columns: self.columns,
            rows,
        })
    }
}
