//! In-memory tabular results.

use super::{Value, ValueKind};
use serde::Serialize;

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataColumn {
    /// Column name as reported by the driver.
    pub name: String,
    /// Storage class of the first non-null value seen in the column.
    pub kind: ValueKind,
}

impl DataColumn {
    /// Creates an untyped column.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ValueKind::Null,
        }
    }
}

/// One materialized row.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct DataRow {
    values: Vec<Value>,
}

impl DataRow {
    /// Creates a row from its values in column order.
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Returns the value at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns all values in column order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consumes the row, returning its values.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Returns the number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when the row has no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A fully materialized result set.
///
/// Filling appends rows. Repeated names within one result set are made
/// unique with a numeric suffix. Columns are then matched by name
/// (case-insensitive); columns the table does not know yet are appended and
/// earlier rows are padded with `NULL`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DataTable {
    columns: Vec<DataColumn>,
    rows: Vec<DataRow>,
}

impl DataTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the columns.
    #[must_use]
    pub fn columns(&self) -> &[DataColumn] {
        &self.columns
    }

    /// Returns the column names in order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Returns the index of the column named `name` (case-insensitive).
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Returns the rows.
    #[must_use]
    pub fn rows(&self) -> &[DataRow] {
        &self.rows
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the cell at `row` in the column named `column`.
    #[must_use]
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)
    }

    /// Removes all rows and columns.
    pub fn clear(&mut self) {
        self.columns.clear();
        self.rows.clear();
    }

    /// Registers the columns of an incoming result set and returns, for each
    /// incoming column, the table column it lands in.
    ///
    /// A name repeated within `names` gets a numeric suffix (`id`, `id1`,
    /// `id2`, ...), so every incoming column keeps its own slot. The resulting
    /// names are then matched against the columns the table already had;
    /// unmatched names are appended.
    pub fn bind_columns<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<usize> {
        let existing = self.columns.len();
        let mut mapping = Vec::with_capacity(names.len());
        for name in unique_names(names) {
            let index = if let Some(index) = self.columns[..existing]
                .iter()
                .position(|c| c.name.eq_ignore_ascii_case(&name))
            {
                index
            } else {
                self.columns.push(DataColumn::new(name));
                for row in &mut self.rows {
                    row.values.push(Value::Null);
                }
                self.columns.len() - 1
            };
            mapping.push(index);
        }
        mapping
    }

    /// Appends a row whose values are laid out according to `mapping`, as
    /// returned by [`bind_columns`](Self::bind_columns).
    pub fn push_mapped(&mut self, mapping: &[usize], values: Vec<Value>) {
        let mut cells = vec![Value::Null; self.columns.len()];
        for (value, &index) in values.into_iter().zip(mapping) {
            let column = &mut self.columns[index];
            if column.kind == ValueKind::Null {
                column.kind = value.kind();
            }
            cells[index] = value;
        }
        self.rows.push(DataRow::new(cells));
    }

    /// Appends a row in table column order.
    pub fn push_row(&mut self, values: Vec<Value>) {
        let mapping: Vec<usize> = (0..values.len().min(self.columns.len())).collect();
        self.push_mapped(&mapping, values);
    }
}

/// Renames repeated names (case-insensitive) by appending the smallest
/// free numeric suffix.
fn unique_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let base = name.as_ref();
        let taken = |candidate: &str, seen: &[String]| {
            seen.iter().any(|s| s.eq_ignore_ascii_case(candidate))
        };
        let mut candidate = base.to_string();
        let mut suffix = 1_usize;
        while taken(&candidate, &seen) {
            candidate = format!("{base}{suffix}");
            suffix += 1;
        }
        seen.push(candidate);
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataTable {
        let mut table = DataTable::new();
        let mapping = table.bind_columns(&["QDKey", "QDValue"]);
        table.push_mapped(&mapping, vec!["DefaultDomain".into(), "endevx".into()]);
        table.push_mapped(&mapping, vec!["Timeout".into(), Value::Null]);
        table
    }

    #[test]
    fn test_bind_and_push() {
        let table = sample();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_names(), vec!["QDKey", "QDValue"]);
        assert_eq!(table.columns()[1].kind, ValueKind::Text);
        assert_eq!(
            table.value(0, "qdvalue"),
            Some(&Value::Text("endevx".to_string()))
        );
    }

    #[test]
    fn test_kind_from_first_non_null() {
        let mut table = DataTable::new();
        let mapping = table.bind_columns(&["n"]);
        table.push_mapped(&mapping, vec![Value::Null]);
        assert_eq!(table.columns()[0].kind, ValueKind::Null);
        table.push_mapped(&mapping, vec![Value::Integer(3)]);
        assert_eq!(table.columns()[0].kind, ValueKind::Integer);
    }

    #[test]
    fn test_new_columns_pad_existing_rows() {
        let mut table = sample();
        let mapping = table.bind_columns(&["QDValue", "Extra"]);
        assert_eq!(mapping, vec![1, 2]);
        table.push_mapped(&mapping, vec!["v".into(), 1.into()]);
        assert_eq!(table.column_count(), 3);
        assert_eq!(table.rows()[0].len(), 3);
        assert!(table.rows()[0].get(2).is_some_and(Value::is_null));
        assert!(table.rows()[2].get(0).is_some_and(Value::is_null));
    }

    #[test]
    fn test_repeated_names_get_suffixes() {
        let mut table = DataTable::new();
        let mapping = table.bind_columns(&["id", "ID", "name", "id"]);
        assert_eq!(mapping, vec![0, 1, 2, 3]);
        assert_eq!(table.column_names(), vec!["id", "ID1", "name", "id2"]);

        table.push_mapped(&mapping, vec![1.into(), 7.into(), "a".into(), 9.into()]);
        assert_eq!(table.value(0, "id"), Some(&Value::Integer(1)));
        assert_eq!(table.value(0, "id1"), Some(&Value::Integer(7)));
        assert_eq!(table.value(0, "id2"), Some(&Value::Integer(9)));
    }

    #[test]
    fn test_suffix_skips_names_already_in_result() {
        let mut table = DataTable::new();
        table.bind_columns(&["id", "id1", "id"]);
        assert_eq!(table.column_names(), vec!["id", "id1", "id2"]);
    }

    #[test]
    fn test_refill_with_repeated_names_reuses_columns() {
        let mut table = DataTable::new();
        let first = table.bind_columns(&["id", "id"]);
        table.push_mapped(&first, vec![1.into(), 2.into()]);
        let second = table.bind_columns(&["id", "id"]);
        assert_eq!(second, first);
        table.push_mapped(&second, vec![3.into(), 4.into()]);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.value(1, "id1"), Some(&Value::Integer(4)));
    }

    #[test]
    fn test_clear() {
        let mut table = sample();
        table.clear();
        assert_eq!(table, DataTable::new());
    }

    #[test]
    fn test_serialize_rows_as_arrays() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["rows"][0][1], "endevx");
        assert_eq!(json["columns"][0]["name"], "QDKey");
    }
}
