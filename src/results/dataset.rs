use super::result_set::ResultSet;

/// Several tables produced by one call, in statement order.
#[derive(Debug, Clone, Default)]
pub struct DataSet {
    pub tables: Vec<ResultSet>,
}

impl DataSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, table: ResultSet) {
        self.tables.push(table);
    }

    /// The first table, if any statement returned rows
    #[must_use]
    pub fn first_table(&self) -> Option<&ResultSet> {
        self.tables.first()
    }

    #[must_use]
    pub fn table(&self, index: usize) -> Option<&ResultSet> {
        self.tables.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn into_tables(self) -> Vec<ResultSet> {
        self.tables
    }
}
