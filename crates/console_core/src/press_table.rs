use std::collections::HashMap;

use shared::{
    domain::{ColourCatalog, Column, LayerMap, RowIndex},
    error::ConsoleError,
};

/// Grid lookup from a pressed cell to the colour it carries, built once per
/// catalog so a rebuilt grid never sees stale captures.
#[derive(Debug, Clone, Default)]
pub struct PressTable {
    cells: HashMap<(Column, RowIndex), String>,
    columns: Vec<Column>,
    rows: usize,
}

impl PressTable {
    pub fn build(layers: &LayerMap, catalog: &ColourCatalog) -> Self {
        let mut cells = HashMap::with_capacity(layers.len() * catalog.len());
        for column in layers.columns() {
            for (row, entry) in catalog.rows() {
                cells.insert((column.clone(), row), entry.hex.clone());
            }
        }
        Self {
            cells,
            columns: layers.columns().cloned().collect(),
            rows: catalog.len(),
        }
    }

    pub fn colour(&self, column: &Column, row: RowIndex) -> Result<&str, ConsoleError> {
        if let Some(hex) = self.cells.get(&(column.clone(), row)) {
            return Ok(hex.as_str());
        }
        if !self.columns.contains(column) {
            return Err(ConsoleError::UnknownColumn(column.clone()));
        }
        Err(ConsoleError::UnknownRow {
            row,
            rows: self.rows,
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
}
