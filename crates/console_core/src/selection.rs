//! Per-column live, staged and highlighted rows.

use std::collections::BTreeMap;

use shared::{
    domain::{Column, LayerMap, LayerTarget, RowIndex},
    error::ConsoleError,
    protocol::LayerWrite,
};
use tracing::{debug, warn};

use crate::mode::{transition, Mode, ModeAction};

pub type RowMap = BTreeMap<Column, RowIndex>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedChoice {
    pub row: RowIndex,
    pub colour: String,
}

#[derive(Debug, Clone, Default)]
struct StagingSession {
    snapshot: RowMap,
    staged: BTreeMap<Column, StagedChoice>,
}

#[derive(Debug, Clone, Default)]
enum Phase {
    #[default]
    Live,
    Staging(StagingSession),
}

#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    layers: LayerMap,
    live: RowMap,
    selected: RowMap,
    phase: Phase,
}

impl SelectionState {
    pub fn new(layers: LayerMap) -> Self {
        Self {
            layers,
            ..Self::default()
        }
    }

    pub fn layers(&self) -> &LayerMap {
        &self.layers
    }

    pub fn mode(&self) -> Mode {
        match self.phase {
            Phase::Live => Mode::Live,
            Phase::Staging(_) => Mode::Staging,
        }
    }

    pub fn live(&self) -> &RowMap {
        &self.live
    }

    pub fn selected(&self) -> &RowMap {
        &self.selected
    }

    pub fn staged(&self) -> impl Iterator<Item = (&Column, &StagedChoice)> {
        let staged = match &self.phase {
            Phase::Staging(session) => Some(session.staged.iter()),
            Phase::Live => None,
        };
        staged.into_iter().flatten()
    }

    pub fn standby(&self) -> RowMap {
        self.staged()
            .map(|(column, choice)| (column.clone(), choice.row))
            .collect()
    }

    pub fn queued_deltas(&self) -> BTreeMap<Column, String> {
        self.staged()
            .map(|(column, choice)| (column.clone(), choice.colour.clone()))
            .collect()
    }

    /// Records a press of `(column, row)`. An aggregate column applies the
    /// same choice to every concrete column. Returns the writes to dispatch
    /// now: one per affected column while live, none while staging.
    pub fn select_column(
        &mut self,
        column: &Column,
        row: RowIndex,
        colour: &str,
    ) -> Result<Vec<LayerWrite>, ConsoleError> {
        let targets: Vec<(Column, LayerTarget)> = if self.layers.is_aggregate(column) {
            self.layers
                .concrete()
                .map(|(column, target)| (column.clone(), target.clone()))
                .collect()
        } else {
            let target = self
                .layers
                .target(column)
                .ok_or_else(|| ConsoleError::UnknownColumn(column.clone()))?;
            vec![(column.clone(), target.clone())]
        };

        let mut writes = Vec::new();
        for (column, target) in targets {
            match &mut self.phase {
                Phase::Live => {
                    self.live.insert(column.clone(), row);
                    self.selected.insert(column.clone(), row);
                    writes.push(LayerWrite {
                        column,
                        target,
                        row,
                        colour: colour.to_string(),
                    });
                }
                Phase::Staging(session) => {
                    let pressed_again = session
                        .staged
                        .get(&column)
                        .is_some_and(|choice| choice.row == row);
                    if pressed_again {
                        session.staged.remove(&column);
                        match self.live.get(&column) {
                            Some(live_row) => self.selected.insert(column.clone(), *live_row),
                            None => self.selected.remove(&column),
                        };
                        debug!(column = %column, row = row.0, "standby selection toggled off");
                    } else {
                        session.staged.insert(
                            column.clone(),
                            StagedChoice {
                                row,
                                colour: colour.to_string(),
                            },
                        );
                        self.selected.insert(column.clone(), row);
                        debug!(column = %column, row = row.0, colour, "standby selection queued");
                    }
                }
            }
        }
        Ok(writes)
    }

    pub fn enter_staging(&mut self) -> Result<(), ConsoleError> {
        transition(self.mode(), ModeAction::EnterStaging)?;
        self.phase = Phase::Staging(StagingSession {
            snapshot: self.live.clone(),
            staged: BTreeMap::new(),
        });
        Ok(())
    }

    /// Promotes every staged choice to live and returns one write per
    /// staged column.
    pub fn commit(&mut self) -> Result<Vec<LayerWrite>, ConsoleError> {
        transition(self.mode(), ModeAction::Commit)?;
        let Phase::Staging(session) = std::mem::take(&mut self.phase) else {
            return Ok(Vec::new());
        };

        let mut writes = Vec::with_capacity(session.staged.len());
        for (column, choice) in session.staged {
            let Some(target) = self.layers.target(&column).cloned() else {
                warn!(column = %column, "staged column vanished from layer map; skipping");
                continue;
            };
            self.live.insert(column.clone(), choice.row);
            writes.push(LayerWrite {
                column,
                target,
                row: choice.row,
                colour: choice.colour,
            });
        }
        Ok(writes)
    }

    /// Drops every staged choice and restores the highlight to what was
    /// live when staging began.
    pub fn cancel(&mut self) -> Result<usize, ConsoleError> {
        transition(self.mode(), ModeAction::Cancel)?;
        let Phase::Staging(session) = std::mem::take(&mut self.phase) else {
            return Ok(0);
        };
        self.selected = session.snapshot;
        Ok(session.staged.len())
    }

    /// Clears everything and returns to live with a new layer map.
    pub fn reset(&mut self, layers: LayerMap) {
        *self = Self::new(layers);
    }
}

#[cfg(test)]
#[path = "tests/selection_tests.rs"]
mod tests;
