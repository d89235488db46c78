//! Command surface driven by the grid: press a cell, stage, go, cancel.

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use engine_client::{DispatchReport, WriteSubmitter};
use serde::Serialize;
use serde_json::Value;
use shared::{
    domain::{ColourCatalog, ColourEntry, Column, LayerMap, RowIndex},
    error::ConsoleError,
    protocol::Endpoint,
};
use tracing::{debug, info, warn};

use crate::{
    config_store::{ConfigKey, ConfigStore},
    mode::Mode,
    press_table::PressTable,
    selection::{RowMap, SelectionState},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CellState {
    pub live: bool,
    pub standby: bool,
    pub selected: bool,
}

/// Read-only view for a renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsoleSnapshot {
    pub mode: Mode,
    pub columns: Vec<Column>,
    pub colours: Vec<ColourEntry>,
    pub live: RowMap,
    pub standby: RowMap,
    pub queued: BTreeMap<Column, String>,
    pub selected: RowMap,
}

impl ConsoleSnapshot {
    pub fn cell(&self, column: &Column, row: RowIndex) -> CellState {
        CellState {
            live: self.live.get(column) == Some(&row),
            standby: self.standby.get(column) == Some(&row),
            selected: self.selected.get(column) == Some(&row),
        }
    }
}

struct ConsoleInner<W> {
    catalog: ColourCatalog,
    selection: SelectionState,
    table: PressTable,
    submitter: W,
    host: Option<String>,
    port: Option<u16>,
}

impl<W: WriteSubmitter> ConsoleInner<W> {
    fn rebuild(&mut self, layers: LayerMap) {
        self.table = PressTable::build(&layers, &self.catalog);
        self.selection.reset(layers);
    }

    fn on_config_changed(&mut self, key: ConfigKey, value: &Value) {
        match key {
            ConfigKey::ColourSet => {
                match ColourCatalog::from_json(value) {
                    Ok(catalog) => self.catalog = catalog,
                    Err(err) => warn!(error = %err, "ignoring unparsable colour set"),
                }
                let layers = self.selection.layers().clone();
                self.rebuild(layers);
            }
            ConfigKey::LayerMap => {
                let layers = match LayerMap::from_json(value) {
                    Ok(layers) => layers,
                    Err(err) => {
                        warn!(error = %err, "ignoring unparsable layer map");
                        self.selection.layers().clone()
                    }
                };
                self.rebuild(layers);
            }
            ConfigKey::WebserverIp => {
                self.host = value.as_str().map(str::to_string);
                self.retarget();
            }
            ConfigKey::WebserverPort => {
                self.port = parse_port(value);
                self.retarget();
            }
        }
        if key.resets_selection() {
            info!(key = %key, "configuration changed; selection reset");
        }
    }

    fn retarget(&self) {
        let (Some(host), Some(port)) = (self.host.as_deref(), self.port) else {
            warn!("engine host or port missing; keeping previous endpoint");
            return;
        };
        match Endpoint::new(host, port) {
            Ok(endpoint) => {
                info!(endpoint = %endpoint, "engine endpoint updated");
                self.submitter.retarget(endpoint);
            }
            Err(err) => warn!(error = %err, "keeping previous engine endpoint"),
        }
    }
}

fn parse_port(value: &Value) -> Option<u16> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|raw| u16::try_from(raw).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

type Deferred = Rc<RefCell<Vec<(ConfigKey, Value)>>>;

/// Applies queued configuration changes in arrival order. Does nothing while
/// the console is mid-command; the next command picks them up.
fn apply_deferred<W: WriteSubmitter>(inner: &RefCell<ConsoleInner<W>>, deferred: &Deferred) {
    if deferred.borrow().is_empty() {
        return;
    }
    let Ok(mut inner) = inner.try_borrow_mut() else {
        return;
    };
    let changes = std::mem::take(&mut *deferred.borrow_mut());
    for (key, value) in changes {
        inner.on_config_changed(key, &value);
    }
}

pub struct Console<W: WriteSubmitter> {
    inner: Rc<RefCell<ConsoleInner<W>>>,
    deferred: Deferred,
}

impl<W: WriteSubmitter + 'static> Console<W> {
    /// Reads the catalog and layer map from `store` and subscribes to its
    /// changes for the lifetime of the store.
    pub fn attach(store: &dyn ConfigStore, submitter: W) -> Result<Self, ConsoleError> {
        let catalog = ColourCatalog::from_json(&store.get(ConfigKey::ColourSet)?)?;
        let layers = LayerMap::from_json(&store.get(ConfigKey::LayerMap)?)?;
        let host = store
            .get(ConfigKey::WebserverIp)
            .ok()
            .and_then(|value| value.as_str().map(str::to_string));
        let port = store
            .get(ConfigKey::WebserverPort)
            .ok()
            .as_ref()
            .and_then(parse_port);

        let inner = Rc::new(RefCell::new(ConsoleInner {
            table: PressTable::build(&layers, &catalog),
            selection: SelectionState::new(layers),
            catalog,
            submitter,
            host,
            port,
        }));

        let deferred = Deferred::default();
        let weak = Rc::downgrade(&inner);
        let queue = Rc::clone(&deferred);
        store.subscribe(Rc::new(move |key: ConfigKey, value: &Value| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            queue.borrow_mut().push((key, value.clone()));
            apply_deferred(&inner, &queue);
            if !queue.borrow().is_empty() {
                debug!(key = %key, "console busy; configuration change deferred");
            }
        }));

        Ok(Self { inner, deferred })
    }
}

impl<W: WriteSubmitter> Console<W> {
    fn settle(&self) {
        apply_deferred(&self.inner, &self.deferred);
    }

    pub fn mode(&self) -> Mode {
        self.settle();
        self.inner.borrow().selection.mode()
    }

    /// A press of grid cell `(column, row)`. Live presses dispatch at once;
    /// staged presses only queue.
    pub fn select_column(
        &self,
        column: &Column,
        row: RowIndex,
    ) -> Result<DispatchReport, ConsoleError> {
        self.settle();
        let mut inner = self.inner.borrow_mut();
        let colour = inner.table.colour(column, row)?.to_string();
        let writes = inner.selection.select_column(column, row, &colour)?;
        if inner.selection.mode() == Mode::Staging {
            debug!(column = %column, row = row.0, "press staged");
            return Ok(DispatchReport::default());
        }
        if writes.is_empty() {
            warn!(column = %column, "press matched no concrete layer");
            return Ok(DispatchReport::default());
        }
        info!(column = %column, row = row.0, colour = %colour, writes = writes.len(), "live press");
        Ok(inner.submitter.submit(&writes))
    }

    pub fn enter_staging(&self) -> Result<(), ConsoleError> {
        self.settle();
        self.inner.borrow_mut().selection.enter_staging()?;
        info!("staging mode entered");
        Ok(())
    }

    /// "GO": flushes every staged column as one batch and returns to live.
    pub fn commit(&self) -> Result<DispatchReport, ConsoleError> {
        self.settle();
        let mut inner = self.inner.borrow_mut();
        let writes = inner.selection.commit()?;
        let report = inner.submitter.submit(&writes);
        info!(
            submitted = report.submitted,
            dropped = report.dropped,
            "staged changes committed"
        );
        Ok(report)
    }

    pub fn cancel(&self) -> Result<(), ConsoleError> {
        self.settle();
        let discarded = self.inner.borrow_mut().selection.cancel()?;
        info!(discarded, "staged changes cancelled");
        Ok(())
    }

    /// Switches mode. Leaving staging this way discards staged work, exactly
    /// like [`Console::cancel`].
    pub fn toggle_mode(&self) -> Result<Mode, ConsoleError> {
        match self.mode() {
            Mode::Live => self.enter_staging()?,
            Mode::Staging => self.cancel()?,
        }
        Ok(self.mode())
    }

    pub fn reset(&self) {
        self.settle();
        let mut inner = self.inner.borrow_mut();
        let layers = inner.selection.layers().clone();
        inner.rebuild(layers);
        info!("selection reset");
    }

    pub fn snapshot(&self) -> ConsoleSnapshot {
        self.settle();
        let inner = self.inner.borrow();
        ConsoleSnapshot {
            mode: inner.selection.mode(),
            columns: inner.table.columns().to_vec(),
            colours: inner.catalog.rows().map(|(_, entry)| entry.clone()).collect(),
            live: inner.selection.live().clone(),
            standby: inner.selection.standby(),
            queued: inner.selection.queued_deltas(),
            selected: inner.selection.selected().clone(),
        }
    }
}

#[cfg(test)]
#[path = "tests/console_tests.rs"]
mod tests;
