use super::*;
use std::cell::RefCell;

use serde_json::json;
use shared::{domain::LayerTarget, protocol::LayerWrite};

use crate::config_store::MemoryConfigStore;

#[derive(Clone, Default)]
struct RecordingSubmitter {
    batches: Rc<RefCell<Vec<Vec<LayerWrite>>>>,
    endpoints: Rc<RefCell<Vec<Endpoint>>>,
}

impl RecordingSubmitter {
    fn batches(&self) -> Vec<Vec<LayerWrite>> {
        self.batches.borrow().clone()
    }

    fn write_count(&self) -> usize {
        self.batches.borrow().iter().map(Vec::len).sum()
    }
}

impl WriteSubmitter for RecordingSubmitter {
    fn submit(&self, writes: &[LayerWrite]) -> DispatchReport {
        self.batches.borrow_mut().push(writes.to_vec());
        DispatchReport {
            submitted: writes.len(),
            dropped: 0,
        }
    }

    fn retarget(&self, endpoint: Endpoint) {
        self.endpoints.borrow_mut().push(endpoint);
    }
}

fn stage_store() -> Rc<MemoryConfigStore> {
    Rc::new(
        MemoryConfigStore::new()
            .with_value(
                ConfigKey::ColourSet,
                json!([
                    { "label": "1 - Red", "hex": "#FF0000" },
                    { "label": "2 - Blue", "hex": "#0000FF" },
                    { "label": "3 - Green", "hex": "#00B050" },
                ]),
            )
            .with_value(
                ConfigKey::LayerMap,
                json!([
                    { "column": "Outer", "target": 1 },
                    { "column": "Inner", "target": 2 },
                    { "column": "Middle", "target": 3 },
                    { "column": "DJ", "target": 4 },
                    { "column": "ALL", "target": "aggregate" },
                ]),
            )
            .with_value(ConfigKey::WebserverIp, json!("localhost"))
            .with_value(ConfigKey::WebserverPort, json!(8080)),
    )
}

fn attach() -> (Rc<MemoryConfigStore>, Console<RecordingSubmitter>, RecordingSubmitter) {
    let store = stage_store();
    let recorder = RecordingSubmitter::default();
    let console = Console::attach(&*store, recorder.clone()).expect("attach");
    (store, console, recorder)
}

fn col(name: &str) -> Column {
    Column::from(name)
}

#[test]
fn live_press_dispatches_single_write_to_layer() {
    let (_store, console, recorder) = attach();

    let report = console.select_column(&col("Outer"), RowIndex(0)).expect("press");

    assert_eq!(report.submitted, 1);
    assert_eq!(
        recorder.batches(),
        vec![vec![LayerWrite {
            column: col("Outer"),
            target: LayerTarget::Index(1),
            row: RowIndex(0),
            colour: "#FF0000".to_string(),
        }]]
    );
    let snapshot = console.snapshot();
    assert_eq!(snapshot.live.get(&col("Outer")), Some(&RowIndex(0)));
    assert_eq!(snapshot.live.len(), 1);
}

#[test]
fn repeated_live_press_dispatches_each_time() {
    let (_store, console, recorder) = attach();

    console.select_column(&col("DJ"), RowIndex(2)).expect("first");
    console.select_column(&col("DJ"), RowIndex(2)).expect("second");

    assert_eq!(recorder.write_count(), 2);
    assert_eq!(console.snapshot().live.get(&col("DJ")), Some(&RowIndex(2)));
}

#[test]
fn staged_all_press_commits_one_write_per_layer() {
    let (_store, console, recorder) = attach();
    console.enter_staging().expect("enter");

    let report = console.select_column(&col("ALL"), RowIndex(0)).expect("press all");
    assert_eq!(report, DispatchReport::default());
    assert_eq!(console.snapshot().queued.len(), 4);
    assert_eq!(recorder.write_count(), 0);

    let report = console.commit().expect("go");

    assert_eq!(report.submitted, 4);
    assert_eq!(recorder.batches().len(), 1);
    let snapshot = console.snapshot();
    assert_eq!(snapshot.mode, Mode::Live);
    assert_eq!(snapshot.live.len(), 4);
    assert!(snapshot.live.values().all(|row| *row == RowIndex(0)));
    assert!(snapshot.standby.is_empty());
}

#[test]
fn cancel_discards_staged_work_without_writes() {
    let (_store, console, recorder) = attach();
    console.select_column(&col("Outer"), RowIndex(0)).expect("live");
    console.enter_staging().expect("enter");
    console.select_column(&col("Outer"), RowIndex(1)).expect("stage");

    console.cancel().expect("cancel");

    assert_eq!(recorder.write_count(), 1);
    let snapshot = console.snapshot();
    assert_eq!(snapshot.mode, Mode::Live);
    assert_eq!(snapshot.live.get(&col("Outer")), Some(&RowIndex(0)));
    assert_eq!(snapshot.selected.get(&col("Outer")), Some(&RowIndex(0)));
}

#[test]
fn toggle_out_of_staging_discards() {
    let (_store, console, recorder) = attach();

    assert_eq!(console.toggle_mode(), Ok(Mode::Staging));
    console.select_column(&col("Inner"), RowIndex(2)).expect("stage");
    assert_eq!(console.toggle_mode(), Ok(Mode::Live));

    assert_eq!(recorder.write_count(), 0);
    assert!(console.snapshot().live.is_empty());
    assert!(console.snapshot().selected.is_empty());
}

#[test]
fn snapshot_marks_live_and_standby_cells_in_same_column() {
    let (_store, console, _recorder) = attach();
    console.select_column(&col("Outer"), RowIndex(0)).expect("live");
    console.enter_staging().expect("enter");
    console.select_column(&col("Outer"), RowIndex(2)).expect("stage");

    let snapshot = console.snapshot();

    assert_eq!(
        snapshot.cell(&col("Outer"), RowIndex(0)),
        CellState {
            live: true,
            standby: false,
            selected: false
        }
    );
    assert_eq!(
        snapshot.cell(&col("Outer"), RowIndex(2)),
        CellState {
            live: false,
            standby: true,
            selected: true
        }
    );
    assert_eq!(snapshot.cell(&col("Inner"), RowIndex(0)), CellState::default());
}

#[test]
fn bad_presses_and_transitions_are_rejected() {
    let (_store, console, recorder) = attach();

    assert_eq!(
        console.select_column(&col("Balcony"), RowIndex(0)),
        Err(ConsoleError::UnknownColumn(col("Balcony")))
    );
    assert!(matches!(
        console.select_column(&col("Outer"), RowIndex(9)),
        Err(ConsoleError::UnknownRow { .. })
    ));
    assert!(matches!(console.commit(), Err(ConsoleError::InvalidTransition { .. })));
    assert!(matches!(console.cancel(), Err(ConsoleError::InvalidTransition { .. })));
    console.enter_staging().expect("enter");
    assert!(matches!(
        console.enter_staging(),
        Err(ConsoleError::InvalidTransition { .. })
    ));

    assert_eq!(recorder.write_count(), 0);
}

#[test]
fn colour_set_change_resets_mid_staging() {
    let (store, console, recorder) = attach();
    console.select_column(&col("Outer"), RowIndex(0)).expect("live");
    console.enter_staging().expect("enter");
    console.select_column(&col("Inner"), RowIndex(1)).expect("stage");

    store.set(
        ConfigKey::ColourSet,
        json!([{ "label": "Amber", "hex": "#FFBF00" }]),
    );

    let snapshot = console.snapshot();
    assert_eq!(snapshot.mode, Mode::Live);
    assert!(snapshot.live.is_empty());
    assert!(snapshot.standby.is_empty());
    assert!(snapshot.selected.is_empty());
    assert_eq!(snapshot.colours.len(), 1);
    assert_eq!(recorder.write_count(), 1);

    console.select_column(&col("Outer"), RowIndex(0)).expect("press new colour");
    assert_eq!(recorder.batches()[1][0].colour, "#FFBF00");
}

#[test]
fn layer_map_change_rebuilds_columns() {
    let (store, console, _recorder) = attach();
    console.select_column(&col("Outer"), RowIndex(0)).expect("live");

    store.set(ConfigKey::LayerMap, json!({ "Stage": 7, "Everything": "aggregate" }));

    let snapshot = console.snapshot();
    assert_eq!(snapshot.columns, vec![col("Stage"), col("Everything")]);
    assert!(snapshot.live.is_empty());
    assert_eq!(
        console.select_column(&col("Outer"), RowIndex(0)),
        Err(ConsoleError::UnknownColumn(col("Outer")))
    );
    console.select_column(&col("Stage"), RowIndex(1)).expect("new column");
}

#[test]
fn unparsable_layer_map_still_resets_but_keeps_columns() {
    let (store, console, _recorder) = attach();
    console.select_column(&col("Outer"), RowIndex(0)).expect("live");

    store.set(ConfigKey::LayerMap, json!("not a map"));

    let snapshot = console.snapshot();
    assert!(snapshot.live.is_empty());
    assert_eq!(snapshot.columns.len(), 5);
}

#[test]
fn endpoint_change_retargets_without_reset() {
    let (store, console, recorder) = attach();
    console.select_column(&col("Outer"), RowIndex(0)).expect("live");

    store.set(ConfigKey::WebserverIp, json!("10.0.0.8"));
    store.set(ConfigKey::WebserverPort, json!("7000"));

    let endpoints = recorder.endpoints.borrow().clone();
    assert_eq!(endpoints.len(), 2);
    assert_eq!(endpoints[1].to_string(), "http://10.0.0.8:7000/api/v1");
    assert_eq!(console.snapshot().live.len(), 1);
}

#[test]
fn dropped_console_ignores_later_changes() {
    let (store, console, _recorder) = attach();
    drop(console);

    store.set(ConfigKey::ColourSet, json!([]));
}

#[test]
fn attach_requires_catalog_and_layers() {
    let store = MemoryConfigStore::new().with_value(ConfigKey::ColourSet, json!([]));

    let err = Console::attach(&store, RecordingSubmitter::default())
        .err()
        .expect("layer map missing");

    assert_eq!(err, ConsoleError::MissingConfigKey("LAYER_MAP".to_string()));
}

/// Rewrites the layer map from inside its first submit, while the console is
/// still mid-command.
struct LayerSwappingSubmitter {
    store: Rc<MemoryConfigStore>,
    swapped: std::cell::Cell<bool>,
    writes: Rc<RefCell<usize>>,
}

impl WriteSubmitter for LayerSwappingSubmitter {
    fn submit(&self, writes: &[LayerWrite]) -> DispatchReport {
        *self.writes.borrow_mut() += writes.len();
        if !self.swapped.replace(true) {
            self.store
                .set(ConfigKey::LayerMap, json!([{ "column": "Wash", "target": 9 }]));
        }
        DispatchReport {
            submitted: writes.len(),
            dropped: 0,
        }
    }

    fn retarget(&self, _endpoint: Endpoint) {}
}

#[test]
fn layer_map_change_during_a_command_still_resets() {
    let store = stage_store();
    let writes = Rc::new(RefCell::new(0));
    let console = Console::attach(
        &*store,
        LayerSwappingSubmitter {
            store: Rc::clone(&store),
            swapped: std::cell::Cell::new(false),
            writes: Rc::clone(&writes),
        },
    )
    .expect("attach");

    console.select_column(&col("Outer"), RowIndex(0)).expect("press");

    let snapshot = console.snapshot();
    assert_eq!(snapshot.columns, vec![col("Wash")]);
    assert!(snapshot.live.is_empty());
    assert_eq!(
        console.select_column(&col("Outer"), RowIndex(0)),
        Err(ConsoleError::UnknownColumn(col("Outer")))
    );
    assert_eq!(*writes.borrow(), 1);
}

#[test]
fn live_aggregate_press_without_concrete_layers_sends_nothing() {
    let store = stage_store();
    store.set(ConfigKey::LayerMap, json!([{ "column": "ALL", "target": "aggregate" }]));
    let recorder = RecordingSubmitter::default();
    let console = Console::attach(&*store, recorder.clone()).expect("attach");

    let report = console.select_column(&col("ALL"), RowIndex(0)).expect("press");

    assert_eq!(report, DispatchReport::default());
    assert_eq!(console.mode(), Mode::Live);
    assert!(recorder.batches().is_empty());
}
