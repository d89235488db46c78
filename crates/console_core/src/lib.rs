pub mod config_store;
pub mod console;
pub mod mode;
pub mod press_table;
pub mod selection;

pub use config_store::{ConfigKey, ConfigListener, ConfigStore, MemoryConfigStore};
pub use console::{CellState, Console, ConsoleSnapshot};
pub use mode::Mode;
pub use selection::{RowMap, SelectionState, StagedChoice};
