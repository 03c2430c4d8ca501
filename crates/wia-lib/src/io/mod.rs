pub mod csv;
pub mod snapshot;

pub use self::csv::{print_to_console, read_csv_store, write_csv, write_csv_file};
pub use snapshot::{load_store, load_wia, save_store, save_wia, StoreSnapshot, WiaSnapshot};
