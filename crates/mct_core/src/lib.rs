pub mod consts;
pub mod errors;
pub mod schema;
pub mod row;
pub mod table;
pub mod dictionary;
pub mod memory;

pub use dictionary::{DictEntry, StringDictionary, DICT_SCHEMA};
pub use errors::{BackingStoreError, McError, Result};
pub use memory::MemBackend;
pub use row::{Row, RowRange};
pub use schema::{FieldDef, FieldKind, RowSchema};
pub use table::{Backend, ColumnTable, TypedTable};
