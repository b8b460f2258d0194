//! AMF3 binary decoding: byte cursor, variable-length integers, reference
//! tables, value materialization, and the framed metric-record reader.

mod byte_cursor;
mod error;
mod metric_reader;
mod ref_tables;
mod reader;
mod uint29;
pub mod value;

pub use byte_cursor::ByteCursor;
pub use error::{Error, RefTable as RefTableKind};
pub use metric_reader::{Framing, MetricReader};
pub use ref_tables::RefTables;
pub use reader::ValueReader;
pub use uint29::{encode_uint29, read_uint29};
pub use value::Value;
