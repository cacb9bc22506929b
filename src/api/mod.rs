//! Purpose: Define the stable public Rust API boundary for mdbq.
//! Exports: Core types and operations needed by callers and the CLI.
//! Invariants: This module is the only public path callers should use;
//! `crate::core` layout may shift underneath it.

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::db::{Database, EXPORT_DATE_FORMAT, HeaderMode, SqlFlavor};
pub use crate::core::decode::{
    QUERY_OFFSET, Record, RecordSet, TABLE_OFFSET, decode_columns, decode_records,
};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::exec::Toolchain;
