//! Column schema of the events column family.
//!
//! The table is described once and shared by the encoder, the decoder and
//! the store's read/delete predicates.

/// Physical encoding of a column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// UTF-8 text.
    Text,
    /// Big-endian 64-bit milliseconds since Unix epoch.
    Millis,
    /// Big-endian 64-bit signed integer.
    Int64,
    /// Single byte, nonzero means true.
    Flag,
    /// Opaque bytes.
    Bytes,
}

/// Description of one column of the events column family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
    /// Carries a secondary index usable for equality lookups.
    pub indexed: bool,
    /// Omitted from the row when the field is unset.
    pub optional: bool,
    /// Written on every sync but never read back.
    pub write_only: bool,
}

pub const TITLE: &str = "title";
pub const DESCRIPTION: &str = "description";
pub const OWNER: &str = "owner";
pub const START: &str = "start";
pub const END: &str = "end";
pub const REQUIRED: &str = "required";
pub const WEEK: &str = "week";
pub const REFERENCE: &str = "reference";
pub const GENERATOR_ID: &str = "generatorID";

const fn column(name: &'static str, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec {
        name,
        kind,
        indexed: false,
        optional: false,
        write_only: false,
    }
}

pub static EVENT_SCHEMA: [ColumnSpec; 9] = [
    column(TITLE, ColumnKind::Text),
    column(DESCRIPTION, ColumnKind::Text),
    ColumnSpec {
        indexed: true,
        ..column(OWNER, ColumnKind::Text)
    },
    column(START, ColumnKind::Millis),
    column(END, ColumnKind::Millis),
    column(REQUIRED, ColumnKind::Flag),
    ColumnSpec {
        indexed: true,
        write_only: true,
        ..column(WEEK, ColumnKind::Int64)
    },
    ColumnSpec {
        optional: true,
        ..column(REFERENCE, ColumnKind::Text)
    },
    ColumnSpec {
        optional: true,
        ..column(GENERATOR_ID, ColumnKind::Bytes)
    },
];

/// Every column name of the schema, in schema order.
pub static ALL_COLUMNS: [&str; 9] = [
    TITLE,
    DESCRIPTION,
    OWNER,
    START,
    END,
    REQUIRED,
    WEEK,
    REFERENCE,
    GENERATOR_ID,
];

/// Columns requested on reads; `week` is write-only.
pub static READ_COLUMNS: [&str; 8] = [
    TITLE,
    DESCRIPTION,
    OWNER,
    START,
    END,
    REQUIRED,
    REFERENCE,
    GENERATOR_ID,
];

/// Look up a column description by name.
#[must_use]
pub fn spec(name: &str) -> Option<&'static ColumnSpec> {
    EVENT_SCHEMA.iter().find(|col| col.name == name)
}

/// Names of the columns carrying a secondary index.
pub fn indexed_columns() -> impl Iterator<Item = &'static str> {
    EVENT_SCHEMA
        .iter()
        .filter(|col| col.indexed)
        .map(|col| col.name)
}
