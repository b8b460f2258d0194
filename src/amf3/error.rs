use thiserror::Error;

/// Which reference table a lookup or intern failed against.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum RefTable {
    Strings,
    Traits,
    Objects,
}

impl std::fmt::Display for RefTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RefTable::Strings => "strings",
            RefTable::Traits => "traits",
            RefTable::Objects => "objects",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The cursor would have to read past the end of the buffer.
    #[error("Insufficient data to complete the read")]
    InsufficientData,

    /// A reference index read from the stream doesn't resolve in its table.
    #[error("Invalid {table} reference {index} (table has {len} entries)")]
    InvalidReference {
        table: RefTable,
        index: usize,
        len: usize,
    },

    /// An AMF3 type marker byte outside the defined set.
    #[error("Unknown AMF3 type marker 0x{0:02X}")]
    UnknownMarker(u8),

    /// Externalizable objects invoke producer-specific serialization we don't implement.
    #[error("Externalizable objects are not supported")]
    Externalizable,

    #[error("Invalid UTF-8 in AMF3 string body")]
    Utf8(#[from] std::str::Utf8Error),
}
