use crate::amf3::error::RefTable as RefTableKind;
use crate::amf3::Error;

/// One of the three independent, append-only reference tables a decoding
/// session maintains: strings, traits, and objects. Each inline (non-ref)
/// occurrence of a complex value is appended here in decode order so a
/// later reference index can resolve back to it.
#[derive(Clone, Debug, Default)]
pub struct RefTable<T> {
    entries: Vec<T>,
    kind_for_errors: Option<RefTableKind>,
}

impl<T: Clone> RefTable<T> {
    pub fn new(kind: RefTableKind) -> Self {
        Self {
            entries: Vec::new(),
            kind_for_errors: Some(kind),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, value: T) -> usize {
        self.entries.push(value);
        self.entries.len() - 1
    }

    pub fn get(&self, index: usize) -> Result<T, Error> {
        self.entries.get(index).cloned().ok_or_else(|| Error::InvalidReference {
            table: self.kind_for_errors.expect("RefTable constructed via new()"),
            index,
            len: self.entries.len(),
        })
    }

    /// Truncate back to a previously observed length, discarding anything
    /// interned after it. Used by the metric reader to undo partial interns
    /// left behind by a record that turned out to be truncated.
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// The three per-session tables, bundled together since every reader needs
/// all three and they share a lifetime.
#[derive(Clone, Debug)]
pub struct RefTables {
    pub strings: RefTable<String>,
    pub traits: RefTable<std::rc::Rc<crate::amf3::value::Trait>>,
    pub objects: RefTable<crate::amf3::value::Value>,
}

impl RefTables {
    pub fn new() -> Self {
        Self {
            strings: RefTable::new(RefTableKind::Strings),
            traits: RefTable::new(RefTableKind::Traits),
            objects: RefTable::new(RefTableKind::Objects),
        }
    }

    /// Discard everything interned after `snapshot`, restoring the tables to
    /// the state they were in when the snapshot was taken.
    pub fn rewind_to(&mut self, snapshot: RefTablesSnapshot) {
        self.strings.truncate(snapshot.strings);
        self.traits.truncate(snapshot.traits);
        self.objects.truncate(snapshot.objects);
    }

    pub fn snapshot(&self) -> RefTablesSnapshot {
        RefTablesSnapshot {
            strings: self.strings.len(),
            traits: self.traits.len(),
            objects: self.objects.len(),
        }
    }
}

impl Default for RefTables {
    fn default() -> Self {
        Self::new()
    }
}

/// Lengths of the three tables at a point in time, for rewind-on-failure.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct RefTablesSnapshot {
    strings: usize,
    traits: usize,
    objects: usize,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn push_and_get() {
        let mut t: RefTable<String> = RefTable::new(RefTableKind::Strings);
        let idx = t.push("hello".to_string());
        assert_eq!(t.get(idx).unwrap(), "hello");
    }

    #[test]
    fn invalid_reference_reports_table_kind() {
        let t: RefTable<String> = RefTable::new(RefTableKind::Strings);
        let err = t.get(0).unwrap_err();
        match err {
            Error::InvalidReference { table, index, len } => {
                assert_eq!(table, RefTableKind::Strings);
                assert_eq!(index, 0);
                assert_eq!(len, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn snapshot_and_rewind() {
        let mut t: RefTable<String> = RefTable::new(RefTableKind::Strings);
        t.push("a".into());
        let len_before = t.len();
        t.push("b".into());
        t.truncate(len_before);
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(0).unwrap(), "a");
    }
}
