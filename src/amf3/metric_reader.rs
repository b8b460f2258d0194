use tracing::debug;

use crate::amf3::byte_cursor::ByteCursor;
use crate::amf3::ref_tables::RefTables;
use crate::amf3::reader::ValueReader;
use crate::amf3::value::{Object, Trait, Value};
use crate::amf3::Error;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

const MARKER_ARRAY: u8 = 0x09;
const MARKER_OBJECT: u8 = 0x0A;

/// Which top-level framing a capture stream uses, detected from its first
/// byte and fixed for the lifetime of the stream.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Framing {
    /// First byte 0x0A: a sequence of top-level AMF3 objects.
    Stream,
    /// First byte 0x09: one top-level AMF3 array whose dense portion holds
    /// every record, decoded once and then handed out one element per
    /// `read_record` call.
    Array,
    /// Anything else: the older string+suffix encoding (see `read_legacy`).
    Legacy,
}

/// Reads one logical telemetry record at a time from a growable byte
/// buffer, with transactional rewind when a record is only partially
/// present (the producer may flush mid-record at any byte boundary).
pub struct MetricReader {
    cursor: ByteCursor,
    refs: RefTables,
    framing: Option<Framing>,
    /// Records drained from an array-framed capture's single top-level
    /// array, awaiting delivery one at a time.
    pending: VecDeque<Value>,
    array_consumed: bool,
}

impl MetricReader {
    pub fn new() -> Self {
        Self {
            cursor: ByteCursor::new(Vec::new()),
            refs: RefTables::new(),
            framing: None,
            pending: VecDeque::new(),
            array_consumed: false,
        }
    }

    pub fn append_bytes(&mut self, data: &[u8]) {
        self.cursor.append_bytes(data);
    }

    fn framing(&mut self) -> Result<Framing, Error> {
        if let Some(f) = self.framing {
            return Ok(f);
        }
        let first = self.cursor.peek_byte()?;
        let framing = match first {
            MARKER_OBJECT => Framing::Stream,
            MARKER_ARRAY => Framing::Array,
            _ => Framing::Legacy,
        };
        self.framing = Some(framing);
        Ok(framing)
    }

    /// Read one record, or `Ok(None)` if the buffer holds only a partial
    /// record (the caller should append more bytes and retry).
    pub fn read_record(&mut self) -> Result<Option<Value>, Error> {
        match self.framing()? {
            Framing::Legacy => self.read_legacy(),
            Framing::Stream => self.read_transactional(),
            Framing::Array => self.read_array_record(),
        }
    }

    /// Array framing holds every record as one element of a single
    /// top-level array; decode that array once, then hand its dense
    /// elements out one at a time so callers can treat every framing
    /// uniformly as a stream of individual records.
    fn read_array_record(&mut self) -> Result<Option<Value>, Error> {
        if let Some(value) = self.pending.pop_front() {
            return Ok(Some(value));
        }
        if self.array_consumed {
            return Ok(None);
        }
        match self.read_transactional()? {
            Some(Value::Array(cell)) => {
                self.array_consumed = true;
                let dense = std::mem::take(&mut cell.borrow_mut().dense);
                self.pending = dense.into_iter().collect();
                Ok(self.pending.pop_front())
            }
            Some(_) => {
                self.array_consumed = true;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn read_transactional(&mut self) -> Result<Option<Value>, Error> {
        let pos = self.cursor.position();
        let snapshot = self.refs.snapshot();
        let mut reader = ValueReader::new(&mut self.cursor, &mut self.refs);
        match reader.read_value() {
            Ok(value) => {
                self.refs.objects.clear();
                Ok(Some(value))
            }
            Err(Error::InsufficientData) => {
                self.cursor.set_position(pos);
                self.refs.rewind_to(snapshot);
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    /// Decode one legacy-format record: a metric name (never interned in
    /// this mode) whose dotted suffix (`.span`, `.time`, `.count`) selects
    /// how the remaining payload is shaped, then the payload itself.
    fn read_legacy(&mut self) -> Result<Option<Value>, Error> {
        loop {
            let pos = self.cursor.position();
            match self.try_read_legacy() {
                Ok(Some(value)) => return Ok(Some(value)),
                // Parsed cleanly but the record didn't validate (e.g. a
                // `.span` record whose paired time string doesn't end in
                // `.time`); the original skips it and moves on to whatever
                // follows rather than treating it as a parse failure.
                Ok(None) => continue,
                Err(Error::InsufficientData) => {
                    debug!(byte_offset = pos, "legacy record truncated, rewinding");
                    self.cursor.set_position(pos);
                    return Ok(None);
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// A legacy record is a name string followed by a payload shaped by the
    /// name's suffix. `.span` records carry a span value, a second name
    /// string that must itself end in `.time`, and a time value; `.time`
    /// records carry a time value alone; anything else (including
    /// `.count`) carries a single payload value. The suffix is stripped
    /// from the name that's stored. Returns `Ok(None)` when the record
    /// parses but fails validation (a `.span` record whose paired string
    /// isn't a `.time` name), matching the original's "drop this one,
    /// keep going" behavior. The result is synthesized as a dynamic
    /// [`Value::Object`], never entered into the object reference table
    /// (legacy producers have no ref table of their own).
    fn try_read_legacy(&mut self) -> Result<Option<Value>, Error> {
        let mut reader = ValueReader::new(&mut self.cursor, &mut self.refs);
        let raw_name = reader.read_raw_string()?;
        let (name, fields): (String, Vec<(&str, Value)>) = if let Some(stem) = raw_name.strip_suffix(".span") {
            let span = reader.read_value()?;
            let tname = reader.read_raw_string()?;
            let time = reader.read_value()?;
            if !tname.ends_with(".time") {
                return Ok(None);
            }
            (stem.to_string(), vec![("span", span), ("time", time)])
        } else if let Some(stem) = raw_name.strip_suffix(".time") {
            let time = reader.read_value()?;
            (stem.to_string(), vec![("time", time)])
        } else if let Some(stem) = raw_name.strip_suffix(".count") {
            let value = reader.read_value()?;
            (stem.to_string(), vec![("value", value)])
        } else {
            let value = reader.read_value()?;
            (raw_name, vec![("value", value)])
        };

        let mut dynamic_members = vec![("name".to_string(), Value::String(Rc::from(name.as_str())))];
        dynamic_members.extend(fields.into_iter().map(|(k, v)| (k.to_string(), v)));

        Ok(Some(Value::Object(Rc::new(RefCell::new(Object {
            class_trait: Rc::new(Trait {
                class_name: None,
                is_dynamic: true,
                is_externalizable: false,
                slot_names: Vec::new(),
            }),
            sealed_members: Vec::new(),
            dynamic_members,
        })))))
    }
}

impl Default for MetricReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn detects_stream_framing() {
        let mut r = MetricReader::new();
        r.append_bytes(&[MARKER_OBJECT, 0x01, 0x01]);
        assert_eq!(r.framing().unwrap(), Framing::Stream);
    }

    #[test]
    fn detects_array_framing() {
        let mut r = MetricReader::new();
        r.append_bytes(&[MARKER_ARRAY, 0x01]);
        assert_eq!(r.framing().unwrap(), Framing::Array);
    }

    #[test]
    fn array_framing_yields_one_record_per_dense_element() {
        let mut r = MetricReader::new();
        // array marker, header (2 dense elements, inline), then two
        // inline strings "a" and "b", no named portion.
        r.append_bytes(&[MARKER_ARRAY, 0x05, 0x01, 0x06, 0x03, 0x61, 0x06, 0x03, 0x62]);

        let first = r.read_record().unwrap().unwrap();
        assert_eq!(first.as_str(), Some("a"));
        let second = r.read_record().unwrap().unwrap();
        assert_eq!(second.as_str(), Some("b"));
        assert!(r.read_record().unwrap().is_none());
    }

    #[test]
    fn partial_record_rewinds_and_retries() {
        let mut r = MetricReader::new();
        // Force stream framing so a bare string value is read directly,
        // independent of the framing byte that would normally select it.
        r.framing = Some(Framing::Stream);
        // string marker + header claiming 3 bytes, but only 1 supplied
        r.append_bytes(&[0x06, 0x07, 0x66]);
        assert!(r.read_record().unwrap().is_none());
        assert_eq!(r.cursor.position(), 0);
        r.append_bytes(&[0x6F, 0x6F]);
        let value = r.read_record().unwrap().unwrap();
        assert_eq!(value.as_str(), Some("foo"));
    }

    #[test]
    fn objects_table_clears_between_records_strings_persist() {
        let mut r = MetricReader::new();
        r.framing = Some(Framing::Stream);
        r.append_bytes(&[0x06, 0x07, 0x66, 0x6F, 0x6F]);
        r.read_record().unwrap();
        assert_eq!(r.refs.strings.len(), 1);
        r.append_bytes(&[0x06, 0x00]);
        let second = r.read_record().unwrap().unwrap();
        assert_eq!(second.as_str(), Some("foo"));
    }

    #[test]
    fn legacy_span_record_strips_suffix_and_skips_interning() {
        let mut r = MetricReader::new();
        // legacy framing: first byte is neither 0x0A nor 0x09
        let mut bytes = vec![0x06];
        let name = b"as.update.span";
        bytes.push(((name.len() as u32) << 1 | 1) as u8);
        bytes.extend_from_slice(name);
        bytes.push(0x04); // span: integer
        bytes.push(0x1E); // 30
        bytes.push(0x06); // tname: string marker
        let tname = b"as.update.time";
        bytes.push(((tname.len() as u32) << 1 | 1) as u8);
        bytes.extend_from_slice(tname);
        bytes.push(0x04); // time: integer
        bytes.push(0x64); // 100
        r.append_bytes(&bytes);

        let value = r.read_record().unwrap().unwrap();
        let Value::Object(cell) = value else {
            panic!("expected synthesized object")
        };
        let obj = cell.borrow();
        let get = |k: &str| obj.dynamic_members.iter().find(|(n, _)| n == k).map(|(_, v)| v.clone());
        assert_eq!(get("name").unwrap().as_str(), Some("as.update"));
        assert_eq!(get("span").unwrap().as_i32(), Some(30));
        assert_eq!(get("time").unwrap().as_i32(), Some(100));
        assert_eq!(r.refs.strings.len(), 0);
    }

    #[test]
    fn legacy_span_record_with_mismatched_time_suffix_is_skipped() {
        let mut r = MetricReader::new();
        let mut bytes = vec![0x06];
        let name = b"as.update.span";
        bytes.push(((name.len() as u32) << 1 | 1) as u8);
        bytes.extend_from_slice(name);
        bytes.push(0x04); // span: integer
        bytes.push(0x1E); // 30
        bytes.push(0x06); // tname: string marker, doesn't end in ".time"
        let tname = b"as.update.bogus";
        bytes.push(((tname.len() as u32) << 1 | 1) as u8);
        bytes.extend_from_slice(tname);
        bytes.push(0x04); // time: integer, still consumed
        bytes.push(0x64); // 100
        r.append_bytes(&bytes);

        assert!(r.read_record().unwrap().is_none());
        assert_eq!(r.cursor.position(), bytes.len());
    }
}
