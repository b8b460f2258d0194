use ordered_float::OrderedFloat;
use std::cell::RefCell;
use std::rc::Rc;

use crate::amf3::byte_cursor::ByteCursor;
use crate::amf3::ref_tables::RefTables;
use crate::amf3::uint29::read_uint29;
use crate::amf3::value::{AmfArray, Dictionary, Object, Trait, Value, Vector, VectorValue};
use crate::amf3::Error;

const MARKER_UNDEFINED: u8 = 0x00;
const MARKER_NULL: u8 = 0x01;
const MARKER_FALSE: u8 = 0x02;
const MARKER_TRUE: u8 = 0x03;
const MARKER_INTEGER: u8 = 0x04;
const MARKER_DOUBLE: u8 = 0x05;
const MARKER_STRING: u8 = 0x06;
const MARKER_XML_DOC: u8 = 0x07;
const MARKER_DATE: u8 = 0x08;
const MARKER_ARRAY: u8 = 0x09;
const MARKER_OBJECT: u8 = 0x0A;
const MARKER_XML: u8 = 0x0B;
const MARKER_BYTE_ARRAY: u8 = 0x0C;
const MARKER_VECTOR_INT: u8 = 0x0D;
const MARKER_VECTOR_UINT: u8 = 0x0E;
const MARKER_VECTOR_DOUBLE: u8 = 0x0F;
const MARKER_VECTOR_OBJECT: u8 = 0x10;
const MARKER_DICTIONARY: u8 = 0x11;

/// Reads AMF3 values off a [`ByteCursor`], consulting and mutating a set of
/// [`RefTables`] for back-references. One `ValueReader` is typically
/// constructed per decoding session and reused across records (the string
/// and trait tables persist; the object table is cleared between records by
/// the caller, see [`crate::amf3::MetricReader`]).
pub struct ValueReader<'a> {
    cursor: &'a mut ByteCursor,
    refs: &'a mut RefTables,
}

impl<'a> ValueReader<'a> {
    pub fn new(cursor: &'a mut ByteCursor, refs: &'a mut RefTables) -> Self {
        Self { cursor, refs }
    }

    pub fn read_value(&mut self) -> Result<Value, Error> {
        let marker = self.cursor.read_byte()?;
        self.read_value_for_marker(marker)
    }

    fn read_value_for_marker(&mut self, marker: u8) -> Result<Value, Error> {
        match marker {
            MARKER_UNDEFINED => Ok(Value::Undefined),
            MARKER_NULL => Ok(Value::Null),
            MARKER_FALSE => Ok(Value::Boolean(false)),
            MARKER_TRUE => Ok(Value::Boolean(true)),
            MARKER_INTEGER => Ok(Value::Integer(self.read_integer()?)),
            MARKER_DOUBLE => Ok(Value::Double(OrderedFloat(self.cursor.read_f64_be()?))),
            MARKER_STRING => Ok(Value::String(Rc::from(self.read_string(false)?.as_str()))),
            MARKER_XML_DOC | MARKER_XML => self.read_xml(),
            MARKER_DATE => self.read_date(),
            MARKER_ARRAY => self.read_array(),
            MARKER_OBJECT => self.read_object(),
            MARKER_BYTE_ARRAY => self.read_byte_array(),
            MARKER_VECTOR_INT => self.read_vector_int(),
            MARKER_VECTOR_UINT => self.read_vector_uint(),
            MARKER_VECTOR_DOUBLE => self.read_vector_double(),
            MARKER_VECTOR_OBJECT => self.read_vector_object(),
            MARKER_DICTIONARY => self.read_dictionary(),
            other => Err(Error::UnknownMarker(other)),
        }
    }

    /// Sign-extend a 29-bit integer per the two's-complement convention:
    /// values at or above 2^28 represent negative numbers.
    fn read_integer(&mut self) -> Result<i32, Error> {
        let raw = read_uint29(self.cursor)?;
        Ok(if raw >= 1 << 28 {
            (raw as i32) - (1 << 29)
        } else {
            raw as i32
        })
    }

    /// Read a ref-or-body Uint29 header, splitting it into (is_inline, remainder).
    fn read_header(&mut self) -> Result<(bool, u32), Error> {
        let header = read_uint29(self.cursor)?;
        Ok((header & 1 == 1, header >> 1))
    }

    /// Read a top-level string record the way the legacy framing does:
    /// consume the string marker byte itself, then the body, never
    /// interning (legacy producers keep no string table at all).
    pub(crate) fn read_raw_string(&mut self) -> Result<String, Error> {
        let marker = self.cursor.read_byte()?;
        if marker != MARKER_STRING {
            return Err(Error::UnknownMarker(marker));
        }
        self.read_string(true)
    }

    /// Read one AMF3 string. `no_cache` suppresses interning even for a
    /// non-empty inline string (used for trait member/class names).
    fn read_string(&mut self, no_cache: bool) -> Result<String, Error> {
        let (is_inline, remainder) = self.read_header()?;
        if !is_inline {
            return self.refs.strings.get(remainder as usize);
        }
        let len = remainder as usize;
        if len == 0 {
            return Ok(String::new());
        }
        let bytes = self.cursor.read_bytes(len)?;
        let s = String::from_utf8(bytes).map_err(|e| Error::Utf8(e.utf8_error()))?;
        if !no_cache {
            self.refs.strings.push(s.clone());
        }
        Ok(s)
    }

    fn read_xml(&mut self) -> Result<Value, Error> {
        let (is_inline, remainder) = self.read_header()?;
        if !is_inline {
            return self.refs.objects.get(remainder as usize);
        }
        let len = remainder as usize;
        let bytes = self.cursor.read_bytes(len)?;
        let text = String::from_utf8(bytes).map_err(|e| Error::Utf8(e.utf8_error()))?;
        let value = Value::Xml(Rc::new(RefCell::new(text)));
        self.refs.objects.push(value.clone());
        Ok(value)
    }

    fn read_date(&mut self) -> Result<Value, Error> {
        let (is_inline, remainder) = self.read_header()?;
        if !is_inline {
            return self.refs.objects.get(remainder as usize);
        }
        let millis = self.cursor.read_f64_be()?;
        let value = Value::Date(OrderedFloat(millis));
        self.refs.objects.push(value.clone());
        Ok(value)
    }

    fn read_byte_array(&mut self) -> Result<Value, Error> {
        let (is_inline, remainder) = self.read_header()?;
        if !is_inline {
            return self.refs.objects.get(remainder as usize);
        }
        let len = remainder as usize;
        let bytes = self.cursor.read_bytes(len)?;
        let value = Value::ByteArray(Rc::new(RefCell::new(bytes)));
        self.refs.objects.push(value.clone());
        Ok(value)
    }

    fn read_array(&mut self) -> Result<Value, Error> {
        let (is_inline, remainder) = self.read_header()?;
        if !is_inline {
            return self.refs.objects.get(remainder as usize);
        }
        let count = remainder as usize;
        let slot = Value::Array(Rc::new(RefCell::new(AmfArray::default())));
        self.refs.objects.push(slot.clone());
        let Value::Array(cell) = &slot else {
            unreachable!()
        };

        loop {
            let key = self.read_string(true)?;
            if key.is_empty() {
                break;
            }
            let value = self.read_value()?;
            cell.borrow_mut().named.push((key, value));
        }
        for _ in 0..count {
            let value = self.read_value()?;
            cell.borrow_mut().dense.push(value);
        }
        Ok(slot)
    }

    fn read_object(&mut self) -> Result<Value, Error> {
        let (is_inline, remainder) = self.read_header()?;
        if !is_inline {
            return self.refs.objects.get(remainder as usize);
        }
        let class_trait = self.read_trait(remainder)?;

        let slot = Value::Object(Rc::new(RefCell::new(Object {
            class_trait: class_trait.clone(),
            sealed_members: Vec::with_capacity(class_trait.slot_names.len()),
            dynamic_members: Vec::new(),
        })));
        self.refs.objects.push(slot.clone());
        let Value::Object(cell) = &slot else {
            unreachable!()
        };

        for _ in &class_trait.slot_names {
            let value = self.read_value()?;
            cell.borrow_mut().sealed_members.push(value);
        }
        if class_trait.is_dynamic {
            loop {
                let key = self.read_string(true)?;
                if key.is_empty() {
                    break;
                }
                let value = self.read_value()?;
                cell.borrow_mut().dynamic_members.push((key, value));
            }
        }
        Ok(slot)
    }

    /// `remainder` is the traits header shifted right by the ref-or-body bit.
    fn read_trait(&mut self, remainder: u32) -> Result<Rc<Trait>, Error> {
        if remainder & 1 == 0 {
            // `...01` at the object level (bit 0 of remainder here is the
            // former bit 1 of the full header): traits reference.
            return self.refs.traits.get((remainder >> 1) as usize);
        }
        if remainder & 2 != 0 {
            return Err(Error::Externalizable);
        }
        let is_dynamic = remainder & 4 != 0;
        let slot_count = (remainder >> 3) as usize;
        let class_name = self.read_string(true)?;
        let mut slot_names = Vec::with_capacity(slot_count);
        for _ in 0..slot_count {
            slot_names.push(self.read_string(true)?);
        }
        let class_trait = Rc::new(Trait {
            class_name: if class_name.is_empty() {
                None
            } else {
                Some(class_name)
            },
            is_dynamic,
            is_externalizable: false,
            slot_names,
        });
        self.refs.traits.push(class_trait.clone());
        Ok(class_trait)
    }

    fn read_dictionary(&mut self) -> Result<Value, Error> {
        let (is_inline, remainder) = self.read_header()?;
        if !is_inline {
            return self.refs.objects.get(remainder as usize);
        }
        let count = remainder as usize;
        let weak_keys = self.cursor.read_byte()? != 0;
        let slot = Value::Dictionary(Rc::new(RefCell::new(Dictionary {
            weak_keys,
            entries: Vec::with_capacity(count),
        })));
        self.refs.objects.push(slot.clone());
        let Value::Dictionary(cell) = &slot else {
            unreachable!()
        };
        for _ in 0..count {
            let key = self.read_value()?;
            let value = self.read_value()?;
            cell.borrow_mut().entries.push((key, value));
        }
        Ok(slot)
    }

    fn read_vector_int(&mut self) -> Result<Value, Error> {
        let (is_inline, remainder) = self.read_header()?;
        if !is_inline {
            return self.refs.objects.get(remainder as usize);
        }
        let count = remainder as usize;
        let fixed = self.cursor.read_byte()? != 0;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.cursor.read_u32_be()? as i32);
        }
        self.push_vector(fixed, VectorValue::Int(values))
    }

    fn read_vector_uint(&mut self) -> Result<Value, Error> {
        let (is_inline, remainder) = self.read_header()?;
        if !is_inline {
            return self.refs.objects.get(remainder as usize);
        }
        let count = remainder as usize;
        let fixed = self.cursor.read_byte()? != 0;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.cursor.read_u32_be()?);
        }
        self.push_vector(fixed, VectorValue::UInt(values))
    }

    fn read_vector_double(&mut self) -> Result<Value, Error> {
        let (is_inline, remainder) = self.read_header()?;
        if !is_inline {
            return self.refs.objects.get(remainder as usize);
        }
        let count = remainder as usize;
        let fixed = self.cursor.read_byte()? != 0;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.cursor.read_f64_be()?);
        }
        self.push_vector(fixed, VectorValue::Double(values))
    }

    fn read_vector_object(&mut self) -> Result<Value, Error> {
        let (is_inline, remainder) = self.read_header()?;
        if !is_inline {
            return self.refs.objects.get(remainder as usize);
        }
        let count = remainder as usize;
        let fixed = self.cursor.read_byte()? != 0;
        let _class_name = self.read_string(true)?;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read_value()?);
        }
        self.push_vector(fixed, VectorValue::Object(values))
    }

    fn push_vector(&mut self, fixed: bool, values: VectorValue) -> Result<Value, Error> {
        let value = Value::Vector(Rc::new(RefCell::new(Vector { fixed, values })));
        self.refs.objects.push(value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn reader_for<'a>(cursor: &'a mut ByteCursor, refs: &'a mut RefTables) -> ValueReader<'a> {
        ValueReader::new(cursor, refs)
    }

    #[test]
    fn s1_primitive_double() {
        let mut cursor = ByteCursor::new(vec![0x05, 0x40, 0x09, 0x21, 0xFB, 0x54, 0x44, 0x2D, 0x18]);
        let mut refs = RefTables::new();
        let value = reader_for(&mut cursor, &mut refs).read_value().unwrap();
        assert_eq!(value.as_f64(), Some(std::f64::consts::PI));
    }

    #[test]
    fn s2_string_interning() {
        let mut cursor = ByteCursor::new(vec![0x06, 0x07, 0x66, 0x6F, 0x6F, 0x06, 0x00]);
        let mut refs = RefTables::new();
        let first = reader_for(&mut cursor, &mut refs).read_value().unwrap();
        let second = reader_for(&mut cursor, &mut refs).read_value().unwrap();
        assert_eq!(first.as_str(), Some("foo"));
        assert_eq!(second.as_str(), Some("foo"));
        assert_eq!(refs.strings.len(), 1);
    }

    #[test]
    fn s3_uint29_boundaries() {
        let cases: &[(&[u8], i32)] = &[
            (&[0x04, 0x7F], 127),
            (&[0x04, 0x81, 0x00], 128),
            (&[0x04, 0xC0, 0x80, 0x00], 0x10_00_00),
        ];
        for (bytes, expected) in cases {
            let mut cursor = ByteCursor::new(bytes.to_vec());
            let mut refs = RefTables::new();
            let value = reader_for(&mut cursor, &mut refs).read_value().unwrap();
            assert_eq!(value.as_i32(), Some(*expected));
        }
    }

    #[test]
    fn s4_array_mixed_keys() {
        // array, count=1, assoc "k"=42, terminator, dense [1]
        let bytes = vec![
            0x09, 0x03, 0x03, 0x6B, 0x04, 0x2A, 0x01, 0x04, 0x01,
        ];
        let mut cursor = ByteCursor::new(bytes);
        let mut refs = RefTables::new();
        let value = reader_for(&mut cursor, &mut refs).read_value().unwrap();
        let Value::Array(cell) = value else {
            panic!("expected array")
        };
        let arr = cell.borrow();
        assert_eq!(arr.named, vec![("k".to_string(), Value::Integer(42))]);
        assert_eq!(arr.dense, vec![Value::Integer(1)]);
    }

    #[test]
    fn negative_integer_sign_extension() {
        // -1 encoded as 29-bit all-ones: 0xBF 0xFF 0xFF 0xFF
        let mut cursor = ByteCursor::new(vec![0x04, 0xBF, 0xFF, 0xFF, 0xFF]);
        let mut refs = RefTables::new();
        let value = reader_for(&mut cursor, &mut refs).read_value().unwrap();
        assert_eq!(value.as_i32(), Some(-1));
    }

    #[test]
    fn unknown_marker_fails() {
        let mut cursor = ByteCursor::new(vec![0xFE]);
        let mut refs = RefTables::new();
        let err = reader_for(&mut cursor, &mut refs).read_value().unwrap_err();
        assert!(matches!(err, Error::UnknownMarker(0xFE)));
    }

    #[test]
    fn self_referencing_object_resolves_via_objects_table() {
        // new traits, no slots, dynamic: remainder bits -> is_dynamic, 0 slots
        // header byte pattern: 1 (inline) | 1 (new traits) | 1 (dynamic) | 0 (ext) | slot_count<<4
        // header value = 0b1011 = 0x0B -> uint29 single byte 0x0B
        // class name "": 0x01 (inline, len 0)
        // dynamic member: key "self" -> inline string, value: object ref to index 0
        let mut bytes = vec![MARKER_OBJECT, 0x0B, 0x01];
        // key "self"
        bytes.push(0x09); // (4<<1)|1
        bytes.extend_from_slice(b"self");
        // value: object reference to index 0 -> header (0<<1)|0 = 0x00
        bytes.push(MARKER_OBJECT);
        bytes.push(0x00);
        // terminator empty key
        bytes.push(0x01);

        let mut cursor = ByteCursor::new(bytes);
        let mut refs = RefTables::new();
        let value = reader_for(&mut cursor, &mut refs).read_value().unwrap();
        let Value::Object(cell) = value else {
            panic!("expected object")
        };
        let obj = cell.borrow();
        assert_eq!(obj.dynamic_members.len(), 1);
        assert_eq!(obj.dynamic_members[0].0, "self");
        let Value::Object(inner) = &obj.dynamic_members[0].1 else {
            panic!("expected object reference");
        };
        assert!(Rc::ptr_eq(inner, &cell));
    }
}
