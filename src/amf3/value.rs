use ordered_float::OrderedFloat;
use std::cell::RefCell;
use std::rc::Rc;

/// A trait descriptor: the class name, dynamic/externalizable flags, and
/// the fixed slot names for sealed members. Interned in the traits
/// reference table the same way objects are interned in the objects table.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Trait {
    pub class_name: Option<String>,
    pub is_dynamic: bool,
    pub is_externalizable: bool,
    pub slot_names: Vec<String>,
}

/// A heterogeneous AMF3 array: a contiguous dense portion indexed `0..n`,
/// plus a named (associative) portion that preserves decode order.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct AmfArray {
    pub dense: Vec<Value>,
    pub named: Vec<(String, Value)>,
}

/// A typed vector: every element shares a declared primitive kind, plus a
/// `fixed` flag carried through from the wire but not otherwise enforced.
#[derive(Clone, PartialEq, Debug)]
pub enum VectorValue {
    Int(Vec<i32>),
    UInt(Vec<u32>),
    Double(Vec<f64>),
    Object(Vec<Value>),
}

#[derive(Clone, PartialEq, Debug)]
pub struct Vector {
    pub fixed: bool,
    pub values: VectorValue,
}

/// A decoded AMF3 value.
///
/// Complex kinds that participate in the objects reference table (object,
/// array, dictionary, vector, byte array, xml) are wrapped in `Rc<RefCell<_>>`
/// "arena slots": the cell is what gets interned, so a later back-reference
/// to an in-progress object (including a self-reference) resolves to the
/// same shared cell rather than requiring the object to be fully built
/// before it can be referenced. Structural equality and `Debug` on these
/// slots assume the referenced graph is acyclic; the producer this decoder
/// targets never emits cycles in practice.
#[derive(Clone, Debug)]
pub enum Value {
    Undefined,
    Null,
    Boolean(bool),
    Integer(i32),
    Double(OrderedFloat<f64>),
    String(Rc<str>),
    Xml(Rc<RefCell<String>>),
    Date(OrderedFloat<f64>),
    ByteArray(Rc<RefCell<Vec<u8>>>),
    Array(Rc<RefCell<AmfArray>>),
    Object(Rc<RefCell<Object>>),
    Dictionary(Rc<RefCell<Dictionary>>),
    Vector(Rc<RefCell<Vector>>),
}

/// A traited object: the interned `Trait` it was decoded with, the values
/// for each fixed slot in declaration order, and any dynamic (extra)
/// members appended after the sealed members.
#[derive(Clone, PartialEq, Debug)]
pub struct Object {
    pub class_trait: Rc<Trait>,
    pub sealed_members: Vec<Value>,
    pub dynamic_members: Vec<(String, Value)>,
}

/// An AMF3 dictionary: key/value pairs where keys may themselves be complex
/// values, plus the `weak_keys` flag carried through from the wire.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Dictionary {
    pub weak_keys: bool,
    pub entries: Vec<(Value, Value)>,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Undefined, Undefined) | (Null, Null) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Double(a), Double(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Xml(a), Xml(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Date(a), Date(b)) => a == b,
            (ByteArray(a), ByteArray(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Array(a), Array(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Object(a), Object(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Dictionary(a), Dictionary(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Vector(a), Vector(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            _ => false,
        }
    }
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(d.into_inner()),
            Value::Date(d) => Some(d.into_inner()),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn string_values_compare_by_content() {
        let a = Value::String(Rc::from("abc"));
        let b = Value::String(Rc::from("abc"));
        assert_eq!(a, b);
    }

    #[test]
    fn as_f64_covers_numeric_kinds() {
        assert_eq!(Value::Integer(7).as_f64(), Some(7.0));
        assert_eq!(Value::Double(OrderedFloat(1.5)).as_f64(), Some(1.5));
        assert_eq!(Value::Null.as_f64(), None);
    }

    fn make_object(id: i32) -> Value {
        Value::Object(Rc::new(RefCell::new(Object {
            class_trait: Rc::new(Trait {
                class_name: None,
                is_dynamic: true,
                is_externalizable: false,
                slot_names: Vec::new(),
            }),
            sealed_members: Vec::new(),
            dynamic_members: vec![("id".to_string(), Value::Integer(id))],
        })))
    }

    #[test]
    fn objects_compare_structurally() {
        assert_eq!(make_object(1), make_object(1));
        assert_ne!(make_object(1), make_object(2));
    }

    #[test]
    fn object_equals_itself_by_pointer_without_recursing() {
        let a = make_object(1);
        assert_eq!(a, a.clone());
    }
}
