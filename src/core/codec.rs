//! Cell level conversion between text and values reached through a descriptor chain.

use std::any::Any;

use serde_json::{Map, Value};

use crate::{
    core::{
        reflect::{SequenceShape, Shape, ShapeKind},
        schema::{FieldDescriptor, LeafForm, MAX_GROWN_ELEMENTS, Step},
        scalar::ScalarKind,
    },
    error::ConversionError,
};

fn mismatch(shape: &Shape) -> ConversionError {
    ConversionError::TypeMismatch {
        expected: shape.type_name(),
    }
}

/// Writes `text` into the field `field` of `root`.
///
/// An empty cell never allocates: unset optionals and missing sequence elements on the way to
/// the leaf are left untouched.
pub fn assign(
    root: &mut dyn Any,
    shape: &Shape,
    field: &FieldDescriptor,
    text: &str,
) -> Result<(), ConversionError> {
    let text = match (text.is_empty(), field.default_value()) {
        (true, Some(default)) => default,
        _ => text,
    };
    if text.is_empty() && field.omit_empty() {
        return Ok(());
    }
    let empty = text.is_empty();

    let mut current = root;
    let mut current_shape = shape;
    for step in field.chain() {
        let Some((target, target_shape)) = enter_optional(current, current_shape, empty)? else {
            return Ok(());
        };
        match (step, target_shape.kind()) {
            (Step::Field(position), ShapeKind::Struct(structure)) => {
                let child = structure
                    .field(*position)
                    .ok_or_else(|| mismatch(target_shape))?;
                current = child
                    .get_mut(target)
                    .ok_or_else(|| mismatch(target_shape))?;
                current_shape = child.shape();
            }
            (Step::Index(index), ShapeKind::Sequence(sequence)) => {
                if sequence.len(&*target) <= *index {
                    if empty {
                        return Ok(());
                    }
                    let len = index
                        .checked_add(1)
                        .filter(|len| *len <= MAX_GROWN_ELEMENTS)
                        .ok_or(ConversionError::IndexOutOfBounds {
                            index: *index,
                            len: MAX_GROWN_ELEMENTS,
                        })?;
                    sequence.grow(&mut *target, len)?;
                }
                current = sequence
                    .get_mut(target, *index)
                    .ok_or_else(|| mismatch(target_shape))?;
                current_shape = sequence.element();
            }
            _ => return Err(mismatch(target_shape)),
        }
    }

    let Some((target, target_shape)) = enter_optional(current, current_shape, empty)? else {
        return Ok(());
    };
    match field.form() {
        LeafForm::Value => decode_into(target, target_shape, text),
        LeafForm::List => match target_shape.kind() {
            ShapeKind::Sequence(sequence) => decode_list(target, sequence, text),
            _ => decode_into(target, target_shape, text),
        },
    }
}

/// Decodes a standalone value, such as a map key or value.
pub fn decode_value(target: &mut dyn Any, shape: &Shape, text: &str) -> Result<(), ConversionError> {
    let Some((target, shape)) = enter_optional(target, shape, text.is_empty())? else {
        return Ok(());
    };
    decode_into(target, shape, text)
}

fn enter_optional<'a, 's>(
    mut value: &'a mut dyn Any,
    mut shape: &'s Shape,
    empty: bool,
) -> Result<Option<(&'a mut dyn Any, &'s Shape)>, ConversionError> {
    while let ShapeKind::Optional(optional) = shape.kind() {
        if empty {
            match optional.get_mut(value) {
                Some(inner) => value = inner,
                None => return Ok(None),
            }
        } else {
            value = optional.get_or_insert(value)?;
        }
        shape = optional.inner();
    }
    Ok(Some((value, shape)))
}

fn decode_into(target: &mut dyn Any, shape: &Shape, text: &str) -> Result<(), ConversionError> {
    match shape.kind() {
        ShapeKind::Scalar(scalar) => scalar.parse(target, text),
        ShapeKind::Sequence(sequence) => decode_list(target, sequence, text),
        ShapeKind::Optional(_) => decode_value(target, shape, text),
        ShapeKind::Struct(_) => Err(mismatch(shape)),
    }
}

/// Fills a sequence from a JSON list literal such as `[1,2,3]`. `""` and `null` clear it.
fn decode_list(
    target: &mut dyn Any,
    sequence: &SequenceShape,
    text: &str,
) -> Result<(), ConversionError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "null" {
        sequence.clear(target);
        return Ok(());
    }
    let value: Value = serde_json::from_str(trimmed).map_err(|source| ConversionError::List {
        value: text.to_string(),
        source,
    })?;
    from_json_sequence(target, sequence, &value)
}

fn from_json_sequence(
    target: &mut dyn Any,
    sequence: &SequenceShape,
    value: &Value,
) -> Result<(), ConversionError> {
    let items = match value {
        Value::Null => {
            sequence.clear(target);
            return Ok(());
        }
        Value::Array(items) => items,
        _ => return Err(mismatch(sequence.element())),
    };
    sequence.clear(&mut *target);
    sequence.grow(&mut *target, items.len())?;
    for (index, item) in items.iter().enumerate() {
        let slot = sequence
            .get_mut(&mut *target, index)
            .ok_or_else(|| mismatch(sequence.element()))?;
        from_json(slot, sequence.element(), item)?;
    }
    Ok(())
}

fn from_json(target: &mut dyn Any, shape: &Shape, value: &Value) -> Result<(), ConversionError> {
    match shape.kind() {
        ShapeKind::Optional(optional) => {
            if value.is_null() {
                return Ok(());
            }
            let inner = optional.get_or_insert(target)?;
            from_json(inner, optional.inner(), value)
        }
        ShapeKind::Scalar(scalar) => {
            let text = match value {
                Value::String(text) => text.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            scalar.parse(target, &text)
        }
        ShapeKind::Sequence(sequence) => from_json_sequence(target, sequence, value),
        ShapeKind::Struct(structure) => {
            let object = match value {
                Value::Null => return Ok(()),
                Value::Object(object) => object,
                _ => return Err(mismatch(shape)),
            };
            for field in structure.fields() {
                if let Some(item) = object.get(field.name()) {
                    let slot = field
                        .get_mut(&mut *target)
                        .ok_or_else(|| mismatch(shape))?;
                    from_json(slot, field.shape(), item)?;
                }
            }
            Ok(())
        }
    }
}

/// Renders the field `field` of `root`. Unset optionals and missing elements render as `""`.
pub fn extract(root: &dyn Any, shape: &Shape, field: &FieldDescriptor) -> Result<String, ConversionError> {
    let Some((value, value_shape)) = walk(root, shape, field.chain())? else {
        return Ok(String::new());
    };
    match value_shape.kind() {
        ShapeKind::Scalar(scalar) => {
            if field.omit_empty() && scalar.is_zero(value) {
                return Ok(String::new());
            }
            scalar.format(value)
        }
        ShapeKind::Sequence(sequence) => {
            if field.omit_empty() && sequence.len(value) == 0 {
                return Ok(String::new());
            }
            Ok(to_json(value, value_shape)?.to_string())
        }
        ShapeKind::Struct(_) => Ok(to_json(value, value_shape)?.to_string()),
        ShapeKind::Optional(_) => Err(mismatch(value_shape)),
    }
}

/// Renders a standalone value, such as a map key or value.
pub fn encode_value(value: &dyn Any, shape: &Shape) -> Result<String, ConversionError> {
    let Some((value, shape)) = skip_optional(value, shape) else {
        return Ok(String::new());
    };
    match shape.kind() {
        ShapeKind::Scalar(scalar) => scalar.format(value),
        _ => Ok(to_json(value, shape)?.to_string()),
    }
}

/// Length of the sequence at `chain`, or 0 when it cannot be reached.
pub fn sequence_len(root: &dyn Any, shape: &Shape, chain: &[Step]) -> usize {
    match walk(root, shape, chain) {
        Ok(Some((value, value_shape))) => match value_shape.kind() {
            ShapeKind::Sequence(sequence) => sequence.len(value),
            _ => 0,
        },
        _ => 0,
    }
}

fn walk<'a, 's>(
    root: &'a dyn Any,
    shape: &'s Shape,
    chain: &[Step],
) -> Result<Option<(&'a dyn Any, &'s Shape)>, ConversionError> {
    let mut current = root;
    let mut current_shape = shape;
    for step in chain {
        let Some((value, value_shape)) = skip_optional(current, current_shape) else {
            return Ok(None);
        };
        match (step, value_shape.kind()) {
            (Step::Field(position), ShapeKind::Struct(structure)) => {
                let child = structure
                    .field(*position)
                    .ok_or_else(|| mismatch(value_shape))?;
                current = child.get(value).ok_or_else(|| mismatch(value_shape))?;
                current_shape = child.shape();
            }
            (Step::Index(index), ShapeKind::Sequence(sequence)) => {
                match sequence.get(value, *index) {
                    Some(element) => current = element,
                    None => return Ok(None),
                }
                current_shape = sequence.element();
            }
            _ => return Err(mismatch(value_shape)),
        }
    }
    Ok(skip_optional(current, current_shape))
}

fn skip_optional<'a, 's>(
    mut value: &'a dyn Any,
    mut shape: &'s Shape,
) -> Option<(&'a dyn Any, &'s Shape)> {
    while let ShapeKind::Optional(optional) = shape.kind() {
        value = optional.get(value)?;
        shape = optional.inner();
    }
    Some((value, shape))
}

/// JSON form used for list cells: numbers and booleans bare, text quoted, structs as objects
/// keyed by declared field name.
fn to_json(value: &dyn Any, shape: &Shape) -> Result<Value, ConversionError> {
    match shape.kind() {
        ShapeKind::Scalar(scalar) => {
            let text = scalar.format(value)?;
            Ok(match scalar.kind() {
                ScalarKind::Integer | ScalarKind::Float => match serde_json::from_str(&text) {
                    Ok(number @ Value::Number(_)) => number,
                    _ => Value::String(text),
                },
                ScalarKind::Bool => Value::Bool(text == "true"),
                ScalarKind::Text | ScalarKind::Custom => Value::String(text),
            })
        }
        ShapeKind::Optional(optional) => match optional.get(value) {
            Some(inner) => to_json(inner, optional.inner()),
            None => Ok(Value::Null),
        },
        ShapeKind::Sequence(sequence) => (0..sequence.len(value))
            .filter_map(|index| sequence.get(value, index))
            .map(|element| to_json(element, sequence.element()))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        ShapeKind::Struct(structure) => {
            let mut object = Map::new();
            for field in structure.fields() {
                let child = field.get(value).ok_or_else(|| mismatch(shape))?;
                object.insert(field.name().to_string(), to_json(child, field.shape())?);
            }
            Ok(Value::Object(object))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{config::SchemaConfig, reflect::Reflect, schema::Schema},
        record,
    };

    #[derive(Debug, Default, PartialEq)]
    struct Part {
        name: String,
        qty: u16,
    }

    record! { Part { name, qty } }

    #[derive(Debug, Default, PartialEq)]
    struct Order {
        id: i64,
        note: Option<String>,
        count: Option<u8>,
        tags: Vec<String>,
        parts: Vec<Part>,
        slots: Vec<i32>,
        flag: bool,
        price: f64,
    }

    record! {
        Order {
            id: r#"csv:"id""#,
            note: r#"csv:"note""#,
            count: r#"csv:"count,default=3""#,
            tags: r#"csv:"tags""#,
            parts: r#"csv:"parts""#,
            slots: r#"csv:"slot" csv[]:"2""#,
            flag: r#"csv:"flag,omitempty""#,
            price: r#"csv:"price""#,
        }
    }

    fn schema() -> Schema {
        Schema::for_decoding::<Order>(&SchemaConfig::default()).unwrap()
    }

    fn field<'a>(schema: &'a Schema, key: &str) -> &'a FieldDescriptor {
        schema.fields().iter().find(|f| f.first_key() == key).unwrap()
    }

    #[test]
    fn assigns_scalars_and_optionals() {
        let schema = schema();
        let mut order = Order::default();
        assign(&mut order, schema.root(), field(&schema, "id"), "42").unwrap();
        assign(&mut order, schema.root(), field(&schema, "note"), "rush").unwrap();
        assign(&mut order, schema.root(), field(&schema, "price"), "9.5").unwrap();
        assert_eq!(order.id, 42);
        assert_eq!(order.note.as_deref(), Some("rush"));
        assert_eq!(order.price, 9.5);
    }

    #[test]
    fn empty_cells_do_not_allocate() {
        let schema = schema();
        let mut order = Order::default();
        assign(&mut order, schema.root(), field(&schema, "note"), "").unwrap();
        assign(&mut order, schema.root(), field(&schema, "slot[1]"), "").unwrap();
        assert_eq!(order.note, None);
        assert!(order.slots.is_empty());
    }

    #[test]
    fn defaults_fill_empty_cells() {
        let schema = schema();
        let mut order = Order::default();
        assign(&mut order, schema.root(), field(&schema, "count"), "").unwrap();
        assert_eq!(order.count, Some(3));
    }

    #[test]
    fn indexed_elements_grow_the_sequence() {
        let schema = schema();
        let mut order = Order::default();
        assign(&mut order, schema.root(), field(&schema, "slot[1]"), "7").unwrap();
        assert_eq!(order.slots, vec![0, 7]);
    }

    #[test]
    fn oversized_indices_never_grow_the_sequence() {
        let schema = schema();
        let mut order = Order::default();
        for index in [usize::MAX, MAX_GROWN_ELEMENTS] {
            let mut slot = field(&schema, "slot[0]").clone();
            slot.chain = vec![Step::Field(5), Step::Index(index)];
            let err = assign(&mut order, schema.root(), &slot, "7").unwrap_err();
            assert!(matches!(
                err,
                ConversionError::IndexOutOfBounds { index: i, len } if i == index && len == MAX_GROWN_ELEMENTS
            ));
        }
        assert!(order.slots.is_empty());
    }

    #[test]
    fn list_literals_decode_into_sequences() {
        let schema = schema();
        let mut order = Order::default();
        assign(&mut order, schema.root(), field(&schema, "tags"), r#"["a","b"]"#).unwrap();
        assign(
            &mut order,
            schema.root(),
            field(&schema, "parts"),
            r#"[{"name":"bolt","qty":4},{"name":"nut","qty":"2"}]"#,
        )
        .unwrap();
        assert_eq!(order.tags, vec!["a", "b"]);
        assert_eq!(
            order.parts,
            vec![
                Part { name: "bolt".into(), qty: 4 },
                Part { name: "nut".into(), qty: 2 }
            ]
        );
        assign(&mut order, schema.root(), field(&schema, "tags"), "null").unwrap();
        assert!(order.tags.is_empty());
    }

    #[test]
    fn bad_values_carry_their_text() {
        let schema = schema();
        let mut order = Order::default();
        let err = assign(&mut order, schema.root(), field(&schema, "id"), "BAD_INPUT").unwrap_err();
        assert!(matches!(
            err,
            ConversionError::Parse { ref value, type_name: "i64", .. } if value == "BAD_INPUT"
        ));
        let err = assign(&mut order, schema.root(), field(&schema, "tags"), "[oops").unwrap_err();
        assert!(matches!(err, ConversionError::List { .. }));
    }

    #[test]
    fn extracts_values_lists_and_blanks() {
        let schema = schema();
        let order = Order {
            id: 1,
            note: None,
            count: Some(5),
            tags: vec!["x".into()],
            parts: vec![Part { name: "gear".into(), qty: 1 }],
            slots: vec![9],
            flag: false,
            price: 0.25,
        };
        let render = |key| extract(&order, schema.root(), field(&schema, key)).unwrap();
        assert_eq!(render("id"), "1");
        assert_eq!(render("note"), "");
        assert_eq!(render("count"), "5");
        assert_eq!(render("tags"), r#"["x"]"#);
        assert_eq!(render("parts"), r#"[{"name":"gear","qty":1}]"#);
        assert_eq!(render("slot[0]"), "9");
        assert_eq!(render("slot[1]"), "");
        assert_eq!(render("flag"), "");
        assert_eq!(render("price"), "0.25");
    }

    #[test]
    fn standalone_values() {
        let mut ints = Vec::<i32>::new();
        decode_value(&mut ints, &Vec::<i32>::shape(), "[1, 2, 3]").unwrap();
        assert_eq!(ints, vec![1, 2, 3]);
        assert_eq!(encode_value(&ints, &Vec::<i32>::shape()).unwrap(), "[1,2,3]");
        assert_eq!(encode_value(&Some(4u8), &Option::<u8>::shape()).unwrap(), "4");
    }
}
