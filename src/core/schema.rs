//! Flattening of a record type into an ordered list of column descriptors.

use std::any::Any;

use log::debug;

use crate::{
    core::{
        codec,
        config::SchemaConfig,
        reflect::{FieldShape, KeyedDecoder, Reflect, SequenceShape, Shape, ShapeKind, StructShape},
        tag::{self, FieldTag, IndexCount},
    },
    error::SchemaError,
};

/// Largest element count a header like `ints[N]` may grow a `Vec` to.
pub const MAX_GROWN_ELEMENTS: usize = 1 << 16;

/// One hop from a value to one of its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Declared field position inside a struct.
    Field(usize),
    /// Element position inside a sequence.
    Index(usize),
}

/// How a descriptor's cell text maps onto the leaf value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafForm {
    /// The cell holds one scalar.
    Value,
    /// The cell holds a whole sequence as a bracketed list literal.
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Emitted when encoding and matched when decoding.
    Column,
    /// Decode-only alternative for an indexed sequence written in list form.
    ListFallback,
}

/// A single column of the flattened schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub(crate) keys: Vec<String>,
    pub(crate) chain: Vec<Step>,
    pub(crate) default_value: Option<String>,
    pub(crate) omit_empty: bool,
    pub(crate) embedded: bool,
    pub(crate) form: LeafForm,
    pub(crate) role: Role,
    /// Observed-size element templates never make the input fail on absence.
    pub(crate) template: bool,
    /// Fixed lengths of the sequences crossed by each `Step::Index`, `None` when growable.
    pub(crate) index_bounds: Vec<Option<usize>>,
}

impl FieldDescriptor {
    /// Header names that map to this column. Never empty.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Key used for the header when encoding.
    pub fn first_key(&self) -> &str {
        self.keys.first().map(String::as_str).unwrap_or_default()
    }

    pub fn chain(&self) -> &[Step] {
        &self.chain
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    pub fn omit_empty(&self) -> bool {
        self.omit_empty
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    pub fn form(&self) -> LeafForm {
        self.form
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether a missing header for this field counts as unmatched.
    pub fn is_required(&self) -> bool {
        self.role == Role::Column
            && !self.template
            && !self.omit_empty
            && self.default_value.is_none()
    }

    pub fn matches(&self, header: &str) -> bool {
        self.keys.iter().any(|key| key == header)
    }

    /// Whether a column bound to `self` supplies `other`. A list column supplies every
    /// element of its sequence, and a plain column supplies any field sharing one of its keys.
    pub(crate) fn covers(&self, other: &FieldDescriptor) -> bool {
        match self.role {
            Role::ListFallback => other.chain.starts_with(&self.chain),
            Role::Column => {
                self.chain == other.chain || self.keys.iter().any(|key| other.matches(key))
            }
        }
    }

    /// Copy of an indexed descriptor with its element positions replaced by `indices`.
    /// Returns `None` when the counts differ, a fixed array would be overrun or a `Vec`
    /// would grow past [`MAX_GROWN_ELEMENTS`].
    pub(crate) fn reindexed(&self, indices: &[usize]) -> Option<FieldDescriptor> {
        if indices.len() != self.index_bounds.len() {
            return None;
        }
        let in_bounds = indices
            .iter()
            .zip(&self.index_bounds)
            .all(|(index, bound)| *index < bound.unwrap_or(MAX_GROWN_ELEMENTS));
        if !in_bounds {
            return None;
        }

        let mut remaining = indices.iter();
        let chain = self
            .chain
            .iter()
            .map(|step| match step {
                Step::Index(_) => remaining.next().map_or(*step, |index| Step::Index(*index)),
                field => *field,
            })
            .collect();
        let keys = self
            .keys
            .iter()
            .map(|key| render_indices(key, indices))
            .collect();

        Some(FieldDescriptor {
            keys,
            chain,
            template: false,
            ..self.clone()
        })
    }
}

/// Splits `name[3].inner[0]` into the template `name[].inner[]` and `[3, 0]`.
pub(crate) fn index_template(name: &str) -> (String, Vec<usize>) {
    let mut template = String::with_capacity(name.len());
    let mut indices = Vec::new();
    let mut rest = name;
    while let Some(open) = rest.find('[') {
        template.push_str(&rest[..=open]);
        let after = &rest[open + 1..];
        match after.find(']') {
            Some(close) if close > 0 && after[..close].bytes().all(|b| b.is_ascii_digit()) => {
                match after[..close].parse() {
                    Ok(index) => indices.push(index),
                    Err(_) => template.push_str(&after[..close]),
                }
                rest = &after[close..];
            }
            _ => rest = after,
        }
    }
    template.push_str(rest);
    (template, indices)
}

fn render_indices(key: &str, indices: &[usize]) -> String {
    let (template, found) = index_template(key);
    if found.len() != indices.len() {
        return key.to_string();
    }
    let mut rendered = String::with_capacity(key.len());
    let mut pieces = template.split("[]");
    if let Some(first) = pieces.next() {
        rendered.push_str(first);
    }
    for (piece, index) in pieces.zip(indices) {
        rendered.push_str(&format!("[{index}]"));
        rendered.push_str(piece);
    }
    rendered
}

/// How observed-size sequences are expanded.
pub enum Sizing<'a> {
    /// One template element per sequence, later extended by the header matcher.
    Decode,
    /// Element count reported by the callback for the sequence at the given chain.
    Encode(&'a dyn Fn(&[Step]) -> usize),
}

/// The flattened, ordered field descriptors of a record type.
#[derive(Debug)]
pub struct Schema {
    root: Shape,
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    pub fn for_decoding<T: Reflect>(config: &SchemaConfig) -> Result<Schema, SchemaError> {
        Schema::build(T::shape(), config, Sizing::Decode)
    }

    /// Observed-size sequences get as many columns as the longest one among `records`.
    pub fn for_encoding<T: Reflect>(
        config: &SchemaConfig,
        records: &[T],
    ) -> Result<Schema, SchemaError> {
        let root = T::shape();
        let measure = |chain: &[Step]| {
            records
                .iter()
                .map(|record| codec::sequence_len(record as &dyn Any, &root, chain))
                .max()
                .unwrap_or(0)
        };
        let fields = flatten(&root, config, Sizing::Encode(&measure))?;
        Ok(Schema { root, fields })
    }

    pub fn build(root: Shape, config: &SchemaConfig, sizing: Sizing<'_>) -> Result<Schema, SchemaError> {
        let fields = flatten(&root, config, sizing)?;
        Ok(Schema { root, fields })
    }

    pub fn root(&self) -> &Shape {
        &self.root
    }

    pub fn type_name(&self) -> &'static str {
        self.root.type_name()
    }

    /// Every descriptor, including decode-only list fallbacks.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Descriptors that are real columns, in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|field| field.role == Role::Column)
    }

    pub fn keyed_decoder(&self) -> Option<&KeyedDecoder> {
        self.root
            .strip_optional()
            .as_struct()
            .and_then(StructShape::keyed_decoder)
    }

    /// Finds the indexed descriptor an element header like `ints[5]` expands from.
    pub(crate) fn expand_indexed(&self, header: &str) -> Option<FieldDescriptor> {
        let (template, indices) = index_template(header);
        if indices.is_empty() {
            return None;
        }
        self.columns()
            .filter(|field| !field.index_bounds.is_empty())
            .find(|field| {
                field
                    .keys
                    .iter()
                    .any(|key| index_template(key).0 == template)
            })
            .and_then(|field| field.reindexed(&indices))
    }
}

fn flatten(
    root: &Shape,
    config: &SchemaConfig,
    sizing: Sizing<'_>,
) -> Result<Vec<FieldDescriptor>, SchemaError> {
    let Some(structure) = root.strip_optional().as_struct() else {
        return Err(SchemaError::NotAStruct {
            type_name: root.type_name(),
        });
    };

    let mut builder = Builder {
        config,
        sizing,
        fields: Vec::new(),
    };
    builder.walk_struct(structure, &[], &[], false, &[]);

    if builder.fields.is_empty() {
        return Err(SchemaError::NoTaggableFields {
            type_name: root.type_name(),
        });
    }
    debug!(
        "derived {} field descriptors for {}",
        builder.fields.len(),
        root.type_name()
    );
    Ok(builder.fields)
}

struct Builder<'a> {
    config: &'a SchemaConfig,
    sizing: Sizing<'a>,
    fields: Vec<FieldDescriptor>,
}

/// Position of the walk: chain so far, the keys of the enclosing struct and bounds of the
/// sequences already crossed.
struct Path<'p> {
    chain: &'p [Step],
    keys: &'p [String],
    embedded: bool,
    bounds: &'p [Option<usize>],
}

impl Builder<'_> {
    fn walk_struct(
        &mut self,
        structure: &StructShape,
        chain: &[Step],
        parent_keys: &[String],
        embedded: bool,
        bounds: &[Option<usize>],
    ) {
        for (position, field) in structure.fields().iter().enumerate() {
            let tag = tag::lookup(field.tag(), &self.config.tags.tag_name)
                .map(|value| tag::parse(&value, &self.config.tags.tag_separator))
                .unwrap_or_default();
            if tag.skip {
                continue;
            }

            let own_keys: Vec<String> = if tag.keys.is_empty() {
                vec![self.config.normalizer.apply(field.name())]
            } else {
                tag.keys
                    .iter()
                    .map(|key| self.config.normalizer.apply(key))
                    .collect()
            };

            let mut field_chain = chain.to_vec();
            field_chain.push(Step::Field(position));

            let target = field.shape().strip_optional();
            match target.kind() {
                ShapeKind::Struct(inner) if field.is_embedded() => {
                    self.walk_struct(inner, &field_chain, parent_keys, true, bounds);
                }
                ShapeKind::Struct(inner) => {
                    let keys = self.combine(parent_keys, &own_keys);
                    self.walk_struct(inner, &field_chain, &keys, embedded, bounds);
                }
                ShapeKind::Sequence(sequence) => {
                    let keys = self.combine(parent_keys, &own_keys);
                    let path = Path {
                        chain: &field_chain,
                        keys: &keys,
                        embedded: embedded || field.is_embedded(),
                        bounds,
                    };
                    self.walk_sequence(field, sequence, &tag, &path);
                }
                ShapeKind::Scalar(_) | ShapeKind::Optional(_) => {
                    let keys = self.combine(parent_keys, &own_keys);
                    let path = Path {
                        chain: &field_chain,
                        keys: &keys,
                        embedded,
                        bounds,
                    };
                    self.push(&path, &tag, LeafForm::Value, Role::Column, false);
                }
            }
        }
    }

    fn walk_sequence(
        &mut self,
        field: &FieldShape,
        sequence: &SequenceShape,
        tag: &FieldTag,
        path: &Path<'_>,
    ) {
        let index_tag = format!("{}[]", self.config.tags.tag_name);
        let Some(count) = tag::lookup(field.tag(), &index_tag).map(|value| IndexCount::parse(&value))
        else {
            self.push(path, tag, LeafForm::List, Role::Column, false);
            return;
        };

        let observed = count == IndexCount::Observed && sequence.fixed_len().is_none();
        let len = match (count, &self.sizing) {
            (IndexCount::Fixed(len), _) => len,
            (IndexCount::Observed, _) if sequence.fixed_len().is_some() => {
                sequence.fixed_len().unwrap_or_default()
            }
            (IndexCount::Observed, Sizing::Decode) => 1,
            (IndexCount::Observed, Sizing::Encode(measure)) => measure(path.chain),
        };
        let len = sequence.fixed_len().map_or(len, |fixed| len.min(fixed));

        if len == 0 {
            self.push(path, tag, LeafForm::List, Role::Column, false);
            return;
        }

        let mut bounds = path.bounds.to_vec();
        bounds.push(sequence.fixed_len());
        let element = sequence.element().strip_optional();
        for index in 0..len {
            let mut chain = path.chain.to_vec();
            chain.push(Step::Index(index));
            let keys: Vec<String> = path
                .keys
                .iter()
                .map(|key| format!("{key}[{index}]"))
                .collect();
            let element_path = Path {
                chain: &chain,
                keys: &keys,
                embedded: path.embedded,
                bounds: &bounds,
            };
            match element.kind() {
                ShapeKind::Struct(inner) => {
                    self.walk_struct(inner, &chain, &keys, path.embedded, &bounds)
                }
                ShapeKind::Sequence(_) => {
                    self.push(&element_path, tag, LeafForm::List, Role::Column, observed)
                }
                ShapeKind::Scalar(_) | ShapeKind::Optional(_) => {
                    self.push(&element_path, tag, LeafForm::Value, Role::Column, observed)
                }
            }
        }

        if matches!(self.sizing, Sizing::Decode) {
            self.push(path, tag, LeafForm::List, Role::ListFallback, false);
        }
    }

    fn push(&mut self, path: &Path<'_>, tag: &FieldTag, form: LeafForm, role: Role, template: bool) {
        self.fields.push(FieldDescriptor {
            keys: path.keys.to_vec(),
            chain: path.chain.to_vec(),
            default_value: tag.default_value.clone(),
            omit_empty: tag.omit_empty,
            embedded: path.embedded,
            form,
            role,
            template,
            index_bounds: path.bounds.to_vec(),
        });
    }

    /// Cartesian product of parent and child keys.
    fn combine(&self, parents: &[String], children: &[String]) -> Vec<String> {
        if parents.is_empty() {
            return children.to_vec();
        }
        parents
            .iter()
            .flat_map(|parent| {
                children
                    .iter()
                    .map(move |child| format!("{parent}{}{child}", self.config.tags.key_combiner))
            })
            .collect()
    }
}
