//! Explicit type descriptions used in place of runtime reflection.
//!
//! Every type that can appear in a record implements [`Reflect`] and hands out a [`Shape`]:
//! an owned tree describing how to reach, create and convert its values through `dyn Any`.
//! Records are usually described with the [`record!`](crate::record) macro and leaf types with
//! [`scalar!`](crate::scalar).

use std::{
    any::{Any, type_name},
    fmt,
    sync::Arc,
};

use crate::{
    core::scalar::{CsvScalar, ScalarKind},
    error::{BoxError, ConversionError},
};

/// A type whose structure can be described to the schema builder.
pub trait Reflect: Any {
    fn shape() -> Shape;
}

/// Whole-record decoding hook: receives the record, the matched key and the raw cell.
pub type KeyedDecoder =
    Arc<dyn Fn(&mut dyn Any, &str, &str) -> Result<(), BoxError> + Send + Sync>;

type Getter = Box<dyn Fn(&dyn Any) -> Option<&dyn Any> + Send + Sync>;
type GetterMut = Box<dyn Fn(&mut dyn Any) -> Option<&mut dyn Any> + Send + Sync>;

/// Owned description of one type.
pub struct Shape {
    type_name: &'static str,
    kind: ShapeKind,
}

pub enum ShapeKind {
    Scalar(ScalarShape),
    Optional(OptionalShape),
    Sequence(SequenceShape),
    Struct(StructShape),
}

impl Shape {
    pub fn scalar<T: CsvScalar>() -> Shape {
        Shape {
            type_name: type_name::<T>(),
            kind: ShapeKind::Scalar(ScalarShape {
                kind: T::KIND,
                parse: parse_scalar::<T>,
                format: format_scalar::<T>,
                is_zero: scalar_is_zero::<T>,
            }),
        }
    }

    pub fn optional<T: Reflect + Default>() -> Shape {
        Shape {
            type_name: type_name::<Option<T>>(),
            kind: ShapeKind::Optional(OptionalShape {
                inner: Box::new(T::shape()),
                get: option_get::<T>,
                get_mut: option_get_mut::<T>,
                get_or_insert: option_get_or_insert::<T>,
            }),
        }
    }

    pub fn vec<T: Reflect + Default>() -> Shape {
        Shape {
            type_name: type_name::<Vec<T>>(),
            kind: ShapeKind::Sequence(SequenceShape {
                element: Box::new(T::shape()),
                fixed_len: None,
                len: vec_len::<T>,
                get: vec_get::<T>,
                get_mut: vec_get_mut::<T>,
                grow: vec_grow::<T>,
                clear: vec_clear::<T>,
            }),
        }
    }

    pub fn array<T: Reflect, const N: usize>() -> Shape {
        Shape {
            type_name: type_name::<[T; N]>(),
            kind: ShapeKind::Sequence(SequenceShape {
                element: Box::new(T::shape()),
                fixed_len: Some(N),
                len: array_len::<T, N>,
                get: array_get::<T, N>,
                get_mut: array_get_mut::<T, N>,
                grow: array_grow::<T, N>,
                clear: array_clear,
            }),
        }
    }

    /// Describes a struct `S` by its ordered fields.
    pub fn structure<S: Any>(fields: Vec<FieldShape>) -> Shape {
        Shape {
            type_name: type_name::<S>(),
            kind: ShapeKind::Struct(StructShape {
                fields,
                keyed_decoder: None,
            }),
        }
    }

    /// Installs a whole-record decoder on a struct shape. Every matched column of a row is
    /// then routed through `hook` instead of the per-field codec.
    pub fn with_keyed_decoder<S: Any>(
        mut self,
        hook: fn(&mut S, &str, &str) -> Result<(), BoxError>,
    ) -> Shape {
        if let ShapeKind::Struct(structure) = &mut self.kind {
            let decoder: KeyedDecoder = Arc::new(move |record: &mut dyn Any, key, value| {
                match record.downcast_mut::<S>() {
                    Some(record) => hook(record, key, value),
                    None => Err(Box::new(ConversionError::TypeMismatch {
                        expected: type_name::<S>(),
                    })),
                }
            });
            structure.keyed_decoder = Some(decoder);
        }
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    /// Follows `Option` layers down to the first non-optional shape.
    pub fn strip_optional(&self) -> &Shape {
        let mut shape = self;
        while let ShapeKind::Optional(optional) = &shape.kind {
            shape = optional.inner();
        }
        shape
    }

    pub fn as_struct(&self) -> Option<&StructShape> {
        match &self.kind {
            ShapeKind::Struct(structure) => Some(structure),
            _ => None,
        }
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            ShapeKind::Scalar(_) => "scalar",
            ShapeKind::Optional(_) => "optional",
            ShapeKind::Sequence(_) => "sequence",
            ShapeKind::Struct(_) => "struct",
        };
        f.debug_struct("Shape")
            .field("type_name", &self.type_name)
            .field("kind", &kind)
            .finish()
    }
}

pub struct ScalarShape {
    kind: ScalarKind,
    parse: fn(&mut dyn Any, &str) -> Result<(), ConversionError>,
    format: fn(&dyn Any) -> Result<String, ConversionError>,
    is_zero: fn(&dyn Any) -> bool,
}

impl ScalarShape {
    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn parse(&self, target: &mut dyn Any, text: &str) -> Result<(), ConversionError> {
        (self.parse)(target, text)
    }

    pub fn format(&self, value: &dyn Any) -> Result<String, ConversionError> {
        (self.format)(value)
    }

    pub fn is_zero(&self, value: &dyn Any) -> bool {
        (self.is_zero)(value)
    }
}

pub struct OptionalShape {
    inner: Box<Shape>,
    get: fn(&dyn Any) -> Option<&dyn Any>,
    get_mut: fn(&mut dyn Any) -> Option<&mut dyn Any>,
    get_or_insert: fn(&mut dyn Any) -> Result<&mut dyn Any, ConversionError>,
}

impl OptionalShape {
    pub fn inner(&self) -> &Shape {
        &self.inner
    }

    /// Present value, or `None` when unset.
    pub fn get<'a>(&self, value: &'a dyn Any) -> Option<&'a dyn Any> {
        (self.get)(value)
    }

    pub fn get_mut<'a>(&self, value: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        (self.get_mut)(value)
    }

    /// Allocates the default inner value when unset.
    pub fn get_or_insert<'a>(
        &self,
        value: &'a mut dyn Any,
    ) -> Result<&'a mut dyn Any, ConversionError> {
        (self.get_or_insert)(value)
    }
}

pub struct SequenceShape {
    element: Box<Shape>,
    fixed_len: Option<usize>,
    len: fn(&dyn Any) -> usize,
    get: fn(&dyn Any, usize) -> Option<&dyn Any>,
    get_mut: fn(&mut dyn Any, usize) -> Option<&mut dyn Any>,
    grow: fn(&mut dyn Any, usize) -> Result<(), ConversionError>,
    clear: fn(&mut dyn Any),
}

impl SequenceShape {
    pub fn element(&self) -> &Shape {
        &self.element
    }

    /// `Some(N)` for `[T; N]`, `None` for growable sequences.
    pub fn fixed_len(&self) -> Option<usize> {
        self.fixed_len
    }

    pub fn len(&self, value: &dyn Any) -> usize {
        (self.len)(value)
    }

    pub fn get<'a>(&self, value: &'a dyn Any, index: usize) -> Option<&'a dyn Any> {
        (self.get)(value, index)
    }

    pub fn get_mut<'a>(&self, value: &'a mut dyn Any, index: usize) -> Option<&'a mut dyn Any> {
        (self.get_mut)(value, index)
    }

    /// Ensures the sequence holds at least `len` elements.
    pub fn grow(&self, value: &mut dyn Any, len: usize) -> Result<(), ConversionError> {
        (self.grow)(value, len)
    }

    pub fn clear(&self, value: &mut dyn Any) {
        (self.clear)(value)
    }
}

pub struct StructShape {
    fields: Vec<FieldShape>,
    keyed_decoder: Option<KeyedDecoder>,
}

impl StructShape {
    pub fn fields(&self) -> &[FieldShape] {
        &self.fields
    }

    pub fn field(&self, position: usize) -> Option<&FieldShape> {
        self.fields.get(position)
    }

    pub fn keyed_decoder(&self) -> Option<&KeyedDecoder> {
        self.keyed_decoder.as_ref()
    }
}

/// One declared field of a struct: its name, raw tag string and erased accessors.
pub struct FieldShape {
    name: &'static str,
    tag: &'static str,
    embedded: bool,
    shape: Shape,
    get: Getter,
    get_mut: GetterMut,
}

impl FieldShape {
    pub fn new<S, F, G, M>(
        name: &'static str,
        tag: &'static str,
        embedded: bool,
        get: G,
        get_mut: M,
    ) -> FieldShape
    where
        S: Any,
        F: Reflect,
        G: Fn(&S) -> &F + Send + Sync + 'static,
        M: Fn(&mut S) -> &mut F + Send + Sync + 'static,
    {
        FieldShape {
            name,
            tag,
            embedded,
            shape: F::shape(),
            get: getter(move |value| {
                value
                    .downcast_ref::<S>()
                    .map(|record| get(record) as &dyn Any)
            }),
            get_mut: getter_mut(move |value| {
                value
                    .downcast_mut::<S>()
                    .map(|record| get_mut(record) as &mut dyn Any)
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn get<'a>(&self, record: &'a dyn Any) -> Option<&'a dyn Any> {
        (self.get)(record)
    }

    pub fn get_mut<'a>(&self, record: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        (self.get_mut)(record)
    }
}

impl fmt::Debug for FieldShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldShape")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("embedded", &self.embedded)
            .field("shape", &self.shape)
            .finish()
    }
}

fn getter<G>(get: G) -> Getter
where
    G: Fn(&dyn Any) -> Option<&dyn Any> + Send + Sync + 'static,
{
    Box::new(get)
}

fn getter_mut<G>(get: G) -> GetterMut
where
    G: Fn(&mut dyn Any) -> Option<&mut dyn Any> + Send + Sync + 'static,
{
    Box::new(get)
}

fn mismatch<T>() -> ConversionError {
    ConversionError::TypeMismatch {
        expected: type_name::<T>(),
    }
}

fn parse_scalar<T: CsvScalar>(target: &mut dyn Any, text: &str) -> Result<(), ConversionError> {
    let slot = target.downcast_mut::<T>().ok_or_else(mismatch::<T>)?;
    *slot = T::from_csv(text).map_err(|source| match T::KIND {
        ScalarKind::Custom => ConversionError::Hook(source),
        _ => ConversionError::Parse {
            value: text.to_string(),
            type_name: type_name::<T>(),
            source,
        },
    })?;
    Ok(())
}

fn format_scalar<T: CsvScalar>(value: &dyn Any) -> Result<String, ConversionError> {
    let value = value.downcast_ref::<T>().ok_or_else(mismatch::<T>)?;
    value.to_csv().map_err(|source| match T::KIND {
        ScalarKind::Custom => ConversionError::Hook(source),
        _ => ConversionError::Format {
            type_name: type_name::<T>(),
            source,
        },
    })
}

fn scalar_is_zero<T: CsvScalar>(value: &dyn Any) -> bool {
    value.downcast_ref::<T>().is_some_and(CsvScalar::is_zero)
}

fn option_get<T: Reflect>(value: &dyn Any) -> Option<&dyn Any> {
    let inner: &T = value.downcast_ref::<Option<T>>()?.as_ref()?;
    Some(inner)
}

fn option_get_mut<T: Reflect>(value: &mut dyn Any) -> Option<&mut dyn Any> {
    let inner: &mut T = value.downcast_mut::<Option<T>>()?.as_mut()?;
    Some(inner)
}

fn option_get_or_insert<T: Reflect + Default>(
    value: &mut dyn Any,
) -> Result<&mut dyn Any, ConversionError> {
    let slot = value
        .downcast_mut::<Option<T>>()
        .ok_or_else(mismatch::<Option<T>>)?;
    let inner: &mut T = slot.get_or_insert_with(T::default);
    Ok(inner)
}

fn vec_len<T: Reflect>(value: &dyn Any) -> usize {
    value.downcast_ref::<Vec<T>>().map_or(0, Vec::len)
}

fn vec_get<T: Reflect>(value: &dyn Any, index: usize) -> Option<&dyn Any> {
    let element: &T = value.downcast_ref::<Vec<T>>()?.get(index)?;
    Some(element)
}

fn vec_get_mut<T: Reflect>(value: &mut dyn Any, index: usize) -> Option<&mut dyn Any> {
    let element: &mut T = value.downcast_mut::<Vec<T>>()?.get_mut(index)?;
    Some(element)
}

fn vec_grow<T: Reflect + Default>(value: &mut dyn Any, len: usize) -> Result<(), ConversionError> {
    let items = value
        .downcast_mut::<Vec<T>>()
        .ok_or_else(mismatch::<Vec<T>>)?;
    if items.len() < len {
        items.resize_with(len, T::default);
    }
    Ok(())
}

fn vec_clear<T: Reflect>(value: &mut dyn Any) {
    if let Some(items) = value.downcast_mut::<Vec<T>>() {
        items.clear();
    }
}

fn array_len<T: Reflect, const N: usize>(value: &dyn Any) -> usize {
    if value.is::<[T; N]>() { N } else { 0 }
}

fn array_get<T: Reflect, const N: usize>(value: &dyn Any, index: usize) -> Option<&dyn Any> {
    let element: &T = value.downcast_ref::<[T; N]>()?.get(index)?;
    Some(element)
}

fn array_get_mut<T: Reflect, const N: usize>(
    value: &mut dyn Any,
    index: usize,
) -> Option<&mut dyn Any> {
    let element: &mut T = value.downcast_mut::<[T; N]>()?.get_mut(index)?;
    Some(element)
}

fn array_grow<T: Reflect, const N: usize>(
    value: &mut dyn Any,
    len: usize,
) -> Result<(), ConversionError> {
    if !value.is::<[T; N]>() {
        return Err(mismatch::<[T; N]>());
    }
    if len > N {
        return Err(ConversionError::IndexOutOfBounds {
            index: len - 1,
            len: N,
        });
    }
    Ok(())
}

fn array_clear(_value: &mut dyn Any) {}

impl<T: Reflect + Default> Reflect for Option<T> {
    fn shape() -> Shape {
        Shape::optional::<T>()
    }
}

impl<T: Reflect + Default> Reflect for Vec<T> {
    fn shape() -> Shape {
        Shape::vec::<T>()
    }
}

impl<T: Reflect, const N: usize> Reflect for [T; N] {
    fn shape() -> Shape {
        Shape::array::<T, N>()
    }
}

/// Implements [`Reflect`] for a struct from its ordered field list.
///
/// Each entry is a field name, optionally followed by a raw tag string in the
/// `name:"value" other:"value"` form, and optionally preceded by `#[embed]` to flatten the
/// field's own fields into the parent. A trailing `keyed = path` installs a whole-record
/// decoder of type `fn(&mut Self, &str, &str) -> Result<(), BoxError>`.
///
/// ```
/// use xsv_bind::record;
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Address {
///     street: String,
///     city: String,
/// }
///
/// record! {
///     Address {
///         street: r#"csv:"street""#,
///         city: r#"csv:"city""#,
///     }
/// }
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Client {
///     id: u32,
///     name: String,
///     secret: String,
///     home: Address,
/// }
///
/// record! {
///     Client {
///         id: r#"csv:"client_id""#,
///         name: r#"csv:"client_name|name""#,
///         secret: r#"csv:"-""#,
///         home: r#"csv:"home""#,
///     }
/// }
/// ```
#[macro_export]
macro_rules! record {
    (
        $ty:ty {
            $( $(#[$flag:ident])* $field:ident $(: $tag:literal)? ),* $(,)?
        } $(keyed = $hook:expr)? $(;)?
    ) => {
        impl $crate::core::reflect::Reflect for $ty {
            fn shape() -> $crate::core::reflect::Shape {
                let shape = $crate::core::reflect::Shape::structure::<$ty>(::std::vec![
                    $(
                        $crate::core::reflect::FieldShape::new(
                            ::std::stringify!($field),
                            $crate::__record_tag!($($tag)?),
                            $crate::__record_embedded!($($flag)*),
                            |record: &$ty| &record.$field,
                            |record: &mut $ty| &mut record.$field,
                        )
                    ),*
                ]);
                $( let shape = shape.with_keyed_decoder::<$ty>($hook); )?
                shape
            }
        }
    };
}

/// Implements [`Reflect`] as a leaf for types implementing
/// [`CsvScalar`](crate::core::scalar::CsvScalar).
#[macro_export]
macro_rules! scalar {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::core::reflect::Reflect for $ty {
                fn shape() -> $crate::core::reflect::Shape {
                    $crate::core::reflect::Shape::scalar::<$ty>()
                }
            }
        )+
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __record_tag {
    () => {
        ""
    };
    ($tag:literal) => {
        $tag
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __record_embedded {
    () => {
        false
    };
    (embed $($rest:ident)*) => {
        true
    };
    ($other:ident $($rest:ident)*) => {
        $crate::__record_embedded!($($rest)*)
    };
}
