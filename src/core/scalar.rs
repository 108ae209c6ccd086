use crate::error::BoxError;

/// Coarse category of a leaf value. Drives list rendering and error wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Integer,
    Float,
    Bool,
    Text,
    /// User-provided codec. Failures surface as [`ConversionError::Hook`](crate::ConversionError::Hook).
    Custom,
}

/// Conversion of a single cell to and from text.
///
/// Implement this for types with their own textual form, then register them with
/// [`scalar!`](crate::scalar). Such types are always treated as leaves, even when they are
/// structs with fields of their own.
///
/// ```
/// use xsv_bind::{scalar, BoxError, core::scalar::CsvScalar};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Celsius(f64);
///
/// impl CsvScalar for Celsius {
///     fn from_csv(text: &str) -> Result<Self, BoxError> {
///         let degrees = text.trim_end_matches("°C").parse()?;
///         Ok(Celsius(degrees))
///     }
///
///     fn to_csv(&self) -> Result<String, BoxError> {
///         Ok(format!("{}°C", self.0))
///     }
/// }
///
/// scalar!(Celsius);
///
/// assert_eq!(Celsius::from_csv("21.5°C").unwrap(), Celsius(21.5));
/// ```
pub trait CsvScalar: Sized + 'static {
    const KIND: ScalarKind = ScalarKind::Custom;

    fn from_csv(text: &str) -> Result<Self, BoxError>;

    fn to_csv(&self) -> Result<String, BoxError>;

    /// Whether the value counts as empty for `omitempty`.
    fn is_zero(&self) -> bool {
        false
    }
}

macro_rules! integer_scalar {
    ($($ty:ty),+) => {
        $(
            impl CsvScalar for $ty {
                const KIND: ScalarKind = ScalarKind::Integer;

                fn from_csv(text: &str) -> Result<Self, BoxError> {
                    let text = text.trim();
                    if text.is_empty() {
                        return Ok(0);
                    }
                    Ok(text.parse::<$ty>()?)
                }

                fn to_csv(&self) -> Result<String, BoxError> {
                    Ok(self.to_string())
                }

                fn is_zero(&self) -> bool {
                    *self == 0
                }
            }
        )+
    };
}

macro_rules! float_scalar {
    ($($ty:ty),+) => {
        $(
            impl CsvScalar for $ty {
                const KIND: ScalarKind = ScalarKind::Float;

                fn from_csv(text: &str) -> Result<Self, BoxError> {
                    let text = text.trim();
                    if text.is_empty() {
                        return Ok(0.0);
                    }
                    Ok(text.parse::<$ty>()?)
                }

                fn to_csv(&self) -> Result<String, BoxError> {
                    Ok(self.to_string())
                }

                fn is_zero(&self) -> bool {
                    *self == 0.0
                }
            }
        )+
    };
}

integer_scalar!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
float_scalar!(f32, f64);

#[derive(Debug, thiserror::Error)]
#[error("invalid boolean {0:?}")]
struct InvalidBool(String);

impl CsvScalar for bool {
    const KIND: ScalarKind = ScalarKind::Bool;

    fn from_csv(text: &str) -> Result<Self, BoxError> {
        match text.trim() {
            "" => Ok(false),
            "1" | "t" | "T" => Ok(true),
            "0" | "f" | "F" => Ok(false),
            other if other.eq_ignore_ascii_case("true") => Ok(true),
            other if other.eq_ignore_ascii_case("false") => Ok(false),
            other => Err(Box::new(InvalidBool(other.to_string()))),
        }
    }

    fn to_csv(&self) -> Result<String, BoxError> {
        Ok(self.to_string())
    }

    fn is_zero(&self) -> bool {
        !*self
    }
}

impl CsvScalar for String {
    const KIND: ScalarKind = ScalarKind::Text;

    fn from_csv(text: &str) -> Result<Self, BoxError> {
        Ok(text.to_string())
    }

    fn to_csv(&self) -> Result<String, BoxError> {
        Ok(self.clone())
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("expected a single character, got {0:?}")]
struct InvalidChar(String);

impl CsvScalar for char {
    const KIND: ScalarKind = ScalarKind::Text;

    fn from_csv(text: &str) -> Result<Self, BoxError> {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Ok('\0'),
            (Some(c), None) => Ok(c),
            _ => Err(Box::new(InvalidChar(text.to_string()))),
        }
    }

    fn to_csv(&self) -> Result<String, BoxError> {
        if *self == '\0' {
            return Ok(String::new());
        }
        Ok(self.to_string())
    }

    fn is_zero(&self) -> bool {
        *self == '\0'
    }
}

crate::scalar!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, String, char
);

#[cfg(feature = "chrono")]
mod time {
    use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

    use super::{CsvScalar, ScalarKind};
    use crate::error::BoxError;

    const DATE_FORMAT: &str = "%Y-%m-%d";
    const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    impl CsvScalar for DateTime<Utc> {
        const KIND: ScalarKind = ScalarKind::Text;

        fn from_csv(text: &str) -> Result<Self, BoxError> {
            let text = text.trim();
            if text.is_empty() {
                return Ok(DateTime::<Utc>::default());
            }
            Ok(DateTime::parse_from_rfc3339(text)?.with_timezone(&Utc))
        }

        fn to_csv(&self) -> Result<String, BoxError> {
            Ok(self.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }

        fn is_zero(&self) -> bool {
            *self == DateTime::<Utc>::default()
        }
    }

    impl CsvScalar for DateTime<FixedOffset> {
        const KIND: ScalarKind = ScalarKind::Text;

        fn from_csv(text: &str) -> Result<Self, BoxError> {
            let text = text.trim();
            if text.is_empty() {
                return Ok(DateTime::<FixedOffset>::default());
            }
            Ok(DateTime::parse_from_rfc3339(text)?)
        }

        fn to_csv(&self) -> Result<String, BoxError> {
            Ok(self.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }

        fn is_zero(&self) -> bool {
            *self == DateTime::<FixedOffset>::default()
        }
    }

    impl CsvScalar for NaiveDate {
        const KIND: ScalarKind = ScalarKind::Text;

        fn from_csv(text: &str) -> Result<Self, BoxError> {
            let text = text.trim();
            if text.is_empty() {
                return Ok(NaiveDate::default());
            }
            Ok(NaiveDate::parse_from_str(text, DATE_FORMAT)?)
        }

        fn to_csv(&self) -> Result<String, BoxError> {
            Ok(self.format(DATE_FORMAT).to_string())
        }

        fn is_zero(&self) -> bool {
            *self == NaiveDate::default()
        }
    }

    impl CsvScalar for NaiveDateTime {
        const KIND: ScalarKind = ScalarKind::Text;

        fn from_csv(text: &str) -> Result<Self, BoxError> {
            let text = text.trim();
            if text.is_empty() {
                return Ok(NaiveDateTime::default());
            }
            Ok(NaiveDateTime::parse_from_str(text, DATE_TIME_FORMAT)?)
        }

        fn to_csv(&self) -> Result<String, BoxError> {
            Ok(self.format(DATE_TIME_FORMAT).to_string())
        }

        fn is_zero(&self) -> bool {
            *self == NaiveDateTime::default()
        }
    }

    crate::scalar!(DateTime<Utc>, DateTime<FixedOffset>, NaiveDate, NaiveDateTime);
}
