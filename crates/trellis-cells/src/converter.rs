//! String converters and the default converter registry.
//!
//! Editors work on text; items are typed. A [`StringConverter<T>`] formats
//! an item for display and parses edited text back into `T`.
//!
//! [`ConverterRegistry`] maps a value type to its default converter. The
//! built-in set covers the primitive and value types most columns use:
//!
//! | Kind            | Rust type                  | Format                    |
//! |-----------------|----------------------------|---------------------------|
//! | integer         | `i32`                      | decimal digits            |
//! | long integer    | `i64`, `i128`              | decimal digits            |
//! | floating point  | `f32`, `f64`               | shortest round-trip       |
//! | decimal         | `rust_decimal::Decimal`    | plain decimal             |
//! | date            | `chrono::NaiveDate`        | `%Y-%m-%d`                |
//! | time            | `chrono::NaiveTime`        | `%H:%M:%S`                |
//! | date-time       | `chrono::NaiveDateTime`    | `%Y-%m-%dT%H:%M:%S`       |
//! | instant         | `chrono::DateTime<Utc>`    | RFC 3339                  |
//! | boolean         | `bool`                     | `true` / `false`          |
//! | generic number  | [`Number`]                 | integer or float          |
//! | text            | `String`                   | identity                  |
//!
//! Any other type has no default; asking for one is a configuration error
//! and the caller must supply a converter explicitly.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::error::{CellError, Result};

/// Text that could not be converted into the target type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot convert '{input}' to {target}: {message}")]
pub struct ParseError {
    /// The rejected text.
    pub input: String,
    /// Name of the target type.
    pub target: &'static str,
    /// Why the text was rejected.
    pub message: String,
}

impl ParseError {
    /// Create a parse error for target type `T`.
    pub fn new<T: ?Sized>(input: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            input: input.into(),
            target: std::any::type_name::<T>(),
            message: message.to_string(),
        }
    }
}

/// Bidirectional conversion between a value and its text form.
pub trait StringConverter<T>: Send + Sync {
    /// Render a value as display text.
    fn format(&self, value: &T) -> String;

    /// Parse edited text back into a value.
    fn parse(&self, text: &str) -> std::result::Result<T, ParseError>;
}

/// A shared, type-erased converter.
pub type SharedConverter<T> = Arc<dyn StringConverter<T>>;

/// Converter for any type with `Display` and `FromStr`.
///
/// Surrounding whitespace is ignored when parsing.
pub struct FromStrConverter<T>(PhantomData<fn() -> T>);

impl<T> FromStrConverter<T> {
    /// Create the converter.
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for FromStrConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StringConverter<T> for FromStrConverter<T>
where
    T: FromStr + fmt::Display,
    T::Err: fmt::Display,
{
    fn format(&self, value: &T) -> String {
        value.to_string()
    }

    fn parse(&self, text: &str) -> std::result::Result<T, ParseError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ParseError::new::<T>(text, "empty input"));
        }
        trimmed.parse().map_err(|e| ParseError::new::<T>(text, e))
    }
}

/// Identity converter for `String` items.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextConverter;

impl StringConverter<String> for TextConverter {
    fn format(&self, value: &String) -> String {
        value.clone()
    }

    fn parse(&self, text: &str) -> std::result::Result<String, ParseError> {
        Ok(text.to_owned())
    }
}

/// Boolean converter accepting `true`/`false` in any letter case.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoolConverter;

impl StringConverter<bool> for BoolConverter {
    fn format(&self, value: &bool) -> String {
        value.to_string()
    }

    fn parse(&self, text: &str) -> std::result::Result<bool, ParseError> {
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            Ok(true)
        } else if trimmed.eq_ignore_ascii_case("false") {
            Ok(false)
        } else {
            Err(ParseError::new::<bool>(text, "expected 'true' or 'false'"))
        }
    }
}

/// Date, time or date-time converter driven by a `chrono` format pattern.
#[derive(Debug, Clone)]
pub struct ChronoConverter<T> {
    pattern: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ChronoConverter<T> {
    /// Create a converter using a custom `strftime` pattern.
    pub fn with_pattern(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            _marker: PhantomData,
        }
    }

    /// The active pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl ChronoConverter<NaiveDate> {
    /// ISO calendar dates (`2024-03-01`).
    pub fn date() -> Self {
        Self::with_pattern("%Y-%m-%d")
    }
}

impl ChronoConverter<NaiveTime> {
    /// 24-hour times with seconds (`13:45:00`).
    pub fn time() -> Self {
        Self::with_pattern("%H:%M:%S")
    }
}

impl ChronoConverter<NaiveDateTime> {
    /// ISO local date-times (`2024-03-01T13:45:00`).
    pub fn date_time() -> Self {
        Self::with_pattern("%Y-%m-%dT%H:%M:%S")
    }
}

impl StringConverter<NaiveDate> for ChronoConverter<NaiveDate> {
    fn format(&self, value: &NaiveDate) -> String {
        value.format(&self.pattern).to_string()
    }

    fn parse(&self, text: &str) -> std::result::Result<NaiveDate, ParseError> {
        NaiveDate::parse_from_str(text.trim(), &self.pattern)
            .map_err(|e| ParseError::new::<NaiveDate>(text, e))
    }
}

impl StringConverter<NaiveTime> for ChronoConverter<NaiveTime> {
    fn format(&self, value: &NaiveTime) -> String {
        value.format(&self.pattern).to_string()
    }

    fn parse(&self, text: &str) -> std::result::Result<NaiveTime, ParseError> {
        NaiveTime::parse_from_str(text.trim(), &self.pattern)
            .map_err(|e| ParseError::new::<NaiveTime>(text, e))
    }
}

impl StringConverter<NaiveDateTime> for ChronoConverter<NaiveDateTime> {
    fn format(&self, value: &NaiveDateTime) -> String {
        value.format(&self.pattern).to_string()
    }

    fn parse(&self, text: &str) -> std::result::Result<NaiveDateTime, ParseError> {
        NaiveDateTime::parse_from_str(text.trim(), &self.pattern)
            .map_err(|e| ParseError::new::<NaiveDateTime>(text, e))
    }
}

/// RFC 3339 converter for UTC instants.
#[derive(Debug, Default, Clone, Copy)]
pub struct InstantConverter;

impl StringConverter<DateTime<Utc>> for InstantConverter {
    fn format(&self, value: &DateTime<Utc>) -> String {
        value.to_rfc3339()
    }

    fn parse(&self, text: &str) -> std::result::Result<DateTime<Utc>, ParseError> {
        DateTime::parse_from_rfc3339(text.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ParseError::new::<DateTime<Utc>>(text, e))
    }
}

/// A number whose concrete kind is only known at runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// A whole number.
    Integer(i64),
    /// A floating point number.
    Float(f64),
}

impl Number {
    /// The value as `f64`.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Integer(n) => n as f64,
            Self::Float(n) => n,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for Number {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Ok(n) = s.parse::<i64>() {
            return Ok(Self::Integer(n));
        }
        s.parse::<f64>()
            .map(Self::Float)
            .map_err(|_| "not a number".to_string())
    }
}

/// A converter assembled from two closures.
pub struct FnConverter<T> {
    format: Box<dyn Fn(&T) -> String + Send + Sync>,
    parse: Box<dyn Fn(&str) -> std::result::Result<T, ParseError> + Send + Sync>,
}

impl<T> FnConverter<T> {
    /// Create a converter from a formatter and a parser.
    pub fn new<F, P>(format: F, parse: P) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
        P: Fn(&str) -> std::result::Result<T, ParseError> + Send + Sync + 'static,
    {
        Self {
            format: Box::new(format),
            parse: Box::new(parse),
        }
    }
}

impl<T> StringConverter<T> for FnConverter<T> {
    fn format(&self, value: &T) -> String {
        (self.format)(value)
    }

    fn parse(&self, text: &str) -> std::result::Result<T, ParseError> {
        (self.parse)(text)
    }
}

/// Maps value types to default converters.
///
/// Most code uses [`default_converter_for`], which consults the shared
/// built-in registry. Build a separate registry with
/// [`ConverterRegistry::with_defaults`] to add application types without
/// touching the shared one.
pub struct ConverterRegistry {
    converters: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl ConverterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            converters: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry holding the built-in converters.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register::<i32>(Arc::new(FromStrConverter::<i32>::new()));
        registry.register::<i64>(Arc::new(FromStrConverter::<i64>::new()));
        registry.register::<i128>(Arc::new(FromStrConverter::<i128>::new()));
        registry.register::<f32>(Arc::new(FromStrConverter::<f32>::new()));
        registry.register::<f64>(Arc::new(FromStrConverter::<f64>::new()));
        registry.register::<Decimal>(Arc::new(FromStrConverter::<Decimal>::new()));
        registry.register::<Number>(Arc::new(FromStrConverter::<Number>::new()));
        registry.register::<bool>(Arc::new(BoolConverter));
        registry.register::<String>(Arc::new(TextConverter));
        registry.register::<NaiveDate>(Arc::new(ChronoConverter::<NaiveDate>::date()));
        registry.register::<NaiveTime>(Arc::new(ChronoConverter::<NaiveTime>::time()));
        registry.register::<NaiveDateTime>(Arc::new(ChronoConverter::<NaiveDateTime>::date_time()));
        registry.register::<DateTime<Utc>>(Arc::new(InstantConverter));
        registry
    }

    /// Register (or replace) the converter for `T`.
    pub fn register<T: 'static>(&self, converter: SharedConverter<T>) {
        self.converters
            .write()
            .insert(TypeId::of::<T>(), Arc::new(converter));
    }

    /// Returns `true` if a converter for `T` is registered.
    pub fn contains<T: 'static>(&self) -> bool {
        self.converters.read().contains_key(&TypeId::of::<T>())
    }

    /// Look up the converter for `T`.
    ///
    /// # Errors
    ///
    /// [`CellError::NoDefaultConverter`] if `T` has no registered converter.
    pub fn lookup<T: 'static>(&self) -> Result<SharedConverter<T>> {
        let converters = self.converters.read();
        let entry = converters
            .get(&TypeId::of::<T>())
            .ok_or_else(CellError::no_default_converter::<T>)?;
        entry
            .downcast_ref::<SharedConverter<T>>()
            .cloned()
            .ok_or_else(CellError::no_default_converter::<T>)
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("len", &self.converters.read().len())
            .finish()
    }
}

/// The shared registry of built-in converters.
pub fn builtin_converters() -> &'static ConverterRegistry {
    static BUILTIN: OnceLock<ConverterRegistry> = OnceLock::new();
    BUILTIN.get_or_init(ConverterRegistry::with_defaults)
}

/// The built-in converter for `T`.
///
/// # Errors
///
/// [`CellError::NoDefaultConverter`] for any type outside the built-in set.
pub fn default_converter_for<T: 'static>() -> Result<SharedConverter<T>> {
    builtin_converters().lookup::<T>().inspect_err(|err| {
        tracing::error!(
            target: trellis_core::logging::targets::CELL,
            %err,
            "converter lookup failed"
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Sub {
        name: String,
    }

    #[test]
    fn test_integer_round_trip() {
        let conv = default_converter_for::<i32>().unwrap();
        assert_eq!(conv.format(&42), "42");
        assert_eq!(conv.parse(" 9 ").unwrap(), 9);
    }

    #[test]
    fn test_integer_rejects_garbage() {
        let conv = default_converter_for::<i32>().unwrap();
        let err = conv.parse("nine").unwrap_err();
        assert_eq!(err.input, "nine");
        assert_eq!(err.target, "i32");
        assert!(conv.parse("").is_err());
    }

    #[test]
    fn test_floating_and_decimal() {
        assert_eq!(default_converter_for::<f64>().unwrap().parse("2.5").unwrap(), 2.5);
        let dec = default_converter_for::<Decimal>().unwrap();
        let value = dec.parse("10.25").unwrap();
        assert_eq!(dec.format(&value), "10.25");
    }

    #[test]
    fn test_boolean_is_strict() {
        let conv = default_converter_for::<bool>().unwrap();
        assert!(conv.parse("TRUE").unwrap());
        assert!(!conv.parse("false").unwrap());
        assert!(conv.parse("yes").is_err());
    }

    #[test]
    fn test_generic_number() {
        let conv = default_converter_for::<Number>().unwrap();
        assert_eq!(conv.parse("7").unwrap(), Number::Integer(7));
        assert_eq!(conv.parse("7.5").unwrap(), Number::Float(7.5));
        assert_eq!(conv.format(&Number::Integer(3)), "3");
    }

    #[test]
    fn test_dates_and_times() {
        let date = default_converter_for::<NaiveDate>().unwrap();
        let parsed = date.parse("2024-03-01").unwrap();
        assert_eq!(parsed, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(date.format(&parsed), "2024-03-01");

        let time = default_converter_for::<NaiveTime>().unwrap();
        assert_eq!(time.format(&time.parse("13:45:00").unwrap()), "13:45:00");

        let dt = default_converter_for::<NaiveDateTime>().unwrap();
        assert!(dt.parse("2024-03-01T13:45:00").is_ok());
        assert!(dt.parse("2024-03-01").is_err());

        let instant = default_converter_for::<DateTime<Utc>>().unwrap();
        assert!(instant.parse("2024-03-01T13:45:00Z").is_ok());
    }

    #[test]
    fn test_unknown_type_is_configuration_error() {
        let err = default_converter_for::<Sub>().err().unwrap();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Sub"));
    }

    #[test]
    fn test_local_registry_accepts_custom_types() {
        let registry = ConverterRegistry::with_defaults();
        assert!(!registry.contains::<Sub>());

        registry.register::<Sub>(Arc::new(FnConverter::new(
            |sub: &Sub| sub.name.clone(),
            |text: &str| Ok(Sub { name: text.to_owned() }),
        )));

        let conv = registry.lookup::<Sub>().unwrap();
        assert_eq!(conv.parse("first").unwrap(), Sub { name: "first".into() });
        assert!(builtin_converters().lookup::<Sub>().is_err());
    }
}
