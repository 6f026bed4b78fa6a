// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Attribute value model.
//!
//! A [`Variant`] is a closed sum over scalar kinds (bool, int, double, string)
//! and homogeneous arrays of those kinds. Homogeneity is guaranteed by
//! [`VariantArray`] holding one typed vector; literals coming from text are
//! checked element-wise when they are converted into an array.
//!
//! Text policy
//! - Declared array attributes are parsed as JSON array literals.
//! - Everything else is kept verbatim as a string; type enforcement happens
//!   later, during frame validation, through [`Variant::is_convertible`].
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scalar kind of a value or of an array element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtomType {
    /// `true` / `false`.
    Bool,
    /// Signed 64-bit integer.
    Int,
    /// 64-bit float.
    Double,
    /// UTF-8 text.
    String,
}

impl core::fmt::Display for AtomType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Double => "double",
            Self::String => "string",
        };
        f.write_str(name)
    }
}

/// Declared type of an attribute: a scalar, or an array of scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// A single scalar.
    Atom(AtomType),
    /// A homogeneous array whose elements have the given scalar kind.
    Array(AtomType),
}

impl ValueType {
    /// Shorthand for `ValueType::Atom(AtomType::String)`.
    pub const STRING: Self = Self::Atom(AtomType::String);
    /// Shorthand for `ValueType::Atom(AtomType::Double)`.
    pub const DOUBLE: Self = Self::Atom(AtomType::Double);
    /// Shorthand for `ValueType::Atom(AtomType::Int)`.
    pub const INT: Self = Self::Atom(AtomType::Int);
    /// Shorthand for `ValueType::Atom(AtomType::Bool)`.
    pub const BOOL: Self = Self::Atom(AtomType::Bool);

    /// Returns `true` for array types.
    #[must_use]
    pub fn is_array(self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Returns the scalar kind (the element kind for arrays).
    #[must_use]
    pub fn atom(self) -> AtomType {
        match self {
            Self::Atom(a) | Self::Array(a) => a,
        }
    }
}

impl core::fmt::Display for ValueType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Atom(a) => write!(f, "{a}"),
            Self::Array(a) => write!(f, "[{a}]"),
        }
    }
}

/// Errors produced by value conversion and literal parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The value cannot be represented as the requested type.
    #[error("cannot convert {from} to {to}")]
    NotConvertible {
        /// Type of the source value.
        from: ValueType,
        /// Requested type.
        to: ValueType,
    },
    /// The text is not a well-formed structured literal.
    #[error("malformed literal: {0}")]
    MalformedLiteral(String),
    /// The literal parsed, but is not an array.
    #[error("literal is not an array")]
    NotAnArray,
    /// An array element does not have the declared element kind.
    #[error("element {index} is not a {expected}")]
    ElementMismatch {
        /// Zero-based position of the offending element.
        index: usize,
        /// Declared element kind.
        expected: AtomType,
    },
    /// A `name=value` assignment could not be split.
    #[error("expected `name=value`, got `{0}`")]
    MalformedAssignment(String),
    /// A double is NaN or infinite.
    #[error("non-finite number")]
    NonFinite,
}

/// Homogeneous array payload of a [`Variant`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VariantArray {
    /// Array of booleans.
    Bool(Vec<bool>),
    /// Array of integers.
    Int(Vec<i64>),
    /// Array of doubles.
    Double(Vec<f64>),
    /// Array of strings.
    String(Vec<String>),
}

impl VariantArray {
    /// Element kind of this array.
    #[must_use]
    pub fn element_type(&self) -> AtomType {
        match self {
            Self::Bool(_) => AtomType::Bool,
            Self::Int(_) => AtomType::Int,
            Self::Double(_) => AtomType::Double,
            Self::String(_) => AtomType::String,
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::String(v) => v.len(),
        }
    }

    /// Returns `true` when the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Splits the array into scalar variants.
    #[must_use]
    pub fn to_variants(&self) -> Vec<Variant> {
        match self {
            Self::Bool(v) => v.iter().copied().map(Variant::Bool).collect(),
            Self::Int(v) => v.iter().copied().map(Variant::Int).collect(),
            Self::Double(v) => v.iter().copied().map(Variant::Double).collect(),
            Self::String(v) => v.iter().cloned().map(Variant::String).collect(),
        }
    }

    /// Collects scalar variants of kind `element` into an array.
    ///
    /// Fails with [`ValueError::ElementMismatch`] on the first element whose
    /// kind differs from `element`; no conversion is attempted.
    pub fn from_variants(element: AtomType, items: Vec<Variant>) -> Result<Self, ValueError> {
        let mismatch = |index| ValueError::ElementMismatch {
            index,
            expected: element,
        };
        let items = items.into_iter().enumerate();
        Ok(match element {
            AtomType::Bool => Self::Bool(
                items
                    .map(|(i, v)| match v {
                        Variant::Bool(b) => Ok(b),
                        _ => Err(mismatch(i)),
                    })
                    .collect::<Result<_, _>>()?,
            ),
            AtomType::Int => Self::Int(
                items
                    .map(|(i, v)| match v {
                        Variant::Int(n) => Ok(n),
                        _ => Err(mismatch(i)),
                    })
                    .collect::<Result<_, _>>()?,
            ),
            AtomType::Double => Self::Double(
                items
                    .map(|(i, v)| match v {
                        Variant::Double(d) => Ok(d),
                        _ => Err(mismatch(i)),
                    })
                    .collect::<Result<_, _>>()?,
            ),
            AtomType::String => Self::String(
                items
                    .map(|(i, v)| match v {
                        Variant::String(s) => Ok(s),
                        _ => Err(mismatch(i)),
                    })
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(v) => serde_json::Value::from(v.clone()),
            Self::Int(v) => serde_json::Value::from(v.clone()),
            Self::Double(v) => serde_json::Value::from(v.clone()),
            Self::String(v) => serde_json::Value::from(v.clone()),
        }
    }
}

/// Typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variant {
    /// Boolean scalar.
    Bool(bool),
    /// Integer scalar.
    Int(i64),
    /// Double scalar.
    Double(f64),
    /// String scalar.
    String(String),
    /// Homogeneous array of scalars.
    Array(VariantArray),
}

impl Variant {
    /// Runtime type of this value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::BOOL,
            Self::Int(_) => ValueType::INT,
            Self::Double(_) => ValueType::DOUBLE,
            Self::String(_) => ValueType::STRING,
            Self::Array(a) => ValueType::Array(a.element_type()),
        }
    }

    /// Returns `false` when the value is, or holds, a NaN or infinite double.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Double(d) => d.is_finite(),
            Self::Array(VariantArray::Double(values)) => values.iter().all(|d| d.is_finite()),
            _ => true,
        }
    }

    /// Returns `true` when [`Variant::convert`] to `to` would succeed.
    #[must_use]
    pub fn is_convertible(&self, to: ValueType) -> bool {
        self.convert(to).is_ok()
    }

    /// Converts this value to `to`.
    ///
    /// Rules: int→double always; double→int only when integral; any scalar to
    /// string; string to int/double/bool when the text parses; bool and
    /// numbers never convert into each other; arrays convert element-wise;
    /// scalars and arrays never convert into each other. Non-finite doubles
    /// never convert, not even to their own type.
    pub fn convert(&self, to: ValueType) -> Result<Self, ValueError> {
        if !self.is_finite() {
            return Err(ValueError::NonFinite);
        }
        let not_convertible = || ValueError::NotConvertible {
            from: self.value_type(),
            to,
        };
        match (self, to) {
            (Self::Array(array), ValueType::Array(element)) => {
                if array.element_type() == element {
                    return Ok(self.clone());
                }
                let converted = array
                    .to_variants()
                    .iter()
                    .map(|item| item.convert(ValueType::Atom(element)))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| not_convertible())?;
                VariantArray::from_variants(element, converted)
                    .map(Self::Array)
                    .map_err(|_| not_convertible())
            }
            (Self::Array(_), ValueType::Atom(_)) | (_, ValueType::Array(_)) => {
                Err(not_convertible())
            }
            (_, ValueType::Atom(atom)) => self.convert_atom(atom).ok_or_else(not_convertible),
        }
    }

    fn convert_atom(&self, to: AtomType) -> Option<Self> {
        match (self, to) {
            (Self::Bool(b), AtomType::Bool) => Some(Self::Bool(*b)),
            (Self::Int(n), AtomType::Int) => Some(Self::Int(*n)),
            (Self::Double(d), AtomType::Double) => Some(Self::Double(*d)),
            (Self::String(s), AtomType::String) => Some(Self::String(s.clone())),
            #[allow(clippy::cast_precision_loss)]
            (Self::Int(n), AtomType::Double) => Some(Self::Double(*n as f64)),
            (Self::Double(d), AtomType::Int) => integral(*d).map(Self::Int),
            (Self::Bool(_) | Self::Int(_) | Self::Double(_), AtomType::String) => {
                Some(Self::String(self.to_literal()))
            }
            (Self::String(s), AtomType::Int) => s.trim().parse().ok().map(Self::Int),
            (Self::String(s), AtomType::Double) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|d| d.is_finite())
                .map(Self::Double),
            (Self::String(s), AtomType::Bool) => match s.trim() {
                "true" => Some(Self::Bool(true)),
                "false" => Some(Self::Bool(false)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Textual form: scalars as plain text, arrays as a JSON array literal.
    #[must_use]
    pub fn to_literal(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::Double(d) => d.to_string(),
            Self::String(s) => s.clone(),
            Self::Array(a) => a.to_json().to_string(),
        }
    }

    /// Builds a value from text according to the declared type.
    ///
    /// Scalar declarations keep the text verbatim as a string. Array
    /// declarations parse the text as a JSON array whose elements must all
    /// be of the declared element kind (integers are accepted for double
    /// arrays).
    pub fn from_literal(text: &str, declared: ValueType) -> Result<Self, ValueError> {
        match declared {
            ValueType::Atom(_) => Ok(Self::String(text.to_owned())),
            ValueType::Array(element) => parse_array_literal(text, element).map(Self::Array),
        }
    }

    /// String payload, if this is a string scalar.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean payload, if this is a bool scalar.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric payload as a double (ints widen).
    #[must_use]
    pub fn as_double(&self) -> Option<f64> {
        match self.convert(ValueType::DOUBLE) {
            Ok(Self::Double(d)) => Some(d),
            _ => None,
        }
    }

    /// Array payload, if this is an array.
    #[must_use]
    pub fn as_array(&self) -> Option<&VariantArray> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }
}

impl core::fmt::Display for Variant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.to_literal())
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Variant {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<VariantArray> for Variant {
    fn from(value: VariantArray) -> Self {
        Self::Array(value)
    }
}

impl From<Vec<f64>> for Variant {
    fn from(value: Vec<f64>) -> Self {
        Self::Array(VariantArray::Double(value))
    }
}

impl From<Vec<i64>> for Variant {
    fn from(value: Vec<i64>) -> Self {
        Self::Array(VariantArray::Int(value))
    }
}

/// Splits `name=value` into its trimmed name and its verbatim value.
pub fn parse_assignment(text: &str) -> Result<(String, String), ValueError> {
    let Some((name, value)) = text.split_once('=') else {
        return Err(ValueError::MalformedAssignment(text.to_owned()));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(ValueError::MalformedAssignment(text.to_owned()));
    }
    Ok((name.to_owned(), value.to_owned()))
}

fn integral(d: f64) -> Option<i64> {
    // i64::MAX is not exactly representable; stay strictly inside the range.
    #[allow(clippy::cast_precision_loss)]
    let limit = i64::MAX as f64;
    if d.is_finite() && d.fract() == 0.0 && d.abs() < limit {
        #[allow(clippy::cast_possible_truncation)]
        Some(d as i64)
    } else {
        None
    }
}

fn parse_array_literal(text: &str, element: AtomType) -> Result<VariantArray, ValueError> {
    let parsed: serde_json::Value =
        serde_json::from_str(text).map_err(|e| ValueError::MalformedLiteral(e.to_string()))?;
    let serde_json::Value::Array(items) = parsed else {
        return Err(ValueError::NotAnArray);
    };
    let mismatch = |index| ValueError::ElementMismatch {
        index,
        expected: element,
    };
    let items = items.iter().enumerate();
    Ok(match element {
        AtomType::Bool => VariantArray::Bool(
            items
                .map(|(i, item)| item.as_bool().ok_or_else(|| mismatch(i)))
                .collect::<Result<_, _>>()?,
        ),
        AtomType::Int => VariantArray::Int(
            items
                .map(|(i, item)| item.as_i64().ok_or_else(|| mismatch(i)))
                .collect::<Result<_, _>>()?,
        ),
        AtomType::Double => VariantArray::Double(
            items
                .map(|(i, item)| item.as_f64().ok_or_else(|| mismatch(i)))
                .collect::<Result<_, _>>()?,
        ),
        AtomType::String => VariantArray::String(
            items
                .map(|(i, item)| item.as_str().map(str::to_owned).ok_or_else(|| mismatch(i)))
                .collect::<Result<_, _>>()?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_literals_stay_strings() {
        let v = Variant::from_literal("100", ValueType::DOUBLE).unwrap();
        assert_eq!(v, Variant::String("100".into()));
        assert!(v.is_convertible(ValueType::DOUBLE));
        assert!(v.is_convertible(ValueType::INT));
        assert!(!v.is_convertible(ValueType::BOOL));
    }

    #[test]
    fn array_literal_with_garbage_is_malformed() {
        let err = Variant::from_literal("[1,2,x]", ValueType::Array(AtomType::Double)).unwrap_err();
        assert!(matches!(err, ValueError::MalformedLiteral(_)));
    }

    #[test]
    fn array_literal_rejects_mixed_elements() {
        let err =
            Variant::from_literal(r#"[1, "two"]"#, ValueType::Array(AtomType::Int)).unwrap_err();
        assert_eq!(
            err,
            ValueError::ElementMismatch {
                index: 1,
                expected: AtomType::Int
            }
        );
        let err = Variant::from_literal("[1.5]", ValueType::Array(AtomType::Int)).unwrap_err();
        assert!(matches!(err, ValueError::ElementMismatch { index: 0, .. }));
    }

    #[test]
    fn array_literal_must_be_an_array() {
        let err = Variant::from_literal("{\"a\": 1}", ValueType::Array(AtomType::Int)).unwrap_err();
        assert_eq!(err, ValueError::NotAnArray);
    }

    #[test]
    fn double_arrays_accept_integers() {
        let v = Variant::from_literal("[1, 2.5]", ValueType::Array(AtomType::Double)).unwrap();
        assert_eq!(v, Variant::from(vec![1.0, 2.5]));
    }

    #[test]
    fn non_finite_doubles_never_convert() {
        for v in [
            Variant::Double(f64::NAN),
            Variant::Double(f64::INFINITY),
            Variant::from(vec![0.0, f64::NEG_INFINITY]),
        ] {
            assert!(!v.is_finite());
            assert_eq!(v.convert(v.value_type()), Err(ValueError::NonFinite));
            assert!(!v.is_convertible(ValueType::STRING));
        }
        assert!(Variant::from(vec![0.0, 1.0]).is_finite());
    }

    #[test]
    fn conversion_rules() {
        assert_eq!(
            Variant::Int(3).convert(ValueType::DOUBLE),
            Ok(Variant::Double(3.0))
        );
        assert_eq!(
            Variant::Double(3.0).convert(ValueType::INT),
            Ok(Variant::Int(3))
        );
        assert!(!Variant::Double(3.5).is_convertible(ValueType::INT));
        assert!(!Variant::Bool(true).is_convertible(ValueType::INT));
        assert!(!Variant::Int(1).is_convertible(ValueType::Array(AtomType::Int)));
        assert_eq!(
            Variant::from(vec![1_i64, 2]).convert(ValueType::Array(AtomType::Double)),
            Ok(Variant::from(vec![1.0, 2.0]))
        );
        assert_eq!(
            Variant::Bool(false).convert(ValueType::STRING),
            Ok(Variant::String("false".into()))
        );
    }

    #[test]
    fn assignments_split_on_first_equals() {
        assert_eq!(
            parse_assignment(" formula = a=b"),
            Ok(("formula".to_owned(), " a=b".to_owned()))
        );
        assert!(parse_assignment("formula").is_err());
        assert!(parse_assignment("=1").is_err());
    }
}
