//! Parameter snapshots bound to an intercepted command.
//!
//! A [`CommandParameter`] carries both the value that is sent to Postgres and
//! the metadata (declared type, direction, nullability, size, precision,
//! scale) that diagnostics render when a command runs slow.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, Utc};
use std::error::Error;
use std::fmt;
use tokio_postgres::types::{IsNull, ToSql, Type};
use uuid::Uuid;

/// Declared type tag of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbType {
    Boolean,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    String,
    Binary,
    Guid,
    DateTime,
    Date,
    Json,
    /// Untyped value (e.g. a bare `NULL`).
    Object,
}

impl DbType {
    /// Name used in diagnostic output.
    pub fn as_str(&self) -> &'static str {
        match self {
            DbType::Boolean => "Boolean",
            DbType::Int16 => "Int16",
            DbType::Int32 => "Int32",
            DbType::Int64 => "Int64",
            DbType::Single => "Single",
            DbType::Double => "Double",
            DbType::Decimal => "Decimal",
            DbType::String => "String",
            DbType::Binary => "Binary",
            DbType::Guid => "Guid",
            DbType::DateTime => "DateTime",
            DbType::Date => "Date",
            DbType::Json => "Json",
            DbType::Object => "Object",
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a parameter relative to the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParameterDirection {
    #[default]
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

impl ParameterDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterDirection::Input => "Input",
            ParameterDirection::Output => "Output",
            ParameterDirection::InputOutput => "InputOutput",
            ParameterDirection::ReturnValue => "ReturnValue",
        }
    }
}

impl fmt::Display for ParameterDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameter value.
///
/// `Display` is the rendering used in diagnostics:
/// - numbers and booleans use their Rust `Display` form (`1.5`, `true`)
/// - text is written verbatim
/// - bytes are written as `0x` followed by lowercase hex
/// - UUIDs are hyphenated, timestamps are RFC 3339, dates are `YYYY-MM-DD`
/// - JSON is written compact
/// - `Null` is written as `null`
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Json(serde_json::Value),
}

impl ParamValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    /// Type tag inferred from the value.
    pub fn inferred_type(&self) -> DbType {
        match self {
            ParamValue::Null => DbType::Object,
            ParamValue::Bool(_) => DbType::Boolean,
            ParamValue::Int16(_) => DbType::Int16,
            ParamValue::Int32(_) => DbType::Int32,
            ParamValue::Int64(_) => DbType::Int64,
            ParamValue::Float32(_) => DbType::Single,
            ParamValue::Float64(_) => DbType::Double,
            ParamValue::Text(_) => DbType::String,
            ParamValue::Bytes(_) => DbType::Binary,
            ParamValue::Uuid(_) => DbType::Guid,
            ParamValue::Timestamp(_) => DbType::DateTime,
            ParamValue::Date(_) => DbType::Date,
            ParamValue::Json(_) => DbType::Json,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => f.write_str("null"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Int16(v) => write!(f, "{v}"),
            ParamValue::Int32(v) => write!(f, "{v}"),
            ParamValue::Int64(v) => write!(f, "{v}"),
            ParamValue::Float32(v) => write!(f, "{v}"),
            ParamValue::Float64(v) => write!(f, "{v}"),
            ParamValue::Text(v) => f.write_str(v),
            ParamValue::Bytes(v) => {
                f.write_str("0x")?;
                for b in v {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            ParamValue::Uuid(v) => write!(f, "{}", v.hyphenated()),
            ParamValue::Timestamp(v) => f.write_str(&v.to_rfc3339()),
            ParamValue::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            ParamValue::Json(v) => write!(f, "{v}"),
        }
    }
}

impl ToSql for ParamValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        // Delegate through `to_sql_checked` so a mismatched column type is
        // rejected instead of being encoded with the wrong width.
        match self {
            ParamValue::Null => Ok(IsNull::Yes),
            ParamValue::Bool(v) => v.to_sql_checked(ty, out),
            ParamValue::Int16(v) => v.to_sql_checked(ty, out),
            ParamValue::Int32(v) => v.to_sql_checked(ty, out),
            ParamValue::Int64(v) => v.to_sql_checked(ty, out),
            ParamValue::Float32(v) => v.to_sql_checked(ty, out),
            ParamValue::Float64(v) => v.to_sql_checked(ty, out),
            ParamValue::Text(v) => v.to_sql_checked(ty, out),
            ParamValue::Bytes(v) => v.to_sql_checked(ty, out),
            ParamValue::Uuid(v) => v.to_sql_checked(ty, out),
            ParamValue::Timestamp(v) => v.to_sql_checked(ty, out),
            ParamValue::Date(v) => v.to_sql_checked(ty, out),
            ParamValue::Json(v) => v.to_sql_checked(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(v: $ty) -> Self {
                    ParamValue::$variant(v)
                }
            }
        )*
    };
}

impl_from_value!(
    bool => Bool,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
    String => Text,
    Vec<u8> => Bytes,
    Uuid => Uuid,
    DateTime<Utc> => Timestamp,
    NaiveDate => Date,
    serde_json::Value => Json,
);

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ParamValue::Null, Into::into)
    }
}

/// Immutable snapshot of one command parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandParameter {
    pub name: String,
    pub value: ParamValue,
    pub db_type: DbType,
    pub direction: ParameterDirection,
    pub is_nullable: bool,
    pub size: i32,
    pub precision: u8,
    pub scale: u8,
}

impl CommandParameter {
    /// Create an input parameter; the type tag is inferred from the value.
    pub fn new(name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            db_type: value.inferred_type(),
            value,
            direction: ParameterDirection::Input,
            is_nullable: true,
            size: 0,
            precision: 0,
            scale: 0,
        }
    }

    /// Override the declared type tag.
    pub fn db_type(mut self, db_type: DbType) -> Self {
        self.db_type = db_type;
        self
    }

    pub fn direction(mut self, direction: ParameterDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.is_nullable = nullable;
        self
    }

    pub fn size(mut self, size: i32) -> Self {
        self.size = size;
        self
    }

    pub fn precision(mut self, precision: u8) -> Self {
        self.precision = precision;
        self
    }

    pub fn scale(mut self, scale: u8) -> Self {
        self.scale = scale;
        self
    }
}
