mod parser;

use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::core::{CqlValue, MapperError, Result};

/// A parsed CQL column type.
///
/// `Frozen` is preserved structurally (it matters for schema DDL and for
/// whether element-level updates are allowed) but is transparent for value
/// validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CqlType {
    Ascii,
    BigInt,
    Blob,
    Boolean,
    Counter,
    Decimal,
    Double,
    Float,
    Inet,
    Int,
    SmallInt,
    Text,
    Timestamp,
    TimeUuid,
    TinyInt,
    Uuid,
    VarInt,
    List(Box<CqlType>),
    Set(Box<CqlType>),
    Map(Box<CqlType>, Box<CqlType>),
    Tuple(Vec<CqlType>),
    Frozen(Box<CqlType>),
    Udt(String),
}

impl CqlType {
    /// Normalized string form: lowercase, no interior whitespace,
    /// `varchar` collapsed to `text`.
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Strips any number of `frozen<...>` wrappers.
    pub fn unfrozen(&self) -> &CqlType {
        match self {
            Self::Frozen(inner) => inner.unfrozen(),
            other => other,
        }
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self, Self::Frozen(_))
    }

    pub fn is_counter(&self) -> bool {
        matches!(self.unfrozen(), Self::Counter)
    }

    pub fn is_collection(&self) -> bool {
        matches!(
            self.unfrozen(),
            Self::List(_) | Self::Set(_) | Self::Map(_, _)
        )
    }

    /// Element type of a list or set.
    pub fn element_type(&self) -> Option<&CqlType> {
        match self.unfrozen() {
            Self::List(t) | Self::Set(t) => Some(t),
            _ => None,
        }
    }

    /// Key type of a map.
    pub fn key_type(&self) -> Option<&CqlType> {
        match self.unfrozen() {
            Self::Map(k, _) => Some(k),
            _ => None,
        }
    }

    /// Value type of a map.
    pub fn value_type(&self) -> Option<&CqlType> {
        match self.unfrozen() {
            Self::Map(_, v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for CqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascii => write!(f, "ascii"),
            Self::BigInt => write!(f, "bigint"),
            Self::Blob => write!(f, "blob"),
            Self::Boolean => write!(f, "boolean"),
            Self::Counter => write!(f, "counter"),
            Self::Decimal => write!(f, "decimal"),
            Self::Double => write!(f, "double"),
            Self::Float => write!(f, "float"),
            Self::Inet => write!(f, "inet"),
            Self::Int => write!(f, "int"),
            Self::SmallInt => write!(f, "smallint"),
            Self::Text => write!(f, "text"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::TimeUuid => write!(f, "timeuuid"),
            Self::TinyInt => write!(f, "tinyint"),
            Self::Uuid => write!(f, "uuid"),
            Self::VarInt => write!(f, "varint"),
            Self::List(t) => write!(f, "list<{}>", t),
            Self::Set(t) => write!(f, "set<{}>", t),
            Self::Map(k, v) => write!(f, "map<{},{}>", k, v),
            Self::Tuple(ts) => {
                let parts: Vec<String> = ts.iter().map(|t| t.to_string()).collect();
                write!(f, "tuple<{}>", parts.join(","))
            }
            Self::Frozen(t) => write!(f, "frozen<{}>", t),
            Self::Udt(name) => write!(f, "{}", name),
        }
    }
}

/// Maps declared type names to parsing, validation, and row-value coercion.
///
/// Read-only after construction. Bare identifiers that are not primitive
/// type names resolve against the registered UDT names; anything else is an
/// `UnknownType` error.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    udts: BTreeSet<String>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_udts<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            udts: names
                .into_iter()
                .map(|n| n.into().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn has_udt(&self, name: &str) -> bool {
        self.udts.contains(&name.to_ascii_lowercase())
    }

    pub fn parse_type(&self, input: &str) -> Result<CqlType> {
        parser::parse(input, self)
    }

    /// Canonical form of a raw type string, for whitespace-insensitive
    /// schema comparison.
    pub fn canonicalize(&self, input: &str) -> Result<String> {
        self.parse_type(input).map(|t| t.canonical())
    }

    /// Checks a value against a declared type. Null is acceptable for any
    /// type; column-level nullability is the schema's concern.
    pub fn validate(&self, ty: &CqlType, value: &CqlValue) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        let ok = match ty.unfrozen() {
            CqlType::Ascii | CqlType::Text => matches!(value, CqlValue::Text(_)),
            CqlType::BigInt
            | CqlType::Int
            | CqlType::SmallInt
            | CqlType::TinyInt
            | CqlType::VarInt
            | CqlType::Counter => matches!(value, CqlValue::Int(_)),
            CqlType::Decimal => matches!(value, CqlValue::Decimal(_) | CqlValue::Int(_)),
            CqlType::Double | CqlType::Float => {
                matches!(value, CqlValue::Float(_) | CqlValue::Int(_))
            }
            CqlType::Boolean => matches!(value, CqlValue::Boolean(_)),
            CqlType::Blob => matches!(value, CqlValue::Blob(_)),
            CqlType::Inet => matches!(value, CqlValue::Inet(_)),
            CqlType::Uuid => matches!(value, CqlValue::Uuid(_) | CqlValue::TimeUuid(_)),
            CqlType::TimeUuid => matches!(value, CqlValue::TimeUuid(_)),
            CqlType::Timestamp => matches!(value, CqlValue::Timestamp(_)),
            CqlType::List(elem) => match value {
                CqlValue::List(items) => {
                    return items.iter().try_for_each(|v| self.validate(elem, v));
                }
                _ => false,
            },
            CqlType::Set(elem) => match value {
                CqlValue::Set(items) => {
                    return items.iter().try_for_each(|v| self.validate(elem, v));
                }
                _ => false,
            },
            CqlType::Map(key, val) => match value {
                CqlValue::Map(entries) => {
                    return entries.iter().try_for_each(|(k, v)| {
                        self.validate(key, k)?;
                        self.validate(val, v)
                    });
                }
                _ => false,
            },
            CqlType::Tuple(parts) => match value {
                CqlValue::Tuple(items) if items.len() == parts.len() => {
                    return parts
                        .iter()
                        .zip(items)
                        .try_for_each(|(t, v)| self.validate(t, v));
                }
                _ => false,
            },
            CqlType::Udt(_) => matches!(value, CqlValue::Udt(_)),
            CqlType::Frozen(_) => unreachable!("unfrozen() strips frozen wrappers"),
        };
        if ok {
            Ok(())
        } else {
            Err(MapperError::TypeMismatch(format!(
                "expected {}, got {}",
                ty.canonical(),
                value.type_name()
            )))
        }
    }

    /// Coerces a raw transport value into the declared type, used when
    /// mapping result rows back into model attributes. Transports commonly
    /// deliver uuids, timestamps, and inet addresses as text, and
    /// timestamps as epoch milliseconds.
    pub fn parse_value(&self, ty: &CqlType, raw: CqlValue) -> Result<CqlValue> {
        let coerced = match (ty.unfrozen(), raw) {
            (CqlType::Uuid, CqlValue::Text(s)) => CqlValue::Uuid(parse_uuid(&s)?),
            (CqlType::TimeUuid, CqlValue::Text(s)) => CqlValue::TimeUuid(parse_uuid(&s)?),
            (CqlType::Timestamp, CqlValue::Text(s)) => CqlValue::Timestamp(parse_timestamp(&s)?),
            (CqlType::Timestamp, CqlValue::Int(millis)) => {
                let ts = Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
                    MapperError::TypeMismatch(format!("'{}' is out of timestamp range", millis))
                })?;
                CqlValue::Timestamp(ts)
            }
            (CqlType::Inet, CqlValue::Text(s)) => {
                let addr: IpAddr = s.parse().map_err(|_| {
                    MapperError::TypeMismatch(format!("'{}' is not an inet address", s))
                })?;
                CqlValue::Inet(addr)
            }
            (CqlType::Decimal, CqlValue::Text(s)) => CqlValue::Decimal(s),
            (CqlType::Double | CqlType::Float, CqlValue::Int(i)) => CqlValue::Float(i as f64),
            (CqlType::List(elem), CqlValue::List(items)) => CqlValue::List(
                items
                    .into_iter()
                    .map(|v| self.parse_value(elem, v))
                    .collect::<Result<_>>()?,
            ),
            (CqlType::Set(elem), CqlValue::Set(items) | CqlValue::List(items)) => CqlValue::Set(
                items
                    .into_iter()
                    .map(|v| self.parse_value(elem, v))
                    .collect::<Result<_>>()?,
            ),
            (CqlType::Map(key, val), CqlValue::Map(entries)) => CqlValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| Ok((self.parse_value(key, k)?, self.parse_value(val, v)?)))
                    .collect::<Result<_>>()?,
            ),
            (CqlType::Tuple(parts), CqlValue::Tuple(items)) if parts.len() == items.len() => {
                CqlValue::Tuple(
                    parts
                        .iter()
                        .zip(items)
                        .map(|(t, v)| self.parse_value(t, v))
                        .collect::<Result<_>>()?,
                )
            }
            (_, raw) => raw,
        };
        self.validate(ty, &coerced)?;
        Ok(coerced)
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s)
        .map_err(|_| MapperError::TypeMismatch(format!("'{}' is not a valid uuid", s)))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| MapperError::TypeMismatch(format!("'{}' is not a valid timestamp", s)))
}
