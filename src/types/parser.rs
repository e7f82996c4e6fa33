use crate::core::{MapperError, Result};

use super::{CqlType, TypeRegistry};

/// Recursive-descent parser for CQL type strings.
///
/// Accepts arbitrary nesting (`set<frozen<map<text, frozen<map<text, int>>>>>`),
/// tolerates whitespace anywhere between tokens, and resolves bare
/// identifiers against the registry's known UDT names.
pub(super) fn parse(input: &str, registry: &TypeRegistry) -> Result<CqlType> {
    let mut parser = Parser {
        input,
        pos: 0,
        registry,
    };
    let ty = parser.parse_type()?;
    parser.skip_ws();
    if parser.pos != input.len() {
        return Err(MapperError::ParseError(format!(
            "trailing characters after type in '{}'",
            input
        )));
    }
    Ok(ty)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    registry: &'a TypeRegistry,
}

impl<'a> Parser<'a> {
    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(MapperError::ParseError(format!(
                "expected '{}' but found '{}' in '{}'",
                expected, c, self.input
            ))),
            None => Err(MapperError::ParseError(format!(
                "expected '{}' but reached end of '{}'",
                expected, self.input
            ))),
        }
    }

    fn ident(&mut self) -> Result<String> {
        self.skip_ws();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(MapperError::ParseError(format!(
                "expected a type name at byte {} in '{}'",
                start, self.input
            )));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_type(&mut self) -> Result<CqlType> {
        let name = self.ident()?.to_ascii_lowercase();
        match name.as_str() {
            "list" => {
                let mut args = self.type_args(&name, 1)?;
                Ok(CqlType::List(Box::new(args.remove(0))))
            }
            "set" => {
                let mut args = self.type_args(&name, 1)?;
                Ok(CqlType::Set(Box::new(args.remove(0))))
            }
            "map" => {
                let mut args = self.type_args(&name, 2)?;
                let key = args.remove(0);
                let value = args.remove(0);
                Ok(CqlType::Map(Box::new(key), Box::new(value)))
            }
            "tuple" => {
                let args = self.type_args(&name, 0)?;
                Ok(CqlType::Tuple(args))
            }
            "frozen" => {
                let mut args = self.type_args(&name, 1)?;
                Ok(CqlType::Frozen(Box::new(args.remove(0))))
            }
            other => {
                if let Some(primitive) = base_type(other) {
                    Ok(primitive)
                } else if self.registry.has_udt(other) {
                    Ok(CqlType::Udt(other.to_string()))
                } else {
                    Err(MapperError::UnknownType(other.to_string()))
                }
            }
        }
    }

    /// Parses `<T, ...>`. `arity` 0 means one-or-more.
    fn type_args(&mut self, keyword: &str, arity: usize) -> Result<Vec<CqlType>> {
        self.expect('<')?;
        let mut args = Vec::new();
        loop {
            args.push(self.parse_type()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('>') => break,
                Some(c) => {
                    return Err(MapperError::ParseError(format!(
                        "expected ',' or '>' but found '{}' in '{}'",
                        c, self.input
                    )));
                }
                None => {
                    return Err(MapperError::ParseError(format!(
                        "unterminated '{}<...' in '{}'",
                        keyword, self.input
                    )));
                }
            }
        }
        if arity != 0 && args.len() != arity {
            return Err(MapperError::ParseError(format!(
                "'{}' takes {} type argument(s), found {} in '{}'",
                keyword,
                arity,
                args.len(),
                self.input
            )));
        }
        Ok(args)
    }
}

fn base_type(name: &str) -> Option<CqlType> {
    let ty = match name {
        "ascii" => CqlType::Ascii,
        "bigint" => CqlType::BigInt,
        "blob" => CqlType::Blob,
        "boolean" => CqlType::Boolean,
        "counter" => CqlType::Counter,
        "decimal" => CqlType::Decimal,
        "double" => CqlType::Double,
        "float" => CqlType::Float,
        "inet" => CqlType::Inet,
        "int" => CqlType::Int,
        "smallint" => CqlType::SmallInt,
        "text" | "varchar" => CqlType::Text,
        "timestamp" => CqlType::Timestamp,
        "timeuuid" => CqlType::TimeUuid,
        "tinyint" => CqlType::TinyInt,
        "uuid" => CqlType::Uuid,
        "varint" => CqlType::VarInt,
        _ => return None,
    };
    Some(ty)
}
