//! Restricted decoder for the PHP serialized text format.
//!
//! Only data types are accepted: `N;`, `b:<0|1>;`, `i:<int>;`,
//! `d:<float>;`, `s:<len>:"<bytes>";` and `a:<n>:{<key><value>...}`.
//! Objects (`O`, `C`) and references (`r`, `R`) are refused, so untrusted
//! input can never name a type to instantiate.

use serde_json::{Map, Number, Value};

use crate::error::DecodeError;

const MAX_DEPTH: usize = 64;

pub(super) fn decode(body: &[u8]) -> Result<Value, DecodeError> {
    let mut parser = Parser { input: body, pos: 0 };
    let value = parser.value(0)?;
    if parser.pos != body.len() {
        return Err(parser.error("trailing data after value"));
    }
    Ok(value)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: impl Into<String>) -> DecodeError {
        DecodeError::Serialized {
            offset: self.pos,
            reason: reason.into(),
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), DecodeError> {
        if self.input.get(self.pos) == Some(&byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", byte as char)))
        }
    }

    /// Text up to `end`, consuming the terminator.
    fn token(&mut self, end: u8) -> Result<&'a str, DecodeError> {
        let input = self.input;
        let start = self.pos;
        let len = input[start..]
            .iter()
            .position(|&b| b == end)
            .ok_or_else(|| self.error(format!("missing '{}'", end as char)))?;
        self.pos = start + len + 1;
        std::str::from_utf8(&input[start..start + len]).map_err(|_| DecodeError::Serialized {
            offset: start,
            reason: "token is not valid UTF-8".to_string(),
        })
    }

    fn length(&mut self) -> Result<usize, DecodeError> {
        let raw = self.token(b':')?;
        raw.parse()
            .map_err(|_| self.error(format!("invalid length '{raw}'")))
    }

    fn value(&mut self, depth: usize) -> Result<Value, DecodeError> {
        let tag = *self
            .input
            .get(self.pos)
            .ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;

        match tag {
            b'N' => {
                self.expect(b';')?;
                Ok(Value::Null)
            }
            b'b' => {
                self.expect(b':')?;
                match self.token(b';')? {
                    "0" => Ok(Value::Bool(false)),
                    "1" => Ok(Value::Bool(true)),
                    other => Err(self.error(format!("invalid boolean '{other}'"))),
                }
            }
            b'i' => {
                self.expect(b':')?;
                let raw = self.token(b';')?;
                raw.parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| self.error(format!("invalid integer '{raw}'")))
            }
            b'd' => {
                self.expect(b':')?;
                let raw = self.token(b';')?;
                let float: f64 = raw
                    .parse()
                    .map_err(|_| self.error(format!("invalid float '{raw}'")))?;
                Number::from_f64(float)
                    .map(Value::Number)
                    .ok_or_else(|| self.error("non-finite float"))
            }
            b's' => {
                self.expect(b':')?;
                let len = self.length()?;
                self.expect(b'"')?;
                let end = self
                    .pos
                    .checked_add(len)
                    .filter(|&end| end <= self.input.len())
                    .ok_or_else(|| self.error("string length exceeds input"))?;
                let text = String::from_utf8_lossy(&self.input[self.pos..end]).into_owned();
                self.pos = end;
                self.expect(b'"')?;
                self.expect(b';')?;
                Ok(Value::String(text))
            }
            b'a' => {
                if depth >= MAX_DEPTH {
                    return Err(self.error("arrays nested too deeply"));
                }
                self.expect(b':')?;
                let count = self.length()?;
                self.expect(b'{')?;
                let entries = self.entries(count, depth)?;
                self.expect(b'}')?;
                Ok(entries)
            }
            b'O' | b'C' => Err(self.error("serialized objects are not accepted")),
            b'r' | b'R' => Err(self.error("serialized references are not accepted")),
            other => Err(self.error(format!("unknown type tag '{}'", other as char))),
        }
    }

    /// Array body. Keys `0..n` in order become a JSON array, anything else
    /// an object with stringified keys.
    fn entries(&mut self, count: usize, depth: usize) -> Result<Value, DecodeError> {
        // A hostile count must not drive the allocation.
        let mut entries = Vec::with_capacity(count.min(1024));
        let mut sequential = true;
        for index in 0..count {
            let key = match self.value(depth + 1)? {
                Value::Number(n) if n.is_i64() => {
                    sequential &= n.as_i64() == i64::try_from(index).ok();
                    n.to_string()
                }
                Value::String(s) => {
                    sequential = false;
                    s
                }
                _ => return Err(self.error("array keys must be integers or strings")),
            };
            let value = self.value(depth + 1)?;
            entries.push((key, value));
        }

        if sequential {
            return Ok(Value::Array(entries.into_iter().map(|(_, v)| v).collect()));
        }
        Ok(Value::Object(entries.into_iter().collect::<Map<String, Value>>()))
    }
}
