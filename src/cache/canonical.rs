//! Canonical binary encoding of call arguments.
//!
//! Every value is written as a kind tag followed by its payload, so `()`,
//! `None`, `Some(None)` and a unit struct all encode differently, and floats
//! keep their exact bits (`inf`, `-inf` and NaN stay distinct; all NaNs share
//! one encoding). The encoding is prefix-free: scalars carry a length,
//! compounds carry an element count.
//!
//! Map entries are sorted by their encoded key. Sequences keep their order,
//! except those produced by hash sets, whose elements are sorted by encoding.

use std::fmt::Display;

use serde::ser::{self, Serialize};

use super::key::KeyError;

mod tag {
    pub const UNIT: u8 = 0;
    pub const NONE: u8 = 1;
    pub const SOME: u8 = 2;
    pub const BOOL: u8 = 3;
    pub const INT: u8 = 4;
    pub const UINT: u8 = 5;
    pub const FLOAT: u8 = 6;
    pub const CHAR: u8 = 7;
    pub const STR: u8 = 8;
    pub const BYTES: u8 = 9;
    pub const SEQ: u8 = 10;
    pub const SET: u8 = 11;
    pub const TUPLE: u8 = 12;
    pub const MAP: u8 = 13;
    pub const STRUCT: u8 = 14;
    pub const NEWTYPE: u8 = 15;
    pub const UNIT_STRUCT: u8 = 16;
    pub const VARIANT: u8 = 17;
}

/// Encode `value` canonically.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, KeyError> {
    value.serialize(Canonical)
}

impl ser::Error for KeyError {
    fn custom<T: Display>(msg: T) -> Self {
        KeyError::new(msg.to_string())
    }
}

fn push_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as u64).to_le_bytes());
}

fn scalar(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(9 + payload.len());
    out.push(tag);
    push_len(&mut out, payload.len());
    out.extend_from_slice(payload);
    out
}

fn compound(tag: u8, name: &str, items: Vec<Vec<u8>>) -> Vec<u8> {
    let mut out = vec![tag];
    push_len(&mut out, name.len());
    out.extend_from_slice(name.as_bytes());
    push_len(&mut out, items.len());
    for item in items {
        out.extend(item);
    }
    out
}

fn variant(name: &str, index: u32, variant: &str, payload: Vec<u8>) -> Vec<u8> {
    compound(
        tag::VARIANT,
        name,
        vec![
            scalar(tag::INT, &i128::from(index).to_le_bytes()),
            scalar(tag::STR, variant.as_bytes()),
            payload,
        ],
    )
}

/// Hash-set containers iterate in an unspecified order.
fn is_unordered<I>() -> bool {
    let name = std::any::type_name::<I>();
    let outer = name
        .trim_start_matches('&')
        .trim_start_matches("mut ")
        .split('<')
        .next()
        .unwrap_or_default();
    outer.ends_with("HashSet")
}

#[derive(Clone, Copy)]
struct Canonical;

impl ser::Serializer for Canonical {
    type Ok = Vec<u8>;
    type Error = KeyError;
    type SerializeSeq = SeqEncoder;
    type SerializeTuple = SeqEncoder;
    type SerializeTupleStruct = SeqEncoder;
    type SerializeTupleVariant = SeqEncoder;
    type SerializeMap = MapEncoder;
    type SerializeStruct = StructEncoder;
    type SerializeStructVariant = StructEncoder;

    fn serialize_bool(self, v: bool) -> Result<Vec<u8>, KeyError> {
        Ok(scalar(tag::BOOL, &[u8::from(v)]))
    }

    fn serialize_i8(self, v: i8) -> Result<Vec<u8>, KeyError> {
        self.serialize_i128(v.into())
    }

    fn serialize_i16(self, v: i16) -> Result<Vec<u8>, KeyError> {
        self.serialize_i128(v.into())
    }

    fn serialize_i32(self, v: i32) -> Result<Vec<u8>, KeyError> {
        self.serialize_i128(v.into())
    }

    fn serialize_i64(self, v: i64) -> Result<Vec<u8>, KeyError> {
        self.serialize_i128(v.into())
    }

    fn serialize_i128(self, v: i128) -> Result<Vec<u8>, KeyError> {
        Ok(scalar(tag::INT, &v.to_le_bytes()))
    }

    fn serialize_u8(self, v: u8) -> Result<Vec<u8>, KeyError> {
        self.serialize_i128(v.into())
    }

    fn serialize_u16(self, v: u16) -> Result<Vec<u8>, KeyError> {
        self.serialize_i128(v.into())
    }

    fn serialize_u32(self, v: u32) -> Result<Vec<u8>, KeyError> {
        self.serialize_i128(v.into())
    }

    fn serialize_u64(self, v: u64) -> Result<Vec<u8>, KeyError> {
        self.serialize_i128(v.into())
    }

    fn serialize_u128(self, v: u128) -> Result<Vec<u8>, KeyError> {
        match i128::try_from(v) {
            Ok(signed) => self.serialize_i128(signed),
            Err(_) => Ok(scalar(tag::UINT, &v.to_le_bytes())),
        }
    }

    fn serialize_f32(self, v: f32) -> Result<Vec<u8>, KeyError> {
        self.serialize_f64(v.into())
    }

    fn serialize_f64(self, v: f64) -> Result<Vec<u8>, KeyError> {
        let bits = if v.is_nan() {
            f64::NAN.to_bits()
        } else {
            v.to_bits()
        };
        Ok(scalar(tag::FLOAT, &bits.to_le_bytes()))
    }

    fn serialize_char(self, v: char) -> Result<Vec<u8>, KeyError> {
        let mut buf = [0u8; 4];
        Ok(scalar(tag::CHAR, v.encode_utf8(&mut buf).as_bytes()))
    }

    fn serialize_str(self, v: &str) -> Result<Vec<u8>, KeyError> {
        Ok(scalar(tag::STR, v.as_bytes()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Vec<u8>, KeyError> {
        Ok(scalar(tag::BYTES, v))
    }

    fn serialize_none(self) -> Result<Vec<u8>, KeyError> {
        Ok(scalar(tag::NONE, &[]))
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>, KeyError> {
        Ok(compound(tag::SOME, "", vec![value.serialize(self)?]))
    }

    fn serialize_unit(self) -> Result<Vec<u8>, KeyError> {
        Ok(scalar(tag::UNIT, &[]))
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<Vec<u8>, KeyError> {
        Ok(compound(tag::UNIT_STRUCT, name, Vec::new()))
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        index: u32,
        variant_name: &'static str,
    ) -> Result<Vec<u8>, KeyError> {
        Ok(variant(name, index, variant_name, scalar(tag::UNIT, &[])))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<Vec<u8>, KeyError> {
        Ok(compound(tag::NEWTYPE, name, vec![value.serialize(self)?]))
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        index: u32,
        variant_name: &'static str,
        value: &T,
    ) -> Result<Vec<u8>, KeyError> {
        Ok(variant(name, index, variant_name, value.serialize(self)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqEncoder, KeyError> {
        Ok(SeqEncoder::new(tag::SEQ, "", None, len.unwrap_or(0)))
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqEncoder, KeyError> {
        Ok(SeqEncoder::new(tag::TUPLE, "", None, len))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<SeqEncoder, KeyError> {
        Ok(SeqEncoder::new(tag::TUPLE, name, None, len))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        index: u32,
        variant_name: &'static str,
        len: usize,
    ) -> Result<SeqEncoder, KeyError> {
        Ok(SeqEncoder::new(
            tag::TUPLE,
            name,
            Some((index, variant_name)),
            len,
        ))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapEncoder, KeyError> {
        Ok(MapEncoder::default())
    }

    fn serialize_struct(self, name: &'static str, len: usize) -> Result<StructEncoder, KeyError> {
        Ok(StructEncoder::new(name, None, len))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        index: u32,
        variant_name: &'static str,
        len: usize,
    ) -> Result<StructEncoder, KeyError> {
        Ok(StructEncoder::new(name, Some((index, variant_name)), len))
    }

    fn collect_seq<I>(self, iter: I) -> Result<Vec<u8>, KeyError>
    where
        I: IntoIterator,
        I::Item: Serialize,
    {
        let unordered = is_unordered::<I>();
        let mut items = iter
            .into_iter()
            .map(|item| item.serialize(Canonical))
            .collect::<Result<Vec<_>, _>>()?;
        if unordered {
            items.sort();
            Ok(compound(tag::SET, "", items))
        } else {
            Ok(compound(tag::SEQ, "", items))
        }
    }
}

struct SeqEncoder {
    tag: u8,
    name: &'static str,
    variant: Option<(u32, &'static str)>,
    items: Vec<Vec<u8>>,
}

impl SeqEncoder {
    fn new(tag: u8, name: &'static str, variant: Option<(u32, &'static str)>, len: usize) -> Self {
        Self {
            tag,
            name,
            variant,
            items: Vec::with_capacity(len),
        }
    }

    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), KeyError> {
        self.items.push(value.serialize(Canonical)?);
        Ok(())
    }

    fn finish(self) -> Vec<u8> {
        match self.variant {
            Some((index, variant_name)) => variant(
                self.name,
                index,
                variant_name,
                compound(self.tag, "", self.items),
            ),
            None => compound(self.tag, self.name, self.items),
        }
    }
}

impl ser::SerializeSeq for SeqEncoder {
    type Ok = Vec<u8>;
    type Error = KeyError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), KeyError> {
        self.push(value)
    }

    fn end(self) -> Result<Vec<u8>, KeyError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SeqEncoder {
    type Ok = Vec<u8>;
    type Error = KeyError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), KeyError> {
        self.push(value)
    }

    fn end(self) -> Result<Vec<u8>, KeyError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SeqEncoder {
    type Ok = Vec<u8>;
    type Error = KeyError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), KeyError> {
        self.push(value)
    }

    fn end(self) -> Result<Vec<u8>, KeyError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleVariant for SeqEncoder {
    type Ok = Vec<u8>;
    type Error = KeyError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), KeyError> {
        self.push(value)
    }

    fn end(self) -> Result<Vec<u8>, KeyError> {
        Ok(self.finish())
    }
}

#[derive(Default)]
struct MapEncoder {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    pending_key: Option<Vec<u8>>,
}

impl ser::SerializeMap for MapEncoder {
    type Ok = Vec<u8>;
    type Error = KeyError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), KeyError> {
        self.pending_key = Some(key.serialize(Canonical)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), KeyError> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| KeyError::new("map value without a key"))?;
        self.entries.push((key, value.serialize(Canonical)?));
        Ok(())
    }

    fn end(mut self) -> Result<Vec<u8>, KeyError> {
        self.entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        let items = self
            .entries
            .into_iter()
            .map(|(mut key, value)| {
                key.extend(value);
                key
            })
            .collect();
        Ok(compound(tag::MAP, "", items))
    }
}

struct StructEncoder {
    name: &'static str,
    variant: Option<(u32, &'static str)>,
    fields: Vec<Vec<u8>>,
}

impl StructEncoder {
    fn new(name: &'static str, variant: Option<(u32, &'static str)>, len: usize) -> Self {
        Self {
            name,
            variant,
            fields: Vec::with_capacity(len),
        }
    }

    fn push<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<(), KeyError> {
        let mut field = scalar(tag::STR, key.as_bytes());
        field.extend(value.serialize(Canonical)?);
        self.fields.push(field);
        Ok(())
    }

    fn finish(self) -> Vec<u8> {
        match self.variant {
            Some((index, variant_name)) => variant(
                self.name,
                index,
                variant_name,
                compound(tag::STRUCT, "", self.fields),
            ),
            None => compound(tag::STRUCT, self.name, self.fields),
        }
    }
}

impl ser::SerializeStruct for StructEncoder {
    type Ok = Vec<u8>;
    type Error = KeyError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), KeyError> {
        self.push(key, value)
    }

    fn end(self) -> Result<Vec<u8>, KeyError> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for StructEncoder {
    type Ok = Vec<u8>;
    type Error = KeyError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), KeyError> {
        self.push(key, value)
    }

    fn end(self) -> Result<Vec<u8>, KeyError> {
        Ok(self.finish())
    }
}
