//! Item value model and the format shapes every catalog item is built from.
//!
//! A `Format` answers two questions for an item at a cursor:
//! - `span`: how many bytes the item occupies, read from structure only
//!   (lengths, FX chains, REP counts, presence octets);
//! - `decode`: the typed value of exactly those bytes.
//!
//! Keeping the two apart lets the record decoder advance past an item whose
//! value is out of range without losing its place in the record.

use serde::Serialize;

use crate::bds::{self, BdsConfig, BdsRegister};
use crate::chain;
use crate::types::{need, serialize_hex, AsterixError, Result};

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// One decoded sub-field value, scale already applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Flag(bool),
    Uint(u64),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Uint(v) => Some(*v as f64),
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint(v) => Some(*v),
            Value::Flag(b) => Some(*b as u64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Flag(b) => write!(f, "{}", *b as u8),
            Value::Uint(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:.4}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

/// A named sub-field of an item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: &'static str,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
}

impl Field {
    pub fn flag(name: &'static str, value: bool) -> Self {
        Field { name, value: Value::Flag(value), unit: None }
    }

    pub fn uint(name: &'static str, value: u64) -> Self {
        Field { name, value: Value::Uint(value), unit: None }
    }

    pub fn int(name: &'static str, value: i64) -> Self {
        Field { name, value: Value::Int(value), unit: None }
    }

    pub fn float(name: &'static str, value: f64, unit: &'static str) -> Self {
        Field { name, value: Value::Float(value), unit: Some(unit) }
    }

    pub fn text(name: &'static str, value: impl Into<String>) -> Self {
        Field { name, value: Value::Text(value.into()), unit: None }
    }

    pub fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }
}

/// One part of an extensible item: its sub-fields and trailing FX bit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtPart {
    pub fields: Vec<Field>,
    pub fx: bool,
}

/// A present subfield of a compound item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubfieldValue {
    pub name: &'static str,
    pub data: ItemData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value")]
pub enum Composite {
    Subfields(Vec<SubfieldValue>),
    Registers(Vec<BdsRegister>),
}

/// Decoded content of a present item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", content = "value")]
pub enum ItemData {
    Scalar(Vec<Field>),
    Extensible(Vec<ExtPart>),
    Repetitive(Vec<Vec<Field>>),
    Composite(Composite),
}

impl ItemData {
    /// First field named `name`, searching nested parts and subfields.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            ItemData::Scalar(fields) => find(fields, name),
            ItemData::Extensible(parts) => parts.iter().find_map(|p| find(&p.fields, name)),
            ItemData::Repetitive(blocks) => blocks.iter().find_map(|b| find(b, name)),
            ItemData::Composite(Composite::Subfields(subs)) => {
                subs.iter().find_map(|s| s.data.field(name))
            }
            ItemData::Composite(Composite::Registers(_)) => None,
        }
    }

    /// Data of the compound subfield `name`, if present.
    pub fn subfield(&self, name: &str) -> Option<&ItemData> {
        match self {
            ItemData::Composite(Composite::Subfields(subs)) => {
                subs.iter().find(|s| s.name == name).map(|s| &s.data)
            }
            _ => None,
        }
    }

    /// Comm-B registers carried by this item.
    pub fn registers(&self) -> &[BdsRegister] {
        match self {
            ItemData::Composite(Composite::Registers(regs)) => regs,
            _ => &[],
        }
    }
}

fn find<'a>(fields: &'a [Field], name: &str) -> Option<&'a Value> {
    fields.iter().find(|f| f.name == name).map(|f| &f.value)
}

/// One UAP position of a record. Absent items are kept with `exists = false`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemValue {
    pub frn: u8,
    pub id: &'static str,
    pub exists: bool,
    #[serde(serialize_with = "serialize_hex", skip_serializing_if = "Vec::is_empty")]
    pub raw: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ItemData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

impl ItemValue {
    pub fn absent(frn: u8, id: &'static str) -> Self {
        ItemValue { frn, id, exists: false, raw: Vec::new(), data: None, fault: None }
    }

    /// Shorthand for `data.field(name)` on a present item.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.as_ref()?.field(name)
    }
}

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

/// Decoder for a fixed-size block of bytes.
pub type FieldsFn = fn(&[u8]) -> Result<Vec<Field>>;

/// Looks up the barometric altitude (ft) among the items decoded so far.
pub type AltitudeFn = fn(&[ItemValue]) -> Option<f64>;

/// How the presence of compound subfields is indicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// FX-chained octets, 7 presence bits each.
    Chained,
    /// One 8-bit indicator octet, no FX.
    Octet,
}

#[derive(Debug, Clone, Copy)]
pub struct Subfield {
    pub name: &'static str,
    pub format: Format,
}

impl Subfield {
    pub const fn new(name: &'static str, format: Format) -> Self {
        Subfield { name, format }
    }

    pub const fn spare() -> Self {
        Subfield { name: "spare", format: Format::Spare }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Format {
    /// Known length.
    Fixed(usize, FieldsFn),
    /// FX chain; first part width, then one layout per part position.
    /// Parts past the last layout reuse it.
    Extensible(usize, &'static [FieldsFn]),
    /// REP octet followed by REP blocks of the given size.
    Repetitive(usize, FieldsFn),
    /// Presence indicator followed by the present subfields in order.
    Compound(Presence, &'static [Subfield]),
    /// Leading length octet (includes itself), then the inner format if any.
    Explicit(Option<&'static Format>),
    /// REP octet followed by REP 8-octet Comm-B registers.
    Registers(AltitudeFn),
    /// Unused position, zero bytes.
    Spare,
}

/// What an item decoder may look at besides its own bytes.
pub struct Context<'a> {
    pub bds: &'a BdsConfig,
    /// Items of the current record decoded before this one.
    pub prior: &'a [ItemValue],
}

impl Format {
    /// Number of bytes the item occupies at `pos`.
    pub fn span(&self, buf: &[u8], pos: usize) -> Result<usize> {
        match self {
            Format::Fixed(len, _) => {
                need(buf, pos, *len)?;
                Ok(*len)
            }
            Format::Extensible(first, _) => chain::chain_len(buf, pos, *first),
            Format::Repetitive(size, _) => repetition_span(buf, pos, *size),
            Format::Registers(_) => repetition_span(buf, pos, bds::REGISTER_LEN),
            Format::Compound(presence, subs) => {
                let (indicator, bits) = presence_at(buf, pos, *presence)?;
                let mut len = indicator;
                for (present, sub) in bits.iter().zip(subs.iter()) {
                    if *present {
                        len += sub.format.span(buf, pos + len)?;
                    }
                }
                Ok(len)
            }
            Format::Explicit(_) => {
                need(buf, pos, 1)?;
                let len = (buf[pos] as usize).max(1);
                need(buf, pos, len)?;
                Ok(len)
            }
            Format::Spare => Ok(0),
        }
    }

    /// Decode an item from exactly its span.
    pub fn decode(&self, bytes: &[u8], ctx: &Context<'_>) -> Result<ItemData> {
        match self {
            Format::Fixed(_, decode) => Ok(ItemData::Scalar(decode(bytes)?)),
            Format::Extensible(first, layouts) => {
                let mut out = Vec::new();
                for (i, part) in chain::parts(bytes, *first).into_iter().enumerate() {
                    let fields = match layouts.get(i).or(layouts.last()) {
                        Some(layout) => layout(part)?,
                        None => Vec::new(),
                    };
                    out.push(ExtPart { fields, fx: chain::has_fx(part) });
                }
                Ok(ItemData::Extensible(out))
            }
            Format::Repetitive(size, decode) => {
                let mut blocks = Vec::new();
                for block in bytes.get(1..).unwrap_or_default().chunks(*size) {
                    blocks.push(decode(block)?);
                }
                Ok(ItemData::Repetitive(blocks))
            }
            Format::Registers(altitude) => {
                let altitude_ft = altitude(ctx.prior);
                let regs = bytes
                    .get(1..)
                    .unwrap_or_default()
                    .chunks(bds::REGISTER_LEN)
                    .map(|reg| bds::decode_register(reg, altitude_ft, ctx.bds))
                    .collect();
                Ok(ItemData::Composite(Composite::Registers(regs)))
            }
            Format::Compound(presence, subs) => {
                let (indicator, bits) = presence_at(bytes, 0, *presence)?;
                let mut pos = indicator;
                let mut out = Vec::new();
                for (present, sub) in bits.iter().zip(subs.iter()) {
                    if !*present {
                        continue;
                    }
                    let len = sub.format.span(bytes, pos)?;
                    if let Format::Spare = sub.format {
                        continue;
                    }
                    let data = sub.format.decode(&bytes[pos..pos + len], ctx)?;
                    out.push(SubfieldValue { name: sub.name, data });
                    pos += len;
                }
                Ok(ItemData::Composite(Composite::Subfields(out)))
            }
            Format::Explicit(inner) => {
                let body = bytes.get(1..).unwrap_or_default();
                match inner {
                    Some(format) => {
                        let len = format.span(body, 0)?;
                        if len != body.len() {
                            return Err(AsterixError::FieldRange {
                                field: "length indicator",
                                value: bytes.len() as f64,
                            });
                        }
                        format.decode(body, ctx)
                    }
                    None => Ok(ItemData::Scalar(vec![Field::text(
                        "data",
                        crate::types::hex_encode(body),
                    )])),
                }
            }
            Format::Spare => Ok(ItemData::Scalar(Vec::new())),
        }
    }
}

fn repetition_span(buf: &[u8], pos: usize, size: usize) -> Result<usize> {
    need(buf, pos, 1)?;
    let len = 1 + buf[pos] as usize * size;
    need(buf, pos, len)?;
    Ok(len)
}

/// Read a compound presence indicator: (indicator length, presence bits).
fn presence_at(buf: &[u8], pos: usize, presence: Presence) -> Result<(usize, Vec<bool>)> {
    match presence {
        Presence::Chained => {
            let len = chain::chain_len(buf, pos, 1)?;
            Ok((len, chain::presence_bits(&buf[pos..pos + len])))
        }
        Presence::Octet => {
            need(buf, pos, 1)?;
            Ok((1, chain::octet_bits(buf[pos])))
        }
    }
}

/// Range check for fields with a documented domain.
pub fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<f64> {
    if !(min..=max).contains(&value) {
        return Err(AsterixError::FieldRange { field, value });
    }
    Ok(value)
}
