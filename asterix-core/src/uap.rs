//! User Application Profiles and the category registry.

use std::collections::BTreeMap;

use crate::item::Format;
use crate::{cat021, cat048};

/// One UAP position. `frn` is 1-based and equals FSPEC bit index + 1.
#[derive(Debug, Clone, Copy)]
pub struct UapEntry {
    pub frn: u8,
    pub id: &'static str,
    pub name: &'static str,
    pub format: Format,
}

impl UapEntry {
    pub const fn new(frn: u8, id: &'static str, name: &'static str, format: Format) -> Self {
        UapEntry { frn, id, name, format }
    }

    pub const fn spare(frn: u8) -> Self {
        UapEntry { frn, id: "spare", name: "Spare", format: Format::Spare }
    }
}

/// Ordered item catalog for one category.
#[derive(Debug, Clone)]
pub struct Uap {
    pub category: u8,
    pub name: &'static str,
    pub entries: Vec<UapEntry>,
}

impl Uap {
    pub fn new(category: u8, name: &'static str, entries: &[UapEntry]) -> Self {
        Uap { category, name, entries: entries.to_vec() }
    }

    pub fn entry(&self, id: &str) -> Option<&UapEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Category → UAP lookup used by the message router.
#[derive(Debug, Clone)]
pub struct Registry {
    uaps: BTreeMap<u8, Uap>,
}

impl Registry {
    /// A registry with no categories.
    pub fn empty() -> Self {
        Registry { uaps: BTreeMap::new() }
    }

    /// Install a UAP, returning the one it replaces.
    pub fn register(&mut self, uap: Uap) -> Option<Uap> {
        self.uaps.insert(uap.category, uap)
    }

    pub fn get(&self, category: u8) -> Option<&Uap> {
        self.uaps.get(&category)
    }

    pub fn categories(&self) -> Vec<u8> {
        self.uaps.keys().copied().collect()
    }

    /// Keep only the listed categories.
    pub fn retain(&mut self, categories: &[u8]) {
        self.uaps.retain(|cat, _| categories.contains(cat));
    }
}

impl Default for Registry {
    /// CAT21 and CAT48.
    fn default() -> Self {
        let mut registry = Registry::empty();
        registry.register(cat021::uap());
        registry.register(cat048::uap());
        registry
    }
}

// ---------------------------------------------------------------------------
// Layouts shared by the bundled catalogs
// ---------------------------------------------------------------------------

pub(crate) mod common {
    use crate::bits::BitReader;
    use crate::item::{check_range, Field};
    use crate::types::{decode_callsign, hex_encode, octal_code, Result};

    /// NM/s to kt.
    pub const NMPS_TO_KT: f64 = 3600.0;

    pub fn data_source(b: &[u8]) -> Result<Vec<Field>> {
        Ok(vec![Field::uint("sac", b[0] as u64), Field::uint("sic", b[1] as u64)])
    }

    /// 24-bit time of day, 1/128 s since midnight.
    pub fn time_of_day(b: &[u8]) -> Result<Vec<Field>> {
        let raw = BitReader::new(b).read_u(24);
        let tod = check_range("time_of_day", raw as f64 / 128.0, 0.0, 86_400.0)?;
        Ok(vec![Field::float("time_of_day", tod, "s")])
    }

    pub fn address(b: &[u8]) -> Result<Vec<Field>> {
        Ok(vec![Field::text("address", hex_encode(&b[..3]))])
    }

    pub fn callsign(b: &[u8]) -> Result<Vec<Field>> {
        let callsign = decode_callsign(b, 8);
        Ok(vec![Field::text("callsign", callsign.trim_end())])
    }

    /// V, G, L, spare, 12-bit octal code.
    pub fn mode_code(b: &[u8]) -> Result<Vec<Field>> {
        let mut r = BitReader::new(b);
        let v = r.read_flag();
        let g = r.read_flag();
        let l = r.read_flag();
        r.skip(1);
        Ok(vec![
            Field::flag("v", v),
            Field::flag("g", g),
            Field::flag("l", l),
            Field::text("code", octal_code(r.read_u(12))),
        ])
    }

    /// Spare nibble and 12-bit octal code.
    pub fn octal12(b: &[u8]) -> Result<Vec<Field>> {
        let mut r = BitReader::new(b);
        r.skip(4);
        Ok(vec![Field::text("code", octal_code(r.read_u(12)))])
    }

    /// Opaque bytes rendered as hex.
    pub fn hex(b: &[u8]) -> Result<Vec<Field>> {
        Ok(vec![Field::text("data", hex_encode(b))])
    }

    pub fn track_number(b: &[u8]) -> Result<Vec<Field>> {
        let mut r = BitReader::new(b);
        r.skip(4);
        Ok(vec![Field::uint("track_number", r.read_u(12))])
    }

    /// WGS-84 latitude/longitude as two 24-bit two's-complement values.
    pub fn wgs84_24(b: &[u8]) -> Result<Vec<Field>> {
        let mut r = BitReader::new(b);
        let lsb = 180.0 / (1u64 << 23) as f64;
        let lat = check_range("latitude", r.read_i(24) as f64 * lsb, -90.0, 90.0)?;
        let lon = check_range("longitude", r.read_i(24) as f64 * lsb, -180.0, 180.0)?;
        Ok(vec![
            Field::float("latitude", lat, "deg"),
            Field::float("longitude", lon, "deg"),
        ])
    }

    /// Mode 5 / extended Mode 1 X-pulse presence.
    pub fn x_pulses(b: &[u8]) -> Result<Vec<Field>> {
        let mut r = BitReader::new(b);
        r.skip(3);
        Ok(vec![
            Field::flag("x5", r.read_flag()),
            Field::flag("xc", r.read_flag()),
            Field::flag("x3", r.read_flag()),
            Field::flag("x2", r.read_flag()),
            Field::flag("x1", r.read_flag()),
        ])
    }

    /// Mode 5 summary octet. The last bit is `x` in CAT48 and `po` in CAT21.
    pub fn mode5_summary(b: &[u8], last: &'static str) -> Vec<Field> {
        let mut r = BitReader::new(b);
        let mut fields = Vec::with_capacity(8);
        for name in ["m5", "id", "da", "m1", "m2", "m3", "mc"] {
            fields.push(Field::flag(name, r.read_flag()));
        }
        fields.push(Field::flag(last, r.read_flag()));
        fields
    }

    pub fn fom5(b: &[u8]) -> Result<Vec<Field>> {
        Ok(vec![Field::uint("fom", (b[0] & 0x1F) as u64)])
    }

    /// Unsigned age in 0.1 s.
    pub fn age(b: &[u8]) -> Result<Vec<Field>> {
        Ok(vec![Field::float("age", b[0] as f64 * 0.1, "s")])
    }
}
