//! FSPEC parsing and record decoding against a UAP.

use serde::Serialize;

use crate::bds::BdsConfig;
use crate::chain;
use crate::diag::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::item::{Context, Format, ItemValue};
use crate::types::{format_bits, serialize_hex, AsterixError, Result};
use crate::uap::Uap;

/// One FSPEC-delimited record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Offset of the FSPEC within the message.
    pub offset: usize,
    /// Bytes consumed, FSPEC included.
    pub length: usize,
    #[serde(serialize_with = "serialize_hex")]
    pub fspec: Vec<u8>,
    pub presence: Vec<bool>,
    /// One entry per UAP position, in UAP order.
    pub items: Vec<ItemValue>,
}

impl Record {
    pub fn get(&self, id: &str) -> Option<&ItemValue> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Present item by id.
    pub fn present(&self, id: &str) -> Option<&ItemValue> {
        self.get(id).filter(|item| item.exists)
    }

    /// FSPEC as a bit string, FX bits included.
    pub fn fspec_bits(&self) -> String {
        self.fspec
            .iter()
            .map(|b| format_bits(*b as u64, 8))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Decode the record starting at `pos`.
///
/// `buf` is everything available, which may extend past the message's
/// declared length. Item value errors are reported to `diag` and leave the
/// item absent; structural truncation aborts the record.
pub fn decode_record(
    uap: &Uap,
    buf: &[u8],
    pos: usize,
    bds: &BdsConfig,
    diag: &dyn Diagnostics,
) -> Result<Record> {
    let fspec_len = chain::chain_len(buf, pos, 1).map_err(|_| AsterixError::MalformedFspec {
        offset: pos,
        raw: buf[pos.min(buf.len())..].to_vec(),
    })?;
    let fspec = buf[pos..pos + fspec_len].to_vec();
    let presence = chain::presence_bits(&fspec);

    let mut cursor = pos + fspec_len;
    let mut items: Vec<ItemValue> = Vec::with_capacity(uap.len());

    for (i, entry) in uap.entries.iter().enumerate() {
        let set = presence.get(i).copied().unwrap_or(false);
        if !set {
            items.push(ItemValue::absent(entry.frn, entry.id));
            continue;
        }
        if let Format::Spare = entry.format {
            diag.report(
                Diagnostic::new(
                    DiagnosticKind::IgnoredPresenceBits,
                    Some(uap.category),
                    format!("presence bit set for spare FRN {}", entry.frn),
                )
                .with_raw(&fspec),
            );
            items.push(ItemValue::absent(entry.frn, entry.id));
            continue;
        }

        let span = entry.format.span(buf, cursor).map_err(|err| match err {
            AsterixError::TruncatedBuffer { needed, available, .. } => AsterixError::TruncatedBuffer {
                offset: cursor,
                needed,
                available,
                raw: buf[pos..].to_vec(),
            },
            other => other,
        })?;
        let bytes = &buf[cursor..cursor + span];

        let decoded = {
            let ctx = Context { bds, prior: &items };
            entry.format.decode(bytes, &ctx)
        };
        match decoded {
            Ok(data) => items.push(ItemValue {
                frn: entry.frn,
                id: entry.id,
                exists: true,
                raw: bytes.to_vec(),
                data: Some(data),
                fault: None,
            }),
            Err(err) => {
                if let Some(d) = Diagnostic::from_error(&err, Some(uap.category)) {
                    diag.report(d.with_item(entry.id).with_raw(bytes));
                }
                items.push(ItemValue {
                    frn: entry.frn,
                    id: entry.id,
                    exists: false,
                    raw: bytes.to_vec(),
                    data: None,
                    fault: Some(err.to_string()),
                });
            }
        }
        cursor += span;
    }

    if presence.iter().skip(uap.len()).any(|bit| *bit) {
        diag.report(
            Diagnostic::new(
                DiagnosticKind::IgnoredPresenceBits,
                Some(uap.category),
                format!("FSPEC sets bits beyond the {} UAP entries", uap.len()),
            )
            .with_raw(&fspec),
        );
    }

    Ok(Record {
        offset: pos,
        length: cursor - pos,
        fspec,
        presence,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diag::NullSink;
    use crate::item::{check_range, Field, FieldsFn, Value};
    use crate::uap::UapEntry;
    use std::sync::{Arc, Mutex};

    fn byte(b: &[u8]) -> Result<Vec<Field>> {
        Ok(vec![Field::uint("v", b[0] as u64)])
    }

    fn bounded(b: &[u8]) -> Result<Vec<Field>> {
        let v = check_range("v", b[0] as f64, 0.0, 100.0)?;
        Ok(vec![Field::float("v", v, "x")])
    }

    const EXT: &[FieldsFn] = &[byte];

    fn test_uap(count: u8) -> Uap {
        let mut entries = Vec::new();
        for frn in 1..=count {
            entries.push(UapEntry::new(frn, "I999/001", "byte", Format::Fixed(1, byte)));
        }
        Uap { category: 99, name: "test", entries }
    }

    #[test]
    fn test_fspec_presence_is_seven_bits_per_octet() {
        let uap = test_uap(14);
        for k in 1..=3usize {
            // k FSPEC octets, only the FX bits set except on the last
            let mut buf = vec![0x01u8; k - 1];
            buf.push(0x80);
            buf.push(0x2A);
            let rec = decode_record(&uap, &buf, 0, &BdsConfig::default(), &NullSink).unwrap();
            assert_eq!(rec.presence.len(), 7 * k);
            assert_eq!(rec.fspec.len(), k);
            // Exactly FSPEC + the present items consumed
            let present = rec.items.iter().filter(|i| i.exists).count();
            assert_eq!(rec.length, k + present);
        }
    }

    #[test]
    fn test_absent_items_consume_nothing() {
        let uap = test_uap(7);
        // bits 1 and 3 set
        let buf = [0b1010_0000, 0x11, 0x33, 0xFF];
        let rec = decode_record(&uap, &buf, 0, &BdsConfig::default(), &NullSink).unwrap();
        assert_eq!(rec.length, 3);
        assert_eq!(rec.items.len(), 7);
        assert!(rec.items[0].exists);
        assert!(!rec.items[1].exists);
        assert_eq!(rec.items[2].field("v"), Some(&Value::Uint(0x33)));
        assert_eq!(rec.fspec_bits(), "10100000");
    }

    #[test]
    fn test_field_range_leaves_item_absent_and_continues() {
        let uap = Uap {
            category: 99,
            name: "test",
            entries: vec![
                UapEntry::new(1, "I999/001", "bounded", Format::Fixed(1, bounded)),
                UapEntry::new(2, "I999/002", "ext", Format::Extensible(1, EXT)),
            ],
        };
        let seen = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::clone(&seen);
        let sink = move |d: Diagnostic| store.lock().unwrap().push((d.kind, d.item));

        let buf = [0b1100_0000, 200, 0x03, 0x04];
        let rec = decode_record(&uap, &buf, 0, &BdsConfig::default(), &sink).unwrap();
        assert_eq!(rec.length, 4);
        let bad = rec.get("I999/001").unwrap();
        assert!(!bad.exists);
        assert!(bad.fault.is_some());
        assert_eq!(bad.raw, vec![200]);
        assert!(rec.present("I999/002").is_some());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(DiagnosticKind::FieldRange, Some("I999/001"))]
        );
    }

    #[test]
    fn test_truncated_item_aborts_record() {
        let uap = test_uap(7);
        let buf = [0b1110_0000, 0x11, 0x22];
        match decode_record(&uap, &buf, 0, &BdsConfig::default(), &NullSink) {
            Err(AsterixError::TruncatedBuffer { offset, raw, .. }) => {
                assert_eq!(offset, 3);
                assert_eq!(raw, buf.to_vec());
            }
            other => panic!("expected TruncatedBuffer, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_fspec() {
        let uap = test_uap(7);
        let buf = [0xFF, 0x01];
        assert!(matches!(
            decode_record(&uap, &buf, 0, &BdsConfig::default(), &NullSink),
            Err(AsterixError::MalformedFspec { offset: 0, .. })
        ));
    }

    #[test]
    fn test_bits_beyond_uap_are_reported() {
        let uap = test_uap(2);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::clone(&seen);
        let sink = move |d: Diagnostic| store.lock().unwrap().push(d.kind);
        // bit 1 (present) and bit 5 (past the UAP)
        let buf = [0b1000_1000, 0x01];
        let rec = decode_record(&uap, &buf, 0, &BdsConfig::default(), &sink).unwrap();
        assert_eq!(rec.length, 2);
        assert_eq!(*seen.lock().unwrap(), vec![DiagnosticKind::IgnoredPresenceBits]);
    }
}
