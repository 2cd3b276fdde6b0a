//! Message framing and category dispatch.
//!
//! A message is `[category:1][length:2 BE, header included][records...]`.
//! The router reads the header, looks the category up in the [`Registry`] and
//! runs the record decoder until the declared length is used up.

use std::sync::OnceLock;

use serde::Serialize;

use crate::bds::BdsConfig;
use crate::diag::{Diagnostic, DiagnosticKind, Diagnostics, TracingSink};
use crate::record::{decode_record, Record};
use crate::types::{serialize_hex, AsterixError, Result};
use crate::uap::Registry;

const HEADER_LEN: usize = 3;

/// A decoded ASTERIX message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub category: u8,
    pub declared_length: u16,
    /// The message bytes, header included, up to the declared length.
    #[serde(serialize_with = "serialize_hex")]
    pub raw: Vec<u8>,
    /// Bytes consumed by the header and all records.
    pub consumed: usize,
    pub records: Vec<Record>,
}

impl Message {
    /// All present items with the given id, across records.
    pub fn items<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a crate::item::ItemValue> + 'a {
        self.records.iter().filter_map(move |rec| rec.present(id))
    }
}

/// Read `[category][length]` from the start of `bytes`.
fn header(bytes: &[u8]) -> Result<(u8, u16)> {
    if bytes.len() < HEADER_LEN {
        return Err(AsterixError::TruncatedBuffer {
            offset: 0,
            needed: HEADER_LEN,
            available: bytes.len(),
            raw: bytes.to_vec(),
        });
    }
    Ok((bytes[0], u16::from_be_bytes([bytes[1], bytes[2]])))
}

/// Message decoder: a registry, BDS tunables and a diagnostics sink.
///
/// Holds no mutable state; share it across threads freely.
pub struct Decoder {
    registry: Registry,
    bds: BdsConfig,
    sink: Box<dyn Diagnostics>,
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::new(Registry::default())
    }
}

impl Decoder {
    pub fn new(registry: Registry) -> Self {
        Decoder {
            registry,
            bds: BdsConfig::default(),
            sink: Box::new(TracingSink),
        }
    }

    pub fn with_bds(mut self, bds: BdsConfig) -> Self {
        self.bds = bds;
        self
    }

    pub fn with_sink(mut self, sink: impl Diagnostics + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn bds(&self) -> &BdsConfig {
        &self.bds
    }

    /// Decode one length-delimited chunk.
    ///
    /// Bytes past the declared length are reported as `TrailingBytes`.
    pub fn decode(&self, bytes: &[u8]) -> Result<Message> {
        let result = self.decode_frame(bytes);
        match &result {
            Ok(msg) if bytes.len() > msg.consumed.max(msg.declared_length as usize) => {
                self.sink.report(
                    Diagnostic::new(
                        DiagnosticKind::TrailingBytes,
                        Some(msg.category),
                        format!(
                            "{} bytes after declared length {}",
                            bytes.len() - msg.declared_length as usize,
                            msg.declared_length
                        ),
                    )
                    .with_raw(&bytes[msg.declared_length as usize..]),
                );
            }
            Ok(_) => {}
            Err(err) => self.report(err, bytes.first().copied()),
        }
        result
    }

    /// Lazily decode a buffer of concatenated messages.
    pub fn stream<'a>(&'a self, buf: &'a [u8]) -> MessageStream<'a> {
        MessageStream {
            decoder: self,
            buf,
            pos: 0,
            done: false,
        }
    }

    /// Lazily decode line-delimited chunks, one result per chunk.
    pub fn decode_chunks<'a, I>(&'a self, chunks: I) -> impl Iterator<Item = Result<Message>> + 'a
    where
        I: IntoIterator + 'a,
        I::Item: AsRef<[u8]>,
        I::IntoIter: 'a,
    {
        chunks.into_iter().map(move |chunk| self.decode(chunk.as_ref()))
    }

    fn report(&self, err: &AsterixError, category: Option<u8>) {
        if let Some(d) = Diagnostic::from_error(err, category) {
            self.sink.report(d);
        }
    }

    /// Decode the message at the start of `bytes`. Records only see the bytes
    /// up to the declared length.
    ///
    /// A record that fails after earlier records decoded is reported and ends
    /// the message, which comes back as `LengthMismatch` with what was decoded.
    fn decode_frame(&self, bytes: &[u8]) -> Result<Message> {
        let (category, declared_length) = header(bytes)?;
        let declared = declared_length as usize;

        let mut msg = Message {
            category,
            declared_length,
            raw: bytes[..declared.clamp(HEADER_LEN, bytes.len())].to_vec(),
            consumed: HEADER_LEN,
            records: Vec::new(),
        };

        if declared < HEADER_LEN {
            return Err(AsterixError::LengthMismatch {
                declared,
                consumed: HEADER_LEN,
                message: Box::new(msg),
            });
        }
        if declared > bytes.len() {
            return Err(AsterixError::TruncatedBuffer {
                offset: 0,
                needed: declared,
                available: bytes.len(),
                raw: bytes.to_vec(),
            });
        }

        let uap = self
            .registry
            .get(category)
            .ok_or_else(|| AsterixError::UnsupportedCategory {
                category,
                raw: bytes[..declared].to_vec(),
            })?;

        let body = &bytes[..declared];
        while msg.consumed < declared {
            match decode_record(uap, body, msg.consumed, &self.bds, self.sink.as_ref()) {
                Ok(record) => {
                    msg.consumed += record.length;
                    msg.records.push(record);
                }
                Err(err) if msg.records.is_empty() => return Err(err),
                Err(err) => {
                    self.report(&err, Some(category));
                    break;
                }
            }
        }

        if msg.consumed != declared {
            return Err(AsterixError::LengthMismatch {
                declared,
                consumed: msg.consumed,
                message: Box::new(msg),
            });
        }
        Ok(msg)
    }
}

/// Iterator over the messages of a concatenated buffer.
///
/// Advances by each message's declared length. Unsupported categories are
/// reported and skipped; a truncated tail or a declared length below the
/// header size ends the stream after its error is yielded.
pub struct MessageStream<'a> {
    decoder: &'a Decoder,
    buf: &'a [u8],
    pos: usize,
    done: bool,
}

impl MessageStream<'_> {
    /// Offset of the next message in the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Iterator for MessageStream<'_> {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done || self.pos >= self.buf.len() {
                return None;
            }
            let rest = &self.buf[self.pos..];
            let declared = match header(rest) {
                Ok((_, len)) => len as usize,
                Err(err) => {
                    self.done = true;
                    self.decoder.report(&err, rest.first().copied());
                    return Some(Err(err));
                }
            };

            let result = self.decoder.decode_frame(rest);
            if declared < HEADER_LEN || declared > rest.len() {
                self.done = true;
            } else {
                self.pos += declared;
            }

            match result {
                Err(err @ AsterixError::UnsupportedCategory { .. }) => {
                    self.decoder.report(&err, rest.first().copied());
                    continue;
                }
                Err(err) => {
                    self.decoder.report(&err, rest.first().copied());
                    return Some(Err(err));
                }
                Ok(msg) => return Some(Ok(msg)),
            }
        }
    }
}

/// Decode one chunk with the bundled CAT21/CAT48 registry and default
/// settings. Diagnostics go to `tracing`.
pub fn decode(bytes: &[u8]) -> Result<Message> {
    static DEFAULT: OnceLock<Decoder> = OnceLock::new();
    DEFAULT.get_or_init(Decoder::default).decode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cat021::tests::sample_message;
    use crate::diag::NullSink;
    use crate::types::{hex_decode, hex_encode};
    use std::sync::{Arc, Mutex};

    fn decoder() -> Decoder {
        Decoder::default().with_sink(NullSink)
    }

    /// CAT048 message with one record holding only I048/010.
    fn cat48(sic: u8) -> Vec<u8> {
        vec![0x30, 0x00, 0x06, 0x80, 0x19, sic]
    }

    #[test]
    fn test_cat21_sample_message() {
        let bytes = sample_message();
        assert!(hex_encode(&bytes).starts_with("150063"));
        let msg = decoder().decode(&bytes).unwrap();
        assert_eq!(msg.category, 21);
        assert_eq!(msg.declared_length, 0x63);
        assert_eq!(msg.consumed, 0x63);
        assert_eq!(msg.records.len(), 1);
        assert_eq!(msg.raw, bytes);
    }

    #[test]
    fn test_cat21_recorded_message() {
        let hex = concat!(
            "150063F71B7B6BD3A70414D70101000D95011CFAA6FDAE330E7D5334FED7199A342",
            "1083840AF3840BF08C40FF315A0120336020A40020A063F2E683840EA242173C75E2",
            "000C3200818D001F7C35940070517070303050703031C170907C40858000000",
        );
        let bytes = hex_decode(hex).unwrap();
        let msg = decoder().decode(&bytes).unwrap();
        assert_eq!(msg.category, 21);
        assert_eq!(msg.declared_length, 0x63);
        assert_eq!(msg.consumed, 0x63);
        assert_eq!(msg.records.len(), 1);
        assert!(msg.records[0].items.iter().all(|item| item.fault.is_none()));
        assert!(msg.records[0].present("I021/010").is_some());
    }

    #[test]
    fn test_crate_level_decode() {
        let msg = decode(&cat48(7)).unwrap();
        assert_eq!(msg.category, 48);
        assert_eq!(msg.items("I048/010").count(), 1);
    }

    #[test]
    fn test_multiple_records_in_one_message() {
        let bytes = [0x30, 0x00, 0x09, 0x80, 0x19, 0x01, 0x80, 0x19, 0x02];
        let msg = decoder().decode(&bytes).unwrap();
        assert_eq!(msg.records.len(), 2);
        assert_eq!(msg.records[1].offset, 6);
        assert_eq!(msg.consumed, 9);
    }

    #[test]
    fn test_truncated_chunk_does_not_affect_next() {
        let mut truncated = cat48(1);
        truncated[2] = 0x20; // declares 32 bytes, has 6
        let chunks = vec![truncated, cat48(2)];
        let d = decoder();
        let results: Vec<_> = d.decode_chunks(&chunks).collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0],
            Err(AsterixError::TruncatedBuffer { needed: 32, available: 6, .. })
        ));
        let good = results[1].as_ref().unwrap();
        assert_eq!(good.records.len(), 1);
    }

    #[test]
    fn test_short_header_is_truncated() {
        match decoder().decode(&[0x30, 0x00]) {
            Err(AsterixError::TruncatedBuffer { raw, .. }) => assert_eq!(raw, vec![0x30, 0x00]),
            other => panic!("expected TruncatedBuffer, got {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_category() {
        let bytes = [0x3E, 0x00, 0x04, 0x00];
        match decoder().decode(&bytes) {
            Err(AsterixError::UnsupportedCategory { category, raw }) => {
                assert_eq!(category, 62);
                assert_eq!(raw, bytes.to_vec());
            }
            other => panic!("expected UnsupportedCategory, got {other:?}"),
        }
    }

    #[test]
    fn test_record_cannot_read_past_declared_length() {
        // Declared 5, but the record needs FSPEC + 2 bytes
        let bytes = [0x30, 0x00, 0x05, 0x80, 0x19, 0x01];
        match decoder().decode(&bytes) {
            Err(AsterixError::TruncatedBuffer {
                offset,
                needed,
                available,
                ..
            }) => {
                assert_eq!(offset, 4);
                assert_eq!(needed, 2);
                assert_eq!(available, 1);
            }
            other => panic!("expected TruncatedBuffer, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_second_record_keeps_partial_message() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::clone(&seen);
        let d = Decoder::default().with_sink(move |diag: Diagnostic| store.lock().unwrap().push(diag.kind));

        let bytes = [0x30, 0x00, 0x08, 0x80, 0x19, 0x07, 0xC0, 0x19];
        match d.decode(&bytes) {
            Err(AsterixError::LengthMismatch {
                declared,
                consumed,
                message,
            }) => {
                assert_eq!(declared, 8);
                assert_eq!(consumed, 6);
                assert_eq!(message.records.len(), 1);
                let sic = message.records[0].present("I048/010").unwrap().field("sic").unwrap().as_u64();
                assert_eq!(sic, Some(7));
                assert_eq!(message.raw, bytes.to_vec());
            }
            other => panic!("expected LengthMismatch, got {other:?}"),
        }
        assert_eq!(
            *seen.lock().unwrap(),
            vec![DiagnosticKind::TruncatedBuffer, DiagnosticKind::LengthMismatch]
        );
    }

    #[test]
    fn test_malformed_fspec_in_later_record_keeps_partial_message() {
        // Second FSPEC has FX set and nothing after it
        let bytes = [0x30, 0x00, 0x07, 0x80, 0x19, 0x07, 0x81];
        match decoder().decode(&bytes) {
            Err(AsterixError::LengthMismatch { consumed, message, .. }) => {
                assert_eq!(consumed, 6);
                assert_eq!(message.records.len(), 1);
            }
            other => panic!("expected LengthMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_stream_overrun_stays_inside_message() {
        let mut buf = vec![0x30, 0x00, 0x06, 0xC0, 0x19, 0x01]; // I048/140 missing
        buf.extend(cat48(7));
        let d = decoder();

        let results: Vec<_> = d.stream(&buf).collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0],
            Err(AsterixError::TruncatedBuffer { offset: 6, needed: 3, available: 0, .. })
        ));
        assert_eq!(results[1].as_ref().unwrap().records.len(), 1);

        // Same outcome as decoding the first message on its own
        assert!(matches!(
            d.decode(&buf[..6]),
            Err(AsterixError::TruncatedBuffer { offset: 6, needed: 3, available: 0, .. })
        ));
    }

    #[test]
    fn test_stream_skips_unsupported_and_stops_at_truncated_tail() {
        let mut buf = cat48(1);
        buf.extend_from_slice(&[0x3E, 0x00, 0x04, 0xAA]); // CAT62, skipped
        buf.extend(cat48(2));
        buf.extend_from_slice(&[0x30, 0x00, 0x10, 0x80]); // truncated tail

        let seen = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::clone(&seen);
        let d = Decoder::default().with_sink(move |diag: Diagnostic| store.lock().unwrap().push(diag.kind));

        let results: Vec<_> = d.stream(&buf).collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(matches!(results[2], Err(AsterixError::TruncatedBuffer { .. })));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![DiagnosticKind::UnsupportedCategory, DiagnosticKind::TruncatedBuffer]
        );
    }

    #[test]
    fn test_stream_stops_when_framing_is_lost() {
        let mut buf = vec![0x30, 0x00, 0x01];
        buf.extend(cat48(1));
        let d = decoder();
        let mut stream = d.stream(&buf);
        assert!(matches!(stream.next(), Some(Err(AsterixError::LengthMismatch { .. }))));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_trailing_bytes_reported() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::clone(&seen);
        let d = Decoder::default().with_sink(move |diag: Diagnostic| store.lock().unwrap().push(diag));
        let mut bytes = cat48(1);
        bytes.extend_from_slice(&[0xDE, 0xAD]);
        assert!(d.decode(&bytes).is_ok());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, DiagnosticKind::TrailingBytes);
        assert_eq!(seen[0].raw, vec![0xDE, 0xAD]);
    }

    #[test]
    fn test_decoder_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Decoder>();
    }

    #[test]
    fn test_serialized_shape() {
        let msg = decoder().decode(&cat48(7)).unwrap();
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["raw"], "300006801907");
        let items = json["records"][0]["items"].as_array().unwrap();
        assert_eq!(items.len(), 28);
        assert_eq!(items[0]["exists"], true);
        assert_eq!(items[0]["raw"], "1907");
        assert_eq!(items[1]["exists"], false);
        assert_eq!(items[0]["data"]["shape"], "Scalar");
    }
}
