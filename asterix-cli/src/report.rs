//! Terminal summaries of decoded messages.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use comfy_table::{Cell, Table};

use asterix_core::record::Record;
use asterix_core::types::{AsterixError, Result};
use asterix_core::{BdsRegister, Message, Verdict};

/// Item ids carrying the per-target fields of one category.
struct Layout {
    address: &'static str,
    track: &'static str,
    callsign: &'static str,
    squawk: &'static str,
    flight_level: &'static str,
    velocity: &'static str,
    course: &'static str,
    bds: &'static str,
}

const CAT048: Layout = Layout {
    address: "I048/220",
    track: "I048/161",
    callsign: "I048/240",
    squawk: "I048/070",
    flight_level: "I048/090",
    velocity: "I048/200",
    course: "heading",
    bds: "I048/250",
};

const CAT021: Layout = Layout {
    address: "I021/080",
    track: "I021/161",
    callsign: "I021/170",
    squawk: "I021/070",
    flight_level: "I021/145",
    velocity: "I021/160",
    course: "track_angle",
    bds: "I021/250",
};

fn layout(category: u8) -> Option<&'static Layout> {
    match category {
        21 => Some(&CAT021),
        48 => Some(&CAT048),
        _ => None,
    }
}

fn text(rec: &Record, id: &str, field: &str) -> Option<String> {
    let value = rec.present(id)?.field(field)?.to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn float(rec: &Record, id: &str, field: &str) -> Option<f64> {
    rec.present(id)?.field(field)?.as_f64()
}

/// Target key: aircraft address, else the track number.
fn target_key(rec: &Record, layout: &Layout) -> Option<String> {
    text(rec, layout.address, "address")
        .or_else(|| text(rec, layout.track, "track_number").map(|tn| format!("TN {tn}")))
}

// ---------------------------------------------------------------------------
// Target summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Position {
    Wgs84 { lat: f64, lon: f64 },
    Polar { rho: f64, theta: f64 },
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Position::Wgs84 { lat, lon } => write!(f, "{lat:.4}, {lon:.4}"),
            Position::Polar { rho, theta } => write!(f, "{rho:.2} NM / {theta:.1}°"),
        }
    }
}

fn position(rec: &Record, category: u8) -> Option<Position> {
    if category == 48 {
        let rho = float(rec, "I048/040", "rho")?;
        let theta = float(rec, "I048/040", "theta")?;
        return Some(Position::Polar { rho, theta });
    }
    ["I021/131", "I021/130"].iter().find_map(|id| {
        Some(Position::Wgs84 {
            lat: float(rec, id, "latitude")?,
            lon: float(rec, id, "longitude")?,
        })
    })
}

/// Latest known state of one target.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub key: String,
    pub category: u8,
    pub callsign: Option<String>,
    pub squawk: Option<String>,
    pub flight_level: Option<f64>,
    pub ground_speed: Option<f64>,
    pub course: Option<f64>,
    position: Option<Position>,
    pub registers: u64,
    pub records: u64,
}

impl Target {
    fn new(key: String, category: u8) -> Self {
        Target {
            key,
            category,
            callsign: None,
            squawk: None,
            flight_level: None,
            ground_speed: None,
            course: None,
            position: None,
            registers: 0,
            records: 0,
        }
    }

    fn update(&mut self, rec: &Record, layout: &Layout) {
        self.records += 1;
        if let Some(cs) = text(rec, layout.callsign, "callsign") {
            self.callsign = Some(cs);
        }
        if let Some(code) = text(rec, layout.squawk, "code") {
            self.squawk = Some(code);
        }
        if let Some(fl) = float(rec, layout.flight_level, "flight_level") {
            self.flight_level = Some(fl);
        }
        if let Some(gs) = float(rec, layout.velocity, "ground_speed") {
            self.ground_speed = Some(gs);
        }
        if let Some(course) = float(rec, layout.velocity, layout.course) {
            self.course = Some(course);
        }
        if let Some(pos) = position(rec, self.category) {
            self.position = Some(pos);
        }
        if let Some(data) = rec.present(layout.bds).and_then(|item| item.data.as_ref()) {
            self.registers += data.registers().len() as u64;
        }
    }
}

/// Running totals over a decode run.
#[derive(Debug, Default)]
pub struct Summary {
    pub messages: u64,
    pub records: u64,
    /// Records with neither an address nor a track number.
    pub anonymous: u64,
    /// Error totals by kind; item faults count as `FieldRangeError`.
    pub errors: BTreeMap<&'static str, u64>,
    targets: HashMap<(u8, String), Target>,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one decode result into the totals.
    pub fn add(&mut self, result: &Result<Message>) {
        match result {
            Ok(msg) => self.add_message(msg),
            Err(err) => {
                *self.errors.entry(err.kind()).or_default() += 1;
                if let AsterixError::LengthMismatch { message, .. } = err {
                    self.add_message(message);
                }
            }
        }
    }

    fn add_message(&mut self, msg: &Message) {
        self.messages += 1;
        for rec in &msg.records {
            self.records += 1;
            let faults = rec.items.iter().filter(|item| item.fault.is_some()).count();
            if faults > 0 {
                *self.errors.entry("FieldRangeError").or_default() += faults as u64;
            }

            let Some(layout) = layout(msg.category) else {
                continue;
            };
            match target_key(rec, layout) {
                Some(key) => self
                    .targets
                    .entry((msg.category, key.clone()))
                    .or_insert_with(|| Target::new(key, msg.category))
                    .update(rec, layout),
                None => self.anonymous += 1,
            }
        }
    }

    pub fn error_count(&self) -> u64 {
        self.errors.values().sum()
    }

    /// Targets, busiest first.
    pub fn targets(&self) -> Vec<&Target> {
        let mut sorted: Vec<_> = self.targets.values().collect();
        sorted.sort_by(|a, b| (Reverse(a.records), &a.key).cmp(&(Reverse(b.records), &b.key)));
        sorted
    }
}

pub fn print_summary(summary: &Summary) {
    println!();
    println!(
        "Messages: {} decoded, {} records, {} targets, {} errors",
        summary.messages,
        summary.records,
        summary.targets.len(),
        summary.error_count()
    );
    println!();

    if !summary.targets.is_empty() {
        let mut table = Table::new();
        table.set_header(vec![
            "Target", "Cat", "Callsign", "Squawk", "FL", "GS (kt)", "Course", "Position", "BDS",
            "Recs",
        ]);

        for t in summary.targets() {
            table.add_row(vec![
                Cell::new(&t.key),
                Cell::new(format!("{:03}", t.category)),
                Cell::new(t.callsign.as_deref().unwrap_or("-")),
                Cell::new(t.squawk.as_deref().unwrap_or("-")),
                Cell::new(t.flight_level.map(|fl| format!("{fl:.0}")).unwrap_or("-".into())),
                Cell::new(t.ground_speed.map(|gs| format!("{gs:.0}")).unwrap_or("-".into())),
                Cell::new(t.course.map(|c| format!("{c:.1}")).unwrap_or("-".into())),
                Cell::new(t.position.as_ref().map(|p| p.to_string()).unwrap_or("-".into())),
                Cell::new(t.registers),
                Cell::new(t.records),
            ]);
        }

        println!("{table}");
    }

    if !summary.errors.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Error", "Count"]);
        for (kind, count) in &summary.errors {
            table.add_row(vec![Cell::new(kind), Cell::new(count)]);
        }
        println!();
        println!("{table}");
    }
}

// ---------------------------------------------------------------------------
// Comm-B registers
// ---------------------------------------------------------------------------

/// One decoded register with the record it came from.
#[derive(Debug, Clone)]
pub struct RegisterRow {
    pub target: String,
    pub register: BdsRegister,
}

/// Collect every Comm-B register carried by the decoded messages.
pub fn collect_registers(messages: &[Message]) -> Vec<RegisterRow> {
    let mut rows = Vec::new();
    for msg in messages {
        let Some(layout) = layout(msg.category) else {
            continue;
        };
        for rec in &msg.records {
            let Some(data) = rec.present(layout.bds).and_then(|item| item.data.as_ref()) else {
                continue;
            };
            let target = target_key(rec, layout).unwrap_or_else(|| "-".into());
            for reg in data.registers() {
                rows.push(RegisterRow {
                    target: target.clone(),
                    register: reg.clone(),
                });
            }
        }
    }
    rows
}

pub fn verdict_label(verdict: &Verdict) -> String {
    match verdict {
        Verdict::Undecoded => "undecoded".into(),
        Verdict::Single(kind) => kind.to_string(),
        Verdict::Disambiguated(kind) => format!("{kind} (checks)"),
        Verdict::Ambiguous(kinds) => {
            let names: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
            format!("ambiguous: {}", names.join("/"))
        }
        Verdict::Declared(kind) => format!("{kind} (declared)"),
    }
}

fn knots(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.0}")).unwrap_or("-".into())
}

pub fn print_registers(rows: &[RegisterRow]) {
    println!();
    let decoded = rows.iter().filter(|r| r.register.is_decoded()).count();
    println!("Registers: {} total, {decoded} decoded", rows.len());
    println!();

    if rows.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Target", "MB", "Code", "Candidates", "Verdict", "GS", "TAS", "IAS", "Mach", "|GS-TAS|",
        "|CAS-IAS|",
    ]);

    for row in rows {
        let reg = &row.register;
        let candidates: Vec<String> = reg.candidates.iter().map(|k| k.to_string()).collect();
        let bds50 = reg.bds50.as_ref();
        let bds60 = reg.bds60.as_ref();
        let checks = reg.checks.as_ref();
        table.add_row(vec![
            Cell::new(&row.target),
            Cell::new(&reg.mb),
            Cell::new(format!("{},{}", reg.bds1, reg.bds2)),
            Cell::new(if candidates.is_empty() { "-".into() } else { candidates.join(",") }),
            Cell::new(verdict_label(&reg.verdict)),
            Cell::new(knots(bds50.and_then(|b| b.ground_speed_kt))),
            Cell::new(knots(bds50.and_then(|b| b.true_airspeed_kt))),
            Cell::new(knots(bds60.and_then(|b| b.indicated_airspeed_kt))),
            Cell::new(
                bds60
                    .and_then(|b| b.mach)
                    .map(|m| format!("{m:.3}"))
                    .unwrap_or("-".into()),
            ),
            Cell::new(knots(checks.and_then(|c| c.gs_tas_diff_kt))),
            Cell::new(knots(checks.and_then(|c| c.cas_ias_diff_kt))),
        ]);
    }

    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use asterix_core::BdsKind;

    /// CAT48 plot: 010, 070 (7700), 090 (FL350), 220 (4BA2B3), 240 (TEST1).
    const PLOT: [u8; 20] = [
        0x30, 0x00, 0x14, 0x8D, 0xC0, 0x01, 0x02, 0x0F, 0xC0, 0x05, 0x78, 0x4B, 0xA2, 0xB3,
        0x50, 0x54, 0xD4, 0xC6, 0x08, 0x20,
    ];

    /// CAT48 with 220 and one 250 register that reads as both BDS 5,0 and 6,0.
    const REGISTER: [u8; 17] = [
        0x30, 0x00, 0x11, 0x01, 0xA0, 0x4B, 0xA2, 0xB3, 0x01, 0x00, 0x00, 0x01, 0x34, 0x80,
        0x04, 0xB8, 0x50,
    ];

    #[test]
    fn test_summary_groups_by_address() {
        let mut summary = Summary::new();
        summary.add(&asterix_core::decode(&PLOT));
        summary.add(&asterix_core::decode(&PLOT));
        summary.add(&asterix_core::decode(&REGISTER));

        assert_eq!(summary.messages, 3);
        assert_eq!(summary.records, 3);
        let targets = summary.targets();
        assert_eq!(targets.len(), 1);
        let t = targets[0];
        assert_eq!(t.key, "4BA2B3");
        assert_eq!(t.callsign.as_deref(), Some("TEST1"));
        assert_eq!(t.squawk.as_deref(), Some("7700"));
        assert_eq!(t.flight_level, Some(350.0));
        assert_eq!(t.records, 3);
        assert_eq!(t.registers, 1);
        assert_eq!(summary.error_count(), 0);
    }

    #[test]
    fn test_summary_counts_errors() {
        let mut summary = Summary::new();
        summary.add(&asterix_core::decode(&PLOT[..2]));
        summary.add(&asterix_core::decode(&[0x3E, 0x00, 0x04, 0x00]));
        assert_eq!(summary.messages, 0);
        assert_eq!(summary.errors.get("TruncatedBuffer"), Some(&1));
        assert_eq!(summary.errors.get("UnsupportedCategory"), Some(&1));
        assert_eq!(summary.error_count(), 2);
    }

    #[test]
    fn test_summary_counts_item_faults() {
        // FL 2000 is outside I048/090's range
        let mut plot = PLOT;
        plot[9] = 0x1F;
        plot[10] = 0x40;
        let mut summary = Summary::new();
        summary.add(&asterix_core::decode(&plot));
        assert_eq!(summary.errors.get("FieldRangeError"), Some(&1));
        assert_eq!(summary.targets()[0].flight_level, None);
    }

    #[test]
    fn test_collect_registers() {
        let messages: Vec<Message> = [&PLOT[..], &REGISTER[..]]
            .iter()
            .filter_map(|m| asterix_core::decode(m).ok())
            .collect();
        let rows = collect_registers(&messages);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].target, "4BA2B3");
        assert_eq!(rows[0].register.bds1, 5);
        assert_eq!(rows[0].register.bds2, 0);
        assert_eq!(
            verdict_label(&rows[0].register.verdict),
            "ambiguous: BDS50/BDS60"
        );
    }

    #[test]
    fn test_verdict_label() {
        assert_eq!(verdict_label(&Verdict::Undecoded), "undecoded");
        assert_eq!(verdict_label(&Verdict::Single(BdsKind::Bds44)), "BDS44");
        assert_eq!(verdict_label(&Verdict::Disambiguated(BdsKind::Bds60)), "BDS60 (checks)");
        assert_eq!(verdict_label(&Verdict::Declared(BdsKind::Bds50)), "BDS50 (declared)");
    }

    #[test]
    fn test_position_display() {
        let p = Position::Wgs84 { lat: 52.5, lon: 4.25 };
        assert_eq!(p.to_string(), "52.5000, 4.2500");
        let p = Position::Polar { rho: 10.5, theta: 90.0 };
        assert_eq!(p.to_string(), "10.50 NM / 90.0°");
    }
}
