//! CAT021 ADS-B Target Reports.

use crate::bits::BitReader;
use crate::item::{check_range, Field, FieldsFn, Format, ItemValue, Presence, Subfield};
use crate::types::Result;
use crate::uap::common::{self, NMPS_TO_KT};
use crate::uap::{Uap, UapEntry};

pub const CATEGORY: u8 = 21;

/// Barometric altitude (ft) from I021/145.
pub fn altitude(prior: &[ItemValue]) -> Option<f64> {
    prior
        .iter()
        .find(|item| item.id == "I021/145" && item.exists)?
        .field("flight_level")?
        .as_f64()
        .map(|fl| fl * 100.0)
}

fn u16_at(b: &[u8]) -> u64 {
    u16::from_be_bytes([b[0], b[1]]) as u64
}

// ---------------------------------------------------------------------------
// Fixed items
// ---------------------------------------------------------------------------

fn i015(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::uint("service_id", b[0] as u64)])
}

fn i131(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    let lsb = 180.0 / (1u64 << 30) as f64;
    let lat = check_range("latitude", r.read_i(32) as f64 * lsb, -90.0, 90.0)?;
    let lon = check_range("longitude", r.read_i(32) as f64 * lsb, -180.0, 180.0)?;
    Ok(vec![
        Field::float("latitude", lat, "deg"),
        Field::float("longitude", lon, "deg"),
    ])
}

fn i150(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    let mach = r.read_flag();
    let raw = r.read_u(15) as f64;
    let speed = if mach {
        Field::float("mach", raw * 0.001, "Mach")
    } else {
        Field::float("ias", raw / (1u64 << 14) as f64 * NMPS_TO_KT, "kt")
    };
    Ok(vec![Field::flag("im", mach), speed])
}

fn i151(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::flag("re", r.read_flag()),
        Field::float("true_airspeed", r.read_u(15) as f64, "kt"),
    ])
}

/// High-precision time: 2-bit full-second indication, 30-bit fraction.
fn high_precision_time(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::uint("fsi", r.read_u(2)),
        Field::float("fraction", r.read_u(30) as f64 / (1u64 << 30) as f64, "s"),
    ])
}

fn i140(b: &[u8]) -> Result<Vec<Field>> {
    let h = BitReader::new(b).read_i(16) as f64 * 6.25;
    Ok(vec![Field::float("geometric_height", h, "ft")])
}

fn i210(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    r.skip(1);
    Ok(vec![
        Field::flag("vns", r.read_flag()),
        Field::uint("vn", r.read_u(3)),
        Field::uint("ltt", r.read_u(3)),
    ])
}

fn i230(b: &[u8]) -> Result<Vec<Field>> {
    let roll = BitReader::new(b).read_i(16) as f64 * 0.01;
    let roll = check_range("roll_angle", roll, -180.0, 180.0)?;
    Ok(vec![Field::float("roll_angle", roll, "deg")])
}

fn i145(b: &[u8]) -> Result<Vec<Field>> {
    let fl = BitReader::new(b).read_i(16) as f64 / 4.0;
    let fl = check_range("flight_level", fl, -15.0, 1500.0)?;
    Ok(vec![Field::float("flight_level", fl, "FL")])
}

fn i152(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::float("magnetic_heading", u16_at(b) as f64 * 360.0 / 65_536.0, "deg")])
}

fn i200(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::flag("icf", r.read_flag()),
        Field::flag("lnav", r.read_flag()),
        Field::flag("me", r.read_flag()),
        Field::uint("ps", r.read_u(3)),
        Field::uint("ss", r.read_u(2)),
    ])
}

fn vertical_rate(name: &'static str, b: &[u8]) -> Vec<Field> {
    let mut r = BitReader::new(b);
    vec![
        Field::flag("re", r.read_flag()),
        Field::float(name, r.read_i(15) as f64 * 6.25, "ft/min"),
    ]
}

fn i155(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vertical_rate("barometric_vertical_rate", b))
}

fn i157(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vertical_rate("geometric_vertical_rate", b))
}

fn i160(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    let re = r.read_flag();
    let speed = r.read_u(15) as f64 / (1u64 << 14) as f64;
    Ok(vec![
        Field::flag("re", re),
        Field::float("ground_speed", speed * NMPS_TO_KT, "kt"),
        Field::float("track_angle", r.read_u(16) as f64 * 360.0 / 65_536.0, "deg"),
    ])
}

fn i165(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    r.skip(6);
    Ok(vec![Field::float("track_angle_rate", r.read_i(10) as f64 / 32.0, "deg/s")])
}

fn i020(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::uint("ecat", b[0] as u64)])
}

fn selected_altitude(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    let sas = r.read_flag();
    let source = r.read_u(2);
    Ok(vec![
        Field::flag("sas", sas),
        Field::uint("source", source),
        Field::float("altitude", r.read_i(13) as f64 * 25.0, "ft"),
    ])
}

fn i148(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::flag("mv", r.read_flag()),
        Field::flag("ah", r.read_flag()),
        Field::flag("am", r.read_flag()),
        Field::float("altitude", r.read_i(13) as f64 * 25.0, "ft"),
    ])
}

fn i016(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::float("report_period", b[0] as f64 * 0.5, "s")])
}

fn i008(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    let ra = r.read_flag();
    let tc = r.read_u(2);
    Ok(vec![
        Field::flag("ra", ra),
        Field::uint("tc", tc),
        Field::flag("ts", r.read_flag()),
        Field::flag("arv", r.read_flag()),
        Field::flag("cdti_a", r.read_flag()),
        Field::flag("not_tcas", r.read_flag()),
        Field::flag("sa", r.read_flag()),
    ])
}

fn i132(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::float("amplitude", b[0] as i8 as f64, "dBm")])
}

fn i400(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::uint("receiver_id", b[0] as u64)])
}

// ---------------------------------------------------------------------------
// Extensible items
// ---------------------------------------------------------------------------

fn i040_primary(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::uint("atp", r.read_u(3)),
        Field::uint("arc", r.read_u(2)),
        Field::flag("rc", r.read_flag()),
        Field::flag("rab", r.read_flag()),
    ])
}

fn i040_ext1(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::flag("dcr", r.read_flag()),
        Field::flag("gbs", r.read_flag()),
        Field::flag("sim", r.read_flag()),
        Field::flag("tst", r.read_flag()),
        Field::flag("saa", r.read_flag()),
        Field::uint("cl", r.read_u(2)),
    ])
}

fn i040_ext2(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    r.skip(1);
    let mut fields = Vec::with_capacity(6);
    for name in ["llc", "ipc", "nogo", "cpr", "ldpj", "rcf"] {
        fields.push(Field::flag(name, r.read_flag()));
    }
    Ok(fields)
}

/// Element-populated bit plus 6-bit value (TBC, MCD).
fn ep_value(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::flag("ep", r.read_flag()),
        Field::uint("value", r.read_u(6)),
    ])
}

const I040: &[FieldsFn] = &[i040_primary, i040_ext1, i040_ext2, ep_value];

fn i090_primary(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::uint("nucr_nacv", r.read_u(3)),
        Field::uint("nucp_nic", r.read_u(4)),
    ])
}

fn i090_ext1(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::flag("nic_baro", r.read_flag()),
        Field::uint("sil", r.read_u(2)),
        Field::uint("nacp", r.read_u(4)),
    ])
}

fn i090_ext2(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    r.skip(2);
    Ok(vec![
        Field::flag("sil_supplement", r.read_flag()),
        Field::uint("sda", r.read_u(2)),
        Field::uint("gva", r.read_u(2)),
    ])
}

fn i090_ext3(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::uint("pic", (b[0] >> 4) as u64)])
}

const I090: &[FieldsFn] = &[i090_primary, i090_ext1, i090_ext2, i090_ext3];

fn i271_primary(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    r.skip(2);
    Ok(vec![
        Field::flag("poa", r.read_flag()),
        Field::flag("cdti_s", r.read_flag()),
        Field::flag("b2_low", r.read_flag()),
        Field::flag("ras", r.read_flag()),
        Field::flag("ident", r.read_flag()),
    ])
}

fn i271_ext(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::uint("length_width", ((b[0] >> 1) & 0x0F) as u64)])
}

const I271: &[FieldsFn] = &[i271_primary, i271_ext];

// ---------------------------------------------------------------------------
// Compound items
// ---------------------------------------------------------------------------

fn met_wind_speed(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::float("wind_speed", u16_at(b) as f64, "kt")])
}

fn met_wind_direction(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::float("wind_direction", u16_at(b) as f64, "deg")])
}

fn met_temperature(b: &[u8]) -> Result<Vec<Field>> {
    let t = BitReader::new(b).read_i(16) as f64 * 0.25;
    Ok(vec![Field::float("temperature", t, "degC")])
}

fn met_turbulence(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::uint("turbulence", b[0] as u64)])
}

const I220: &[Subfield] = &[
    Subfield::new("WS", Format::Fixed(2, met_wind_speed)),
    Subfield::new("WD", Format::Fixed(2, met_wind_direction)),
    Subfield::new("TMP", Format::Fixed(2, met_temperature)),
    Subfield::new("TRB", Format::Fixed(1, met_turbulence)),
];

fn tis(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::flag("nav", r.read_flag()),
        Field::flag("nvb", r.read_flag()),
    ])
}

const TIS: &[FieldsFn] = &[tis];

/// One 15-octet trajectory intent point.
fn tid(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    let tca = r.read_flag();
    let nc = r.read_flag();
    let tcp = r.read_u(6);
    let alt = r.read_i(16) as f64 * 10.0;
    let lsb = 180.0 / (1u64 << 23) as f64;
    let lat = r.read_i(24) as f64 * lsb;
    let lon = r.read_i(24) as f64 * lsb;
    Ok(vec![
        Field::flag("tca", tca),
        Field::flag("nc", nc),
        Field::uint("tcp", tcp),
        Field::float("altitude", alt, "ft"),
        Field::float("latitude", lat, "deg"),
        Field::float("longitude", lon, "deg"),
        Field::uint("point_type", r.read_u(4)),
        Field::uint("td", r.read_u(2)),
        Field::flag("tra", r.read_flag()),
        Field::flag("toa", r.read_flag()),
        Field::float("tov", r.read_u(24) as f64, "s"),
        Field::float("ttr", r.read_u(16) as f64 * 0.01, "NM"),
    ])
}

const I110: &[Subfield] = &[
    Subfield::new("TIS", Format::Extensible(1, TIS)),
    Subfield::new("TID", Format::Repetitive(15, tid)),
];

const fn age(name: &'static str) -> Subfield {
    Subfield::new(name, Format::Fixed(1, common::age))
}

const I295: &[Subfield] = &[
    age("AOS"),
    age("TRD"),
    age("M3A"),
    age("QI"),
    age("TI"),
    age("MAM"),
    age("GH"),
    age("FL"),
    age("ISA"),
    age("FSA"),
    age("AS"),
    age("TAS"),
    age("MH"),
    age("BVR"),
    age("GVR"),
    age("GV"),
    age("TAR"),
    age("TID"),
    age("TS"),
    age("MET"),
    age("ROA"),
    age("ARA"),
    age("SCC"),
];

// ---------------------------------------------------------------------------
// Reserved Expansion field
// ---------------------------------------------------------------------------

fn re_bps(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    r.skip(4);
    let bps = r.read_u(12) as f64 * 0.1 + 800.0;
    Ok(vec![Field::float("baro_pressure_setting", bps, "hPa")])
}

fn re_selh(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    r.skip(4);
    Ok(vec![
        Field::flag("hdr", r.read_flag()),
        Field::flag("stat", r.read_flag()),
        Field::flag("hrd", r.read_flag()),
        Field::float("selected_heading", r.read_u(9) as f64 * 360.0 / 512.0, "deg"),
    ])
}

fn re_nav(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::flag("ap", r.read_flag()),
        Field::flag("vn", r.read_flag()),
        Field::flag("ah", r.read_flag()),
        Field::flag("am", r.read_flag()),
    ])
}

fn re_gao(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::uint("gps_antenna_offset", b[0] as u64)])
}

fn sgv_primary(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::flag("stp", r.read_flag()),
        Field::flag("hts", r.read_flag()),
        Field::flag("htt", r.read_flag()),
        Field::flag("hrd", r.read_flag()),
        Field::float("ground_speed", r.read_u(11) as f64 * 0.125, "kt"),
    ])
}

fn sgv_ext(b: &[u8]) -> Result<Vec<Field>> {
    let heading = (b[0] >> 1) as f64 * 360.0 / 128.0;
    Ok(vec![Field::float("heading", heading, "deg")])
}

const SGV: &[FieldsFn] = &[sgv_primary, sgv_ext];

fn sta_primary(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::flag("es", r.read_flag()),
        Field::flag("uat", r.read_flag()),
        Field::uint("rce", r.read_u(3)),
        Field::uint("rrl", r.read_u(2)),
    ])
}

fn sta_ext1(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::uint("ps3", r.read_u(3)),
        Field::uint("tpw", r.read_u(2)),
        Field::uint("tsi", r.read_u(2)),
    ])
}

fn sta_ext2(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::flag("muo", r.read_flag()),
        Field::flag("rwc", r.read_flag()),
        Field::uint("daa", r.read_u(2)),
        Field::uint("df17ca", r.read_u(3)),
    ])
}

fn sta_flags(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::uint("status", (b[0] >> 1) as u64)])
}

const STA: &[FieldsFn] = &[sta_primary, sta_ext1, sta_ext2, sta_flags];

fn re_tnh(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::float("true_north_heading", u16_at(b) as f64 * 360.0 / 65_536.0, "deg")])
}

fn mes_sum(b: &[u8]) -> Result<Vec<Field>> {
    Ok(common::mode5_summary(b, "po"))
}

fn mes_pno(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    r.skip(2);
    Ok(vec![Field::uint("pin", r.read_u(14))])
}

const MES: &[Subfield] = &[
    Subfield::new("SUM", Format::Fixed(1, mes_sum)),
    Subfield::new("PNO", Format::Fixed(2, mes_pno)),
    Subfield::new("EM1", Format::Fixed(2, common::octal12)),
    Subfield::new("XP", Format::Fixed(1, common::x_pulses)),
    Subfield::new("FOM", Format::Fixed(1, common::fom5)),
    Subfield::new("M2", Format::Fixed(2, common::octal12)),
];

const RE: &[Subfield] = &[
    Subfield::new("BPS", Format::Fixed(2, re_bps)),
    Subfield::new("SelH", Format::Fixed(2, re_selh)),
    Subfield::new("NAV", Format::Fixed(1, re_nav)),
    Subfield::new("GAO", Format::Fixed(1, re_gao)),
    Subfield::new("SGV", Format::Extensible(2, SGV)),
    Subfield::new("STA", Format::Extensible(1, STA)),
    Subfield::new("TNH", Format::Fixed(2, re_tnh)),
    Subfield::new("MES", Format::Compound(Presence::Chained, MES)),
];

const RE_FORMAT: Format = Format::Compound(Presence::Octet, RE);

// ---------------------------------------------------------------------------
// UAP
// ---------------------------------------------------------------------------

const ENTRIES: &[UapEntry] = &[
    UapEntry::new(1, "I021/010", "Data Source Identification", Format::Fixed(2, common::data_source)),
    UapEntry::new(2, "I021/040", "Target Report Descriptor", Format::Extensible(1, I040)),
    UapEntry::new(3, "I021/161", "Track Number", Format::Fixed(2, common::track_number)),
    UapEntry::new(4, "I021/015", "Service Identification", Format::Fixed(1, i015)),
    UapEntry::new(5, "I021/071", "Time of Applicability for Position", Format::Fixed(3, common::time_of_day)),
    UapEntry::new(6, "I021/130", "Position in WGS-84 Co-ordinates", Format::Fixed(6, common::wgs84_24)),
    UapEntry::new(7, "I021/131", "Position in WGS-84 Co-ordinates, High Resolution", Format::Fixed(8, i131)),
    UapEntry::new(8, "I021/072", "Time of Applicability for Velocity", Format::Fixed(3, common::time_of_day)),
    UapEntry::new(9, "I021/150", "Air Speed", Format::Fixed(2, i150)),
    UapEntry::new(10, "I021/151", "True Air Speed", Format::Fixed(2, i151)),
    UapEntry::new(11, "I021/080", "Target Address", Format::Fixed(3, common::address)),
    UapEntry::new(12, "I021/073", "Time of Message Reception of Position", Format::Fixed(3, common::time_of_day)),
    UapEntry::new(13, "I021/074", "Time of Message Reception of Position-High Precision", Format::Fixed(4, high_precision_time)),
    UapEntry::new(14, "I021/075", "Time of Message Reception of Velocity", Format::Fixed(3, common::time_of_day)),
    UapEntry::new(15, "I021/076", "Time of Message Reception of Velocity-High Precision", Format::Fixed(4, high_precision_time)),
    UapEntry::new(16, "I021/140", "Geometric Height", Format::Fixed(2, i140)),
    UapEntry::new(17, "I021/090", "Quality Indicators", Format::Extensible(1, I090)),
    UapEntry::new(18, "I021/210", "MOPS Version", Format::Fixed(1, i210)),
    UapEntry::new(19, "I021/070", "Mode 3/A Code", Format::Fixed(2, common::octal12)),
    UapEntry::new(20, "I021/230", "Roll Angle", Format::Fixed(2, i230)),
    UapEntry::new(21, "I021/145", "Flight Level", Format::Fixed(2, i145)),
    UapEntry::new(22, "I021/152", "Magnetic Heading", Format::Fixed(2, i152)),
    UapEntry::new(23, "I021/200", "Target Status", Format::Fixed(1, i200)),
    UapEntry::new(24, "I021/155", "Barometric Vertical Rate", Format::Fixed(2, i155)),
    UapEntry::new(25, "I021/157", "Geometric Vertical Rate", Format::Fixed(2, i157)),
    UapEntry::new(26, "I021/160", "Airborne Ground Vector", Format::Fixed(4, i160)),
    UapEntry::new(27, "I021/165", "Track Angle Rate", Format::Fixed(2, i165)),
    UapEntry::new(28, "I021/077", "Time of ASTERIX Report Transmission", Format::Fixed(3, common::time_of_day)),
    UapEntry::new(29, "I021/170", "Target Identification", Format::Fixed(6, common::callsign)),
    UapEntry::new(30, "I021/020", "Emitter Category", Format::Fixed(1, i020)),
    UapEntry::new(31, "I021/220", "Met Information", Format::Compound(Presence::Chained, I220)),
    UapEntry::new(32, "I021/146", "Selected Altitude", Format::Fixed(2, selected_altitude)),
    UapEntry::new(33, "I021/148", "Final State Selected Altitude", Format::Fixed(2, i148)),
    UapEntry::new(34, "I021/110", "Trajectory Intent", Format::Compound(Presence::Chained, I110)),
    UapEntry::new(35, "I021/016", "Service Management", Format::Fixed(1, i016)),
    UapEntry::new(36, "I021/008", "Aircraft Operational Status", Format::Fixed(1, i008)),
    UapEntry::new(37, "I021/271", "Surface Capabilities and Characteristics", Format::Extensible(1, I271)),
    UapEntry::new(38, "I021/132", "Message Amplitude", Format::Fixed(1, i132)),
    UapEntry::new(39, "I021/250", "Mode S MB Data", Format::Registers(altitude)),
    UapEntry::new(40, "I021/260", "ACAS Resolution Advisory Report", Format::Fixed(7, common::hex)),
    UapEntry::new(41, "I021/400", "Receiver ID", Format::Fixed(1, i400)),
    UapEntry::new(42, "I021/295", "Data Ages", Format::Compound(Presence::Chained, I295)),
    UapEntry::spare(43),
    UapEntry::spare(44),
    UapEntry::spare(45),
    UapEntry::spare(46),
    UapEntry::spare(47),
    UapEntry::new(48, "I021/RE", "Reserved Expansion Field", Format::Explicit(Some(&RE_FORMAT))),
    UapEntry::new(49, "I021/SP", "Special Purpose Field", Format::Explicit(None)),
];

pub fn uap() -> Uap {
    Uap::new(CATEGORY, "ADS-B Target Reports", ENTRIES)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bds::BdsConfig;
    use crate::diag::NullSink;
    use crate::item::{ItemData, Value};
    use crate::record::{decode_record, Record};

    /// A 99-octet CAT021 message with one record of 37 present items.
    pub(crate) fn sample_message() -> Vec<u8> {
        let mut m = vec![0x15, 0x00, 0x63];
        m.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF, 0xDB, 0xE2]); // FSPEC
        m.extend_from_slice(&[0x00, 0x87]); // 010
        m.push(0x20); // 040
        m.extend_from_slice(&[0x01, 0x2C]); // 161
        m.push(0x01); // 015
        m.extend_from_slice(&[0x4C, 0x2E, 0x08]); // 071
        m.extend_from_slice(&[0x25, 0x00, 0x00, 0x02, 0x00, 0x00]); // 130
        m.extend_from_slice(&[0x12, 0x80, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]); // 131
        m.extend_from_slice(&[0x4C, 0x2E, 0x08]); // 072
        m.extend_from_slice(&[0x83, 0x16]); // 150
        m.extend_from_slice(&[0x01, 0xC2]); // 151
        m.extend_from_slice(&[0x48, 0x40, 0xD6]); // 080
        m.extend_from_slice(&[0x4C, 0x2E, 0x08]); // 073
        m.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // 074
        m.extend_from_slice(&[0x4C, 0x2E, 0x08]); // 075
        m.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // 076
        m.extend_from_slice(&[0x17, 0x70]); // 140
        m.push(0x4E); // 090
        m.push(0x12); // 210
        m.extend_from_slice(&[0x0F, 0xC0]); // 070
        m.extend_from_slice(&[0x00, 0x64]); // 230
        m.extend_from_slice(&[0x05, 0x78]); // 145
        m.extend_from_slice(&[0x40, 0x00]); // 152
        m.push(0x00); // 200
        m.extend_from_slice(&[0x00, 0x00]); // 155
        m.extend_from_slice(&[0x00, 0x00]); // 157
        m.extend_from_slice(&[0x08, 0x00, 0x40, 0x00]); // 160
        m.extend_from_slice(&[0x00, 0x00]); // 165
        m.extend_from_slice(&[0x4C, 0x2E, 0x09]); // 077
        m.extend_from_slice(&[0x2C, 0xC3, 0x71, 0xC3, 0x2C, 0xE0]); // 170
        m.push(0x03); // 020
        m.extend_from_slice(&[0x85, 0xDC]); // 146
        m.extend_from_slice(&[0x05, 0xDC]); // 148
        m.push(0x04); // 016
        m.push(0x00); // 008
        m.push(0x00); // 271
        m.push(0xB5); // 132
        m.extend_from_slice(&[0x80, 0x05]); // 295
        m
    }

    fn decode(buf: &[u8]) -> Record {
        decode_record(&uap(), buf, 0, &BdsConfig::default(), &NullSink).unwrap()
    }

    #[test]
    fn test_sample_record_fields() {
        let msg = sample_message();
        assert_eq!(msg.len(), 0x63);
        let rec = decode(&msg[3..]);
        assert_eq!(rec.length, 0x63 - 3);
        assert_eq!(rec.items.iter().filter(|i| i.exists).count(), 37);

        let get = |id: &str, field: &str| rec.present(id).and_then(|i| i.field(field)).cloned();
        assert_eq!(get("I021/010", "sic"), Some(Value::Uint(135)));
        assert_eq!(get("I021/080", "address"), Some(Value::Text("4840D6".into())));
        assert_eq!(get("I021/170", "callsign"), Some(Value::Text("KLM1023".into())));
        assert_eq!(get("I021/070", "code"), Some(Value::Text("7700".into())));
        assert_eq!(get("I021/145", "flight_level"), Some(Value::Float(350.0)));
        assert_eq!(get("I021/140", "geometric_height"), Some(Value::Float(37_500.0)));
        assert_eq!(get("I021/146", "altitude"), Some(Value::Float(37_500.0)));
        assert_eq!(get("I021/151", "true_airspeed"), Some(Value::Float(450.0)));
        assert_eq!(get("I021/132", "amplitude"), Some(Value::Float(-75.0)));
        assert_eq!(get("I021/295", "age"), Some(Value::Float(0.5)));

        let mach = get("I021/150", "mach").and_then(|v| v.as_f64()).unwrap();
        assert!((mach - 0.79).abs() < 1e-9);
        let gs = get("I021/160", "ground_speed").and_then(|v| v.as_f64()).unwrap();
        assert!((gs - 450.0).abs() < 1e-9);
        let lat = get("I021/131", "latitude").and_then(|v| v.as_f64()).unwrap();
        assert!((lat - 52.03125).abs() < 1e-6);
    }

    #[test]
    fn test_mode_s_registers_use_i021_145() {
        // 145 (FRN 21) and 250 (FRN 39)
        let mut buf = vec![0x01, 0x01, 0x03, 0x01, 0x01, 0x10];
        buf.extend_from_slice(&[0x05, 0x78]);
        buf.push(0x01);
        buf.extend_from_slice(&[0x00, 0x00, 0x01, 0x34, 0x80, 0x04, 0xB8, 0x50]);
        let rec = decode(&buf);
        assert_eq!(rec.length, buf.len());
        let regs = rec.present("I021/250").unwrap().data.as_ref().unwrap().registers();
        assert_eq!(regs[0].checks.as_ref().unwrap().altitude_ft, Some(35_000.0));
    }

    #[test]
    fn test_reserved_expansion_octet_presence() {
        // RE is FRN 48: 7 FSPEC octets, the last with bit 6 set
        let mut buf = vec![0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x04];
        buf.extend_from_slice(&[
            0x07, // length
            0x88, // BPS + SGV
            0x01, 0x2C, // BPS: 800 + 30.0
            0x10, 0x51, 0x40, // SGV primary (FX) + heading ext
        ]);
        let rec = decode(&buf);
        assert_eq!(rec.length, buf.len());
        let re = rec.present("I021/RE").unwrap().data.as_ref().unwrap();
        let bps = re.field("baro_pressure_setting").and_then(Value::as_f64).unwrap();
        assert!((bps - 830.0).abs() < 1e-9);
        match re.subfield("SGV").unwrap() {
            ItemData::Extensible(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[0].fields[2].value, Value::Flag(false));
                assert_eq!(parts[0].fields[3].value, Value::Flag(true));
                assert_eq!(parts[0].fields[4].value, Value::Float(0x028 as f64 * 0.125));
                assert_eq!(parts[1].fields[0].value, Value::Float(90.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_trajectory_intent() {
        // 110 is FRN 34: octet 5, bit 6
        let mut buf = vec![0x01, 0x01, 0x01, 0x01, 0x04];
        buf.push(0x40); // TID only
        buf.push(0x01); // REP
        buf.extend_from_slice(&[
            0x81, // TCA, TCP 1
            0x0E, 0xA6, // 3750 * 10 ft
            0x25, 0x00, 0x00, 0x02, 0x00, 0x00, // position
            0x10, // point type 1
            0x00, 0x0E, 0x10, // TOV 3600 s
            0x00, 0x64, // TTR 1.00 NM
        ]);
        let rec = decode(&buf);
        assert_eq!(rec.length, buf.len());
        let ti = rec.present("I021/110").unwrap();
        assert_eq!(ti.field("altitude"), Some(&Value::Float(37_500.0)));
        assert_eq!(ti.field("tov"), Some(&Value::Float(3600.0)));
        assert_eq!(ti.field("point_type"), Some(&Value::Uint(1)));
    }

    #[test]
    fn test_roll_angle_out_of_range() {
        // 230 is FRN 20; 0x7FFF * 0.01 = 327.67 deg
        let buf = [0x01, 0x01, 0x04, 0x7F, 0xFF];
        let rec = decode(&buf);
        assert!(!rec.get("I021/230").unwrap().exists);
        assert_eq!(rec.length, buf.len());
    }
}
