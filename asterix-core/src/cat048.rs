//! CAT048 Monoradar Target Reports.

use crate::bits::BitReader;
use crate::item::{check_range, Field, FieldsFn, Format, ItemValue, Presence, Subfield};
use crate::types::{AsterixError, Result};
use crate::uap::common::{self, NMPS_TO_KT};
use crate::uap::{Uap, UapEntry};

pub const CATEGORY: u8 = 48;

/// Barometric altitude (ft) from I048/090, for the Comm-B cross-checks.
pub fn altitude(prior: &[ItemValue]) -> Option<f64> {
    prior
        .iter()
        .find(|item| item.id == "I048/090" && item.exists)?
        .field("flight_level")?
        .as_f64()
        .map(|fl| fl * 100.0)
}

// ---------------------------------------------------------------------------
// Fixed items
// ---------------------------------------------------------------------------

fn i040(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::float("rho", r.read_u(16) as f64 / 256.0, "NM"),
        Field::float("theta", r.read_u(16) as f64 * 360.0 / 65_536.0, "deg"),
    ])
}

fn i042(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::float("x", r.read_i(16) as f64 / 128.0, "NM"),
        Field::float("y", r.read_i(16) as f64 / 128.0, "NM"),
    ])
}

fn i090(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    let v = r.read_flag();
    let g = r.read_flag();
    let fl = check_range("flight_level", r.read_i(14) as f64 / 4.0, -12.0, 1270.0)?;
    Ok(vec![
        Field::flag("v", v),
        Field::flag("g", g),
        Field::float("flight_level", fl, "FL"),
    ])
}

fn i080(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    r.skip(4);
    Ok(vec![Field::uint("confidence", r.read_u(12))])
}

fn i100(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    let v = r.read_flag();
    let g = r.read_flag();
    r.skip(2);
    let code = r.read_u(12);
    r.skip(4);
    Ok(vec![
        Field::flag("v", v),
        Field::flag("g", g),
        Field::uint("mode_c_gray", code),
        Field::uint("confidence", r.read_u(12)),
    ])
}

fn i110(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    r.skip(2);
    Ok(vec![Field::float("height_3d", r.read_i(14) as f64 * 25.0, "ft")])
}

fn i200(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    let speed = r.read_u(16) as f64 / (1u64 << 14) as f64;
    Ok(vec![
        Field::float("ground_speed", speed * NMPS_TO_KT, "kt"),
        Field::float("heading", r.read_u(16) as f64 * 360.0 / 65_536.0, "deg"),
    ])
}

fn i210(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![
        Field::float("sigma_x", b[0] as f64 / 128.0, "NM"),
        Field::float("sigma_y", b[1] as f64 / 128.0, "NM"),
        Field::float("sigma_v", b[2] as f64 / (1u64 << 14) as f64 * NMPS_TO_KT, "kt"),
        Field::float("sigma_h", b[3] as f64 * 360.0 / 4096.0, "deg"),
    ])
}

fn i230(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    let com = r.read_u(3);
    let stat = r.read_u(3);
    let si = r.read_flag();
    r.skip(1);
    Ok(vec![
        Field::uint("com", com),
        Field::uint("stat", stat),
        Field::flag("si", si),
        Field::flag("mssc", r.read_flag()),
        Field::flag("arc", r.read_flag()),
        Field::flag("aic", r.read_flag()),
        Field::flag("b1a", r.read_flag()),
        Field::uint("b1b", r.read_u(4)),
    ])
}

fn i055(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::flag("v", r.read_flag()),
        Field::flag("g", r.read_flag()),
        Field::flag("l", r.read_flag()),
        Field::text("code", format!("{:02o}", r.read_u(5))),
    ])
}

fn i065(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::uint("confidence", (b[0] & 0x1F) as u64)])
}

// ---------------------------------------------------------------------------
// Extensible items
// ---------------------------------------------------------------------------

fn i020_primary(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::uint("typ", r.read_u(3)),
        Field::flag("sim", r.read_flag()),
        Field::flag("rdp", r.read_flag()),
        Field::flag("spi", r.read_flag()),
        Field::flag("rab", r.read_flag()),
    ])
}

fn i020_ext1(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::flag("tst", r.read_flag()),
        Field::flag("err", r.read_flag()),
        Field::flag("xpp", r.read_flag()),
        Field::flag("me", r.read_flag()),
        Field::flag("mi", r.read_flag()),
        Field::uint("foe_fri", r.read_u(2)),
    ])
}

fn i020_ext2(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    let mut fields = Vec::with_capacity(6);
    for name in ["adsb_ep", "adsb_val", "scn_ep", "scn_val", "pai_ep", "pai_val"] {
        fields.push(Field::flag(name, r.read_flag()));
    }
    Ok(fields)
}

fn i170_primary(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::flag("cnf", r.read_flag()),
        Field::uint("rad", r.read_u(2)),
        Field::flag("dou", r.read_flag()),
        Field::flag("mah", r.read_flag()),
        Field::uint("cdm", r.read_u(2)),
    ])
}

fn i170_ext(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::flag("tre", r.read_flag()),
        Field::flag("gho", r.read_flag()),
        Field::flag("sup", r.read_flag()),
        Field::flag("tcc", r.read_flag()),
    ])
}

fn i030(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::uint("code", (b[0] >> 1) as u64)])
}

const I020: &[FieldsFn] = &[i020_primary, i020_ext1, i020_ext2];
const I170: &[FieldsFn] = &[i170_primary, i170_ext];
const I030: &[FieldsFn] = &[i030];

// ---------------------------------------------------------------------------
// Compound items
// ---------------------------------------------------------------------------

fn azimuth_13(name: &'static str, b: &[u8]) -> Vec<Field> {
    vec![Field::float(name, b[0] as f64 * 360.0 / 8192.0, "deg")]
}

fn i130_srl(b: &[u8]) -> Result<Vec<Field>> {
    Ok(azimuth_13("srl", b))
}

fn i130_srr(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::uint("srr", b[0] as u64)])
}

fn i130_sam(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::float("sam", b[0] as i8 as f64, "dBm")])
}

fn i130_prl(b: &[u8]) -> Result<Vec<Field>> {
    Ok(azimuth_13("prl", b))
}

fn i130_pam(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::float("pam", b[0] as i8 as f64, "dBm")])
}

fn i130_rpd(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::float("rpd", b[0] as i8 as f64 / 256.0, "NM")])
}

fn i130_apd(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::float("apd", b[0] as i8 as f64 * 360.0 / 16_384.0, "deg")])
}

const I130: &[Subfield] = &[
    Subfield::new("SRL", Format::Fixed(1, i130_srl)),
    Subfield::new("SRR", Format::Fixed(1, i130_srr)),
    Subfield::new("SAM", Format::Fixed(1, i130_sam)),
    Subfield::new("PRL", Format::Fixed(1, i130_prl)),
    Subfield::new("PAM", Format::Fixed(1, i130_pam)),
    Subfield::new("RPD", Format::Fixed(1, i130_rpd)),
    Subfield::new("APD", Format::Fixed(1, i130_apd)),
];

fn i120_cal(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    let d = r.read_flag();
    r.skip(5);
    Ok(vec![
        Field::flag("d", d),
        Field::float("cal", r.read_i(10) as f64, "m/s"),
    ])
}

fn i120_rds(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    Ok(vec![
        Field::float("dop", r.read_i(16) as f64, "m/s"),
        Field::float("amb", r.read_u(16) as f64, "m/s"),
        Field::float("frq", r.read_u(16) as f64, "MHz"),
    ])
}

const I120: &[Subfield] = &[
    Subfield::new("CAL", Format::Fixed(2, i120_cal)),
    Subfield::new("RDS", Format::Repetitive(6, i120_rds)),
];

// ---------------------------------------------------------------------------
// Reserved Expansion field
// ---------------------------------------------------------------------------

fn md5_sum(b: &[u8]) -> Result<Vec<Field>> {
    Ok(common::mode5_summary(b, "x"))
}

fn md5_pmn(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    r.skip(2);
    let pin = r.read_u(14);
    r.skip(2);
    let nav = r.read_flag();
    let nat = r.read_u(5);
    r.skip(2);
    Ok(vec![
        Field::uint("pin", pin),
        Field::flag("nav", nav),
        Field::uint("nat", nat),
        Field::uint("mis", r.read_u(6)),
    ])
}

fn m5n_pmn(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    r.skip(2);
    let pin = r.read_u(14);
    r.skip(4);
    Ok(vec![
        Field::uint("pin", pin),
        Field::flag("nov", r.read_flag()),
        Field::uint("no", r.read_u(11)),
    ])
}

fn mode5_altitude(b: &[u8]) -> Result<Vec<Field>> {
    let mut r = BitReader::new(b);
    r.skip(1);
    let res = r.read_flag();
    let step = if res { 25.0 } else { 100.0 };
    Ok(vec![
        Field::flag("res", res),
        Field::float("altitude", r.read_i(14) as f64 * step, "ft"),
    ])
}

fn mode5_tos(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::float("time_offset", b[0] as i8 as f64 / 128.0, "s")])
}

const MD5: &[Subfield] = &[
    Subfield::new("SUM", Format::Fixed(1, md5_sum)),
    Subfield::new("PMN", Format::Fixed(4, md5_pmn)),
    Subfield::new("POS", Format::Fixed(6, common::wgs84_24)),
    Subfield::new("GA", Format::Fixed(2, mode5_altitude)),
    Subfield::new("EM1", Format::Fixed(2, common::mode_code)),
    Subfield::new("TOS", Format::Fixed(1, mode5_tos)),
    Subfield::new("XP", Format::Fixed(1, common::x_pulses)),
];

const M5N: &[Subfield] = &[
    Subfield::new("SUM", Format::Fixed(1, md5_sum)),
    Subfield::new("PMN", Format::Fixed(4, m5n_pmn)),
    Subfield::new("POS", Format::Fixed(6, common::wgs84_24)),
    Subfield::new("GA", Format::Fixed(2, mode5_altitude)),
    Subfield::new("EM1", Format::Fixed(2, common::mode_code)),
    Subfield::new("TOS", Format::Fixed(1, mode5_tos)),
    Subfield::new("XP", Format::Fixed(1, common::x_pulses)),
    Subfield::new("FOM", Format::Fixed(1, common::fom5)),
];

fn m4e(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::uint("foe_fri", ((b[0] >> 1) & 0x03) as u64)])
}

const M4E: &[FieldsFn] = &[m4e];

fn rpc_sco(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::uint("score", b[0] as u64)])
}

fn rpc_scr(b: &[u8]) -> Result<Vec<Field>> {
    let raw = u16::from_be_bytes([b[0], b[1]]);
    Ok(vec![Field::float("signal_clutter_ratio", raw as f64 * 0.1, "dB")])
}

fn rpc_rw(b: &[u8]) -> Result<Vec<Field>> {
    let raw = u16::from_be_bytes([b[0], b[1]]);
    Ok(vec![Field::float("range_width", raw as f64 / 256.0, "NM")])
}

fn rpc_ar(b: &[u8]) -> Result<Vec<Field>> {
    let raw = u16::from_be_bytes([b[0], b[1]]);
    Ok(vec![Field::float("ambiguous_range", raw as f64 / 256.0, "NM")])
}

const RPC: &[Subfield] = &[
    Subfield::new("SCO", Format::Fixed(1, rpc_sco)),
    Subfield::new("SCR", Format::Fixed(2, rpc_scr)),
    Subfield::new("RW", Format::Fixed(2, rpc_rw)),
    Subfield::new("AR", Format::Fixed(2, rpc_ar)),
];

fn err(b: &[u8]) -> Result<Vec<Field>> {
    let raw = BitReader::new(b).read_u(24);
    Ok(vec![Field::float("rho_error", raw as f64 / 256.0, "NM")])
}

fn rtc_trn(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::float("turn_rate", b[0] as i8 as f64 * 0.01, "deg/s")])
}

fn rtc_atl(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::uint("track_number", u16::from_be_bytes([b[0], b[1]]) as u64)])
}

fn rtc_dlk(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::uint("link", b[0] as u64)])
}

fn rtc_tes(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::uint("test", b[0] as u64)])
}

const RTC: &[Subfield] = &[
    Subfield::new("PTL", Format::Fixed(3, common::hex)),
    Subfield::new("ATL", Format::Repetitive(2, rtc_atl)),
    Subfield::new("TRN", Format::Fixed(1, rtc_trn)),
    Subfield::new("NPP", Format::Fixed(22, common::hex)),
    Subfield::new("DLK", Format::Repetitive(1, rtc_dlk)),
    Subfield::new("LCK", Format::Fixed(2, common::hex)),
    Subfield::new("TC", Format::Fixed(6, common::hex)),
    Subfield::new("TLC", Format::Fixed(4, common::hex)),
    Subfield::new("ASI", Format::Repetitive(8, common::hex)),
    Subfield::new("TES", Format::Fixed(1, rtc_tes)),
    Subfield::new("IR", Format::Fixed(1, common::hex)),
];

fn cpc_pnb(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::uint("plot_number", u16::from_be_bytes([b[0], b[1]]) as u64)])
}

/// One reply: type, then the number of replies of that type.
fn cpc_rpl(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![
        Field::uint("reply_type", b[0] as u64),
        Field::uint("replies", u16::from_be_bytes([b[1], b[2]]) as u64),
    ])
}

fn cpc_snb(b: &[u8]) -> Result<Vec<Field>> {
    Ok(vec![Field::uint("scan_number", b[0] as u64)])
}

/// Eight BCD digits, YYYYMMDD.
fn cpc_date(b: &[u8]) -> Result<Vec<Field>> {
    let mut digits = String::with_capacity(10);
    for (i, byte) in b.iter().take(4).enumerate() {
        for nibble in [byte >> 4, byte & 0x0F] {
            if nibble > 9 {
                return Err(AsterixError::FieldRange {
                    field: "date",
                    value: nibble as f64,
                });
            }
            digits.push(char::from(b'0' + nibble));
        }
        if i == 1 || i == 2 {
            digits.push('-');
        }
    }
    Ok(vec![Field::text("date", digits)])
}

const CPC: &[Subfield] = &[
    Subfield::new("PNB", Format::Fixed(2, cpc_pnb)),
    Subfield::new("RPL", Format::Repetitive(3, cpc_rpl)),
    Subfield::new("SNB", Format::Fixed(1, cpc_snb)),
    Subfield::new("DATE", Format::Fixed(4, cpc_date)),
];

const RE: &[Subfield] = &[
    Subfield::new("MD5", Format::Compound(Presence::Chained, MD5)),
    Subfield::new("M5N", Format::Compound(Presence::Chained, M5N)),
    Subfield::new("M4E", Format::Extensible(1, M4E)),
    Subfield::new("RPC", Format::Compound(Presence::Chained, RPC)),
    Subfield::new("ERR", Format::Fixed(3, err)),
    Subfield::new("RTC", Format::Compound(Presence::Chained, RTC)),
    Subfield::new("CPC", Format::Compound(Presence::Chained, CPC)),
];

const RE_FORMAT: Format = Format::Compound(Presence::Chained, RE);

// ---------------------------------------------------------------------------
// UAP
// ---------------------------------------------------------------------------

const ENTRIES: &[UapEntry] = &[
    UapEntry::new(1, "I048/010", "Data Source Identifier", Format::Fixed(2, common::data_source)),
    UapEntry::new(2, "I048/140", "Time of Day", Format::Fixed(3, common::time_of_day)),
    UapEntry::new(3, "I048/020", "Target Report Descriptor", Format::Extensible(1, I020)),
    UapEntry::new(4, "I048/040", "Measured Position in Polar Co-ordinates", Format::Fixed(4, i040)),
    UapEntry::new(5, "I048/070", "Mode-3/A Code in Octal Representation", Format::Fixed(2, common::mode_code)),
    UapEntry::new(6, "I048/090", "Flight Level in Binary Representation", Format::Fixed(2, i090)),
    UapEntry::new(7, "I048/130", "Radar Plot Characteristics", Format::Compound(Presence::Chained, I130)),
    UapEntry::new(8, "I048/220", "Aircraft Address", Format::Fixed(3, common::address)),
    UapEntry::new(9, "I048/240", "Aircraft Identification", Format::Fixed(6, common::callsign)),
    UapEntry::new(10, "I048/250", "BDS Register Data", Format::Registers(altitude)),
    UapEntry::new(11, "I048/161", "Track Number", Format::Fixed(2, common::track_number)),
    UapEntry::new(12, "I048/042", "Calculated Position in Cartesian Co-ordinates", Format::Fixed(4, i042)),
    UapEntry::new(13, "I048/200", "Calculated Track Velocity in Polar Co-ordinates", Format::Fixed(4, i200)),
    UapEntry::new(14, "I048/170", "Track Status", Format::Extensible(1, I170)),
    UapEntry::new(15, "I048/210", "Track Quality", Format::Fixed(4, i210)),
    UapEntry::new(16, "I048/030", "Warning/Error Conditions and Target Classification", Format::Extensible(1, I030)),
    UapEntry::new(17, "I048/080", "Mode-3/A Code Confidence Indicator", Format::Fixed(2, i080)),
    UapEntry::new(18, "I048/100", "Mode-C Code and Confidence Indicator", Format::Fixed(4, i100)),
    UapEntry::new(19, "I048/110", "Height Measured by a 3D Radar", Format::Fixed(2, i110)),
    UapEntry::new(20, "I048/120", "Radial Doppler Speed", Format::Compound(Presence::Chained, I120)),
    UapEntry::new(21, "I048/230", "Communications/ACAS Capability and Flight Status", Format::Fixed(2, i230)),
    UapEntry::new(22, "I048/260", "ACAS Resolution Advisory Report", Format::Fixed(7, common::hex)),
    UapEntry::new(23, "I048/055", "Mode-1 Code in Octal Representation", Format::Fixed(1, i055)),
    UapEntry::new(24, "I048/050", "Mode-2 Code in Octal Representation", Format::Fixed(2, common::mode_code)),
    UapEntry::new(25, "I048/065", "Mode-1 Code Confidence Indicator", Format::Fixed(1, i065)),
    UapEntry::new(26, "I048/060", "Mode-2 Code Confidence Indicator", Format::Fixed(2, i080)),
    UapEntry::new(27, "I048/SP", "Special Purpose Field", Format::Explicit(None)),
    UapEntry::new(28, "I048/RE", "Reserved Expansion Field", Format::Explicit(Some(&RE_FORMAT))),
];

pub fn uap() -> Uap {
    Uap::new(CATEGORY, "Monoradar Target Reports", ENTRIES)
}

/// Mode 3/A code of a decoded record, e.g. `"7700"`.
pub fn squawk(record: &crate::record::Record) -> Option<String> {
    let item = record.present("I048/070")?;
    item.field("code")?.as_str().map(str::to_string)
}
