//! Comm-B (BDS) register sub-decoder.
//!
//! An 8-octet register carries 56 bits of Mode S MB data followed by the
//! BDS1/BDS2 code nibbles. The MB layout is not self-identifying, so the data
//! is decoded speculatively as:
//! - BDS 4,4: meteorological routine air report
//! - BDS 5,0: track and turn report
//! - BDS 6,0: heading and speed report
//!
//! A candidate survives only if every status bit agrees with its value (status
//! clear means the value must be zero) and every value lies in its documented
//! domain. When BDS 5,0 and 6,0 both survive, the speed cross-checks in
//! [`disambiguate`] decide which one to drop. All candidates and the verdict
//! are kept on the register so callers can apply their own rules.

use serde::Serialize;
use thiserror::Error;

use crate::bits::BitReader;
use crate::types::{hex_encode, serialize_hex};

/// Octets per register (7 MB octets + 1 code octet).
pub const REGISTER_LEN: usize = 8;

/// Speed disagreement (kt) at which a BDS 5,0/6,0 candidate is discarded.
///
/// Empirical; exposed through [`BdsConfig`] so it can be tuned.
pub const DEFAULT_THRESHOLD_KT: f64 = 100.0;

/// Tunables for register decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct BdsConfig {
    pub threshold_kt: f64,
    /// Decode only the layout named by the register's own BDS1/BDS2 code.
    pub trust_declared: bool,
}

impl Default for BdsConfig {
    fn default() -> Self {
        BdsConfig {
            threshold_kt: DEFAULT_THRESHOLD_KT,
            trust_declared: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BdsKind {
    Bds44,
    Bds50,
    Bds60,
}

impl BdsKind {
    pub fn from_code(bds1: u8, bds2: u8) -> Option<BdsKind> {
        match (bds1, bds2) {
            (4, 4) => Some(BdsKind::Bds44),
            (5, 0) => Some(BdsKind::Bds50),
            (6, 0) => Some(BdsKind::Bds60),
            _ => None,
        }
    }
}

impl std::fmt::Display for BdsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BdsKind::Bds44 => write!(f, "BDS44"),
            BdsKind::Bds50 => write!(f, "BDS50"),
            BdsKind::Bds60 => write!(f, "BDS60"),
        }
    }
}

/// Why a candidate layout was rejected.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum Rejection {
    #[error("{0}: status clear but value non-zero")]
    StatusMismatch(&'static str),
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("register carries no data")]
    Empty,
}

// ---------------------------------------------------------------------------
// Candidate layouts
// ---------------------------------------------------------------------------

/// BDS 4,4: meteorological routine air report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bds44 {
    pub exists: bool,
    pub fom: u8,
    pub wind_speed_kt: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub temperature_c: f64,
    pub static_pressure_hpa: Option<f64>,
    pub turbulence: Option<u8>,
    pub humidity_pct: Option<f64>,
}

/// BDS 5,0: track and turn report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bds50 {
    pub exists: bool,
    pub roll_angle_deg: Option<f64>,
    pub true_track_deg: Option<f64>,
    pub ground_speed_kt: Option<f64>,
    pub track_angle_rate_deg_s: Option<f64>,
    pub true_airspeed_kt: Option<f64>,
}

/// BDS 6,0: heading and speed report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bds60 {
    pub exists: bool,
    pub magnetic_heading_deg: Option<f64>,
    pub indicated_airspeed_kt: Option<f64>,
    pub mach: Option<f64>,
    pub baro_vertical_rate_fpm: Option<f64>,
    pub inertial_vertical_rate_fpm: Option<f64>,
}

/// Read a status bit and its value field.
///
/// Returns `None` when the status bit is clear and the value is zero.
fn status_field(
    r: &mut BitReader,
    name: &'static str,
    bits: usize,
    signed: bool,
    scale: f64,
    range: (f64, f64),
) -> Result<Option<f64>, Rejection> {
    let status = r.read_flag();
    let raw = if signed {
        r.read_i(bits)
    } else {
        r.read_u(bits) as i64
    };
    if !status {
        if raw != 0 {
            return Err(Rejection::StatusMismatch(name));
        }
        return Ok(None);
    }
    let value = raw as f64 * scale;
    in_range(name, value, range)?;
    Ok(Some(value))
}

fn in_range(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<(), Rejection> {
    if !(min..=max).contains(&value) {
        return Err(Rejection::OutOfRange { field, value });
    }
    Ok(())
}

impl Bds44 {
    pub fn decode(mb: &[u8]) -> Result<Bds44, Rejection> {
        let mut r = BitReader::new(mb);

        let fom = r.read_u(4) as u8;
        in_range("fom", fom as f64, (0.0, 4.0))?;

        // Wind speed and direction share one status bit
        let wind_status = r.read_flag();
        let speed = r.read_u(9);
        let direction = r.read_u(9);
        let (wind_speed_kt, wind_direction_deg) = if wind_status {
            let speed = speed as f64;
            let direction = direction as f64 * 180.0 / 256.0;
            in_range("wind_speed", speed, (0.0, 511.0))?;
            in_range("wind_direction", direction, (0.0, 360.0))?;
            (Some(speed), Some(direction))
        } else if speed != 0 || direction != 0 {
            return Err(Rejection::StatusMismatch("wind"));
        } else {
            (None, None)
        };

        let temperature_c = r.read_i(11) as f64 * 0.25;
        in_range("temperature", temperature_c, (-128.0, 128.0))?;

        let static_pressure_hpa = status_field(&mut r, "static_pressure", 11, false, 1.0, (0.0, 2048.0))?;
        let turbulence = status_field(&mut r, "turbulence", 2, false, 1.0, (0.0, 3.0))?.map(|t| t as u8);
        let humidity_pct = status_field(&mut r, "humidity", 6, false, 100.0 / 64.0, (0.0, 100.0))?;

        Ok(Bds44 {
            exists: true,
            fom,
            wind_speed_kt,
            wind_direction_deg,
            temperature_c,
            static_pressure_hpa,
            turbulence,
            humidity_pct,
        })
    }
}

impl Bds50 {
    pub fn decode(mb: &[u8]) -> Result<Bds50, Rejection> {
        let mut r = BitReader::new(mb);
        Ok(Bds50 {
            exists: true,
            roll_angle_deg: status_field(&mut r, "roll_angle", 10, true, 45.0 / 256.0, (-90.0, 90.0))?,
            true_track_deg: status_field(&mut r, "true_track", 11, true, 90.0 / 512.0, (-180.0, 180.0))?,
            ground_speed_kt: status_field(&mut r, "ground_speed", 10, false, 2.0, (0.0, 2046.0))?,
            track_angle_rate_deg_s: status_field(&mut r, "track_angle_rate", 10, true, 8.0 / 256.0, (-16.0, 16.0))?,
            true_airspeed_kt: status_field(&mut r, "true_airspeed", 10, false, 2.0, (0.0, 2046.0))?,
        })
    }
}

impl Bds60 {
    pub fn decode(mb: &[u8]) -> Result<Bds60, Rejection> {
        let mut r = BitReader::new(mb);
        Ok(Bds60 {
            exists: true,
            magnetic_heading_deg: status_field(&mut r, "magnetic_heading", 11, true, 90.0 / 512.0, (-180.0, 180.0))?,
            indicated_airspeed_kt: status_field(&mut r, "indicated_airspeed", 10, false, 1.0, (0.0, 1023.0))?,
            mach: status_field(&mut r, "mach", 10, false, 0.004, (0.0, 4.092))?,
            baro_vertical_rate_fpm: status_field(&mut r, "baro_vertical_rate", 10, true, 32.0, (-16384.0, 16384.0))?,
            inertial_vertical_rate_fpm: status_field(&mut r, "inertial_vertical_rate", 10, true, 32.0, (-16384.0, 16384.0))?,
        })
    }
}

// ---------------------------------------------------------------------------
// Standard atmosphere
// ---------------------------------------------------------------------------

const P0_PA: f64 = 101_325.0;
const LAPSE_RATE: f64 = 0.0065;
const T0_K: f64 = 288.15;
const GRAVITY: f64 = 9.81;
const GAS_CONSTANT: f64 = 287.0;
const A0_KT: f64 = 661.47;
const FT_TO_M: f64 = 0.3048;

/// Static pressure (Pa) at a pressure altitude in feet.
pub fn static_pressure(altitude_ft: f64) -> f64 {
    let h = altitude_ft * FT_TO_M;
    let base = (1.0 - LAPSE_RATE * h / T0_K).max(0.0);
    P0_PA * base.powf(GRAVITY / (GAS_CONSTANT * LAPSE_RATE))
}

/// Calibrated airspeed (kt) implied by a Mach number at a pressure altitude.
pub fn calibrated_airspeed(mach: f64, altitude_ft: f64) -> f64 {
    let p = static_pressure(altitude_ft);
    let qc = p * ((1.0 + 0.2 * mach * mach).powf(3.5) - 1.0);
    A0_KT * (5.0 * ((qc / P0_PA + 1.0).powf(2.0 / 7.0) - 1.0)).max(0.0).sqrt()
}

// ---------------------------------------------------------------------------
// Disambiguation
// ---------------------------------------------------------------------------

/// Speed cross-checks between BDS 5,0 and BDS 6,0 readings of one register.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Disambiguation {
    pub threshold_kt: f64,
    pub altitude_ft: Option<f64>,
    /// |GS - TAS| from the BDS 5,0 reading.
    pub gs_tas_diff_kt: Option<f64>,
    /// CAS derived from the BDS 6,0 Mach number and the altitude.
    pub cas_kt: Option<f64>,
    /// |CAS - IAS| from the BDS 6,0 reading.
    pub cas_ias_diff_kt: Option<f64>,
    pub reject_bds50: bool,
    pub reject_bds60: bool,
}

/// Run both cross-checks. A check whose inputs are missing is skipped; an
/// altitude of 0 counts as unknown.
pub fn disambiguate(
    bds50: &Bds50,
    bds60: &Bds60,
    altitude_ft: Option<f64>,
    threshold_kt: f64,
) -> Disambiguation {
    let altitude_ft = altitude_ft.filter(|alt| *alt != 0.0);

    let gs_tas_diff_kt = bds50
        .ground_speed_kt
        .zip(bds50.true_airspeed_kt)
        .map(|(gs, tas)| (gs - tas).abs());

    let cas_kt = altitude_ft
        .zip(bds60.mach)
        .map(|(alt, mach)| calibrated_airspeed(mach, alt));
    let cas_ias_diff_kt = cas_kt
        .zip(bds60.indicated_airspeed_kt)
        .map(|(cas, ias)| (cas - ias).abs());

    Disambiguation {
        threshold_kt,
        altitude_ft,
        gs_tas_diff_kt,
        cas_kt,
        cas_ias_diff_kt,
        reject_bds50: gs_tas_diff_kt.is_some_and(|d| d >= threshold_kt),
        reject_bds60: cas_ias_diff_kt.is_some_and(|d| d >= threshold_kt),
    }
}

// ---------------------------------------------------------------------------
// Register
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", content = "kind")]
pub enum Verdict {
    /// No candidate layout validated.
    Undecoded,
    /// Exactly one candidate validated.
    Single(BdsKind),
    /// BDS 5,0 and 6,0 both validated; the cross-checks kept this one.
    Disambiguated(BdsKind),
    /// More than one candidate remains.
    Ambiguous(Vec<BdsKind>),
    /// Decoded as the layout named by the register's own code.
    Declared(BdsKind),
}

/// A decoded Comm-B register with every candidate reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BdsRegister {
    #[serde(serialize_with = "serialize_hex")]
    pub raw: Vec<u8>,
    /// MB field as hex; kept for inspection when undecoded.
    pub mb: String,
    pub bds1: u8,
    pub bds2: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bds44: Option<Bds44>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bds50: Option<Bds50>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bds60: Option<Bds60>,
    /// Candidates that validated, before disambiguation.
    pub candidates: Vec<BdsKind>,
    pub rejections: Vec<(BdsKind, Rejection)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<Disambiguation>,
    pub verdict: Verdict,
}

impl BdsRegister {
    /// Candidates that still exist after disambiguation.
    pub fn kinds(&self) -> Vec<BdsKind> {
        let mut kinds = Vec::new();
        if self.bds44.as_ref().is_some_and(|b| b.exists) {
            kinds.push(BdsKind::Bds44);
        }
        if self.bds50.as_ref().is_some_and(|b| b.exists) {
            kinds.push(BdsKind::Bds50);
        }
        if self.bds60.as_ref().is_some_and(|b| b.exists) {
            kinds.push(BdsKind::Bds60);
        }
        kinds
    }

    pub fn is_decoded(&self) -> bool {
        self.verdict != Verdict::Undecoded
    }
}

/// Decode one 8-octet register.
///
/// `altitude_ft` is the barometric altitude of the report carrying the
/// register, used by the BDS 6,0 cross-check.
pub fn decode_register(reg: &[u8], altitude_ft: Option<f64>, cfg: &BdsConfig) -> BdsRegister {
    let mut raw = [0u8; REGISTER_LEN];
    let n = reg.len().min(REGISTER_LEN);
    raw[..n].copy_from_slice(&reg[..n]);
    let mb = &raw[..7];
    let (bds1, bds2) = (raw[7] >> 4, raw[7] & 0x0F);

    let mut out = BdsRegister {
        raw: raw.to_vec(),
        mb: hex_encode(mb),
        bds1,
        bds2,
        bds44: None,
        bds50: None,
        bds60: None,
        candidates: Vec::new(),
        rejections: Vec::new(),
        checks: None,
        verdict: Verdict::Undecoded,
    };

    if mb.iter().all(|b| *b == 0) {
        for kind in [BdsKind::Bds44, BdsKind::Bds50, BdsKind::Bds60] {
            out.rejections.push((kind, Rejection::Empty));
        }
        return out;
    }

    let declared = BdsKind::from_code(bds1, bds2).filter(|_| cfg.trust_declared);
    let kinds = match declared {
        Some(kind) => vec![kind],
        None => vec![BdsKind::Bds44, BdsKind::Bds50, BdsKind::Bds60],
    };

    for kind in kinds {
        let result = match kind {
            BdsKind::Bds44 => Bds44::decode(mb).map(|b| out.bds44 = Some(b)),
            BdsKind::Bds50 => Bds50::decode(mb).map(|b| out.bds50 = Some(b)),
            BdsKind::Bds60 => Bds60::decode(mb).map(|b| out.bds60 = Some(b)),
        };
        match result {
            Ok(()) => out.candidates.push(kind),
            Err(rejection) => out.rejections.push((kind, rejection)),
        }
    }

    if let Some(kind) = declared {
        if !out.candidates.is_empty() {
            out.verdict = Verdict::Declared(kind);
        }
        return out;
    }

    if let (Some(b50), Some(b60)) = (out.bds50.as_mut(), out.bds60.as_mut()) {
        let checks = disambiguate(b50, b60, altitude_ft, cfg.threshold_kt);
        // Both failing keeps both
        if checks.reject_bds50 != checks.reject_bds60 {
            b50.exists = !checks.reject_bds50;
            b60.exists = !checks.reject_bds60;
        }
        out.checks = Some(checks);
    }

    let remaining = out.kinds();
    let resolved = out.candidates.len() > remaining.len();
    out.verdict = match remaining.as_slice() {
        [] => Verdict::Undecoded,
        [kind] if resolved => Verdict::Disambiguated(*kind),
        [kind] => Verdict::Single(*kind),
        _ => Verdict::Ambiguous(remaining),
    };
    out
}
