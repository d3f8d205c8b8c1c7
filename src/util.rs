// 数值清洗工具

/// Treats NaN and infinities from the upstream source as missing.
pub fn to_finite(x: Option<f64>) -> Option<f64> {
    x.filter(|v| v.is_finite())
}

/// Output-stage rounding. Rounding a missing value stays missing.
pub fn round_or_none(x: Option<f64>, ndigits: i32) -> Option<f64> {
    x.map(|v| round_to(v, ndigits))
}

pub fn round_to(v: f64, ndigits: i32) -> f64 {
    let factor = 10f64.powi(ndigits);
    (v * factor).round() / factor
}
