use crate::units::BitsPerSec;

/// Theoretical PHY rates of the DMG modulation and coding schemes.
const DMG_RATES: [(&str, u64); 13] = [
    ("DMG_MCS0", 27_500_000),
    ("DMG_MCS1", 385_000_000),
    ("DMG_MCS2", 770_000_000),
    ("DMG_MCS3", 962_500_000),
    ("DMG_MCS4", 1_155_000_000),
    ("DMG_MCS5", 1_251_250_000),
    ("DMG_MCS6", 1_540_000_000),
    ("DMG_MCS7", 1_925_000_000),
    ("DMG_MCS8", 2_310_000_000),
    ("DMG_MCS9", 2_502_500_000),
    ("DMG_MCS10", 3_080_000_000),
    ("DMG_MCS11", 3_850_000_000),
    ("DMG_MCS12", 4_620_000_000),
];

/// Looks up the PHY rate of a modulation and coding scheme, e.g. `DMG_MCS4`.
pub fn phy_rate(mcs: &str) -> Option<BitsPerSec> {
    DMG_RATES
        .iter()
        .find_map(|&(name, rate)| (name == mcs).then_some(BitsPerSec::new(rate)))
}

/// The known modulation and coding schemes, from slowest to fastest.
pub fn schemes() -> impl Iterator<Item = &'static str> {
    DMG_RATES.iter().map(|&(name, _)| name)
}
