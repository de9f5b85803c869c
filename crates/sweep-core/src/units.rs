macro_rules! unit {
    ($name: ident) => {
        #[derive(
            Debug,
            Default,
            Copy,
            Clone,
            PartialOrd,
            Ord,
            PartialEq,
            Eq,
            Hash,
            derive_more::Add,
            derive_more::Sub,
            derive_more::Sum,
            derive_more::FromStr,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            pub const ZERO: $name = Self::new(0);

            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn into_u64(self) -> u64 {
                self.0
            }

            pub fn into_f64(self) -> f64 {
                self.0 as f64
            }
        }
    };
}

unit!(BitsPerSec);

impl BitsPerSec {
    pub fn into_mbps(self) -> f64 {
        self.into_f64() / 1e6
    }
}

impl std::fmt::Display for BitsPerSec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

unit!(Microsecs);

impl Microsecs {
    pub fn into_secs(self) -> f64 {
        self.into_f64() / 1e6
    }
}

impl std::fmt::Display for Microsecs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}us", self.0)
    }
}

/// Parses a data rate such as `100Mbps` or `250000bps`, following the simulator's data-rate
/// attribute syntax (optional `k`, `M` or `G` prefix before `bps`).
pub fn parse_data_rate(s: &str) -> Option<BitsPerSec> {
    let value = s.strip_suffix("bps")?;
    let (digits, scale) = match value.char_indices().last()? {
        (i, 'k' | 'K') => (&value[..i], 1e3),
        (i, 'M') => (&value[..i], 1e6),
        (i, 'G') => (&value[..i], 1e9),
        _ => (value, 1.0),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return None;
    }
    let rate = digits.parse::<f64>().ok()? * scale;
    Some(BitsPerSec::new(rate.round() as u64))
}
