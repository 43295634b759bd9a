//! Disk sizes as they appear in drive strings (`size=32G`).

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;

// Same as the `size` pattern of the PVE drive schema.
static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    // unwrap: constant pattern
    Regex::new(r"^(\d+)(?:\.(\d+))?([KMGT])?$").unwrap()
});

/// Binary size unit used by PVE for drive sizes.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub enum SizeUnit {
    /// No suffix, plain bytes.
    #[default]
    Byte,
    Kibi,
    Mebi,
    Gibi,
    Tebi,
}

impl SizeUnit {
    pub const fn factor(self) -> u64 {
        match self {
            SizeUnit::Byte => 1,
            SizeUnit::Kibi => 1 << 10,
            SizeUnit::Mebi => 1 << 20,
            SizeUnit::Gibi => 1 << 30,
            SizeUnit::Tebi => 1 << 40,
        }
    }

    pub const fn suffix(self) -> &'static str {
        match self {
            SizeUnit::Byte => "",
            SizeUnit::Kibi => "K",
            SizeUnit::Mebi => "M",
            SizeUnit::Gibi => "G",
            SizeUnit::Tebi => "T",
        }
    }
}

/// A disk size which remembers the unit it was written in.
///
/// Two sizes are only equal if both their byte count and their unit match, since `1G` and
/// `1024M` print differently.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde_with::SerializeDisplay, serde_with::DeserializeFromStr)
)]
pub struct DiskSize {
    bytes: u64,
    unit: SizeUnit,
}

impl DiskSize {
    /// A size of `value` times `unit`, saturating at `u64::MAX` bytes.
    pub const fn new(value: u64, unit: SizeUnit) -> Self {
        Self {
            bytes: value.saturating_mul(unit.factor()),
            unit,
        }
    }

    pub const fn from_bytes(bytes: u64) -> Self {
        Self::new(bytes, SizeUnit::Byte)
    }

    pub const fn from_kibibytes(value: u64) -> Self {
        Self::new(value, SizeUnit::Kibi)
    }

    pub const fn from_mebibytes(value: u64) -> Self {
        Self::new(value, SizeUnit::Mebi)
    }

    pub const fn from_gibibytes(value: u64) -> Self {
        Self::new(value, SizeUnit::Gibi)
    }

    pub const fn from_tebibytes(value: u64) -> Self {
        Self::new(value, SizeUnit::Tebi)
    }

    pub const fn bytes(&self) -> u64 {
        self.bytes
    }

    pub const fn unit(&self) -> SizeUnit {
        self.unit
    }
}

impl FromStr for DiskSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidSizeLiteral(s.to_string());

        let caps = SIZE_RE.captures(s).ok_or_else(invalid)?;
        let suffix = caps.get(3).map_or("", |m| m.as_str());
        // SIZE_RE only lets `[KMGT]` through
        let unit = match suffix {
            "K" => SizeUnit::Kibi,
            "M" => SizeUnit::Mebi,
            "G" => SizeUnit::Gibi,
            "T" => SizeUnit::Tebi,
            _ => SizeUnit::Byte,
        };
        let whole: u64 = caps[1].parse().map_err(|_| invalid())?;

        let bytes = match caps.get(2) {
            None => whole.checked_mul(unit.factor()).ok_or_else(invalid)?,
            Some(_) => {
                // fractional sizes only ever show up for small values, f64 is precise enough
                let value: f64 = s[..s.len() - suffix.len()]
                    .parse()
                    .map_err(|_| invalid())?;
                let bytes = (value * unit.factor() as f64).round();
                if bytes >= u64::MAX as f64 {
                    return Err(invalid());
                }
                bytes as u64
            }
        };

        Ok(Self { bytes, unit })
    }
}

impl fmt::Display for DiskSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let factor = self.unit.factor();
        if self.bytes % factor == 0 {
            write!(f, "{}{}", self.bytes / factor, self.unit.suffix())
        } else {
            write!(
                f,
                "{}{}",
                self.bytes as f64 / factor as f64,
                self.unit.suffix()
            )
        }
    }
}
