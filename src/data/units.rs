use std::fmt;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

/// The physical quantities a field of an entry can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    Dimensionless,
    Potential,
    Current,
    CurrentDensity,
    Charge,
    ChargeDensity,
    Time,
    ScanRate,
}

impl Dimension {
    /// The SI unit all conversions within this dimension are relative to.
    pub fn canonical_unit(&self) -> &'static str {
        match self {
            Dimension::Dimensionless => "",
            Dimension::Potential => "V",
            Dimension::Current => "A",
            Dimension::CurrentDensity => "A / m2",
            Dimension::Charge => "C",
            Dimension::ChargeDensity => "C / m2",
            Dimension::Time => "s",
            Dimension::ScanRate => "V / s",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::Dimensionless => "dimensionless",
            Dimension::Potential => "potential",
            Dimension::Current => "current",
            Dimension::CurrentDensity => "current density",
            Dimension::Charge => "charge",
            Dimension::ChargeDensity => "charge density",
            Dimension::Time => "time",
            Dimension::ScanRate => "scan rate",
        };
        write!(f, "{name}")
    }
}

// ---------------------------------------------------------------------------
// Parsed units
// ---------------------------------------------------------------------------

/// A unit expression decomposed into its dimension and its scale relative to
/// [`Dimension::canonical_unit`].
///
/// The scale is kept as `mantissa * 10^exponent` so that converting between
/// decimal prefixes multiplies by an exact power of ten.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompoundUnit {
    pub dimension: Dimension,
    mantissa: f64,
    exponent: i32,
}

impl CompoundUnit {
    /// Multiplier from this unit to the canonical SI unit of its dimension.
    pub fn scale(&self) -> f64 {
        self.mantissa * 10f64.powi(self.exponent)
    }

    /// Multiplier taking a value expressed in `self` to `target`.
    fn factor_to(&self, target: &CompoundUnit) -> f64 {
        let exponent = self.exponent - target.exponent;
        if self.mantissa == target.mantissa {
            10f64.powi(exponent)
        } else {
            self.mantissa / target.mantissa * 10f64.powi(exponent)
        }
    }
}

/// SI prefixes recognised in front of a base unit. `u`, `µ` (micro sign) and
/// `μ` (greek mu) all spell micro.
const SI_PREFIXES: [(&str, i32); 19] = [
    ("Y", 24),
    ("Z", 21),
    ("E", 18),
    ("P", 15),
    ("T", 12),
    ("G", 9),
    ("M", 6),
    ("k", 3),
    ("h", 2),
    ("d", -1),
    ("c", -2),
    ("m", -3),
    ("u", -6),
    ("µ", -6),
    ("μ", -6),
    ("n", -9),
    ("p", -12),
    ("f", -15),
    ("a", -18),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Base {
    Volt,
    Ampere,
    Coulomb,
    Second,
    Minute,
    Hour,
    Meter,
}

impl Base {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "V" => Some(Base::Volt),
            "A" => Some(Base::Ampere),
            "C" => Some(Base::Coulomb),
            "s" => Some(Base::Second),
            "min" => Some(Base::Minute),
            "h" => Some(Base::Hour),
            "m" => Some(Base::Meter),
            _ => None,
        }
    }

    fn accepts_prefix(&self) -> bool {
        !matches!(self, Base::Minute | Base::Hour)
    }
}

/// Powers of each base quantity accumulated while parsing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Powers {
    volt: i32,
    ampere: i32,
    coulomb: i32,
    time: i32,
    length: i32,
}

impl Powers {
    /// Record `power` for the quantity measured by `base`. Each quantity may
    /// appear once per unit, so `km3 m-3 V` is rejected.
    fn insert(&mut self, base: Base, power: i32) -> Option<()> {
        let slot = match base {
            Base::Volt => &mut self.volt,
            Base::Ampere => &mut self.ampere,
            Base::Coulomb => &mut self.coulomb,
            Base::Second | Base::Minute | Base::Hour => &mut self.time,
            Base::Meter => &mut self.length,
        };
        if *slot != 0 {
            return None;
        }
        *slot = power;
        Some(())
    }

    fn dimension(&self) -> Option<Dimension> {
        let Powers {
            volt,
            ampere,
            coulomb,
            time,
            length,
        } = *self;
        match (volt, ampere, coulomb, time, length) {
            (0, 0, 0, 0, 0) => Some(Dimension::Dimensionless),
            (1, 0, 0, 0, 0) => Some(Dimension::Potential),
            (0, 1, 0, 0, 0) => Some(Dimension::Current),
            (0, 1, 0, 0, -2) => Some(Dimension::CurrentDensity),
            (0, 0, 1, 0, 0) => Some(Dimension::Charge),
            (0, 0, 1, 0, -2) => Some(Dimension::ChargeDensity),
            (0, 0, 0, 1, 0) => Some(Dimension::Time),
            (1, 0, 0, -1, 0) => Some(Dimension::ScanRate),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Stateless lookup of unit spellings. Every conversion performed by
/// [`Entry::rescale`](crate::Entry::rescale) goes through here.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitRegistry;

impl UnitRegistry {
    /// Dimension of `unit`.
    pub fn dimension_of(unit: &str) -> Result<Dimension> {
        Ok(Self::parse_compound_unit(unit)?.dimension)
    }

    /// Multiplier `factor` such that `x_to = x_from * factor`.
    pub fn conversion_factor(from_unit: &str, to_unit: &str) -> Result<f64> {
        let from = Self::parse_compound_unit(from_unit)?;
        let to = Self::parse_compound_unit(to_unit)?;
        if from.dimension != to.dimension {
            return Err(Error::IncompatibleUnits {
                from: from_unit.to_string(),
                to: to_unit.to_string(),
                from_dimension: from.dimension.to_string(),
                to_dimension: to.dimension.to_string(),
            });
        }
        if from_unit.trim() == to_unit.trim() {
            return Ok(1.0);
        }
        Ok(from.factor_to(&to))
    }

    /// Whether two units can be converted into each other.
    pub fn compatible(a: &str, b: &str) -> Result<bool> {
        Ok(Self::dimension_of(a)? == Self::dimension_of(b)?)
    }

    /// Decompose a unit expression such as `mA / cm2`, `uA cm-2`, `mV s-1`
    /// or `µC/cm²` into a dimension and a scale.
    ///
    /// Grammar: whitespace separated atoms, an optional single `/` after
    /// which every atom is inverted. An atom is an optionally SI-prefixed
    /// base symbol (`V`, `A`, `C`, `s`, `m`, or unprefixed `min`, `h`)
    /// followed by an optional integer power (`2`, `-2`, `^2`, `²`) of at
    /// most 3 in magnitude. Each base quantity appears at most once. The
    /// empty string and `1` are dimensionless.
    pub fn parse_compound_unit(spec: &str) -> Result<CompoundUnit> {
        let unrecognized = || Error::UnrecognizedUnit(spec.to_string());

        let normalized = spec
            .trim()
            .replace('²', "2")
            .replace('³', "3")
            .replace('^', "")
            .replace(['*', '·', '⋅'], " ");

        if normalized.is_empty() || normalized == "1" {
            return Ok(CompoundUnit {
                dimension: Dimension::Dimensionless,
                mantissa: 1.0,
                exponent: 0,
            });
        }

        let mut halves = normalized.split('/');
        let numerator = halves.next().unwrap_or("");
        let denominator = halves.next();
        if halves.next().is_some() {
            return Err(unrecognized());
        }

        let mut powers = Powers::default();
        let mut mantissa = 1.0;
        let mut exponent = 0;

        let atoms = numerator
            .split_whitespace()
            .map(|atom| (atom, 1))
            .chain(
                denominator
                    .into_iter()
                    .flat_map(str::split_whitespace)
                    .map(|atom| (atom, -1)),
            );

        let mut seen_atom = false;
        for (atom, sign) in atoms {
            let (prefix, base, power) = parse_atom(atom).ok_or_else(unrecognized)?;
            let power = power * sign;
            seen_atom = true;

            powers.insert(base, power).ok_or_else(unrecognized)?;
            exponent += prefix * power;
            match base {
                Base::Minute => mantissa *= 60f64.powi(power),
                Base::Hour => mantissa *= 3600f64.powi(power),
                _ => {}
            }
        }

        if !seen_atom {
            return Err(unrecognized());
        }

        let dimension = powers.dimension().ok_or_else(unrecognized)?;
        Ok(CompoundUnit {
            dimension,
            mantissa,
            exponent,
        })
    }
}

/// Largest power accepted on a single atom.
const MAX_POWER: i32 = 3;

/// Split an atom such as `cm-2` into `(prefix exponent, base, power)`.
fn parse_atom(atom: &str) -> Option<(i32, Base, i32)> {
    let digits_start = atom
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);

    let (symbol, power) = match digits_start {
        Some(start) => {
            let (head, digits) = atom.split_at(start);
            let magnitude: i32 = digits.parse().ok()?;
            if magnitude > MAX_POWER {
                return None;
            }
            match head.strip_suffix('-') {
                Some(head) => (head, -magnitude),
                None => (head.strip_suffix('+').unwrap_or(head), magnitude),
            }
        }
        None => (atom, 1),
    };

    if symbol.is_empty() || power == 0 {
        return None;
    }

    if let Some(base) = Base::from_symbol(symbol) {
        return Some((0, base, power));
    }

    SI_PREFIXES.iter().find_map(|&(prefix, exp)| {
        let rest = symbol.strip_prefix(prefix)?;
        let base = Base::from_symbol(rest)?;
        base.accepts_prefix().then_some((exp, base, power))
    })
}
