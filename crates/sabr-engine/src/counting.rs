// Counting-stat snapshots: the primitive, context-free inputs to every
// derivation. Owned by the caller and never mutated by the engine.

use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::AddAssign;

use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// Batting
// ---------------------------------------------------------------------------

/// Batting tallies for one player over one context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattingLine {
    pub pa: u32,
    pub ab: u32,
    pub h: u32,
    pub doubles: u32,
    pub triples: u32,
    pub hr: u32,
    pub bb: u32,
    pub ibb: u32,
    pub hbp: u32,
    pub sf: u32,
    pub sh: u32,
    pub so: u32,
    pub sb: u32,
    pub cs: u32,
}

impl BattingLine {
    /// Check the structural invariants of a batting line.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(EngineError::InvalidContext(msg));
        if self.ab > self.pa {
            return fail(format!("AB ({}) exceeds PA ({})", self.ab, self.pa));
        }
        if self.h > self.ab {
            return fail(format!("H ({}) exceeds AB ({})", self.h, self.ab));
        }
        if self.extra_base_hits() > self.h as u64 {
            return fail(format!(
                "extra-base hits ({}) exceed H ({})",
                self.extra_base_hits(),
                self.h
            ));
        }
        if self.ibb > self.bb {
            return fail(format!("IBB ({}) exceeds BB ({})", self.ibb, self.bb));
        }
        if self.so > self.ab {
            return fail(format!("SO ({}) exceeds AB ({})", self.so, self.ab));
        }
        let accounted = self.ab as u64 + self.bb as u64 + self.hbp as u64 + self.sf as u64 + self.sh as u64;
        if accounted > self.pa as u64 {
            return fail(format!(
                "AB+BB+HBP+SF+SH ({accounted}) exceeds PA ({})",
                self.pa
            ));
        }
        Ok(())
    }

    pub fn extra_base_hits(&self) -> u64 {
        self.doubles as u64 + self.triples as u64 + self.hr as u64
    }

    /// Singles are derived; saturates at zero for lines that fail `validate`.
    pub fn singles(&self) -> u32 {
        (self.h as u64).saturating_sub(self.extra_base_hits()) as u32
    }

    pub fn total_bases(&self) -> u64 {
        self.singles() as u64 + 2 * self.doubles as u64 + 3 * self.triples as u64 + 4 * self.hr as u64
    }

    /// Unintentional walks.
    pub fn ubb(&self) -> u32 {
        self.bb.saturating_sub(self.ibb)
    }
}

impl AddAssign for BattingLine {
    fn add_assign(&mut self, o: Self) {
        self.pa += o.pa;
        self.ab += o.ab;
        self.h += o.h;
        self.doubles += o.doubles;
        self.triples += o.triples;
        self.hr += o.hr;
        self.bb += o.bb;
        self.ibb += o.ibb;
        self.hbp += o.hbp;
        self.sf += o.sf;
        self.sh += o.sh;
        self.so += o.so;
        self.sb += o.sb;
        self.cs += o.cs;
    }
}

impl Sum for BattingLine {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |mut acc, line| {
            acc += line;
            acc
        })
    }
}

// ---------------------------------------------------------------------------
// Pitching
// ---------------------------------------------------------------------------

/// Pitching tallies. Innings are carried as outs recorded so thirds of an
/// inning stay exact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchingLine {
    pub outs: u32,
    pub bf: u32,
    pub h: u32,
    pub r: u32,
    pub er: u32,
    pub hr: u32,
    pub bb: u32,
    pub ibb: u32,
    pub hbp: u32,
    pub so: u32,
    /// Fly balls allowed; only needed for xFIP.
    pub fb: Option<u32>,
}

impl PitchingLine {
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(EngineError::InvalidContext(msg));
        if self.er > self.r {
            return fail(format!("ER ({}) exceeds R ({})", self.er, self.r));
        }
        if self.hr > self.h {
            return fail(format!("HR ({}) exceeds H ({})", self.hr, self.h));
        }
        if self.ibb > self.bb {
            return fail(format!("IBB ({}) exceeds BB ({})", self.ibb, self.bb));
        }
        let reached = self.h as u64 + self.bb as u64 + self.hbp as u64 + self.so as u64;
        if self.bf > 0 && reached > self.bf as u64 {
            return fail(format!("H+BB+HBP+SO ({reached}) exceeds BF ({})", self.bf));
        }
        Ok(())
    }

    /// Innings pitched as a real number (outs / 3).
    pub fn innings(&self) -> f64 {
        self.outs as f64 / 3.0
    }

    /// Innings in box-score notation: 20 outs -> "6.2".
    pub fn ip_display(&self) -> String {
        format_innings(self.outs)
    }
}

/// Format an out count in box-score innings notation.
pub fn format_innings(outs: u32) -> String {
    format!("{}.{}", outs / 3, outs % 3)
}

impl AddAssign for PitchingLine {
    fn add_assign(&mut self, o: Self) {
        self.outs += o.outs;
        self.bf += o.bf;
        self.h += o.h;
        self.r += o.r;
        self.er += o.er;
        self.hr += o.hr;
        self.bb += o.bb;
        self.ibb += o.ibb;
        self.hbp += o.hbp;
        self.so += o.so;
        // Fly balls only survive aggregation when every part reports them.
        self.fb = match (self.fb, o.fb) {
            (Some(a), Some(b)) => Some(a + b),
            _ => None,
        };
    }
}

impl Sum for PitchingLine {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        let mut first = true;
        iter.fold(Self::default(), |mut acc, line| {
            if first {
                acc.fb = Some(0);
                first = false;
            }
            acc += line;
            acc
        })
    }
}

/// Safe ratio used by every rate stat: zero when the denominator is zero.
pub(crate) fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}
