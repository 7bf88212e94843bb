//! Thermodynamics filter: G+C content, basic Tm (Marmur/Doty or Wallace)
//! and nearest-neighbour base-stacking Tm (SantaLucia 1998).

/// Nearest-neighbour enthalpy table (kcal/mol), indexed `[first][next]`
/// with base order A=0, C=1, G=2, T=3.
const ENTHALPY: [[f64; 4]; 4] = [
    [-7.9, -8.4, -7.8, -7.2],
    [-8.5, -8.0, -10.6, -7.8],
    [-8.2, -10.6, -8.0, -8.4],
    [-7.2, -8.2, -8.5, -7.9],
];

/// Nearest-neighbour entropy table (cal/(mol·K)), same indexing as
/// [`ENTHALPY`].
const ENTROPY: [[f64; 4]; 4] = [
    [-22.2, -22.4, -21.0, -20.4],
    [-22.7, -19.9, -27.2, -21.0],
    [-22.2, -27.2, -19.9, -22.4],
    [-21.3, -22.2, -22.7, -22.2],
];

fn translate(base: u8) -> Option<usize> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' | b'U' | b'u' => Some(3),
        _ => None,
    }
}

/// Result of running a candidate signature through [`Thermodynamics`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermoReport {
    pub gc_percent: f64,
    pub tm_basic: f64,
    pub delta_h: f64,
    pub delta_s: f64,
    pub tm: f64,
}

/// Salt/oligo concentration environment used by the base-stacking Tm
/// calculation. Units follow the original: millimol/liter for salt and
/// magnesium, millimol/liter for the oligo concentration term.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermoEnvironment {
    pub c_salt_mmol: f64,
    pub c_mg_mmol: f64,
    pub c_oligo_mmol: f64,
}

impl Default for ThermoEnvironment {
    fn default() -> Self {
        Self {
            c_salt_mmol: 1000.0,
            c_mg_mmol: 0.0,
            c_oligo_mmol: 0.00001,
        }
    }
}

/// A configured G+C% / Tm range predicate over candidate oligonucleotides.
#[derive(Debug, Clone, Copy)]
pub struct Thermodynamics {
    gc_range: Option<(f64, f64)>,
    tm_range: Option<(f64, f64)>,
    environment: ThermoEnvironment,
}

impl Thermodynamics {
    #[must_use]
    pub fn new(environment: ThermoEnvironment) -> Self {
        Self {
            gc_range: None,
            tm_range: None,
            environment,
        }
    }

    pub fn enable_gc_check(&mut self, min_gc: f64, max_gc: f64) {
        self.gc_range = Some((min_gc, max_gc));
    }

    pub fn disable_gc_check(&mut self) {
        self.gc_range = None;
    }

    pub fn enable_tm_check(&mut self, min_tm: f64, max_tm: f64) {
        self.tm_range = Some((min_tm, max_tm));
    }

    pub fn disable_tm_check(&mut self) {
        self.tm_range = None;
    }

    /// Translate `signature`, dropping bases outside {A,C,G,T,U} (and their
    /// lowercase forms). Returns `None` if nothing remains.
    fn translated(signature: &str) -> Option<Vec<usize>> {
        let codes: Vec<usize> = signature.bytes().filter_map(translate).collect();
        if codes.is_empty() {
            None
        } else {
            Some(codes)
        }
    }

    /// Compute the full thermodynamic report for `signature`. Ambiguous
    /// bases are dropped before computation; returns `None` if none remain.
    #[must_use]
    pub fn process(&self, signature: &str) -> Option<ThermoReport> {
        let codes = Self::translated(signature)?;
        let len = codes.len();

        let mut basecount = [0u32; 4];
        for &c in &codes {
            basecount[c] += 1;
        }
        let gc = f64::from(basecount[1] + basecount[2]) * 100.0 / len as f64;

        let tm_basic = if len < 14 {
            f64::from((basecount[1] + basecount[2]) * 4 + (basecount[0] + basecount[3]) * 2)
        } else {
            64.9 + 41.0 * (f64::from(basecount[1] + basecount[2]) - 16.4) / len as f64
        };

        let env = self.environment;
        let mut delta_h = 0.0;
        let mut delta_s = 0.0;

        let salt_effect = (env.c_salt_mmol / 1000.0) + ((env.c_mg_mmol / 1000.0) * 140.0);
        delta_s += 0.368 * len as f64 * salt_effect.ln();

        let (term_h, term_s) = |base: usize| -> (f64, f64) {
            if base == 1 || base == 2 {
                (0.1, -2.8)
            } else {
                (2.3, 4.1)
            }
        };
        let (h0, s0) = term_h(codes[0]);
        delta_h += h0;
        delta_s += s0;
        let (h1, s1) = term_h(codes[len - 1]);
        delta_h += h1;
        delta_s += s1;

        for w in codes.windows(2) {
            delta_h += ENTHALPY[w[0]][w[1]];
            delta_s += ENTROPY[w[0]][w[1]];
        }

        let tm = (1000.0 * delta_h) / (delta_s + 1.987 * (env.c_oligo_mmol / 4000.0).ln()) - 273.15;

        Some(ThermoReport {
            gc_percent: gc,
            tm_basic,
            delta_h,
            delta_s,
            tm,
        })
    }

    /// `true` if `signature` passes every enabled check.
    #[must_use]
    pub fn accepts(&self, signature: &str) -> bool {
        let Some(report) = self.process(signature) else {
            return false;
        };
        if let Some((min, max)) = self.gc_range {
            if report.gc_percent < min || report.gc_percent > max {
                return false;
            }
        }
        if let Some((min, max)) = self.tm_range {
            if report.tm < min || report.tm > max {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gc_content_of_all_gc_signature_is_100() {
        let t = Thermodynamics::new(ThermoEnvironment::default());
        let report = t.process("GCGCGCGCGCGCGCGC").unwrap();
        assert!((report.gc_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn short_signature_uses_marmur_doty() {
        let t = Thermodynamics::new(ThermoEnvironment::default());
        // 10 nt, 4 G/C, 6 A/T -> 4*4 + 6*2 = 28
        let report = t.process("GCGCAAAAAA").unwrap();
        assert!((report.tm_basic - 28.0).abs() < 1e-9);
    }

    #[test]
    fn long_signature_uses_wallace() {
        let t = Thermodynamics::new(ThermoEnvironment::default());
        let signature = "GCGCGCGCGCGCGCGCGCGC"; // len 20, all G/C
        let report = t.process(signature).unwrap();
        let expected = 64.9 + 41.0 * (20.0 - 16.4) / 20.0;
        assert!((report.tm_basic - expected).abs() < 1e-9);
    }

    /// Nearest-neighbour `tm` for "ACGT" under the default environment,
    /// computed independently against the original's formula (oligo
    /// concentration converted mmol -> mol, then divided by 4).
    #[test]
    fn nearest_neighbour_tm_matches_original_formula() {
        let t = Thermodynamics::new(ThermoEnvironment::default());
        let report = t.process("ACGT").unwrap();
        assert!((report.delta_h - -22.8).abs() < 1e-9);
        assert!((report.delta_s - -63.8).abs() < 1e-9);
        assert!((report.tm - -52.126_516_807_130_74).abs() < 1e-6);
    }

    #[test]
    fn ambiguous_bases_are_dropped_before_computation() {
        let t = Thermodynamics::new(ThermoEnvironment::default());
        let with_n = t.process("ACGNT").unwrap();
        let without_n = t.process("ACGT").unwrap();
        assert_eq!(with_n.gc_percent, without_n.gc_percent);
    }

    #[test]
    fn all_ambiguous_signature_is_rejected() {
        let t = Thermodynamics::new(ThermoEnvironment::default());
        assert!(t.process("NNNN").is_none());
        assert!(!t.accepts("NNNN"));
    }

    #[test]
    fn range_predicate_rejects_outside_bounds() {
        let mut t = Thermodynamics::new(ThermoEnvironment::default());
        t.enable_gc_check(40.0, 60.0);
        assert!(!t.accepts("GCGCGCGCGCGCGCGC")); // 100% GC
        assert!(t.accepts("ACGTACGTACGTACGT")); // 50% GC
    }
}
