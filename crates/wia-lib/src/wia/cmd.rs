//! Coronary microvascular dysfunction (CMD) classification from invasive indices.

use serde::{Deserialize, Serialize};

/// Coronary flow reserve below this is abnormal.
pub const CFR_THRESHOLD: f64 = 2.5;
/// Hyperaemic microvascular resistance below this is "low" (functional CMD).
pub const HMR_THRESHOLD: f64 = 2.5;
/// Flow increase with acetylcholine (%) below this is endothelial dysfunction.
pub const ACH_THRESHOLD: f64 = 50.0;

/// Externally measured indices; any may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CmdInputs {
    pub cfr: Option<f64>,
    pub hmr: Option<f64>,
    pub ach_percent: Option<f64>,
}

/// Outcome of the decision table; `None` wherever the inputs cannot decide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmdStatus {
    /// Any form of CMD.
    pub cmd: Option<bool>,
    /// Low CFR with normal or high HMR.
    pub structural: Option<bool>,
    /// Low CFR with low HMR.
    pub functional: Option<bool>,
    /// Blunted response to acetylcholine.
    pub endothelial: Option<bool>,
    /// `structural`, nulled when endothelial dysfunction is also present.
    pub structural_only: Option<bool>,
    /// `functional`, nulled when endothelial dysfunction is also present.
    pub functional_only: Option<bool>,
    /// `endothelial`, nulled when structural or functional CMD is also present.
    pub endothelial_only: Option<bool>,
}

impl CmdInputs {
    pub fn classify(&self) -> CmdStatus {
        let low_cfr = self.cfr.map(|v| v < CFR_THRESHOLD);
        let low_hmr = self.hmr.map(|v| v < HMR_THRESHOLD);
        let (structural, functional) = match (low_cfr, low_hmr) {
            (Some(false), _) => (Some(false), Some(false)),
            (Some(true), Some(low)) => (Some(!low), Some(low)),
            _ => (None, None),
        };
        let endothelial = self.ach_percent.map(|v| v < ACH_THRESHOLD);

        let subtypes = [structural, functional, endothelial];
        let cmd = if subtypes.contains(&Some(true)) {
            Some(true)
        } else if subtypes.iter().all(|s| *s == Some(false)) {
            Some(false)
        } else {
            None
        };

        let vascular = structural == Some(true) || functional == Some(true);
        let nulled_by = |value: Option<bool>, other: bool| {
            if value == Some(true) && other {
                None
            } else {
                value
            }
        };
        CmdStatus {
            cmd,
            structural,
            functional,
            endothelial,
            structural_only: nulled_by(structural, endothelial == Some(true)),
            functional_only: nulled_by(functional, endothelial == Some(true)),
            endothelial_only: nulled_by(endothelial, vascular),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(cfr: Option<f64>, hmr: Option<f64>, ach: Option<f64>) -> CmdInputs {
        CmdInputs {
            cfr,
            hmr,
            ach_percent: ach,
        }
    }

    #[test]
    fn structural_and_functional_split_on_hmr() {
        let s = inputs(Some(2.0), Some(3.0), Some(80.0)).classify();
        assert_eq!(s.structural, Some(true));
        assert_eq!(s.functional, Some(false));
        assert_eq!(s.cmd, Some(true));
        let f = inputs(Some(2.0), Some(1.9), None).classify();
        assert_eq!(f.functional, Some(true));
        assert_eq!(f.structural, Some(false));
        assert_eq!(f.endothelial, None);
    }

    #[test]
    fn normal_cfr_rules_out_both_regardless_of_hmr() {
        let s = inputs(Some(3.1), None, Some(70.0)).classify();
        assert_eq!((s.structural, s.functional), (Some(false), Some(false)));
        assert_eq!(s.cmd, Some(false));
        assert_eq!(s.endothelial_only, Some(false));
    }

    #[test]
    fn exclusive_variants_null_overlaps() {
        let s = inputs(Some(2.0), Some(3.0), Some(20.0)).classify();
        assert_eq!(s.structural, Some(true));
        assert_eq!(s.endothelial, Some(true));
        assert_eq!(s.structural_only, None);
        assert_eq!(s.endothelial_only, None);
        let e = inputs(Some(3.0), Some(3.0), Some(20.0)).classify();
        assert_eq!(e.endothelial_only, Some(true));
    }

    #[test]
    fn missing_inputs_are_undecided() {
        let s = CmdInputs::default().classify();
        assert_eq!(s, CmdStatus::default());
        let partial = inputs(Some(2.0), None, Some(60.0)).classify();
        assert_eq!(partial.cmd, None);
    }
}
