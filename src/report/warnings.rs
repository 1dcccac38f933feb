use crate::script::classify::ScriptType;

use super::types::{VoutReport, Warning, WarningCode};

/// Fees above either bound are flagged as HIGH_FEE.
const HIGH_FEE_SATS: u64 = 1_000_000;
const HIGH_FEE_RATE: f64 = 200.0;

/// Outputs below the relay dust limit (non-OP_RETURN only).
const DUST_SATS: u64 = 546;

/// Evaluate the warning conditions over an assembled transaction. Each
/// code is emitted at most once.
pub fn detect_warnings(
    fee_sats: u64,
    fee_rate_sat_vb: f64,
    vout: &[VoutReport],
    rbf_signaling: bool,
) -> Vec<Warning> {
    let mut warnings = Vec::new();

    if fee_sats > HIGH_FEE_SATS || fee_rate_sat_vb > HIGH_FEE_RATE {
        warnings.push(Warning {
            code: WarningCode::HighFee,
        });
    }

    if vout
        .iter()
        .any(|o| o.script_type != ScriptType::OpReturn && o.value_sats < DUST_SATS)
    {
        warnings.push(Warning {
            code: WarningCode::DustOutput,
        });
    }

    if vout.iter().any(|o| o.script_type == ScriptType::Unknown) {
        warnings.push(Warning {
            code: WarningCode::UnknownOutputScript,
        });
    }

    if rbf_signaling {
        warnings.push(Warning {
            code: WarningCode::RbfSignaling,
        });
    }

    warnings
}
