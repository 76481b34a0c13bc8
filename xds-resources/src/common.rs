//! Shared helpers for validating and normalizing numeric wire fields.
//!
//! Several resource types carry fractional percentages and protobuf
//! durations; they all funnel through these helpers so bounds and rounding
//! behave identically everywhere.

use std::time::Duration;

use envoy_types::pb::envoy::r#type::v3::FractionalPercent;
use envoy_types::pb::envoy::r#type::v3::fractional_percent::DenominatorType;
use envoy_types::pb::google::protobuf::Duration as DurationProto;

use crate::validation::ValidationErrors;

/// Upper bound on `Duration.seconds`, per the protobuf well-known-type
/// definition (10,000 years).
const MAX_DURATION_SECONDS: i64 = 315_576_000_000;

const MAX_NANOS: i32 = 999_999_999;

/// Normalizes a [`FractionalPercent`] to parts per million.
///
/// The numerator is scaled according to the denominator (`HUNDRED` ×10000,
/// `TEN_THOUSAND` ×100, `MILLION` ×1). An unrecognized denominator records an
/// error under a `.denominator` scope and leaves the numerator unscaled. The
/// result is capped at 1,000,000 unconditionally.
pub fn fraction_to_parts_per_million(
    fraction: &FractionalPercent,
    errors: &mut ValidationErrors,
) -> u32 {
    let multiplier: u64 = {
        let mut errors = errors.scoped(".denominator");
        match DenominatorType::try_from(fraction.denominator) {
            Ok(DenominatorType::Hundred) => 10_000,
            Ok(DenominatorType::TenThousand) => 100,
            Ok(DenominatorType::Million) => 1,
            Err(_) => {
                errors.add_error("unknown denominator type");
                1
            }
        }
    };
    (u64::from(fraction.numerator) * multiplier).min(1_000_000) as u32
}

/// Validates a protobuf [`Duration`](DurationProto) and converts it to a
/// millisecond-resolution [`Duration`].
///
/// Seconds must be in `[0, 315576000000]` and nanos in `[0, 999999999]`; each
/// out-of-range field records its own error (both can fire for one input).
/// Nanos are rounded to the nearest millisecond.
pub fn parse_duration(proto: &DurationProto, errors: &mut ValidationErrors) -> Duration {
    if proto.seconds < 0 || proto.seconds > MAX_DURATION_SECONDS {
        let mut errors = errors.scoped(".seconds");
        errors.add_error("value must be in the range [0, 315576000000]");
    }
    if proto.nanos < 0 || proto.nanos > MAX_NANOS {
        let mut errors = errors.scoped(".nanos");
        errors.add_error("value must be in the range [0, 999999999]");
    }
    let seconds = proto.seconds.clamp(0, MAX_DURATION_SECONDS) as u64;
    let millis = (proto.nanos.clamp(0, MAX_NANOS) as u64 + 500_000) / 1_000_000;
    Duration::from_millis(seconds * 1000 + millis)
}

/// Checks a raw percentage denominator against the allowed set.
///
/// Unlike [`fraction_to_parts_per_million`], no normalization or capping is
/// applied; configs that carry raw numerator/denominator pairs store them as
/// given and only the denominator value is restricted.
pub fn validate_percentage_denominator(denominator: u32, errors: &mut ValidationErrors) {
    if !matches!(denominator, 100 | 10_000 | 1_000_000) {
        errors.add_error("Denominator can only be one of 100, 10000, 1000000");
    }
}
