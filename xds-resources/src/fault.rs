//! Fault-injection method configuration.
//!
//! The fault-injection HTTP filter's per-method settings are delivered as
//! service-config JSON. Parsing follows the same discipline as the wire
//! resources: every violation is recorded with its field path and reported in
//! one aggregated status.

use std::time::Duration;

use serde_json::{Map, Value};
use tonic::{Code, Status};

use crate::common::{parse_duration, validate_percentage_denominator};
use crate::validation::ValidationErrors;
use envoy_types::pb::google::protobuf::Duration as DurationProto;

/// One fault-injection policy: abort and/or delay a configured fraction of
/// requests, with optional per-request header overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultInjectionPolicy {
    pub abort_code: Code,
    pub abort_message: String,
    pub abort_code_header: String,
    pub abort_percentage_header: String,
    pub abort_percentage_numerator: u32,
    /// Raw denominator as configured; restricted to 100, 10000, or 1000000.
    pub abort_percentage_denominator: u32,
    pub delay: Duration,
    pub delay_header: String,
    pub delay_percentage_header: String,
    pub delay_percentage_numerator: u32,
    /// Raw denominator as configured; restricted to 100, 10000, or 1000000.
    pub delay_percentage_denominator: u32,
    /// Maximum number of concurrently active faults; 0 means unlimited.
    pub max_faults: u32,
}

impl Default for FaultInjectionPolicy {
    fn default() -> Self {
        Self {
            abort_code: Code::Ok,
            abort_message: "Fault injected".to_string(),
            abort_code_header: String::new(),
            abort_percentage_header: String::new(),
            abort_percentage_numerator: 0,
            abort_percentage_denominator: 100,
            delay: Duration::ZERO,
            delay_header: String::new(),
            delay_percentage_header: String::new(),
            delay_percentage_numerator: 0,
            delay_percentage_denominator: 100,
            max_faults: 0,
        }
    }
}

impl FaultInjectionPolicy {
    fn from_json(object: &Map<String, Value>, errors: &mut ValidationErrors) -> Self {
        let mut policy = Self::default();
        // abortCode
        {
            let mut errors = errors.scoped(".abortCode");
            if let Some(code) = string_field(object, "abortCode", &mut errors) {
                match status_code_from_string(&code) {
                    Some(code) => policy.abort_code = code,
                    None => errors.add_error("failed to parse status code"),
                }
            }
        }
        // abortMessage
        {
            let mut errors = errors.scoped(".abortMessage");
            if let Some(message) = string_field(object, "abortMessage", &mut errors) {
                policy.abort_message = message;
            }
        }
        // abortCodeHeader
        {
            let mut errors = errors.scoped(".abortCodeHeader");
            if let Some(header) = string_field(object, "abortCodeHeader", &mut errors) {
                policy.abort_code_header = header;
            }
        }
        // abortPercentageHeader
        {
            let mut errors = errors.scoped(".abortPercentageHeader");
            if let Some(header) = string_field(object, "abortPercentageHeader", &mut errors) {
                policy.abort_percentage_header = header;
            }
        }
        // abortPercentageNumerator
        {
            let mut errors = errors.scoped(".abortPercentageNumerator");
            if let Some(numerator) = u32_field(object, "abortPercentageNumerator", &mut errors) {
                policy.abort_percentage_numerator = numerator;
            }
        }
        // abortPercentageDenominator
        {
            let mut errors = errors.scoped(".abortPercentageDenominator");
            if let Some(denominator) = u32_field(object, "abortPercentageDenominator", &mut errors)
            {
                policy.abort_percentage_denominator = denominator;
                validate_percentage_denominator(denominator, &mut errors);
            }
        }
        // delay
        if let Some(value) = object.get("delay") {
            let mut errors = errors.scoped(".delay");
            policy.delay = parse_json_duration(value, &mut errors);
        }
        // delayHeader
        {
            let mut errors = errors.scoped(".delayHeader");
            if let Some(header) = string_field(object, "delayHeader", &mut errors) {
                policy.delay_header = header;
            }
        }
        // delayPercentageHeader
        {
            let mut errors = errors.scoped(".delayPercentageHeader");
            if let Some(header) = string_field(object, "delayPercentageHeader", &mut errors) {
                policy.delay_percentage_header = header;
            }
        }
        // delayPercentageNumerator
        {
            let mut errors = errors.scoped(".delayPercentageNumerator");
            if let Some(numerator) = u32_field(object, "delayPercentageNumerator", &mut errors) {
                policy.delay_percentage_numerator = numerator;
            }
        }
        // delayPercentageDenominator
        {
            let mut errors = errors.scoped(".delayPercentageDenominator");
            if let Some(denominator) = u32_field(object, "delayPercentageDenominator", &mut errors)
            {
                policy.delay_percentage_denominator = denominator;
                validate_percentage_denominator(denominator, &mut errors);
            }
        }
        // maxFaults
        {
            let mut errors = errors.scoped(".maxFaults");
            if let Some(max_faults) = u32_field(object, "maxFaults", &mut errors) {
                policy.max_faults = max_faults;
            }
        }
        policy
    }
}

/// The fault-injection policies configured for one method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultInjectionMethodConfig {
    pub policies: Vec<FaultInjectionPolicy>,
}

impl FaultInjectionMethodConfig {
    /// Parses the `faultInjectionPolicy` field of a method config.
    ///
    /// A missing field yields an empty config. One malformed policy entry
    /// does not stop its siblings from being parsed, but any recorded error
    /// fails the config as a whole.
    pub fn from_json(json: &Value) -> Result<Self, Status> {
        let mut errors = ValidationErrors::new();
        let mut policies = Vec::new();
        {
            let mut errors = errors.scoped("faultInjectionPolicy");
            match json.get("faultInjectionPolicy") {
                None => {}
                Some(Value::Array(entries)) => {
                    for (i, entry) in entries.iter().enumerate() {
                        let mut errors = errors.scoped(format!("[{i}]"));
                        match entry.as_object() {
                            Some(object) => {
                                policies.push(FaultInjectionPolicy::from_json(object, &mut errors));
                            }
                            None => errors.add_error("is not an object"),
                        }
                    }
                }
                Some(_) => errors.add_error("is not an array"),
            }
        }
        if !errors.ok() {
            return Err(errors.status("errors validating fault injection method config"));
        }
        Ok(Self { policies })
    }
}

fn string_field(
    object: &Map<String, Value>,
    key: &str,
    errors: &mut ValidationErrors,
) -> Option<String> {
    let value = object.get(key)?;
    match value.as_str() {
        Some(text) => Some(text.to_string()),
        None => {
            errors.add_error("is not a string");
            None
        }
    }
}

fn u32_field(object: &Map<String, Value>, key: &str, errors: &mut ValidationErrors) -> Option<u32> {
    let value = object.get(key)?;
    match value.as_u64().and_then(|number| u32::try_from(number).ok()) {
        Some(number) => Some(number),
        None => {
            errors.add_error("failed to parse non-negative number");
            None
        }
    }
}

/// Parses a service-config duration string (`"1.5s"`) and bounds-checks it
/// the same way wire durations are checked.
fn parse_json_duration(value: &Value, errors: &mut ValidationErrors) -> Duration {
    const MALFORMED: &str = "is not a duration string of the form \"<seconds>.<nanos>s\"";
    let Some(text) = value.as_str() else {
        errors.add_error(MALFORMED);
        return Duration::ZERO;
    };
    let Some(text) = text.strip_suffix('s') else {
        errors.add_error(MALFORMED);
        return Duration::ZERO;
    };
    if text.is_empty() {
        errors.add_error(MALFORMED);
        return Duration::ZERO;
    }
    let (seconds_text, fraction_text) = match text.split_once('.') {
        Some((seconds, fraction)) => (seconds, Some(fraction)),
        None => (text, None),
    };
    let seconds = if seconds_text.is_empty() {
        Some(0)
    } else {
        parse_nonnegative(seconds_text)
    };
    let nanos = match fraction_text {
        None => Some(0),
        Some(fraction) if fraction.is_empty() || fraction.len() > 9 => None,
        Some(fraction) => {
            parse_nonnegative(fraction).map(|n| n * 10i64.pow(9 - fraction.len() as u32))
        }
    };
    let (Some(seconds), Some(nanos)) = (seconds, nanos) else {
        errors.add_error(MALFORMED);
        return Duration::ZERO;
    };
    parse_duration(
        &DurationProto {
            seconds,
            nanos: nanos as i32,
        },
        errors,
    )
}

fn parse_nonnegative(text: &str) -> Option<i64> {
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        text.parse().ok()
    } else {
        None
    }
}

fn status_code_from_string(name: &str) -> Option<Code> {
    match name {
        "OK" => Some(Code::Ok),
        "CANCELLED" => Some(Code::Cancelled),
        "UNKNOWN" => Some(Code::Unknown),
        "INVALID_ARGUMENT" => Some(Code::InvalidArgument),
        "DEADLINE_EXCEEDED" => Some(Code::DeadlineExceeded),
        "NOT_FOUND" => Some(Code::NotFound),
        "ALREADY_EXISTS" => Some(Code::AlreadyExists),
        "PERMISSION_DENIED" => Some(Code::PermissionDenied),
        "RESOURCE_EXHAUSTED" => Some(Code::ResourceExhausted),
        "FAILED_PRECONDITION" => Some(Code::FailedPrecondition),
        "ABORTED" => Some(Code::Aborted),
        "OUT_OF_RANGE" => Some(Code::OutOfRange),
        "UNIMPLEMENTED" => Some(Code::Unimplemented),
        "INTERNAL" => Some(Code::Internal),
        "UNAVAILABLE" => Some(Code::Unavailable),
        "DATA_LOSS" => Some(Code::DataLoss),
        "UNAUTHENTICATED" => Some(Code::Unauthenticated),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_field_yields_empty_config() {
        let config = FaultInjectionMethodConfig::from_json(&json!({})).unwrap();
        assert!(config.policies.is_empty());
    }

    #[test]
    fn test_full_policy() {
        let config = FaultInjectionMethodConfig::from_json(&json!({
            "faultInjectionPolicy": [{
                "abortCode": "UNAVAILABLE",
                "abortMessage": "load shed",
                "abortCodeHeader": "x-envoy-fault-abort-grpc-request",
                "abortPercentageHeader": "x-envoy-fault-abort-percentage",
                "abortPercentageNumerator": 20,
                "abortPercentageDenominator": 100,
                "delay": "1.5s",
                "delayHeader": "x-envoy-fault-delay-request",
                "delayPercentageHeader": "x-envoy-fault-delay-request-percentage",
                "delayPercentageNumerator": 500,
                "delayPercentageDenominator": 10000,
                "maxFaults": 16
            }]
        }))
        .unwrap();
        assert_eq!(config.policies.len(), 1);
        let policy = &config.policies[0];
        assert_eq!(policy.abort_code, Code::Unavailable);
        assert_eq!(policy.abort_message, "load shed");
        assert_eq!(policy.abort_code_header, "x-envoy-fault-abort-grpc-request");
        assert_eq!(
            policy.abort_percentage_header,
            "x-envoy-fault-abort-percentage"
        );
        assert_eq!(policy.abort_percentage_numerator, 20);
        assert_eq!(policy.abort_percentage_denominator, 100);
        assert_eq!(policy.delay, Duration::from_millis(1500));
        assert_eq!(policy.delay_header, "x-envoy-fault-delay-request");
        assert_eq!(policy.delay_percentage_numerator, 500);
        assert_eq!(policy.delay_percentage_denominator, 10_000);
        assert_eq!(policy.max_faults, 16);
    }

    #[test]
    fn test_defaults() {
        let config = FaultInjectionMethodConfig::from_json(&json!({
            "faultInjectionPolicy": [{}]
        }))
        .unwrap();
        let policy = &config.policies[0];
        assert_eq!(policy.abort_code, Code::Ok);
        assert_eq!(policy.abort_message, "Fault injected");
        assert_eq!(policy.abort_percentage_denominator, 100);
        assert_eq!(policy.delay, Duration::ZERO);
        assert_eq!(policy.delay_percentage_denominator, 100);
        assert_eq!(policy.max_faults, 0);
    }

    #[test]
    fn test_denominator_outside_allow_list() {
        let status = FaultInjectionMethodConfig::from_json(&json!({
            "faultInjectionPolicy": [{"abortPercentageDenominator": 1000}]
        }))
        .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(
            status.message(),
            "errors validating fault injection method config: [\
             field:faultInjectionPolicy[0].abortPercentageDenominator \
             error:Denominator can only be one of 100, 10000, 1000000]",
        );
    }

    #[test]
    fn test_unparseable_abort_code() {
        let status = FaultInjectionMethodConfig::from_json(&json!({
            "faultInjectionPolicy": [{"abortCode": "NOT_A_CODE"}]
        }))
        .unwrap_err();
        assert_eq!(
            status.message(),
            "errors validating fault injection method config: [\
             field:faultInjectionPolicy[0].abortCode error:failed to parse status code]",
        );
    }

    #[test]
    fn test_wrong_field_types() {
        let status = FaultInjectionMethodConfig::from_json(&json!({
            "faultInjectionPolicy": [{
                "abortMessage": 5,
                "maxFaults": -1
            }]
        }))
        .unwrap_err();
        assert_eq!(
            status.message(),
            "errors validating fault injection method config: [\
             field:faultInjectionPolicy[0].abortMessage error:is not a string; \
             field:faultInjectionPolicy[0].maxFaults \
             error:failed to parse non-negative number]",
        );
    }

    #[test]
    fn test_policy_entry_not_an_object() {
        let status = FaultInjectionMethodConfig::from_json(&json!({
            "faultInjectionPolicy": ["nope"]
        }))
        .unwrap_err();
        assert_eq!(
            status.message(),
            "errors validating fault injection method config: [\
             field:faultInjectionPolicy[0] error:is not an object]",
        );
    }

    #[test]
    fn test_policy_field_not_an_array() {
        let status = FaultInjectionMethodConfig::from_json(&json!({
            "faultInjectionPolicy": {}
        }))
        .unwrap_err();
        assert_eq!(
            status.message(),
            "errors validating fault injection method config: [\
             field:faultInjectionPolicy error:is not an array]",
        );
    }

    #[test]
    fn test_negative_delay_is_malformed() {
        let status = FaultInjectionMethodConfig::from_json(&json!({
            "faultInjectionPolicy": [{"delay": "-1s"}]
        }))
        .unwrap_err();
        assert_eq!(
            status.message(),
            "errors validating fault injection method config: [\
             field:faultInjectionPolicy[0].delay \
             error:is not a duration string of the form \"<seconds>.<nanos>s\"]",
        );
    }

    #[test]
    fn test_delay_out_of_range() {
        let status = FaultInjectionMethodConfig::from_json(&json!({
            "faultInjectionPolicy": [{"delay": "999999999999s"}]
        }))
        .unwrap_err();
        assert_eq!(
            status.message(),
            "errors validating fault injection method config: [\
             field:faultInjectionPolicy[0].delay.seconds \
             error:value must be in the range [0, 315576000000]]",
        );
    }

    #[test]
    fn test_fractional_delay() {
        let config = FaultInjectionMethodConfig::from_json(&json!({
            "faultInjectionPolicy": [{"delay": ".25s"}]
        }))
        .unwrap();
        assert_eq!(config.policies[0].delay, Duration::from_millis(250));
    }

    #[test]
    fn test_broken_entry_does_not_void_siblings() {
        let status = FaultInjectionMethodConfig::from_json(&json!({
            "faultInjectionPolicy": [
                {"abortCode": "NOT_A_CODE"},
                {"abortCode": "UNAVAILABLE"}
            ]
        }))
        .unwrap_err();
        // Only the first entry is reported; the second parsed cleanly, but
        // the config still fails as a whole.
        assert_eq!(
            status.message(),
            "errors validating fault injection method config: [\
             field:faultInjectionPolicy[0].abortCode error:failed to parse status code]",
        );
    }

    #[test]
    fn test_status_code_round_trip() {
        for (name, code) in [
            ("OK", Code::Ok),
            ("ABORTED", Code::Aborted),
            ("DATA_LOSS", Code::DataLoss),
            ("UNAUTHENTICATED", Code::Unauthenticated),
        ] {
            assert_eq!(status_code_from_string(name), Some(code));
        }
        assert_eq!(status_code_from_string("ok"), None);
    }
}
