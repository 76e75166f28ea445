//! Axis transforms and their parameter-range validation.
//!
//! A [`Transform`] is owned by exactly one gate axis. Validation is pure:
//! it reports violations and leaves the decision to apply or discard an edit
//! to the caller.

#[cfg(test)]
#[path = "transform_test.rs"]
mod transform_test;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// =============================================================================
// TYPES
// =============================================================================

/// Axis-scaling function family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformType {
    /// No scaling. Unknown or missing wire names also read as this.
    #[default]
    None,
    Linear,
    Log,
    Logicle,
    /// A named transform defined by the remote service.
    Predefined,
}

impl TransformType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Linear => "linear",
            Self::Log => "log",
            Self::Logicle => "logicle",
            Self::Predefined => "predefined",
        }
    }

    /// Parse a wire name; anything unrecognized is [`TransformType::None`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "linear" => Self::Linear,
            "log" => Self::Log,
            "logicle" => Self::Logicle,
            "predefined" => Self::Predefined,
            _ => Self::None,
        }
    }
}

impl Serialize for TransformType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TransformType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map_or(Self::None, |r| Self::parse(&r)))
    }
}

/// A parameterized axis transform. Missing wire fields default to the
/// neutral `none` transform.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transform {
    pub transform_type: TransformType,
    pub a: f64,
    pub t: f64,
    pub m: f64,
    pub w: f64,
    pub predefined_name: String,
}

impl Transform {
    /// The neutral transform used wherever no other default applies.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn predefined(name: impl Into<String>) -> Self {
        Self { transform_type: TransformType::Predefined, predefined_name: name.into(), ..Self::default() }
    }

    /// Violations of this transform's parameter ranges; empty when valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        validate_transform(self, &mut errors);
        errors
    }

    /// When switching to a predefined transform whose name is not offered,
    /// fall back to the first offered name.
    #[must_use]
    pub fn with_predefined_fallback(mut self, offered: &[String]) -> Self {
        if self.transform_type == TransformType::Predefined && !offered.contains(&self.predefined_name) {
            if let Some(first) = offered.first() {
                self.predefined_name.clone_from(first);
            }
        }
        self
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

pub const T_POSITIVE: &str = "T must be positive.";
pub const A_NON_NEGATIVE: &str = "A must be non-negative.";
pub const A_AT_MOST_T: &str = "A must be less than or equal to T.";
pub const M_POSITIVE: &str = "M must be positive.";
pub const W_RANGE: &str = "W must be between 0 and M/2.";
pub const A_LOGICLE_RANGE: &str = "A must be between -W and M-2W.";
pub const PREDEFINED_NAME_REQUIRED: &str = "Predefined transform name must not be empty.";

/// Append human-readable violations of `t`'s parameter ranges to `errors`
/// and return whether `errors` is empty afterwards.
///
/// Range checks that depend on another parameter run only once that
/// parameter is itself valid, so one bad value yields one message.
pub fn validate_transform(t: &Transform, errors: &mut Vec<String>) -> bool {
    let mut fail = |msg: &str| errors.push(msg.to_string());

    match t.transform_type {
        TransformType::None => {}
        TransformType::Linear => {
            if t.t <= 0.0 {
                fail(T_POSITIVE);
            }
            if t.a < 0.0 {
                fail(A_NON_NEGATIVE);
            } else if t.t > 0.0 && t.a > t.t {
                fail(A_AT_MOST_T);
            }
        }
        TransformType::Log => {
            if t.t <= 0.0 {
                fail(T_POSITIVE);
            }
            if t.m <= 0.0 {
                fail(M_POSITIVE);
            }
        }
        TransformType::Logicle => {
            if t.t <= 0.0 {
                fail(T_POSITIVE);
            }
            if t.m <= 0.0 {
                fail(M_POSITIVE);
            } else if t.w < 0.0 || t.w > t.m / 2.0 {
                fail(W_RANGE);
            } else if t.a < -t.w || t.a > t.m - 2.0 * t.w {
                fail(A_LOGICLE_RANGE);
            }
        }
        TransformType::Predefined => {
            if t.predefined_name.trim().is_empty() {
                fail(PREDEFINED_NAME_REQUIRED);
            }
        }
    }

    errors.is_empty()
}
