//! Gate JSON wire format.
//!
//! Key order on output is `name, customName, x, y, points, children,
//! plotKey, xTransform, yTransform`, followed by `gatingMethod` only for
//! constrained gates. Input is lenient: every field may be missing, the
//! legacy `ployKey` spelling is accepted (`plotKey` wins when both
//! appear), and `customName` may be a number
//! or a boolean.

#[cfg(test)]
#[path = "wire_test.rs"]
mod wire_test;

use canvas::coords::Point;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::gate::{Gate, GatingMethod};
use crate::transform::Transform;

/// One gate and its subtree as stored remotely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "LenientGateJson")]
pub struct GateJson {
    pub name: String,
    #[serde(serialize_with = "flag_as_number")]
    pub custom_name: bool,
    pub x: String,
    pub y: String,
    pub points: Vec<Point>,
    pub children: Vec<GateJson>,
    pub plot_key: String,
    pub x_transform: Transform,
    pub y_transform: Transform,
    #[serde(skip_serializing_if = "GatingMethod::is_manual")]
    pub gating_method: GatingMethod,
}

/// Input side of [`GateJson`]. Both plot key spellings are read separately
/// so a gate carrying both still parses; `plotKey` wins.
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LenientGateJson {
    #[serde(deserialize_with = "null_as_default")]
    name: String,
    #[serde(deserialize_with = "flag_from_number_or_bool")]
    custom_name: bool,
    #[serde(deserialize_with = "null_as_default")]
    x: String,
    #[serde(deserialize_with = "null_as_default")]
    y: String,
    #[serde(deserialize_with = "null_as_default")]
    points: Vec<Point>,
    #[serde(deserialize_with = "null_as_default")]
    children: Vec<GateJson>,
    #[serde(deserialize_with = "null_as_default")]
    plot_key: String,
    #[serde(rename = "ployKey", deserialize_with = "null_as_default")]
    ploy_key: String,
    #[serde(deserialize_with = "null_as_default")]
    x_transform: Transform,
    #[serde(deserialize_with = "null_as_default")]
    y_transform: Transform,
    #[serde(deserialize_with = "null_as_default")]
    gating_method: GatingMethod,
}

impl From<LenientGateJson> for GateJson {
    fn from(raw: LenientGateJson) -> Self {
        Self {
            name: raw.name,
            custom_name: raw.custom_name,
            x: raw.x,
            y: raw.y,
            points: raw.points,
            children: raw.children,
            plot_key: if raw.plot_key.is_empty() { raw.ploy_key } else { raw.plot_key },
            x_transform: raw.x_transform,
            y_transform: raw.y_transform,
            gating_method: raw.gating_method,
        }
    }
}

impl GateJson {
    /// Wire form of a single gate; `children` is left for the caller to fill.
    #[must_use]
    pub fn from_gate(gate: &Gate) -> Self {
        Self {
            name: gate.name.clone(),
            custom_name: gate.custom_name,
            x: gate.x.clone(),
            y: gate.y.clone(),
            points: gate.points.clone(),
            children: Vec::new(),
            plot_key: gate.plot_key.clone(),
            x_transform: gate.x_transform.clone(),
            y_transform: gate.y_transform.clone(),
            gating_method: gate.gating_method,
        }
    }

    /// Split into the gate itself and its serialized children.
    #[must_use]
    pub fn into_gate(self) -> (Gate, Vec<GateJson>) {
        let gate = Gate {
            name: self.name,
            custom_name: self.custom_name,
            x: self.x,
            y: self.y,
            points: self.points,
            plot_key: self.plot_key,
            x_transform: self.x_transform,
            y_transform: self.y_transform,
            gating_method: self.gating_method,
        };
        (gate, self.children)
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn flag_as_number<S: Serializer>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*flag))
}

fn flag_from_number_or_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Number(f64),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Number(n)) => n != 0.0,
        None => false,
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
