//! Gate tree model: gates, axis transforms and the JSON wire format.
//!
//! | Module | Role |
//! |--------|------|
//! | [`gate`] | [`gate::Gate`] entity, ids, gating method, errors |
//! | [`transform`] | Axis transforms and parameter-range validation |
//! | [`tree`] | Arena-backed [`tree::GateTree`] with add/remove and (de)serialization |
//! | [`wire`] | Lenient serde structs for the stored gate JSON |

pub mod gate;
pub mod transform;
pub mod tree;
pub mod wire;

pub use gate::{Axis, Gate, GateError, GateId, GatingMethod};
pub use transform::{Transform, TransformType, validate_transform};
pub use tree::GateTree;
