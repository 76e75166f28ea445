//! Typed gate change notifications.

/// Which semantic field of the current gate changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateField {
    Name,
    Parameters,
    Transform,
    Children,
}

/// A change to the session's gate state, delivered to subscribers in
/// emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    /// A gate tree was loaded and its root selected.
    Loaded,
    /// A different gate became current.
    Selected,
    /// A semantic edit to the current gate or the tree's structure.
    FieldChanged(GateField),
    /// Geometry-only churn from the editor.
    PointsChanged,
    /// The server re-rendered the background plot.
    PlotRefreshed { plot_key: String, version: u64 },
}

impl GateEvent {
    /// Whether this change should be saved and the plot re-rendered.
    /// Geometry churn and refresh results never retrigger a save.
    #[must_use]
    pub fn triggers_refresh(&self) -> bool {
        !matches!(self, Self::PointsChanged | Self::PlotRefreshed { .. })
    }
}
