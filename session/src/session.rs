//! Gate session controller.
//!
//! DESIGN
//! ======
//! One `GateSession` owns the loaded gate tree and the current-gate
//! selection. Every change goes through [`GateSession::notify_current_gate_updated`],
//! which broadcasts a [`GateEvent`] and, for semantic changes, queues a
//! save-and-render job with a snapshot of the tree. Geometry-only and
//! plot-refresh events are broadcast but never queue a job.
//!
//! ERROR HANDLING
//! ==============
//! Remote failures on load propagate to the caller. Failures in the refresh
//! pipeline are logged there and not retried. Rejected transform edits
//! return their validation messages and leave the gate untouched.

use std::sync::Arc;

use canvas::coords::{PlotMargin, Point};
use canvas::doc::Canvas;
use canvas::editor::EditorGraph;
use canvas::input::{Action, EditMode};
use gates::{Axis, Gate, GateError, GateId, GateTree, GatingMethod, Transform};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::api::{ExpFile, GateApi, PlotUpdateRequest};
use crate::config::{CanvasConfig, LaunchParams, SessionConfig};
use crate::error::SessionError;
use crate::events::{GateEvent, GateField};
use crate::refresh::{RefreshJob, spawn_refresh_pipeline};

/// Axis parameters used when the experiment file offers fewer than two.
pub const FALLBACK_PARAMETERS: [&str; 2] = ["FSC-A", "FSC-H"];

const EVENT_CAPACITY: usize = 256;

struct LoadedTree {
    exp_file: ExpFile,
    tree: GateTree,
    current: GateId,
    parameters: Vec<String>,
    parameters_display: Vec<String>,
    predefined_transforms: Vec<String>,
}

/// Orchestrates loading, selection, edits and plot refresh for one gate tree.
pub struct GateSession {
    api: Arc<dyn GateApi>,
    config: SessionConfig,
    events: broadcast::Sender<GateEvent>,
    refresh: mpsc::UnboundedSender<RefreshJob>,
    loaded: Option<LoadedTree>,
}

impl GateSession {
    /// Create a session and start its refresh pipeline. Must be called
    /// within a Tokio runtime.
    #[must_use]
    pub fn new(api: Arc<dyn GateApi>, config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let refresh = spawn_refresh_pipeline(Arc::clone(&api), events.clone());
        Self { api, config, events, refresh, loaded: None }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GateEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // =========================================================================
    // LOADING
    // =========================================================================

    /// Fetch the experiment file and build the gate tree: the saved one,
    /// or a fresh tree with a default root gate when none is saved or
    /// `new_gate` is set. Selects the root and emits [`GateEvent::Loaded`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Api`] if the fetch fails or the saved tree is
    /// not valid JSON, and [`SessionError::Gate`] if it is not a gate object.
    pub async fn load_gate(&mut self, params: &LaunchParams) -> Result<(), SessionError> {
        info!(
            exp_file_id = %params.exp_file_id,
            gate_edit_session = %params.gate_edit_session,
            new_gate = params.new_gate,
            "loading gate tree"
        );
        let exp_file = self.api.fetch_exp_file(&params.exp_file_id, &params.gate_edit_session).await?;

        let mut parameters: Vec<String> = exp_file.channels.iter().map(|c| c.short_name.clone()).collect();
        let parameters_display = exp_file.channels.iter().map(|c| format!("{}({})", c.short_name, c.name)).collect();
        if parameters.len() < 2 {
            parameters.extend(FALLBACK_PARAMETERS.iter().map(|p| (*p).to_string()));
        }
        let predefined_transforms = exp_file.predefined_transforms.iter().map(|t| t.transform_name.clone()).collect();

        let saved = match (&exp_file.gate, params.new_gate) {
            (Some(gate), false) => gate.tree_value()?,
            _ => None,
        };
        let tree = match saved {
            Some(value) => GateTree::from_value(value)?,
            None => GateTree::new(default_gate(&exp_file, &parameters)),
        };

        info!(exp_file_id = %exp_file.id, gates = tree.len(), fresh = params.new_gate, "gate tree loaded");
        self.loaded = Some(LoadedTree {
            current: tree.root(),
            tree,
            exp_file,
            parameters,
            parameters_display,
            predefined_transforms,
        });
        self.notify_current_gate_updated(GateEvent::Loaded);
        Ok(())
    }

    fn loaded(&self) -> Result<&LoadedTree, SessionError> {
        self.loaded.as_ref().ok_or(SessionError::NotLoaded)
    }

    fn loaded_mut(&mut self) -> Result<&mut LoadedTree, SessionError> {
        self.loaded.as_mut().ok_or(SessionError::NotLoaded)
    }

    fn current_gate_mut(&mut self) -> Result<&mut Gate, SessionError> {
        let loaded = self.loaded_mut()?;
        let current = loaded.current;
        loaded.tree.gate_mut(current).ok_or(SessionError::Gate(GateError::UnknownGate(current)))
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before a tree is loaded.
    pub fn tree(&self) -> Result<&GateTree, SessionError> {
        Ok(&self.loaded()?.tree)
    }

    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before a tree is loaded.
    pub fn root_gate_id(&self) -> Result<GateId, SessionError> {
        Ok(self.loaded()?.tree.root())
    }

    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before a tree is loaded.
    pub fn current_gate_id(&self) -> Result<GateId, SessionError> {
        Ok(self.loaded()?.current)
    }

    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before a tree is loaded.
    pub fn current_gate(&self) -> Result<&Gate, SessionError> {
        let loaded = self.loaded()?;
        loaded.tree.gate(loaded.current).ok_or(SessionError::Gate(GateError::UnknownGate(loaded.current)))
    }

    /// Axis parameter names offered for gates, padded to at least two.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before a tree is loaded.
    pub fn parameters(&self) -> Result<&[String], SessionError> {
        Ok(&self.loaded()?.parameters)
    }

    /// `"<shortName>(<name>)"` for each channel.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before a tree is loaded.
    pub fn parameters_display(&self) -> Result<&[String], SessionError> {
        Ok(&self.loaded()?.parameters_display)
    }

    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before a tree is loaded.
    pub fn predefined_transforms(&self) -> Result<&[String], SessionError> {
        Ok(&self.loaded()?.predefined_transforms)
    }

    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before a tree is loaded.
    pub fn plot_margin(&self) -> Result<PlotMargin, SessionError> {
        Ok(self.loaded()?.exp_file.plot_margin)
    }

    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before a tree is loaded.
    pub fn exp_file_id(&self) -> Result<&str, SessionError> {
        Ok(&self.loaded()?.exp_file.id)
    }

    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before a tree is loaded.
    pub fn gate_edit_session(&self) -> Result<&str, SessionError> {
        Ok(&self.loaded()?.exp_file.gate_edit_session)
    }

    /// Constrained trees (root gating method `dafi`) edit rectangles only.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before a tree is loaded.
    pub fn edit_mode(&self) -> Result<EditMode, SessionError> {
        let loaded = self.loaded()?;
        let method = loaded.tree.gate(loaded.tree.root()).map(|g| g.gating_method).unwrap_or_default();
        Ok(match method {
            GatingMethod::Dafi => EditMode::Rectangle,
            GatingMethod::Manual => EditMode::FreeForm,
        })
    }

    /// Per-channel default transform, or the neutral transform.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before a tree is loaded.
    pub fn default_transform(&self, channel: &str) -> Result<Transform, SessionError> {
        Ok(default_transform(&self.loaded()?.exp_file, channel))
    }

    /// Per-channel automatic transform, or the neutral transform.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before a tree is loaded.
    pub fn auto_transform(&self, channel: &str) -> Result<Transform, SessionError> {
        let loaded = self.loaded()?;
        Ok(lookup_transform(&loaded.exp_file.auto_transforms, channel))
    }

    /// A new gate over the first two parameters with default transforms.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before a tree is loaded.
    pub fn create_default_gate(&self) -> Result<Gate, SessionError> {
        let loaded = self.loaded()?;
        Ok(default_gate(&loaded.exp_file, &loaded.parameters))
    }

    #[must_use]
    pub fn plot_url(&self, plot_key: &str, version: u64) -> String {
        self.config.plot_url(plot_key, version)
    }

    // =========================================================================
    // NOTIFICATION
    // =========================================================================

    /// Broadcast `event` and, unless it is geometry churn or a refresh
    /// result, queue a save-and-render of the current tree.
    pub fn notify_current_gate_updated(&self, event: GateEvent) {
        if event.triggers_refresh() {
            self.queue_refresh(&event);
        }
        if self.events.send(event).is_err() {
            debug!("gate event with no subscribers");
        }
    }

    fn queue_refresh(&self, trigger: &GateEvent) {
        let Some(loaded) = &self.loaded else {
            return;
        };
        let gates = match loaded.tree.to_value() {
            Ok(gates) => gates,
            Err(err) => {
                error!(error = %err, "gate tree snapshot failed; plot not refreshed");
                return;
            }
        };
        let plot_key = loaded.tree.gate(loaded.current).map(|g| g.plot_key.clone()).unwrap_or_default();
        let job = RefreshJob {
            trigger: trigger.clone(),
            request: PlotUpdateRequest {
                exp_file: loaded.exp_file.id.clone(),
                gate_edit_session: loaded.exp_file.gate_edit_session.clone(),
                gates,
            },
            plot_key,
        };
        if self.refresh.send(job).is_err() {
            warn!("plot refresh pipeline closed; change not saved");
        }
    }

    // =========================================================================
    // SELECTION AND EDITS
    // =========================================================================

    /// Make `id` the current gate. Returns false, with no event, if it
    /// already is.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Gate`] for ids not in the tree.
    pub fn set_current_gate(&mut self, id: GateId) -> Result<bool, SessionError> {
        let loaded = self.loaded_mut()?;
        if loaded.current == id {
            return Ok(false);
        }
        if !loaded.tree.contains(id) {
            return Err(GateError::UnknownGate(id).into());
        }
        loaded.current = id;
        self.notify_current_gate_updated(GateEvent::Selected);
        Ok(true)
    }

    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before a tree is loaded.
    pub fn rename_current_gate(&mut self, name: &str) -> Result<(), SessionError> {
        self.current_gate_mut()?.rename(name);
        self.notify_current_gate_updated(GateEvent::FieldChanged(GateField::Name));
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before a tree is loaded.
    pub fn set_current_parameters(&mut self, x: &str, y: &str) -> Result<(), SessionError> {
        self.current_gate_mut()?.set_parameters(x, y);
        self.notify_current_gate_updated(GateEvent::FieldChanged(GateField::Parameters));
        Ok(())
    }

    /// Validate and apply an axis transform to the current gate. A
    /// predefined transform naming an unknown entry switches to the first
    /// offered one.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Gate`] wrapping
    /// [`GateError::InvalidTransform`] when validation fails; see
    /// [`SessionError::rejected_messages`].
    pub fn apply_transform(&mut self, axis: Axis, transform: Transform) -> Result<(), SessionError> {
        let transform = transform.with_predefined_fallback(&self.loaded()?.predefined_transforms);
        if let Err(err) = self.current_gate_mut()?.set_transform(axis, transform) {
            warn!(error = %err, ?axis, "transform edit rejected");
            return Err(err.into());
        }
        self.notify_current_gate_updated(GateEvent::FieldChanged(GateField::Transform));
        Ok(())
    }

    /// Store the editor's recomputed polygon on the current gate.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before a tree is loaded.
    pub fn update_current_points(&mut self, points: Vec<Point>) -> Result<(), SessionError> {
        self.current_gate_mut()?.points = points;
        self.notify_current_gate_updated(GateEvent::PointsChanged);
        Ok(())
    }

    /// Append `child` (or a default gate) under `parent` (or the root).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Gate`] when `parent` is not in the tree.
    pub fn add_gate(&mut self, parent: Option<GateId>, child: Option<Gate>) -> Result<GateId, SessionError> {
        let child = match child {
            Some(gate) => gate,
            None => self.create_default_gate()?,
        };
        let id = self.loaded_mut()?.tree.add_gate(parent, child)?;
        self.notify_current_gate_updated(GateEvent::FieldChanged(GateField::Children));
        Ok(id)
    }

    /// Remove a gate and its subtree, returning the former parent. If the
    /// current gate was removed, the parent becomes current. Repeated
    /// removal returns the same parent and emits nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before a tree is loaded.
    pub fn remove_gate(&mut self, id: GateId) -> Result<Option<GateId>, SessionError> {
        let loaded = self.loaded_mut()?;
        let was_live = loaded.tree.contains(id);
        let parent = loaded.tree.remove_gate(id);

        if let (true, Some(parent)) = (was_live, parent) {
            if !loaded.tree.contains(loaded.current) {
                loaded.current = parent;
            }
            self.notify_current_gate_updated(GateEvent::FieldChanged(GateField::Children));
        }
        Ok(parent)
    }

    // =========================================================================
    // EDITOR
    // =========================================================================

    /// Build an editor over `canvas` for the current gate.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Graph`] if the gate's shape cannot be built.
    pub fn open_editor<C: Canvas>(
        &self,
        canvas: C,
        canvas_config: &CanvasConfig,
    ) -> Result<(EditorGraph<C>, Vec<Action>), SessionError> {
        let mapper = canvas_config.mapper(self.plot_margin()?);
        let mut editor = EditorGraph::new(canvas, mapper);
        let actions = editor.load_gate(&self.current_gate()?.points, self.edit_mode()?)?;
        Ok((editor, actions))
    }

    /// Apply editor actions to the session; recomputed polygons are written
    /// to the current gate.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotLoaded`] before a tree is loaded.
    pub fn apply_editor_actions(&mut self, actions: &[Action]) -> Result<(), SessionError> {
        for action in actions {
            if let Action::PointsChanged(points) = action {
                self.update_current_points(points.clone())?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// DEFAULTS
// =============================================================================

fn lookup_transform(candidates: &[crate::api::ExpFileTransform], channel: &str) -> Transform {
    candidates.iter().find(|t| t.channel == channel).map(|t| t.to_transform()).unwrap_or_default()
}

fn default_transform(exp_file: &ExpFile, channel: &str) -> Transform {
    lookup_transform(&exp_file.default_transforms, channel)
}

fn default_gate(exp_file: &ExpFile, parameters: &[String]) -> Gate {
    let x = parameters.first().map_or(FALLBACK_PARAMETERS[0], String::as_str);
    let y = parameters.get(1).map_or(FALLBACK_PARAMETERS[1], String::as_str);
    Gate::new(x, y, default_transform(exp_file, x), default_transform(exp_file, y))
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
