//! Single source of truth for interactive viewer state
//!
//! Components never share writable references to each other's data. They
//! read immutable snapshots from [`UiStateManager`] and change it only
//! through its mutation methods. Every applied mutation is announced to the
//! subscribed observers, synchronously and in subscription order.
//!
//! Observers receive a [`Notification`] instead of the manager itself. A
//! mutation requested from inside a callback is queued and applied after the
//! current batch of notification rounds finishes, so an observer never sees
//! a half-updated state and nesting cannot recurse.

use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::StateError;

/// Upper bound on mutation batches triggered by one top-level mutation.
const MAX_CASCADE: usize = 1024;

/// Stable handle of a loaded mesh. Never reused while the mesh is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(u64);

impl MeshId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MeshId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshRecord {
    pub id: MeshId,
    pub name: String,
    pub visible: bool,
}

/// Global display toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewOption {
    Wireframe,
    ShowAxes,
}

impl ViewOption {
    pub const ALL: [ViewOption; 2] = [ViewOption::Wireframe, ViewOption::ShowAxes];

    pub fn name(self) -> &'static str {
        match self {
            ViewOption::Wireframe => "wireframe",
            ViewOption::ShowAxes => "show_axes",
        }
    }
}

impl fmt::Display for ViewOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ViewOption {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "wireframe" => Ok(ViewOption::Wireframe),
            "show_axes" | "axes" => Ok(ViewOption::ShowAxes),
            _ => Err(StateError::InvalidOption(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    pub wireframe: bool,
    pub show_axes: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            wireframe: false,
            show_axes: true,
        }
    }
}

impl ViewOptions {
    pub fn get(&self, option: ViewOption) -> bool {
        match option {
            ViewOption::Wireframe => self.wireframe,
            ViewOption::ShowAxes => self.show_axes,
        }
    }

    fn slot(&mut self, option: ViewOption) -> &mut bool {
        match option {
            ViewOption::Wireframe => &mut self.wireframe,
            ViewOption::ShowAxes => &mut self.show_axes,
        }
    }
}

/// What a mutation changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    MeshAdded { id: MeshId },
    MeshRemoved { id: MeshId },
    VisibilityChanged { id: MeshId, visible: bool },
    SelectionChanged {
        previous: Option<MeshId>,
        current: Option<MeshId>,
    },
    ViewOptionChanged { option: ViewOption, enabled: bool },
}

/// A request to change the state, usable from inside an observer callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    RegisterMesh { id: MeshId, name: String },
    RemoveMesh(MeshId),
    SetVisible(MeshId, bool),
    Select(Option<MeshId>),
    ToggleViewOption(ViewOption),
    SetViewOption(ViewOption, bool),
    ClearMeshes,
}

/// Receives every change applied to the [`UiStateManager`].
pub trait StateObserver {
    fn on_state_changed(&self, change: &StateChange, cx: &mut Notification<'_>);
}

impl<F> StateObserver for F
where
    F: Fn(&StateChange, &mut Notification<'_>),
{
    fn on_state_changed(&self, change: &StateChange, cx: &mut Notification<'_>) {
        self(change, cx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

/// Context handed to an observer during a notification round.
pub struct Notification<'a> {
    state: &'a UiState,
    handle: SubscriptionHandle,
    deferred: &'a mut Vec<Mutation>,
    unsubscribed: &'a mut Vec<SubscriptionHandle>,
}

impl Notification<'_> {
    /// The fully updated state
    pub fn state(&self) -> &UiState {
        self.state
    }

    /// Handle of the observer being notified
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    /// Queue a mutation; it is applied once the current rounds complete.
    pub fn request(&mut self, mutation: Mutation) {
        self.deferred.push(mutation);
    }

    /// Stop notifying `handle`, starting with the rest of this round.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) {
        if !self.unsubscribed.contains(&handle) {
            self.unsubscribed.push(handle);
        }
    }

    pub fn unsubscribe_self(&mut self) {
        let handle = self.handle;
        self.unsubscribe(handle);
    }
}

/// Canonical interaction state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiState {
    meshes: Vec<MeshRecord>,
    selected: Option<MeshId>,
    view_options: ViewOptions,
}

impl UiState {
    /// Loaded meshes in registration order
    pub fn meshes(&self) -> &[MeshRecord] {
        &self.meshes
    }

    pub fn mesh(&self, id: MeshId) -> Option<&MeshRecord> {
        self.meshes.iter().find(|m| m.id == id)
    }

    pub fn contains(&self, id: MeshId) -> bool {
        self.mesh(id).is_some()
    }

    pub fn selected(&self) -> Option<MeshId> {
        self.selected
    }

    pub fn view_options(&self) -> ViewOptions {
        self.view_options
    }

    fn position(&self, id: MeshId) -> Result<usize, StateError> {
        self.meshes
            .iter()
            .position(|m| m.id == id)
            .ok_or(StateError::NotFound(id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSummary {
    pub meshes: usize,
    pub visible: usize,
    pub selected: Option<MeshId>,
    pub view_options: ViewOptions,
}

/// Owner of [`UiState`] and its observer registry.
///
/// Single-threaded by construction: observers are held as `Weak` and the
/// manager is neither `Send` nor `Sync`.
#[derive(Default)]
pub struct UiStateManager {
    state: UiState,
    observers: Vec<(SubscriptionHandle, Weak<dyn StateObserver>)>,
    next_handle: u64,
}

impl fmt::Debug for UiStateManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiStateManager")
            .field("state", &self.state)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl UiStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- reads ----

    pub fn state(&self) -> &UiState {
        &self.state
    }

    pub fn get_meshes(&self) -> &[MeshRecord] {
        self.state.meshes()
    }

    pub fn get_selected(&self) -> Option<MeshId> {
        self.state.selected()
    }

    pub fn get_view_options(&self) -> ViewOptions {
        self.state.view_options()
    }

    pub fn is_visible(&self, id: MeshId) -> Result<bool, StateError> {
        self.state
            .mesh(id)
            .map(|m| m.visible)
            .ok_or(StateError::NotFound(id))
    }

    pub fn summary(&self) -> StateSummary {
        StateSummary {
            meshes: self.state.meshes.len(),
            visible: self.state.meshes.iter().filter(|m| m.visible).count(),
            selected: self.state.selected,
            view_options: self.state.view_options,
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    // ---- mutations ----

    pub fn register_mesh(&mut self, id: MeshId, name: impl Into<String>) -> Result<(), StateError> {
        self.commit(Mutation::RegisterMesh {
            id,
            name: name.into(),
        })
    }

    pub fn remove_mesh(&mut self, id: MeshId) -> Result<(), StateError> {
        self.commit(Mutation::RemoveMesh(id))
    }

    pub fn clear_meshes(&mut self) -> Result<(), StateError> {
        self.commit(Mutation::ClearMeshes)
    }

    pub fn set_visible(&mut self, id: MeshId, visible: bool) -> Result<(), StateError> {
        self.commit(Mutation::SetVisible(id, visible))
    }

    pub fn select(&mut self, id: Option<MeshId>) -> Result<(), StateError> {
        self.commit(Mutation::Select(id))
    }

    /// Toggle a view option by name, e.g. `"wireframe"` or `"show_axes"`.
    pub fn toggle_view_option(&mut self, name: &str) -> Result<(), StateError> {
        let option = name.parse()?;
        self.commit(Mutation::ToggleViewOption(option))
    }

    pub fn set_view_option(&mut self, option: ViewOption, enabled: bool) -> Result<(), StateError> {
        self.commit(Mutation::SetViewOption(option, enabled))
    }

    pub fn reset_view_options(&mut self) -> Result<(), StateError> {
        let defaults = ViewOptions::default();
        for option in ViewOption::ALL {
            self.set_view_option(option, defaults.get(option))?;
        }
        Ok(())
    }

    /// Apply a mutation and notify observers of what changed.
    pub fn commit(&mut self, mutation: Mutation) -> Result<(), StateError> {
        let changes = self.apply(mutation)?;
        self.dispatch(changes);
        Ok(())
    }

    // ---- observers ----

    /// Register an observer. The manager keeps only a weak reference;
    /// dropping the last `Rc` silently ends the subscription.
    pub fn subscribe<O>(&mut self, observer: &Rc<O>) -> SubscriptionHandle
    where
        O: StateObserver + 'static,
    {
        let handle = SubscriptionHandle(self.next_handle);
        self.next_handle += 1;
        let weak = Rc::downgrade(observer);
        let weak: Weak<dyn StateObserver> = weak;
        self.observers.push((handle, weak));
        debug!("Registered observer {:?}", handle);
        handle
    }

    /// Returns whether the handle was subscribed.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(h, _)| *h != handle);
        let removed = self.observers.len() != before;
        if removed {
            debug!("Unregistered observer {:?}", handle);
        }
        removed
    }

    /// Validate and apply one mutation. On error nothing has changed.
    fn apply(&mut self, mutation: Mutation) -> Result<Vec<StateChange>, StateError> {
        let state = &mut self.state;
        let changes = match mutation {
            Mutation::RegisterMesh { id, name } => {
                if state.contains(id) {
                    return Err(StateError::DuplicateIdentifier(id));
                }
                debug!("Registered mesh {} '{}'", id, name);
                state.meshes.push(MeshRecord {
                    id,
                    name,
                    visible: true,
                });
                vec![StateChange::MeshAdded { id }]
            }
            Mutation::RemoveMesh(id) => {
                let index = state.position(id)?;
                state.meshes.remove(index);
                debug!("Removed mesh {}", id);
                let mut changes = vec![StateChange::MeshRemoved { id }];
                if state.selected == Some(id) {
                    state.selected = None;
                    changes.push(StateChange::SelectionChanged {
                        previous: Some(id),
                        current: None,
                    });
                }
                changes
            }
            Mutation::ClearMeshes => {
                let mut changes: Vec<StateChange> = state
                    .meshes
                    .drain(..)
                    .map(|m| StateChange::MeshRemoved { id: m.id })
                    .collect();
                debug!("Cleared {} meshes", changes.len());
                if let Some(previous) = state.selected.take() {
                    changes.push(StateChange::SelectionChanged {
                        previous: Some(previous),
                        current: None,
                    });
                }
                changes
            }
            Mutation::SetVisible(id, visible) => {
                let index = state.position(id)?;
                let record = &mut state.meshes[index];
                if record.visible == visible {
                    Vec::new()
                } else {
                    record.visible = visible;
                    debug!("Mesh {} visible: {}", id, visible);
                    vec![StateChange::VisibilityChanged { id, visible }]
                }
            }
            Mutation::Select(current) => {
                if let Some(id) = current {
                    state.position(id)?;
                }
                let previous = state.selected;
                if previous == current {
                    Vec::new()
                } else {
                    state.selected = current;
                    debug!("Selection: {:?} -> {:?}", previous, current);
                    vec![StateChange::SelectionChanged { previous, current }]
                }
            }
            Mutation::ToggleViewOption(option) => {
                let slot = state.view_options.slot(option);
                *slot = !*slot;
                debug!("View option {}: {}", option, *slot);
                vec![StateChange::ViewOptionChanged {
                    option,
                    enabled: *slot,
                }]
            }
            Mutation::SetViewOption(option, enabled) => {
                let slot = state.view_options.slot(option);
                if *slot == enabled {
                    Vec::new()
                } else {
                    *slot = enabled;
                    debug!("View option {}: {}", option, enabled);
                    vec![StateChange::ViewOptionChanged { option, enabled }]
                }
            }
        };
        Ok(changes)
    }

    /// Deliver the changes of one mutation, then apply whatever the observers
    /// requested, batch by batch.
    fn dispatch(&mut self, changes: Vec<StateChange>) {
        let mut batches = VecDeque::from([changes]);
        let mut processed = 0;

        while let Some(batch) = batches.pop_front() {
            processed += 1;
            if processed > MAX_CASCADE {
                warn!(
                    "Observer cascade exceeded {} batches; dropping the rest",
                    MAX_CASCADE
                );
                break;
            }

            let mut deferred = Vec::new();
            for change in &batch {
                self.notify_round(change, &mut deferred);
            }

            for mutation in deferred {
                match self.apply(mutation) {
                    Ok(changes) if !changes.is_empty() => batches.push_back(changes),
                    Ok(_) => {}
                    Err(e) => warn!("Mutation requested by observer failed: {}", e),
                }
            }
        }
    }

    fn notify_round(&mut self, change: &StateChange, deferred: &mut Vec<Mutation>) {
        let round = self.observers.clone();
        let mut unsubscribed = Vec::new();

        for (handle, observer) in round {
            if unsubscribed.contains(&handle) {
                continue;
            }
            let Some(observer) = observer.upgrade() else {
                continue;
            };
            let mut cx = Notification {
                state: &self.state,
                handle,
                deferred: &mut *deferred,
                unsubscribed: &mut unsubscribed,
            };
            observer.on_state_changed(change, &mut cx);
        }

        self.observers
            .retain(|(h, o)| !unsubscribed.contains(h) && o.strong_count() > 0);
    }
}
