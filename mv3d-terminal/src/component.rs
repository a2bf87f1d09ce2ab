//! Lifecycle shared by every panel
//!
//! A component is initialized once, then every frame it may receive input
//! events and is updated (drawn) into its area of the canvas. Failures are
//! caught at the component boundary by [`run_update`] and [`dispatch_event`]:
//! the failing component is skipped for the rest of the frame, the failure is
//! recorded on it and handed to the orchestrator, and every other component
//! still runs.

use std::fmt;
use std::path::PathBuf;

use crossterm::event::Event;
use mv3d_core::{AppConfig, Scene, StateError, UiStateManager};
use thiserror::Error;

use crate::canvas::{Canvas, Rect};
use crate::theme::ThemeManager;

#[derive(Debug, Error)]
pub enum ComponentError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("{0}")]
    Failed(String),
}

/// A recorded failure with the component and phase it happened in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentFailure {
    pub component: &'static str,
    pub phase: Phase,
    pub frame: u64,
    pub message: String,
}

impl fmt::Display for ComponentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.component, self.phase, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initialize,
    Event,
    Update,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Initialize => "initialize",
            Phase::Event => "event",
            Phase::Update => "update",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// Requests a component cannot carry out itself.
#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    OpenLoadPrompt,
    Load(Vec<PathBuf>),
    CancelLoad,
    DeleteSelected,
    ClearAll,
    ResetView,
    Notify(StatusLevel, String),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Consumed,
    Ignored,
}

/// Shared managers, available while initializing.
pub struct InitContext<'a> {
    pub state: &'a mut UiStateManager,
    pub theme: &'a ThemeManager,
    pub config: &'a AppConfig,
}

/// Everything a component may touch during one frame.
pub struct FrameContext<'a> {
    pub state: &'a mut UiStateManager,
    pub scene: &'a Scene,
    pub theme: &'a ThemeManager,
    pub config: &'a AppConfig,
    /// Area assigned to the component this frame
    pub area: Rect,
    pub frame: u64,
    pub actions: &'a mut Vec<AppAction>,
}

impl FrameContext<'_> {
    pub fn notify(&mut self, level: StatusLevel, message: impl Into<String>) {
        self.actions.push(AppAction::Notify(level, message.into()));
    }
}

/// Enabled/errored flags every component carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentBase {
    enabled: bool,
    errored: bool,
    last_error: Option<ComponentFailure>,
}

impl ComponentBase {
    pub fn new() -> Self {
        Self::with_enabled(true)
    }

    pub fn with_enabled(enabled: bool) -> Self {
        Self {
            enabled,
            errored: false,
            last_error: None,
        }
    }

    /// Whether the component failed during the current frame
    pub fn errored(&self) -> bool {
        self.errored
    }

    fn record(&mut self, failure: ComponentFailure) {
        self.errored = true;
        self.last_error = Some(failure);
    }
}

impl Default for ComponentBase {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Component {
    fn name(&self) -> &'static str;

    fn base(&self) -> &ComponentBase;

    fn base_mut(&mut self) -> &mut ComponentBase;

    /// Register observers and read the configuration.
    fn initialize(&mut self, _cx: &mut InitContext<'_>) -> Result<(), ComponentError> {
        Ok(())
    }

    fn handle_event(
        &mut self,
        _event: &Event,
        _cx: &mut FrameContext<'_>,
    ) -> Result<EventResult, ComponentError> {
        Ok(EventResult::Ignored)
    }

    /// Per-frame update; draws into `cx.area`.
    fn update(&mut self, cx: &mut FrameContext<'_>, canvas: &mut Canvas) -> Result<(), ComponentError>;

    /// Unregister observers.
    fn teardown(&mut self, _state: &mut UiStateManager) {}

    /// Disabling skips updates and input but keeps observers registered.
    fn set_enabled(&mut self, enabled: bool) {
        self.base_mut().enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.base().enabled
    }

    fn last_error(&self) -> Option<&ComponentFailure> {
        self.base().last_error.as_ref()
    }
}

fn fail(component: &mut dyn Component, phase: Phase, frame: u64, error: ComponentError) -> ComponentFailure {
    let failure = ComponentFailure {
        component: component.name(),
        phase,
        frame,
        message: error.to_string(),
    };
    component.base_mut().record(failure.clone());
    failure
}

pub fn initialize(component: &mut dyn Component, cx: &mut InitContext<'_>) -> Option<ComponentFailure> {
    match component.initialize(cx) {
        Ok(()) => None,
        Err(e) => Some(fail(component, Phase::Initialize, 0, e)),
    }
}

/// Clear the per-frame errored flag.
pub fn begin_frame(component: &mut dyn Component) {
    component.base_mut().errored = false;
}

/// Update one component with failure isolation. Disabled components, and
/// components that already failed this frame, are skipped.
pub fn run_update(
    component: &mut dyn Component,
    cx: &mut FrameContext<'_>,
    canvas: &mut Canvas,
) -> Option<ComponentFailure> {
    if !component.is_enabled() || component.base().errored {
        return None;
    }
    match component.update(cx, canvas) {
        Ok(()) => None,
        Err(e) => Some(fail(component, Phase::Update, cx.frame, e)),
    }
}

/// Offer an event to one component. A failed handler counts as consuming the
/// event so it does not fall through to another component.
pub fn dispatch_event(
    component: &mut dyn Component,
    event: &Event,
    cx: &mut FrameContext<'_>,
) -> Result<EventResult, ComponentFailure> {
    if !component.is_enabled() || component.base().errored {
        return Ok(EventResult::Ignored);
    }
    component
        .handle_event(event, cx)
        .map_err(|e| fail(component, Phase::Event, cx.frame, e))
}
