//! Mini-game modules
//!
//! Three challenges share one contract: the `MiniGame` trait. A `ModuleHost`
//! wraps a game with the page-facing behavior every module has in common
//! (expand toggle, result display delays, exactly-once completion delivery,
//! detection cadence).

pub mod bands;
pub mod evasion;
pub mod gesture;
pub mod signal;

pub use bands::{Band, BandTable};
pub use evasion::EvasionGame;
pub use gesture::GestureGame;
pub use signal::SignalGame;

use thiserror::Error;

use crate::consts::{COMPLETION_DELAY, EXPLANATION_DELAY};
use crate::detect::{Detection, ModelService};
use crate::schedule::Cadence;

/// Which module is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModuleKind {
    #[default]
    Gesture,
    Signal,
    Evasion,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 3] = [ModuleKind::Gesture, ModuleKind::Signal, ModuleKind::Evasion];

    pub fn next(self) -> Self {
        match self {
            ModuleKind::Gesture => ModuleKind::Signal,
            ModuleKind::Signal => ModuleKind::Evasion,
            ModuleKind::Evasion => ModuleKind::Gesture,
        }
    }

    /// Zero-based position in the cycle
    pub fn index(self) -> usize {
        match self {
            ModuleKind::Gesture => 0,
            ModuleKind::Signal => 1,
            ModuleKind::Evasion => 2,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ModuleKind::Gesture => "Module 1: raise your hands",
            ModuleKind::Signal => "Module 2: feed the signal",
            ModuleKind::Evasion => "Module 3: evade the marker",
        }
    }

    /// Dev key binding (`1`, `2`, `3`)
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "1" => Some(ModuleKind::Gesture),
            "2" => Some(ModuleKind::Signal),
            "3" => Some(ModuleKind::Evasion),
            _ => None,
        }
    }
}

/// Input hardware a module asks the page for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Camera,
    Microphone,
}

/// Module failure; shown in the panel, never completes the module
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("detection model failed to load: {0}")]
    ModelLoad(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GamePhase {
    /// Waiting to be expanded
    #[default]
    Idle,
    /// Devices or model requested
    Loading,
    Active,
    Complete,
    Failed,
}

/// One observation pushed in from the page
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    /// Hand tracker result for one frame
    Hands { count: u32, confidence: f32 },
    /// Object detector result for one frame
    Detections(Vec<Detection>),
    /// Microphone frequency bins, 0..=255
    Spectrum(Vec<u8>),
}

/// A finished challenge and the modal it chose
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// 1-based modal index
    pub index: u32,
    pub destination: String,
    /// Seconds the challenge ran
    pub elapsed: f32,
}

impl Completion {
    pub fn new(index: u32, elapsed: f32) -> Self {
        Self {
            index,
            destination: crate::modal_id(index),
            elapsed,
        }
    }
}

/// Lifecycle shared by every game
#[derive(Debug, Clone, Default)]
pub struct Lifecycle {
    pub phase: GamePhase,
    pub error: Option<GameError>,
    pub result: Option<Completion>,
}

impl Lifecycle {
    fn finish(&mut self, completion: Completion) -> Completion {
        self.phase = GamePhase::Complete;
        self.result = Some(completion.clone());
        completion
    }
}

/// A mini-game challenge.
///
/// Games are pure state machines over simulation time: the host feeds them
/// samples and fixed steps, and they report completion from `tick` exactly
/// once.
pub trait MiniGame {
    fn kind(&self) -> ModuleKind;
    fn lifecycle(&self) -> &Lifecycle;
    fn lifecycle_mut(&mut self) -> &mut Lifecycle;

    /// Hardware to request on activation
    fn device(&self) -> Device;

    /// Whether the shared person detector feeds this game
    fn uses_model(&self) -> bool {
        false
    }

    /// Whether the page runs its own tracker for this game, which must
    /// report ready before the challenge starts
    fn uses_page_tracker(&self) -> bool {
        false
    }

    /// Seconds between detection passes, if the game polls a detector
    fn detection_interval(&self) -> Option<f32> {
        None
    }

    fn observe(&mut self, sample: &Sample);

    /// Advance one fixed step while Active. Returns the completion on the
    /// step the challenge ends.
    fn step(&mut self, dt: f32) -> Option<Completion>;

    /// Discard all challenge state
    fn clear(&mut self);

    /// Live readout lines for the panel
    fn status(&self) -> Vec<String>;

    /// Result text shown after the explanation delay
    fn explanation(&self) -> Option<String>;

    fn phase(&self) -> GamePhase {
        self.lifecycle().phase
    }

    fn error(&self) -> Option<&GameError> {
        self.lifecycle().error.as_ref()
    }

    fn result(&self) -> Option<&Completion> {
        self.lifecycle().result.as_ref()
    }

    /// Idle -> Loading
    fn start(&mut self) -> bool {
        if self.phase() != GamePhase::Idle {
            return false;
        }
        self.lifecycle_mut().phase = GamePhase::Loading;
        log::info!("{:?} requesting {:?}", self.kind(), self.device());
        true
    }

    /// Loading -> Active
    fn ready(&mut self) {
        if self.phase() == GamePhase::Loading {
            self.clear();
            self.lifecycle_mut().phase = GamePhase::Active;
            log::info!("{:?} active", self.kind());
        }
    }

    fn fail(&mut self, error: GameError) {
        if matches!(self.phase(), GamePhase::Loading | GamePhase::Active) {
            log::warn!("{:?} failed: {}", self.kind(), error);
            let lifecycle = self.lifecycle_mut();
            lifecycle.phase = GamePhase::Failed;
            lifecycle.error = Some(error);
        }
    }

    /// Back to Idle from any phase
    fn reset(&mut self) {
        self.clear();
        *self.lifecycle_mut() = Lifecycle::default();
    }

    fn tick(&mut self, dt: f32) -> Option<Completion> {
        if self.phase() != GamePhase::Active {
            return None;
        }
        let completion = self.step(dt)?;
        log::info!(
            "{:?} complete after {:.2}s -> {}",
            self.kind(),
            completion.elapsed,
            completion.destination
        );
        Some(self.lifecycle_mut().finish(completion))
    }
}

/// What the page renders for a module
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleView {
    pub kind: ModuleKind,
    pub title: &'static str,
    pub expanded: bool,
    pub phase: GamePhase,
    pub status: Vec<String>,
    pub error: Option<String>,
    pub result: Option<u32>,
    pub explanation: Option<String>,
}

/// Page-side wrapper around one game
pub struct ModuleHost {
    game: Box<dyn MiniGame>,
    expanded: bool,
    /// Seconds since the game completed
    since_complete: f32,
    delivered: bool,
    cadence: Option<Cadence>,
    /// Cadence fired for a detector the page runs itself
    poll_due: bool,
    device_granted: bool,
    tracker_ready: bool,
}

impl ModuleHost {
    pub fn new(game: Box<dyn MiniGame>) -> Self {
        let cadence = game.detection_interval().map(Cadence::new);
        Self {
            game,
            expanded: false,
            since_complete: 0.0,
            delivered: false,
            cadence,
            poll_due: false,
            device_granted: false,
            tracker_ready: false,
        }
    }

    pub fn kind(&self) -> ModuleKind {
        self.game.kind()
    }

    pub fn game(&self) -> &dyn MiniGame {
        self.game.as_ref()
    }

    pub fn game_mut(&mut self) -> &mut dyn MiniGame {
        self.game.as_mut()
    }

    pub fn expanded(&self) -> bool {
        self.expanded
    }

    /// Expanding an idle module starts it; returns the device to request.
    /// Collapsing never cancels a running challenge.
    pub fn set_expanded(&mut self, expanded: bool) -> Option<Device> {
        self.expanded = expanded;
        if expanded && self.game.start() {
            return Some(self.game.device());
        }
        None
    }

    pub fn toggle(&mut self) -> Option<Device> {
        self.set_expanded(!self.expanded)
    }

    /// The page granted the device. Starts the model load if the game
    /// needs one.
    pub fn device_ready(&mut self, models: &mut ModelService) {
        if self.game.phase() != GamePhase::Loading {
            return;
        }
        self.device_granted = true;
        self.try_activate(models);
    }

    /// The shared detector finished loading in the page
    pub fn model_ready(&mut self, models: &mut ModelService) {
        if self.game.uses_model() {
            self.try_activate(models);
        }
    }

    /// The page-side tracker confirmed it can run
    pub fn tracker_ready(&mut self, models: &mut ModelService) {
        if self.game.phase() == GamePhase::Loading && self.game.uses_page_tracker() {
            self.tracker_ready = true;
            self.try_activate(models);
        }
    }

    /// Device granted, still waiting on the page tracker
    pub fn awaiting_tracker(&self) -> bool {
        self.game.phase() == GamePhase::Loading
            && self.device_granted
            && self.game.uses_page_tracker()
            && !self.tracker_ready
    }

    /// Loading -> Active once the device and every detector are up
    fn try_activate(&mut self, models: &mut ModelService) {
        if self.game.phase() != GamePhase::Loading || !self.device_granted {
            return;
        }
        if self.game.uses_page_tracker() && !self.tracker_ready {
            return;
        }
        if self.game.uses_model() {
            match models.get_or_load() {
                Ok(model) if !model.is_ready() => return,
                Ok(_) => {}
                Err(e) => {
                    self.game.fail(e);
                    return;
                }
            }
        }
        self.game.ready();
    }

    /// A device or detector failed. A failed model is dropped so the next
    /// attempt loads it again.
    pub fn device_error(&mut self, error: GameError, models: &mut ModelService) {
        if matches!(error, GameError::ModelLoad(_)) && self.game.uses_model() {
            models.dispose();
        }
        self.game.fail(error);
    }

    /// Manual retry after a failure
    pub fn retry(&mut self) -> Option<Device> {
        if self.game.phase() != GamePhase::Failed {
            return None;
        }
        self.reset();
        self.set_expanded(true)
    }

    pub fn observe(&mut self, sample: &Sample) {
        if self.game.phase() == GamePhase::Active {
            self.game.observe(sample);
        }
    }

    /// One fixed step. Returns the destination on the step it is delivered,
    /// and never again for this activation.
    pub fn tick(&mut self, dt: f32, models: &mut ModelService) -> Option<String> {
        if self.game.phase() == GamePhase::Active {
            if let Some(cadence) = self.cadence.as_mut() {
                if cadence.due(dt) {
                    if !self.game.uses_model() {
                        self.poll_due = true;
                    } else {
                        match models.get_or_load() {
                            Ok(model) => model.request(),
                            Err(e) => {
                                self.game.fail(e);
                                return None;
                            }
                        }
                    }
                }
            }
            if self.game.tick(dt).is_some() {
                self.since_complete = 0.0;
            }
            return None;
        }

        if self.game.phase() != GamePhase::Complete || self.delivered {
            return None;
        }
        self.since_complete += dt;
        if self.since_complete >= COMPLETION_DELAY {
            self.delivered = true;
            return self.game.result().map(|c| c.destination.clone());
        }
        None
    }

    /// Whether the page should poll the detector this step
    pub fn wants_detections(&self) -> bool {
        self.game.phase() == GamePhase::Active && self.cadence.is_some()
    }

    /// True once per cadence interval for games whose tracker lives in the page
    pub fn take_poll(&mut self) -> bool {
        std::mem::take(&mut self.poll_due)
    }

    pub fn delivered(&self) -> bool {
        self.delivered
    }

    pub fn reset(&mut self) {
        self.game.reset();
        self.since_complete = 0.0;
        self.delivered = false;
        self.poll_due = false;
        self.device_granted = false;
        self.tracker_ready = false;
        if let Some(cadence) = self.cadence.as_mut() {
            cadence.reset();
        }
    }

    pub fn view(&self) -> ModuleView {
        let complete = self.game.phase() == GamePhase::Complete;
        ModuleView {
            kind: self.kind(),
            title: self.kind().title(),
            expanded: self.expanded,
            phase: self.game.phase(),
            status: self.game.status(),
            error: self.game.error().map(ToString::to_string),
            result: self.game.result().map(|c| c.index),
            explanation: if complete && self.since_complete >= EXPLANATION_DELAY {
                self.game.explanation()
            } else {
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::fake;

    /// Completes after a fixed number of steps
    struct Countdown {
        life: Lifecycle,
        steps: u32,
        needs_model: bool,
    }

    impl Countdown {
        fn new(steps: u32, needs_model: bool) -> Self {
            Self {
                life: Lifecycle::default(),
                steps,
                needs_model,
            }
        }
    }

    impl MiniGame for Countdown {
        fn kind(&self) -> ModuleKind {
            ModuleKind::Gesture
        }
        fn lifecycle(&self) -> &Lifecycle {
            &self.life
        }
        fn lifecycle_mut(&mut self) -> &mut Lifecycle {
            &mut self.life
        }
        fn device(&self) -> Device {
            Device::Camera
        }
        fn uses_model(&self) -> bool {
            self.needs_model
        }
        fn detection_interval(&self) -> Option<f32> {
            self.needs_model.then_some(0.15)
        }
        fn observe(&mut self, _sample: &Sample) {}
        fn step(&mut self, dt: f32) -> Option<Completion> {
            self.steps = self.steps.saturating_sub(1);
            (self.steps == 0).then(|| Completion::new(4, dt))
        }
        fn clear(&mut self) {}
        fn status(&self) -> Vec<String> {
            Vec::new()
        }
        fn explanation(&self) -> Option<String> {
            Some("done".into())
        }
    }

    const DT: f32 = 1.0 / 60.0;

    fn run(host: &mut ModuleHost, models: &mut ModelService, steps: u32) -> Vec<String> {
        (0..steps).filter_map(|_| host.tick(DT, models)).collect()
    }

    #[test]
    fn test_module_cycle() {
        let mut kind = ModuleKind::Gesture;
        for expected in [ModuleKind::Signal, ModuleKind::Evasion, ModuleKind::Gesture] {
            kind = kind.next();
            assert_eq!(kind, expected);
        }
        assert_eq!(ModuleKind::from_key("3"), Some(ModuleKind::Evasion));
        assert_eq!(ModuleKind::from_key("4"), None);
    }

    #[test]
    fn test_expand_starts_once() {
        let mut host = ModuleHost::new(Box::new(Countdown::new(3, false)));
        assert_eq!(host.set_expanded(true), Some(Device::Camera));
        assert_eq!(host.game().phase(), GamePhase::Loading);
        host.set_expanded(false);
        // Re-expanding a loading module does not request again
        assert_eq!(host.set_expanded(true), None);
    }

    #[test]
    fn test_delivers_once_after_delay() {
        let (mut models, _, _) = fake::service();
        let mut host = ModuleHost::new(Box::new(Countdown::new(1, false)));
        host.set_expanded(true);
        host.device_ready(&mut models);
        assert_eq!(host.game().phase(), GamePhase::Active);

        // Completes on the first step; delivery 3 s later
        assert_eq!(run(&mut host, &mut models, 1), Vec::<String>::new());
        assert_eq!(host.view().result, Some(4));
        assert_eq!(host.view().explanation, None);

        let early = run(&mut host, &mut models, 60);
        assert!(early.is_empty());
        assert_eq!(host.view().explanation.as_deref(), Some("done"));

        let delivered = run(&mut host, &mut models, 600);
        assert_eq!(delivered, vec!["modal4".to_string()]);
        assert!(host.delivered());
    }

    #[test]
    fn test_collapse_does_not_cancel() {
        let (mut models, _, _) = fake::service();
        let mut host = ModuleHost::new(Box::new(Countdown::new(5, false)));
        host.set_expanded(true);
        host.device_ready(&mut models);
        host.set_expanded(false);
        let delivered = run(&mut host, &mut models, 300);
        assert_eq!(delivered.len(), 1);
    }

    #[test]
    fn test_failure_never_completes() {
        let (mut models, _, _) = fake::service();
        let mut host = ModuleHost::new(Box::new(Countdown::new(1, false)));
        host.set_expanded(true);
        host.device_error(GameError::PermissionDenied("camera".into()), &mut models);
        assert_eq!(host.game().phase(), GamePhase::Failed);
        assert!(host.view().error.unwrap().contains("camera"));

        // Ready after failure is ignored
        host.device_ready(&mut models);
        assert!(run(&mut host, &mut models, 600).is_empty());

        assert_eq!(host.retry(), Some(Device::Camera));
        assert_eq!(host.game().phase(), GamePhase::Loading);
        assert!(host.game().error().is_none());
    }

    #[test]
    fn test_model_load_failure_fails_module() {
        let mut models = fake::failing();
        let mut host = ModuleHost::new(Box::new(Countdown::new(10, true)));
        host.set_expanded(true);
        host.device_ready(&mut models);
        assert_eq!(host.game().phase(), GamePhase::Failed);
        assert!(matches!(host.game().error(), Some(GameError::ModelLoad(_))));
    }

    #[test]
    fn test_detection_cadence() {
        let (mut models, requests, _) = fake::service();
        let mut host = ModuleHost::new(Box::new(Countdown::new(1000, true)));
        host.set_expanded(true);
        host.device_ready(&mut models);
        assert!(host.wants_detections());
        run(&mut host, &mut models, 60);
        // Immediately, then every 150 ms over one second
        let n = requests.get();
        assert!((7..=8).contains(&n), "requests {}", n);
    }

    #[test]
    fn test_page_tracker_polled_without_model() {
        let (mut models, requests, _) = fake::service();
        let mut host = ModuleHost::new(Box::new(Countdown::new(1000, false)));
        // No cadence without an interval
        host.set_expanded(true);
        host.device_ready(&mut models);
        host.tick(DT, &mut models);
        assert!(!host.take_poll());

        let mut gesture = ModuleHost::new(Box::new(GestureGame::new(1)));
        gesture.set_expanded(true);
        gesture.device_ready(&mut models);
        gesture.tracker_ready(&mut models);
        gesture.tick(DT, &mut models);
        assert!(gesture.take_poll());
        assert!(!gesture.take_poll());
        assert_eq!(requests.get(), 0);
        assert!(!models.is_loaded());
    }

    #[test]
    fn test_retry_after_model_failure_reloads() {
        let (mut models, _, disposed) = fake::service();
        let mut host = ModuleHost::new(Box::new(Countdown::new(1000, true)));
        host.set_expanded(true);
        host.device_ready(&mut models);
        assert_eq!(models.loads(), 1);

        // The page reports the weights never arrived
        host.device_error(GameError::ModelLoad("fetch failed".into()), &mut models);
        assert_eq!(host.game().phase(), GamePhase::Failed);
        assert!(!models.is_loaded());
        assert_eq!(disposed.get(), 1);

        assert_eq!(host.retry(), Some(Device::Camera));
        host.device_ready(&mut models);
        assert_eq!(models.loads(), 2);
        assert_eq!(host.game().phase(), GamePhase::Active);
    }

    #[test]
    fn test_waits_for_model_before_active() {
        let (mut models, ready) = fake::slow();
        let mut host = ModuleHost::new(Box::new(Countdown::new(1, true)));
        host.set_expanded(true);
        host.device_ready(&mut models);
        assert_eq!(host.game().phase(), GamePhase::Loading);
        assert!(run(&mut host, &mut models, 600).is_empty());

        ready.set(true);
        host.model_ready(&mut models);
        assert_eq!(host.game().phase(), GamePhase::Active);
        assert_eq!(run(&mut host, &mut models, 600).len(), 1);
    }

    #[test]
    fn test_loading_tracker_never_completes() {
        let (mut models, _, _) = fake::service();
        let mut host = ModuleHost::new(Box::new(GestureGame::new(2)));
        host.set_expanded(true);
        host.device_ready(&mut models);
        assert!(host.awaiting_tracker());

        // Well past the countdown and the result delay
        assert!(run(&mut host, &mut models, 60 * 20).is_empty());
        assert_eq!(host.game().phase(), GamePhase::Loading);
        assert!(!host.take_poll());

        host.device_error(GameError::ModelLoad("hand tracker missing".into()), &mut models);
        assert_eq!(host.game().phase(), GamePhase::Failed);
        assert!(run(&mut host, &mut models, 60 * 20).is_empty());
    }
}
