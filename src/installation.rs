//! Installation composition root
//!
//! Owns everything one visit needs and wires it together:
//!
//! module completes -> session stores the target -> organism spawns a
//! traveler -> arrival reveal -> session marks the modal revealed.
//!
//! The browser front-end drives it with frame timestamps and pushes samples
//! in; tests drive it with fixed steps.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::config::ModalCatalog;
use crate::consts::SIM_DT;
use crate::detect::ModelService;
use crate::games::{
    Device, EvasionGame, GameError, GamePhase, GestureGame, ModuleHost, ModuleKind, ModuleView, Sample,
    SignalGame,
};
use crate::render::{Scene, build_scene};
use crate::schedule::FrameClock;
use crate::session::{Session, SessionError};
use crate::settings::Settings;
use crate::sim::{Organism, OrganismEvent, tick};

/// Something the page has to do on the installation's behalf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    OpenDevice { module: ModuleKind, device: Device },
    ReleaseDevice { module: ModuleKind, device: Device },
    /// Load the page-side hand tracker and report back
    LoadHandTracker { module: ModuleKind },
    /// Run one pass of the page-side hand tracker
    PollHands,
}

pub struct Installation {
    session: Session,
    organism: Organism,
    /// Indexed by `ModuleKind::index`
    modules: Vec<ModuleHost>,
    models: ModelService,
    clock: FrameClock,
    settings: Settings,
    rng: Pcg32,
    requests: Vec<PageRequest>,
}

impl Installation {
    pub fn new(catalog: ModalCatalog, settings: Settings, models: ModelService, seed: u64) -> Self {
        let modules = vec![
            ModuleHost::new(Box::new(GestureGame::new(seed.wrapping_add(1)))),
            ModuleHost::new(Box::new(SignalGame::new(seed.wrapping_add(2)))),
            ModuleHost::new(Box::new(EvasionGame::new(seed.wrapping_add(3)))),
        ];
        log::info!("Installation ready with {} modals, seed {}", catalog.len(), seed);
        Self {
            session: Session::new(catalog),
            organism: Organism::new(seed, Vec2::ZERO),
            modules,
            models,
            clock: FrameClock::new(),
            settings,
            rng: Pcg32::seed_from_u64(seed.wrapping_add(4)),
            requests: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn organism(&self) -> &Organism {
        &self.organism
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace the settings and persist them
    pub fn set_settings(&mut self, settings: Settings) {
        settings.save();
        self.settings = settings;
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.organism.set_viewport(Vec2::new(width, height));
    }

    pub fn module(&self, kind: ModuleKind) -> &ModuleHost {
        &self.modules[kind.index()]
    }

    fn current(&mut self) -> &mut ModuleHost {
        &mut self.modules[self.session.current_module().index()]
    }

    pub fn current_view(&self) -> ModuleView {
        self.module(self.session.current_module()).view()
    }

    /// Requests raised since the last call
    pub fn take_requests(&mut self) -> Vec<PageRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Run however many fixed steps fit since the previous frame
    pub fn frame(&mut self, now_ms: f64) -> Result<(), SessionError> {
        let steps = self.clock.advance(now_ms);
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    /// One fixed simulation step
    pub fn step(&mut self) -> Result<(), SessionError> {
        tick(&mut self.organism, SIM_DT, self.settings.travel_jitter());
        for event in self.organism.drain_events() {
            if let OrganismEvent::Reveal(id) = event {
                self.session.on_reveal(&id)?;
            }
        }

        if let Some(panel) = self.session.active_panel_mut() {
            panel.tick(SIM_DT);
        }

        let kind = self.session.current_module();
        let host = &mut self.modules[kind.index()];
        let delivered = host.tick(SIM_DT, &mut self.models);
        if host.take_poll() && kind == ModuleKind::Gesture {
            self.requests.push(PageRequest::PollHands);
        }
        if let Some(destination) = delivered {
            self.complete(&destination)?;
            self.advance_module();
        }
        Ok(())
    }

    /// A module delivered its destination
    pub fn complete(&mut self, destination: &str) -> Result<(), SessionError> {
        self.session.on_complete(destination)?;
        let accepted = self
            .organism
            .set_target(self.session.pending_target(), self.session.catalog())?;
        if !accepted && self.session.revealed().contains(destination) {
            // Same modal as the last traveler, which already arrived
            log::info!("{} already reached, nothing to grow toward", destination);
            self.session.on_reveal(destination)?;
        }
        Ok(())
    }

    fn advance_module(&mut self) {
        let next = self.session.current_module().next();
        self.select_module(next);
    }

    /// Show a module, collapsed and freshly reset. Tears down the one being left.
    pub fn select_module(&mut self, kind: ModuleKind) {
        let previous = self.session.current_module();
        let host = &mut self.modules[previous.index()];
        let device = host.game().device();
        // A module that failed after the grant still holds its stream
        let held = host.game().phase() != GamePhase::Idle;
        host.set_expanded(false);
        host.reset();
        if held {
            self.requests.push(PageRequest::ReleaseDevice {
                module: previous,
                device,
            });
        }
        self.modules[kind.index()].reset();
        self.session.select_module(kind);
        log::info!("Showing {:?}", kind);
    }

    /// Expand or collapse the current module
    pub fn toggle_module(&mut self) {
        self.session.toggle_expanded();
        let expanded = self.session.module_expanded();
        let module = self.session.current_module();
        if let Some(device) = self.current().set_expanded(expanded) {
            self.requests.push(PageRequest::OpenDevice { module, device });
        }
    }

    /// Manual retry of a failed module
    pub fn retry_module(&mut self) {
        let module = self.session.current_module();
        if let Some(device) = self.current().retry() {
            self.requests.push(PageRequest::OpenDevice { module, device });
        }
    }

    pub fn device_ready(&mut self, module: ModuleKind) {
        let host = &mut self.modules[module.index()];
        host.device_ready(&mut self.models);
        if host.awaiting_tracker() {
            self.requests.push(PageRequest::LoadHandTracker { module });
        }
    }

    /// The page finished loading the shared detector
    pub fn model_ready(&mut self) {
        for host in &mut self.modules {
            host.model_ready(&mut self.models);
        }
    }

    pub fn tracker_ready(&mut self, module: ModuleKind) {
        self.modules[module.index()].tracker_ready(&mut self.models);
    }

    pub fn device_error(&mut self, module: ModuleKind, error: GameError) {
        self.modules[module.index()].device_error(error, &mut self.models);
    }

    /// Route a sample to the module on screen
    pub fn push_sample(&mut self, sample: Sample) {
        self.current().observe(&sample);
    }

    pub fn become_click(&mut self, id: &str) -> Result<(), SessionError> {
        self.session.on_become_click(id)?;
        Ok(())
    }

    pub fn close_panel(&mut self) {
        self.session.close_panel();
    }

    /// Dev and panel keys. Returns whether the key was handled.
    pub fn handle_key(&mut self, key: &str) -> bool {
        if let Some(kind) = ModuleKind::from_key(key) {
            self.select_module(kind);
            return true;
        }
        match key {
            "r" | "R" => {
                if self.session.reveal_random(&mut self.rng).is_none() {
                    log::info!("Every modal already revealed");
                }
                true
            }
            "Escape" => {
                self.session.close_panel();
                true
            }
            "q" | "Q" => {
                let mut settings = self.settings.clone();
                settings.quality = settings.quality.next();
                log::info!("Quality {}", settings.quality.as_str());
                self.set_settings(settings);
                true
            }
            "m" | "M" => {
                let mut settings = self.settings.clone();
                settings.reduced_motion = !settings.reduced_motion;
                self.set_settings(settings);
                true
            }
            "h" | "H" => {
                let mut settings = self.settings.clone();
                settings.show_dev_controls = !settings.show_dev_controls;
                self.set_settings(settings);
                true
            }
            "ArrowRight" | " " => self.page_panel(true),
            "ArrowLeft" => self.page_panel(false),
            _ => false,
        }
    }

    fn page_panel(&mut self, forward: bool) -> bool {
        let Some(panel) = self.session.active_panel_mut() else {
            return false;
        };
        if forward {
            panel.next_page();
        } else {
            panel.prev_page();
        }
        true
    }

    pub fn scene(&self) -> Scene {
        build_scene(
            &self.organism,
            self.session.catalog(),
            self.session.revealed(),
            self.session.pending_target(),
            &self.settings,
        )
    }

    /// Full teardown: release held devices and the detection model
    pub fn dispose(&mut self) {
        for kind in ModuleKind::ALL {
            let host = &mut self.modules[kind.index()];
            if host.game().phase() != GamePhase::Idle {
                let device = host.game().device();
                host.reset();
                self.requests.push(PageRequest::ReleaseDevice {
                    module: kind,
                    device,
                });
            }
        }
        self.models.dispose();
        log::info!("Installation disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::fake;
    use crate::sim::BlobState;

    fn installation() -> Installation {
        let (models, _, _) = fake::service();
        let mut inst =
            Installation::new(ModalCatalog::builtin().unwrap(), Settings::default(), models, 42);
        inst.set_viewport(1000.0, 800.0);
        inst
    }

    fn run(inst: &mut Installation, steps: usize) {
        for _ in 0..steps {
            inst.step().unwrap();
        }
    }

    #[test]
    fn test_completion_reveals_modal3() {
        let mut inst = installation();
        let center = inst.organism().center().pos;
        inst.complete("modal3").unwrap();
        assert_eq!(inst.session().pending_target(), Some("modal3"));

        // A traveler leaves the center within one tick
        run(&mut inst, 1);
        let traveler = inst.organism().travelers().next().unwrap();
        assert_eq!(traveler.target(inst.organism().viewport), Some(Vec2::new(700.0, 320.0)));
        assert!(traveler.pos.distance(center) > 0.0);
        let toward = (Vec2::new(700.0, 320.0) - center).normalize();
        assert!((traveler.pos - center).normalize().dot(toward) > 0.9);

        let mut reveals = 0;
        for _ in 0..60 * 30 {
            inst.step().unwrap();
            if inst.session().revealed().contains("modal3") {
                reveals += 1;
                break;
            }
        }
        assert_eq!(reveals, 1);
        assert_eq!(inst.session().pending_target(), None);
        let traveler = inst.organism().travelers().next().unwrap();
        assert_eq!(traveler.state, BlobState::Arrived);
        assert!(traveler.pos.distance(Vec2::new(700.0, 320.0)) < 30.0);

        // Nothing else happens afterwards
        run(&mut inst, 600);
        assert_eq!(inst.session().revealed().len(), 1);
        assert_eq!(inst.organism().blobs.len(), 2);
    }

    #[test]
    fn test_unknown_destination_is_error() {
        let mut inst = installation();
        assert!(inst.complete("modal99").is_err());
        assert_eq!(inst.organism().blobs.len(), 1);
    }

    #[test]
    fn test_module_flow_end_to_end() {
        let mut inst = installation();
        inst.handle_key("2");
        inst.toggle_module();
        assert_eq!(
            inst.take_requests(),
            vec![PageRequest::OpenDevice {
                module: ModuleKind::Signal,
                device: Device::Microphone
            }]
        );
        inst.device_ready(ModuleKind::Signal);
        assert_eq!(inst.current_view().phase, GamePhase::Active);

        inst.push_sample(Sample::Spectrum(vec![128; 64]));
        // Threshold in about 2.3 s, then the 3 s result delay
        run(&mut inst, 60 * 6);
        let target = inst.session().pending_target().map(String::from);
        assert!(target.is_some());
        assert_eq!(inst.organism().active_target(), target.as_deref());

        // Advanced to the next module, collapsed
        assert_eq!(inst.session().current_module(), ModuleKind::Evasion);
        assert!(!inst.session().module_expanded());
        assert_eq!(inst.module(ModuleKind::Signal).game().phase(), GamePhase::Idle);
        assert!(inst.take_requests().contains(&PageRequest::ReleaseDevice {
            module: ModuleKind::Signal,
            device: Device::Microphone
        }));

        // Organism reaches it eventually
        run(&mut inst, 60 * 30);
        assert_eq!(inst.session().revealed().len(), 1);
        assert_eq!(inst.session().pending_target(), None);
    }

    #[test]
    fn test_samples_only_reach_current_module() {
        let mut inst = installation();
        inst.toggle_module();
        inst.device_ready(ModuleKind::Gesture);
        inst.tracker_ready(ModuleKind::Gesture);
        inst.push_sample(Sample::Hands {
            count: 4,
            confidence: 0.9,
        });
        inst.step().unwrap();
        assert!(inst.take_requests().contains(&PageRequest::PollHands));
        assert!(inst.current_view().status.iter().any(|l| l == "hands: 4"));
        assert_eq!(inst.module(ModuleKind::Signal).game().phase(), GamePhase::Idle);
    }

    #[test]
    fn test_device_error_blocks_module() {
        let mut inst = installation();
        inst.handle_key("3");
        inst.toggle_module();
        inst.device_error(
            ModuleKind::Evasion,
            GameError::PermissionDenied("camera".into()),
        );
        run(&mut inst, 60 * 60);
        assert_eq!(inst.current_view().phase, GamePhase::Failed);
        assert!(inst.session().pending_target().is_none());
        assert!(inst.session().revealed().is_empty());

        inst.take_requests();
        inst.retry_module();
        assert_eq!(
            inst.take_requests(),
            vec![PageRequest::OpenDevice {
                module: ModuleKind::Evasion,
                device: Device::Camera
            }]
        );
    }

    #[test]
    fn test_dev_keys() {
        let mut inst = installation();
        assert!(inst.handle_key("r"));
        assert_eq!(inst.session().revealed().len(), 1);

        assert!(!inst.handle_key("ArrowRight"));
        inst.become_click("modal5").unwrap();
        assert!(inst.handle_key("ArrowRight"));
        assert!(inst.handle_key("Escape"));
        assert!(inst.session().active_panel().is_none());
        assert!(!inst.handle_key("q"));
    }

    #[test]
    fn test_target_before_measure_is_deferred() {
        let (models, _, _) = fake::service();
        let mut inst =
            Installation::new(ModalCatalog::builtin().unwrap(), Settings::default(), models, 1);
        inst.complete("modal1").unwrap();
        run(&mut inst, 5);
        assert_eq!(inst.organism().blobs.len(), 1);

        inst.set_viewport(800.0, 600.0);
        assert_eq!(inst.organism().blobs.len(), 2);
        assert_eq!(inst.organism().center().pos, Vec2::new(400.0, 300.0));
    }

    #[test]
    fn test_repeated_destination_clears_pending() {
        let mut inst = installation();
        inst.complete("modal3").unwrap();
        run(&mut inst, 60 * 30);
        assert!(inst.session().revealed().contains("modal3"));
        assert_eq!(inst.session().pending_target(), None);

        // A second run lands on the same modal
        inst.complete("modal3").unwrap();
        assert_eq!(inst.session().pending_target(), None);
        run(&mut inst, 60 * 5);
        assert_eq!(inst.organism().blobs.len(), 2);
        assert_eq!(inst.session().revealed().len(), 1);

        // A different modal still grows a new traveler
        inst.complete("modal5").unwrap();
        assert_eq!(inst.session().pending_target(), Some("modal5"));
        assert_eq!(inst.organism().blobs.len(), 3);
    }

    #[test]
    fn test_repeat_while_traveling_waits_for_arrival() {
        let mut inst = installation();
        inst.complete("modal3").unwrap();
        run(&mut inst, 10);
        inst.complete("modal3").unwrap();
        assert_eq!(inst.session().pending_target(), Some("modal3"));
        run(&mut inst, 60 * 30);
        assert_eq!(inst.session().pending_target(), None);
        assert_eq!(inst.organism().blobs.len(), 2);
    }

    #[test]
    fn test_retry_after_model_failure_reloads() {
        let (models, _, _) = fake::service();
        let mut inst =
            Installation::new(ModalCatalog::builtin().unwrap(), Settings::default(), models, 9);
        inst.set_viewport(1000.0, 800.0);
        inst.handle_key("3");
        inst.toggle_module();
        inst.device_ready(ModuleKind::Evasion);
        assert_eq!(inst.models.loads(), 1);

        inst.device_error(ModuleKind::Evasion, GameError::ModelLoad("fetch failed".into()));
        assert_eq!(inst.current_view().phase, GamePhase::Failed);
        assert!(!inst.models.is_loaded());

        inst.take_requests();
        inst.retry_module();
        assert_eq!(
            inst.take_requests(),
            vec![PageRequest::OpenDevice {
                module: ModuleKind::Evasion,
                device: Device::Camera
            }]
        );
        inst.device_ready(ModuleKind::Evasion);
        assert_eq!(inst.models.loads(), 2);
        assert_eq!(inst.current_view().phase, GamePhase::Active);
    }

    #[test]
    fn test_evasion_clock_waits_for_model() {
        let (models, ready) = fake::slow();
        let mut inst =
            Installation::new(ModalCatalog::builtin().unwrap(), Settings::default(), models, 5);
        inst.set_viewport(1000.0, 800.0);
        inst.handle_key("3");
        inst.toggle_module();
        inst.device_ready(ModuleKind::Evasion);
        run(&mut inst, 60 * 2);
        assert_eq!(inst.current_view().phase, GamePhase::Loading);

        ready.set(true);
        inst.model_ready();
        assert_eq!(inst.current_view().phase, GamePhase::Active);
        assert!(inst.current_view().status.iter().any(|l| l == "elapsed: 0.0s"));
    }

    #[test]
    fn test_gesture_waits_for_hand_tracker() {
        let mut inst = installation();
        inst.toggle_module();
        inst.take_requests();
        inst.device_ready(ModuleKind::Gesture);
        assert_eq!(
            inst.take_requests(),
            vec![PageRequest::LoadHandTracker {
                module: ModuleKind::Gesture
            }]
        );

        // Never completes on made-up hand counts
        run(&mut inst, 60 * 20);
        assert_eq!(inst.current_view().phase, GamePhase::Loading);
        assert!(inst.session().pending_target().is_none());
        assert!(!inst.take_requests().contains(&PageRequest::PollHands));

        inst.tracker_ready(ModuleKind::Gesture);
        assert_eq!(inst.current_view().phase, GamePhase::Active);
    }

    #[test]
    fn test_settings_keys() {
        let mut inst = installation();
        assert!(inst.settings().show_dev_controls);
        assert!(inst.handle_key("h"));
        assert!(!inst.settings().show_dev_controls);

        let before = inst.settings().quality;
        assert!(inst.handle_key("q"));
        assert_ne!(inst.settings().quality, before);

        assert!(inst.handle_key("m"));
        assert!(inst.settings().reduced_motion);
        assert_eq!(inst.settings().travel_jitter(), 0.0);
    }

    #[test]
    fn test_frame_clock_drives_steps() {
        let mut inst = installation();
        inst.frame(0.0).unwrap();
        inst.frame(1000.0 / 60.0 * 3.5).unwrap();
        // The first frame runs one step, the second about three
        assert!((3..=4).contains(&(inst.organism().time_ticks - 1)));
    }
}
