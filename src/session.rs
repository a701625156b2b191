//! Root page session state
//!
//! Lives for one visit and is lost on reload. Owns the revealed set, the
//! pending target handed to the organism, the open detail panel and which
//! mini-game module is showing.

use rand::Rng;
use thiserror::Error;

use crate::config::{ConfigError, ModalCatalog};
use crate::games::ModuleKind;
use crate::panel::ModalPanel;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Modal ids the visitor has unlocked, in reveal order.
///
/// Grows monotonically; there is no removal API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevealedSet {
    ids: Vec<String>,
}

impl RevealedSet {
    pub fn new() -> Self {
        Self { ids: Vec::new() }
    }

    /// Returns true if `id` was not already present
    pub fn insert(&mut self, id: &str) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|r| r == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Root page session
#[derive(Debug, Clone)]
pub struct Session {
    catalog: ModalCatalog,
    revealed: RevealedSet,
    /// Destination chosen by the last completed module, until revealed
    pending_target: Option<String>,
    active_panel: Option<ModalPanel>,
    current_module: ModuleKind,
    module_expanded: bool,
}

impl Session {
    pub fn new(catalog: ModalCatalog) -> Self {
        Self {
            catalog,
            revealed: RevealedSet::new(),
            pending_target: None,
            active_panel: None,
            current_module: ModuleKind::Gesture,
            module_expanded: false,
        }
    }

    pub fn catalog(&self) -> &ModalCatalog {
        &self.catalog
    }

    pub fn revealed(&self) -> &RevealedSet {
        &self.revealed
    }

    pub fn pending_target(&self) -> Option<&str> {
        self.pending_target.as_deref()
    }

    pub fn active_panel(&self) -> Option<&ModalPanel> {
        self.active_panel.as_ref()
    }

    pub fn active_panel_mut(&mut self) -> Option<&mut ModalPanel> {
        self.active_panel.as_mut()
    }

    pub fn current_module(&self) -> ModuleKind {
        self.current_module
    }

    pub fn module_expanded(&self) -> bool {
        self.module_expanded
    }

    /// A module finished and picked where the organism grows next
    pub fn on_complete(&mut self, destination: &str) -> Result<(), SessionError> {
        self.catalog.require(destination)?;
        log::info!("Module selected destination {}", destination);
        self.pending_target = Some(destination.to_string());
        Ok(())
    }

    /// The organism reached a modal. Idempotent.
    ///
    /// The id joins the revealed set before the pending target is cleared.
    /// Returns true when the modal was newly revealed.
    pub fn on_reveal(&mut self, id: &str) -> Result<bool, SessionError> {
        self.catalog.require(id)?;
        let newly = self.revealed.insert(id);
        if newly {
            log::info!("Revealed {}", id);
        }
        if self.pending_target.as_deref() == Some(id) {
            self.pending_target = None;
        }
        Ok(newly)
    }

    /// The visitor pressed "become" on a revealed label
    pub fn on_become_click(&mut self, id: &str) -> Result<&ModalPanel, SessionError> {
        let modal = self.catalog.require(id)?;
        let panel = ModalPanel::open(modal);
        Ok(self.active_panel.insert(panel))
    }

    pub fn close_panel(&mut self) {
        if let Some(panel) = self.active_panel.take() {
            log::info!("Closed panel {}", panel.id);
        }
    }

    /// Reveal a random unrevealed modal (dev shortcut)
    pub fn reveal_random<R: Rng>(&mut self, rng: &mut R) -> Option<String> {
        let unrevealed: Vec<String> = self
            .catalog
            .iter()
            .filter(|m| !self.revealed.contains(&m.id))
            .map(|m| m.id.clone())
            .collect();
        if unrevealed.is_empty() {
            return None;
        }
        let id = unrevealed[rng.random_range(0..unrevealed.len())].clone();
        self.revealed.insert(&id);
        log::info!("Revealed {} (dev shortcut)", id);
        Some(id)
    }

    /// Show a module, collapsed
    pub fn select_module(&mut self, kind: ModuleKind) {
        self.current_module = kind;
        self.module_expanded = false;
    }

    /// Advance through the module cycle
    pub fn next_module(&mut self) -> ModuleKind {
        self.select_module(self.current_module.next());
        self.current_module
    }

    pub fn toggle_expanded(&mut self) {
        self.module_expanded = !self.module_expanded;
    }
}
