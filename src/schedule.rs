//! Frame and interval scheduling
//!
//! The animation loop is a guarded resource: whoever holds the `LoopGuard`
//! owns the loop, and dropping the guard stops it and runs its release hooks
//! (camera and microphone handles, intervals).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::consts::{MAX_SUBSTEPS, SIM_DT};

/// Longest frame gap fed to the simulation (tab in background, debugger)
const MAX_FRAME_DT: f32 = 0.1;

/// Turns wall-clock frame timestamps into whole fixed simulation steps
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last_ms: Option<f64>,
    accumulator: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a frame timestamp in milliseconds. Returns the number of
    /// `SIM_DT` steps to run, at most `MAX_SUBSTEPS`.
    pub fn advance(&mut self, now_ms: f64) -> u32 {
        let dt = match self.last_ms {
            Some(last) => (((now_ms - last) / 1000.0) as f32).clamp(0.0, MAX_FRAME_DT),
            None => SIM_DT,
        };
        self.last_ms = Some(now_ms);

        self.accumulator += dt;
        let mut steps = 0;
        while self.accumulator >= SIM_DT && steps < MAX_SUBSTEPS {
            self.accumulator -= SIM_DT;
            steps += 1;
        }
        // Drop whatever the substep cap left behind
        if steps == MAX_SUBSTEPS {
            self.accumulator = self.accumulator.min(SIM_DT);
        }
        steps
    }

    /// Leftover fraction of a step, 0.0 to 1.0
    pub fn alpha(&self) -> f32 {
        (self.accumulator / SIM_DT).clamp(0.0, 1.0)
    }
}

/// Fires at a fixed interval of simulation time, independent of frame rate
#[derive(Debug, Clone)]
pub struct Cadence {
    interval: f32,
    elapsed: f32,
    primed: bool,
}

impl Cadence {
    pub fn new(interval: f32) -> Self {
        Self {
            interval,
            elapsed: 0.0,
            primed: false,
        }
    }

    pub fn interval(&self) -> f32 {
        self.interval
    }

    /// True on the first call and then once per elapsed interval
    pub fn due(&mut self, dt: f32) -> bool {
        if !self.primed {
            self.primed = true;
            self.elapsed = 0.0;
            return true;
        }
        self.elapsed += dt;
        if self.elapsed >= self.interval {
            self.elapsed -= self.interval;
            // Never queue a burst after a long stall
            self.elapsed = self.elapsed.min(self.interval);
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.primed = false;
    }
}

/// Cheap clonable view on whether a loop should keep running
#[derive(Debug, Clone)]
pub struct LoopHandle {
    running: Rc<Cell<bool>>,
}

impl LoopHandle {
    pub fn is_running(&self) -> bool {
        self.running.get()
    }
}

/// Owns a running loop. Stopping or dropping it ends the loop exactly once.
pub struct LoopGuard {
    running: Rc<Cell<bool>>,
    on_stop: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl LoopGuard {
    pub fn new() -> Self {
        Self {
            running: Rc::new(Cell::new(true)),
            on_stop: RefCell::new(Vec::new()),
        }
    }

    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            running: self.running.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Register a release hook; runs immediately if already stopped
    pub fn on_stop(&self, hook: impl FnOnce() + 'static) {
        if self.running.get() {
            self.on_stop.borrow_mut().push(Box::new(hook));
        } else {
            hook();
        }
    }

    pub fn stop(&self) {
        if !self.running.replace(false) {
            return;
        }
        let hooks = std::mem::take(&mut *self.on_stop.borrow_mut());
        log::debug!("Stopping loop, {} release hooks", hooks.len());
        // Release in reverse acquisition order
        for hook in hooks.into_iter().rev() {
            hook();
        }
    }
}

impl Default for LoopGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

/// requestAnimationFrame loop that lives exactly as long as its guard
#[cfg(target_arch = "wasm32")]
pub fn animation_loop(mut frame: impl FnMut(f64) + 'static) -> Result<LoopGuard, wasm_bindgen::JsValue> {
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::Closure;

    let window = web_sys::window().ok_or_else(|| wasm_bindgen::JsValue::from_str("no window"))?;
    let guard = LoopGuard::new();
    let handle = guard.handle();

    let callback: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>> = Rc::new(RefCell::new(None));
    let request_id = Rc::new(Cell::new(0));

    {
        let callback_ref = callback.clone();
        let request_id = request_id.clone();
        let window = window.clone();
        *callback.borrow_mut() = Some(Closure::new(move |time: f64| {
            if !handle.is_running() {
                return;
            }
            frame(time);
            if !handle.is_running() {
                return;
            }
            if let Some(cb) = callback_ref.borrow().as_ref() {
                if let Ok(id) = window.request_animation_frame(cb.as_ref().unchecked_ref()) {
                    request_id.set(id);
                }
            }
        }));
    }

    if let Some(cb) = callback.borrow().as_ref() {
        request_id.set(window.request_animation_frame(cb.as_ref().unchecked_ref())?);
    }

    guard.on_stop(move || {
        let _ = window.cancel_animation_frame(request_id.get());
        // Break the closure's self-reference
        callback.borrow_mut().take();
        log::info!("Animation loop stopped");
    });
    Ok(guard)
}
