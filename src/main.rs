//! Physarum entry point
//!
//! In the browser this drives the canvas organism, the reveal labels, the
//! module panel and the detail panel. Natively it runs the choreographer
//! prompt proxy.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_app {
    use std::cell::RefCell;
    use std::rc::Rc;

    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use web_sys::{CanvasRenderingContext2d, Document, Element, HtmlCanvasElement, KeyboardEvent, MouseEvent};

    use physarum::detect::{DetectionModel, ModelService, parse_detections};
    use physarum::games::{Device, GameError, GamePhase, ModuleKind, ModuleView, Sample};
    use physarum::installation::{Installation, PageRequest};
    use physarum::panel::{ModalPanel, PanelContent};
    use physarum::render::canvas::CanvasPainter;
    use physarum::schedule::{LoopGuard, animation_loop};
    use physarum::{ModalCatalog, Settings};

    // Page-side devices and detectors. Results come back through the
    // callbacks handed to `install_bridge`.
    #[wasm_bindgen(inline_js = "
        const bridge = { streams: {}, audio: null, detector: null, loading: null, generation: 0 };

        function video() {
            return document.getElementById('module-video');
        }

        function reason(e) {
            return String((e && e.message) || e);
        }

        export function install_bridge(onReady, onError, onDetections, onHands, onModelReady, onTrackerReady) {
            Object.assign(bridge, { onReady, onError, onDetections, onHands, onModelReady, onTrackerReady });
        }

        export function open_device(module, kind) {
            if (!navigator.mediaDevices || !navigator.mediaDevices.getUserMedia) {
                bridge.onError(module, 'unavailable', 'media devices not supported');
                return;
            }
            const constraints = kind === 'microphone'
                ? { audio: true }
                : { video: { width: 640, height: 480 } };
            navigator.mediaDevices.getUserMedia(constraints).then(async (stream) => {
                bridge.streams[module] = stream;
                if (kind === 'microphone') {
                    const ctx = new AudioContext();
                    const analyser = ctx.createAnalyser();
                    analyser.fftSize = 256;
                    ctx.createMediaStreamSource(stream).connect(analyser);
                    bridge.audio = { ctx, analyser, bins: new Uint8Array(analyser.frequencyBinCount) };
                } else if (video()) {
                    video().srcObject = stream;
                    await video().play();
                }
                bridge.onReady(module);
            }).catch((e) => {
                const kind = e && e.name === 'NotAllowedError' ? 'denied' : 'unavailable';
                bridge.onError(module, kind, reason(e));
            });
        }

        export function release_device(module) {
            const stream = bridge.streams[module];
            if (stream) {
                stream.getTracks().forEach((t) => t.stop());
                delete bridge.streams[module];
            }
            if (bridge.audio && !Object.keys(bridge.streams).length) {
                bridge.audio.ctx.close();
                bridge.audio = null;
            }
            if (video() && !Object.keys(bridge.streams).length) {
                video().srcObject = null;
            }
        }

        export function read_spectrum() {
            if (!bridge.audio) return new Uint8Array(0);
            bridge.audio.analyser.getByteFrequencyData(bridge.audio.bins);
            return bridge.audio.bins;
        }

        export function load_detector(module) {
            if (bridge.loading) return;
            const generation = bridge.generation;
            const loader = window.cocoSsd
                ? window.cocoSsd.load()
                : Promise.reject(new Error('coco-ssd script missing'));
            bridge.loading = loader
                .then((model) => {
                    if (generation !== bridge.generation) {
                        if (model.dispose) model.dispose();
                        return;
                    }
                    bridge.detector = model;
                    bridge.onModelReady();
                })
                .catch((e) => {
                    if (generation !== bridge.generation) return;
                    bridge.loading = null;
                    bridge.onError(module, 'model', reason(e));
                });
        }

        export function detector_ready() {
            return bridge.detector !== null;
        }

        export function run_detector() {
            if (!bridge.detector || !video()) return;
            bridge.detector.detect(video())
                .then((found) => bridge.onDetections(JSON.stringify(found)))
                .catch(() => {});
        }

        export function load_hand_tracker(module) {
            const tracker = window.physarumHands;
            if (!tracker || !tracker.load || !tracker.detect) {
                bridge.onError(module, 'model', 'hand tracker script missing');
                return;
            }
            Promise.resolve(tracker.load())
                .then(() => bridge.onTrackerReady(module))
                .catch((e) => bridge.onError(module, 'model', reason(e)));
        }

        export function run_hand_tracker(module) {
            if (!video()) return;
            Promise.resolve()
                .then(() => window.physarumHands.detect(video()))
                .then((r) => bridge.onHands(r.count, r.confidence))
                .catch((e) => bridge.onError(module, 'model', reason(e)));
        }

        export function dispose_detector() {
            if (bridge.detector && bridge.detector.dispose) bridge.detector.dispose();
            bridge.generation += 1;
            bridge.detector = null;
            bridge.loading = null;
        }
    ")]
    extern "C" {
        fn install_bridge(
            on_ready: &Closure<dyn FnMut(u32)>,
            on_error: &Closure<dyn FnMut(u32, String, String)>,
            on_detections: &Closure<dyn FnMut(String)>,
            on_hands: &Closure<dyn FnMut(u32, f32)>,
            on_model_ready: &Closure<dyn FnMut()>,
            on_tracker_ready: &Closure<dyn FnMut(u32)>,
        );
        fn open_device(module: u32, kind: &str);
        fn release_device(module: u32);
        fn read_spectrum() -> Vec<u8>;
        fn load_detector(module: u32);
        fn detector_ready() -> bool;
        fn run_detector();
        fn load_hand_tracker(module: u32);
        fn run_hand_tracker(module: u32);
        fn dispose_detector();
    }

    /// coco-ssd running in the page
    struct PageDetector;

    impl DetectionModel for PageDetector {
        fn name(&self) -> &str {
            "coco-ssd"
        }

        fn request(&mut self) {
            run_detector();
        }

        fn is_ready(&self) -> bool {
            detector_ready()
        }

        fn dispose(&mut self) {
            dispose_detector();
        }
    }

    fn device_name(device: Device) -> &'static str {
        match device {
            Device::Camera => "camera",
            Device::Microphone => "microphone",
        }
    }

    fn escape(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
    }

    struct App {
        installation: Installation,
        painter: CanvasPainter,
        ctx: CanvasRenderingContext2d,
        canvas: HtmlCanvasElement,
        document: Document,
        /// Canvas size in CSS pixels as last applied
        size: (i32, i32),
        labels_shown: usize,
        last_view: Option<ModuleView>,
        last_panel: Option<String>,
        last_hints: Option<String>,
        frame_loop: Option<LoopGuard>,
    }

    impl App {
        fn element(&self, id: &str) -> Option<Element> {
            self.document.get_element_by_id(id)
        }

        fn resize(&mut self) {
            let w = self.canvas.client_width();
            let h = self.canvas.client_height();
            if (w, h) == self.size {
                return;
            }
            self.size = (w, h);
            let dpr = web_sys::window().map(|win| win.device_pixel_ratio()).unwrap_or(1.0);
            self.canvas.set_width((w as f64 * dpr) as u32);
            self.canvas.set_height((h as f64 * dpr) as u32);
            let _ = self.ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0);
            self.installation.set_viewport(w as f32, h as f32);
            self.labels_shown = usize::MAX;
        }

        fn frame(&mut self, time: f64) {
            self.resize();

            let view = self.installation.current_view();
            if view.phase == GamePhase::Active && view.kind == ModuleKind::Signal {
                self.installation.push_sample(Sample::Spectrum(read_spectrum()));
            }

            if let Err(e) = self.installation.frame(time) {
                log::warn!("Frame error: {}", e);
            }

            for request in self.installation.take_requests() {
                match request {
                    PageRequest::OpenDevice { module, device } => {
                        open_device(module.index() as u32, device_name(device));
                    }
                    PageRequest::ReleaseDevice { module, .. } => release_device(module.index() as u32),
                    PageRequest::LoadHandTracker { module } => load_hand_tracker(module.index() as u32),
                    PageRequest::PollHands => run_hand_tracker(ModuleKind::Gesture.index() as u32),
                }
            }

            if let Err(e) = self.painter.paint(&self.installation.scene()) {
                log::warn!("Paint failed: {:?}", e);
            }
            self.sync_labels();
            self.sync_module();
            self.sync_panel();
            self.sync_hints();
        }

        /// Key hints overlay, shown while dev controls are on
        fn sync_hints(&mut self) {
            let settings = self.installation.settings();
            let hints = settings.show_dev_controls.then(|| {
                format!(
                    "1 2 3 module · r reveal · q quality ({}) · m motion ({}) · h hide",
                    settings.quality.as_str(),
                    if settings.reduced_motion { "reduced" } else { "full" }
                )
            });
            if hints == self.last_hints {
                return;
            }
            if let Some(el) = self.element("dev-hints") {
                let _ = el.class_list().toggle_with_force("hidden", hints.is_none());
                el.set_text_content(hints.as_deref());
            }
            self.last_hints = hints;
        }

        /// Label plus "become" button over every revealed modal
        fn sync_labels(&mut self) {
            let revealed = self.installation.session().revealed();
            if revealed.len() == self.labels_shown {
                return;
            }
            self.labels_shown = revealed.len();
            let catalog = self.installation.session().catalog();
            let html: String = revealed
                .iter()
                .filter_map(|id| catalog.get(id))
                .map(|m| {
                    format!(
                        "<div class=\"label\" style=\"left:{:.2}%;top:{:.2}%\">\
                         <span>{}</span><button data-modal=\"{}\">become</button></div>",
                        m.x * 100.0,
                        m.y * 100.0,
                        escape(&m.name),
                        escape(&m.id)
                    )
                })
                .collect();
            if let Some(el) = self.element("labels") {
                el.set_inner_html(&html);
            }
        }

        fn sync_module(&mut self) {
            let view = self.installation.current_view();
            if self.last_view.as_ref() == Some(&view) {
                return;
            }
            if let Some(el) = self.element("module") {
                let _ = el.class_list().toggle_with_force("expanded", view.expanded);
            }
            if let Some(el) = self.element("module-title") {
                el.set_text_content(Some(view.title));
            }
            if let Some(el) = self.element("module-body") {
                let mut html = String::new();
                for line in &view.status {
                    html.push_str(&format!("<div>{}</div>", escape(line)));
                }
                if let Some(error) = &view.error {
                    html.push_str(&format!(
                        "<div class=\"error\">{}</div><button id=\"module-retry\">retry</button>",
                        escape(error)
                    ));
                }
                if let Some(text) = &view.explanation {
                    html.push_str(&format!("<div class=\"explanation\">{}</div>", escape(text)));
                }
                el.set_inner_html(&html);
            }
            self.last_view = Some(view);
        }

        fn sync_panel(&mut self) {
            let html = self.installation.session().active_panel().map(panel_html);
            if html == self.last_panel {
                return;
            }
            if let Some(el) = self.element("panel") {
                let _ = el.class_list().toggle_with_force("hidden", html.is_none());
            }
            if let Some(el) = self.element("panel-body") {
                el.set_inner_html(html.as_deref().unwrap_or(""));
            }
            self.last_panel = html;
        }

        fn dispose(&mut self) {
            // Dropping the guard cancels the pending animation frame
            self.frame_loop.take();
            self.installation.dispose();
            for request in self.installation.take_requests() {
                if let PageRequest::ReleaseDevice { module, .. } = request {
                    release_device(module.index() as u32);
                }
            }
        }
    }

    fn panel_html(panel: &ModalPanel) -> String {
        let title = format!("<h2>{}</h2>", escape(&panel.name));
        let body = match &panel.content {
            PanelContent::Text => format!("<p class=\"id\">{}</p>", escape(&panel.id)),
            PanelContent::Gallery(gallery) => match gallery.current() {
                Some(src) => format!(
                    "<img src=\"{}\"><div class=\"pager\">{} / {}</div>",
                    escape(src),
                    gallery.index() + 1,
                    gallery.len()
                ),
                None => "<div class=\"pager\">empty</div>".to_string(),
            },
            PanelContent::Heartbeat { monitor, strip } => {
                let trace = monitor.trace();
                let points: String = trace
                    .iter()
                    .enumerate()
                    .map(|(i, v)| format!("{},{:.1} ", i, v * 100.0))
                    .collect();
                let images = match strip.current() {
                    Some(src) => format!(
                        "<img src=\"{}\"><div class=\"pager\">{} / {}</div>",
                        escape(src),
                        strip.index() + 1,
                        strip.len()
                    ),
                    None => String::new(),
                };
                format!(
                    "<div class=\"bpm{}\">{:.0} bpm</div>\
                     <svg viewBox=\"0 0 {} 100\"><polyline points=\"{}\"/></svg>{}",
                    if monitor.is_stuck() { " stuck" } else { "" },
                    monitor.bpm,
                    trace.len(),
                    points,
                    images
                )
            }
        };
        title + &body
    }

    fn error_for(kind: &str, message: String) -> GameError {
        match kind {
            "denied" => GameError::PermissionDenied(message),
            "model" => GameError::ModelLoad(message),
            _ => GameError::DeviceUnavailable(message),
        }
    }

    fn module_at(index: u32) -> Option<ModuleKind> {
        ModuleKind::ALL.get(index as usize).copied()
    }

    pub fn run() -> Result<(), JsValue> {
        let _ = console_log::init_with_level(log::Level::Info);
        console_error_panic_hook::set_once();

        log::info!("Physarum starting...");

        let window = web_sys::window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;
        let canvas: HtmlCanvasElement = document
            .get_element_by_id("canvas")
            .ok_or("no canvas")?
            .dyn_into()?;
        let ctx: CanvasRenderingContext2d = canvas
            .get_context("2d")?
            .ok_or("no 2d context")?
            .dyn_into()?;

        let catalog = ModalCatalog::builtin().map_err(|e| JsValue::from_str(&e.to_string()))?;
        let models = ModelService::new(Box::new(|| {
            load_detector(ModuleKind::Evasion.index() as u32);
            Ok(Box::new(PageDetector) as Box<dyn DetectionModel>)
        }));
        let seed = js_sys::Date::now() as u64;
        let installation = Installation::new(catalog, Settings::load(), models, seed);
        log::info!("Installation seeded with {}", seed);

        let app = Rc::new(RefCell::new(App {
            installation,
            painter: CanvasPainter::new(ctx.clone()),
            ctx,
            canvas,
            document: document.clone(),
            size: (0, 0),
            labels_shown: usize::MAX,
            last_view: None,
            last_panel: None,
            last_hints: None,
            frame_loop: None,
        }));

        setup_bridge(app.clone());
        setup_input_handlers(&document, app.clone())?;

        if let Some(loading) = document.get_element_by_id("loading") {
            let _ = loading.set_attribute("class", "hidden");
        }

        let frame_app = app.clone();
        let guard = animation_loop(move |time| frame_app.borrow_mut().frame(time))?;
        app.borrow_mut().frame_loop = Some(guard);

        // Page teardown releases devices and the model
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                app.borrow_mut().dispose();
            });
            window.add_event_listener_with_callback("pagehide", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }

        log::info!("Physarum running!");
        Ok(())
    }

    fn setup_bridge(app: Rc<RefCell<App>>) {
        let on_ready = {
            let app = app.clone();
            Closure::<dyn FnMut(u32)>::new(move |module: u32| {
                if let Some(kind) = module_at(module) {
                    app.borrow_mut().installation.device_ready(kind);
                }
            })
        };
        let on_error = {
            let app = app.clone();
            Closure::<dyn FnMut(u32, String, String)>::new(move |module: u32, kind: String, message: String| {
                if let Some(module) = module_at(module) {
                    app.borrow_mut()
                        .installation
                        .device_error(module, error_for(&kind, message));
                }
            })
        };
        let on_detections = {
            let app = app.clone();
            Closure::<dyn FnMut(String)>::new(move |json: String| match parse_detections(&json) {
                Ok(detections) => app
                    .borrow_mut()
                    .installation
                    .push_sample(Sample::Detections(detections)),
                Err(e) => log::warn!("Bad detector output: {}", e),
            })
        };
        let on_hands = {
            let app = app.clone();
            Closure::<dyn FnMut(u32, f32)>::new(move |count: u32, confidence: f32| {
                app.borrow_mut()
                    .installation
                    .push_sample(Sample::Hands { count, confidence });
            })
        };
        let on_model_ready = {
            let app = app.clone();
            Closure::<dyn FnMut()>::new(move || app.borrow_mut().installation.model_ready())
        };
        let on_tracker_ready = Closure::<dyn FnMut(u32)>::new(move |module: u32| {
            if let Some(kind) = module_at(module) {
                app.borrow_mut().installation.tracker_ready(kind);
            }
        });

        install_bridge(
            &on_ready,
            &on_error,
            &on_detections,
            &on_hands,
            &on_model_ready,
            &on_tracker_ready,
        );
        on_ready.forget();
        on_error.forget();
        on_detections.forget();
        on_hands.forget();
        on_model_ready.forget();
        on_tracker_ready.forget();
    }

    fn setup_input_handlers(document: &Document, app: Rc<RefCell<App>>) -> Result<(), JsValue> {
        let window = web_sys::window().ok_or("no window")?;

        // Keyboard
        {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                let key = event.key();
                let handled = app.borrow_mut().installation.handle_key(&key);
                if handled && key == " " {
                    event.prevent_default();
                }
            });
            window.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }

        // "become" buttons are re-rendered, so listen on their container
        if let Some(labels) = document.get_element_by_id("labels") {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let Some(target) = event.target().and_then(|t| t.dyn_into::<Element>().ok()) else {
                    return;
                };
                if let Some(id) = target.get_attribute("data-modal") {
                    if let Err(e) = app.borrow_mut().installation.become_click(&id) {
                        log::warn!("Cannot open {}: {}", id, e);
                    }
                }
            });
            labels.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }

        // Module header toggles, retry button restarts
        if let Some(module) = document.get_element_by_id("module") {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: MouseEvent| {
                let Some(target) = event.target().and_then(|t| t.dyn_into::<Element>().ok()) else {
                    return;
                };
                let mut app = app.borrow_mut();
                if target.id() == "module-retry" {
                    app.installation.retry_module();
                } else if target.closest("#module-title").ok().flatten().is_some() {
                    app.installation.toggle_module();
                }
            });
            module.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }

        if let Some(close) = document.get_element_by_id("panel-close") {
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: MouseEvent| {
                app.borrow_mut().installation.close_panel();
            });
            close.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }

        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    if let Err(e) = wasm_app::run() {
        log::error!("Physarum failed to start: {:?}", e);
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use anyhow::Context;
    use physarum::proxy::{self, ProxyConfig};

    env_logger::init();
    log::info!("Physarum choreographer proxy starting...");

    let config = ProxyConfig::from_env();
    proxy::run(config).await.context("choreographer proxy failed")?;
    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}
