use lifetrack_core::module::{LifecyclePhase, ModuleState};
use lifetrack_core::{
    listener, open_store_in_memory, EventBus, EventName, LoadOutcome, MemoryMount, Module,
    ModuleContext, ModuleError, ModuleRegistry, ModuleResult, MountView, RegistryError,
    DB_VERSION,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};

type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Clone, Copy, PartialEq)]
enum Fault {
    None,
    Render,
    Init,
    Panic,
}

struct ScriptedModule {
    name: &'static str,
    journal: Journal,
    fault: Arc<Mutex<Fault>>,
    switch_to: Option<&'static str>,
}

impl ScriptedModule {
    fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: Arc::clone(journal),
            fault: Arc::new(Mutex::new(Fault::None)),
            switch_to: None,
        }
    }

    fn log(&self, step: &str) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}:{step}", self.name));
    }
}

impl Module for ScriptedModule {
    fn render(&mut self, _ctx: &ModuleContext) -> ModuleResult<String> {
        self.log("render");
        match *self.fault.lock().unwrap() {
            Fault::Render => Err(ModuleError::failed("template missing")),
            _ => Ok(format!("<section>{}</section>", self.name)),
        }
    }

    fn init(&mut self, ctx: &ModuleContext) -> ModuleResult<()> {
        self.log("init");
        if let Some(target) = self.switch_to {
            ctx.bus
                .emit(EventName::ModuleChanged, &[Value::from(target)]);
        }
        match *self.fault.lock().unwrap() {
            Fault::Init => Err(ModuleError::failed("listener wiring failed")),
            Fault::Panic => panic!("init exploded"),
            _ => Ok(()),
        }
    }

    fn cleanup(&mut self, _ctx: &ModuleContext) -> ModuleResult<()> {
        self.log("cleanup");
        Ok(())
    }
}

struct Harness {
    registry: Arc<ModuleRegistry>,
    mount: Arc<MemoryMount>,
    bus: Arc<EventBus>,
    journal: Journal,
}

fn harness() -> Harness {
    let bus = Arc::new(EventBus::new());
    let store = Arc::new(open_store_in_memory(DB_VERSION, Arc::clone(&bus)).unwrap());
    let mount = Arc::new(MemoryMount::new());
    let registry = ModuleRegistry::new(ModuleContext::new(store, Arc::clone(&bus)), mount.clone());
    registry.attach();

    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    for (event, label) in [
        (EventName::ModuleLoaded, "loaded"),
        (EventName::ModuleUnloaded, "unloaded"),
    ] {
        let sink = Arc::clone(&journal);
        bus.on(
            event,
            listener(move |args| {
                let name = args.first().and_then(Value::as_str).unwrap_or("?");
                sink.lock().unwrap().push(format!("event:{label}:{name}"));
                Ok(())
            }),
        );
    }

    Harness {
        registry,
        mount,
        bus,
        journal,
    }
}

impl Harness {
    fn register(&self, name: &'static str) -> Arc<Mutex<Fault>> {
        let module = ScriptedModule::new(name, &self.journal);
        let fault = Arc::clone(&module.fault);
        self.registry.register_module(name, Box::new(module)).unwrap();
        fault
    }

    fn take_journal(&self) -> Vec<String> {
        std::mem::take(&mut *self.journal.lock().unwrap())
    }
}

#[test]
fn switching_cleans_up_before_next_init_and_orders_events() {
    let h = harness();
    h.register("yemek");
    h.register("spor");

    assert_eq!(h.registry.load_module("yemek").unwrap(), LoadOutcome::Loaded);
    h.take_journal();
    assert_eq!(h.registry.load_module("spor").unwrap(), LoadOutcome::Loaded);

    assert_eq!(
        h.take_journal(),
        vec![
            "yemek:cleanup",
            "event:unloaded:yemek",
            "spor:render",
            "spor:init",
            "event:loaded:spor",
        ]
    );
    assert_eq!(h.registry.current_module().as_deref(), Some("spor"));
    assert_eq!(
        h.registry.module_status("yemek").unwrap().state,
        ModuleState::Registered
    );
}

#[test]
fn at_most_one_module_is_loaded_after_any_sequence() {
    let h = harness();
    for name in ["meal", "todo", "routine"] {
        h.register(name);
    }
    for name in ["meal", "todo", "todo", "routine", "meal", "missing", "todo"] {
        let _ = h.registry.load_module(name);
        assert!(h.registry.loaded_count() <= 1, "after loading {name}");
    }
    assert_eq!(h.registry.loaded_count(), 1);
    assert_eq!(h.registry.current_module().as_deref(), Some("todo"));
}

#[test]
fn render_failure_shows_retryable_panel_and_leaves_nothing_current() {
    let h = harness();
    h.register("meal");
    let fault = h.register("todo");
    *fault.lock().unwrap() = Fault::Render;

    h.registry.load_module("meal").unwrap();
    let err = h.registry.load_module("todo").unwrap_err();
    match err {
        RegistryError::ModuleFailed { module, phase, .. } => {
            assert_eq!(module, "todo");
            assert_eq!(phase, LifecyclePhase::Render);
        }
        other => panic!("unexpected error: {other}"),
    }

    match h.mount.view() {
        MountView::Error(panel) => {
            assert_eq!(panel.module, "todo");
            assert!(panel.message.contains("template missing"));
            assert!(panel.retry_available);
        }
        other => panic!("expected error panel, got {other:?}"),
    }
    assert_eq!(h.registry.current_module(), None);
    assert_eq!(h.registry.loaded_count(), 0);
    assert_eq!(h.registry.failed_module().as_deref(), Some("todo"));
}

#[test]
fn init_failure_runs_cleanup_and_retry_recovers() {
    let h = harness();
    let fault = h.register("todo");
    *fault.lock().unwrap() = Fault::Init;

    let err = h.registry.load_module("todo").unwrap_err();
    assert!(matches!(
        err,
        RegistryError::ModuleFailed { phase: LifecyclePhase::Init, .. }
    ));
    assert_eq!(
        h.take_journal(),
        vec!["todo:render", "todo:init", "todo:cleanup"]
    );
    assert!(!h.registry.module_status("todo").unwrap().loaded);

    *fault.lock().unwrap() = Fault::None;
    assert_eq!(
        h.registry.retry_failed().unwrap(),
        Some(LoadOutcome::Loaded)
    );
    assert_eq!(h.registry.current_module().as_deref(), Some("todo"));
    assert_eq!(h.registry.retry_failed().unwrap(), None);
    assert!(matches!(h.mount.view(), MountView::Content { .. }));
}

#[test]
fn panicking_init_is_contained() {
    let h = harness();
    let fault = h.register("prayer");
    *fault.lock().unwrap() = Fault::Panic;

    let err = h.registry.load_module("prayer").unwrap_err();
    assert!(matches!(err, RegistryError::ModuleFailed { .. }));
    assert!(matches!(h.mount.view(), MountView::Error(_)));

    h.register("todo");
    assert_eq!(h.registry.load_module("todo").unwrap(), LoadOutcome::Loaded);
}

#[test]
fn switch_goes_through_the_bus() {
    let h = harness();
    h.register("meal");
    h.register("todo");

    assert_eq!(h.registry.switch_module("todo"), 1);
    assert_eq!(h.registry.current_module().as_deref(), Some("todo"));

    h.bus
        .emit(EventName::ModuleChanged, &[Value::from("meal")]);
    assert_eq!(h.registry.current_module().as_deref(), Some("meal"));

    assert!(h.registry.detach());
    assert_eq!(h.registry.switch_module("todo"), 0);
    assert_eq!(h.registry.current_module().as_deref(), Some("meal"));
}

#[test]
fn switch_requested_during_init_runs_after_the_transition() {
    let h = harness();
    let mut redirecting = ScriptedModule::new("dashboard", &h.journal);
    redirecting.switch_to = Some("todo");
    h.registry
        .register_module("dashboard", Box::new(redirecting))
        .unwrap();
    h.register("todo");

    assert_eq!(
        h.registry.load_module("dashboard").unwrap(),
        LoadOutcome::Loaded
    );
    assert_eq!(
        h.take_journal(),
        vec![
            "dashboard:render",
            "dashboard:init",
            "event:loaded:dashboard",
            "dashboard:cleanup",
            "event:unloaded:dashboard",
            "todo:render",
            "todo:init",
            "event:loaded:todo",
        ]
    );
    assert_eq!(h.registry.current_module().as_deref(), Some("todo"));
}

#[test]
fn unload_module_marks_it_unloaded() {
    let h = harness();
    h.register("todo");
    h.registry.load_module("todo").unwrap();

    assert!(h.registry.unload_module("todo").unwrap());
    assert!(!h.registry.unload_module("todo").unwrap());
    assert_eq!(h.registry.current_module(), None);
    assert_eq!(h.mount.view(), MountView::Empty);
    assert!(matches!(
        h.registry.unload_module("missing"),
        Err(RegistryError::ModuleNotFound(_))
    ));
}
