//! WebAssembly content-script bindings for ScriptGuard

mod console;

use std::cell::RefCell;
use std::rc::Rc;

use sg_core::domain::extract_host;
use sg_core::{
    Catalog, EngineConfig, ExecutionGuard, Injector, Matcher, PageContext, RegistryError, Scriptlet, ScriptletError,
    ScriptletId, ScriptletRegistry,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

// =============================================================================
// JS-backed scriptlets
// =============================================================================

/// Scriptlet implemented by a JS function bundled with the extension.
struct JsScriptlet {
    id: ScriptletId,
    function: js_sys::Function,
}

impl JsScriptlet {
    fn new(body: &str, function: js_sys::Function) -> Self {
        Self {
            id: ScriptletId::from_rule_body(body),
            function,
        }
    }
}

impl Scriptlet for JsScriptlet {
    fn id(&self) -> ScriptletId {
        self.id
    }

    fn run(&self) -> Result<(), ScriptletError> {
        self.function
            .call0(&JsValue::UNDEFINED)
            .map(|_| ())
            .map_err(|thrown| ScriptletError::Thrown(describe_thrown(&thrown)))
    }
}

fn describe_thrown(value: &JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return format!("{}: {}", String::from(error.name()), String::from(error.message()));
    }
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

/// Build the registry from a `{ [ruleBody]: function }` object.
fn registry_from_js(value: &JsValue) -> Result<ScriptletRegistry, JsValue> {
    let object = value
        .dyn_ref::<js_sys::Object>()
        .ok_or_else(|| JsValue::from_str("Scriptlet registry must be an object"))?;

    let mut builder = ScriptletRegistry::builder();
    for entry in js_sys::Object::entries(object).iter() {
        let pair = js_sys::Array::from(&entry);
        let body = pair
            .get(0)
            .as_string()
            .ok_or_else(|| JsValue::from_str("Scriptlet key must be a string"))?;
        let function = pair
            .get(1)
            .dyn_into::<js_sys::Function>()
            .map_err(|_| JsValue::from_str(&format!("Scriptlet for {:?} is not a function", body)))?;

        let scriptlet = Rc::new(JsScriptlet::new(&body, function));
        builder.register(body, scriptlet).map_err(registry_error)?;
    }

    Ok(builder.build())
}

fn registry_error(e: RegistryError) -> JsValue {
    JsValue::from_str(&format!("Failed to build scriptlet registry: {}", e))
}

// =============================================================================
// Engine state
// =============================================================================

struct EngineState {
    matcher: Matcher,
    injector: Injector,
}

thread_local! {
    static ENGINE: RefCell<Option<EngineState>> = const { RefCell::new(None) };
}

/// Run `f` on the engine, or return `default` when it is not initialized or
/// already borrowed by a scriptlet calling back into the bindings.
fn with_engine<R>(default: R, f: impl FnOnce(&mut EngineState) -> R) -> R {
    ENGINE.with(|cell| match cell.try_borrow_mut() {
        Ok(mut slot) => match slot.as_mut() {
            Some(state) => f(state),
            None => default,
        },
        Err(_) => {
            log::warn!("re-entrant call from a scriptlet ignored");
            default
        }
    })
}

// =============================================================================
// Exports
// =============================================================================

#[wasm_bindgen]
pub fn init(config_json: &str, catalog_json: Option<String>, registry: JsValue) -> Result<(), JsValue> {
    let config =
        EngineConfig::from_json(config_json).map_err(|e| JsValue::from_str(&format!("Failed to load config: {}", e)))?;
    let level = config
        .log_level_filter()
        .map_err(|e| JsValue::from_str(&format!("Failed to load config: {}", e)))?;
    console::init(level);

    let catalog = catalog_json
        .as_deref()
        .map(Catalog::from_json)
        .transpose()
        .map_err(|e| JsValue::from_str(&format!("Failed to load catalog: {}", e)))?;

    let registry = Rc::new(registry_from_js(&registry)?);
    let matcher = config.build_matcher(catalog);

    log::info!(
        "initialized: {} scriptlets, {} JS rules, browser {:?}",
        registry.len(),
        matcher.rule_count(),
        config.browser
    );

    let state = EngineState {
        matcher,
        injector: Injector::new(registry, ExecutionGuard::new()),
    };

    ENGINE.with(|cell| {
        let mut slot = cell
            .try_borrow_mut()
            .map_err(|_| JsValue::from_str("Cannot reinitialize from inside a scriptlet"))?;
        *slot = Some(state);
        Ok(())
    })
}

#[wasm_bindgen]
pub fn is_initialized() -> bool {
    ENGINE.with(|cell| cell.try_borrow().map(|slot| slot.is_some()).unwrap_or(true))
}

/// Inject one rule body. Returns the `ExecutionResult` code.
#[wasm_bindgen]
pub fn inject(body: &str) -> u8 {
    with_engine(0, |state| state.injector.inject(body) as u8)
}

#[wasm_bindgen]
pub fn apply_page(url: &str, tab_id: i32, frame_id: i32) -> JsValue {
    let ctx = PageContext {
        url,
        host: extract_host(url).unwrap_or(""),
        tab_id,
        frame_id,
    };
    let stats = with_engine(Default::default(), |state| state.injector.inject_page(&state.matcher, &ctx));

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"executed".into(), &JsValue::from(stats.executed));
    let _ = js_sys::Reflect::set(&result, &"alreadyRun".into(), &JsValue::from(stats.already_run));
    let _ = js_sys::Reflect::set(&result, &"notFound".into(), &JsValue::from(stats.not_found));
    let _ = js_sys::Reflect::set(&result, &"failed".into(), &JsValue::from(stats.failed));
    result.into()
}

/// Add JS rules from user rules text. Returns how many were accepted.
#[wasm_bindgen]
pub fn add_user_rules(text: &str) -> u32 {
    with_engine(0, |state| state.matcher.add_user_rules(text) as u32)
}

/// Drop every execution marker; call when the frame navigates.
#[wasm_bindgen]
pub fn new_document() {
    with_engine((), |state| state.injector.reset_document())
}

#[wasm_bindgen]
pub fn can_inject(url: &str) -> bool {
    with_engine(false, |state| state.matcher.policy().can_inject(url))
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    fn counter_registry() -> JsValue {
        let registry = js_sys::Object::new();
        let _ = js_sys::Reflect::set(
            &registry,
            &"window.foo = 1;".into(),
            &js_sys::Function::new_no_args("globalThis.__sgFoo = (globalThis.__sgFoo || 0) + 1;"),
        );
        let _ = js_sys::Reflect::set(
            &registry,
            &"boom();".into(),
            &js_sys::Function::new_no_args("throw new Error('boom');"),
        );
        let _ = js_sys::Reflect::set(
            &registry,
            &"window.bar = 2;".into(),
            &js_sys::Function::new_no_args("globalThis.__sgBar = 2;"),
        );
        registry.into()
    }

    fn global(name: &str) -> JsValue {
        js_sys::Reflect::get(&js_sys::global(), &name.into()).expect("global should be readable")
    }

    fn reset_globals() {
        let _ = js_sys::Reflect::delete_property(&js_sys::global(), &"__sgFoo".into());
        let _ = js_sys::Reflect::delete_property(&js_sys::global(), &"__sgBar".into());
    }

    #[wasm_bindgen_test]
    fn uninitialized_calls_do_nothing() {
        ENGINE.with(|cell| *cell.borrow_mut() = None);
        assert!(!is_initialized());
        assert_eq!(inject("window.foo = 1;"), 0);
        assert_eq!(add_user_rules("#%#window.foo = 1;"), 0);
        assert!(!can_inject("https://example.org/"));
    }

    #[wasm_bindgen_test]
    fn injects_once_per_document() {
        reset_globals();
        init("{}", None, counter_registry()).expect("init should succeed");

        assert_eq!(inject("window.foo = 1;"), 2);
        assert_eq!(inject("window.foo = 1;"), 1);
        assert_eq!(global("__sgFoo").as_f64(), Some(1.0));

        new_document();
        assert_eq!(inject("window.foo = 1;"), 2);
        assert_eq!(global("__sgFoo").as_f64(), Some(2.0));
    }

    #[wasm_bindgen_test]
    fn thrown_errors_are_contained() {
        reset_globals();
        init("{}", None, counter_registry()).expect("init should succeed");

        assert_eq!(inject("boom();"), 3);
        assert_eq!(inject("window.bar = 2;"), 2);
        assert_eq!(global("__sgBar").as_f64(), Some(2.0));
        assert_eq!(inject("boom();"), 1);
    }

    #[wasm_bindgen_test]
    fn markers_are_not_visible_to_the_page() {
        reset_globals();
        init("{}", None, counter_registry()).expect("init should succeed");
        inject("window.foo = 1;");

        let marker = ScriptletId::from_rule_body("window.foo = 1;").to_string();
        let keys = js_sys::Object::keys(&js_sys::global());
        assert!(!keys.iter().any(|key| key.as_string().map_or(false, |key| key.contains(&marker))));
    }

    #[wasm_bindgen_test]
    fn applies_matched_rules() {
        reset_globals();
        init(r#"{ "browser": "firefox" }"#, None, counter_registry()).expect("init should succeed");
        assert_eq!(add_user_rules("example.org#%#window.foo = 1;\n#%#missing();"), 2);

        let stats = apply_page("https://example.org/", 1, 0);
        let field = |name: &str| js_sys::Reflect::get(&stats, &name.into()).expect("field").as_f64();
        assert_eq!(field("executed"), Some(1.0));
        assert_eq!(field("notFound"), Some(1.0));
        assert_eq!(field("failed"), Some(0.0));

        assert!(!can_inject("https://addons.mozilla.org/"));
    }

    #[wasm_bindgen_test]
    fn init_can_run_repeatedly() {
        init(r#"{ "logLevel": "debug" }"#, None, counter_registry()).expect("init should succeed");
        assert_eq!(log::max_level(), log::LevelFilter::Debug);

        // the panic hook and logger are installed once; later calls only move the level
        init(r#"{ "logLevel": "error" }"#, None, counter_registry()).expect("init should succeed");
        assert_eq!(log::max_level(), log::LevelFilter::Error);
        assert!(is_initialized());
    }

    #[wasm_bindgen_test]
    fn rejects_bad_registry() {
        let registry = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&registry, &"x();".into(), &JsValue::from(1));
        assert!(init("{}", None, registry.into()).is_err());
        assert!(init("{}", None, JsValue::from_str("nope")).is_err());
        assert!(init(r#"{ "logLevel": "loud" }"#, None, counter_registry()).is_err());
    }
}
