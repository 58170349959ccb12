//! Scriptlet injector
//!
//! Resolves a rule body against the registry, consults the document's
//! execution guard, and runs the scriptlet inside a failure boundary.
//! Nothing escapes `inject`: misses and repeats are silent, failures are
//! logged and suppressed, and the marker is set whatever the outcome so a
//! broken scriptlet is not retried in the same document.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::guard::ExecutionGuard;
use crate::matcher::Matcher;
use crate::registry::{Scriptlet, ScriptletError, ScriptletRegistry};
use crate::types::{ExecutionResult, InjectionStats, PageContext};

pub struct Injector {
    registry: Rc<ScriptletRegistry>,
    guard: ExecutionGuard,
    stats: InjectionStats,
}

impl Injector {
    pub fn new(registry: Rc<ScriptletRegistry>, guard: ExecutionGuard) -> Self {
        Self {
            registry,
            guard,
            stats: InjectionStats::default(),
        }
    }

    pub fn guard(&self) -> &ExecutionGuard {
        &self.guard
    }

    /// Counters for the current document.
    pub fn stats(&self) -> InjectionStats {
        self.stats
    }

    /// Run the scriptlet registered for `body`, at most once per document.
    pub fn inject(&mut self, body: &str) -> ExecutionResult {
        let result = self.inject_inner(body);
        self.stats.record(result);
        result
    }

    fn inject_inner(&mut self, body: &str) -> ExecutionResult {
        let scriptlet = match self.registry.resolve(body) {
            Some(scriptlet) => Rc::clone(scriptlet),
            None => {
                log::debug!("no local implementation for JS rule {:?}", body);
                return ExecutionResult::NotFound;
            }
        };

        let id = scriptlet.id();
        if self.guard.has_run(id) {
            log::trace!("JS rule {} already executed in this document", id);
            return ExecutionResult::AlreadyRun;
        }

        let outcome = run_isolated(scriptlet.as_ref());
        self.guard.mark_run(id);

        match outcome {
            Ok(()) => ExecutionResult::Executed,
            Err(e) => {
                log::error!("Error executing JS rule {:?}: {}", body, e);
                ExecutionResult::Failed
            }
        }
    }

    /// Inject several bodies in order.
    pub fn inject_all<'b>(&mut self, bodies: impl IntoIterator<Item = &'b str>) -> InjectionStats {
        let mut stats = InjectionStats::default();
        for body in bodies {
            stats.record(self.inject(body));
        }
        stats
    }

    /// Match `ctx` and inject every applicable body.
    pub fn inject_page(&mut self, matcher: &Matcher, ctx: &PageContext<'_>) -> InjectionStats {
        let matched = matcher.match_page(ctx);
        log::debug!(
            "{} JS rule(s) matched for {} (tab {}, frame {})",
            matched.scripts.len(),
            ctx.host,
            ctx.tab_id,
            ctx.frame_id
        );
        self.inject_all(matched.scripts)
    }

    /// Start a new document: every scriptlet may run again.
    pub fn reset_document(&mut self) {
        log::debug!("new document, dropping {} execution marker(s)", self.guard.len());
        self.guard = ExecutionGuard::new();
        self.stats = InjectionStats::default();
    }
}

fn run_isolated(scriptlet: &dyn Scriptlet) -> Result<(), ScriptletError> {
    match panic::catch_unwind(AssertUnwindSafe(|| scriptlet.run())) {
        Ok(result) => result,
        Err(payload) => Err(ScriptletError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::sync::Once;

    use log::{Level, LevelFilter, Log, Metadata, Record};

    use super::*;
    use crate::policy::InjectionPolicy;
    use crate::rule::JsRule;
    use crate::types::RuleSource;

    /// Stand-in for the page's global object.
    #[derive(Default)]
    struct Window {
        foo: Cell<Option<i32>>,
        log: RefCell<Vec<&'static str>>,
    }

    // Records land in a per-thread buffer; each test runs on its own thread.
    struct CaptureLogger;

    static LOGGER: CaptureLogger = CaptureLogger;
    static INSTALL_LOGGER: Once = Once::new();

    thread_local! {
        static RECORDS: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
    }

    impl Log for CaptureLogger {
        fn enabled(&self, _: &Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &Record<'_>) {
            RECORDS.with(|records| records.borrow_mut().push((record.level(), record.args().to_string())));
        }

        fn flush(&self) {}
    }

    fn capture_logs() {
        INSTALL_LOGGER.call_once(|| {
            log::set_logger(&LOGGER).expect("no other logger in tests");
            log::set_max_level(LevelFilter::Trace);
        });
        RECORDS.with(|records| records.borrow_mut().clear());
    }

    fn logged_errors() -> Vec<String> {
        RECORDS.with(|records| {
            records
                .borrow()
                .iter()
                .filter(|(level, _)| *level == Level::Error)
                .map(|(_, message)| message.clone())
                .collect()
        })
    }

    fn registry_with(window: &Rc<Window>) -> Rc<ScriptletRegistry> {
        let mut builder = ScriptletRegistry::builder();

        let w = window.clone();
        builder
            .register_fn("window.foo = 1;", move || {
                w.foo.set(Some(w.foo.get().unwrap_or(0) + 1));
                Ok(())
            })
            .expect("register");

        let w = window.clone();
        builder
            .register_fn("throw new Error('boom');", move || {
                w.log.borrow_mut().push("boom");
                Err(ScriptletError::Thrown("Error: boom".to_string()))
            })
            .expect("register");

        let w = window.clone();
        builder
            .register_fn("window.other();", move || {
                w.log.borrow_mut().push("other");
                Ok(())
            })
            .expect("register");

        let w = window.clone();
        builder
            .register_fn("panic();", move || {
                w.log.borrow_mut().push("panic");
                panic!("scriptlet bug");
            })
            .expect("register");

        Rc::new(builder.build())
    }

    #[test]
    fn runs_scriptlet_once_per_document() {
        let window = Rc::new(Window::default());
        let mut injector = Injector::new(registry_with(&window), ExecutionGuard::new());

        assert_eq!(injector.inject("window.foo = 1;"), ExecutionResult::Executed);
        assert_eq!(window.foo.get(), Some(1));

        assert_eq!(injector.inject("window.foo = 1;"), ExecutionResult::AlreadyRun);
        assert_eq!(window.foo.get(), Some(1));
    }

    #[test]
    fn new_document_runs_again() {
        let window = Rc::new(Window::default());
        let mut injector = Injector::new(registry_with(&window), ExecutionGuard::new());

        injector.inject("window.foo = 1;");
        injector.reset_document();
        assert!(injector.guard().is_empty());

        assert_eq!(injector.inject("window.foo = 1;"), ExecutionResult::Executed);
        assert_eq!(window.foo.get(), Some(2));
    }

    #[test]
    fn separate_guards_do_not_share_markers() {
        let window = Rc::new(Window::default());
        let registry = registry_with(&window);

        let mut top = Injector::new(registry.clone(), ExecutionGuard::new());
        let mut frame = Injector::new(registry, ExecutionGuard::new());

        assert_eq!(top.inject("window.foo = 1;"), ExecutionResult::Executed);
        assert_eq!(frame.inject("window.foo = 1;"), ExecutionResult::Executed);
        assert_eq!(window.foo.get(), Some(2));
    }

    #[test]
    fn unknown_body_is_not_found() {
        let window = Rc::new(Window::default());
        let mut injector = Injector::new(registry_with(&window), ExecutionGuard::new());

        assert_eq!(injector.inject("window.foo = 2;"), ExecutionResult::NotFound);
        assert_eq!(injector.inject("window.foo = 1; "), ExecutionResult::NotFound);
        assert!(injector.guard().is_empty());
        assert_eq!(window.foo.get(), None);
    }

    #[test]
    fn failure_is_isolated_and_not_retried() {
        let window = Rc::new(Window::default());
        let mut injector = Injector::new(registry_with(&window), ExecutionGuard::new());

        let stats = injector.inject_all(["throw new Error('boom');", "window.other();"]);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.executed, 1);
        assert_eq!(*window.log.borrow(), vec!["boom", "other"]);

        assert_eq!(injector.inject("throw new Error('boom');"), ExecutionResult::AlreadyRun);
        assert_eq!(*window.log.borrow(), vec!["boom", "other"]);
        assert_eq!(injector.stats().failed, 1);
    }

    #[test]
    fn failure_logs_exactly_one_error() {
        capture_logs();
        let window = Rc::new(Window::default());
        let mut injector = Injector::new(registry_with(&window), ExecutionGuard::new());

        injector.inject_all(["throw new Error('boom');", "window.other();", "window.missing();"]);
        injector.inject("throw new Error('boom');");

        let errors = logged_errors();
        assert_eq!(errors.len(), 1, "errors: {:?}", errors);
        assert!(errors[0].contains("throw new Error('boom');"));
        assert!(errors[0].contains("Error: boom"));
    }

    #[test]
    fn panics_are_caught() {
        let window = Rc::new(Window::default());
        let mut injector = Injector::new(registry_with(&window), ExecutionGuard::new());

        assert_eq!(injector.inject("panic();"), ExecutionResult::Failed);
        assert_eq!(injector.inject("window.other();"), ExecutionResult::Executed);
        assert_eq!(injector.inject("panic();"), ExecutionResult::AlreadyRun);
        assert_eq!(*window.log.borrow(), vec!["panic", "other"]);
    }

    #[test]
    fn injects_matched_page_rules() {
        let window = Rc::new(Window::default());
        let mut injector = Injector::new(registry_with(&window), ExecutionGuard::new());

        let mut matcher = Matcher::new(InjectionPolicy::default());
        matcher.add_user_rules("example.org#%#window.foo = 1;\nexample.org#%#window.missing();\n#%#window.other();");

        let ctx = PageContext::from_url("https://example.org/");
        let stats = injector.inject_page(&matcher, &ctx);
        assert_eq!(stats.executed, 2);
        assert_eq!(stats.not_found, 1);

        // same document, matched again by an overlapping rule set
        let stats = injector.inject_page(&matcher, &ctx);
        assert_eq!(stats.already_run, 2);
        assert_eq!(stats.executed, 0);
        assert_eq!(window.foo.get(), Some(1));

        assert_eq!(injector.stats().total(), 6);
    }

    #[test]
    fn catalog_rule_reaches_registry_by_exact_body() {
        let window = Rc::new(Window::default());
        let mut injector = Injector::new(registry_with(&window), ExecutionGuard::new());

        let rule = JsRule::parse("example.org#%#window.foo = 1;", RuleSource::Filter { list_id: 3 })
            .expect("rule should parse");
        assert_eq!(injector.inject(&rule.body), ExecutionResult::Executed);
        assert!(injector.guard().has_run(rule.id()));
    }
}
