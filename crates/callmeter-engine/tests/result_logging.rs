//! Result logging toggled by the spec.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::io;
use std::sync::{Arc, Mutex};

use callmeter_core::call::{ArgSnapshot, CallContext, CallTarget};
use callmeter_core::spec::InstrumentationSpec;
use callmeter_engine::{InMemoryRegistry, InstrumentedCallEngine};

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct OutOfStock;

fn run_logged<T: std::fmt::Debug>(
    spec: &InstrumentationSpec,
    result: Result<T, OutOfStock>,
) -> (String, Result<T, OutOfStock>) {
    let capture = Capture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    let engine = InstrumentedCallEngine::new(Arc::new(InMemoryRegistry::new()));
    let out = tracing::subscriber::with_default(subscriber, || {
        engine.execute(
            CallContext::new(CallTarget::new("StockManager", "add_items"), move || result)
                .with_args(ArgSnapshot::new().with(&vec!["apple", "pear"])),
            spec,
        )
    });
    (capture.text(), out)
}

#[test]
fn logs_result_and_args_when_enabled() {
    let spec = InstrumentationSpec::builder().logging_enabled(true).build().unwrap();
    let (logs, out) = run_logged(&spec, Ok(2usize));
    assert_eq!(out.unwrap(), 2);
    assert!(logs.contains("instrumented call returned"), "logs: {logs}");
    assert!(logs.contains("StockManager.add_items"), "logs: {logs}");
    assert!(logs.contains(r#"["apple","pear"]"#), "logs: {logs}");
    assert!(logs.contains("result=2"), "logs: {logs}");
}

#[test]
fn silent_when_disabled() {
    let (logs, out) = run_logged(&InstrumentationSpec::default(), Ok(2usize));
    assert_eq!(out.unwrap(), 2);
    assert!(!logs.contains("instrumented call returned"), "logs: {logs}");
}

#[test]
fn errors_skip_result_logging() {
    let spec = InstrumentationSpec::builder().logging_enabled(true).build().unwrap();
    let (logs, out) = run_logged::<usize>(&spec, Err(OutOfStock));
    assert!(out.is_err());
    assert!(!logs.contains("instrumented call returned"), "logs: {logs}");
}
