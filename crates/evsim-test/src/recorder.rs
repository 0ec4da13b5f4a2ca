//! Trace recorder
//!
//! Collects `(time, context, source path, value)` for every trace fired
//! into its sinks. The rendered form is what determinism checks compare.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use evsim_core::ContextId;
use evsim_sched::Simulator;
use evsim_trace::{Callback, ContextCallback};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRecord {
    pub ticks: i64,
    pub context: ContextId,
    pub path: String,
    pub value: String,
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.ticks, self.context, self.path, self.value)
    }
}

#[derive(Clone, Default)]
pub struct TraceRecorder {
    records: Rc<RefCell<Vec<TraceRecord>>>,
}

impl Debug for TraceRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceRecorder").field("records", &self.len()).finish()
    }
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, path: &str, value: String) {
        self.records.borrow_mut().push(TraceRecord {
            ticks: Simulator::now().ticks(),
            context: Simulator::get_context(),
            path: path.to_string(),
            value,
        });
    }

    /// Sink recording the context path handed over by the source
    pub fn context_sink<A: Debug + 'static>(&self) -> ContextCallback<A> {
        let recorder = self.clone();
        ContextCallback::new(move |path: &str, value: A| recorder.push(path, format!("{value:?}")))
    }

    /// Sink recording under a fixed `label`
    pub fn sink<A: Debug + 'static>(&self, label: &str) -> Callback<A> {
        let recorder = self.clone();
        let label = label.to_string();
        Callback::new(move |value: A| recorder.push(&label, format!("{value:?}")))
    }

    pub fn records(&self) -> Vec<TraceRecord> {
        self.records.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.records.borrow_mut().clear();
    }

    /// One line per record
    pub fn render(&self) -> String {
        self.records
            .borrow()
            .iter()
            .map(|r| format!("{r}\n"))
            .collect()
    }
}
