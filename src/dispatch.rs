//! Callbacks invoked by the engine.
//!
//! Every trampoline receives the `void*` user data given at registration,
//! which is a pointer to the owning engine's [`Dispatch`]. Nothing here is
//! global: two engines (one after the other) never see each other's sources
//! or sinks.
//!
//! Trampolines may run on the engine's background thread. A panic inside one
//! is caught and logged; it never unwinds into C.

use std::collections::VecDeque;
use std::ffi::{c_char, c_double, c_int, c_void, CStr};
use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::encoding;
use crate::ffi::{self, Callbacks, SyncCallbacks, VecInfoAll, VecValuesAll};
use crate::sources::{Lookup, SourceRegistry};

/// Default number of engine output lines kept for [`Dispatch::drain_messages`].
pub const DEFAULT_MESSAGE_CAPACITY: usize = 4096;

pub type ThreadStateFn = Arc<dyn Fn(bool) + Send + Sync>;
pub type InitDataFn = Arc<dyn Fn(&PlotSchema) + Send + Sync>;
pub type DataFn = Arc<dyn Fn(&DataSample) + Send + Sync>;

/// The engine asked to exit (`quit`, or a fatal error inside ngspice).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitRequest {
    pub status: i32,
    /// The engine expects to be unloaded.
    pub unloading: bool,
    /// The request came from a `quit` command.
    pub quit: bool,
}

/// Vector announced when a new plot is set up.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSchema {
    pub index: i32,
    pub name: String,
    pub is_real: bool,
}

/// Layout of a plot, sent once before its data starts streaming.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotSchema {
    pub name: String,
    pub title: String,
    pub date: String,
    pub kind: String,
    pub vectors: Vec<VectorSchema>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamValue {
    pub name: String,
    pub re: f64,
    pub im: f64,
    pub is_scale: bool,
    pub is_complex: bool,
}

/// One accepted data point of the running analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSample {
    pub index: i32,
    pub values: Vec<StreamValue>,
}

/// Counters updated from the callbacks.
#[derive(Debug, Default)]
pub struct Counters {
    pub lines: AtomicU64,
    pub source_requests: AtomicU64,
    pub source_misses: AtomicU64,
    pub samples: AtomicU64,
}

/// State shared between an engine handle and its callbacks.
pub struct Dispatch {
    sink: Mutex<Box<dyn Write + Send>>,
    messages: Mutex<VecDeque<String>>,
    message_capacity: usize,
    pub(crate) sources: SourceRegistry,
    thread_state: Mutex<Option<ThreadStateFn>>,
    init_data: Mutex<Option<InitDataFn>>,
    data: Mutex<Option<DataFn>>,
    background: Mutex<bool>,
    background_changed: Condvar,
    exit: Mutex<Option<ExitRequest>>,
    pub(crate) counters: Counters,
}

impl Dispatch {
    pub fn new(sink: Box<dyn Write + Send>, message_capacity: usize) -> Self {
        Self {
            sink: Mutex::new(sink),
            messages: Mutex::new(VecDeque::new()),
            message_capacity: message_capacity.max(1),
            sources: SourceRegistry::new(),
            thread_state: Mutex::new(None),
            init_data: Mutex::new(None),
            data: Mutex::new(None),
            background: Mutex::new(false),
            background_changed: Condvar::new(),
            exit: Mutex::new(None),
            counters: Counters::default(),
        }
    }

    /// The function-pointer table for `ngSpice_Init`.
    pub fn callbacks() -> Callbacks {
        Callbacks {
            send_char: Some(send_char),
            send_stat: Some(send_stat),
            controlled_exit: Some(controlled_exit),
            send_data: Some(send_data),
            send_init_data: Some(send_init_data),
            bg_thread_running: Some(bg_thread_running),
        }
    }

    /// The function-pointer table for `ngSpice_Init_Sync`.
    pub fn sync_callbacks() -> SyncCallbacks {
        SyncCallbacks {
            vsrc_data: Some(get_vsrc_data),
            isrc_data: Some(get_isrc_data),
            sync_data: None,
        }
    }

    /// Write a line to the sink. I/O errors are logged, never returned.
    pub fn log(&self, line: &str) {
        let mut sink = self.sink.lock();
        if let Err(e) = writeln!(sink, "{}", line) {
            tracing::warn!(error = %e, "output sink write failed");
        }
    }

    pub fn set_sink(&self, sink: Box<dyn Write + Send>) {
        *self.sink.lock() = sink;
    }

    pub fn flush_sink(&self) {
        if let Err(e) = self.sink.lock().flush() {
            tracing::warn!(error = %e, "output sink flush failed");
        }
    }

    /// Take every queued engine output line, oldest first.
    pub fn drain_messages(&self) -> Vec<String> {
        self.messages.lock().drain(..).collect()
    }

    pub fn set_thread_state_callback(&self, f: Option<ThreadStateFn>) {
        *self.thread_state.lock() = f;
    }

    pub fn set_init_data_callback(&self, f: Option<InitDataFn>) {
        *self.init_data.lock() = f;
    }

    pub fn set_data_callback(&self, f: Option<DataFn>) {
        *self.data.lock() = f;
    }

    /// Last state reported through the background-thread notification.
    pub fn background_running(&self) -> bool {
        *self.background.lock()
    }

    /// Mark the background thread as started before the engine confirms it,
    /// so a waiter cannot miss a run that finishes immediately.
    pub(crate) fn set_background(&self, running: bool) {
        *self.background.lock() = running;
        self.background_changed.notify_all();
    }

    /// Block until the engine reports its background thread stopped.
    pub fn wait_background(&self) {
        let mut running = self.background.lock();
        while *running {
            self.background_changed.wait(&mut running);
        }
    }

    pub fn last_exit(&self) -> Option<ExitRequest> {
        *self.exit.lock()
    }

    pub(crate) fn clear_exit(&self) {
        *self.exit.lock() = None;
    }

    // ── Handlers, one per trampoline ───────────────────────────────

    pub(crate) fn on_output(&self, raw: &[u8]) {
        self.counters.lines.fetch_add(1, Ordering::Relaxed);
        let text = encoding::decode(raw);
        let line = strip_stream_prefix(&text);
        tracing::trace!(target: "ohmlink::engine", "{}", line);
        self.log(line);

        let mut queue = self.messages.lock();
        if queue.len() >= self.message_capacity {
            queue.pop_front();
        }
        queue.push_back(line.to_string());
    }

    pub(crate) fn on_exit(&self, request: ExitRequest) {
        tracing::info!(
            status = request.status,
            unloading = request.unloading,
            quit = request.quit,
            "engine requested exit"
        );
        self.log(&format!("controlled exit, status {}", request.status));
        *self.exit.lock() = Some(request);
    }

    pub(crate) fn on_background(&self, running: bool) {
        tracing::debug!(running, "background thread state");
        // Hook first: a waiter woken below must observe its effects.
        let f = self.thread_state.lock().clone();
        if let Some(f) = f {
            f(running);
        }
        self.set_background(running);
    }

    /// Resolve an external source. Returns the value and the status code
    /// reported back to the engine (0 found, 1 undefined).
    pub(crate) fn on_source(&self, name: &[u8], time: f64) -> (f64, c_int) {
        self.counters.source_requests.fetch_add(1, Ordering::Relaxed);
        match self.sources.evaluate(name, time) {
            Lookup::Found(v) => (v, 0),
            Lookup::Missing => {
                self.counters.source_misses.fetch_add(1, Ordering::Relaxed);
                let name = encoding::decode(name);
                tracing::warn!(source = %name, "undefined external source, using 0");
                self.log(&format!(
                    "Warning: undefined external source '{}', returning 0 volts/amperes",
                    name
                ));
                (0.0, 1)
            }
        }
    }

    pub(crate) fn on_init_data(&self, schema: &PlotSchema) {
        self.log(&format!(
            "init data: plot '{}' ({}), {} vectors",
            schema.name,
            schema.kind,
            schema.vectors.len()
        ));
        let f = self.init_data.lock().clone();
        if let Some(f) = f {
            f(schema);
        }
    }

    pub(crate) fn wants_data(&self) -> bool {
        self.data.lock().is_some()
    }

    pub(crate) fn on_data(&self, sample: &DataSample) {
        self.counters.samples.fetch_add(1, Ordering::Relaxed);
        let f = self.data.lock().clone();
        if let Some(f) = f {
            f(sample);
        }
    }
}

/// ngspice prefixes every output line with the stream it was printed to.
fn strip_stream_prefix(line: &str) -> &str {
    line.strip_prefix("stdout ")
        .or_else(|| line.strip_prefix("stderr "))
        .unwrap_or(line)
}

// ── Trampolines ────────────────────────────────────────────────────

/// Run `f` against the dispatch behind `user_data`, returning `fallback` on a
/// null token or a panic.
///
/// # Safety
///
/// `user_data` must be null or point to a live `Dispatch`.
unsafe fn with_dispatch<R>(
    user_data: *mut c_void,
    fallback: R,
    what: &'static str,
    f: impl FnOnce(&Dispatch) -> R,
) -> R {
    if user_data.is_null() {
        return fallback;
    }
    let dispatch = &*(user_data as *const Dispatch);
    match catch_unwind(AssertUnwindSafe(|| f(dispatch))) {
        Ok(r) => r,
        Err(_) => {
            tracing::error!(callback = what, "panic in engine callback suppressed");
            fallback
        }
    }
}

unsafe fn cstr_bytes<'a>(p: *const c_char) -> &'a [u8] {
    if p.is_null() {
        &[]
    } else {
        CStr::from_ptr(p).to_bytes()
    }
}

unsafe extern "C" fn send_char(text: *mut c_char, _id: c_int, user_data: *mut c_void) -> c_int {
    with_dispatch(user_data, 0, "send_char", |d| {
        d.on_output(cstr_bytes(text));
        0
    })
}

unsafe extern "C" fn send_stat(text: *mut c_char, _id: c_int, user_data: *mut c_void) -> c_int {
    with_dispatch(user_data, 0, "send_stat", |d| {
        d.on_output(cstr_bytes(text));
        0
    })
}

unsafe extern "C" fn controlled_exit(
    status: c_int,
    unloading: bool,
    quit: bool,
    _id: c_int,
    user_data: *mut c_void,
) -> c_int {
    with_dispatch(user_data, 0, "controlled_exit", |d| {
        d.on_exit(ExitRequest {
            status,
            unloading,
            quit,
        });
        0
    })
}

/// ngspice passes its `fl_exited` flag here: `false` when the background
/// thread starts, `true` once it has finished.
unsafe extern "C" fn bg_thread_running(exited: bool, _id: c_int, user_data: *mut c_void) -> c_int {
    with_dispatch(user_data, 0, "bg_thread_running", |d| {
        d.on_background(!exited);
        0
    })
}

unsafe extern "C" fn get_source_data(
    value: *mut c_double,
    time: c_double,
    name: *mut c_char,
    user_data: *mut c_void,
) -> c_int {
    let (v, status) = with_dispatch(user_data, (0.0, 1), "get_source_data", |d| {
        d.on_source(cstr_bytes(name), time)
    });
    if !value.is_null() {
        *value = v;
    }
    status
}

unsafe extern "C" fn get_vsrc_data(
    value: *mut c_double,
    time: c_double,
    name: *mut c_char,
    _id: c_int,
    user_data: *mut c_void,
) -> c_int {
    get_source_data(value, time, name, user_data)
}

unsafe extern "C" fn get_isrc_data(
    value: *mut c_double,
    time: c_double,
    name: *mut c_char,
    _id: c_int,
    user_data: *mut c_void,
) -> c_int {
    get_source_data(value, time, name, user_data)
}

unsafe extern "C" fn send_init_data(
    info: *mut VecInfoAll,
    _id: c_int,
    user_data: *mut c_void,
) -> c_int {
    with_dispatch(user_data, 0, "send_init_data", |d| {
        if info.is_null() {
            return 0;
        }
        let schema = plot_schema(&*info);
        d.on_init_data(&schema);
        0
    })
}

unsafe extern "C" fn send_data(
    values: *mut VecValuesAll,
    _count: c_int,
    _id: c_int,
    user_data: *mut c_void,
) -> c_int {
    with_dispatch(user_data, 0, "send_data", |d| {
        // Called once per accepted timestep: skip the conversion unless
        // somebody is listening.
        if values.is_null() || !d.wants_data() {
            return 0;
        }
        let sample = data_sample(&*values);
        d.on_data(&sample);
        0
    })
}

unsafe fn decode_ptr(p: *const c_char) -> String {
    encoding::decode(cstr_bytes(p))
}

/// # Safety
///
/// `info` must describe `veccount` valid vector entries.
pub(crate) unsafe fn plot_schema(info: &VecInfoAll) -> PlotSchema {
    let count = usize::try_from(info.veccount).unwrap_or(0);
    let mut vectors = Vec::with_capacity(count);
    if !info.vecs.is_null() {
        for i in 0..count {
            let v = *info.vecs.add(i);
            if v.is_null() {
                continue;
            }
            let v = &*v;
            vectors.push(VectorSchema {
                index: v.number,
                name: decode_ptr(v.vecname),
                is_real: v.is_real,
            });
        }
    }
    PlotSchema {
        name: decode_ptr(info.name),
        title: decode_ptr(info.title),
        date: decode_ptr(info.date),
        kind: decode_ptr(info.type_),
        vectors,
    }
}

/// # Safety
///
/// `values` must describe `veccount` valid value entries.
pub(crate) unsafe fn data_sample(values: &VecValuesAll) -> DataSample {
    let count = usize::try_from(values.veccount).unwrap_or(0);
    let mut out = Vec::with_capacity(count);
    if !values.vecsa.is_null() {
        for i in 0..count {
            let v: *mut ffi::VecValues = *values.vecsa.add(i);
            if v.is_null() {
                continue;
            }
            let v = &*v;
            out.push(StreamValue {
                name: decode_ptr(v.name),
                re: v.creal,
                im: v.cimag,
                is_scale: v.is_scale,
                is_complex: v.is_complex,
            });
        }
    }
    DataSample {
        index: values.vecindex,
        values: out,
    }
}
