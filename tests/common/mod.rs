//! In-process stand-in for libngspice.
//!
//! `FakeEngine` implements `NativeApi` on top of plain Rust data and calls
//! back through whatever trampolines the engine handle registered, so tests
//! exercise the real dispatch and decode paths without the native library.

#![allow(dead_code)]

use std::collections::HashSet;
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tempfile::NamedTempFile;

use ohmlink::ffi::{Callbacks, NgComplex, SyncCallbacks, VectorInfo, VF_COMPLEX, VF_REAL};
use ohmlink::native::{Loader, NativeApi};
use ohmlink::{EngineOptions, OhmlinkError};

// ── Serialisation ─────────────────────────────────────────────────

static SERIAL: Mutex<()> = parking_lot::const_mutex(());

/// Only one engine may be attached per process, so engine tests in one
/// binary take turns.
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock()
}

// ── Captured output ───────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ── Fake plot data ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum FakeData {
    Real(Vec<f64>),
    Complex(Vec<NgComplex>),
    /// `ngGet_Vec_Info` returns NULL for this vector.
    Missing,
}

#[derive(Debug, Clone)]
pub struct FakeVector {
    pub name: String,
    pub v_type: i32,
    pub flags: i16,
    pub data: FakeData,
}

impl FakeVector {
    pub fn real(name: &str, v_type: i32, values: &[f64]) -> Self {
        Self {
            name: name.into(),
            v_type,
            flags: VF_REAL,
            data: FakeData::Real(values.to_vec()),
        }
    }

    pub fn complex(name: &str, v_type: i32, values: &[(f64, f64)]) -> Self {
        Self {
            name: name.into(),
            v_type,
            flags: VF_COMPLEX,
            data: FakeData::Complex(
                values
                    .iter()
                    .map(|&(cx_real, cx_imag)| NgComplex { cx_real, cx_imag })
                    .collect(),
            ),
        }
    }

    pub fn missing(name: &str) -> Self {
        Self {
            name: name.into(),
            v_type: 0,
            flags: 0,
            data: FakeData::Missing,
        }
    }

    fn len(&self) -> usize {
        match &self.data {
            FakeData::Real(v) => v.len(),
            FakeData::Complex(v) => v.len(),
            FakeData::Missing => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakePlot {
    pub name: String,
    pub vectors: Vec<FakeVector>,
}

impl FakePlot {
    pub fn new(name: &str, vectors: Vec<FakeVector>) -> Self {
        Self {
            name: name.into(),
            vectors,
        }
    }
}

/// Backing storage for pointers handed out to the caller.
#[derive(Default)]
struct Arena {
    strings: Vec<CString>,
    arrays: Vec<Vec<*mut c_char>>,
    infos: Vec<Box<VectorInfo>>,
}

// The raw pointers only ever point into data owned by the arena or the
// plot list, both behind the same mutex-protected state.
unsafe impl Send for Arena {}

impl Arena {
    fn string(&mut self, s: &str) -> *mut c_char {
        let c = CString::new(s).expect("fake names have no NUL");
        let p = c.as_ptr() as *mut c_char;
        self.strings.push(c);
        p
    }

    fn array<'a>(&mut self, names: impl Iterator<Item = &'a str>) -> *mut *mut c_char {
        let mut arr: Vec<*mut c_char> = names.map(|n| self.string(n)).collect();
        arr.push(std::ptr::null_mut());
        let p = arr.as_mut_ptr();
        self.arrays.push(arr);
        p
    }
}

// ── Engine state ──────────────────────────────────────────────────

#[derive(Clone, Copy)]
struct Registered {
    callbacks: Callbacks,
    user_data: usize,
}

#[derive(Clone, Copy)]
struct RegisteredSync {
    callbacks: SyncCallbacks,
    user_data: usize,
}

/// Shared between the test and every `FakeEngine` it hands out.
#[derive(Default)]
pub struct FakeState {
    registered: Mutex<Option<Registered>>,
    registered_sync: Mutex<Option<RegisteredSync>>,
    arena: Mutex<Arena>,
    pub plots: Mutex<Vec<FakePlot>>,
    pub commands: Mutex<Vec<String>>,
    pub circuits: Mutex<Vec<Vec<String>>>,
    pub failing_commands: Mutex<HashSet<String>>,
    /// External sources the fake `run` samples, with the times to sample at.
    pub samplings: Mutex<Vec<(String, Vec<f64>)>>,
    pub init_status: AtomicI32,
    pub init_sync_status: AtomicI32,
    pub circ_status: AtomicI32,
    pub fail_load: AtomicBool,
    pub running: AtomicBool,
    pub loads: AtomicUsize,
    pub unloads: AtomicUsize,
    pub all_plots_calls: AtomicUsize,
    runs: AtomicUsize,
}

impl FakeState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_plots(&self, plots: Vec<FakePlot>) {
        *self.plots.lock() = plots;
    }

    pub fn fail_command(&self, command: &str) {
        self.failing_commands.lock().insert(command.to_string());
    }

    pub fn sample_source(&self, source: &str, times: &[f64]) {
        self.samplings.lock().push((source.to_string(), times.to_vec()));
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    pub fn is_registered(&self) -> bool {
        self.registered.lock().is_some()
    }

    // ── Engine-side calls into the handle ──

    pub fn emit(&self, line: &str) {
        let Some(r) = *self.registered.lock() else { return };
        let c = CString::new(line).unwrap();
        if let Some(f) = r.callbacks.send_char {
            unsafe { f(c.as_ptr() as *mut c_char, 0, r.user_data as *mut c_void) };
        }
    }

    pub fn exit(&self, status: i32, unloading: bool, quit: bool) {
        let Some(r) = *self.registered.lock() else { return };
        if let Some(f) = r.callbacks.controlled_exit {
            unsafe { f(status, unloading, quit, 0, r.user_data as *mut c_void) };
        }
    }

    /// ngspice reports `true` once the background thread has exited.
    pub fn background_exited(&self, exited: bool) {
        let Some(r) = *self.registered.lock() else { return };
        if let Some(f) = r.callbacks.bg_thread_running {
            unsafe { f(exited, 0, r.user_data as *mut c_void) };
        }
    }

    /// Evaluate an external voltage source the way the engine does.
    pub fn request_vsrc(&self, name: &str, time: f64) -> (f64, i32) {
        self.request_vsrc_raw(&CString::new(name).unwrap(), time)
    }

    /// Like `request_vsrc`, with the name already in the engine's encoding.
    pub fn request_vsrc_raw(&self, name: &CStr, time: f64) -> (f64, i32) {
        let Some(r) = *self.registered_sync.lock() else {
            panic!("Init_Sync was never called");
        };
        let mut value = f64::NAN;
        let f = r.callbacks.vsrc_data.expect("no vsrc callback");
        let status = unsafe {
            f(&mut value, time, name.as_ptr() as *mut c_char, 0, r.user_data as *mut c_void)
        };
        (value, status)
    }

    pub fn request_isrc(&self, name: &str, time: f64) -> (f64, i32) {
        let Some(r) = *self.registered_sync.lock() else {
            panic!("Init_Sync was never called");
        };
        let c = CString::new(name).unwrap();
        let mut value = f64::NAN;
        let f = r.callbacks.isrc_data.expect("no isrc callback");
        let status =
            unsafe { f(&mut value, time, c.as_ptr() as *mut c_char, 0, r.user_data as *mut c_void) };
        (value, status)
    }

    /// What `run` does: sample every queued source and publish a transient plot.
    fn simulate(&self) {
        let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        let samplings = self.samplings.lock().clone();
        let mut vectors = Vec::new();
        if let Some((_, times)) = samplings.first() {
            vectors.push(FakeVector::real("time", 1, times));
        }
        for (source, times) in &samplings {
            let values: Vec<f64> = times.iter().map(|&t| self.request_vsrc(source, t).0).collect();
            vectors.push(FakeVector::real(source, 3, &values));
        }
        self.plots
            .lock()
            .insert(0, FakePlot::new(&format!("tran{}", n), vectors));
    }

    fn banner(&self) {
        for line in [
            "stdout ******",
            "stdout ** ngspice-36 : Circuit level simulation program",
            "stdout ** CIDER 1.b1 (CODECS simulator) included",
            "stdout ** XSPICE extensions included",
            "stdout ******",
        ] {
            self.emit(line);
        }
    }
}

// ── NativeApi implementation ──────────────────────────────────────

pub struct FakeEngine {
    state: Arc<FakeState>,
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        self.state.unloads.fetch_add(1, Ordering::SeqCst);
        *self.state.registered.lock() = None;
        *self.state.registered_sync.lock() = None;
    }
}

impl FakeEngine {
    /// Run `work` on a new thread bracketed by the start/exit notifications.
    fn spawn_background(&self, work: impl FnOnce(&FakeState) + Send + 'static) {
        self.state.running.store(true, Ordering::SeqCst);
        let state = Arc::clone(&self.state);
        std::thread::spawn(move || {
            state.background_exited(false);
            work(&state);
            state.running.store(false, Ordering::SeqCst);
            state.background_exited(true);
        });
    }
}

impl NativeApi for FakeEngine {
    unsafe fn init(&self, callbacks: &Callbacks, user_data: *mut c_void) -> c_int {
        *self.state.registered.lock() = Some(Registered {
            callbacks: *callbacks,
            user_data: user_data as usize,
        });
        self.state.init_status.load(Ordering::SeqCst)
    }

    unsafe fn init_sync(
        &self,
        callbacks: &SyncCallbacks,
        _ident: *mut c_int,
        user_data: *mut c_void,
    ) -> c_int {
        *self.state.registered_sync.lock() = Some(RegisteredSync {
            callbacks: *callbacks,
            user_data: user_data as usize,
        });
        self.state.init_sync_status.load(Ordering::SeqCst)
    }

    fn command(&self, command: &CStr) -> c_int {
        let text = command.to_string_lossy().into_owned();
        self.state.commands.lock().push(text.clone());
        if self.state.failing_commands.lock().contains(&text) {
            return 1;
        }

        match text.as_str() {
            "run" => self.state.simulate(),
            "bg_run" => self.spawn_background(|state| state.simulate()),
            // A resumed run takes a while before its thread reports the end
            "bg_resume" => self.spawn_background(|_| std::thread::sleep(Duration::from_millis(50))),
            "quit" => self.state.exit(0, true, true),
            "version -f" => self.state.banner(),
            _ => {
                if let Some(path) = text.strip_prefix("source ") {
                    if !Path::new(path).is_file() {
                        self.state.emit(&format!("stderr Error: Could not find file {}", path));
                        return 1;
                    }
                }
            }
        }
        0
    }

    unsafe fn circ(&self, lines: *mut *mut c_char) -> c_int {
        let mut circuit = Vec::new();
        let mut i = 0;
        loop {
            let p = *lines.add(i);
            if p.is_null() {
                break;
            }
            circuit.push(CStr::from_ptr(p).to_string_lossy().into_owned());
            i += 1;
        }
        self.state.circuits.lock().push(circuit);
        self.state.circ_status.load(Ordering::SeqCst)
    }

    fn cur_plot(&self) -> *mut c_char {
        let plots = self.state.plots.lock();
        let Some(first) = plots.first() else {
            return std::ptr::null_mut();
        };
        self.state.arena.lock().string(&first.name)
    }

    fn all_plots(&self) -> *mut *mut c_char {
        self.state.all_plots_calls.fetch_add(1, Ordering::SeqCst);
        let plots = self.state.plots.lock();
        self.state
            .arena
            .lock()
            .array(plots.iter().map(|p| p.name.as_str()))
    }

    fn all_vecs(&self, plot: &CStr) -> *mut *mut c_char {
        let plot = plot.to_string_lossy();
        let plots = self.state.plots.lock();
        match plots.iter().find(|p| p.name == plot) {
            Some(p) => self
                .state
                .arena
                .lock()
                .array(p.vectors.iter().map(|v| v.name.as_str())),
            None => std::ptr::null_mut(),
        }
    }

    fn vector_info(&self, name: &CStr) -> *mut VectorInfo {
        let name = name.to_string_lossy();
        let Some((plot, vector)) = name.split_once('.') else {
            return std::ptr::null_mut();
        };
        let mut plots = self.state.plots.lock();
        let Some(v) = plots
            .iter_mut()
            .find(|p| p.name == plot)
            .and_then(|p| p.vectors.iter_mut().find(|v| v.name == vector))
        else {
            return std::ptr::null_mut();
        };

        let length = v.len() as i32;
        let (realdata, compdata) = match &mut v.data {
            FakeData::Real(d) => (d.as_mut_ptr(), std::ptr::null_mut()),
            FakeData::Complex(d) => (std::ptr::null_mut(), d.as_mut_ptr()),
            FakeData::Missing => return std::ptr::null_mut(),
        };
        let (v_type, v_flags) = (v.v_type, v.flags);
        let mut arena = self.state.arena.lock();
        let v_name = arena.string(vector);
        let mut info = Box::new(VectorInfo {
            v_name,
            v_type,
            v_flags,
            v_realdata: realdata,
            v_compdata: compdata,
            v_length: length,
        });
        let p = &mut *info as *mut VectorInfo;
        arena.infos.push(info);
        p
    }

    fn running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }
}

pub struct FakeLoader {
    pub state: Arc<FakeState>,
}

impl Loader for FakeLoader {
    fn load(&self, path: &Path) -> ohmlink::Result<Box<dyn NativeApi>> {
        if self.state.fail_load.load(Ordering::SeqCst) {
            return Err(OhmlinkError::LibraryLoad {
                path: path.to_path_buf(),
                reason: "fake load failure".into(),
            });
        }
        self.state.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeEngine {
            state: Arc::clone(&self.state),
        }))
    }
}

// ── Fixture ───────────────────────────────────────────────────────

/// A fake engine plus an on-disk file standing in for the library.
pub struct Fixture {
    pub state: Arc<FakeState>,
    pub out: SharedBuf,
    pub library: NamedTempFile,
    _serial: MutexGuard<'static, ()>,
}

impl Fixture {
    pub fn new() -> Self {
        let serial = serial();
        Self {
            state: FakeState::new(),
            out: SharedBuf::default(),
            library: NamedTempFile::new().expect("temp library file"),
            _serial: serial,
        }
    }

    pub fn options(&self) -> EngineOptions {
        EngineOptions::default()
            .with_library(self.library.path())
            .with_loader(FakeLoader {
                state: Arc::clone(&self.state),
            })
            .with_sink(self.out.clone())
    }
}
