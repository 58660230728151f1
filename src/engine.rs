//! Engine handle: owns the loaded library and mediates every call into it.
//!
//! ngspice keeps its state in process globals, so only one [`Engine`] may be
//! attached at a time. A second attach fails with
//! [`OhmlinkError::EngineAlreadyAttached`] instead of silently rebinding the
//! first engine's callbacks.

use std::ffi::{c_char, c_int, c_void, CStr};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::SearchPaths;
use crate::decode;
use crate::dispatch::{DataSample, Dispatch, ExitRequest, PlotSchema, DEFAULT_MESSAGE_CAPACITY};
use crate::encoding::{self, LINE_ENDING};
use crate::error::{OhmlinkError, Result};
use crate::native::{LibraryLoader, Loader, NativeApi};
use crate::results::Results;
use crate::stats::EngineCounts;
use crate::version::{self, EngineVersion};

static ATTACHED: AtomicBool = AtomicBool::new(false);

/// Whether any engine in this process currently holds the library.
pub fn engine_attached() -> bool {
    ATTACHED.load(Ordering::SeqCst)
}

/// Proof of holding the process-wide attachment slot. Released on drop.
struct AttachClaim(());

impl AttachClaim {
    fn acquire() -> Result<Self> {
        ATTACHED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| AttachClaim(()))
            .map_err(|_| OhmlinkError::EngineAlreadyAttached)
    }
}

impl Drop for AttachClaim {
    fn drop(&mut self) {
        ATTACHED.store(false, Ordering::SeqCst);
    }
}

/// A netlist to hand to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Netlist {
    /// A file, loaded with `source <path>`.
    Path(PathBuf),
    /// Netlist lines, title first.
    Lines(Vec<String>),
}

impl From<PathBuf> for Netlist {
    fn from(p: PathBuf) -> Self {
        Netlist::Path(p)
    }
}

impl From<&Path> for Netlist {
    fn from(p: &Path) -> Self {
        Netlist::Path(p.to_path_buf())
    }
}

/// A bare string is a file name.
impl From<&str> for Netlist {
    fn from(p: &str) -> Self {
        Netlist::Path(PathBuf::from(p))
    }
}

impl From<Vec<String>> for Netlist {
    fn from(lines: Vec<String>) -> Self {
        Netlist::Lines(lines)
    }
}

impl From<&[&str]> for Netlist {
    fn from(lines: &[&str]) -> Self {
        Netlist::Lines(lines.iter().map(|l| l.to_string()).collect())
    }
}

impl From<Vec<&str>> for Netlist {
    fn from(lines: Vec<&str>) -> Self {
        Netlist::from(lines.as_slice())
    }
}

impl From<&[String]> for Netlist {
    fn from(lines: &[String]) -> Self {
        Netlist::Lines(lines.to_vec())
    }
}

/// How to construct an [`Engine`]. Every field has a default.
pub struct EngineOptions {
    /// Receives engine output and diagnostics. Defaults to `io::sink()`.
    pub sink: Option<Box<dyn Write + Send>>,
    /// Library search table. Defaults to [`SearchPaths::from_env`].
    pub search_paths: Option<SearchPaths>,
    /// Use this library instead of searching.
    pub library_path: Option<PathBuf>,
    /// Defaults to [`LibraryLoader`].
    pub loader: Option<Box<dyn Loader>>,
    /// Output lines kept for [`Engine::drain_messages`].
    pub message_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            sink: None,
            search_paths: None,
            library_path: None,
            loader: None,
            message_capacity: DEFAULT_MESSAGE_CAPACITY,
        }
    }
}

impl EngineOptions {
    pub fn with_sink(mut self, sink: impl Write + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn with_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    pub fn with_search_paths(mut self, paths: SearchPaths) -> Self {
        self.search_paths = Some(paths);
        self
    }

    pub fn with_loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }
}

/// Handle on the attached ngspice library.
pub struct Engine {
    // Boxed so its address, handed to the engine as callback user data,
    // stays put when the handle moves.
    dispatch: Box<Dispatch>,
    native: Option<Box<dyn NativeApi>>,
    claim: Option<AttachClaim>,
    loader: Box<dyn Loader>,
    library_path: PathBuf,
    attaches: u64,
}

impl Engine {
    /// Find the library on the default search path and attach it.
    pub fn new() -> Result<Self> {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Result<Self> {
        let library_path = match options.library_path {
            Some(path) if path.is_file() => path,
            Some(path) => {
                return Err(OhmlinkError::EngineNotFound {
                    searched: vec![path],
                })
            }
            None => {
                let paths = match options.search_paths {
                    Some(p) => p,
                    None => SearchPaths::from_env()?,
                };
                paths.locate_current()?
            }
        };

        let sink = options
            .sink
            .unwrap_or_else(|| Box::new(std::io::sink()));
        let mut engine = Engine {
            dispatch: Box::new(Dispatch::new(sink, options.message_capacity)),
            native: None,
            claim: None,
            loader: options.loader.unwrap_or_else(|| Box::new(LibraryLoader)),
            library_path,
            attaches: 0,
        };
        engine.attach()?;
        Ok(engine)
    }

    fn attach(&mut self) -> Result<()> {
        let claim = AttachClaim::acquire()?;
        self.attach_with(claim)
    }

    fn attach_with(&mut self, claim: AttachClaim) -> Result<()> {
        let _span =
            tracing::info_span!("attach", path = %self.library_path.display()).entered();

        let native = self.loader.load(&self.library_path)?;
        let token = &*self.dispatch as *const Dispatch as *mut c_void;

        let status = unsafe { native.init(&Dispatch::callbacks(), token) };
        if status != 0 {
            return Err(OhmlinkError::EngineInitFailed(format!(
                "ngSpice_Init returned {}",
                status
            )));
        }

        let mut ident: c_int = 0;
        let status = unsafe { native.init_sync(&Dispatch::sync_callbacks(), &mut ident, token) };
        if status != 0 {
            return Err(OhmlinkError::EngineInitFailed(format!(
                "ngSpice_Init_Sync returned {}",
                status
            )));
        }

        self.dispatch.clear_exit();
        self.native = Some(native);
        self.claim = Some(claim);
        self.attaches += 1;
        tracing::info!("engine attached");
        Ok(())
    }

    /// Quit the engine and unload the library. Safe to call repeatedly.
    pub fn detach(&mut self) {
        drop(self.unload());
    }

    /// Quit and unload the library, handing back the attachment slot
    /// instead of releasing it.
    fn unload(&mut self) -> Option<AttachClaim> {
        let Some(native) = self.native.take() else {
            return self.claim.take();
        };
        let _span = tracing::info_span!("detach").entered();

        if native.running() {
            send(native.as_ref(), "bg_halt");
        }
        let status = send(native.as_ref(), "quit");
        if status != 0 {
            tracing::warn!(status, "quit command failed, unloading anyway");
        }
        drop(native);

        // Nobody will report the end of a background run any more.
        self.dispatch.set_background(false);
        self.dispatch.flush_sink();
        tracing::info!("engine detached");
        self.claim.take()
    }

    /// Detach and attach again, keeping sources, sink and hooks.
    ///
    /// The attachment slot stays with this handle throughout, so no other
    /// engine can attach in between. If the new attach fails the handle is
    /// left detached and the slot is released.
    ///
    /// ngspice leaks memory across runs; resetting every few dozen runs keeps
    /// a long sweep bounded.
    pub fn reset(&mut self) -> Result<()> {
        let claim = match self.unload() {
            Some(claim) => claim,
            None => AttachClaim::acquire()?,
        };
        self.attach_with(claim)
    }

    pub fn is_attached(&self) -> bool {
        self.native.is_some()
    }

    pub fn library_path(&self) -> &Path {
        &self.library_path
    }

    fn native(&self) -> Result<&dyn NativeApi> {
        self.native.as_deref().ok_or(OhmlinkError::Detached)
    }

    /// Send one control command.
    pub fn command(&self, text: &str) -> Result<()> {
        let native = self.native()?;
        let command = encoding::encode(text)?;
        tracing::debug!(command = text, "ngspice command");
        let status = native.command(&command);
        if status != 0 {
            return Err(OhmlinkError::CommandFailed {
                command: text.to_string(),
                status,
            });
        }
        Ok(())
    }

    /// Load a netlist from a file or from lines.
    pub fn load_netlist(&self, netlist: impl Into<Netlist>) -> Result<()> {
        match netlist.into() {
            Netlist::Path(path) => self
                .command(&format!("source {}", path.display()))
                .map_err(|e| OhmlinkError::NetlistLoadFailed(format!("{}: {}", path.display(), e))),
            Netlist::Lines(lines) => self.load_lines(&lines),
        }
    }

    fn load_lines(&self, lines: &[String]) -> Result<()> {
        let native = self.native()?;
        let encoded = lines
            .iter()
            .map(|l| encoding::encode(&format!("{}{}", l, LINE_ENDING)))
            .collect::<Result<Vec<_>>>()?;
        let mut array: Vec<*mut c_char> = encoded
            .iter()
            .map(|c| c.as_ptr() as *mut c_char)
            .chain(std::iter::once(std::ptr::null_mut()))
            .collect();

        tracing::debug!(lines = lines.len(), "loading netlist");
        let status = unsafe { native.circ(array.as_mut_ptr()) };
        if status != 0 {
            return Err(OhmlinkError::NetlistLoadFailed(format!(
                "ngSpice_Circ returned {}",
                status
            )));
        }
        Ok(())
    }

    /// Optionally load `netlist`, run it to completion and decode the results.
    pub fn run(&self, netlist: Option<Netlist>) -> Result<Results> {
        let _span = tracing::info_span!("run").entered();
        self.start(netlist, false)?;
        self.results()
    }

    /// Shorthand for `run(Some(netlist.into()))`.
    pub fn simulate(&self, netlist: impl Into<Netlist>) -> Result<Results> {
        self.run(Some(netlist.into()))
    }

    /// Optionally load `netlist` and start it on the engine's background
    /// thread. Returns as soon as the thread is started.
    pub fn bg_run(&self, netlist: Option<Netlist>) -> Result<()> {
        let _span = tracing::info_span!("bg_run").entered();
        self.start(netlist, true)
    }

    fn start(&self, netlist: Option<Netlist>, background: bool) -> Result<()> {
        if let Some(netlist) = netlist {
            if let Err(e) = self.load_netlist(netlist) {
                tracing::error!(error = %e, "netlist not loaded, run aborted");
                return Err(e);
            }
        }

        let command = if background { "bg_run" } else { "run" };
        if background {
            self.dispatch.set_background(true);
        }
        match self.command(command) {
            Ok(()) => Ok(()),
            Err(e) => {
                if background {
                    self.dispatch.set_background(false);
                }
                tracing::error!(error = %e, "simulation command failed");
                Err(OhmlinkError::RunFailed(e.to_string()))
            }
        }
    }

    /// Suspend a background run.
    pub fn bg_halt(&self) -> Result<()> {
        self.command("bg_halt")
    }

    /// Resume a halted background run.
    ///
    /// The engine starts a fresh background thread, so the run is marked as
    /// started before the command goes out, as for [`Engine::bg_run`].
    pub fn bg_resume(&self) -> Result<()> {
        self.dispatch.set_background(true);
        self.command("bg_resume").inspect_err(|_| {
            self.dispatch.set_background(false);
        })
    }

    /// Ask the library whether its background thread is active.
    pub fn is_running(&self) -> bool {
        self.native.as_deref().map(|n| n.running()).unwrap_or(false)
    }

    /// Block until the background thread reports that it stopped.
    pub fn wait_background(&self) {
        self.dispatch.wait_background();
    }

    /// Decode every plot the engine currently holds.
    pub fn results(&self) -> Result<Results> {
        let results = decode::decode_all(self.native()?);
        if !results.skipped.is_empty() {
            self.dispatch.log(&format!(
                "Warning: {} vector(s) could not be decoded and were skipped",
                results.skipped.len()
            ));
        }
        Ok(results)
    }

    /// Name of the engine's current plot.
    pub fn current_plot(&self) -> Option<String> {
        let native = self.native.as_deref()?;
        let p = native.cur_plot();
        if p.is_null() {
            return None;
        }
        Some(encoding::decode_cstr(unsafe { CStr::from_ptr(p) }))
    }

    /// Run `version -f` and parse the banner.
    ///
    /// Output lines queued before the call are discarded.
    pub fn version(&self) -> Result<EngineVersion> {
        self.dispatch.drain_messages();
        self.command("version -f")?;
        let lines = self.dispatch.drain_messages();
        version::parse_banner(lines.iter().map(String::as_str)).ok_or_else(|| {
            OhmlinkError::UnexpectedOutput("no version banner in 'version -f' output".to_string())
        })
    }

    /// Register the function evaluated for the `external` source `name`.
    pub fn add_external_source(
        &self,
        name: &str,
        f: impl Fn(f64) -> f64 + Send + Sync + 'static,
    ) -> Result<()> {
        self.dispatch.sources.insert(name, Arc::new(f))
    }

    pub fn remove_external_source(&self, name: &str) -> Result<bool> {
        self.dispatch.sources.remove(name)
    }

    /// Names of the registered external sources.
    pub fn external_sources(&self) -> Vec<String> {
        self.dispatch.sources.names()
    }

    /// Names that were requested without being registered.
    pub fn undefined_sources(&self) -> Vec<String> {
        self.dispatch.sources.fallbacks()
    }

    /// Called with `true` when a background run starts and `false` when it ends.
    pub fn set_thread_state_callback(&self, f: impl Fn(bool) + Send + Sync + 'static) {
        self.dispatch.set_thread_state_callback(Some(Arc::new(f)));
    }

    /// Called once per new plot with its vector layout.
    pub fn set_init_data_callback(&self, f: impl Fn(&PlotSchema) + Send + Sync + 'static) {
        self.dispatch.set_init_data_callback(Some(Arc::new(f)));
    }

    /// Called for every accepted data point while a simulation runs.
    pub fn set_data_callback(&self, f: impl Fn(&DataSample) + Send + Sync + 'static) {
        self.dispatch.set_data_callback(Some(Arc::new(f)));
    }

    /// Remove the thread-state and streaming callbacks.
    pub fn clear_callbacks(&self) {
        self.dispatch.set_thread_state_callback(None);
        self.dispatch.set_init_data_callback(None);
        self.dispatch.set_data_callback(None);
    }

    /// Replace the output sink.
    pub fn set_output(&self, sink: impl Write + Send + 'static) {
        self.dispatch.set_sink(Box::new(sink));
    }

    /// Take the engine output lines queued so far.
    pub fn drain_messages(&self) -> Vec<String> {
        self.dispatch.drain_messages()
    }

    /// The last exit request the engine made, since the last attach.
    pub fn last_exit(&self) -> Option<ExitRequest> {
        self.dispatch.last_exit()
    }

    pub fn counts(&self) -> EngineCounts {
        EngineCounts::read(&self.dispatch.counters, self.attaches)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Send a fixed command during teardown, where errors are only logged.
fn send(native: &dyn NativeApi, text: &str) -> c_int {
    match encoding::encode(text) {
        Ok(c) => native.command(&c),
        Err(_) => -1,
    }
}
