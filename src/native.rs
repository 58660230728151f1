//! The loaded engine library.
//!
//! [`NativeApi`] is the C-ABI surface the rest of the crate talks to, and
//! [`Loader`] produces one from a file path. [`SharedLibrary`] is the real
//! implementation on top of `libloading`; anything else implementing the
//! traits (an instrumented build, a test double) can be plugged into
//! [`crate::engine::EngineOptions`].

use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::path::{Path, PathBuf};

use libloading::Library;

use crate::error::{OhmlinkError, Result};
use crate::ffi::{self, Callbacks, SyncCallbacks, VectorInfo};

/// Entry points of the ngspice shared library.
///
/// Pointers returned from these calls are owned by the engine and stay valid
/// until the next command that changes its plot list.
pub trait NativeApi: Send {
    /// `ngSpice_Init`.
    ///
    /// # Safety
    ///
    /// `user_data` is handed back to every callback and must stay valid until
    /// the library is unloaded.
    unsafe fn init(&self, callbacks: &Callbacks, user_data: *mut c_void) -> c_int;

    /// `ngSpice_Init_Sync`.
    ///
    /// # Safety
    ///
    /// Same contract as [`NativeApi::init`]; `ident` must be valid for the call.
    unsafe fn init_sync(
        &self,
        callbacks: &SyncCallbacks,
        ident: *mut c_int,
        user_data: *mut c_void,
    ) -> c_int;

    /// `ngSpice_Command`. Returns the engine's status, 0 on success.
    fn command(&self, command: &CStr) -> c_int;

    /// `ngSpice_Circ`.
    ///
    /// # Safety
    ///
    /// `lines` must be a NULL-terminated array of NUL-terminated strings that
    /// outlives the call.
    unsafe fn circ(&self, lines: *mut *mut c_char) -> c_int;

    /// `ngSpice_CurPlot`.
    fn cur_plot(&self) -> *mut c_char;

    /// `ngSpice_AllPlots`: NULL-terminated array of plot names.
    fn all_plots(&self) -> *mut *mut c_char;

    /// `ngSpice_AllVecs`: NULL-terminated array of vector names in `plot`.
    fn all_vecs(&self, plot: &CStr) -> *mut *mut c_char;

    /// `ngGet_Vec_Info`. `name` may be qualified as `plot.vector`.
    fn vector_info(&self, name: &CStr) -> *mut VectorInfo;

    /// `ngSpice_running`: whether the background thread is active.
    fn running(&self) -> bool;
}

/// Produces a [`NativeApi`] from a library path.
pub trait Loader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Box<dyn NativeApi>>;
}

/// Loads the real library with `libloading`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibraryLoader;

impl Loader for LibraryLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn NativeApi>> {
        Ok(Box::new(SharedLibrary::load(path)?))
    }
}

/// A loaded `libngspice` with its entry points resolved.
///
/// The function pointers are copied out of their symbols and are only valid
/// while `library` is alive; dropping this value unloads the library.
pub struct SharedLibrary {
    path: PathBuf,
    init: ffi::NgSpiceInit,
    init_sync: ffi::NgSpiceInitSync,
    command: ffi::NgSpiceCommand,
    circ: ffi::NgSpiceCirc,
    cur_plot: ffi::NgSpiceCurPlot,
    all_plots: ffi::NgSpiceAllPlots,
    all_vecs: ffi::NgSpiceAllVecs,
    vec_info: ffi::NgGetVecInfo,
    running: ffi::NgSpiceRunning,
    _library: Library,
}

impl SharedLibrary {
    pub fn load(path: &Path) -> Result<Self> {
        let load_err = |reason: String| OhmlinkError::LibraryLoad {
            path: path.to_path_buf(),
            reason,
        };

        let library = unsafe { Library::new(path) }.map_err(|e| load_err(e.to_string()))?;

        // Copy a symbol out as a plain function pointer.
        macro_rules! symbol {
            ($name:literal, $ty:ty) => {{
                let sym = unsafe { library.get::<$ty>($name) }.map_err(|e| {
                    load_err(format!(
                        "missing symbol {}: {}",
                        String::from_utf8_lossy(&$name[..$name.len() - 1]),
                        e
                    ))
                })?;
                *sym
            }};
        }

        let init = symbol!(b"ngSpice_Init\0", ffi::NgSpiceInit);
        let init_sync = symbol!(b"ngSpice_Init_Sync\0", ffi::NgSpiceInitSync);
        let command = symbol!(b"ngSpice_Command\0", ffi::NgSpiceCommand);
        let circ = symbol!(b"ngSpice_Circ\0", ffi::NgSpiceCirc);
        let cur_plot = symbol!(b"ngSpice_CurPlot\0", ffi::NgSpiceCurPlot);
        let all_plots = symbol!(b"ngSpice_AllPlots\0", ffi::NgSpiceAllPlots);
        let all_vecs = symbol!(b"ngSpice_AllVecs\0", ffi::NgSpiceAllVecs);
        let vec_info = symbol!(b"ngGet_Vec_Info\0", ffi::NgGetVecInfo);
        let running = symbol!(b"ngSpice_running\0", ffi::NgSpiceRunning);

        tracing::debug!(path = %path.display(), "ngspice library loaded");

        Ok(Self {
            path: path.to_path_buf(),
            init,
            init_sync,
            command,
            circ,
            cur_plot,
            all_plots,
            all_vecs,
            vec_info,
            running,
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NativeApi for SharedLibrary {
    unsafe fn init(&self, callbacks: &Callbacks, user_data: *mut c_void) -> c_int {
        (self.init)(
            callbacks.send_char,
            callbacks.send_stat,
            callbacks.controlled_exit,
            callbacks.send_data,
            callbacks.send_init_data,
            callbacks.bg_thread_running,
            user_data,
        )
    }

    unsafe fn init_sync(
        &self,
        callbacks: &SyncCallbacks,
        ident: *mut c_int,
        user_data: *mut c_void,
    ) -> c_int {
        (self.init_sync)(
            callbacks.vsrc_data,
            callbacks.isrc_data,
            callbacks.sync_data,
            ident,
            user_data,
        )
    }

    fn command(&self, command: &CStr) -> c_int {
        unsafe { (self.command)(command.as_ptr() as *mut c_char) }
    }

    unsafe fn circ(&self, lines: *mut *mut c_char) -> c_int {
        (self.circ)(lines)
    }

    fn cur_plot(&self) -> *mut c_char {
        unsafe { (self.cur_plot)() }
    }

    fn all_plots(&self) -> *mut *mut c_char {
        unsafe { (self.all_plots)() }
    }

    fn all_vecs(&self, plot: &CStr) -> *mut *mut c_char {
        unsafe { (self.all_vecs)(plot.as_ptr() as *mut c_char) }
    }

    fn vector_info(&self, name: &CStr) -> *mut VectorInfo {
        unsafe { (self.vec_info)(name.as_ptr() as *mut c_char) }
    }

    fn running(&self) -> bool {
        unsafe { (self.running)() }
    }
}

/// Copy a NULL-terminated array of C strings.
///
/// # Safety
///
/// `array` must be null or point to a NULL-terminated array of valid
/// NUL-terminated strings.
pub unsafe fn string_array(array: *mut *mut c_char) -> Vec<CString> {
    let mut out = Vec::new();
    if array.is_null() {
        return out;
    }
    let mut i = 0;
    loop {
        let entry = *array.add(i);
        if entry.is_null() {
            break;
        }
        out.push(CStr::from_ptr(entry).to_owned());
        i += 1;
    }
    out
}
