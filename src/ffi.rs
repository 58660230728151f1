//! Raw C types of the ngspice shared-library interface (`sharedspice.h`).

use std::ffi::{c_char, c_double, c_int, c_short, c_void};

/// `vector_info.v_flags` bit: data is in `v_realdata`.
pub const VF_REAL: c_short = 0x1;
/// `vector_info.v_flags` bit: data is in `v_compdata`.
pub const VF_COMPLEX: c_short = 0x2;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NgComplex {
    pub cx_real: c_double,
    pub cx_imag: c_double,
}

/// Result of `ngGet_Vec_Info`.
#[repr(C)]
#[derive(Debug)]
pub struct VectorInfo {
    pub v_name: *mut c_char,
    pub v_type: c_int,
    pub v_flags: c_short,
    pub v_realdata: *mut c_double,
    pub v_compdata: *mut NgComplex,
    pub v_length: c_int,
}

/// One vector announced by `SendInitData`.
#[repr(C)]
#[derive(Debug)]
pub struct VecInfo {
    /// Position in the plot's vector list, starting at 0.
    pub number: c_int,
    pub vecname: *mut c_char,
    pub is_real: bool,
    pub pdvec: *mut c_void,
    pub pdvecscale: *mut c_void,
}

#[repr(C)]
#[derive(Debug)]
pub struct VecInfoAll {
    pub name: *mut c_char,
    pub title: *mut c_char,
    pub date: *mut c_char,
    pub type_: *mut c_char,
    pub veccount: c_int,
    pub vecs: *mut *mut VecInfo,
}

/// One value of one vector, as streamed by `SendData`.
#[repr(C)]
#[derive(Debug)]
pub struct VecValues {
    pub name: *mut c_char,
    pub creal: c_double,
    pub cimag: c_double,
    pub is_scale: bool,
    pub is_complex: bool,
}

#[repr(C)]
#[derive(Debug)]
pub struct VecValuesAll {
    pub veccount: c_int,
    /// Index of this point, i.e. the number of accepted data points so far.
    pub vecindex: c_int,
    pub vecsa: *mut *mut VecValues,
}

// Callbacks registered with ngSpice_Init. The trailing `*mut c_void` is the
// user data token given at registration; the `c_int` before it is the
// library identifier.
pub type SendCharFn = unsafe extern "C" fn(*mut c_char, c_int, *mut c_void) -> c_int;
pub type SendStatFn = unsafe extern "C" fn(*mut c_char, c_int, *mut c_void) -> c_int;
pub type ControlledExitFn = unsafe extern "C" fn(c_int, bool, bool, c_int, *mut c_void) -> c_int;
pub type SendDataFn = unsafe extern "C" fn(*mut VecValuesAll, c_int, c_int, *mut c_void) -> c_int;
pub type SendInitDataFn = unsafe extern "C" fn(*mut VecInfoAll, c_int, *mut c_void) -> c_int;
pub type BgThreadRunningFn = unsafe extern "C" fn(bool, c_int, *mut c_void) -> c_int;

// Callbacks registered with ngSpice_Init_Sync.
pub type GetVsrcDataFn =
    unsafe extern "C" fn(*mut c_double, c_double, *mut c_char, c_int, *mut c_void) -> c_int;
pub type GetIsrcDataFn =
    unsafe extern "C" fn(*mut c_double, c_double, *mut c_char, c_int, *mut c_void) -> c_int;
pub type GetSyncDataFn = unsafe extern "C" fn(
    c_double,
    *mut c_double,
    c_double,
    c_int,
    c_int,
    c_int,
    *mut c_void,
) -> c_int;

/// Function pointers handed to `ngSpice_Init`.
#[derive(Debug, Clone, Copy)]
pub struct Callbacks {
    pub send_char: Option<SendCharFn>,
    pub send_stat: Option<SendStatFn>,
    pub controlled_exit: Option<ControlledExitFn>,
    pub send_data: Option<SendDataFn>,
    pub send_init_data: Option<SendInitDataFn>,
    pub bg_thread_running: Option<BgThreadRunningFn>,
}

/// Function pointers handed to `ngSpice_Init_Sync`.
#[derive(Debug, Clone, Copy)]
pub struct SyncCallbacks {
    pub vsrc_data: Option<GetVsrcDataFn>,
    pub isrc_data: Option<GetIsrcDataFn>,
    pub sync_data: Option<GetSyncDataFn>,
}

// Exported entry points of libngspice.
pub type NgSpiceInit = unsafe extern "C" fn(
    Option<SendCharFn>,
    Option<SendStatFn>,
    Option<ControlledExitFn>,
    Option<SendDataFn>,
    Option<SendInitDataFn>,
    Option<BgThreadRunningFn>,
    *mut c_void,
) -> c_int;
pub type NgSpiceInitSync = unsafe extern "C" fn(
    Option<GetVsrcDataFn>,
    Option<GetIsrcDataFn>,
    Option<GetSyncDataFn>,
    *mut c_int,
    *mut c_void,
) -> c_int;
pub type NgSpiceCommand = unsafe extern "C" fn(*mut c_char) -> c_int;
pub type NgSpiceCirc = unsafe extern "C" fn(*mut *mut c_char) -> c_int;
pub type NgSpiceCurPlot = unsafe extern "C" fn() -> *mut c_char;
pub type NgSpiceAllPlots = unsafe extern "C" fn() -> *mut *mut c_char;
pub type NgSpiceAllVecs = unsafe extern "C" fn(*mut c_char) -> *mut *mut c_char;
pub type NgGetVecInfo = unsafe extern "C" fn(*mut c_char) -> *mut VectorInfo;
pub type NgSpiceRunning = unsafe extern "C" fn() -> bool;
