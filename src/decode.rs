//! Pull the engine's plot/vector tree into [`Results`].
//!
//! Each vector is decoded independently. A vector whose metadata is missing
//! or inconsistent (mixed-signal runs expose this transiently) is recorded as
//! skipped and the walk continues with the next one.

use std::ffi::{CStr, CString};

use num_complex::Complex64;
use thiserror::Error;

use crate::encoding;
use crate::ffi::{VectorInfo, VF_COMPLEX, VF_REAL};
use crate::native::{self, NativeApi};
use crate::results::{Results, SkippedVector, VectorData};
use crate::units::VectorType;

/// Name of the AC sweep axis. The engine reports it through the complex
/// path, but only its real part means anything.
pub const FREQUENCY_VECTOR: &str = "frequency";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("engine returned no vector info")]
    NullInfo,

    #[error("vector has no name")]
    NullName,

    #[error("unknown vector type code {0}")]
    UnknownTypeCode(i32),

    #[error("negative vector length {0}")]
    NegativeLength(i32),

    #[error("data pointer is null")]
    NullData,

    #[error("flags {0:#x} mark neither real nor complex data")]
    NoDataFlag(i16),
}

/// One successfully decoded vector.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedVector {
    pub name: String,
    pub data: VectorData,
    pub ty: VectorType,
}

/// Decode one `vector_info`.
///
/// # Safety
///
/// The data pointer selected by the flags must be valid for `v_length`
/// elements and `v_name` must be null or NUL-terminated.
pub unsafe fn decode_vector(info: &VectorInfo) -> Result<DecodedVector, DecodeError> {
    if info.v_name.is_null() {
        return Err(DecodeError::NullName);
    }
    let name = encoding::decode_cstr(CStr::from_ptr(info.v_name));
    let ty = VectorType::from_code(info.v_type)?;
    let len =
        usize::try_from(info.v_length).map_err(|_| DecodeError::NegativeLength(info.v_length))?;

    let data = if info.v_flags & VF_REAL != 0 {
        VectorData::Real(copy_slice(info.v_realdata, len)?.to_vec())
    } else if info.v_flags & VF_COMPLEX != 0 {
        let raw = copy_slice(info.v_compdata, len)?;
        if name == FREQUENCY_VECTOR {
            VectorData::Real(raw.iter().map(|c| c.cx_real).collect())
        } else {
            VectorData::Complex(
                raw.iter()
                    .map(|c| Complex64::new(c.cx_real, c.cx_imag))
                    .collect(),
            )
        }
    } else {
        return Err(DecodeError::NoDataFlag(info.v_flags));
    };

    Ok(DecodedVector { name, data, ty })
}

/// View `len` elements at `ptr`. An empty vector may carry a null pointer.
unsafe fn copy_slice<'a, T>(ptr: *const T, len: usize) -> Result<&'a [T], DecodeError> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(DecodeError::NullData);
    }
    Ok(std::slice::from_raw_parts(ptr, len))
}

/// Walk every plot and vector the engine knows about.
pub fn decode_all(api: &dyn NativeApi) -> Results {
    let _span = tracing::info_span!("decode_results").entered();
    let mut results = Results::default();

    let plots = unsafe { native::string_array(api.all_plots()) };
    for plot in &plots {
        let plot_name = encoding::decode_cstr(plot);
        // Touch both containers so empty plots still show up.
        results.data.plot_mut(&plot_name);
        results.units.plot_mut(&plot_name);

        let vectors = unsafe { native::string_array(api.all_vecs(plot)) };
        for vector in &vectors {
            let vector_name = encoding::decode_cstr(vector);
            match decode_one(api, plot, vector) {
                Ok(decoded) => {
                    results
                        .units
                        .plot_mut(&plot_name)
                        .insert(decoded.name.clone(), decoded.ty);
                    results
                        .data
                        .plot_mut(&plot_name)
                        .insert(decoded.name, decoded.data);
                }
                Err(reason) => {
                    tracing::debug!(plot = %plot_name, vector = %vector_name, %reason, "vector skipped");
                    results.skipped.push(SkippedVector {
                        plot: plot_name.clone(),
                        vector: vector_name,
                        reason,
                    });
                }
            }
        }
    }

    if !results.skipped.is_empty() {
        tracing::warn!(
            skipped = results.skipped.len(),
            "some vectors could not be decoded and were left out"
        );
    }
    results
}

fn decode_one(api: &dyn NativeApi, plot: &CStr, vector: &CStr) -> Result<DecodedVector, DecodeError> {
    let query = qualified_name(plot, vector);
    let info = api.vector_info(&query);
    if info.is_null() {
        return Err(DecodeError::NullInfo);
    }
    unsafe { decode_vector(&*info) }
}

/// `plot.vector`, so the lookup does not depend on the engine's current plot.
fn qualified_name(plot: &CStr, vector: &CStr) -> CString {
    let mut bytes = Vec::with_capacity(plot.to_bytes().len() + vector.to_bytes().len() + 1);
    bytes.extend_from_slice(plot.to_bytes());
    bytes.push(b'.');
    bytes.extend_from_slice(vector.to_bytes());
    // Neither part contains a NUL, so neither does the join.
    CString::new(bytes).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::NgComplex;
    use std::ffi::c_char;
    use std::ptr;

    fn info(
        name: &CString,
        v_type: i32,
        flags: i16,
        real: &mut [f64],
        comp: &mut [NgComplex],
        len: i32,
    ) -> VectorInfo {
        VectorInfo {
            v_name: name.as_ptr() as *mut c_char,
            v_type,
            v_flags: flags,
            v_realdata: if real.is_empty() { ptr::null_mut() } else { real.as_mut_ptr() },
            v_compdata: if comp.is_empty() { ptr::null_mut() } else { comp.as_mut_ptr() },
            v_length: len,
        }
    }

    #[test]
    fn test_real_vector_copied_exactly() {
        let name = CString::new("V(2)").unwrap();
        let mut data = [0.5, -1.25, 3.0e-9];
        let vi = info(&name, 3, VF_REAL, &mut data, &mut [], 3);
        let d = unsafe { decode_vector(&vi) }.unwrap();
        assert_eq!(d.name, "V(2)");
        assert_eq!(d.ty, VectorType::Voltage);
        assert_eq!(d.data, VectorData::Real(vec![0.5, -1.25, 3.0e-9]));
    }

    #[test]
    fn test_complex_vector_interleaved() {
        let name = CString::new("out").unwrap();
        let mut data = [
            NgComplex { cx_real: 1.0, cx_imag: 2.0 },
            NgComplex { cx_real: -3.0, cx_imag: 4.0 },
        ];
        let vi = info(&name, 3, VF_COMPLEX, &mut [], &mut data, 2);
        let d = unsafe { decode_vector(&vi) }.unwrap();
        assert_eq!(
            d.data,
            VectorData::Complex(vec![Complex64::new(1.0, 2.0), Complex64::new(-3.0, 4.0)])
        );
    }

    #[test]
    fn test_frequency_keeps_real_part_only() {
        let name = CString::new("frequency").unwrap();
        let mut data = [
            NgComplex { cx_real: 1e3, cx_imag: 7.0 },
            NgComplex { cx_real: 1e4, cx_imag: -7.0 },
        ];
        let vi = info(&name, 2, VF_COMPLEX, &mut [], &mut data, 2);
        let d = unsafe { decode_vector(&vi) }.unwrap();
        assert_eq!(d.data, VectorData::Real(vec![1e3, 1e4]));
        assert_eq!(d.ty.as_pair(), ("Hz", "frequency"));
    }

    #[test]
    fn test_real_flag_wins_over_complex() {
        let name = CString::new("time").unwrap();
        let mut data = [0.0, 1.0];
        let vi = info(&name, 1, VF_REAL | VF_COMPLEX, &mut data, &mut [], 2);
        let d = unsafe { decode_vector(&vi) }.unwrap();
        assert_eq!(d.data, VectorData::Real(vec![0.0, 1.0]));
    }

    #[test]
    fn test_bad_metadata_is_reported() {
        let name = CString::new("x").unwrap();
        let mut data = [1.0];

        let vi = info(&name, 99, VF_REAL, &mut data, &mut [], 1);
        assert_eq!(unsafe { decode_vector(&vi) }, Err(DecodeError::UnknownTypeCode(99)));

        let vi = info(&name, 3, 0x4, &mut data, &mut [], 1);
        assert_eq!(unsafe { decode_vector(&vi) }, Err(DecodeError::NoDataFlag(0x4)));

        let vi = info(&name, 3, VF_REAL, &mut data, &mut [], -2);
        assert_eq!(unsafe { decode_vector(&vi) }, Err(DecodeError::NegativeLength(-2)));

        let vi = info(&name, 3, VF_COMPLEX, &mut data, &mut [], 1);
        assert_eq!(unsafe { decode_vector(&vi) }, Err(DecodeError::NullData));

        let mut vi = info(&name, 3, VF_REAL, &mut data, &mut [], 1);
        vi.v_name = ptr::null_mut();
        assert_eq!(unsafe { decode_vector(&vi) }, Err(DecodeError::NullName));
    }

    #[test]
    fn test_empty_vector_with_null_pointer() {
        let name = CString::new("empty").unwrap();
        let vi = info(&name, 0, VF_REAL, &mut [], &mut [], 0);
        let d = unsafe { decode_vector(&vi) }.unwrap();
        assert!(d.data.is_empty());
    }

    #[test]
    fn test_qualified_name() {
        let q = qualified_name(
            &CString::new("ac1").unwrap(),
            &CString::new("V(out)").unwrap(),
        );
        assert_eq!(q.as_bytes(), b"ac1.V(out)");
    }
}
