//! Binding to the liboqs signature API, loaded at runtime.
//!
//! Only the enumeration calls, `OQS_SIG_new`/`OQS_SIG_free`, the three
//! operation wrappers and the leading length fields of `OQS_SIG` are used.

use crate::error::{BenchError, Result};
use crate::scheme::{SchemeProvider, SignatureScheme};
use libloading::Library;
use std::ffi::{c_char, c_int, CStr, CString, OsString};
use std::path::Path;
use std::ptr::NonNull;
use tracing::{debug, info};

/// Environment variable overriding the library location.
pub const LIBRARY_ENV: &str = "PQSIG_BENCH_LIBOQS";

const OQS_SUCCESS: c_int = 0;

/// Leading fields of `OQS_SIG`. The layout of this prefix is the same across
/// liboqs releases; later fields are never touched. Only ever read through a
/// pointer owned by liboqs.
#[repr(C)]
#[allow(dead_code)]
struct OqsSig {
    method_name: *const c_char,
    alg_version: *const c_char,
    claimed_nist_level: u8,
    euf_cma: u8,
    length_public_key: usize,
    length_secret_key: usize,
    length_signature: usize,
}

type InitFn = unsafe extern "C" fn();
type AlgCountFn = unsafe extern "C" fn() -> c_int;
type AlgIdentifierFn = unsafe extern "C" fn(usize) -> *const c_char;
type SigNewFn = unsafe extern "C" fn(*const c_char) -> *mut OqsSig;
type SigFreeFn = unsafe extern "C" fn(*mut OqsSig);
type KeypairFn = unsafe extern "C" fn(*const OqsSig, *mut u8, *mut u8) -> c_int;
type SignFn =
    unsafe extern "C" fn(*const OqsSig, *mut u8, *mut usize, *const u8, usize, *const u8) -> c_int;
type VerifyFn =
    unsafe extern "C" fn(*const OqsSig, *const u8, usize, *const u8, usize, *const u8) -> c_int;

/// A loaded liboqs shared library.
pub struct OqsLibrary {
    path: String,
    alg_count: AlgCountFn,
    alg_identifier: AlgIdentifierFn,
    sig_new: SigNewFn,
    sig_free: SigFreeFn,
    keypair: KeypairFn,
    sign: SignFn,
    verify: VerifyFn,
    // Keeps the function pointers above valid.
    _lib: Library,
}

/// Platform file name of the library (`liboqs.so`, `liboqs.dylib`, `oqs.dll`).
pub fn default_library_name() -> OsString {
    libloading::library_filename("oqs")
}

impl OqsLibrary {
    /// Load from `path`, or from the dynamic loader's search path when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let target = path
            .map(|p| p.as_os_str().to_os_string())
            .unwrap_or_else(default_library_name);
        let shown = target.to_string_lossy().into_owned();

        // SAFETY: loading runs the library's initialisers; liboqs has no
        // unsound constructors.
        let lib = unsafe { Library::new(&target) }
            .map_err(|e| BenchError::LibraryUnavailable(format!("{shown}: {e}")))?;

        // SAFETY: each symbol is looked up with the signature declared in
        // liboqs' `sig.h`/`common.h`.
        unsafe {
            if let Ok(init) = lib.get::<InitFn>(b"OQS_init\0") {
                init();
            }

            let missing = |name: &str, e: libloading::Error| {
                BenchError::LibraryUnavailable(format!("{shown}: missing {name}: {e}"))
            };
            let alg_count = *lib
                .get::<AlgCountFn>(b"OQS_SIG_alg_count\0")
                .map_err(|e| missing("OQS_SIG_alg_count", e))?;
            let alg_identifier = *lib
                .get::<AlgIdentifierFn>(b"OQS_SIG_alg_identifier\0")
                .map_err(|e| missing("OQS_SIG_alg_identifier", e))?;
            let sig_new = *lib
                .get::<SigNewFn>(b"OQS_SIG_new\0")
                .map_err(|e| missing("OQS_SIG_new", e))?;
            let sig_free = *lib
                .get::<SigFreeFn>(b"OQS_SIG_free\0")
                .map_err(|e| missing("OQS_SIG_free", e))?;
            let keypair = *lib
                .get::<KeypairFn>(b"OQS_SIG_keypair\0")
                .map_err(|e| missing("OQS_SIG_keypair", e))?;
            let sign = *lib
                .get::<SignFn>(b"OQS_SIG_sign\0")
                .map_err(|e| missing("OQS_SIG_sign", e))?;
            let verify = *lib
                .get::<VerifyFn>(b"OQS_SIG_verify\0")
                .map_err(|e| missing("OQS_SIG_verify", e))?;

            info!(library = %shown, "loaded signature library");
            Ok(OqsLibrary {
                path: shown,
                alg_count,
                alg_identifier,
                sig_new,
                sig_free,
                keypair,
                sign,
                verify,
                _lib: lib,
            })
        }
    }
}

impl SchemeProvider for OqsLibrary {
    fn describe(&self) -> String {
        self.path.clone()
    }

    fn available_schemes(&self) -> Vec<String> {
        // SAFETY: identifiers are static NUL-terminated strings owned by liboqs.
        unsafe {
            let count = (self.alg_count)().max(0) as usize;
            (0..count)
                .filter_map(|i| {
                    let id = (self.alg_identifier)(i);
                    (!id.is_null()).then(|| CStr::from_ptr(id).to_string_lossy().into_owned())
                })
                .collect()
        }
    }

    fn instantiate<'a>(&'a self, name: &str) -> Result<Box<dyn SignatureScheme + 'a>> {
        let c_name = CString::new(name).map_err(|_| BenchError::UnknownScheme(name.to_string()))?;
        // SAFETY: `c_name` outlives the call; a null return means the
        // algorithm is unknown or disabled in this build.
        let raw = unsafe { (self.sig_new)(c_name.as_ptr()) };
        let handle =
            NonNull::new(raw).ok_or_else(|| BenchError::InstantiationFailed(name.to_string()))?;
        debug!(scheme = name, "created OQS_SIG handle");
        Ok(Box::new(OqsScheme {
            lib: self,
            handle,
            name: name.to_string(),
        }))
    }
}

/// One `OQS_SIG` handle. Freed on drop.
pub struct OqsScheme<'lib> {
    lib: &'lib OqsLibrary,
    handle: NonNull<OqsSig>,
    name: String,
}

impl OqsScheme<'_> {
    fn sig(&self) -> &OqsSig {
        // SAFETY: the handle is non-null and stays alive until drop.
        unsafe { self.handle.as_ref() }
    }

    fn check_len(&self, what: &str, got: usize, want: usize) -> Result<()> {
        if got < want {
            return Err(BenchError::config(format!(
                "{}: {what} buffer holds {got} bytes, need {want}",
                self.name
            )));
        }
        Ok(())
    }
}

impl SignatureScheme for OqsScheme<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn public_key_len(&self) -> usize {
        self.sig().length_public_key
    }

    fn secret_key_len(&self) -> usize {
        self.sig().length_secret_key
    }

    fn signature_len(&self) -> usize {
        self.sig().length_signature
    }

    fn keypair(&self, public_key: &mut [u8], secret_key: &mut [u8]) -> Result<()> {
        self.check_len("public key", public_key.len(), self.public_key_len())?;
        self.check_len("secret key", secret_key.len(), self.secret_key_len())?;
        // SAFETY: both buffers are at least the declared lengths.
        let status = unsafe {
            (self.lib.keypair)(
                self.handle.as_ptr(),
                public_key.as_mut_ptr(),
                secret_key.as_mut_ptr(),
            )
        };
        if status != OQS_SUCCESS {
            return Err(BenchError::KeygenFailed {
                scheme: self.name.clone(),
                status,
            });
        }
        Ok(())
    }

    fn sign(&self, signature: &mut [u8], message: &[u8], secret_key: &[u8]) -> Result<usize> {
        self.check_len("signature", signature.len(), self.signature_len())?;
        self.check_len("secret key", secret_key.len(), self.secret_key_len())?;
        let mut sig_len: usize = 0;
        // SAFETY: the signature buffer holds the declared maximum length.
        let status = unsafe {
            (self.lib.sign)(
                self.handle.as_ptr(),
                signature.as_mut_ptr(),
                &mut sig_len,
                message.as_ptr(),
                message.len(),
                secret_key.as_ptr(),
            )
        };
        if status != OQS_SUCCESS {
            return Err(BenchError::SignFailed {
                scheme: self.name.clone(),
                status,
            });
        }
        Ok(sig_len)
    }

    fn verify(&self, message: &[u8], signature: &[u8], public_key: &[u8]) -> Result<()> {
        self.check_len("public key", public_key.len(), self.public_key_len())?;
        // SAFETY: all pointers come from live slices with matching lengths.
        let status = unsafe {
            (self.lib.verify)(
                self.handle.as_ptr(),
                message.as_ptr(),
                message.len(),
                signature.as_ptr(),
                signature.len(),
                public_key.as_ptr(),
            )
        };
        if status != OQS_SUCCESS {
            return Err(BenchError::VerifyFailed {
                scheme: self.name.clone(),
                status,
            });
        }
        Ok(())
    }
}

impl Drop for OqsScheme<'_> {
    fn drop(&mut self) {
        // SAFETY: the handle came from `OQS_SIG_new` and is freed exactly once.
        unsafe { (self.lib.sig_free)(self.handle.as_ptr()) };
        debug!(scheme = %self.name, "freed OQS_SIG handle");
    }
}
