//! Native libraries backing guest native methods
//!
//! Loading, export lookup and release all go through a [`Platform`]
//! backend. Export lookup knows about the `_name@argbytes` spelling that
//! 32-bit stdcall DLLs use.

use std::ffi::c_void;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::Arc;

use corvid_sdk::LoadError;

use crate::defaults::MAX_DECORATED_NAME_LEN;
use crate::platform::{self, ExportNaming, LibraryHandle, Platform};

/// Load a library through `platform`.
pub fn load_library(platform: &dyn Platform, path: &str) -> Result<LibraryHandle, LoadError> {
    let handle = platform.load_library(path)?;
    tracing::debug!(path, handle = handle.as_raw(), "loaded native library");
    Ok(handle)
}

/// Release a library handle.
///
/// # Safety
///
/// The caller owns `handle` and must not free it twice or use any of its
/// symbols afterwards. Nothing here tracks liveness.
pub unsafe fn free_library(platform: &dyn Platform, handle: LibraryHandle) {
    tracing::debug!(handle = handle.as_raw(), "freeing native library");
    platform.free_library(handle);
}

/// Resolve an export for a native method taking `arg_bytes` bytes of
/// arguments.
///
/// Under [`ExportNaming::Stdcall32`] the decorated name `_name@arg_bytes` is
/// tried first and the plain name second; names too long to decorate are not
/// looked up at all. Everywhere else the plain name is looked up directly.
pub fn get_export(
    platform: &dyn Platform,
    handle: LibraryHandle,
    name: &str,
    arg_bytes: u32,
) -> Option<NonNull<c_void>> {
    match platform.export_naming() {
        ExportNaming::Plain => {
            let symbol = platform.resolve_symbol(handle, name);
            tracing::debug!(name, found = symbol.is_some(), "resolved export");
            symbol
        }
        ExportNaming::Stdcall32 => {
            if name.len() > MAX_DECORATED_NAME_LEN {
                tracing::debug!(name, "export name too long to decorate");
                return None;
            }
            let decorated = format!("_{}@{}", name, arg_bytes);
            if let Some(symbol) = platform.resolve_symbol(handle, &decorated) {
                tracing::debug!(name = %decorated, "resolved decorated export");
                return Some(symbol);
            }
            let symbol = platform.resolve_symbol(handle, name);
            tracing::debug!(name, found = symbol.is_some(), "resolved undecorated export");
            symbol
        }
    }
}

/// An owned native library handle that frees itself on drop.
pub struct NativeLibrary {
    platform: Arc<dyn Platform>,
    handle: LibraryHandle,
    path: String,
    freed: bool,
}

impl NativeLibrary {
    /// Load the library at `path` on the process-wide backend
    /// ([`platform::current`]). The handle is released when the value is
    /// dropped or passed to [`NativeLibrary::free`].
    ///
    /// ```ignore
    /// let lib = NativeLibrary::open("./libnio.so")?;
    /// let write0 = lib.get_export("Java_sun_nio_ch_FileDispatcherImpl_write0", 24);
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        Self::open_with(platform::current(), path)
    }

    /// [`NativeLibrary::open`] on an explicit backend.
    pub fn open_with<P: AsRef<Path>>(platform: Arc<dyn Platform>, path: P) -> Result<Self, LoadError> {
        let path_ref = path.as_ref();
        let path_str = path_ref
            .to_str()
            .ok_or_else(|| LoadError::InvalidPath(format!("{:?}", path_ref)))?;

        let handle = load_library(platform.as_ref(), path_str)?;

        Ok(NativeLibrary {
            platform,
            handle,
            path: path_str.to_string(),
            freed: false,
        })
    }

    /// The raw handle.
    pub fn handle(&self) -> LibraryHandle {
        self.handle
    }

    /// Resolve an export, probing decorated names where the platform needs
    /// them.
    pub fn get_export(&self, name: &str, arg_bytes: u32) -> Option<NonNull<c_void>> {
        get_export(self.platform.as_ref(), self.handle, name, arg_bytes)
    }

    /// [`NativeLibrary::get_export`] cast to a function pointer type, with
    /// a missing export reported as [`LoadError::SymbolNotFound`] naming
    /// this library.
    ///
    /// # Safety
    ///
    /// `T` must be a function pointer whose ABI and signature match the
    /// export, and it must not be called after this library is freed.
    pub unsafe fn get<T: Copy>(&self, name: &str, arg_bytes: u32) -> Result<T, LoadError> {
        let symbol = self
            .get_export(name, arg_bytes)
            .ok_or_else(|| LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: self.path.clone(),
            })?;
        Ok(std::mem::transmute_copy(&symbol.as_ptr()))
    }

    /// Release the library now.
    pub fn free(mut self) {
        self.release();
    }

    /// Path passed to [`NativeLibrary::open`].
    pub fn path(&self) -> &str {
        &self.path
    }

    fn release(&mut self) {
        if !self.freed {
            self.freed = true;
            unsafe { free_library(self.platform.as_ref(), self.handle) };
        }
    }
}

impl Drop for NativeLibrary {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("path", &self.path)
            .field("handle", &self.handle)
            .field("platform", &self.platform.name())
            .finish()
    }
}
