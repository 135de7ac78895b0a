//! Win32 backend

use std::ffi::{c_void, CString, OsStr};
use std::io;
use std::mem;
use std::os::windows::ffi::OsStrExt;
use std::ptr::{self, NonNull};

use corvid_sdk::{BridgeError, BridgeResult, IoStatus, LoadError, MapMode};
use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, HANDLE};
use windows_sys::Win32::Networking::WinSock::{
    TransmitFile, WSAGetLastError, SOCKET, TF_USE_KERNEL_APC, WSAEINVAL, WSAENOTSOCK,
};
use windows_sys::Win32::System::LibraryLoader::{FreeLibrary, GetProcAddress, LoadLibraryW};
use windows_sys::Win32::System::Memory::{
    CreateFileMappingW, MapViewOfFile, UnmapViewOfFile, FILE_MAP_COPY, FILE_MAP_READ,
    FILE_MAP_WRITE, MEMORY_MAPPED_VIEW_ADDRESS, PAGE_READONLY, PAGE_READWRITE, PAGE_WRITECOPY,
};
use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

use super::{ExportNaming, LibraryHandle, Platform, RawHandle, TransferTarget};

/// `windows-sys`-based backend.
#[derive(Debug)]
pub struct WindowsPlatform {
    packet_size: u32,
}

impl WindowsPlatform {
    /// A backend sending `packet_size` bytes per `TransmitFile` packet.
    pub fn new(packet_size: u32) -> Self {
        Self { packet_size }
    }
}

fn wide(value: &str) -> Vec<u16> {
    OsStr::new(value)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

impl Platform for WindowsPlatform {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn export_naming(&self) -> ExportNaming {
        if cfg!(target_pointer_width = "32") {
            ExportNaming::Stdcall32
        } else {
            ExportNaming::Plain
        }
    }

    fn load_library(&self, path: &str) -> Result<LibraryHandle, LoadError> {
        let wide_path = wide(path);
        let handle = unsafe { LoadLibraryW(wide_path.as_ptr()) };
        if handle.is_null() {
            let error = unsafe { GetLastError() };
            return Err(LoadError::NotFound {
                path: format!("{} (error code: {})", path, error),
            });
        }
        Ok(LibraryHandle::from_raw(handle as usize))
    }

    unsafe fn free_library(&self, handle: LibraryHandle) {
        if FreeLibrary(handle.as_raw() as _) == 0 {
            tracing::warn!(error = GetLastError(), "FreeLibrary failed");
        }
    }

    fn resolve_symbol(&self, handle: LibraryHandle, name: &str) -> Option<NonNull<c_void>> {
        let c_name = CString::new(name).ok()?;
        let symbol = unsafe { GetProcAddress(handle.as_raw() as _, c_name.as_ptr().cast()) }?;
        NonNull::new(symbol as *mut c_void)
    }

    fn read_ahead(&self, _file: RawHandle, _offset: u64, _len: u64) -> io::Result<()> {
        Ok(())
    }

    fn map_memory(&self, file: RawHandle, mode: MapMode, offset: u64, len: usize) -> io::Result<NonNull<u8>> {
        let (protect, access) = match mode {
            MapMode::ReadOnly => (PAGE_READONLY, FILE_MAP_READ),
            MapMode::ReadWrite => (PAGE_READWRITE, FILE_MAP_WRITE),
            MapMode::Private => (PAGE_WRITECOPY, FILE_MAP_COPY),
        };
        let max_size = offset + len as u64;
        let mapping = unsafe {
            CreateFileMappingW(
                file as HANDLE,
                ptr::null(),
                protect,
                (max_size >> 32) as u32,
                max_size as u32,
                ptr::null(),
            )
        };
        if mapping.is_null() {
            return Err(io::Error::last_os_error());
        }

        let view = unsafe {
            MapViewOfFile(mapping, access, (offset >> 32) as u32, offset as u32, len)
        };
        let err = io::Error::last_os_error();
        // the view keeps the section alive on its own
        unsafe { CloseHandle(mapping) };

        NonNull::new(view.Value.cast::<u8>()).ok_or(err)
    }

    unsafe fn unmap_memory(&self, address: NonNull<u8>, _len: usize) -> io::Result<()> {
        let view = MEMORY_MAPPED_VIEW_ADDRESS {
            Value: address.as_ptr().cast::<c_void>(),
        };
        if UnmapViewOfFile(view) == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn allocation_granularity(&self) -> BridgeResult<u64> {
        let mut info: SYSTEM_INFO = unsafe { mem::zeroed() };
        unsafe { GetSystemInfo(&mut info) };
        Ok(u64::from(info.dwAllocationGranularity))
    }

    fn transfer_to(
        &self,
        source: RawHandle,
        _position: u64,
        count: u64,
        target: TransferTarget,
    ) -> BridgeResult<IoStatus> {
        // TransmitFile only writes to sockets
        let socket = match target {
            TransferTarget::Socket(socket) => socket as SOCKET,
            TransferTarget::File(_) => return Ok(IoStatus::UnsupportedCase),
        };
        let chunk = count.min(i32::MAX as u64) as u32;
        let ok = unsafe {
            TransmitFile(
                socket,
                source as HANDLE,
                chunk,
                self.packet_size,
                ptr::null_mut(),
                ptr::null(),
                TF_USE_KERNEL_APC,
            )
        };
        if ok == 0 {
            let code = unsafe { WSAGetLastError() };
            return match code {
                WSAEINVAL | WSAENOTSOCK => {
                    tracing::warn!(code, "TransmitFile rejected the transfer");
                    Ok(IoStatus::UnsupportedCase)
                }
                _ => Err(BridgeError::io_with(
                    "Transfer failed.",
                    io::Error::from_raw_os_error(code),
                )),
            };
        }
        Ok(IoStatus::Ok(u64::from(chunk)))
    }

    fn transfer_requires_seek(&self) -> bool {
        true
    }
}
