//! Process table backed by ToolHelp snapshots and PSAPI module enumeration.

use std::path::PathBuf;

use log::debug;
use windows::core::PWSTR;
use windows::Win32::Foundation::{CloseHandle, HANDLE, HMODULE};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W, TH32CS_SNAPPROCESS,
};
use windows::Win32::System::ProcessStatus::{EnumProcessModules, GetModuleFileNameExW};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, TerminateProcess, PROCESS_ACCESS_RIGHTS,
    PROCESS_NAME_WIN32, PROCESS_QUERY_INFORMATION, PROCESS_QUERY_LIMITED_INFORMATION,
    PROCESS_TERMINATE, PROCESS_VM_READ,
};

use crate::error::{IntrospectError, IntrospectResult};
use crate::model::{Pid, ProcessRecord, ProcessSnapshot};
use crate::platform::{HolderStrategy, ProcessPlatform};

const E_ACCESS_DENIED: u32 = 0x8007_0005;
const E_INVALID_PARAMETER: u32 = 0x8007_0057;

/// RAII wrapper for snapshot and process handles
struct OwnedHandle(HANDLE);

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            unsafe {
                let _ = CloseHandle(self.0);
            }
        }
    }
}

/// ToolHelp/PSAPI backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsToolhelp;

fn open_process(pid: Pid, access: PROCESS_ACCESS_RIGHTS, action: &'static str) -> IntrospectResult<OwnedHandle> {
    unsafe {
        OpenProcess(access, false, pid).map(OwnedHandle).map_err(|e| match e.code().0 as u32 {
            E_ACCESS_DENIED => IntrospectError::InsufficientPrivilege { pid, action },
            E_INVALID_PARAMETER => IntrospectError::NotFound { what: format!("process {pid}") },
            _ => IntrospectError::Io(std::io::Error::other(e.message().to_string())),
        })
    }
}

/// Convert a null-terminated wide char array to String
fn wchar_to_string(wchars: &[u16]) -> String {
    let len = wchars.iter().position(|&c| c == 0).unwrap_or(wchars.len());
    String::from_utf16_lossy(&wchars[..len])
}

fn image_path(pid: Pid) -> IntrospectResult<PathBuf> {
    let handle = open_process(pid, PROCESS_QUERY_LIMITED_INFORMATION, "query")?;
    let mut buffer = [0u16; 1024];
    let mut size = buffer.len() as u32;
    unsafe {
        QueryFullProcessImageNameW(handle.0, PROCESS_NAME_WIN32, PWSTR(buffer.as_mut_ptr()), &mut size)
            .map_err(|e| IntrospectError::Io(std::io::Error::other(e.message().to_string())))?;
    }
    Ok(PathBuf::from(String::from_utf16_lossy(&buffer[..size as usize])))
}

impl ProcessPlatform for WindowsToolhelp {
    fn name(&self) -> &'static str {
        "toolhelp"
    }

    fn list_processes(&self) -> IntrospectResult<ProcessSnapshot> {
        let mut snapshot = ProcessSnapshot::default();

        unsafe {
            let raw = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)
                .map_err(|e| IntrospectError::SnapshotFailed(e.message().to_string()))?;
            let handle = OwnedHandle(raw);

            let mut entry = PROCESSENTRY32W {
                dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
                ..Default::default()
            };

            if Process32FirstW(handle.0, &mut entry).is_ok() {
                loop {
                    let pid = entry.th32ProcessID;
                    let executable_path = match image_path(pid) {
                        Ok(path) => Some(path),
                        Err(e) => {
                            if e.is_access_denied() {
                                snapshot.restricted += 1;
                            }
                            None
                        }
                    };
                    snapshot.processes.push(ProcessRecord {
                        pid,
                        name: wchar_to_string(&entry.szExeFile),
                        executable_path,
                    });

                    if Process32NextW(handle.0, &mut entry).is_err() {
                        break;
                    }
                }
            }
        }

        snapshot.processes.sort_by_key(|p| p.pid);
        snapshot.processes.dedup_by_key(|p| p.pid);
        debug!(
            "toolhelp snapshot: {} processes, {} restricted",
            snapshot.processes.len(),
            snapshot.restricted
        );
        Ok(snapshot)
    }

    fn resolve_executable_path(&self, pid: Pid) -> Option<PathBuf> {
        image_path(pid).ok()
    }

    fn process_exists(&self, pid: Pid) -> bool {
        match open_process(pid, PROCESS_QUERY_LIMITED_INFORMATION, "query") {
            Ok(_) => true,
            Err(e) => e.is_access_denied(),
        }
    }

    fn module_paths(&self, pid: Pid) -> Vec<PathBuf> {
        let Ok(handle) =
            open_process(pid, PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, "query modules of")
        else {
            return Vec::new();
        };

        let mut modules = vec![HMODULE::default(); 1024];
        let mut needed = 0u32;
        for _ in 0..2 {
            let capacity = (modules.len() * std::mem::size_of::<HMODULE>()) as u32;
            let listed = unsafe {
                EnumProcessModules(handle.0, modules.as_mut_ptr(), capacity, &mut needed)
            };
            if listed.is_err() {
                debug!("EnumProcessModules failed for pid {pid}");
                return Vec::new();
            }
            let count = needed as usize / std::mem::size_of::<HMODULE>();
            if count <= modules.len() {
                modules.truncate(count);
                break;
            }
            // Module list grew past the buffer; retry once with the reported size.
            modules.resize(count, HMODULE::default());
        }

        modules
            .iter()
            .filter_map(|module| {
                let mut name = [0u16; 1024];
                let len = unsafe { GetModuleFileNameExW(handle.0, *module, &mut name) };
                (len > 0).then(|| PathBuf::from(String::from_utf16_lossy(&name[..len as usize])))
            })
            .collect()
    }

    fn terminate(&self, pid: Pid) -> IntrospectResult<()> {
        if pid == 0 {
            return Err(IntrospectError::NotFound { what: format!("process {pid}") });
        }
        let handle = open_process(pid, PROCESS_TERMINATE, "terminate")?;
        unsafe {
            TerminateProcess(handle.0, 1).map_err(|e| match e.code().0 as u32 {
                E_ACCESS_DENIED => IntrospectError::InsufficientPrivilege { pid, action: "terminate" },
                _ => IntrospectError::Io(std::io::Error::other(e.message().to_string())),
            })
        }
    }

    fn holder_strategy(&self) -> HolderStrategy {
        HolderStrategy::ExecutablePathHeuristic
    }
}
