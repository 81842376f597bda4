//! Platform-specific process containment and forced termination
//!
//! The sidecar runtime may fork workers of its own (the Flask reloader does),
//! so the child is placed in a containment unit that can be killed as a whole:
//! a process group on Unix, a Job Object on Windows.

use crate::error::LaunchError;
use tokio::process::Command;

/// Configure a command so the spawned child becomes the root of its own unit.
pub(crate) fn prepare(cmd: &mut Command) {
    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    #[cfg(not(unix))]
    {
        let _ = cmd;
    }
}

/// Handle on the containment unit of one launched child.
#[derive(Debug)]
pub(crate) struct Containment {
    #[cfg(unix)]
    pgid: i32,
    #[cfg(windows)]
    job: JobObjectHandle,
}

impl Containment {
    /// Attach a freshly spawned child to its containment unit.
    #[allow(unused_variables)]
    pub(crate) fn attach(pid: u32, program: &str) -> Result<Self, LaunchError> {
        #[cfg(unix)]
        {
            let pgid = i32::try_from(pid).map_err(|_| LaunchError::Containment {
                program: program.to_string(),
                reason: format!("pid {pid} out of range"),
            })?;
            Ok(Self { pgid })
        }

        #[cfg(windows)]
        {
            let job = JobObjectHandle::create().map_err(|reason| LaunchError::Containment {
                program: program.to_string(),
                reason,
            })?;
            job.assign(pid).map_err(|reason| LaunchError::Containment {
                program: program.to_string(),
                reason,
            })?;
            Ok(Self { job })
        }

        #[cfg(not(any(unix, windows)))]
        {
            Ok(Self {})
        }
    }

    /// Kill every process in the unit. A unit that is already gone is not an error.
    pub(crate) fn kill(&self) -> Result<(), String> {
        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{Signal, killpg};
            use nix::unistd::Pid;

            match killpg(Pid::from_raw(self.pgid), Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => Ok(()),
                Err(e) => Err(format!("killpg({}) failed: {e}", self.pgid)),
            }
        }

        #[cfg(windows)]
        {
            self.job.terminate()
        }

        #[cfg(not(any(unix, windows)))]
        {
            Err("process containment is not supported on this platform".to_string())
        }
    }
}

/// Job Object configured to kill its processes when terminated or closed.
#[cfg(windows)]
#[derive(Debug)]
struct JobObjectHandle {
    handle: windows::Win32::Foundation::HANDLE,
}

// SAFETY: a Job Object HANDLE is an opaque kernel reference usable from any thread.
#[cfg(windows)]
unsafe impl Send for JobObjectHandle {}

// SAFETY: the handle is only passed to thread-safe Win32 calls.
#[cfg(windows)]
unsafe impl Sync for JobObjectHandle {}

#[cfg(windows)]
impl JobObjectHandle {
    fn create() -> Result<Self, String> {
        use windows::Win32::System::JobObjects::{
            CreateJobObjectW, JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE,
            JOBOBJECT_EXTENDED_LIMIT_INFORMATION, JobObjectExtendedLimitInformation,
            SetInformationJobObject,
        };

        unsafe {
            let job =
                CreateJobObjectW(None, None).map_err(|e| format!("CreateJobObjectW: {e}"))?;
            let handle = Self { handle: job };

            let mut info: JOBOBJECT_EXTENDED_LIMIT_INFORMATION = std::mem::zeroed();
            info.BasicLimitInformation.LimitFlags = JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE;

            SetInformationJobObject(
                handle.handle,
                JobObjectExtendedLimitInformation,
                (&raw const info).cast(),
                std::mem::size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32,
            )
            .map_err(|e| format!("SetInformationJobObject: {e}"))?;

            Ok(handle)
        }
    }

    fn assign(&self, pid: u32) -> Result<(), String> {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::JobObjects::AssignProcessToJobObject;
        use windows::Win32::System::Threading::{OpenProcess, PROCESS_ALL_ACCESS};

        unsafe {
            let process = OpenProcess(PROCESS_ALL_ACCESS, false, pid)
                .map_err(|e| format!("OpenProcess({pid}): {e}"))?;
            let assigned = AssignProcessToJobObject(self.handle, process)
                .map_err(|e| format!("AssignProcessToJobObject({pid}): {e}"));
            let _ = CloseHandle(process);
            assigned
        }
    }

    fn terminate(&self) -> Result<(), String> {
        use windows::Win32::System::JobObjects::TerminateJobObject;

        unsafe { TerminateJobObject(self.handle, 1).map_err(|e| format!("TerminateJobObject: {e}")) }
    }
}

#[cfg(windows)]
impl Drop for JobObjectHandle {
    fn drop(&mut self) {
        use windows::Win32::Foundation::CloseHandle;
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}
