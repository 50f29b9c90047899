//! Launching pipelines of external processes: pipe allocation, standard
//! stream wiring, program resolution and the foreground wait.

use std::ffi::{CString, NulError, OsStr};
use std::fmt;
use std::fs::OpenOptions;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::wait::waitpid;
use nix::unistd::{self, ForkResult, Pid, dup2, execv, fork, pipe2};

use crate::parser::{CommandSegment, Pipeline};

/// Failures observed by the parent while launching a pipeline.
#[derive(Debug)]
pub enum LaunchError {
    /// Allocating an inter-stage pipe failed; nothing was spawned.
    PipeCreation(Errno),
    /// Forking a stage failed; earlier stages keep running.
    Spawn(Errno),
    /// A word contained an interior NUL and cannot form an argv entry.
    BadArgument(NulError),
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchError::PipeCreation(e) => write!(f, "pipe creation failed: {e}"),
            LaunchError::Spawn(e) => write!(f, "failed to fork: {e}"),
            LaunchError::BadArgument(e) => write!(f, "invalid argument: {e}"),
        }
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaunchError::PipeCreation(e) | LaunchError::Spawn(e) => Some(e),
            LaunchError::BadArgument(e) => Some(e),
        }
    }
}

impl From<NulError> for LaunchError {
    fn from(e: NulError) -> Self {
        LaunchError::BadArgument(e)
    }
}

/// Why a forked child could not reach a successful exec.
enum ChildFailure {
    Redirect(PathBuf, std::io::Error),
    Wire(Errno),
    NotFound(String),
    Exec(Errno),
}

impl ChildFailure {
    fn exit_code(&self) -> i32 {
        match self {
            ChildFailure::Redirect(..) => 1,
            ChildFailure::Wire(_) | ChildFailure::Exec(_) => 126,
            ChildFailure::NotFound(_) => 127,
        }
    }
}

impl fmt::Display for ChildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildFailure::Redirect(path, e) => write!(f, "cannot open {}: {e}", path.display()),
            ChildFailure::Wire(e) => write!(f, "descriptor setup failed: {e}"),
            ChildFailure::NotFound(name) => write!(f, "command not found: {name}"),
            ChildFailure::Exec(e) => write!(f, "exec failed: {e}"),
        }
    }
}

/// Fork one process per stage, wiring standard streams through freshly
/// created pipes. Each pid is pushed into `launched` as it appears, so on a
/// mid-pipeline failure the caller still owns every stage that exists.
///
/// The pipe pairs are owned by this call and dropped on every return path,
/// which closes the parent's copies; the close-on-exec flag keeps them from
/// surviving into any child past exec.
pub fn spawn_pipeline(pipeline: &Pipeline, launched: &mut Vec<Pid>) -> Result<(), LaunchError> {
    let stages = &pipeline.segments;

    let mut pipes = Vec::with_capacity(stages.len().saturating_sub(1));
    for _ in 1..stages.len() {
        pipes.push(pipe2(OFlag::O_CLOEXEC).map_err(LaunchError::PipeCreation)?);
    }

    for (i, segment) in stages.iter().enumerate() {
        let stdin_pipe = (i > 0).then(|| pipes[i - 1].0.as_raw_fd());
        let stdout_pipe = (i + 1 < stages.len()).then(|| pipes[i].1.as_raw_fd());

        // argv is prepared before forking; a bad word fails the stage in
        // the parent.
        let argv = segment_argv(segment)?;

        match unsafe { fork() }.map_err(LaunchError::Spawn)? {
            ForkResult::Parent { child } => launched.push(child),
            ForkResult::Child => {
                let failure = wire_and_exec(segment, &argv, stdin_pipe, stdout_pipe);
                // exec only comes back on failure; the child must never
                // return into the parent's loop.
                let msg = format!("minishell: {failure}\n");
                let _ = unistd::write(std::io::stderr(), msg.as_bytes());
                unsafe { libc::_exit(failure.exit_code()) }
            }
        }
    }

    Ok(())
}

/// Block until every pid in `pids` has been reaped, retrying on EINTR.
///
/// Each wait targets the stage's own pid, so reaping here can never consume
/// the exit status of a process belonging to a background job.
pub fn wait_foreground(pids: &[Pid]) {
    for &pid in pids {
        loop {
            match waitpid(pid, None) {
                Ok(_) => break,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    eprintln!("minishell: wait for pid {pid} failed: {e}");
                    break;
                }
            }
        }
    }
}

fn segment_argv(segment: &CommandSegment) -> Result<Vec<CString>, LaunchError> {
    segment
        .words()
        .into_iter()
        .map(|word| CString::new(word).map_err(LaunchError::from))
        .collect()
}

/// Runs in the freshly forked child: rewires the standard streams, resolves
/// the program and replaces the process image. Only ever returns a failure;
/// on success exec does not come back.
fn wire_and_exec(
    segment: &CommandSegment,
    argv: &[CString],
    stdin_pipe: Option<RawFd>,
    stdout_pipe: Option<RawFd>,
) -> ChildFailure {
    if let Some(fd) = stdin_pipe {
        if let Err(e) = dup2(fd, libc::STDIN_FILENO) {
            return ChildFailure::Wire(e);
        }
    }
    if let Some(fd) = stdout_pipe {
        if let Err(e) = dup2(fd, libc::STDOUT_FILENO) {
            return ChildFailure::Wire(e);
        }
    }

    if let Some(path) = &segment.input {
        match OpenOptions::new().read(true).open(path) {
            Ok(file) => {
                if let Err(e) = dup2(file.as_raw_fd(), libc::STDIN_FILENO) {
                    return ChildFailure::Wire(e);
                }
            }
            Err(e) => return ChildFailure::Redirect(path.clone(), e),
        }
    }
    if let Some(path) = &segment.output {
        let open = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o666)
            .open(path);
        match open {
            Ok(file) => {
                if let Err(e) = dup2(file.as_raw_fd(), libc::STDOUT_FILENO) {
                    return ChildFailure::Wire(e);
                }
            }
            Err(e) => return ChildFailure::Redirect(path.clone(), e),
        }
    }

    let name = argv[0].to_string_lossy().into_owned();
    let search_paths = std::env::var_os("PATH").unwrap_or_default();
    let Some(program) = find_command_path(&search_paths, Path::new(&name)) else {
        return ChildFailure::NotFound(name);
    };
    let program = match CString::new(program.as_os_str().as_bytes()) {
        Ok(c) => c,
        Err(_) => return ChildFailure::NotFound(name),
    };

    match execv(&program, argv) {
        Ok(never) => match never {},
        Err(e) => ChildFailure::Exec(e),
    }
}

/// Resolve a program name the way a shell would: a name containing a path
/// separator is used as given when it exists; a bare name is searched
/// through each directory of `search_paths` in order.
pub fn find_command_path(search_paths: &OsStr, name: &Path) -> Option<PathBuf> {
    if name.as_os_str().is_empty() {
        return None;
    }
    if name.components().count() > 1 {
        return name.exists().then(|| name.to_path_buf());
    }
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::build_pipeline;
    use std::ffi::OsString;

    #[test]
    fn absolute_existing_program_resolves_to_itself() {
        let found = find_command_path(OsStr::new("/bin"), Path::new("/bin/sh"));
        assert_eq!(found, Some(PathBuf::from("/bin/sh")));
    }

    #[test]
    fn absolute_missing_program_is_none() {
        assert_eq!(
            find_command_path(OsStr::new("/bin"), Path::new("/bin/nonexisting")),
            None
        );
    }

    #[test]
    fn bare_name_is_searched_through_path_directories() {
        let paths = OsString::from("/nonexistent-dir:/bin:/usr/bin");
        let found = find_command_path(&paths, Path::new("sh")).expect("sh in /bin or /usr/bin");
        assert!(found.ends_with("sh"));
        assert!(found.is_absolute());
    }

    #[test]
    fn unknown_bare_name_is_none() {
        assert_eq!(
            find_command_path(OsStr::new("/bin"), Path::new("surely-not-a-command")),
            None
        );
    }

    #[test]
    fn empty_name_is_none() {
        assert_eq!(find_command_path(OsStr::new("/bin"), Path::new("")), None);
    }

    #[test]
    fn launch_error_messages_name_the_failure() {
        assert_eq!(
            LaunchError::PipeCreation(Errno::EMFILE).to_string(),
            format!("pipe creation failed: {}", Errno::EMFILE)
        );
        assert_eq!(
            LaunchError::Spawn(Errno::EAGAIN).to_string(),
            format!("failed to fork: {}", Errno::EAGAIN)
        );
    }

    #[test]
    fn every_stage_of_a_foreground_pipeline_is_spawned_and_reaped() {
        let pipeline = build_pipeline("true | true").unwrap();
        let mut launched = Vec::new();
        spawn_pipeline(&pipeline, &mut launched).unwrap();
        assert_eq!(launched.len(), 2);
        wait_foreground(&launched);
    }
}
