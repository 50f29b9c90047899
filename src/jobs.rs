//! Background job bookkeeping: registration, non-blocking completion polls
//! and listing.

use std::io::Write;

use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;

/// One background pipeline: its stage pids, the submitted command text and a
/// completion flag that flips false -> true exactly once.
#[derive(Debug)]
pub struct BackgroundJob {
    pids: Vec<Pid>,
    pending: Vec<Pid>,
    command: String,
    completed: bool,
}

/// All background jobs of one session. Completed entries are kept; listing
/// filters them out.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Vec<BackgroundJob>,
}

impl JobTable {
    /// Record a freshly launched background pipeline. Never blocks.
    pub fn register(&mut self, pids: Vec<Pid>, command: impl Into<String>) {
        self.jobs.push(BackgroundJob {
            pending: pids.clone(),
            pids,
            command: command.into(),
            completed: false,
        });
    }

    /// Non-blocking status check of every incomplete job.
    ///
    /// A job whose last process has exited is marked completed and announced
    /// on `out` exactly once. A failed check is reported to stderr and
    /// leaves the job incomplete. Completed jobs are skipped entirely.
    pub fn poll_once(&mut self, out: &mut dyn Write) {
        for job in self.jobs.iter_mut().filter(|job| !job.completed) {
            job.pending.retain(|&pid| {
                match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
                    Ok(WaitStatus::Exited(..) | WaitStatus::Signaled(..)) => false,
                    Ok(_) => true,
                    Err(e) => {
                        eprintln!("minishell: wait for pid {pid} failed: {e}");
                        true
                    }
                }
            });
            if job.pending.is_empty() {
                job.completed = true;
                let _ = writeln!(
                    out,
                    "background job completed: pid {}, command: {}",
                    format_pids(&job.pids),
                    job.command
                );
            }
        }
    }

    /// Write every job not yet completed to `out`, or an explicit notice
    /// when there is none.
    pub fn list(&self, out: &mut dyn Write) {
        let mut any = false;
        for job in self.jobs.iter().filter(|job| !job.completed) {
            any = true;
            let _ = writeln!(
                out,
                "pid {}, command: {}, status: running",
                format_pids(&job.pids),
                job.command
            );
        }
        if !any {
            let _ = writeln!(out, "no background jobs running");
        }
    }
}

fn format_pids(pids: &[Pid]) -> String {
    pids.iter()
        .map(|pid| pid.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use std::thread::sleep;
    use std::time::Duration;

    fn pid_of(child: &std::process::Child) -> Pid {
        Pid::from_raw(child.id() as i32)
    }

    #[test]
    fn finished_job_is_announced_exactly_once() {
        let child = Command::new("true").spawn().expect("spawn true");
        let mut table = JobTable::default();
        table.register(vec![pid_of(&child)], "true");

        let mut out = Vec::new();
        for _ in 0..100 {
            table.poll_once(&mut out);
            if !out.is_empty() {
                break;
            }
            sleep(Duration::from_millis(10));
        }
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1, "one notification, got: {text:?}");
        assert!(text.contains("background job completed"));
        assert!(text.contains("true"));

        // Polling an already-completed job is a no-op.
        let mut again = Vec::new();
        table.poll_once(&mut again);
        assert!(again.is_empty());
    }

    #[test]
    fn running_job_stays_listed_and_unannounced() {
        let mut child = Command::new("sleep").arg("5").spawn().expect("spawn sleep");
        let mut table = JobTable::default();
        table.register(vec![pid_of(&child)], "sleep 5");

        let mut out = Vec::new();
        table.poll_once(&mut out);
        assert!(out.is_empty());

        let mut listing = Vec::new();
        table.list(&mut listing);
        let listing = String::from_utf8(listing).unwrap();
        assert!(listing.contains("sleep 5"));
        assert!(listing.contains("running"));

        child.kill().ok();
        child.wait().ok();
    }

    #[test]
    fn failed_status_check_does_not_complete_the_job() {
        // Reap the child through std first, so the later waitpid fails.
        let mut child = Command::new("true").spawn().expect("spawn true");
        child.wait().expect("wait true");

        let mut table = JobTable::default();
        table.register(vec![pid_of(&child)], "true");

        let mut out = Vec::new();
        table.poll_once(&mut out);
        assert!(out.is_empty(), "an error result must not announce completion");

        let mut listing = Vec::new();
        table.list(&mut listing);
        assert!(String::from_utf8(listing).unwrap().contains("true"));
    }

    #[test]
    fn empty_table_lists_an_explicit_notice() {
        let table = JobTable::default();
        let mut out = Vec::new();
        table.list(&mut out);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "no background jobs running\n"
        );
    }
}
