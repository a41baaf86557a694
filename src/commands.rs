//! Helpers for running external command-line tools.

use std::{process::Output, sync::LazyLock};

use anyhow::anyhow;
use regex::Regex;
use tokio::sync::Semaphore;

use crate::prelude::*;

/// Semaphore used to limit the number of concurrent `pdftocairo` and
/// `tesseract` processes. Each of those tools will happily use 100% of a
/// CPU core, and concurrent requests must not fork an unbounded number of
/// them.
static CPU_SEMAPHORE: LazyLock<Semaphore> =
    LazyLock::new(|| Semaphore::new(num_cpus::get()));

/// Call an async function while holding a permit from the CPU semaphore.
#[instrument(level = "trace", skip_all)]
pub async fn with_cpu_semaphore<Func, Fut, R>(f: Func) -> Result<R>
where
    Func: FnOnce() -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let permit = CPU_SEMAPHORE
        .acquire()
        .await
        .context("could not acquire CPU permit")?;
    let result = f().await;
    drop(permit);
    result
}

/// Lines matching this in a tool's standard error indicate a failure even
/// when the tool exits 0.
static DEFAULT_ERROR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)error").expect("failed to compile regex"));

/// Poppler prints "error: xref num" for damaged-but-recoverable PDFs, and
/// then repairs the file. Treat that as a warning.
static DOWNGRADE_TO_WARNING_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)error: xref num").expect("failed to compile regex")
});

/// Does this line of standard error indicate a real failure?
pub fn is_error_line(line: &str) -> bool {
    DEFAULT_ERROR_REGEX.is_match(line) && !DOWNGRADE_TO_WARNING_REGEX.is_match(line)
}

/// Report any command failures, and include any error output.
///
/// The output of standard error and standard output will be logged. If
/// `check_stderr` is set, standard error is also scanned with
/// [`is_error_line`], because some tools report failures without setting a
/// nonzero exit code.
pub fn check_for_command_failure(
    command_name: &str,
    output: &Output,
    check_stderr: bool,
) -> Result<()> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.trim().is_empty() {
        debug!(
            command_name = command_name,
            output = %stdout,
            "Standard output from command"
        );
    }
    if !stderr.trim().is_empty() {
        warn!(
            command_name = command_name,
            output = %stderr,
            "Standard error from command"
        );
    }

    if output.status.success() {
        if check_stderr && stderr.lines().any(is_error_line) {
            return Err(anyhow!(
                "{} printed error output:\n{}",
                command_name,
                stderr,
            ));
        }
        Ok(())
    } else if let Some(exit_code) = output.status.code() {
        Err(anyhow!(
            "{} failed with exit code {} and error output:\n{}",
            command_name,
            exit_code,
            stderr,
        ))
    } else {
        Err(anyhow!(
            "{} failed with error output:\n{}",
            command_name,
            stderr,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xref_errors_are_downgraded() {
        assert!(is_error_line("Syntax Error: could not parse page"));
        assert!(!is_error_line("Error: xref num 12 not found"));
        assert!(!is_error_line("Rendering page 1 of 2"));
    }
}
