//! Layer E — execution with profiles. Runs one shell command under a
//! named profile's timeout/retry/backoff policy, using `csa-process`
//! for the actual spawn.

use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;

const TRANSIENT_PATTERNS: &[&str] =
    &["timeout", "temporarily unavailable", "rate limit", "connection refused", "connection reset", "503", "429"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Exponential,
    Linear,
}

impl BackoffStrategy {
    fn delay(self, attempt: u32) -> Duration {
        let base = match self {
            Self::Exponential => 2u64.saturating_pow(attempt),
            Self::Linear => u64::from(attempt) + 1,
        };
        let jitter_ms = rand::thread_rng().gen_range(0..=500);
        Duration::from_secs(base) + Duration::from_millis(jitter_ms)
    }
}

/// Execution profile for one class of sub-agent command.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_backoff_strategy: BackoffStrategy,
    pub health_check_command: Option<String>,
    pub fallback_commands: Vec<String>,
    pub flags: Vec<String>,
    pub parse_json_output: bool,
    /// Exit codes treated as success beyond 0 (e.g. `terraform plan`'s 2,
    /// meaning "diff present").
    pub extra_success_exit_codes: Vec<i32>,
}

impl Profile {
    fn new(timeout_seconds: u64, max_retries: u32, backoff: BackoffStrategy) -> Self {
        Self {
            timeout_seconds,
            max_retries,
            retry_backoff_strategy: backoff,
            health_check_command: None,
            fallback_commands: Vec::new(),
            flags: Vec::new(),
            parse_json_output: false,
            extra_success_exit_codes: Vec::new(),
        }
    }

    fn is_success_exit(&self, code: i32) -> bool {
        code == 0 || self.extra_success_exit_codes.contains(&code)
    }
}

/// The standard profile set named in the spec. Callers may override or
/// extend this map from configuration.
pub fn standard_profiles() -> HashMap<&'static str, Profile> {
    let mut profiles = HashMap::new();
    profiles.insert("terraform-validate", Profile::new(60, 1, BackoffStrategy::Linear));

    let mut plan = Profile::new(180, 1, BackoffStrategy::Linear);
    plan.extra_success_exit_codes.push(2);
    plan.flags.push("-detailed-exitcode".to_string());
    profiles.insert("terraform-plan", plan);

    profiles.insert("terraform-apply", Profile::new(900, 0, BackoffStrategy::Linear));
    profiles.insert("flux-check", Profile::new(30, 2, BackoffStrategy::Exponential));
    profiles.insert("flux-reconcile", Profile::new(120, 2, BackoffStrategy::Exponential));

    let mut helm_upgrade = Profile::new(300, 1, BackoffStrategy::Linear);
    helm_upgrade.health_check_command = Some("kubectl rollout status".to_string());
    profiles.insert("helm-upgrade", helm_upgrade);

    profiles.insert("kubectl-wait", Profile::new(300, 0, BackoffStrategy::Linear));

    let mut docker_build = Profile::new(600, 1, BackoffStrategy::Exponential);
    docker_build.parse_json_output = true;
    profiles.insert("docker-build", docker_build);

    let mut docker_push = Profile::new(300, 3, BackoffStrategy::Exponential);
    docker_push.fallback_commands = vec!["docker push --disable-content-trust".to_string()];
    profiles.insert("docker-push", docker_push);

    profiles
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecStatus {
    Success,
    Failed,
    Timeout,
    RetryExceeded,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutput {
    pub status: ExecStatus,
    pub duration_ms: u64,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub retry_attempts: u32,
    pub command_used: String,
    pub output_lines: usize,
}

fn is_transient(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    TRANSIENT_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}

/// Run `command` under `profile`'s timeout/retry/backoff discipline,
/// using `runner` to execute each attempt. `runner` is expected to be
/// `csa_process::run_with_timeout` in production; tests inject a fake.
pub async fn execute_with_profile<F, Fut>(profile: &Profile, command: &str, mut runner: F) -> ExecutionOutput
where
    F: FnMut(String, Duration) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<csa_process::ExecutionResult>>,
{
    let timeout = Duration::from_secs(profile.timeout_seconds);
    let mut attempt = 0u32;
    let mut last_duration_ms = 0u64;

    loop {
        let result = runner(command.to_string(), timeout).await;
        let Ok(result) = result else {
            return ExecutionOutput {
                status: ExecStatus::Failed,
                duration_ms: last_duration_ms,
                exit_code: -1,
                stdout: String::new(),
                stderr: "failed to spawn command".to_string(),
                retry_attempts: attempt,
                command_used: command.to_string(),
                output_lines: 0,
            };
        };
        last_duration_ms = result.duration_ms;

        if result.timed_out {
            if attempt < profile.max_retries {
                tokio::time::sleep(profile.retry_backoff_strategy.delay(attempt)).await;
                attempt += 1;
                continue;
            }
            return ExecutionOutput {
                status: ExecStatus::Timeout,
                duration_ms: result.duration_ms,
                exit_code: -1,
                stdout: result.stdout,
                stderr: result.stderr,
                retry_attempts: attempt,
                command_used: command.to_string(),
                output_lines: 0,
            };
        }

        if profile.is_success_exit(result.exit_code) {
            let output_lines = result.stdout.lines().count();
            return ExecutionOutput {
                status: ExecStatus::Success,
                duration_ms: result.duration_ms,
                exit_code: result.exit_code,
                stdout: result.stdout,
                stderr: result.stderr,
                retry_attempts: attempt,
                command_used: command.to_string(),
                output_lines,
            };
        }

        if is_transient(&result.stderr) && attempt < profile.max_retries {
            tokio::time::sleep(profile.retry_backoff_strategy.delay(attempt)).await;
            attempt += 1;
            continue;
        }

        if is_transient(&result.stderr) {
            return ExecutionOutput {
                status: ExecStatus::RetryExceeded,
                duration_ms: result.duration_ms,
                exit_code: result.exit_code,
                stdout: result.stdout,
                stderr: result.stderr,
                retry_attempts: attempt,
                command_used: command.to_string(),
                output_lines: 0,
            };
        }

        return ExecutionOutput {
            status: ExecStatus::Failed,
            duration_ms: result.duration_ms,
            exit_code: result.exit_code,
            stdout: result.stdout,
            stderr: result.stderr,
            retry_attempts: attempt,
            command_used: command.to_string(),
            output_lines: 0,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csa_process::ExecutionResult;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn ok_result(exit_code: i32, stdout: &str, stderr: &str) -> anyhow::Result<ExecutionResult> {
        Ok(ExecutionResult {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_code,
            timed_out: false,
            duration_ms: 10,
        })
    }

    #[tokio::test]
    async fn s4_terraform_plan_treats_exit_2_as_success() {
        let profile = &standard_profiles()["terraform-plan"];
        let output = execute_with_profile(profile, "terraform plan", |_, _| async { ok_result(2, "diff", "") }).await;
        assert_eq!(output.status, ExecStatus::Success);
        assert_eq!(output.exit_code, 2);
        assert_eq!(output.retry_attempts, 0);
    }

    #[tokio::test]
    async fn s5_transient_errors_retry_then_succeed() {
        let profile = &standard_profiles()["docker-push"];
        let call_count = Arc::new(AtomicU32::new(0));
        let call_count_clone = call_count.clone();
        let output = execute_with_profile(profile, "docker push x", move |_, _| {
            let call_count = call_count_clone.clone();
            async move {
                let n = call_count.fetch_add(1, Ordering::SeqCst);
                match n {
                    0 => ok_result(1, "", "429 too many requests"),
                    1 => ok_result(1, "", "connection refused"),
                    _ => ok_result(0, "pushed", ""),
                }
            }
        })
        .await;
        assert_eq!(output.status, ExecStatus::Success);
        assert_eq!(output.retry_attempts, 2);
    }

    #[tokio::test]
    async fn non_transient_failure_does_not_retry() {
        let profile = &standard_profiles()["terraform-validate"];
        let call_count = Arc::new(AtomicU32::new(0));
        let call_count_clone = call_count.clone();
        let output = execute_with_profile(profile, "terraform validate", move |_, _| {
            let call_count = call_count_clone.clone();
            async move {
                call_count.fetch_add(1, Ordering::SeqCst);
                ok_result(1, "", "syntax error")
            }
        })
        .await;
        assert_eq!(output.status, ExecStatus::Failed);
        assert_eq!(output.retry_attempts, 0);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_retries_on_transient_error_returns_retry_exceeded() {
        let profile = &standard_profiles()["flux-check"];
        let output = execute_with_profile(profile, "flux check", |_, _| async { ok_result(1, "", "rate limit hit") }).await;
        assert_eq!(output.status, ExecStatus::RetryExceeded);
        assert_eq!(output.retry_attempts, profile.max_retries);
    }

    #[tokio::test]
    async fn timeout_without_retries_left_reports_timeout() {
        let profile = &standard_profiles()["kubectl-wait"];
        let output = execute_with_profile(profile, "kubectl wait", |_, _| async {
            Ok(ExecutionResult { stdout: String::new(), stderr: String::new(), exit_code: -1, timed_out: true, duration_ms: 300_000 })
        })
        .await;
        assert_eq!(output.status, ExecStatus::Timeout);
    }
}
