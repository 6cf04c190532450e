//! Containerized function execution.
//!
//! A container function runs through the `docker` CLI with constrained
//! defaults: no network, an unprivileged user, no privilege escalation, and
//! no filesystem access beyond explicitly requested read-only bind mounts.

use tokio::process::Command;

use super::IsolationOptions;

/// One containerized function, addressed by image reference.
#[derive(Debug, Clone)]
pub struct ContainerFn {
    pub image: String,
    pub isolation: IsolationOptions,
}

impl ContainerFn {
    /// A container function with all isolation knobs off.
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            isolation: IsolationOptions::default(),
        }
    }

    /// A container function with explicit isolation settings.
    pub fn with_isolation(image: impl Into<String>, isolation: IsolationOptions) -> Self {
        Self {
            image: image.into(),
            isolation,
        }
    }

    /// The `docker run` argument vector for this function.
    pub(crate) fn docker_args(&self) -> Vec<String> {
        let mut args = vec!["run".to_string(), "--rm".to_string(), "-i".to_string()];
        args.push(format!(
            "--network={}",
            if self.isolation.network { "bridge" } else { "none" }
        ));
        if self.isolation.as_current_user {
            args.push(format!("--user={}", current_user()));
        } else {
            args.push("--user=nobody".to_string());
        }
        args.push("--security-opt=no-new-privileges".to_string());
        for mount in &self.isolation.mounts {
            args.push("--mount".to_string());
            args.push(mount.to_docker_flag());
        }
        for env in &self.isolation.env {
            args.push("-e".to_string());
            args.push(env.clone());
        }
        args.push(self.image.clone());
        args
    }

    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new("docker");
        cmd.args(self.docker_args());
        cmd
    }
}

#[cfg(unix)]
fn current_user() -> String {
    // SAFETY: getuid/getgid are always safe to call
    unsafe { format!("{}:{}", libc::getuid(), libc::getgid()) }
}

#[cfg(not(unix))]
fn current_user() -> String {
    "nobody".to_string()
}
