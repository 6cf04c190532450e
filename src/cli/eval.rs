//! The `eval` command.
//!
//! Evaluates one function - containerized or local executable - against the
//! resources under a directory, or against a resource stream on stdin when
//! no directory is given. Unlike `render`, eval ignores package manifests
//! and pipelines: the function and its configuration come entirely from the
//! command line.
//!
//! The isolation knobs (`--network`, `--mount`, `--env`,
//! `--as-current-user`) only apply to containerized functions; the
//! executable form rejects them.

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::core::ConfpmError;
use crate::manifest::validation::validate_image_name;
use crate::render::{check_package_scope, detect_path_conflicts, write_resources};
use crate::resource::{INDEX_ANNOTATION, PATH_ANNOTATION, Resource};
use crate::runner::config::synthesize_config_map;
use crate::runner::{
    ContainerFn, ExecFn, FunctionResultList, FunctionRunResults, FunctionRuntime,
    IsolationOptions, ResourceList, StorageMount,
};

/// Evaluate a single function.
#[derive(Args, Debug)]
pub struct EvalCommand {
    /// Directory of resources to evaluate. Reads a resource stream from
    /// stdin when omitted.
    dir: Option<PathBuf>,

    /// Run this container image as the function.
    #[arg(long, conflicts_with = "exec_path")]
    image: Option<String>,

    /// Run this local executable as the function.
    #[arg(long)]
    exec_path: Option<PathBuf>,

    /// Path to a function config file.
    #[arg(long)]
    fn_config: Option<PathBuf>,

    /// Enable network access for the containerized function.
    #[arg(long)]
    network: bool,

    /// Read-only bind mounts, as `type=bind,src=<host>,dst=<container>`.
    #[arg(long = "mount")]
    mounts: Vec<String>,

    /// Environment variables to export, `KEY=VALUE` or `KEY`.
    #[arg(long = "env", short = 'e')]
    env: Vec<String>,

    /// Run the container with the invoking uid and gid instead of nobody.
    #[arg(long)]
    as_current_user: bool,

    /// Directory in which function results are recorded. Must already exist.
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Print the evaluated resources to stdout instead of writing them back.
    #[arg(long)]
    dry_run: bool,

    /// `key=value` pairs for a generated ConfigMap function config, after `--`.
    #[arg(last = true)]
    data: Vec<String>,
}

impl EvalCommand {
    pub async fn execute(self, quiet: bool) -> Result<()> {
        let runtime = self.build_runtime()?;
        let config = self.build_config()?;
        if let Some(dir) = &self.results_dir {
            super::ensure_results_dir(dir)?;
        }

        let (items, from_stdin) = match &self.dir {
            Some(dir) => (read_dir_resources(dir)?, false),
            None => {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .context("failed to read resource stream from stdin")?;
                (Resource::parse_all(&text)?, true)
            }
        };

        if !quiet {
            eprintln!("{} {:?}", "[RUNNING]".bold(), runtime.name());
        }
        let list = ResourceList::new(items, config);
        let outcome = runtime.run(&list).await;
        if !quiet {
            match &outcome {
                Ok(_) => eprintln!("{} {:?}", "[PASS]".green().bold(), runtime.name()),
                Err(_) => eprintln!("{} {:?}", "[FAIL]".red().bold(), runtime.name()),
            }
        }
        self.save_results(runtime.name(), &outcome);
        let output = outcome?;

        if from_stdin || self.dry_run {
            let mut items = output.items;
            for item in &mut items {
                item.remove_annotation(PATH_ANNOTATION);
                item.remove_annotation(INDEX_ANNOTATION);
            }
            print!("{}", Resource::serialize_all(&items)?);
            return Ok(());
        }

        let dir = self
            .dir
            .as_deref()
            .and_then(|d| d.canonicalize().ok())
            .context("failed to resolve the resource directory")?;
        detect_path_conflicts(&output.items)?;
        check_package_scope(&output.items)?;
        write_resources(&dir, &output.items)
    }

    /// Resolve the function runtime from the flags.
    fn build_runtime(&self) -> Result<FunctionRuntime> {
        if let Some(image) = &self.image {
            validate_image_name(image).map_err(|reason| ConfpmError::InvalidFunctionConfig {
                function: image.clone(),
                reason,
            })?;
            let mut mounts = Vec::new();
            for mount in &self.mounts {
                mounts.push(mount.parse::<StorageMount>()?);
            }
            let isolation = IsolationOptions {
                network: self.network,
                mounts,
                env: self.env.clone(),
                as_current_user: self.as_current_user,
            };
            return Ok(FunctionRuntime::Container(ContainerFn::with_isolation(
                image.as_str(),
                isolation,
            )));
        }

        if let Some(exec_path) = &self.exec_path {
            if self.network || self.as_current_user || !self.mounts.is_empty() || !self.env.is_empty()
            {
                bail!(
                    "--mount, --as-current-user, --network and --env cannot be used with \
                     an executable function"
                );
            }
            let mut exec = ExecFn::new(exec_path);
            if let Some(dir) = &self.dir {
                exec = exec.with_work_dir(dir);
            }
            return Ok(FunctionRuntime::Exec(exec));
        }

        bail!("must specify --image or --exec-path")
    }

    /// Resolve the function config from `--fn-config` or trailing data args.
    fn build_config(&self) -> Result<Option<Resource>> {
        if let Some(path) = &self.fn_config {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read function config {}", path.display()))?;
            let resource = Resource::parse(&text)
                .with_context(|| format!("invalid function config {}", path.display()))?;
            return Ok(Some(resource));
        }

        if self.data.is_empty() {
            return Ok(None);
        }
        let mut data = serde_yaml::Mapping::new();
        for item in &self.data {
            let Some((key, value)) = item.split_once('=') else {
                bail!("data arguments must be key=value pairs, got {item:?}");
            };
            data.insert(key.into(), value.into());
        }
        Ok(Some(synthesize_config_map(&data)))
    }

    fn save_results(&self, name: &str, outcome: &Result<ResourceList>) {
        let Some(dir) = &self.results_dir else {
            return;
        };
        let run = match outcome {
            Ok(list) => FunctionRunResults {
                name: name.to_string(),
                exit_code: 0,
                results: list.results.clone(),
            },
            Err(err) => {
                let exit_code = match err.downcast_ref::<ConfpmError>() {
                    Some(ConfpmError::FunctionExecutionError { exit_code, .. }) => *exit_code,
                    _ => 1,
                };
                FunctionRunResults {
                    name: name.to_string(),
                    exit_code,
                    results: Vec::new(),
                }
            }
        };
        let list = FunctionResultList::new(vec![run]);
        let path = dir.join(crate::render::RESULTS_FILE);
        let write = serde_yaml::to_string(&list)
            .map_err(anyhow::Error::from)
            .and_then(|text| std::fs::write(&path, text).map_err(anyhow::Error::from));
        if let Err(err) = write {
            tracing::warn!(target: "fn", "failed to record function results: {err:#}");
        }
    }
}

/// Read every resource file under `dir` recursively, annotating each
/// resource with its directory-relative path and in-file ordinal.
fn read_dir_resources(dir: &Path) -> Result<Vec<Resource>> {
    let base = dir
        .canonicalize()
        .with_context(|| format!("failed to resolve directory {}", dir.display()))?;
    let mut files = Vec::new();
    collect_resource_files(&base, &base, &mut files)?;
    files.sort();

    let mut resources = Vec::new();
    for file in &files {
        let full = base.join(file);
        let text = std::fs::read_to_string(&full)
            .with_context(|| format!("failed to read {}", full.display()))?;
        let docs = Resource::parse_all(&text)
            .with_context(|| format!("failed to parse {}", full.display()))?;
        for (index, mut resource) in docs.into_iter().enumerate() {
            resource.set_annotation(PATH_ANNOTATION, file)?;
            resource.set_annotation(INDEX_ANNOTATION, &index.to_string())?;
            resources.push(resource);
        }
    }
    Ok(resources)
}

fn collect_resource_files(base: &Path, current: &Path, files: &mut Vec<String>) -> Result<()> {
    for entry in std::fs::read_dir(current)
        .with_context(|| format!("failed to read directory {}", current.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        if path.is_dir() {
            collect_resource_files(base, &path, files)?;
        } else if Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml")
        {
            let rel = path
                .strip_prefix(base)
                .context("resource file outside the evaluated directory")?;
            files.push(crate::utils::path_to_slash(rel));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        cmd: EvalCommand,
    }

    fn parse(args: &[&str]) -> EvalCommand {
        Harness::parse_from(std::iter::once("eval").chain(args.iter().copied())).cmd
    }

    #[test]
    fn exec_rejects_isolation_flags() {
        let cmd = parse(&["--exec-path", "/usr/local/bin/fn", "--network"]);
        assert!(cmd.build_runtime().is_err());

        let cmd = parse(&["--exec-path", "/usr/local/bin/fn"]);
        assert!(cmd.build_runtime().is_ok());
    }

    #[test]
    fn a_function_is_required() {
        let cmd = parse(&[]);
        assert!(cmd.build_runtime().is_err());
    }

    #[test]
    fn image_names_are_validated() {
        let cmd = parse(&["--image", "NOT VALID"]);
        assert!(cmd.build_runtime().is_err());
    }

    #[test]
    fn data_args_become_a_config_map() {
        let cmd = parse(&["--image", "fn/set-namespace", "--", "namespace=prod"]);
        let config = cmd.build_config().unwrap().unwrap();
        assert_eq!(config.kind(), Some("ConfigMap"));
        assert!(config.to_yaml().unwrap().contains("namespace: prod"));

        let cmd = parse(&["--image", "fn/set-namespace", "--", "no-equals-sign"]);
        assert!(cmd.build_config().is_err());
    }

    #[test]
    fn fn_config_file_wins_over_data() {
        let dir = tempdir().unwrap();
        let cfg = dir.path().join("cfg.yaml");
        fs::write(&cfg, "kind: Custom\n").unwrap();
        let cmd = parse(&[
            "--image",
            "fn/a",
            "--fn-config",
            cfg.to_str().unwrap(),
            "--",
            "k=v",
        ]);
        let config = cmd.build_config().unwrap().unwrap();
        assert_eq!(config.kind(), Some("Custom"));
    }

    #[test]
    fn directory_reading_is_recursive_and_sorted() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("b.yaml"), "kind: B\n").unwrap();
        fs::write(dir.path().join("a.yaml"), "kind: A0\n---\nkind: A1\n").unwrap();
        fs::write(dir.path().join("skip.txt"), "nope").unwrap();

        let resources = read_dir_resources(dir.path()).unwrap();
        let locations: Vec<String> = resources
            .iter()
            .map(|r| {
                let (path, index) = r.file_location().unwrap();
                format!("{path}:{index}")
            })
            .collect();
        assert_eq!(locations, vec!["a.yaml:0", "a.yaml:1", "sub/b.yaml:0"]);
    }
}
