//! The hydration walker.
//!
//! Hydration is a depth-first traversal of the package tree. Each package
//! node moves through three states during one invocation:
//!
//! ```text
//! Dry -> Hydrating -> Wet
//! ```
//!
//! Reaching a `Hydrating` node again means the traversal looped back into a
//! package that is still on the stack, which is a dependency cycle. Reaching
//! a `Wet` node returns its cached output, so a package reachable through
//! several parents is hydrated exactly once. Any other transition is a
//! corrupted arena.
//!
//! Ordering contract: within a package, subpackage outputs precede local
//! resources, subpackages are visited in discovery (lexicographic) order,
//! and function chains run in declaration order. The traversal is
//! single-threaded on purpose; the ordering is a user-visible contract.

use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::core::ConfpmError;
use crate::manifest::validation::{FunctionError, validate_function};
use crate::manifest::{Function, Pipeline};
use crate::pkg::Package;
use crate::render::reconcile::{
    adjust_rel_path, check_package_scope, collect_file_set, detect_path_conflicts, prune_files,
};
use crate::resource::Resource;
use crate::runner::{FunctionRunResults, FunctionRuntime, ResourceList, function_config};
use crate::utils::path_to_slash;

/// Hydration state of one package node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HydrationState {
    Dry,
    Hydrating,
    Wet,
}

/// One node in the hydration DAG, owned by the context arena.
#[derive(Debug)]
struct PkgNode {
    state: HydrationState,
    /// Hydrated resources of this package and all of its children; only
    /// populated once the node is `Wet`.
    resources: Vec<Resource>,
}

impl PkgNode {
    fn new() -> Self {
        Self {
            state: HydrationState::Dry,
            resources: Vec::new(),
        }
    }
}

/// State shared across one hydration invocation.
///
/// The arena maps unique paths to package nodes, providing both memoization
/// and cycle detection; the file sets feed the prune step once the root
/// returns.
pub(crate) struct HydrationContext {
    root: Package,
    pkgs: HashMap<PathBuf, PkgNode>,
    input_files: BTreeSet<String>,
    output_files: BTreeSet<String>,
    fn_results: Vec<FunctionRunResults>,
    quiet: bool,
}

impl HydrationContext {
    pub(crate) fn new(root: Package, quiet: bool) -> Self {
        Self {
            root,
            pkgs: HashMap::new(),
            input_files: BTreeSet::new(),
            output_files: BTreeSet::new(),
            fn_results: Vec::new(),
            quiet,
        }
    }

    /// Hydrate `pkg` and return its wet resources.
    pub(crate) fn hydrate<'a>(
        &'a mut self,
        pkg: Package,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Resource>>> + 'a>> {
        Box::pin(async move {
            let unique = pkg.unique_path().to_path_buf();
            if let Some(node) = self.pkgs.get(&unique) {
                return match node.state {
                    HydrationState::Hydrating => Err(ConfpmError::CyclicDependency {
                        package: self.display_path(&pkg),
                    }
                    .into()),
                    HydrationState::Wet => Ok(node.resources.clone()),
                    HydrationState::Dry => Err(anyhow!(
                        "package {} found in an invalid hydration state",
                        self.display_path(&pkg)
                    )),
                };
            }
            self.pkgs.insert(unique.clone(), PkgNode::new());
            if let Some(node) = self.pkgs.get_mut(&unique) {
                node.state = HydrationState::Hydrating;
            }
            tracing::debug!(target: "render", package = %self.display_path(&pkg), "hydrating package");

            let rel = pkg.relative_path_to(&self.root)?;

            let mut input: Vec<Resource> = Vec::new();
            for sub in pkg.direct_subpackages()? {
                let sub_display = self.display_path(&sub);
                let transitive = self.hydrate(sub).await.with_context(|| {
                    format!("failed to run pipeline on subpackage {sub_display}")
                })?;
                input.extend(transitive);
            }

            let mut local = pkg.local_resources(false)?;
            adjust_rel_path(&mut local, &rel)?;
            self.track_input_files(&local)?;
            input.extend(local);

            let mut output = self.run_pipeline(&pkg, input).await?;
            adjust_rel_path(&mut output, &rel)?;

            let node = self
                .pkgs
                .get_mut(&unique)
                .ok_or_else(|| anyhow!("hydration arena lost the node for {}", unique.display()))?;
            node.state = HydrationState::Wet;
            node.resources = output.clone();
            Ok(output)
        })
    }

    /// Run the package's pipeline over the combined input.
    ///
    /// Empty input returns empty output without invoking any function; an
    /// empty pipeline is the identity. Every entry is validated before the
    /// first function runs.
    async fn run_pipeline(&mut self, pkg: &Package, input: Vec<Resource>) -> Result<Vec<Resource>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }
        let pipeline = pkg.pipeline();
        if pipeline.is_empty() {
            return Ok(input);
        }

        let pkg_display = self.display_path(pkg);
        let mut chain = Vec::new();
        for (position, function) in pipeline_entries(&pipeline) {
            validate_function(function).map_err(|err| -> anyhow::Error {
                match err {
                    FunctionError::Invalid(reason) => ConfpmError::InvalidPipeline {
                        package: pkg_display.clone(),
                        position: position.clone(),
                        reason,
                    }
                    .into(),
                    FunctionError::AmbiguousConfig { fields } => {
                        ConfpmError::AmbiguousFunctionConfig {
                            function: function.name().to_string(),
                            fields,
                        }
                        .into()
                    }
                }
            })?;
            let config = function_config(function, pkg.unique_path())?;
            let runtime = FunctionRuntime::from_function(function, pkg.unique_path())?;
            chain.push((runtime, config));
        }

        let mut items = input;
        for (runtime, config) in chain {
            if !self.quiet {
                println!("{} {:?}", "[RUNNING]".bold(), runtime.name());
            }
            let list = ResourceList::new(items, config);
            match runtime.run(&list).await {
                Ok(output) => {
                    if !self.quiet {
                        println!("{} {:?}", "[PASS]".green().bold(), runtime.name());
                    }
                    if !output.results.is_empty() {
                        self.fn_results.push(FunctionRunResults {
                            name: runtime.name().to_string(),
                            exit_code: 0,
                            results: output.results.clone(),
                        });
                    }
                    items = output.items;
                }
                Err(err) => {
                    if !self.quiet {
                        println!("{} {:?}", "[FAIL]".red().bold(), runtime.name());
                    }
                    if let Some(ConfpmError::FunctionExecutionError { exit_code, .. }) =
                        err.downcast_ref::<ConfpmError>()
                    {
                        self.fn_results.push(FunctionRunResults {
                            name: runtime.name().to_string(),
                            exit_code: *exit_code,
                            results: Vec::new(),
                        });
                    }
                    return Err(err)
                        .with_context(|| format!("pipeline run failed in package {pkg_display}"));
                }
            }
        }
        Ok(items)
    }

    /// Record the input files of one package, enforcing path/index
    /// uniqueness on the way in.
    fn track_input_files(&mut self, local: &[Resource]) -> Result<()> {
        detect_path_conflicts(local)?;
        self.input_files.extend(collect_file_set(local)?);
        Ok(())
    }

    /// Record the output files of the root resource set, enforcing
    /// uniqueness and the package scope invariant before anything is
    /// written.
    pub(crate) fn track_output_files(&mut self, resources: &[Resource]) -> Result<()> {
        detect_path_conflicts(resources)?;
        check_package_scope(resources)?;
        self.output_files = collect_file_set(resources)?;
        Ok(())
    }

    /// Delete input files that are no longer outputs. Runs only after a
    /// fully successful write phase.
    pub(crate) fn prune(&self) -> Result<()> {
        prune_files(
            self.root.unique_path(),
            &self.input_files,
            &self.output_files,
        )
    }

    /// Function results accumulated so far, in execution order.
    pub(crate) fn take_results(&mut self) -> Vec<FunctionRunResults> {
        std::mem::take(&mut self.fn_results)
    }

    /// Package path relative to the root, for messages.
    fn display_path(&self, pkg: &Package) -> String {
        match pkg.relative_path_to(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => path_to_slash(&rel),
            Err(_) => pkg.unique_path().display().to_string(),
        }
    }
}

/// Iterate pipeline entries with their positional labels, mutators first.
fn pipeline_entries(pipeline: &Pipeline) -> impl Iterator<Item = (String, &Function)> {
    pipeline
        .mutators
        .iter()
        .enumerate()
        .map(|(i, f)| (format!("mutators[{i}]"), f))
        .chain(
            pipeline
                .validators
                .iter()
                .enumerate()
                .map(|(i, f)| (format!("validators[{i}]"), f)),
        )
}
