//! Provisioning Engine
//!
//! Runs the ordered provisioning steps against an environment manager:
//! - Shell hook registration
//! - Proxy and certificate variable setup
//! - Package cache cleanup
//! - Idempotent environment create/update from a spec file
//! - Activation and deactivation
//!
//! Every step yields a [`StepResult`]; the configured [`FailurePolicy`]
//! decides whether a failure stops the run.

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, error, info, warn};

use crate::config::{FailurePolicy, ProvisionConfig};
use crate::environment::{env_exists, ActiveEnvStack, ManagerCommands, ToolLocation};
use crate::report::{EventType, ExecutionTimeline};

use super::runner::{redact_credentials, CommandOutput, CommandRunner, Invocation};
use super::step::{classify_failure, FailureKind, StepKind, StepOutcome, StepResult};

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct ProvisionRun {
    pub steps: Vec<StepResult>,
    /// Whether the environment existed before the update step, if probed
    pub existed_before: Option<bool>,
    pub active_before: String,
    pub active_after: String,
    pub timeline: ExecutionTimeline,
}

impl ProvisionRun {
    /// True if no step failed.
    pub fn succeeded(&self) -> bool {
        !self.steps.iter().any(|s| s.outcome.is_failure())
    }

    pub fn failed_steps(&self) -> Vec<StepKind> {
        self.steps
            .iter()
            .filter(|s| s.outcome.is_failure())
            .map(|s| s.kind)
            .collect()
    }

    pub fn step(&self, kind: StepKind) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.kind == kind)
    }
}

/// Environment provisioning engine.
///
/// # Example
///
/// ```rust,no_run
/// use envprovision::config::ProvisionConfig;
/// use envprovision::environment::{resolve_tool, ToolKind};
/// use envprovision::execution::{Provisioner, SystemRunner};
///
/// let config = ProvisionConfig::new("analytics");
/// let tool = resolve_tool(ToolKind::Conda, None);
/// let mut provisioner = Provisioner::new(config, tool, SystemRunner);
/// provisioner.set_working_dir("/data/project");
///
/// let run = provisioner.run();
/// assert!(run.succeeded());
/// ```
pub struct Provisioner<R: CommandRunner> {
    config: ProvisionConfig,
    tool: ToolLocation,
    commands: ManagerCommands,
    runner: R,
    working_dir: Option<PathBuf>,
    echo_output: bool,
    env_vars: Vec<(String, String)>,
    active: ActiveEnvStack,
    existed_before: Option<bool>,
}

impl<R: CommandRunner> Provisioner<R> {
    /// Creates an engine; the session starts in `CONDA_DEFAULT_ENV` or the base env.
    pub fn new(config: ProvisionConfig, tool: ToolLocation, runner: R) -> Self {
        let active = ActiveEnvStack::from_env(&config.base_env);
        Self::with_active(config, tool, runner, active)
    }

    /// Creates an engine starting from an explicit active-environment model.
    pub fn with_active(
        config: ProvisionConfig,
        tool: ToolLocation,
        runner: R,
        active: ActiveEnvStack,
    ) -> Self {
        let commands = ManagerCommands::new(tool.kind, config.shell);
        Self {
            config,
            tool,
            commands,
            runner,
            working_dir: None,
            echo_output: false,
            env_vars: Vec::new(),
            active,
            existed_before: None,
        }
    }

    /// Sets the working directory for manager invocations and relative spec paths.
    pub fn set_working_dir(&mut self, dir: impl Into<PathBuf>) {
        self.working_dir = Some(dir.into());
    }

    /// Prints captured manager output to the console after each step.
    pub fn set_echo_output(&mut self, echo: bool) {
        self.echo_output = echo;
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Steps this configuration will run, in order.
    pub fn plan(&self) -> Vec<StepKind> {
        let mut steps = vec![StepKind::ShellInit, StepKind::ConfigureProxy];
        if self.config.clean_cache {
            steps.push(StepKind::CleanCache);
        }
        steps.push(StepKind::UpdateEnvironment);
        if self.config.verify {
            steps.push(StepKind::VerifyEnvironment);
        }
        steps.push(StepKind::Activate);
        steps.push(StepKind::Deactivate);
        steps
    }

    /// Runs every planned step.
    ///
    /// Never returns early: under [`FailurePolicy::Abort`] the steps after the
    /// first failure are recorded as skipped.
    pub fn run(&mut self) -> ProvisionRun {
        let plan = self.plan();
        let mut timeline = ExecutionTimeline::new();
        let mut steps = Vec::with_capacity(plan.len());
        let mut aborted = false;
        let active_before = self.active.current().to_string();
        self.env_vars.clear();
        self.existed_before = None;

        info!(
            "Provisioning '{}' with {} ({} steps, on error: {})",
            self.config.environment,
            self.tool.kind,
            plan.len(),
            self.config.on_error
        );

        for kind in plan {
            if aborted {
                info!("Skipping step: {}", kind);
                timeline.add_event(kind, EventType::Skipped);
                steps.push(StepResult::skipped(kind));
                continue;
            }

            info!("Starting step: {} ({})", kind, kind.description());
            timeline.add_event(kind, EventType::Started);

            let started = Instant::now();
            let mut result = self.execute(kind);
            result.duration_ms = started.elapsed().as_millis() as u64;

            if self.echo_output {
                echo(&result);
            }

            match &result.outcome {
                StepOutcome::Failed(failure) => {
                    error!("Step '{}' failed: {}", kind, failure);
                    if kind.touches_network()
                        && *failure == FailureKind::Network
                        && self.env_vars.is_empty()
                    {
                        warn!("No proxy configured; set --http-proxy/--https-proxy if a proxy is required");
                    }
                    timeline.add_event(kind, EventType::Failed);
                    if self.config.on_error == FailurePolicy::Abort {
                        warn!("Aborting remaining steps after '{}'", kind);
                        aborted = true;
                    }
                }
                _ => {
                    info!("Step '{}' completed successfully", kind);
                    timeline.add_event(kind, EventType::Completed);
                }
            }

            steps.push(result);
        }

        ProvisionRun {
            steps,
            existed_before: self.existed_before,
            active_before,
            active_after: self.active.current().to_string(),
            timeline,
        }
    }

    fn execute(&mut self, kind: StepKind) -> StepResult {
        match kind {
            StepKind::ShellInit => {
                let argv = self.commands.shell_hook();
                self.invoke(kind, argv)
            }
            StepKind::ConfigureProxy => self.configure_proxy(),
            StepKind::CleanCache => {
                let argv = self.commands.clean_cache();
                self.invoke(kind, argv)
            }
            StepKind::UpdateEnvironment => self.update_environment(),
            StepKind::VerifyEnvironment => self.verify_environment(),
            StepKind::Activate => {
                let argv = self.commands.activate(&self.config.environment);
                let result = self.invoke(kind, argv);
                if result.succeeded() {
                    self.active.activate(self.config.environment.clone());
                    debug!("Active environment: {}", self.active.current());
                }
                result
            }
            StepKind::Deactivate => {
                let argv = self.commands.deactivate();
                let result = self.invoke(kind, argv);
                if result.succeeded() {
                    let now = self.active.deactivate();
                    debug!("Active environment: {}", now);
                }
                result
            }
        }
    }

    /// Builds the variable set every later invocation receives.
    fn configure_proxy(&mut self) -> StepResult {
        self.env_vars = self.config.env_vars();

        if self.env_vars.is_empty() {
            info!("No proxy settings configured");
        }
        for (name, value) in &self.env_vars {
            info!("  {}={}", name, redact_credentials(value));
        }

        if let Some(bundle) = &self.config.proxy.ca_bundle {
            let bundle = self.resolve(bundle);
            if !bundle.exists() {
                warn!("Certificate bundle not found: {}", bundle.display());
            }
        }

        StepResult::new(StepKind::ConfigureProxy, StepOutcome::Succeeded)
    }

    fn update_environment(&mut self) -> StepResult {
        let kind = StepKind::UpdateEnvironment;
        let spec = self.config.spec_path_in(self.working_dir.as_deref());

        if !spec.is_file() {
            error!("Specification file not found: {}", spec.display());
            return StepResult::new(
                kind,
                StepOutcome::Failed(FailureKind::SpecFileNotFound { path: spec }),
            );
        }

        let exists = if self.config.dry_run {
            None
        } else {
            self.probe_environment()
        };
        self.existed_before = exists;

        match exists {
            Some(true) => info!("Environment '{}' exists - updating", self.config.environment),
            Some(false) => info!("Environment '{}' not found - creating", self.config.environment),
            None => debug!("Could not determine whether '{}' exists", self.config.environment),
        }

        let argv = self.commands.update_env(
            &self.config.environment,
            &spec,
            exists.unwrap_or(false),
            self.config.prune,
        );
        let mut result = self.invoke(kind, argv);

        if let StepOutcome::Failed(FailureKind::SpecFileNotFound { path }) = &mut result.outcome {
            *path = spec;
        }
        result
    }

    fn verify_environment(&mut self) -> StepResult {
        let kind = StepKind::VerifyEnvironment;
        let argv = self.commands.list_envs();
        let mut result = self.invoke(kind, argv);

        let registered = result
            .output
            .as_ref()
            .map(|output| env_exists(&output.stdout, &self.config.environment))
            .unwrap_or(false);

        if result.succeeded() && !registered && !self.config.dry_run {
            result.outcome = StepOutcome::Failed(FailureKind::EnvironmentMissing {
                name: self.config.environment.clone(),
            });
        }
        result
    }

    /// Asks the manager whether the environment is registered.
    fn probe_environment(&mut self) -> Option<bool> {
        let invocation = self.invocation(self.commands.list_envs());
        match self.runner.run(&invocation) {
            Ok(output) if output.success() => {
                Some(env_exists(&output.stdout, &self.config.environment))
            }
            Ok(output) => {
                debug!("Listing environments failed: {}", output.stderr.trim());
                None
            }
            Err(e) => {
                debug!("Listing environments failed: {}", e);
                None
            }
        }
    }

    fn invocation(&self, argv: Vec<String>) -> Invocation {
        Invocation::new(&self.tool.path, argv)
            .with_env(&self.env_vars)
            .in_dir(self.working_dir.as_deref())
    }

    fn invoke(&mut self, kind: StepKind, argv: Vec<String>) -> StepResult {
        let invocation = self.invocation(argv);
        let command = invocation.command_line();
        debug!("Running: {}", command);

        match self.runner.run(&invocation) {
            Ok(output) => {
                let outcome = if output.success() {
                    if !output.stdout.trim().is_empty() {
                        debug!("Step '{}' output:\n{}", kind, output.stdout.trim_end());
                    }
                    StepOutcome::Succeeded
                } else {
                    error!("Step '{}' failed with exit code: {:?}", kind, output.code);
                    if !output.stderr.trim().is_empty() {
                        error!("stderr:\n{}", output.stderr.trim_end());
                    }
                    if !output.stdout.trim().is_empty() {
                        debug!("stdout:\n{}", output.stdout.trim_end());
                    }
                    StepOutcome::Failed(classify_failure(kind, &output))
                };
                StepResult::new(kind, outcome)
                    .with_command(command)
                    .with_output(output)
            }
            Err(e) => {
                error!("Step '{}' could not start: {}", kind, e);
                let message = e.to_string();
                StepResult::new(kind, StepOutcome::Failed(e.into()))
                    .with_command(command)
                    .with_output(CommandOutput {
                        code: None,
                        stdout: String::new(),
                        stderr: message,
                    })
            }
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.working_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Prints a step's captured output the way the manager would have shown it.
fn echo(result: &StepResult) {
    let Some(output) = &result.output else {
        return;
    };
    if !output.stdout.trim().is_empty() {
        println!("{}", output.stdout.trim_end());
    }
    if !output.stderr.trim().is_empty() {
        eprintln!("{}", output.stderr.trim_end());
    }
}
