//! `honestman-deploy` -- build, ship and restart the crawler and api.
//!
//! ```text
//! honestman-deploy deploy api          # build + upload api to the web hosts
//! honestman-deploy uat cool crawler    # deploy crawler to UAT and restart it
//! honestman-deploy docker ps -a        # sudo docker ps -a on every host
//! ```
//!
//! Configuration is read from the environment (and `.env`); see
//! `DeployConfig::from_env` for the full table.

use clap::{Parser, Subcommand};
use honestman_core::host_group::HostGroup;
use honestman_core::shell::shell_escape;
use honestman_core::target::Target;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use honestman_deploy::config::DeployConfig;
use honestman_deploy::context::DeployContext;
use honestman_deploy::error::DeployResult;
use honestman_deploy::orchestrator::{Operation, Orchestrator};
use honestman_deploy::remote::{HostOutput, OutputSink};
use honestman_deploy::runner::dry_run::DryRunRunner;
use honestman_deploy::runner::process::ProcessRunner;
use honestman_deploy::runner::{CommandOutput, CommandRunner};

#[derive(Parser)]
#[command(name = "honestman-deploy")]
#[command(about = "Build, upload and restart the honestman services")]
#[command(version)]
struct Cli {
    /// Host group to target (web, uat, all, prd)
    #[arg(long, global = true)]
    group: Option<HostGroup>,

    /// Print the commands instead of running them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the nested command against the UAT hosts
    Uat {
        #[command(subcommand)]
        command: Option<Command>,
    },

    /// Run the nested command against every production host
    All {
        #[command(subcommand)]
        command: Option<Command>,
    },

    #[command(flatten)]
    Direct(Command),
}

#[derive(Subcommand)]
enum Command {
    /// Cross-compile and compress binaries (target: crawler, api, or empty for both)
    Build { target: Option<String> },

    /// Upload the last built binaries
    Upload { target: Option<String> },

    /// Build then upload
    Deploy { target: Option<String> },

    /// Build, upload and restart the containers
    Cool { target: Option<String> },

    /// Show uptime of every host
    Uptime,

    /// Run `sudo docker <cmd>` on every host. Several arguments are quoted
    /// individually; a single argument is passed to the shell as written.
    Docker {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        cmd: Vec<String>,
    },

    /// Run `sudo <cmd>` on every host. Several arguments are quoted
    /// individually; a single argument is passed to the shell as written.
    Run {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        cmd: Vec<String>,
    },

    /// Upload the Dockerfile and build the service image
    Buildimage,
}

impl Commands {
    /// Split a `uat`/`all` prefix from the command it wraps. The prefix
    /// wins over `--group`.
    fn resolve(self, group: Option<HostGroup>) -> (Option<HostGroup>, Option<Command>) {
        match self {
            Self::Uat { command } => (Some(HostGroup::Uat), command),
            Self::All { command } => (Some(HostGroup::All), command),
            Self::Direct(command) => (group, Some(command)),
        }
    }
}

/// Rebuild a remote command line from trailing arguments.
///
/// `run 'ls | wc -l'` keeps its pipe, while `run grep "a b" f` keeps
/// `a b` as one word.
fn command_line(args: Vec<String>) -> String {
    if args.len() == 1 {
        return args.into_iter().collect();
    }
    args.iter()
        .map(|arg| shell_escape(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

impl Command {
    /// Validate arguments. Fails before any command is spawned.
    fn into_operation(self) -> DeployResult<Operation> {
        let target = |t: Option<String>| Target::parse(t.as_deref());
        Ok(match self {
            Self::Build { target: t } => Operation::Build(target(t)?),
            Self::Upload { target: t } => Operation::Upload(target(t)?),
            Self::Deploy { target: t } => Operation::Deploy(target(t)?),
            Self::Cool { target: t } => Operation::RestartCycle(target(t)?),
            Self::Uptime => Operation::Uptime,
            Self::Docker { cmd } => Operation::Docker(command_line(cmd)),
            Self::Run { cmd } => Operation::Run(command_line(cmd)),
            Self::Buildimage => Operation::ProvisionImage,
        })
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "honestman_deploy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let (group, command) = cli.command.resolve(cli.group);
    let Some(command) = command else {
        tracing::info!(group = ?group, "Host group selected, nothing to run");
        return Ok(());
    };
    let operation = command.into_operation()?;

    let config = DeployConfig::from_env()?;
    let ctx = DeployContext::new(&config, group);
    tracing::info!(
        group = %ctx.group,
        hosts = ?ctx.hosts,
        dry_run = cli.dry_run,
        "Starting honestman-deploy",
    );

    if cli.dry_run {
        execute(&ctx, &DryRunRunner, &operation).await?;
    } else {
        execute(&ctx, &ProcessRunner, &operation).await?;
    }
    Ok(())
}

async fn execute<R: CommandRunner>(
    ctx: &DeployContext,
    runner: &R,
    operation: &Operation,
) -> DeployResult<Vec<HostOutput>> {
    Orchestrator::new(ctx, runner)
        .with_sink(&StdoutSink)
        .execute(operation)
        .await
}

/// Prints remote stdout as `[host] out: <line>` as soon as each host
/// finishes, so earlier hosts stay visible when a later one fails.
struct StdoutSink;

impl OutputSink for StdoutSink {
    fn host_output(&self, host: &str, output: &CommandOutput) {
        for line in output.stdout.lines() {
            println!("[{host}] out: {line}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use honestman_core::error::CoreError;
    use honestman_deploy::error::DeployError;

    use super::*;

    fn resolve_args(args: &[&str]) -> (Option<HostGroup>, Option<Command>) {
        let cli = Cli::try_parse_from(std::iter::once("honestman-deploy").chain(args.iter().copied()))
            .expect("arguments parse");
        cli.command.resolve(cli.group)
    }

    fn operation(args: &[&str]) -> DeployResult<Operation> {
        let (_, command) = resolve_args(args);
        command.expect("nested command").into_operation()
    }

    #[test]
    fn bare_group_prefix_selects_group_without_a_command() {
        let (group, command) = resolve_args(&["uat"]);
        assert_eq!(group, Some(HostGroup::Uat));
        assert!(command.is_none());

        let (group, command) = resolve_args(&["all"]);
        assert_eq!(group, Some(HostGroup::All));
        assert!(command.is_none());
    }

    #[test]
    fn prefix_wins_over_group_flag() {
        let (group, command) = resolve_args(&["--group", "web", "uat", "cool", "crawler"]);
        assert_eq!(group, Some(HostGroup::Uat));
        assert_matches!(
            command.map(Command::into_operation),
            Some(Ok(Operation::RestartCycle(Target::Crawler)))
        );
    }

    #[test]
    fn group_flag_accepts_prd_alias() {
        let (group, _) = resolve_args(&["--group", "prd", "deploy", "api"]);
        assert_eq!(group, Some(HostGroup::All));

        let (group, _) = resolve_args(&["uptime"]);
        assert_eq!(group, None);

        assert!(Cli::try_parse_from(["honestman-deploy", "--group", "staging", "uptime"]).is_err());
    }

    #[test]
    fn bad_target_fails_before_anything_runs() {
        assert_matches!(
            operation(&["deploy", "web"]),
            Err(DeployError::Core(CoreError::InvalidTarget(ref t))) if t == "web"
        );
        assert_matches!(
            operation(&["uat", "build", "Api"]),
            Err(DeployError::Core(CoreError::InvalidTarget(_)))
        );
        assert_eq!(operation(&["build"]).unwrap(), Operation::Build(Target::All));
        assert_eq!(operation(&["upload", ""]).unwrap(), Operation::Upload(Target::All));
    }

    #[test]
    fn trailing_arguments_become_the_remote_command() {
        assert_eq!(
            operation(&["docker", "ps", "-a"]).unwrap(),
            Operation::Docker("ps -a".into())
        );
        assert_eq!(
            operation(&["all", "run", "ls", "-la"]).unwrap(),
            Operation::Run("ls -la".into())
        );
        assert_eq!(
            operation(&["run", "grep", "a b", "/var/log/syslog"]).unwrap(),
            Operation::Run("grep 'a b' /var/log/syslog".into())
        );
        assert_eq!(
            operation(&["run", "ls /tmp | wc -l"]).unwrap(),
            Operation::Run("ls /tmp | wc -l".into())
        );
    }

    #[test]
    fn dry_run_flag_is_global() {
        let cli = Cli::try_parse_from(["honestman-deploy", "uat", "deploy", "--dry-run"])
            .expect("arguments parse");
        assert!(cli.dry_run);
    }
}
