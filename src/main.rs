use std::{fs, path::PathBuf, process};

use clap::{Args, Parser, Subcommand};
use dev_env_api::{
    config::DevEnvConfig,
    model::{Dev, User},
    ClientSource, Context, DevEnvError, DevEnvironments,
};
use hiro_system_kit::slog;

#[derive(Parser)]
#[command(name = "dev-env")]
#[command(about = "Activate, run and remove development environments on Kubernetes", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the dev-env TOML config (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Kubeconfig to use instead of the in-cluster / default one
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Activate dev mode: secrets, volumes, workload, service and ingress
    Up(Target),
    /// Run the manifest's image as is
    Run(Target),
    /// Remove the environment
    Down {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        remove_volumes: bool,
    },
}

#[derive(Args)]
struct Target {
    /// Dev manifest (YAML)
    #[arg(long, short)]
    manifest: PathBuf,
    #[arg(long)]
    user_id: String,
    #[arg(long)]
    github_id: String,
}

impl Target {
    fn load(&self) -> Result<(User, Dev), DevEnvError> {
        let manifest = fs::read_to_string(&self.manifest).map_err(|e| DevEnvError {
            message: format!("unable to read file {}: {}", self.manifest.display(), e),
            code: 400,
        })?;
        let user = User {
            id: self.user_id.to_owned(),
            github_id: self.github_id.to_owned(),
        };
        Ok((user, Dev::from_yaml(&manifest)?))
    }
}

async fn execute(cli: Cli, ctx: &Context) -> Result<(), DevEnvError> {
    let config = match &cli.config {
        Some(path) => DevEnvConfig::from_path(path)?,
        None => DevEnvConfig::default(),
    };
    let client_source = match cli.kubeconfig {
        Some(path) => ClientSource::Kubeconfig(path),
        None => ClientSource::Infer,
    };
    let environments = DevEnvironments::new(client_source, config, ctx);

    match cli.command {
        Command::Up(target) => {
            let (user, dev) = target.load()?;
            environments.dev_mode_on(&user, &dev).await
        }
        Command::Run(target) => {
            let (user, dev) = target.load()?;
            environments.run_image(&user, &dev).await
        }
        Command::Down {
            target,
            remove_volumes,
        } => {
            let (user, dev) = target.load()?;
            environments.dev_mode_off(&user, &dev, remove_volumes).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logger = hiro_system_kit::log::setup_logger();
    let guard = hiro_system_kit::log::setup_global_logger(logger.clone());
    let ctx = Context {
        logger: Some(logger),
        tracer: false,
    };

    if let Err(e) = execute(cli, &ctx).await {
        ctx.try_log(|logger| slog::error!(logger, "{}", e.message));
        eprintln!("{}", e);
        drop(guard);
        process::exit(1);
    }
}
