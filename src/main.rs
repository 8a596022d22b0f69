//! Binary entry point for the Stackreach CLI.

use std::io::{self, Write};
use std::process;

use camino::Utf8Path;
use clap::Parser;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use stackreach::{
    AddressResolver, AuthConfigError, ConfigErrors, ConfigLoadError, InstanceHandle, LaunchConfig,
    OpenStackClient, OpenStackConfig, OpenStackError, PipelineState, PoolPreference,
    ProviderQuery, ResolveFailure, ResolveScheduler, SessionAuth, load_launch_file,
    read_private_key, validate,
};

mod cli;

use cli::{Cli, ResolveCommand, ValidateCommand};

const LOG_ENV: &str = "STACKREACH_LOG";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigLoadError),
    #[error("launch file is invalid:\n{0}")]
    Launch(ConfigErrors),
    #[error("compute API error: {0}")]
    Provider(#[from] OpenStackError),
    #[error("{0} (cause: {cause:?})", cause = .0.cause())]
    Resolve(Box<ResolveFailure<OpenStackError>>),
    #[error("SSH credentials error: {0}")]
    Auth(#[from] AuthConfigError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl From<ResolveFailure<OpenStackError>> for CliError {
    fn from(value: ResolveFailure<OpenStackError>) -> Self {
        Self::Resolve(Box::new(value))
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli, &mut io::stdout().lock()).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn dispatch(cli: Cli, out: &mut impl Write) -> Result<(), CliError> {
    match cli {
        Cli::Validate(command) => run_validate(&command, out),
        Cli::Resolve(command) => run_resolve(command, out).await,
        Cli::Instances => run_instances(out).await,
    }
}

fn load_validated(path: &Utf8Path) -> Result<LaunchConfig, CliError> {
    let file = load_launch_file(path)?;
    validate(&file.launch, &file.template_context())
        .into_result()
        .map_err(CliError::Launch)
}

fn run_validate(command: &ValidateCommand, out: &mut impl Write) -> Result<(), CliError> {
    let config = load_validated(&command.launch_file)?;
    write_launch_summary(out, &config)?;
    Ok(())
}

fn write_launch_summary(out: &mut impl Write, config: &LaunchConfig) -> io::Result<()> {
    writeln!(out, "source_image: {}", config.source_image())?;
    writeln!(out, "flavor: {}", config.flavor())?;
    writeln!(out, "ssh_username: {}", config.ssh_username())?;
    writeln!(out, "ssh_port: {}", config.ssh_port())?;
    writeln!(out, "ssh_timeout: {:?}", config.ssh_timeout())?;
    if !config.openstack_provider().is_empty() {
        writeln!(out, "openstack_provider: {}", config.openstack_provider())?;
    }
    if config.use_floating_ip() {
        match config.floating_ip() {
            Some(address) => writeln!(out, "floating_ip: {address}")?,
            None => writeln!(out, "floating_ip_pool: {}", config.floating_ip_pool())?,
        }
    }
    let groups: Vec<&str> = config
        .security_groups()
        .iter()
        .map(|group| group.name.as_str())
        .collect();
    if !groups.is_empty() {
        writeln!(out, "security_groups: {}", groups.join(", "))?;
    }
    Ok(())
}

async fn run_resolve(command: ResolveCommand, out: &mut impl Write) -> Result<(), CliError> {
    let launch = load_validated(&command.launch_file)?;
    let settings = OpenStackConfig::load_without_cli_args()?;
    let client = OpenStackClient::new(&settings)?;

    let private_key = command
        .private_key
        .as_deref()
        .map(read_private_key)
        .transpose()?;

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; abandoning address resolution");
            watcher.cancel();
        }
    });

    let mut scheduler = settings.scheduler().with_cancellation(cancel);
    if let Some(attempts) = command.max_attempts {
        scheduler = scheduler.with_max_attempts(attempts);
    }
    let request = ResolveRequest {
        instance_id: &command.instance_id,
        private_key,
        resolver: AddressResolver::new(settings.pools()),
        scheduler,
    };
    resolve_with(&client, request, &launch, out).await
}

struct ResolveRequest<'a> {
    instance_id: &'a str,
    private_key: Option<String>,
    resolver: AddressResolver,
    scheduler: ResolveScheduler,
}

async fn resolve_with<P>(
    provider: &P,
    request: ResolveRequest<'_>,
    launch: &LaunchConfig,
    out: &mut impl Write,
) -> Result<(), CliError>
where
    P: ProviderQuery<Error = OpenStackError> + Sync,
{
    let instance = provider.instance_by_id(request.instance_id).await?;
    debug!(instance_id = %instance.id, status = %instance.status, "loaded instance");
    let mut state = PipelineState::with_instance(instance);
    if let Some(key) = request.private_key {
        state = state.with_private_key(key);
    }

    let address = request
        .scheduler
        .run(&request.resolver, &mut state, launch, provider)
        .await?;
    writeln!(out, "address: {address}")?;

    if state.private_key().is_some() {
        let auth = SessionAuth::from_state(&state, launch.ssh_username())?;
        writeln!(out, "destination: {}", auth.destination(&address))?;
        writeln!(out, "key_fingerprint: {}", auth.fingerprint())?;
    }
    Ok(())
}

async fn run_instances(out: &mut impl Write) -> Result<(), CliError> {
    let settings = OpenStackConfig::load_without_cli_args()?;
    let client = OpenStackClient::new(&settings)?;
    let instances = client.list_instances().await?;
    write_instances(out, &instances, &settings.pools())?;
    Ok(())
}

fn write_instances(
    out: &mut impl Write,
    instances: &[InstanceHandle],
    pools: &PoolPreference,
) -> io::Result<()> {
    for instance in instances {
        let address = pools
            .first_usable(instance)
            .map_or("-", |(_, record)| record.addr.as_str());
        writeln!(out, "{}\t{}\t{}", instance.id, instance.status, address)?;
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
