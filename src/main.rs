/*!
 * Charon CLI - Command Line Interface
 *
 * Runs remote procedures against configured VistA sites and prints the
 * aggregated response as JSON on stdout. Diagnostics go to stderr.
 */

use anyhow::Context;
use charon::{
    config::{GatewayConfig, LogLevel},
    error::{GatewayError, EXIT_FATAL, EXIT_PARTIAL, EXIT_SUCCESS},
    logging, Gateway,
};
use charon_api::{Credential, Parameter, RpcDetails, RpcRequest, RpcResponseStatus, RpcTarget};
use charon_models::{
    iblhs_amcms_get_ins::{self, IblhsAmcmsGetIns},
    xobv_test_ping::{self, XobvTestPing},
    xobv_test_string::{self, XobvTestString},
    TypeSafeRpc, TypeSafeRpcResponse,
};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "charon")]
#[command(version, about = "Run remote procedures against one or more VistA sites", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "CHARON_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run any procedure by name
    Rpc {
        #[command(flatten)]
        sites: SiteArgs,

        #[command(flatten)]
        credential: CredentialArgs,

        /// Remote procedure name
        #[arg(long)]
        name: String,

        /// Option context to run the procedure under
        #[arg(long)]
        context: String,

        /// Procedure version
        #[arg(long = "rpc-version", value_name = "VERSION")]
        version: Option<String>,

        /// Positional parameter as JSON, e.g. '{"string":"1234"}' (repeatable, in order)
        #[arg(long = "param", value_name = "JSON")]
        params: Vec<String>,
    },

    /// Check that sites accept a login and answer
    Ping {
        #[command(flatten)]
        sites: SiteArgs,

        #[command(flatten)]
        credential: CredentialArgs,
    },

    /// Look up a patient's insurance at each site
    GetIns {
        #[command(flatten)]
        sites: SiteArgs,

        #[command(flatten)]
        credential: CredentialArgs,

        /// Integration control number of the patient
        #[arg(long)]
        icn: String,
    },

    /// Have each site echo a value back
    Echo {
        #[command(flatten)]
        sites: SiteArgs,

        #[command(flatten)]
        credential: CredentialArgs,

        /// Text to echo
        #[arg(long)]
        value: String,
    },

    /// List configured sites
    Targets,
}

#[derive(Args, Debug)]
struct SiteArgs {
    /// Site id to run against (repeatable)
    #[arg(short, long = "target", value_name = "ID")]
    targets: Vec<String>,
}

#[derive(Args)]
struct CredentialArgs {
    /// Access code
    #[arg(long, env = "CHARON_ACCESS_CODE", hide_env_values = true)]
    access_code: String,

    /// Verify code
    #[arg(long, env = "CHARON_VERIFY_CODE", hide_env_values = true)]
    verify_code: String,
}

impl std::fmt::Debug for CredentialArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialArgs")
            .field("access_code", &"[REDACTED]")
            .field("verify_code", &"[REDACTED]")
            .finish()
    }
}

impl CredentialArgs {
    fn to_credential(&self) -> Credential {
        Credential::new(&self.access_code, &self.verify_code)
    }
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            e.downcast_ref::<GatewayError>()
                .map(GatewayError::exit_code)
                .unwrap_or(EXIT_FATAL)
        }
    };
    std::process::exit(code);
}

fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => GatewayConfig::from_file(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => GatewayConfig::default(),
    };
    if cli.verbose {
        config.log.level = LogLevel::Debug;
    }
    logging::init_logging(&config.log)?;

    if let Commands::Targets = cli.command {
        let targets = config.descriptors();
        print_json(&targets)?;
        return Ok(EXIT_SUCCESS);
    }

    let gateway = Gateway::from_config(&config)?;

    match cli.command {
        Commands::Rpc {
            sites,
            credential,
            name,
            context,
            version,
            params,
        } => {
            let details = build_details(name, context, version, &params)?;
            let request = RpcRequest {
                rpc: details,
                principal: credential.to_credential(),
                target: RpcTarget::include(sites.targets),
            };
            match gateway.execute(&request) {
                Ok(response) => {
                    print_json(&response)?;
                    let failed = response.results.iter().any(|r| !r.is_success());
                    Ok(match response.status {
                        RpcResponseStatus::Ok | RpcResponseStatus::NoVistasResolved
                            if !failed =>
                        {
                            EXIT_SUCCESS
                        }
                        _ => EXIT_PARTIAL,
                    })
                }
                Err(e) => report(e),
            }
        }
        Commands::Ping { sites, credential } => {
            typed::<XobvTestPing>(&gateway, &xobv_test_ping::Request, &credential, &sites)
        }
        Commands::GetIns {
            sites,
            credential,
            icn,
        } => typed::<IblhsAmcmsGetIns>(
            &gateway,
            &iblhs_amcms_get_ins::Request::new(icn),
            &credential,
            &sites,
        ),
        Commands::Echo {
            sites,
            credential,
            value,
        } => typed::<XobvTestString>(
            &gateway,
            &xobv_test_string::Request::new(value),
            &credential,
            &sites,
        ),
        Commands::Targets => Ok(EXIT_SUCCESS),
    }
}

/// Run a type-safe procedure and print its folded response
fn typed<R>(
    gateway: &Gateway,
    request: &R::Request,
    credential: &CredentialArgs,
    sites: &SiteArgs,
) -> anyhow::Result<i32>
where
    R: TypeSafeRpc,
    R::Response: Serialize,
{
    match gateway.call::<R>(request, &credential.to_credential(), &sites.targets) {
        Ok(response) => {
            print_json(&response)?;
            let requested: HashSet<&String> = sites.targets.iter().collect();
            Ok(if response.results_by_target().len() < requested.len() {
                EXIT_PARTIAL
            } else {
                EXIT_SUCCESS
            })
        }
        Err(e) => report(e),
    }
}

/// Print the failure envelope and pick the exit code
fn report(error: GatewayError) -> anyhow::Result<i32> {
    eprintln!("Error: {}", error);
    print_json(&error.failed_response())?;
    Ok(error.exit_code())
}

fn build_details(
    name: String,
    context: String,
    version: Option<String>,
    params: &[String],
) -> anyhow::Result<RpcDetails> {
    let mut builder = RpcDetails::builder().name(name).context(context);
    if let Some(version) = version {
        builder = builder.version(version);
    }
    for (i, raw) in params.iter().enumerate() {
        let parameter: Parameter = serde_json::from_str(raw)
            .with_context(|| format!("Invalid --param #{}: {}", i + 1, raw))?;
        builder = builder.parameter(parameter);
    }
    Ok(builder.build()?)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
