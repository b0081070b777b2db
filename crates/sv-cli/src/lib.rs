use std::ffi::OsString;
use std::fs;
use std::sync::Arc;

use clap::Parser;
use sv_api::{ScopePersistence, VariableSystem, VariableSystemOptions};
use sv_core::{ErrorKind, ScopeConfig, ScopeId, VarError};
use sv_parser::strip_commands;
use sv_runtime::{CommandOptions, MacroOptions, RegisterPolicy};
use tracing::info;

mod cli_args;
mod error_map;
mod state_store;

pub(crate) use cli_args::{ApplyArgs, Cli, InitArgs, Mode, ResolveArgs, ScopeArgs, ShowArgs};
pub(crate) use error_map::{
    emit_error, map_cli_config_invalid, map_cli_config_read, map_cli_runtime, map_cli_state_read,
    map_cli_state_write,
};
pub(crate) use state_store::FilePersistence;

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn run(cli: Cli) -> Result<i32, VarError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(map_cli_runtime)?;
    runtime.block_on(dispatch(cli))
}

async fn dispatch(cli: Cli) -> Result<i32, VarError> {
    match cli.command {
        Mode::Init(args) => run_init(args).await,
        Mode::Apply(args) => run_apply(args).await,
        Mode::Resolve(args) => run_resolve(args).await,
        Mode::Show(args) => run_show(args).await,
    }
}

fn scope_of(args: &ScopeArgs) -> ScopeId {
    match &args.character {
        Some(id) => ScopeId::character(id.as_str()),
        None => ScopeId::Global,
    }
}

fn json_line(value: &impl serde::Serialize) -> String {
    serde_json::to_string(value).expect("string json")
}

fn load_config(path: Option<&str>) -> Result<ScopeConfig, VarError> {
    let Some(path) = path else {
        return Ok(ScopeConfig::default());
    };
    let raw = fs::read_to_string(path).map_err(map_cli_config_read)?;
    serde_json::from_str(&raw).map_err(map_cli_config_invalid)
}

/// Opens the state directory with the global scope and, when given, one character scope.
/// A global scope that was never persisted starts empty; a character scope must exist.
async fn open_system(
    args: &ScopeArgs,
    options: VariableSystemOptions,
) -> Result<(VariableSystem, ScopeId), VarError> {
    let system = VariableSystem::with_options(
        Arc::new(FilePersistence::new(&args.state_dir)),
        options,
    );
    if !system.restore_scope(&ScopeId::Global).await? {
        system.init_global(ScopeConfig::default())?;
    }
    let scope = scope_of(args);
    if matches!(scope, ScopeId::Character(_)) && !system.restore_scope(&scope).await? {
        return Err(VarError::new(
            ErrorKind::UnknownScope,
            format!(
                "Scope \"{}\" has no saved state in {}; run init first.",
                scope, args.state_dir
            ),
        ));
    }
    Ok((system, scope))
}

async fn run_init(args: InitArgs) -> Result<i32, VarError> {
    let scope = scope_of(&args.scope);
    let persistence = Arc::new(FilePersistence::new(&args.scope.state_dir));
    if !args.force && persistence.load(&scope.lock_key()).await?.is_some() {
        return Err(VarError::new(
            ErrorKind::ScopeExists,
            format!("Scope \"{}\" already has saved state.", scope),
        ));
    }

    let config = load_config(args.config.as_deref())?;
    let system = VariableSystem::new(persistence);
    system.init_scope(scope.clone(), config)?;
    system.persist_scope(&scope).await?;
    let count = system.list_variables(&scope)?.len();
    info!(scope = %scope, count, "scope saved");

    println!("RESULT:OK");
    println!("SCOPE:{}", scope);
    println!("VARIABLES:{}", count);
    Ok(0)
}

async fn run_apply(args: ApplyArgs) -> Result<i32, VarError> {
    let register_policy = if args.overwrite {
        RegisterPolicy::Overwrite
    } else {
        RegisterPolicy::KeepExisting
    };
    let options = VariableSystemOptions {
        commands: CommandOptions { register_policy },
        ..VariableSystemOptions::default()
    };
    let (system, scope) = open_system(&args.scope, options).await?;
    let report = system.apply_commands(&args.text, Some(&scope)).await;

    println!("RESULT:OK");
    println!("APPLIED:{}", report.applied);
    for touched in &report.touched {
        println!("TOUCHED:{}", touched);
    }
    for error in &report.errors {
        println!("COMMAND_ERROR:{}|{}", error.code(), json_line(&error.message));
    }
    if args.strip {
        println!("TEXT_JSON:{}", json_line(&strip_commands(&args.text)));
    }
    Ok(0)
}

async fn run_resolve(args: ResolveArgs) -> Result<i32, VarError> {
    let options = VariableSystemOptions {
        macros: MacroOptions {
            max_passes: args.max_passes,
        },
        ..VariableSystemOptions::default()
    };
    let (system, scope) = open_system(&args.scope, options).await?;
    let outcome = system.resolve_with_report(&args.text, Some(&scope));

    println!("RESULT:OK");
    println!("TEXT_JSON:{}", json_line(&outcome.text));
    println!("PASSES:{}", outcome.passes);
    for error in &outcome.errors {
        println!("MACRO_ERROR:{}|{}", error.code(), json_line(&error.message));
    }
    Ok(0)
}

async fn run_show(args: ShowArgs) -> Result<i32, VarError> {
    let (system, scope) = open_system(&args.scope, VariableSystemOptions::default()).await?;

    if let Some(path) = args.path.as_deref() {
        let value = system
            .get_variable(&scope, path)?
            .ok_or_else(|| VarError::path_not_found(path))?;
        println!("RESULT:OK");
        println!("VALUE_JSON:{}", json_line(&value.to_json()));
        return Ok(0);
    }

    println!("RESULT:OK");
    for variable in system.list_variables(&scope)? {
        println!(
            "VARIABLE:{}|{}|{}",
            variable.name,
            variable.var_type,
            json_line(&variable.value.to_json())
        );
    }
    Ok(0)
}
