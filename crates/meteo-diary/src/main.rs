use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::{debug, info};
use serde_json::{Value, json};

use meteo_diary::{
    cache::SourceCache,
    catalog::DEFAULT_CITY_NAME,
    collector::{ForecastCollector, source_today},
    config::RuntimeConfig,
    error::{AppError, ErrorKind},
    loader::{DocumentLoader, HttpLoader},
    model::{ForecastOutput, ForecastWindow},
    render,
    store::{ForecastStore, JsonFileStore, SaveOutcome, StoredForecast, save_forecast},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Daily weather diary and month forecast collector")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Per-day forecast for a city and date range.
    Forecast {
        #[arg(long)]
        city: Option<String>,
        /// First day, dd.mm.yyyy or yyyy-mm-dd. Defaults to today.
        #[arg(long)]
        since: Option<String>,
        /// Last day, dd.mm.yyyy or yyyy-mm-dd. Defaults to `--since`.
        #[arg(long)]
        until: Option<String>,
        #[arg(long)]
        json: bool,
        /// Store every collected day.
        #[arg(long)]
        save: bool,
        /// With --save, keep already stored days untouched.
        #[arg(long, requires = "save")]
        no_update: bool,
        /// Read the period from the store instead of the site.
        #[arg(long, conflicts_with = "save")]
        from_store: bool,
    },
    /// Cities known to the site catalog.
    Cities {
        #[arg(long)]
        json: bool,
    },
}

const ENVELOPE_SCHEMA_VERSION: &str = "v1";
const ERROR_CODE_USER_INVALID_INPUT: &str = "user.invalid_input";
const ERROR_CODE_RUNTIME_LOADER_INIT: &str = "runtime.loader_init_failed";
const ERROR_CODE_RUNTIME_SOURCE: &str = "runtime.source_failed";
const ERROR_CODE_RUNTIME_STORE: &str = "runtime.store_failed";
const ERROR_CODE_RUNTIME_SERIALIZE: &str = "runtime.serialize_failed";

const DATE_FORMATS: [&str; 2] = ["%d.%m.%Y", "%Y-%m-%d"];

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliError {
    kind: ErrorKind,
    code: &'static str,
    message: String,
}

impl CliError {
    fn user(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::User,
            code,
            message: message.into(),
        }
    }

    fn runtime(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Runtime,
            code,
            message: message.into(),
        }
    }

    fn exit_code(&self) -> i32 {
        match self.kind {
            ErrorKind::User => 2,
            ErrorKind::Runtime => 1,
        }
    }
}

impl Cli {
    fn command_name(&self) -> &'static str {
        match &self.command {
            Commands::Forecast { .. } => "meteo.forecast",
            Commands::Cities { .. } => "meteo.cities",
        }
    }

    fn json_output(&self) -> bool {
        match &self.command {
            Commands::Forecast { json, .. } | Commands::Cities { json } => *json,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let command = cli.command_name();
    let json_output = cli.json_output();
    match run(cli) {
        Ok(output) => println!("{output}"),
        Err(error) => {
            emit_error(command, json_output, &error);
            std::process::exit(error.exit_code());
        }
    }
}

fn run(cli: Cli) -> Result<String, CliError> {
    let config = RuntimeConfig::from_env();
    let loader = HttpLoader::new(config.throttle)
        .map_err(|error| CliError::runtime(ERROR_CODE_RUNTIME_LOADER_INIT, error.to_string()))?;
    let collector = ForecastCollector::new(loader, Arc::new(SourceCache::new()), config.urls());
    run_with(cli, &config, &collector, source_today())
}

fn run_with<L: DocumentLoader>(
    cli: Cli,
    config: &RuntimeConfig,
    collector: &ForecastCollector<L>,
    today: NaiveDate,
) -> Result<String, CliError> {
    match cli.command {
        Commands::Forecast {
            city,
            since,
            until,
            json,
            save,
            no_update,
            from_store,
        } => {
            let since = since
                .as_deref()
                .map(parse_date)
                .transpose()?
                .unwrap_or(today);
            let until = until
                .as_deref()
                .map(parse_date)
                .transpose()?
                .unwrap_or(since);
            let args = ForecastArgs {
                location: city.as_deref().unwrap_or(DEFAULT_CITY_NAME),
                window: ForecastWindow::new(since, until),
                json,
            };

            if from_store {
                read_stored_forecast(config, collector, args)
            } else {
                let policy = save.then_some(!no_update);
                collect_and_render(config, collector, args, policy, today)
            }
        }
        Commands::Cities { json } => list_cities(collector, json),
    }
}

#[derive(Debug, Clone, Copy)]
struct ForecastArgs<'a> {
    location: &'a str,
    window: ForecastWindow,
    json: bool,
}

/// `save_policy` is `Some(update_existing)` when collected days are stored.
fn collect_and_render<L: DocumentLoader>(
    config: &RuntimeConfig,
    collector: &ForecastCollector<L>,
    args: ForecastArgs<'_>,
    save_policy: Option<bool>,
    today: NaiveDate,
) -> Result<String, CliError> {
    let collection = collector.collect_forecast_on(
        args.location,
        args.window.since(),
        args.window.until(),
        today,
    );
    if !collection.has_data() && !collection.trace().is_empty() {
        return Err(map_app_error(
            AppError::runtime_with_trace("no forecast data collected", collection.trace()),
            ERROR_CODE_RUNTIME_SOURCE,
        ));
    }

    if let Some(update_existing) = save_policy {
        let mut store = JsonFileStore::in_dir(&config.store_dir);
        for forecast in collection.forecasts() {
            let record = StoredForecast::from_forecast(&collection.city, forecast);
            let outcome = save_forecast(&mut store, record, update_existing)
                .map_err(|error| map_app_error(error.into(), ERROR_CODE_RUNTIME_STORE))?;
            match outcome {
                SaveOutcome::SkippedIncomplete(field) => {
                    debug!("{}: not stored, missing {field}", forecast.date());
                }
                outcome => debug!("{}: {outcome:?}", forecast.date()),
            }
        }
        info!("saved forecast to {}", store.path().display());
    }

    if args.json {
        render_json_envelope("meteo.forecast", &collection.to_output())
    } else {
        Ok(render::forecast_report(
            &collection.city.display_name,
            collection.forecasts(),
        ))
    }
}

fn read_stored_forecast<L: DocumentLoader>(
    config: &RuntimeConfig,
    collector: &ForecastCollector<L>,
    args: ForecastArgs<'_>,
) -> Result<String, CliError> {
    let (city, catalog_event) = collector.resolve_city(args.location);
    let store = JsonFileStore::in_dir(&config.store_dir);
    let forecasts: Vec<_> = store
        .period(&city.id, args.window.since(), args.window.until())
        .map_err(|error| map_app_error(error.into(), ERROR_CODE_RUNTIME_STORE))?
        .iter()
        .map(StoredForecast::to_forecast)
        .collect();

    if args.json {
        let output = ForecastOutput {
            forecast: forecasts.iter().map(|day| day.to_output_day()).collect(),
            trace: catalog_event.into_iter().collect(),
            city,
        };
        render_json_envelope("meteo.forecast", &output)
    } else {
        Ok(render::forecast_report(&city.display_name, &forecasts))
    }
}

fn list_cities<L: DocumentLoader>(
    collector: &ForecastCollector<L>,
    json: bool,
) -> Result<String, CliError> {
    let catalog = collector
        .catalog()
        .map_err(|error| map_app_error(error.into(), ERROR_CODE_RUNTIME_SOURCE))?;
    if json {
        render_json_envelope("meteo.cities", &json!({ "cities": catalog.entries() }))
    } else {
        Ok(render::catalog_listing(catalog.entries()))
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, CliError> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| {
            CliError::user(
                ERROR_CODE_USER_INVALID_INPUT,
                format!("invalid date '{trimmed}': expected dd.mm.yyyy or yyyy-mm-dd"),
            )
        })
}

fn render_json_envelope<T: serde::Serialize>(command: &str, output: &T) -> Result<String, CliError> {
    let result = serde_json::to_value(output).map_err(|error| {
        CliError::runtime(
            ERROR_CODE_RUNTIME_SERIALIZE,
            format!("failed to serialize output: {error}"),
        )
    })?;
    serde_json::to_string(&json!({
        "schema_version": ENVELOPE_SCHEMA_VERSION,
        "command": command,
        "ok": true,
        "result": result,
    }))
    .map_err(|error| {
        CliError::runtime(
            ERROR_CODE_RUNTIME_SERIALIZE,
            format!("failed to serialize output envelope: {error}"),
        )
    })
}

fn error_envelope(command: &str, error: &CliError) -> Value {
    json!({
        "schema_version": ENVELOPE_SCHEMA_VERSION,
        "command": command,
        "ok": false,
        "error": {
            "code": error.code,
            "message": error.message,
            "details": {
                "kind": error_kind_label(error.kind),
                "exit_code": error.exit_code(),
            }
        }
    })
}

fn emit_error(command: &str, json_output: bool, error: &CliError) {
    if !json_output {
        eprintln!("error[{}]: {}", error.code, error.message);
        return;
    }

    let rendered = serde_json::to_string(&error_envelope(command, error)).unwrap_or_else(
        |serialize_error| {
            format!(
                "{{\"schema_version\":\"{}\",\"command\":\"{}\",\"ok\":false,\"error\":{{\"code\":\"{}\",\"message\":\"{}\"}}}}",
                ENVELOPE_SCHEMA_VERSION,
                command,
                ERROR_CODE_RUNTIME_SERIALIZE,
                escape_json_string(&format!(
                    "failed to serialize error envelope: {serialize_error}"
                )),
            )
        },
    );
    println!("{rendered}");
}

fn map_app_error(error: AppError, runtime_code: &'static str) -> CliError {
    match error.kind {
        ErrorKind::User => CliError::user(ERROR_CODE_USER_INVALID_INPUT, error.message),
        ErrorKind::Runtime => CliError::runtime(runtime_code, error.message),
    }
}

fn error_kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::User => "user",
        ErrorKind::Runtime => "runtime",
    }
}

fn escape_json_string(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if c < '\u{20}' => escaped.push_str(&format!("\\u{:04x}", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}
