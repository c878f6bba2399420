// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod session;

use adgrid_app::{GridState, SortOrder, campaign_screen};
use adgrid_db::Store;
use anyhow::{Context, Result, anyhow};
use config::Config;
use session::{
    CellEdit, SessionPlan, describe_event, parse_date_arg, parse_edit_arg, parse_filter_arg,
    parse_sort_arg, resolve_range, run_session,
};
use std::env;
use std::path::PathBuf;
use time::{Date, OffsetDateTime};
use tracing::info;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "ADGRID_LOG";

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `adgrid --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;
    init_logging(config.log_level())?;

    let db_path = config.db_path()?;
    let mut store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or ADGRID_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;

    let mut client = adgrid_api::Client::new(config.api_base_url(), config.api_timeout()?)
        .with_context(|| {
            format!(
                "invalid [api] config in {}; fix base_url/timeout values",
                options.config_path.display()
            )
        })?
        .with_token(config.api_token());

    let mut state = GridState::new(campaign_screen()?, config.grid_config()?)
        .with_context(|| format!("invalid [grid] config in {}", options.config_path.display()))?;
    if options.check_only {
        info!(db = %db_path.display(), api = client.base_url(), "startup checks passed");
        return Ok(());
    }

    let now = OffsetDateTime::now_utc();
    let range = resolve_range(options.start, options.end, now.date())?;
    let plan = options.plan(range);
    let output = run_session(&mut state, &plan, &mut client, &mut store, now);
    for line in output.events.iter().filter_map(describe_event) {
        eprintln!("{line}");
    }
    print!("{}", output.table);
    Ok(())
}

/// `ADGRID_LOG` wins over the configured level.
fn init_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|error| anyhow!("invalid log filter {default_level:?}: {error}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow!("install log subscriber: {error}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
    start: Option<Date>,
    end: Option<Date>,
    filters: Vec<(String, Vec<String>)>,
    search: Option<String>,
    sort: Option<(String, SortOrder)>,
    preset: Option<String>,
    save_preset: Option<String>,
    hide: Vec<String>,
    show: Vec<String>,
    edit: Option<CellEdit>,
}

impl CliOptions {
    fn new(config_path: PathBuf) -> Self {
        Self {
            config_path,
            print_config_path: false,
            print_example: false,
            check_only: false,
            show_help: false,
            start: None,
            end: None,
            filters: Vec::new(),
            search: None,
            sort: None,
            preset: None,
            save_preset: None,
            hide: Vec::new(),
            show: Vec::new(),
            edit: None,
        }
    }

    fn plan(&self, range: adgrid_app::DateRange) -> SessionPlan {
        SessionPlan {
            filters: self.filters.clone(),
            search: self.search.clone(),
            sort: self.sort.clone(),
            preset: self.preset.clone(),
            save_preset: self.save_preset.clone(),
            hide: self.hide.clone(),
            show: self.show.clone(),
            edit: self.edit.clone(),
            ..SessionPlan::new(range)
        }
    }
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions::new(default_config_path);

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let raw = next_value(&mut iter, "--config", "a file path")?;
                options.config_path = PathBuf::from(raw);
            }
            "--start" => {
                let raw = next_value(&mut iter, "--start", "a date")?;
                options.start = Some(parse_date_arg("--start", &raw)?);
            }
            "--end" => {
                let raw = next_value(&mut iter, "--end", "a date")?;
                options.end = Some(parse_date_arg("--end", &raw)?);
            }
            "--filter" => {
                let raw = next_value(&mut iter, "--filter", "col=v1,v2")?;
                options.filters.push(parse_filter_arg(&raw)?);
            }
            "--search" => {
                options.search = Some(next_value(&mut iter, "--search", "a query")?);
            }
            "--sort" => {
                let raw = next_value(&mut iter, "--sort", "a column")?;
                options.sort = Some(parse_sort_arg(&raw)?);
            }
            "--preset" => {
                options.preset = Some(next_value(&mut iter, "--preset", "a preset name")?);
            }
            "--save-preset" => {
                options.save_preset =
                    Some(next_value(&mut iter, "--save-preset", "a preset name")?);
            }
            "--hide" => {
                options.hide.push(next_value(&mut iter, "--hide", "a column")?);
            }
            "--show" => {
                options.show.push(next_value(&mut iter, "--show", "a column")?);
            }
            "--edit" => {
                let raw = next_value(&mut iter, "--edit", "ROW:col=value")?;
                options.edit = Some(parse_edit_arg(&raw)?);
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn next_value<S: AsRef<str>>(
    iter: &mut impl Iterator<Item = S>,
    flag: &str,
    what: &str,
) -> Result<String> {
    iter.next()
        .map(|value| value.as_ref().to_owned())
        .ok_or_else(|| anyhow!("{flag} requires {what}"))
}

fn print_help() {
    println!("adgrid: headless campaign grid");
    println!("  --config <path>          Use a specific config path");
    println!("  --start <YYYY-MM-DD>     First report date to load (default: 6 days before --end)");
    println!("  --end <YYYY-MM-DD>       Last report date to load (default: today)");
    println!("  --filter <col=v1,v2>     Keep rows whose column matches one of the values");
    println!("  --search <text>          Free-text search across all columns");
    println!("  --sort <col[:desc]>      Sort by a column");
    println!("  --preset <name>          Apply a saved column preset");
    println!("  --save-preset <name>     Save the current hidden columns as a preset");
    println!("  --hide <col>             Hide a column");
    println!("  --show <col>             Show a hidden column");
    println!("  --edit <ROW:col=value>   Change one cell and save it");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --check                  Validate config and storage, then exit");
    println!("  --help                   Show this help");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, parse_cli_args};
    use adgrid_app::{RowId, SortOrder};
    use anyhow::Result;
    use std::path::PathBuf;
    use time::macros::date;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/adgrid-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(options, CliOptions::new(default_options_path()));
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_values() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));

        let error = parse_cli_args(vec!["--edit"], default_options_path())
            .expect_err("missing edit value should fail");
        assert!(error.to_string().contains("--edit requires ROW:col=value"));
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn parse_cli_args_collects_session_options() -> Result<()> {
        let options = parse_cli_args(
            vec![
                "--start",
                "2026-02-01",
                "--end",
                "2026-02-07",
                "--filter",
                "advertiser=Acme Media",
                "--filter",
                "publisher=Northwind Ads,Globex",
                "--search",
                "spring",
                "--sort",
                "total_count:desc",
                "--preset",
                "Finance",
                "--hide",
                "notes",
                "--hide",
                "created_at",
                "--show",
                "publisher",
                "--edit",
                "7:notes=call back",
            ],
            default_options_path(),
        )?;
        assert_eq!(options.start, Some(date!(2026 - 02 - 01)));
        assert_eq!(options.end, Some(date!(2026 - 02 - 07)));
        assert_eq!(options.filters.len(), 2);
        assert_eq!(options.filters[1].1, vec!["Northwind Ads", "Globex"]);
        assert_eq!(options.search.as_deref(), Some("spring"));
        assert_eq!(
            options.sort,
            Some(("total_count".to_owned(), SortOrder::Descend))
        );
        assert_eq!(options.preset.as_deref(), Some("Finance"));
        assert_eq!(options.hide, vec!["notes", "created_at"]);
        assert_eq!(options.show, vec!["publisher"]);
        let edit = options.edit.expect("edit parsed");
        assert_eq!(edit.row_id, RowId::new(7));
        assert_eq!(edit.value, "call back");
        Ok(())
    }

    #[test]
    fn parse_cli_args_rejects_bad_dates() {
        let error = parse_cli_args(vec!["--start", "02/01/2026"], default_options_path())
            .expect_err("bad date should fail");
        assert!(error.to_string().contains("--start expects YYYY-MM-DD"));
    }

    #[test]
    fn parse_cli_args_sets_print_and_check_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--print-config-path", "--print-example-config", "--check"],
            default_options_path(),
        )?;
        assert!(options.print_config_path);
        assert!(options.print_example);
        assert!(options.check_only);
        assert!(!options.show_help);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_help_flag_for_long_and_short_variants() -> Result<()> {
        let long = parse_cli_args(vec!["--help"], default_options_path())?;
        assert!(long.show_help);

        let short = parse_cli_args(vec!["-h"], default_options_path())?;
        assert!(short.show_help);
        Ok(())
    }
}
