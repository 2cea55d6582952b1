use scene_query::config::{AppConfig, DEFAULT_CONFIG_PATH};
use scene_query::errors::*;
use scene_query::logger::{parse_severity, terminal_logger};
use scene_query::pager::{NotificationSink, Pager};
use scene_query::query::QueryRequest;
use scene_query::query_converter::QueryConverter;

#[macro_use]
extern crate scene_query;
#[macro_use]
extern crate slog;

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::io::Read;
use std::time::Instant;

struct StderrSink;

impl NotificationSink for StderrSink {
    fn notify(&mut self, message: &str) {
        eprintln!("note: {}", message);
    }
}

const NO_SORT_NOTICE_FLAG: &str = "--no-sort-notice";

fn read_request(path: Option<&String>) -> ApiResult<String> {
    match path {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut request = String::new();
            std::io::stdin().read_to_string(&mut request)?;
            Ok(request)
        }
    }
}

fn run() -> ApiResult<()> {
    let start = Instant::now();
    let (flags, paths): (Vec<String>, Vec<String>) =
        std::env::args().skip(1).partition(|a| a.starts_with("--"));
    if let Some(flag) = flags.iter().find(|f| f.as_str() != NO_SORT_NOTICE_FLAG) {
        return invalid_data_ae!("unknown flag: {}", flag);
    }

    let mut config = AppConfig::load(DEFAULT_CONFIG_PATH)?;
    let log = terminal_logger(parse_severity(&config.log_level)?)?;
    info!(log, "starting"; "backend" => %config.backend);

    let request = QueryRequest::from_json_str(&read_request(paths.first())?)?;
    let converter = QueryConverter::new(config.backend.strategy());

    let mut gate = config.sort_notice_gate();
    if !flags.is_empty() {
        config.remember_sort_notice_choice(&mut gate, DEFAULT_CONFIG_PATH)?;
        info!(log, "sort notice disabled"; "config" => DEFAULT_CONFIG_PATH);
    }
    gate.on_sort_applied(&converter, &request.query, &mut StderrSink);

    let pager = Pager::new(converter, request.columns, log.clone());
    let plan = pager.plan(None, &request.query)?;
    if let Some(count_query) = plan.count_query {
        println!("{}", count_query);
    }
    println!("{}", plan.data_query);

    debug!(log, "done"; "duration" => ?start.elapsed());
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
