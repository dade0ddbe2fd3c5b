//! Run command implementation

use super::config::RunConfig;
use super::output::{self, OutputFormat};
use anyhow::{Context, Result};
use octofhir_amc_eval::ReportSession;
use octofhir_amc_types::{ItemizationSession, ResultAggregate, TrackedItem, format_timestamp};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::Tabled;

/// Configuration for run command
pub struct RunArgs {
    pub file: PathBuf,
    pub show_items: bool,
    pub verbose: bool,
    pub output_format: Option<String>,
    pub output_file: Option<PathBuf>,
}

/// One line of the results report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct ResultRow {
    #[tabled(rename = "Rule")]
    pub rule_id: String,
    #[tabled(rename = "Population")]
    pub total_population: usize,
    #[tabled(rename = "Denominator")]
    pub denominator: u64,
    #[tabled(rename = "Exclusions")]
    pub exclusions: u64,
    #[tabled(rename = "Numerator")]
    pub numerator: u64,
    #[tabled(rename = "Percentage")]
    pub percentage: String,
}

impl From<&ResultAggregate> for ResultRow {
    fn from(result: &ResultAggregate) -> Self {
        Self {
            rule_id: result.rule_id().to_string(),
            total_population: result.total_population(),
            denominator: result.denominator(),
            exclusions: result.exclusions(),
            numerator: result.numerator(),
            percentage: result.percentage().to_string(),
        }
    }
}

/// One itemized entry as displayed
#[derive(Debug, Clone, PartialEq, Eq, Tabled)]
pub struct ItemRow {
    #[tabled(rename = "Run")]
    pub run_iterator_id: u32,
    #[tabled(rename = "Rule")]
    pub rule_id: String,
    #[tabled(rename = "Subject")]
    pub subject_id: String,
    #[tabled(rename = "Object")]
    pub object_type: String,
    #[tabled(rename = "Begin")]
    pub period_start: String,
    #[tabled(rename = "End")]
    pub period_end: String,
    #[tabled(rename = "Pass")]
    pub pass: u8,
}

impl From<&TrackedItem> for ItemRow {
    fn from(item: &TrackedItem) -> Self {
        Self {
            run_iterator_id: item.run_iterator_id,
            rule_id: item.rule_id.clone(),
            subject_id: item.subject_id.to_string(),
            object_type: item.object_type.to_string(),
            period_start: format_timestamp(item.period_start),
            period_end: format_timestamp(item.period_end),
            pass: item.pass_flag(),
        }
    }
}

/// Report of a whole session
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub results: Vec<ResultRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<TrackedItem>,
}

/// Evaluate every configured rule
///
/// Evaluators are prepared in rule order so run ids follow the
/// configuration, then executed concurrently on the blocking pool.
pub async fn evaluate(config: RunConfig) -> Result<RunReport> {
    let period = config.period().context("Invalid measurement period")?;
    let population = config.population().context("Failed to load population")?;
    let collector = config.collector().context("Invalid object list")?;

    let session = ReportSession::new(Arc::new(config.registry()))
        .with_collector(Arc::new(collector))
        .with_itemization(ItemizationSession::starting_after(config.last_run_id))
        .with_manual_lab_count(config.manual_lab_count)
        .itemized(config.itemize);

    let mut handles = Vec::with_capacity(config.rules.len());
    for rule in &config.rules {
        let mut evaluator = session
            .prepare(rule, population.clone(), period)
            .with_context(|| format!("Failed to prepare rule '{}'", rule.id()))?;
        let rule_id = rule.id().to_string();
        handles.push((
            rule_id,
            tokio::task::spawn_blocking(move || {
                let result = evaluator.execute()?;
                Ok::<_, octofhir_amc_diagnostics::AmcError>((result, evaluator.items()))
            }),
        ));
    }

    let mut report = RunReport::default();
    for (rule_id, handle) in handles {
        let (result, items) = handle
            .await
            .with_context(|| format!("Evaluation of rule '{}' panicked", rule_id))?
            .with_context(|| format!("Evaluation of rule '{}' failed", rule_id))?;
        log::info!("{}", result);
        report.results.push(ResultRow::from(&result));
        report.items.extend(items);
    }

    Ok(report)
}

/// Run a configuration file and print its report
pub async fn run(args: RunArgs) -> Result<()> {
    let config = RunConfig::load(&args.file)?;
    if args.verbose {
        eprintln!(
            "Loaded {} rules and {} subjects from {}",
            config.rules.len(),
            config.subjects.len(),
            args.file.display()
        );
    }

    let mut report = evaluate(config).await?;
    if !args.show_items {
        report.items.clear();
    }

    let format = OutputFormat::parse_or(args.output_format.as_deref(), OutputFormat::Table);
    let content = match format {
        OutputFormat::Json => output::format_json(&report, false)?,
        OutputFormat::JsonPretty => output::format_json(&report, true)?,
        OutputFormat::Table => render_table(&report),
    };
    output::write_output(&content, args.output_file.as_deref())?;

    if args.verbose {
        eprintln!("{}", output::format_success("Evaluation completed"));
    }
    Ok(())
}

fn render_table(report: &RunReport) -> String {
    let mut content = output::format_table(&report.results);
    if !report.items.is_empty() {
        let items: Vec<ItemRow> = report.items.iter().map(ItemRow::from).collect();
        content.push_str("\n\n");
        content.push_str(&output::format_table(&items));
    }
    content
}
