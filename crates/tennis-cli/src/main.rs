use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tennis_analysis::clusters::{intransitive_clusters, IntransitiveCluster};
use tennis_analysis::devig::devig_table;
use tennis_analysis::features::{feature_reports, FeatureReport};
use tennis_analysis::metrics::{
    aligned_rows, cumulative_pnl, evaluate_sources_with, samples_for, validate_kelly_fraction,
    SourceMetrics, DEFAULT_KELLY_FRACTION,
};
use tennis_analysis::misses::{frequent_players_in_misses, PlayerCount, DEFAULT_TOP_PLAYERS};
use tennis_analysis::scenarios::{
    advantage_boxes, analyze_scenarios, probability_boxes, summarize_partitions, AdvantageBox,
    LoopComparison, ProbabilityBox, ProbabilityKind, ScenarioAnalysis, ScenarioCase,
    ScenarioSources, DEFAULT_BASELINE_SOURCE, DEFAULT_MODEL_SOURCE,
};
use tennis_analysis::stats::{BoxStats, Description};
use tennis_analysis::win_graph::WinGraph;
use tennis_data::matches::{
    filter_records, load_matches, FilterStats, HistoricalMatch, MatchFilter, DEFAULT_LEVELS,
    DEFAULT_SURFACE,
};
use tennis_data::merge::merge_match_odds_with;
use tennis_data::players::{ChainResolver, PlayerDirectory};
use tennis_data::table::{PredictionTable, COL_MARKET_PROB, PROB_SUFFIX};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// Directory for discrepancy CSVs when none is given.
const DEFAULT_OUTPUT_DIR: &str = "analysis_output";

/// Probability column used for the cumulative PnL series when none is given.
const DEFAULT_PNL_SOURCE: &str = "model_prob";

#[derive(Debug, Clone)]
struct AppContext {
    output_dir: PathBuf,
}

#[derive(Parser, Debug)]
#[command(name = "tennis-lab")]
#[command(about = "Tennis prediction analysis toolkit")]
#[command(version)]
struct Cli {
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Directory for generated CSV files.
    #[arg(long, global = true, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Attach outcomes and closing odds from the match history to predictions.
    Merge(MergeArgs),
    /// Write Shin-implied market probabilities (`ps_prob`) from PSA/PSB.
    Devig(DevigArgs),
    /// Score probability sources: accuracy, Brier, ROI, JS divergence.
    Evaluate(EvaluateArgs),
    /// Compare intransitive-loop involvement of model vs baseline discrepancies.
    Loops(LoopsArgs),
    /// List strongly connected groups of the win graph.
    Clusters(ClustersArgs),
    /// Summarize player height and handedness in discrepancy cases.
    Features(FeaturesArgs),
    /// Most frequent players where every baseline was right and the model wrong.
    Misses(MissesArgs),
}

/// Analysis window applied to the match history.
#[derive(Args, Debug, Clone)]
struct WindowArgs {
    /// First included match date (YYYY-MM-DD).
    #[arg(long, default_value_t = MatchFilter::default().start)]
    start: NaiveDate,

    /// Last included match date (YYYY-MM-DD).
    #[arg(long, default_value_t = MatchFilter::default().end)]
    end: NaiveDate,

    /// Court surface; `any` accepts every surface.
    #[arg(long, default_value = DEFAULT_SURFACE)]
    surface: String,

    /// Tournament level, repeatable. Defaults to Grand Slam and Masters 1000;
    /// `any` accepts every level.
    #[arg(long = "level")]
    levels: Vec<String>,
}

impl WindowArgs {
    fn to_filter(&self) -> Result<MatchFilter> {
        let surface = (!self.surface.trim().eq_ignore_ascii_case("any"))
            .then(|| self.surface.trim().to_string());
        let levels: BTreeSet<String> = if self.levels.is_empty() {
            DEFAULT_LEVELS.iter().map(|l| l.to_string()).collect()
        } else if self.levels.iter().any(|l| l.trim().eq_ignore_ascii_case("any")) {
            BTreeSet::new()
        } else {
            self.levels.iter().map(|l| l.trim().to_string()).collect()
        };
        MatchFilter::new(self.start, self.end, surface, levels)
    }
}

#[derive(Args, Debug)]
struct MergeArgs {
    #[arg(long, env = "TENNIS_PREDS")]
    preds: PathBuf,

    #[arg(long, env = "TENNIS_MATCHES")]
    matches: PathBuf,

    /// Output file; defaults to rewriting `--preds`.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DevigArgs {
    #[arg(long, env = "TENNIS_PREDS")]
    preds: PathBuf,

    /// Output file; defaults to rewriting `--preds`.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    #[arg(long, env = "TENNIS_PREDS")]
    preds: PathBuf,

    /// Probability column to score, repeatable. Defaults to every `*_prob` column.
    #[arg(long = "source")]
    sources: Vec<String>,

    /// Reference column for the JS divergence.
    #[arg(long, default_value = COL_MARKET_PROB)]
    reference: String,

    /// Fractional Kelly multiplier in (0, 1].
    #[arg(long, default_value_t = DEFAULT_KELLY_FRACTION)]
    kelly_fraction: f64,

    /// Source whose cumulative PnL is written with `--pnl-out`.
    #[arg(long, default_value = DEFAULT_PNL_SOURCE)]
    pnl_source: String,

    /// CSV file for the cumulative flat/Kelly PnL series.
    #[arg(long)]
    pnl_out: Option<PathBuf>,

    /// Output format: table (default), json or csv.
    #[arg(long, default_value = "table")]
    output: String,
}

#[derive(Args, Debug)]
struct LoopsArgs {
    #[arg(long, env = "TENNIS_PREDS")]
    preds: PathBuf,

    #[arg(long, env = "TENNIS_MATCHES")]
    matches: PathBuf,

    #[command(flatten)]
    window: WindowArgs,

    #[arg(long, default_value = DEFAULT_MODEL_SOURCE)]
    model: String,

    #[arg(long, default_value = DEFAULT_BASELINE_SOURCE)]
    baseline: String,

    /// Output format: table (default) or json.
    #[arg(long, default_value = "table")]
    output: String,
}

#[derive(Args, Debug)]
struct ClustersArgs {
    #[arg(long, env = "TENNIS_MATCHES")]
    matches: PathBuf,

    #[command(flatten)]
    window: WindowArgs,

    /// Output format: table (default) or json.
    #[arg(long, default_value = "table")]
    output: String,
}

#[derive(Args, Debug)]
struct FeaturesArgs {
    #[arg(long, env = "TENNIS_PREDS")]
    preds: PathBuf,

    /// Player directory CSV (`player_name`, `height`, `righthanded`).
    #[arg(long, env = "TENNIS_PLAYERS")]
    players: PathBuf,

    #[arg(long, default_value = DEFAULT_MODEL_SOURCE)]
    model: String,

    #[arg(long, default_value = DEFAULT_BASELINE_SOURCE)]
    baseline: String,

    /// Output format: table (default) or json.
    #[arg(long, default_value = "table")]
    output: String,
}

#[derive(Args, Debug)]
struct MissesArgs {
    #[arg(long, env = "TENNIS_PREDS")]
    preds: PathBuf,

    #[arg(long, default_value = DEFAULT_MODEL_SOURCE)]
    model: String,

    /// Baseline column, repeatable. Defaults to welo_prob, bt_prob and ps_prob.
    #[arg(long = "baseline")]
    baselines: Vec<String>,

    #[arg(long, default_value_t = DEFAULT_TOP_PLAYERS)]
    top: usize,

    /// Output format: table (default) or json.
    #[arg(long, default_value = "table")]
    output: String,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    let ctx = AppContext {
        output_dir: cli.output_dir,
    };

    match cli.command {
        Commands::Merge(args) => handle_merge(args),
        Commands::Devig(args) => handle_devig(args),
        Commands::Evaluate(args) => handle_evaluate(args),
        Commands::Loops(args) => handle_loops(&ctx, args),
        Commands::Clusters(args) => handle_clusters(args),
        Commands::Features(args) => handle_features(args),
        Commands::Misses(args) => handle_misses(args),
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    /// Parses `raw`, accepting only the listed formats.
    fn parse(raw: &str, allowed: &[OutputFormat]) -> Result<Self> {
        let format = match raw.to_lowercase().as_str() {
            "table" => Some(Self::Table),
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        };
        format.filter(|f| allowed.contains(f)).ok_or_else(|| {
            let names: Vec<&str> = allowed.iter().map(|f| f.name()).collect();
            eyre!(
                "unknown output format '{}'; use {}",
                raw,
                names
                    .iter()
                    .map(|n| format!("'{n}'"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
    }

    fn name(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

fn handle_merge(args: MergeArgs) -> Result<()> {
    let mut table = PredictionTable::load(&args.preds)?;
    let history = load_matches(&args.matches)?;
    let odds: Vec<_> = history.iter().filter_map(HistoricalMatch::odds).collect();

    let pb = progress_bar(table.len(), "rows")?;
    let report = merge_match_odds_with(&mut table, &odds, |_| pb.inc(1));
    pb.finish_and_clear();
    let out = args.out.as_deref().unwrap_or(&args.preds);
    table.save(out)?;

    println!(
        "Merged {} of {} rows (A won: {}, B won: {}) into {}",
        report.matched(),
        table.len(),
        report.a_won,
        report.b_won,
        out.display()
    );

    if !report.unmatched.is_empty() {
        let mut unmatched = Table::new();
        unmatched.load_preset(UTF8_BORDERS_ONLY);
        unmatched.set_header(vec!["A", "B"]);
        for (a, b) in &report.unmatched {
            unmatched.add_row(vec![a.as_str(), b.as_str()]);
        }
        println!("\nRows without a historical result ({}):", report.unmatched.len());
        println!("{}", unmatched);
    }

    info!(
        matched = report.matched(),
        unmatched = report.unmatched.len(),
        "merge command completed"
    );
    Ok(())
}

fn handle_devig(args: DevigArgs) -> Result<()> {
    let mut table = PredictionTable::load(&args.preds)?;
    let report = devig_table(&mut table);
    let out = args.out.as_deref().unwrap_or(&args.preds);
    table.save(out)?;

    println!(
        "Wrote {} to {} rows ({} left blank) in {}",
        COL_MARKET_PROB,
        report.filled,
        report.blank,
        out.display()
    );
    Ok(())
}

fn handle_evaluate(args: EvaluateArgs) -> Result<()> {
    let fraction = validate_kelly_fraction(args.kelly_fraction)?;
    let format = OutputFormat::parse(
        &args.output,
        &[OutputFormat::Table, OutputFormat::Json, OutputFormat::Csv],
    )?;

    let table = PredictionTable::load(&args.preds)?;
    let sources: Vec<String> = if args.sources.is_empty() {
        table
            .headers()
            .iter()
            .filter(|h| h.ends_with(PROB_SUFFIX))
            .cloned()
            .collect()
    } else {
        args.sources.clone()
    };
    let rows = table.prediction_rows();

    let pb = progress_bar(sources.len(), "sources")?;
    let metrics = evaluate_sources_with(&rows, &sources, &args.reference, fraction, |_| pb.inc(1));
    pb.finish_and_clear();
    let metrics = metrics?;
    if metrics.iter().all(|m| m.samples == 0) {
        return Err(eyre!(
            "no rows carry Awin, PSA, PSB, {} and every evaluated source",
            args.reference
        ));
    }

    match format {
        OutputFormat::Table => print_metrics_table(&metrics, &args.reference),
        OutputFormat::Json => print_json(&metrics)?,
        OutputFormat::Csv => print_metrics_csv(&metrics)?,
    }

    if let Some(path) = &args.pnl_out {
        let mut required = sources.clone();
        if !required.contains(&args.pnl_source) {
            required.push(args.pnl_source.clone());
        }
        let aligned = aligned_rows(&rows, &required, &args.reference);
        let samples = samples_for(&aligned, &args.pnl_source, &args.reference);
        let series = cumulative_pnl(&samples, fraction);
        write_csv(path, &series)?;
        println!(
            "Cumulative PnL for {} ({} bets) written to {}",
            args.pnl_source,
            samples.len(),
            path.display()
        );
    }

    info!(
        sources = metrics.len(),
        output = %args.output,
        "evaluate command completed"
    );
    Ok(())
}

fn color_signed(value: f64) -> &'static str {
    if value > 0.0 {
        "\x1b[32m" // Green
    } else if value < 0.0 {
        "\x1b[31m" // Red
    } else {
        ""
    }
}

const COLOR_RESET: &str = "\x1b[0m";

fn print_metrics_table(metrics: &[SourceMetrics], reference: &str) {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec![
        "Source".to_string(),
        "Rows".to_string(),
        "Accuracy".to_string(),
        "Brier".to_string(),
        "ROI (unit)".to_string(),
        "ROI (Kelly)".to_string(),
        format!("JS div ({reference})"),
    ]);

    for m in metrics {
        let roi = |value: f64| {
            let color = color_signed(value);
            if color.is_empty() {
                format!("{value:.3}")
            } else {
                format!("{color}{value:.3}{COLOR_RESET}")
            }
        };
        table.add_row(vec![
            m.source.clone(),
            m.samples.to_string(),
            format!("{:.3}", m.accuracy),
            format!("{:.3}", m.brier),
            roi(m.roi_unit),
            roi(m.roi_kelly),
            format!("{:.4}", m.js_divergence),
        ]);
    }

    println!("{}", table);
}

fn print_metrics_csv(metrics: &[SourceMetrics]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    for m in metrics {
        writer.serialize(m).wrap_err("failed to write metrics CSV")?;
    }
    writer.flush().wrap_err("failed to flush metrics CSV")?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json_str = serde_json::to_string_pretty(value).wrap_err("failed to serialize JSON")?;
    println!("{}", json_str);
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)
        .wrap_err_with(|| format!("failed to create {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;
    }
    writer.flush().wrap_err("failed to flush CSV writer")?;
    Ok(())
}

fn spinner() -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .wrap_err("failed to create progress style")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn progress_bar(len: usize, unit: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::with_template(&format!(
            "{{spinner:.green}} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {unit}"
        ))
        .wrap_err("failed to create progress style")?,
    );
    Ok(pb)
}

/// Loads the match history and builds the win graph over `window`.
fn build_win_graph(
    matches: &Path,
    window: &WindowArgs,
    pb: &ProgressBar,
) -> Result<(WinGraph, FilterStats)> {
    let filter = window.to_filter()?;

    pb.set_message(format!("loading {}", matches.display()));
    let history = load_matches(matches)?;

    pb.set_message("building win graph");
    let (records, stats) = filter_records(&history, &filter);
    if stats.kept == 0 {
        tracing::warn!(
            start = %filter.start,
            end = %filter.end,
            "no historical matches inside the window; every loop query will be empty"
        );
    }
    Ok((WinGraph::build(&records), stats))
}

#[derive(Debug, Serialize)]
struct GraphSummary {
    matches_in_window: usize,
    players: usize,
    edges: usize,
}

impl GraphSummary {
    fn new(graph: &WinGraph, stats: &FilterStats) -> Self {
        Self {
            matches_in_window: stats.kept,
            players: graph.player_count(),
            edges: graph.edge_count(),
        }
    }
}

fn handle_loops(ctx: &AppContext, args: LoopsArgs) -> Result<()> {
    let format = OutputFormat::parse(&args.output, &[OutputFormat::Table, OutputFormat::Json])?;

    let pb = spinner()?;
    let (graph, stats) = build_win_graph(&args.matches, &args.window, &pb)?;

    pb.set_message("querying intransitive loops");
    let rows = PredictionTable::load(&args.preds)?.prediction_rows();
    let sources = ScenarioSources {
        model: args.model.clone(),
        baseline: args.baseline.clone(),
    };
    let analysis = analyze_scenarios(&graph, &rows, &sources);
    let comparison = summarize_partitions(&analysis);
    let prob_boxes = probability_boxes(&analysis);
    let adv_boxes = advantage_boxes(&analysis);

    pb.set_message("writing discrepancy files");
    let files = write_discrepancy_files(&ctx.output_dir, &analysis, &sources)?;
    pb.finish_and_clear();

    let summary = GraphSummary::new(&graph, &stats);
    match format {
        OutputFormat::Table => print_loops_table(
            &summary,
            &analysis,
            &comparison,
            &prob_boxes,
            &adv_boxes,
            &sources,
        ),
        _ => {
            #[derive(Serialize)]
            struct JsonOutput<'a> {
                graph: &'a GraphSummary,
                analysed_rows: usize,
                skipped_rows: usize,
                comparison: &'a LoopComparison,
                verdict: &'static str,
                probability_boxes: &'a [ProbabilityBox],
                advantage_boxes: &'a [AdvantageBox],
                files: Vec<String>,
            }

            print_json(&JsonOutput {
                graph: &summary,
                analysed_rows: analysis.rows.len(),
                skipped_rows: analysis.skipped,
                comparison: &comparison,
                verdict: comparison.verdict.describe(),
                probability_boxes: &prob_boxes,
                advantage_boxes: &adv_boxes,
                files: files.iter().map(|p| p.display().to_string()).collect(),
            })?;
        }
    }

    if format == OutputFormat::Table {
        for path in &files {
            println!("Discrepancy rows written to {}", path.display());
        }
    }

    info!(
        analysed = analysis.rows.len(),
        skipped = analysis.skipped,
        files = files.len(),
        "loops command completed"
    );
    Ok(())
}

fn discrepancy_file_name(case: ScenarioCase) -> &'static str {
    match case {
        ScenarioCase::ModelOnlyCorrect => "model_only_correct_loops.csv",
        ScenarioCase::BaselineOnlyCorrect => "baseline_only_correct_loops.csv",
        ScenarioCase::BothCorrect => "both_correct_loops.csv",
        ScenarioCase::BothIncorrect => "both_incorrect_loops.csv",
    }
}

/// Writes one CSV per non-empty discrepancy partition.
fn write_discrepancy_files(
    dir: &Path,
    analysis: &ScenarioAnalysis,
    sources: &ScenarioSources,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for case in [ScenarioCase::ModelOnlyCorrect, ScenarioCase::BaselineOnlyCorrect] {
        let rows: Vec<_> = analysis.case_rows(case).collect();
        if rows.is_empty() {
            info!(case = %case, "no rows in partition; skipping file");
            continue;
        }

        let path = dir.join(discrepancy_file_name(case));
        std::fs::create_dir_all(dir)
            .wrap_err_with(|| format!("failed to create {}", dir.display()))?;
        let mut writer = csv::Writer::from_path(&path)
            .wrap_err_with(|| format!("failed to create {}", path.display()))?;
        writer
            .write_record([
                "A",
                "B",
                sources.model.as_str(),
                sources.baseline.as_str(),
                "Awin",
                "prob_diff",
                "involved_in_loop",
                "intransitive_loops",
            ])
            .wrap_err("failed to write discrepancy header")?;

        for row in rows {
            writer
                .write_record([
                    row.a.clone(),
                    row.b.clone(),
                    row.model_prob.to_string(),
                    row.baseline_prob.to_string(),
                    if row.a_won { "1" } else { "0" }.to_string(),
                    row.probability_advantage().to_string(),
                    row.involved().to_string(),
                    row.evidence.describe(),
                ])
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
        }
        writer
            .flush()
            .wrap_err_with(|| format!("failed to flush {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

fn box_cells(stats: &BoxStats) -> Vec<String> {
    vec![
        stats.count.to_string(),
        format!("{:.3}", stats.min),
        format!("{:.3}", stats.q1),
        format!("{:.3}", stats.median),
        format!("{:.3}", stats.q3),
        format!("{:.3}", stats.max),
    ]
}

fn involvement_label(involved: bool) -> &'static str {
    if involved {
        "Involved"
    } else {
        "Not involved"
    }
}

fn print_loops_table(
    summary: &GraphSummary,
    analysis: &ScenarioAnalysis,
    comparison: &LoopComparison,
    prob_boxes: &[ProbabilityBox],
    adv_boxes: &[AdvantageBox],
    sources: &ScenarioSources,
) {
    println!(
        "Win graph: {} matches in window, {} players, {} edges",
        summary.matches_in_window, summary.players, summary.edges
    );
    println!(
        "Prediction rows analysed: {} ({} skipped)\n",
        analysis.rows.len(),
        analysis.skipped
    );

    let mut scenarios = Table::new();
    scenarios.load_preset(UTF8_BORDERS_ONLY);
    scenarios.set_header(vec!["Scenario", "Rows", "Involved in loop", "Share"]);
    for case in ScenarioCase::ALL {
        let rows: Vec<_> = analysis.case_rows(case).collect();
        let involved = rows.iter().filter(|r| r.involved()).count();
        let share = if rows.is_empty() {
            0.0
        } else {
            involved as f64 / rows.len() as f64 * 100.0
        };
        scenarios.add_row(vec![
            case.label().to_string(),
            rows.len().to_string(),
            involved.to_string(),
            format!("{share:.1}%"),
        ]);
    }
    println!("{}\n", scenarios);

    println!("Loop involvement comparison:");
    println!(
        "  {} only correct: {}/{} ({:.1}%)",
        sources.model,
        comparison.model_only.involved,
        comparison.model_only.total,
        comparison.model_only.percent
    );
    println!(
        "  {} only correct: {}/{} ({:.1}%)",
        sources.baseline,
        comparison.baseline_only.involved,
        comparison.baseline_only.total,
        comparison.baseline_only.percent
    );
    println!("  Verdict: {:?}, {}\n", comparison.verdict, comparison.verdict.describe());

    if !prob_boxes.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec![
            "Loop", "Scenario", "Source", "n", "min", "q1", "median", "q3", "max",
        ]);
        for b in prob_boxes {
            let source = match b.kind {
                ProbabilityKind::Model => sources.model.as_str(),
                ProbabilityKind::Baseline => sources.baseline.as_str(),
            };
            let mut cells = vec![
                involvement_label(b.involved).to_string(),
                b.case.label().to_string(),
                source.to_string(),
            ];
            cells.extend(box_cells(&b.stats));
            table.add_row(cells);
        }
        println!("Probability distributions:");
        println!("{}\n", table);
    }

    if !adv_boxes.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Loop", "n", "min", "q1", "median", "q3", "max"]);
        for b in adv_boxes {
            let mut cells = vec![involvement_label(b.involved).to_string()];
            cells.extend(box_cells(&b.stats));
            table.add_row(cells);
        }
        println!(
            "Winner-probability advantage of {} over {} ({} only correct):",
            sources.model, sources.baseline, sources.model
        );
        println!("{}\n", table);
    }
}

fn handle_clusters(args: ClustersArgs) -> Result<()> {
    let format = OutputFormat::parse(&args.output, &[OutputFormat::Table, OutputFormat::Json])?;

    let pb = spinner()?;
    let (graph, stats) = build_win_graph(&args.matches, &args.window, &pb)?;
    pb.set_message("detecting clusters");
    let clusters = intransitive_clusters(&graph);
    pb.finish_and_clear();

    match format {
        OutputFormat::Table => print_clusters_table(&GraphSummary::new(&graph, &stats), &clusters),
        _ => print_json(&clusters)?,
    }

    info!(clusters = clusters.len(), "clusters command completed");
    Ok(())
}

fn print_clusters_table(summary: &GraphSummary, clusters: &[IntransitiveCluster]) {
    println!(
        "Win graph: {} matches in window, {} players, {} edges",
        summary.matches_in_window, summary.players, summary.edges
    );
    if clusters.is_empty() {
        println!("No intransitive clusters: results in the window are fully transitive.");
        return;
    }

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["#", "Players", "Internal edges", "Members"]);
    for (i, cluster) in clusters.iter().enumerate() {
        let members: Vec<&str> = cluster.players.iter().map(|p| p.as_str()).collect();
        table.add_row(vec![
            (i + 1).to_string(),
            cluster.size().to_string(),
            cluster.edge_count.to_string(),
            members.join(", "),
        ]);
    }
    println!("{}", table);
}

fn handle_features(args: FeaturesArgs) -> Result<()> {
    let format = OutputFormat::parse(&args.output, &[OutputFormat::Table, OutputFormat::Json])?;

    let rows = PredictionTable::load(&args.preds)?.prediction_rows();
    let directory = PlayerDirectory::load(&args.players)?;
    let sources = ScenarioSources {
        model: args.model.clone(),
        baseline: args.baseline.clone(),
    };
    let reports = feature_reports(&rows, &sources, &directory, &ChainResolver::default());

    match format {
        OutputFormat::Table => {
            for report in &reports {
                print_feature_report(report);
            }
        }
        _ => print_json(&reports)?,
    }

    info!(partitions = reports.len(), "features command completed");
    Ok(())
}

fn description_cells(d: &Description) -> Vec<(&'static str, String)> {
    vec![
        ("count", d.count.to_string()),
        ("mean", format!("{:.2}", d.mean)),
        ("std", d.std.map_or("-".to_string(), |s| format!("{s:.2}"))),
        ("min", format!("{:.2}", d.min)),
        ("25%", format!("{:.2}", d.q1)),
        ("50%", format!("{:.2}", d.median)),
        ("75%", format!("{:.2}", d.q3)),
        ("max", format!("{:.2}", d.max)),
    ]
}

fn print_feature_report(report: &FeatureReport) {
    println!("{} ({} rows)", report.case.label(), report.rows);

    match &report.height_diff {
        Some(d) => {
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header(vec!["Height diff (A - B, cm)", "Value"]);
            for (name, value) in description_cells(d) {
                table.add_row(vec![name.to_string(), value]);
            }
            println!("{}", table);
        }
        None => println!("  No rows with both heights known."),
    }

    let mut matchups = Table::new();
    matchups.load_preset(UTF8_BORDERS_ONLY);
    matchups.set_header(vec!["Handedness", "Rows"]);
    for (matchup, count) in &report.matchups {
        matchups.add_row(vec![matchup.label().to_string(), count.to_string()]);
    }
    println!("{}", matchups);

    if !report.unresolved.is_empty() {
        println!(
            "  Players without a complete profile ({}): {}",
            report.unresolved.len(),
            report.unresolved.join(", ")
        );
    }
    if !report.ambiguous.is_empty() {
        println!(
            "  Ambiguous names, not linked ({}): {}",
            report.ambiguous.len(),
            report.ambiguous.join(", ")
        );
    }
    println!();
}

fn handle_misses(args: MissesArgs) -> Result<()> {
    let format = OutputFormat::parse(&args.output, &[OutputFormat::Table, OutputFormat::Json])?;

    let baselines: Vec<String> = if args.baselines.is_empty() {
        vec![
            DEFAULT_BASELINE_SOURCE.to_string(),
            "bt_prob".to_string(),
            COL_MARKET_PROB.to_string(),
        ]
    } else {
        args.baselines.clone()
    };

    let rows = PredictionTable::load(&args.preds)?.prediction_rows();
    let top = frequent_players_in_misses(&rows, &args.model, &baselines, args.top);

    match format {
        OutputFormat::Table => print_misses_table(&top, &args.model, &baselines),
        _ => print_json(&top)?,
    }

    info!(players = top.len(), "misses command completed");
    Ok(())
}

fn print_misses_table(top: &[PlayerCount], model: &str, baselines: &[String]) {
    println!(
        "Most common players where {} was right and {} was wrong:",
        baselines.join(", "),
        model
    );
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Player", "Matches"]);
    for entry in top {
        table.add_row(vec![entry.player.clone(), entry.count.to_string()]);
    }
    println!("{}", table);
}
