use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::{generate, Shell};
use console::style;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use dpb1_match::parsers::groups::parse_group;
use dpb1_match::{
    AlleleTrimmer, CachingImmuneGroupResolver, DetailRace, FrequencyParser, FrequencyTable, GGroupParser, GlStringParser,
    ImmuneGroup, ImmuneGroupParser, ImmuneGroupTable, MatchConfig, MatchGrade, MatchResult,
    MatchService, RecordingObserver, ReportFormat, ReportGenerator, RequestParser, TracingObserver,
};

/// HLA-DPB1 T-cell epitope match probability tool
#[derive(Parser, Debug)]
#[command(
    name = "dpb1-match",
    version,
    about = "HLA-DPB1 T-cell epitope matching between transplant recipients and donors",
    long_about = r#"
Computes the probability distribution of HLA-DPB1 T-cell epitope match grades
between a recipient and a donor from their (possibly ambiguous) GL strings:

- MATCH / PERMISSIVE / HVG_NONPERMISSIVE / GVH_NONPERMISSIVE / UNKNOWN probabilities
- An overall grade, with POTENTIAL and NONPERMISSIVE_UNDEFINED for mixtures
- Race-specific allele frequencies to weight ambiguous typings
"#
)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE", env = "DPB1_MATCH_CONFIG", value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Immune group table (allele, group)
    #[arg(short, long, global = true, value_name = "FILE", value_hint = ValueHint::FilePath)]
    groups: Option<PathBuf>,

    /// Allele frequency table (race, allele, frequency)
    #[arg(short, long, global = true, value_name = "FILE", value_hint = ValueHint::FilePath)]
    frequencies: Option<PathBuf>,

    /// G group table (allele, g_group) applied before trimming alleles
    #[arg(long, global = true, value_name = "FILE", value_hint = ValueHint::FilePath)]
    g_groups: Option<PathBuf>,

    /// Rounding step of reported probabilities
    #[arg(long, global = true)]
    precision: Option<f64>,

    /// Frequency assumed for alleles missing from the frequency table
    #[arg(long, global = true)]
    baseline_frequency: Option<f64>,

    /// Enable verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Match one recipient against one donor
    Match {
        /// Recipient GL string
        #[arg(short, long)]
        recipient: Option<String>,

        /// Recipient race code (default UNK)
        #[arg(long)]
        recipient_race: Option<DetailRace>,

        /// Donor GL string
        #[arg(short, long)]
        donor: Option<String>,

        /// Donor race code (default UNK)
        #[arg(long)]
        donor_race: Option<DetailRace>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: MatchFormat,

        /// Print the per-pair explanation
        #[arg(long)]
        trace: bool,

        /// Prompt for missing values
        #[arg(short, long)]
        interactive: bool,
    },
    /// Match every request of a delimited file in parallel
    Batch {
        /// Request file (id, recipient, recipient_race, donor, donor_race)
        #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
        input: PathBuf,

        /// Output directory for reports
        #[arg(short, long, default_value = "./reports")]
        output: PathBuf,

        /// Report format
        #[arg(long, value_enum, default_value = "all")]
        format: OutputFormat,

        /// Number of threads (0 = auto-detect)
        #[arg(short, long, default_value = "0")]
        threads: usize,
    },
    /// List reference alleles and their immune groups
    Alleles {
        /// Only alleles in these groups (e.g. 1,2 or - for unassigned)
        #[arg(long = "group", value_delimiter = ',')]
        groups: Vec<String>,
    },
    /// List supported race codes
    Races,
    /// Generate shell completions
    Completions { shell: Shell },
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum MatchFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
    Tsv,
    #[default]
    All,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> ReportFormat {
        match format {
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Csv => ReportFormat::Csv,
            OutputFormat::Tsv => ReportFormat::Tsv,
            OutputFormat::All => ReportFormat::All,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Completions { shell } => {
            generate_completions(*shell);
            return Ok(());
        }
        Commands::Races => {
            list_races();
            return Ok(());
        }
        _ => {}
    }

    init_logging(cli.verbose);
    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Match {
            recipient,
            recipient_race,
            donor,
            donor_race,
            format,
            trace,
            interactive,
        } => {
            let request = if interactive {
                prompt_request(recipient, recipient_race, donor, donor_race)?
            } else {
                MatchInput {
                    recipient: recipient.ok_or_else(|| anyhow!("--recipient is required"))?,
                    recipient_race,
                    donor: donor.ok_or_else(|| anyhow!("--donor is required"))?,
                    donor_race,
                }
            };
            run_match(&config, cli.verbose, request, format, trace)
        }
        Commands::Batch {
            input,
            output,
            format,
            threads,
        } => {
            init_thread_pool(threads)?;
            run_batch(&config, cli.verbose, &input, &output, format)
        }
        Commands::Alleles { groups } => list_alleles(&config, &groups),
        Commands::Races | Commands::Completions { .. } => Ok(()),
    }
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

fn list_races() {
    println!("{}", style("Supported Race Codes:").bold().cyan());
    println!();
    for race in DetailRace::ALL {
        println!(
            "  {:<8} {}",
            style(race.code()).green().bold(),
            style(race.description()).dim()
        );
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("dpb1_match={}", level))
        .with_writer(io::stderr)
        .init();
}

fn init_thread_pool(threads: usize) -> Result<()> {
    let num_threads = if threads == 0 {
        num_cpus::get()
    } else {
        threads
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .map_err(|e| anyhow!("Failed to initialize thread pool: {}", e))?;

    Ok(())
}

/// Config file values overridden by command-line flags
fn resolve_config(cli: &Cli) -> Result<MatchConfig> {
    let mut config = match &cli.config {
        Some(path) => MatchConfig::load_from_path(path)?,
        None => MatchConfig::default(),
    };

    if let Some(groups) = &cli.groups {
        config.immune_groups = Some(groups.clone());
    }
    if let Some(frequencies) = &cli.frequencies {
        config.frequencies = Some(frequencies.clone());
    }
    if let Some(g_groups) = &cli.g_groups {
        config.g_groups = Some(g_groups.clone());
    }
    if let Some(precision) = cli.precision {
        config.precision = precision;
    }
    if let Some(baseline) = cli.baseline_frequency {
        config.baseline_frequency = baseline;
    }

    config.validate()?;
    Ok(config)
}

fn load_groups(config: &MatchConfig) -> Result<ImmuneGroupTable> {
    let path = config
        .immune_groups
        .as_ref()
        .ok_or_else(|| anyhow!("No immune group table configured (use --groups or a config file)"))?;
    ImmuneGroupParser::new().parse(path)
}

fn build_service(config: &MatchConfig, verbose: u8) -> Result<MatchService> {
    let groups = load_groups(config)?;

    let frequencies = match &config.frequencies {
        Some(path) => FrequencyParser::new(config.baseline_frequency).parse(path)?,
        None => {
            warn!(
                "No frequency table configured; ambiguous alleles use the baseline frequency {}",
                config.baseline_frequency
            );
            FrequencyTable::new(config.baseline_frequency)
        }
    };

    let service = MatchService::new(
        Arc::new(GlStringParser::new()),
        Arc::new(CachingImmuneGroupResolver::new(groups)),
        Arc::new(frequencies),
        config.precision,
    )?;

    let service = match &config.g_groups {
        Some(path) => {
            let g_groups = GGroupParser::new().parse(path)?;
            service.with_transformer(Arc::new(AlleleTrimmer::with_g_groups(g_groups)))
        }
        None => service,
    };

    // -vvv explains every pair through the log
    if verbose >= 3 {
        Ok(service.with_observer(Arc::new(TracingObserver)))
    } else {
        Ok(service)
    }
}

#[derive(Debug)]
struct MatchInput {
    recipient: String,
    recipient_race: Option<DetailRace>,
    donor: String,
    donor_race: Option<DetailRace>,
}

fn prompt_request(
    recipient: Option<String>,
    recipient_race: Option<DetailRace>,
    donor: Option<String>,
    donor_race: Option<DetailRace>,
) -> Result<MatchInput> {
    println!(
        "{}",
        style("╔══════════════════════════════════════════════════════════════╗").cyan()
    );
    println!(
        "{}",
        style("║          HLA-DPB1 Epitope Matching - Interactive Mode        ║")
            .cyan()
            .bold()
    );
    println!(
        "{}",
        style("╚══════════════════════════════════════════════════════════════╝").cyan()
    );
    println!();

    let theme = ColorfulTheme::default();

    let recipient = match recipient {
        Some(gl) => gl,
        None => Input::<String>::with_theme(&theme)
            .with_prompt("Recipient GL string")
            .interact_text()?,
    };
    let recipient_race = match recipient_race {
        Some(race) => race,
        None => prompt_race(&theme, "Recipient race")?,
    };
    let donor = match donor {
        Some(gl) => gl,
        None => Input::<String>::with_theme(&theme)
            .with_prompt("Donor GL string")
            .interact_text()?,
    };
    let donor_race = match donor_race {
        Some(race) => race,
        None => prompt_race(&theme, "Donor race")?,
    };

    Ok(MatchInput {
        recipient,
        recipient_race: Some(recipient_race),
        donor,
        donor_race: Some(donor_race),
    })
}

fn prompt_race(theme: &ColorfulTheme, prompt: &str) -> Result<DetailRace> {
    let items: Vec<String> = DetailRace::ALL
        .iter()
        .map(|race| format!("{} - {}", race.code(), race.description()))
        .collect();
    let default = DetailRace::ALL
        .iter()
        .position(|race| *race == DetailRace::Unk)
        .unwrap_or(0);

    let idx = Select::with_theme(theme)
        .with_prompt(prompt)
        .default(default)
        .items(&items)
        .interact()?;

    Ok(DetailRace::ALL[idx])
}

fn run_match(
    config: &MatchConfig,
    verbose: u8,
    input: MatchInput,
    format: MatchFormat,
    trace: bool,
) -> Result<()> {
    let recorder = Arc::new(RecordingObserver::new());
    let mut service = build_service(config, verbose)?;
    if trace {
        service = service.with_observer(recorder.clone());
    }

    let result = service
        .get_match_gl(
            &input.recipient,
            input.recipient_race,
            &input.donor,
            input.donor_race,
        )
        .with_context(|| format!("Failed to match {} against {}", input.recipient, input.donor))?;

    match format {
        MatchFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        MatchFormat::Text => print_result(&input, &result),
    }

    if trace {
        println!();
        println!("{}", style("Trace:").bold().cyan());
        for line in recorder.lines() {
            println!("  {}", style(line).dim());
        }
    }

    Ok(())
}

fn print_result(input: &MatchInput, result: &MatchResult) {
    println!(
        "{} {} ({})",
        style("Recipient:").bold(),
        input.recipient,
        input.recipient_race.unwrap_or_default()
    );
    println!(
        "{} {} ({})",
        style("Donor:    ").bold(),
        input.donor,
        input.donor_race.unwrap_or_default()
    );
    println!();

    for grade in MatchGrade::PURE {
        let p = result.probability(grade);
        let line = format!("  {:<20} {:>6.2}", grade.as_str(), p);
        if p > 0.0 {
            println!("{}", style(line).green());
        } else {
            println!("{}", style(line).dim());
        }
    }

    println!();
    println!(
        "{} {}",
        style("Grade:").bold(),
        style(result.grade).yellow().bold()
    );
}

fn run_batch(
    config: &MatchConfig,
    verbose: u8,
    input: &Path,
    output: &Path,
    format: OutputFormat,
) -> Result<()> {
    let service = build_service(config, verbose)?;
    let requests = RequestParser::new().parse(input)?;
    info!("Loaded {} match requests", requests.len());
    info!("Using {} threads", rayon::current_num_threads());

    let pb = ProgressBar::new(requests.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message("Matching...");

    let mut outcomes = Vec::with_capacity(requests.len());
    for chunk in requests.chunks(256) {
        outcomes.extend(service.get_matches(chunk));
        pb.inc(chunk.len() as u64);
    }
    pb.finish_with_message("Matching complete!");

    let generator = ReportGenerator::new(output)?;
    let written = generator.generate(&outcomes, format.into())?;

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut failures = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(result) => *counts.entry(result.grade.to_string()).or_default() += 1,
            Err(_) => failures += 1,
        }
    }

    println!();
    println!("{}", style("Grade Summary:").bold().cyan());
    for (grade, count) in &counts {
        println!("  {:<24} {}", style(grade).green(), count);
    }
    if failures > 0 {
        println!("  {:<24} {}", style("FAILED").red(), failures);
    }

    for path in written {
        println!(
            "\n{} Report saved to: {}",
            style("✓").green().bold(),
            style(path.display()).cyan()
        );
    }

    Ok(())
}

fn list_alleles(config: &MatchConfig, filters: &[String]) -> Result<()> {
    let table = load_groups(config)?;

    let wanted = filters
        .iter()
        .map(|f| {
            parse_group(f)?.ok_or_else(|| anyhow!("Cannot filter on an unknown group: '{}'", f))
        })
        .collect::<Result<Vec<ImmuneGroup>>>()?;

    let rows: Vec<(&str, Option<ImmuneGroup>)> = if wanted.is_empty() {
        table.alleles().collect()
    } else {
        table
            .alleles_in_groups(&wanted)
            .into_iter()
            .map(|(name, group)| (name, Some(group)))
            .collect()
    };

    for (name, group) in rows {
        let group = group.map_or_else(|| "?".to_string(), |g| g.to_string());
        println!("{}\t{}", name, group);
    }

    Ok(())
}
