use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

use arcdream::dsl::grid;
use arcdream::ir::{Grid, Type};
use arcdream::library::{Library, LibrarySnapshot, Primitive, Prior};
use arcdream::recognition::FrequencyModel;
use arcdream::sample::Sampler;
use arcdream::search::{
    run_parallel_explore, Outcome, ParallelConfig, SearchConfig, SearchMode, SearchStatistics,
};
use arcdream::semantics::evaluate;
use arcdream::session::{Session, SessionConfig};

// --- Command Line Arguments ---

#[derive(Parser)]
#[command(name = "arcdream")]
#[command(about = "arcdream - grid program search with library learning")]
#[command(version)]
#[command(subcommand_required = true)]
#[command(arg_required_else_help = true)]
struct Args {
    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// CLI search mode selection
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliMode {
    /// Stop at the first match
    Fast,
    /// Keep searching for the fewest-node match until the budget runs out
    BestEffort,
}

impl From<CliMode> for SearchMode {
    fn from(cli: CliMode) -> Self {
        match cli {
            CliMode::Fast => SearchMode::Fast,
            CliMode::BestEffort => SearchMode::BestEffort,
        }
    }
}

/// CLI primitive set selection
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum CliPrimitives {
    /// fill, rep_t and literals 0-3
    Scenario,
    /// The full grid set: fill, repetition, concatenation, flip, recolor
    #[default]
    Grid,
}

impl CliPrimitives {
    fn primitives(self) -> Vec<Primitive> {
        match self {
            CliPrimitives::Scenario => grid::scenario_primitives(),
            CliPrimitives::Grid => grid::grid_primitives(),
        }
    }
}

#[derive(ClapArgs)]
struct SearchArgs {
    /// Primitive set to search with
    #[arg(long, value_enum, default_value = "grid")]
    primitives: CliPrimitives,
    /// Search mode
    #[arg(long, value_enum, default_value = "fast")]
    mode: CliMode,
    /// Width of each description-length window, in nats
    #[arg(long, default_value = "1.5")]
    gap: f64,
    /// Description length at which the search gives up
    #[arg(long, default_value = "30.0")]
    max_cost: f64,
    /// Maximum tree depth
    #[arg(long, default_value = "8")]
    max_depth: usize,
    /// Wall-clock limit in seconds, per target and for each round of exploration
    #[arg(long)]
    timeout: Option<u64>,
    /// Number of worker threads
    #[arg(long, short = 'j')]
    cores: Option<usize>,
}

impl SearchArgs {
    fn search_config(&self) -> Result<SearchConfig, String> {
        if self.gap <= 0.0 || !self.gap.is_finite() {
            return Err(format!("--gap must be a positive number, got {}", self.gap));
        }
        Ok(SearchConfig::default()
            .with_mode(self.mode.into())
            .with_gap(self.gap)
            .with_max_cost(self.max_cost)
            .with_max_depth(self.max_depth)
            .with_timeout_option(self.timeout.map(Duration::from_secs)))
    }

    fn parallel_config(&self) -> ParallelConfig {
        ParallelConfig::default()
            .with_workers(self.cores.unwrap_or_else(num_cpus::get))
            .with_timeout_option(self.timeout.map(Duration::from_secs))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Search for programs reproducing the given targets
    Explore {
        /// Program whose value becomes a target (repeatable)
        #[arg(long = "program")]
        programs: Vec<String>,
        /// Target grid as nested JSON arrays, frames x rows x columns (repeatable)
        #[arg(long = "grid")]
        grids: Vec<String>,
        /// Library snapshot to search with, saved by `dream --save`
        #[arg(long)]
        library: Option<PathBuf>,

        #[command(flatten)]
        search: SearchArgs,
    },
    /// Sample random targets from the library and learn from solving them
    Dream {
        /// Number of targets to sample
        #[arg(long, default_value = "12")]
        count: usize,
        /// Random seed for the sampled targets
        #[arg(long, default_value = "0")]
        seed: u64,
        /// Maximum depth of sampled programs
        #[arg(long, default_value = "3")]
        dream_depth: usize,
        /// Number of explore/compress rounds
        #[arg(long, default_value = "3")]
        rounds: usize,
        /// Pseudocounts of the frequency recognition model
        #[arg(long, default_value = "1.0")]
        pseudocounts: f64,
        /// Write the learned library snapshot to this file
        #[arg(long)]
        save: Option<PathBuf>,

        #[command(flatten)]
        search: SearchArgs,
    },
}

// --- Target Parsing ---

fn parse_grid(text: &str) -> Result<Grid, Box<dyn std::error::Error>> {
    let frames: Vec<Vec<Vec<u8>>> = serde_json::from_str(text)?;
    Grid::from_frames(frames).ok_or_else(|| format!("ragged grid: {}", text).into())
}

fn program_target(library: &Library, text: &str) -> Result<Grid, Box<dyn std::error::Error>> {
    let program = library.parse(text)?;
    let value = evaluate(library, &program)?;
    value
        .as_grid()
        .cloned()
        .ok_or_else(|| format!("'{}' does not evaluate to a grid", text).into())
}

fn load_library(
    primitives: CliPrimitives,
    path: Option<&Path>,
) -> Result<Library, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let snapshot = LibrarySnapshot::load(path)?;
            let library = snapshot.restore(primitives.primitives())?;
            log::info!(
                "loaded {} primitives ({} discovered) from {}",
                library.len(),
                library.discovered().count(),
                path.display()
            );
            Ok(library)
        }
        None => Ok(Library::new(primitives.primitives())?),
    }
}

// --- Commands ---

fn run_explore(
    programs: &[String],
    grids: &[String],
    library: Option<&Path>,
    search: &SearchArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let library = load_library(search.primitives, library)?;
    let prior = Prior::uniform(&library);
    let search_config = search.search_config()?;
    let parallel_config = search.parallel_config();

    let mut targets = Vec::new();
    for text in programs {
        targets.push(program_target(&library, text)?);
    }
    for text in grids {
        targets.push(parse_grid(text)?);
    }
    if targets.is_empty() {
        let demo = "rep_t(fill(0, 3, 3), 2)";
        println!("No targets given, using the value of {}", demo);
        targets.push(program_target(&library, demo)?);
    }

    println!(
        "Exploring {} targets with {} workers ({} mode)",
        targets.len(),
        parallel_config.num_workers,
        search_config.mode
    );
    let result = run_parallel_explore(
        &library,
        &prior,
        &Type::MAT,
        &targets,
        &search_config,
        &parallel_config,
    );

    for (i, (target, explored)) in targets.iter().zip(&result.results).enumerate() {
        let (frames, height, width) = target.dims();
        match &explored.outcome {
            Outcome::Solved(solution) => println!(
                "[{}] {}x{}x{}: {} ({} nodes, window {}, log p {:.3})",
                i,
                frames,
                height,
                width,
                library.display(&solution.program),
                solution.size,
                solution.window,
                solution.log_prob
            ),
            Outcome::Unsolved(reason) => {
                println!("[{}] {}x{}x{}: unsolved ({})", i, frames, height, width, reason)
            }
        }
    }
    println!(
        "\nSolved {}/{} targets",
        result.solved_count(),
        targets.len()
    );
    print_search_statistics(&result.total_statistics);
    Ok(())
}

struct DreamOptions {
    count: usize,
    seed: u64,
    dream_depth: usize,
    rounds: usize,
    pseudocounts: f64,
    save: Option<PathBuf>,
}

fn run_dream(
    options: &DreamOptions,
    search: &SearchArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if options.pseudocounts <= 0.0 {
        return Err("--pseudocounts must be positive".into());
    }
    let library = Library::new(search.primitives.primitives())?;
    let prior = Prior::uniform(&library);

    let mut sampler =
        Sampler::new(&library, &prior, options.seed).with_max_depth(options.dream_depth);
    let dreams = sampler.dream(&Type::MAT, options.count);
    println!("Sampled {} distinct targets (seed {})", dreams.len(), options.seed);
    for (i, dream) in dreams.iter().enumerate() {
        println!("  [{}] {}", i, library.display(&dream.program));
    }
    let targets: Vec<Grid> = dreams.into_iter().map(|d| d.target).collect();

    let config = SessionConfig::default()
        .with_search(search.search_config()?)
        .with_parallel(search.parallel_config())
        .with_rounds(options.rounds);
    let model = FrequencyModel::new(options.pseudocounts);
    let mut session = Session::new(library, Box::new(model), config);

    for _ in 0..options.rounds {
        let report = session.run_round(&targets)?;
        println!("\n{}", report.format_summary());
    }

    let learned = session.library();
    println!("Discovered primitives:");
    for def in learned.discovered() {
        if let Some(body) = def.body() {
            println!("  {} = {}", def.name, learned.display(body));
        }
    }
    println!("\nSolutions:");
    for entry in session.store().iter() {
        println!("  {} ({} nodes)", learned.display(&entry.program), entry.size());
    }

    if let Some(path) = &options.save {
        LibrarySnapshot::capture(learned).save(path)?;
        println!("\nSaved library to {}", path.display());
    }
    Ok(())
}

fn print_search_statistics(stats: &SearchStatistics) {
    println!("\nSearch Statistics:");
    for line in stats.format_summary().lines() {
        println!("  {}", line);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match args.command {
        Commands::Explore {
            programs,
            grids,
            library,
            search,
        } => run_explore(&programs, &grids, library.as_deref(), &search),
        Commands::Dream {
            count,
            seed,
            dream_depth,
            rounds,
            pseudocounts,
            save,
            search,
        } => {
            let options = DreamOptions {
                count,
                seed,
                dream_depth,
                rounds,
                pseudocounts,
                save,
            };
            run_dream(&options, &search)
        }
    }
}
