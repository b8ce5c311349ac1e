use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, LevelFilter};

use ckkskit::config::{self, BenchmarkConfig, Mode};
use ckkskit::demos::{self, DemoRun};
use ckkskit::polynomial::{self, CoefficientStrategy};
use ckkskit::report::Report;
use ckkskit::trace::{EvalObserver, LogObserver};
use ckkskit::{Channel, ParameterSet, SchemeContext};

#[derive(Parser)]
#[command(name = "ckkskit")]
#[command(about = "CKKS demos and encrypted aggregation benchmarks")]
struct Cli {
    /// Log at debug level, including every evaluator step (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sum random samples under encryption and report the error
    Bench {
        /// TOML file with the benchmark grid
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_delimiter = ',')]
        ring_dimensions: Vec<usize>,

        #[arg(long, value_delimiter = ',')]
        counts: Vec<usize>,

        #[arg(long, value_delimiter = ',')]
        modes: Vec<Mode>,

        #[arg(long, value_delimiter = ',')]
        upper_bounds: Vec<f64>,

        #[arg(long)]
        seed: Option<u64>,

        /// Worker threads for concurrent runs (default: available parallelism)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Encrypt and decrypt one value
    RoundTrip {
        #[arg(allow_negative_numbers = true)]
        value: f64,

        #[arg(long, default_value = "moderate")]
        preset: String,

        /// Override the preset's initial scale
        #[arg(long)]
        scale: Option<f64>,
    },

    /// a·b + c·d on (1, 1, 2, 0)
    Product {
        #[arg(long, default_value = "heavy")]
        preset: String,
    },

    /// Evaluate a sign-approximating polynomial on an encrypted input
    Sign {
        #[arg(long, value_enum, default_value_t = StrategyKind::Lagrange)]
        strategy: StrategyKind,

        /// Number of coefficients (ignored by `cubic`)
        #[arg(long, default_value_t = 3)]
        terms: usize,

        #[arg(long, default_value_t = 0.5, allow_negative_numbers = true)]
        input: f64,

        /// Defaults to the smallest preset deep enough for the polynomial
        #[arg(long)]
        preset: Option<String>,
    },

    /// Mean of encrypted values via rotate-and-sum
    Mean {
        #[arg(long, default_value = "heavy")]
        preset: String,

        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<f64>,
    },

    /// Approximate sign(a - b) with a sign polynomial, for |a - b| <= bound
    Compare {
        #[arg(allow_negative_numbers = true)]
        a: f64,

        #[arg(allow_negative_numbers = true)]
        b: f64,

        #[arg(long, default_value_t = 1.0)]
        bound: f64,

        #[arg(long, value_enum, default_value_t = StrategyKind::Cubic)]
        strategy: StrategyKind,

        /// Number of coefficients (ignored by `cubic`)
        #[arg(long, default_value_t = 3)]
        terms: usize,

        /// Defaults to the smallest preset deep enough for the polynomial
        #[arg(long)]
        preset: Option<String>,
    },

    /// Flag-masked sum: add up the values at the selected indices
    Select {
        #[arg(long, default_value = "heavy")]
        preset: String,

        /// Zero-based indices of the values to add
        #[arg(long, value_delimiter = ',')]
        selected: Vec<usize>,

        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<f64>,
    },

    /// List named parameter sets
    Presets,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyKind {
    Lagrange,
    Chebyshev,
    Cubic,
}

impl StrategyKind {
    fn strategy(self, terms: usize) -> CoefficientStrategy {
        match self {
            StrategyKind::Lagrange => CoefficientStrategy::Lagrange { terms },
            StrategyKind::Chebyshev => CoefficientStrategy::Chebyshev { terms },
            StrategyKind::Cubic => CoefficientStrategy::cubic(),
        }
    }
}

fn polynomial_context(name: Option<String>, coeffs: &[f64]) -> anyhow::Result<SchemeContext> {
    let set = match name {
        Some(name) => config::preset(&name)?,
        None => demos::preset_for_depth(polynomial::depth(coeffs)),
    };
    SchemeContext::new(set).context("Failed to build scheme context")
}

fn print_run(channel: &Channel<'_>, run: &DemoRun) -> anyhow::Result<()> {
    for record in &run.trace {
        println!("  {record}");
    }
    let value = channel
        .decrypt_decode(&run.ciphertext)
        .context("Failed to decrypt demo result")?;
    println!("result   = {value}");
    println!("expected = {}", run.expected);
    println!("error    = {:e}", (value - run.expected).abs());
    Ok(())
}

fn bench(
    config: Option<PathBuf>,
    ring_dimensions: Vec<usize>,
    counts: Vec<usize>,
    modes: Vec<Mode>,
    upper_bounds: Vec<f64>,
    seed: Option<u64>,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    let mut config = match config {
        Some(path) => BenchmarkConfig::load(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => BenchmarkConfig::default(),
    };
    if !ring_dimensions.is_empty() {
        config.ring_dimensions = ring_dimensions;
    }
    if !counts.is_empty() {
        config.sample_counts = counts;
    }
    if !modes.is_empty() {
        config.modes = modes;
    }
    if !upper_bounds.is_empty() {
        config.upper_bounds = upper_bounds;
    }
    config.seed = seed.or(config.seed);
    config.workers = workers.or(config.workers);

    let report = Report::run(&config).context("Invalid benchmark configuration")?;
    print!("{report}");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    pretty_env_logger::formatted_builder()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();
    let observer = cli.verbose.then_some(&LogObserver as &dyn EvalObserver);

    match cli.command {
        Commands::Bench {
            config,
            ring_dimensions,
            counts,
            modes,
            upper_bounds,
            seed,
            workers,
        } => bench(config, ring_dimensions, counts, modes, upper_bounds, seed, workers)?,

        Commands::RoundTrip {
            value,
            preset: name,
            scale,
        } => {
            let mut set = config::preset(&name)?;
            if let Some(scale) = scale {
                set = set.with_scale(scale);
            }
            let context = SchemeContext::new(set).context("Failed to build scheme context")?;
            let mut channel = Channel::new(&context);
            let decoded = channel.round_trip(value).context("Round trip failed")?;
            println!("{value} -> {decoded} (error {:e})", (decoded - value).abs());
        }

        Commands::Product { preset: name } => {
            let context = SchemeContext::from_preset(&name)?;
            let mut channel = Channel::new(&context);
            let run = demos::product_demo(&mut channel, [1.0, 1.0, 2.0, 0.0], observer)?;
            print_run(&channel, &run)?;
        }

        Commands::Sign {
            strategy,
            terms,
            input,
            preset: name,
        } => {
            let coeffs = strategy.strategy(terms).coefficients()?;
            info!("Coefficients: {coeffs:?}");
            let context = polynomial_context(name, &coeffs)?;
            let mut channel = Channel::new(&context);
            let run = demos::sign_demo(&mut channel, &coeffs, input, observer)?;
            print_run(&channel, &run)?;
        }

        Commands::Compare {
            a,
            b,
            bound,
            strategy,
            terms,
            preset: name,
        } => {
            let coeffs = strategy.strategy(terms).coefficients()?;
            let context = polynomial_context(name, &coeffs)?;
            let mut channel = Channel::new(&context);
            let run = demos::compare_demo(&mut channel, a, b, &coeffs, bound, observer)?;
            print_run(&channel, &run)?;
        }

        Commands::Select {
            preset: name,
            selected,
            values,
        } => {
            let context = SchemeContext::from_preset(&name)?;
            let mut channel = Channel::new(&context);
            let run = demos::select_demo(&mut channel, &values, &selected, observer)?;
            print_run(&channel, &run)?;
        }

        Commands::Mean {
            preset: name,
            values,
        } => {
            let context = SchemeContext::builder(config::preset(&name)?)
                .rotation_steps(&demos::mean_rotation_steps(values.len()))
                .build()
                .context("Failed to build scheme context")?;
            let mut channel = Channel::new(&context);
            let run = demos::mean_demo(&mut channel, &values, observer)?;
            print_run(&channel, &run)?;
        }

        Commands::Presets => {
            for name in ParameterSet::PRESET_NAMES {
                if let Some(set) = ParameterSet::named(name) {
                    println!("{name:<10} {set}  depth {}", set.depth());
                }
            }
        }
    }

    Ok(())
}
