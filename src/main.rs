use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use suite_runner::coordination::Launcher;
use suite_runner::runner::{RawOptions, RunArgs, Warmup, run_suites};

#[derive(Parser, Clone)]
#[command(about = "Discover, batch and run integration-test suites against a local or external node")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Subcommand)]
enum Command {
    /// Run the test suites found under <ROOT>/suites
    #[command(after_help = "Examples:\n  \
        suite-runner run --network local\n      run all tests using the self-hosted (cosmos) network\n  \
        suite-runner run --network local --allow-tests=test1,test2\n      run only test1 and test2 using the self-hosted network")]
    Run {
        /// Harness root containing suites/ (and node_modules/)
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Network to use: local|external (aliases: cosmos|ganache) [default: local]
        #[arg(short, long)]
        network: Option<String>,

        /// Test batch for parallelized testing, format: <this>-<all> (e.g. 2-3)
        #[arg(short, long)]
        batch: Option<String>,

        /// Only run the specified tests, separated by comma
        #[arg(long)]
        allow_tests: Option<String>,

        /// Print the node's output
        #[arg(long)]
        verbose_log: bool,

        /// How suite scripts are run: yarn, npm, shell
        #[arg(long, default_value = "yarn")]
        launcher: String,

        /// Directory the node is launched from [default: <ROOT>/../..]
        #[arg(long)]
        node_dir: Option<PathBuf>,

        /// Node home directory [default: fresh temporary directory]
        #[arg(long)]
        node_home: Option<PathBuf>,

        /// Shell command starting the node [default: echo y | make localnet]
        #[arg(long)]
        node_command: Option<String>,

        /// Seconds to wait for the node's readiness marker
        #[arg(long, default_value = "50")]
        bootstrap_timeout_secs: u64,

        /// Seconds to wait after the node is ready, before the first suite
        #[arg(long, default_value = "20")]
        warmup_secs: u64,

        /// Instead of a fixed warm-up, wait until the chain reaches this block height
        #[arg(long)]
        wait_for_blocks: Option<u64>,

        /// JSON-RPC endpoint polled by --wait-for-blocks
        #[arg(long, default_value = "http://127.0.0.1:8545")]
        rpc_url: String,

        /// Quiet mode - only warnings and the summary
        #[arg(short, long)]
        quiet: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Run {
            root,
            network,
            batch,
            allow_tests,
            verbose_log,
            launcher,
            node_dir,
            node_home,
            node_command,
            bootstrap_timeout_secs,
            warmup_secs,
            wait_for_blocks,
            rpc_url,
            quiet,
        } => {
            init_tracing(quiet);

            let options = RawOptions {
                network,
                batch,
                allow_tests,
                verbose_log,
            };

            let warmup = match wait_for_blocks {
                Some(min_height) => Warmup::Blocks {
                    rpc_url,
                    min_height,
                },
                None => Warmup::Delay(Duration::from_secs(warmup_secs)),
            };

            let mut run_args = RunArgs::new(root, options);
            run_args.launcher = Launcher::parse(&launcher)?;
            run_args.node_dir = node_dir;
            run_args.node_home = node_home;
            run_args.node_command = node_command;
            run_args.bootstrap_timeout = Duration::from_secs(bootstrap_timeout_secs);
            run_args.warmup = warmup;

            // The node runs in its own process group and never sees a terminal
            // interrupt; dropping the run kills it
            let outcome = tokio::select! {
                outcome = run_suites(run_args) => outcome?,
                _ = tokio::signal::ctrl_c() => anyhow::bail!("Interrupted"),
            };

            println!();
            println!("Run Summary");
            println!("===========");
            println!("Run ID: {}", outcome.run_id);
            println!("Network: {}", outcome.network);
            println!("Suites passed: {}", outcome.suites_passed);
            println!("Duration: {:.2}s", outcome.duration.as_secs_f64());
            if let Some((suite, duration)) = &outcome.slowest_suite {
                println!("Slowest suite: {} ({:.2}s)", suite, duration.as_secs_f64());
            }
        }
    }
    Ok(())
}

fn init_tracing(quiet: bool) {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let filter = if quiet {
        EnvFilter::new("suite_runner=warn")
    } else {
        EnvFilter::new("suite_runner=info")
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
