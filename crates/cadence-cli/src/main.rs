use clap::{CommandFactory, Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cadence", version, about = "Cadence CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Habit and occurrence management
    Habit {
        #[command(subcommand)]
        action: commands::habit::HabitAction,
    },
    /// Task management
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Calendar event management
    Event {
        #[command(subcommand)]
        action: commands::event::EventAction,
    },
    /// Time tracking
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Conflict detection and reordering
    Conflicts {
        #[command(subcommand)]
        action: commands::conflicts::ConflictsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Habit { action } => commands::habit::run(action),
        Commands::Task { action } => commands::task::run(action),
        Commands::Event { action } => commands::event::run(action),
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Conflicts { action } => commands::conflicts::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "cadence", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
