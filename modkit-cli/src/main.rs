// CLI application
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use modkit_cli::commands::{self, LaunchOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "modkit")]
#[command(about = "Mod loader host for the game client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct GameArgs {
    /// Game directory containing the mods folder
    #[arg(short, long, default_value = ".")]
    game_dir: PathBuf,

    /// Profile that enablement choices are recorded under
    #[arg(short, long, default_value = "default")]
    profile: String,
}

#[derive(clap::Args)]
struct HostArgs {
    #[command(flatten)]
    game: GameArgs,

    /// Host class path entries, in order
    #[arg(long = "class-path", value_delimiter = ',')]
    class_path: Vec<PathBuf>,

    /// Location the loader itself was loaded from
    #[arg(long)]
    code_source: Option<PathBuf>,

    /// JSON class index of classes the host can resolve
    #[arg(long)]
    classes: Option<PathBuf>,

    /// Only load these mods for this session
    #[arg(long, value_delimiter = ',')]
    mods: Option<Vec<String>>,

    /// Skip tweak and transformer hooks
    #[arg(long)]
    no_tweaks: bool,
}

impl HostArgs {
    fn into_options(self) -> LaunchOptions {
        let mut options = LaunchOptions::new(self.game.game_dir, self.game.profile);
        options.class_path = self.class_path;
        options.code_source = self.code_source;
        options.class_index = self.classes;
        options.mods = self.mods;
        options.load_tweaks = !self.no_tweaks;
        options
    }
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the full startup sequence and report what would load
    Launch {
        #[command(flatten)]
        host: HostArgs,
    },
    /// Discover packages and hooks without starting the game
    List {
        #[command(flatten)]
        host: HostArgs,
    },
    /// Enable a mod for a profile
    Enable {
        /// Mod identifier
        identifier: String,

        #[command(flatten)]
        game: GameArgs,
    },
    /// Disable a mod for a profile
    Disable {
        /// Mod identifier
        identifier: String,

        #[command(flatten)]
        game: GameArgs,
    },
    /// Show the known loader releases
    Versions,
}

fn main() -> anyhow::Result<()> {
    modkit_core::logging::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Launch { host } => {
            let pb = create_progress_bar("Starting loader...");
            let (core, host) = commands::launch(&host.into_options())?;
            pb.finish_with_message("Startup complete");
            commands::print_launch(&core, &host);
        }
        Commands::List { host } => {
            let pb = create_progress_bar("Discovering packages...");
            let (core, _) = commands::discover(&host.into_options())?;
            pb.finish_with_message("Discovery complete");
            commands::print_discovery(&core);
        }
        Commands::Enable { identifier, game } => {
            commands::set_enabled(&game.game_dir, &game.profile, &identifier, true)?;
        }
        Commands::Disable { identifier, game } => {
            commands::set_enabled(&game.game_dir, &game.profile, &identifier, false)?;
        }
        Commands::Versions => commands::print_versions(),
    }

    modkit_core::logging::detach_file();
    Ok(())
}

fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb
}
