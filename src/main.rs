use clap::Parser;
use color_eyre::Result;
use phitodo::cli::{self, AddArgs, Cli, CliContext, Commands};
use phitodo::service::TaskService;
use phitodo::{Config, Database, Profile, logging, utils};
use std::path::PathBuf;

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    let cli = Cli::parse();

    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    let config_path = match cli.config {
        Some(ref path) => utils::expand_path(path),
        None => Config::get_config_path(profile)?,
    };
    let mut config = Config::load_from(&config_path, profile)?;

    let log_dir = utils::get_data_dir(profile)
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let _log_guard = logging::init(&log_dir, &config.log_level)?;
    tracing::info!(?profile, config = %config_path.display(), "starting phitodo");

    let command = cli.command.unwrap_or(Commands::Tui);

    if let Commands::Config { action } = command {
        println!("{}", cli::handle_config(&mut config, &config_path, action)?);
        return Ok(());
    }

    let db = Database::new(&config.get_database_path())?;

    if let Commands::Tui = command {
        let app = phitodo::tui::App::new(config, db)?;
        phitodo::tui::run_event_loop(app)?;
        return Ok(());
    }

    let mut ctx = CliContext::open(db, TaskService::default(), utils::today())?;
    let output = match command {
        Commands::Add {
            title,
            notes,
            due,
            start,
            priority,
            project,
            tags,
        } => cli::handle_add(
            &mut ctx,
            AddArgs {
                title,
                notes,
                due,
                start,
                priority,
                project,
                tags,
            },
        )?,
        Commands::List {
            view,
            project,
            tag,
            query,
        } => cli::handle_list(&ctx, &view, project.as_deref(), tag.as_deref(), query.as_deref())?,
        Commands::Complete { id } => cli::handle_complete(&mut ctx, &id)?,
        Commands::Delete { id } => cli::handle_delete(&mut ctx, &id)?,
        Commands::Projects => cli::handle_projects(&ctx),
        Commands::AddProject { name } => cli::handle_add_project(&mut ctx, &name)?,
        Commands::Standup { days } => cli::handle_standup(&ctx, days),
        Commands::Tui | Commands::Config { .. } => return Ok(()),
    };
    println!("{}", output);

    Ok(())
}
