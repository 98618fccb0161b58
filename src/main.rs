use authvault::cli::commands;
use authvault::cli::{AuthAction, Cli, Commands};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    // Diagnostics go to stderr; command output owns stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => commands::init::execute(&cli),
        Commands::Add(ref args) => commands::add::execute(&cli, args),
        Commands::List { page, size } => commands::list::execute(&cli, page, size),
        Commands::Code { ref id, copy } => commands::code::execute(&cli, id, copy),
        Commands::Commit { ref id } => commands::commit::execute(&cli, id),
        Commands::Update(ref args) => commands::update::execute(&cli, args),
        Commands::Remove { ref id, force } => commands::remove::execute(&cli, id, force),
        Commands::Groups => commands::groups::execute(&cli),
        Commands::Tags => commands::groups::execute_tags(&cli),
        Commands::Status => commands::status::execute(&cli),
        Commands::Passwd => commands::passwd::execute(&cli),
        Commands::Export { ref file } => commands::export::execute(&cli, file),
        Commands::Import { ref file } => commands::import_cmd::execute(&cli, file),
        Commands::Config(ref args) => commands::config_cmd::execute(&cli, args),
        Commands::Audit { last, ref since } => {
            commands::audit_cmd::execute(&cli, last, since.as_deref())
        }
        Commands::Completions { shell } => commands::completions::execute(shell),
        Commands::Auth { ref action } => match action {
            AuthAction::Biometric { disable } => {
                commands::auth::execute_biometric(&cli, *disable)
            }
        },
    };

    if let Err(e) = result {
        authvault::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
