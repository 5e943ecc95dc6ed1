use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_BIND: &str = "127.0.0.1:3000";

pub(crate) enum RunOutcome {
    Serve(Box<ServeSettings>),
    Exit(i32),
}

pub(crate) struct ServeSettings {
    pub(crate) addr: SocketAddr,
    pub(crate) config: fleet_push::config::AppConfig,
}

pub(crate) fn run() -> RunOutcome {
    let cli = Cli::parse();
    if let Some(Command::Init(args)) = cli.command {
        let code = run_init(args);
        return RunOutcome::Exit(code);
    }

    match resolve_serve_settings(&cli) {
        Ok(settings) => RunOutcome::Serve(Box::new(settings)),
        Err(err) => {
            eprintln!("error: {err}");
            RunOutcome::Exit(2)
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "fleet-push",
    version,
    about = "Push notification dispatch service for the driver fleet"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[arg(long, env = "FLEET_PUSH_BIND", default_value = DEFAULT_BIND)]
    bind: String,
    #[arg(long, env = "FLEET_PUSH_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "FLEET_PUSH_VAPID_PRIVATE_KEY")]
    vapid_private_key: Option<String>,
    #[arg(long, env = "FLEET_PUSH_VAPID_PUBLIC_KEY")]
    vapid_public_key: Option<String>,
    #[arg(long, env = "FLEET_PUSH_VAPID_SUBJECT")]
    vapid_subject: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a VAPID key pair.
    Init(InitArgs),
}

#[derive(Args, Debug)]
struct InitArgs {
    #[arg(long)]
    subject: Option<String>,
}

fn run_init(args: InitArgs) -> i32 {
    let credentials = match fleet_push::generate_vapid_credentials() {
        Ok(credentials) => credentials,
        Err(err) => {
            eprintln!("failed to generate VAPID credentials: {err}");
            return 1;
        }
    };
    let (subject, show_subject_note) = match args.subject {
        Some(subject) => (subject, false),
        None => ("mailto:you@example.com".to_string(), true),
    };

    println!("VAPID credentials generated.");
    println!();
    println!("FLEET_PUSH_VAPID_PRIVATE_KEY=\"{}\"", credentials.private_key);
    println!("FLEET_PUSH_VAPID_PUBLIC_KEY=\"{}\"", credentials.public_key);
    println!("FLEET_PUSH_VAPID_SUBJECT=\"{subject}\"");
    if show_subject_note {
        println!();
        println!("Note: replace FLEET_PUSH_VAPID_SUBJECT with a contact URI you control.");
    }
    println!();
    println!("[vapid]");
    println!("private_key = \"{}\"", credentials.private_key);
    println!("public_key = \"{}\"", credentials.public_key);
    println!("subject = \"{subject}\"");
    0
}

fn resolve_serve_settings(cli: &Cli) -> Result<ServeSettings, String> {
    let addr: SocketAddr = cli
        .bind
        .trim()
        .parse()
        .map_err(|_| format!("invalid bind address '{}'", cli.bind))?;

    let file = match cli.config.as_deref() {
        Some(path) => fleet_push::config::FileConfig::load(path)
            .map_err(|err| format!("{} ({})", err, path.display()))?,
        None => fleet_push::config::FileConfig::default(),
    };
    let mut config = fleet_push::config::AppConfig::from_file(file).map_err(|err| err.to_string())?;

    if let Some(private_key) = cli.vapid_private_key.clone() {
        config.vapid.private_key = Some(private_key);
    }
    if let Some(public_key) = cli.vapid_public_key.clone() {
        config.vapid.public_key = Some(public_key);
    }
    if let Some(subject) = cli.vapid_subject.clone() {
        config.vapid.subject = Some(subject);
    }

    Ok(ServeSettings { addr, config })
}
