use clap::{Parser, Subcommand};
use lucius::config::{self, SiteContext};
use lucius::output;
use lucius::serve::{self, ServeOptions};
use lucius::site::{BuildEvent, BuildMode, BuildReport, Builder};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

#[derive(Parser)]
#[command(name = "lucius")]
#[command(about = "Incremental static blog generator")]
#[command(long_about = "\
Incremental static blog generator

Markdown posts with a small `key: value` header become HTML pages rendered
through your own templates. A manifest of built posts lets `update` render
only what is new.

Project structure:

  my-blog/
  ├── config.toml                  # Optional, see `lucius gen-config`
  ├── posts.db                     # Build manifest (generated)
  ├── content/                     # Posts, any depth
  │   ├── hello.md
  │   └── 2024/
  │       ├── trip.md
  │       └── img/                 # Copied to docs/img/
  ├── templates/
  │   ├── post.html
  │   ├── index.html
  │   ├── category.html
  │   └── css/                     # Copied to docs/css/
  └── docs/                        # Generated site

Post header:

  title: Hello, World!             # Required
  date: 2024-01-15                 # Required
  slug: hello                      # Optional, derived from the title
  category: Rust                   # Optional, defaults to Uncategorized

  Body in markdown starts after the first blank line.")]
#[command(version)]
struct Cli {
    /// Project root containing config.toml, content/ and templates/
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clear the output and rebuild every post
    Build,
    /// Render only posts missing from the manifest, then refresh listings
    Update,
    /// Build, then serve the output and rebuild on change
    Serve(ServeArgs),
    /// Validate every post without building
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct ServeArgs {
    /// Rebuild with `update` instead of a full rebuild
    #[arg(long)]
    incremental: bool,

    /// Serve only, do not watch for changes
    #[arg(long)]
    no_watch: bool,

    /// Port to listen on (overrides [serve] port)
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Build => {
            run_build(&cli.root, BuildMode::Full)?;
        }
        Command::Update => {
            run_build(&cli.root, BuildMode::Incremental)?;
        }
        Command::Serve(args) => {
            let mode = if args.incremental {
                BuildMode::Incremental
            } else {
                BuildMode::Full
            };
            let context = SiteContext::load(&cli.root)?;
            let mut options = ServeOptions::from_context(&context);
            options.mode = mode;
            options.watch &= !args.no_watch;
            if let Some(port) = args.port {
                options.port = port;
            }

            let (tx, printer) = spawn_printer();
            // A broken post or template should not keep the server from starting.
            if let Err(e) = build(context.clone(), mode, tx.clone()) {
                eprintln!("{}", output::status_line("build", format!("failed: {e}")));
            }
            let served = serve::serve_site(&context, &options, Some(tx));
            let _ = printer.join();
            served?;
        }
        Command::Check => {
            let context = SiteContext::load(&cli.root)?;
            let checked = Builder::new(context).check()?;
            output::print_check_output(&checked);
            let invalid = checked.iter().filter(|p| p.result.is_err()).count();
            if invalid > 0 {
                return Err(format!("{invalid} posts failed validation").into());
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Print build events on a separate thread as they arrive.
fn spawn_printer() -> (Sender<BuildEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel();
    let printer = thread::spawn(move || {
        for event in rx {
            output::print_build_event(&event);
        }
    });
    (tx, printer)
}

fn build(
    context: SiteContext,
    mode: BuildMode,
    events: Sender<BuildEvent>,
) -> Result<BuildReport, lucius::site::BuildError> {
    let builder = Builder::new(context).with_events(events);
    match mode {
        BuildMode::Full => builder.generate_all(),
        BuildMode::Incremental => builder.update(),
    }
}

fn run_build(root: &Path, mode: BuildMode) -> Result<BuildReport, Box<dyn std::error::Error>> {
    let context = SiteContext::load(root)?;
    let (tx, printer) = spawn_printer();
    let result = build(context, mode, tx);
    // The builder and its sender are gone, so the printer drains and exits.
    let _ = printer.join();
    Ok(result?)
}
