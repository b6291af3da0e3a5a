mod catalog;
mod disclosure;
mod engine;
mod hint;
mod normalize;
mod query;
mod server;
mod store;
mod table;
use crate::catalog::{Catalog, CATALOG_FILE};
use crate::engine::Engine;
use crate::store::{RankingStore, DEFAULT_CAPACITY};
use anyhow::Context;
use lexopt::{Arg, Parser, ValueExt};
use patharg::OutputArg;
use std::io::Write;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Eq, PartialEq)]
enum Command {
    Serve(ServeOptions),
    Index(IndexOptions),
    Help,
    Version,
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct ServeOptions {
    data_dir: PathBuf,
    bind: SocketAddr,
    cache_capacity: NonZeroUsize,
}

impl Default for ServeOptions {
    fn default() -> ServeOptions {
        ServeOptions {
            data_dir: default_data_dir(),
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct IndexOptions {
    data_dir: PathBuf,
    output: Option<OutputArg>,
    days_ahead: u64,
}

impl Default for IndexOptions {
    fn default() -> IndexOptions {
        IndexOptions {
            data_dir: default_data_dir(),
            output: None,
            days_ahead: 1,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Command {
    fn from_parser(mut parser: Parser) -> Result<Command, lexopt::Error> {
        let mut serve = ServeOptions::default();
        let mut index = None;
        while let Some(arg) = parser.next()? {
            match arg {
                Arg::Short('h') | Arg::Long("help") => return Ok(Command::Help),
                Arg::Short('V') | Arg::Long("version") => return Ok(Command::Version),
                Arg::Short('d') | Arg::Long("data-dir") => {
                    let dir = PathBuf::from(parser.value()?);
                    match index.as_mut() {
                        Some(IndexOptions { data_dir, .. }) => *data_dir = dir,
                        None => serve.data_dir = dir,
                    }
                }
                Arg::Short('b') | Arg::Long("bind") if index.is_none() => {
                    serve.bind = parser.value()?.parse()?;
                }
                Arg::Short('c') | Arg::Long("cache-capacity") if index.is_none() => {
                    serve.cache_capacity = parser.value()?.parse()?;
                }
                Arg::Short('o') | Arg::Long("output") if index.is_some() => {
                    let output = OutputArg::from_arg(parser.value()?);
                    if let Some(opts) = index.as_mut() {
                        opts.output = Some(output);
                    }
                }
                Arg::Long("days-ahead") if index.is_some() => {
                    let days = parser.value()?.parse()?;
                    if let Some(opts) = index.as_mut() {
                        opts.days_ahead = days;
                    }
                }
                Arg::Value(value) if index.is_none() && value == "serve" => (),
                Arg::Value(value) if index.is_none() && value == "index" => {
                    index = Some(IndexOptions {
                        data_dir: serve.data_dir.clone(),
                        ..IndexOptions::default()
                    });
                }
                _ => return Err(arg.unexpected()),
            }
        }
        Ok(match index {
            Some(opts) => Command::Index(opts),
            None => Command::Serve(serve),
        })
    }

    fn run(self) -> anyhow::Result<()> {
        match self {
            Command::Serve(opts) => {
                init_logging();
                let runtime =
                    tokio::runtime::Runtime::new().context("failed to start async runtime")?;
                runtime.block_on(serve(opts))?;
            }
            Command::Index(opts) => {
                init_logging();
                index(opts)?;
            }
            Command::Help => {
                println!("Usage: contexto [serve] [<options>]");
                println!("       contexto index [<options>]");
                println!();
                println!("Serve guess ranks and hints for a semantic word-guessing game");
                println!();
                println!("Common options:");
                println!("  -d <DIR>, --data-dir <DIR>");
                println!("                    Read the catalog ({CATALOG_FILE}) and game files");
                println!("                    from <DIR> [default: data]");
                println!();
                println!("  -h, --help        Display this help message and exit");
                println!("  -V, --version     Show the program version and exit");
                println!();
                println!("Serve options:");
                println!("  -b <ADDR>, --bind <ADDR>");
                println!("                    Listen on <ADDR> [default: 127.0.0.1:3000]");
                println!();
                println!("  -c <N>, --cache-capacity <N>");
                println!("                    Keep at most <N> games in memory [default: 20]");
                println!();
                println!("Index options:");
                println!("  -o <FILE>, --output <FILE>");
                println!("                    Write the updated catalog to <FILE> (\"-\" for");
                println!("                    stdout) [default: the catalog in the data dir]");
                println!();
                println!("  --days-ahead <N>  Date new games <N> days after their files were");
                println!("                    created [default: 1]");
            }
            Command::Version => {
                println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            }
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    Command::from_parser(Parser::from_env())?.run()
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn serve(opts: ServeOptions) -> anyhow::Result<()> {
    let store = RankingStore::new(opts.data_dir, opts.cache_capacity);
    let engine = Arc::new(Engine::new(store));
    let app = server::routes(engine);
    let listener = tokio::net::TcpListener::bind(opts.bind)
        .await
        .with_context(|| format!("failed to bind to {}", opts.bind))?;
    tracing::info!("Listening on http://{}", opts.bind);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutting down");
            }
        })
        .await
        .context("server error")?;
    Ok(())
}

fn index(opts: IndexOptions) -> anyhow::Result<()> {
    let catalog_path = opts.data_dir.join(CATALOG_FILE);
    let mut catalog = Catalog::load_or_default(&catalog_path)?;
    let added = catalog.add_new_artifacts(&opts.data_dir, opts.days_ahead)?;
    if added.is_empty() {
        tracing::info!("No new games found");
    }
    let output = opts.output.unwrap_or(OutputArg::Path(catalog_path));
    let mut out = output.create().context("failed to open output")?;
    serde_json::to_writer_pretty(&mut out, &catalog).context("failed to write catalog")?;
    writeln!(out).context("failed to write catalog")?;
    out.flush().context("failed to write catalog")?;
    tracing::info!(added = added.len(), total = catalog.len(), "Wrote catalog");
    Ok(())
}
