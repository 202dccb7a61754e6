mod output;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use zoomeye::cache::local_result_key;
use zoomeye::config::CONFIG;
use zoomeye::{Agent, Error, Kind, SearchResult};

#[derive(Parser, Debug)]
#[command(name = "zoomeye", about = "Query ZoomEye and work with cached results")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize by API key or username/password
    Init {
        #[arg(long)]
        apikey: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Query resources information
    Info,
    /// Search results from local store, cache or API
    Search {
        dork: String,
        /// Number of results to return, multiple of 20
        #[arg(long, default_value_t = 20)]
        num: i64,
        /// Resource type: host or web
        #[arg(long = "type", default_value = "host")]
        kind: Kind,
        /// Ignore local and cache data
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        view: ViewArgs,
        /// Save the results in JSON format
        #[arg(long)]
        save: bool,
    },
    /// Load results from a local data file
    Load {
        file: PathBuf,
        #[command(flatten)]
        view: ViewArgs,
        /// Save the filtered data in JSON format
        #[arg(long)]
        save: bool,
    },
    /// Query the history of an IP
    History { ip: String },
    /// Remove all cache data
    Clean,
}

#[derive(Args, Debug)]
struct ViewArgs {
    /// Print the total number of results
    #[arg(long)]
    count: bool,
    /// Print server-side facets, comma separated
    #[arg(long, value_delimiter = ',')]
    facet: Vec<String>,
    /// Tally fields of the results, comma separated
    #[arg(long, value_delimiter = ',')]
    stat: Vec<String>,
    /// Project fields, comma separated; `field=regex` filters records
    #[arg(long, value_delimiter = ',')]
    filter: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = CONFIG.clone();
    config.ensure_dirs()?;
    let mut agent = Agent::new(config);

    match cli.command {
        Command::Init {
            apikey,
            username,
            password,
        } => cmd_init(&mut agent, apikey, username, password).await,
        Command::Info => match agent.info().await {
            Ok(info) => {
                println!("succeed to query");
                output::print_info(&info);
            }
            Err(e) => report(&e),
        },
        Command::Search {
            dork,
            num,
            kind,
            force,
            view,
            save,
        } => cmd_search(&mut agent, &dork, num, kind, force, &view, save).await,
        Command::Load { file, view, save } => cmd_load(&agent, &file, &view, save).await,
        Command::History { ip } => match agent.history(&ip).await {
            Ok(history) => output::print_history(&history),
            Err(e) => report(&e),
        },
        Command::Clean => match agent.clean().await {
            Ok(n) => println!("succeed to clean all cache data ({n} files)"),
            Err(e) => report(&e),
        },
    }
    Ok(())
}

fn report(e: &Error) {
    match e {
        Error::NoCredentials => {
            eprintln!("not found any Auth Keys, please run <zoomeye init> first")
        }
        Error::Api(api) => eprintln!("failed to authenticate: {api}"),
        other => eprintln!("something is wrong: {other:#}"),
    }
}

async fn cmd_init(
    agent: &mut Agent,
    apikey: Option<String>,
    username: Option<String>,
    password: Option<String>,
) {
    let result = match (apikey, username, password) {
        (Some(key), _, _) => agent.init_by_key(&key).await,
        (None, Some(user), Some(pass)) => agent.init_by_user(&user, &pass).await,
        _ => match agent.init_local().await {
            Ok(info) => Ok(info),
            Err(_) => {
                eprintln!("required parameter missing, please run <zoomeye init -h> for help");
                return;
            }
        },
    };
    match result {
        Ok(info) => {
            println!("succeed to initialize");
            output::print_info(&info);
        }
        Err(e) => eprintln!("failed to initialize: {e}"),
    }
}

fn show(result: &mut SearchResult, view: &ViewArgs) {
    if view.count {
        output::print_count(result);
    }
    if !view.facet.is_empty() {
        output::print_facets(result, &view.facet);
    }
    if !view.stat.is_empty() {
        output::print_stats(result, &view.stat);
    }
    if !view.filter.is_empty() {
        let records = result.filter(&view.filter);
        output::print_filter(&records);
    }
    if !view.count && view.facet.is_empty() && view.stat.is_empty() && view.filter.is_empty() {
        output::print_data(result);
    }
}

async fn cmd_search(
    agent: &mut Agent,
    dork: &str,
    num: i64,
    kind: Kind,
    force: bool,
    view: &ViewArgs,
    save: bool,
) {
    let start = Instant::now();
    let mut result = match agent.search(dork, num, kind, force).await {
        Ok(result) => result,
        Err(e) => return report(&e),
    };
    println!("succeed to search (in {:?})", start.elapsed());
    show(&mut result, view);

    if save {
        let name = local_result_key(kind, dork, zoomeye::planner::normalize_count(num));
        match agent.save(&result, &name).await {
            Ok(path) => println!("succeed to save ({})", path.display()),
            Err(e) => eprintln!("failed to save: {e}"),
        }
    }
}

async fn cmd_load(agent: &Agent, file: &Path, view: &ViewArgs, save: bool) {
    let mut result = match agent.load(file).await {
        Ok(result) => result,
        Err(e) => return eprintln!("invalid local data: {e}"),
    };
    println!("succeed to load");
    show(&mut result, view);

    if save {
        let stem = file.file_stem().and_then(|s| s.to_str()).unwrap_or("data");
        let ext = file.extension().and_then(|s| s.to_str()).unwrap_or("json");
        let path = file.with_file_name(format!("{stem}_filtered.{ext}"));
        match agent.save_filter_data(&result.filter_cache, &path).await {
            Ok(path) => println!("succeed to save ({})", path.display()),
            Err(e) => eprintln!("failed to save: {e}"),
        }
    }
}
