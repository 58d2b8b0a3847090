use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use amule_ec::client::types::SearchQuery;
use amule_ec::Client;

const CLIENT_NAME: &str = "amule-ec-cli";
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(about = "Talk to an amuled External Connections (EC) listener")]
struct Cli {
    #[arg(short, long, required = true)]
    host: String,

    #[arg(short, long, default_value_t = 4712)]
    port: u16,

    #[arg(short = 'P', long, env = "AMULE_EC_PASSWORD", required = true)]
    password: String,

    /// Print every request/response packet as it crosses the wire.
    #[arg(long)]
    dump_packets: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print server status: connection state, speeds, user/file counts.
    Status,
    /// Start a kad/ed2k search and print results after a short wait.
    Search {
        #[arg(required = true)]
        name: String,
        #[arg(short, long, default_value_t = 0)]
        search_type: u8,
    },
    /// List the download queue.
    Downloads {
        #[arg(long)]
        detail: bool,
        #[arg(long)]
        update: bool,
    },
    /// Partfile commands, one or more hashes per invocation.
    Partfile {
        #[command(subcommand)]
        action: PartfileAction,
    },
}

#[derive(Subcommand, Debug)]
enum PartfileAction {
    Pause { hashes: Vec<String> },
    Resume { hashes: Vec<String> },
    Stop { hashes: Vec<String> },
    Delete { hashes: Vec<String> },
    RemoveNoneed { hashes: Vec<String> },
    RemoveFullqueue { hashes: Vec<String> },
    RemoveHighqueue { hashes: Vec<String> },
    CleanupSources { hashes: Vec<String> },
    SwapA4afThis { hashes: Vec<String> },
    SwapA4afThisAuto { hashes: Vec<String> },
    SwapA4afOthers { hashes: Vec<String> },
    SetPriority { prio: u8, hashes: Vec<String> },
    SetCat { cat: u8, hashes: Vec<String> },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut client = Client::new(CLIENT_NAME, CLIENT_VERSION);
    client.set_dump_packets(cli.dump_packets);
    client
        .connect((cli.host.as_str(), cli.port), &cli.password)
        .with_context(|| format!("failed to connect to {}:{}", cli.host, cli.port))?;

    match cli.command {
        Command::Status => {
            let status = client
                .get_server_status()
                .context("get_server_status failed")?;
            println!("{status:#?}");
        }
        Command::Search { name, search_type } => {
            let query = SearchQuery::new(search_type, name);
            let started = client.search_start(&query).context("search_start failed")?;
            if let Some(message) = &started.message {
                println!("search_start: {message}");
            }
            println!("search started, progress: {}%", client.get_search_progress()?);
            let results = client
                .get_search_results(false)
                .context("get_search_results failed")?;
            println!("{} result(s):", results.len());
            for result in results {
                println!(
                    "  {} {} ({} bytes, {} sources)",
                    result.hash,
                    result.name.as_deref().unwrap_or("<unnamed>"),
                    result.size.unwrap_or(0),
                    result.src_count.unwrap_or(0)
                );
            }
        }
        Command::Downloads { detail, update } => {
            let files = client
                .get_download_list(detail, update)
                .context("get_download_list failed")?;
            for file in files {
                println!(
                    "  {} {} {}/{} bytes",
                    file.hash,
                    file.name.as_deref().unwrap_or("<unnamed>"),
                    file.size_done.unwrap_or(0),
                    file.size.unwrap_or(0)
                );
            }
        }
        Command::Partfile { action } => {
            let ok = match action {
                PartfileAction::Pause { hashes } => client.partfile_pause(&hashes)?,
                PartfileAction::Resume { hashes } => client.partfile_resume(&hashes)?,
                PartfileAction::Stop { hashes } => client.partfile_stop(&hashes)?,
                PartfileAction::Delete { hashes } => client.partfile_delete(&hashes)?,
                PartfileAction::RemoveNoneed { hashes } => client.partfile_remove_noneed(&hashes)?,
                PartfileAction::RemoveFullqueue { hashes } => {
                    client.partfile_remove_fullqueue(&hashes)?
                }
                PartfileAction::RemoveHighqueue { hashes } => {
                    client.partfile_remove_highqueue(&hashes)?
                }
                PartfileAction::CleanupSources { hashes } => {
                    client.partfile_cleanup_sources(&hashes)?
                }
                PartfileAction::SwapA4afThis { hashes } => client.partfile_swap_a4af_this(&hashes)?,
                PartfileAction::SwapA4afThisAuto { hashes } => {
                    client.partfile_swap_a4af_this_auto(&hashes)?
                }
                PartfileAction::SwapA4afOthers { hashes } => {
                    client.partfile_swap_a4af_others(&hashes)?
                }
                PartfileAction::SetPriority { prio, hashes } => {
                    client.partfile_set_priority(&hashes, prio)?
                }
                PartfileAction::SetCat { cat, hashes } => client.partfile_set_cat(&hashes, cat)?,
            };
            println!("ok: {ok}");
        }
    }

    client.disconnect();
    Ok(())
}
