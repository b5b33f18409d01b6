// Copyright (C) 2025 Joseph Sacchini
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the Free
// Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use meshtier_client::cidr_editor::{self, CidrEditor};
use meshtier_client::validate::{self, InvalidProfile};
use meshtier_client::{aggregate, decode, edit, profile_file};
use meshtier_types::address;
use meshtier_types::flags::FeatureFlag;
use meshtier_types::profile::ProfileSummary;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(distribute)]
    {
        fmt().json().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    #[cfg(not(distribute))]
    {
        fmt().pretty().with_env_filter(filter).with_writer(std::io::stderr).init();
    }
}

#[derive(Debug, Parser)]
#[command(name = "meshtier")]
#[command(version = env!("GIT_VERSION"))]
#[command(about = "Edit, validate and inspect mesh VPN node profiles")]
struct Args {
    /// Path to the profiles file
    #[arg(short, long, env = "MESHTIER_PROFILES", default_value = "meshtier.toml")]
    profiles: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a profile with default settings
    New { name: String },
    /// List stored profiles
    List,
    /// Change a profile's display name
    Rename { name: String, new_name: String },
    /// Check profiles before handing them to the engine
    Validate {
        /// Only this profile
        name: Option<String>,
    },
    /// Show feature flags, with current values when a profile is given
    Flags { name: Option<String> },
    /// Turn a feature flag on or off
    SetFlag {
        name: String,
        flag: String,
        #[arg(action = clap::ArgAction::Set)]
        value: bool,
    },
    /// Manage a profile's proxy CIDRs
    Cidr {
        name: String,
        #[command(subcommand)]
        action: CidrAction,
    },
    /// Print a profile as JSON
    Export { name: String },
    /// Decode an engine status report (`-` reads stdin)
    Status {
        report: PathBuf,
        /// Print the decoded report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum CidrAction {
    Add { cidr: String },
    Edit { index: usize, cidr: String },
    Remove { index: usize },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    match args.command {
        Command::New { name } => {
            let mut file = profile_file::load(&args.profiles).await?;
            let entry = ProfileSummary::new(name);
            profile_file::validate_new_entry(&file, &entry)?;
            info!(name = %entry.name, id = %entry.id, "created profile");
            file.profiles.push(entry);
            profile_file::save(&args.profiles, &file).await?;
        }
        Command::List => {
            let file = profile_file::load(&args.profiles).await?;
            for entry in &file.profiles {
                println!(
                    "{}  {}  {:?}  created {}",
                    entry.id,
                    entry.name,
                    entry.profile.networking_method,
                    entry.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Command::Rename { name, new_name } => {
            let mut file = profile_file::load(&args.profiles).await?;
            file.rename(&name, &new_name)?;
            profile_file::save(&args.profiles, &file).await?;
        }
        Command::Validate { name } => {
            let file = profile_file::load(&args.profiles).await?;
            let targets: Vec<&ProfileSummary> = match &name {
                Some(name) => vec![file.find(name)?],
                None => file.profiles.iter().collect(),
            };
            let mut all_issues = Vec::new();
            for entry in targets {
                let issues = validate::validate(&entry.profile);
                if issues.is_empty() {
                    println!("{}: ok", entry.name);
                }
                for issue in &issues {
                    println!("{}: {issue}", entry.name);
                }
                all_issues.extend(issues);
            }
            if !all_issues.is_empty() {
                return Err(InvalidProfile(all_issues).into());
            }
        }
        Command::Flags { name } => {
            let file = profile_file::load(&args.profiles).await?;
            let profile = match &name {
                Some(name) => Some(&file.find(name)?.profile),
                None => None,
            };
            for &flag in FeatureFlag::ALL {
                match profile {
                    Some(p) => println!("{:<28} {:<5} {}", flag.key(), flag.get(p), flag.label()),
                    None => println!("{:<28} {}\n{:<28} {}", flag.key(), flag.label(), "", flag.help()),
                }
            }
        }
        Command::SetFlag { name, flag, value } => {
            let mut file = profile_file::load(&args.profiles).await?;
            let entry = file.find_mut(&name)?;
            let flag = edit::set_flag(&mut entry.profile, &flag, value)?;
            info!(profile = %name, flag = flag.key(), value, "set flag");
            profile_file::save(&args.profiles, &file).await?;
        }
        Command::Cidr { name, action } => {
            let mut file = profile_file::load(&args.profiles).await?;
            let entry = file.find_mut(&name)?;
            let cidrs = &mut entry.profile.proxy_cidrs;
            match action {
                CidrAction::Add { cidr } => {
                    let value = normalize_cidr(&cidr)?;
                    let outcome = cidr_editor::commit_into(cidrs, None, value)?;
                    println!("{outcome:?}");
                }
                CidrAction::Edit { index, cidr } => {
                    let value = normalize_cidr(&cidr)?;
                    let outcome = cidr_editor::commit_into(cidrs, Some(index), value)?;
                    println!("{outcome:?}");
                }
                CidrAction::Remove { index } => {
                    if index >= cidrs.len() {
                        return Err(cidr_editor::CidrListError::NoSuchEntry(index).into());
                    }
                    let removed = cidrs.remove(index);
                    println!("removed {removed}");
                }
            }
            profile_file::save(&args.profiles, &file).await?;
        }
        Command::Export { name } => {
            let file = profile_file::load(&args.profiles).await?;
            let entry = file.find(&name)?;
            if let Err(e) = validate::ensure_valid(&entry.profile) {
                warn!(profile = %name, issue_count = e.0.len(), "exporting a profile with validation issues");
            }
            println!("{}", serde_json::to_string_pretty(&entry.profile)?);
        }
        Command::Status { report, json } => {
            let text = read_report(&report).await?;
            let info = decode::decode_running_info(&text)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_status(&info);
            }
        }
    }

    Ok(())
}

/// Check the text strictly, then pass it through the editor so stored
/// entries are canonical (`010.0.0.0/8` becomes `10.0.0.0/8`).
fn normalize_cidr(text: &str) -> Result<String, Box<dyn std::error::Error>> {
    address::parse_cidr(text)?;
    Ok(CidrEditor::parse_for_edit(text).commit()?)
}

async fn read_report(path: &Path) -> std::io::Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;
        Ok(text)
    } else {
        tokio::fs::read_to_string(path).await
    }
}

fn print_status(info: &meshtier_types::status::NetworkInstanceRunningInfo) {
    let node = &info.my_node_info;
    println!(
        "{} ({}) on {} - {}",
        node.hostname,
        node.virtual_ipv4
            .map(|v| v.to_string())
            .unwrap_or_else(|| "no address".into()),
        info.dev_name,
        if info.running { "running" } else { "stopped" }
    );
    if let Some(err) = &info.error_msg {
        println!("error: {err}");
    }
    if let Some(stun) = &node.stun_info {
        println!("nat: udp {}, tcp {}", stun.udp_nat_type.label(), stun.tcp_nat_type.label());
    }

    println!();
    println!("{:<12} {:<24} {:<18} {:<8} {:>10} {:>6}", "PEER", "HOSTNAME", "ADDRESS", "PATH", "LATENCY", "LOSS");
    for pair in &info.peer_route_pairs {
        let route = &pair.route;
        let path = if route.is_local() {
            "local".to_string()
        } else if route.is_direct() {
            pair.tunnel_types().join("/")
        } else {
            format!("via {}", route.next_hop_peer_id)
        };
        println!(
            "{:<12} {:<24} {:<18} {:<8} {:>10} {:>6}",
            route.peer_id,
            route.hostname,
            route
                .ipv4_addr
                .map(|a| a.ip().to_string())
                .unwrap_or_else(|| "-".into()),
            path,
            pair.latency_us()
                .map(|us| format!("{:.1}ms", us as f64 / 1000.0))
                .unwrap_or_else(|| "-".into()),
            pair.loss_rate()
                .map(|l| format!("{:.1}%", l * 100.0))
                .unwrap_or_else(|| "-".into()),
        );
    }

    let unpaired = aggregate::unpaired_peers(&info.routes, &info.peers);
    if !unpaired.is_empty() {
        println!();
        for peer in unpaired {
            println!("peer {} connected without a route ({} conns)", peer.peer_id, peer.conns.len());
        }
    }

    if !info.events.is_empty() {
        println!();
        for event in info.events_chronological() {
            let time = event
                .time
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "--:--:--".into());
            println!("{time}  {}", event.kind.as_deref().unwrap_or("?"));
        }
    }
}
