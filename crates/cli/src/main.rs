//! `oms` — thin operator CLI over an embedded, on-disk [`OntologyService`]
//! (§6: "purely an operator inspection tool over the embedded store").

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use oms_api::OntologyService;
use oms_cache::CacheConfig;
use oms_core::{BranchName, CommitHash, Limits};
use oms_validator::ValidationRequest;

#[derive(Parser)]
#[command(name = "oms", about = "Operator inspection CLI for an embedded OMS store")]
struct Cli {
    /// Directory holding the commit log (created if missing).
    #[arg(long, global = true, default_value = "./oms-data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a branch from another branch's current HEAD.
    CreateBranch {
        name: String,
        #[arg(long)]
        from: Option<String>,
    },
    /// Print a commit's metadata and changed keys.
    ShowCommit { hash: String },
    /// Diff two branches' current document sets.
    Diff { base: String, compare: String },
    /// Run the breaking-change validator between two branches.
    Validate {
        source: String,
        target: String,
        #[arg(long)]
        impact: bool,
    },
    /// Scan a branch's graph for dangling references.
    Integrity { branch: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let service = match OntologyService::open(&cli.data_dir, Limits::default(), CacheConfig::default()) {
        Ok(svc) => svc,
        Err(e) => {
            eprintln!("failed to open store at {}: {e}", cli.data_dir.display());
            return ExitCode::FAILURE;
        }
    };

    match run(&service, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(service: &OntologyService, command: Command) -> Result<(), String> {
    match command {
        Command::CreateBranch { name, from } => {
            let name = BranchName::new(name).map_err(|e| e.to_string())?;
            let from = from.map(BranchName::new).transpose().map_err(|e| e.to_string())?;
            let branch = service
                .branch()
                .create_branch(&name, from.as_ref(), "oms-cli")
                .map_err(|e| e.to_string())?;
            println!("created branch {} at {}", branch.name, branch.head);
            Ok(())
        }
        Command::ShowCommit { hash } => {
            let hash = CommitHash::parse(&hash).ok_or_else(|| format!("'{hash}' is not a valid commit hash"))?;
            let commit = service.store().get_commit(hash).map_err(|e| e.to_string())?;
            println!("commit {}", commit.hash);
            println!("branch:  {}", commit.branch);
            println!("author:  {}", commit.author);
            println!("message: {}", commit.message);
            println!("parents: {}", commit.parents.iter().map(CommitHash::to_string).collect::<Vec<_>>().join(", "));
            for change in &commit.changes {
                println!("  {:?} {}/{}", change.operation, change.entity_type, change.entity_id);
            }
            Ok(())
        }
        Command::Diff { base, compare } => {
            let base = BranchName::new(base).map_err(|e| e.to_string())?;
            let compare = BranchName::new(compare).map_err(|e| e.to_string())?;
            let diff = service.store().compare_branches(&base, &compare).map_err(|e| e.to_string())?;
            println!("added:    {}", diff.added.len());
            println!("removed:  {}", diff.removed.len());
            println!("modified: {}", diff.modified.len());
            for key in diff.added.iter().chain(&diff.removed).chain(&diff.modified) {
                println!("  {}/{}", key.kind, key.id);
            }
            Ok(())
        }
        Command::Validate { source, target, impact } => {
            let result = service
                .validate(ValidationRequest {
                    source_branch: source,
                    target_branch: target,
                    include_impact: impact,
                    include_warnings: true,
                    options: BTreeMap::new(),
                })
                .map_err(|e| e.to_string())?;
            println!("valid: {}", result.is_valid);
            println!("risk:  {:?}", result.risk_level);
            for change in &result.breaking_changes {
                println!("  [{:?}] {} {}: {}", change.severity, change.resource_type, change.resource_name, change.description);
            }
            Ok(())
        }
        Command::Integrity { branch } => {
            let branch = BranchName::new(branch).map_err(|e| e.to_string())?;
            let report = service.check_integrity(&branch);
            if report.is_clean() {
                println!("clean");
            } else {
                for issue in &report.issues {
                    println!("  {} {}: {}", issue.entity_type, issue.entity_id, issue.detail);
                }
            }
            Ok(())
        }
    }
}
