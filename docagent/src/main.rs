//! `docagent`: drive the documentation agent against a local checkout.
//!
//! Replies come from a scripted model, so runs are reproducible: `replay`
//! executes a flow end to end and writes one transcript file per step.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use docagent::agents::answer::AnswerCases;
use docagent::agents::generate::GenerateCases;
use docagent::agents::refine::RefineCases;
use docagent::agents::{
    self, AgentDeps, AnswerRequest, GenerateRequest, RefineRequest, RunHooks, system_prompt,
};
use docagent::core::diff::parse_diff;
use docagent::core::format::MarkdownFormatter;
use docagent::core::patch::PatchError;
use docagent::core::protocol::parse;
use docagent::core::types::ProposalHandle;
use docagent::dispatch::Cases;
use docagent::exit_codes;
use docagent::io::channel::{ConsoleChannel, ConversationChannel};
use docagent::io::chat::ReplayModel;
use docagent::io::config::{AgentConfig, load_config};
use docagent::io::local_repo::LocalRepository;
use docagent::io::proposal::{LocalProposalStore, ProposalStore};
use docagent::io::resolve::resolve_diff;
use docagent::io::sources::{RepositorySource, SourceManager};
use docagent::io::transcript::TranscriptWriter;
use docagent::logging;
use docagent::task_loop::{LoopStop, StepRecord};
use tracing::warn;

#[derive(Parser)]
#[command(
    name = "docagent",
    version,
    about = "Tool-using documentation agent over a local checkout"
)]
struct Cli {
    /// Agent configuration (TOML). Defaults apply when absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Flow {
    Answer,
    Generate,
    Refine,
}

#[derive(Subcommand)]
enum Command {
    /// Print the system prompt a flow would start with.
    Prompt {
        #[arg(long, value_enum)]
        flow: Flow,
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Parse one model reply and print the command as JSON.
    Parse { file: PathBuf },
    /// Apply a multi-file unified diff to a checkout.
    Apply {
        #[arg(long)]
        root: PathBuf,
        diff: PathBuf,
    },
    /// Run a flow with replies read from a script.
    Replay {
        #[arg(long)]
        root: PathBuf,
        /// Model replies separated by lines containing only `---`.
        #[arg(long)]
        script: PathBuf,
        #[arg(long, value_enum)]
        flow: Flow,
        /// The user's request; for `refine`, the review feedback.
        #[arg(long, default_value = "")]
        request: String,
        /// JSON array of thread messages used as conversation history.
        #[arg(long)]
        history: Option<PathBuf>,
        /// Proposal id to refine.
        #[arg(long)]
        proposal: Option<u64>,
        /// Transcript directory. Defaults to `<root>/.docagent/transcripts`.
        #[arg(long)]
        transcripts: Option<PathBuf>,
        #[arg(long)]
        run_id: Option<String>,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let config = AgentConfig::default();
            config.validate()?;
            config
        }
    };
    let runtime = tokio::runtime::Runtime::new().context("start async runtime")?;
    match cli.command {
        Command::Prompt { flow, root } => cmd_prompt(flow, &root, config),
        Command::Parse { file } => cmd_parse(&file),
        Command::Apply { root, diff } => runtime.block_on(cmd_apply(&root, &diff, config)),
        Command::Replay {
            root,
            script,
            flow,
            request,
            history,
            proposal,
            transcripts,
            run_id,
        } => {
            let transcripts = transcripts.unwrap_or_else(|| root.join(".docagent/transcripts"));
            let run_id = run_id.unwrap_or_else(default_run_id);
            let writer = TranscriptWriter::create(&transcripts, &run_id)?;
            runtime.block_on(cmd_replay(ReplayArgs {
                root,
                script,
                flow,
                request,
                history,
                proposal,
                writer,
                config,
            }))
        }
    }
}

fn cmd_prompt(flow: Flow, root: &Path, config: AgentConfig) -> Result<i32> {
    let model = ReplayModel::default();
    let deps = local_deps(root, config, Arc::new(model));
    let channel: Arc<dyn ConversationChannel> = Arc::new(ConsoleChannel::default());
    let cases: Box<dyn Cases> = match flow {
        Flow::Answer => Box::new(AnswerCases::new(&deps, channel)),
        Flow::Generate => Box::new(GenerateCases::new(&deps, channel)),
        Flow::Refine => Box::new(RefineCases::new(&deps, channel)),
    };
    let (task, budget) = match flow {
        Flow::Answer => (agents::answer::TASK, deps.config.answer_max_steps),
        Flow::Generate => (agents::generate::TASK, deps.config.generate_max_steps),
        Flow::Refine => (agents::refine::TASK, deps.config.refine_max_steps),
    };
    println!("{}", system_prompt(cases.as_ref(), task, budget, Vec::new())?);
    Ok(exit_codes::OK)
}

fn cmd_parse(file: &Path) -> Result<i32> {
    let raw = fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let command = parse(&raw).with_context(|| format!("parse {}", file.display()))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&command).context("serialize command")?
    );
    Ok(exit_codes::OK)
}

async fn cmd_apply(root: &Path, diff_path: &Path, config: AgentConfig) -> Result<i32> {
    let raw =
        fs::read_to_string(diff_path).with_context(|| format!("read {}", diff_path.display()))?;
    let diffs = parse_diff(&raw);
    if diffs.is_empty() {
        bail!("no file headers found in {}", diff_path.display());
    }
    let repo = LocalRepository::new(root, config.repository);
    let mut rejected = 0;
    for diff in &diffs {
        match resolve_diff(diff, &repo).await {
            Ok(()) => println!("applied {}", diff.path()),
            Err(err) if err.downcast_ref::<PatchError>().is_some() => {
                rejected += 1;
                eprintln!("{:#}", err);
            }
            Err(err) => return Err(err),
        }
    }
    Ok(if rejected == 0 {
        exit_codes::OK
    } else {
        exit_codes::REJECTED
    })
}

struct ReplayArgs {
    root: PathBuf,
    script: PathBuf,
    flow: Flow,
    request: String,
    history: Option<PathBuf>,
    proposal: Option<u64>,
    writer: TranscriptWriter,
    config: AgentConfig,
}

async fn cmd_replay(args: ReplayArgs) -> Result<i32> {
    let script = fs::read_to_string(&args.script)
        .with_context(|| format!("read {}", args.script.display()))?;
    let deps = local_deps(
        &args.root,
        args.config,
        Arc::new(ReplayModel::from_script(&script)),
    );
    let channel: Arc<dyn ConversationChannel> = Arc::new(ConsoleChannel::new(args.history));

    let writer = args.writer;
    let mut hooks = RunHooks {
        on_step: Box::new(move |record: &StepRecord| {
            if let Err(err) = writer.write(record) {
                warn!(error = %err, step = record.step, "failed to write transcript");
            }
        }),
        ..RunHooks::default()
    };

    let run = match args.flow {
        Flow::Answer => {
            let request = AnswerRequest {
                question: args.request,
                channel,
            };
            agents::answer_question(&deps, request, &mut hooks).await?
        }
        Flow::Generate => {
            let request = GenerateRequest {
                instruction: args.request,
                channel,
            };
            let outcome = agents::generate_proposal(&deps, request, &mut hooks).await?;
            if let Some(handle) = &outcome.proposal {
                eprintln!("proposal #{} at {}", handle.id, handle.url);
            }
            outcome.run
        }
        Flow::Refine => {
            let id = args.proposal.context("--proposal is required for refine")?;
            let proposal = deps
                .proposals
                .fetch(&ProposalHandle {
                    id,
                    url: String::new(),
                })
                .await
                .with_context(|| format!("load proposal {id}"))?;
            let request = RefineRequest {
                proposal: proposal.handle,
                feedback: args.request,
            };
            agents::refine_proposal(&deps, request, &mut hooks).await?
        }
    };

    Ok(match run.stop {
        LoopStop::Completed => exit_codes::OK,
        LoopStop::BudgetExhausted => {
            eprintln!("step budget exhausted after {} steps", run.steps);
            exit_codes::BUDGET_EXHAUSTED
        }
    })
}

fn local_deps(root: &Path, config: AgentConfig, model: Arc<ReplayModel>) -> AgentDeps {
    let repo = Arc::new(LocalRepository::new(root, config.repository.clone()));
    let proposals: Arc<dyn ProposalStore> = Arc::new(LocalProposalStore::for_root(root));
    let sources = SourceManager::new().with(Arc::new(RepositorySource::new(
        repo.clone(),
        config.repository.host.clone(),
    )));
    AgentDeps {
        model,
        files: repo.clone(),
        store: repo,
        proposals,
        retrieval: None,
        sources,
        formatter: Arc::new(MarkdownFormatter),
        config,
    }
}

fn default_run_id() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    format!("run-{secs}")
}
