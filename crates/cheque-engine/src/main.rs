use anyhow::{Context, Result};
use cheque_engine::logging::{self, LogFormat, DEFAULT_FILTER};
use cheque_engine::{EngineConfig, EngineError, MilestoneEngine};
use cheque_milestone::{ContractId, ContractSnapshot, MemoryStore, MilestoneId};
use cheque_schedule::CycleDetectedError;
use chrono::{DateTime, Utc};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

fn contract_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("snapshot")
            .long("snapshot")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("JSON contract snapshot (milestones, dependencies, progress history)"),
    )
    .arg(
        Arg::new("config")
            .long("config")
            .value_parser(value_parser!(PathBuf))
            .help("Engine config TOML"),
    )
    .arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Output as JSON"),
    )
    .arg(
        Arg::new("now")
            .long("now")
            .help("Reference time for reports (RFC 3339), defaults to the current time"),
    )
}

fn cli() -> Command {
    Command::new("milestone-engine")
        .version(cheque_engine::VERSION)
        .about(
            "Dependency validation, critical-path scheduling and progress reports \
             for contract milestones",
        )
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines on stderr"),
        )
        .subcommand(contract_args(
            Command::new("validate").about("Check the dependency graph for cycles"),
        ))
        .subcommand(contract_args(
            Command::new("order").about("Print milestones in dependency order"),
        ))
        .subcommand(contract_args(
            Command::new("timeline").about("Critical-path timeline"),
        ))
        .subcommand(contract_args(
            Command::new("stats").about("Completion statistics"),
        ))
        .subcommand(contract_args(Command::new("risk").about("Risk analysis")))
        .subcommand(contract_args(
            Command::new("delays").about("Overdue milestones, most delayed first"),
        ))
        .subcommand(contract_args(
            Command::new("trend").about("Completion trend from progress history"),
        ))
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();

    let format = if matches.get_flag("log-json") {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    if let Err(e) = logging::init(format, DEFAULT_FILTER) {
        eprintln!("warning: logging not initialised: {e}");
    }

    match run(&matches).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(matches: &ArgMatches) -> Result<ExitCode> {
    let Some((name, args)) = matches.subcommand() else {
        anyhow::bail!("no subcommand given");
    };

    let snapshot_path = args
        .get_one::<PathBuf>("snapshot")
        .context("--snapshot is required")?;
    let raw = std::fs::read_to_string(snapshot_path)
        .with_context(|| format!("reading snapshot {}", snapshot_path.display()))?;
    let snapshot: ContractSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("parsing snapshot {}", snapshot_path.display()))?;

    let config = match args.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let now = match args.get_one::<String>("now") {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("invalid --now {s}"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };
    let json = args.get_flag("json");

    let contract = snapshot.contract_id;
    let titles: HashMap<MilestoneId, String> = snapshot
        .milestones
        .iter()
        .map(|m| (m.id, m.title.clone()))
        .collect();
    let title = |id: &MilestoneId| titles.get(id).cloned().unwrap_or_default();

    let engine = MilestoneEngine::new(Arc::new(MemoryStore::from_snapshot(snapshot)), config)?;

    match dispatch(&engine, name, contract, now, json, &title).await {
        Ok(code) => Ok(code),
        Err(e) => match e.downcast_ref::<EngineError>().and_then(EngineError::as_cycle) {
            Some(cycle) => {
                report_cycle(cycle, json, &title)?;
                Ok(ExitCode::from(1))
            }
            None => Err(e),
        },
    }
}

async fn dispatch(
    engine: &MilestoneEngine<MemoryStore>,
    name: &str,
    contract: ContractId,
    now: DateTime<Utc>,
    json: bool,
    title: &dyn Fn(&MilestoneId) -> String,
) -> Result<ExitCode> {
    match name {
        "validate" => {
            if !engine.validate_dependency_graph(contract).await? {
                // surfaces the cycle report
                engine.topological_order(contract).await?;
            }
            emit(&serde_json::json!({ "valid": true }), json, |_| {
                "dependency graph is acyclic".to_string()
            })?;
        }
        "order" => {
            let ids = engine.topological_order(contract).await?;
            emit(&ids, json, |ids| {
                ids.iter()
                    .enumerate()
                    .map(|(i, id)| format!("{:>3}. {} {}", i + 1, id, title(id)))
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        "timeline" => {
            let t = engine.timeline_analysis(contract).await?;
            emit(&t, json, |t| {
                let mut out = format!(
                    "total {}h, critical path {}h, slack {}h",
                    t.total_duration.num_hours(),
                    t.critical_path_duration.num_hours(),
                    t.slack_time.num_hours()
                );
                for e in &t.entries {
                    out.push_str(&format!(
                        "\n{} {:<30} ES {:>5}h EF {:>5}h slack {:>5}h{}",
                        if e.timing.is_critical { "*" } else { " " },
                        e.title,
                        e.timing.earliest_start.num_hours(),
                        e.timing.earliest_finish.num_hours(),
                        e.timing.slack.num_hours(),
                        e.window
                            .map(|w| format!("  {} .. {}", w.earliest_start, w.earliest_finish))
                            .unwrap_or_default()
                    ));
                }
                out
            })?;
        }
        "stats" => {
            let s = engine.completion_stats(contract, now).await?;
            emit(&s, json, |s| {
                format!(
                    "total {} completed {} pending {} overdue {} cancelled {}\n\
                     completion {:.1}% average progress {:.1}%",
                    s.total,
                    s.completed,
                    s.pending,
                    s.overdue,
                    s.cancelled,
                    s.completion_rate,
                    s.average_completion
                )
            })?;
        }
        "risk" => {
            let r = engine.risk_analysis(contract).await?;
            emit(&r, json, |r| {
                let mut out = format!(
                    "overall {:.1} (high {} medium {} low {})",
                    r.overall_score,
                    r.high.len(),
                    r.medium.len(),
                    r.low.len()
                );
                for c in &r.contingencies {
                    let plans = if c.plans.is_empty() {
                        "no contingency plan".to_string()
                    } else {
                        c.plans.join("; ")
                    };
                    out.push_str(&format!("\n! {}: {}", c.title, plans));
                }
                out
            })?;
        }
        "delays" => {
            let d = engine.delayed_milestones_report(contract, now).await?;
            emit(&d, json, |d| {
                if d.is_empty() {
                    return "nothing overdue".to_string();
                }
                d.delayed
                    .iter()
                    .map(|m| {
                        format!(
                            "{}{:<30} {:>4}d late ({:.0}% done)",
                            if m.is_critical { "*" } else { " " },
                            m.title,
                            m.delay.num_days(),
                            m.percentage_complete
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        "trend" => {
            let t = engine.progress_trend(contract, now).await?;
            emit(&t, json, |t| {
                if t.points.is_empty() {
                    return "no progress recorded".to_string();
                }
                t.points
                    .iter()
                    .map(|p| {
                        format!(
                            "{}  {:>5.1}% complete  {:>5.1}% avg  {} update(s)",
                            p.period_start.date_naive(),
                            p.completion_rate,
                            p.average_progress,
                            p.updates
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        other => anyhow::bail!("unknown subcommand {other}"),
    }
    Ok(ExitCode::SUCCESS)
}

fn report_cycle(
    cycle: &CycleDetectedError,
    json: bool,
    title: &dyn Fn(&MilestoneId) -> String,
) -> Result<()> {
    if json {
        let body = serde_json::json!({
            "valid": false,
            "cycle_members": cycle.cycle_members,
            "cycles": cycle.cycles,
            "blocked": cycle.blocked,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }
    println!("dependency cycle involving {} milestone(s):", cycle.cycle_members.len());
    for id in &cycle.cycle_members {
        println!("  {id} {}", title(id));
    }
    if !cycle.blocked.is_empty() {
        println!("blocked behind the cycle: {}", cycle.blocked.len());
    }
    Ok(())
}

fn emit<T: Serialize>(value: &T, json: bool, text: impl FnOnce(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text(value));
    }
    Ok(())
}
