use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use arbiter_core::{
    Context, Decision, JsonRuleEvaluator, RuleSet, RuleTrace, ScoringStrategy, TracingAuditSink,
    Validator,
};
use arbiter_runtime::{DecisionService, RuntimeConfig};

#[derive(Parser)]
#[command(name = "arbiter", version, about = "Rule-based policy decisions")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate rule-set documents and report every error
    Validate {
        /// Rule-set files (.json, .yaml or .yml)
        #[arg(required = true)]
        rules: Vec<PathBuf>,
    },

    /// Decide for a context document
    Decide {
        /// Rule-set files; each becomes one evaluator
        #[arg(short, long, required = true, num_args = 1..)]
        rules: Vec<PathBuf>,

        /// Context document, or "-" for stdin
        #[arg(short, long)]
        context: String,

        /// Runtime configuration file (.yaml, .yml or .json)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Scoring strategy, overriding the configuration
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Confidence cutoff for the threshold strategy
        #[arg(long)]
        threshold: Option<f64>,

        /// Fallback decision for the threshold strategy
        #[arg(long)]
        fallback: Option<String>,

        /// Print rule traces
        #[arg(long)]
        trace: bool,

        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Weighted,
    Max,
    Consensus,
    Threshold,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    decision: &'a Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    traces: Option<&'a [RuleTrace]>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Validate { rules } => validate(&rules),
        Commands::Decide {
            rules,
            context,
            config,
            strategy,
            threshold,
            fallback,
            trace,
            format,
        } => {
            let mut config = match config {
                Some(path) => load_config(&path)?,
                None => RuntimeConfig::default(),
            };
            config.strategy = select_strategy(config.strategy, strategy, threshold, fallback)?;
            config.validate()?;

            decide(&rules, &context, config, trace, format).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn validate(paths: &[PathBuf]) -> Result<ExitCode> {
    let validator = Validator::new();
    let mut invalid = 0;

    for path in paths {
        let document = read_document(path)?;
        let errors = validator.validate(&document);
        if errors.is_empty() {
            let rules = document.get("rules").and_then(Value::as_array).map_or(0, Vec::len);
            println!("{}: ok ({} rules)", path.display(), rules);
        } else {
            invalid += 1;
            println!("{}: {} error(s)", path.display(), errors.len());
            for error in errors {
                println!("  - {}", error);
            }
        }
    }

    Ok(if invalid == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn decide(rules: &[PathBuf], context: &str, config: RuntimeConfig, trace: bool, format: Format) -> Result<()> {
    let mut builder = config.agent_builder().audit_sink(Arc::new(TracingAuditSink));
    for path in rules {
        let document = read_document(path)?;
        let rule_set = RuleSet::from_value(&document)
            .with_context(|| format!("invalid rule set {}", path.display()))?;
        tracing::info!(path = %path.display(), version = rule_set.version(), rules = rule_set.len(), "Loaded rule set");
        builder = builder.evaluator(JsonRuleEvaluator::new(rule_set).with_name(evaluator_name(path)));
    }
    let agent = builder.build()?;

    let context = Context::from_value(read_context(context)?);
    let service = DecisionService::new(Arc::new(agent), config);

    let (decision, traces) = if trace {
        let (decision, traces) = service.decide_traced(context, None).await?;
        (decision, Some(traces))
    } else {
        (service.decide(context, None).await?, None)
    };

    match format {
        Format::Json => {
            let report = Report {
                decision: &decision,
                traces: traces.as_deref(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Format::Text => print!("{}", render_text(&decision, traces.as_deref())),
    }
    Ok(())
}

fn select_strategy(
    configured: ScoringStrategy,
    strategy: Option<StrategyArg>,
    threshold: Option<f64>,
    fallback: Option<String>,
) -> Result<ScoringStrategy> {
    let strategy = match strategy {
        None => configured,
        Some(StrategyArg::Weighted) => ScoringStrategy::WeightedAverage,
        Some(StrategyArg::Max) => ScoringStrategy::MaxWeight,
        Some(StrategyArg::Consensus) => ScoringStrategy::Consensus,
        Some(StrategyArg::Threshold) => match configured {
            threshold @ ScoringStrategy::Threshold { .. } => threshold,
            _ => ScoringStrategy::threshold(),
        },
    };

    match strategy {
        ScoringStrategy::Threshold {
            threshold: configured_threshold,
            fallback: configured_fallback,
        } => Ok(ScoringStrategy::Threshold {
            threshold: threshold.unwrap_or(configured_threshold),
            fallback: fallback.unwrap_or(configured_fallback),
        }),
        other if threshold.is_some() || fallback.is_some() => {
            bail!("--threshold and --fallback only apply to the threshold strategy, not {}", other.name())
        }
        other => Ok(other),
    }
}

fn render_text(decision: &Decision, traces: Option<&[RuleTrace]>) -> String {
    let mut out = String::new();
    out.push_str(&format!("decision:   {}\n", decision.decision));
    out.push_str(&format!("confidence: {:.2}\n", decision.confidence));
    out.push_str("explanations:\n");
    for line in &decision.explanations {
        out.push_str(&format!("  - {}\n", line));
    }

    if let Some(traces) = traces {
        out.push_str("traces:\n");
        for rule in traces {
            let status = if rule.matched { "matched" } else { "no match" };
            out.push_str(&format!("  rule {} ({}): {}\n", rule.rule_id, rule.decision, status));
            for condition in &rule.condition_traces {
                let mark = if condition.result { "+" } else { "-" };
                let actual = condition
                    .actual_value
                    .as_ref()
                    .map_or_else(|| "missing".to_string(), Value::to_string);
                out.push_str(&format!("    {} {} (actual: {})\n", mark, condition.description, actual));
            }
        }
    }
    out
}

fn evaluator_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("rules")
        .to_string()
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn parse_document(text: &str, yaml: bool) -> Result<Value> {
    if yaml {
        Ok(serde_yaml::from_str(text)?)
    } else {
        Ok(serde_json::from_str(text)?)
    }
}

fn read_document(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_document(&text, is_yaml(path)).with_context(|| format!("failed to parse {}", path.display()))
}

fn read_context(source: &str) -> Result<Value> {
    let document = if source == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("failed to read context from stdin")?;
        parse_document(&text, false).context("failed to parse context from stdin")?
    } else {
        read_document(Path::new(source))?
    };

    if !document.is_object() {
        bail!("context must be a JSON object");
    }
    Ok(document)
}

fn load_config(path: &Path) -> Result<RuntimeConfig> {
    let config = if is_yaml(path) {
        RuntimeConfig::from_yaml_file(path)
    } else {
        RuntimeConfig::from_json_file(path)
    };
    config.with_context(|| format!("failed to load config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_core::{ConditionTrace, Evaluation};
    use serde_json::json;

    #[test]
    fn test_cli_parses_decide() {
        let cli = Cli::try_parse_from([
            "arbiter", "decide", "--rules", "a.json", "b.yaml", "--context", "-", "--strategy",
            "threshold", "--threshold", "0.8", "--trace", "-f", "json",
        ])
        .unwrap();

        let Commands::Decide { rules, context, strategy, threshold, trace, format, .. } = cli.command else {
            panic!("expected decide");
        };
        assert_eq!(rules.len(), 2);
        assert_eq!(context, "-");
        assert_eq!(strategy, Some(StrategyArg::Threshold));
        assert_eq!(threshold, Some(0.8));
        assert!(trace);
        assert_eq!(format, Format::Json);
    }

    #[test]
    fn test_select_strategy() {
        let strategy = select_strategy(
            ScoringStrategy::default(),
            Some(StrategyArg::Threshold),
            Some(0.9),
            None,
        )
        .unwrap();
        assert_eq!(
            strategy,
            ScoringStrategy::Threshold {
                threshold: 0.9,
                fallback: "review".into()
            }
        );

        let kept = select_strategy(ScoringStrategy::Consensus, None, None, None).unwrap();
        assert_eq!(kept, ScoringStrategy::Consensus);

        assert!(select_strategy(ScoringStrategy::default(), Some(StrategyArg::Max), Some(0.5), None).is_err());
    }

    #[test]
    fn test_yaml_detection() {
        assert!(is_yaml(Path::new("rules/loan.yaml")));
        assert!(is_yaml(Path::new("loan.yml")));
        assert!(!is_yaml(Path::new("loan.json")));
        assert_eq!(evaluator_name(Path::new("rules/loan.yaml")), "loan");
    }

    #[test]
    fn test_render_text_with_traces() {
        let decision = ScoringStrategy::WeightedAverage
            .score(&[Evaluation::new("approve", 0.9, None, "loan").unwrap()]);
        let traces = vec![RuleTrace {
            rule_id: "adult".into(),
            matched: true,
            condition_traces: vec![ConditionTrace::new("age", "gte", &json!(18), Some(&json!(20)), true)],
            decision: "approve".into(),
            weight: 0.9,
            reason: None,
        }];

        let text = render_text(&decision, Some(&traces));
        assert!(text.starts_with("decision:   approve\nconfidence: 1.00\n"));
        assert!(text.contains("  - loan: approve (weight 0.90)\n"));
        assert!(text.contains("  rule adult (approve): matched\n"));
        assert!(text.contains("    + age >= 18 (actual: 20)\n"));
    }

    #[test]
    fn test_json_report_flattens_decision() {
        let decision = Decision::no_decision();
        let report = Report {
            decision: &decision,
            traces: None,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["decision"], "no_decision");
        assert!(value.get("traces").is_none());
    }
}
