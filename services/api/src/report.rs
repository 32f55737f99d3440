use crate::infra::{parse_answers, AnswerList};
use clap::Args;
use quiz_funnel::config::TelemetryConfig;
use quiz_funnel::error::AppError;
use quiz_funnel::funnel::catalog::{self, CharacterCard, Landing};
use quiz_funnel::funnel::flow::DEFAULT_FALLBACK_OUTCOME;
use quiz_funnel::funnel::{
    ConditionReport, FlowError, FlowSettings, FlowState, FunnelSource, QuizFlow,
};
use quiz_funnel::telemetry::{self, LogSink};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Directory holding quiz.json and conditions.json
    #[arg(long, default_value = "public/json")]
    pub(crate) fixtures: PathBuf,
    /// Comma-separated zero-based option index per question (e.g. 0,2,1)
    #[arg(long, value_parser = parse_answers)]
    pub(crate) answers: AnswerList,
    /// Outcome used when no condition matches
    #[arg(long, default_value = DEFAULT_FALLBACK_OUTCOME)]
    pub(crate) fallback: String,
    /// Emit the condition table as CSV instead of text
    #[arg(long)]
    pub(crate) csv: bool,
    /// Log filter for diagnostics written to stderr
    #[arg(long, default_value = "warn")]
    pub(crate) log_level: String,
}

#[derive(Args, Debug)]
pub(crate) struct CatalogArgs {
    /// Directory holding blogs.json
    #[arg(long, default_value = "public/json")]
    pub(crate) fixtures: PathBuf,
}

/// Outcome of replaying answers through a fresh flow.
pub(crate) struct ScoreRun {
    pub(crate) report: ConditionReport,
    pub(crate) completed: Option<String>,
    pub(crate) stopped: Option<(usize, FlowError)>,
}

pub(crate) async fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    telemetry::init_with_sink(
        &TelemetryConfig {
            log_level: args.log_level.clone(),
        },
        LogSink::Stderr,
    )?;

    let source = FunnelSource::Fixture {
        dir: args.fixtures.clone(),
    };
    let questions = source.load_quiz().await?;
    let conditions = source.load_conditions_or_empty().await;

    let mut flow = QuizFlow::with_questions(
        FlowSettings {
            transition_delay: Duration::ZERO,
            fallback_outcome: args.fallback.clone(),
        },
        questions,
    );
    flow.set_conditions(conditions);

    let run = replay(&mut flow, &args.answers);
    if args.csv {
        run.report.write_csv(std::io::stdout())?;
    } else {
        render_score(&run);
    }
    Ok(())
}

pub(crate) fn replay(flow: &mut QuizFlow, answers: &AnswerList) -> ScoreRun {
    let now = Instant::now();
    let mut stopped = None;

    for (position, option) in answers.0.iter().enumerate() {
        let step = flow
            .select(*option, now)
            .and_then(|()| flow.advance(now).map(drop));
        if let Err(err) = step {
            stopped = Some((position + 1, err));
            break;
        }
    }

    let completed = match flow.state() {
        FlowState::Completed { outcome } => Some(outcome.clone()),
        _ => None,
    };

    ScoreRun {
        report: flow.report(),
        completed,
        stopped,
    }
}

fn render_score(run: &ScoreRun) {
    let report = &run.report;

    println!("Total summation");
    if report.totals.is_empty() {
        println!("- (no parameters)");
    }
    for (name, value) in &report.totals {
        println!("- {name}: {value}");
    }

    println!(
        "\nCondition matching ({} conditions loaded, {} inert)",
        report.loaded, report.inert
    );
    for row in &report.rows {
        let marker = if row.matched {
            "match"
        } else if row.parsed {
            "-"
        } else {
            "inert"
        };
        println!(
            "- [{}] {} | {} | {}",
            marker,
            row.redirect,
            row.text,
            row.params_label()
        );
    }

    if let Some((question, err)) = &run.stopped {
        println!("\nStopped at question {question}: {err}");
    }

    match &run.completed {
        Some(outcome) => println!(
            "\nResult: {} -> /quiz/result/{}",
            outcome,
            catalog::outcome_slug(outcome)
        ),
        None => println!(
            "\nQuiz not completed; current best match would be {}",
            report.outcome
        ),
    }
}

pub(crate) async fn run_catalog(args: CatalogArgs) -> Result<(), AppError> {
    let source = FunnelSource::Fixture { dir: args.fixtures };
    let landing = Landing::build(&source.load_blogs().await?);

    for (index, row) in landing.rows.iter().enumerate() {
        println!("Row {}", index + 1);
        for card in row {
            render_card(card);
        }
    }

    println!("\n{} result images to preload", landing.preload.len());
    Ok(())
}

fn render_card(card: &CharacterCard) {
    println!(
        "- #{} {} ({}) {}",
        card.id, card.kind, card.bg_color, card.description
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> FunnelSource {
        FunnelSource::Fixture {
            dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../public/json")),
        }
    }

    async fn flow() -> QuizFlow {
        let source = fixtures();
        let questions = source.load_quiz().await.expect("quiz fixture");
        let mut flow = QuizFlow::with_questions(
            FlowSettings {
                transition_delay: Duration::ZERO,
                fallback_outcome: DEFAULT_FALLBACK_OUTCOME.to_string(),
            },
            questions,
        );
        flow.set_conditions(source.load_conditions_or_empty().await);
        flow
    }

    #[tokio::test]
    async fn replay_completes_with_matched_outcome() {
        let mut flow = flow().await;
        let run = replay(&mut flow, &AnswerList(vec![1, 1, 1]));

        assert_eq!(run.completed.as_deref(), Some("ウゴービ"));
        assert!(run.stopped.is_none());
        assert_eq!(run.report.outcome, "ウゴービ");
    }

    #[tokio::test]
    async fn replay_stops_on_invalid_option() {
        let mut flow = flow().await;
        let run = replay(&mut flow, &AnswerList(vec![0, 9]));

        assert!(run.completed.is_none());
        assert!(matches!(
            run.stopped,
            Some((2, FlowError::OptionOutOfRange { option: 9, .. }))
        ));
    }

    #[tokio::test]
    async fn partial_replay_reports_current_best_match() {
        let mut flow = flow().await;
        let run = replay(&mut flow, &AnswerList(vec![0, 0]));

        assert!(run.completed.is_none());
        assert_eq!(run.report.outcome, "マンジャロ");
        assert_eq!(run.report.totals, vec![("param1".to_string(), 5), ("param2".to_string(), 0)]);
    }
}
