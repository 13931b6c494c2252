//! Study session CLI commands.
//!
//! Every command prints styled text by default and the raw service response
//! with `--json`. Long-running commands show a spinner that follows the
//! engine's step events.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};

use studyflow_core::service::session::SubmitOutcome;
use studyflow_types::event::SessionEvent;
use studyflow_types::session::{
    AnswerMap, LearningPlan, QuestionType, Quiz, QuizQuestion, SessionStatus, StepName,
};

use crate::state::AppState;

/// Start a session and show the plan and first quiz.
///
/// ```bash
/// studyflow start "How does Rust ownership work?"
/// ```
pub async fn start(state: &AppState, question: &str, id: Option<String>, json: bool) -> Result<()> {
    state.require_model()?;

    let response = with_progress(state, "Planning your session...", json, async {
        state.sessions.start(id, question).await
    })
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Session {}",
        style("*").green().bold(),
        style(&response.session_id).cyan().bold()
    );
    if let Some(plan) = &response.learning_plan {
        print_plan(plan);
    }
    if let Some(quiz) = &response.quiz {
        print_quiz(quiz);
    }
    println!(
        "  Answer with: {}",
        style(format!("studyflow answer {}", response.session_id)).yellow()
    );
    println!();
    Ok(())
}

/// Submit answers from flags, a JSON file, or interactive prompts.
///
/// ```bash
/// studyflow answer study_1a2b3c4d5e6f -a q1=A -a q2=borrow
/// studyflow answer study_1a2b3c4d5e6f --file answers.json
/// studyflow answer study_1a2b3c4d5e6f
/// ```
pub async fn answer(
    state: &AppState,
    id: &str,
    pairs: &[String],
    file: Option<&Path>,
    json: bool,
) -> Result<()> {
    state.require_model()?;

    let answers = if let Some(path) = file {
        read_answers_file(path).await?
    } else if !pairs.is_empty() {
        parse_answer_pairs(pairs)?
    } else {
        let status = state.sessions.get_status(id).await?;
        if status.status != SessionStatus::Suspended {
            bail!("session '{id}' is not waiting for answers (status: {})", status.status);
        }
        let quiz = status
            .state
            .quiz
            .with_context(|| format!("session '{id}' has no quiz"))?;
        if !console::Term::stdout().is_term() {
            bail!("no answers given; pass --answer or --file when not running interactively");
        }
        prompt_answers(&quiz)?
    };

    let response = with_progress(state, "Grading your answers...", json, async {
        state.sessions.submit_answers(id, answers).await
    })
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!();
    let score = response.score.unwrap_or(0);
    let headline = match response.status {
        SubmitOutcome::Completed => style(format!("Passed with {score}/100")).green().bold(),
        SubmitOutcome::Retry => style(format!("Scored {score}/100")).yellow().bold(),
        SubmitOutcome::Failed => style(format!("Scored {score}/100")).red().bold(),
    };
    println!("  {headline}");

    if let Some(detail) = &response.score_detail {
        let mut table = Table::new();
        table.load_preset(presets::UTF8_FULL_CONDENSED);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Question").fg(Color::White),
            Cell::new("Your answer").fg(Color::White),
            Cell::new("Expected").fg(Color::White),
            Cell::new("Points").fg(Color::White),
        ]);
        for q in &detail.question_scores {
            let color = if q.is_correct { Color::Green } else { Color::Red };
            table.add_row(vec![
                Cell::new(&q.question_id).fg(Color::Cyan),
                Cell::new(truncate(&q.user_answer, 40)).fg(color),
                Cell::new(truncate(&q.correct_answer, 40)).fg(Color::DarkGrey),
                Cell::new(format!("{}/{}", q.points_earned, q.points_possible)),
            ]);
        }
        println!();
        println!("{table}");
    }

    if let Some(feedback) = &response.feedback {
        println!();
        for line in feedback.lines() {
            println!("  {line}");
        }
    }

    if let Some(quiz) = &response.quiz {
        print_quiz(quiz);
        println!(
            "  Answer with: {}",
            style(format!("studyflow answer {id}")).yellow()
        );
    }
    println!();
    Ok(())
}

/// Show the latest state of a session.
pub async fn status(state: &AppState, id: &str, json: bool) -> Result<()> {
    let status = state.sessions.get_status(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let s = &status.state;
    println!();
    println!("  Session {}", style(&status.session_id).cyan().bold());
    println!();
    println!("  {:<14} {}", style("Question").dim(), s.user_question);
    println!("  {:<14} {}", style("Status").dim(), status_label(status.status));
    println!("  {:<14} {}", style("Step").dim(), status.current_step);
    println!("  {:<14} {}", style("Attempts").dim(), s.attempts.len());
    if let Some(score) = s.score.or_else(|| s.last_attempt().map(|a| a.score)) {
        println!("  {:<14} {score}/100", style("Score").dim());
    }
    if let Some(error) = &s.error {
        println!("  {:<14} {}", style("Error").dim(), style(error).red());
        println!(
            "  {:<14} {}",
            "",
            style(format!("studyflow recover {id}")).yellow()
        );
    }
    println!(
        "  {:<14} {}",
        style("Updated").dim(),
        status.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();
    Ok(())
}

/// Show the checkpoint history, oldest first.
pub async fn history(state: &AppState, id: &str, json: bool) -> Result<()> {
    let history = state.sessions.get_history(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Step").fg(Color::White),
        Cell::new("Checkpoint").fg(Color::White),
        Cell::new("Time").fg(Color::White),
    ]);
    for (i, entry) in history.history.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1).fg(Color::DarkGrey),
            Cell::new(entry.step).fg(Color::Cyan),
            Cell::new(entry.checkpoint_id).fg(Color::DarkGrey),
            Cell::new(entry.timestamp.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }

    println!();
    println!("  History for {}", style(&history.session_id).cyan().bold());
    println!();
    println!("{table}");
    println!();
    Ok(())
}

/// List stored sessions, most recently updated first.
pub async fn list(state: &AppState, limit: usize, json: bool) -> Result<()> {
    let sessions = state.sessions.list_sessions(limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!();
        println!(
            "  {} No sessions yet. Start one with: {}",
            style("i").blue().bold(),
            style("studyflow start \"<question>\"").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Session").fg(Color::White),
        Cell::new("Question").fg(Color::White),
        Cell::new("Step").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Score").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
    ]);
    for s in &sessions {
        let status_color = match s.status {
            SessionStatus::Suspended => Color::Yellow,
            SessionStatus::Terminated => Color::Green,
            SessionStatus::Errored => Color::Red,
            SessionStatus::Running => Color::Blue,
        };
        table.add_row(vec![
            Cell::new(&s.session_id).fg(Color::Cyan),
            Cell::new(truncate(&s.user_question, 40)),
            Cell::new(s.current_step).fg(Color::DarkGrey),
            Cell::new(s.status).fg(status_color),
            Cell::new(s.score.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())),
            Cell::new(s.updated_at.format("%Y-%m-%d %H:%M")).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} session{}",
        style(sessions.len()).bold(),
        if sessions.len() == 1 { "" } else { "s" }
    );
    println!();
    Ok(())
}

/// Re-run the failed step of an errored session.
pub async fn recover(state: &AppState, id: &str, json: bool) -> Result<()> {
    state.require_model()?;

    let status = with_progress(state, "Recovering session...", json, async {
        state.sessions.recover(id).await
    })
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Session {} is {} at {}",
        style("*").green().bold(),
        style(id).cyan(),
        status_label(status.status),
        status.current_step
    );
    if status.status == SessionStatus::Suspended {
        if let Some(quiz) = &status.state.quiz {
            print_quiz(quiz);
        }
    }
    println!();
    Ok(())
}

/// Delete a session with confirmation.
pub async fn delete(state: &AppState, id: &str, force: bool, json: bool) -> Result<()> {
    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete session '{}' and all of its checkpoints?",
                style(id).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    state.sessions.delete(id).await?;

    if json {
        println!("{}", serde_json::json!({"deleted": true, "session_id": id}));
    } else {
        println!("  {} Session '{}' deleted.", style("x").red().bold(), id);
    }
    Ok(())
}

// --- Answer input ---

/// Parse `QID=ANSWER` pairs. Later pairs override earlier ones.
pub fn parse_answer_pairs(pairs: &[String]) -> Result<AnswerMap> {
    let mut answers = AnswerMap::new();
    for pair in pairs {
        let (qid, value) = pair
            .split_once('=')
            .with_context(|| format!("invalid answer '{pair}', expected QUESTION_ID=ANSWER"))?;
        let qid = qid.trim();
        if qid.is_empty() {
            bail!("invalid answer '{pair}': question id is empty");
        }
        answers.insert(qid.to_string(), value.trim().to_string());
    }
    Ok(answers)
}

async fn read_answers_file(path: &Path) -> Result<AnswerMap> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} must contain a JSON object of string answers", path.display()))
}

fn prompt_answers(quiz: &Quiz) -> Result<AnswerMap> {
    let mut answers = AnswerMap::new();
    for (i, question) in quiz.questions.iter().enumerate() {
        println!();
        println!(
            "  {} {}",
            style(format!("Q{} ({} pts)", i + 1, question.points_possible)).bold(),
            question.prompt
        );
        let answer = match (question.kind, question.options.as_deref()) {
            (QuestionType::MultipleChoice, Some(options)) if !options.is_empty() => {
                let picked = Select::new().items(options).default(0).interact()?;
                option_letter(&options[picked], picked)
            }
            _ => Input::<String>::new()
                .with_prompt("  Your answer")
                .allow_empty(true)
                .interact_text()?,
        };
        answers.insert(question.id.clone(), answer);
    }
    Ok(answers)
}

/// Letter of an option such as `"B. Borrowing"`, or the positional letter.
pub fn option_letter(option: &str, index: usize) -> String {
    let trimmed = option.trim_start();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), Some('.' | ')' | ':')) if letter.is_ascii_alphabetic() => {
            letter.to_ascii_uppercase().to_string()
        }
        _ => char::from(b'A' + (index % 26) as u8).to_string(),
    }
}

// --- Rendering helpers ---

fn print_plan(plan: &LearningPlan) {
    println!();
    println!(
        "  {} ({}, about {} min)",
        style(&plan.topic).bold(),
        plan.difficulty,
        plan.estimated_minutes
    );
    println!();
    println!("  {}", style("Objectives").underlined());
    for objective in &plan.objectives {
        println!("    - {objective}");
    }
    println!("  {}", style("Key points").underlined());
    for point in &plan.key_points {
        println!("    - {point}");
    }
}

fn print_quiz(quiz: &Quiz) {
    println!();
    println!(
        "  {} {} questions, {} points, about {} min",
        style("Quiz").bold(),
        quiz.questions.len(),
        quiz.total_points,
        quiz.suggested_minutes
    );
    for question in &quiz.questions {
        print_question(question);
    }
    println!();
}

fn print_question(question: &QuizQuestion) {
    println!();
    println!(
        "  {} {} {}",
        style(&question.id).cyan().bold(),
        style(format!("[{}, {} pts]", question.kind, question.points_possible)).dim(),
        question.prompt
    );
    if let Some(options) = &question.options {
        for option in options {
            println!("      {option}");
        }
    }
}

fn status_label(status: SessionStatus) -> String {
    let text = status.as_str();
    match status {
        SessionStatus::Suspended => style(text).yellow().to_string(),
        SessionStatus::Terminated => style(text).green().to_string(),
        SessionStatus::Errored => style(text).red().to_string(),
        SessionStatus::Running => style(text).blue().to_string(),
    }
}

fn step_message(step: StepName) -> &'static str {
    match step {
        StepName::Planner => "Building a learning plan...",
        StepName::Retrieval => "Searching your notes...",
        StepName::QuizGenerator => "Writing a quiz...",
        StepName::Grading => "Grading your answers...",
        StepName::Feedback => "Preparing feedback...",
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Run `fut` behind a spinner whose message follows `StepStarted` events.
/// No spinner in JSON mode.
async fn with_progress<T, E>(
    state: &AppState,
    initial: &str,
    json: bool,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    if json {
        return Ok(fut.await?);
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message(initial.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));

    let mut rx = state.events.subscribe();
    let follower = {
        let spinner = spinner.clone();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                if let SessionEvent::StepStarted { step, .. } = event {
                    spinner.set_message(step_message(step));
                }
            }
        })
    };

    let result = fut.await;
    follower.abort();
    spinner.finish_and_clear();
    Ok(result?)
}
