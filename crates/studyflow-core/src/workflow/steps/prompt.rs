//! Prompt construction for the model-backed steps.

use std::fmt::Write as _;

use studyflow_types::session::{LearningPlan, Quiz, RetrievedDocument, ScoreDetail};

/// Documents included in the quiz prompt.
pub const CONTEXT_DOC_LIMIT: usize = 3;

/// Characters kept from each context document.
pub const CONTEXT_CHAR_BUDGET: usize = 500;

pub const PLANNER_SYSTEM: &str = "You are an experienced tutor who designs focused study plans. \
Given a learner's question, produce a learning plan with a short topic title, at least three \
concrete learning objectives, at least five key points ordered by importance, a difficulty \
level (beginner, intermediate or advanced) and an estimated study time in minutes. \
Respond with JSON only.";

pub const QUIZ_SYSTEM: &str = "You write quizzes that check understanding of a study plan. \
Produce at least 5 questions: 3-4 multiple_choice questions with exactly four options \
labelled \"A. \" to \"D. \" and the correct letter as the answer, 1-2 fill_blank questions \
with a single word or short phrase as the answer, and 1 short_answer question with a model \
answer. Give multiple-choice questions 10-15 points, fill-blank 15-20 and short-answer 20-30 \
so the total is about 100. Every question needs a unique id (q1, q2, ...) and an explanation. \
Respond with JSON only.";

pub const SHORT_ANSWER_SYSTEM: &str = "You grade short written answers against a reference \
answer. Be fair: reward correct ideas even when phrased differently. Reply with exactly two \
lines:\nScore: <integer points>\nFeedback: <one or two sentences>";

pub const FEEDBACK_SYSTEM: &str = "You are an encouraging tutor reviewing a learner's quiz. \
Summarise how they did, explain the concepts behind each wrong answer, and suggest what to \
review next. Keep it under 250 words and address the learner directly.";

pub fn planner_user(question: &str) -> String {
    format!("Learner question:\n{question}\n\nCreate the learning plan.")
}

/// Reference material for quiz generation from the top documents.
pub fn quiz_context(docs: &[RetrievedDocument]) -> String {
    if docs.is_empty() {
        return "No reference documents are available; rely on your own knowledge of the topic."
            .to_string();
    }

    docs.iter()
        .take(CONTEXT_DOC_LIMIT)
        .enumerate()
        .map(|(i, doc)| format!("[Document {}]\n{}", i + 1, truncate_chars(&doc.content, CONTEXT_CHAR_BUDGET)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Keep at most `limit` characters, marking truncation with `...`.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

pub fn quiz_user(plan: &LearningPlan, context: &str) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Topic: {}", plan.topic);
    let _ = writeln!(prompt, "Difficulty: {}", plan.difficulty);
    let _ = writeln!(prompt, "\nObjectives:");
    for objective in &plan.objectives {
        let _ = writeln!(prompt, "- {objective}");
    }
    let _ = writeln!(prompt, "\nKey points:");
    for point in &plan.key_points {
        let _ = writeln!(prompt, "- {point}");
    }
    let _ = writeln!(prompt, "\nReference material:\n{context}");
    prompt.push_str("\nWrite the quiz.");
    prompt
}

pub fn short_answer_user(question: &str, reference: &str, answer: &str, points: u32) -> String {
    format!(
        "Question: {question}\nReference answer: {reference}\nLearner answer: {answer}\n\
         Maximum points: {points}\n\nGrade the learner answer."
    )
}

pub fn feedback_user(plan: &LearningPlan, quiz: Option<&Quiz>, score: u8, detail: &ScoreDetail) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "Topic: {} ({})", plan.topic, plan.difficulty);
    let _ = writeln!(prompt, "Score: {score}/100");
    let _ = writeln!(
        prompt,
        "Correct answers: {}/{}",
        detail.correct_count, detail.total_count
    );

    let wrong: Vec<_> = detail.question_scores.iter().filter(|s| !s.is_correct).collect();
    if wrong.is_empty() {
        prompt.push_str("\nEvery question was answered correctly.\n");
    } else {
        prompt.push_str("\nQuestions answered incorrectly:\n");
        for result in wrong {
            let question = quiz.and_then(|q| q.questions.iter().find(|q| q.id == result.question_id));
            let _ = writeln!(prompt, "\n[{}]", result.question_id);
            if let Some(question) = question {
                let _ = writeln!(prompt, "Question: {}", question.prompt);
                let _ = writeln!(prompt, "Explanation: {}", question.explanation);
            }
            let _ = writeln!(prompt, "Learner answer: {}", result.user_answer);
            let _ = writeln!(prompt, "Correct answer: {}", result.correct_answer);
        }
    }
    prompt.push_str("\nWrite the feedback.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_plan;
    use serde_json::Map;

    fn doc(content: &str) -> RetrievedDocument {
        RetrievedDocument {
            content: content.to_string(),
            metadata: Map::new(),
            relevance_score: 1.0,
        }
    }

    #[test]
    fn context_uses_first_three_docs_truncated() {
        let long = "x".repeat(800);
        let docs = vec![doc(&long), doc("second"), doc("third"), doc("fourth")];
        let context = quiz_context(&docs);

        assert!(context.contains(&format!("{}...", "x".repeat(500))));
        assert!(!context.contains(&"x".repeat(501)));
        assert!(context.contains("second"));
        assert!(context.contains("third"));
        assert!(!context.contains("fourth"));
    }

    #[test]
    fn context_without_docs_falls_back() {
        assert!(quiz_context(&[]).contains("own knowledge"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé...");
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn quiz_prompt_lists_plan() {
        let prompt = quiz_user(&sample_plan(), "ctx");
        assert!(prompt.contains("Topic: Rust ownership"));
        assert!(prompt.contains("- Each value has a single owner"));
        assert!(prompt.contains("Reference material:\nctx"));
    }
}
