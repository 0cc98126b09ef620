//! Quiz progress, the open question, and scoring.

use fundplay_protocol::{Award, QuestionView, QuizProgress, ScoreEntry, Standing};

use crate::config::QuizConfig;
use crate::roster::Roster;

/// Number of quiz placings paid out.
pub(crate) const PODIUM: usize = 3;

#[derive(Debug, Clone)]
struct ActiveQuestion {
    view: QuestionView,
    correct: Option<usize>,
    scored: bool,
}

/// Round and question counters plus the question on screen.
#[derive(Debug, Clone)]
pub(crate) struct QuizState {
    progress: QuizProgress,
    current: Option<ActiveQuestion>,
    open: bool,
}

impl QuizState {
    pub(crate) fn new(config: &QuizConfig) -> Self {
        Self {
            progress: QuizProgress {
                round: 1,
                question_index: 0,
                total_rounds: config.total_rounds,
                questions_per_round: config.questions_per_round,
            },
            current: None,
            open: false,
        }
    }

    pub(crate) fn progress(&self) -> QuizProgress {
        self.progress
    }

    pub(crate) fn round_exhausted(&self) -> bool {
        self.progress.question_index >= self.progress.questions_per_round
    }

    pub(crate) fn is_final_round(&self) -> bool {
        self.progress.round >= self.progress.total_rounds
    }

    /// Whether the current question still takes answers.
    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn current_view(&self) -> Option<&QuestionView> {
        self.current.as_ref().map(|q| &q.view)
    }

    /// Moves to the next question in the round and opens it.
    pub(crate) fn issue_next(&mut self, config: &QuizConfig) -> QuestionView {
        self.progress.question_index += 1;
        let QuizProgress {
            round,
            question_index,
            questions_per_round,
            ..
        } = self.progress;

        let bank_index = (round - 1) as usize * questions_per_round as usize
            + (question_index - 1) as usize;
        let (text, options, correct) = match config.questions.get(bank_index) {
            Some(q) => (q.text.clone(), q.options.clone(), q.correct_option),
            None => (format!("Round {round}, question {question_index}"), Vec::new(), None),
        };

        let view = QuestionView {
            round,
            question_index,
            text,
            options,
            time_limit_secs: u32::try_from(config.time_limit.as_secs()).unwrap_or(u32::MAX),
        };
        self.current = Some(ActiveQuestion {
            view: view.clone(),
            correct,
            scored: false,
        });
        self.open = true;
        view
    }

    /// Closes the question if `round`/`question_index` is still the open one.
    pub(crate) fn time_up(&mut self, round: u32, question_index: u32) -> bool {
        let matches = self
            .current
            .as_ref()
            .is_some_and(|q| q.view.round == round && q.view.question_index == question_index);
        if matches && self.open {
            self.open = false;
            true
        } else {
            false
        }
    }

    /// Starts the next round with the question counter at zero.
    pub(crate) fn advance_round(&mut self) {
        self.progress.round += 1;
        self.progress.question_index = 0;
        self.current = None;
        self.open = false;
    }

    /// Scores the current question once and clears every answer.
    ///
    /// Returns the full score table if anything was scored.
    pub(crate) fn score_current(
        &mut self,
        roster: &mut Roster,
        points: u32,
    ) -> Option<Vec<ScoreEntry>> {
        self.open = false;
        let question = self.current.as_mut().filter(|q| !q.scored)?;
        question.scored = true;

        for player in roster.players_mut() {
            if let (Some(answer), Some(correct)) = (player.answer.take(), question.correct) {
                if answer == correct {
                    player.score += points;
                }
            }
        }
        Some(score_table(roster))
    }
}

pub(crate) fn score_table(roster: &Roster) -> Vec<ScoreEntry> {
    roster
        .players()
        .map(|p| ScoreEntry {
            participant_id: p.id.clone(),
            score: p.score,
        })
        .collect()
}

/// Top scorers with a positive score, best first. Ties keep join order.
pub(crate) fn final_standings(roster: &Roster) -> Vec<Standing> {
    let mut ranked: Vec<_> = roster
        .players()
        .filter(|p| p.score > 0)
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));

    ranked
        .into_iter()
        .take(PODIUM)
        .enumerate()
        .map(|(i, p)| Standing {
            award: Award::Quiz {
                place: i as u8 + 1,
                score: p.score,
            },
            winners: vec![p.id.clone()],
        })
        .collect()
}
