//! Card dealing and the call history.

use fundplay_protocol::{BALL_COUNT, BingoCard, CARD_SIZE};
use rand::Rng;
use rand::seq::SliceRandom;

/// Deals a card: each column takes five distinct numbers from its band.
pub(crate) fn deal_card<R: Rng + ?Sized>(rng: &mut R) -> BingoCard {
    let mut rows = [[0u8; CARD_SIZE]; CARD_SIZE];
    for col in 0..CARD_SIZE {
        let mut band: Vec<u8> = BingoCard::column_range(col).collect();
        band.shuffle(rng);
        for (row, number) in band.into_iter().take(CARD_SIZE).enumerate() {
            rows[row][col] = number;
        }
    }
    BingoCard { rows }
}

/// Numbers drawn so far, in draw order, without replacement.
#[derive(Debug, Clone)]
pub(crate) struct CallHistory {
    called: Vec<u8>,
    remaining: Vec<u8>,
    seen: [bool; BALL_COUNT as usize + 1],
}

impl CallHistory {
    pub(crate) fn new() -> Self {
        Self {
            called: Vec::with_capacity(BALL_COUNT as usize),
            remaining: (1..=BALL_COUNT).collect(),
            seen: [false; BALL_COUNT as usize + 1],
        }
    }

    /// Draws a number not drawn before. `None` once all 75 are out.
    pub(crate) fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<u8> {
        if self.remaining.is_empty() {
            return None;
        }
        let index = rng.random_range(0..self.remaining.len());
        let number = self.remaining.swap_remove(index);
        self.called.push(number);
        self.seen[usize::from(number)] = true;
        Some(number)
    }

    pub(crate) fn is_called(&self, number: u8) -> bool {
        self.seen.get(usize::from(number)).copied().unwrap_or(false)
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.called
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }
}
