//! Flashcard carousel transition state machine.
//!
//! A navigation slides the current card out, swaps the index, then slides the
//! new card in. While either phase runs the carousel is busy and further
//! requests are dropped. Phase timing is owned by the caller, which calls
//! [`Carousel::finish_slide_out`] and [`Carousel::finish_slide_in`].

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Duration of each animation phase.
pub const SLIDE_DURATION: Duration = Duration::from_millis(300);

/// Which way the cards slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

/// Animation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "direction", rename_all = "snake_case")]
pub enum CarouselPhase {
    Idle,
    SlidingOut(Direction),
    SlidingIn(Direction),
}

/// A navigation request from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "index", rename_all = "snake_case")]
pub enum NavRequest {
    Next,
    Prev,
    /// Jump to a 0-based card index.
    Jump(usize),
}

/// An accepted navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: usize,
    pub to: usize,
    pub direction: Direction,
}

/// Why a request was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CarouselError {
    #[error("a card transition is already running")]
    Busy,
    #[error("cards are being translated")]
    Translating,
    #[error("the deck is empty")]
    EmptyDeck,
    #[error("card {index} is out of range for a deck of {len}")]
    OutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone)]
pub struct Carousel {
    len: usize,
    index: usize,
    phase: CarouselPhase,
    target: Option<usize>,
    flipped: bool,
    translating: bool,
}

impl Carousel {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            index: 0,
            phase: CarouselPhase::Idle,
            target: None,
            flipped: false,
            translating: false,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn phase(&self) -> CarouselPhase {
        self.phase
    }

    pub fn is_animating(&self) -> bool {
        self.phase != CarouselPhase::Idle
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    pub fn is_translating(&self) -> bool {
        self.translating
    }

    /// Restore a saved position. Ignored unless idle and in range.
    pub fn restore(&mut self, index: usize) -> bool {
        if self.is_animating() || index >= self.len {
            return false;
        }
        self.index = index;
        true
    }

    /// Gate navigation while a translation fetch is in flight.
    pub fn set_translating(&mut self, translating: bool) {
        self.translating = translating;
    }

    /// Start a transition. `Ok(None)` means the target is the current card.
    pub fn request(&mut self, request: NavRequest) -> Result<Option<Transition>, CarouselError> {
        if self.is_animating() {
            return Err(CarouselError::Busy);
        }
        if self.translating {
            return Err(CarouselError::Translating);
        }
        if self.len == 0 {
            return Err(CarouselError::EmptyDeck);
        }

        let (to, direction) = match request {
            NavRequest::Next => ((self.index + 1) % self.len, Direction::Forward),
            NavRequest::Prev => ((self.index + self.len - 1) % self.len, Direction::Backward),
            NavRequest::Jump(to) => {
                if to >= self.len {
                    return Err(CarouselError::OutOfRange { index: to, len: self.len });
                }
                let direction = if to > self.index {
                    Direction::Forward
                } else {
                    Direction::Backward
                };
                (to, direction)
            }
        };

        if to == self.index {
            return Ok(None);
        }

        self.flipped = false;
        self.target = Some(to);
        self.phase = CarouselPhase::SlidingOut(direction);

        Ok(Some(Transition {
            from: self.index,
            to,
            direction,
        }))
    }

    /// The outgoing card is gone: commit the new index and slide it in.
    pub fn finish_slide_out(&mut self) {
        if let CarouselPhase::SlidingOut(direction) = self.phase {
            if let Some(target) = self.target.take() {
                self.index = target;
            }
            self.phase = CarouselPhase::SlidingIn(direction);
        }
    }

    /// The incoming card has settled.
    pub fn finish_slide_in(&mut self) {
        if let CarouselPhase::SlidingIn(_) = self.phase {
            self.phase = CarouselPhase::Idle;
        }
    }

    /// Turn the current card over. Only allowed while idle.
    pub fn flip(&mut self) -> Result<bool, CarouselError> {
        if self.is_animating() {
            return Err(CarouselError::Busy);
        }
        if self.len == 0 {
            return Err(CarouselError::EmptyDeck);
        }
        self.flipped = !self.flipped;
        Ok(self.flipped)
    }
}
