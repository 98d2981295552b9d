//! Webinar consultations.
//!
//! The backend returns webinars in chronological order together with two
//! index pointers, `lastWebinar` and `nextWebinar`. Whether an entry is a
//! replay or upcoming is decided by its position relative to those pointers,
//! not by its own `is_replay_available` flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::WebinarId;

/// A scheduled or past live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webinar {
    pub id: WebinarId,
    pub title: String,
    pub speaker: Option<String>,
    pub description: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<u32>,
    pub replay_url: Option<String>,
    pub registration_url: Option<String>,
    pub is_replay_available: bool,
}

/// Where a webinar sits relative to the server pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebinarSlot {
    /// At or before `last_webinar`.
    Replay,
    /// At or after `next_webinar`.
    Upcoming,
    /// Outside both ranges (missing pointers or a gap between them).
    Unclassified,
}

/// The webinar list with its ordering pointers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WebinarList {
    pub items: Vec<Webinar>,
    /// Index of the most recent past webinar.
    pub last_webinar: Option<usize>,
    /// Index of the next scheduled webinar.
    pub next_webinar: Option<usize>,
}

impl WebinarList {
    /// Build a list, dropping pointers that fall outside `items`.
    #[must_use]
    pub fn new(items: Vec<Webinar>, last_webinar: Option<usize>, next_webinar: Option<usize>) -> Self {
        let len = items.len();
        Self {
            items,
            last_webinar: last_webinar.filter(|i| *i < len),
            next_webinar: next_webinar.filter(|i| *i < len),
        }
    }

    /// Classify the entry at `index`.
    #[must_use]
    pub fn slot(&self, index: usize) -> WebinarSlot {
        if self.next_webinar.is_some_and(|next| index >= next) {
            WebinarSlot::Upcoming
        } else if self.last_webinar.is_some_and(|last| index <= last) {
            WebinarSlot::Replay
        } else {
            WebinarSlot::Unclassified
        }
    }

    /// Past sessions, most recent first.
    #[must_use]
    pub fn replays(&self) -> Vec<&Webinar> {
        let mut replays: Vec<&Webinar> = self
            .items
            .iter()
            .enumerate()
            .filter(|(i, _)| self.slot(*i) == WebinarSlot::Replay)
            .map(|(_, w)| w)
            .collect();
        replays.reverse();
        replays
    }

    /// Scheduled sessions, soonest first.
    #[must_use]
    pub fn upcoming(&self) -> Vec<&Webinar> {
        self.items
            .iter()
            .enumerate()
            .filter(|(i, _)| self.slot(*i) == WebinarSlot::Upcoming)
            .map(|(_, w)| w)
            .collect()
    }

    /// The entry `next_webinar` points at.
    #[must_use]
    pub fn next(&self) -> Option<&Webinar> {
        self.next_webinar.and_then(|i| self.items.get(i))
    }

    /// The entry `last_webinar` points at.
    #[must_use]
    pub fn last(&self) -> Option<&Webinar> {
        self.last_webinar.and_then(|i| self.items.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn webinar(id: &str, replay_flag: bool) -> Webinar {
        Webinar {
            id: WebinarId::new(id),
            title: id.to_string(),
            speaker: None,
            description: None,
            scheduled_at: None,
            duration_minutes: None,
            replay_url: None,
            registration_url: None,
            is_replay_available: replay_flag,
        }
    }

    #[test]
    fn test_position_wins_over_flag() {
        // "c" claims a replay but sits after next_webinar.
        let list = WebinarList::new(
            vec![webinar("a", true), webinar("b", false), webinar("c", true)],
            Some(1),
            Some(2),
        );
        assert_eq!(list.slot(2), WebinarSlot::Upcoming);
        let replays: Vec<_> = list.replays().iter().map(|w| w.id.as_str()).collect();
        assert_eq!(replays, ["b", "a"]);
        assert_eq!(list.next().map(|w| w.id.as_str()), Some("c"));
        assert_eq!(list.last().map(|w| w.id.as_str()), Some("b"));
    }

    #[test]
    fn test_out_of_range_pointers_are_dropped() {
        let list = WebinarList::new(vec![webinar("a", false)], Some(5), Some(9));
        assert_eq!(list.last_webinar, None);
        assert_eq!(list.next_webinar, None);
        assert_eq!(list.slot(0), WebinarSlot::Unclassified);
    }

    #[test]
    fn test_no_past_sessions() {
        let list = WebinarList::new(vec![webinar("a", false), webinar("b", false)], None, Some(0));
        assert!(list.replays().is_empty());
        assert_eq!(list.upcoming().len(), 2);
    }
}
