//! Room roster.

use std::collections::BTreeSet;

use fundplay_protocol::{BingoCard, Liveness, ParticipantId, ParticipantView, Role};

/// Longest display name accepted, in characters.
pub(crate) const MAX_NAME_CHARS: usize = 32;

/// Trims a display name and checks its length.
pub(crate) fn clean_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    let chars = name.chars().count();
    (1..=MAX_NAME_CHARS).contains(&chars).then(|| name.to_owned())
}

#[derive(Debug, Clone)]
pub(crate) struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub role: Role,
    pub ready: bool,
    pub liveness: Liveness,
    pub card: Option<BingoCard>,
    pub marked: BTreeSet<u8>,
    pub score: u32,
    pub answer: Option<usize>,
}

impl Participant {
    pub(crate) fn new(id: ParticipantId, name: String, role: Role) -> Self {
        Self {
            id,
            name,
            role,
            // The host never gates the start.
            ready: role == Role::Host,
            liveness: Liveness::Connected,
            card: None,
            marked: BTreeSet::new(),
            score: 0,
            answer: None,
        }
    }

    pub(crate) fn view(&self) -> ParticipantView {
        ParticipantView {
            id: self.id.clone(),
            name: self.name.clone(),
            role: self.role,
            ready: self.ready,
            liveness: self.liveness,
            card: self.card,
            marked: self.marked.iter().copied().collect(),
            score: self.score,
            has_answered: self.answer.is_some(),
        }
    }
}

/// Participants in join order. Ids are unique.
#[derive(Debug, Clone, Default)]
pub(crate) struct Roster {
    entries: Vec<Participant>,
}

impl Roster {
    pub(crate) fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.entries.iter().find(|p| &p.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &ParticipantId) -> Option<&mut Participant> {
        self.entries.iter_mut().find(|p| &p.id == id)
    }

    /// Appends `participant` unless its id is already present.
    pub(crate) fn insert(&mut self, participant: Participant) -> bool {
        if self.get(&participant.id).is_some() {
            return false;
        }
        self.entries.push(participant);
        true
    }

    pub(crate) fn remove(&mut self, id: &ParticipantId) -> Option<Participant> {
        let index = self.entries.iter().position(|p| &p.id == id)?;
        Some(self.entries.remove(index))
    }

    pub(crate) fn players(&self) -> impl Iterator<Item = &Participant> {
        self.entries.iter().filter(|p| p.role == Role::Player)
    }

    pub(crate) fn players_mut(&mut self) -> impl Iterator<Item = &mut Participant> {
        self.entries.iter_mut().filter(|p| p.role == Role::Player)
    }

    pub(crate) fn player_count(&self) -> usize {
        self.players().count()
    }

    pub(crate) fn all_ready(&self) -> bool {
        self.entries.iter().all(|p| p.ready || p.role == Role::Host)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn views(&self) -> Vec<ParticipantView> {
        self.entries.iter().map(Participant::view).collect()
    }
}
