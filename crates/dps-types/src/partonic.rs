//! Parton-level initial states fed into the hadronization step.

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::ids::ParticleIndex;

/// Colour-flow tags of one parton, as given by the hard-process generator.
///
/// A tag of zero means "no colour line". Two partons are colour-connected
/// when the colour of one equals the anticolour of the other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColourTag {
    /// Colour line index.
    pub colour: u32,
    /// Anticolour line index.
    pub anticolour: u32,
}

impl ColourTag {
    /// Create a tag pair.
    pub const fn new(colour: u32, anticolour: u32) -> Self {
        Self { colour, anticolour }
    }

    /// Whether the parton carries any colour line.
    pub const fn is_coloured(self) -> bool {
        self.colour != 0 || self.anticolour != 0
    }

    /// Whether the two tags share a colour line in either direction.
    pub const fn connects(self, other: Self) -> bool {
        (self.colour != 0 && self.colour == other.anticolour)
            || (self.anticolour != 0 && self.anticolour == other.colour)
    }
}

/// A parton-level event plus the colour bookkeeping needed to hadronize it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartonicState {
    /// The parton-level record, in the rich schema.
    pub event: Event,
    /// One colour tag per particle, parallel to the particle arena.
    pub colours: Vec<ColourTag>,
}

impl PartonicState {
    /// Pair an event with its colour tags.
    pub const fn new(event: Event, colours: Vec<ColourTag>) -> Self {
        Self { event, colours }
    }

    /// Colour tag of a particle; untagged particles are colourless.
    pub fn colour_of(&self, index: ParticleIndex) -> ColourTag {
        self.colours.get(index.get()).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Schema;

    #[test]
    fn quark_connects_to_antiquark() {
        let quark = ColourTag::new(501, 0);
        let antiquark = ColourTag::new(0, 501);
        let other = ColourTag::new(0, 502);
        assert!(quark.connects(antiquark));
        assert!(antiquark.connects(quark));
        assert!(!quark.connects(other));
    }

    #[test]
    fn untagged_lines_never_connect() {
        let lepton = ColourTag::default();
        assert!(!lepton.is_coloured());
        assert!(!lepton.connects(lepton));
    }

    #[test]
    fn missing_tag_is_colourless() {
        let state = PartonicState::new(Event::new(1, Schema::Rich), Vec::new());
        assert_eq!(state.colour_of(ParticleIndex(4)), ColourTag::default());
    }
}
