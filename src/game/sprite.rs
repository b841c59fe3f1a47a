//! Sprite registry
//!
//! Ids match the asset file prefixes the clients load (`NN-name.png`), so a
//! `put` record only needs to carry frame ids. Sizes are the pixel dimensions
//! of those assets and drive every collision box on the server.

use super::geometry::Size;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sprite {
    Squid1,
    Squid2,
    Crab1,
    Crab2,
    Octopus1,
    Octopus2,
    Explosion,
    FlyingSaucer,
    Bunker,
    Spacecraft,
    Shot1,
    Shot2,
    Shot3,
    Shot4,
}

impl Sprite {
    pub fn id(self) -> u32 {
        match self {
            Sprite::Squid1 => 0,
            Sprite::Squid2 => 1,
            Sprite::Crab1 => 2,
            Sprite::Crab2 => 3,
            Sprite::Octopus1 => 4,
            Sprite::Octopus2 => 5,
            Sprite::Explosion => 6,
            Sprite::FlyingSaucer => 7,
            Sprite::Bunker => 8,
            Sprite::Spacecraft => 9,
            Sprite::Shot1 => 10,
            Sprite::Shot2 => 11,
            Sprite::Shot3 => 12,
            Sprite::Shot4 => 13,
        }
    }

    pub fn size(self) -> Size {
        match self {
            Sprite::Squid1 | Sprite::Squid2 => Size::new(8, 8),
            Sprite::Crab1 | Sprite::Crab2 => Size::new(11, 8),
            Sprite::Octopus1 | Sprite::Octopus2 => Size::new(12, 8),
            Sprite::Explosion => Size::new(13, 9),
            Sprite::FlyingSaucer => Size::new(16, 7),
            Sprite::Bunker => Size::new(4, 2),
            Sprite::Spacecraft => Size::new(13, 8),
            Sprite::Shot1 => Size::new(1, 4),
            Sprite::Shot2 | Sprite::Shot3 | Sprite::Shot4 => Size::new(3, 7),
        }
    }

    /// Single-frame sequence showing only this sprite
    pub fn sequence(self) -> Sequence {
        Sequence(match self {
            Sprite::Squid1 => &[Sprite::Squid1],
            Sprite::Squid2 => &[Sprite::Squid2],
            Sprite::Crab1 => &[Sprite::Crab1],
            Sprite::Crab2 => &[Sprite::Crab2],
            Sprite::Octopus1 => &[Sprite::Octopus1],
            Sprite::Octopus2 => &[Sprite::Octopus2],
            Sprite::Explosion => &[Sprite::Explosion],
            Sprite::FlyingSaucer => &[Sprite::FlyingSaucer],
            Sprite::Bunker => &[Sprite::Bunker],
            Sprite::Spacecraft => &[Sprite::Spacecraft],
            Sprite::Shot1 => &[Sprite::Shot1],
            Sprite::Shot2 => &[Sprite::Shot2],
            Sprite::Shot3 => &[Sprite::Shot3],
            Sprite::Shot4 => &[Sprite::Shot4],
        })
    }
}

/// Looping frame list. Never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence(&'static [Sprite]);

impl Sequence {
    pub const SQUID: Sequence = Sequence(&[Sprite::Squid1, Sprite::Squid2]);
    pub const CRAB: Sequence = Sequence(&[Sprite::Crab1, Sprite::Crab2]);
    pub const OCTOPUS: Sequence = Sequence(&[Sprite::Octopus1, Sprite::Octopus2]);

    /// Frame shown while the entity is not moving
    pub fn first(&self) -> Sprite {
        self.0[0]
    }

    /// Collision size, taken from the first frame
    pub fn size(&self) -> Size {
        self.first().size()
    }

    pub fn frame_ids(&self) -> Vec<u32> {
        self.0.iter().map(|sprite| sprite.id()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn animations_list_both_frames() {
        assert_eq!(Sequence::SQUID.frame_ids(), vec![0, 1]);
        assert_eq!(Sequence::CRAB.frame_ids(), vec![2, 3]);
        assert_eq!(Sequence::OCTOPUS.frame_ids(), vec![4, 5]);
    }

    #[test]
    fn single_sprite_sequence_matches_sprite() {
        let seq = Sprite::Spacecraft.sequence();
        assert_eq!(seq.frame_ids(), vec![9]);
        assert_eq!(seq.size(), Sprite::Spacecraft.size());
    }
}
