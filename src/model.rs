pub mod entity {
    use std::fmt;

    pub type Id = u32;
    pub type Price = u32;
    pub type Points = i32;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub enum Position {
        Goalkeeper,
        Defender,
        Midfielder,
        Forward,
    }

    impl Position {
        pub const ALL: [Position; 4] = [
            Position::Goalkeeper,
            Position::Defender,
            Position::Midfielder,
            Position::Forward,
        ];

        /// Single-letter code used by the player tables.
        pub fn code(self) -> &'static str {
            match self {
                Position::Goalkeeper => "G",
                Position::Defender => "D",
                Position::Midfielder => "M",
                Position::Forward => "F",
            }
        }

        pub fn from_code(code: &str) -> Option<Position> {
            match code {
                "G" => Some(Position::Goalkeeper),
                "D" => Some(Position::Defender),
                "M" => Some(Position::Midfielder),
                "F" => Some(Position::Forward),
                _ => None,
            }
        }
    }

    impl fmt::Display for Position {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.code())
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Player {
        pub id: Id,
        pub first_name: String,
        pub last_name: String,
        pub position: Position,
        pub team: String,
        /// Tenths of a million.
        pub price: Price,
    }

    impl fmt::Display for Player {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "{:>5} {} {} {} ({}) £{}.{}m",
                self.id,
                self.position,
                self.first_name,
                self.last_name,
                self.team,
                self.price / 10,
                self.price % 10
            )
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct GameweekScore {
        pub player_id: Id,
        pub gameweek: u32,
        pub opponent_team: String,
        pub total_points: Points,
        pub value: Price,
        pub was_home: bool,
    }
}


pub mod squad {
    use std::fmt;
    use std::ops::Range;

    use itertools::Itertools;
    use thiserror::Error;

    use super::entity::{Id, Player, Position, Price};

    pub const SQUAD_SIZE: usize = 15;

    /// Slot ranges in squad order. Every squad is laid out 2/5/5/3.
    pub const SLOTS: [(Position, Range<usize>); 4] = [
        (Position::Goalkeeper, 0..2),
        (Position::Defender, 2..7),
        (Position::Midfielder, 7..12),
        (Position::Forward, 12..15),
    ];

    #[derive(Debug, Clone, PartialEq)]
    pub struct Squad {
        players: Vec<Player>,
    }

    #[derive(Debug, Clone, Error, PartialEq)]
    pub enum SquadShapeError {
        #[error("squad has {0} players, expected 15")]
        WrongSize(usize),
        #[error("slot {index} expects a {expected}, found a {found}")]
        MisplacedPlayer { index: usize, expected: Position, found: Position },
    }

    impl Squad {
        /// Wraps a drafted roster after checking the slot layout.
        pub fn from_players(players: Vec<Player>) -> Result<Squad, SquadShapeError> {
            if players.len() != SQUAD_SIZE {
                return Err(SquadShapeError::WrongSize(players.len()));
            }
            for (expected, range) in SLOTS.iter() {
                for index in range.clone() {
                    let found = players[index].position;
                    if found != *expected {
                        return Err(SquadShapeError::MisplacedPlayer {
                            index,
                            expected: *expected,
                            found,
                        });
                    }
                }
            }
            Ok(Squad { players })
        }

        pub fn players(&self) -> &[Player] {
            &self.players
        }

        pub fn player(&self, index: usize) -> &Player {
            &self.players[index]
        }

        pub fn total_price(&self) -> Price {
            self.players.iter().map(|player| player.price).sum()
        }

        pub fn ids(&self) -> impl Iterator<Item = Id> + '_ {
            self.players.iter().map(|player| player.id)
        }

        /// First pair of slots holding the same player, later slot second.
        /// `None` means every player is distinct.
        pub fn first_duplicate(&self) -> Option<(usize, usize)> {
            self.players
                .iter()
                .enumerate()
                .tuple_combinations()
                .find(|((_, a), (_, b))| a.id == b.id)
                .map(|((i, _), (j, _))| (i, j))
        }

        /// Swaps in a same-position player, returning the previous occupant.
        pub(crate) fn replace(&mut self, index: usize, player: Player) -> Player {
            debug_assert_eq!(self.players[index].position, player.position);
            std::mem::replace(&mut self.players[index], player)
        }
    }

    impl fmt::Display for Squad {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            for player in &self.players {
                writeln!(f, "{player}")?;
            }
            let total = self.total_price();
            write!(f, "total £{}.{}m", total / 10, total % 10)
        }
    }
}


pub mod sample {
    use super::entity::{Points, Price};
    use crate::analysis::TierCounts;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SimulationSample {
        pub total_price: Price,
        pub total_points: Points,
        pub tiers: TierCounts,
    }

    impl SimulationSample {
        pub fn premium_count(&self) -> usize {
            self.tiers.premium
        }
    }
}
