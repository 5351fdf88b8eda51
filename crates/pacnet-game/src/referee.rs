//! Authoritative game rules.
//!
//! Only the node that is its own authority (server or standalone) owns a
//! live `Referee`. It watches agent locations and turns them into
//! [`GameUpdate`]s; it never mutates the game itself. The controller applies
//! the updates to its [`GameState`] and, on a server, broadcasts them so
//! every follower applies exactly the same ones.
//!
//! ```text
//! LOCATION ──→ observe() ──→ [EAT, SCARE.., DIE] ──→ apply + broadcast
//! tick     ──→ advance() ──→ [SCARE,<ghost>,0]   ──→ apply + broadcast
//! ```
//!
//! Scores and lives in the emitted updates are absolute. The referee reads
//! the current totals from the game at the start of each call and keeps a
//! running total while it builds the batch.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use pacnet_protocol::{AgentId, GameUpdate, StartEntry};

use crate::{GameState, Pellet, RuleConfig};

/// Collision, scoring and scare-timer bookkeeping for one game.
#[derive(Debug)]
pub struct Referee {
    rules: RuleConfig,
    positions: HashMap<AgentId, (i32, i32)>,
    ghosts: BTreeSet<AgentId>,
    scared: BTreeMap<AgentId, Duration>,
    over: bool,
}

impl Referee {
    pub fn new(rules: RuleConfig) -> Self {
        Self {
            rules,
            positions: HashMap::new(),
            ghosts: BTreeSet::new(),
            scared: BTreeMap::new(),
            over: false,
        }
    }

    /// Starts a new game with the agents of a `START`.
    pub fn reset(&mut self, entries: &[StartEntry]) {
        self.positions = entries
            .iter()
            .map(|entry| (entry.agent.clone(), (entry.x, entry.y)))
            .collect();
        self.ghosts = entries
            .iter()
            .filter(|entry| entry.agent.is_ghost())
            .map(|entry| entry.agent.clone())
            .collect();
        self.scared.clear();
        self.over = false;
    }

    /// Marks the game finished. The referee stays silent until the next
    /// [`reset`](Self::reset).
    pub fn finish(&mut self) {
        self.over = true;
        self.scared.clear();
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    pub fn is_scared(&self, ghost: &AgentId) -> bool {
        self.scared.contains_key(ghost)
    }

    /// Forgets an agent's position until it is observed again.
    pub fn forget(&mut self, agent: &AgentId) {
        self.positions.remove(agent);
    }

    /// Records that `agent` reached `(x, y)` and works out the consequences.
    pub fn observe<G: GameState + ?Sized>(
        &mut self,
        game: &G,
        agent: &AgentId,
        x: i32,
        y: i32,
    ) -> Vec<GameUpdate> {
        if self.over {
            return Vec::new();
        }
        self.positions.insert(agent.clone(), (x, y));
        if agent.is_ghost() {
            self.ghosts.insert(agent.clone());
        }

        let mut score = game.current_score();
        let mut lives = game.current_lives();
        let mut updates = Vec::new();

        let pellet = if agent.is_pacman() { game.pellet_at(x, y) } else { None };
        if let Some(pellet) = pellet {
            score += match pellet {
                Pellet::Dot => self.rules.dot_points,
                Pellet::Power => self.rules.power_points,
            };
            updates.push(GameUpdate::Eat { x, y, score });

            if pellet == Pellet::Power {
                let millis = self.rules.scare_millis();
                for ghost in &self.ghosts {
                    self.scared.insert(ghost.clone(), self.rules.scare_duration);
                    updates.push(GameUpdate::Scare {
                        ghost: ghost.clone(),
                        millis,
                    });
                }
            }
        }

        let mut opponents: Vec<AgentId> = self
            .positions
            .iter()
            .filter(|(other, cell)| **cell == (x, y) && other.is_pacman() != agent.is_pacman())
            .map(|(other, _)| other.clone())
            .collect();
        opponents.sort();

        for other in opponents {
            let (pacman, ghost) = if agent.is_pacman() {
                (agent.clone(), other)
            } else {
                (other, agent.clone())
            };

            if self.scared.remove(&ghost).is_some() {
                score += self.rules.ghost_points;
                self.positions.remove(&ghost);
                tracing::debug!(%ghost, %pacman, score, "scared ghost caught");
                updates.push(GameUpdate::Die {
                    agent: ghost,
                    lives,
                    score: Some(score),
                });
            } else {
                lives = lives.saturating_sub(1);
                self.positions.remove(&pacman);
                tracing::debug!(%ghost, %pacman, lives, "pacman caught");
                updates.push(GameUpdate::Die {
                    agent: pacman,
                    lives,
                    score: None,
                });
            }

            // Whoever moved may have been the one caught.
            if !self.positions.contains_key(agent) {
                break;
            }
        }

        updates
    }

    /// Ages scare timers by `dt`. Returns a `SCARE,<ghost>,0` per expiry.
    pub fn advance(&mut self, dt: Duration) -> Vec<GameUpdate> {
        if self.over || self.scared.is_empty() {
            return Vec::new();
        }
        let mut expired = Vec::new();
        for (ghost, remaining) in self.scared.iter_mut() {
            *remaining = remaining.saturating_sub(dt);
            if remaining.is_zero() {
                expired.push(ghost.clone());
            }
        }
        expired
            .into_iter()
            .map(|ghost| {
                self.scared.remove(&ghost);
                GameUpdate::Scare { ghost, millis: 0 }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryGame;

    fn entry(agent: AgentId, x: i32, y: i32) -> StartEntry {
        StartEntry {
            agent,
            x,
            y,
            algorithm: "greedy".to_string(),
        }
    }

    fn pacman() -> AgentId {
        AgentId::pacman(0)
    }

    fn red() -> AgentId {
        AgentId::ghost("red")
    }

    fn pink() -> AgentId {
        AgentId::ghost("pink")
    }

    /// A started game with pacman at (0,0), red at (5,5), pink at (6,6).
    fn setup(game: MemoryGame) -> (MemoryGame, Referee) {
        let mut game = game;
        let entries = [entry(pacman(), 0, 0), entry(red(), 5, 5), entry(pink(), 6, 6)];
        game.spawn("classic", &entries, None);
        let mut referee = Referee::new(RuleConfig::default());
        referee.reset(&entries);
        (game, referee)
    }

    fn apply_all(game: &mut MemoryGame, updates: &[GameUpdate]) {
        for update in updates {
            game.apply_authoritative(update);
        }
    }

    #[test]
    fn test_pacman_on_dot_eats_it() {
        let (mut game, mut referee) =
            setup(MemoryGame::new(&RuleConfig::default()).with_pellet(1, 0, Pellet::Dot));

        let updates = referee.observe(&game, &pacman(), 1, 0);
        assert_eq!(updates, vec![GameUpdate::Eat { x: 1, y: 0, score: 10 }]);

        apply_all(&mut game, &updates);
        assert!(referee.observe(&game, &pacman(), 1, 0).is_empty());
    }

    #[test]
    fn test_ghost_on_dot_eats_nothing() {
        let (game, mut referee) =
            setup(MemoryGame::new(&RuleConfig::default()).with_pellet(1, 0, Pellet::Dot));
        assert!(referee.observe(&game, &red(), 1, 0).is_empty());
    }

    #[test]
    fn test_power_pellet_scares_every_ghost() {
        let (game, mut referee) =
            setup(MemoryGame::new(&RuleConfig::default()).with_pellet(1, 0, Pellet::Power));

        let updates = referee.observe(&game, &pacman(), 1, 0);
        assert_eq!(
            updates,
            vec![
                GameUpdate::Eat { x: 1, y: 0, score: 50 },
                GameUpdate::Scare { ghost: pink(), millis: 7000 },
                GameUpdate::Scare { ghost: red(), millis: 7000 },
            ]
        );
        assert!(referee.is_scared(&red()));
        assert!(referee.is_scared(&pink()));
    }

    #[test]
    fn test_ghost_catches_pacman() {
        let (game, mut referee) = setup(MemoryGame::new(&RuleConfig::default()));

        let updates = referee.observe(&game, &red(), 0, 0);
        assert_eq!(
            updates,
            vec![GameUpdate::Die { agent: pacman(), lives: 2, score: None }]
        );

        // Pacman respawned; the same cell is no longer a collision.
        assert!(referee.observe(&game, &pink(), 0, 0).is_empty());
    }

    #[test]
    fn test_pacman_catches_scared_ghost() {
        let (mut game, mut referee) =
            setup(MemoryGame::new(&RuleConfig::default()).with_pellet(5, 4, Pellet::Power));

        let updates = referee.observe(&game, &pacman(), 5, 4);
        apply_all(&mut game, &updates);
        assert_eq!(game.current_score(), 50);

        let updates = referee.observe(&game, &pacman(), 5, 5);
        assert_eq!(
            updates,
            vec![GameUpdate::Die { agent: red(), lives: 3, score: Some(250) }]
        );
        assert!(!referee.is_scared(&red()));
    }

    #[test]
    fn test_scare_expires_after_duration() {
        let (game, mut referee) =
            setup(MemoryGame::new(&RuleConfig::default()).with_pellet(1, 0, Pellet::Power));
        referee.observe(&game, &pacman(), 1, 0);

        assert!(referee.advance(Duration::from_secs(6)).is_empty());
        let expired = referee.advance(Duration::from_secs(1));
        assert_eq!(
            expired,
            vec![
                GameUpdate::Scare { ghost: pink(), millis: 0 },
                GameUpdate::Scare { ghost: red(), millis: 0 },
            ]
        );
        assert!(referee.advance(Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn test_forgotten_agent_cannot_collide() {
        let (game, mut referee) = setup(MemoryGame::new(&RuleConfig::default()));
        referee.forget(&red());
        assert!(referee.observe(&game, &pacman(), 5, 5).is_empty());

        referee.observe(&game, &red(), 4, 4);
        assert_eq!(referee.observe(&game, &pacman(), 4, 4).len(), 1);
    }

    #[test]
    fn test_finished_referee_stays_quiet_until_reset() {
        let (game, mut referee) =
            setup(MemoryGame::new(&RuleConfig::default()).with_pellet(1, 0, Pellet::Dot));
        referee.finish();
        assert!(referee.is_over());
        assert!(referee.observe(&game, &pacman(), 1, 0).is_empty());

        referee.reset(&[entry(pacman(), 0, 0)]);
        assert!(!referee.is_over());
        assert_eq!(referee.observe(&game, &pacman(), 1, 0).len(), 1);
    }

    #[test]
    fn test_ghost_seen_before_start_is_still_scared() {
        let mut game = MemoryGame::new(&RuleConfig::default()).with_pellet(1, 0, Pellet::Power);
        game.spawn("classic", &[], None);
        let mut referee = Referee::new(RuleConfig::default());

        referee.observe(&game, &AgentId::ghost("cyan"), 9, 9);
        let updates = referee.observe(&game, &pacman(), 1, 0);
        assert!(updates.contains(&GameUpdate::Scare {
            ghost: AgentId::ghost("cyan"),
            millis: 7000
        }));
    }
}
