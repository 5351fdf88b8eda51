//! A headless pacnet peer for trying the protocol from two terminals.
//!
//! ```text
//! headless-peer host 4000          # listen, drive pacman, start when ready
//! headless-peer join 127.0.0.1 4000 red
//! ```
//!
//! Set `PACNET_CONFIG` to a JSON file to override `NodeConfig` defaults and
//! `RUST_LOG` to change verbosity.

use std::time::Duration;

use pacnet::prelude::*;

// ---------------------------------------------------------------------------
// Maze
// ---------------------------------------------------------------------------

/// A corridor of dots along row 0 with a power pellet at its far end.
const CORRIDOR: i32 = 8;

fn corridor_game(rules: &RuleConfig) -> MemoryGame {
    let game = (1..CORRIDOR).fold(MemoryGame::new(rules), |game, x| {
        game.with_pellet(x, 0, Pellet::Dot)
    });
    game.with_pellet(CORRIDOR, 0, Pellet::Power)
}

fn spawns() -> Vec<StartEntry> {
    let pacman = StartEntry {
        agent: AgentId::pacman(0),
        x: 0,
        y: 0,
        algorithm: "greedy".into(),
    };
    let ghosts = ["red", "pink"].into_iter().enumerate().map(|(i, name)| StartEntry {
        agent: AgentId::ghost(name),
        x: CORRIDOR,
        y: 2 + i as i32,
        algorithm: "minimax".into(),
    });
    std::iter::once(pacman).chain(ghosts).collect()
}

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

async fn host(node: &NodeHandle, port: u16) -> Result<(), PacnetError> {
    let addr = node.listen(port).await?;
    tracing::info!(%addr, "waiting for peers");
    node.select(AgentId::pacman(0)).await?;

    loop {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let snapshot = node.snapshot().await?;
        if snapshot.role != Role::Server {
            continue;
        }
        if snapshot.maze.is_none() {
            node.choose_map("corridor").await?;
        }
        match node.start_game(spawns()).await {
            Ok(()) => break,
            Err(PacnetError::PeersUnready(peers)) => {
                tracing::info!(count = peers.len(), "peers still choosing");
            }
            Err(e) => return Err(e),
        }
    }

    for x in 1..=CORRIDOR {
        tokio::time::sleep(Duration::from_millis(250)).await;
        node.report_direction(AgentId::pacman(0), Direction::Right).await?;
        node.report_location(AgentId::pacman(0), x, 0).await?;
        if node.snapshot().await?.game_over {
            break;
        }
    }
    Ok(())
}

async fn join(
    node: &NodeHandle,
    game: &MemoryGame,
    host: &str,
    port: u16,
    agent: AgentId,
) -> Result<(), PacnetError> {
    let upstream = node.connect(host, port).await?;
    tracing::info!(%upstream, "connected");
    node.select(agent.clone()).await?;

    let mut y = 2;
    loop {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let state = game.snapshot();
        if let Some(outcome) = state.outcome {
            tracing::info!(%outcome, score = state.score, "game finished");
            return Ok(());
        }
        if node.snapshot().await?.role == Role::Standalone {
            tracing::info!("host left");
            return Ok(());
        }
        if state.started && state.self_agent.as_ref() == Some(&agent) {
            y = if y == 2 { 3 } else { 2 };
            node.report_location(agent.clone(), CORRIDOR, y).await?;
        }
    }
}

fn usage() -> ! {
    eprintln!("usage: headless-peer host <port>");
    eprintln!("       headless-peer join <host> <port> <agent>");
    std::process::exit(2);
}

fn load_config() -> Result<NodeConfig, PacnetError> {
    match std::env::var("PACNET_CONFIG") {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)
                .map_err(|e| PacnetError::Config(format!("{path}: {e}")))?;
            NodeConfig::from_json(&json)
        }
        Err(_) => Ok(NodeConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), PacnetError> {
    pacnet::init_tracing(false);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = load_config()?;
    let game = corridor_game(&config.rules);
    let node = spawn_node(config, game.clone(), MemoryView::new(true));

    let result = match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["host", port] => {
            let port = port.parse().unwrap_or_else(|_| usage());
            host(&node, port).await
        }
        ["join", addr, port, agent] => {
            let port = port.parse().unwrap_or_else(|_| usage());
            let agent: AgentId = agent.parse().unwrap_or_else(|_| usage());
            join(&node, &game, addr, port, agent).await
        }
        _ => usage(),
    };

    let final_state = game.snapshot();
    tracing::info!(score = final_state.score, lives = final_state.lives, "final state");
    node.shutdown().await?;
    result
}
