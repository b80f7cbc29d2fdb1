//! Serves a [`ScriptedGame`] on stdin/stdout.
//!
//! Usage: `scripted_game [config.yaml]`. Without a configuration file the
//! default [`ScriptedGameConfig`] is used. Logs go to stderr.
use anyhow::Result;
use log::info;
use rainbow_pipe_env::scripted::{ScriptedGame, ScriptedGameConfig};
use std::io::{self, BufWriter};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => ScriptedGameConfig::load(path)?,
        None => ScriptedGameConfig::default(),
    };
    info!("Serves scripted game: {:?}", config);

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut game = ScriptedGame::new(config);
    game.serve(stdin.lock(), BufWriter::new(stdout.lock()))?;

    info!("Scripted game exits");
    Ok(())
}
