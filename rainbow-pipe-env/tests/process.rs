use anyhow::Result;
use rainbow_core::BatchEnv;
use rainbow_pipe_env::{
    scripted::{ScriptedGame, ScriptedGameConfig},
    Connector, EnvError, FrameLayout, PipeBatchEnv, PipeEnvConfig, ProcessConnector,
};
use tempdir::TempDir;

fn scripted_game() -> String {
    env!("CARGO_BIN_EXE_scripted_game").to_string()
}

fn layout() -> FrameLayout {
    FrameLayout::new(2, 3, 3, 4)
}

#[test_log::test]
fn test_process_connector_session() -> Result<()> {
    let dir = TempDir::new("scripted_game")?;
    let path = dir.path().join("game.yaml");
    ScriptedGameConfig::default()
        .layout(layout())
        .episode_len(2)
        .reward(3)
        .save(&path)?;

    let args = vec![path.to_string_lossy().to_string()];
    let mut conn = ProcessConnector::spawn(&scripted_game(), &args, layout())?;
    assert_eq!(conn.reset()?, ScriptedGame::observation(&layout(), 1, 0, 0));

    let reply = conn.step(6)?;
    assert_eq!(reply.reward, 3);
    assert!(!reply.is_terminal);
    assert_eq!(reply.obs, ScriptedGame::observation(&layout(), 1, 1, 6));
    assert!(conn.step(6)?.is_terminal);

    conn.close()?;
    Ok(())
}

#[test_log::test]
fn test_kill_switch_ends_the_game() -> Result<()> {
    let mut conn = ProcessConnector::spawn(&scripted_game(), &[], FrameLayout::default())?;
    let kill_switch = conn.kill_switch().expect("process instances can be killed");
    assert_eq!(conn.reset()?.len(), FrameLayout::default().len());

    kill_switch.kill();
    assert!(conn.step(0).is_err());
    // a second kill of a finished game is a no-op
    kill_switch.kill();
    Ok(())
}

#[test_log::test]
fn test_default_layout_over_pipes() -> Result<()> {
    let config = PipeEnvConfig::default()
        .program(scripted_game())
        .n_procs(3)
        .round_timeout_ms(Some(10_000));
    let mut env = PipeBatchEnv::build(&config)?;

    BatchEnv::reset(&mut env)?;
    let round = BatchEnv::get_state(&mut env)?;
    assert_eq!(round.new_obs.dim(), (3, 11 * 13 * 13 + 4));

    // the default scripted game ends its episodes on step 2 with reward 1
    let mut flags = vec![];
    for _ in 0..2 {
        BatchEnv::take_action(&mut env, &[0, 1, 2])?;
        let round = BatchEnv::get_state(&mut env)?;
        assert_eq!(round.reward, vec![1, 1, 1]);
        flags.push(round.is_terminal);
    }
    assert_eq!(flags, vec![vec![false; 3], vec![true; 3]]);

    env.close()?;
    Ok(())
}

#[test_log::test]
fn test_missing_program() {
    let config = PipeEnvConfig::default().program("/nonexistent/game").n_procs(2);
    assert!(matches!(
        PipeBatchEnv::build(&config),
        Err(EnvError::Spawn { .. })
    ));
}
