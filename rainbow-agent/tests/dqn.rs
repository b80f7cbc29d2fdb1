mod common;
use common::{layout, scripted_env, MockApproximator, RecordingBuffer};
use ndarray::Array2;
use rainbow_agent::{fixed_samples, Dqn, DqnConfig};
use rainbow_core::{
    replay_buffer::{PerConfig, SimpleReplayBufferConfig},
    CategoricalConfig, LinearScheduler, ReplayBufferBase, TargetValues, TransitionBatch,
};
use rainbow_pipe_env::scripted::ScriptedGame;

fn greedy_config() -> DqnConfig {
    DqnConfig::default()
        .epsilon(LinearScheduler::constant(0.0))
        .distributional(None)
        .double_dqn(false)
}

fn agent(config: DqnConfig, weights: Vec<f32>, n_atoms: Option<usize>) -> Dqn<MockApproximator> {
    let qnet_tgt = MockApproximator::new(vec![0.0; weights.len()], n_atoms);
    let qnet = MockApproximator::new(weights, n_atoms);
    Dqn::build(config, qnet, qnet_tgt).unwrap()
}

fn buffer(per_config: Option<PerConfig>) -> RecordingBuffer {
    RecordingBuffer::build(
        &SimpleReplayBufferConfig::default()
            .capacity(100)
            .per_config(per_config),
    )
}

fn one_transition(reward: f32, is_terminal: bool) -> TransitionBatch {
    let w = layout().len();
    TransitionBatch::new(
        Array2::zeros((1, w)),
        vec![0],
        vec![reward],
        Array2::zeros((1, w)),
        vec![is_terminal],
    )
    .unwrap()
}

fn assert_close(a: f32, b: f32) {
    assert!((a - b).abs() < 1e-4, "{} != {}", a, b);
}

#[test_log::test]
fn test_build_syncs_target() {
    let agent = agent(greedy_config(), vec![1.0, 2.0, 3.0], None);
    assert_eq!(agent.qnet_tgt().get_weights(), vec![1.0, 2.0, 3.0]);
    assert_eq!(agent.qnet_tgt().log().syncs, 1);
    assert_eq!(agent.n_actions(), 3);
    assert!(!agent.is_train());
}

#[test_log::test]
fn test_build_rejects_invalid_settings() {
    let build = |config: DqnConfig, n_actions: usize| {
        Dqn::build(
            config,
            MockApproximator::new(vec![0.0; n_actions], None),
            MockApproximator::new(vec![0.0; n_actions], None),
        )
        .is_err()
    };
    assert!(build(greedy_config(), 0));
    assert!(build(greedy_config(), 257));
    assert!(!build(greedy_config(), 256));
    assert!(build(greedy_config().update_freq(0), 4));
    assert!(build(greedy_config().num_step(0), 4));
    assert!(build(greedy_config().target_update_freq(0), 4));
}

#[test_log::test]
fn test_select_action() {
    let mut agent = agent(greedy_config(), vec![0.0, 0.0, 7.0, 1.0], None);
    let obs = Array2::zeros((5, layout().len()));

    assert_eq!(agent.select_action(&obs, 0.0).unwrap(), vec![2; 5]);
    assert_eq!(agent.qnet().log().greedy.len(), 1);

    for _ in 0..20 {
        let act = agent.select_action(&obs, 1.0).unwrap();
        assert_eq!(act.len(), 5);
        assert!(act.iter().all(|&a| a < 4));
    }
    assert_eq!(agent.qnet().log().greedy.len(), 1);
}

#[test_log::test]
fn test_fit_stores_one_transition_per_worker_and_round() {
    let mut env = scripted_env(3, 2, 3);
    let mut buf = buffer(None);
    let mut agent = agent(greedy_config(), vec![0.0, 1.0, 0.0], None);

    let record = agent.fit(&mut env, &mut buf, 6, false).unwrap();
    assert!(agent.is_train());
    assert_eq!(agent.env_steps(), 6);
    assert_eq!(agent.n_opts(), 0);
    assert_eq!(record.get_scalar("env_steps").unwrap(), 6.0);
    assert!(record.get("loss").is_none());
    assert_eq!(buf.len(), 6);

    let (first, second) = (&buf.pushed[0], &buf.pushed[1]);
    assert_eq!(first.is_terminal, vec![false; 3]);
    assert_eq!(second.is_terminal, vec![true; 3]);
    // rewards are sign-clipped
    assert_eq!(first.reward, vec![1.0; 3]);
    assert_eq!(second.reward, vec![1.0; 3]);
    assert_eq!(first.act, vec![1; 3]);

    let l = layout();
    for i in 0..3 {
        assert_eq!(first.obs.row(i).to_vec(), ScriptedGame::observation(&l, 1, 0, 0));
        assert_eq!(first.next_obs.row(i).to_vec(), ScriptedGame::observation(&l, 1, 1, 1));
        assert_eq!(second.obs.row(i), first.next_obs.row(i));
        assert_eq!(second.next_obs.row(i).to_vec(), ScriptedGame::observation(&l, 1, 2, 1));
    }
    assert!(agent.qnet().log().gradients.is_empty());
}

#[test_log::test]
fn test_multi_step_transition() {
    let mut env = scripted_env(3, 2, 1);
    let mut buf = buffer(None);
    let mut agent = agent(greedy_config().num_step(2).gamma(0.5), vec![0.0, 1.0], None);

    agent.fit(&mut env, &mut buf, 3, false).unwrap();
    assert_eq!(buf.pushed.len(), 1);
    assert_eq!(agent.env_steps(), 6);

    let tr = &buf.pushed[0];
    assert_eq!(tr.reward, vec![1.5; 3]);
    assert_eq!(tr.is_terminal, vec![true; 3]);
    assert_eq!(tr.act, vec![1; 3]);
    let l = layout();
    for i in 0..3 {
        assert_eq!(tr.obs.row(i).to_vec(), ScriptedGame::observation(&l, 1, 0, 0));
        assert_eq!(tr.next_obs.row(i).to_vec(), ScriptedGame::observation(&l, 1, 2, 1));
    }
}

#[test_log::test]
fn test_update_and_target_sync_counts() {
    let mut env = scripted_env(3, 2, 1);
    let mut buf = buffer(None);
    let config = greedy_config()
        .update_freq(2)
        .batch_size(2)
        .min_transitions_warmup(3)
        .target_update_freq(2);
    let mut agent = agent(config, vec![0.0, 1.0], None);

    // transition indices 0, 2 and 4 trigger a gradient step
    let record = agent.fit(&mut env, &mut buf, 6, true).unwrap();
    assert_eq!(agent.n_opts(), 3);
    assert_eq!(agent.qnet().log().gradients.len(), 3);
    assert_eq!(agent.qnet_tgt().log().syncs, 2);
    assert_eq!(record.get_scalar("n_opts").unwrap(), 3.0);
    assert!(record.get_scalar("loss").unwrap().is_finite());

    for (obs, target) in agent.qnet().log().gradients.iter() {
        assert_eq!(obs.nrows(), 2);
        assert_eq!(target.actions.len(), 2);
        assert!(target.weights.is_none());
    }
    assert!(buf.priority_updates.is_empty());
}

#[test_log::test]
fn test_warmup_delays_updates() {
    let mut env = scripted_env(3, 2, 1);
    let mut buf = buffer(None);
    let config = greedy_config()
        .update_freq(2)
        .batch_size(2)
        .min_transitions_warmup(4);
    let mut agent = agent(config, vec![0.0, 1.0], None);

    agent.fit(&mut env, &mut buf, 6, true).unwrap();
    assert_eq!(agent.n_opts(), 1);
}

#[test_log::test]
fn test_scalar_targets_with_and_without_double_q() {
    let tr = one_transition(1.0, false);
    let cases = [(true, 1, 2.0), (false, 1, 6.0), (true, 3, 1.25)];

    for &(double_dqn, num_step, expected) in cases.iter() {
        let config = greedy_config()
            .gamma(0.5)
            .num_step(num_step)
            .double_dqn(double_dqn);
        let mut agent = agent(config, vec![0.0; 3], None);
        agent.qnet().set_weights(vec![0.0, 5.0, 1.0]);
        agent.qnet_tgt().set_weights(vec![10.0, 2.0, 3.0]);

        let td = agent.td_errors(&tr).unwrap();
        assert_close(td[0], expected);
    }

    // no bootstrap from a terminal transition
    let mut agent = agent(greedy_config().gamma(0.5), vec![0.0; 3], None);
    agent.qnet_tgt().set_weights(vec![10.0, 2.0, 3.0]);
    let td = agent.td_errors(&one_transition(1.0, true)).unwrap();
    assert_close(td[0], 1.0);
}

#[test_log::test]
fn test_categorical_targets() {
    let n_atoms = CategoricalConfig::default().n_atoms;
    let config = greedy_config()
        .gamma(0.5)
        .batch_size(1)
        .min_transitions_warmup(1)
        .distributional(Some(CategoricalConfig::default()));

    // the target network picks action 1 by expectation, the atom at 10.0
    let mut agent1 = agent(config.clone(), vec![0.0, 0.0], Some(n_atoms));
    agent1.qnet().set_weights(vec![30.0, 0.0]);
    agent1.qnet_tgt().set_weights(vec![10.0, 25.0]);
    let mut buf = buffer(None);
    buf.push(one_transition(0.0, false)).unwrap();
    let loss = agent1.opt(&mut buf).unwrap().unwrap();
    assert!(loss.is_finite());

    let log = agent1.qnet().log();
    match &log.gradients[0].1.values {
        TargetValues::Categorical(m) => {
            assert_eq!(m.dim(), (1, n_atoms));
            assert_close(m[[0, 12]], 0.5);
            assert_close(m[[0, 13]], 0.5);
            assert_close(m.sum(), 1.0);
        }
        v => panic!("unexpected target {:?}", v),
    }
    drop(log);

    // the online network picks action 0, the atom at 4.0
    let mut agent2 = agent(config.double_dqn(true), vec![0.0, 0.0], Some(n_atoms));
    agent2.qnet().set_weights(vec![30.0, 0.0]);
    agent2.qnet_tgt().set_weights(vec![10.0, 25.0]);
    agent2.opt(&mut buf).unwrap().unwrap();

    let log = agent2.qnet().log();
    match &log.gradients[0].1.values {
        TargetValues::Categorical(m) => {
            assert!(m[[0, 5]] > 0.99);
            assert_close(m.sum(), 1.0);
        }
        v => panic!("unexpected target {:?}", v),
    };
}

#[test_log::test]
fn test_output_mode_mismatch_is_an_error() {
    let config = greedy_config()
        .batch_size(1)
        .min_transitions_warmup(1)
        .distributional(Some(CategoricalConfig::default()));
    let mut agent = agent(config, vec![0.0, 0.0], None);
    let mut buf = buffer(None);
    buf.push(one_transition(0.0, false)).unwrap();
    assert!(agent.opt(&mut buf).is_err());

    // wrong number of atoms
    let config = greedy_config()
        .batch_size(1)
        .min_transitions_warmup(1)
        .distributional(Some(CategoricalConfig::default()));
    let mut agent = self::agent(config, vec![0.0, 0.0], Some(7));
    assert!(agent.opt(&mut buf).is_err());
}

#[test_log::test]
fn test_approximator_output_shape_is_checked() {
    let w = layout().len();
    let mut agent = agent(greedy_config(), vec![0.0, 1.0], None);
    assert!(agent.td_errors(&one_transition(0.0, false)).is_ok());

    // the online network now answers with three actions
    agent.qnet().set_weights(vec![0.0, 1.0, 2.0]);
    assert!(agent.td_errors(&one_transition(0.0, false)).is_err());
    assert!(agent.mean_max_q(&Array2::zeros((3, w))).is_err());
}

#[test_log::test]
fn test_categorical_targets_with_prioritized_replay() {
    let n_atoms = CategoricalConfig::default().n_atoms;
    let config = greedy_config()
        .gamma(0.5)
        .batch_size(1)
        .min_transitions_warmup(1)
        .beta(LinearScheduler::constant(1.0))
        .distributional(Some(CategoricalConfig::default()));
    let mut agent = agent(config, vec![0.0, 0.0], Some(n_atoms));
    agent.qnet().set_weights(vec![30.0, 0.0]);
    agent.qnet_tgt().set_weights(vec![10.0, 25.0]);

    let per_config = PerConfig::default();
    let mut buf = buffer(Some(per_config.clone()));
    buf.push(one_transition(0.0, false)).unwrap();
    buf.push(one_transition(0.0, false)).unwrap();
    buf.inner.update_priority(&[0, 1], &[1.0, 3.0]).unwrap();
    let ps = [1.0f32, 3.0]
        .iter()
        .map(|e| (e + per_config.eps).powf(per_config.alpha))
        .collect::<Vec<_>>();

    let loss = agent.opt(&mut buf).unwrap().unwrap();

    // the online distribution has no mass where the target has, so the
    // cross-entropy is bounded by the log floor
    let td_err = -(1e-8f32).ln();
    assert_eq!(buf.priority_updates.len(), 1);
    let (ixs, td_errs) = &buf.priority_updates[0];
    assert_eq!(ixs, &buf.sampled[0]);
    assert_close(td_errs[0], td_err);

    let ix = buf.sampled[0][0];
    let weight = 1.0 / (ps[ix] * 2.0 / (ps[0] + ps[1]));
    let log = agent.qnet().log();
    let target = &log.gradients[0].1;
    match &target.values {
        TargetValues::Categorical(m) => {
            assert_close(m[[0, 12]], 0.5);
            assert_close(m[[0, 13]], 0.5);
        }
        v => panic!("unexpected target {:?}", v),
    }
    assert_close(target.weights.as_ref().unwrap()[0], weight);
    assert!((loss - td_err * weight).abs() < 1e-3);
}

#[test_log::test]
fn test_prioritized_replay_feedback() {
    let mut env = scripted_env(3, 2, 1);
    let mut buf = buffer(Some(PerConfig::default()));
    let config = greedy_config()
        .batch_size(2)
        .min_transitions_warmup(1)
        .beta(LinearScheduler::new(0.5, 1.0, 12));
    let mut agent = agent(config, vec![0.0, 1.0], None);
    assert_close(agent.beta(), 0.5);

    agent.fit(&mut env, &mut buf, 6, true).unwrap();
    assert_eq!(agent.n_opts(), 6);
    assert_close(agent.beta(), 0.75);

    assert_eq!(buf.priority_updates.len(), 6);
    for ((ixs, td_errs), sampled) in buf.priority_updates.iter().zip(buf.sampled.iter()) {
        assert_eq!(ixs, sampled);
        assert_eq!(td_errs.len(), 2);
        assert!(td_errs.iter().all(|e| e.is_finite() && *e >= 0.0));
    }
    for (_, target) in agent.qnet().log().gradients.iter() {
        let ws = target.weights.as_ref().unwrap();
        assert_eq!(ws.len(), 2);
        assert!(ws.iter().all(|w| w.is_finite() && *w > 0.0));
    }
}

#[test_log::test]
fn test_epsilon_annealing() {
    let mut env = scripted_env(3, 2, 1);
    let mut buf = buffer(None);
    let config = greedy_config().epsilon(LinearScheduler::new(1.0, 0.0, 12));
    let mut agent = agent(config, vec![0.0, 1.0], None);
    assert_close(agent.epsilon(), 1.0);

    let record = agent.fit(&mut env, &mut buf, 6, false).unwrap();
    assert_close(agent.epsilon(), 0.5);
    assert_close(record.get_scalar("epsilon").unwrap(), 0.5);

    agent.fit(&mut env, &mut buf, 30, false).unwrap();
    assert_close(agent.epsilon(), 0.0);
}

#[test_log::test]
fn test_noisy_mode() {
    let mut env = scripted_env(2, 2, 1);
    let mut buf = buffer(None);
    let mut agent = agent(DqnConfig::default().distributional(None).noisy(true), vec![0.0, 1.0], None);
    assert_eq!(agent.epsilon(), 0.0);

    agent.evaluate(&mut env, 1).unwrap();
    assert_eq!(agent.qnet().log().noise, vec![false]);
    assert!(!agent.is_train());

    agent.fit(&mut env, &mut buf, 2, false).unwrap();
    agent.evaluate(&mut env, 1).unwrap();
    assert_eq!(agent.qnet().log().noise, vec![false, true, false, true]);
    assert!(agent.is_train());
}

#[test_log::test]
fn test_evaluate() {
    let mut env = scripted_env(3, 2, 3);
    let mut agent = agent(greedy_config(), vec![0.0, 1.0], None);

    let (mean, std) = agent.evaluate(&mut env, 4).unwrap();
    assert_eq!(mean, 6.0);
    assert_eq!(std, 0.0);
    assert!(!agent.qnet().log().greedy.is_empty());
    assert_eq!(agent.evaluate(&mut env, 0).unwrap(), (0.0, 0.0));
}

#[test_log::test]
fn test_mean_max_q() {
    let w = layout().len();
    let samples = Array2::from_shape_fn((2500, w), |(i, j)| if j == 0 && i % 2 == 0 { 255 } else { 0 });

    let mut agent = agent(greedy_config(), vec![0.0, 1.0], None);
    assert_close(agent.mean_max_q(&samples).unwrap(), 1.5);
    assert_eq!(agent.qnet().log().forward, 3);
    assert_eq!(agent.mean_max_q(&Array2::zeros((0, w))).unwrap(), 0.0);

    let n_atoms = CategoricalConfig::default().n_atoms;
    let config = greedy_config().distributional(Some(CategoricalConfig::default()));
    let mut agent = self::agent(config, vec![10.0, 25.0], Some(n_atoms));
    assert_close(agent.mean_max_q(&samples).unwrap(), 10.0);
}

#[test_log::test]
fn test_fixed_samples() {
    let mut env = scripted_env(3, 2, 1);
    let samples = fixed_samples(&mut env, 4, 5, 42).unwrap();
    let l = layout();
    assert_eq!(samples.dim(), (5, l.len()));

    for (i, row) in samples.outer_iter().enumerate() {
        let step = if i < 3 { 1 } else { 2 };
        // first auxiliary byte is the last action
        let action = row[l.spatial_len()];
        assert!(action < 4);
        assert_eq!(row.to_vec(), ScriptedGame::observation(&l, 1, step, action));
    }
}
