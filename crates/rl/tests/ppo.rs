mod common;

use common::{setup, small_config};
use ml::{Tape, Tensor};
use rl::ppo::clipped_surrogate;
use rl::{Config, PolicyKind, RolloutBuffer, StepView};

fn param_snapshot(trainer: &rl::PpoTrainer) -> Vec<Vec<f32>> {
    trainer.policy().named_params().iter().map(|(_, t)| t.data.clone()).collect()
}

#[test]
fn clipped_surrogate_saturates_far_outside_the_trust_region() {
    let p = Tensor::from_vec(vec![4, 1], vec![0.0; 4]).with_grad();
    let mut tape = Tape::new();
    let new = tape.param(&p);
    // ratios e^3, e^-3 and e^50 (clamped to e^20), all on the clipped side
    let old = [-3.0, 3.0, -50.0, 50.0];
    let loss = clipped_surrogate(&mut tape, new, &old, &[1.0, -1.0, 2.0, -2.0], 0.2);
    let grads = tape.backward(loss).unwrap();
    assert!(grads.get(&p).unwrap().iter().all(|&g| g == 0.0));
    let expected = -(1.2 - 0.8 + 2.4 - 1.6) / 4.0;
    assert!((tape.scalar(loss) - expected).abs() < 1e-5);
}

#[test]
fn clipped_surrogate_has_gradient_inside_the_trust_region() {
    let p = Tensor::from_vec(vec![2, 1], vec![0.0; 2]).with_grad();
    let mut tape = Tape::new();
    let new = tape.param(&p);
    let loss = clipped_surrogate(&mut tape, new, &[0.0, 0.0], &[1.0, -1.0], 0.2);
    let grads = tape.backward(loss).unwrap();
    let g = grads.get(&p).unwrap();
    assert!((g[0] + 0.5).abs() < 1e-6);
    assert!((g[1] - 0.5).abs() < 1e-6);
}

#[test]
fn every_variant_trains_end_to_end() {
    for (use_mem, exp_mem, baseline, kind) in [
        (false, false, true, PolicyKind::Stateless),
        (false, false, false, PolicyKind::Stateless),
        (true, false, false, PolicyKind::Recurrent),
        (true, true, false, PolicyKind::Slots),
    ] {
        let config =
            Config { use_mem, exp_mem, baseline, episodes_per_update: 2, ..small_config() };
        let (mut trainer, mut env) = setup(&config);
        assert_eq!(trainer.policy().kind(), kind);
        let before = param_snapshot(&trainer);
        let curve = trainer.train(&mut env, 4).unwrap();
        assert_eq!(curve.len(), 4);
        assert!(curve.iter().all(|r| r.is_finite()));
        assert_eq!(trainer.episodes_done(), 4);
        assert_ne!(before, param_snapshot(&trainer), "{kind} parameters did not move");
    }
}

#[test]
fn baseline_never_asks() {
    let config = Config { baseline: true, ..small_config() };
    let (mut trainer, mut env) = setup(&config);
    let mut buffer = RolloutBuffer::new();
    let stats = trainer.collect_episode(&mut env, &mut buffer).unwrap();
    assert_eq!(stats.asked, 0);
    assert_eq!(stats.reward, stats.base_reward);
    assert!(buffer.transitions().iter().all(|t| t.question.is_none() && t.verdict.is_none()));
}

#[test]
fn recorded_steps_replay_exactly() {
    for exp_mem in [false, true] {
        let config = Config { exp_mem, ..small_config() };
        let (mut trainer, mut env) = setup(&config);
        let mut buffer = RolloutBuffer::new();
        for _ in 0..10 {
            trainer.collect_episode(&mut env, &mut buffer).unwrap();
            if buffer.transitions().iter().any(|t| t.exchange_in.is_some()) {
                break;
            }
        }
        let steps = buffer.transitions();
        assert!(steps.iter().any(|t| t.exchange_in.is_some()), "no answered question to replay");

        for episode in buffer.episodes() {
            let ep = &steps[episode.clone()];
            assert!(ep.last().unwrap().done);
            assert!(ep[0].exchange_in.is_none());
            for pair in ep.windows(2) {
                assert_eq!(pair[0].memory_out, pair[1].memory_in);
            }
        }
        for t in steps {
            let mut tape = Tape::new();
            let view = StepView {
                obs: &t.obs,
                memory: &t.memory_in,
                exchange: t.exchange_in.as_ref(),
            };
            let out = trainer.policy().forward(&[view], &mut tape);
            assert_eq!(tape.value(out.memory.unwrap()), &t.memory_out.values[..]);
            assert!((tape.scalar(out.value) - t.value).abs() < 1e-6);
        }
    }
}

#[test]
fn shaping_only_on_asked_steps() {
    let (mut trainer, mut env) = setup(&small_config());
    let mut buffer = RolloutBuffer::new();
    trainer.collect_episode(&mut env, &mut buffer).unwrap();
    for t in buffer.transitions() {
        assert_eq!(t.question.is_some(), t.verdict.is_some());
        if t.question.is_none() {
            assert_eq!(t.shaping_reward, 0.0);
        }
        if t.exchange_in.is_some() {
            assert!(t.memory_in.values.len() == t.memory_out.values.len());
        }
    }
}

#[test]
fn non_finite_batches_are_skipped_without_touching_parameters() {
    let (mut trainer, mut env) = setup(&small_config());
    let mut collected = RolloutBuffer::new();
    trainer.collect_episode(&mut env, &mut collected).unwrap();

    let mut poisoned = RolloutBuffer::new();
    for t in collected.transitions() {
        let mut t = t.clone();
        t.reward = f32::NAN;
        let done = t.done;
        poisoned.push(t);
        if done {
            poisoned.end_episode();
        }
    }

    let before = param_snapshot(&trainer);
    let stats = trainer.update(&poisoned).unwrap();
    assert_eq!(stats.minibatches, 0);
    assert!(stats.skipped > 0);
    assert_eq!(before, param_snapshot(&trainer));

    // training carries on afterwards
    let stats = trainer.update(&collected).unwrap();
    assert!(stats.minibatches > 0);
}

#[test]
fn empty_buffer_is_a_no_op() {
    let (mut trainer, _) = setup(&small_config());
    let before = param_snapshot(&trainer);
    let stats = trainer.update(&RolloutBuffer::new()).unwrap();
    assert_eq!(stats.minibatches, 0);
    assert_eq!(before, param_snapshot(&trainer));
}

#[derive(Clone, Default)]
struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn logged_questions_reach_the_default_subscriber() {
    let captured = Captured::default();
    let writer = captured.clone();
    // same level filter as the binary's `fmt::init()`
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let (mut trainer, mut env) = setup(&Config { log_questions: true, ..small_config() });
    let mut buffer = RolloutBuffer::new();
    tracing::subscriber::with_default(subscriber, || {
        for _ in 0..5 {
            let stats = trainer.collect_episode(&mut env, &mut buffer).unwrap();
            if stats.asked > 0 {
                break;
            }
        }
    });
    assert!(buffer.transitions().iter().any(|t| t.question.is_some()), "no question asked");
    let out = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
    assert!(out.contains("asked") && out.contains("question="), "{out}");
}
