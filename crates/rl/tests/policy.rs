use ml::Tape;
use oracle::Subject;
use rl::{build_policy, Config, Exchange, MemoryState, Policy, PolicyDims, PolicyKind, StepView};

const DIMS: PolicyDims = PolicyDims { obs: 6, actions: 4, questions: 9, exchange: 4 };

fn config(use_mem: bool, exp_mem: bool, baseline: bool) -> Config {
    Config {
        use_mem,
        exp_mem,
        baseline,
        hidden_dim: 8,
        memory_dim: 5,
        slot_dim: 3,
        ..Config::default()
    }
}

fn policy(use_mem: bool, exp_mem: bool, baseline: bool) -> Box<dyn Policy> {
    build_policy(&config(use_mem, exp_mem, baseline), DIMS, &mut fastrand::Rng::with_seed(17))
}

fn exchange(slot: usize) -> Exchange {
    Exchange { question: 2, answer: 6, slot, features: vec![0.5, -0.25, 1.0, 0.75] }
}

const OBS: [f32; 6] = [0.1, 0.2, 0.0, 1.0, 0.5, 0.3];

fn view<'a>(memory: &'a MemoryState, exchange: Option<&'a Exchange>) -> StepView<'a> {
    StepView { obs: &OBS, memory, exchange }
}

fn rng(seed: u64) -> fastrand::Rng {
    fastrand::Rng::with_seed(seed)
}

#[test]
fn variants_follow_config() {
    assert_eq!(policy(false, false, false).kind(), PolicyKind::Stateless);
    assert_eq!(policy(true, false, false).kind(), PolicyKind::Recurrent);
    assert_eq!(policy(true, true, false).kind(), PolicyKind::Slots);
    assert!(!policy(true, true, true).asks_questions());
    assert!(policy(false, false, false).asks_questions());
}

#[test]
fn baseline_has_no_question_head() {
    let p = policy(true, false, true);
    let memory = p.reset_memory();
    let mut tape = Tape::new();
    let out = p.forward(&[StepView { obs: &OBS, memory: &memory, exchange: None }], &mut tape);
    assert!(out.question_logits.is_none());
    assert!(out.qa_value.is_none());
    let d = p.act(view(&memory, None), &mut rng(1));
    assert_eq!(d.question, None);
    assert_eq!(d.log_prob_question, 0.0);
}

#[test]
fn shared_qa_baseline_reuses_value_head() {
    let cfg = Config { qa_baseline: rl::QaBaseline::Shared, ..config(false, false, false) };
    let p = build_policy(&cfg, DIMS, &mut fastrand::Rng::with_seed(3));
    assert!(p.named_params().iter().all(|(name, _)| !name.starts_with("head.qa_value")));
    let memory = p.reset_memory();
    let d = p.act(view(&memory, None), &mut rng(1));
    assert_eq!(d.value, d.qa_value);
}

#[test]
fn recurrent_memory_is_identity_without_exchange() {
    let p = policy(true, false, false);
    let memory = MemoryState { values: vec![0.3, -0.1, 0.0, 0.9, -0.7], filled: vec![] };
    let d = p.act(view(&memory, None), &mut rng(1));
    assert_eq!(d.memory, memory);
}

#[test]
fn recurrent_exchange_updates_memory_with_gradient() {
    let p = policy(true, false, false);
    let memory = p.reset_memory();
    let ex = exchange(0);
    let mut tape = Tape::new();
    let out = p.forward(&[StepView { obs: &OBS, memory: &memory, exchange: Some(&ex) }], &mut tape);
    let m = out.memory.unwrap();
    assert!(tape.value(m).iter().any(|&v| v != 0.0));

    let loss = tape.reduce_sum(m);
    let grads = tape.backward(loss).unwrap();
    let params = p.named_params();
    let (_, gru_w) = params.iter().find(|(n, _)| n == "memory.gru.candidate.w").unwrap();
    assert!(grads.get(gru_w).unwrap().iter().any(|&g| g != 0.0));
}

#[test]
fn batched_rows_fold_independently() {
    let p = policy(true, false, false);
    let memory = MemoryState { values: vec![0.2; 5], filled: vec![] };
    let ex = exchange(0);
    let mut tape = Tape::new();
    let out = p.forward(
        &[
            StepView { obs: &OBS, memory: &memory, exchange: Some(&ex) },
            StepView { obs: &OBS, memory: &memory, exchange: None },
        ],
        &mut tape,
    );
    let m = tape.value(out.memory.unwrap());
    assert_ne!(&m[..5], &memory.values[..]);
    assert_eq!(&m[5..], &memory.values[..]);
}

#[test]
fn slot_write_touches_only_its_subject() {
    let p = policy(true, true, false);
    let memory = p.reset_memory();
    assert_eq!(memory.filled.len(), Subject::COUNT);
    let slot = 7;
    let ex = exchange(slot);
    let d = p.act(view(&memory, Some(&ex)), &mut rng(2));

    assert!(d.memory.filled[slot]);
    assert_eq!(d.memory.filled.iter().filter(|&&f| f).count(), 1);
    for (s, chunk) in d.memory.values.chunks(3).enumerate() {
        if s == slot {
            assert!(chunk.iter().any(|&v| v != 0.0));
        } else {
            assert!(chunk.iter().all(|&v| v == 0.0));
        }
    }

    let later = p.act(view(&d.memory, None), &mut rng(2));
    assert_eq!(later.memory, d.memory);
}

#[test]
fn slot_read_changes_outputs_once_filled() {
    let p = policy(true, true, false);
    let empty = p.reset_memory();
    let ex = exchange(3);
    let filled = p.act(view(&empty, Some(&ex)), &mut rng(0)).memory;

    let value_of = |memory: &MemoryState| {
        let mut tape = Tape::new();
        let out = p.forward(&[StepView { obs: &OBS, memory, exchange: None }], &mut tape);
        tape.scalar(out.value)
    };
    assert_ne!(value_of(&empty), value_of(&filled));
}

#[test]
fn stateless_ignores_memory_and_exchange() {
    let p = policy(false, false, false);
    let memory = p.reset_memory();
    assert!(memory.is_empty());
    assert!(!policy(true, false, false).reset_memory().is_empty());
    let ex = exchange(1);
    let value = |exchange: Option<&Exchange>| {
        let mut tape = Tape::new();
        let out = p.forward(&[StepView { obs: &OBS, memory: &memory, exchange }], &mut tape);
        assert!(out.memory.is_none());
        tape.scalar(out.value)
    };
    assert_eq!(value(None), value(Some(&ex)));
}

#[test]
fn parameter_names_are_unique_and_ordered() {
    for (m, e) in [(false, false), (true, false), (true, true)] {
        let mut p = policy(m, e, false);
        let names: Vec<String> = p.named_params().into_iter().map(|(n, _)| n).collect();
        let mut_names: Vec<String> = p.named_params_mut().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, mut_names);
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }
}
