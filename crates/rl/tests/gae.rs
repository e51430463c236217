use oracle::{Subject, Verdict};
use rl::gae::{self, gae, AdvantageParams};
use rl::{MemoryState, RolloutBuffer, Transition};

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

#[test]
fn zero_lambda_is_td_residual() {
    let rewards = [0.5, -1.0, 2.0, 0.25];
    let values = [0.1, 0.4, -0.3, 0.8];
    let dones = [false, false, false, true];
    let gamma = 0.9;
    let (adv, ret) = gae(&rewards, &values, &dones, 0.0, gamma, 0.0);
    for t in 0..4 {
        let next = if t + 1 < 4 { values[t + 1] } else { 0.0 };
        let expected = rewards[t] + gamma * next - values[t];
        assert!(close(adv[t], expected), "t={t}: {} vs {expected}", adv[t]);
        assert!(close(ret[t], adv[t] + values[t]));
    }
}

#[test]
fn unit_lambda_is_monte_carlo_minus_baseline() {
    let rewards = [1.0, 0.0, 0.5, 2.0];
    let values = [0.3, -0.2, 0.7, 0.1];
    let dones = [false, false, false, true];
    let gamma = 0.95;
    let (adv, ret) = gae(&rewards, &values, &dones, 0.0, gamma, 1.0);
    let mut g = 0.0;
    for t in (0..4).rev() {
        g = rewards[t] + gamma * g;
        assert!(close(adv[t], g - values[t]), "t={t}");
        assert!(close(ret[t], g));
    }
}

#[test]
fn non_terminal_tail_bootstraps() {
    let (adv, _) = gae(&[0.0], &[0.0], &[false], 2.0, 0.5, 0.95);
    assert!(close(adv[0], 1.0));
}

#[test]
fn done_stops_bootstrapping_mid_sequence() {
    let (adv, _) = gae(&[1.0, 1.0], &[0.0, 10.0], &[true, true], 0.0, 0.99, 0.95);
    assert!(close(adv[0], 1.0));
}

fn step(
    reward: f32,
    shaping: f32,
    question: Option<usize>,
    qa_value: f32,
    done: bool,
) -> Transition {
    let verdict = question.map(|_| Verdict::Answered {
        answer: 0,
        subject: Subject { kind: gridworld::ObjectKind::Key, color: gridworld::Color::Red },
    });
    Transition {
        obs: vec![0.0],
        action: 0,
        question,
        log_prob_action: 0.0,
        log_prob_question: 0.0,
        value: 0.0,
        qa_value,
        reward,
        shaping_reward: shaping,
        verdict,
        done,
        memory_in: MemoryState::default(),
        exchange_in: None,
        memory_out: MemoryState::default(),
    }
}

fn params(advantage_qa_param: f32) -> AdvantageParams {
    AdvantageParams { gamma: 0.5, lambda: 1.0, advantage_qa_param, normalize: false }
}

#[test]
fn question_stream_skips_silent_steps() {
    let mut buf = RolloutBuffer::new();
    buf.push(step(0.2, 0.2, Some(0), 0.0, false));
    buf.push(step(0.0, 0.0, None, 0.0, false));
    buf.push(step(-0.2, -0.2, Some(3), 0.0, false));
    buf.push(step(1.0, 0.0, None, 0.0, true));
    buf.end_episode();

    let adv = gae::compute(&buf, params(0.0));
    assert_eq!(adv.asked, vec![0, 2]);
    // asked steps form their own two-step chain: 0.2 + 0.5 * -0.2
    assert!(close(adv.qa[0], 0.1));
    assert!(close(adv.qa[2], -0.2));
    assert_eq!(adv.qa[1], 0.0);
    assert_eq!(adv.qa[3], 0.0);
}

#[test]
fn silent_episodes_add_nothing_to_question_stream() {
    let mut buf = RolloutBuffer::new();
    buf.push(step(0.0, 0.0, None, 0.0, false));
    buf.push(step(1.0, 0.0, None, 0.0, true));
    buf.end_episode();
    buf.push(step(0.2, 0.2, Some(1), 0.0, true));
    buf.end_episode();

    let adv = gae::compute(&buf, params(0.0));
    assert_eq!(adv.asked, vec![2]);
    assert!(adv.qa[..2].iter().all(|&a| a == 0.0));
}

#[test]
fn question_advantage_borrows_action_advantage() {
    let mut buf = RolloutBuffer::new();
    buf.push(step(1.2, 0.2, Some(0), 0.0, true));
    buf.end_episode();
    let adv = gae::compute(&buf, params(0.25));
    assert!(close(adv.action[0], 1.2));
    assert!(close(adv.qa[0], 0.2 + 0.25 * 1.2));
    assert!(close(adv.qa_returns[0], 0.2));
}

#[test]
fn episodes_do_not_leak_into_each_other() {
    let mut buf = RolloutBuffer::new();
    buf.push(step(0.0, 0.0, None, 0.0, true));
    buf.end_episode();
    buf.push(step(5.0, 0.0, None, 0.0, true));
    buf.end_episode();
    let adv = gae::compute(&buf, params(0.0));
    assert_eq!(adv.action[0], 0.0);
    assert!(close(adv.action[1], 5.0));
}
