//! Generalised advantage estimation for the action and question streams.

use crate::buffer::RolloutBuffer;

/// GAE over one trajectory.
///
/// `dones[t]` marks that step `t` ended the episode, so nothing is
/// bootstrapped past it. `last_value` is used after the final step when it is
/// not terminal. Returns `(advantages, returns)` with `returns = adv + value`.
pub fn gae(
    rewards: &[f32],
    values: &[f32],
    dones: &[bool],
    last_value: f32,
    gamma: f32,
    lambda: f32,
) -> (Vec<f32>, Vec<f32>) {
    let n = rewards.len();
    assert!(values.len() == n && dones.len() == n, "gae: stream lengths differ");
    let mut advantages = vec![0.0; n];
    let mut next_value = last_value;
    let mut next_adv = 0.0;
    for t in (0..n).rev() {
        let live = if dones[t] { 0.0 } else { 1.0 };
        let delta = rewards[t] + gamma * next_value * live - values[t];
        next_adv = delta + gamma * lambda * live * next_adv;
        advantages[t] = next_adv;
        next_value = values[t];
    }
    let returns = advantages.iter().zip(values).map(|(a, v)| a + v).collect();
    (advantages, returns)
}

/// Per-step targets for one update.
#[derive(Clone, Debug, Default)]
pub struct Advantages {
    pub action: Vec<f32>,
    pub action_returns: Vec<f32>,
    /// Indexed like the buffer; zero where no question was asked.
    pub qa: Vec<f32>,
    pub qa_returns: Vec<f32>,
    /// Buffer indices of steps that asked a question.
    pub asked: Vec<usize>,
}

#[derive(Clone, Copy, Debug)]
pub struct AdvantageParams {
    pub gamma: f32,
    pub lambda: f32,
    /// Share of the action advantage added to a question's advantage.
    pub advantage_qa_param: f32,
    pub normalize: bool,
}

/// Computes both advantage streams for every closed episode in `buffer`.
///
/// The action stream uses total reward against the value head. The question
/// stream runs over each episode's asked steps only, on shaping reward,
/// treating the last asked step as terminal. Episodes without a question add
/// nothing to it.
pub fn compute(buffer: &RolloutBuffer, params: AdvantageParams) -> Advantages {
    let steps = buffer.transitions();
    let n = steps.len();
    let mut out = Advantages {
        action: vec![0.0; n],
        action_returns: vec![0.0; n],
        qa: vec![0.0; n],
        qa_returns: vec![0.0; n],
        asked: Vec::new(),
    };

    for episode in buffer.episodes() {
        let ep = &steps[episode.clone()];
        let rewards: Vec<f32> = ep.iter().map(|t| t.reward).collect();
        let values: Vec<f32> = ep.iter().map(|t| t.value).collect();
        let dones: Vec<bool> = ep.iter().map(|t| t.done).collect();
        let (adv, ret) = gae(&rewards, &values, &dones, 0.0, params.gamma, params.lambda);
        out.action[episode.clone()].copy_from_slice(&adv);
        out.action_returns[episode.clone()].copy_from_slice(&ret);

        let asked: Vec<usize> = episode.clone().filter(|&i| steps[i].question.is_some()).collect();
        if asked.is_empty() {
            continue;
        }
        let rewards: Vec<f32> = asked.iter().map(|&i| steps[i].shaping_reward).collect();
        let values: Vec<f32> = asked.iter().map(|&i| steps[i].qa_value).collect();
        let mut dones = vec![false; asked.len()];
        if let Some(last) = dones.last_mut() {
            *last = true;
        }
        let (adv, ret) = gae(&rewards, &values, &dones, 0.0, params.gamma, params.lambda);
        for (k, &i) in asked.iter().enumerate() {
            out.qa[i] = adv[k];
            out.qa_returns[i] = ret[k];
        }
        out.asked.extend(asked);
    }

    if params.normalize {
        normalize(&mut out.action);
    }
    for &i in &out.asked {
        out.qa[i] += params.advantage_qa_param * out.action[i];
    }
    if params.normalize {
        let mut qa: Vec<f32> = out.asked.iter().map(|&i| out.qa[i]).collect();
        normalize(&mut qa);
        for (&i, v) in out.asked.iter().zip(qa) {
            out.qa[i] = v;
        }
    }
    out
}

/// Zero mean, unit variance. Fewer than two values are left alone.
pub fn normalize(values: &mut [f32]) {
    if values.len() < 2 {
        return;
    }
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n).sqrt();
    values.iter_mut().for_each(|v| *v = (*v - mean) / (std + 1e-8));
}
