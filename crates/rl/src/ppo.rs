use crate::buffer::{RolloutBuffer, Transition};
use crate::config::Config;
use crate::encoder::{EncodedBank, LanguageEncoder};
use crate::error::RlError;
use crate::gae::{self, AdvantageParams, Advantages};
use crate::logger::{MetricsLogger, Scalars};
use crate::memory::Exchange;
use crate::policy::{build_policy, Policy, PolicyDims, StepView};
use gridworld::{Env, PrivilegedState};
use ml::{Adam, Tape, Tensor, Var};
use oracle::{vocab, ExtendedAction, OracleEnv, QuestionBank, Verdict};

/// Counters for one episode.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EpisodeStats {
    pub reward: f32,
    pub base_reward: f32,
    pub length: usize,
    pub asked: usize,
    pub answered: usize,
    pub syntax_errors: usize,
    pub undefined_errors: usize,
}

impl EpisodeStats {
    fn record(&mut self, verdict: &Verdict) {
        self.asked += 1;
        match verdict {
            Verdict::Answered { .. } => self.answered += 1,
            Verdict::SyntaxError => self.syntax_errors += 1,
            Verdict::UndefinedError => self.undefined_errors += 1,
        }
    }

    fn scalars(&self) -> Scalars {
        Scalars::from([
            ("episode/reward", self.reward),
            ("episode/base_reward", self.base_reward),
            ("episode/length", self.length as f32),
            ("episode/asked", self.asked as f32),
            ("episode/answered", self.answered as f32),
            ("episode/syntax_errors", self.syntax_errors as f32),
            ("episode/undefined_errors", self.undefined_errors as f32),
        ])
    }
}

/// Mean losses over the minibatches of one update.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UpdateStats {
    pub loss: f32,
    pub action_loss: f32,
    pub value_loss: f32,
    pub qa_loss: f32,
    pub qa_value_loss: f32,
    pub entropy: f32,
    pub qa_entropy: f32,
    pub grad_norm: f32,
    pub minibatches: usize,
    pub skipped: usize,
}

impl UpdateStats {
    fn add(&mut self, mb: &UpdateStats) {
        self.loss += mb.loss;
        self.action_loss += mb.action_loss;
        self.value_loss += mb.value_loss;
        self.qa_loss += mb.qa_loss;
        self.qa_value_loss += mb.qa_value_loss;
        self.entropy += mb.entropy;
        self.qa_entropy += mb.qa_entropy;
        self.grad_norm += mb.grad_norm;
        self.minibatches += 1;
    }

    fn finish(&mut self) {
        if self.minibatches == 0 {
            return;
        }
        let n = self.minibatches as f32;
        for v in [
            &mut self.loss,
            &mut self.action_loss,
            &mut self.value_loss,
            &mut self.qa_loss,
            &mut self.qa_value_loss,
            &mut self.entropy,
            &mut self.qa_entropy,
            &mut self.grad_norm,
        ] {
            *v /= n;
        }
    }

    fn scalars(&self) -> Scalars {
        Scalars::from([
            ("update/loss", self.loss),
            ("update/action_loss", self.action_loss),
            ("update/value_loss", self.value_loss),
            ("update/qa_loss", self.qa_loss),
            ("update/qa_value_loss", self.qa_value_loss),
            ("update/entropy", self.entropy),
            ("update/qa_entropy", self.qa_entropy),
            ("update/grad_norm", self.grad_norm),
            ("update/skipped", self.skipped as f32),
        ])
    }
}

/// Proximal policy optimisation with a second, question-asking objective.
///
/// Each iteration collects `episodes_per_update` whole episodes with the
/// current parameters, computes both advantage streams, then runs `epochs`
/// passes of shuffled minibatches. Parameters only change in the last phase.
pub struct PpoTrainer {
    config: Config,
    policy: Box<dyn Policy>,
    optimizer: Adam,
    bank: QuestionBank,
    encoded: EncodedBank,
    rng: fastrand::Rng,
    logger: Box<dyn MetricsLogger>,
    episodes_done: usize,
    updates_done: usize,
}

impl PpoTrainer {
    pub fn new(
        config: &Config,
        policy: Box<dyn Policy>,
        bank: QuestionBank,
        encoded: EncodedBank,
        logger: Box<dyn MetricsLogger>,
    ) -> Self {
        let optimizer = {
            let params = policy.named_params();
            let tensors: Vec<&Tensor> = params.iter().map(|(_, t)| *t).collect();
            Adam::new(&tensors, config.lr)
        };
        Self {
            config: config.clone(),
            policy,
            optimizer,
            bank,
            encoded,
            rng: fastrand::Rng::with_seed(config.seed.wrapping_add(0x9e37_79b9)),
            logger,
            episodes_done: 0,
            updates_done: 0,
        }
    }

    /// Builds the question bank, its embeddings and the policy variant
    /// selected by `config`.
    pub fn from_config(
        config: &Config,
        obs_size: usize,
        action_size: usize,
        encoder: &dyn LanguageEncoder,
        logger: Box<dyn MetricsLogger>,
    ) -> Self {
        let bank = QuestionBank::new(config.corrupted_questions, config.seed);
        let encoded = EncodedBank::new(encoder, &bank);
        let dims = PolicyDims {
            obs: obs_size,
            actions: action_size,
            questions: bank.logit_width(),
            exchange: encoded.exchange_dim(),
        };
        let policy = build_policy(config, dims, &mut fastrand::Rng::with_seed(config.seed));
        Self::new(config, policy, bank, encoded, logger)
    }

    pub fn policy(&self) -> &dyn Policy {
        self.policy.as_ref()
    }

    pub fn policy_mut(&mut self) -> &mut dyn Policy {
        self.policy.as_mut()
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub fn episodes_done(&self) -> usize {
        self.episodes_done
    }

    /// Trains for `episodes` episodes and returns each episode's total reward.
    pub fn train<E: Env + PrivilegedState>(
        &mut self,
        env: &mut OracleEnv<E>,
        episodes: usize,
    ) -> Result<Vec<f32>, RlError> {
        let mut curve = Vec::with_capacity(episodes);
        let mut window: Vec<EpisodeStats> = Vec::new();
        let mut buffer = RolloutBuffer::new();

        while curve.len() < episodes {
            buffer.clear();
            let batch = self.config.episodes_per_update.min(episodes - curve.len());
            for _ in 0..batch {
                let stats = self.collect_episode(env, &mut buffer)?;
                self.episodes_done += 1;
                curve.push(stats.reward);
                self.logger.log(self.episodes_done, &stats.scalars());
                window.push(stats);
                if window.len() >= self.config.train_log_interval {
                    self.summarize(&window);
                    window.clear();
                }
            }
            let stats = self.update(&buffer)?;
            self.logger.log(self.episodes_done, &stats.scalars());
        }
        if !window.is_empty() {
            self.summarize(&window);
        }
        Ok(curve)
    }

    fn summarize(&self, window: &[EpisodeStats]) {
        let n = window.len() as f32;
        let steps: usize = window.iter().map(|s| s.length).sum();
        let asked: usize = window.iter().map(|s| s.asked).sum();
        let answered: usize = window.iter().map(|s| s.answered).sum();
        tracing::info!(
            episodes = self.episodes_done,
            updates = self.updates_done,
            mean_reward = window.iter().map(|s| s.reward).sum::<f32>() / n,
            mean_base_reward = window.iter().map(|s| s.base_reward).sum::<f32>() / n,
            mean_length = steps as f32 / n,
            question_rate = asked as f32 / steps.max(1) as f32,
            answered_rate = answered as f32 / asked.max(1) as f32,
            "training progress"
        );
    }

    /// Runs one whole episode with the current policy and records it.
    ///
    /// If the environment fails mid-episode the partial steps are discarded
    /// and the error is returned.
    pub fn collect_episode<E: Env + PrivilegedState>(
        &mut self,
        env: &mut OracleEnv<E>,
        buffer: &mut RolloutBuffer,
    ) -> Result<EpisodeStats, RlError> {
        let mut obs = env.reset();
        let mut memory = self.policy.reset_memory();
        let mut exchange: Option<Exchange> = None;
        let mut stats = EpisodeStats::default();

        loop {
            let view = StepView { obs: &obs, memory: &memory, exchange: exchange.as_ref() };
            let decision = self.policy.act(view, &mut self.rng);
            let question = decision.question.map(|q| self.bank.phrase(q).to_vec());
            let step = match env.step(&ExtendedAction { movement: decision.action, question }) {
                Ok(step) => step,
                Err(e) => {
                    buffer.discard_partial();
                    return Err(e.into());
                }
            };

            let verdict = step.info.verdict;
            let next_exchange = match (decision.question, verdict) {
                (Some(q), Some(Verdict::Answered { answer, subject })) => Some(Exchange {
                    question: q,
                    answer,
                    slot: subject.slot(),
                    features: self.encoded.exchange(q, answer),
                }),
                _ => None,
            };
            if let (Some(q), Some(v)) = (decision.question, &verdict) {
                stats.record(v);
                if self.config.log_questions {
                    tracing::info!(
                        target: "questions",
                        question = %vocab::decode(self.bank.phrase(q)),
                        verdict = v.label(),
                        answer = ?v.answer().and_then(vocab::word),
                        "asked"
                    );
                }
            }
            stats.reward += step.reward;
            stats.base_reward += step.info.base_reward;
            stats.length += 1;

            buffer.push(Transition {
                obs,
                action: decision.action,
                question: decision.question,
                log_prob_action: decision.log_prob_action,
                log_prob_question: decision.log_prob_question,
                value: decision.value,
                qa_value: decision.qa_value,
                reward: step.reward,
                shaping_reward: step.info.shaping_reward,
                verdict,
                done: step.done,
                memory_in: memory,
                exchange_in: exchange,
                memory_out: decision.memory.clone(),
            });

            obs = step.obs;
            memory = decision.memory;
            exchange = next_exchange;
            if step.done {
                break;
            }
        }
        buffer.end_episode();
        Ok(stats)
    }

    /// One optimisation phase over every closed episode in `buffer`.
    pub fn update(&mut self, buffer: &RolloutBuffer) -> Result<UpdateStats, RlError> {
        let steps = buffer.transitions();
        let mut stats = UpdateStats::default();
        if steps.is_empty() {
            return Ok(stats);
        }
        let adv = gae::compute(
            buffer,
            AdvantageParams {
                gamma: self.config.gamma,
                lambda: self.config.lmbda,
                advantage_qa_param: self.config.advantage_qa_param,
                normalize: self.config.normalize_advantages,
            },
        );

        let mut order: Vec<usize> = (0..steps.len()).collect();
        for _ in 0..self.config.epochs {
            self.rng.shuffle(&mut order);
            for chunk in order.chunks(self.config.minibatch_size) {
                match self.minibatch(steps, &adv, chunk)? {
                    Some(mb) => stats.add(&mb),
                    None => stats.skipped += 1,
                }
            }
        }
        stats.finish();
        self.updates_done += 1;
        tracing::debug!(
            update = self.updates_done,
            steps = steps.len(),
            loss = stats.loss,
            skipped = stats.skipped,
            "update done"
        );
        Ok(stats)
    }

    /// Returns `None` when the minibatch was skipped for numerical reasons.
    fn minibatch(
        &mut self,
        steps: &[Transition],
        adv: &Advantages,
        idx: &[usize],
    ) -> Result<Option<UpdateStats>, RlError> {
        let cfg = &self.config;
        let (clip, value_param, policy_qa_param) = (cfg.clip, cfg.value_param, cfg.policy_qa_param);
        let (entropy_act_param, entropy_qa_param, max_grad_norm) =
            (cfg.entropy_act_param, cfg.entropy_qa_param, cfg.max_grad_norm);
        let gather = |f: &dyn Fn(usize) -> f32| -> Vec<f32> { idx.iter().map(|&i| f(i)).collect() };

        let mut tape = Tape::new();
        let views: Vec<StepView<'_>> = idx
            .iter()
            .map(|&i| StepView {
                obs: &steps[i].obs,
                memory: &steps[i].memory_in,
                exchange: steps[i].exchange_in.as_ref(),
            })
            .collect();
        let out = self.policy.forward(&views, &mut tape);
        let mut stats = UpdateStats::default();

        let logp_all = tape.log_softmax(out.action_logits);
        let actions: Vec<usize> = idx.iter().map(|&i| steps[i].action).collect();
        let logp = tape.select_cols(logp_all, &actions);
        let action_loss = clipped_surrogate(
            &mut tape,
            logp,
            &gather(&|i| steps[i].log_prob_action),
            &gather(&|i| adv.action[i]),
            clip,
        );
        let value_loss = mse(&mut tape, out.value, &gather(&|i| adv.action_returns[i]));
        let entropy = mean_entropy(&mut tape, logp_all);
        stats.action_loss = tape.scalar(action_loss);
        stats.value_loss = tape.scalar(value_loss);
        stats.entropy = tape.scalar(entropy);

        let weighted_value = tape.mul_scalar(value_loss, value_param);
        let weighted_entropy = tape.mul_scalar(entropy, -entropy_act_param);
        let mut loss = tape.add(action_loss, weighted_value);
        loss = tape.add(loss, weighted_entropy);

        if let Some(q_logits) = out.question_logits {
            let q_all = tape.log_softmax(q_logits);
            let q_entropy = mean_entropy(&mut tape, q_all);
            stats.qa_entropy = tape.scalar(q_entropy);
            let weighted = tape.mul_scalar(q_entropy, -entropy_qa_param);
            loss = tape.add(loss, weighted);

            let rows: Vec<usize> =
                (0..idx.len()).filter(|&r| steps[idx[r]].question.is_some()).collect();
            if !rows.is_empty() {
                let asked: Vec<usize> = rows.iter().map(|&r| idx[r]).collect();
                let pick = |f: &dyn Fn(usize) -> f32| -> Vec<f32> {
                    asked.iter().map(|&i| f(i)).collect()
                };
                let columns: Vec<usize> =
                    asked.iter().map(|&i| steps[i].question_column()).collect();
                let q_rows = tape.select_rows(q_all, &rows);
                let q_logp = tape.select_cols(q_rows, &columns);
                let qa_loss = clipped_surrogate(
                    &mut tape,
                    q_logp,
                    &pick(&|i| steps[i].log_prob_question),
                    &pick(&|i| adv.qa[i]),
                    clip,
                );
                stats.qa_loss = tape.scalar(qa_loss);
                let weighted = tape.mul_scalar(qa_loss, policy_qa_param);
                loss = tape.add(loss, weighted);

                if let Some(qa_value) = out.qa_value {
                    let qa_value = tape.select_rows(qa_value, &rows);
                    let qa_value_loss = mse(&mut tape, qa_value, &pick(&|i| adv.qa_returns[i]));
                    stats.qa_value_loss = tape.scalar(qa_value_loss);
                    let weighted = tape.mul_scalar(qa_value_loss, value_param);
                    loss = tape.add(loss, weighted);
                }
            }
        }

        stats.loss = tape.scalar(loss);
        if !stats.loss.is_finite() {
            tracing::warn!(
                loss = stats.loss,
                rows = idx.len(),
                "non-finite loss, skipping minibatch"
            );
            return Ok(None);
        }
        let mut grads = tape.backward(loss)?;
        if !grads.is_finite() {
            tracing::warn!(rows = idx.len(), "non-finite gradient, skipping minibatch");
            return Ok(None);
        }
        stats.grad_norm = grads.clip_global_norm(max_grad_norm);

        let mut params: Vec<&mut Tensor> =
            self.policy.named_params_mut().into_iter().map(|(_, t)| t).collect();
        grads.apply(&mut params);
        self.optimizer.step(&mut params);
        Ok(Some(stats))
    }
}

/// `-mean(min(r A, clip(r, 1 - eps, 1 + eps) A))` with `r = exp(new - old)`.
///
/// The log-ratio is clamped to `[-20, 20]` before exponentiation.
pub fn clipped_surrogate(
    tape: &mut Tape,
    new_logp: Var,
    old_logp: &[f32],
    advantages: &[f32],
    clip: f32,
) -> Var {
    let n = old_logp.len();
    let old = tape.constant(n, 1, old_logp.to_vec());
    let adv = tape.constant(n, 1, advantages.to_vec());
    let diff = tape.sub(new_logp, old);
    let diff = tape.clamp(diff, -20.0, 20.0);
    let ratio = tape.exp(diff);
    let unclipped = tape.mul(ratio, adv);
    let clipped = tape.clamp(ratio, 1.0 - clip, 1.0 + clip);
    let clipped = tape.mul(clipped, adv);
    let surrogate = tape.min(unclipped, clipped);
    let mean = tape.reduce_mean(surrogate);
    tape.mul_scalar(mean, -1.0)
}

/// Mean squared error against constant targets.
pub fn mse(tape: &mut Tape, pred: Var, targets: &[f32]) -> Var {
    let t = tape.constant(targets.len(), 1, targets.to_vec());
    let diff = tape.sub(pred, t);
    let sq = tape.pow(diff, 2.0);
    tape.reduce_mean(sq)
}

/// Mean row entropy of row-wise log-probabilities.
pub fn mean_entropy(tape: &mut Tape, log_probs: Var) -> Var {
    let p = tape.exp(log_probs);
    let plogp = tape.mul(p, log_probs);
    let rows = tape.sum_rows(plogp);
    let mean = tape.reduce_mean(rows);
    tape.mul_scalar(mean, -1.0)
}
