use gridworld::{Env, EnvError, GridSpec, GridWorld, ObjectKind, PrivilegedState};

fn world(id: &str, seed: u64) -> GridWorld {
    GridWorld::new(id.parse::<GridSpec>().unwrap(), seed)
}

#[test]
fn empty_grid_goal_is_bottom_right() {
    let mut env = world("Grid-Empty-5x5", 0);
    env.reset();
    let snap = env.snapshot();
    assert_eq!(snap.agent, (0, 0));
    assert_eq!(snap.objects.len(), 1);
    assert_eq!(snap.objects[0].kind, ObjectKind::Goal);
    assert_eq!(snap.objects[0].pos, (4, 4));
}

#[test]
fn shortest_path_earns_discounted_reward() {
    let mut env = world("Grid-Empty-5x5", 0);
    env.reset();
    let path = [2, 2, 2, 2, 1, 1, 1];
    for &a in &path {
        let step = env.step(a).unwrap();
        assert!(!step.done);
        assert_eq!(step.reward, 0.0);
    }
    let last = env.step(1).unwrap();
    assert!(last.done);
    let expected = 1.0 - 0.9 * 8.0 / 100.0;
    assert!((last.reward - expected).abs() < 1e-6, "{}", last.reward);
    assert_eq!(env.step(0), Err(EnvError::EpisodeFinished));
}

#[test]
fn moves_clamp_at_border() {
    let mut env = world("Grid-Empty-4x4", 0);
    env.reset();
    env.step(0).unwrap();
    env.step(3).unwrap();
    assert_eq!(env.snapshot().agent, (0, 0));
}

#[test]
fn invalid_action_is_an_error() {
    let mut env = world("Grid-Empty-4x4", 0);
    env.reset();
    assert_eq!(env.step(4), Err(EnvError::InvalidAction { action: 4, n_actions: 4 }));
}

#[test]
fn time_limit_ends_episode_without_reward() {
    let mut env = world("Grid-Empty-3x3", 0);
    env.reset();
    let limit = env.spec().max_steps();
    let mut last = None;
    for _ in 0..limit {
        last = Some(env.step(0).unwrap());
    }
    let last = last.unwrap();
    assert!(last.done);
    assert_eq!(last.reward, 0.0);
}

#[test]
fn object_layouts_are_seeded_and_disjoint() {
    let a = {
        let mut env = world("Grid-Objects-6x6", 42);
        env.reset();
        env.snapshot()
    };
    let b = {
        let mut env = world("Grid-Objects-6x6", 42);
        env.reset();
        env.snapshot()
    };
    assert_eq!(a, b);
    assert_eq!(a.objects.len(), 1 + 3);
    assert_eq!(a.objects.iter().filter(|o| o.kind == ObjectKind::Goal).count(), 1);
    for (i, o) in a.objects.iter().enumerate() {
        assert_ne!(o.pos, a.agent);
        assert!(a.objects[i + 1..].iter().all(|p| p.pos != o.pos));
    }
}

#[test]
fn observation_marks_out_of_bounds_cells() {
    let mut env = world("Grid-Empty-5x5", 0);
    let obs = env.reset();
    // top-left corner of the 5x5 window lies outside the grid
    assert_eq!(&obs[..4], &[0.0, 0.0, 0.0, 1.0]);
    // agent at (0, 0) sits in the window centre
    let centre = (2 * 5 + 2) * 4;
    assert_eq!(obs[centre + 3], 0.0);
    assert_eq!(&obs[obs.len() - 2..], &[0.0, 0.0]);
}
