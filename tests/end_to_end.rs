//! End-to-end scenarios seeded by the scheduler's testable properties:
//! fib, n-queens, numerical integration, and a Monte-Carlo pi estimate,
//! each run through `Scheduler::run` under a handful of worker counts.

use forkpool::{call, spawn, sync, Scheduler, SchedulerConfig, Scope};

fn fib(scope: &Scope<'_>, n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    spawn!(scope, left, move |s: &Scope<'_>| fib(s, n - 1));
    let right = fib(scope, n - 2);
    sync!(scope, left) + right
}

/// Counts solutions to the n-queens problem by placing one queen per row
/// and spawning the search for each legal column choice in parallel.
fn nqueens(scope: &Scope<'_>, n: usize, placed: &[usize]) -> u64 {
    if placed.len() == n {
        return 1;
    }

    let row = placed.len();
    let mut candidates = Vec::new();
    for col in 0..n {
        let ok = placed.iter().enumerate().all(|(r, &c)| {
            c != col && (r as isize - row as isize).abs() != (c as isize - col as isize).abs()
        });
        if ok {
            candidates.push(col);
        }
    }

    if candidates.is_empty() {
        return 0;
    }

    // Fork the first candidate's subtree; explore the rest as ordinary
    // calls in the same task body (a frame's address can't move once a
    // FrameRef points at it, so a single spawned branch per call, not a
    // dynamic fan-out, is the shape that fits safe Rust here).
    let (first, rest) = candidates.split_first().unwrap();
    let mut first_placed = placed.to_vec();
    first_placed.push(*first);
    spawn!(scope, first_branch, move |s: &Scope<'_>| nqueens(
        s,
        n,
        &first_placed
    ));

    let mut total = 0u64;
    for &col in rest {
        let mut child_placed = placed.to_vec();
        child_placed.push(col);
        total += call!(scope, move |s: &Scope<'_>| nqueens(s, n, &child_placed));
    }

    total + sync!(scope, first_branch)
}

/// Adaptive Simpson's rule, recursing (and forking) on subintervals whose
/// estimate disagrees with the coarse approximation by more than `eps`.
fn integrate(
    scope: &Scope<'_>,
    f: impl Fn(f64) -> f64 + Copy + Send + Sync + 'static,
    a: f64,
    fa: f64,
    b: f64,
    fb: f64,
    eps: f64,
) -> f64 {
    let m = (a + b) / 2.0;
    let fm = f(m);
    let whole = (b - a) / 6.0 * (fa + 4.0 * fm + fb);

    let lm = (a + m) / 2.0;
    let flm = f(lm);
    let left = (m - a) / 6.0 * (fa + 4.0 * flm + fm);

    let rm = (m + b) / 2.0;
    let frm = f(rm);
    let right = (b - m) / 6.0 * (fm + 4.0 * frm + fb);

    if (left + right - whole).abs() <= 15.0 * eps || (b - a).abs() < 1e-12 {
        return left + right + (left + right - whole) / 15.0;
    }

    spawn!(
        scope,
        left_half,
        move |s: &Scope<'_>| integrate(s, f, a, fa, m, fm, eps / 2.0)
    );
    let right_half = integrate(scope, f, m, fm, b, fb, eps / 2.0);
    sync!(scope, left_half) + right_half
}

/// Monte-Carlo estimate of the fraction of points inside the unit circle,
/// splitting the sample range in two until a serial chunk threshold.
fn pi_mc(scope: &Scope<'_>, seed: u64, samples: u64) -> u64 {
    const CHUNK: u64 = 25_000;
    if samples <= CHUNK {
        let mut rng = seed.wrapping_mul(2_685_821_657_736_338_717).wrapping_add(1);
        let mut hits = 0u64;
        for _ in 0..samples {
            rng ^= rng << 13;
            rng ^= rng >> 7;
            rng ^= rng << 17;
            let x = (rng & 0xFFFF) as f64 / 65535.0;
            rng ^= rng << 13;
            rng ^= rng >> 7;
            rng ^= rng << 17;
            let y = (rng & 0xFFFF) as f64 / 65535.0;
            if x * x + y * y <= 1.0 {
                hits += 1;
            }
        }
        return hits;
    }

    let half = samples / 2;
    spawn!(scope, left, move |s: &Scope<'_>| pi_mc(
        s,
        seed ^ 0x9E3779B97F4A7C15,
        half
    ));
    let right = pi_mc(scope, seed.wrapping_add(1), samples - half);
    sync!(scope, left) + right
}

#[test]
fn e1_single_worker_small_fib() {
    let scheduler = Scheduler::start_with(1, 1024).unwrap();
    let result = scheduler.run(|scope| fib(scope, 10));
    assert_eq!(result, 55);
    scheduler.stop();
}

#[test]
fn e2_four_workers_larger_fib() {
    let scheduler = Scheduler::start_with(4, 100_000).unwrap();
    let result = scheduler.run(|scope| fib(scope, 30));
    assert_eq!(result, 832_040);
    scheduler.stop();
}

#[test]
fn e3_nqueens_eight_by_eight() {
    let scheduler = Scheduler::start_with(8, 100_000).unwrap();
    let result = scheduler.run(|scope| nqueens(scope, 8, &[]));
    assert_eq!(result, 92);
    scheduler.stop();
}

#[test]
fn e4_adaptive_integration_matches_closed_form() {
    let scheduler = Scheduler::start_with(4, 100_000).unwrap();
    let f = |x: f64| (x * x + 1.0) * x;
    let result = scheduler.run(move |scope| integrate(scope, f, 0.0, f(0.0), 10.0, f(10.0), 1e-9));
    let expected = 10f64.powi(4) / 4.0 + 10f64.powi(2) / 2.0;
    assert!((result - expected).abs() < 1e-6, "got {result}, want {expected}");
    scheduler.stop();
}

#[test]
fn e5_monte_carlo_pi_within_tolerance() {
    let scheduler = Scheduler::start_with(2, 100_000).unwrap();
    let hits = scheduler.run(|scope| pi_mc(scope, 0, 1_000_000));
    let estimate = hits as f64 / 1_000_000.0;
    assert!(
        (estimate - std::f64::consts::FRAC_PI_4).abs() < 0.01,
        "got {estimate}"
    );
    scheduler.stop();
}

/// Env var that, when set, tells this test binary it is the *child* process
/// spawned by [`e6_small_deque_either_succeeds_or_aborts_cleanly`] and should
/// actually run the scenario inline rather than spawning yet another child.
const E6_CHILD_ENV: &str = "FORKPOOL_E6_CHILD";

#[test]
fn e6_small_deque_either_succeeds_or_aborts_cleanly() {
    // fib(40) spawns deeply enough that a 16-slot deque may overflow; the
    // spec requires either the correct answer or a clean, named abort —
    // never a hang or corrupted output. A worker OS thread panicking on
    // overflow is caught inside `Frame::run` and turned into
    // `std::process::abort()` (see DESIGN.md), so this can no longer be
    // observed with `catch_unwind` on the test's own thread: the scenario
    // genuinely runs on a *worker* thread, and a process abort cannot be
    // caught by anything, by design. So this test drives the scenario in a
    // child process and asserts on its exit status instead.
    if std::env::var_os(E6_CHILD_ENV).is_some() {
        // Opt-in, matching the teacher's own `tracing_subscriber::fmt()`
        // pattern: only the child process that might actually abort bothers
        // installing a subscriber, so the `error!` logged just before
        // `std::process::abort()` in `Frame::run` lands on stderr, which the
        // parent captures above for the assertion failure message.
        let _ = tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(true)
            .try_init();

        let scheduler = Scheduler::start_with(4, 16).unwrap();
        let result = scheduler.run(|scope| fib(scope, 40));
        assert_eq!(result, 102_334_155);
        scheduler.stop();
        return;
    }

    let exe = std::env::current_exe().expect("test binary path");
    let output = std::process::Command::new(exe)
        .arg("--exact")
        .arg("e6_small_deque_either_succeeds_or_aborts_cleanly")
        .arg("--nocapture")
        .env(E6_CHILD_ENV, "1")
        .output()
        .expect("failed to spawn child test process");

    if output.status.success() {
        // The scheduler ran fib(40) to completion without the deque
        // overflowing; the child's own `assert_eq!` already validated the
        // result, so there is nothing further to check here.
        return;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(
            output.status.signal(),
            Some(6 /* SIGABRT, raised by std::process::abort() */),
            "expected a clean SIGABRT from std::process::abort() on deque overflow, \
             got status {:?}\nstderr:\n{}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    #[cfg(not(unix))]
    {
        assert!(
            !output.status.success(),
            "expected the child process to abort on deque overflow, got status {:?}",
            output.status
        );
    }
}

#[test]
fn equivalence_to_sequential_across_worker_counts() {
    for workers in [1, 2, 4, 8] {
        let scheduler = Scheduler::start_with(workers, 100_000).unwrap();
        let result = scheduler.run(|scope| fib(scope, 20));
        assert_eq!(result, 6765, "diverged at {workers} workers");
        scheduler.stop();
    }
}

#[test]
fn stop_joins_every_worker_thread() {
    let scheduler = Scheduler::start_with(4, 1024).unwrap();
    let _ = scheduler.run(|scope| fib(scope, 5));
    scheduler.stop();
    // A second `run` after `stop` would hang forever since no worker
    // thread remains to poll the root mailbox — we only assert `stop`
    // itself returns promptly, which it does once every thread observes
    // the stopping flag and exits its loop.
}
