//! Tunable limits and defaults shared across the calibration kernel.
//!
//! Mirrors spec.md's scattered "default N / cap M" values in one place so
//! the rest of the crate reads them by name instead of repeating magic
//! numbers.

/// Default grid resolution (N x N candidate probe points).
pub const DEFAULT_GRID_N: usize = 5;

/// Largest grid resolution the design permits.
pub const MAX_GRID_N: usize = 7;

/// Trim below this value (mm) on any axis is fatal (§7 GEOMETRY_OUT_OF_RANGE).
pub const TRIM_FATAL_LIMIT_MM: f64 = -5.0;

/// Depth-map file values outside ±this bound (mm) are rejected on load.
pub const DEPTH_MAP_BOUND_MM: f64 = 5.0;

/// Minimum averaged probe reading (in steps) below which a probe is
/// considered mis-triggered.
pub const PROBE_MIN_STEPS: i64 = 100;

/// Iterative calibrator: endstop/delta-radius tolerance (30 um).
pub const ITERATIVE_TOLERANCE_MM: f64 = 0.030;

/// Iterative calibrator: maximum convergence iterations.
pub const ITERATIVE_MAX_ITERATIONS: usize = 20;

/// Iterative calibrator: initial trim-scale multiplier.
pub const ITERATIVE_TRIMSCALE_INITIAL: f64 = 1.3;

/// Iterative calibrator: trim-scale decay applied when deviation stalls.
pub const ITERATIVE_TRIMSCALE_DECAY: f64 = 0.9;

/// Iterative calibrator: trim-scale decay floor -- below this the decay no
/// longer applies.
pub const ITERATIVE_TRIMSCALE_FLOOR: f64 = 0.9;

/// Iterative calibrator: delta-radius correction gain.
pub const ITERATIVE_DELTA_RADIUS_GAIN: f64 = 2.0;

/// Simulated annealer: global energy target (mm).
pub const ANNEAL_GLOBAL_TARGET_MM: f64 = 0.010;

/// Simulated annealer: per-variable binary-search target (mm).
pub const ANNEAL_VARIABLE_TARGET_MM: f64 = 0.005;

/// Simulated annealer: maximum binary-search halving rounds per variable.
pub const ANNEAL_MAX_BINSEARCH_ROUNDS: usize = 250;

/// Simulated annealer: number of recent energies kept for the stall window.
pub const ANNEAL_STALL_WINDOW: usize = 6;

/// Simulated annealer: stride (in tries) at which energy is sampled for the
/// stall window and the cooperative-yield hook is invoked.
pub const ANNEAL_SAMPLE_STRIDE: usize = 5;

/// Simulated annealer: standard deviation below which the stall window
/// declares a stall.
pub const ANNEAL_STALL_SIGMA: f64 = 0.01;

/// Lower bound for `annealing_tries`.
pub const ANNEAL_TRIES_MIN: usize = 10;
/// Upper bound for `annealing_tries`.
pub const ANNEAL_TRIES_MAX: usize = 1000;
/// Upper bound for `max_temp`.
pub const ANNEAL_MAX_TEMP_MAX: f64 = 2.0;
/// Upper bound for `binsearch_width`.
pub const ANNEAL_BINSEARCH_WIDTH_MAX: f64 = 0.5;
/// Lower bound for `overrun_divisor`.
pub const ANNEAL_OVERRUN_DIVISOR_MIN: f64 = 0.5;
/// Upper bound for `overrun_divisor`.
pub const ANNEAL_OVERRUN_DIVISOR_MAX: f64 = 15.0;
/// Upper bound for a caltype's annealing-temperature multiplier.
pub const ANNEAL_TEMP_MUL_MAX: f64 = 50.0;
/// Floor applied to the cooling-schedule temperature.
pub const ANNEAL_TEMP_FLOOR: f64 = 0.01;

/// Initial per-variable binary-search half-width, applied uniformly around
/// a variable's current value at the start of a run and after each
/// recentering pass.
pub const ANNEAL_INITIAL_HALF_WIDTH_MM: f64 = 1.0;

/// Probe repeatability tool: default sample count.
pub const REPEATABILITY_DEFAULT_SAMPLES: usize = 10;
/// Probe repeatability tool: maximum sample count.
pub const REPEATABILITY_MAX_SAMPLES: usize = 30;

/// Lower bound for probe smoothing (number of averaged taps).
pub const PROBE_SMOOTHING_MIN: u32 = 1;
/// Upper bound for probe smoothing (number of averaged taps).
pub const PROBE_SMOOTHING_MAX: u32 = 10;
/// Upper bound for probe priming (discarded taps).
pub const PROBE_PRIMING_MAX: u32 = 20;
