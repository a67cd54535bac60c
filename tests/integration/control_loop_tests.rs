//! Integration tests for the ControlLoop → monitor → actuators → journal
//! pipeline.
//!
//! Every run uses a virtual clock, so minutes of kiln time pass instantly
//! and timestamps are exact.

use std::time::{Duration, Instant};

use kiln::adapters::time::SimulatedClock;
use kiln::app::commands::KilnCommand;
use kiln::app::events::{KilnEvent, Outcome, ReportId, Warning};
use kiln::config::{KilnConfig, Strictness};
use kiln::error::{AcquisitionError, ActuatorFault, PersistenceError};
use kiln::fsm::ProcessPhase;
use kiln::scheduler::ActuatorId;
use kiln::sensors::simulated::SimulatedAcquisition;

use crate::mock_ports::{
    FlakyJournal, RecordingActuators, RecordingSink, START_MS, ScriptedAcquisition,
    ScriptedCommands, make_loop, make_loop_on, make_loop_with, mask_with, reading,
};

const MINUTE_MS: u64 = 60_000;

/// Probe 1 only, target 56 °C held for `count` samples.
fn single_probe(count: u32) -> KilnConfig {
    KilnConfig {
        target_temp_c: 56.0,
        target_success_count: count,
        channel_enabled: mask_with(&[1]),
        ..KilnConfig::default()
    }
}

// ── Completion ────────────────────────────────────────────────

#[test]
fn hot_probe_completes_on_third_tick() {
    let acq = ScriptedAcquisition::constant(reading(&[(1, 60.0)], 70.0));
    let (mut control, clock) = make_loop(single_probe(3), acq);
    let mut sink = RecordingSink::new();

    let outcome = control.run(&mut ScriptedCommands::none(&clock), &mut sink);

    assert_eq!(outcome, Outcome::Completed(ReportId(1)));
    assert_eq!(sink.counters(), vec![1, 2, 3]);
    assert_eq!(
        sink.samples().iter().map(|s| s.successes_remaining).collect::<Vec<_>>(),
        vec![2, 1, 0]
    );
    assert_eq!(
        sink.timestamps(),
        vec![START_MS, START_MS + MINUTE_MS, START_MS + 2 * MINUTE_MS]
    );
    assert_eq!(control.phase(), ProcessPhase::Completed);

    let journal = control.persistence();
    assert_eq!(journal.steps(ReportId(1)).len(), 3);
    assert!(journal.inner.is_finalized(ReportId(1)));

    assert!(!control.actuators().is_energized(ActuatorId::Fan));
    assert!(!control.actuators().is_energized(ActuatorId::Heater));
    assert!(control.acquisition().cooled_down);

    let (finished, summary) = sink.finished().expect("Finished is the last event");
    assert_eq!(finished, outcome);
    assert_eq!(summary.samples, 3);
    assert_eq!(summary.end_timestamp_ms, START_MS + 2 * MINUTE_MS);
    assert_eq!(summary.metrics.successes, 3);
}

#[test]
fn lifecycle_events_bracket_the_run() {
    let acq = ScriptedAcquisition::constant(reading(&[(1, 60.0)], 70.0));
    let (mut control, clock) = make_loop(single_probe(1), acq);
    let mut sink = RecordingSink::new();
    control.run(&mut ScriptedCommands::none(&clock), &mut sink);

    assert!(matches!(
        sink.events.first(),
        Some(KilnEvent::Started { report: ReportId(1), start_timestamp_ms: START_MS })
    ));
    assert_eq!(
        sink.phases(),
        vec![
            (ProcessPhase::Idle, ProcessPhase::Running),
            (ProcessPhase::Running, ProcessPhase::Completed),
        ]
    );
}

#[test]
fn cold_sample_resets_the_streak() {
    let hot = Ok(reading(&[(1, 60.0)], 70.0));
    let cold = Ok(reading(&[(1, 50.0)], 70.0));
    let acq = ScriptedAcquisition::new(vec![hot, hot, cold, hot, hot, hot]);
    let (mut control, clock) = make_loop(single_probe(3), acq);
    let mut sink = RecordingSink::new();

    let outcome = control.run(&mut ScriptedCommands::none(&clock), &mut sink);

    assert_eq!(outcome, Outcome::Completed(ReportId(1)));
    assert_eq!(sink.counters(), vec![1, 2, 0, 1, 2, 3]);
    assert_eq!(control.metrics().counter_resets, 1);
}

// ── Cancellation ──────────────────────────────────────────────

#[test]
fn cancel_mid_run_completes_in_flight_tick_and_drives_safe() {
    let acq = ScriptedAcquisition::constant(reading(&[(1, 40.0)], 70.0));
    let (mut control, clock) = make_loop(single_probe(35), acq);
    let mut cmds = ScriptedCommands::new(&clock, &[(150, KilnCommand::Cancel)]);
    let mut sink = RecordingSink::new();

    let outcome = control.run(&mut cmds, &mut sink);

    assert_eq!(outcome, Outcome::Cancelled);
    // Ticks at 0, 60 and 120 s; the cancel is seen at the top of the 180 s tick.
    assert_eq!(sink.samples().len(), 3);
    assert_eq!(control.phase(), ProcessPhase::Cancelled);
    assert_eq!(
        sink.phases().last(),
        Some(&(ProcessPhase::Running, ProcessPhase::Cancelled))
    );

    let hw = control.actuators();
    assert!(!hw.is_energized(ActuatorId::Fan));
    assert!(!hw.is_energized(ActuatorId::Heater));
    assert_eq!(hw.calls_for(ActuatorId::Fan).last(), Some(&false));
    assert_eq!(hw.calls_for(ActuatorId::Heater).last(), Some(&false));

    assert!(!control.persistence().inner.is_finalized(ReportId(1)));
    assert!(matches!(sink.events.last(), Some(KilnEvent::Finished { outcome: Outcome::Cancelled, .. })));
}

#[test]
fn cancel_while_paused_exits() {
    let acq = ScriptedAcquisition::constant(reading(&[(1, 40.0)], 70.0));
    let (mut control, clock) = make_loop(single_probe(35), acq);
    let mut cmds = ScriptedCommands::new(
        &clock,
        &[(60, KilnCommand::Pause), (600, KilnCommand::Cancel)],
    );
    let mut sink = RecordingSink::new();

    assert_eq!(control.run(&mut cmds, &mut sink), Outcome::Cancelled);
    assert_eq!(sink.samples().len(), 1);
    assert_eq!(
        sink.phases().last(),
        Some(&(ProcessPhase::Paused, ProcessPhase::Cancelled))
    );
}

// ── Pause / resume ────────────────────────────────────────────

#[test]
fn pause_shifts_later_timestamps_by_paused_duration() {
    let acq = || ScriptedAcquisition::constant(reading(&[(1, 40.0)], 70.0));

    let (mut plain, clock) = make_loop(single_probe(35), acq());
    let mut plain_sink = RecordingSink::new();
    plain.run(
        &mut ScriptedCommands::new(&clock, &[(330, KilnCommand::Cancel)]),
        &mut plain_sink,
    );

    let (mut paused, clock) = make_loop(single_probe(35), acq());
    let mut paused_sink = RecordingSink::new();
    paused.run(
        &mut ScriptedCommands::new(
            &clock,
            &[
                (120, KilnCommand::Pause),
                (165, KilnCommand::Resume),
                (400, KilnCommand::Cancel),
            ],
        ),
        &mut paused_sink,
    );

    let plain_ts = plain_sink.timestamps();
    let paused_ts = paused_sink.timestamps();
    assert_eq!(plain_ts.len(), 6);
    assert_eq!(paused_ts.len(), 6);
    let shifts: Vec<u64> = paused_ts.iter().zip(&plain_ts).map(|(p, q)| p - q).collect();
    assert_eq!(shifts, vec![0, 0, 45_000, 45_000, 45_000, 45_000]);

    assert!(paused_ts.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(paused.metrics().paused_ms, 45_000);
    assert!(paused_sink.phases().contains(&(ProcessPhase::Running, ProcessPhase::Paused)));
    assert!(paused_sink.phases().contains(&(ProcessPhase::Paused, ProcessPhase::Running)));
}

#[test]
fn accelerated_pause_shifts_by_the_wall_time_waited() {
    let clock = SimulatedClock::new(START_MS).with_real_pauses();
    let mut control = make_loop_on(
        single_probe(35),
        ScriptedAcquisition::constant(reading(&[(1, 40.0)], 70.0)),
        RecordingActuators::new(),
        FlakyJournal::new(),
        &clock,
    );
    let mut sink = RecordingSink::new();

    // Two 500 ms pause polls separate the pause from the resume.
    let started = Instant::now();
    control.run(
        &mut ScriptedCommands::new(
            &clock,
            &[
                (60, KilnCommand::Pause),
                (61, KilnCommand::Resume),
                (150, KilnCommand::Cancel),
            ],
        ),
        &mut sink,
    );

    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(
        sink.timestamps(),
        vec![START_MS, START_MS + MINUTE_MS + 1_000, START_MS + 2 * MINUTE_MS + 1_000]
    );
    assert_eq!(control.metrics().paused_ms, 1_000);
}

#[test]
fn resume_without_pause_is_ignored() {
    let acq = ScriptedAcquisition::constant(reading(&[(1, 60.0)], 70.0));
    let (mut control, clock) = make_loop(single_probe(2), acq);
    let mut cmds = ScriptedCommands::new(&clock, &[(0, KilnCommand::Resume)]);
    let mut sink = RecordingSink::new();

    assert_eq!(control.run(&mut cmds, &mut sink), Outcome::Completed(ReportId(1)));
    assert_eq!(sink.timestamps(), vec![START_MS, START_MS + MINUTE_MS]);
}

// ── Determinism ───────────────────────────────────────────────

fn simulated_samples(seed: u64) -> Vec<kiln::app::events::SampleRecord> {
    let (mut control, clock) = make_loop(KilnConfig::default(), SimulatedAcquisition::seeded(20.0, seed));
    let mut cmds = ScriptedCommands::new(&clock, &[(3_600, KilnCommand::Cancel)]);
    let mut sink = RecordingSink::new();
    control.run(&mut cmds, &mut sink);
    sink.samples()
}

#[test]
fn seeded_runs_are_identical() {
    let a = simulated_samples(42);
    let b = simulated_samples(42);
    assert_eq!(a.len(), 60);
    assert_eq!(a, b);
}

#[test]
fn different_seeds_diverge() {
    assert_ne!(simulated_samples(1), simulated_samples(2));
}

// ── Acquisition faults ────────────────────────────────────────

#[test]
fn failed_cycle_is_carried_forward() {
    let acq = ScriptedAcquisition::new(vec![
        Ok(reading(&[(1, 60.0)], 70.0)),
        Err(AcquisitionError::ReadFailed),
        Ok(reading(&[(1, 61.0)], 70.5)),
    ]);
    let (mut control, clock) = make_loop(single_probe(35), acq);
    let mut cmds = ScriptedCommands::new(&clock, &[(150, KilnCommand::Cancel)]);
    let mut sink = RecordingSink::new();

    control.run(&mut cmds, &mut sink);

    let samples = sink.samples();
    assert_eq!(samples.len(), 3);
    assert!((samples[1].probes[0] - 60.01).abs() < 1e-3);
    assert!((samples[1].ambient[0] - 70.01).abs() < 1e-3);
    assert_eq!(samples[1].probes[1], 0.0, "disabled probe stays unset");
    assert_eq!(sink.counters(), vec![1, 2, 3]);
    assert_eq!(
        sink.warnings(),
        vec![Warning::AcquisitionFailed(AcquisitionError::ReadFailed)]
    );
    assert_eq!(control.metrics().acquisition_errors, 1);
    assert_eq!(control.metrics().carried_channels, 3);
}

#[test]
fn failed_first_cycle_breaks_streak_without_failing() {
    let acq = ScriptedAcquisition::new(vec![
        Err(AcquisitionError::Timeout),
        Ok(reading(&[(1, 60.0)], 70.0)),
    ]);
    let (mut control, clock) = make_loop(single_probe(2), acq);
    let mut sink = RecordingSink::new();

    let outcome = control.run(&mut ScriptedCommands::none(&clock), &mut sink);

    assert_eq!(outcome, Outcome::Completed(ReportId(1)));
    assert_eq!(sink.counters(), vec![0, 1, 2]);
}

#[test]
fn empty_active_set_fails_the_run() {
    let acq = ScriptedAcquisition::constant(reading(&[], 70.0));
    let (mut control, clock) = make_loop(single_probe(3), acq);
    let mut sink = RecordingSink::new();

    let outcome = control.run(&mut ScriptedCommands::none(&clock), &mut sink);

    assert_eq!(outcome, Outcome::Failed("active probe set is empty"));
    assert_eq!(control.phase(), ProcessPhase::Failed);
    assert_eq!(sink.samples().len(), 1);
    assert!(!control.actuators().is_energized(ActuatorId::Fan));
    assert!(!control.actuators().is_energized(ActuatorId::Heater));
    assert!(!control.persistence().inner.is_finalized(ReportId(1)));
}

// ── Actuators ─────────────────────────────────────────────────

#[test]
fn failed_actuator_write_is_retried_next_tick() {
    let acq = ScriptedAcquisition::constant(reading(&[(1, 40.0)], 70.0));
    let (mut control, clock) = make_loop_with(
        single_probe(35),
        acq,
        RecordingActuators::failing(ActuatorId::Heater, 1),
        FlakyJournal::new(),
    );
    let mut cmds = ScriptedCommands::none(&clock);
    let mut sink = RecordingSink::new();

    control.begin(&mut sink);
    assert_eq!(
        sink.warnings(),
        vec![Warning::ActuatorFault {
            actuator: ActuatorId::Heater,
            fault: ActuatorFault::GpioWriteFailed,
        }]
    );
    assert_eq!(control.pending_actuator_faults(), ActuatorId::Heater.mask());

    assert_eq!(control.tick(&mut cmds, &mut sink), None);
    assert_eq!(control.pending_actuator_faults(), 0);
    assert!(control.actuators().is_energized(ActuatorId::Heater));
    assert_eq!(control.actuators().calls_for(ActuatorId::Heater), vec![true, true]);
}

#[test]
fn relays_follow_their_duty_cycles() {
    let config = KilnConfig {
        fan_work_minutes: 2,
        fan_rest_minutes: 1,
        ..single_probe(35)
    };
    let acq = ScriptedAcquisition::constant(reading(&[(1, 40.0)], 70.0));
    let (mut control, clock) = make_loop(config, acq);
    let mut cmds = ScriptedCommands::new(&clock, &[(330, KilnCommand::Cancel)]);
    let mut sink = RecordingSink::new();

    control.run(&mut cmds, &mut sink);

    assert_eq!(sink.samples().len(), 6);
    assert_eq!(
        sink.toggles(ActuatorId::Fan),
        vec![(false, 120), (true, 180), (false, 300)]
    );
    assert_eq!(
        sink.toggles(ActuatorId::Heater),
        vec![(false, 60), (true, 120), (false, 180), (true, 240), (false, 300)]
    );
    // Start, three toggles, then the safe shutdown.
    assert_eq!(
        control.actuators().calls_for(ActuatorId::Fan),
        vec![true, false, true, false, false]
    );
    assert_eq!(control.metrics().relay_toggles, 8);
}

#[test]
fn thermostat_vetoes_heating_without_toggling_the_relay() {
    let config = KilnConfig {
        heater_work_minutes: 10,
        heater_rest_minutes: 10,
        fan_work_minutes: 10,
        fan_rest_minutes: 10,
        ..single_probe(35)
    };
    let acq = ScriptedAcquisition::new(vec![
        Ok(reading(&[(1, 40.0)], 95.0)),
        Ok(reading(&[(1, 41.0)], 78.0)),
        Ok(reading(&[(1, 42.0)], 85.0)),
    ]);
    let (mut control, clock) = make_loop(config, acq);
    let mut cmds = ScriptedCommands::new(&clock, &[(150, KilnCommand::Cancel)]);
    let mut sink = RecordingSink::new();

    control.run(&mut cmds, &mut sink);

    assert_eq!(control.acquisition().heating, vec![false, true, true]);
    assert_eq!(
        control.actuators().calls_for(ActuatorId::Heater),
        vec![true, false, true, false]
    );
    assert!(sink.toggles(ActuatorId::Heater).is_empty());
}

// ── Persistence ───────────────────────────────────────────────

#[test]
fn single_persistence_failure_is_retried_silently() {
    let acq = ScriptedAcquisition::constant(reading(&[(1, 60.0)], 70.0));
    let journal = FlakyJournal {
        fail_appends: 1,
        ..FlakyJournal::new()
    };
    let (mut control, clock) = make_loop_with(single_probe(3), acq, RecordingActuators::new(), journal);
    let mut sink = RecordingSink::new();

    control.run(&mut ScriptedCommands::none(&clock), &mut sink);

    assert!(sink.warnings().is_empty());
    assert_eq!(control.persistence().steps(ReportId(1)).len(), 3);
    assert_eq!(control.persistence().attempts, 4);
}

#[test]
fn persistent_failure_becomes_a_warning() {
    let acq = ScriptedAcquisition::constant(reading(&[(1, 60.0)], 70.0));
    let journal = FlakyJournal {
        fail_appends: 2,
        fail_finalize: 2,
        ..FlakyJournal::new()
    };
    let (mut control, clock) = make_loop_with(single_probe(3), acq, RecordingActuators::new(), journal);
    let mut sink = RecordingSink::new();

    let outcome = control.run(&mut ScriptedCommands::none(&clock), &mut sink);

    assert_eq!(outcome, Outcome::Completed(ReportId(1)));
    assert_eq!(
        sink.warnings(),
        vec![
            Warning::StepNotPersisted {
                sequence: 1,
                error: PersistenceError::IoError,
            },
            Warning::ReportNotFinalized(PersistenceError::IoError),
        ]
    );
    let steps = control.persistence().steps(ReportId(1));
    assert_eq!(steps.iter().map(|s| s.sequence).collect::<Vec<_>>(), vec![2, 3]);
    assert_eq!(control.metrics().persistence_warnings, 2);
}

// ── Strict mode ───────────────────────────────────────────────

/// Probes 1 and 2 plus both ambient sensors, strict criteria.
fn strict_pair(count: u32) -> KilnConfig {
    KilnConfig {
        strictness: Strictness::Strict,
        max_inter_batch_delta_c: 1.0,
        channel_enabled: mask_with(&[1, 2]),
        ..single_probe(count)
    }
}

#[test]
fn strict_run_completes_and_ignores_disabled_probes() {
    // Probe 3 reads above the air but is disabled.
    let acq = ScriptedAcquisition::constant(reading(&[(1, 57.0), (2, 58.0), (3, 95.0)], 70.0));
    let (mut control, clock) = make_loop(strict_pair(3), acq);
    let mut sink = RecordingSink::new();

    let outcome = control.run(&mut ScriptedCommands::none(&clock), &mut sink);

    assert_eq!(outcome, Outcome::Completed(ReportId(1)));
    assert_eq!(sink.counters(), vec![1, 2, 3]);
    assert!(sink.samples().iter().all(|s| s.probes[2] == 0.0));
}

#[test]
fn strict_delta_glitch_resets_the_streak() {
    let acq = ScriptedAcquisition::new(vec![
        Ok(reading(&[(1, 57.0), (2, 58.0)], 70.0)),
        Ok(reading(&[(1, 57.2), (2, 58.1)], 70.0)),
        Ok(reading(&[(1, 59.5), (2, 58.2)], 70.0)),
        Ok(reading(&[(1, 59.6), (2, 58.3)], 70.0)),
    ]);
    let (mut control, clock) = make_loop(strict_pair(3), acq);
    let mut sink = RecordingSink::new();

    let outcome = control.run(&mut ScriptedCommands::none(&clock), &mut sink);

    assert_eq!(outcome, Outcome::Completed(ReportId(1)));
    assert_eq!(sink.counters(), vec![1, 2, 0, 1, 2, 3]);
    assert_eq!(control.metrics().counter_resets, 1);
}

#[test]
fn strict_gaps_are_carried_without_breaking_the_streak() {
    let acq = ScriptedAcquisition::new(vec![
        Ok(reading(&[(1, 57.0), (2, 58.0)], 70.0)),
        // Probe 2 drops out, then the whole cycle fails.
        Ok(reading(&[(1, 57.1)], 70.1)),
        Err(AcquisitionError::Timeout),
        Ok(reading(&[(1, 57.3), (2, 58.2)], 70.2)),
    ]);
    let (mut control, clock) = make_loop(strict_pair(4), acq);
    let mut sink = RecordingSink::new();

    let outcome = control.run(&mut ScriptedCommands::none(&clock), &mut sink);

    assert_eq!(outcome, Outcome::Completed(ReportId(1)));
    assert_eq!(sink.counters(), vec![1, 2, 3, 4]);
    let samples = sink.samples();
    assert!((samples[1].probes[1] - 58.01).abs() < 1e-3);
    assert!((samples[2].probes[1] - 58.02).abs() < 1e-3);
    assert_eq!(control.metrics().carried_channels, 5);
}

#[test]
fn strict_probe_leading_the_air_resets_the_streak() {
    let acq = ScriptedAcquisition::new(vec![
        Ok(reading(&[(1, 60.0), (2, 69.0)], 70.0)),
        // Probe 2 at or above the coolest ambient sensor.
        Ok(reading(&[(1, 60.1), (2, 69.5)], 69.4)),
        Ok(reading(&[(1, 60.2), (2, 69.6)], 70.5)),
    ]);
    let (mut control, clock) = make_loop(strict_pair(3), acq);
    let mut sink = RecordingSink::new();

    let outcome = control.run(&mut ScriptedCommands::none(&clock), &mut sink);

    assert_eq!(outcome, Outcome::Completed(ReportId(1)));
    assert_eq!(sink.counters(), vec![1, 0, 1, 2, 3]);
}
