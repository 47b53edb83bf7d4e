use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use sim::{FixedStepClock, LoopConfig, RunOutcome, Simulation};
use tracing::{debug, info, warn};

use super::autopilot::Autopilot;
use super::bootstrap::{AppWiring, RunSettings};
use super::metrics::PaceMeter;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let AppWiring {
        loop_config,
        settings,
        mut simulation,
    } = app;
    drive(&loop_config, &settings, &mut simulation);

    log_summary(&simulation);
    if let Some(path) = &settings.save_path {
        save_progression(&simulation, path);
    }
    exit_code(simulation.outcome(), &settings)
}

/// Feeds fixed-length frames through the step clock until the run ends or the
/// time limit is reached.
fn drive(loop_config: &LoopConfig, settings: &RunSettings, simulation: &mut Simulation) {
    let mut clock = FixedStepClock::new(loop_config);
    let mut pace = PaceMeter::new(loop_config.metrics_log_interval);
    let mut autopilot = Autopilot::default();
    let mut driver_time = Duration::ZERO;

    info!(
        seed = settings.seed,
        run_seconds = settings.run_duration.as_secs_f32(),
        "run_started"
    );
    while simulation.outcome() == RunOutcome::InProgress && driver_time < settings.run_duration {
        driver_time = driver_time.saturating_add(settings.frame_dt);
        let plan = clock.advance(settings.frame_dt);
        pace.frame(plan.dropped_backlog);
        for _ in 0..plan.ticks_to_run {
            take_offered_perk(simulation);
            let intent = autopilot.next_intent(simulation);
            simulation.tick(&intent);
            pace.tick(simulation.last_tick_events().len());
            if simulation.outcome() != RunOutcome::InProgress {
                break;
            }
        }

        let view = simulation.render_view();
        debug!(
            renderables = view.renderables.len(),
            telegraphs = view.telegraphs.len(),
            alpha = plan.alpha,
            "frame_presented"
        );
        if let Some(report) = pace.report(driver_time) {
            info!(
                fps = report.frames_per_second,
                tps = report.ticks_per_second,
                events_per_tick = report.events_per_tick,
                dropped_backlog_ms = report.dropped_backlog_ms,
                "loop_metrics"
            );
        }
    }
}

/// Level-ups pause on a perk offer; the headless driver always takes the
/// first card.
fn take_offered_perk(simulation: &mut Simulation) {
    if simulation.perk_offer().is_empty() {
        return;
    }
    if let Some(perk_id) = simulation.choose_perk(0) {
        info!(perk_id, "perk_auto_selected");
    }
}

fn log_summary(simulation: &Simulation) {
    let stats = simulation.stats();
    info!(
        outcome = ?simulation.outcome(),
        time = %stats.format_time(),
        ticks = simulation.tick_count(),
        kills = stats.kills,
        damage_dealt = stats.total_damage,
        damage_taken = stats.damage_taken,
        levels_gained = stats.levels_gained,
        "run_summary"
    );
}

fn save_progression(simulation: &Simulation, path: &Path) {
    let result = simulation
        .capture_progression()
        .and_then(|snapshot| snapshot.save_to_path(path));
    match result {
        Ok(()) => info!(path = %path.display(), "progress_saved"),
        Err(error) => warn!(path = %path.display(), error = %error, "save_failed"),
    }
}

fn exit_code(outcome: RunOutcome, settings: &RunSettings) -> ExitCode {
    match outcome {
        RunOutcome::Defeat => ExitCode::from(2),
        RunOutcome::Victory => ExitCode::SUCCESS,
        RunOutcome::InProgress => {
            info!(
                run_seconds = settings.run_duration.as_secs_f32(),
                "run_time_limit_reached"
            );
            ExitCode::SUCCESS
        }
    }
}
