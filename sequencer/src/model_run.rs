//! Model-building run orchestration
//!
//! Drives the external Point Mapper through an unattended mapping run:
//! compute the measurement envelope, make sure the tool is running, wait for
//! its control API, push the configuration, start the run and poll status
//! until it reaches a terminal state. Guiding is paused and the plate-solve
//! filter swapped in around the run; both are restored on every exit path.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use aptools_appm::{
    AppmClient, AppmError, AppmProcess, LaunchOptions, MappingRunState, MeasurementConfig,
    ToolVersion,
};

use crate::astro;
use crate::geometry::{self, DecArcParameters};
use crate::instructions::{
    InstructionContext, InstructionResult, InstructionStatus, ModelProgress,
};
use crate::options::ModelToolOptions;
use crate::MAX_MODEL_DEC;

/// Configuration of the dec-arc model instruction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecArcModelConfig {
    /// Tool options snapshot for this run
    pub tool: ModelToolOptions,
    /// Model the full eastern arc instead of leading the target
    pub full_arc: bool,
    /// Operator starts the run in the tool; no API driving
    pub manual_start: bool,
    /// Leave the tool open after the run
    pub dont_exit: bool,
}

/// Configuration of the all-sky model instruction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllSkyModelConfig {
    pub tool: ModelToolOptions,
    pub manual_start: bool,
    pub dont_exit: bool,
}

/// Pre-run checks for the dec-arc instruction, as host-displayable issues
pub async fn validate_dec_arc_model(
    options: &ModelToolOptions,
    ctx: &InstructionContext,
) -> Vec<String> {
    let mut issues = validate_model_run(options, ctx).await;

    if ctx.target_ra.is_none() || ctx.target_dec.is_none() {
        issues.insert(0, "No target has been defined".to_string());
    }
    if options.dec_arc_quantity < 1 {
        issues.push("Dec arc quantity must be at least 1".to_string());
    }
    if options.dec_arc_dec_spacing < 1 {
        issues.push("Dec arc spacing must be at least 1°".to_string());
    }

    issues
}

/// Pre-run checks for the all-sky instruction
pub async fn validate_all_sky_model(
    options: &ModelToolOptions,
    ctx: &InstructionContext,
) -> Vec<String> {
    validate_model_run(options, ctx).await
}

async fn validate_model_run(options: &ModelToolOptions, ctx: &InstructionContext) -> Vec<String> {
    let mut issues = Vec::new();

    if options.exe_path.as_os_str().is_empty() || !options.exe_path.is_file() {
        issues.push("Invalid location for ApPointMapper.exe".to_string());
    }
    if let Some(settings) = &options.settings_path {
        if !settings.is_file() {
            issues.push("Invalid location for the APPM settings file".to_string());
        }
    }

    match ctx.device_ops.camera_is_connected().await {
        Ok(true) => {}
        Ok(false) => issues.push("Camera is not connected".to_string()),
        Err(e) => issues.push(format!("Could not query the camera: {}", e)),
    }

    issues
}

/// Build a dec-arc pointing model around the context's target
pub async fn execute_create_dec_arc_model(
    config: &DecArcModelConfig,
    ctx: &InstructionContext,
) -> InstructionResult {
    let issues = validate_dec_arc_model(&config.tool, ctx).await;
    if !issues.is_empty() {
        return InstructionResult::failure(issues.join("; "));
    }

    let (Some(ra), Some(dec)) = (ctx.target_ra, ctx.target_dec) else {
        return InstructionResult::failure("No target has been defined");
    };

    if dec.abs() > MAX_MODEL_DEC {
        let message = format!(
            "Target declination {} is too close to the pole to create a meaningful model. Skipping model creation.",
            astro::dec_dms_string(dec)
        );
        info!("{}", message);
        notify(ctx, "info", "Dec Arc Model", &message).await;
        return InstructionResult::success_with_message(message);
    }

    let longitude = ctx.longitude.unwrap_or_else(|| {
        warn!("No observer longitude in context, assuming 0°");
        0.0
    });
    let lst = astro::local_sidereal_time(astro::julian_day(&chrono::Utc::now()), longitude);
    let arc = geometry::calculate_dec_arc(ra, dec, lst, &config.tool, config.full_arc);

    info!(
        "RA: HourAngleStart={:.2}, HourAngleEnd={:.2}, Hours={:.2}",
        arc.east_ha_limit,
        arc.west_ha_limit,
        arc.west_ha_limit - arc.east_ha_limit
    );
    info!(
        "Dec: T={}, N={}, S={}, Spread={}, Spacing={}, Offset={}",
        arc.target_dec,
        arc.north_dec_limit,
        arc.south_dec_limit,
        arc.north_dec_limit - arc.south_dec_limit,
        arc.dec_spacing,
        arc.dec_offset
    );

    let mut measurement = config.tool.all_sky.clone();
    measurement.declination_spacing = arc.dec_spacing;
    measurement.declination_offset = arc.dec_offset;
    measurement.min_declination = arc.south_dec_limit;
    measurement.max_declination = arc.north_dec_limit;
    measurement.right_ascension_spacing = arc.ra_spacing;
    measurement.min_hour_angle_east = arc.east_ha_limit;
    measurement.max_hour_angle_west = arc.west_ha_limit;
    measurement.point_ordering_strategy = arc.point_ordering_strategy;

    if let Err(e) = measurement.validate() {
        return InstructionResult::failure(e.to_string());
    }

    let session = SessionSpec {
        tool: &config.tool,
        measurement,
        comments: measurement_comments("Dec Arc", ctx, Some(&arc), &config.tool),
        manual_start: config.manual_start,
        dont_exit: config.dont_exit,
        title: "Dec Arc Model",
    };
    run_mapping_session(&session, ctx).await
}

/// Build an all-sky pointing model from the configured measurement defaults
pub async fn execute_create_all_sky_model(
    config: &AllSkyModelConfig,
    ctx: &InstructionContext,
) -> InstructionResult {
    let issues = validate_all_sky_model(&config.tool, ctx).await;
    if !issues.is_empty() {
        return InstructionResult::failure(issues.join("; "));
    }

    let measurement = config.tool.all_sky.clone();
    if let Err(e) = measurement.validate() {
        return InstructionResult::failure(e.to_string());
    }

    let session = SessionSpec {
        tool: &config.tool,
        measurement,
        comments: measurement_comments("All Sky", ctx, None, &config.tool),
        manual_start: config.manual_start,
        dont_exit: config.dont_exit,
        title: "All Sky Model",
    };
    run_mapping_session(&session, ctx).await
}

/// One mapping session, independent of how the payload was derived
struct SessionSpec<'a> {
    tool: &'a ModelToolOptions,
    measurement: MeasurementConfig,
    comments: Vec<String>,
    manual_start: bool,
    dont_exit: bool,
    title: &'static str,
}

/// Run the session with guiding paused and the plate-solve filter in place.
/// Filter and guiding are restored no matter how the run ends.
async fn run_mapping_session(
    session: &SessionSpec<'_>,
    ctx: &InstructionContext,
) -> InstructionResult {
    ctx.publish_progress(ModelProgress::default()).await;

    let mut stopped_guiding = false;
    match guider_active(ctx).await {
        Ok(true) => match ctx.device_ops.guider_stop().await {
            Ok(()) => {
                info!("Guiding stopped for the mapping run");
                stopped_guiding = true;
            }
            Err(e) => warn!("Failed to stop guiding: {}", e),
        },
        Ok(false) => {}
        Err(e) => warn!("Could not query the guider: {}", e),
    }

    let mut previous_filter = None;
    if let Some(solve_filter) = &session.tool.plate_solve_filter {
        if matches!(ctx.device_ops.filterwheel_is_connected().await, Ok(true)) {
            match ctx.device_ops.filterwheel_get_filter().await {
                Ok(current) => {
                    if let Err(e) = ctx.device_ops.filterwheel_set_filter(solve_filter).await {
                        restore_devices(ctx, stopped_guiding, None).await;
                        return InstructionResult::failure(format!(
                            "Failed to change to plate-solve filter {}: {}",
                            solve_filter, e
                        ));
                    }
                    info!("Filter changed from {} to {}", current, solve_filter);
                    previous_filter = Some(current);
                }
                Err(e) => warn!("Could not read the current filter: {}", e),
            }
        }
    }

    let outcome = drive_mapping_tool(session, ctx).await;

    restore_devices(ctx, stopped_guiding, previous_filter).await;
    outcome
}

async fn guider_active(ctx: &InstructionContext) -> Result<bool, String> {
    if !ctx.device_ops.guider_is_connected().await? {
        return Ok(false);
    }
    ctx.device_ops.guider_is_guiding().await
}

/// Teardown half of the device side effects; errors are logged, never raised
async fn restore_devices(
    ctx: &InstructionContext,
    stopped_guiding: bool,
    previous_filter: Option<String>,
) {
    if let Some(filter) = previous_filter {
        match ctx.device_ops.filterwheel_set_filter(&filter).await {
            Ok(()) => info!("Restored filter {}", filter),
            Err(e) => warn!("Failed to restore filter {}: {}", filter, e),
        }
    }

    if stopped_guiding {
        match ctx.device_ops.guider_start().await {
            Ok(()) => info!("Guiding resumed"),
            Err(e) => warn!("Failed to resume guiding: {}", e),
        }
    }
}

/// The launch → ready → configure → start → poll state machine
async fn drive_mapping_tool(
    session: &SessionSpec<'_>,
    ctx: &InstructionContext,
) -> InstructionResult {
    // Legacy measurement file for operator-driven runs; the temp file is
    // deleted on drop on every exit path.
    let mut measurement_file: Option<NamedTempFile> = None;
    if session.manual_start {
        let file = match NamedTempFile::new() {
            Ok(file) => file,
            Err(e) => {
                return InstructionResult::failure(format!(
                    "Failed to create the measurement file: {}",
                    e
                ))
            }
        };
        if let Err(e) = session
            .measurement
            .write_measurement_file(file.path(), &session.comments)
        {
            return InstructionResult::failure(format!(
                "Failed to write the measurement file: {}",
                e
            ));
        }
        debug!("Measurement file written to {}", file.path().display());
        measurement_file = Some(file);
    }

    let mut process = match AppmProcess::find_running(&session.tool.exe_path) {
        Some(process) => {
            info!("Reusing running APPM instance, pid {}", process.id());
            process
        }
        None => {
            let launch = LaunchOptions {
                exe_path: session.tool.exe_path.clone(),
                settings_path: session.tool.settings_path.clone(),
                measurement_path: measurement_file.as_ref().map(|f| f.path().to_path_buf()),
                auto_start: !session.manual_start,
                dont_exit: session.dont_exit,
            };
            match AppmProcess::launch(&launch) {
                Ok(process) => process,
                Err(e) => return InstructionResult::failure(e.to_string()),
            }
        }
    };

    if session.manual_start {
        info!(
            "{}: waiting for the operator-driven APPM run to finish",
            session.title
        );
        return tokio::select! {
            result = process.wait() => match result {
                Ok(Some(code)) => InstructionResult::success_with_message(
                    format!("APPM exited with code {}", code)),
                Ok(None) => InstructionResult::success_with_message("APPM exited"),
                Err(e) => InstructionResult::failure(e.to_string()),
            },
            _ = ctx.wait_cancelled() => InstructionResult::cancelled(
                format!("{} cancelled while waiting for APPM to exit", session.title)),
        };
    }

    let client = AppmClient::new(session.tool.api_port);

    // Handshake; a timeout leaves the tool running for inspection
    let ready = tokio::select! {
        result = client.wait_for_ready(session.tool.ready_timeout()) => result,
        _ = ctx.wait_cancelled() => {
            shutdown_tool(&client, false, !session.dont_exit).await;
            return InstructionResult::cancelled(
                format!("{} cancelled while waiting for APPM", session.title));
        }
    };
    let ready = match ready {
        Ok(ready) => ready,
        Err(e) => {
            return InstructionResult::failure(format!(
                "{}; APPM left running for inspection",
                e
            ))
        }
    };

    // Version gate before any configuration goes out
    match &ready.version {
        Some(raw) => match (
            raw.parse::<ToolVersion>(),
            session.tool.min_version.parse::<ToolVersion>(),
        ) {
            (Ok(found), Ok(minimum)) => {
                if found < minimum {
                    shutdown_tool(&client, false, !session.dont_exit).await;
                    return InstructionResult::failure(
                        AppmError::UnsupportedVersion {
                            found: found.to_string(),
                            minimum: minimum.to_string(),
                        }
                        .to_string(),
                    );
                }
                debug!("APPM version {} accepted", found);
            }
            (Err(e), _) => warn!("Could not parse APPM version {:?}: {}", raw, e),
            (_, Err(e)) => warn!("Invalid minimum version in options: {}", e),
        },
        None => warn!("APPM did not report a version, skipping the version check"),
    }

    // Configure; the run is never started before the configuration is accepted
    let configured = tokio::select! {
        result = client.set_configuration(&session.measurement) => result,
        _ = ctx.wait_cancelled() => {
            shutdown_tool(&client, false, !session.dont_exit).await;
            return InstructionResult::cancelled(
                format!("{} cancelled while configuring APPM", session.title));
        }
    };
    let configured = match configured {
        Ok(reply) => reply,
        Err(e) => {
            shutdown_tool(&client, false, true).await;
            return InstructionResult::failure(e.to_string());
        }
    };
    if !configured.success {
        shutdown_tool(&client, false, true).await;
        return InstructionResult::failure(
            AppmError::Rejected {
                detail: configured
                    .message
                    .unwrap_or_else(|| "no detail given".to_string()),
            }
            .to_string(),
        );
    }
    if configured.point_count == 0 {
        let message = format!(
            "{}: the configuration yields no measurement points, nothing to do",
            session.title
        );
        info!("{}", message);
        notify(ctx, "info", session.title, &message).await;
        shutdown_tool(&client, false, !session.dont_exit).await;
        return InstructionResult::success_with_message(message);
    }

    let total_points = configured.point_count;
    info!(
        "{}: starting mapping run with {} points",
        session.title, total_points
    );

    if let Err(e) = client.start().await {
        shutdown_tool(&client, false, true).await;
        return InstructionResult::failure(e.to_string());
    }

    // Concurrent status poll; sole writer of the shared progress
    let poll_handle = tokio::spawn(poll_status(
        client.clone(),
        session.tool.status_poll_interval(),
        total_points,
        ctx.progress.clone(),
        ctx.progress_callback.clone(),
    ));

    let interval = session.tool.status_poll_interval();
    let outcome = loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let progress = *ctx.progress.read().await;
                match progress.run_state {
                    MappingRunState::Completed => {
                        break InstructionResult {
                            status: InstructionStatus::Success,
                            message: Some(format!(
                                "{} completed, {} of {} points measured",
                                session.title, progress.measured_points, progress.total_points
                            )),
                            data: Some(serde_json::json!({
                                "measuredPoints": progress.measured_points,
                                "totalPoints": progress.total_points,
                            })),
                        };
                    }
                    MappingRunState::Failed => {
                        shutdown_tool(&client, false, true).await;
                        break InstructionResult::failure(format!(
                            "{}: APPM reported a failed mapping run",
                            session.title
                        ));
                    }
                    MappingRunState::Cancelled => {
                        shutdown_tool(&client, false, !session.dont_exit).await;
                        break InstructionResult::cancelled(format!(
                            "{} was cancelled from the APPM side",
                            session.title
                        ));
                    }
                    _ => {
                        if !process.is_running() {
                            break InstructionResult::failure(format!(
                                "{}: APPM exited unexpectedly mid-run",
                                session.title
                            ));
                        }
                    }
                }
            }
            _ = ctx.wait_cancelled() => {
                info!("{}: cancellation requested, stopping the mapping run", session.title);
                shutdown_tool(&client, true, !session.dont_exit).await;
                break InstructionResult::cancelled(format!("{} cancelled", session.title));
            }
        }
    };

    // No progress writes may land after this function returns
    poll_handle.abort();
    let _ = poll_handle.await;

    outcome
}

/// Status-poll task: refresh the shared progress until the run reaches a
/// terminal state. Communication errors end the task quietly; the main loop
/// notices through its own liveness check or cancellation.
async fn poll_status(
    client: AppmClient,
    interval: Duration,
    total_points: u32,
    progress: Arc<RwLock<ModelProgress>>,
    callback: Option<Arc<dyn Fn(ModelProgress) + Send + Sync>>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        match client.get_status().await {
            Ok(response) => {
                let update = ModelProgress {
                    run_state: response.status.mapping_run_state,
                    measured_points: response.status.measurement_points_count,
                    total_points,
                };
                debug!(
                    "Mapping run {} ({}/{} points)",
                    update.run_state, update.measured_points, update.total_points
                );
                *progress.write().await = update;
                if let Some(callback) = &callback {
                    callback(update);
                }
                if update.run_state.is_terminal() {
                    break;
                }
            }
            Err(e) => {
                debug!("Status poll ended: {}", e);
                break;
            }
        }
    }
}

/// Non-cancellable cleanup: stop the run and/or close the tool. Each request
/// carries its own timeout, so teardown always finishes.
async fn shutdown_tool(client: &AppmClient, stop: bool, close: bool) {
    if stop {
        if let Err(e) = client.stop().await {
            warn!("Failed to stop the mapping run: {}", e);
        }
    }
    if close {
        if let Err(e) = client.close().await {
            warn!("Failed to close APPM: {}", e);
        }
    }
}

async fn notify(ctx: &InstructionContext, level: &str, title: &str, message: &str) {
    if let Err(e) = ctx.device_ops.send_notification(level, title, message).await {
        warn!("Failed to send a notification: {}", e);
    }
}

fn measurement_comments(
    kind: &str,
    ctx: &InstructionContext,
    arc: Option<&DecArcParameters>,
    tool: &ModelToolOptions,
) -> Vec<String> {
    let mut lines = vec![format!(
        "{} configuration generated at {}",
        kind,
        chrono::Utc::now().to_rfc2822()
    )];

    if let (Some(name), Some(ra), Some(dec)) = (&ctx.target_name, ctx.target_ra, ctx.target_dec) {
        lines.push(format!("Target: {}", name));
        lines.push("Epoch: JNOW".to_string());
        lines.push(format!(
            "RA: {} ({:.2}°)",
            astro::ra_hms_string(ra),
            ra * 15.0
        ));
        lines.push(format!("Dec: {} ({:.2}°)", astro::dec_dms_string(dec), dec));
    }

    if let Some(arc) = arc {
        lines.push(format!("Arcs: {}", arc.arc_quantity));
        lines.push(format!("Dec arc spacing: {}°", arc.dec_spacing));
        lines.push(format!("RA point spacing: {}°", arc.ra_spacing));
        lines.push(format!("HA Lead-in: {}", tool.hour_angle_lead_in));
    }

    lines
}
