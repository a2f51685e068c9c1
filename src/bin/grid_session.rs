//! Grid Session Demo
//!
//! Drives a scripted three-stream session and prints the commands each
//! player would receive.

use anyhow::Result;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use multistream_engine::{
    config::EngineConfig,
    health::{HealthSample, QualityLevel},
    layout::{ChromeInsets, LayoutMode, Point, Size},
    player::{CommandReceiver, PlayerChannel},
    PlayerEvent, StreamId, StreamIdentity, ViewingSession,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting grid session demo");

    let config_path = EngineConfig::default_path();
    let config = EngineConfig::load_or_default(config_path.as_deref())?;
    if let Some(path) = &config_path {
        tracing::info!("Config: {}", path.display());
    }

    // Phone in landscape with a header and a bottom control bar
    let viewport = Size::new(844.0, 390.0);
    let insets = ChromeInsets::vertical(44.0, 56.0);
    let (mut session, mut events) = ViewingSession::new(config, viewport, insets);

    let mut players: Vec<(StreamId, CommandReceiver)> = Vec::new();
    for (id, login) in [("1001", "alpha"), ("1002", "bravo"), ("1003", "charlie")] {
        let (channel, rx) = PlayerChannel::pair();
        session.add_stream(identity(id, login), channel)?;
        players.push((StreamId::new(id), rx));
    }
    print_commands("register", &mut players);

    let grid = session.grid();
    println!(
        "\n=== Layout ===\n  {}x{} cells of {}x{} (overflow: {})",
        grid.columns, grid.rows, grid.cell_width, grid.cell_height, grid.overflows
    );
    for frame in session.frames()? {
        println!(
            "  {:>5} at ({}, {}) size {}x{}",
            frame.stream_id, frame.x, frame.y, frame.width, frame.height
        );
    }

    // Switch audio focus twice
    session.set_active_stream(&StreamId::new("1002"))?;
    print_commands("focus 1002", &mut players);
    session.set_active_stream(&StreamId::new("1003"))?;
    print_commands("focus 1003", &mut players);

    // Rotate to portrait
    session.set_viewport(Size::new(390.0, 844.0), insets);
    let grid = session.grid();
    println!("\n=== Rotated ===\n  {}x{} grid", grid.columns, grid.rows);

    // Free-form layout
    session.set_layout_mode(LayoutMode::Custom)?;
    let frames = session.frames()?;
    if let Some(first) = frames.first() {
        let mut moved = first.clone();
        moved.x = 500.0;
        let clamped = session.set_custom_position(moved)?;
        println!("  custom frame for {} clamped to x = {}", clamped.stream_id, clamped.x);
    }
    let saved = session.save_layout("demo")?;
    println!("  saved layout: {}", saved.to_json()?);

    // Picture-in-picture drag towards the left edge
    let mut pip = session.floating_window();
    let start = pip.position();
    pip.begin_drag(Point::new(start.x + 10.0, start.y + 10.0));
    pip.drag_to(Point::new(25.0, 300.0));
    if let Some(update) = pip.end_drag() {
        println!("\n=== PiP ===\n  {:?}", update);
    }

    // Health
    let mut sample = HealthSample::default();
    sample.quality.level = QualityLevel::P1080;
    sample.quality.error_count = 3;
    sample.bandwidth.is_stable = false;
    sample.bandwidth.jitter_ms = 80;
    let update = session.ingest_health(&StreamId::new("1001"), &sample)?;
    println!(
        "\n=== Health ===\n  1001: {:?} (score {}, stable {}), suggest {:?}",
        update.report.rating, update.report.score, update.report.is_stable, update.recommended_quality
    );

    // One player fails to load, retries, then recovers
    let failing = StreamId::new("1002");
    session.handle_notification(&failing, r#"{"type":"player_error","message":"network"}"#)?;
    let wait = session.config().playback.retry_delay(1) + Duration::from_millis(100);
    match tokio::time::timeout(wait, events.recv()).await {
        Ok(Some(PlayerEvent::ReloadRequested { stream_id, attempt })) => {
            println!("\n=== Retry ===\n  reload {} (attempt {})", stream_id, attempt);
            session.handle_notification(&stream_id, r#"{"type":"player_ready"}"#)?;
        }
        Ok(other) => println!("\n=== Retry ===\n  unexpected event: {:?}", other),
        Err(_) => println!("\n=== Retry ===\n  no reload requested"),
    }
    if let Ok(event) = events.try_recv() {
        println!("  {:?}", event);
    }

    for (id, _) in &players {
        session.remove_stream(id)?;
    }
    tracing::info!("Session closed");
    Ok(())
}

fn identity(id: &str, login: &str) -> StreamIdentity {
    StreamIdentity {
        id: StreamId::new(id),
        user_login: login.to_string(),
        user_name: login.to_uppercase(),
        game_name: "Just Chatting".to_string(),
        viewer_count: 1_000,
        started_at: chrono::Utc::now() - chrono::Duration::minutes(42),
        thumbnail_url: format!("https://static.example/previews/{login}-{{width}}x{{height}}.jpg"),
    }
}

fn print_commands(step: &str, players: &mut [(StreamId, CommandReceiver)]) {
    println!("\n=== {} ===", step);
    for (id, rx) in players.iter_mut() {
        while let Ok(command) = rx.try_recv() {
            println!("  {:>5} <- {}", id, command);
        }
    }
}
