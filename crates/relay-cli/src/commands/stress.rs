use std::path::Path;

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{READY_TIMEOUT, Session};

pub fn run(
    bodies: usize,
    seconds: f64,
    seed: u64,
    transfer: bool,
    config: Option<&Path>,
) -> Result<(), String> {
    let duration = super::run_time(seconds)?;
    let config = super::load_config(config, bodies + 1)?;
    let rate_ms = config.simulation_rate * 1000.0;
    let mut session = Session::start(config, transfer)?;
    let mut rng = StdRng::seed_from_u64(seed);

    super::add_ground(session.worker())?;
    // Roughly square columns so the pile stays bounded.
    let spread = (bodies as f32).sqrt().clamp(1.0, 15.0);
    for i in 0..bodies {
        super::add_falling(session.worker(), &mut rng, spread, 1.0 + (i % 50) as f32 * 0.8)?;
    }

    session.run_for(duration)?;

    let mut touching = 0usize;
    let mut settled = 0usize;
    session.next_frame(READY_TIMEOUT, |store, slots| {
        for &slot in slots.values() {
            let record = store.read_record(slot);
            if record.colliding_slots().next().is_some() {
                touching += 1;
            }
            if record.linear_speed < 0.05 {
                settled += 1;
            }
        }
    })?;
    let confirmed = session.slots.len();
    let fps = session.frames as f64 / duration.as_secs_f64();

    println!(
        "  {} {}",
        "Stress".bold(),
        format!(
            "({bodies} bodies, {seconds}s, seed={seed}, {})",
            if transfer { "transfer" } else { "shared" }
        )
        .dimmed()
    );
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["bodies ready".to_string(), confirmed.to_string()]);
    table.add_row(vec!["frames consumed".to_string(), session.frames.to_string()]);
    table.add_row(vec!["frames / s".to_string(), format!("{fps:.1}")]);
    table.add_row(vec!["timer period".to_string(), format!("{rate_ms:.2} ms")]);
    table.add_row(vec![
        "mean step".to_string(),
        format!("{:.3} ms", session.mean_step_ms()),
    ]);
    table.add_row(vec![
        "max step".to_string(),
        format_step(session.step_ms_max, rate_ms),
    ]);
    table.add_row(vec!["bodies touching".to_string(), touching.to_string()]);
    table.add_row(vec!["bodies settled".to_string(), settled.to_string()]);
    println!("{table}");

    session.shutdown();
    Ok(())
}

/// Steps longer than the timer period mean the worker is falling behind.
fn format_step(step_ms: f32, rate_ms: f64) -> String {
    let text = format!("{step_ms:.3} ms");
    if f64::from(step_ms) > rate_ms {
        text.red().to_string()
    } else {
        text
    }
}
