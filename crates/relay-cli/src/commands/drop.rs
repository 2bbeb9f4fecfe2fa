use std::path::Path;

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{READY_TIMEOUT, Session};

/// Below this speed a body counts as settled.
const REST_SPEED: f32 = 0.05;

pub fn run(
    bodies: usize,
    seconds: f64,
    seed: u64,
    transfer: bool,
    config: Option<&Path>,
) -> Result<(), String> {
    if bodies == 0 {
        return Err("need at least one body".into());
    }
    let duration = super::run_time(seconds)?;
    let config = super::load_config(config, bodies + 1)?;
    let mut session = Session::start(config, transfer)?;
    let mut rng = StdRng::seed_from_u64(seed);

    let ground = super::add_ground(session.worker())?;
    let mut falling = Vec::with_capacity(bodies);
    for i in 0..bodies {
        falling.push(super::add_falling(
            session.worker(),
            &mut rng,
            3.0,
            1.0 + i as f32 * 1.2,
        )?);
    }

    session.run_for(duration)?;

    let mut rows = Vec::with_capacity(bodies);
    let ground_slot = session.slot_of(ground);
    let got = session.next_frame(READY_TIMEOUT, |store, slots| {
        for (id, shape) in &falling {
            let Some(&slot) = slots.get(id) else {
                rows.push(vec![id.to_string(), shape.to_string(), "--".into()]);
                continue;
            };
            let record = store.read_record(slot);
            let height = record.matrix.w_axis.y;
            let contacts: Vec<String> = record
                .colliding_slots()
                .map(|s| {
                    if Some(s) == ground_slot {
                        "ground".to_string()
                    } else {
                        s.to_string()
                    }
                })
                .collect();
            let state = if record.linear_speed < REST_SPEED {
                "resting".green().to_string()
            } else {
                "moving".yellow().to_string()
            };
            rows.push(vec![
                id.to_string(),
                shape.to_string(),
                slot.to_string(),
                format!("{height:.3}"),
                format!("{:.3}", record.linear_speed),
                state,
                if contacts.is_empty() {
                    "-".to_string()
                } else {
                    contacts.join(", ")
                },
            ]);
        }
    })?;
    if !got {
        session.shutdown();
        return Err("worker stopped producing frames".into());
    }

    println!(
        "  {} {}",
        "Drop".bold(),
        format!(
            "({bodies} bodies, {seconds}s, seed={seed}, {})",
            if transfer { "transfer" } else { "shared" }
        )
        .dimmed()
    );
    println!(
        "  {} frames, mean step {:.3} ms, max {:.3} ms",
        session.frames,
        session.mean_step_ms(),
        session.step_ms_max
    );
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Body", "Shape", "Slot", "Height", "Speed", "State", "Touching",
    ]);
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");

    session.shutdown();
    Ok(())
}
