use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use relay_buffer::BufferLayout;
use relay_buffer::layout::{
    ANGULAR_SPEED_OFFSET, BODY_DATA_SIZE, COLLISIONS_OFFSET, HEADER_LENGTH, LINEAR_SPEED_OFFSET,
    MAX_COLLISIONS, STATE_WORD, STEP_DURATION_WORD, TRANSFORM_OFFSET,
};

pub fn run(capacity: usize) -> Result<(), String> {
    let layout = BufferLayout::new(capacity).map_err(|e| e.to_string())?;

    println!(
        "  {} {}",
        "Buffer layout".bold(),
        format!("({capacity} bodies)").dimmed()
    );
    println!(
        "  {} words, {} bytes shared; {} words per transferred block",
        layout.shared_words(),
        layout.shared_bytes(),
        layout.record_words()
    );
    println!();

    let mut header = Table::new();
    header.set_content_arrangement(ContentArrangement::Dynamic);
    header.set_header(vec!["Header word", "Meaning"]);
    header.add_row(vec![STATE_WORD.to_string(), "sync flag (0 uninit, 1 ready, 2 consumed)".into()]);
    header.add_row(vec![STEP_DURATION_WORD.to_string(), "last step duration, ms (f32)".into()]);
    header.add_row(vec![
        format!("{}..{HEADER_LENGTH}", STEP_DURATION_WORD + 1),
        "reserved".to_string(),
    ]);
    println!("{header}");
    println!();

    let mut record = Table::new();
    record.set_content_arrangement(ContentArrangement::Dynamic);
    record.set_header(vec!["Record words", "Field", "Type"]);
    record.add_row(vec![
        format!("{TRANSFORM_OFFSET}..{}", TRANSFORM_OFFSET + 16),
        "transform".to_string(),
        "f32 x 16, column-major".to_string(),
    ]);
    record.add_row(vec![
        LINEAR_SPEED_OFFSET.to_string(),
        "linear speed".to_string(),
        "f32".to_string(),
    ]);
    record.add_row(vec![
        ANGULAR_SPEED_OFFSET.to_string(),
        "angular speed".to_string(),
        "f32".to_string(),
    ]);
    record.add_row(vec![
        format!("{COLLISIONS_OFFSET}..{BODY_DATA_SIZE}"),
        format!("colliding slots (up to {MAX_COLLISIONS})"),
        "i32, -1 padded".to_string(),
    ]);
    println!("{record}");

    Ok(())
}
