pub const MAX_SKILL_LEVEL: i64 = 5;

pub fn calculate_sp_per_minute(primary: i64, secondary: i64) -> f64 {
    primary as f64 + (secondary as f64 / 2.0)
}

/// Cumulative skill points needed to reach `level` from nothing.
pub fn calculate_sp_for_level(rank: i64, level: i64) -> i64 {
    if !(1..=MAX_SKILL_LEVEL).contains(&level) {
        return 0;
    }
    let base: f64 = 2.0;
    let exponent = 2.5 * (level as f64 - 1.0);
    // Ceiling the base SP before multiplying by rank matches EVE's behavior
    let base_sp = (base.powf(exponent) * 250.0).ceil();
    (base_sp * rank as f64) as i64
}

/// Skill points needed to train only `level`, given `level - 1` is done.
pub fn calculate_sp_for_single_level(rank: i64, level: i64) -> i64 {
    calculate_sp_for_level(rank, level) - calculate_sp_for_level(rank, level - 1)
}

pub fn is_valid_level(level: i64) -> bool {
    (1..=MAX_SKILL_LEVEL).contains(&level)
}

/// Formats a duration as "3d 4h 15m", rounding up to the next minute.
pub fn format_training_time(minutes: f64) -> String {
    let total = minutes.max(0.0).ceil() as i64;
    let days = total / (24 * 60);
    let hours = (total % (24 * 60)) / 60;
    let mins = total % 60;
    if days > 0 {
        format!("{}d {}h {}m", days, hours, mins)
    } else if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}
