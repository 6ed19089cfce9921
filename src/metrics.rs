//! Pure metric helpers shared by the live stats bar and the results screen.

/// Gross words per minute using the standard 5-characters-per-word convention.
pub fn wpm(characters: usize, minutes: f64) -> u32 {
    if minutes == 0.0 {
        return 0;
    }
    let words = characters as f64 / 5.0;
    (words / minutes).round() as u32
}

/// Percentage of judged characters that were typed correctly.
///
/// With zero judged characters there is nothing to penalize, so this is 100.
/// Heavy error counts clamp at 0 rather than going negative.
pub fn accuracy(characters_judged: usize, errors: usize) -> u32 {
    if characters_judged == 0 {
        return 100;
    }
    let pct = ((characters_judged as f64 - errors as f64) / characters_judged as f64) * 100.0;
    pct.round().max(0.0) as u32
}

/// WPM discounted by accuracy, shown on the results screen only.
pub fn net_wpm(gross_wpm: u32, accuracy: u32) -> u32 {
    (gross_wpm as f64 * accuracy as f64 / 100.0).round() as u32
}

/// How far through the reference text the cursor is, as a whole percentage.
pub fn progress_percent(cursor: usize, reference_len: usize) -> u32 {
    if reference_len == 0 {
        return 0;
    }
    ((cursor as f64 / reference_len as f64) * 100.0).round() as u32
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum Grade {
    #[strum(serialize = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    F,
}

/// Letter grade for a finished session. Accuracy below 80 is an F no matter
/// how fast the run was; otherwise the first matching (wpm, accuracy) tier
/// wins, checked from the top down.
pub fn grade(wpm: u32, accuracy: u32) -> Grade {
    if accuracy < 80 {
        Grade::F
    } else if wpm >= 70 && accuracy >= 95 {
        Grade::APlus
    } else if wpm >= 60 && accuracy >= 90 {
        Grade::A
    } else if wpm >= 50 && accuracy >= 85 {
        Grade::B
    } else if wpm >= 40 && accuracy >= 80 {
        Grade::C
    } else {
        Grade::D
    }
}

/// Formats a duration in seconds as "3m 12s" or "45s".
pub fn format_time(seconds: u64) -> String {
    let mins = seconds / 60;
    let secs = seconds % 60;
    if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
