//! Text line chart for current-loop samples.

const LABEL_WIDTH: usize = 7;

/// Render samples as a labelled chart: x axis "Sample", y axis "Current (mA)".
///
/// When there are more samples than columns, each column shows the sample
/// at its left edge.
pub fn render(samples: &[i16], width: usize, height: usize) -> String {
    if samples.is_empty() {
        return "No samples captured.\n".to_string();
    }

    let columns = width.clamp(1, samples.len());
    let height = height.max(2);

    let values: Vec<i32> = (0..columns)
        .map(|c| i32::from(samples[c * samples.len() / columns]))
        .collect();

    let min = values.iter().copied().min().unwrap_or(0);
    let max = values.iter().copied().max().unwrap_or(0);
    let span = (max - min).max(1);
    let rows = height as i32 - 1;

    // Row index per column, 0 = top.
    let plotted: Vec<usize> = values
        .iter()
        .map(|v| (((max - v) * rows + span / 2) / span) as usize)
        .collect();

    let mut out = String::new();
    out.push_str("Current (mA)\n");

    for row in 0..height {
        let label = if row == 0 {
            max.to_string()
        } else if row == height - 1 {
            min.to_string()
        } else if row == height / 2 {
            (max - span * row as i32 / rows).to_string()
        } else {
            String::new()
        };

        let line: String = plotted
            .iter()
            .map(|r| if *r == row { '*' } else { ' ' })
            .collect();
        out.push_str(&format!(
            "{:>w$} |{}\n",
            label,
            line.trim_end(),
            w = LABEL_WIDTH
        ));
    }

    out.push_str(&format!(
        "{:>w$} +{}\n",
        "",
        "-".repeat(columns),
        w = LABEL_WIDTH
    ));

    let last = (samples.len() - 1).to_string();
    let gap = columns.saturating_sub(1 + last.len()).max(1);
    out.push_str(&format!(
        "{:>w$}  0{}{}\n",
        "",
        " ".repeat(gap),
        last,
        w = LABEL_WIDTH
    ));

    let pad = LABEL_WIDTH + 2 + columns.saturating_sub(6) / 2;
    out.push_str(&format!("{}Sample\n", " ".repeat(pad)));
    out
}
